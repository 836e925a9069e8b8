//! HXSL compiler: preprocessor, lexer, parser, symbol table, collector,
//! resolver, type checker, IR builder, optimizer, and control-flow
//! analyzer, wired into the single [`compile`] entry point the CLI
//! driver calls.
//!
//! Pipeline stage order (leaves first): preprocessor cleans the byte
//! stream and produces text mappings; the lexer/parser produce an AST per
//! source file; the collector declares every top-level symbol across all
//! files into one shared table; the resolver binds references (re-running
//! to a fixed point for forward references); the type checker infers
//! expression types and inserts casts; the IR builder lowers each file's
//! AST to SSA-style IR and the resulting per-file modules are merged into
//! one; the optimizer and control-flow analyzer run per function.

pub mod ast;
pub mod collector;
pub mod config;
pub mod control_flow;
pub mod ir;
pub mod lexer;
pub mod optimizer;
pub mod parser;
pub mod preprocessor;
pub mod resolver;
pub mod symbols;
pub mod typechecker;

use ast::{Ast, NodeId};
pub use config::{CompilerConfig, OptimizationLevel, ReferenceAssembly};
use hxsl_core::{LocaleTable, Logger, SourceManager};
use ir::Module;
use symbols::{populate_primitives, SymbolTable};

/// A top-level pipeline abort, distinct from the ordinary diagnostics
/// that accumulate in the [`Logger`] returned alongside a successful
/// [`Module`]. Resolution and type-check errors are recorded and the
/// pipeline continues around them; only a critical-error escalation
/// (too many errors) reaches here.
#[derive(Debug)]
pub enum PipelineError {
    /// The logger's error count crossed `CRITICAL_ERROR_THRESHOLD`; the
    /// accumulated messages are still available by re-inspecting the
    /// logger the caller passed in results up to that point.
    TooManyErrors,
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::TooManyErrors => write!(f, "too many errors; compilation aborted"),
        }
    }
}

impl std::error::Error for PipelineError {}

/// One parsed source file carried through the frontend passes: its own
/// AST (bump-allocated nodes are per-file; the symbol table is shared).
struct ParsedUnit {
    ast: Ast,
    root: NodeId,
}

/// The result of a successful [`compile`]: the lowered IR module plus the
/// logger that accumulated every diagnostic along the way. A non-empty
/// `logger.has_errors()` means the module was produced but is not safe to
/// hand to a backend — per the CLI contract, callers should check that
/// before writing it out.
pub struct CompileOutput<'loc> {
    pub module: Module,
    pub logger: Logger<'loc>,
}

/// Runs the full frontend-to-IR pipeline over `sources` (each a `(name,
/// bytes)` pair, in the order they should be linked), sharing one symbol
/// table across all of them so declarations in one file are visible from
/// another. `references` are recorded on `config` but not loaded here;
/// reference-assembly linking is a backend concern, out of scope for this
/// crate.
pub fn compile<'loc>(
    sources: &[(String, Vec<u8>)],
    config: &CompilerConfig,
    locale: &'loc LocaleTable,
) -> Result<CompileOutput<'loc>, PipelineError> {
    let mut logger = Logger::new(locale);
    let mut source_manager = SourceManager::new();
    let mut table = SymbolTable::new(0);
    populate_primitives(&mut table);

    let mut units: Vec<ParsedUnit> = Vec::with_capacity(sources.len());

    for (name, bytes) in sources {
        let source_id = source_manager.add_file(name.clone(), bytes.clone());

        let mut pp = preprocessor::Preprocessor::new();
        let processed = pp.process(source_manager.file(source_id).buffer(), &mut logger);
        source_manager.file_mut(source_id).set_buffer(processed);
        if logger.is_critical() {
            return Err(PipelineError::TooManyErrors);
        }

        let buf = source_manager.file(source_id).buffer().to_vec();
        let mut ast = Ast::new();
        let root = {
            let mut parser = parser::Parser::new(source_id, &buf, &mut ast, &mut logger);
            parser.parse_compilation_unit()
        };
        if logger.is_critical() {
            return Err(PipelineError::TooManyErrors);
        }
        units.push(ParsedUnit { ast, root });
    }

    tracing::debug!(files = units.len(), "preprocessed and parsed all sources");

    // Pass 1: collect every declaration into the shared symbol table
    // before any reference is resolved, so forward references across
    // files (and within a file) see a fully-populated top level.
    for unit in &mut units {
        collector::Collector::new(&mut unit.ast, &mut table).collect(unit.root);
    }

    // Pass 2: resolve references, re-running to a fixed point inside
    // each `Resolver::resolve` call for forward-reference cycles.
    for unit in &mut units {
        resolver::Resolver::new(&mut unit.ast, &mut table, &mut logger).resolve(unit.root);
        if logger.is_critical() {
            return Err(PipelineError::TooManyErrors);
        }
    }

    // Pass 3: infer expression types, insert casts, pick operator
    // overloads.
    for unit in &mut units {
        typechecker::TypeChecker::new(&mut unit.ast, &table, &mut logger).check(unit.root);
        if logger.is_critical() {
            return Err(PipelineError::TooManyErrors);
        }
    }

    tracing::debug!(error_count = logger.error_count(), "semantic analysis complete");

    // Lower each file's AST independently (an `IrBuilder` borrows one
    // `Ast` for its whole lifetime) and fold the resulting modules
    // together, renumbering type/call-metadata indices as they merge.
    let mut module = Module::new();
    for unit in &units {
        let file_module = ir::IrBuilder::new(&unit.ast, &table).build(unit.root);
        module.merge(file_module);
    }

    if config.optimization_level == OptimizationLevel::Basic {
        for function in &mut module.functions {
            optimizer::simplify(function);
            control_flow::analyze(function, &mut logger);
        }
        tracing::debug!(functions = module.functions.len(), "optimization passes complete");
    }

    if logger.is_critical() {
        return Err(PipelineError::TooManyErrors);
    }

    Ok(CompileOutput { module, logger })
}

/// The locale-selection surface named in the external-interface contract:
/// `"en-US"` resolves to the only bundled locale table today, and
/// anything else falls back to it rather than failing the whole
/// compilation over a missing locale pack. The localization database
/// itself (additional locales, message translation) is out of scope.
pub fn locale_for(name: &str) -> LocaleTable {
    match name {
        "en-US" | "en_US" => LocaleTable::en_us(),
        _ => LocaleTable::en_us(),
    }
}
