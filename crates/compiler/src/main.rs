//! HXSL compiler CLI
//!
//! Command-line driver for compiling HXSL source files to the lowered IR
//! module format, plus a `check`-only mode and a family of `dump-*`
//! debugging subcommands for inspecting intermediate pipeline state.

use clap::{Parser as ClapParser, Subcommand};
use hxsl_core::{ByteStream, FileStream, LocaleTable, Logger};
use hxslc::{CompilerConfig, OptimizationLevel, ReferenceAssembly};
use std::path::PathBuf;
use std::process;

#[derive(ClapParser)]
#[command(name = "hxslc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "HXSL compiler - compile shader source to lowered IR", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile sources through the full pipeline and write the IR module.
    Build {
        /// Input source files, compiled together as one linked module.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output IR module path.
        #[arg(short, long)]
        output: PathBuf,

        /// Precompiled reference assembly file(s) to load before compiling.
        #[arg(long = "reference", value_name = "PATH")]
        references: Vec<PathBuf>,

        /// Skip the optimizer and control-flow analysis passes.
        #[arg(long)]
        no_optimize: bool,

        /// Diagnostic locale (only "en-US" resolves to a real table today).
        #[arg(long, default_value = "en-US")]
        locale: String,
    },

    /// Run the pipeline through the type checker only; emit no IR.
    Check {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        #[arg(long = "reference", value_name = "PATH")]
        references: Vec<PathBuf>,

        #[arg(long, default_value = "en-US")]
        locale: String,
    },

    /// Print the token stream for one source file.
    DumpTokens {
        input: PathBuf,
    },

    /// Print the flat AST node listing for one source file.
    DumpAst {
        input: PathBuf,
    },

    /// Compile one or more files and print the lowered IR, skipping the
    /// optimizer so the raw lowering is visible.
    DumpIr {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("hxslc=info".parse().unwrap()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            inputs,
            output,
            references,
            no_optimize,
            locale,
        } => run_build(&inputs, &output, &references, no_optimize, &locale),
        Commands::Check {
            inputs,
            references,
            locale,
        } => run_check(&inputs, &references, &locale),
        Commands::DumpTokens { input } => run_dump_tokens(&input),
        Commands::DumpAst { input } => run_dump_ast(&input),
        Commands::DumpIr { inputs } => run_dump_ir(&inputs),
    }
}

fn read_sources(paths: &[PathBuf]) -> Vec<(String, Vec<u8>)> {
    let mut sources = Vec::with_capacity(paths.len());
    for path in paths {
        match std::fs::read(path) {
            Ok(bytes) => sources.push((path.display().to_string(), bytes)),
            Err(e) => {
                eprintln!("error: could not read {}: {}", path.display(), e);
                process::exit(2);
            }
        }
    }
    sources
}

fn build_config(references: &[PathBuf], locale: &str, optimize: bool) -> CompilerConfig {
    CompilerConfig::new()
        .with_locale(locale)
        .with_optimization_level(if optimize { OptimizationLevel::Basic } else { OptimizationLevel::None })
        .with_reference_assemblies(references.iter().map(ReferenceAssembly::new))
}

/// Prints every recorded diagnostic and returns the process exit code the
/// CLI contract assigns: 0 clean, 1 if any error-level diagnostic fired.
fn report(logger: &Logger<'_>) -> i32 {
    for message in logger.messages() {
        eprintln!("{}", message);
    }
    if logger.has_errors() {
        1
    } else {
        0
    }
}

fn run_build(inputs: &[PathBuf], output: &PathBuf, references: &[PathBuf], no_optimize: bool, locale: &str) {
    let sources = read_sources(inputs);
    let config = build_config(references, locale, !no_optimize);
    let locale_table = hxslc::locale_for(locale);

    match hxslc::compile(&sources, &config, &locale_table) {
        Ok(result) => {
            let code = report(&result.logger);
            if code != 0 {
                process::exit(code);
            }
            if let Err(e) = write_module(&result.module, output) {
                eprintln!("error: could not write {}: {}", output.display(), e);
                process::exit(2);
            }
            println!("compiled {} source(s) -> {}", inputs.len(), output.display());
        }
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(2);
        }
    }
}

fn run_check(inputs: &[PathBuf], references: &[PathBuf], locale: &str) {
    let sources = read_sources(inputs);
    let config = build_config(references, locale, false);
    let locale_table = hxslc::locale_for(locale);

    match hxslc::compile(&sources, &config, &locale_table) {
        Ok(result) => {
            let code = report(&result.logger);
            if code == 0 {
                println!("no errors");
            }
            process::exit(code);
        }
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(2);
        }
    }
}

fn run_dump_tokens(input: &PathBuf) {
    use hxsl_core::SourceManager;
    use hxslc::lexer::{Lexer, LexerConfig};

    let bytes = std::fs::read(input).unwrap_or_else(|e| {
        eprintln!("error: could not read {}: {}", input.display(), e);
        process::exit(2);
    });

    let locale_table = LocaleTable::en_us();
    let mut logger = Logger::new(&locale_table);
    let mut source_manager = SourceManager::new();
    let source_id = source_manager.add_file(input.display().to_string(), bytes);
    let buf = source_manager.file(source_id).buffer().to_vec();

    let mut lexer = Lexer::new(source_id, &buf, LexerConfig::parser());
    loop {
        let token = lexer.next_token(&mut logger);
        let is_eof = token.is_eof();
        if !token.is_trivia() {
            println!("{:?}", token);
        }
        if is_eof {
            break;
        }
    }

    process::exit(report(&logger));
}

fn run_dump_ast(input: &PathBuf) {
    use hxsl_core::SourceManager;
    use hxslc::ast::Ast;
    use hxslc::parser::Parser;

    let bytes = std::fs::read(input).unwrap_or_else(|e| {
        eprintln!("error: could not read {}: {}", input.display(), e);
        process::exit(2);
    });

    let locale_table = LocaleTable::en_us();
    let mut logger = Logger::new(&locale_table);
    let mut source_manager = SourceManager::new();
    let source_id = source_manager.add_file(input.display().to_string(), bytes);
    let buf = source_manager.file(source_id).buffer().to_vec();

    let mut ast = Ast::new();
    {
        let mut parser = Parser::new(source_id, &buf, &mut ast, &mut logger);
        parser.parse_compilation_unit();
    }

    for i in 0..ast.len() {
        let id = hxslc::ast::NodeId(i as u32);
        let node = ast.node(id);
        println!("#{}: {:?} @ {:?}", i, node.kind, node.span);
    }

    process::exit(report(&logger));
}

fn run_dump_ir(inputs: &[PathBuf]) {
    let sources = read_sources(inputs);
    let config = CompilerConfig::new().with_optimization_level(OptimizationLevel::None);
    let locale_table = hxslc::locale_for("en-US");

    match hxslc::compile(&sources, &config, &locale_table) {
        Ok(result) => {
            for function in &result.module.functions {
                println!("function {} -> type#{}", function.name, function.return_type);
                for (i, block) in function.cfg.blocks.iter().enumerate() {
                    println!("  block{}:", i);
                    for instr in &block.instructions {
                        println!("    {:?}", instr);
                    }
                }
            }
            process::exit(report(&result.logger));
        }
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(2);
        }
    }
}

fn write_module(module: &hxslc::ir::Module, path: &PathBuf) -> std::io::Result<()> {
    let mut stream = FileStream::create(path)?;
    module.write_to(&mut stream)
}
