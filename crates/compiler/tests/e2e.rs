//! End-to-end coverage of the pipeline's headline scenarios, each driven
//! through the same frontend sequence `hxslc::compile` uses internally
//! (collector -> resolver -> type checker), plus the preprocessor and
//! optimizer exercised directly since they don't need a symbol table.

use hxsl_core::{BinOp, Logger, Number, SourceId};
use hxslc::ast::{Ast, NodeKind, SymbolRefState};
use hxslc::collector::Collector;
use hxslc::ir::{ILFunction, Instruction, OpCode, Operand, VarId};
use hxslc::optimizer::simplify;
use hxslc::parser::Parser;
use hxslc::preprocessor::Preprocessor;
use hxslc::resolver::Resolver;
use hxslc::symbols::{populate_primitives, SymbolTable};
use hxslc::typechecker::TypeChecker;

/// Parses, collects, resolves, and type-checks `src` against a fresh
/// symbol table seeded with the full primitive set, returning the AST,
/// table, and the stringified diagnostics in emission order.
fn pipeline(src: &str) -> (Ast, SymbolTable, Vec<String>) {
    let locale = hxsl_core::LocaleTable::en_us();
    let mut logger = Logger::new(&locale);
    let mut ast = Ast::new();
    let unit = {
        let mut parser = Parser::new(SourceId(0), src.as_bytes(), &mut ast, &mut logger);
        parser.parse_compilation_unit()
    };
    let mut table = SymbolTable::new(1);
    populate_primitives(&mut table);
    Collector::new(&mut ast, &mut table).collect(unit);
    Resolver::new(&mut ast, &mut table, &mut logger).resolve(unit);
    TypeChecker::new(&mut ast, &table, &mut logger).check(unit);
    (ast, table, logger.messages().iter().map(|m| m.to_string()).collect())
}

#[test]
fn namespaced_struct_declares_nested_symbols_and_a_typed_field() {
    let (_, table, errs) = pipeline("namespace a.b { struct S { int x; } }");
    assert!(errs.is_empty(), "{errs:?}");

    let root = table.root();
    let ns = table.find_node_full_path("a.b", root).expect("namespace a.b declared");
    let strukt = table.find_node_full_path("a.b.S", root).expect("struct a.b.S declared");
    let field = table.find_node_full_path("a.b.S.x", root).expect("field a.b.S.x declared");

    assert_eq!(table.metadata(ns), None, "a bare namespace segment carries no declaration metadata");
    assert!(table.metadata(strukt).is_some());

    let field_meta = table.metadata(field).expect("field has metadata");
    let field_ty = field_meta.type_handle.expect("field has a resolved type");
    assert_eq!(table.short_name(field_ty), "int");
}

#[test]
fn return_type_mismatch_is_reported_unless_the_function_returns_float() {
    let (_, _, errs) = pipeline("bool f() { return 1 + 2.0; }");
    assert!(
        errs.iter().any(|e| e.contains("does not match")),
        "expected a return-type mismatch diagnostic, got {errs:?}"
    );

    let (ast, _, errs) = pipeline("float f() { return 1 + 2.0; }");
    assert!(errs.is_empty(), "widening to float should need no diagnostic: {errs:?}");
    let NodeKind::CompilationUnit { items } = &ast.node(ast.root()).kind else { panic!() };
    let NodeKind::FunctionDecl { body: Some(body), .. } = &ast.node(items[0]).kind else { panic!() };
    let NodeKind::Block { statements } = &ast.node(*body).kind else { panic!() };
    let NodeKind::ReturnStmt { value: Some(value) } = &ast.node(statements[0]).kind else { panic!() };
    let NodeKind::Binary { lhs, .. } = &ast.node(*value).kind else { panic!() };
    assert!(matches!(ast.node(*lhs).kind, NodeKind::Cast { .. }), "the integer literal should have been cast to float");
}

#[test]
fn swizzle_chain_on_a_vector_local_types_as_a_scalar() {
    let (ast, table, errs) = pipeline("void f() { float4 v; float s = v.xyz.x; }");
    assert!(errs.is_empty(), "{errs:?}");

    let NodeKind::CompilationUnit { items } = &ast.node(ast.root()).kind else { panic!() };
    let NodeKind::FunctionDecl { body: Some(body), .. } = &ast.node(items[0]).kind else { panic!() };
    let NodeKind::Block { statements } = &ast.node(*body).kind else { panic!() };
    let NodeKind::VarDeclStmt { init: Some(init), .. } = &ast.node(statements[1]).kind else { panic!() };
    assert!(matches!(ast.symbol_ref(*init), SymbolRefState::Resolved(_)));

    let float_ty = ast.inferred_type(*init).expect("initializer has an inferred type");
    assert_eq!(table.short_name(float_ty), "float");
}

#[test]
fn break_outside_any_loop_is_diagnosed() {
    let (_, _, errs) = pipeline("void f() { for (int i = 0; i < 10; i = i + 1) { } break; }");
    assert!(
        errs.iter().any(|e| e.contains("break statement")),
        "expected the trailing break to be flagged: {errs:?}"
    );
}

#[test]
fn comparison_bitwise_and_logical_operators_type_check_through_the_frontend() {
    for src in [
        "bool f() { int a = 1; int b = 2; return a <= b; }",
        "bool f() { int a = 1; int b = 2; return a > b; }",
        "bool f() { int a = 1; int b = 2; return a >= b; }",
        "int f() { int a = 1; int b = 2; return a & b; }",
        "bool f() { bool a = true; bool b = false; return a && b; }",
    ] {
        let (_, _, errs) = pipeline(src);
        assert!(errs.is_empty(), "{src:?}: {errs:?}");
    }
}

#[test]
fn function_like_macro_expands_and_is_text_mapped() {
    let locale = hxsl_core::LocaleTable::en_us();
    let mut logger = Logger::new(&locale);
    let mut pp = Preprocessor::new();
    let out = pp.process(b"#define DOUBLE(x) ((x)+(x))\nint y = DOUBLE(3);\n", &mut logger);
    assert_eq!(String::from_utf8(out).unwrap(), "int y = ((3)+(3));\n");
    assert!(!pp.mappings().is_empty(), "the expansion should leave a text mapping behind");
}

#[test]
fn short_circuit_and_with_a_false_literal_prunes_its_branch_and_merges_blocks() {
    let cond = Operand::Variable(VarId::new(0, 0));
    let and_result = Operand::Variable(VarId::new(1, 0));
    let mut f = ILFunction::new("f", 0);
    let taken = f.cfg.alloc_block();
    let fallthrough = f.cfg.alloc_block();
    f.cfg.link(0, taken);
    f.cfg.link(0, fallthrough);
    f.cfg.blocks[0].instructions = vec![
        Instruction::binary(BinOp::LogicalAnd, cond, Operand::Immediate(Number::Bool(false)), and_result),
        Instruction::jump_if_not_zero(taken as u32, and_result),
    ];
    f.cfg.blocks[taken].instructions.push(Instruction::ret(None));
    f.cfg.blocks[fallthrough].instructions.push(Instruction::ret(None));

    simplify(&mut f);

    assert!(!f.cfg.blocks[0].successors.contains(&taken), "the dead branch's edge should be unlinked");
    assert!(f.cfg.blocks[taken].predecessors.is_empty(), "the dead block loses its only predecessor");
    assert_eq!(f.cfg.blocks[0].instructions.len(), 2, "block 0 absorbs the fallthrough block's instructions");
    assert_eq!(f.cfg.blocks[0].instructions[1].opcode, OpCode::Return);
}
