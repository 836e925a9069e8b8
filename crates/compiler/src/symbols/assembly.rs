//! Assemblies: an owning container for a symbol table plus a compilation
//! unit's AST, sealable against further mutation. The process-wide
//! `HXSL.Core` primitive assembly is built once behind a [`OnceLock`] and
//! never mutated again.

use super::table::{AccessModifier, SymbolKind, SymbolMetadata, SymbolTable};
use super::handle::SymbolHandle;
use crate::ast::{Ast, BinaryOp};
use std::sync::OnceLock;

/// One compiled unit: its symbol table and AST root, optionally sealed.
pub struct Assembly {
    pub name: String,
    pub table: SymbolTable,
    pub ast: Ast,
}

impl Assembly {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: SymbolTable::new(id),
            ast: Ast::new(),
        }
    }

    pub fn seal(&mut self) {
        self.table.seal();
    }

    pub fn is_sealed(&self) -> bool {
        self.table.is_sealed()
    }
}

/// Scalar primitive kinds, in ascending implicit-conversion rank
/// (`int < uint < half < float < double`), used for overload-resolution
/// cast preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ScalarKind {
    Bool,
    Int,
    Uint,
    Half,
    Float,
    Double,
}

impl ScalarKind {
    pub const ALL: [ScalarKind; 6] = [
        ScalarKind::Bool,
        ScalarKind::Int,
        ScalarKind::Uint,
        ScalarKind::Half,
        ScalarKind::Float,
        ScalarKind::Double,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ScalarKind::Bool => "bool",
            ScalarKind::Int => "int",
            ScalarKind::Uint => "uint",
            ScalarKind::Half => "half",
            ScalarKind::Float => "float",
            ScalarKind::Double => "double",
        }
    }

    fn is_numeric(&self) -> bool {
        !matches!(self, ScalarKind::Bool)
    }

    /// Integer-only scalar kinds, the operand family bitwise `&`/`|`/`^`
    /// and shift `<<`/`>>` restrict to (no `half`/`float`/`double`).
    fn is_integer(&self) -> bool {
        matches!(self, ScalarKind::Int | ScalarKind::Uint)
    }
}

fn vector_name(scalar: ScalarKind, dim: u8) -> String {
    if dim == 1 {
        scalar.name().to_string()
    } else {
        format!("{}{}", scalar.name(), dim)
    }
}

fn matrix_name(scalar: ScalarKind, rows: u8, cols: u8) -> String {
    format!("{}{}x{}", scalar.name(), rows, cols)
}

fn insert_primitive(table: &mut SymbolTable, root: SymbolHandle, fqn: &str) -> SymbolHandle {
    table
        .insert(
            root,
            fqn,
            SymbolMetadata {
                kind: SymbolKind::Primitive,
                access: AccessModifier::Public,
                declaration: None,
                type_handle: None,
            },
        )
        .expect("primitive table names are unique by construction")
}

/// Registers `void` plus every scalar/vector/matrix primitive and builds
/// the grid of binary/unary operator overload signatures eagerly.
fn populate_core(assembly: &mut Assembly) {
    populate_primitives(&mut assembly.table);
    assembly.seal();
}

/// Populates `table`'s root with the full primitive grid. Shared between
/// the process-wide [`core_assembly`] and every per-compilation symbol
/// table: rather than plumb a second table id through every resolver/
/// type-checker lookup to reach a foreign sealed assembly (a
/// `SymbolHandle` is valid only within the table that issued it), each
/// compilation rebuilds the same primitive grid locally so lookups stay
/// single-table. The grid is cheap (a few hundred entries) and purely
/// structural, so the duplication costs nothing semantically.
pub fn populate_primitives(table: &mut SymbolTable) {
    let root = table.root();
    insert_primitive(table, root, "void");

    let mut scalar_handles = Vec::new();
    for &scalar in ScalarKind::ALL.iter() {
        let h = insert_primitive(table, root, scalar.name());
        scalar_handles.push((scalar, h));

        for dim in 2..=4u8 {
            insert_primitive(table, root, &vector_name(scalar, dim));
        }
        if scalar.is_numeric() {
            for rows in 2..=4u8 {
                for cols in 2..=4u8 {
                    insert_primitive(table, root, &matrix_name(scalar, rows, cols));
                }
            }
        }
    }

    populate_operator_grid(table, &scalar_handles);
    populate_logical_grid(table, &scalar_handles);
    populate_unary_grid(table, &scalar_handles);
    populate_conversion_grid(table, &scalar_handles);
    populate_opaque_classes(table);
}

/// Arithmetic and bitwise operators: registered across every numeric
/// scalar pair, result type the wider operand.
const ARITHMETIC_OPS: [BinaryOp; 5] = [BinaryOp::Add, BinaryOp::Sub, BinaryOp::Mul, BinaryOp::Div, BinaryOp::Mod];

/// Bitwise/shift operators: restricted to integer operand pairs (`int`,
/// `uint`), result type the wider operand.
const BITWISE_OPS: [BinaryOp; 5] = [BinaryOp::BitAnd, BinaryOp::BitOr, BinaryOp::BitXor, BinaryOp::Shl, BinaryOp::Shr];

/// Comparison operators: registered across every numeric scalar pair,
/// result always `bool`.
const COMPARISON_OPS: [BinaryOp; 6] =
    [BinaryOp::Eq, BinaryOp::Ne, BinaryOp::Lt, BinaryOp::Le, BinaryOp::Gt, BinaryOp::Ge];

/// For every scalar pair `(A, B)` registers `operator<op_token>(A,B)` under
/// the primitive table root, result type resolved by the wider of the two
/// (bool is never an operand of arithmetic/bitwise/comparison operators —
/// see [`populate_logical_grid`] for `&&`/`||`). Comparison operators
/// yield `bool`; arithmetic and bitwise operators yield the wider
/// operand's type, matching the implicit-widening rule used for binary
/// overload resolution. Bitwise/shift operators are further restricted
/// to integer operand pairs.
fn populate_operator_grid(table: &mut SymbolTable, scalars: &[(ScalarKind, SymbolHandle)]) {
    let root = table.root();
    let bool_handle = table.find_node_part("bool", root).expect("bool registered before operator grid");
    for &(lhs, _) in scalars {
        if !lhs.is_numeric() {
            continue;
        }
        for &(rhs, rhs_handle) in scalars {
            if !rhs.is_numeric() {
                continue;
            }
            let wider = if lhs >= rhs { lhs } else { rhs };
            let wider_handle = scalars.iter().find(|(s, _)| *s == wider).map(|(_, h)| *h).unwrap_or(rhs_handle);

            let mut ops: Vec<(BinaryOp, SymbolHandle)> =
                ARITHMETIC_OPS.iter().map(|&op| (op, wider_handle)).collect();
            if lhs.is_integer() && rhs.is_integer() {
                ops.extend(BITWISE_OPS.iter().map(|&op| (op, wider_handle)));
            }
            ops.extend(COMPARISON_OPS.iter().map(|&op| (op, bool_handle)));

            for (op, result_type) in ops {
                let sig = format!("operator{}({},{})", op.op_token(), lhs.name(), rhs.name());
                table
                    .insert(
                        root,
                        &sig,
                        SymbolMetadata {
                            kind: SymbolKind::Operator,
                            access: AccessModifier::Public,
                            declaration: None,
                            type_handle: Some(result_type),
                        },
                    )
                    .expect("operator grid signatures are unique by construction");
            }
        }
    }
}

/// `&&`/`||` over `bool` operands, result `bool`. These are the only
/// logical operators: unlike the arithmetic/bitwise/comparison grid
/// above, `bool` is the operand type here rather than being excluded.
fn populate_logical_grid(table: &mut SymbolTable, scalars: &[(ScalarKind, SymbolHandle)]) {
    let root = table.root();
    let bool_handle = scalars
        .iter()
        .find(|(s, _)| *s == ScalarKind::Bool)
        .map(|(_, h)| *h)
        .expect("bool registered before logical operator grid");
    for op in [BinaryOp::LogicalAnd, BinaryOp::LogicalOr] {
        let sig = format!("operator{}(bool,bool)", op.op_token());
        table
            .insert(
                root,
                &sig,
                SymbolMetadata {
                    kind: SymbolKind::Operator,
                    access: AccessModifier::Public,
                    declaration: None,
                    type_handle: Some(bool_handle),
                },
            )
            .expect("logical operator signatures are unique by construction");
    }
}

/// Unary operators: `-`/`++`/`--` over every numeric scalar (result same
/// type), `~` over integer scalars only, `!` over `bool` only.
fn populate_unary_grid(table: &mut SymbolTable, scalars: &[(ScalarKind, SymbolHandle)]) {
    let root = table.root();
    for &(scalar, handle) in scalars {
        if scalar.is_numeric() {
            for token in ["-", "++", "--"] {
                let sig = format!("operator{}({})", token, scalar.name());
                table
                    .insert(
                        root,
                        &sig,
                        SymbolMetadata { kind: SymbolKind::Operator, access: AccessModifier::Public, declaration: None, type_handle: Some(handle) },
                    )
                    .expect("unary operator signatures are unique by construction");
            }
            if scalar.is_integer() {
                let sig = format!("operator~({})", scalar.name());
                table
                    .insert(
                        root,
                        &sig,
                        SymbolMetadata { kind: SymbolKind::Operator, access: AccessModifier::Public, declaration: None, type_handle: Some(handle) },
                    )
                    .expect("unary operator signatures are unique by construction");
            }
        } else {
            let sig = format!("operator!({})", scalar.name());
            table
                .insert(
                    root,
                    &sig,
                    SymbolMetadata { kind: SymbolKind::Operator, access: AccessModifier::Public, declaration: None, type_handle: Some(handle) },
                )
                .expect("unary operator signatures are unique by construction");
        }
    }
}

/// For every ordered scalar pair `A != B` registers two lookup edges
/// under `A`'s own symbol node:
/// - `implicit->B`, present only when `A < B` (widening only), modeling
///   `A`'s implicit `operator A->B(A) : B`.
/// - `cast#B(A)`, present for any pair, used by explicit `(B)a` casts,
///   looked up as `<cast>#<target_fqn>(source_fqn)` on the source type.
fn populate_conversion_grid(table: &mut SymbolTable, scalars: &[(ScalarKind, SymbolHandle)]) {
    for &(from, from_handle) in scalars {
        for &(to, to_handle) in scalars {
            if from == to {
                continue;
            }
            if from < to {
                let sig = format!("implicit->{}", to.name());
                table
                    .insert(
                        from_handle,
                        &sig,
                        SymbolMetadata { kind: SymbolKind::Operator, access: AccessModifier::Public, declaration: None, type_handle: Some(to_handle) },
                    )
                    .expect("implicit conversion edges are unique per (from,to) pair");
            }
            let cast_sig = format!("cast#{}({})", to.name(), from.name());
            table
                .insert(
                    from_handle,
                    &cast_sig,
                    SymbolMetadata { kind: SymbolKind::Operator, access: AccessModifier::Public, declaration: None, type_handle: Some(to_handle) },
                )
                .expect("cast edges are unique per (from,to) pair");
        }
    }
}

/// `SamplerState` and `Texture2D` with its `Sample(SamplerState, float2) :
/// float4` method.
fn populate_opaque_classes(table: &mut SymbolTable) {
    let root = table.root();
    table
        .insert(
            root,
            "SamplerState",
            SymbolMetadata {
                kind: SymbolKind::Class,
                access: AccessModifier::Public,
                declaration: None,
                type_handle: None,
            },
        )
        .expect("SamplerState is unique");
    let texture = table
        .insert(
            root,
            "Texture2D",
            SymbolMetadata {
                kind: SymbolKind::Class,
                access: AccessModifier::Public,
                declaration: None,
                type_handle: None,
            },
        )
        .expect("Texture2D is unique");
    let float4 = table.find_node_part("float4", root);
    table
        .insert(
            texture,
            "Sample(SamplerState,float2)",
            SymbolMetadata {
                kind: SymbolKind::Function,
                access: AccessModifier::Public,
                declaration: None,
                type_handle: float4,
            },
        )
        .expect("Sample overload is unique");
}

static CORE: OnceLock<Assembly> = OnceLock::new();

/// The process-wide `HXSL.Core` primitive assembly, built exactly once
/// via the double-checked `OnceLock` idiom and immutable thereafter.
pub fn core_assembly() -> &'static Assembly {
    CORE.get_or_init(|| {
        let mut assembly = Assembly::new(0, "HXSL.Core");
        populate_core(&mut assembly);
        assembly
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_assembly_is_sealed_and_idempotent() {
        let a = core_assembly();
        let b = core_assembly();
        assert!(a.is_sealed());
        assert!(std::ptr::eq(a, b));
    }

    #[test]
    fn scalar_and_vector_primitives_are_registered() {
        let core = core_assembly();
        let root = core.table.root();
        assert!(core.table.find_node_part("float", root).is_some());
        assert!(core.table.find_node_part("float4", root).is_some());
        assert!(core.table.find_node_part("int3x3", root).is_some());
        assert!(core.table.find_node_part("bool3x3", root).is_none());
    }

    #[test]
    fn operator_overload_signature_is_registered() {
        let core = core_assembly();
        let root = core.table.root();
        assert!(core.table.find_node_part("operator+(float,int)", root).is_some());
    }

    #[test]
    fn comparison_operators_beyond_lt_are_registered() {
        let core = core_assembly();
        let root = core.table.root();
        for token in ["<=", ">", ">="] {
            let sig = format!("operator{token}(int,int)");
            assert!(core.table.find_node_part(&sig, root).is_some(), "missing {sig}");
        }
    }

    #[test]
    fn bitwise_and_shift_operators_are_registered_for_integers_only() {
        let core = core_assembly();
        let root = core.table.root();
        for token in ["&", "|", "^", "<<", ">>"] {
            assert!(core.table.find_node_part(&format!("operator{token}(int,int)"), root).is_some());
            assert!(core.table.find_node_part(&format!("operator{token}(float,float)"), root).is_none());
        }
    }

    #[test]
    fn logical_operators_exist_for_bool_operands() {
        let core = core_assembly();
        let root = core.table.root();
        assert!(core.table.find_node_part("operator&&(bool,bool)", root).is_some());
        assert!(core.table.find_node_part("operator||(bool,bool)", root).is_some());
    }

    #[test]
    fn unary_operators_are_registered_by_operand_family() {
        let core = core_assembly();
        let root = core.table.root();
        assert!(core.table.find_node_part("operator-(int)", root).is_some());
        assert!(core.table.find_node_part("operator~(int)", root).is_some());
        assert!(core.table.find_node_part("operator~(float)", root).is_none());
        assert!(core.table.find_node_part("operator!(bool)", root).is_some());
        assert!(core.table.find_node_part("operator++(float)", root).is_some());
    }

    #[test]
    fn texture_sample_method_is_registered() {
        let core = core_assembly();
        let root = core.table.root();
        let texture = core.table.find_node_part("Texture2D", root).unwrap();
        assert!(core.table.find_node_part("Sample(SamplerState,float2)", texture).is_some());
    }
}
