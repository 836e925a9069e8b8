//! IR: SSA-style operands, instructions, control-flow graphs, and the
//! per-module container the IR builder lowers a type-checked AST into.

mod builder;
mod cfg;
mod instr;
mod module;
mod value;

pub use builder::IrBuilder;
pub use cfg::{BasicBlock, Cfg, ControlFlowType};
pub use instr::{pack_operand_kinds, unpack_operand_kinds, Instruction, OpCode};
pub use module::{finalize_control_flow, FunctionCallMetadata, ILFunction, ILTypeMetadata, ILVariable, Module, VarFlags};
pub use value::{FieldRef, Operand, OperandKind, VarId};
