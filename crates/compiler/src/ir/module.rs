//! The IR module: IL functions plus the IL metadata tables, and the
//! little-endian wire serialization format.

use super::cfg::{Cfg, ControlFlowType};
use super::instr::{pack_operand_kinds, Instruction, OpCode};
use super::value::{FieldRef, Operand, OperandKind, VarId};
use hxsl_core::{BinOp, ByteStream, Number, TextSpan};
use std::io;

/// A variable's type-layout metadata: the minimum a backend needs to lay
/// out storage without re-deriving it from the symbol table — a byte size
/// and component count (1 for scalars, 2-4 for vectors, 0 for opaque/class
/// types).
#[derive(Debug, Clone)]
pub struct ILTypeMetadata {
    pub name: String,
    pub byte_size: u32,
    pub components: u8,
}

bitflags::bitflags! {
    /// Per-variable flags the lowering/optimizer passes actually need.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct VarFlags: u32 {
        const PARAMETER = 1 << 0;
        const TEMPORARY = 1 << 1;
        const RETURN_SLOT = 1 << 2;
    }
}

#[derive(Debug, Clone)]
pub struct ILVariable {
    pub id: VarId,
    pub type_id: u32,
    pub flags: VarFlags,
}

/// Callee layout recorded once per distinct call site signature so the
/// `Call` opcode's `Func` operand can index it instead of re-encoding the
/// callee's full signature at every call.
#[derive(Debug, Clone)]
pub struct FunctionCallMetadata {
    pub name: String,
    pub arg_types: Vec<u32>,
    pub return_type: u32,
}

#[derive(Debug, Clone)]
pub struct ILFunction {
    pub name: String,
    pub cfg: Cfg,
    pub return_type: u32,
    pub param_vars: Vec<VarId>,
    /// The merge of every lowered instruction's source span, one entry
    /// per block in `cfg.blocks` (parallel, same indexing). `None` for a
    /// block the builder never emitted anything into. This is the
    /// side table the control-flow analyzer consults to report an
    /// unreachable block's location; tracked per-block rather than
    /// per-instruction since that's the only granularity the analyzer
    /// needs, and it survives the optimizer's block truncation untouched
    /// (a stale span on a block whose tail was cut is still a span
    /// somewhere inside that block).
    pub block_spans: Vec<Option<TextSpan>>,
}

impl ILFunction {
    pub fn new(name: impl Into<String>, return_type: u32) -> Self {
        Self {
            name: name.into(),
            cfg: Cfg::new(),
            return_type,
            param_vars: Vec::new(),
            block_spans: vec![None],
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Module {
    pub types: Vec<ILTypeMetadata>,
    pub variables: Vec<ILVariable>,
    pub temps: Vec<ILVariable>,
    pub calls: Vec<FunctionCallMetadata>,
    pub functions: Vec<ILFunction>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_type(&mut self, meta: ILTypeMetadata) -> u32 {
        self.types.push(meta);
        (self.types.len() - 1) as u32
    }

    pub fn add_call_metadata(&mut self, meta: FunctionCallMetadata) -> u32 {
        self.calls.push(meta);
        (self.calls.len() - 1) as u32
    }

    /// Absorbs `other` into `self`, renumbering every type/call-metadata
    /// index `other` carries so its functions keep pointing at the right
    /// entries once appended after `self`'s own tables. Used to combine
    /// the per-source-file modules a multi-file compilation produces into
    /// the single module the driver writes out.
    pub fn merge(&mut self, other: Module) {
        let type_offset = self.types.len() as u32;
        let call_offset = self.calls.len() as u32;

        self.types.extend(other.types);
        self.calls.extend(other.calls.into_iter().map(|c| FunctionCallMetadata {
            name: c.name,
            arg_types: c.arg_types.into_iter().map(|t| t + type_offset).collect(),
            return_type: c.return_type + type_offset,
        }));
        self.variables.extend(other.variables.into_iter().map(|v| ILVariable { type_id: v.type_id + type_offset, ..v }));
        self.temps.extend(other.temps.into_iter().map(|v| ILVariable { type_id: v.type_id + type_offset, ..v }));

        for mut function in other.functions {
            function.return_type += type_offset;
            for block in &mut function.cfg.blocks {
                for instr in &mut block.instructions {
                    remap_operand(&mut instr.left, type_offset, call_offset);
                    remap_operand(&mut instr.right, type_offset, call_offset);
                    remap_operand(&mut instr.result, type_offset, call_offset);
                }
            }
            self.functions.push(function);
        }
    }

    /// Serializes the module as length-prefixed metadata tables, then one
    /// instruction stream per function with ULEB128 opcodes and packed
    /// operand-kind headers.
    pub fn write_to(&self, stream: &mut impl ByteStream) -> io::Result<()> {
        stream.write_u32_le(self.types.len() as u32)?;
        for t in &self.types {
            write_string(stream, &t.name)?;
            stream.write_u32_le(t.byte_size)?;
            stream.write_u8_le(t.components)?;
        }
        write_var_table(stream, &self.variables)?;
        write_var_table(stream, &self.temps)?;
        stream.write_u32_le(self.calls.len() as u32)?;
        for c in &self.calls {
            write_string(stream, &c.name)?;
            stream.write_u32_le(c.arg_types.len() as u32)?;
            for t in &c.arg_types {
                stream.write_u32_le(*t)?;
            }
            stream.write_u32_le(c.return_type)?;
        }
        stream.write_u32_le(self.functions.len() as u32)?;
        for f in &self.functions {
            write_string(stream, &f.name)?;
            stream.write_u32_le(f.cfg.blocks.len() as u32)?;
            for block in &f.cfg.blocks {
                stream.write_u32_le(block.instructions.len() as u32)?;
                for instr in &block.instructions {
                    write_instruction(stream, instr)?;
                }
            }
        }
        Ok(())
    }
}

/// Shifts the type/call-metadata index carried by a `Type` or `Func`
/// operand by the offsets `Module::merge` is folding a second module's
/// tables in at; every other operand kind carries no table index and is
/// left untouched.
fn remap_operand(operand: &mut Option<Operand>, type_offset: u32, call_offset: u32) {
    match operand {
        Some(Operand::Type(id)) => *id += type_offset,
        Some(Operand::Func(id)) => *id += call_offset,
        _ => {}
    }
}

fn write_var_table(stream: &mut impl ByteStream, vars: &[ILVariable]) -> io::Result<()> {
    stream.write_u32_le(vars.len() as u32)?;
    for v in vars {
        stream.write_u64_le(v.id.to_u64())?;
        stream.write_u32_le(v.type_id)?;
        stream.write_u32_le(v.flags.bits())?;
    }
    Ok(())
}

fn write_string(stream: &mut impl ByteStream, s: &str) -> io::Result<()> {
    stream.write_u32_le(s.len() as u32)?;
    stream.write_all(s.as_bytes())
}

fn opcode_tag(op: &OpCode) -> u64 {
    match op {
        OpCode::Binary(b) => 0x10 + binop_tag(*b),
        OpCode::Move => 0x01,
        OpCode::Negate => 0x02,
        OpCode::LogicalNot => 0x03,
        OpCode::BitNot => 0x04,
        OpCode::Jump => 0x05,
        OpCode::JumpZero => 0x06,
        OpCode::JumpNotZero => 0x07,
        OpCode::Cast => 0x08,
        OpCode::Call => 0x09,
        OpCode::Return => 0x0a,
    }
}

fn binop_tag(b: BinOp) -> u64 {
    match b {
        BinOp::Add => 0,
        BinOp::Sub => 1,
        BinOp::Mul => 2,
        BinOp::Div => 3,
        BinOp::Mod => 4,
        BinOp::BitAnd => 5,
        BinOp::BitOr => 6,
        BinOp::BitXor => 7,
        BinOp::Shl => 8,
        BinOp::Shr => 9,
        BinOp::Eq => 10,
        BinOp::Ne => 11,
        BinOp::Lt => 12,
        BinOp::Le => 13,
        BinOp::Gt => 14,
        BinOp::Ge => 15,
        BinOp::LogicalAnd => 16,
        BinOp::LogicalOr => 17,
    }
}

fn write_instruction(stream: &mut impl ByteStream, instr: &Instruction) -> io::Result<()> {
    stream.write_uleb128(opcode_tag(&instr.opcode))?;
    let kinds = pack_operand_kinds(
        instr.left.map(|o| o.kind() as u8).unwrap_or(OperandKind::None as u8),
        instr.right.map(|o| o.kind() as u8).unwrap_or(OperandKind::None as u8),
        instr.result.map(|o| o.kind() as u8).unwrap_or(OperandKind::None as u8),
    );
    stream.write_u16_le(kinds)?;
    for operand in [instr.left, instr.right, instr.result] {
        if let Some(o) = operand {
            write_operand(stream, o)?;
        }
    }
    Ok(())
}

fn write_operand(stream: &mut impl ByteStream, operand: Operand) -> io::Result<()> {
    match operand {
        Operand::Register(r) | Operand::Label(r) | Operand::Type(r) | Operand::Func(r) => stream.write_u32_le(r),
        Operand::Variable(v) => stream.write_u64_le(v.to_u64()),
        Operand::Field(f) => stream.write_u64_le(f.to_u64()),
        Operand::Immediate(n) => write_immediate(stream, n),
    }
}

fn write_immediate(stream: &mut impl ByteStream, n: Number) -> io::Result<()> {
    match n {
        Number::I8(v) => stream.write_u8_le(v as u8),
        Number::U8(v) => stream.write_u8_le(v),
        Number::I16(v) => stream.write_u16_le(v as u16),
        Number::U16(v) => stream.write_u16_le(v),
        Number::I32(v) => stream.write_u32_le(v as u32),
        Number::U32(v) => stream.write_u32_le(v),
        Number::I64(v) => stream.write_u64_le(v as u64),
        Number::U64(v) => stream.write_u64_le(v),
        Number::Half(v) => stream.write_u32_le(v.to_bits()),
        Number::Float(v) => stream.write_u32_le(v.to_bits()),
        Number::Double(v) => stream.write_u64_le(v.to_bits()),
        Number::Bool(v) => stream.write_u8_le(v as u8),
        Number::Unknown => stream.write_u32_le(0),
    }
}

/// Reconstructs each function's `control_flow` tag from its trailing
/// instruction; used by the lowering builder once a block is sealed.
pub fn finalize_control_flow(cfg: &mut Cfg) {
    for block in &mut cfg.blocks {
        block.control_flow = match block.instructions.last().map(|i| i.opcode) {
            Some(OpCode::Jump) => ControlFlowType::Jump,
            Some(OpCode::JumpZero) | Some(OpCode::JumpNotZero) => ControlFlowType::Conditional,
            Some(OpCode::Return) => ControlFlowType::Return,
            _ => ControlFlowType::Normal,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::value::{Operand, VarId};
    use hxsl_core::MemoryStream;

    #[test]
    fn module_serializes_without_error_and_is_nonempty() {
        let mut module = Module::new();
        let int_ty = module.add_type(ILTypeMetadata { name: "int".into(), byte_size: 4, components: 1 });
        let mut f = ILFunction::new("main", int_ty);
        f.cfg.blocks[0].instructions.push(Instruction::mov(
            Operand::Immediate(Number::I32(1)),
            Operand::Variable(VarId::new(0, 0)),
        ));
        f.cfg.blocks[0].instructions.push(Instruction::ret(Some(Operand::Variable(VarId::new(0, 0)))));
        module.functions.push(f);

        let mut stream = MemoryStream::new_growable();
        module.write_to(&mut stream).unwrap();
        assert!(!stream.get_buffer(false).is_empty());
    }
}
