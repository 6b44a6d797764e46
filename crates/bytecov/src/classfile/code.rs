//! Method bodies: the `Code` attribute and its instruction stream.
//!
//! Instructions keep the absolute offset they were decoded at and carry
//! absolute branch targets. Rewriting a method means assigning new offsets
//! and mapping targets; the encoder derives relative deltas and switch
//! padding from those offsets.

use super::constpool::ConstantPool;
use super::model::RawAttribute;
use super::opcodes::{self, OperandLayout};
use super::reader::ByteReader;
use super::stackmap::{self, StackMapFrame};
use super::writer::ClassfileWrite;
use crate::result::{BytecovError, BytecovResult, DecodeError, DecodeResult};
use std::collections::BTreeSet;

/// Largest legal `code_length`
pub const MAX_CODE_LENGTH: u32 = 65_535;

/// Cases of a `tableswitch` or `lookupswitch`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchCases {
    /// Dense range starting at `low`
    Table { low: i32, targets: Vec<u32> },
    /// Sorted `(match, target)` pairs
    Lookup(Vec<(i32, u32)>),
}

/// Instruction categories the engine distinguishes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    /// Anything without control-flow effect. A `wide` form keeps `WIDE` as
    /// its opcode and the modified opcode as the first operand byte.
    Plain { opcode: u8, operands: Vec<u8> },
    /// `invoke*`; `count` is only meaningful for `invokeinterface`
    Invoke { opcode: u8, index: u16, count: u8 },
    /// Conditional branch, `goto`, `jsr` and their wide forms
    Branch { opcode: u8, target: u32 },
    Switch {
        opcode: u8,
        default: u32,
        cases: SwitchCases,
    },
    /// `ireturn` .. `return`
    Return { opcode: u8 },
    Throw,
    /// `ret`, possibly `wide`
    Ret { index: u16, wide: bool },
}

/// An instruction at its code offset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub offset: u32,
    pub op: Op,
}

/// Padding between a switch opcode at `offset` and its 4-byte aligned operands
#[must_use]
pub const fn switch_padding(offset: u32) -> u32 {
    (4 - (offset + 1) % 4) % 4
}

impl Op {
    /// Primary opcode byte
    #[must_use]
    pub const fn opcode(&self) -> u8 {
        match self {
            Self::Plain { opcode, .. }
            | Self::Invoke { opcode, .. }
            | Self::Branch { opcode, .. }
            | Self::Switch { opcode, .. }
            | Self::Return { opcode } => *opcode,
            Self::Throw => opcodes::ATHROW,
            Self::Ret { wide: true, .. } => opcodes::WIDE,
            Self::Ret { wide: false, .. } => opcodes::RET,
        }
    }

    /// Encoded size when placed at `offset`
    #[must_use]
    pub fn encoded_len(&self, offset: u32) -> u32 {
        match self {
            Self::Plain { operands, .. } => 1 + operands.len() as u32,
            Self::Invoke { opcode, .. } => match *opcode {
                opcodes::INVOKEINTERFACE | opcodes::INVOKEDYNAMIC => 5,
                _ => 3,
            },
            Self::Branch { opcode, .. } => match *opcode {
                opcodes::GOTO_W | opcodes::JSR_W => 5,
                _ => 3,
            },
            Self::Switch { cases, .. } => {
                let body = match cases {
                    SwitchCases::Table { targets, .. } => 12 + 4 * targets.len() as u32,
                    SwitchCases::Lookup(pairs) => 8 + 8 * pairs.len() as u32,
                };
                1 + switch_padding(offset) + body
            }
            Self::Return { .. } | Self::Throw => 1,
            Self::Ret { wide, .. } => {
                if *wide {
                    4
                } else {
                    2
                }
            }
        }
    }

    /// Every jump target, default first for switches
    #[must_use]
    pub fn targets(&self) -> Vec<u32> {
        match self {
            Self::Branch { target, .. } => vec![*target],
            Self::Switch { default, cases, .. } => {
                let mut out = vec![*default];
                match cases {
                    SwitchCases::Table { targets, .. } => out.extend(targets.iter().copied()),
                    SwitchCases::Lookup(pairs) => out.extend(pairs.iter().map(|(_, t)| *t)),
                }
                out
            }
            _ => Vec::new(),
        }
    }

    /// Rewrite every jump target through `f`
    pub fn map_targets(&mut self, mut f: impl FnMut(u32) -> u32) {
        match self {
            Self::Branch { target, .. } => *target = f(*target),
            Self::Switch { default, cases, .. } => {
                *default = f(*default);
                match cases {
                    SwitchCases::Table { targets, .. } => {
                        for target in targets {
                            *target = f(*target);
                        }
                    }
                    SwitchCases::Lookup(pairs) => {
                        for (_, target) in pairs {
                            *target = f(*target);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    /// Whether the instruction terminates a basic block
    #[must_use]
    pub const fn ends_block(&self) -> bool {
        !matches!(self, Self::Plain { .. } | Self::Invoke { .. })
    }

    /// Whether control can continue to the next instruction
    #[must_use]
    pub const fn falls_through(&self) -> bool {
        match self {
            Self::Plain { .. } | Self::Invoke { .. } => true,
            Self::Branch { opcode, .. } => !matches!(*opcode, opcodes::GOTO | opcodes::GOTO_W),
            Self::Switch { .. } | Self::Return { .. } | Self::Throw | Self::Ret { .. } => false,
        }
    }
}

impl Instruction {
    /// Offset one past this instruction
    #[must_use]
    pub fn end(&self) -> u32 {
        self.offset + self.op.encoded_len(self.offset)
    }

    /// Assembler mnemonic
    #[must_use]
    pub fn mnemonic(&self) -> &'static str {
        match &self.op {
            Op::Plain { opcode: opcodes::WIDE, operands } => {
                operands.first().map_or("wide", |m| opcodes::mnemonic(*m))
            }
            Op::Ret { .. } => "ret",
            op => opcodes::mnemonic(op.opcode()),
        }
    }
}

/// One `exception_table` entry; `end` is exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionHandler {
    pub start: u32,
    pub end: u32,
    pub handler: u32,
    /// Class index of the caught type, 0 for `finally`
    pub catch_type: u16,
}

impl ExceptionHandler {
    /// Whether `offset` is inside the protected range
    #[must_use]
    pub const fn covers(&self, offset: u32) -> bool {
        self.start <= offset && offset < self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineNumber {
    pub start: u32,
    pub line: u16,
}

/// Entry of a `LocalVariableTable` or `LocalVariableTypeTable`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalVariable {
    pub start: u32,
    pub length: u32,
    pub name_index: u16,
    /// Descriptor or signature index, depending on the table
    pub descriptor_index: u16,
    pub index: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalVariableKind {
    Table,
    TypeTable,
}

/// Attributes nested in `Code`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeAttribute {
    LineNumbers {
        name_index: u16,
        entries: Vec<LineNumber>,
    },
    LocalVariables {
        name_index: u16,
        kind: LocalVariableKind,
        entries: Vec<LocalVariable>,
    },
    StackMap {
        name_index: u16,
        frames: Vec<StackMapFrame>,
    },
    Other(RawAttribute),
}

/// Decoded `Code` attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeModel {
    pub max_stack: u16,
    pub max_locals: u16,
    pub instructions: Vec<Instruction>,
    pub handlers: Vec<ExceptionHandler>,
    pub attributes: Vec<CodeAttribute>,
}

impl CodeModel {
    /// Length of the instruction stream in bytes
    #[must_use]
    pub fn code_length(&self) -> u32 {
        self.instructions.last().map_or(0, Instruction::end)
    }

    /// Index of the instruction starting at `offset`
    #[must_use]
    pub fn index_of(&self, offset: u32) -> Option<usize> {
        self.instructions
            .binary_search_by_key(&offset, |insn| insn.offset)
            .ok()
    }

    /// Source line of the instruction at `offset`, from the line tables
    #[must_use]
    pub fn line_at(&self, offset: u32) -> Option<u16> {
        self.line_numbers()
            .filter(|entry| entry.start <= offset)
            .max_by_key(|entry| entry.start)
            .map(|entry| entry.line)
    }

    /// Every line table entry, across all `LineNumberTable` attributes
    pub fn line_numbers(&self) -> impl Iterator<Item = &LineNumber> {
        self.attributes.iter().flat_map(|attr| match attr {
            CodeAttribute::LineNumbers { entries, .. } => entries.as_slice(),
            _ => &[][..],
        })
    }

    /// Names of raw code attributes the engine does not understand
    pub fn opaque_attributes<'a>(&'a self, pool: &'a ConstantPool) -> impl Iterator<Item = String> + 'a {
        self.attributes.iter().filter_map(move |attr| match attr {
            CodeAttribute::Other(raw) => Some(raw.name(pool)),
            _ => None,
        })
    }
}

fn malformed_code(reason: String) -> DecodeError {
    DecodeError::MalformedAttribute {
        name: "Code".to_string(),
        reason,
    }
}

fn resolve_target(offset: u32, delta: i64, code_length: u32) -> DecodeResult<u32> {
    let target = i64::from(offset) + delta;
    if target < 0 || target >= i64::from(code_length) {
        return Err(DecodeError::InvalidTarget { offset, target });
    }
    Ok(target as u32)
}

fn decode_op(reader: &mut ByteReader<'_>, offset: u32, code_length: u32) -> DecodeResult<Op> {
    let opcode = reader.u8()?;
    let layout = opcodes::operand_layout(opcode).ok_or(DecodeError::UnknownOpcode { opcode, offset })?;
    let op = match layout {
        OperandLayout::Fixed(len) => match opcode {
            opcodes::INVOKEVIRTUAL | opcodes::INVOKESPECIAL | opcodes::INVOKESTATIC => Op::Invoke {
                opcode,
                index: reader.u16()?,
                count: 0,
            },
            opcodes::INVOKEINTERFACE | opcodes::INVOKEDYNAMIC => {
                let index = reader.u16()?;
                let count = reader.u8()?;
                if reader.u8()? != 0 || (opcode == opcodes::INVOKEDYNAMIC && count != 0) {
                    return Err(malformed_code(format!("non-zero reserved bytes at {offset}")));
                }
                Op::Invoke { opcode, index, count }
            }
            opcodes::IRETURN..=opcodes::RETURN => Op::Return { opcode },
            opcodes::ATHROW => Op::Throw,
            opcodes::RET => Op::Ret {
                index: u16::from(reader.u8()?),
                wide: false,
            },
            _ => Op::Plain {
                opcode,
                operands: reader.take(len)?.to_vec(),
            },
        },
        OperandLayout::Branch16 => {
            let delta = i64::from(reader.i16()?);
            Op::Branch {
                opcode,
                target: resolve_target(offset, delta, code_length)?,
            }
        }
        OperandLayout::Branch32 => {
            let delta = i64::from(reader.i32()?);
            Op::Branch {
                opcode,
                target: resolve_target(offset, delta, code_length)?,
            }
        }
        OperandLayout::Switch => {
            reader.skip(switch_padding(offset) as usize)?;
            let default = resolve_target(offset, i64::from(reader.i32()?), code_length)?;
            let cases = if opcode == opcodes::TABLESWITCH {
                let low = reader.i32()?;
                let high = reader.i32()?;
                if high < low {
                    return Err(malformed_code(format!("tableswitch at {offset} has high < low")));
                }
                let count = (i64::from(high) - i64::from(low) + 1) as usize;
                if count * 4 > reader.remaining() {
                    return Err(DecodeError::UnexpectedEof {
                        offset: reader.position(),
                        needed: count * 4,
                    });
                }
                let targets = (0..count)
                    .map(|_| resolve_target(offset, i64::from(reader.i32()?), code_length))
                    .collect::<DecodeResult<Vec<_>>>()?;
                SwitchCases::Table { low, targets }
            } else {
                let npairs = reader.i32()?;
                let count = usize::try_from(npairs)
                    .map_err(|_| malformed_code(format!("lookupswitch at {offset} has {npairs} pairs")))?;
                if count * 8 > reader.remaining() {
                    return Err(DecodeError::UnexpectedEof {
                        offset: reader.position(),
                        needed: count * 8,
                    });
                }
                let pairs = (0..count)
                    .map(|_| {
                        let key = reader.i32()?;
                        let target = resolve_target(offset, i64::from(reader.i32()?), code_length)?;
                        Ok((key, target))
                    })
                    .collect::<DecodeResult<Vec<_>>>()?;
                SwitchCases::Lookup(pairs)
            };
            Op::Switch {
                opcode,
                default,
                cases,
            }
        }
        OperandLayout::Wide => {
            let modified = reader.u8()?;
            match modified {
                opcodes::RET => Op::Ret {
                    index: reader.u16()?,
                    wide: true,
                },
                opcodes::IINC => {
                    let mut operands = vec![modified];
                    operands.extend_from_slice(reader.take(4)?);
                    Op::Plain { opcode, operands }
                }
                m if opcodes::is_widenable(m) => {
                    let mut operands = vec![modified];
                    operands.extend_from_slice(reader.take(2)?);
                    Op::Plain { opcode, operands }
                }
                m => {
                    return Err(DecodeError::UnknownOpcode {
                        opcode: m,
                        offset: offset + 1,
                    })
                }
            }
        }
    };
    Ok(op)
}

/// Decode a code array; every target must land on an instruction boundary
pub(crate) fn decode_instructions(code: &[u8]) -> DecodeResult<Vec<Instruction>> {
    let code_length = u32::try_from(code.len()).unwrap_or(u32::MAX);
    if code_length == 0 || code_length > MAX_CODE_LENGTH {
        return Err(DecodeError::InvalidCodeLength(code_length));
    }
    let mut reader = ByteReader::new(code);
    let mut instructions = Vec::new();
    while reader.remaining() > 0 {
        let offset = reader.position() as u32;
        let op = decode_op(&mut reader, offset, code_length)?;
        instructions.push(Instruction { offset, op });
    }
    let boundaries: BTreeSet<u32> = instructions.iter().map(|insn| insn.offset).collect();
    for insn in &instructions {
        if let Some(target) = insn.op.targets().into_iter().find(|t| !boundaries.contains(t)) {
            return Err(DecodeError::InvalidTarget {
                offset: insn.offset,
                target: i64::from(target),
            });
        }
    }
    Ok(instructions)
}

fn branch_delta(insn: &Instruction, target: u32) -> i64 {
    i64::from(target) - i64::from(insn.offset)
}

fn put_branch32(out: &mut Vec<u8>, insn: &Instruction, target: u32) -> BytecovResult<()> {
    let delta = i32::try_from(branch_delta(insn, target)).map_err(|_| {
        BytecovError::encode(format!("branch at {} to {target} exceeds i32", insn.offset))
    })?;
    out.put_i32(delta);
    Ok(())
}

/// Encode instructions, checking each is emitted at its recorded offset
pub(crate) fn encode_instructions(instructions: &[Instruction], out: &mut Vec<u8>) -> BytecovResult<()> {
    let base = out.len();
    for insn in instructions {
        let at = (out.len() - base) as u32;
        if at != insn.offset {
            return Err(BytecovError::encode(format!(
                "instruction recorded at {} emitted at {at}",
                insn.offset
            )));
        }
        match &insn.op {
            Op::Plain { opcode, operands } => {
                out.put_u8(*opcode);
                out.put_bytes(operands);
            }
            Op::Invoke { opcode, index, count } => {
                out.put_u8(*opcode);
                out.put_u16(*index);
                if matches!(*opcode, opcodes::INVOKEINTERFACE | opcodes::INVOKEDYNAMIC) {
                    out.put_u8(*count);
                    out.put_u8(0);
                }
            }
            Op::Branch { opcode, target } => {
                out.put_u8(*opcode);
                if matches!(*opcode, opcodes::GOTO_W | opcodes::JSR_W) {
                    put_branch32(out, insn, *target)?;
                } else {
                    let delta = i16::try_from(branch_delta(insn, *target)).map_err(|_| {
                        BytecovError::encode(format!(
                            "{} at {} cannot reach {target}",
                            opcodes::mnemonic(*opcode),
                            insn.offset
                        ))
                    })?;
                    out.put_i16(delta);
                }
            }
            Op::Switch {
                opcode,
                default,
                cases,
            } => {
                out.put_u8(*opcode);
                for _ in 0..switch_padding(insn.offset) {
                    out.put_u8(0);
                }
                put_branch32(out, insn, *default)?;
                match cases {
                    SwitchCases::Table { low, targets } => {
                        out.put_i32(*low);
                        out.put_i32(low.wrapping_add(targets.len() as i32 - 1));
                        for target in targets {
                            put_branch32(out, insn, *target)?;
                        }
                    }
                    SwitchCases::Lookup(pairs) => {
                        out.put_i32(pairs.len() as i32);
                        for (key, target) in pairs {
                            out.put_i32(*key);
                            put_branch32(out, insn, *target)?;
                        }
                    }
                }
            }
            Op::Return { opcode } => out.put_u8(*opcode),
            Op::Throw => out.put_u8(opcodes::ATHROW),
            Op::Ret { index, wide: true } => {
                out.put_u8(opcodes::WIDE);
                out.put_u8(opcodes::RET);
                out.put_u16(*index);
            }
            Op::Ret { index, wide: false } => {
                out.put_u8(opcodes::RET);
                out.put_u8(u8::try_from(*index).map_err(|_| {
                    BytecovError::encode(format!("ret index {index} needs wide at {}", insn.offset))
                })?);
            }
        }
    }
    let length = out.len() - base;
    if length == 0 || length > MAX_CODE_LENGTH as usize {
        return Err(BytecovError::capacity("code length", length, MAX_CODE_LENGTH as usize));
    }
    Ok(())
}

struct Boundaries<'a> {
    code: &'a [Instruction],
    length: u32,
}

impl Boundaries<'_> {
    fn is_start(&self, offset: u32) -> bool {
        self.code
            .binary_search_by_key(&offset, |insn| insn.offset)
            .is_ok()
    }

    fn is_end(&self, offset: u32) -> bool {
        offset == self.length || self.is_start(offset)
    }
}

fn decode_code_attribute(
    name: &[u8],
    name_index: u16,
    payload: &[u8],
    bounds: &Boundaries<'_>,
) -> DecodeResult<CodeAttribute> {
    let malformed = |reason: String| DecodeError::MalformedAttribute {
        name: String::from_utf8_lossy(name).into_owned(),
        reason,
    };
    let attribute = match name {
        b"LineNumberTable" => {
            let mut reader = ByteReader::new(payload);
            let count = reader.u16()?;
            let mut entries = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let start = u32::from(reader.u16()?);
                let line = reader.u16()?;
                if !bounds.is_start(start) {
                    return Err(malformed(format!("line entry at non-boundary {start}")));
                }
                entries.push(LineNumber { start, line });
            }
            reader.finish()?;
            CodeAttribute::LineNumbers { name_index, entries }
        }
        b"LocalVariableTable" | b"LocalVariableTypeTable" => {
            let kind = if name == b"LocalVariableTable" {
                LocalVariableKind::Table
            } else {
                LocalVariableKind::TypeTable
            };
            let mut reader = ByteReader::new(payload);
            let count = reader.u16()?;
            let mut entries = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let entry = LocalVariable {
                    start: u32::from(reader.u16()?),
                    length: u32::from(reader.u16()?),
                    name_index: reader.u16()?,
                    descriptor_index: reader.u16()?,
                    index: reader.u16()?,
                };
                if !bounds.is_start(entry.start) || !bounds.is_end(entry.start + entry.length) {
                    return Err(malformed(format!(
                        "variable range {}..{} not on boundaries",
                        entry.start,
                        entry.start + entry.length
                    )));
                }
                entries.push(entry);
            }
            reader.finish()?;
            CodeAttribute::LocalVariables {
                name_index,
                kind,
                entries,
            }
        }
        b"StackMapTable" => {
            let frames = stackmap::read_frames(payload)?;
            if let Some(frame) = frames.iter().find(|f| !bounds.is_start(f.offset)) {
                return Err(malformed(format!("frame at non-boundary {}", frame.offset)));
            }
            CodeAttribute::StackMap { name_index, frames }
        }
        _ => CodeAttribute::Other(RawAttribute {
            name_index,
            info: payload.to_vec(),
        }),
    };
    Ok(attribute)
}

/// Decode the payload of a `Code` attribute
pub(crate) fn decode_code(payload: &[u8], pool: &ConstantPool) -> DecodeResult<CodeModel> {
    let mut reader = ByteReader::new(payload);
    let max_stack = reader.u16()?;
    let max_locals = reader.u16()?;
    let code_length = reader.u32()?;
    if code_length == 0 || code_length > MAX_CODE_LENGTH {
        return Err(DecodeError::InvalidCodeLength(code_length));
    }
    let instructions = decode_instructions(reader.take(code_length as usize)?)?;
    let bounds = Boundaries {
        code: &instructions,
        length: code_length,
    };

    let handler_count = reader.u16()?;
    let mut handlers = Vec::with_capacity(handler_count as usize);
    for _ in 0..handler_count {
        let handler = ExceptionHandler {
            start: u32::from(reader.u16()?),
            end: u32::from(reader.u16()?),
            handler: u32::from(reader.u16()?),
            catch_type: reader.u16()?,
        };
        if handler.start >= handler.end
            || !bounds.is_start(handler.start)
            || !bounds.is_end(handler.end)
            || !bounds.is_start(handler.handler)
        {
            return Err(malformed_code(format!(
                "exception range {}..{} -> {} not on boundaries",
                handler.start, handler.end, handler.handler
            )));
        }
        handlers.push(handler);
    }

    let attribute_count = reader.u16()?;
    let mut attributes = Vec::with_capacity(attribute_count as usize);
    for _ in 0..attribute_count {
        let name_index = reader.u16()?;
        let length = reader.u32()? as usize;
        let body = reader.take(length)?;
        let name = pool.utf8_bytes(name_index)?;
        attributes.push(decode_code_attribute(name, name_index, body, &bounds)?);
    }
    reader.finish()?;

    Ok(CodeModel {
        max_stack,
        max_locals,
        instructions,
        handlers,
        attributes,
    })
}

fn narrow(value: u32, what: &str) -> BytecovResult<u16> {
    u16::try_from(value).map_err(|_| BytecovError::encode(format!("{what} {value} exceeds u16")))
}

/// Encode the payload of a `Code` attribute
pub(crate) fn encode_code(code: &CodeModel, out: &mut Vec<u8>) -> BytecovResult<()> {
    out.put_u16(code.max_stack);
    out.put_u16(code.max_locals);
    let length_at = out.len();
    out.put_u32(0);
    encode_instructions(&code.instructions, out)?;
    let length = (out.len() - length_at - 4) as u32;
    out[length_at..length_at + 4].copy_from_slice(&length.to_be_bytes());

    out.put_u16(code.handlers.len() as u16);
    for handler in &code.handlers {
        out.put_u16(narrow(handler.start, "handler start")?);
        out.put_u16(narrow(handler.end, "handler end")?);
        out.put_u16(narrow(handler.handler, "handler pc")?);
        out.put_u16(handler.catch_type);
    }

    out.put_u16(code.attributes.len() as u16);
    for attribute in &code.attributes {
        let mut body = Vec::new();
        let name_index = match attribute {
            CodeAttribute::LineNumbers { name_index, entries } => {
                body.put_u16(entries.len() as u16);
                for entry in entries {
                    body.put_u16(narrow(entry.start, "line start")?);
                    body.put_u16(entry.line);
                }
                *name_index
            }
            CodeAttribute::LocalVariables {
                name_index, entries, ..
            } => {
                body.put_u16(entries.len() as u16);
                for entry in entries {
                    body.put_u16(narrow(entry.start, "variable start")?);
                    body.put_u16(narrow(entry.length, "variable length")?);
                    body.put_u16(entry.name_index);
                    body.put_u16(entry.descriptor_index);
                    body.put_u16(entry.index);
                }
                *name_index
            }
            CodeAttribute::StackMap { name_index, frames } => {
                stackmap::write_frames(frames, &mut body)?;
                *name_index
            }
            CodeAttribute::Other(raw) => {
                body.put_bytes(&raw.info);
                raw.name_index
            }
        };
        out.put_attribute(name_index, |payload| payload.put_bytes(&body));
    }
    Ok(())
}
