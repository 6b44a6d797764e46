//! StackMapTable frames (JVMS 4.7.4).
//!
//! Frames are held with absolute code offsets; the delta encoding is
//! recomputed on write, so remapping offsets never has to touch deltas.

use super::reader::ByteReader;
use super::writer::ClassfileWrite;
use crate::result::{BytecovError, BytecovResult, DecodeError, DecodeResult};

const SAME_LOCALS_1_STACK_ITEM: u8 = 64;
const SAME_LOCALS_1_STACK_ITEM_EXTENDED: u8 = 247;
const CHOP: u8 = 248;
const SAME_EXTENDED: u8 = 251;
const FULL: u8 = 255;

/// Verification type info
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationType {
    Top,
    Integer,
    Float,
    Double,
    Long,
    Null,
    UninitializedThis,
    /// Constant pool index of a `Class` entry
    Object(u16),
    /// Code offset of the `new` instruction that created the value
    Uninitialized(u16),
}

impl VerificationType {
    fn read(reader: &mut ByteReader<'_>) -> DecodeResult<Self> {
        Ok(match reader.u8()? {
            0 => Self::Top,
            1 => Self::Integer,
            2 => Self::Float,
            3 => Self::Double,
            4 => Self::Long,
            5 => Self::Null,
            6 => Self::UninitializedThis,
            7 => Self::Object(reader.u16()?),
            8 => Self::Uninitialized(reader.u16()?),
            tag => {
                return Err(malformed(format!("verification type tag {tag}")));
            }
        })
    }

    fn write(&self, out: &mut Vec<u8>) {
        match self {
            Self::Top => out.put_u8(0),
            Self::Integer => out.put_u8(1),
            Self::Float => out.put_u8(2),
            Self::Double => out.put_u8(3),
            Self::Long => out.put_u8(4),
            Self::Null => out.put_u8(5),
            Self::UninitializedThis => out.put_u8(6),
            Self::Object(index) => {
                out.put_u8(7);
                out.put_u16(*index);
            }
            Self::Uninitialized(offset) => {
                out.put_u8(8);
                out.put_u16(*offset);
            }
        }
    }
}

/// Frame shape relative to the previous frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameKind {
    Same,
    SameLocals1StackItem(VerificationType),
    /// Drop the last `k` locals (1..=3)
    Chop(u8),
    /// Append 1..=3 locals
    Append(Vec<VerificationType>),
    Full {
        locals: Vec<VerificationType>,
        stack: Vec<VerificationType>,
    },
}

/// One frame at an absolute code offset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackMapFrame {
    pub offset: u32,
    pub kind: FrameKind,
}

impl StackMapFrame {
    /// Every verification type carried by this frame
    pub fn types_mut(&mut self) -> Vec<&mut VerificationType> {
        match &mut self.kind {
            FrameKind::Same | FrameKind::Chop(_) => Vec::new(),
            FrameKind::SameLocals1StackItem(ty) => vec![ty],
            FrameKind::Append(locals) => locals.iter_mut().collect(),
            FrameKind::Full { locals, stack } => locals.iter_mut().chain(stack.iter_mut()).collect(),
        }
    }
}

fn malformed(reason: String) -> DecodeError {
    DecodeError::MalformedAttribute {
        name: "StackMapTable".to_string(),
        reason,
    }
}

fn read_types(reader: &mut ByteReader<'_>, count: usize) -> DecodeResult<Vec<VerificationType>> {
    (0..count).map(|_| VerificationType::read(reader)).collect()
}

/// Decode a StackMapTable payload into absolute-offset frames
pub(crate) fn read_frames(payload: &[u8]) -> DecodeResult<Vec<StackMapFrame>> {
    let mut reader = ByteReader::new(payload);
    let count = reader.u16()?;
    let mut frames = Vec::with_capacity(count as usize);
    let mut previous: Option<u32> = None;
    for _ in 0..count {
        let frame_type = reader.u8()?;
        let (delta, kind) = match frame_type {
            0..=63 => (u32::from(frame_type), FrameKind::Same),
            64..=127 => (
                u32::from(frame_type - SAME_LOCALS_1_STACK_ITEM),
                FrameKind::SameLocals1StackItem(VerificationType::read(&mut reader)?),
            ),
            SAME_LOCALS_1_STACK_ITEM_EXTENDED => {
                let delta = u32::from(reader.u16()?);
                let ty = VerificationType::read(&mut reader)?;
                (delta, FrameKind::SameLocals1StackItem(ty))
            }
            CHOP..=250 => (u32::from(reader.u16()?), FrameKind::Chop(SAME_EXTENDED - frame_type)),
            SAME_EXTENDED => (u32::from(reader.u16()?), FrameKind::Same),
            252..=254 => {
                let delta = u32::from(reader.u16()?);
                let locals = read_types(&mut reader, (frame_type - SAME_EXTENDED) as usize)?;
                (delta, FrameKind::Append(locals))
            }
            FULL => {
                let delta = u32::from(reader.u16()?);
                let n_locals = reader.u16()? as usize;
                let locals = read_types(&mut reader, n_locals)?;
                let n_stack = reader.u16()? as usize;
                let stack = read_types(&mut reader, n_stack)?;
                (delta, FrameKind::Full { locals, stack })
            }
            reserved => return Err(malformed(format!("reserved frame type {reserved}"))),
        };
        let offset = match previous {
            None => delta,
            Some(prev) => prev + delta + 1,
        };
        previous = Some(offset);
        frames.push(StackMapFrame { offset, kind });
    }
    reader.finish()?;
    Ok(frames)
}

/// Encode frames, choosing the most compact form for each delta
pub(crate) fn write_frames(frames: &[StackMapFrame], out: &mut Vec<u8>) -> BytecovResult<()> {
    out.put_u16(frames.len() as u16);
    let mut previous: Option<u32> = None;
    for frame in frames {
        let delta = match previous {
            None => frame.offset,
            Some(prev) if frame.offset > prev => frame.offset - prev - 1,
            Some(prev) => {
                return Err(BytecovError::encode(format!(
                    "stack map frame at {} does not follow frame at {prev}",
                    frame.offset
                )))
            }
        };
        let delta = u16::try_from(delta)
            .map_err(|_| BytecovError::encode(format!("frame delta {delta} exceeds u16")))?;
        previous = Some(frame.offset);
        match &frame.kind {
            FrameKind::Same if delta <= 63 => out.put_u8(delta as u8),
            FrameKind::Same => {
                out.put_u8(SAME_EXTENDED);
                out.put_u16(delta);
            }
            FrameKind::SameLocals1StackItem(ty) => {
                if delta <= 63 {
                    out.put_u8(SAME_LOCALS_1_STACK_ITEM + delta as u8);
                } else {
                    out.put_u8(SAME_LOCALS_1_STACK_ITEM_EXTENDED);
                    out.put_u16(delta);
                }
                ty.write(out);
            }
            FrameKind::Chop(k) => {
                out.put_u8(SAME_EXTENDED - k);
                out.put_u16(delta);
            }
            FrameKind::Append(locals) => {
                out.put_u8(SAME_EXTENDED + locals.len() as u8);
                out.put_u16(delta);
                for ty in locals {
                    ty.write(out);
                }
            }
            FrameKind::Full { locals, stack } => {
                out.put_u8(FULL);
                out.put_u16(delta);
                out.put_u16(locals.len() as u16);
                for ty in locals {
                    ty.write(out);
                }
                out.put_u16(stack.len() as u16);
                for ty in stack {
                    ty.write(out);
                }
            }
        }
    }
    Ok(())
}
