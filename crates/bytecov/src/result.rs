//! Result and error types for Bytecov.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for Bytecov operations
pub type BytecovResult<T> = Result<T, BytecovError>;

/// Result type for class file decoding
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Malformed class file input
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Input ended before a structure was complete
    #[error("unexpected end of input at byte {offset} (needed {needed} more)")]
    UnexpectedEof {
        /// Byte offset where the read started
        offset: usize,
        /// Bytes the read required
        needed: usize,
    },

    /// Magic number is not 0xCAFEBABE
    #[error("bad magic {0:#010x}")]
    BadMagic(u32),

    /// Unknown constant pool tag
    #[error("unknown constant pool tag {tag} at index {index}")]
    UnknownConstantTag {
        /// Tag byte
        tag: u8,
        /// Pool index
        index: u16,
    },

    /// Constant pool reference out of range or of the wrong kind
    #[error("bad constant pool reference #{index}: expected {expected}")]
    BadConstant {
        /// Pool index
        index: u16,
        /// Expected entry kind
        expected: &'static str,
    },

    /// Opcode is not part of the instruction set
    #[error("unknown opcode {opcode:#04x} at code offset {offset}")]
    UnknownOpcode {
        /// Opcode byte
        opcode: u8,
        /// Code offset
        offset: u32,
    },

    /// Branch, switch or handler target does not start an instruction
    #[error("target {target} of instruction at {offset} is not an instruction boundary")]
    InvalidTarget {
        /// Offset of the referring instruction (or handler start)
        offset: u32,
        /// Target offset
        target: i64,
    },

    /// Code attribute is empty or larger than the class format allows
    #[error("invalid code length {0}")]
    InvalidCodeLength(u32),

    /// An attribute's content does not match its declared layout
    #[error("malformed {name} attribute: {reason}")]
    MalformedAttribute {
        /// Attribute name
        name: String,
        /// Failure reason
        reason: String,
    },

    /// Bytes left over after the last class structure
    #[error("{0} trailing bytes after class structure")]
    TrailingBytes(usize),
}

/// Error category used by diagnostics and reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Malformed binary input
    Decode,
    /// A class or method shape the injector cannot instrument safely
    UnsupportedConstruct,
    /// Serialization self-check failed
    Encode,
    /// Probe, code size or constant pool limits exceeded
    Capacity,
}

/// Errors that can occur in Bytecov
#[derive(Debug, Error)]
pub enum BytecovError {
    /// Malformed class file
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Construct the injector cannot rewrite safely
    #[error("unsupported construct in {location}: {reason}")]
    UnsupportedConstruct {
        /// Class or method where the construct was found
        location: String,
        /// What made it unsupported
        reason: String,
    },

    /// Encoder self-check failure
    #[error("encode error: {reason}")]
    Encode {
        /// What the self-check found
        reason: String,
    },

    /// A hard limit was exceeded
    #[error("capacity exceeded: {what} needs {requested}, limit is {limit}")]
    Capacity {
        /// Limited resource
        what: &'static str,
        /// Requested amount
        requested: usize,
        /// Maximum allowed
        limit: usize,
    },

    /// A class identity was allocated again with a different probe count
    #[error("segment for {class} already holds {existing} probes, requested {requested}")]
    SegmentMismatch {
        /// Class name
        class: String,
        /// Probe count of the existing segment
        existing: usize,
        /// Probe count requested now
        requested: usize,
    },
}

impl BytecovError {
    /// Create an unsupported-construct error
    #[must_use]
    pub fn unsupported(location: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnsupportedConstruct {
            location: location.into(),
            reason: reason.into(),
        }
    }

    /// Create an encode error
    #[must_use]
    pub fn encode(reason: impl Into<String>) -> Self {
        Self::Encode {
            reason: reason.into(),
        }
    }

    /// Create a capacity error
    #[must_use]
    pub const fn capacity(what: &'static str, requested: usize, limit: usize) -> Self {
        Self::Capacity {
            what,
            requested,
            limit,
        }
    }

    /// Category of this error
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Decode(_) => ErrorKind::Decode,
            Self::UnsupportedConstruct { .. } => ErrorKind::UnsupportedConstruct,
            Self::Encode { .. } => ErrorKind::Encode,
            Self::Capacity { .. } | Self::SegmentMismatch { .. } => ErrorKind::Capacity,
        }
    }
}
