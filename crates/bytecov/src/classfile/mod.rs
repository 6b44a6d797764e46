//! JVM class file model.
//!
//! [`decode`] turns class bytes into a [`ClassModel`] whose method bodies
//! are decoded into instructions with absolute offsets; [`encode`] writes a
//! model back. Attributes the engine does not rewrite are carried as raw
//! bytes, so an unmodified model encodes to the bytes it came from.

mod annotations;
pub mod builder;
pub mod code;
pub mod constpool;
mod decode;
mod encode;
pub mod model;
pub mod opcodes;
mod reader;
pub mod stackmap;
mod writer;

pub use builder::{ClassBuilder, MethodBody};
pub use code::{
    CodeAttribute, CodeModel, ExceptionHandler, Instruction, LineNumber, LocalVariable,
    LocalVariableKind, Op, SwitchCases,
};
pub use constpool::{Constant, ConstantPool};
pub use decode::decode;
pub use encode::{encode, self_check};
pub use model::{access, ClassModel, ClassVersion, FieldModel, MethodAttribute, MethodModel, RawAttribute};
pub use stackmap::{FrameKind, StackMapFrame, VerificationType};
