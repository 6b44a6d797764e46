//! Programmatic class construction.
//!
//! Assembles small classes from raw code arrays. Used to produce fixtures
//! without a Java compiler and by tooling that synthesizes classes.

use super::code::{self, CodeAttribute, CodeModel, ExceptionHandler, LineNumber};
use super::constpool::ConstantPool;
use super::encode::encode;
use super::model::{access, ClassModel, ClassVersion, MethodAttribute, MethodModel, RawAttribute};
use super::stackmap::StackMapFrame;
use super::writer::ClassfileWrite;
use crate::result::BytecovResult;

/// Java 8, the oldest version that requires stack map frames
pub const DEFAULT_VERSION: ClassVersion = ClassVersion { minor: 0, major: 52 };

/// A method to be added by [`ClassBuilder::method`]
#[derive(Debug, Clone)]
pub struct MethodBody {
    name: String,
    descriptor: String,
    access_flags: u16,
    max_stack: u16,
    max_locals: u16,
    code: Option<Vec<u8>>,
    lines: Vec<(u32, u16)>,
    handlers: Vec<ExceptionHandler>,
    frames: Vec<StackMapFrame>,
    invisible_annotations: Vec<String>,
}

impl MethodBody {
    /// A `public static` method without a body yet
    #[must_use]
    pub fn new(name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            descriptor: descriptor.into(),
            access_flags: access::PUBLIC | access::STATIC,
            max_stack: 0,
            max_locals: 0,
            code: None,
            lines: Vec::new(),
            handlers: Vec::new(),
            frames: Vec::new(),
            invisible_annotations: Vec::new(),
        }
    }

    #[must_use]
    pub const fn access(mut self, flags: u16) -> Self {
        self.access_flags = flags;
        self
    }

    #[must_use]
    pub const fn limits(mut self, max_stack: u16, max_locals: u16) -> Self {
        self.max_stack = max_stack;
        self.max_locals = max_locals;
        self
    }

    #[must_use]
    pub fn code(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.code = Some(bytes.into());
        self
    }

    /// Map code offset `start` to source `line`
    #[must_use]
    pub fn line(mut self, start: u32, line: u16) -> Self {
        self.lines.push((start, line));
        self
    }

    #[must_use]
    pub fn handler(mut self, start: u32, end: u32, handler: u32, catch_type: u16) -> Self {
        self.handlers.push(ExceptionHandler {
            start,
            end,
            handler,
            catch_type,
        });
        self
    }

    #[must_use]
    pub fn frame(mut self, frame: StackMapFrame) -> Self {
        self.frames.push(frame);
        self
    }

    /// Attach a `RuntimeInvisibleAnnotations` entry with no elements
    #[must_use]
    pub fn annotated(mut self, descriptor: impl Into<String>) -> Self {
        self.invisible_annotations.push(descriptor.into());
        self
    }
}

/// Builds a [`ClassModel`] one method at a time
#[derive(Debug, Clone)]
pub struct ClassBuilder {
    pool: ConstantPool,
    name: String,
    this_class: u16,
    super_class: u16,
    methods: Vec<MethodModel>,
    attributes: Vec<RawAttribute>,
}

impl ClassBuilder {
    /// Start a public class extending `java/lang/Object`
    pub fn new(name: &str) -> BytecovResult<Self> {
        let mut pool = ConstantPool::new();
        let this_class = pool.add_class(name)?;
        let super_class = pool.add_class("java/lang/Object")?;
        Ok(Self {
            pool,
            name: name.to_string(),
            this_class,
            super_class,
            methods: Vec::new(),
            attributes: Vec::new(),
        })
    }

    /// Pool access for code that needs constant indices
    pub fn pool_mut(&mut self) -> &mut ConstantPool {
        &mut self.pool
    }

    /// Add a `SourceFile` attribute
    pub fn source_file(&mut self, file: &str) -> BytecovResult<&mut Self> {
        let name_index = self.pool.add_utf8("SourceFile")?;
        let file_index = self.pool.add_utf8(file)?;
        let mut info = Vec::new();
        info.put_u16(file_index);
        self.attributes.push(RawAttribute { name_index, info });
        Ok(self)
    }

    /// Add a method; its code array is decoded and validated here
    pub fn method(&mut self, body: MethodBody) -> BytecovResult<&mut Self> {
        let name_index = self.pool.add_utf8(&body.name)?;
        let descriptor_index = self.pool.add_utf8(&body.descriptor)?;
        let mut attributes = Vec::new();

        if let Some(bytes) = &body.code {
            let mut code_attributes = Vec::new();
            if !body.lines.is_empty() {
                code_attributes.push(CodeAttribute::LineNumbers {
                    name_index: self.pool.add_utf8("LineNumberTable")?,
                    entries: body
                        .lines
                        .iter()
                        .map(|&(start, line)| LineNumber { start, line })
                        .collect(),
                });
            }
            if !body.frames.is_empty() {
                code_attributes.push(CodeAttribute::StackMap {
                    name_index: self.pool.add_utf8("StackMapTable")?,
                    frames: body.frames.clone(),
                });
            }
            let code = CodeModel {
                max_stack: body.max_stack,
                max_locals: body.max_locals,
                instructions: code::decode_instructions(bytes)?,
                handlers: body.handlers.clone(),
                attributes: code_attributes,
            };
            attributes.push(MethodAttribute::Code {
                name_index: self.pool.add_utf8("Code")?,
                code: Box::new(code),
            });
        }

        if !body.invisible_annotations.is_empty() {
            let mut info = Vec::new();
            info.put_u16(body.invisible_annotations.len() as u16);
            for descriptor in &body.invisible_annotations {
                info.put_u16(self.pool.add_utf8(descriptor)?);
                info.put_u16(0);
            }
            attributes.push(MethodAttribute::Other(RawAttribute {
                name_index: self.pool.add_utf8("RuntimeInvisibleAnnotations")?,
                info,
            }));
        }

        self.methods.push(MethodModel {
            access_flags: body.access_flags,
            name_index,
            descriptor_index,
            name: body.name,
            descriptor: body.descriptor,
            attributes,
        });
        Ok(self)
    }

    #[must_use]
    pub fn build(self) -> ClassModel {
        ClassModel {
            version: DEFAULT_VERSION,
            constant_pool: self.pool,
            access_flags: access::PUBLIC | access::SUPER,
            this_class: self.this_class,
            super_class: self.super_class,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: self.methods,
            attributes: self.attributes,
            name: self.name,
        }
    }

    /// Build and encode
    pub fn to_bytes(self) -> BytecovResult<Vec<u8>> {
        encode(&self.build())
    }
}
