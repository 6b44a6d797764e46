//! Structured, mutable class model.

use super::annotations;
use super::code::CodeModel;
use super::constpool::ConstantPool;
use crate::result::DecodeResult;

/// Access flag bits shared by classes, fields and methods
pub mod access {
    pub const PUBLIC: u16 = 0x0001;
    pub const PRIVATE: u16 = 0x0002;
    pub const PROTECTED: u16 = 0x0004;
    pub const STATIC: u16 = 0x0008;
    pub const FINAL: u16 = 0x0010;
    pub const SYNCHRONIZED: u16 = 0x0020;
    /// Class-level meaning of 0x0020
    pub const SUPER: u16 = 0x0020;
    pub const BRIDGE: u16 = 0x0040;
    pub const VARARGS: u16 = 0x0080;
    pub const NATIVE: u16 = 0x0100;
    pub const INTERFACE: u16 = 0x0200;
    pub const ABSTRACT: u16 = 0x0400;
    pub const SYNTHETIC: u16 = 0x1000;
    pub const MODULE: u16 = 0x8000;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ClassVersion {
    pub minor: u16,
    pub major: u16,
}

/// An attribute kept as opaque bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAttribute {
    pub name_index: u16,
    pub info: Vec<u8>,
}

impl RawAttribute {
    /// Attribute name, or `#index` if the pool entry is not UTF-8
    #[must_use]
    pub fn name(&self, pool: &ConstantPool) -> String {
        pool.utf8(self.name_index)
            .unwrap_or_else(|_| format!("#{}", self.name_index))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldModel {
    pub access_flags: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<RawAttribute>,
}

/// Method attributes in their original order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodAttribute {
    Code { name_index: u16, code: Box<CodeModel> },
    Other(RawAttribute),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodModel {
    pub access_flags: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub name: String,
    pub descriptor: String,
    pub attributes: Vec<MethodAttribute>,
}

impl MethodModel {
    /// `name` + `descriptor`, e.g. `max(II)I`
    #[must_use]
    pub fn signature(&self) -> String {
        format!("{}{}", self.name, self.descriptor)
    }

    #[must_use]
    pub const fn has_flag(&self, flag: u16) -> bool {
        self.access_flags & flag != 0
    }

    #[must_use]
    pub fn code(&self) -> Option<&CodeModel> {
        self.attributes.iter().find_map(|attr| match attr {
            MethodAttribute::Code { code, .. } => Some(code.as_ref()),
            MethodAttribute::Other(_) => None,
        })
    }

    pub fn code_mut(&mut self) -> Option<&mut CodeModel> {
        self.attributes.iter_mut().find_map(|attr| match attr {
            MethodAttribute::Code { code, .. } => Some(code.as_mut()),
            MethodAttribute::Other(_) => None,
        })
    }

    /// Type descriptors of the runtime (in)visible annotations on this method
    pub fn annotation_types(&self, pool: &ConstantPool) -> DecodeResult<Vec<String>> {
        let mut types = Vec::new();
        for attr in &self.attributes {
            let MethodAttribute::Other(raw) = attr else {
                continue;
            };
            let name = pool.utf8_bytes(raw.name_index)?;
            if name == b"RuntimeVisibleAnnotations" || name == b"RuntimeInvisibleAnnotations" {
                for index in annotations::annotation_type_indices(&raw.info)? {
                    types.push(pool.utf8(index)?);
                }
            }
        }
        Ok(types)
    }
}

/// A decoded class file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassModel {
    pub version: ClassVersion,
    pub constant_pool: ConstantPool,
    pub access_flags: u16,
    pub this_class: u16,
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<FieldModel>,
    pub methods: Vec<MethodModel>,
    pub attributes: Vec<RawAttribute>,
    /// Internal name resolved from `this_class`
    pub name: String,
}

impl ClassModel {
    #[must_use]
    pub const fn is_interface(&self) -> bool {
        self.access_flags & access::INTERFACE != 0
    }

    /// File name from the `SourceFile` attribute
    #[must_use]
    pub fn source_file(&self) -> Option<String> {
        self.attributes
            .iter()
            .find(|attr| matches!(self.constant_pool.utf8_bytes(attr.name_index), Ok(b"SourceFile")))
            .and_then(|attr| {
                let index = u16::from_be_bytes([*attr.info.first()?, *attr.info.get(1)?]);
                self.constant_pool.utf8(index).ok()
            })
    }
}
