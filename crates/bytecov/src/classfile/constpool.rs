//! Constant pool entries and lookup.
//!
//! Entries keep their exact binary payload (UTF-8 as raw modified UTF-8 bytes,
//! floats as raw bits) so an untouched pool re-encodes byte for byte.

use super::reader::ByteReader;
use super::writer::ClassfileWrite;
use crate::result::{BytecovError, BytecovResult, DecodeError, DecodeResult};

/// Largest usable pool index (`constant_pool_count` is a u16)
pub const MAX_POOL_SLOTS: usize = 65_535;

mod tags {
    pub const UTF8: u8 = 1;
    pub const INTEGER: u8 = 3;
    pub const FLOAT: u8 = 4;
    pub const LONG: u8 = 5;
    pub const DOUBLE: u8 = 6;
    pub const CLASS: u8 = 7;
    pub const STRING: u8 = 8;
    pub const FIELDREF: u8 = 9;
    pub const METHODREF: u8 = 10;
    pub const INTERFACE_METHODREF: u8 = 11;
    pub const NAME_AND_TYPE: u8 = 12;
    pub const METHOD_HANDLE: u8 = 15;
    pub const METHOD_TYPE: u8 = 16;
    pub const DYNAMIC: u8 = 17;
    pub const INVOKE_DYNAMIC: u8 = 18;
    pub const MODULE: u8 = 19;
    pub const PACKAGE: u8 = 20;
}

/// A single constant pool entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constant {
    /// Modified UTF-8 bytes
    Utf8(Vec<u8>),
    Integer(i32),
    /// IEEE 754 bits
    Float(u32),
    Long(i64),
    /// IEEE 754 bits
    Double(u64),
    Class(u16),
    String(u16),
    FieldRef(u16, u16),
    MethodRef(u16, u16),
    InterfaceMethodRef(u16, u16),
    NameAndType(u16, u16),
    MethodHandle(u8, u16),
    MethodType(u16),
    Dynamic(u16, u16),
    InvokeDynamic(u16, u16),
    Module(u16),
    Package(u16),
    /// Index 0 and the slot after a Long/Double
    Unusable,
}

impl Constant {
    /// Whether this entry takes two pool slots
    #[must_use]
    pub const fn is_wide(&self) -> bool {
        matches!(self, Self::Long(_) | Self::Double(_))
    }

    fn read(reader: &mut ByteReader<'_>, index: u16) -> DecodeResult<Self> {
        let tag = reader.u8()?;
        let constant = match tag {
            tags::UTF8 => {
                let len = reader.u16()? as usize;
                Self::Utf8(reader.take(len)?.to_vec())
            }
            tags::INTEGER => Self::Integer(reader.i32()?),
            tags::FLOAT => Self::Float(reader.u32()?),
            tags::LONG => Self::Long(reader.u64()? as i64),
            tags::DOUBLE => Self::Double(reader.u64()?),
            tags::CLASS => Self::Class(reader.u16()?),
            tags::STRING => Self::String(reader.u16()?),
            tags::FIELDREF => Self::FieldRef(reader.u16()?, reader.u16()?),
            tags::METHODREF => Self::MethodRef(reader.u16()?, reader.u16()?),
            tags::INTERFACE_METHODREF => Self::InterfaceMethodRef(reader.u16()?, reader.u16()?),
            tags::NAME_AND_TYPE => Self::NameAndType(reader.u16()?, reader.u16()?),
            tags::METHOD_HANDLE => Self::MethodHandle(reader.u8()?, reader.u16()?),
            tags::METHOD_TYPE => Self::MethodType(reader.u16()?),
            tags::DYNAMIC => Self::Dynamic(reader.u16()?, reader.u16()?),
            tags::INVOKE_DYNAMIC => Self::InvokeDynamic(reader.u16()?, reader.u16()?),
            tags::MODULE => Self::Module(reader.u16()?),
            tags::PACKAGE => Self::Package(reader.u16()?),
            tag => return Err(DecodeError::UnknownConstantTag { tag, index }),
        };
        Ok(constant)
    }

    fn write(&self, out: &mut Vec<u8>) {
        match self {
            Self::Utf8(bytes) => {
                out.put_u8(tags::UTF8);
                out.put_u16(bytes.len() as u16);
                out.put_bytes(bytes);
            }
            Self::Integer(v) => {
                out.put_u8(tags::INTEGER);
                out.put_i32(*v);
            }
            Self::Float(bits) => {
                out.put_u8(tags::FLOAT);
                out.put_u32(*bits);
            }
            Self::Long(v) => {
                out.put_u8(tags::LONG);
                out.put_bytes(&v.to_be_bytes());
            }
            Self::Double(bits) => {
                out.put_u8(tags::DOUBLE);
                out.put_bytes(&bits.to_be_bytes());
            }
            Self::Class(i) => {
                out.put_u8(tags::CLASS);
                out.put_u16(*i);
            }
            Self::String(i) => {
                out.put_u8(tags::STRING);
                out.put_u16(*i);
            }
            Self::FieldRef(a, b) => write_pair(out, tags::FIELDREF, *a, *b),
            Self::MethodRef(a, b) => write_pair(out, tags::METHODREF, *a, *b),
            Self::InterfaceMethodRef(a, b) => write_pair(out, tags::INTERFACE_METHODREF, *a, *b),
            Self::NameAndType(a, b) => write_pair(out, tags::NAME_AND_TYPE, *a, *b),
            Self::MethodHandle(kind, i) => {
                out.put_u8(tags::METHOD_HANDLE);
                out.put_u8(*kind);
                out.put_u16(*i);
            }
            Self::MethodType(i) => {
                out.put_u8(tags::METHOD_TYPE);
                out.put_u16(*i);
            }
            Self::Dynamic(a, b) => write_pair(out, tags::DYNAMIC, *a, *b),
            Self::InvokeDynamic(a, b) => write_pair(out, tags::INVOKE_DYNAMIC, *a, *b),
            Self::Module(i) => {
                out.put_u8(tags::MODULE);
                out.put_u16(*i);
            }
            Self::Package(i) => {
                out.put_u8(tags::PACKAGE);
                out.put_u16(*i);
            }
            Self::Unusable => {}
        }
    }
}

fn write_pair(out: &mut Vec<u8>, tag: u8, a: u16, b: u16) {
    out.put_u8(tag);
    out.put_u16(a);
    out.put_u16(b);
}

/// Constant pool with 1-based indexing; slot 0 is always `Unusable`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantPool {
    entries: Vec<Constant>,
}

impl Default for ConstantPool {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstantPool {
    /// Create an empty pool
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: vec![Constant::Unusable],
        }
    }

    /// `constant_pool_count` as written in the class file
    #[must_use]
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Entry at `index`, if it exists and is usable
    #[must_use]
    pub fn get(&self, index: u16) -> Option<&Constant> {
        match self.entries.get(index as usize) {
            Some(Constant::Unusable) | None => None,
            Some(c) => Some(c),
        }
    }

    /// Iterate `(index, entry)` over usable entries
    pub fn iter(&self) -> impl Iterator<Item = (u16, &Constant)> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, c)| !matches!(c, Constant::Unusable))
            .map(|(i, c)| (i as u16, c))
    }

    /// Raw bytes of the UTF-8 entry at `index`
    pub fn utf8_bytes(&self, index: u16) -> DecodeResult<&[u8]> {
        match self.get(index) {
            Some(Constant::Utf8(bytes)) => Ok(bytes),
            _ => Err(DecodeError::BadConstant {
                index,
                expected: "Utf8",
            }),
        }
    }

    /// UTF-8 entry at `index` as a string (lossy for non-standard encodings)
    pub fn utf8(&self, index: u16) -> DecodeResult<String> {
        self.utf8_bytes(index)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    /// Internal name referenced by the `Class` entry at `index`
    pub fn class_name(&self, index: u16) -> DecodeResult<String> {
        match self.get(index) {
            Some(Constant::Class(name)) => self.utf8(*name),
            _ => Err(DecodeError::BadConstant {
                index,
                expected: "Class",
            }),
        }
    }

    pub(crate) fn read(reader: &mut ByteReader<'_>) -> DecodeResult<Self> {
        let count = reader.u16()?;
        let mut entries = Vec::with_capacity(count as usize);
        entries.push(Constant::Unusable);
        let mut index = 1u16;
        while index < count {
            let constant = Constant::read(reader, index)?;
            let wide = constant.is_wide();
            entries.push(constant);
            index += 1;
            if wide {
                if index >= count {
                    return Err(DecodeError::BadConstant {
                        index: index - 1,
                        expected: "two-slot entry inside pool bounds",
                    });
                }
                entries.push(Constant::Unusable);
                index += 1;
            }
        }
        let pool = Self { entries };
        pool.validate_references()?;
        Ok(pool)
    }

    fn validate_references(&self) -> DecodeResult<()> {
        let expect = |index: u16, expected: &'static str, ok: fn(&Constant) -> bool| {
            match self.get(index) {
                Some(c) if ok(c) => Ok(()),
                _ => Err(DecodeError::BadConstant { index, expected }),
            }
        };
        let utf8 = |c: &Constant| matches!(c, Constant::Utf8(_));
        let class = |c: &Constant| matches!(c, Constant::Class(_));
        let nat = |c: &Constant| matches!(c, Constant::NameAndType(..));
        for (_, constant) in self.iter() {
            match constant {
                Constant::Class(i)
                | Constant::String(i)
                | Constant::MethodType(i)
                | Constant::Module(i)
                | Constant::Package(i) => expect(*i, "Utf8", utf8)?,
                Constant::FieldRef(c, n)
                | Constant::MethodRef(c, n)
                | Constant::InterfaceMethodRef(c, n) => {
                    expect(*c, "Class", class)?;
                    expect(*n, "NameAndType", nat)?;
                }
                Constant::NameAndType(n, d) => {
                    expect(*n, "Utf8", utf8)?;
                    expect(*d, "Utf8", utf8)?;
                }
                Constant::Dynamic(_, n) | Constant::InvokeDynamic(_, n) => {
                    expect(*n, "NameAndType", nat)?;
                }
                Constant::MethodHandle(kind, i) => {
                    if !(1..=9).contains(kind) {
                        return Err(DecodeError::BadConstant {
                            index: *i,
                            expected: "method handle kind 1..=9",
                        });
                    }
                    expect(*i, "member reference", |c| {
                        matches!(
                            c,
                            Constant::FieldRef(..)
                                | Constant::MethodRef(..)
                                | Constant::InterfaceMethodRef(..)
                        )
                    })?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    pub(crate) fn write(&self, out: &mut Vec<u8>) {
        out.put_u16(self.entries.len() as u16);
        for entry in self.entries.iter().skip(1) {
            entry.write(out);
        }
    }

    pub(crate) fn push(&mut self, constant: Constant) -> BytecovResult<u16> {
        let slots = if constant.is_wide() { 2 } else { 1 };
        if self.entries.len() + slots > MAX_POOL_SLOTS {
            return Err(BytecovError::capacity(
                "constant pool slots",
                self.entries.len() + slots,
                MAX_POOL_SLOTS,
            ));
        }
        let index = self.entries.len() as u16;
        let wide = constant.is_wide();
        self.entries.push(constant);
        if wide {
            self.entries.push(Constant::Unusable);
        }
        Ok(index)
    }

    fn find_or_push(&mut self, constant: Constant) -> BytecovResult<u16> {
        if let Some((index, _)) = self.iter().find(|(_, c)| **c == constant) {
            return Ok(index);
        }
        self.push(constant)
    }

    /// Find or add a UTF-8 entry
    pub fn add_utf8(&mut self, value: &str) -> BytecovResult<u16> {
        self.find_or_push(Constant::Utf8(value.as_bytes().to_vec()))
    }

    /// Find or add an Integer entry
    pub fn add_integer(&mut self, value: i32) -> BytecovResult<u16> {
        self.find_or_push(Constant::Integer(value))
    }

    /// Find or add a Class entry for an internal name
    pub fn add_class(&mut self, internal_name: &str) -> BytecovResult<u16> {
        let name = self.add_utf8(internal_name)?;
        self.find_or_push(Constant::Class(name))
    }

    /// Find or add a NameAndType entry
    pub fn add_name_and_type(&mut self, name: &str, descriptor: &str) -> BytecovResult<u16> {
        let name = self.add_utf8(name)?;
        let descriptor = self.add_utf8(descriptor)?;
        self.find_or_push(Constant::NameAndType(name, descriptor))
    }

    /// Find or add a Methodref entry
    pub fn add_method_ref(
        &mut self,
        owner: &str,
        name: &str,
        descriptor: &str,
    ) -> BytecovResult<u16> {
        let class = self.add_class(owner)?;
        let nat = self.add_name_and_type(name, descriptor)?;
        self.find_or_push(Constant::MethodRef(class, nat))
    }

    /// Index of an existing Methodref to `owner.name descriptor`, without
    /// adding anything
    #[must_use]
    pub fn find_method_ref(&self, owner: &str, name: &str, descriptor: &str) -> Option<u16> {
        let utf8_is = |index: u16, want: &str| matches!(self.utf8_bytes(index), Ok(bytes) if bytes == want.as_bytes());
        self.iter().find_map(|(index, constant)| {
            let Constant::MethodRef(class, nat) = constant else {
                return None;
            };
            let Some(Constant::Class(owner_index)) = self.get(*class) else {
                return None;
            };
            let Some(Constant::NameAndType(name_index, descriptor_index)) = self.get(*nat) else {
                return None;
            };
            (utf8_is(*owner_index, owner) && utf8_is(*name_index, name) && utf8_is(*descriptor_index, descriptor))
                .then_some(index)
        })
    }

    /// Upper bound on the slots `add_method_ref` plus `integers` Integer
    /// entries can consume
    #[must_use]
    pub const fn worst_case_slots(integers: usize) -> usize {
        // Utf8 owner, Class, Utf8 name, Utf8 descriptor, NameAndType, Methodref
        6 + integers
    }
}
