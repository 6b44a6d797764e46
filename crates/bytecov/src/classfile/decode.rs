//! Class file bytes to [`ClassModel`].

use super::code;
use super::constpool::ConstantPool;
use super::model::{ClassModel, ClassVersion, FieldModel, MethodAttribute, MethodModel, RawAttribute};
use super::reader::ByteReader;
use crate::result::{DecodeError, DecodeResult};

pub const MAGIC: u32 = 0xCAFE_BABE;

fn read_raw_attributes(reader: &mut ByteReader<'_>, pool: &ConstantPool) -> DecodeResult<Vec<RawAttribute>> {
    let count = reader.u16()?;
    let mut attributes = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let name_index = reader.u16()?;
        pool.utf8_bytes(name_index)?;
        let length = reader.u32()? as usize;
        attributes.push(RawAttribute {
            name_index,
            info: reader.take(length)?.to_vec(),
        });
    }
    Ok(attributes)
}

fn read_method(reader: &mut ByteReader<'_>, pool: &ConstantPool) -> DecodeResult<MethodModel> {
    let access_flags = reader.u16()?;
    let name_index = reader.u16()?;
    let descriptor_index = reader.u16()?;
    let count = reader.u16()?;
    let mut attributes = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let name_index = reader.u16()?;
        let length = reader.u32()? as usize;
        let info = reader.take(length)?;
        let attribute = if pool.utf8_bytes(name_index)? == b"Code" {
            MethodAttribute::Code {
                name_index,
                code: Box::new(code::decode_code(info, pool)?),
            }
        } else {
            MethodAttribute::Other(RawAttribute {
                name_index,
                info: info.to_vec(),
            })
        };
        attributes.push(attribute);
    }
    Ok(MethodModel {
        access_flags,
        name_index,
        descriptor_index,
        name: pool.utf8(name_index)?,
        descriptor: pool.utf8(descriptor_index)?,
        attributes,
    })
}

/// Decode a complete class file.
///
/// Method bodies are fully decoded; everything the engine does not rewrite
/// is kept as raw attributes and written back untouched.
pub fn decode(bytes: &[u8]) -> DecodeResult<ClassModel> {
    let mut reader = ByteReader::new(bytes);
    let magic = reader.u32()?;
    if magic != MAGIC {
        return Err(DecodeError::BadMagic(magic));
    }
    let minor = reader.u16()?;
    let major = reader.u16()?;
    let constant_pool = ConstantPool::read(&mut reader)?;
    let access_flags = reader.u16()?;
    let this_class = reader.u16()?;
    let super_class = reader.u16()?;
    let name = constant_pool.class_name(this_class)?;
    if super_class != 0 {
        constant_pool.class_name(super_class)?;
    }

    let interface_count = reader.u16()?;
    let interfaces = (0..interface_count)
        .map(|_| reader.u16())
        .collect::<DecodeResult<Vec<_>>>()?;

    let field_count = reader.u16()?;
    let mut fields = Vec::with_capacity(field_count as usize);
    for _ in 0..field_count {
        fields.push(FieldModel {
            access_flags: reader.u16()?,
            name_index: reader.u16()?,
            descriptor_index: reader.u16()?,
            attributes: read_raw_attributes(&mut reader, &constant_pool)?,
        });
    }

    let method_count = reader.u16()?;
    let mut methods = Vec::with_capacity(method_count as usize);
    for _ in 0..method_count {
        methods.push(read_method(&mut reader, &constant_pool)?);
    }

    let attributes = read_raw_attributes(&mut reader, &constant_pool)?;
    reader.finish()?;

    Ok(ClassModel {
        version: ClassVersion { minor, major },
        constant_pool,
        access_flags,
        this_class,
        super_class,
        interfaces,
        fields,
        methods,
        attributes,
        name,
    })
}
