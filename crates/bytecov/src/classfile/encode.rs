//! [`ClassModel`] back to class file bytes.

use super::code;
use super::decode::{decode, MAGIC};
use super::model::{ClassModel, MethodAttribute, RawAttribute};
use super::writer::ClassfileWrite;
use crate::result::{BytecovError, BytecovResult};

fn write_raw_attributes(attributes: &[RawAttribute], out: &mut Vec<u8>) {
    out.put_u16(attributes.len() as u16);
    for attribute in attributes {
        out.put_attribute(attribute.name_index, |body| body.put_bytes(&attribute.info));
    }
}

/// Encode a class model.
///
/// Attribute lengths are recomputed. Instruction placement, branch ranges,
/// code length and frame ordering are checked while writing.
pub fn encode(class: &ClassModel) -> BytecovResult<Vec<u8>> {
    let mut out = Vec::new();
    out.put_u32(MAGIC);
    out.put_u16(class.version.minor);
    out.put_u16(class.version.major);
    class.constant_pool.write(&mut out);
    out.put_u16(class.access_flags);
    out.put_u16(class.this_class);
    out.put_u16(class.super_class);

    out.put_u16(class.interfaces.len() as u16);
    for interface in &class.interfaces {
        out.put_u16(*interface);
    }

    out.put_u16(class.fields.len() as u16);
    for field in &class.fields {
        out.put_u16(field.access_flags);
        out.put_u16(field.name_index);
        out.put_u16(field.descriptor_index);
        write_raw_attributes(&field.attributes, &mut out);
    }

    out.put_u16(class.methods.len() as u16);
    for method in &class.methods {
        out.put_u16(method.access_flags);
        out.put_u16(method.name_index);
        out.put_u16(method.descriptor_index);
        out.put_u16(method.attributes.len() as u16);
        for attribute in &method.attributes {
            match attribute {
                MethodAttribute::Code { name_index, code } => {
                    let mut body = Vec::new();
                    code::encode_code(code, &mut body).map_err(|err| match err {
                        BytecovError::Encode { reason } => {
                            BytecovError::encode(format!("{}.{}: {reason}", class.name, method.signature()))
                        }
                        other => other,
                    })?;
                    out.put_attribute(*name_index, |payload| payload.put_bytes(&body));
                }
                MethodAttribute::Other(raw) => {
                    out.put_attribute(raw.name_index, |payload| payload.put_bytes(&raw.info));
                }
            }
        }
    }

    write_raw_attributes(&class.attributes, &mut out);
    Ok(out)
}

/// Re-decode encoder output, turning any decode failure into an encode error
pub fn self_check(bytes: &[u8]) -> BytecovResult<()> {
    decode(bytes)
        .map(|_| ())
        .map_err(|err| BytecovError::encode(format!("output does not decode: {err}")))
}
