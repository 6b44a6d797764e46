//! Scanning of `Runtime{Visible,Invisible}Annotations` payloads.
//!
//! Only the top-level annotation types are collected; element values are
//! walked to stay in sync with the byte stream.

use super::reader::ByteReader;
use crate::result::{DecodeError, DecodeResult};

/// Element values nest through arrays and annotations; bound the recursion
const MAX_DEPTH: usize = 64;

fn malformed(reason: String) -> DecodeError {
    DecodeError::MalformedAttribute {
        name: "RuntimeAnnotations".to_string(),
        reason,
    }
}

fn skip_element_value(reader: &mut ByteReader<'_>, depth: usize) -> DecodeResult<()> {
    if depth > MAX_DEPTH {
        return Err(malformed("element values nested too deeply".to_string()));
    }
    match reader.u8()? {
        b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b's' | b'c' => reader.skip(2),
        b'e' => reader.skip(4),
        b'@' => skip_annotation(reader, depth + 1).map(|_| ()),
        b'[' => {
            let count = reader.u16()?;
            for _ in 0..count {
                skip_element_value(reader, depth + 1)?;
            }
            Ok(())
        }
        tag => Err(malformed(format!("element value tag {tag:#04x}"))),
    }
}

fn skip_annotation(reader: &mut ByteReader<'_>, depth: usize) -> DecodeResult<u16> {
    let type_index = reader.u16()?;
    let pairs = reader.u16()?;
    for _ in 0..pairs {
        reader.skip(2)?;
        skip_element_value(reader, depth)?;
    }
    Ok(type_index)
}

/// Constant pool indices of each annotation's type descriptor
pub(crate) fn annotation_type_indices(payload: &[u8]) -> DecodeResult<Vec<u16>> {
    let mut reader = ByteReader::new(payload);
    let count = reader.u16()?;
    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        out.push(skip_annotation(&mut reader, 0)?);
    }
    reader.finish()?;
    Ok(out)
}
