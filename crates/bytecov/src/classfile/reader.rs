//! Big-endian cursor over class file bytes.

use crate::result::{DecodeError, DecodeResult};

/// Bounds-checked big-endian reader
#[derive(Debug, Clone)]
pub(crate) struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub(crate) const fn position(&self) -> usize {
        self.pos
    }

    pub(crate) const fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    pub(crate) fn take(&mut self, len: usize) -> DecodeResult<&'a [u8]> {
        if self.remaining() < len {
            return Err(DecodeError::UnexpectedEof {
                offset: self.pos,
                needed: len,
            });
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> DecodeResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub(crate) fn u8(&mut self) -> DecodeResult<u8> {
        Ok(self.array::<1>()?[0])
    }

    pub(crate) fn u16(&mut self) -> DecodeResult<u16> {
        Ok(u16::from_be_bytes(self.array()?))
    }

    pub(crate) fn u32(&mut self) -> DecodeResult<u32> {
        Ok(u32::from_be_bytes(self.array()?))
    }

    pub(crate) fn i16(&mut self) -> DecodeResult<i16> {
        Ok(i16::from_be_bytes(self.array()?))
    }

    pub(crate) fn i32(&mut self) -> DecodeResult<i32> {
        Ok(i32::from_be_bytes(self.array()?))
    }

    pub(crate) fn u64(&mut self) -> DecodeResult<u64> {
        Ok(u64::from_be_bytes(self.array()?))
    }

    pub(crate) fn skip(&mut self, len: usize) -> DecodeResult<()> {
        self.take(len).map(|_| ())
    }

    /// Fail with `TrailingBytes` unless the input is fully consumed
    pub(crate) fn finish(&self) -> DecodeResult<()> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(DecodeError::TrailingBytes(n)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_big_endian() {
        let mut r = ByteReader::new(&[0xCA, 0xFE, 0xBA, 0xBE, 0x00, 0x34, 0xFF]);
        assert_eq!(r.u32().unwrap(), 0xCAFE_BABE);
        assert_eq!(r.u16().unwrap(), 52);
        assert_eq!(r.u8().unwrap(), 0xFF);
        assert!(r.finish().is_ok());
    }

    #[test]
    fn test_eof_reports_offset() {
        let mut r = ByteReader::new(&[1, 2, 3]);
        r.u16().unwrap();
        assert_eq!(
            r.u16(),
            Err(DecodeError::UnexpectedEof {
                offset: 2,
                needed: 2
            })
        );
    }

    #[test]
    fn test_signed_reads() {
        let mut r = ByteReader::new(&[0xFF, 0xFE, 0xFF, 0xFF, 0xFF, 0xFD]);
        assert_eq!(r.i16().unwrap(), -2);
        assert_eq!(r.i32().unwrap(), -3);
    }

    #[test]
    fn test_trailing_bytes_detected() {
        let r = ByteReader::new(&[0]);
        assert_eq!(r.finish(), Err(DecodeError::TrailingBytes(1)));
    }
}
