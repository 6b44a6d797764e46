//! Big-endian output helpers for class file serialization.

/// Append big-endian primitives to a byte buffer
pub(crate) trait ClassfileWrite {
    fn put_u8(&mut self, value: u8);
    fn put_u16(&mut self, value: u16);
    fn put_u32(&mut self, value: u32);
    fn put_i16(&mut self, value: i16);
    fn put_i32(&mut self, value: i32);
    fn put_bytes(&mut self, bytes: &[u8]);

    /// Write `name_index`, a u32 length and the payload built by `body`
    fn put_attribute(&mut self, name_index: u16, body: impl FnOnce(&mut Vec<u8>));
}

impl ClassfileWrite for Vec<u8> {
    fn put_u8(&mut self, value: u8) {
        self.push(value);
    }

    fn put_u16(&mut self, value: u16) {
        self.extend_from_slice(&value.to_be_bytes());
    }

    fn put_u32(&mut self, value: u32) {
        self.extend_from_slice(&value.to_be_bytes());
    }

    fn put_i16(&mut self, value: i16) {
        self.extend_from_slice(&value.to_be_bytes());
    }

    fn put_i32(&mut self, value: i32) {
        self.extend_from_slice(&value.to_be_bytes());
    }

    fn put_bytes(&mut self, bytes: &[u8]) {
        self.extend_from_slice(bytes);
    }

    fn put_attribute(&mut self, name_index: u16, body: impl FnOnce(&mut Vec<u8>)) {
        self.put_u16(name_index);
        let length_at = self.len();
        self.put_u32(0);
        body(self);
        let length = (self.len() - length_at - 4) as u32;
        self[length_at..length_at + 4].copy_from_slice(&length.to_be_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_length_is_backpatched() {
        let mut out = Vec::new();
        out.put_attribute(7, |body| {
            body.put_u16(1);
            body.put_u8(2);
        });
        assert_eq!(out, vec![0, 7, 0, 0, 0, 3, 0, 1, 2]);
    }

    #[test]
    fn test_signed_values() {
        let mut out = Vec::new();
        out.put_i16(-1);
        out.put_i32(-2);
        assert_eq!(out, vec![0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFE]);
    }
}
