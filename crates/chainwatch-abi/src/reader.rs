//! Cursor over a packed action payload (little-endian scalars, LEB128 lengths).

use chainwatch_core::PayloadError;

/// Bounds-checked reader over a byte slice.
#[derive(Debug)]
pub struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn take(&mut self, len: usize) -> Result<&'a [u8], PayloadError> {
        let end = self
            .offset
            .checked_add(len)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| {
                PayloadError::Malformed(format!(
                    "read of {len} bytes at offset {} overruns {}-byte payload",
                    self.offset,
                    self.bytes.len()
                ))
            })?;
        let out = &self.bytes[self.offset..end];
        self.offset = end;
        Ok(out)
    }

    pub fn fixed<const N: usize>(&mut self) -> Result<[u8; N], PayloadError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8, PayloadError> {
        Ok(self.take(1)?[0])
    }

    pub fn u16(&mut self) -> Result<u16, PayloadError> {
        Ok(u16::from_le_bytes(self.fixed()?))
    }

    pub fn u32(&mut self) -> Result<u32, PayloadError> {
        Ok(u32::from_le_bytes(self.fixed()?))
    }

    pub fn u64(&mut self) -> Result<u64, PayloadError> {
        Ok(u64::from_le_bytes(self.fixed()?))
    }

    pub fn u128(&mut self) -> Result<u128, PayloadError> {
        Ok(u128::from_le_bytes(self.fixed()?))
    }

    pub fn i64(&mut self) -> Result<i64, PayloadError> {
        Ok(i64::from_le_bytes(self.fixed()?))
    }

    /// LEB128, at most five bytes.
    pub fn varuint32(&mut self) -> Result<u32, PayloadError> {
        let mut value = 0u64;
        for shift in (0..35).step_by(7) {
            let byte = self.u8()?;
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return u32::try_from(value)
                    .map_err(|_| PayloadError::Malformed("varuint32 overflows 32 bits".into()));
            }
        }
        Err(PayloadError::Malformed("varuint32 longer than 5 bytes".into()))
    }

    /// Zigzag-encoded varuint32.
    pub fn varint32(&mut self) -> Result<i32, PayloadError> {
        let raw = self.varuint32()?;
        Ok((raw >> 1) as i32 ^ -((raw & 1) as i32))
    }

    /// A `varuint32` length prefix followed by that many bytes.
    pub fn prefixed(&mut self) -> Result<&'a [u8], PayloadError> {
        let len = self.varuint32()? as usize;
        self.take(len)
    }
}
