//! Bounds-checked readers over borrowed byte slices.
//!
//! Container structures are big-endian; VM program blobs and dictionaries are
//! little-endian. Both readers report overruns as [`OutOfBounds`] instead of
//! panicking, since every path through them is driven by game data.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("read of {len} bytes at offset {offset} overruns buffer of {available} bytes")]
pub struct OutOfBounds {
    pub offset: usize,
    pub len: usize,
    pub available: usize,
}

#[inline]
fn slice_at(bytes: &[u8], offset: usize, len: usize) -> Result<&[u8], OutOfBounds> {
    offset
        .checked_add(len)
        .and_then(|end| bytes.get(offset..end))
        .ok_or(OutOfBounds {
            offset,
            len,
            available: bytes.len(),
        })
}

/// Fixed-offset view over a record. Offsets are relative to the start of the view.
#[derive(Debug, Clone, Copy)]
pub struct DataView<'a> {
    bytes: &'a [u8],
}

impl<'a> DataView<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn slice(&self, offset: usize, len: usize) -> Result<&'a [u8], OutOfBounds> {
        slice_at(self.bytes, offset, len)
    }

    /// Everything from `offset` to the end of the view.
    pub fn tail(&self, offset: usize) -> Result<&'a [u8], OutOfBounds> {
        self.bytes.get(offset..).ok_or(OutOfBounds {
            offset,
            len: 0,
            available: self.bytes.len(),
        })
    }

    pub fn u8(&self, offset: usize) -> Result<u8, OutOfBounds> {
        Ok(self.slice(offset, 1)?[0])
    }

    pub fn u16_be(&self, offset: usize) -> Result<u16, OutOfBounds> {
        let b = self.slice(offset, 2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn i16_be(&self, offset: usize) -> Result<i16, OutOfBounds> {
        self.u16_be(offset).map(|v| v as i16)
    }

    pub fn u32_be(&self, offset: usize) -> Result<u32, OutOfBounds> {
        let b = self.slice(offset, 4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn u16_le(&self, offset: usize) -> Result<u16, OutOfBounds> {
        let b = self.slice(offset, 2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn u32_le(&self, offset: usize) -> Result<u32, OutOfBounds> {
        let b = self.slice(offset, 4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}

/// Sequential little-endian reader, used for dictionaries.
#[derive(Debug)]
pub struct LeCursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> LeCursor<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn skip(&mut self, len: usize) -> Result<(), OutOfBounds> {
        slice_at(self.bytes, self.pos, len)?;
        self.pos += len;
        Ok(())
    }

    pub fn take(&mut self, len: usize) -> Result<&'a [u8], OutOfBounds> {
        let out = slice_at(self.bytes, self.pos, len)?;
        self.pos += len;
        Ok(out)
    }

    pub fn u16(&mut self) -> Result<u16, OutOfBounds> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }
}

#[inline]
pub fn write_u16_be(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

#[inline]
pub fn write_u32_be(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}

#[inline]
pub fn write_u16_le(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

#[inline]
pub fn write_u32_le(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}
