//! Class program blobs.
//!
//! ```text
//! 0x00 exports     u32  dictionary resource id
//! 0x04 imports     u32  dictionary resource id
//! 0x08 parent      u32  parent class id, 0xFFFF_FFFF at the root
//! 0x0C static_size u16  bytes of per-instance static storage
//! 0x0E code...
//! ```
//!
//! Message handlers start with a `u16` auto-variable size followed by code.

use crate::archive::ResourceId;
use crate::util::bytes::{DataView, OutOfBounds, write_u16_le, write_u32_le};

pub const PROGRAM_HEADER_SIZE: usize = 0x0E;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramHeader {
    pub exports: ResourceId,
    pub imports: ResourceId,
    pub parent: ResourceId,
    pub static_size: u16,
}

impl ProgramHeader {
    pub fn parse(bytes: &[u8]) -> Result<Self, OutOfBounds> {
        let view = DataView::new(bytes);
        Ok(Self {
            exports: ResourceId(view.u32_le(0)?),
            imports: ResourceId(view.u32_le(4)?),
            parent: ResourceId(view.u32_le(8)?),
            static_size: view.u16_le(0x0C)?,
        })
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        write_u32_le(out, self.exports.0);
        write_u32_le(out, self.imports.0);
        write_u32_le(out, self.parent.0);
        write_u16_le(out, self.static_size);
    }

    /// Header followed by `code`.
    pub fn with_code(&self, code: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(PROGRAM_HEADER_SIZE + code.len());
        self.write(&mut out);
        out.extend_from_slice(code);
        out
    }
}
