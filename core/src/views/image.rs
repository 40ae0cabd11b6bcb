use std::io::{Read, Seek};

use crate::archive::{ResourceKind, ResourceLoader};
use crate::error::ArchiveError;

use super::{Record, ResourceView};

/// Image header plus its encoded pixel data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    /// Nonzero for run-length encoded pixels.
    pub compression: u8,
    pub offset_x: i16,
    pub offset_y: i16,
    pub width: u16,
    pub height: u16,
    pub pixels: Vec<u8>,
}

impl Image {
    pub const HEADER_SIZE: usize = 0x18;

    pub fn is_rle(&self) -> bool {
        self.compression != 0
    }
}

impl ResourceView for Image {
    const KIND: ResourceKind = ResourceKind::IMAGE;
    const SIZE: usize = Image::HEADER_SIZE;

    fn parse<R: Read + Seek>(rec: Record<'_>, _: &mut ResourceLoader<R>) -> Result<Self, ArchiveError> {
        Ok(Self {
            compression: rec.u8(0)?,
            offset_x: rec.i16(6)?,
            offset_y: rec.i16(8)?,
            width: rec.u16(0xA)?,
            height: rec.u16(0xC)?,
            pixels: rec.tail(Self::HEADER_SIZE)?.to_vec(),
        })
    }
}
