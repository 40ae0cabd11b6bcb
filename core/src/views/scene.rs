use std::io::{Read, Seek};

use crate::archive::{ResourceId, ResourceKind, ResourceLoader, ShortId};
use crate::error::ArchiveError;

use super::{ArrayElement, Image, Palette, PaletteMod, Record, ResourceView, load_array, load_view};

/// Inclusive rectangle, stored left, right, top, bottom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub left: i16,
    pub right: i16,
    pub top: i16,
    pub bottom: i16,
}

impl Rect {
    pub const SIZE: usize = 8;

    pub fn read(rec: &Record<'_>, offset: usize) -> Result<Self, ArchiveError> {
        Ok(Self {
            left: rec.i16(offset)?,
            right: rec.i16(offset + 2)?,
            top: rec.i16(offset + 4)?,
            bottom: rec.i16(offset + 6)?,
        })
    }

    pub fn contains(&self, x: i16, y: i16) -> bool {
        (self.left..=self.right).contains(&x) && (self.top..=self.bottom).contains(&y)
    }
}

/// Image, palette and hotspot map of one display plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plane {
    pub image: Option<Image>,
    pub palette: Option<Palette>,
    pub hotspots: Option<Image>,
}

impl ResourceView for Plane {
    const KIND: ResourceKind = ResourceKind::PLANE;
    const SIZE: usize = 0x10;

    fn parse<R: Read + Seek>(rec: Record<'_>, loader: &mut ResourceLoader<R>) -> Result<Self, ArchiveError> {
        Ok(Self {
            image: load_view(loader, rec.resource_id(0)?)?,
            palette: load_view(loader, rec.resource_id(4)?)?,
            hotspots: load_view(loader, rec.resource_id(8)?)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sprite {
    pub x: i16,
    pub y: i16,
    pub image: Option<Image>,
}

impl ArrayElement for Sprite {
    const KIND: ResourceKind = ResourceKind::SPRITE_LIST;
    const SIZE: usize = 8;

    fn parse<R: Read + Seek>(rec: Record<'_>, loader: &mut ResourceLoader<R>) -> Result<Self, ArchiveError> {
        Ok(Self {
            x: rec.i16(0)?,
            y: rec.i16(2)?,
            image: load_view(loader, rec.resource_id(4)?)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonGraphicsKind {
    PaletteMods {
        hovered: Vec<PaletteMod>,
        idle: Vec<PaletteMod>,
    },
    Sprites {
        hovered: Vec<Sprite>,
        idle: Vec<Sprite>,
    },
    Other(u16),
}

/// Hovered and idle appearance of one button state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonGraphics {
    pub kind: ButtonGraphicsKind,
}

impl ArrayElement for ButtonGraphics {
    const KIND: ResourceKind = ResourceKind::BUTTON_GRAPHICS_LIST;
    const SIZE: usize = 0xC;

    fn parse<R: Read + Seek>(rec: Record<'_>, loader: &mut ResourceLoader<R>) -> Result<Self, ArchiveError> {
        let ty = rec.u16(0)?;
        let hovered = rec.resource_id(6)?;
        // only the short half of the idle id fits in the record
        let idle = match rec.u16(0xA)? {
            0xFFFF => ResourceId::INVALID,
            short => ShortId(short).into(),
        };
        let kind = match ty {
            1 => ButtonGraphicsKind::PaletteMods {
                hovered: load_array(loader, hovered)?.unwrap_or_default(),
                idle: load_array(loader, idle)?.unwrap_or_default(),
            },
            2 => ButtonGraphicsKind::Sprites {
                hovered: load_array(loader, hovered)?.unwrap_or_default(),
                idle: load_array(loader, idle)?.unwrap_or_default(),
            },
            other => ButtonGraphicsKind::Other(other),
        };
        Ok(Self { kind })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    /// 1 = rectangle hit test, 3 = hotspot query.
    pub hotspot: u16,
    pub rect: Rect,
    pub plane: u16,
    pub graphics_count: u16,
    pub graphics: Vec<ButtonGraphics>,
}

impl Button {
    pub fn hit(&self, x: i16, y: i16) -> bool {
        self.hotspot == 1 && self.rect.contains(x, y)
    }
}

impl ArrayElement for Button {
    const KIND: ResourceKind = ResourceKind::BUTTON_LIST;
    const SIZE: usize = 0x14;

    fn parse<R: Read + Seek>(rec: Record<'_>, loader: &mut ResourceLoader<R>) -> Result<Self, ArchiveError> {
        Ok(Self {
            hotspot: rec.u16(0)?,
            rect: Rect::read(&rec, 2)?,
            plane: rec.u16(0xA)?,
            graphics_count: rec.u16(0xC)?,
            graphics: load_array(loader, rec.resource_id(0x10)?)?.unwrap_or_default(),
        })
    }
}
