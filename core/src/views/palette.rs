use std::io::{Read, Seek};

use tracing::warn;

use crate::archive::{ResourceKind, ResourceLoader};
use crate::error::ArchiveError;

use super::{ArrayElement, Record, ResourceView, load_view};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorCycleSlot {
    pub start: u16,
    pub end: u16,
    pub frames: u8,
    pub plane: u8,
}

impl ColorCycleSlot {
    /// Frame delay in milliseconds at 60 frames per second.
    pub fn delay_ms(&self) -> u32 {
        self.frames as u32 * 1000 / 60
    }
}

impl ResourceView for ColorCycleSlot {
    const KIND: ResourceKind = ResourceKind::COLOR_CYCLE_SLOT;
    const SIZE: usize = 6;

    fn parse<R: Read + Seek>(rec: Record<'_>, _: &mut ResourceLoader<R>) -> Result<Self, ArchiveError> {
        Ok(Self {
            start: rec.u16(0)?,
            end: rec.u16(2)?,
            frames: rec.u8(4)?,
            plane: rec.u8(5)?,
        })
    }
}

/// Four optional color-cycle slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorCycles {
    pub counts: [u16; 4],
    pub slots: [Option<ColorCycleSlot>; 4],
}

impl ColorCycles {
    /// Slots that would actually run: exactly one cycle and a nonzero frame count.
    pub fn active(&self) -> impl Iterator<Item = (usize, &ColorCycleSlot)> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(i, _)| self.counts[*i] == 1)
            .filter_map(|(i, slot)| slot.as_ref().map(|s| (i, s)))
            .filter(|(_, s)| s.frames > 0)
    }
}

impl ResourceView for ColorCycles {
    const KIND: ResourceKind = ResourceKind::COLOR_CYCLES;
    const SIZE: usize = 0x18;

    fn parse<R: Read + Seek>(rec: Record<'_>, loader: &mut ResourceLoader<R>) -> Result<Self, ArchiveError> {
        let mut counts = [0u16; 4];
        let mut slots = [None; 4];
        for i in 0..4 {
            counts[i] = rec.u16(i * 2)?;
            if counts[i] > 1 {
                warn!(id = %rec.id(), slot = i, count = counts[i], "color cycle slot count above one");
            }
            slots[i] = load_view::<ColorCycleSlot, _>(loader, rec.resource_id(8 + i * 4)?)?;
        }
        Ok(Self { counts, slots })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaletteTarget {
    /// 256 colors split across the back (first 128) and fore planes.
    BothPlanes,
    /// `bottom..=top` applied to whichever plane the caller picks.
    Either,
    Unknown(u16),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    pub target: PaletteTarget,
    pub bottom: u16,
    pub top: u16,
    /// RGB triplets following the 6-byte header.
    pub colors: Vec<u8>,
}

impl Palette {
    pub const HEADER_SIZE: usize = 6;

    /// First color index and number of colors this palette covers.
    pub fn range(&self) -> (u16, u16) {
        match self.target {
            PaletteTarget::BothPlanes => (0, (self.colors.len() / 3) as u16),
            _ => (self.bottom, self.top.saturating_sub(self.bottom).saturating_add(1)),
        }
    }
}

impl ResourceView for Palette {
    const KIND: ResourceKind = ResourceKind::PALETTE;
    const SIZE: usize = Palette::HEADER_SIZE;

    fn parse<R: Read + Seek>(rec: Record<'_>, _: &mut ResourceLoader<R>) -> Result<Self, ArchiveError> {
        let target = match rec.u16(0)? {
            0 => PaletteTarget::BothPlanes,
            2 => PaletteTarget::Either,
            other => {
                warn!(id = %rec.id(), target = other, "unknown palette target");
                PaletteTarget::Unknown(other)
            }
        };
        Ok(Self {
            target,
            bottom: rec.u16(2)?,
            top: rec.u16(4)?,
            colors: rec.tail(Self::HEADER_SIZE)?.to_vec(),
        })
    }
}

/// A palette patch: `count` colors starting at `first`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaletteMod {
    pub first: u8,
    pub count: u8,
    pub colors: Vec<u8>,
}

impl ArrayElement for PaletteMod {
    const KIND: ResourceKind = ResourceKind::BUTTON_PALETTE_MOD;
    const SIZE: usize = 6;

    fn parse<R: Read + Seek>(rec: Record<'_>, loader: &mut ResourceLoader<R>) -> Result<Self, ArchiveError> {
        let colors = loader
            .load(rec.resource_id(2)?, ResourceKind::BUTTON_COLORS)?
            .map(|res| res.data)
            .unwrap_or_default();
        Ok(Self {
            first: rec.u8(0)?,
            count: rec.u8(1)?,
            colors,
        })
    }
}
