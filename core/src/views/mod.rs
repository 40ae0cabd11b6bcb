//! Typed views over loaded resources.
//!
//! A [`ResourceView`] interprets a whole resource; an [`ArrayElement`] is one
//! fixed-size record of an array resource. Both read big-endian fields through
//! a [`Record`] and may load the resources they reference.

mod image;
mod palette;
mod scene;

use std::io::{Read, Seek};

use tracing::{debug, warn};

use crate::archive::{ResourceId, ResourceKind, ResourceLoader};
use crate::error::ArchiveError;
use crate::util::bytes::{DataView, OutOfBounds};

pub use image::Image;
pub use palette::{ColorCycleSlot, ColorCycles, Palette, PaletteMod, PaletteTarget};
pub use scene::{Button, ButtonGraphics, ButtonGraphicsKind, Plane, Rect, Sprite};

/// A record inside a resource, carrying the id for error reports.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    view: DataView<'a>,
    id: ResourceId,
    kind: ResourceKind,
}

impl<'a> Record<'a> {
    pub fn new(bytes: &'a [u8], id: ResourceId, kind: ResourceKind) -> Self {
        Self {
            view: DataView::new(bytes),
            id,
            kind,
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn len(&self) -> usize {
        self.view.len()
    }

    pub fn is_empty(&self) -> bool {
        self.view.is_empty()
    }

    fn wrap<T>(&self, res: Result<T, OutOfBounds>) -> Result<T, ArchiveError> {
        res.map_err(|source| ArchiveError::View {
            id: self.id,
            kind: self.kind,
            source,
        })
    }

    pub fn u8(&self, offset: usize) -> Result<u8, ArchiveError> {
        self.wrap(self.view.u8(offset))
    }

    pub fn u16(&self, offset: usize) -> Result<u16, ArchiveError> {
        self.wrap(self.view.u16_be(offset))
    }

    pub fn i16(&self, offset: usize) -> Result<i16, ArchiveError> {
        self.wrap(self.view.i16_be(offset))
    }

    pub fn u32(&self, offset: usize) -> Result<u32, ArchiveError> {
        self.wrap(self.view.u32_be(offset))
    }

    pub fn resource_id(&self, offset: usize) -> Result<ResourceId, ArchiveError> {
        self.u32(offset).map(ResourceId)
    }

    pub fn tail(&self, offset: usize) -> Result<&'a [u8], ArchiveError> {
        self.wrap(self.view.tail(offset))
    }
}

/// A view over one whole resource of kind `KIND`, at least `SIZE` bytes long.
pub trait ResourceView: Sized {
    const KIND: ResourceKind;
    const SIZE: usize;

    fn parse<R: Read + Seek>(rec: Record<'_>, loader: &mut ResourceLoader<R>) -> Result<Self, ArchiveError>;
}

/// One `SIZE`-byte record of an array resource of kind `KIND`.
pub trait ArrayElement: Sized {
    const KIND: ResourceKind;
    const SIZE: usize;

    fn parse<R: Read + Seek>(rec: Record<'_>, loader: &mut ResourceLoader<R>) -> Result<Self, ArchiveError>;
}

/// Load and parse `id`. The invalid sentinel yields `Ok(None)`.
pub fn load_view<V: ResourceView, R: Read + Seek>(
    loader: &mut ResourceLoader<R>,
    id: ResourceId,
) -> Result<Option<V>, ArchiveError> {
    let Some(res) = loader.load(id, V::KIND)? else {
        return Ok(None);
    };
    if res.data.len() < V::SIZE {
        return Err(ArchiveError::View {
            id,
            kind: V::KIND,
            source: OutOfBounds {
                offset: 0,
                len: V::SIZE,
                available: res.data.len(),
            },
        });
    }
    if res.data.len() > V::SIZE {
        debug!(%id, kind = %V::KIND, len = res.data.len(), "resource carries trailing bytes");
    }
    V::parse(Record::new(&res.data, id, V::KIND), loader).map(Some)
}

/// Load `id` as an array of `len / SIZE` records. A remainder is ignored.
pub fn load_array<E: ArrayElement, R: Read + Seek>(
    loader: &mut ResourceLoader<R>,
    id: ResourceId,
) -> Result<Option<Vec<E>>, ArchiveError> {
    let Some(res) = loader.load(id, E::KIND)? else {
        return Ok(None);
    };
    let count = res.data.len() / E::SIZE;
    let rest = res.data.len() % E::SIZE;
    if rest != 0 {
        warn!(%id, kind = %E::KIND, rest, "array resource has trailing bytes");
    }
    (0..count)
        .map(|i| E::parse(Record::new(&res.data[i * E::SIZE..(i + 1) * E::SIZE], id, E::KIND), loader))
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

impl ArrayElement for i16 {
    const KIND: ResourceKind = ResourceKind::S16_VALUES;
    const SIZE: usize = 2;

    fn parse<R: Read + Seek>(rec: Record<'_>, _: &mut ResourceLoader<R>) -> Result<Self, ArchiveError> {
        rec.i16(0)
    }
}

impl ArrayElement for u16 {
    const KIND: ResourceKind = ResourceKind::U16_VALUES;
    const SIZE: usize = 2;

    fn parse<R: Read + Seek>(rec: Record<'_>, _: &mut ResourceLoader<R>) -> Result<Self, ArchiveError> {
        rec.u16(0)
    }
}

/// Resource lists hold plain ids; they are not followed.
impl ArrayElement for ResourceId {
    const KIND: ResourceKind = ResourceKind::RESOURCE_LIST;
    const SIZE: usize = 4;

    fn parse<R: Read + Seek>(rec: Record<'_>, _: &mut ResourceLoader<R>) -> Result<Self, ArchiveError> {
        rec.resource_id(0)
    }
}
