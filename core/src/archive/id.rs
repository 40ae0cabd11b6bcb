//! Resource identifiers, kind tags and compression tags.

use std::fmt;

use serde::{Deserialize, Serialize};

/// `(directory, index)` pair packed as `dir << 8 | index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShortId(pub u16);

impl ShortId {
    #[inline]
    pub const fn new(dir: u8, index: u8) -> Self {
        ShortId(((dir as u16) << 8) | index as u16)
    }

    #[inline]
    pub const fn dir(self) -> u8 {
        (self.0 >> 8) as u8
    }

    #[inline]
    pub const fn index(self) -> u8 {
        self.0 as u8
    }
}

impl fmt::Display for ShortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}:{:02X}", self.dir(), self.index())
    }
}

/// Long resource id: short id in the high half, intra-resource offset in the low half.
///
/// The offset half is a reserved extension and is always zero in shipped data.
/// `0xFFFF_FFFF` marks an absent reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(pub u32);

impl ResourceId {
    pub const INVALID: ResourceId = ResourceId(0xFFFF_FFFF);

    #[inline]
    pub const fn is_valid(self) -> bool {
        self.0 != Self::INVALID.0
    }

    #[inline]
    pub const fn short(self) -> ShortId {
        ShortId((self.0 >> 16) as u16)
    }

    #[inline]
    pub const fn extension(self) -> u16 {
        self.0 as u16
    }

    /// `None` for the invalid sentinel.
    #[inline]
    pub fn valid(self) -> Option<ResourceId> {
        self.is_valid().then_some(self)
    }
}

impl From<ShortId> for ResourceId {
    fn from(id: ShortId) -> Self {
        ResourceId((id.0 as u32) << 16)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_valid() {
            return f.write_str("<invalid>");
        }
        match self.extension() {
            0 => write!(f, "{}", self.short()),
            ext => write!(f, "{}+{:04X}", self.short(), ext),
        }
    }
}

/// Semantic resource kind, the low 24 bits of an entry's type word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceKind(pub u32);

impl ResourceKind {
    pub const S16_VALUES: ResourceKind = ResourceKind(2);
    pub const U16_VALUES: ResourceKind = ResourceKind(3);
    pub const RESOURCE_LIST: ResourceKind = ResourceKind(6);
    pub const IMAGE: ResourceKind = ResourceKind(8);
    pub const PALETTE: ResourceKind = ResourceKind(10);
    pub const COLOR_CYCLES: ResourceKind = ResourceKind(11);
    pub const COLOR_CYCLE_SLOT: ResourceKind = ResourceKind(12);
    pub const PLANE: ResourceKind = ResourceKind(26);
    pub const SPRITE_LIST: ResourceKind = ResourceKind(27);
    pub const BUTTON_COLORS: ResourceKind = ResourceKind(28);
    pub const BUTTON_PALETTE_MOD: ResourceKind = ResourceKind(29);
    pub const BUTTON_GRAPHICS_LIST: ResourceKind = ResourceKind(30);
    pub const BUTTON_LIST: ResourceKind = ResourceKind(31);
    pub const SCENE: ResourceKind = ResourceKind(32);
    pub const MAIN_MENU: ResourceKind = ResourceKind(33);
    pub const HUB: ResourceKind = ResourceKind(40);
    pub const HUB_ITEM: ResourceKind = ResourceKind(41);
    pub const SLIDING_PUZZLE: ResourceKind = ResourceKind(44);
    pub const PARTICLES: ResourceKind = ResourceKind(46);
    /// VM class blob: program header followed by code.
    pub const PROGRAM: ResourceKind = ResourceKind(0x50);
    /// VM import/export dictionary.
    pub const DICTIONARY: ResourceKind = ResourceKind(0x51);

    pub const MASK: u32 = 0x00FF_FFFF;

    pub fn name(self) -> Option<&'static str> {
        Some(match self {
            Self::S16_VALUES => "s16-values",
            Self::U16_VALUES => "u16-values",
            Self::RESOURCE_LIST => "resource-list",
            Self::IMAGE => "image",
            Self::PALETTE => "palette",
            Self::COLOR_CYCLES => "color-cycles",
            Self::COLOR_CYCLE_SLOT => "color-cycle-slot",
            Self::PLANE => "plane",
            Self::SPRITE_LIST => "sprite-list",
            Self::BUTTON_COLORS => "button-colors",
            Self::BUTTON_PALETTE_MOD => "button-palette-mod",
            Self::BUTTON_GRAPHICS_LIST => "button-graphics-list",
            Self::BUTTON_LIST => "button-list",
            Self::SCENE => "scene",
            Self::MAIN_MENU => "main-menu",
            Self::HUB => "hub",
            Self::HUB_ITEM => "hub-item",
            Self::SLIDING_PUZZLE => "sliding-puzzle",
            Self::PARTICLES => "particles",
            Self::PROGRAM => "program",
            Self::DICTIONARY => "dictionary",
            _ => return None,
        })
    }

    pub fn from_name(name: &str) -> Option<ResourceKind> {
        const ALL: [ResourceKind; 21] = [
            ResourceKind::S16_VALUES,
            ResourceKind::U16_VALUES,
            ResourceKind::RESOURCE_LIST,
            ResourceKind::IMAGE,
            ResourceKind::PALETTE,
            ResourceKind::COLOR_CYCLES,
            ResourceKind::COLOR_CYCLE_SLOT,
            ResourceKind::PLANE,
            ResourceKind::SPRITE_LIST,
            ResourceKind::BUTTON_COLORS,
            ResourceKind::BUTTON_PALETTE_MOD,
            ResourceKind::BUTTON_GRAPHICS_LIST,
            ResourceKind::BUTTON_LIST,
            ResourceKind::SCENE,
            ResourceKind::MAIN_MENU,
            ResourceKind::HUB,
            ResourceKind::HUB_ITEM,
            ResourceKind::SLIDING_PUZZLE,
            ResourceKind::PARTICLES,
            ResourceKind::PROGRAM,
            ResourceKind::DICTIONARY,
        ];
        ALL.into_iter().find(|k| k.name() == Some(name))
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "kind#{}", self.0),
        }
    }
}

/// Compression tag, the top byte of an entry's type word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    Lz,
    Raw,
}

impl Compression {
    pub const fn tag(self) -> u8 {
        match self {
            Compression::Lz => 0,
            Compression::Raw => 8,
        }
    }

    pub const fn from_tag(tag: u8) -> Option<Compression> {
        match tag {
            0 => Some(Compression::Lz),
            8 => Some(Compression::Raw),
            _ => None,
        }
    }
}
