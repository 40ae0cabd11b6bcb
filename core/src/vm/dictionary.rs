//! Import/export dictionaries.
//!
//! Six reserved bytes, then length-prefixed (`u16` LE) strings alternating
//! tag and definition until a zero length. Tags are a type letter, a
//! separator and a name:
//!
//! | tag | definition | meaning |
//! |-----|------------|---------|
//! | `C:name` | `index` | native code resource bound at `index` |
//! | `B:name` / `W:name` / `L:name` | `offset,class` | external variable |
//! | `M:number` | `offset` | handler for message `number` |

use tracing::trace;

use crate::archive::ResourceId;
use crate::error::LinkError;
use crate::util::bytes::{LeCursor, write_u16_le};

use super::opcode::Width;

pub const DICTIONARY_HEADER_SIZE: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DictEntry {
    Code { name: String, index: u32 },
    Variable {
        width: Width,
        name: String,
        offset: u16,
        /// Levels above the declaring class; 0 is the class itself.
        class: usize,
    },
    Message { number: u16, offset: u32 },
    Other { tag: String, def: String },
}

fn bad(resource: ResourceId, reason: impl Into<String>) -> LinkError {
    LinkError::BadDictionary {
        resource,
        reason: reason.into(),
    }
}

fn read_string(cursor: &mut LeCursor<'_>, len: u16, resource: ResourceId) -> Result<String, LinkError> {
    let raw = cursor
        .take(len as usize)
        .map_err(|_| bad(resource, format!("string of {len} bytes runs past the end")))?;
    let trimmed = match raw.iter().rposition(|&b| b != 0) {
        Some(last) => &raw[..=last],
        None => &[][..],
    };
    String::from_utf8(trimmed.to_vec()).map_err(|_| bad(resource, "string is not valid UTF-8"))
}

fn parse_number<T: std::str::FromStr>(text: &str, what: &str, resource: ResourceId) -> Result<T, LinkError> {
    text.trim()
        .parse()
        .map_err(|_| bad(resource, format!("bad {what} `{text}`")))
}

fn classify(tag: String, def: String, resource: ResourceId) -> Result<DictEntry, LinkError> {
    let mut chars = tag.chars();
    let (Some(kind), Some(_)) = (chars.next(), chars.next()) else {
        return Err(bad(resource, format!("tag `{tag}` is too short")));
    };
    let name = chars.as_str();

    Ok(match kind {
        'C' => DictEntry::Code {
            name: name.to_string(),
            index: parse_number(&def, "code index", resource)?,
        },
        'B' | 'W' | 'L' => {
            let (offset, class) = def
                .split_once(',')
                .ok_or_else(|| bad(resource, format!("variable `{name}` lacks a class reference")))?;
            DictEntry::Variable {
                width: Width::from_tag(kind).unwrap_or(Width::Long),
                name: name.to_string(),
                offset: parse_number(offset, "variable offset", resource)?,
                class: parse_number(class, "class reference", resource)?,
            }
        }
        'M' => DictEntry::Message {
            number: parse_number(name, "message number", resource)?,
            offset: parse_number(&def, "handler offset", resource)?,
        },
        _ => DictEntry::Other { tag, def },
    })
}

/// Parse a dictionary resource. Running out of data between entries ends the list.
pub fn parse_dictionary(bytes: &[u8], resource: ResourceId) -> Result<Vec<DictEntry>, LinkError> {
    let mut cursor = LeCursor::new(bytes);
    cursor
        .skip(DICTIONARY_HEADER_SIZE)
        .map_err(|_| bad(resource, "missing header"))?;

    let mut entries = Vec::new();
    loop {
        let Ok(tag_len) = cursor.u16() else {
            trace!(%resource, "dictionary ends without terminator");
            break;
        };
        if tag_len == 0 {
            break;
        }
        let tag = read_string(&mut cursor, tag_len, resource)?;
        let def_len = cursor
            .u16()
            .map_err(|_| bad(resource, format!("tag `{tag}` has no definition")))?;
        if def_len == 0 {
            return Err(bad(resource, format!("tag `{tag}` has an empty definition")));
        }
        let def = read_string(&mut cursor, def_len, resource)?;
        entries.push(classify(tag, def, resource)?);
    }
    Ok(entries)
}

/// Writes dictionaries in the same layout [`parse_dictionary`] reads.
#[derive(Debug, Clone)]
pub struct DictionaryWriter {
    out: Vec<u8>,
}

impl Default for DictionaryWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl DictionaryWriter {
    pub fn new() -> Self {
        Self {
            out: vec![0; DICTIONARY_HEADER_SIZE],
        }
    }

    fn string(&mut self, s: &str) {
        // NUL-terminated, as the shipped dictionaries are
        write_u16_le(&mut self.out, (s.len() + 1) as u16);
        self.out.extend_from_slice(s.as_bytes());
        self.out.push(0);
    }

    pub fn entry(&mut self, tag: &str, def: &str) -> &mut Self {
        self.string(tag);
        self.string(def);
        self
    }

    pub fn code(&mut self, name: &str, index: u32) -> &mut Self {
        self.entry(&format!("C:{name}"), &index.to_string())
    }

    pub fn variable(&mut self, width: Width, name: &str, offset: u16, class: usize) -> &mut Self {
        let letter = match width {
            Width::Byte => 'B',
            Width::Word => 'W',
            Width::Long => 'L',
        };
        self.entry(&format!("{letter}:{name}"), &format!("{offset},{class}"))
    }

    pub fn message(&mut self, number: u16, offset: u32) -> &mut Self {
        self.entry(&format!("M:{number}"), &offset.to_string())
    }

    pub fn finish(&self) -> Vec<u8> {
        let mut out = self.out.clone();
        write_u16_le(&mut out, 0);
        out
    }
}
