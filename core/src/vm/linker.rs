//! Class linking: walks a class's parent chain and resolves its dictionaries
//! into a [`Thunk`].

use std::io::{Read, Seek};
use std::rc::Rc;

use tracing::{debug, trace};

use crate::archive::{ResourceId, ResourceKind, ResourceLoader};
use crate::error::LinkError;
use crate::util::{FastHashMap, fast_hash_map_new};

use super::dictionary::{DictEntry, parse_dictionary};
use super::natives::NativeRegistry;
use super::opcode::Width;
use super::program::{PROGRAM_HEADER_SIZE, ProgramHeader};
use super::value::NativeId;

/// An imported variable living in some level's static storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalVar {
    pub name: String,
    pub width: Width,
    /// Absolute level in the owning thunk.
    pub level: usize,
    pub offset: u16,
}

/// One class of the inheritance chain, with its own resolved tables.
#[derive(Debug)]
pub struct ClassLevel {
    pub class: ResourceId,
    /// Code segment (the blob after the program header).
    pub code: Rc<[u8]>,
    pub static_size: u16,
    /// Code-resource index to native.
    pub natives: FastHashMap<u32, NativeId>,
    /// External variables in import order; `LX*`/`SX*` operands index this.
    pub externals: Vec<ExternalVar>,
    /// Handlers this class exports itself.
    pub handlers: FastHashMap<u16, u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerEntry {
    pub level: usize,
    pub offset: u32,
}

/// Linked form of a class. `levels[0]` is the class itself, the last level is the root.
#[derive(Debug)]
pub struct Thunk {
    pub class: ResourceId,
    pub levels: Vec<ClassLevel>,
    handlers: FastHashMap<u16, HandlerEntry>,
}

impl Thunk {
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// Most-derived handler for `message`.
    pub fn handler(&self, message: u16) -> Option<HandlerEntry> {
        self.handlers.get(&message).copied()
    }

    /// Nearest handler for `message` strictly above `level`.
    pub fn handler_above(&self, level: usize, message: u16) -> Option<HandlerEntry> {
        self.levels
            .iter()
            .enumerate()
            .skip(level + 1)
            .find_map(|(lvl, class)| {
                class
                    .handlers
                    .get(&message)
                    .map(|&offset| HandlerEntry { level: lvl, offset })
            })
    }

    pub fn messages(&self) -> Vec<u16> {
        let mut out: Vec<u16> = self.handlers.keys().copied().collect();
        out.sort_unstable();
        out
    }
}

fn load_dictionary<R: Read + Seek>(
    loader: &mut ResourceLoader<R>,
    id: ResourceId,
) -> Result<Vec<DictEntry>, LinkError> {
    match loader.load(id, ResourceKind::DICTIONARY)? {
        Some(res) => parse_dictionary(&res.data, id),
        None => Ok(Vec::new()),
    }
}

/// Link `class` and all its ancestors. Nothing partially linked is returned.
pub fn link_class<R: Read + Seek>(
    loader: &mut ResourceLoader<R>,
    natives: &NativeRegistry,
    class: ResourceId,
    max_depth: usize,
) -> Result<Thunk, LinkError> {
    let mut chain: Vec<(ProgramHeader, ClassLevel)> = Vec::new();
    let mut next = class;
    while next.is_valid() {
        if chain.len() >= max_depth {
            return Err(LinkError::TooDeep { class, max: max_depth });
        }
        let res = loader
            .load(next, ResourceKind::PROGRAM)?
            .ok_or(LinkError::MissingProgram { class: next })?;
        let header = ProgramHeader::parse(&res.data).map_err(|_| LinkError::BadProgramHeader { class: next })?;
        trace!(class = %next, parent = %header.parent, "loaded class program");
        chain.push((
            header,
            ClassLevel {
                class: next,
                code: Rc::from(&res.data[PROGRAM_HEADER_SIZE..]),
                static_size: header.static_size,
                natives: fast_hash_map_new(),
                externals: Vec::new(),
                handlers: fast_hash_map_new(),
            },
        ));
        next = header.parent;
    }
    if chain.is_empty() {
        return Err(LinkError::MissingProgram { class });
    }

    let depth = chain.len();
    for (lvl, (header, level)) in chain.iter_mut().enumerate().rev() {
        for entry in load_dictionary(loader, header.imports)? {
            match entry {
                DictEntry::Code { name, index } => {
                    let id = natives.lookup(&name).ok_or_else(|| LinkError::UnknownNative {
                        class: level.class,
                        name: name.clone(),
                    })?;
                    level.natives.insert(index, id);
                }
                DictEntry::Variable {
                    width,
                    name,
                    offset,
                    class: up,
                } => {
                    let target = lvl + up;
                    if target >= depth {
                        return Err(LinkError::BadExternalClass {
                            class: level.class,
                            name,
                            level: target,
                            depth,
                        });
                    }
                    level.externals.push(ExternalVar {
                        name,
                        width,
                        level: target,
                        offset,
                    });
                }
                other => trace!(class = %level.class, ?other, "ignoring import entry"),
            }
        }

        for entry in load_dictionary(loader, header.exports)? {
            match entry {
                DictEntry::Message { number, offset } => {
                    if offset as usize + 2 > level.code.len() {
                        return Err(LinkError::BadHandlerOffset {
                            class: level.class,
                            message: number,
                            offset,
                        });
                    }
                    level.handlers.insert(number, offset);
                }
                other => trace!(class = %level.class, ?other, "ignoring export entry"),
            }
        }
    }

    // root first, so the most-derived export of each message wins
    let mut handlers = fast_hash_map_new();
    for (lvl, (_, level)) in chain.iter().enumerate().rev() {
        for (&message, &offset) in &level.handlers {
            handlers.insert(message, HandlerEntry { level: lvl, offset });
        }
    }

    let levels: Vec<ClassLevel> = chain.into_iter().map(|(_, level)| level).collect();
    debug!(%class, depth, handlers = handlers.len(), "linked class");
    Ok(Thunk {
        class,
        levels,
        handlers,
    })
}
