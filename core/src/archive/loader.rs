use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use tracing::trace;

use crate::error::ArchiveError;

use super::id::{Compression, ResourceId, ResourceKind, ShortId};
use super::index::{Archive, ResourceEntry};
use super::lz;

/// A decompressed resource, owned by whoever requested it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedResource {
    pub id: ShortId,
    pub kind: ResourceKind,
    pub data: Vec<u8>,
}

/// Counters for what the loader actually did, used by tests and `relic info`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoaderStats {
    pub reads: u64,
    pub decompressions: u64,
    pub cache_hits: u64,
}

#[derive(Debug)]
struct ResourceCache {
    capacity: usize,
    entries: VecDeque<LoadedResource>,
}

impl ResourceCache {
    fn get(&mut self, id: ShortId) -> Option<LoadedResource> {
        let pos = self.entries.iter().position(|r| r.id == id)?;
        let hit = self.entries.remove(pos)?;
        self.entries.push_back(hit.clone());
        Some(hit)
    }

    fn insert(&mut self, res: &LoadedResource) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(res.clone());
    }
}

/// Resolves ids against an [`Archive`] and returns decompressed buffers.
///
/// With `cache_capacity == 0` every load reads and decompresses afresh.
#[derive(Debug)]
pub struct ResourceLoader<R = BufReader<File>> {
    archive: Archive<R>,
    cache: ResourceCache,
    stats: LoaderStats,
}

impl ResourceLoader<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>, cache_capacity: usize) -> Result<Self, ArchiveError> {
        Ok(Self::new(Archive::open(path)?, cache_capacity))
    }
}

impl<R: Read + Seek> ResourceLoader<R> {
    pub fn new(archive: Archive<R>, cache_capacity: usize) -> Self {
        Self {
            archive,
            cache: ResourceCache {
                capacity: cache_capacity,
                entries: VecDeque::with_capacity(cache_capacity),
            },
            stats: LoaderStats::default(),
        }
    }

    pub fn archive(&self) -> &Archive<R> {
        &self.archive
    }

    pub fn archive_mut(&mut self) -> &mut Archive<R> {
        &mut self.archive
    }

    pub fn stats(&self) -> LoaderStats {
        self.stats
    }

    /// Load a long id. The invalid sentinel yields `Ok(None)`.
    pub fn load(&mut self, id: ResourceId, kind: ResourceKind) -> Result<Option<LoadedResource>, ArchiveError> {
        if !id.is_valid() {
            return Ok(None);
        }
        if id.extension() != 0 {
            return Err(ArchiveError::UnsupportedExtension {
                id,
                offset: id.extension(),
            });
        }
        self.load_short(id.short(), kind).map(Some)
    }

    pub fn load_short(&mut self, id: ShortId, kind: ResourceKind) -> Result<LoadedResource, ArchiveError> {
        let entry = self.archive.entry(id)?;
        if entry.kind != kind {
            return Err(ArchiveError::KindMismatch {
                id: id.into(),
                expected: kind,
                actual: entry.kind,
            });
        }
        self.fetch(id, entry)
    }

    /// Load without checking the kind tag.
    pub fn load_any(&mut self, id: ShortId) -> Result<LoadedResource, ArchiveError> {
        let entry = self.archive.entry(id)?;
        self.fetch(id, entry)
    }

    fn fetch(&mut self, id: ShortId, entry: ResourceEntry) -> Result<LoadedResource, ArchiveError> {
        if let Some(hit) = self.cache.get(id) {
            self.stats.cache_hits += 1;
            return Ok(hit);
        }

        trace!(%id, kind = %entry.kind, size = entry.size, "loading resource");
        let data = match entry.compression() {
            Some(Compression::Raw) => {
                let data = self.archive.read_span(entry.offset as u64, entry.size as usize)?;
                self.stats.reads += 1;
                if data.len() < entry.size as usize {
                    return Err(ArchiveError::Truncated { what: "resource payload" });
                }
                data
            }
            Some(Compression::Lz) => {
                let budget = self
                    .archive
                    .directory(id.dir())
                    .map_or(0, |d| d.comp_buf_size as usize);
                let packed = self.archive.read_span(entry.offset as u64, budget)?;
                self.stats.reads += 1;
                self.stats.decompressions += 1;
                lz::decompress(&packed, entry.size as usize)
                    .map_err(|source| ArchiveError::Decompress { id: id.into(), source })?
            }
            None => {
                return Err(ArchiveError::UnknownCompression {
                    id: id.into(),
                    tag: entry.compression_tag,
                });
            }
        };

        let res = LoadedResource {
            id,
            kind: entry.kind,
            data,
        };
        self.cache.insert(&res);
        Ok(res)
    }
}
