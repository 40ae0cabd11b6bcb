//! Archive writer.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::ArchiveError;
use crate::util::bytes::write_u32_be;

use super::id::{Compression, ResourceKind, ShortId};
use super::index::{DIRECTORY_ENTRY_SIZE, HEADER_SIZE, MAGIC, RESOURCE_ENTRY_SIZE};
use super::lz;

#[derive(Debug, Clone)]
struct Pending {
    kind: ResourceKind,
    compression: Compression,
    size: u32,
    payload: Vec<u8>,
}

/// Builds an archive in memory, one directory at a time.
#[derive(Debug, Clone, Default)]
pub struct ArchiveBuilder {
    dirs: Vec<Vec<Pending>>,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_directory(&mut self) -> Result<u8, ArchiveError> {
        // the header stores the count in one byte
        if self.dirs.len() >= u8::MAX as usize {
            return Err(ArchiveError::Full {
                what: "directories",
                max: u8::MAX as usize,
            });
        }
        self.dirs.push(Vec::new());
        Ok((self.dirs.len() - 1) as u8)
    }

    /// Add `data`, compressing it first when `compression` is [`Compression::Lz`].
    pub fn add(
        &mut self,
        dir: u8,
        kind: ResourceKind,
        compression: Compression,
        data: &[u8],
    ) -> Result<ShortId, ArchiveError> {
        let payload = match compression {
            Compression::Raw => data.to_vec(),
            Compression::Lz => lz::compress(data),
        };
        let size = u32::try_from(data.len()).map_err(|_| ArchiveError::Full {
            what: "bytes per resource",
            max: u32::MAX as usize,
        })?;
        self.push(dir, Pending { kind, compression, size, payload })
    }

    /// Add a payload that is already encoded, with its declared decompressed size.
    pub fn add_encoded(
        &mut self,
        dir: u8,
        kind: ResourceKind,
        compression: Compression,
        size: u32,
        payload: Vec<u8>,
    ) -> Result<ShortId, ArchiveError> {
        self.push(dir, Pending { kind, compression, size, payload })
    }

    fn push(&mut self, dir: u8, pending: Pending) -> Result<ShortId, ArchiveError> {
        let resources = self
            .dirs
            .get_mut(dir as usize)
            .ok_or(ArchiveError::UnknownResource {
                id: ShortId::new(dir, 0).into(),
            })?;
        let index = u8::try_from(resources.len()).map_err(|_| ArchiveError::Full {
            what: "resources per directory",
            max: 256,
        })?;
        resources.push(pending);
        Ok(ShortId::new(dir, index))
    }

    pub fn build(&self) -> Vec<u8> {
        let mut dir_table = Vec::with_capacity(self.dirs.len() * DIRECTORY_ENTRY_SIZE);
        let mut body = Vec::new();
        let base = HEADER_SIZE + self.dirs.len() * DIRECTORY_ENTRY_SIZE;

        for resources in &self.dirs {
            let table_offset = base + body.len();
            let mut payload_offset = table_offset + resources.len() * RESOURCE_ENTRY_SIZE;
            let mut table = Vec::with_capacity(resources.len() * RESOURCE_ENTRY_SIZE);
            let mut comp_buf_size = 0usize;

            for res in resources {
                let type_word = ((res.compression.tag() as u32) << 24) | (res.kind.0 & ResourceKind::MASK);
                write_u32_be(&mut table, type_word);
                write_u32_be(&mut table, res.size);
                write_u32_be(&mut table, payload_offset as u32);
                write_u32_be(&mut table, 0);
                if res.compression == Compression::Lz {
                    comp_buf_size = comp_buf_size.max(res.payload.len());
                }
                payload_offset += res.payload.len();
            }

            write_u32_be(&mut dir_table, resources.len() as u32);
            write_u32_be(&mut dir_table, comp_buf_size as u32);
            write_u32_be(&mut dir_table, table_offset as u32);
            write_u32_be(&mut dir_table, 0);

            body.extend_from_slice(&table);
            for res in resources {
                body.extend_from_slice(&res.payload);
            }
        }

        let total = base + body.len();
        let mut out = Vec::with_capacity(total);
        write_u32_be(&mut out, MAGIC);
        out.extend_from_slice(&[0; 7]);
        out.push(self.dirs.len() as u8);
        write_u32_be(&mut out, total as u32);
        out.extend_from_slice(&dir_table);
        out.extend_from_slice(&body);
        out
    }

    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<(), ArchiveError> {
        let bytes = self.build();
        debug!(path = %path.as_ref().display(), bytes = bytes.len(), "writing archive");
        fs::write(path, bytes)?;
        Ok(())
    }
}
