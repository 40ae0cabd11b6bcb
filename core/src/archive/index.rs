//! Archive header and directory index.
//!
//! Layout (all fields big-endian):
//!
//! ```text
//! 0x00  magic   u32 = 'BOLT'
//! 0x04  reserved[7]
//! 0x0B  dir_count u8
//! 0x0C  file_size u32
//! 0x10  DirectoryEntry[dir_count]  (16 bytes each)
//!
//! DirectoryEntry: resource_count u32, comp_buf_size u32, table_offset u32, reserved u32
//! ResourceEntry:  type u32 (compression << 24 | kind), size u32, offset u32, reserved u32
//! ```

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use tracing::{debug, trace, warn};

use crate::error::ArchiveError;
use crate::util::bytes::DataView;

use super::id::{Compression, ResourceId, ResourceKind, ShortId};

pub const MAGIC: u32 = u32::from_be_bytes(*b"BOLT");
pub const HEADER_SIZE: usize = 0x10;
pub const DIRECTORY_ENTRY_SIZE: usize = 0x10;
pub const RESOURCE_ENTRY_SIZE: usize = 0x10;
/// Entries past index 255 cannot be named by a [`ShortId`].
pub const MAX_RESOURCES_PER_DIRECTORY: u32 = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveHeader {
    pub magic: u32,
    pub dir_count: u8,
    pub file_size: u32,
}

impl ArchiveHeader {
    pub fn parse(bytes: &[u8]) -> Result<Self, ArchiveError> {
        let view = DataView::new(bytes);
        let truncated = |_| ArchiveError::Truncated { what: "archive header" };
        let magic = view.u32_be(0).map_err(truncated)?;
        if magic != MAGIC {
            return Err(ArchiveError::BadMagic {
                found: magic,
                expected: MAGIC,
            });
        }
        Ok(Self {
            magic,
            dir_count: view.u8(0x0B).map_err(truncated)?,
            file_size: view.u32_be(0x0C).map_err(truncated)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub resource_count: u32,
    /// Bytes to read for any compressed resource in this directory.
    pub comp_buf_size: u32,
    pub table_offset: u32,
}

impl DirectoryEntry {
    fn parse(view: DataView<'_>) -> Result<Self, ArchiveError> {
        let truncated = |_| ArchiveError::Truncated { what: "directory entry" };
        Ok(Self {
            resource_count: view.u32_be(0).map_err(truncated)?,
            comp_buf_size: view.u32_be(4).map_err(truncated)?,
            table_offset: view.u32_be(8).map_err(truncated)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceEntry {
    /// Raw compression byte; see [`ResourceEntry::compression`].
    pub compression_tag: u8,
    pub kind: ResourceKind,
    /// Decompressed size.
    pub size: u32,
    /// Absolute offset of the (possibly compressed) payload.
    pub offset: u32,
}

impl ResourceEntry {
    fn parse(view: DataView<'_>) -> Result<Self, ArchiveError> {
        let truncated = |_| ArchiveError::Truncated { what: "resource entry" };
        let type_word = view.u32_be(0).map_err(truncated)?;
        Ok(Self {
            compression_tag: (type_word >> 24) as u8,
            kind: ResourceKind(type_word & ResourceKind::MASK),
            size: view.u32_be(4).map_err(truncated)?,
            offset: view.u32_be(8).map_err(truncated)?,
        })
    }

    pub fn compression(&self) -> Option<Compression> {
        Compression::from_tag(self.compression_tag)
    }
}

#[derive(Debug)]
struct Directory {
    entry: DirectoryEntry,
    resources: Option<Vec<ResourceEntry>>,
}

/// An open archive. Resource tables are parsed on first use of each directory.
#[derive(Debug)]
pub struct Archive<R = BufReader<File>> {
    reader: R,
    /// Actual stream length; every read is clipped to it.
    len: u64,
    header: ArchiveHeader,
    dirs: Vec<Directory>,
}

impl Archive<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ArchiveError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "opening archive");
        Self::from_reader(BufReader::new(File::open(path)?))
    }
}

impl<R: Read + Seek> Archive<R> {
    pub fn from_reader(mut reader: R) -> Result<Self, ArchiveError> {
        reader.seek(SeekFrom::Start(0))?;
        let mut raw = [0u8; HEADER_SIZE];
        read_exact_or(&mut reader, &mut raw, "archive header")?;
        let header = ArchiveHeader::parse(&raw)?;

        let actual_len = reader.seek(SeekFrom::End(0))?;
        if actual_len != header.file_size as u64 {
            warn!(
                declared = header.file_size,
                actual = actual_len,
                "archive size does not match header"
            );
        }

        reader.seek(SeekFrom::Start(HEADER_SIZE as u64))?;
        let mut table = vec![0u8; header.dir_count as usize * DIRECTORY_ENTRY_SIZE];
        read_exact_or(&mut reader, &mut table, "directory table")?;
        let dirs = table
            .chunks_exact(DIRECTORY_ENTRY_SIZE)
            .map(|chunk| {
                DirectoryEntry::parse(DataView::new(chunk)).map(|entry| Directory {
                    entry,
                    resources: None,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(dirs = dirs.len(), "archive index loaded");
        Ok(Self {
            reader,
            len: actual_len,
            header,
            dirs,
        })
    }

    pub fn header(&self) -> &ArchiveHeader {
        &self.header
    }

    pub fn dir_count(&self) -> usize {
        self.dirs.len()
    }

    pub fn directory(&self, dir: u8) -> Option<&DirectoryEntry> {
        self.dirs.get(dir as usize).map(|d| &d.entry)
    }

    /// Parse a directory's resource table if it has not been parsed yet.
    pub fn ensure_directory_loaded(&mut self, dir: u8) -> Result<&[ResourceEntry], ArchiveError> {
        let directory = self
            .dirs
            .get_mut(dir as usize)
            .ok_or(ArchiveError::UnknownResource {
                id: ShortId::new(dir, 0).into(),
            })?;

        if directory.resources.is_none() {
            let entry = directory.entry;
            trace!(dir, count = entry.resource_count, "loading resource table");
            let len = (entry.resource_count as usize)
                .checked_mul(RESOURCE_ENTRY_SIZE)
                .ok_or(ArchiveError::Truncated { what: "resource table" })?;
            let raw = read_span(&mut self.reader, self.len, entry.table_offset as u64, len)?;
            if raw.len() < len {
                return Err(ArchiveError::Truncated { what: "resource table" });
            }
            if entry.resource_count > MAX_RESOURCES_PER_DIRECTORY {
                warn!(
                    dir,
                    count = entry.resource_count,
                    "resource table is longer than a short id can address; extra entries ignored"
                );
            }
            let resources = raw
                .chunks_exact(RESOURCE_ENTRY_SIZE)
                .take(MAX_RESOURCES_PER_DIRECTORY as usize)
                .map(|chunk| ResourceEntry::parse(DataView::new(chunk)))
                .collect::<Result<Vec<_>, _>>()?;
            directory.resources = Some(resources);
        }

        Ok(directory.resources.as_deref().unwrap_or_default())
    }

    /// Entry for `id`, or `UnknownResource` when either index is out of range.
    pub fn entry(&mut self, id: ShortId) -> Result<ResourceEntry, ArchiveError> {
        let unknown = ArchiveError::UnknownResource {
            id: ResourceId::from(id),
        };
        if id.dir() as usize >= self.dirs.len() {
            return Err(unknown);
        }
        self.ensure_directory_loaded(id.dir())?
            .get(id.index() as usize)
            .copied()
            .ok_or(unknown)
    }

    /// Read up to `len` bytes at `offset`; a short read at end of file is not an error.
    pub fn read_span(&mut self, offset: u64, len: usize) -> Result<Vec<u8>, ArchiveError> {
        read_span(&mut self.reader, self.len, offset, len)
    }

    /// Length of the underlying stream.
    pub fn stream_len(&self) -> u64 {
        self.len
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

fn read_span<R: Read + Seek>(
    reader: &mut R,
    stream_len: u64,
    offset: u64,
    len: usize,
) -> Result<Vec<u8>, ArchiveError> {
    // declared lengths are untrusted; never reserve past the end of the stream
    let len = (len as u64).min(stream_len.saturating_sub(offset)) as usize;
    reader.seek(SeekFrom::Start(offset))?;
    let mut buf = Vec::with_capacity(len);
    reader.by_ref().take(len as u64).read_to_end(&mut buf)?;
    Ok(buf)
}

fn read_exact_or<R: Read>(reader: &mut R, buf: &mut [u8], what: &'static str) -> Result<(), ArchiveError> {
    reader.read_exact(buf).map_err(|err| match err.kind() {
        std::io::ErrorKind::UnexpectedEof => ArchiveError::Truncated { what },
        _ => ArchiveError::Io(err),
    })
}
