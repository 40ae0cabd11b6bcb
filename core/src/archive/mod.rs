//! Bolt-style resource archive: index, BOLT-LZ codec, loader and writer.

mod builder;
mod id;
mod index;
mod loader;
pub mod lz;

pub use builder::ArchiveBuilder;
pub use id::{Compression, ResourceId, ResourceKind, ShortId};
pub use index::{Archive, ArchiveHeader, DirectoryEntry, MAGIC, ResourceEntry};
pub use loader::{LoadedResource, LoaderStats, ResourceLoader};
