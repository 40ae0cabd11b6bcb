pub mod archive;
pub mod config;
pub mod error;
pub mod util;
pub mod views;

// Class linker, interpreter and object table
pub mod vm;

pub use archive::{Archive, ArchiveBuilder, Compression, ResourceId, ResourceKind, ResourceLoader, ShortId};
pub use config::EngineConfig;
pub use error::{ArchiveError, DecompressError, EngineError, LinkError, VmFault};
pub use vm::{Engine, ObjectHandle, Value};
