//! TOML manifest for `relic pack`.
//!
//! ```toml
//! [[directory]]
//! [[directory.resource]]
//! kind = "palette"        # or a number
//! compression = "raw"     # default "lz"
//! file = "pal.bin"        # or `bytes = [..]` or `text = ".."`
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use relic_core::archive::Compression;
use relic_core::{ArchiveBuilder, ResourceKind};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default, rename = "directory")]
    pub directories: Vec<DirectorySpec>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DirectorySpec {
    #[serde(default, rename = "resource")]
    pub resources: Vec<ResourceSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceSpec {
    pub kind: KindSpec,
    #[serde(default = "default_compression")]
    pub compression: Compression,
    pub file: Option<PathBuf>,
    pub bytes: Option<Vec<u8>>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum KindSpec {
    Number(u32),
    Name(String),
}

fn default_compression() -> Compression {
    Compression::Lz
}

impl KindSpec {
    pub fn resolve(&self) -> Result<ResourceKind> {
        match self {
            KindSpec::Number(n) => Ok(ResourceKind(*n)),
            KindSpec::Name(name) => ResourceKind::from_name(name).ok_or_else(|| anyhow!("unknown resource kind '{name}'")),
        }
    }
}

impl ResourceSpec {
    /// Payload bytes; `file` is relative to `base`.
    fn payload(&self, base: &Path) -> Result<Vec<u8>> {
        match (&self.file, &self.bytes, &self.text) {
            (Some(file), None, None) => {
                let path = base.join(file);
                fs::read(&path).with_context(|| format!("Failed to read '{}'", path.display()))
            }
            (None, Some(bytes), None) => Ok(bytes.clone()),
            (None, None, Some(text)) => Ok(text.as_bytes().to_vec()),
            _ => bail!("a resource needs exactly one of `file`, `bytes` or `text`"),
        }
    }
}

impl Manifest {
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).context("Invalid manifest")
    }

    /// Resources land at `DD:II` in manifest order.
    pub fn to_builder(&self, base: &Path) -> Result<ArchiveBuilder> {
        let mut builder = ArchiveBuilder::new();
        for (d, dir_spec) in self.directories.iter().enumerate() {
            let dir = builder.add_directory()?;
            for (i, res) in dir_spec.resources.iter().enumerate() {
                let kind = res.kind.resolve()?;
                let data = res.payload(base).with_context(|| format!("directory {d}, resource {i}"))?;
                let id = builder.add(dir, kind, res.compression, &data)?;
                tracing::debug!(%id, %kind, size = data.len(), "packed resource");
            }
        }
        Ok(builder)
    }
}

pub fn load(path: &Path) -> Result<ArchiveBuilder> {
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read manifest '{}'", path.display()))?;
    let manifest = Manifest::parse(&text)?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    manifest.to_builder(base)
}
