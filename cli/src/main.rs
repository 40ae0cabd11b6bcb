use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Once;

use anyhow::Context;
use clap::{Parser, Subcommand};
use relic_core::{
    Archive, EngineConfig, ResourceId, ResourceKind, ResourceLoader, ShortId,
    archive::Compression,
};
use serde::Serialize;

mod manifest;
mod runner;

static TRACE_INIT: Once = Once::new();
const DEFAULT_TRACE_FILTER: &str = "relic_core=debug,relic=info";

#[derive(Debug, Parser)]
#[command(
    name = "relic",
    author,
    version,
    about = "Inspect, build and run resource archives",
    long_about = None
)]
struct CliArgs {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List directories and resources of an archive.
    Info {
        #[arg(value_name = "ARCHIVE")]
        archive: PathBuf,
        /// Print machine-readable JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Write one decoded resource to a file or stdout.
    Extract {
        #[arg(value_name = "ARCHIVE")]
        archive: PathBuf,
        /// Resource id as `DD:II` (hex) or a number
        #[arg(value_name = "ID", value_parser = parse_short_id)]
        id: ShortId,
        /// Expected kind (name or number); checked before decoding
        #[arg(long, value_parser = parse_kind)]
        kind: Option<ResourceKind>,
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Build an archive from a TOML manifest.
    Pack {
        #[arg(value_name = "MANIFEST")]
        manifest: PathBuf,
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },
    /// Create a program object and send it messages.
    Run {
        #[arg(value_name = "ARCHIVE")]
        archive: PathBuf,
        /// Class program id as `DD:II` (hex) or a number
        #[arg(value_name = "CLASS", value_parser = parse_short_id)]
        class: ShortId,
        /// Engine configuration file (TOML)
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
        /// Object slot; defaults to the first free program slot
        #[arg(long)]
        slot: Option<usize>,
        /// Message to send after creation, as `MSG` or `MSG:arg,arg,...`; repeatable
        #[arg(long = "send", value_name = "MSG", value_parser = parse_send)]
        sends: Vec<runner::SendSpec>,
        /// Fault on messages the class does not handle
        #[arg(long)]
        strict: bool,
        /// Seed for the random natives
        #[arg(long)]
        seed: Option<u64>,
    },
}

/// `DD:II` in hex, or a plain (decimal or `0x`) short id.
fn parse_short_id(raw: &str) -> Result<ShortId, String> {
    let raw = raw.trim();
    if let Some((dir, index)) = raw.split_once(':') {
        let dir = u8::from_str_radix(dir, 16).map_err(|e| format!("bad directory `{dir}`: {e}"))?;
        let index = u8::from_str_radix(index, 16).map_err(|e| format!("bad index `{index}`: {e}"))?;
        return Ok(ShortId::new(dir, index));
    }
    parse_number(raw)
        .and_then(|n| u16::try_from(n).ok())
        .map(ShortId)
        .ok_or_else(|| format!("`{raw}` is not a resource id"))
}

fn parse_number(raw: &str) -> Option<u64> {
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => raw.parse().ok(),
    }
}

fn parse_kind(raw: &str) -> Result<ResourceKind, String> {
    ResourceKind::from_name(raw)
        .or_else(|| parse_number(raw).and_then(|n| u32::try_from(n).ok()).map(ResourceKind))
        .ok_or_else(|| format!("unknown resource kind `{raw}`"))
}

fn parse_send(raw: &str) -> Result<runner::SendSpec, String> {
    let (message, args) = match raw.split_once(':') {
        Some((message, args)) => (message, args),
        None => (raw, ""),
    };
    let message = message
        .trim()
        .parse::<u16>()
        .map_err(|e| format!("bad message number `{message}`: {e}"))?;
    let args = args
        .split(',')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(|a| a.parse::<i32>().map_err(|e| format!("bad argument `{a}`: {e}")))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(runner::SendSpec { message, args })
}

fn env_toggle_enabled(raw: &str) -> bool {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return false;
    }
    !(trimmed.eq_ignore_ascii_case("0") || trimmed.eq_ignore_ascii_case("false") || trimmed.eq_ignore_ascii_case("off"))
}

fn filter_expr_from(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("1")
        || trimmed.eq_ignore_ascii_case("true")
        || trimmed.eq_ignore_ascii_case("on")
    {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// `RELIC_TRACE` enables logging (`1`/`true`/`on` or a filter); otherwise `RUST_LOG` does.
fn init_tracing() {
    let filter_expr = match std::env::var("RELIC_TRACE") {
        Ok(raw) if env_toggle_enabled(&raw) => {
            Some(filter_expr_from(&raw).unwrap_or_else(|| DEFAULT_TRACE_FILTER.to_string()))
        }
        Ok(_) => return,
        Err(_) => std::env::var("RUST_LOG").ok(),
    };
    let Some(filter_expr) = filter_expr else {
        return;
    };

    TRACE_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        use tracing_subscriber::fmt;

        let builder = fmt().with_writer(std::io::stderr);
        let builder = match EnvFilter::try_new(&filter_expr) {
            Ok(filter) => builder.with_env_filter(filter),
            Err(_) => builder.with_env_filter(DEFAULT_TRACE_FILTER),
        };
        let _ = builder.try_init();
    });
}

#[derive(Debug, Serialize)]
struct ArchiveInfo {
    file_size: u32,
    directories: Vec<DirectoryInfo>,
}

#[derive(Debug, Serialize)]
struct DirectoryInfo {
    index: u8,
    comp_buf_size: u32,
    resources: Vec<ResourceInfo>,
}

#[derive(Debug, Serialize)]
struct ResourceInfo {
    id: String,
    kind: String,
    compression: Option<Compression>,
    size: u32,
    offset: u32,
}

fn collect_info(path: &Path) -> anyhow::Result<ArchiveInfo> {
    let mut archive = Archive::open(path).with_context(|| format!("Failed to open archive '{}'", path.display()))?;
    let mut directories = Vec::new();
    for dir in 0..archive.dir_count() as u8 {
        let comp_buf_size = archive.directory(dir).map_or(0, |d| d.comp_buf_size);
        let entries = archive
            .ensure_directory_loaded(dir)
            .with_context(|| format!("Failed to read resource table of directory {dir}"))?;
        let resources = entries
            .iter()
            .enumerate()
            .map(|(index, entry)| ResourceInfo {
                id: ShortId::new(dir, index as u8).to_string(),
                kind: entry.kind.to_string(),
                compression: entry.compression(),
                size: entry.size,
                offset: entry.offset,
            })
            .collect();
        directories.push(DirectoryInfo {
            index: dir,
            comp_buf_size,
            resources,
        });
    }
    Ok(ArchiveInfo {
        file_size: archive.header().file_size,
        directories,
    })
}

fn print_info(info: &ArchiveInfo) {
    println!("{} directories, {} bytes", info.directories.len(), info.file_size);
    for dir in &info.directories {
        println!(
            "directory {:02X}: {} resources, compressed buffer {} bytes",
            dir.index,
            dir.resources.len(),
            dir.comp_buf_size
        );
        for res in &dir.resources {
            let compression = match res.compression {
                Some(Compression::Lz) => "lz",
                Some(Compression::Raw) => "raw",
                None => "?",
            };
            println!(
                "  {}  {:<20} {:<4} {:>8} bytes @ 0x{:08X}",
                res.id, res.kind, compression, res.size, res.offset
            );
        }
    }
}

fn extract(archive: &Path, id: ShortId, kind: Option<ResourceKind>, output: Option<&Path>) -> anyhow::Result<()> {
    let mut loader =
        ResourceLoader::open(archive, 0).with_context(|| format!("Failed to open archive '{}'", archive.display()))?;
    let res = match kind {
        Some(kind) => loader.load_short(id, kind),
        None => loader.load_any(id),
    }
    .with_context(|| format!("Failed to load resource {id}"))?;
    tracing::info!(%id, kind = %res.kind, size = res.data.len(), "extracted resource");
    match output {
        Some(path) => std::fs::write(path, &res.data).with_context(|| format!("Failed to write '{}'", path.display())),
        None => std::io::stdout()
            .write_all(&res.data)
            .context("Failed to write resource to stdout"),
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let CliArgs { command } = CliArgs::parse();
    match command {
        Commands::Info { archive, json } => {
            let info = collect_info(&archive)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                print_info(&info);
            }
        }
        Commands::Extract {
            archive,
            id,
            kind,
            output,
        } => extract(&archive, id, kind, output.as_deref())?,
        Commands::Pack { manifest, output } => {
            let builder = manifest::load(&manifest)?;
            builder
                .write_to(&output)
                .with_context(|| format!("Failed to write archive '{}'", output.display()))?;
            println!("wrote {}", output.display());
        }
        Commands::Run {
            archive,
            class,
            config,
            slot,
            sends,
            strict,
            seed,
        } => {
            let mut cfg = match &config {
                Some(path) => EngineConfig::load(path).with_context(|| format!("Failed to load config '{}'", path.display()))?,
                None => EngineConfig::default(),
            };
            cfg.strict_dispatch |= strict;
            if seed.is_some() {
                cfg.rng_seed = seed;
            }
            runner::run(&archive, ResourceId::from(class), slot, &sends, cfg)?;
        }
    }
    Ok(())
}
