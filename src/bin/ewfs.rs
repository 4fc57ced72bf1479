//! EWFS image inspector
//!
//! Mounts an image file and lists its index or dumps one file to stdout

use anyhow::{bail, Context};
use clap::Parser;
use ewfs::{EwfsBuilder, EwfsConfig, FileType, MmapMedia};
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "ewfs")]
#[command(about = "Inspect and read EWFS flash filesystem images")]
struct Args {
    /// Path to the image file
    image: PathBuf,

    /// File to read, relative to the image root
    path: Option<String>,

    /// Disk id the image is mounted as
    #[arg(short = 'd', long, default_value = "0")]
    disk: u8,

    /// TOML driver configuration
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Read buffer size in bytes
    #[arg(long, default_value = "512")]
    chunk: usize,

    /// Print the index instead of reading a file
    #[arg(short = 'l', long)]
    list: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    if args.disk > 9 {
        bail!("disk id {} does not fit a single-digit path prefix", args.disk);
    }

    let mut config = match &args.config {
        Some(path) => EwfsConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EwfsConfig::default(),
    };
    // Always allow the requested disk
    config.volume_count = config.volume_count.max(args.disk.saturating_add(1));

    info!("Opening image {:?} as disk {}", args.image, args.disk);
    let media = MmapMedia::open(&args.image)
        .with_context(|| format!("mapping {}", args.image.display()))?;
    let mut fs = EwfsBuilder::new(media)
        .config(config)
        .mount(args.disk)
        .build()
        .context("mounting image")?;

    if args.list || args.path.is_none() {
        let header = fs.header();
        println!(
            "version {} | {} files | data at {:#x}",
            header.version, header.file_count, header.file_start_address
        );
        println!("hash  type       offset      length");
        for entry in fs.entries() {
            let kind = match entry.file_type {
                FileType::Static => "static",
                FileType::Generated => "generated",
            };
            println!(
                "{:04X}  {:<9}  {:#010x}  {}",
                entry.hash, kind, entry.offset, entry.length
            );
        }
        return Ok(());
    }

    let Some(name) = args.path.as_deref() else {
        bail!("no file given");
    };
    let path = format!("{}:/{}", args.disk, name.trim_start_matches('/'));
    let content = fs
        .read_file(&path, args.chunk)
        .with_context(|| format!("reading {}", path))?;

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&content)?;
    stdout.flush()?;
    Ok(())
}
