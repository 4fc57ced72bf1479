//! # EWFS - Read-Only Flash Filesystem
//!
//! `ewfs` mounts pre-built EWFS images stored on flash/QSPI (or any other
//! block-readable media) and serves them through a small open/read/seek/close
//! interface. Images are built once on a host and never modified on the
//! device.
//!
//! - **Fixed resources**: a fixed number of open-file slots, an index loaded
//!   once on mount
//! - **Forgery-resistant handles**: each handle carries a rolling token next to
//!   its disk id and slot index
//! - **Generated files**: index entries whose bytes are synthesized on demand
//!   by a registered [`GeneratedFile`], in chunks sized by the reader's buffer
//!
//! ## Quick Start
//!
//! ```rust
//! use ewfs::{EwfsBuilder, ImageBuilder, MemoryMedia, Result};
//!
//! # fn main() -> Result<()> {
//! let image = ImageBuilder::new()
//!     .add_static("index.html", b"<h1>hello</h1>")
//!     .add_generated("largefile.json")
//!     .build();
//!
//! let mut fs = EwfsBuilder::new(MemoryMedia::new(image)).mount(0).build()?;
//!
//! let handle = fs.open("0:/index.html")?;
//! let mut buf = [0u8; 64];
//! let n = fs.read(handle, &mut buf)?;
//! assert_eq!(&buf[..n], b"<h1>hello</h1>");
//! fs.close(handle)?;
//!
//! let generated = fs.read_file("0:/largefile.json", 512)?;
//! assert_eq!(generated.len(), 26 * 512);
//! # Ok(())
//! # }
//! ```
//!
//! ## Image Layout
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ 0   Magic "EWFS"                  4 bytes   │
//! │ 4   Version                       1 byte    │
//! │ 5   File count (LE)               2 bytes   │
//! ├─────────────────────────────────────────────┤
//! │ 7   Index: file_count × 11 bytes            │
//! │      hash(2) type(1) offset(4) length(4)    │
//! ├─────────────────────────────────────────────┤
//! │ 7 + 11n  File data, static files in index   │
//! │          order, each followed by 0x00       │
//! └─────────────────────────────────────────────┘
//! ```

pub mod core;

// Re-export core modules internally so crate:: paths in core resolve
#[allow(unused_imports)]
pub(crate) use self::core::{
    config, driver, error, filesystem, generated, handle, hash, header, image, index, media,
    table,
};

pub use crate::core::{
    config::EwfsConfig,
    driver::{FileSystemDriver, Operation},
    error::{EwfsError, Result, ResultCode},
    filesystem::Ewfs,
    generated::{AlphabetFile, Chunk, GeneratedFile, GeneratorRegistry, TextUnits},
    handle::Handle,
    hash::name_hash,
    header::VolumeHeader,
    image::ImageBuilder,
    index::{FileType, IndexEntry},
    media::{
        BlockRead, CommandHandle, CommandStatus, FileMedia, MediaDriver, MemoryMedia, MmapMedia,
        PolledMedia,
    },
};

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

/// Filesystem shared between threads behind one lock
///
/// The open-file table assumes a single logical caller; hosts with several
/// threads serialize every call through this mutex.
pub type SharedEwfs<M> = Arc<Mutex<Ewfs<M>>>;

/// Builder for configuring an [`Ewfs`] instance
///
/// # Examples
///
/// ```rust
/// use ewfs::{EwfsBuilder, MemoryMedia, TextUnits};
///
/// # fn main() -> ewfs::Result<()> {
/// let fs = EwfsBuilder::new(MemoryMedia::new(Vec::new()))
///     .max_open_files(8)
///     .generator(TextUnits::new("status.txt", ["ok\r\n"]))
///     .build()?;
/// assert!(!fs.is_mounted());
/// # Ok(())
/// # }
/// ```
pub struct EwfsBuilder<M> {
    media: M,
    config: EwfsConfig,
    generators: GeneratorRegistry,
    mount: Option<u8>,
}

impl<M: BlockRead> EwfsBuilder<M> {
    /// Default configuration with the default generated files registered
    pub fn new(media: M) -> Self {
        EwfsBuilder {
            media,
            config: EwfsConfig::default(),
            generators: GeneratorRegistry::with_defaults(),
            mount: None,
        }
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: EwfsConfig) -> Self {
        self.config = config;
        self
    }

    pub fn volume_count(mut self, volume_count: u8) -> Self {
        self.config.volume_count = volume_count;
        self
    }

    pub fn max_open_files(mut self, max_open_files: usize) -> Self {
        self.config.max_open_files = max_open_files;
        self
    }

    pub fn size_scratch_len(mut self, size_scratch_len: usize) -> Self {
        self.config.size_scratch_len = size_scratch_len;
        self
    }

    /// Start from an empty generator registry
    pub fn without_default_generators(mut self) -> Self {
        self.generators = GeneratorRegistry::new();
        self
    }

    /// Register an additional generated file
    pub fn generator<G: GeneratedFile + 'static>(mut self, file: G) -> Self {
        self.generators.register(file);
        self
    }

    /// Mount `disk_id` as part of `build`
    pub fn mount(mut self, disk_id: u8) -> Self {
        self.mount = Some(disk_id);
        self
    }

    pub fn build(self) -> Result<Ewfs<M>> {
        debug!(
            "Building EWFS: {} volumes, {} slots, generators {:?}",
            self.config.volume_count, self.config.max_open_files, self.generators
        );
        let mut fs = Ewfs::new(self.media, self.config, self.generators)?;
        if let Some(disk_id) = self.mount {
            fs.mount(disk_id)?;
            info!("Mounted disk {} during build", disk_id);
        }
        Ok(fs)
    }

    pub fn build_shared(self) -> Result<SharedEwfs<M>> {
        Ok(Arc::new(Mutex::new(self.build()?)))
    }
}

/// Format version this crate writes and expects
pub const VERSION: u8 = header::VERSION;

/// Image magic
pub const MAGIC: &[u8; 4] = &header::MAGIC;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_mounts() {
        let image = ImageBuilder::new().add_static("a.txt", b"abc").build();
        let fs = EwfsBuilder::new(MemoryMedia::new(image))
            .mount(0)
            .build()
            .unwrap();
        assert!(fs.is_mounted());
        assert_eq!(fs.header().file_count, 1);
    }

    #[test]
    fn test_builder_rejects_bad_config() {
        let result = EwfsBuilder::new(MemoryMedia::new(Vec::new()))
            .max_open_files(0)
            .build();
        assert!(matches!(result, Err(EwfsError::Config(_))));
    }

    #[test]
    fn test_builder_generators() {
        let fs = EwfsBuilder::new(MemoryMedia::new(Vec::new()))
            .without_default_generators()
            .generator(TextUnits::new("x.txt", ["x"]))
            .build()
            .unwrap();
        assert_eq!(fs.generators().len(), 1);
    }

    #[test]
    fn test_shared_handle_across_threads() {
        let image = ImageBuilder::new().add_static("a.txt", b"abc").build();
        let shared = EwfsBuilder::new(MemoryMedia::new(image))
            .mount(0)
            .build_shared()
            .unwrap();

        let worker = {
            let shared = Arc::clone(&shared);
            std::thread::spawn(move || shared.lock().read_file("0:/a.txt", 2).unwrap())
        };
        assert_eq!(worker.join().unwrap(), b"abc");
        assert_eq!(shared.lock().open_files(), 0);
    }
}
