//! Mounted EWFS volume
//!
//! Owns everything a mounted image needs: the media, the parsed header, the
//! cached index, the open-file table, the rolling handle token and the
//! generated-file registry. All operations run to completion on the caller's
//! thread; the only blocking point is the media read.

use crate::config::EwfsConfig;
use crate::driver::FileSystemDriver;
use crate::error::{EwfsError, Result};
use crate::generated::GeneratorRegistry;
use crate::handle::{Handle, HandleToken};
use crate::header::{
    is_magic, parse_file_count, VolumeHeader, FILE_COUNT_OFFSET, INDEX_OFFSET, MAGIC_OFFSET,
    VERSION, VERSION_OFFSET,
};
use crate::index::{FileIndex, FileType, IndexEntry};
use crate::media::BlockRead;
use crate::table::{FileState, HandleTable, OpenFile};
use tracing::{debug, info, trace, warn};

/// Length of the `"<digit>:/"` prefix on every open path
pub const DISK_PREFIX_LEN: usize = 3;

/// Read-only EWFS filesystem over a block-read media
pub struct Ewfs<M> {
    media: M,
    config: EwfsConfig,
    header: VolumeHeader,
    index: Option<FileIndex>,
    table: HandleTable,
    token: HandleToken,
    generators: GeneratorRegistry,
}

impl<M: BlockRead> Ewfs<M> {
    /// Create an unmounted filesystem
    pub fn new(media: M, config: EwfsConfig, generators: GeneratorRegistry) -> Result<Self> {
        config.validate()?;
        Ok(Self::unmounted(media, config, generators))
    }

    /// Default configuration and the default generated files
    pub fn with_defaults(media: M) -> Self {
        Self::unmounted(
            media,
            EwfsConfig::default(),
            GeneratorRegistry::with_defaults(),
        )
    }

    /// Assemble an unmounted instance from an already validated config
    fn unmounted(media: M, config: EwfsConfig, generators: GeneratorRegistry) -> Self {
        Ewfs {
            media,
            table: HandleTable::new(config.max_open_files),
            config,
            header: VolumeHeader::unmounted(),
            index: None,
            token: HandleToken::new(),
            generators,
        }
    }

    /// Mount the image on `disk_id`
    ///
    /// Mounting an already mounted filesystem succeeds without touching the
    /// media. An image without the magic mounts as an empty volume.
    pub fn mount(&mut self, disk_id: u8) -> Result<()> {
        if !self.config.is_valid_disk(disk_id) {
            warn!("Refusing to mount disk {}: outside configured volumes", disk_id);
            return Err(EwfsError::DiskError { disk_id });
        }
        if self.header.is_mounted() {
            debug!("Disk {} already mounted", self.header.disk_id);
            return Ok(());
        }

        self.table.clear();
        let base = self.media.base_address(disk_id);

        let mut magic = [0u8; 4];
        read_image(&mut self.media, disk_id, base, MAGIC_OFFSET, &mut magic)?;
        if !is_magic(&magic) {
            info!("Disk {} holds no EWFS image; mounted empty", disk_id);
            self.header = VolumeHeader::unformatted(disk_id, base);
            self.index = None;
            return Ok(());
        }

        let mut version = [0u8; 1];
        read_image(&mut self.media, disk_id, base, VERSION_OFFSET, &mut version)?;
        if version[0] != VERSION {
            warn!("Disk {} image version {} (expected {})", disk_id, version[0], VERSION);
        }

        let mut count = [0u8; 2];
        read_image(&mut self.media, disk_id, base, FILE_COUNT_OFFSET, &mut count)?;
        let header = VolumeHeader::formatted(disk_id, base, version[0], parse_file_count(count));

        if header.file_count == 0 {
            info!("Mounted disk {}: empty image", disk_id);
            self.header = header;
            self.index = None;
            return Ok(());
        }

        let mut raw = vec![0u8; header.index_len()];
        read_image(&mut self.media, disk_id, base, INDEX_OFFSET, &mut raw)?;
        let index = FileIndex::from_bytes(&raw);

        debug!("hash\tlength\t\toffset=>total offset\ttype");
        for entry in index.entries() {
            debug!(
                "{:04X}\t{:08X}\t{:08X}=>{:08X}\t{:?}",
                entry.hash,
                entry.length,
                entry.offset,
                entry.offset.wrapping_add(header.file_start_address),
                entry.file_type
            );
        }

        let generated = index.generated_count();
        self.header = header;
        self.index = Some(index);
        self.generators.rehash();

        info!(
            "Mounted disk {}: {} files ({} generated), data at {:#x}",
            disk_id, header.file_count, generated, header.file_start_address
        );
        Ok(())
    }

    /// Unmount `disk_id`, dropping the index and every open file
    pub fn unmount(&mut self, disk_id: u8) -> Result<()> {
        if !self.config.is_valid_disk(disk_id) || disk_id != self.header.disk_id {
            return Err(EwfsError::DiskError { disk_id });
        }

        self.header = VolumeHeader::unmounted();
        self.index = None;
        self.table.clear();
        info!("Unmounted disk {}", disk_id);
        Ok(())
    }

    /// Open `"<disk>:/<name>"` for reading
    ///
    /// Generated files are sized here by draining their generator once.
    pub fn open(&mut self, path: &str) -> Result<Handle> {
        let bytes = path.as_bytes();
        if bytes.len() < DISK_PREFIX_LEN {
            return Err(EwfsError::InvalidParameter("path lacks a disk prefix"));
        }
        let disk_id = bytes[0].wrapping_sub(b'0');
        if !self.config.is_valid_disk(disk_id) || disk_id != self.header.disk_id {
            return Err(EwfsError::InvalidParameter("path names a disk that is not mounted"));
        }

        let slot = self.table.free_slot()?;

        let name = path
            .get(DISK_PREFIX_LEN..)
            .ok_or(EwfsError::InvalidParameter("path is not valid after the disk prefix"))?;
        let entry = self
            .lookup(name)
            .ok_or_else(|| EwfsError::NoFile(name.to_string()))?;

        let handle = Handle::new(self.token.current(), disk_id, slot);
        let file = match entry.file_type {
            FileType::Static => OpenFile::new_static(
                handle,
                entry.offset.wrapping_add(self.header.file_start_address),
                entry.readable_len(),
            ),
            FileType::Generated => {
                let size = self
                    .generators
                    .total_size(entry.hash, self.config.size_scratch_len);
                OpenFile::new_generated(handle, entry.hash, size)
            }
        };
        self.table.insert(file)?;
        self.token.advance();

        debug!(
            "Opened {} ({:?}, {} bytes) as {:#010x}",
            name,
            entry.file_type,
            file.size,
            handle.raw()
        );
        Ok(handle)
    }

    /// Read into `buf`, returning the bytes delivered
    ///
    /// Only the handle's slot index is checked here; the token is not. A
    /// media failure delivers zero bytes rather than an error.
    pub fn read(&mut self, handle: Handle, buf: &mut [u8]) -> Result<usize> {
        let Some(file) = self.table.slot_mut(handle)?.as_mut() else {
            return Ok(0);
        };

        let len = buf.len().min(file.remaining as usize);
        if len == 0 {
            return Ok(0);
        }
        let dest = &mut buf[..len];

        let delivered = match &mut file.state {
            FileState::Static => {
                let address = self.header.base_address.wrapping_add(file.position);
                if self.media.read(self.header.disk_id, dest, address) {
                    len
                } else {
                    warn!("Media read of {} bytes at {:#x} failed", len, address);
                    0
                }
            }
            FileState::Generated {
                hash,
                iteration,
                carry,
            } => self.generators.read_chunk(*hash, dest, iteration, carry),
        };

        file.advance(delivered as u32);
        trace!(
            "Read {} of {} bytes from {:#010x}, {} remaining",
            delivered,
            len,
            handle.raw(),
            file.remaining
        );
        Ok(delivered)
    }

    /// Release the slot named by `handle` (slot-range check only)
    pub fn close(&mut self, handle: Handle) -> Result<()> {
        if let Some(file) = self.table.release(handle)? {
            debug!("Closed {:#010x}", file.handle.raw());
        }
        Ok(())
    }

    /// Size of the open file; 0 for an invalid handle
    pub fn size(&self, handle: Handle) -> u32 {
        self.table.get(handle).map_or(0, |f| f.size)
    }

    /// Stored position of the open file; 0 for an invalid handle
    ///
    /// Static files report their image-relative address, generated files
    /// the bytes delivered so far.
    pub fn position(&self, handle: Handle) -> u32 {
        self.table.get(handle).map_or(0, |f| f.position)
    }

    /// Move the cursor by `offset` bytes
    ///
    /// For generated files this also steps the generation back one unit and
    /// records `-offset` as carry, which only reproduces the right bytes for a
    /// backward seek inside the unit most recently read.
    pub fn seek(&mut self, handle: Handle, offset: i64) -> Result<()> {
        let file = self
            .table
            .get_mut(handle)
            .ok_or(EwfsError::InvalidParameter("invalid handle"))?;

        let remaining = i64::from(file.remaining) - offset;
        if offset.unsigned_abs() > u64::from(file.size)
            || remaining < 0
            || remaining > i64::from(file.size)
        {
            warn!(
                "Rejected seek by {} on {:#010x} ({} of {} bytes remaining)",
                offset,
                handle.raw(),
                file.remaining,
                file.size
            );
            return Err(EwfsError::SeekOutOfRange {
                offset,
                size: file.size,
            });
        }

        file.position = (i64::from(file.position) + offset) as u32;
        file.remaining = remaining as u32;
        if let FileState::Generated {
            iteration, carry, ..
        } = &mut file.state
        {
            *iteration = iteration.saturating_sub(1);
            *carry = -offset;
        }

        trace!("Seeked {:#010x} by {}", handle.raw(), offset);
        Ok(())
    }

    /// Open `path`, read it to the end in `chunk_len` reads and close it
    pub fn read_file(&mut self, path: &str, chunk_len: usize) -> Result<Vec<u8>> {
        if chunk_len == 0 {
            return Err(EwfsError::InvalidParameter("chunk length must be non-zero"));
        }
        let handle = self.open(path)?;
        let mut content = Vec::with_capacity(self.size(handle) as usize);
        let mut chunk = vec![0u8; chunk_len];
        let result = loop {
            match self.read(handle, &mut chunk) {
                Ok(0) => break Ok(()),
                Ok(n) => content.extend_from_slice(&chunk[..n]),
                Err(e) => break Err(e),
            }
        };
        self.close(handle)?;
        result.map(|()| content)
    }

    /// Index entry for `name`, first hash match wins
    pub fn lookup(&self, name: &str) -> Option<IndexEntry> {
        let index = self.index.as_ref()?;
        index.find(name).and_then(|i| index.get(i)).copied()
    }

    /// Loaded index entries, empty when nothing is mounted
    pub fn entries(&self) -> &[IndexEntry] {
        self.index.as_ref().map_or(&[], FileIndex::entries)
    }

    /// Header of the mounted volume
    pub fn header(&self) -> &VolumeHeader {
        &self.header
    }

    /// Whether a disk is currently mounted
    pub fn is_mounted(&self) -> bool {
        self.header.is_mounted()
    }

    /// Whether `handle` names an open file exactly
    pub fn is_valid(&self, handle: Handle) -> bool {
        self.table.is_valid(handle)
    }

    /// Number of occupied open-file slots
    pub fn open_files(&self) -> usize {
        self.table.open_count()
    }

    /// Active configuration
    pub fn config(&self) -> &EwfsConfig {
        &self.config
    }

    /// Registered generated files
    pub fn generators(&self) -> &GeneratorRegistry {
        &self.generators
    }

    /// Registered generated files, mutably
    pub fn generators_mut(&mut self) -> &mut GeneratorRegistry {
        &mut self.generators
    }

    /// Backing media
    pub fn media(&self) -> &M {
        &self.media
    }

    /// Backing media, mutably
    pub fn media_mut(&mut self) -> &mut M {
        &mut self.media
    }

    /// Consume the filesystem and return its media
    pub fn into_media(self) -> M {
        self.media
    }
}

fn read_image<M: BlockRead>(
    media: &mut M,
    disk_id: u8,
    base: u32,
    offset: u32,
    dest: &mut [u8],
) -> Result<()> {
    let address = base.wrapping_add(offset);
    if media.read(disk_id, dest, address) {
        Ok(())
    } else {
        warn!("Mount read of {} bytes at {:#x} failed", dest.len(), address);
        Err(EwfsError::DiskRead {
            address,
            len: dest.len(),
        })
    }
}

impl<M: BlockRead> FileSystemDriver for Ewfs<M> {
    fn mount(&mut self, disk_id: u8) -> Result<()> {
        Ewfs::mount(self, disk_id)
    }

    fn unmount(&mut self, disk_id: u8) -> Result<()> {
        Ewfs::unmount(self, disk_id)
    }

    fn open(&mut self, path: &str) -> Result<Handle> {
        Ewfs::open(self, path)
    }

    fn read(&mut self, handle: Handle, buf: &mut [u8]) -> Result<usize> {
        Ewfs::read(self, handle, buf)
    }

    fn close(&mut self, handle: Handle) -> Result<()> {
        Ewfs::close(self, handle)
    }

    fn seek(&mut self, handle: Handle, offset: i64) -> Result<()> {
        Ewfs::seek(self, handle, offset)
    }

    fn tell(&self, handle: Handle) -> u32 {
        self.position(handle)
    }

    fn size(&self, handle: Handle) -> u32 {
        Ewfs::size(self, handle)
    }
}
