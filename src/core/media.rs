//! Block-read media backing a mounted image
//!
//! The filesystem only ever asks for "these bytes at this address"; where the
//! bytes live (RAM, a host file, a memory map, a DMA-driven flash part) is the
//! media's business. Every read is blocking and reports plain success or
//! failure.

use memmap2::Mmap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::{trace, warn};

/// Blocking block-read capability
pub trait BlockRead {
    /// Fill `dest` with `dest.len()` bytes starting at media `address`
    fn read(&mut self, disk_id: u8, dest: &mut [u8], address: u32) -> bool;

    /// Address of the image inside the media's address space
    fn base_address(&self, _disk_id: u8) -> u32 {
        0
    }
}

impl<M: BlockRead + ?Sized> BlockRead for Box<M> {
    fn read(&mut self, disk_id: u8, dest: &mut [u8], address: u32) -> bool {
        (**self).read(disk_id, dest, address)
    }

    fn base_address(&self, disk_id: u8) -> u32 {
        (**self).base_address(disk_id)
    }
}

/// Image held in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryMedia {
    data: Vec<u8>,
    base_address: u32,
    reads: usize,
}

impl MemoryMedia {
    pub fn new(data: Vec<u8>) -> Self {
        MemoryMedia {
            data,
            base_address: 0,
            reads: 0,
        }
    }

    /// Place the image at `base_address` in the media address space
    pub fn with_base_address(mut self, base_address: u32) -> Self {
        self.base_address = base_address;
        self
    }

    /// Number of read commands served so far
    pub fn reads(&self) -> usize {
        self.reads
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl BlockRead for MemoryMedia {
    fn read(&mut self, _disk_id: u8, dest: &mut [u8], address: u32) -> bool {
        self.reads += 1;
        copy_range(&self.data, self.base_address, dest, address)
    }

    fn base_address(&self, _disk_id: u8) -> u32 {
        self.base_address
    }
}

/// Image stored in a host file
pub struct FileMedia {
    file: File,
    path: PathBuf,
}

impl FileMedia {
    pub fn open<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let file = File::open(&path)?;
        Ok(FileMedia {
            file,
            path: path.as_ref().to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BlockRead for FileMedia {
    fn read(&mut self, _disk_id: u8, dest: &mut [u8], address: u32) -> bool {
        let result = self
            .file
            .seek(SeekFrom::Start(u64::from(address)))
            .and_then(|_| self.file.read_exact(dest));
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    "Read of {} bytes at {:#x} from {:?} failed: {}",
                    dest.len(),
                    address,
                    self.path,
                    e
                );
                false
            }
        }
    }
}

/// Image mapped read-only into memory
pub struct MmapMedia {
    map: Mmap,
}

impl MmapMedia {
    pub fn open<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let file = File::open(path)?;
        // Safety: the mapping is read-only and images are not rewritten while mounted
        let map = unsafe { Mmap::map(&file)? };
        Ok(MmapMedia { map })
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl BlockRead for MmapMedia {
    fn read(&mut self, _disk_id: u8, dest: &mut [u8], address: u32) -> bool {
        copy_range(&self.map, 0, dest, address)
    }
}

fn copy_range(image: &[u8], base_address: u32, dest: &mut [u8], address: u32) -> bool {
    let Some(start) = address.checked_sub(base_address) else {
        return false;
    };
    let start = start as usize;
    match start
        .checked_add(dest.len())
        .and_then(|end| image.get(start..end))
    {
        Some(src) => {
            dest.copy_from_slice(src);
            true
        }
        None => false,
    }
}

/// Status of a queued media command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    Queued,
    InProgress,
    Completed,
    Error,
    Unknown,
}

impl CommandStatus {
    pub fn is_pending(self) -> bool {
        matches!(self, CommandStatus::Queued | CommandStatus::InProgress)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandHandle(pub u32);

/// Queue-based media manager (flash/QSPI with DMA completion)
pub trait MediaDriver {
    /// Queue a read; `None` when the command cannot be queued
    fn submit_read(&mut self, disk_id: u8, len: usize, address: u32) -> Option<CommandHandle>;

    /// Run the transfer task once and report the command's status
    ///
    /// Data for a completed command lands in `dest`.
    fn poll(&mut self, disk_id: u8, handle: CommandHandle, dest: &mut [u8]) -> CommandStatus;

    fn base_address(&self, _disk_id: u8) -> u32 {
        0
    }
}

/// Adapts a queue-based driver to blocking reads by polling until a terminal status
pub struct PolledMedia<D> {
    driver: D,
}

impl<D: MediaDriver> PolledMedia<D> {
    pub fn new(driver: D) -> Self {
        PolledMedia { driver }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn into_inner(self) -> D {
        self.driver
    }
}

impl<D: MediaDriver> BlockRead for PolledMedia<D> {
    fn read(&mut self, disk_id: u8, dest: &mut [u8], address: u32) -> bool {
        let Some(handle) = self.driver.submit_read(disk_id, dest.len(), address) else {
            warn!("Media refused read of {} bytes at {:#x}", dest.len(), address);
            return false;
        };

        let mut polls = 0usize;
        let status = loop {
            let status = self.driver.poll(disk_id, handle, dest);
            polls += 1;
            if !status.is_pending() {
                break status;
            }
        };
        trace!("Read command {:?} finished as {:?} after {} polls", handle, status, polls);

        status == CommandStatus::Completed
    }

    fn base_address(&self, disk_id: u8) -> u32 {
        self.driver.base_address(disk_id)
    }
}
