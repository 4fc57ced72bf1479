//! Driver interface consumed by a filesystem-mounting host
//!
//! A host mounts volumes and forwards file calls through this trait. EWFS
//! images are read-only, so the mutating and directory operations keep their
//! default bodies, which report the operation as unsupported.

use crate::error::{EwfsError, Result};
use crate::handle::Handle;

/// Driver operations a host may call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Mount,
    Unmount,
    Open,
    Read,
    Close,
    Seek,
    Tell,
    Size,
    Write,
    Remove,
    Mkdir,
    Rename,
    Format,
    OpenDir,
}

impl Operation {
    /// Operations an EWFS driver implements
    pub const SUPPORTED: [Operation; 8] = [
        Operation::Mount,
        Operation::Unmount,
        Operation::Open,
        Operation::Read,
        Operation::Close,
        Operation::Seek,
        Operation::Tell,
        Operation::Size,
    ];

    pub fn is_supported(self) -> bool {
        Self::SUPPORTED.contains(&self)
    }
}

pub trait FileSystemDriver {
    fn mount(&mut self, disk_id: u8) -> Result<()>;

    fn unmount(&mut self, disk_id: u8) -> Result<()>;

    /// Open `"<disk>:/<path>"`
    fn open(&mut self, path: &str) -> Result<Handle>;

    /// Read up to `buf.len()` bytes; returns the count delivered
    fn read(&mut self, handle: Handle, buf: &mut [u8]) -> Result<usize>;

    fn close(&mut self, handle: Handle) -> Result<()>;

    fn seek(&mut self, handle: Handle, offset: i64) -> Result<()>;

    /// Position of the open file, 0 for an invalid handle
    fn tell(&self, handle: Handle) -> u32;

    /// Size of the open file, 0 for an invalid handle
    fn size(&self, handle: Handle) -> u32;

    fn write(&mut self, _handle: Handle, _buf: &[u8]) -> Result<usize> {
        Err(EwfsError::Unsupported(Operation::Write))
    }

    fn remove(&mut self, _path: &str) -> Result<()> {
        Err(EwfsError::Unsupported(Operation::Remove))
    }

    fn mkdir(&mut self, _path: &str) -> Result<()> {
        Err(EwfsError::Unsupported(Operation::Mkdir))
    }

    fn rename(&mut self, _from: &str, _to: &str) -> Result<()> {
        Err(EwfsError::Unsupported(Operation::Rename))
    }

    fn format(&mut self, _disk_id: u8) -> Result<()> {
        Err(EwfsError::Unsupported(Operation::Format))
    }

    fn open_dir(&mut self, _path: &str) -> Result<Handle> {
        Err(EwfsError::Unsupported(Operation::OpenDir))
    }
}
