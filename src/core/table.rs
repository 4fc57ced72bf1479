//! Fixed-capacity open-file table
//!
//! Slot index and handle are tied together: a handle names its slot in the
//! low 16 bits. Capacity is fixed at construction, and once every slot is in
//! use further opens fail instead of growing the table.

use crate::error::{EwfsError, Result};
use crate::handle::Handle;
use crate::index::FileType;

/// Per-type cursor state of an open file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    /// Bytes come from the image data region
    Static,
    /// Bytes come from the generator registered under `hash`
    Generated {
        hash: u16,
        /// Next unit to generate
        iteration: u16,
        /// Bytes of the regenerated unit to hand back after a backward seek
        carry: i64,
    },
}

/// One open file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenFile {
    pub handle: Handle,
    /// Image-relative address for static files, bytes delivered for generated ones
    pub position: u32,
    pub remaining: u32,
    pub size: u32,
    pub state: FileState,
}

impl OpenFile {
    pub fn new_static(handle: Handle, position: u32, size: u32) -> Self {
        OpenFile {
            handle,
            position,
            remaining: size,
            size,
            state: FileState::Static,
        }
    }

    pub fn new_generated(handle: Handle, hash: u16, size: u32) -> Self {
        OpenFile {
            handle,
            position: 0,
            remaining: size,
            size,
            state: FileState::Generated {
                hash,
                iteration: 0,
                carry: 0,
            },
        }
    }

    pub fn file_type(&self) -> FileType {
        match self.state {
            FileState::Static => FileType::Static,
            FileState::Generated { .. } => FileType::Generated,
        }
    }

    /// Record `n` delivered bytes
    pub fn advance(&mut self, n: u32) {
        self.position = self.position.wrapping_add(n);
        self.remaining = self.remaining.saturating_sub(n);
    }
}

/// Open-file slots
#[derive(Debug)]
pub struct HandleTable {
    slots: Box<[Option<OpenFile>]>,
}

impl HandleTable {
    /// `capacity` may not exceed the 16-bit slot field
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.min(usize::from(u16::MAX) + 1);
        HandleTable {
            slots: vec![None; capacity].into_boxed_slice(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn open_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// First free slot
    pub fn free_slot(&self) -> Result<u16> {
        self.slots
            .iter()
            .position(Option::is_none)
            .map(|i| i as u16)
            .ok_or(EwfsError::InvalidParameter("open file table is full"))
    }

    /// Store `file` in the slot its handle names
    pub fn insert(&mut self, file: OpenFile) -> Result<()> {
        let slot = self
            .slots
            .get_mut(usize::from(file.handle.slot()))
            .ok_or(EwfsError::InvalidParameter("handle slot out of range"))?;
        *slot = Some(file);
        Ok(())
    }

    /// Slot named by `handle`, checking only that the slot index is in range
    ///
    /// The token and disk bits are ignored, so a stale handle reaches
    /// whatever currently occupies its slot. Read and close use this lighter
    /// check; size, position and seek use [`HandleTable::get`].
    pub fn slot_mut(&mut self, handle: Handle) -> Result<&mut Option<OpenFile>> {
        self.slots
            .get_mut(usize::from(handle.slot()))
            .ok_or(EwfsError::InvalidParameter("handle slot out of range"))
    }

    /// Open file whose stored handle equals `handle` exactly
    pub fn get(&self, handle: Handle) -> Option<&OpenFile> {
        self.slots
            .get(usize::from(handle.slot()))
            .and_then(Option::as_ref)
            .filter(|f| f.handle == handle)
    }

    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut OpenFile> {
        self.slots
            .get_mut(usize::from(handle.slot()))
            .and_then(Option::as_mut)
            .filter(|f| f.handle == handle)
    }

    pub fn is_valid(&self, handle: Handle) -> bool {
        self.get(handle).is_some()
    }

    /// Free the slot named by `handle` (slot-range check only)
    pub fn release(&mut self, handle: Handle) -> Result<Option<OpenFile>> {
        Ok(self.slot_mut(handle)?.take())
    }

    /// Free every slot
    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|s| *s = None);
    }

    pub fn iter(&self) -> impl Iterator<Item = &OpenFile> {
        self.slots.iter().filter_map(Option::as_ref)
    }
}
