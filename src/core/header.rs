//! Volume header (image offsets 0..7) and the mounted-volume state derived from it

use crate::index::INDEX_ENTRY_SIZE;

pub const MAGIC: [u8; 4] = *b"EWFS";
pub const VERSION: u8 = 1;

/// Bytes before the first index entry: magic, version, file count
pub const HEADER_SIZE: u32 = 7;

pub const MAGIC_OFFSET: u32 = 0;
pub const VERSION_OFFSET: u32 = 4;
pub const FILE_COUNT_OFFSET: u32 = 5;
pub const INDEX_OFFSET: u32 = HEADER_SIZE;

/// Disk id stored while no volume is mounted
pub const DISK_UNMOUNTED: u8 = 0xFF;

/// Header of the mounted volume
///
/// Created unmounted, filled in by mount and reset by unmount. An image whose
/// first four bytes are not the magic mounts as an unformatted, empty volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeHeader {
    /// Mounted disk id, or `DISK_UNMOUNTED`
    pub disk_id: u8,

    /// Format version byte as read from the image (0 when unformatted)
    pub version: u8,

    /// Number of index entries
    pub file_count: u16,

    /// Address of the image in the media's address space
    pub base_address: u32,

    /// Image offset of the first data byte
    pub file_start_address: u32,

    /// Whether the index is held in memory; always true once mounted
    pub cachable_index: bool,

    /// False when the magic was missing
    pub formatted: bool,
}

impl VolumeHeader {
    /// Header in the unmounted state
    pub const fn unmounted() -> Self {
        VolumeHeader {
            disk_id: DISK_UNMOUNTED,
            version: 0,
            file_count: 0,
            base_address: 0,
            file_start_address: HEADER_SIZE,
            cachable_index: true,
            formatted: false,
        }
    }

    /// Header for a volume whose magic did not match
    pub fn unformatted(disk_id: u8, base_address: u32) -> Self {
        VolumeHeader {
            disk_id,
            base_address,
            ..Self::unmounted()
        }
    }

    /// Header for a formatted volume with `file_count` index entries
    pub fn formatted(disk_id: u8, base_address: u32, version: u8, file_count: u16) -> Self {
        VolumeHeader {
            disk_id,
            version,
            file_count,
            base_address,
            file_start_address: data_start(file_count),
            cachable_index: true,
            formatted: true,
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.disk_id != DISK_UNMOUNTED
    }

    /// Size of the index region in bytes
    pub fn index_len(&self) -> usize {
        self.file_count as usize * INDEX_ENTRY_SIZE
    }
}

impl Default for VolumeHeader {
    fn default() -> Self {
        Self::unmounted()
    }
}

/// Data region start for an image holding `file_count` entries
pub fn data_start(file_count: u16) -> u32 {
    HEADER_SIZE + u32::from(file_count) * INDEX_ENTRY_SIZE as u32
}

pub fn is_magic(bytes: &[u8; 4]) -> bool {
    *bytes == MAGIC
}

pub fn parse_file_count(bytes: [u8; 2]) -> u16 {
    u16::from_le_bytes(bytes)
}

/// Serialize the 7-byte header that opens every formatted image
pub fn header_bytes(version: u8, file_count: u16) -> [u8; HEADER_SIZE as usize] {
    let mut bytes = [0u8; HEADER_SIZE as usize];
    bytes[0..4].copy_from_slice(&MAGIC);
    bytes[4] = version;
    bytes[5..7].copy_from_slice(&file_count.to_le_bytes());
    bytes
}
