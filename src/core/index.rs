//! File index entries and the in-memory index table

use crate::hash::name_hash;

/// Binary width of one index entry: hash(2) type(1) offset(4) length(4)
pub const INDEX_ENTRY_SIZE: usize = 11;

/// File type
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// Content synthesized on demand by a registered generator
    Generated = 0,
    /// Content stored in the image data region
    Static = 1,
}

impl FileType {
    /// Parse a type byte
    ///
    /// Only zero marks a generated file; every other value reads as static.
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Generated,
            _ => Self::Static,
        }
    }
}

/// One fixed-width index record
///
/// `offset` is relative to the data region start. For static files `length`
/// counts the builder's trailing `0x00`; generated entries carry zero for
/// both fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub hash: u16,
    pub file_type: FileType,
    pub offset: u32,
    pub length: u32,
}

impl IndexEntry {
    pub fn new_static(name: &str, offset: u32, stored_len: u32) -> Self {
        IndexEntry {
            hash: name_hash(name.as_bytes()),
            file_type: FileType::Static,
            offset,
            length: stored_len,
        }
    }

    pub fn new_generated(name: &str) -> Self {
        IndexEntry {
            hash: name_hash(name.as_bytes()),
            file_type: FileType::Generated,
            offset: 0,
            length: 0,
        }
    }

    pub fn is_generated(&self) -> bool {
        self.file_type == FileType::Generated
    }

    /// Readable bytes of a static entry (stored length minus the terminator)
    pub fn readable_len(&self) -> u32 {
        self.length.saturating_sub(1)
    }

    pub fn to_bytes(&self) -> [u8; INDEX_ENTRY_SIZE] {
        let mut bytes = [0u8; INDEX_ENTRY_SIZE];
        bytes[0..2].copy_from_slice(&self.hash.to_le_bytes());
        bytes[2] = self.file_type as u8;
        bytes[3..7].copy_from_slice(&self.offset.to_le_bytes());
        bytes[7..11].copy_from_slice(&self.length.to_le_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8; INDEX_ENTRY_SIZE]) -> Self {
        IndexEntry {
            hash: u16::from_le_bytes([bytes[0], bytes[1]]),
            file_type: FileType::from_u8(bytes[2]),
            offset: u32::from_le_bytes([bytes[3], bytes[4], bytes[5], bytes[6]]),
            length: u32::from_le_bytes([bytes[7], bytes[8], bytes[9], bytes[10]]),
        }
    }
}

/// Index table loaded verbatim from the image on mount
#[derive(Debug, Clone, Default)]
pub struct FileIndex {
    entries: Vec<IndexEntry>,
}

impl FileIndex {
    pub fn new(entries: Vec<IndexEntry>) -> Self {
        FileIndex { entries }
    }

    /// Decode a packed index region; trailing partial records are ignored
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let entries = bytes
            .chunks_exact(INDEX_ENTRY_SIZE)
            .filter_map(|chunk| <&[u8; INDEX_ENTRY_SIZE]>::try_from(chunk).ok())
            .map(IndexEntry::from_bytes)
            .collect();
        FileIndex { entries }
    }

    /// Position of the first entry whose hash matches `name`
    pub fn find(&self, name: &str) -> Option<usize> {
        self.find_hash(name_hash(name.as_bytes()))
    }

    pub fn find_hash(&self, hash: u16) -> Option<usize> {
        self.entries.iter().position(|e| e.hash == hash)
    }

    pub fn get(&self, position: usize) -> Option<&IndexEntry> {
        self.entries.get(position)
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn generated_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_generated()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_layout() {
        let entry = IndexEntry {
            hash: 0x1234,
            file_type: FileType::Static,
            offset: 0x0A0B0C0D,
            length: 6,
        };
        let bytes = entry.to_bytes();
        assert_eq!(bytes, [0x34, 0x12, 1, 0x0D, 0x0C, 0x0B, 0x0A, 6, 0, 0, 0]);
        assert_eq!(IndexEntry::from_bytes(&bytes), entry);
    }

    #[test]
    fn test_type_byte() {
        assert_eq!(FileType::from_u8(0), FileType::Generated);
        assert_eq!(FileType::from_u8(1), FileType::Static);
        assert_eq!(FileType::from_u8(7), FileType::Static);
    }

    #[test]
    fn test_readable_len_excludes_terminator() {
        assert_eq!(IndexEntry::new_static("a", 0, 6).readable_len(), 5);
        assert_eq!(IndexEntry::new_generated("g").readable_len(), 0);
    }

    #[test]
    fn test_find_first_match_wins() {
        let index = FileIndex::new(vec![
            IndexEntry::new_static("index.html", 0, 10),
            IndexEntry {
                hash: name_hash(b"me.json"),
                file_type: FileType::Static,
                offset: 10,
                length: 3,
            },
            IndexEntry {
                hash: name_hash(b"me.json"),
                file_type: FileType::Generated,
                offset: 0,
                length: 0,
            },
        ]);
        assert_eq!(index.find("index.html"), Some(0));
        assert_eq!(index.find("me.json"), Some(1));
        assert_eq!(index.find("missing.txt"), None);
        assert_eq!(index.generated_count(), 1);
    }

    #[test]
    fn test_from_bytes_ignores_partial_tail() {
        let mut bytes = IndexEntry::new_generated("g").to_bytes().to_vec();
        bytes.extend_from_slice(&[1, 2, 3]);
        let index = FileIndex::from_bytes(&bytes);
        assert_eq!(index.len(), 1);
        assert!(index.entries()[0].is_generated());
    }
}
