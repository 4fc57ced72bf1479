//! In-memory EWFS image writer
//!
//! Produces the same layout the host-side image tool emits: header, index in
//! insertion order, then every static file's bytes followed by a `0x00`.

use crate::header::{header_bytes, VERSION};
use crate::index::{IndexEntry, INDEX_ENTRY_SIZE};

#[derive(Debug, Clone)]
enum Pending {
    Static { name: String, data: Vec<u8> },
    Generated { name: String },
}

/// Builder for EWFS image bytes
#[derive(Debug, Clone)]
pub struct ImageBuilder {
    version: u8,
    files: Vec<Pending>,
}

impl ImageBuilder {
    pub fn new() -> Self {
        ImageBuilder {
            version: VERSION,
            files: Vec::new(),
        }
    }

    pub fn version(mut self, version: u8) -> Self {
        self.version = version;
        self
    }

    /// Add a file stored in the data region; `name` is relative to the image root
    pub fn add_static<S: Into<String>>(mut self, name: S, data: &[u8]) -> Self {
        self.files.push(Pending::Static {
            name: name.into(),
            data: data.to_vec(),
        });
        self
    }

    /// Add an index entry for a file produced by a generator at runtime
    pub fn add_generated<S: Into<String>>(mut self, name: S) -> Self {
        self.files.push(Pending::Generated { name: name.into() });
        self
    }

    /// Index entries in image order
    pub fn entries(&self) -> Vec<IndexEntry> {
        let mut offset = 0u32;
        self.files
            .iter()
            .map(|file| match file {
                Pending::Static { name, data } => {
                    let stored = data.len() as u32 + 1;
                    let entry = IndexEntry::new_static(name, offset, stored);
                    offset += stored;
                    entry
                }
                Pending::Generated { name } => IndexEntry::new_generated(name),
            })
            .collect()
    }

    pub fn build(&self) -> Vec<u8> {
        let entries = self.entries();
        let data_len: usize = entries
            .iter()
            .filter(|e| !e.is_generated())
            .map(|e| e.length as usize)
            .sum();

        let mut bytes = Vec::with_capacity(7 + entries.len() * INDEX_ENTRY_SIZE + data_len);
        bytes.extend_from_slice(&header_bytes(self.version, entries.len() as u16));
        for entry in &entries {
            bytes.extend_from_slice(&entry.to_bytes());
        }
        for file in &self.files {
            if let Pending::Static { data, .. } = file {
                bytes.extend_from_slice(data);
                bytes.push(0x00);
            }
        }
        bytes
    }
}

impl Default for ImageBuilder {
    fn default() -> Self {
        Self::new()
    }
}
