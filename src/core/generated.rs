//! Generated (virtual) files
//!
//! A generated file has an index entry but no bytes in the image. Its content
//! is produced on demand, one logical unit per call, into whatever buffer the
//! reader supplies. Each open file keeps its own iteration counter; the
//! generator advances it when a unit is produced and never buffers anything
//! across calls.
//!
//! When a reader seeks backwards inside the unit it just received, the open
//! file records a positive carry. The next call regenerates that unit and
//! [`GeneratorRegistry::read_chunk`] moves its last `carry` bytes to the front
//! of the buffer, so the reader sees exactly the bytes it stepped back over.

use crate::hash::name_hash;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Outcome of one generation call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chunk {
    /// `n` bytes written to the front of the buffer; the iteration advanced
    Data(usize),
    /// The current unit does not fit; retry with a larger buffer
    TooSmall,
    /// Every unit has been produced
    End,
}

impl Chunk {
    /// Bytes this outcome delivers to a reader
    pub fn produced(self) -> usize {
        match self {
            Chunk::Data(n) => n,
            Chunk::TooSmall | Chunk::End => 0,
        }
    }
}

/// Content source for one generated file
pub trait GeneratedFile: Send + Sync {
    /// Path relative to the image root, as hashed by the image builder
    fn name(&self) -> &str;

    /// Produce the unit at `*iteration` into `buf`
    ///
    /// Must never write past `buf.len()`. Increments `*iteration` only when
    /// returning `Chunk::Data`.
    fn next_chunk(&self, iteration: &mut u16, buf: &mut [u8]) -> Chunk;
}

/// Reference generator: one line per lowercase letter
///
/// Unit `n` fills the whole buffer with letter `n` and ends it with `\r\n`
/// in the last two positions, so a line is exactly as long as the buffer it
/// is generated into. Buffers shorter than the terminator are too small.
#[derive(Debug, Clone)]
pub struct AlphabetFile {
    name: String,
}

impl AlphabetFile {
    pub const UNITS: u16 = 26;

    pub fn new<S: Into<String>>(name: S) -> Self {
        AlphabetFile { name: name.into() }
    }
}

impl GeneratedFile for AlphabetFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_chunk(&self, iteration: &mut u16, buf: &mut [u8]) -> Chunk {
        if *iteration >= Self::UNITS {
            return Chunk::End;
        }
        let cap = buf.len();
        if cap < 2 {
            return Chunk::TooSmall;
        }

        buf.fill(b'a' + *iteration as u8);
        buf[cap - 2] = b'\r';
        buf[cap - 1] = b'\n';
        *iteration += 1;
        Chunk::Data(cap)
    }
}

/// Generated file made of fixed byte units, one unit per call
///
/// The iteration counter is 16 bits wide, so at most `u16::MAX` units are
/// ever produced; later units read as end of file.
#[derive(Debug, Clone)]
pub struct TextUnits {
    name: String,
    units: Vec<Vec<u8>>,
}

impl TextUnits {
    /// Empty units are dropped; an empty unit would read as end of file
    pub fn new<S, I, U>(name: S, units: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = U>,
        U: Into<Vec<u8>>,
    {
        TextUnits {
            name: name.into(),
            units: units
                .into_iter()
                .map(Into::<Vec<u8>>::into)
                .filter(|u| !u.is_empty())
                .collect(),
        }
    }

    /// Generated file that exists but yields no bytes
    pub fn empty<S: Into<String>>(name: S) -> Self {
        TextUnits {
            name: name.into(),
            units: Vec::new(),
        }
    }
}

impl GeneratedFile for TextUnits {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_chunk(&self, iteration: &mut u16, buf: &mut [u8]) -> Chunk {
        let Some(next) = iteration.checked_add(1) else {
            return Chunk::End;
        };
        let Some(unit) = self.units.get(usize::from(*iteration)) else {
            return Chunk::End;
        };
        if unit.len() > buf.len() {
            return Chunk::TooSmall;
        }
        buf[..unit.len()].copy_from_slice(unit);
        *iteration = next;
        Chunk::Data(unit.len())
    }
}

#[derive(Clone)]
struct Registered {
    hash: u16,
    file: Arc<dyn GeneratedFile>,
}

/// Generated files keyed by name hash, in registration order
///
/// Like the index, the first registration with a matching hash wins.
#[derive(Clone, Default)]
pub struct GeneratorRegistry {
    files: Vec<Registered>,
}

impl GeneratorRegistry {
    pub fn new() -> Self {
        GeneratorRegistry { files: Vec::new() }
    }

    /// `largefile.json` (alphabet lines) and `me.json` (no content)
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(TextUnits::empty("me.json"));
        registry.register(AlphabetFile::new("largefile.json"));
        registry
    }

    pub fn register<G: GeneratedFile + 'static>(&mut self, file: G) -> &mut Self {
        self.register_arc(Arc::new(file))
    }

    pub fn register_arc(&mut self, file: Arc<dyn GeneratedFile>) -> &mut Self {
        let hash = name_hash(file.name().as_bytes());
        debug!("Registered generated file {} (hash {:04X})", file.name(), hash);
        self.files.push(Registered { hash, file });
        self
    }

    /// Recompute every registered hash from its name; run on mount
    pub fn rehash(&mut self) {
        for entry in &mut self.files {
            entry.hash = name_hash(entry.file.name().as_bytes());
        }
    }

    pub fn find(&self, hash: u16) -> Option<&dyn GeneratedFile> {
        self.files
            .iter()
            .find(|r| r.hash == hash)
            .map(|r| r.file.as_ref())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(|r| r.file.name())
    }

    /// Size of a generated file: drain it once through a scratch buffer
    ///
    /// Unknown hashes have size zero.
    pub fn total_size(&self, hash: u16, scratch_len: usize) -> u32 {
        let Some(file) = self.find(hash) else {
            return 0;
        };

        let mut scratch = vec![0u8; scratch_len];
        let mut iteration = 0u16;
        let mut total = 0u32;
        for _ in 0..=u16::MAX {
            match file.next_chunk(&mut iteration, &mut scratch) {
                Chunk::Data(0) | Chunk::End => break,
                Chunk::Data(n) => total = total.saturating_add(n.min(scratch_len) as u32),
                Chunk::TooSmall => {
                    warn!(
                        "Unit {} of {} does not fit a {} byte scratch buffer; size truncated",
                        iteration,
                        file.name(),
                        scratch_len
                    );
                    break;
                }
            }
        }
        trace!("Generated file {} drains to {} bytes", file.name(), total);
        total
    }

    /// Generate the next chunk for an open file and apply its carry
    ///
    /// Returns the bytes now at the front of `buf`.
    pub fn read_chunk(
        &self,
        hash: u16,
        buf: &mut [u8],
        iteration: &mut u16,
        carry: &mut i64,
    ) -> usize {
        let Some(file) = self.find(hash) else {
            return 0;
        };

        let produced = file.next_chunk(iteration, buf).produced().min(buf.len());
        if produced == 0 {
            return 0;
        }

        if *carry > 0 {
            let keep = (*carry as usize).min(produced);
            buf.copy_within(produced - keep..produced, 0);
            *carry = 0;
            return keep;
        }
        *carry = 0;
        produced
    }
}

impl fmt::Debug for GeneratorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.files.iter().map(|r| (r.hash, r.file.name())))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alphabet_unit_layout() {
        let file = AlphabetFile::new("largefile.json");
        let mut buf = [0u8; 6];
        let mut iteration = 0;

        assert_eq!(file.next_chunk(&mut iteration, &mut buf), Chunk::Data(6));
        assert_eq!(&buf, b"aaaa\r\n");
        assert_eq!(iteration, 1);

        assert_eq!(file.next_chunk(&mut iteration, &mut buf), Chunk::Data(6));
        assert_eq!(&buf, b"bbbb\r\n");
    }

    #[test]
    fn test_alphabet_ends_after_z() {
        let file = AlphabetFile::new("largefile.json");
        for cap in [0usize, 1, 2, 512] {
            let mut buf = vec![0u8; cap];
            let mut iteration = 26;
            assert_eq!(file.next_chunk(&mut iteration, &mut buf), Chunk::End);
            assert_eq!(iteration, 26);
        }
    }

    #[test]
    fn test_alphabet_small_buffers_stay_in_bounds() {
        let file = AlphabetFile::new("largefile.json");
        let mut iteration = 0;

        let mut one = [0x55u8; 1];
        assert_eq!(file.next_chunk(&mut iteration, &mut one), Chunk::TooSmall);
        assert_eq!(one, [0x55]);
        assert_eq!(iteration, 0);

        let mut two = [0u8; 2];
        assert_eq!(file.next_chunk(&mut iteration, &mut two), Chunk::Data(2));
        assert_eq!(&two, b"\r\n");
    }

    #[test]
    fn test_text_units_too_small_then_retry() {
        let file = TextUnits::new("status.txt", ["ok\n", "", "fine\n"]);
        let mut iteration = 0;
        let mut small = [0u8; 3];
        assert_eq!(file.next_chunk(&mut iteration, &mut small), Chunk::Data(3));
        assert_eq!(file.next_chunk(&mut iteration, &mut small), Chunk::TooSmall);
        assert_eq!(iteration, 1);

        let mut big = [0u8; 8];
        assert_eq!(file.next_chunk(&mut iteration, &mut big), Chunk::Data(5));
        assert_eq!(&big[..5], b"fine\n");
        assert_eq!(file.next_chunk(&mut iteration, &mut big), Chunk::End);
    }

    #[test]
    fn test_text_units_end_at_counter_limit() {
        let file = TextUnits::new("big.txt", vec!["x"; 70_000]);
        let mut buf = [0u8; 4];
        let mut iteration = u16::MAX - 1;
        assert_eq!(file.next_chunk(&mut iteration, &mut buf), Chunk::Data(1));
        assert_eq!(iteration, u16::MAX);
        assert_eq!(file.next_chunk(&mut iteration, &mut buf), Chunk::End);
        assert_eq!(iteration, u16::MAX);
    }

    #[test]
    fn test_registry_defaults() {
        let registry = GeneratorRegistry::with_defaults();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.total_size(name_hash(b"largefile.json"), 512), 26 * 512);
        assert_eq!(registry.total_size(name_hash(b"me.json"), 512), 0);
        assert_eq!(registry.total_size(0xBEEF, 512), 0);
    }

    #[test]
    fn test_total_size_matches_independent_drain() {
        let registry = GeneratorRegistry::with_defaults();
        let hash = name_hash(b"largefile.json");
        let size = registry.total_size(hash, 100);

        let mut buf = [0u8; 100];
        let mut iteration = 0;
        let mut carry = 0;
        let mut drained = 0;
        loop {
            let n = registry.read_chunk(hash, &mut buf, &mut iteration, &mut carry);
            if n == 0 {
                break;
            }
            drained += n as u32;
        }
        assert_eq!(size, drained);
    }

    #[test]
    fn test_read_chunk_applies_carry() {
        let registry = GeneratorRegistry::with_defaults();
        let hash = name_hash(b"largefile.json");
        let mut buf = [0u8; 8];
        let mut iteration = 0;
        let mut carry = 3;

        let n = registry.read_chunk(hash, &mut buf, &mut iteration, &mut carry);
        assert_eq!(n, 3);
        assert_eq!(&buf[..3], b"a\r\n");
        assert_eq!(carry, 0);
        assert_eq!(iteration, 1);
    }

    #[test]
    fn test_carry_larger_than_chunk_is_clamped() {
        let registry = GeneratorRegistry::with_defaults();
        let hash = name_hash(b"largefile.json");
        let mut buf = [0u8; 4];
        let mut iteration = 0;
        let mut carry = 50;

        assert_eq!(registry.read_chunk(hash, &mut buf, &mut iteration, &mut carry), 4);
        assert_eq!(&buf, b"aa\r\n");
    }

    #[test]
    fn test_carry_kept_when_nothing_produced() {
        let registry = GeneratorRegistry::with_defaults();
        let hash = name_hash(b"largefile.json");
        let mut buf = [0u8; 4];
        let mut iteration = AlphabetFile::UNITS;
        let mut carry = 2;

        assert_eq!(registry.read_chunk(hash, &mut buf, &mut iteration, &mut carry), 0);
        assert_eq!(carry, 2);
    }

    #[test]
    fn test_rehash_keeps_lookup() {
        let mut registry = GeneratorRegistry::new();
        registry.register(TextUnits::new("a.txt", ["x"]));
        registry.rehash();
        assert!(registry.find(name_hash(b"a.txt")).is_some());
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["a.txt"]);
    }
}
