//! Per-stream index caches
//!
//! Assemblies, types and member names are written once per stream and then
//! referred to by index. Each cache is append-only: a fixed preamble of
//! well-known entries (never written) followed by entries appended in
//! identical order by the writer and the reader.
//!
//! # Index encoding
//!
//! For a cache holding `count` entries, a 7-bit index means:
//!
//! ```text
//! 0 .. count-1   existing entry
//! count          omitted (no assembly / empty name)
//! count + 1      new entry follows inline
//! count + 2      type encoded by tags (type cache only)
//! ```

use crate::io::{BinaryReader, BinaryWriter};
use graphbin_core::{Error, Result};
use rustc_hash::FxHashMap;
use std::hash::Hash;
use std::io::{Read, Write};

/// Assembly names every stream starts with
pub const ASSEMBLY_PREAMBLE: &[&str] = &["core"];

/// Decoded meaning of a cache index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheIndex {
    /// Existing entry
    Existing(usize),
    /// Omitted value
    Omitted,
    /// New entry follows
    New,
    /// Type encoded by tags follows
    ByTag,
}

impl CacheIndex {
    /// Decode a raw index against the current cache size
    pub fn decode(raw: u32, count: usize, allow_by_tag: bool) -> Result<CacheIndex> {
        let raw = raw as usize;
        match raw {
            i if i < count => Ok(CacheIndex::Existing(i)),
            i if i == count => Ok(CacheIndex::Omitted),
            i if i == count + 1 => Ok(CacheIndex::New),
            i if i == count + 2 && allow_by_tag => Ok(CacheIndex::ByTag),
            i => Err(Error::invalid_stream(format!(
                "cache index {} out of range (count {})",
                i, count
            ))),
        }
    }

    /// Raw index for the current cache size
    pub fn encode(self, count: usize) -> Result<u32> {
        let raw = match self {
            CacheIndex::Existing(i) => i,
            CacheIndex::Omitted => count,
            CacheIndex::New => count + 1,
            CacheIndex::ByTag => count + 2,
        };
        u32::try_from(raw).map_err(|_| Error::InvalidOperation("cache is full".to_string()))
    }
}

/// Writer side of a cache: entry -> index
#[derive(Debug, Clone)]
pub struct IndexWriter<K: Hash + Eq> {
    indices: FxHashMap<K, usize>,
    count: usize,
}

impl<K: Hash + Eq> Default for IndexWriter<K> {
    fn default() -> Self {
        IndexWriter {
            indices: FxHashMap::default(),
            count: 0,
        }
    }
}

impl<K: Hash + Eq> IndexWriter<K> {
    /// Cache seeded with well-known entries
    pub fn with_preamble(preamble: impl IntoIterator<Item = K>) -> Self {
        let mut cache = Self::default();
        for entry in preamble {
            cache.add(entry);
        }
        cache
    }

    /// Index of an entry
    pub fn index_of(&self, key: &K) -> Option<usize> {
        self.indices.get(key).copied()
    }

    /// Append an entry, returning its index
    pub fn add(&mut self, key: K) -> usize {
        let index = self.count;
        self.indices.entry(key).or_insert(index);
        self.count += 1;
        index
    }

    /// Number of entries
    pub fn count(&self) -> usize {
        self.count
    }
}

/// Reader side of a cache: index -> entry
#[derive(Debug, Clone)]
pub struct IndexReader<T> {
    entries: Vec<T>,
}

impl<T> Default for IndexReader<T> {
    fn default() -> Self {
        IndexReader {
            entries: Vec::new(),
        }
    }
}

impl<T: Clone> IndexReader<T> {
    /// Cache seeded with well-known entries
    pub fn with_preamble(preamble: impl IntoIterator<Item = T>) -> Self {
        IndexReader {
            entries: preamble.into_iter().collect(),
        }
    }

    /// Entry at an index
    pub fn get(&self, index: usize) -> Option<&T> {
        self.entries.get(index)
    }

    /// Append an entry
    pub fn push(&mut self, entry: T) {
        self.entries.push(entry);
    }

    /// Number of entries
    pub fn count(&self) -> usize {
        self.entries.len()
    }
}

/// Writer side of a string cache (assemblies, member names)
#[derive(Debug, Clone, Default)]
pub struct StringCacheWriter {
    index: IndexWriter<String>,
}

impl StringCacheWriter {
    /// Cache seeded with well-known strings
    pub fn with_preamble(preamble: &[&str]) -> Self {
        StringCacheWriter {
            index: IndexWriter::with_preamble(preamble.iter().map(|s| s.to_string())),
        }
    }

    /// Write a string reference; `None` and `""` are written as omitted
    pub fn write<W: Write>(&mut self, w: &mut BinaryWriter<W>, value: Option<&str>) -> Result<()> {
        let count = self.index.count();
        match value {
            None | Some("") => w.write_7bit(CacheIndex::Omitted.encode(count)?),
            Some(s) => match self.index.index_of(&s.to_string()) {
                Some(i) => w.write_7bit(CacheIndex::Existing(i).encode(count)?),
                None => {
                    w.write_7bit(CacheIndex::New.encode(count)?)?;
                    w.write_string(s)?;
                    self.index.add(s.to_string());
                    Ok(())
                }
            },
        }
    }

    /// Number of entries
    pub fn count(&self) -> usize {
        self.index.count()
    }
}

/// Reader side of a string cache
#[derive(Debug, Clone, Default)]
pub struct StringCacheReader {
    entries: IndexReader<String>,
}

impl StringCacheReader {
    /// Cache seeded with well-known strings
    pub fn with_preamble(preamble: &[&str]) -> Self {
        StringCacheReader {
            entries: IndexReader::with_preamble(preamble.iter().map(|s| s.to_string())),
        }
    }

    /// Read a string reference; omitted reads as `None`
    pub fn read<R: Read>(&mut self, r: &mut BinaryReader<R>) -> Result<Option<String>> {
        let raw = r.read_7bit()?;
        match CacheIndex::decode(raw, self.entries.count(), false)? {
            CacheIndex::Existing(i) => Ok(self.entries.get(i).cloned()),
            CacheIndex::Omitted => Ok(None),
            CacheIndex::New => {
                let s = r.read_string()?;
                self.entries.push(s.clone());
                Ok(Some(s))
            }
            CacheIndex::ByTag => Err(Error::invalid_stream("by-tag index in string cache")),
        }
    }

    /// Number of entries
    pub fn count(&self) -> usize {
        self.entries.count()
    }
}
