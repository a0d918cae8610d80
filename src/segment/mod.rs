// Copyright (c) 2026-present, segment-store contributors
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! A single immutable sorted run ("segment", a.k.a. `SSTable`) stored as a pair
//! of memory-mapped files: a fixed-width offset index and a variable-length
//! data file.

pub mod inner;
pub mod iter;
mod writer;

use crate::binary_search;
use crate::error::{Error, Result};
use crate::value::{Entry, Key};
use byteorder::{BigEndian, ReadBytesExt};
use inner::Inner;
pub use inner::Ordinal;
use iter::RangeIter;
use memmap2::Mmap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

pub use writer::save_segment;

/// An immutable, memory-mapped sorted run of entries.
///
/// Cloning a `Segment` is cheap: it is a reference-counted handle to the
/// underlying memory maps, so pinning a segment for the lifetime of a reader
/// (see `SegmentSet`) never copies file contents.
#[derive(Clone)]
pub struct Segment(Arc<Inner>);

impl std::fmt::Debug for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Segment({}, {} entries)", self.ordinal(), self.len())
    }
}

impl Segment {
    /// Memory-maps `index_path` and `data_path` read-only and reads the
    /// trailing entry count. Fails if either file is missing/unreadable, or
    /// the index is non-empty but shorter than the 4-byte count trailer.
    pub fn load(index_path: &Path, data_path: &Path, ordinal: Ordinal) -> Result<Self> {
        log::debug!("loading segment {ordinal} from {index_path:?} / {data_path:?}");

        let index_file = File::open(index_path)?;
        let data_file = File::open(data_path)?;

        // SAFETY: the mapped files are treated as read-only for the lifetime of
        // this process and are never truncated or rewritten in place; segments
        // are only ever replaced wholesale via rename, not mutated.
        let index = unsafe { Mmap::map(&index_file)? };
        // SAFETY: see above.
        let data = unsafe { Mmap::map(&data_file)? };

        Ok(Self(Arc::new(Inner::new(index, data, ordinal)?)))
    }

    /// The segment's ordinal; higher means fresher.
    #[must_use]
    pub fn ordinal(&self) -> Ordinal {
        self.0.ordinal
    }

    /// The number of entries in this segment.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.count
    }

    /// Returns `true` if this segment has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.count == 0
    }

    /// Returns the entry with exactly this key, or `None`. A tombstone is
    /// returned as an entry with no value; this layer does not interpret it.
    pub fn get(&self, key: &[u8]) -> Result<Option<Entry>> {
        let position = self.greater_or_equal(Some(key))?;

        if position >= self.0.count {
            return Ok(None);
        }

        let entry = decode_entry_at(&self.0, position)?;

        if entry.key.as_ref() == key {
            Ok(Some(entry))
        } else {
            Ok(None)
        }
    }

    /// Yields all entries with `from <= key < to`, in ascending key order.
    /// `from = None` means unbounded below; `to = None` means unbounded above.
    pub fn range_iter(&self, from: Option<&[u8]>, to: Option<&[u8]>) -> Result<RangeIter> {
        let start = self.greater_or_equal(from)?;
        Ok(RangeIter::new(self.0.clone(), start, to.map(<[u8]>::to_vec)))
    }

    /// Binary search for the first position whose key is `>= key`, or `key =
    /// None` for position 0. Returns `count` ("no in-range entry") when
    /// nothing matches.
    pub(crate) fn greater_or_equal(&self, key: Option<&[u8]>) -> Result<usize> {
        let Some(needle) = key else {
            return Ok(0);
        };

        binary_search::greater_or_equal(self.0.count, needle, |position| {
            decode_key_at(&self.0, position).map(|k| k.to_vec())
        })
    }
}

/// Reads the 32-bit offset for `position` and decodes the entry at that offset.
pub(crate) fn decode_entry_at(inner: &Inner, position: usize) -> Result<Entry> {
    let offset = inner.offset_at(position);
    decode_entry(&inner.data, offset as usize)
}

fn decode_key_at(inner: &Inner, position: usize) -> Result<Key> {
    let offset = inner.offset_at(position);
    decode_key(&inner.data, offset as usize)
}

/// Decodes `klen:i32 key:byte[klen] vlen:i32 value:byte[vlen]` starting at
/// `offset` within `data`. `vlen = -1` denotes a tombstone.
fn decode_entry(data: &[u8], offset: usize) -> Result<Entry> {
    let (key, after_key) = read_length_prefixed(data, offset, "key")?;

    let vlen = read_i32(data, after_key, "value length")?;

    if vlen == -1 {
        return Ok(Entry {
            key: key.into(),
            value: None,
        });
    }

    if vlen < 0 {
        return Err(Error::Corrupt(format!(
            "negative value length {vlen} at offset {after_key}"
        )));
    }

    let value_start = after_key + 4;
    let value_end = value_start
        .checked_add(vlen as usize)
        .ok_or_else(|| Error::Corrupt("value length overflow".to_string()))?;

    let value = data.get(value_start..value_end).ok_or_else(|| {
        Error::Corrupt(format!(
            "truncated value at offset {value_start}, expected {vlen} bytes"
        ))
    })?;

    Ok(Entry {
        key: key.into(),
        value: Some(value.into()),
    })
}

fn decode_key(data: &[u8], offset: usize) -> Result<Vec<u8>> {
    let (key, _) = read_length_prefixed(data, offset, "key")?;
    Ok(key.to_vec())
}

/// Reads `klen:i32 bytes:byte[klen]` at `offset`, returning the key bytes and
/// the offset of the field immediately following them.
fn read_length_prefixed<'a>(
    data: &'a [u8],
    offset: usize,
    what: &str,
) -> Result<(&'a [u8], usize)> {
    let klen = read_i32(data, offset, what)?;

    if klen < 0 {
        return Err(Error::Corrupt(format!(
            "negative {what} length {klen} at offset {offset}"
        )));
    }

    let start = offset + 4;
    let end = start
        .checked_add(klen as usize)
        .ok_or_else(|| Error::Corrupt(format!("{what} length overflow")))?;

    let bytes = data.get(start..end).ok_or_else(|| {
        Error::Corrupt(format!(
            "truncated {what} at offset {start}, expected {klen} bytes"
        ))
    })?;

    Ok((bytes, end))
}

fn read_i32(data: &[u8], offset: usize, what: &str) -> Result<i32> {
    let mut reader = data
        .get(offset..offset + 4)
        .ok_or_else(|| Error::Corrupt(format!("truncated {what} field at offset {offset}")))?;

    Ok(reader
        .read_i32::<BigEndian>()
        .expect("slice has exactly 4 bytes"))
}
