// Copyright (c) 2026-present, segment-store contributors
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use byteorder::{BigEndian, ReadBytesExt};
use memmap2::Mmap;
use std::sync::Arc;

/// Ordinal identifying a segment among its siblings in a `SegmentSet`.
///
/// Higher ordinal means fresher: a segment with a higher ordinal was flushed
/// (or is the result of a compaction) more recently than one with a lower
/// ordinal.
pub type Ordinal = u64;

const OFFSET_WIDTH: usize = 4;
const COUNT_WIDTH: usize = 4;

/// The backing storage of a loaded [`super::Segment`]: two read-only memory
/// maps plus the entry count decoded from the index trailer.
pub struct Inner {
    pub(super) index: Arc<Mmap>,
    pub(super) data: Arc<Mmap>,
    pub(super) ordinal: Ordinal,
    pub(super) count: usize,
}

impl Inner {
    pub(super) fn new(index: Mmap, data: Mmap, ordinal: Ordinal) -> crate::Result<Self> {
        let count = decode_count(&index)?;

        Ok(Self {
            index: Arc::new(index),
            data: Arc::new(data),
            ordinal,
            count,
        })
    }

    pub(super) fn offset_at(&self, position: usize) -> u32 {
        let start = position * OFFSET_WIDTH;
        let mut reader = &self.index[start..start + OFFSET_WIDTH];
        reader
            .read_u32::<BigEndian>()
            .expect("slice has exactly OFFSET_WIDTH bytes")
    }
}

/// Reads the trailing 32-bit entry count out of an index buffer.
///
/// An empty index file (zero entries, never written) is treated as `count = 0`
/// rather than a corrupt one, so a freshly-created empty segment can still be
/// loaded. Any non-empty index shorter than the trailer is corrupt.
fn decode_count(index: &[u8]) -> crate::Result<usize> {
    if index.is_empty() {
        return Ok(0);
    }

    if index.len() < COUNT_WIDTH {
        return Err(crate::Error::Corrupt(format!(
            "index file has {} bytes, expected at least {COUNT_WIDTH}",
            index.len()
        )));
    }

    let trailer_start = index.len() - COUNT_WIDTH;
    let mut reader = &index[trailer_start..];
    let count = reader
        .read_u32::<BigEndian>()
        .expect("slice has exactly COUNT_WIDTH bytes") as usize;

    let expected_len = count * OFFSET_WIDTH + COUNT_WIDTH;
    if index.len() != expected_len {
        return Err(crate::Error::Corrupt(format!(
            "index file has {} bytes, but trailing count {count} implies {expected_len}",
            index.len()
        )));
    }

    Ok(count)
}
