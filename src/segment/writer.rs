// Copyright (c) 2026-present, segment-store contributors
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Writes a segment's index and data files from an ordered entry stream.

use crate::error::Result;
use crate::fs::create_new;
use crate::value::Entry;
use byteorder::{BigEndian, WriteBytesExt};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Number of offsets buffered in memory before being flushed to the index
/// file. Every buffered offset is flushed before the trailing count is
/// written, so there is never a gap between the last offset and the count.
const INDEX_FLUSH_INTERVAL: usize = 1024;

/// Streams `entries` (already in ascending, unique-key order) to a fresh
/// segment at `index_path` / `data_path`. Both paths must not already exist.
///
/// Entries are carried as `Result<Entry>` so that the same writer serves both
/// an infallible memtable snapshot (wrapped in `Ok` by the caller) and a
/// merged range scan over segments, which can itself fail on a corrupt
/// upstream segment; the first error aborts the write.
pub fn save_segment<I>(index_path: &Path, data_path: &Path, entries: I) -> Result<()>
where
    I: IntoIterator<Item = Result<Entry>>,
{
    log::debug!("writing segment to {index_path:?} / {data_path:?}");

    let mut data_writer = BufWriter::new(create_new(data_path)?);
    let mut index_writer = BufWriter::new(create_new(index_path)?);

    let mut offset: u32 = 0;
    let mut pending_offsets: Vec<u32> = Vec::with_capacity(INDEX_FLUSH_INTERVAL);
    let mut count: u32 = 0;

    for entry in entries {
        let entry = entry?;
        pending_offsets.push(offset);

        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        let klen = entry.key.len() as i32;
        data_writer.write_i32::<BigEndian>(klen)?;
        data_writer.write_all(&entry.key)?;
        offset += 4 + entry.key.len() as u32;

        match &entry.value {
            Some(value) => {
                #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
                let vlen = value.len() as i32;
                data_writer.write_i32::<BigEndian>(vlen)?;
                data_writer.write_all(value)?;
                offset += 4 + value.len() as u32;
            }
            None => {
                data_writer.write_i32::<BigEndian>(-1)?;
                offset += 4;
            }
        }

        count += 1;

        if pending_offsets.len() >= INDEX_FLUSH_INTERVAL {
            flush_offsets(&mut index_writer, &mut pending_offsets)?;
        }
    }

    flush_offsets(&mut index_writer, &mut pending_offsets)?;
    index_writer.write_u32::<BigEndian>(count)?;

    data_writer.flush()?;
    data_writer.get_ref().sync_all()?;

    index_writer.flush()?;
    index_writer.get_ref().sync_all()?;

    log::debug!("wrote {count} entries to {data_path:?}");

    Ok(())
}

fn flush_offsets(writer: &mut impl Write, pending: &mut Vec<u32>) -> Result<()> {
    for offset in pending.drain(..) {
        writer.write_u32::<BigEndian>(offset)?;
    }
    Ok(())
}
