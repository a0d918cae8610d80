// Copyright (c) 2026-present, segment-store contributors
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Owns the on-disk segment chain for one storage directory: loading it at
//! startup, serving point and range reads against a consistent snapshot, and
//! performing crash-safe flushes and full compactions.

use crate::error::Result;
use crate::fs;
use crate::memtable::OrderedEntries;
use crate::merge::MergingIterator;
use crate::peekable::{BoxedEntryIter, PeekableIter};
use crate::segment::{save_segment, Segment};
use crate::value::Entry;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

const COMPACTED_STEM: &str = "compacted_";

/// The ordered set of on-disk segments backing one storage directory.
///
/// Reads pin a cheap `Arc` snapshot of the segment list and never block on a
/// concurrent flush or compaction; flush and compaction serialize against each
/// other through an internal lock and swap the list in under a brief write
/// lock once their I/O is durable.
pub struct SegmentSet {
    dir: PathBuf,
    segments: RwLock<Arc<Vec<Segment>>>,
    write_lock: Mutex<()>,
}

impl SegmentSet {
    /// Opens the segment chain rooted at `dir`, first resuming any compaction
    /// left mid-swap by a prior crash.
    pub fn load(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        log::debug!("loading segment set at {dir:?}");

        if sentinel_exists(&dir)? {
            log::warn!("found a compaction sentinel in {dir:?}, resuming the swap");
            finish_compact(&dir)?;
        }

        let mut segments = Vec::new();
        let mut ordinal: u64 = 0;
        loop {
            let index_path = index_path(&dir, ordinal);
            let data_path = data_path(&dir, ordinal);

            if !fs::exists(&index_path)? {
                break;
            }

            segments.push(Segment::load(&index_path, &data_path, ordinal)?);
            ordinal += 1;
        }

        // Freshest (highest ordinal) first, matching the priority order
        // `find_entry` and `range_scan` read in.
        segments.reverse();

        log::debug!("loaded {} segment(s) from {dir:?}", segments.len());

        Ok(Self {
            dir,
            segments: RwLock::new(Arc::new(segments)),
            write_lock: Mutex::new(()),
        })
    }

    fn pinned(&self) -> Arc<Vec<Segment>> {
        self.segments.read().expect("lock is poisoned").clone()
    }

    /// Looks up `key` across segments, freshest first, stopping at the first
    /// hit (including a tombstone, which callers interpret as "deleted").
    pub fn find_entry(&self, key: &[u8]) -> Result<Option<Entry>> {
        for segment in self.pinned().iter() {
            if let Some(entry) = segment.get(key)? {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    /// Merges `from <= key < to` across the current segment snapshot and the
    /// given memtables (freshest first), suppressing shadowed versions and
    /// tombstones. The returned iterator pins its own segment memory maps and
    /// is unaffected by compactions that start after this call returns.
    pub fn range_scan<'a>(
        &self,
        from: Option<&[u8]>,
        to: Option<&[u8]>,
        memtables: &[&'a dyn OrderedEntries],
    ) -> Result<MergingIterator<'a>> {
        let snapshot = self.pinned();
        let mut iterators: Vec<PeekableIter<'a>> =
            Vec::with_capacity(snapshot.len() + memtables.len());

        for segment in snapshot.iter() {
            let priority = segment.ordinal();
            let iter: BoxedEntryIter<'a> = Box::new(segment.range_iter(from, to)?);
            push_non_empty(&mut iterators, iter, priority);
        }

        // Memtables are strictly fresher than any on-disk segment ordinal, and
        // freshest among themselves at index 0.
        for (rank, memtable) in memtables.iter().enumerate() {
            let priority = u64::MAX - rank as u64;
            let iter = memtable.range_iter(from, to);
            push_non_empty(&mut iterators, iter, priority);
        }

        Ok(MergingIterator::new(iterators))
    }

    /// Writes `entries` (already ordered, already deduplicated by key) out as
    /// a new, freshest segment. A `snapshot` with no entries is a no-op: an
    /// empty memtable never produces an empty segment file on disk.
    pub fn flush<I>(&self, snapshot: I) -> Result<()>
    where
        I: IntoIterator<Item = Entry>,
    {
        let mut entries = snapshot.into_iter().peekable();
        if entries.peek().is_none() {
            log::debug!("flush of empty snapshot skipped in {:?}", self.dir);
            return Ok(());
        }

        let _guard = self.write_lock.lock().expect("lock is poisoned");

        let ordinal = self.pinned().len() as u64;
        let index_path = index_path(&self.dir, ordinal);
        let data_path = data_path(&self.dir, ordinal);
        let tmp_index = fs::temp_path_for(&index_path);
        let tmp_data = fs::temp_path_for(&data_path);

        fs::remove_best_effort(&tmp_index)?;
        fs::remove_best_effort(&tmp_data)?;

        save_segment(&tmp_index, &tmp_data, entries.map(Ok))?;

        fs::rename_atomic(&tmp_index, &index_path)?;
        fs::rename_atomic(&tmp_data, &data_path)?;

        let new_segment = Segment::load(&index_path, &data_path, ordinal)?;

        let mut guard = self.segments.write().expect("lock is poisoned");
        let mut new_list = Vec::with_capacity(guard.len() + 1);
        new_list.push(new_segment);
        new_list.extend(guard.iter().cloned());
        *guard = Arc::new(new_list);

        log::debug!("flushed segment {ordinal} in {:?}", self.dir);

        Ok(())
    }

    /// Merges every current segment into a single segment at ordinal 0,
    /// dropping shadowed versions and tombstones, via the sentinel-file
    /// write-then-rename protocol so a crash mid-compaction is recoverable on
    /// the next `load`.
    pub fn compact(&self) -> Result<()> {
        let _guard = self.write_lock.lock().expect("lock is poisoned");

        log::debug!("compacting segment set at {:?}", self.dir);

        let comp_index = compacted_index_path(&self.dir);
        let comp_data = compacted_data_path(&self.dir);
        let tmp_index = fs::temp_path_for(&comp_index);
        let tmp_data = fs::temp_path_for(&comp_data);

        fs::remove_best_effort(&tmp_index)?;
        fs::remove_best_effort(&tmp_data)?;

        let merged = self.range_scan(None, None, &[])?;
        save_segment(&tmp_index, &tmp_data, merged)?;

        fs::rename_atomic(&tmp_index, &comp_index)?;
        fs::rename_atomic(&tmp_data, &comp_data)?;

        finish_compact(&self.dir)?;

        let compacted = Segment::load(
            &index_path(&self.dir, 0),
            &data_path(&self.dir, 0),
            0,
        )?;

        let mut guard = self.segments.write().expect("lock is poisoned");
        *guard = Arc::new(vec![compacted]);

        log::debug!("compaction finished in {:?}", self.dir);

        Ok(())
    }

    /// Returns `true` if the set currently has at most one segment, i.e. a
    /// compaction would have nothing left to do.
    #[must_use]
    pub fn is_compacted(&self) -> bool {
        self.pinned().len() <= 1
    }

    /// Consumes the set. Outstanding readers holding a pinned snapshot (or an
    /// in-flight `range_scan` iterator) keep their memory maps alive via
    /// `Arc` regardless.
    pub fn close(self) {
        log::debug!("closing segment set at {:?}", self.dir);
    }
}

fn push_non_empty<'a>(iterators: &mut Vec<PeekableIter<'a>>, iter: BoxedEntryIter<'a>, priority: u64) {
    let peekable = PeekableIter::new(iter, priority);
    if !peekable.is_empty() {
        iterators.push(peekable);
    }
}

fn index_path(dir: &Path, ordinal: u64) -> PathBuf {
    dir.join(format!("{ordinal}.idx"))
}

fn data_path(dir: &Path, ordinal: u64) -> PathBuf {
    dir.join(format!("{ordinal}.dat"))
}

fn compacted_index_path(dir: &Path) -> PathBuf {
    dir.join(format!("{COMPACTED_STEM}.idx"))
}

fn compacted_data_path(dir: &Path) -> PathBuf {
    dir.join(format!("{COMPACTED_STEM}.dat"))
}

fn sentinel_exists(dir: &Path) -> Result<bool> {
    Ok(fs::exists(&compacted_index_path(dir))? || fs::exists(&compacted_data_path(dir))?)
}

/// Resumes (or no-ops) a compaction's final swap: deletes every existing
/// `N.idx`/`N.dat` pair, not just a contiguous prefix, then renames whichever
/// compaction sentinel(s) are present into place at ordinal 0.
///
/// Scanning the whole directory rather than stopping at the first missing
/// ordinal matters because a prior crash could have removed some old segment
/// files (e.g. via a partially-applied cleanup) while leaving a gap; stopping
/// early would leave those later files behind as garbage.
fn finish_compact(dir: &Path) -> Result<()> {
    let comp_index = compacted_index_path(dir);
    let comp_data = compacted_data_path(dir);

    let index_exists = fs::exists(&comp_index)?;
    let data_exists = fs::exists(&comp_data)?;

    if !index_exists && !data_exists {
        // Nothing to resume: either compaction never started, or a previous
        // call to this function already finished the swap.
        return Ok(());
    }

    for ordinal in fs::scan_ordinals(dir, "idx")? {
        fs::remove_best_effort(&index_path(dir, ordinal))?;
        fs::remove_best_effort(&data_path(dir, ordinal))?;
    }

    // A crash between the two renames in `compact` can leave only one
    // sentinel in place; renaming whichever exists keeps this idempotent and
    // retry-safe without inventing a recovery path the write side never
    // guaranteed (see DESIGN.md).
    if index_exists {
        fs::rename_atomic(&comp_index, &index_path(dir, 0))?;
    }
    if data_exists {
        fs::rename_atomic(&comp_data, &data_path(dir, 0))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Entry;
    use test_log::test;

    fn entries(pairs: &[(&str, Option<&str>)]) -> Vec<Entry> {
        pairs
            .iter()
            .map(|(k, v)| match v {
                Some(v) => Entry::new(*k, *v),
                None => Entry::tombstone(*k),
            })
            .collect()
    }

    #[test]
    fn flush_then_find_entry_sees_tombstones() {
        let dir = tempfile::tempdir().expect("tempdir");
        let set = SegmentSet::load(dir.path()).expect("load");

        set.flush(entries(&[("a", Some("1")), ("b", None)]))
            .expect("flush");

        assert_eq!(
            set.find_entry(b"a")
                .expect("ok")
                .expect("present")
                .value
                .as_deref(),
            Some(b"1".as_slice())
        );
        assert!(set.find_entry(b"b").expect("ok").expect("present").is_tombstone());
        assert!(set.find_entry(b"missing").expect("ok").is_none());
    }

    #[test]
    fn later_flush_shadows_earlier_one() {
        let dir = tempfile::tempdir().expect("tempdir");
        let set = SegmentSet::load(dir.path()).expect("load");

        set.flush(entries(&[("a", Some("1"))])).expect("flush 0");
        set.flush(entries(&[("a", Some("2"))])).expect("flush 1");
        set.flush(entries(&[("b", Some("3"))])).expect("flush 2");

        assert_eq!(
            set.find_entry(b"a")
                .expect("ok")
                .expect("present")
                .value
                .as_deref(),
            Some(b"2".as_slice())
        );
    }

    #[test]
    fn range_scan_merges_segments_with_exclusive_upper_bound() {
        let dir = tempfile::tempdir().expect("tempdir");
        let set = SegmentSet::load(dir.path()).expect("load");

        set.flush(entries(&[("a", Some("1")), ("c", Some("3"))]))
            .expect("flush 0");
        set.flush(entries(&[("b", Some("2")), ("d", Some("4"))]))
            .expect("flush 1");

        let keys: Vec<Vec<u8>> = set
            .range_scan(Some(b"a"), Some(b"d"), &[])
            .expect("range_scan")
            .map(|e| e.expect("ok").key.to_vec())
            .collect();

        assert_eq!(
            keys,
            vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]
        );
    }

    #[test]
    fn compact_merges_and_drops_tombstones() {
        let dir = tempfile::tempdir().expect("tempdir");
        let set = SegmentSet::load(dir.path()).expect("load");

        set.flush(entries(&[("a", Some("1")), ("b", Some("2"))]))
            .expect("flush 0");
        set.flush(entries(&[("a", None)])).expect("flush 1");

        set.compact().expect("compact");

        assert!(set.is_compacted());
        assert!(set.find_entry(b"a").expect("ok").is_none());
        assert_eq!(
            set.find_entry(b"b")
                .expect("ok")
                .expect("present")
                .value
                .as_deref(),
            Some(b"2".as_slice())
        );
    }

    #[test]
    fn empty_flush_is_a_no_op() {
        let dir = tempfile::tempdir().expect("tempdir");
        let set = SegmentSet::load(dir.path()).expect("load");

        set.flush(Vec::new()).expect("flush");

        assert!(!fs::exists(&index_path(dir.path(), 0)).expect("exists check"));
        assert!(set.is_compacted());
    }

    #[test]
    fn load_resumes_an_interrupted_compaction() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let set = SegmentSet::load(dir.path()).expect("load");
            set.flush(entries(&[("a", Some("1"))])).expect("flush 0");
            set.flush(entries(&[("b", Some("2"))])).expect("flush 1");
        }

        // Hand-simulate a crash after `compact` committed both sentinel
        // files via rename but before it swept the old segment files and
        // renamed the sentinels into place at ordinal 0 — exactly the window
        // `finish_compact` exists to resume from.
        let merged = entries(&[("a", Some("1")), ("b", Some("2"))]);
        save_segment(
            &compacted_index_path(dir.path()),
            &compacted_data_path(dir.path()),
            merged.into_iter().map(Ok),
        )
        .expect("write sentinel pair");

        let set = SegmentSet::load(dir.path()).expect("load should recover");
        assert!(set.is_compacted());
        assert_eq!(
            set.find_entry(b"b")
                .expect("ok")
                .expect("present")
                .value
                .as_deref(),
            Some(b"2".as_slice())
        );
    }
}
