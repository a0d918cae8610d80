// Copyright (c) 2026-present, segment-store contributors
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The boundary this crate consumes the external, mutable in-memory table
//! through. The table itself (a sorted map of pending writes) is out of
//! scope for this crate; callers pass an implementation in to `range_scan`.

use crate::error::Result;
use crate::value::Entry;

/// An ordered source of pending, not-yet-flushed writes.
///
/// `SegmentSet::range_scan` accepts a list of these, freshest first, and
/// merges them with the on-disk segments using the same priority and
/// tombstone rules.
pub trait OrderedEntries {
    /// Returns entries with `from <= key < to`, in ascending key order.
    /// `from = None` is unbounded below; `to = None` is unbounded above.
    fn range_iter<'a>(
        &'a self,
        from: Option<&[u8]>,
        to: Option<&[u8]>,
    ) -> Box<dyn Iterator<Item = Result<Entry>> + 'a>;
}
