// Copyright (c) 2026-present, segment-store contributors
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::error::Result;
use crate::value::Entry;

/// An ordered entry stream, boxed so that segment readers and memtable
/// readers can be stored side by side in the same `Vec`.
pub type BoxedEntryIter<'a> = Box<dyn Iterator<Item = Result<Entry>> + 'a>;

/// Wraps an ordered entry iterator with a priority and an eagerly cached
/// `peek` slot.
///
/// Two peeking iterators compare by current key; priority is the tie-break
/// (larger priority wins). On-disk segments use their ordinal as priority;
/// caller-supplied memtables are assigned priorities strictly above any
/// segment ordinal so that they always dominate on a key tie (see
/// `SegmentSet::range_scan`).
pub struct PeekableIter<'a> {
    iter: BoxedEntryIter<'a>,
    priority: u64,
    peeked: Option<Result<Entry>>,
}

impl<'a> PeekableIter<'a> {
    /// Wraps `iter`, eagerly pulling its first item into the peek slot.
    pub fn new(mut iter: BoxedEntryIter<'a>, priority: u64) -> Self {
        let peeked = iter.next();
        Self {
            iter,
            priority,
            peeked,
        }
    }

    /// Non-destructively views the current item, if any.
    pub fn peek(&self) -> Option<&Result<Entry>> {
        self.peeked.as_ref()
    }

    /// This iterator's priority; higher wins on a key tie.
    pub fn priority(&self) -> u64 {
        self.priority
    }

    /// Returns `true` if this iterator has no more items.
    pub fn is_empty(&self) -> bool {
        self.peeked.is_none()
    }

    /// Returns the currently peeked item and pulls the next one into the peek
    /// slot.
    pub fn advance(&mut self) -> Option<Result<Entry>> {
        let next = self.iter.next();
        std::mem::replace(&mut self.peeked, next)
    }
}
