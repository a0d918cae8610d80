// Copyright (c) 2026-present, segment-store contributors
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::inner::Inner;
use crate::value::Entry;
use std::sync::Arc;

/// Iterator over a bounded range of a single segment's entries, in ascending
/// key order.
///
/// Holds an `Arc` clone of the segment's backing memory maps, so it can
/// outlive the `Segment` handle it was created from (e.g. once collected into
/// a `SegmentSet` reader's pinned snapshot).
pub struct RangeIter {
    inner: Arc<Inner>,
    position: usize,
    to: Option<Vec<u8>>,
    done: bool,
}

impl RangeIter {
    pub(super) fn new(inner: Arc<Inner>, start: usize, to: Option<Vec<u8>>) -> Self {
        Self {
            inner,
            position: start,
            to,
            done: false,
        }
    }
}

impl Iterator for RangeIter {
    type Item = crate::Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.position >= self.inner.count {
            return None;
        }

        let entry = match super::decode_entry_at(&self.inner, self.position) {
            Ok(entry) => entry,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };

        if let Some(to) = &self.to {
            if entry.key.as_ref() >= to.as_slice() {
                self.done = true;
                return None;
            }
        }

        self.position += 1;
        Some(Ok(entry))
    }
}
