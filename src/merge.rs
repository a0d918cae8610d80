// Copyright (c) 2026-present, segment-store contributors
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! K-way merge of peeking iterators, keyed by `(current_key ASC, priority
//! DESC)`, with tombstone suppression at the merged-output boundary.

use crate::error::{Error, Result};
use crate::peekable::PeekableIter;
use crate::value::{Entry, Key};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A heap entry referencing one of the merge's input iterators by index.
///
/// `Ord` is inverted on the key (so `BinaryHeap`, a max-heap, surfaces the
/// smallest key first) and kept natural on priority (so among equal keys the
/// freshest iterator surfaces first).
struct HeapItem {
    idx: usize,
    key: Key,
    priority: u64,
}

impl PartialEq for HeapItem {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.priority == other.priority
    }
}

impl Eq for HeapItem {}

impl Ord for HeapItem {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .key
            .cmp(&self.key)
            .then_with(|| self.priority.cmp(&other.priority))
    }
}

impl PartialOrd for HeapItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Merges any number of ordered, priority-tagged entry iterators into a
/// single ascending stream with freshest-wins semantics and tombstones
/// suppressed.
pub struct MergingIterator<'a> {
    iterators: Vec<PeekableIter<'a>>,
    heap: BinaryHeap<HeapItem>,
    error: Option<Error>,
}

impl<'a> MergingIterator<'a> {
    /// Builds a merger over `iterators`. Empty iterators are simply ignored.
    #[must_use]
    pub fn new(iterators: Vec<PeekableIter<'a>>) -> Self {
        let mut merger = Self {
            iterators,
            heap: BinaryHeap::new(),
            error: None,
        };

        for idx in 0..merger.iterators.len() {
            merger.push_if_ready(idx);
        }

        merger
    }

    /// Pushes iterator `idx`'s current peeked entry onto the heap, if it has
    /// one. If the peeked slot holds an error, the iterator is abandoned and
    /// the error is latched to be returned by the next call to `next`.
    fn push_if_ready(&mut self, idx: usize) {
        if self.error.is_some() {
            return;
        }

        let priority = self.iterators[idx].priority();

        match self.iterators[idx].peek() {
            Some(Ok(entry)) => {
                let key = entry.key.clone();
                self.heap.push(HeapItem { idx, key, priority });
            }
            Some(Err(_)) => {
                if let Some(Err(e)) = self.iterators[idx].advance() {
                    self.error = Some(e);
                }
            }
            None => {}
        }
    }

    /// Advances iterator `idx` past its current key, discarding the result,
    /// and reinserts it into the heap if it still has entries. Used to drain
    /// shadowed (older) versions of a key that was already emitted.
    fn advance_and_discard(&mut self, idx: usize) {
        match self.iterators[idx].advance() {
            Some(Ok(_)) => {}
            Some(Err(e)) => self.error = Some(e),
            None => {}
        }
        self.push_if_ready(idx);
    }
}

impl<'a> Iterator for MergingIterator<'a> {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(e) = self.error.take() {
                return Some(Err(e));
            }

            let top = self.heap.pop()?;
            let key = top.key.clone();

            let winning_entry = match self.iterators[top.idx].advance() {
                Some(Ok(entry)) => entry,
                Some(Err(e)) => {
                    self.error = Some(e);
                    continue;
                }
                None => unreachable!("heap item must have a peeked entry ready to advance"),
            };
            self.push_if_ready(top.idx);

            // Shadow any other iterator currently holding the same key; these
            // are older versions, already superseded by `winning_entry`.
            while let Some(next_top) = self.heap.peek() {
                if next_top.key != key {
                    break;
                }
                let shadowed = self.heap.pop().expect("just peeked a present item");
                self.advance_and_discard(shadowed.idx);
            }

            if winning_entry.is_tombstone() {
                continue;
            }

            return Some(Ok(winning_entry));
        }
    }
}
