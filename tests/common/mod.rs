use segment_store::{Entry, OrderedEntries, Result};
use std::collections::BTreeMap;

/// A trivial stand-in for the external in-memory table: an ordered map of
/// pending writes, used only to exercise `SegmentSet::range_scan`'s memtable
/// merge path in tests.
pub struct TestMemtable {
    entries: BTreeMap<Vec<u8>, Entry>,
}

impl TestMemtable {
    pub fn new(pairs: &[(&str, Option<&str>)]) -> Self {
        let entries = pairs
            .iter()
            .map(|(k, v)| {
                let entry = match v {
                    Some(v) => Entry::new(*k, *v),
                    None => Entry::tombstone(*k),
                };
                (k.as_bytes().to_vec(), entry)
            })
            .collect();
        Self { entries }
    }
}

impl OrderedEntries for TestMemtable {
    fn range_iter<'a>(
        &'a self,
        from: Option<&[u8]>,
        to: Option<&[u8]>,
    ) -> Box<dyn Iterator<Item = Result<Entry>> + 'a> {
        Box::new(self.entries.iter().filter_map(move |(k, entry)| {
            if let Some(from) = from {
                if k.as_slice() < from {
                    return None;
                }
            }
            if let Some(to) = to {
                if k.as_slice() >= to {
                    return None;
                }
            }
            Some(Ok(entry.clone()))
        }))
    }
}
