use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use segment_store::{Entry, SegmentSet};
use std::collections::BTreeMap;
use test_log::test;

/// Pseudo-property test: replays a seeded, shuffled sequence of flush
/// batches (each with a random mix of values and tombstones over a shared
/// key universe) against a reference `BTreeMap` model, checking ordering,
/// freshness, and tombstone suppression both before and after `compact`.
///
/// Grounded on the reference corpus's preference for a seeded `rand::rngs`
/// generator over an external property-testing crate (see
/// `examples/fjall-rs-lsm-tree/src/memtable/skiplist/test.rs`, which seeds
/// its own randomized concurrency test the same way) rather than a
/// `quickcheck`/`proptest` shrinking harness.
fn run_with_seed(seed: u64) -> segment_store::Result<()> {
    let mut rng = StdRng::seed_from_u64(seed);

    let universe: Vec<Vec<u8>> = (0..40u32).map(|n| format!("key-{n:03}").into_bytes()).collect();
    let batch_count = rng.random_range(3..8);

    let mut model: BTreeMap<Vec<u8>, Option<Vec<u8>>> = BTreeMap::new();

    let dir = tempfile::tempdir()?;
    let set = SegmentSet::load(dir.path())?;

    for batch_idx in 0..batch_count {
        let mut keys = universe.clone();
        keys.shuffle(&mut rng);
        keys.truncate(rng.random_range(1..=universe.len()));

        let mut batch: BTreeMap<Vec<u8>, Option<Vec<u8>>> = BTreeMap::new();
        for key in keys {
            let value = if rng.random_bool(0.25) {
                None
            } else {
                Some(format!("v{batch_idx}-{}", rng.random::<u32>()).into_bytes())
            };
            batch.insert(key, value);
        }

        for (key, value) in &batch {
            model.insert(key.clone(), value.clone());
        }

        let entries: Vec<Entry> = batch
            .into_iter()
            .map(|(key, value)| match value {
                Some(v) => Entry::new(key, v),
                None => Entry::tombstone(key),
            })
            .collect();

        set.flush(entries)?;
    }

    assert_live_state_matches(&set, &model)?;

    set.compact()?;
    assert!(set.is_compacted());
    assert_live_state_matches(&set, &model)?;

    Ok(())
}

fn assert_live_state_matches(
    set: &SegmentSet,
    model: &BTreeMap<Vec<u8>, Option<Vec<u8>>>,
) -> segment_store::Result<()> {
    for (key, expected) in model {
        let found = set.find_entry(key)?;
        match expected {
            Some(value) => {
                let entry = found.expect("key present in model must be found");
                assert_eq!(entry.value.as_deref(), Some(value.as_slice()));
            }
            None => {
                let entry = found.expect("tombstone must still be visible to a point lookup");
                assert!(entry.is_tombstone());
            }
        }
    }

    let expected_live: Vec<(Vec<u8>, Vec<u8>)> = model
        .iter()
        .filter_map(|(k, v)| v.as_ref().map(|v| (k.clone(), v.clone())))
        .collect();

    let scanned: Vec<(Vec<u8>, Vec<u8>)> = set
        .range_scan(None, None, &[])?
        .map(|e| e.expect("ok"))
        .map(|e| (e.key.to_vec(), e.value.expect("not a tombstone").to_vec()))
        .collect();

    assert_eq!(scanned, expected_live, "ordering/freshness/tombstone mismatch");

    for window in scanned.windows(2) {
        assert!(window[0].0 < window[1].0, "range scan must be strictly ascending");
    }

    Ok(())
}

#[test]
fn randomized_flush_compact_multiple_seeds() -> segment_store::Result<()> {
    for seed in [1u64, 2, 3, 42, 1337, 0xC0FFEE] {
        run_with_seed(seed)?;
    }
    Ok(())
}
