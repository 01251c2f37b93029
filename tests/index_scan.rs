//! # Index Scan Integration Tests
//!
//! End-to-end tests over the public API: insertion across splits, cursor
//! scans across leaf boundaries, persistence across reopen, and the
//! structural invariants of the persisted tree (separator bounds and the
//! sibling chain), verified by walking the raw pages.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tempfile::{tempdir, TempDir};

use burrow::btree::{InteriorNode, LeafNode};
use burrow::config::LEAF_MAX_KEYS;
use burrow::storage::{PageFile, PageId};
use burrow::{AccessMode, BTreeIndex, RecordId};

fn index_path(dir: &TempDir) -> PathBuf {
    dir.path().join("scan.idx")
}

fn rid(n: u32) -> RecordId {
    RecordId::new(n / 100 + 1, (n % 100) as u16)
}

/// Distinct pseudo-random keys: multiplication by an odd constant is a
/// bijection modulo 2^31, so distinct inputs give distinct keys.
fn scrambled_key(i: u64) -> i64 {
    (i.wrapping_mul(2_654_435_761) & 0x7FFF_FFFF) as i64
}

fn scan_all(index: &mut BTreeIndex) -> Vec<(i64, RecordId)> {
    let mut cursor = index.locate(i64::MIN).unwrap();
    let mut out = Vec::new();
    while let Some(entry) = index.read_forward(&mut cursor).unwrap() {
        out.push(entry);
    }
    out
}

#[test]
fn empty_index_scans_nothing() {
    let dir = tempdir().unwrap();
    let mut index = BTreeIndex::open(index_path(&dir), AccessMode::ReadWrite).unwrap();

    let mut cursor = index.locate(5).unwrap();

    assert!(cursor.is_exhausted());
    assert_eq!(index.read_forward(&mut cursor).unwrap(), None);
}

#[test]
fn locate_seeks_and_scans_in_key_order() {
    let dir = tempdir().unwrap();
    let mut index = BTreeIndex::open(index_path(&dir), AccessMode::ReadWrite).unwrap();

    index.insert(10, rid(1)).unwrap();
    index.insert(20, rid(2)).unwrap();
    index.insert(15, rid(3)).unwrap();

    let mut cursor = index.locate(15).unwrap();
    assert_eq!(index.read_forward(&mut cursor).unwrap(), Some((15, rid(3))));
    assert_eq!(index.read_forward(&mut cursor).unwrap(), Some((20, rid(2))));
    assert_eq!(index.read_forward(&mut cursor).unwrap(), None);
}

#[test]
fn ascending_overflow_reaches_height_two() {
    let dir = tempdir().unwrap();
    let mut index = BTreeIndex::open(index_path(&dir), AccessMode::ReadWrite).unwrap();

    let count = LEAF_MAX_KEYS + 1;
    for i in 1..=count {
        index.insert(i as i64, rid(i as u32)).unwrap();
    }

    assert_eq!(index.height(), 2);

    let keys: Vec<i64> = scan_all(&mut index).into_iter().map(|(k, _)| k).collect();
    assert_eq!(keys, (1..=count as i64).collect::<Vec<_>>());
}

#[test]
fn descending_inserts_scan_identically() {
    let dir = tempdir().unwrap();
    let mut index = BTreeIndex::open(index_path(&dir), AccessMode::ReadWrite).unwrap();

    let count = LEAF_MAX_KEYS + 1;
    for i in (1..=count).rev() {
        index.insert(i as i64, rid(i as u32)).unwrap();
    }

    assert_eq!(index.height(), 2);

    let keys: Vec<i64> = scan_all(&mut index).into_iter().map(|(k, _)| k).collect();
    assert_eq!(keys, (1..=count as i64).collect::<Vec<_>>());
}

#[test]
fn random_keys_survive_reopen_read_only() {
    let dir = tempdir().unwrap();
    let path = index_path(&dir);
    let count = 10_000u64;

    let mut expected = HashMap::new();
    {
        let mut index = BTreeIndex::open(&path, AccessMode::ReadWrite).unwrap();
        for i in 0..count {
            let key = scrambled_key(i);
            index.insert(key, rid(i as u32)).unwrap();
            expected.insert(key, rid(i as u32));
        }
        index.close().unwrap();
    }

    let mut index = BTreeIndex::open(&path, AccessMode::ReadOnly).unwrap();
    assert_eq!(index.height(), 3);

    for (&key, &expected_rid) in &expected {
        let mut cursor = index.locate(key).unwrap();
        assert_eq!(
            index.read_forward(&mut cursor).unwrap(),
            Some((key, expected_rid)),
            "lookup of key {} after reopen",
            key
        );
    }

    let scanned = scan_all(&mut index);
    assert_eq!(scanned.len(), count as usize);
    for window in scanned.windows(2) {
        assert!(window[0].0 < window[1].0);
    }
}

#[test]
fn reopen_scan_matches_pre_close_scan() {
    let dir = tempdir().unwrap();
    let path = index_path(&dir);

    let before;
    {
        let mut index = BTreeIndex::open(&path, AccessMode::ReadWrite).unwrap();
        for i in 0..1_000u64 {
            index.insert(scrambled_key(i), rid(i as u32)).unwrap();
        }
        before = scan_all(&mut index);
        index.close().unwrap();
    }

    let mut index = BTreeIndex::open(&path, AccessMode::ReadOnly).unwrap();
    assert_eq!(scan_all(&mut index), before);
}

#[test]
fn duplicate_keys_stay_contiguous_across_splits() {
    let dir = tempdir().unwrap();
    let mut index = BTreeIndex::open(index_path(&dir), AccessMode::ReadWrite).unwrap();

    // enough filler on both sides of the duplicates to force splits
    for i in 0..LEAF_MAX_KEYS as i64 {
        index.insert(i, rid(i as u32)).unwrap();
        index.insert(1_000 + i, rid(i as u32)).unwrap();
    }
    let dup_key = 500i64;
    for n in 0..5u32 {
        index.insert(dup_key, rid(9_000 + n)).unwrap();
    }

    let scanned = scan_all(&mut index);
    assert_eq!(scanned.len(), 2 * LEAF_MAX_KEYS + 5);

    let dup_positions: Vec<usize> = scanned
        .iter()
        .enumerate()
        .filter(|(_, (k, _))| *k == dup_key)
        .map(|(i, _)| i)
        .collect();
    assert_eq!(dup_positions.len(), 5);
    assert_eq!(
        dup_positions,
        (dup_positions[0]..dup_positions[0] + 5).collect::<Vec<_>>()
    );
}

#[test]
fn exclusive_lower_bound_skips_equal_keys() {
    let dir = tempdir().unwrap();
    let mut index = BTreeIndex::open(index_path(&dir), AccessMode::ReadWrite).unwrap();

    for key in [10i64, 20, 20, 20, 30, 40] {
        index.insert(key, rid(key as u32)).unwrap();
    }

    // the "key > 20" consumer pattern: locate the bound, then advance
    // past every entry equal to it
    let bound = 20i64;
    let mut cursor = index.locate(bound).unwrap();
    let mut first_above = None;
    while let Some((key, entry_rid)) = index.read_forward(&mut cursor).unwrap() {
        if key > bound {
            first_above = Some((key, entry_rid));
            break;
        }
    }
    assert_eq!(first_above, Some((30, rid(30))));
}

/// Walks the persisted tree checking the interior separator invariant
/// (left subtree < separator <= right subtree) and collecting leaves in
/// key order.
fn check_subtree(
    store: &mut PageFile,
    pid: PageId,
    level: u32,
    height: u32,
    lower: Option<i64>,
    upper: Option<i64>,
    leaves: &mut Vec<PageId>,
) {
    if level == height {
        let mut leaf = LeafNode::new();
        leaf.read(pid, store).unwrap();
        for eid in 0..leaf.key_count() {
            let (key, _) = leaf.read_entry(eid).unwrap();
            if let Some(lo) = lower {
                assert!(key >= lo, "leaf {} key {} below bound {}", pid, key, lo);
            }
            if let Some(hi) = upper {
                assert!(key < hi, "leaf {} key {} at or above bound {}", pid, key, hi);
            }
            if eid > 0 {
                assert!(leaf.read_entry(eid - 1).unwrap().0 <= key);
            }
        }
        leaves.push(pid);
        return;
    }

    let mut node = InteriorNode::new();
    node.read(pid, store).unwrap();
    assert!(node.key_count() >= 1);

    let mut child_lower = lower;
    let mut child = node.first_child();
    for eid in 0..node.key_count() {
        let (separator, right) = node.read_entry(eid).unwrap();
        if let Some(lo) = lower {
            assert!(separator >= lo);
        }
        if let Some(hi) = upper {
            assert!(separator < hi);
        }
        check_subtree(
            store,
            child,
            level + 1,
            height,
            child_lower,
            Some(separator),
            leaves,
        );
        child_lower = Some(separator);
        child = right;
    }
    check_subtree(store, child, level + 1, height, child_lower, upper, leaves);
}

fn verify_tree_shape(path: &Path, root: PageId, height: u32) {
    let mut store = PageFile::open(path, AccessMode::ReadOnly).unwrap();
    let mut leaves = Vec::new();
    check_subtree(&mut store, root, 1, height, None, None, &mut leaves);

    // the sibling chain from the leftmost leaf visits every leaf once,
    // in key order, and only the rightmost terminates with 0
    let mut chain = Vec::new();
    let mut pid = leaves[0];
    loop {
        chain.push(pid);
        let mut leaf = LeafNode::new();
        leaf.read(pid, &mut store).unwrap();
        if leaf.next_ptr() == 0 {
            break;
        }
        pid = leaf.next_ptr();
        assert!(
            chain.len() <= leaves.len(),
            "sibling chain longer than leaf count"
        );
    }
    assert_eq!(chain, leaves);
}

#[test]
fn persisted_tree_upholds_structural_invariants() {
    let dir = tempdir().unwrap();
    let path = index_path(&dir);

    let (root, height) = {
        let mut index = BTreeIndex::open(&path, AccessMode::ReadWrite).unwrap();
        for i in 0..5_000u64 {
            index.insert(scrambled_key(i), rid(i as u32)).unwrap();
        }
        let shape = (index.root_pid(), index.height());
        index.close().unwrap();
        shape
    };

    assert!(height >= 2);
    verify_tree_shape(&path, root, height);
}

#[test]
fn sequential_load_upholds_structural_invariants() {
    let dir = tempdir().unwrap();
    let path = index_path(&dir);

    let (root, height) = {
        let mut index = BTreeIndex::open(&path, AccessMode::ReadWrite).unwrap();
        for i in 0..5_000i64 {
            index.insert(i, rid(i as u32)).unwrap();
        }
        let shape = (index.root_pid(), index.height());
        index.close().unwrap();
        shape
    };

    assert!(height >= 3);
    verify_tree_shape(&path, root, height);
}
