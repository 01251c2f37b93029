//! # B+Tree Leaf Node
//!
//! Leaf nodes hold the actual (key, record locator) entries in ascending
//! key order and are chained left-to-right through a sibling pointer for
//! range scans.
//!
//! ## Page Layout
//!
//! ```text
//! Offset            Content
//! ------            -------
//! 0                 LeafHeader { key_count: u16, reserved: [u8; 2] }
//! 4                 LeafEntry 0  (key: i64, page_no: u32, slot_no: u16)
//! 18                LeafEntry 1
//! ...               fixed 14-byte stride, ascending key order
//! PAGE_SIZE - 4     next-leaf page id (0 = rightmost leaf)
//! ```
//!
//! The sibling pointer lives at a fixed tail offset, so it stays put as
//! the entry count changes. Everything between the last entry and the
//! tail pointer is slack.
//!
//! ## Search
//!
//! `locate` binary-searches for the first entry with `key >= search_key`
//! and returns its index, or `key_count()` when every key is smaller.
//! Equal keys are found at their first occurrence, which is also where
//! `insert` places new duplicates.
//!
//! ## Splitting
//!
//! `insert_and_split` applies to a full node only: the upper half of the
//! entries moves to an empty sibling, the sibling inherits the old next
//! pointer, and the new entry lands in whichever half its pre-split
//! position selects. The sibling's first key is returned as the
//! separator for the parent. Relinking the old node to the sibling's
//! page id is the caller's job, since only the caller knows it.

use eyre::{ensure, Result};
use zerocopy::little_endian::{I64, U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::config::{
    LEAF_ENTRY_SIZE, LEAF_HEADER_SIZE, LEAF_MAX_KEYS, NEXT_PTR_OFFSET, PAGE_SIZE,
};
use crate::storage::{PageBuf, PageId, PageStore};
use crate::types::RecordId;

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
struct LeafHeader {
    key_count: U16,
    reserved: [u8; 2],
}

const _: () = assert!(std::mem::size_of::<LeafHeader>() == LEAF_HEADER_SIZE);

impl LeafHeader {
    zerocopy_accessors! {
        key_count: u16,
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct LeafEntry {
    key: I64,
    page_no: U32,
    slot_no: U16,
}

const _: () = assert!(std::mem::size_of::<LeafEntry>() == LEAF_ENTRY_SIZE);

impl LeafEntry {
    fn new(key: i64, rid: RecordId) -> Self {
        Self {
            key: I64::new(key),
            page_no: U32::new(rid.page_no),
            slot_no: U16::new(rid.slot_no),
        }
    }

    pub fn key(&self) -> i64 {
        self.key.get()
    }

    pub fn rid(&self) -> RecordId {
        RecordId::new(self.page_no.get(), self.slot_no.get())
    }
}

/// One leaf node, operating on an owned page buffer.
#[derive(Clone)]
pub struct LeafNode {
    page: PageBuf,
}

impl LeafNode {
    /// Creates an empty leaf: zero entries, sibling pointer 0.
    pub fn new() -> Self {
        Self {
            page: [0u8; PAGE_SIZE],
        }
    }

    /// Loads the node from page `pid` and validates the stored count.
    pub fn read<S: PageStore>(&mut self, pid: PageId, store: &mut S) -> Result<()> {
        store.read_page(pid, &mut self.page)?;
        ensure!(
            self.key_count() <= LEAF_MAX_KEYS,
            "page {} is not a valid leaf node (key_count={})",
            pid,
            self.key_count()
        );
        Ok(())
    }

    /// Stores the node at page `pid`.
    pub fn write<S: PageStore>(&self, pid: PageId, store: &mut S) -> Result<()> {
        store.write_page(pid, &self.page)
    }

    fn header(&self) -> &LeafHeader {
        // INVARIANT: const-sized prefix of an owned page, cannot fail
        LeafHeader::ref_from_bytes(&self.page[..LEAF_HEADER_SIZE]).unwrap()
    }

    fn header_mut(&mut self) -> &mut LeafHeader {
        // INVARIANT: const-sized prefix of an owned page, cannot fail
        LeafHeader::mut_from_bytes(&mut self.page[..LEAF_HEADER_SIZE]).unwrap()
    }

    pub fn key_count(&self) -> usize {
        self.header().key_count() as usize
    }

    fn set_key_count(&mut self, count: usize) {
        self.header_mut().set_key_count(count as u16);
    }

    pub fn is_full(&self) -> bool {
        self.key_count() == LEAF_MAX_KEYS
    }

    fn entry_offset(eid: usize) -> usize {
        LEAF_HEADER_SIZE + eid * LEAF_ENTRY_SIZE
    }

    fn entry(&self, eid: usize) -> &LeafEntry {
        let offset = Self::entry_offset(eid);
        // INVARIANT: callers stay below key_count, which read() bounds
        LeafEntry::ref_from_bytes(&self.page[offset..offset + LEAF_ENTRY_SIZE]).unwrap()
    }

    /// Returns the index of the first entry with `key >= search_key`, or
    /// `key_count()` when every stored key is smaller.
    pub fn locate(&self, search_key: i64) -> usize {
        let mut left = 0usize;
        let mut right = self.key_count();

        while left < right {
            let mid = left + (right - left) / 2;
            if self.entry(mid).key() < search_key {
                left = mid + 1;
            } else {
                right = mid;
            }
        }
        left
    }

    /// Reads the entry at `eid`, bounds-checked against the key count.
    pub fn read_entry(&self, eid: usize) -> Result<(i64, RecordId)> {
        ensure!(
            eid < self.key_count(),
            "entry index {} out of bounds (key_count={})",
            eid,
            self.key_count()
        );
        let entry = self.entry(eid);
        Ok((entry.key(), entry.rid()))
    }

    /// Inserts `(key, rid)` at its sorted position, shifting the suffix
    /// right by one stride. Fails when the node is full.
    pub fn insert(&mut self, key: i64, rid: RecordId) -> Result<()> {
        let count = self.key_count();
        ensure!(count < LEAF_MAX_KEYS, "leaf node full");

        let pos = self.locate(key);
        let start = Self::entry_offset(pos);
        let end = Self::entry_offset(count);
        self.page.copy_within(start..end, start + LEAF_ENTRY_SIZE);

        let entry = LeafEntry::new(key, rid);
        self.page[start..start + LEAF_ENTRY_SIZE].copy_from_slice(entry.as_bytes());
        self.set_key_count(count + 1);
        Ok(())
    }

    /// Splits a full node half-and-half into `sibling` (which must be
    /// empty), inserts `(key, rid)` into the half its pre-split position
    /// selects, and returns the sibling's first key as the separator to
    /// promote. The sibling inherits this node's next pointer; the
    /// caller must then point this node at the sibling's page.
    pub fn insert_and_split(
        &mut self,
        key: i64,
        rid: RecordId,
        sibling: &mut LeafNode,
    ) -> Result<i64> {
        ensure!(self.is_full(), "insert_and_split requires a full node");
        ensure!(sibling.key_count() == 0, "split sibling must be empty");

        let half = LEAF_MAX_KEYS / 2;
        let pos = self.locate(key);

        let start = Self::entry_offset(half);
        let end = Self::entry_offset(LEAF_MAX_KEYS);
        sibling.page[LEAF_HEADER_SIZE..LEAF_HEADER_SIZE + (end - start)]
            .copy_from_slice(&self.page[start..end]);
        sibling.set_next_ptr(self.next_ptr());

        self.set_key_count(half);
        sibling.set_key_count(LEAF_MAX_KEYS - half);

        if pos <= half {
            self.insert(key, rid)?;
        } else {
            sibling.insert(key, rid)?;
        }

        let (separator, _) = sibling.read_entry(0)?;
        Ok(separator)
    }

    /// Page id of the next leaf in key order; 0 marks the rightmost leaf.
    pub fn next_ptr(&self) -> PageId {
        // INVARIANT: const-sized tail of an owned page, cannot fail
        U32::ref_from_bytes(&self.page[NEXT_PTR_OFFSET..]).unwrap().get()
    }

    pub fn set_next_ptr(&mut self, pid: PageId) {
        self.page[NEXT_PTR_OFFSET..].copy_from_slice(U32::new(pid).as_bytes());
    }
}

impl Default for LeafNode {
    fn default() -> Self {
        Self::new()
    }
}
