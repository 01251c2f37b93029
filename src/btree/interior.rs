//! # B+Tree Interior Node
//!
//! Interior nodes route descent: `n` separator keys interleaved with
//! `n + 1` child page ids. The leading child lives in the header; each
//! stored entry pairs a separator with the child to its RIGHT.
//!
//! ## Page Layout
//!
//! ```text
//! Offset   Content
//! ------   -------
//! 0        InteriorHeader { key_count: u16, reserved: [u8; 2],
//!                           first_child: u32 }
//! 8        InteriorEntry 0  (key: i64, child: u32)
//! 20       InteriorEntry 1
//! ...      fixed 12-byte stride, ascending key order
//! ```
//!
//! ## Routing Semantics
//!
//! For a search key K the followed child is the one left of the first
//! separator strictly greater than K:
//!
//! ```text
//! K < key[0]:                  first_child
//! key[i] <= K < key[i+1]:      child of entry i
//! K >= key[n-1]:               child of entry n-1
//! ```
//!
//! The strict comparison sends keys equal to a separator to the right,
//! the mirror of the leaf's first-`>=` search. Together the two produce
//! a stable seek: equal keys descend to the subtree whose leaves hold
//! them.
//!
//! ## Splitting
//!
//! `insert_and_split` promotes the pre-split middle key to the parent
//! and stores it in NEITHER half; the promoted key's right child becomes
//! the sibling's leading child.

use eyre::{ensure, Result};
use zerocopy::little_endian::{I64, U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::config::{INTERIOR_ENTRY_SIZE, INTERIOR_HEADER_SIZE, INTERIOR_MAX_KEYS, PAGE_SIZE};
use crate::storage::{PageBuf, PageId, PageStore};

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
struct InteriorHeader {
    key_count: U16,
    reserved: [u8; 2],
    first_child: U32,
}

const _: () = assert!(std::mem::size_of::<InteriorHeader>() == INTERIOR_HEADER_SIZE);

impl InteriorHeader {
    zerocopy_accessors! {
        key_count: u16,
        first_child: u32,
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct InteriorEntry {
    key: I64,
    child: U32,
}

const _: () = assert!(std::mem::size_of::<InteriorEntry>() == INTERIOR_ENTRY_SIZE);

impl InteriorEntry {
    fn new(key: i64, child: PageId) -> Self {
        Self {
            key: I64::new(key),
            child: U32::new(child),
        }
    }

    pub fn key(&self) -> i64 {
        self.key.get()
    }

    pub fn child(&self) -> PageId {
        self.child.get()
    }
}

/// One interior node, operating on an owned page buffer.
#[derive(Clone)]
pub struct InteriorNode {
    page: PageBuf,
}

impl InteriorNode {
    pub fn new() -> Self {
        Self {
            page: [0u8; PAGE_SIZE],
        }
    }

    /// Loads the node from page `pid` and validates the stored count.
    pub fn read<S: PageStore>(&mut self, pid: PageId, store: &mut S) -> Result<()> {
        store.read_page(pid, &mut self.page)?;
        ensure!(
            self.key_count() <= INTERIOR_MAX_KEYS,
            "page {} is not a valid interior node (key_count={})",
            pid,
            self.key_count()
        );
        Ok(())
    }

    /// Stores the node at page `pid`.
    pub fn write<S: PageStore>(&self, pid: PageId, store: &mut S) -> Result<()> {
        store.write_page(pid, &self.page)
    }

    fn header(&self) -> &InteriorHeader {
        // INVARIANT: const-sized prefix of an owned page, cannot fail
        InteriorHeader::ref_from_bytes(&self.page[..INTERIOR_HEADER_SIZE]).unwrap()
    }

    fn header_mut(&mut self) -> &mut InteriorHeader {
        // INVARIANT: const-sized prefix of an owned page, cannot fail
        InteriorHeader::mut_from_bytes(&mut self.page[..INTERIOR_HEADER_SIZE]).unwrap()
    }

    pub fn key_count(&self) -> usize {
        self.header().key_count() as usize
    }

    fn set_key_count(&mut self, count: usize) {
        self.header_mut().set_key_count(count as u16);
    }

    pub fn is_full(&self) -> bool {
        self.key_count() == INTERIOR_MAX_KEYS
    }

    /// The leading child `p0`: keys below every separator descend here.
    pub fn first_child(&self) -> PageId {
        self.header().first_child()
    }

    fn set_first_child(&mut self, pid: PageId) {
        self.header_mut().set_first_child(pid);
    }

    fn entry_offset(eid: usize) -> usize {
        INTERIOR_HEADER_SIZE + eid * INTERIOR_ENTRY_SIZE
    }

    fn entry(&self, eid: usize) -> &InteriorEntry {
        let offset = Self::entry_offset(eid);
        // INVARIANT: callers stay below key_count, which read() bounds
        InteriorEntry::ref_from_bytes(&self.page[offset..offset + INTERIOR_ENTRY_SIZE]).unwrap()
    }

    /// Returns the child to descend into for `search_key`, plus the slot
    /// where a separator equal to `search_key` would be inserted (the
    /// index of the first separator strictly greater than it).
    pub fn locate_child(&self, search_key: i64) -> (PageId, usize) {
        let mut left = 0usize;
        let mut right = self.key_count();

        while left < right {
            let mid = left + (right - left) / 2;
            if self.entry(mid).key() <= search_key {
                left = mid + 1;
            } else {
                right = mid;
            }
        }

        let child = if left == 0 {
            self.first_child()
        } else {
            self.entry(left - 1).child()
        };
        (child, left)
    }

    /// Reads separator `eid` and its right child, bounds-checked.
    pub fn read_entry(&self, eid: usize) -> Result<(i64, PageId)> {
        ensure!(
            eid < self.key_count(),
            "entry index {} out of bounds (key_count={})",
            eid,
            self.key_count()
        );
        let entry = self.entry(eid);
        Ok((entry.key(), entry.child()))
    }

    /// Inserts a separator and the child to its right at the routed
    /// slot, shifting the suffix. Fails when the node is full.
    pub fn insert(&mut self, key: i64, right_child: PageId) -> Result<()> {
        let count = self.key_count();
        ensure!(count < INTERIOR_MAX_KEYS, "interior node full");

        let (_, pos) = self.locate_child(key);
        let start = Self::entry_offset(pos);
        let end = Self::entry_offset(count);
        self.page
            .copy_within(start..end, start + INTERIOR_ENTRY_SIZE);

        let entry = InteriorEntry::new(key, right_child);
        self.page[start..start + INTERIOR_ENTRY_SIZE].copy_from_slice(entry.as_bytes());
        self.set_key_count(count + 1);
        Ok(())
    }

    /// Splits a full node around its middle separator. The middle key is
    /// removed from both halves and returned for promotion; its right
    /// child becomes the sibling's leading child. The new separator and
    /// child land in the half selected by their pre-split slot.
    pub fn insert_and_split(
        &mut self,
        key: i64,
        right_child: PageId,
        sibling: &mut InteriorNode,
    ) -> Result<i64> {
        ensure!(self.is_full(), "insert_and_split requires a full node");
        ensure!(sibling.key_count() == 0, "split sibling must be empty");

        let half = INTERIOR_MAX_KEYS / 2;
        let (_, pos) = self.locate_child(key);

        let mid = *self.entry(half);
        sibling.set_first_child(mid.child());

        let start = Self::entry_offset(half + 1);
        let end = Self::entry_offset(INTERIOR_MAX_KEYS);
        sibling.page[INTERIOR_HEADER_SIZE..INTERIOR_HEADER_SIZE + (end - start)]
            .copy_from_slice(&self.page[start..end]);

        self.set_key_count(half);
        sibling.set_key_count(INTERIOR_MAX_KEYS - half - 1);

        if pos <= half {
            self.insert(key, right_child)?;
        } else {
            sibling.insert(key, right_child)?;
        }

        Ok(mid.key())
    }

    /// Turns this node into a fresh one-key root: `left` below every key
    /// smaller than `key`, `right` at and above it. Used when the driver
    /// grows the tree by one level.
    pub fn initialize_root(&mut self, left: PageId, key: i64, right: PageId) {
        self.page.fill(0);
        self.set_first_child(left);
        let entry = InteriorEntry::new(key, right);
        let start = Self::entry_offset(0);
        self.page[start..start + INTERIOR_ENTRY_SIZE].copy_from_slice(entry.as_bytes());
        self.set_key_count(1);
    }
}

impl Default for InteriorNode {
    fn default() -> Self {
        Self::new()
    }
}
