//! # B+Tree Index Driver
//!
//! Owns the paged store, the root page id, and the tree height, and
//! implements the insertion protocol and the cursor-based forward scan
//! on top of the leaf and interior codecs.
//!
//! ## On-Disk Shape
//!
//! ```text
//! Page 0                 IndexHeader { root_pid, tree_height }
//! Pages 1..              leaf and interior nodes, appended as splits
//!                        allocate them, never moved or freed
//! ```
//!
//! Pages carry no type tag: during descent the driver knows the level it
//! is at (root = level 1, leaves = level `tree_height`) and picks the
//! codec accordingly. A height of 0 means the index is empty, 1 that the
//! root is a leaf, 2 or more that the root is interior.
//!
//! ## Insertion
//!
//! ```text
//! 1. First ever insert: write page 1 as a single-entry leaf,
//!    set root=1, height=1, rewrite the header
//! 2. Otherwise recurse from the root with the remaining level count:
//!    - leaf level: insert in place, or split into a page allocated at
//!      end_pid() and hand (separator, new page) to the parent
//!    - interior level: descend, then splice any promoted separator
//!      into this node, splitting again if needed
//! 3. A split that reaches the top grows a new root and bumps the
//!    height; the header is rewritten
//! ```
//!
//! The recursion reports upward through the internal `InsertOutcome`
//! variant: a clean insert, or a split carrying the separator and the
//! new sibling's page id. Node overflow never escapes `insert`.
//!
//! ## Scanning
//!
//! [`BTreeIndex::locate`] descends to the leaf that would hold the
//! search key and returns an [`IndexCursor`] at the first entry with
//! `key >= search_key`. [`BTreeIndex::read_forward`] reads the entry
//! under the cursor and advances it, hopping leaf-to-leaf through the
//! sibling chain; `Ok(None)` marks the end of the tree.
//!
//! ## Crash Behavior
//!
//! Writes within one insert are ordered (children before parents, header
//! last) but not journaled; a crash mid-split can leave the on-disk tree
//! inconsistent. Durability layering is the caller's concern.

use std::path::Path;

use eyre::{ensure, Result, WrapErr};
use zerocopy::little_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use super::interior::InteriorNode;
use super::leaf::LeafNode;
use crate::config::PAGE_SIZE;
use crate::storage::{AccessMode, PageBuf, PageFile, PageId, PageStore};
use crate::types::RecordId;

/// Page id of the index header.
pub const HEADER_PID: PageId = 0;

/// Page id of the first data page; also the root of a freshly created
/// index.
pub const FIRST_DATA_PID: PageId = 1;

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
struct IndexHeader {
    root_pid: U32,
    tree_height: U32,
}

impl IndexHeader {
    zerocopy_accessors! {
        root_pid: u32,
        tree_height: u32,
    }
}

/// Position of one leaf entry, used to iterate the index in key order.
/// A cursor whose page id is 0 is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexCursor {
    pid: PageId,
    eid: usize,
}

impl IndexCursor {
    fn exhausted() -> Self {
        Self {
            pid: HEADER_PID,
            eid: 0,
        }
    }

    pub fn pid(&self) -> PageId {
        self.pid
    }

    pub fn eid(&self) -> usize {
        self.eid
    }

    pub fn is_exhausted(&self) -> bool {
        self.pid == HEADER_PID
    }
}

/// What one level of the insert recursion reports to its parent.
enum InsertOutcome {
    Done,
    Split { key: i64, right: PageId },
}

/// A disk-backed B+tree mapping `i64` keys to [`RecordId`] locators.
#[derive(Debug)]
pub struct BTreeIndex {
    store: PageFile,
    root_pid: PageId,
    tree_height: u32,
}

impl BTreeIndex {
    /// Opens an index file. In read-write mode a missing or empty file
    /// is initialized with a fresh header; otherwise the header on page
    /// 0 is loaded.
    pub fn open<P: AsRef<Path>>(path: P, mode: AccessMode) -> Result<Self> {
        let store = PageFile::open(path, mode)?;
        let mut index = Self {
            store,
            root_pid: FIRST_DATA_PID,
            tree_height: 0,
        };

        if mode == AccessMode::ReadWrite && index.store.end_pid() == 0 {
            index.write_header()?;
        } else {
            index.read_header()?;
        }
        Ok(index)
    }

    /// Syncs (when writable) and releases the underlying store.
    pub fn close(self) -> Result<()> {
        self.store.close()
    }

    /// Number of levels from root to leaf inclusive; 0 when empty.
    pub fn height(&self) -> u32 {
        self.tree_height
    }

    pub fn root_pid(&self) -> PageId {
        self.root_pid
    }

    fn read_header(&mut self) -> Result<()> {
        let mut buf: PageBuf = [0u8; PAGE_SIZE];
        self.store
            .read_page(HEADER_PID, &mut buf)
            .wrap_err("failed to load index header")?;

        // INVARIANT: const-sized prefix of an owned page, cannot fail
        let header =
            IndexHeader::ref_from_bytes(&buf[..std::mem::size_of::<IndexHeader>()]).unwrap();
        self.root_pid = header.root_pid();
        self.tree_height = header.tree_height();
        Ok(())
    }

    fn write_header(&mut self) -> Result<()> {
        let mut buf: PageBuf = [0u8; PAGE_SIZE];
        {
            // INVARIANT: const-sized prefix of an owned page, cannot fail
            let header =
                IndexHeader::mut_from_bytes(&mut buf[..std::mem::size_of::<IndexHeader>()])
                    .unwrap();
            header.set_root_pid(self.root_pid);
            header.set_tree_height(self.tree_height);
        }
        self.store
            .write_page(HEADER_PID, &buf)
            .wrap_err("failed to persist index header")
    }

    /// Inserts `(key, rid)`. Duplicate keys are permitted and preserved.
    pub fn insert(&mut self, key: i64, rid: RecordId) -> Result<()> {
        if self.store.end_pid() == FIRST_DATA_PID {
            // only the header exists: bootstrap the first leaf as root
            let mut leaf = LeafNode::new();
            leaf.insert(key, rid)?;
            leaf.set_next_ptr(0);
            leaf.write(FIRST_DATA_PID, &mut self.store)?;

            self.root_pid = FIRST_DATA_PID;
            self.tree_height = 1;
            return self.write_header();
        }

        ensure!(
            self.tree_height >= 1,
            "index header reports an empty tree but the store has {} pages",
            self.store.end_pid()
        );

        match self.insert_at(key, rid, self.root_pid, self.tree_height)? {
            InsertOutcome::Done => Ok(()),
            InsertOutcome::Split { key: separator, right } => {
                // the root itself split: grow the tree by one level
                let new_root = self.store.end_pid();
                let mut root = InteriorNode::new();
                root.initialize_root(self.root_pid, separator, right);
                root.write(new_root, &mut self.store)?;

                self.root_pid = new_root;
                self.tree_height += 1;
                self.write_header()
            }
        }
    }

    /// One level of the insert recursion. `levels` counts the levels
    /// remaining down to the leaves: 1 means `pid` is a leaf.
    fn insert_at(
        &mut self,
        key: i64,
        rid: RecordId,
        pid: PageId,
        levels: u32,
    ) -> Result<InsertOutcome> {
        if levels == 1 {
            return self.insert_into_leaf(key, rid, pid);
        }

        let mut node = InteriorNode::new();
        node.read(pid, &mut self.store)?;

        let (child, _) = node.locate_child(key);
        self.validate_child(pid, child)?;

        match self.insert_at(key, rid, child, levels - 1)? {
            InsertOutcome::Done => Ok(InsertOutcome::Done),
            InsertOutcome::Split { key: separator, right } => {
                if !node.is_full() {
                    node.insert(separator, right)?;
                    node.write(pid, &mut self.store)?;
                    return Ok(InsertOutcome::Done);
                }

                let new_pid = self.store.end_pid();
                let mut sibling = InteriorNode::new();
                let promoted = node.insert_and_split(separator, right, &mut sibling)?;
                node.write(pid, &mut self.store)?;
                sibling.write(new_pid, &mut self.store)?;

                Ok(InsertOutcome::Split {
                    key: promoted,
                    right: new_pid,
                })
            }
        }
    }

    fn insert_into_leaf(&mut self, key: i64, rid: RecordId, pid: PageId) -> Result<InsertOutcome> {
        let mut leaf = LeafNode::new();
        leaf.read(pid, &mut self.store)?;

        if !leaf.is_full() {
            leaf.insert(key, rid)?;
            leaf.write(pid, &mut self.store)?;
            return Ok(InsertOutcome::Done);
        }

        let new_pid = self.store.end_pid();
        let mut sibling = LeafNode::new();
        let separator = leaf.insert_and_split(key, rid, &mut sibling)?;
        leaf.set_next_ptr(new_pid);
        leaf.write(pid, &mut self.store)?;
        sibling.write(new_pid, &mut self.store)?;

        Ok(InsertOutcome::Split {
            key: separator,
            right: new_pid,
        })
    }

    fn validate_child(&self, parent: PageId, child: PageId) -> Result<()> {
        ensure!(
            child != HEADER_PID && child < self.store.end_pid(),
            "interior page {} references invalid child page {}",
            parent,
            child
        );
        Ok(())
    }

    /// Descends to the leaf that would hold `search_key` and returns a
    /// cursor at the first entry with `key >= search_key`. On an empty
    /// index the cursor is already exhausted.
    pub fn locate(&mut self, search_key: i64) -> Result<IndexCursor> {
        if self.tree_height == 0 {
            return Ok(IndexCursor::exhausted());
        }

        let mut pid = self.root_pid;
        for _ in 1..self.tree_height {
            let mut node = InteriorNode::new();
            node.read(pid, &mut self.store)?;
            let (child, _) = node.locate_child(search_key);
            self.validate_child(pid, child)?;
            pid = child;
        }

        let mut leaf = LeafNode::new();
        leaf.read(pid, &mut self.store)?;
        Ok(IndexCursor {
            pid,
            eid: leaf.locate(search_key),
        })
    }

    /// Reads the entry under the cursor and advances it, following the
    /// sibling chain across leaf boundaries. Returns `Ok(None)` once the
    /// scan has walked off the last leaf.
    pub fn read_forward(&mut self, cursor: &mut IndexCursor) -> Result<Option<(i64, RecordId)>> {
        loop {
            if cursor.is_exhausted() {
                return Ok(None);
            }

            let mut leaf = LeafNode::new();
            leaf.read(cursor.pid, &mut self.store)?;

            if cursor.eid >= leaf.key_count() {
                // parked past the last entry: hop to the next leaf
                cursor.pid = leaf.next_ptr();
                cursor.eid = 0;
                continue;
            }

            let entry = leaf.read_entry(cursor.eid)?;
            cursor.eid += 1;
            return Ok(Some(entry));
        }
    }
}
