//! # Burrow — a disk-backed B+tree secondary index
//!
//! Burrow maps `i64` keys to record locators ([`RecordId`]) for a
//! minimal relational storage engine: point lookups, in-order range
//! scans, and incremental insertion over a file of fixed-size pages.
//!
//! ## Quick Start
//!
//! ```ignore
//! use burrow::{AccessMode, BTreeIndex, RecordId};
//!
//! let mut index = BTreeIndex::open("users_age.idx", AccessMode::ReadWrite)?;
//! index.insert(37, RecordId::new(12, 4))?;
//!
//! let mut cursor = index.locate(30)?;
//! while let Some((key, rid)) = index.read_forward(&mut cursor)? {
//!     if key > 40 {
//!         break;
//!     }
//!     // fetch the tuple at `rid` from the heap file
//! }
//! index.close()?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │        BTreeIndex (driver)           │   root pid, tree height,
//! ├──────────────────────────────────────┤   splits, cursor scans
//! │   LeafNode        InteriorNode       │   page-sized codecs
//! ├──────────────────────────────────────┤
//! │        PageStore / PageFile          │   whole-page file I/O
//! └──────────────────────────────────────┘
//! ```
//!
//! The index file is a flat arena of 1KB pages: page 0 holds the root
//! page id and tree height, every other page is one tree node. Leaves
//! are chained through sibling pointers so scans cross leaf boundaries
//! without re-descending.
//!
//! Single-threaded and synchronous by design. There is no caching layer,
//! no journaling, and no deletion; an index assumes exclusive access to
//! its file while open.
//!
//! ## Module Overview
//!
//! - [`btree`]: leaf/interior node codecs and the tree driver
//! - [`storage`]: the paged store contract and its file-backed impl
//! - [`config`]: page geometry and node capacities
//! - [`types`]: the record locator

#[macro_use]
mod macros;

pub mod btree;
pub mod config;
pub mod storage;
pub mod types;

pub use btree::{BTreeIndex, IndexCursor};
pub use storage::AccessMode;
pub use types::RecordId;
