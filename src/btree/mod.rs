//! # B+Tree Index
//!
//! A disk-backed B+tree mapping `i64` keys to record locators, built
//! from three pieces:
//!
//! - [`LeafNode`]: fixed-stride (key, locator) entries in sorted order,
//!   chained left-to-right through sibling pointers for range scans.
//! - [`InteriorNode`]: separator keys interleaved with child page ids,
//!   one more child than keys.
//! - [`BTreeIndex`]: the driver owning the store, root page id, and
//!   tree height; implements recursive insertion with split
//!   propagation, and the cursor-based forward scan.
//!
//! ```text
//!                     [interior, root]
//!                     /      |       \
//!             [leaf 1]   [leaf 3]   [leaf 2]
//!                |----------->|--------->|      (sibling chain)
//! ```
//!
//! Each node occupies exactly one page. Nodes reference each other by
//! page id only; parents are rediscovered by re-descending, so there are
//! no back pointers and no in-memory graph to keep consistent.
//!
//! ## Comparator Asymmetry
//!
//! Leaf search returns the first entry with `key >= search_key`; interior
//! routing follows the child left of the first separator strictly
//! greater than the search key, so keys equal to a separator descend
//! right — into the subtree whose leaves hold them. Both searches must
//! keep this asymmetry or seeks land one leaf short.

mod interior;
mod leaf;
mod tree;

pub use interior::{InteriorEntry, InteriorNode};
pub use leaf::{LeafEntry, LeafNode};
pub use tree::{BTreeIndex, IndexCursor, FIRST_DATA_PID, HEADER_PID};
