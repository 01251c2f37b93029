//! # Configuration Constants
//!
//! Centralizes the page geometry the index relies on. The node codecs and
//! the tree driver all derive their offsets from these values, so
//! interdependent constants live together and are guarded by compile-time
//! assertions.
//!
//! ## Dependency Graph
//!
//! ```text
//! PAGE_SIZE (1024 bytes)
//!       │
//!       ├─> LEAF_MAX_KEYS     = (PAGE_SIZE - LEAF_HEADER_SIZE - NEXT_PTR_SIZE)
//!       │                        / LEAF_ENTRY_SIZE
//!       │
//!       ├─> INTERIOR_MAX_KEYS = (PAGE_SIZE - INTERIOR_HEADER_SIZE)
//!       │                        / INTERIOR_ENTRY_SIZE
//!       │
//!       └─> NEXT_PTR_OFFSET   = PAGE_SIZE - NEXT_PTR_SIZE
//! ```
//!
//! Changing `PAGE_SIZE` re-derives every capacity; the assertions below
//! verify that both node layouts still fit and that splits remain
//! meaningful (at least two keys per node).

/// Size of each index page in bytes. This is the unit of I/O for the
/// paged store and the size of every node buffer.
pub const PAGE_SIZE: usize = 1024;

/// Size of the leaf node header (key count plus padding).
pub const LEAF_HEADER_SIZE: usize = 4;

/// Size of one leaf entry: an `i64` key plus a record locator
/// (`u32` page, `u16` slot).
pub const LEAF_ENTRY_SIZE: usize = 14;

/// Size of the sibling page pointer stored at the tail of a leaf page.
pub const NEXT_PTR_SIZE: usize = 4;

/// Byte offset of the sibling pointer within a leaf page. The pointer
/// sits at a fixed tail position so it never moves as entries come and go.
pub const NEXT_PTR_OFFSET: usize = PAGE_SIZE - NEXT_PTR_SIZE;

/// Maximum number of entries a leaf node can hold.
pub const LEAF_MAX_KEYS: usize =
    (PAGE_SIZE - LEAF_HEADER_SIZE - NEXT_PTR_SIZE) / LEAF_ENTRY_SIZE;

/// Size of the interior node header (key count, padding, leading child).
pub const INTERIOR_HEADER_SIZE: usize = 8;

/// Size of one interior entry: an `i64` separator key plus the page id of
/// the child to its right.
pub const INTERIOR_ENTRY_SIZE: usize = 12;

/// Maximum number of separator keys an interior node can hold. A node
/// with `n` keys references `n + 1` children (the leading child lives in
/// the header).
pub const INTERIOR_MAX_KEYS: usize =
    (PAGE_SIZE - INTERIOR_HEADER_SIZE) / INTERIOR_ENTRY_SIZE;

const _: () = assert!(
    LEAF_HEADER_SIZE + LEAF_MAX_KEYS * LEAF_ENTRY_SIZE + NEXT_PTR_SIZE <= PAGE_SIZE,
    "leaf layout must fit within a page"
);

const _: () = assert!(
    INTERIOR_HEADER_SIZE + INTERIOR_MAX_KEYS * INTERIOR_ENTRY_SIZE <= PAGE_SIZE,
    "interior layout must fit within a page"
);

const _: () = assert!(
    LEAF_MAX_KEYS >= 2 && INTERIOR_MAX_KEYS >= 2,
    "nodes must hold at least two keys for half-and-half splits"
);
