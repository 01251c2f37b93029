//! # Configuration Module
//!
//! All numeric configuration for the index lives in [`constants`].
//! Interdependent values (page size, node capacities, tail-pointer
//! offset) are co-located there and enforced with compile-time
//! assertions so a change to one cannot silently invalidate another.

pub mod constants;
pub use constants::*;
