//! Read-to-index query paths.
//!
//! Everything here operates on a frozen, read-only [`crate::index::KmerIndex`]
//! and is re-entrant: no query mutates the index, so any number of threads
//! may call these concurrently without synchronization.

pub mod project;
pub mod search;
