//! Watcher scenarios grouped by concern

pub mod debounce;
pub mod enrichment;
pub mod renames;
pub mod scanning;
