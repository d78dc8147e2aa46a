//! Event model for treewatch
//!
//! This crate provides:
//! - Canonical actions and events (one event per logical change)
//! - Severity-tagged error reports
//! - BLAKE3 content checksums and the content inspector interface

pub mod error;
pub mod event;
pub mod hash;
pub mod inspect;

// Re-exports
pub use error::{Level, WatchError};
pub use event::{ActionType, ContentInfo, Event};
pub use hash::ContentHash;
pub use inspect::{ContentInspector, DefaultInspector};
