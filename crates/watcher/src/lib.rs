//! Cross-platform directory tree watching for treewatch
//!
//! This crate turns native filesystem notifications into debounced events:
//! - One reader task per watched root, on the platform's native backend
//! - Extension and folder filtering per root, plus platform ignore folders
//! - Per-path debouncing with a storm kill switch
//! - Initial and on-demand scans reporting existing files as added
//!
//! ```no_run
//! use treewatch::{Watcher, WatcherConfig, WatchingOptions};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let watcher = Watcher::new(WatcherConfig::default())?;
//! watcher.start_watching("/srv/inbox", WatchingOptions::default().accept_file("pdf"));
//!
//! let events = watcher.events();
//! while let Ok(event) = events.recv().await {
//!     println!("{event}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
mod debounce;
pub mod filter;
pub mod options;
pub mod registry;
pub mod scan;
mod sink;
pub mod source;
mod watcher;

pub use config::{ConfigError, WatcherConfig};
pub use filter::{RootFilter, PLATFORM_IGNORE_FOLDERS};
pub use options::WatchingOptions;
pub use registry::{clean_root, RootState};
pub use scan::{ScanItem, ScanReport, Scanner};
pub use source::{
    platform_factory, FakeSourceFactory, NativeSource, RawChange, SourceError, SourceFactory,
    WatchTarget,
};
pub use watcher::Watcher;

pub use treewatch_core::{ActionType, ContentInfo, ContentInspector, Event, Level, WatchError};
