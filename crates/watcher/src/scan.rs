//! Directory walk that reports existing files as added
//!
//! Used for the initial population of a root and for rescans. The walk is
//! best-effort: an unreadable directory loses its subtree and the walk goes
//! on. Only a failure on the root itself aborts it.

use crate::filter::RootFilter;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use treewatch_core::{ActionType, Event, Level, WatchError};
use walkdir::WalkDir;

/// One step of a scan
#[derive(Debug)]
pub enum ScanItem {
    /// An accepted regular file, as an `Added` event
    File(Event),

    /// An ignored folder whose subtree was not entered
    SkippedFolder(PathBuf),

    /// A walk error; the affected subtree is skipped.
    ///
    /// `fatal` errors concern the root itself and end the walk.
    Failed { error: WatchError, fatal: bool },
}

/// Lazy walk over the accepted files of one root
pub struct Scanner<'a> {
    filter: &'a RootFilter,
    walker: walkdir::IntoIter,
    done: bool,
}

impl<'a> Scanner<'a> {
    pub fn new(root: &Path, filter: &'a RootFilter) -> Self {
        debug!(root = %root.display(), "Scanning");
        Self {
            filter,
            walker: WalkDir::new(root)
                .follow_links(false)
                .sort_by_file_name()
                .into_iter(),
            done: false,
        }
    }
}

impl Iterator for Scanner<'_> {
    type Item = ScanItem;

    fn next(&mut self) -> Option<ScanItem> {
        if self.done {
            return None;
        }

        loop {
            let entry = match self.walker.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    let fatal = e.depth() == 0;
                    let path = e
                        .path()
                        .map(|path| path.display().to_string())
                        .unwrap_or_default();
                    let level = if fatal { Level::Critical } else { Level::Error };
                    let error = WatchError::new(level, format!("scan failed at [{path}]: {e}"));

                    self.done = fatal;
                    return Some(ScanItem::Failed { error, fatal });
                }
            };

            if entry.depth() == 0 {
                continue;
            }

            let file_type = entry.file_type();
            if file_type.is_dir() {
                if self.filter.folder_ignored(entry.file_name()) {
                    trace!(path = %entry.path().display(), "Skipping ignored folder");
                    self.walker.skip_current_dir();
                    return Some(ScanItem::SkippedFolder(entry.into_path()));
                }
                continue;
            }

            if !file_type.is_file() || !self.filter.file_accepted(entry.path().extension()) {
                continue;
            }

            let event = match entry.metadata() {
                Ok(metadata) => Event::new(ActionType::Added, entry.path()).with_metadata(&metadata),
                Err(e) => {
                    let error = WatchError::error(format!(
                        "cannot stat [{}]: {e}",
                        entry.path().display()
                    ));
                    return Some(ScanItem::Failed { error, fatal: false });
                }
            };

            return Some(ScanItem::File(event));
        }
    }
}

/// Outcome of scanning one root
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub root: PathBuf,
    /// Files handed to the debouncer
    pub files: usize,
    pub skipped_folders: usize,
    pub errors: usize,
    /// The root itself could not be walked
    pub aborted: bool,
}

impl ScanReport {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }
}
