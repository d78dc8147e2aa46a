//! Accept/ignore decisions for a watched root
//!
//! Two sources of folder exclusions are combined:
//! 1. Platform folders (recycle bins, indexer stores - always active)
//! 2. Per-root `ignore_folders` from [`WatchingOptions`]
//!
//! Files are judged by extension only. A non-empty accept set is the sole
//! criterion; otherwise the ignore set excludes and everything else passes.

use crate::options::{normalize_extension, WatchingOptions};
use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::{Component, Path};
use treewatch_core::ActionType;

/// Folders never worth watching on this platform
#[cfg(target_os = "linux")]
pub const PLATFORM_IGNORE_FOLDERS: &[&str] = &["lost+found", ".Trash-1000"];

#[cfg(target_os = "windows")]
pub const PLATFORM_IGNORE_FOLDERS: &[&str] = &["$RECYCLE.BIN", "System Volume Information"];

#[cfg(target_os = "macos")]
pub const PLATFORM_IGNORE_FOLDERS: &[&str] = &[".Trashes", ".Spotlight-V100", ".fseventsd"];

#[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
pub const PLATFORM_IGNORE_FOLDERS: &[&str] = &[];

/// Filtering rules for one root
#[derive(Debug, Clone)]
pub struct RootFilter {
    /// Platform set plus configured extras plus the root's own folders
    ignore_folders: HashSet<String>,
    ignore_files: HashSet<String>,
    accept_files: HashSet<String>,
    action_filters: HashSet<ActionType>,
}

impl RootFilter {
    /// Build the rules for a root.
    ///
    /// `extra_folders` come from the watcher configuration and apply to
    /// every root alongside [`PLATFORM_IGNORE_FOLDERS`].
    pub fn new(options: &WatchingOptions, extra_folders: &[String]) -> Self {
        let ignore_folders = PLATFORM_IGNORE_FOLDERS
            .iter()
            .map(|name| name.to_string())
            .chain(extra_folders.iter().cloned())
            .chain(options.ignore_folders.iter().cloned())
            .collect();

        Self {
            ignore_folders,
            ignore_files: options
                .ignore_files
                .iter()
                .map(|ext| normalize_extension(ext))
                .collect(),
            accept_files: options
                .accept_files
                .iter()
                .map(|ext| normalize_extension(ext))
                .collect(),
            action_filters: options.action_filters.clone(),
        }
    }

    /// Whether a folder with this name has its subtree skipped
    pub fn folder_ignored(&self, name: &OsStr) -> bool {
        name.to_str()
            .map(|name| self.ignore_folders.contains(name))
            .unwrap_or(false)
    }

    /// Whether a file with this extension is reported.
    ///
    /// `None` is a file without an extension.
    pub fn file_accepted(&self, extension: Option<&OsStr>) -> bool {
        let extension = extension
            .and_then(OsStr::to_str)
            .map(normalize_extension)
            .unwrap_or_default();

        if !self.accept_files.is_empty() {
            return self.accept_files.contains(&extension);
        }

        !self.ignore_files.contains(&extension)
    }

    pub fn action_suppressed(&self, action: ActionType) -> bool {
        self.action_filters.contains(&action)
    }

    /// Check a native notification path against folder and file rules.
    ///
    /// Every directory between `root` and the path is compared with the
    /// ignored folder set; the final component only faces the extension rules.
    pub fn path_ignored(&self, root: &Path, path: &Path) -> bool {
        let in_ignored_folder = path
            .parent()
            .is_some_and(|parent| self.inside_ignored_folder(root, parent));
        in_ignored_folder || !self.file_accepted(path.extension())
    }

    /// Whether any component of `path` below `root` is an ignored folder
    pub fn inside_ignored_folder(&self, root: &Path, path: &Path) -> bool {
        let relative = path.strip_prefix(root).unwrap_or(path);

        relative.components().any(|component| match component {
            Component::Normal(name) => self.folder_ignored(name),
            _ => false,
        })
    }
}
