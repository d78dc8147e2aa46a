//! Per-root watching options

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use treewatch_core::ActionType;

/// How a single root is watched and filtered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchingOptions {
    /// Walk the root and report existing files as added (default: true)
    #[serde(default = "default_true")]
    pub rescan: bool,

    /// Watch the whole subtree natively (default: true)
    #[serde(default = "default_true")]
    pub recursive: bool,

    /// Actions dropped before debouncing
    #[serde(default)]
    pub action_filters: HashSet<ActionType>,

    /// Folder names whose subtrees are ignored
    #[serde(default)]
    pub ignore_folders: HashSet<String>,

    /// File extensions to ignore (unused when `accept_files` is non-empty)
    #[serde(default)]
    pub ignore_files: HashSet<String>,

    /// When non-empty, the only file extensions reported
    #[serde(default)]
    pub accept_files: HashSet<String>,
}

impl Default for WatchingOptions {
    fn default() -> Self {
        Self {
            rescan: true,
            recursive: true,
            action_filters: HashSet::new(),
            ignore_folders: HashSet::new(),
            ignore_files: HashSet::new(),
            accept_files: HashSet::new(),
        }
    }
}

impl WatchingOptions {
    pub fn rescan(mut self, rescan: bool) -> Self {
        self.rescan = rescan;
        self
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn suppress(mut self, action: ActionType) -> Self {
        self.action_filters.insert(action);
        self
    }

    pub fn ignore_folder(mut self, name: impl Into<String>) -> Self {
        self.ignore_folders.insert(name.into());
        self
    }

    /// Extensions may be given with or without the leading dot
    pub fn ignore_file(mut self, extension: &str) -> Self {
        self.ignore_files.insert(normalize_extension(extension));
        self
    }

    pub fn accept_file(mut self, extension: &str) -> Self {
        self.accept_files.insert(normalize_extension(extension));
        self
    }
}

/// Lower-case an extension and strip its leading dot: ".JPG" -> "jpg"
pub fn normalize_extension(extension: &str) -> String {
    extension.trim().trim_start_matches('.').to_ascii_lowercase()
}

fn default_true() -> bool {
    true
}
