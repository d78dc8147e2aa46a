//! Canonical change events shared by every watcher backend

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// What happened to a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Unknown or unmapped native notification
    Invalid,
    /// The file was added to the directory
    Added,
    /// The file was removed from the directory
    Removed,
    /// The content, time stamp or attributes changed
    Modified,
    /// The file was renamed and this is the old name
    RenamedFrom,
    /// The file was renamed and this is the new name
    RenamedNewName,
}

impl ActionType {
    /// Map a native directory-change action code.
    ///
    /// Codes follow the `FILE_ACTION_*` numbering: 1 added, 2 removed,
    /// 3 modified, 4 renamed old name, 5 renamed new name.
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => ActionType::Added,
            2 => ActionType::Removed,
            3 => ActionType::Modified,
            4 => ActionType::RenamedFrom,
            5 => ActionType::RenamedNewName,
            _ => ActionType::Invalid,
        }
    }

    /// Short lowercase name; both rename halves read as "renamed"
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Added => "added",
            ActionType::Removed => "removed",
            ActionType::Modified => "modified",
            ActionType::RenamedFrom | ActionType::RenamedNewName => "renamed",
            ActionType::Invalid => "invalid",
        }
    }

    /// Whether the path is expected to exist after this action
    pub fn expects_existing_path(&self) -> bool {
        matches!(
            self,
            ActionType::Added | ActionType::Modified | ActionType::RenamedNewName
        )
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content details attached after the quiet period
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentInfo {
    pub content_type: String,
    /// Hex BLAKE3 digest
    pub checksum: String,
}

/// One logical change to one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub action: ActionType,
    /// Absolute path of the file
    pub path: PathBuf,
    pub size: Option<u64>,
    pub mod_time: Option<DateTime<Utc>>,
    /// Previous path, set only for [`ActionType::RenamedNewName`]
    pub prior_name: Option<PathBuf>,
    pub content: Option<ContentInfo>,
}

impl Event {
    pub fn new(action: ActionType, path: impl Into<PathBuf>) -> Self {
        Self {
            action,
            path: path.into(),
            size: None,
            mod_time: None,
            prior_name: None,
            content: None,
        }
    }

    /// Fill size and modification time from a stat result
    pub fn with_metadata(mut self, metadata: &std::fs::Metadata) -> Self {
        self.size = Some(metadata.len());
        self.mod_time = metadata.modified().ok().map(DateTime::<Utc>::from);
        self
    }

    /// Record the old path of a rename.
    ///
    /// Ignored unless the action is [`ActionType::RenamedNewName`].
    pub fn with_prior_name(mut self, prior: impl Into<PathBuf>) -> Self {
        if self.action == ActionType::RenamedNewName {
            self.prior_name = Some(prior.into());
        }
        self
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.prior_name {
            Some(prior) => write!(
                f,
                "{}: {} -> {}",
                self.action,
                prior.display(),
                self.path.display()
            ),
            None => write!(f, "{}: {}", self.action, self.path.display()),
        }
    }
}
