//! Rename rendezvous shared by the backends that see rename halves apart

use super::RawChange;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;
use treewatch_core::ActionType;

/// Pairs old-name and new-name notifications.
///
/// Holds at most one old name. Other notifications in between don't clear
/// it; a second old name replaces the first. An old name that never meets
/// its new name produces nothing.
#[derive(Debug)]
pub struct RenamePairer {
    window: Duration,
    pending: Option<(PathBuf, Instant)>,
}

impl RenamePairer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
        }
    }

    /// Remember an old name until its new name shows up
    pub fn old_name(&mut self, path: PathBuf, now: Instant) {
        if let Some((dropped, _)) = self.pending.replace((path, now)) {
            trace!(path = %dropped.display(), "Unpaired old name replaced");
        }
    }

    /// Resolve a new name against the held old name.
    ///
    /// Without a fresh old name the change carries no prior name.
    pub fn new_name(&mut self, path: PathBuf, now: Instant) -> RawChange {
        match self.pending.take() {
            Some((prior, seen)) if now.saturating_duration_since(seen) <= self.window => {
                RawChange::renamed(path, prior)
            }
            Some((stale, _)) => {
                trace!(path = %stale.display(), "Old name expired before its new name");
                RawChange::new(ActionType::RenamedNewName, path)
            }
            None => RawChange::new(ActionType::RenamedNewName, path),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}
