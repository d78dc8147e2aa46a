//! Native change notification sources
//!
//! Each backend turns OS notifications for one root into canonical
//! [`RawChange`]s. All of them are built on `notify` and compile everywhere;
//! [`platform_factory`] picks the one matching the target OS:
//!
//! - Linux: one native watch per directory ([`DirectorySourceFactory`])
//! - Windows: one watch per root with rename pairing ([`RenamePairingSourceFactory`])
//! - Others: one recursive watch per root ([`RecursiveSourceFactory`])

mod fake;
mod linux;
mod recursive;
mod rename;
mod windows;

pub use fake::{FakeSource, FakeSourceFactory};
pub use linux::{DirectorySource, DirectorySourceFactory, DirectoryTranslator};
pub use recursive::{translate_recursive_event, RecursiveSource, RecursiveSourceFactory};
pub use rename::RenamePairer;
pub use windows::{translate_paired_event, RenamePairingSource, RenamePairingSourceFactory};

use crate::filter::RootFilter;
use async_trait::async_trait;
use notify::{Config, RecommendedWatcher, Watcher as _};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::trace;
use treewatch_core::ActionType;

/// Native source failures
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("cannot start watching [{0}]: no such directory")]
    RootMissing(PathBuf),

    #[error("cannot start watching [{0}]: not a directory")]
    NotADirectory(PathBuf),

    #[error("native watch failed for [{path}]")]
    Register {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("native watcher error")]
    Notify(#[from] notify::Error),

    #[error("I/O error on [{path}]")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One canonical change reported by a native source, before filtering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawChange {
    pub action: ActionType,
    pub path: PathBuf,
    /// Old path of a paired rename
    pub prior_name: Option<PathBuf>,
}

impl RawChange {
    pub fn new(action: ActionType, path: impl Into<PathBuf>) -> Self {
        Self {
            action,
            path: path.into(),
            prior_name: None,
        }
    }

    pub fn renamed(path: impl Into<PathBuf>, prior: impl Into<PathBuf>) -> Self {
        Self {
            action: ActionType::RenamedNewName,
            path: path.into(),
            prior_name: Some(prior.into()),
        }
    }
}

/// What a source is asked to watch
#[derive(Debug, Clone)]
pub struct WatchTarget {
    pub root: PathBuf,
    pub recursive: bool,
    /// Used to avoid registering native watches inside ignored folders
    pub filter: Arc<RootFilter>,
    /// Correlation window for backends that pair rename halves
    pub rename_window: Duration,
}

/// A live native handle for one root
#[async_trait]
pub trait NativeSource: Send {
    /// Wait for the next batch of changes.
    ///
    /// `None` means the native handle is closed and the reader should exit.
    /// An `Err` is a per-iteration failure; the source stays usable.
    async fn next_batch(&mut self) -> Option<Result<Vec<RawChange>, SourceError>>;
}

/// Opens native sources; one implementation per backend
pub trait SourceFactory: Send + Sync {
    /// Register native watches for the target.
    ///
    /// A missing or inaccessible root fails here, before any event flows.
    fn open(&self, target: &WatchTarget) -> Result<Box<dyn NativeSource>, SourceError>;

    fn name(&self) -> &'static str;
}

/// The backend for the current platform
pub fn platform_factory() -> Arc<dyn SourceFactory> {
    #[cfg(target_os = "linux")]
    {
        Arc::new(DirectorySourceFactory)
    }

    #[cfg(target_os = "windows")]
    {
        Arc::new(RenamePairingSourceFactory)
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        Arc::new(RecursiveSourceFactory)
    }
}

/// Fail early when the root cannot be watched
pub(crate) fn check_root(root: &Path) -> Result<(), SourceError> {
    match std::fs::metadata(root) {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(SourceError::NotADirectory(root.to_path_buf())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(SourceError::RootMissing(root.to_path_buf()))
        }
        Err(source) => Err(SourceError::Io {
            path: root.to_path_buf(),
            source,
        }),
    }
}

/// A `notify` watcher whose callback feeds an async channel
pub(crate) struct NotifyStream {
    pub(crate) watcher: RecommendedWatcher,
    rx: mpsc::UnboundedReceiver<notify::Result<notify::Event>>,
}

impl NotifyStream {
    pub(crate) fn new() -> Result<Self, SourceError> {
        let (tx, rx) = mpsc::unbounded_channel();

        let watcher = RecommendedWatcher::new(
            move |result: notify::Result<notify::Event>| {
                if tx.send(result).is_err() {
                    trace!("Native notification arrived after the reader exited");
                }
            },
            Config::default(),
        )?;

        Ok(Self { watcher, rx })
    }

    /// Next native notification; `None` once the watcher is gone
    pub(crate) async fn recv(&mut self) -> Option<notify::Result<notify::Event>> {
        self.rx.recv().await
    }
}
