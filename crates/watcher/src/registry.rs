//! Table of watched roots
//!
//! One entry per cleaned root path. All mutations go through a single lock;
//! cancelling a root's token happens outside of it.

use crate::filter::RootFilter;
use crate::options::WatchingOptions;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Lifecycle of a registered root. Unregistered roots have no state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootState {
    /// Native source being opened
    Starting,
    /// Reader loop running
    Watching,
    /// Stop requested, waiting for the root's tasks to finish
    Stopping,
}

/// Cancellation and task tracking for everything one root spawns
#[derive(Debug, Clone)]
pub(crate) struct RootScope {
    pub(crate) token: CancellationToken,
    pub(crate) tracker: TaskTracker,
}

/// Immutable facts about one registration of a root
#[derive(Debug)]
pub(crate) struct RootContext {
    pub(crate) root: PathBuf,
    /// Distinguishes a root restarted after a stop from its previous run
    pub(crate) generation: u64,
    pub(crate) options: WatchingOptions,
    pub(crate) filter: Arc<RootFilter>,
    pub(crate) scope: RootScope,
}

struct RootWatch {
    ctx: Arc<RootContext>,
    state: RootState,
}

#[derive(Default)]
struct Inner {
    roots: HashMap<PathBuf, RootWatch>,
    next_generation: u64,
}

#[derive(Default)]
pub(crate) struct WatchRegistry {
    inner: Mutex<Inner>,
}

impl WatchRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Add a root in `Starting` state; `None` if it is already registered
    pub(crate) fn register(
        &self,
        root: PathBuf,
        options: WatchingOptions,
        filter: RootFilter,
        parent: &CancellationToken,
    ) -> Option<Arc<RootContext>> {
        let mut inner = self.inner.lock();
        if inner.roots.contains_key(&root) {
            return None;
        }

        inner.next_generation += 1;
        let ctx = Arc::new(RootContext {
            root: root.clone(),
            generation: inner.next_generation,
            options,
            filter: Arc::new(filter),
            scope: RootScope {
                token: parent.child_token(),
                tracker: TaskTracker::new(),
            },
        });

        inner.roots.insert(
            root,
            RootWatch {
                ctx: ctx.clone(),
                state: RootState::Starting,
            },
        );
        Some(ctx)
    }

    /// Mark a root as stopping and hand back its context for cancellation
    pub(crate) fn begin_stop(&self, root: &Path) -> Option<Arc<RootContext>> {
        let mut inner = self.inner.lock();
        let watch = inner.roots.get_mut(root)?;
        watch.state = RootState::Stopping;
        Some(watch.ctx.clone())
    }

    /// Remove a root if it still belongs to the given registration
    pub(crate) fn release(&self, root: &Path, generation: u64) -> bool {
        let mut inner = self.inner.lock();
        match inner.roots.get(root) {
            Some(watch) if watch.ctx.generation == generation => {
                inner.roots.remove(root);
                true
            }
            _ => false,
        }
    }

    /// Move a registration to `state`. A stopping root stays stopping.
    pub(crate) fn set_state(&self, root: &Path, generation: u64, state: RootState) -> bool {
        let mut inner = self.inner.lock();
        match inner.roots.get_mut(root) {
            Some(watch)
                if watch.ctx.generation == generation && watch.state != RootState::Stopping =>
            {
                watch.state = state;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn state(&self, root: &Path) -> Option<RootState> {
        self.inner.lock().roots.get(root).map(|watch| watch.state)
    }

    pub(crate) fn roots(&self) -> Vec<PathBuf> {
        let mut roots: Vec<PathBuf> = self.inner.lock().roots.keys().cloned().collect();
        roots.sort();
        roots
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.lock().roots.len()
    }

    /// Contexts of roots in the given state, ordered by path
    pub(crate) fn snapshot(&self, state: RootState) -> Vec<Arc<RootContext>> {
        let mut contexts: Vec<Arc<RootContext>> = self
            .inner
            .lock()
            .roots
            .values()
            .filter(|watch| watch.state == state)
            .map(|watch| watch.ctx.clone())
            .collect();
        contexts.sort_by(|a, b| a.root.cmp(&b.root));
        contexts
    }

    /// Mark every root as stopping and return their contexts
    pub(crate) fn stop_all(&self) -> Vec<Arc<RootContext>> {
        let mut inner = self.inner.lock();
        for watch in inner.roots.values_mut() {
            watch.state = RootState::Stopping;
        }
        inner.roots.values().map(|watch| watch.ctx.clone()).collect()
    }
}

/// Normalize a root path so one directory always maps to one key.
///
/// Symlinks are resolved when the path exists. Otherwise the path is made
/// absolute and `.`/`..` are folded lexically.
pub fn clean_root(path: &Path) -> PathBuf {
    if let Ok(canonical) = std::fs::canonicalize(path) {
        return canonical;
    }

    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut cleaned = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                cleaned.pop();
            }
            other => cleaned.push(other.as_os_str()),
        }
    }
    cleaned
}
