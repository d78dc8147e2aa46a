//! Per-directory backend
//!
//! inotify watches are not recursive, so every directory under the root gets
//! its own non-recursive watch. Directories created or moved in later are
//! registered as their notifications arrive.

use super::{
    check_root, NativeSource, NotifyStream, RawChange, SourceError, SourceFactory, WatchTarget,
};
use async_trait::async_trait;
use notify::event::{AccessKind, AccessMode, CreateKind, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecursiveMode, Watcher as _};
use std::collections::VecDeque;
use std::path::Path;
use tracing::{debug, trace};
use treewatch_core::ActionType;
use walkdir::WalkDir;

/// Translates inotify notifications for one root.
///
/// inotify reports a move as `Name(From)` then `Name(To)` sharing a cookie,
/// and `notify` follows a matched pair with a `Name(Both)` record carrying
/// both paths. That record becomes the rename; the matched `Name(To)` is
/// skipped. A `Name(To)` matching no old name was moved in from outside the
/// watched tree and has no prior name.
#[derive(Debug, Default)]
pub struct DirectoryTranslator {
    /// Cookie of the last old name, tracked the way `notify` tracks it
    moved_from: Option<usize>,
}

impl DirectoryTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn translate(&mut self, event: &Event) -> Vec<RawChange> {
        let action = match event.kind {
            EventKind::Create(_) => ActionType::Added,
            EventKind::Remove(_) => ActionType::Removed,
            EventKind::Modify(ModifyKind::Data(_)) => ActionType::Modified,
            EventKind::Access(AccessKind::Close(AccessMode::Write)) => ActionType::Modified,
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
                self.moved_from = event.tracker();
                ActionType::RenamedFrom
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
                if event.tracker().is_some() && event.tracker() == self.moved_from {
                    trace!(cookie = ?event.tracker(), "New name waits for its paired record");
                    return Vec::new();
                }
                ActionType::RenamedNewName
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
                self.moved_from = None;
                return match event.paths.as_slice() {
                    [from, to] => vec![RawChange::renamed(to.clone(), from.clone())],
                    _ => Vec::new(),
                };
            }
            _ => {
                trace!(kind = ?event.kind, "Ignoring native event");
                return Vec::new();
            }
        };

        event
            .paths
            .iter()
            .map(|path| RawChange::new(action, path))
            .collect()
    }
}

/// Opens [`DirectorySource`]s
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectorySourceFactory;

impl SourceFactory for DirectorySourceFactory {
    fn open(&self, target: &WatchTarget) -> Result<Box<dyn NativeSource>, SourceError> {
        check_root(&target.root)?;

        let mut source = DirectorySource {
            stream: NotifyStream::new()?,
            translator: DirectoryTranslator::new(),
            target: target.clone(),
            pending_errors: VecDeque::new(),
        };

        source
            .stream
            .watcher
            .watch(&target.root, RecursiveMode::NonRecursive)
            .map_err(|source| SourceError::Register {
                path: target.root.clone(),
                source,
            })?;

        if target.recursive {
            source.register_subtree(&target.root, 1);
        }

        debug!(root = %target.root.display(), "Directory watches registered");
        Ok(Box::new(source))
    }

    fn name(&self) -> &'static str {
        "directory"
    }
}

/// One non-recursive watch per directory below a root
pub struct DirectorySource {
    stream: NotifyStream,
    translator: DirectoryTranslator,
    target: WatchTarget,
    /// Registration failures waiting to be reported by `next_batch`
    pending_errors: VecDeque<SourceError>,
}

impl DirectorySource {
    /// Watch every directory of the subtree at `dir`, starting at `min_depth`.
    ///
    /// Ignored folders are pruned. Failures are queued rather than returned so
    /// one unreadable directory doesn't stop the rest of the tree.
    fn register_subtree(&mut self, dir: &Path, min_depth: usize) {
        let root = self.target.root.clone();
        let filter = self.target.filter.clone();

        let walker = WalkDir::new(dir)
            .min_depth(min_depth)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| {
                !(entry.file_type().is_dir() && filter.inside_ignored_folder(&root, entry.path()))
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().unwrap_or(dir).to_path_buf();
                    let source = e
                        .into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("filesystem loop"));
                    self.pending_errors.push_back(SourceError::Io { path, source });
                    continue;
                }
            };

            if !entry.file_type().is_dir() {
                continue;
            }

            trace!(dir = %entry.path().display(), "Registering directory watch");
            if let Err(source) = self
                .stream
                .watcher
                .watch(entry.path(), RecursiveMode::NonRecursive)
            {
                self.pending_errors.push_back(SourceError::Register {
                    path: entry.path().to_path_buf(),
                    source,
                });
            }
        }
    }

    /// Directories that appear under the root need their own watches
    fn track_new_directories(&mut self, event: &Event) {
        if !self.target.recursive {
            return;
        }

        let arrived = matches!(
            event.kind,
            EventKind::Create(CreateKind::Folder)
                | EventKind::Create(CreateKind::Any)
                | EventKind::Modify(ModifyKind::Name(RenameMode::To))
        );
        if !arrived {
            return;
        }

        for path in &event.paths {
            if !path.is_dir() || self.target.filter.inside_ignored_folder(&self.target.root, path)
            {
                continue;
            }
            debug!(dir = %path.display(), "New directory under watched root");
            self.register_subtree(path, 0);
        }
    }
}

#[async_trait]
impl NativeSource for DirectorySource {
    async fn next_batch(&mut self) -> Option<Result<Vec<RawChange>, SourceError>> {
        if let Some(error) = self.pending_errors.pop_front() {
            return Some(Err(error));
        }

        match self.stream.recv().await? {
            Ok(event) => {
                self.track_new_directories(&event);
                Some(Ok(self.translator.translate(&event)))
            }
            Err(e) => Some(Err(SourceError::Notify(e))),
        }
    }
}
