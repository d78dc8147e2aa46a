//! Recursive stream backend (FSEvents and anything else `notify` recommends)

use super::{
    check_root, NativeSource, NotifyStream, RawChange, RenamePairer, SourceError, SourceFactory,
    WatchTarget,
};
use async_trait::async_trait;
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecursiveMode, Watcher as _};
use std::path::Path;
use tokio::time::Instant;
use tracing::{debug, trace};
use treewatch_core::ActionType;

/// Translate one native notification.
///
/// FSEvents reports both halves of a rename as `Name(Any)`; `exists` tells
/// them apart. A vanished path is the old name and waits in `pairer` for the
/// new name that follows it.
pub fn translate_recursive_event(
    event: &Event,
    pairer: &mut RenamePairer,
    now: Instant,
    exists: impl Fn(&Path) -> bool,
) -> Vec<RawChange> {
    let action = match event.kind {
        EventKind::Create(_) => ActionType::Added,
        EventKind::Remove(_) => ActionType::Removed,
        EventKind::Modify(ModifyKind::Data(_)) | EventKind::Modify(ModifyKind::Any) => {
            ActionType::Modified
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            return match event.paths.as_slice() {
                [from, to] => vec![RawChange::renamed(to.clone(), from.clone())],
                _ => Vec::new(),
            };
        }
        EventKind::Modify(ModifyKind::Name(mode)) => {
            let mut changes = Vec::new();
            for path in &event.paths {
                let new_name = match mode {
                    RenameMode::From => false,
                    RenameMode::To => true,
                    _ => exists(path),
                };
                if new_name {
                    changes.push(pairer.new_name(path.clone(), now));
                } else {
                    pairer.old_name(path.clone(), now);
                }
            }
            return changes;
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

/// Opens [`RecursiveSource`]s
#[derive(Debug, Default, Clone, Copy)]
pub struct RecursiveSourceFactory;

impl SourceFactory for RecursiveSourceFactory {
    fn open(&self, target: &WatchTarget) -> Result<Box<dyn NativeSource>, SourceError> {
        check_root(&target.root)?;

        let mut stream = NotifyStream::new()?;
        let mode = if target.recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        stream
            .watcher
            .watch(&target.root, mode)
            .map_err(|source| SourceError::Register {
                path: target.root.clone(),
                source,
            })?;

        debug!(root = %target.root.display(), ?mode, "Root stream registered");
        Ok(Box::new(RecursiveSource {
            stream,
            pairer: RenamePairer::new(target.rename_window),
        }))
    }

    fn name(&self) -> &'static str {
        "recursive"
    }
}

/// One recursive native stream per root
pub struct RecursiveSource {
    stream: NotifyStream,
    pairer: RenamePairer,
}

#[async_trait]
impl NativeSource for RecursiveSource {
    async fn next_batch(&mut self) -> Option<Result<Vec<RawChange>, SourceError>> {
        match self.stream.recv().await? {
            Ok(event) => Some(Ok(translate_recursive_event(
                &event,
                &mut self.pairer,
                Instant::now(),
                Path::exists,
            ))),
            Err(e) => Some(Err(SourceError::Notify(e))),
        }
    }
}
