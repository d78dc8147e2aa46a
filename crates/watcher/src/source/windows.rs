//! Single-handle backend with rename pairing
//!
//! ReadDirectoryChangesW reports the two halves of a rename as separate
//! records. The old name is held for a short window and attached to the next
//! new name, so consumers see one `renamed` event carrying both paths.

use super::{
    check_root, NativeSource, NotifyStream, RawChange, RenamePairer, SourceError, SourceFactory,
    WatchTarget,
};
use async_trait::async_trait;
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecursiveMode, Watcher as _};
use tokio::time::Instant;
use tracing::{debug, trace};
use treewatch_core::ActionType;

/// Translate one native notification, pairing renames through `pairer`
pub fn translate_paired_event(
    event: &Event,
    pairer: &mut RenamePairer,
    now: Instant,
) -> Vec<RawChange> {
    let action = match event.kind {
        EventKind::Create(_) => ActionType::Added,
        EventKind::Remove(_) => ActionType::Removed,
        EventKind::Modify(ModifyKind::Data(_)) | EventKind::Modify(ModifyKind::Any) => {
            ActionType::Modified
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            for path in &event.paths {
                pairer.old_name(path.clone(), now);
            }
            return Vec::new();
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            return event
                .paths
                .iter()
                .map(|path| pairer.new_name(path.clone(), now))
                .collect();
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
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

/// Opens [`RenamePairingSource`]s
#[derive(Debug, Default, Clone, Copy)]
pub struct RenamePairingSourceFactory;

impl SourceFactory for RenamePairingSourceFactory {
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

        debug!(root = %target.root.display(), ?mode, "Root watch registered");
        Ok(Box::new(RenamePairingSource {
            stream,
            pairer: RenamePairer::new(target.rename_window),
        }))
    }

    fn name(&self) -> &'static str {
        "rename-pairing"
    }
}

/// One native handle per root
pub struct RenamePairingSource {
    stream: NotifyStream,
    pairer: RenamePairer,
}

#[async_trait]
impl NativeSource for RenamePairingSource {
    async fn next_batch(&mut self) -> Option<Result<Vec<RawChange>, SourceError>> {
        match self.stream.recv().await? {
            Ok(event) => Some(Ok(translate_paired_event(
                &event,
                &mut self.pairer,
                Instant::now(),
            ))),
            Err(e) => Some(Err(SourceError::Notify(e))),
        }
    }
}
