//! Per-path debouncing with storm protection
//!
//! Native APIs fire several notifications for one logical change (multi-part
//! writes, temp files written before a rename). The first notification for a
//! path starts a waiter; later ones are handed to that waiter and restart its
//! quiet period. The waiter emits once the path has been quiet for the whole
//! window, or gives up without emitting when the path keeps firing.

use crate::registry::RootScope;
use crate::sink::Outputs;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use treewatch_core::{ActionType, ContentInspector, Event, Level, WatchError};

/// Handle to the waiter of one path
struct PendingSignal {
    /// Tells entries apart when a path is registered again after its waiter ended
    id: u64,
    tx: mpsc::UnboundedSender<Event>,
}

/// Coalesces notifications into at most one event per path and quiet period
pub(crate) struct Debouncer {
    pending: Mutex<HashMap<PathBuf, PendingSignal>>,
    next_id: AtomicU64,
    window: Duration,
    /// Notifications for one path, first included, that abort its waiter
    storm_threshold: u32,
    outputs: Outputs,
    inspector: Option<Arc<dyn ContentInspector>>,
}

impl Debouncer {
    pub(crate) fn new(
        window: Duration,
        storm_threshold: u32,
        outputs: Outputs,
        inspector: Option<Arc<dyn ContentInspector>>,
    ) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            window,
            storm_threshold,
            outputs,
            inspector,
        }
    }

    /// Register a notification.
    ///
    /// Signals the active waiter for the path, or spawns one on the root's
    /// tracker. Never blocks on the output channels.
    pub(crate) fn notify(self: &Arc<Self>, event: Event, scope: &RootScope) {
        let mut pending = self.pending.lock();

        let event = match pending.get(&event.path) {
            Some(signal) => match signal.tx.send(event) {
                Ok(()) => return,
                // Waiter ended without unregistering; replace its entry
                Err(mpsc::error::SendError(returned)) => returned,
            },
            None => event,
        };

        self.start_waiter(&mut pending, event, scope);
    }

    fn start_waiter(
        self: &Arc<Self>,
        pending: &mut HashMap<PathBuf, PendingSignal>,
        event: Event,
        scope: &RootScope,
    ) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        pending.insert(event.path.clone(), PendingSignal { id, tx });

        trace!(path = %event.path.display(), action = %event.action, "Starting debounce waiter");
        let debouncer = Arc::clone(self);
        let token = scope.token.clone();
        scope
            .tracker
            .spawn(async move { debouncer.wait(id, event, rx, token).await });
    }

    /// Number of paths with an active waiter
    pub(crate) fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    async fn wait(
        &self,
        id: u64,
        mut event: Event,
        mut rx: mpsc::UnboundedReceiver<Event>,
        token: CancellationToken,
    ) {
        let mut count: u32 = 1;

        loop {
            let signal = tokio::select! {
                _ = token.cancelled() => {
                    trace!(path = %event.path.display(), "Debounce waiter cancelled");
                    self.unregister(&event.path, id);
                    return;
                }
                signal = tokio::time::timeout(self.window, rx.recv()) => signal,
            };

            let latest = match signal {
                Ok(Some(latest)) => latest,
                Ok(None) => {
                    self.unregister(&event.path, id);
                    return;
                }
                Err(_elapsed) => {
                    // A signal that raced the timeout counts as activity
                    match self.unregister_if_quiet(&event.path, id, &mut rx) {
                        Some(latest) => latest,
                        None => break,
                    }
                }
            };

            count += 1;
            if count >= self.storm_threshold {
                self.unregister(&event.path, id);
                let report = WatchError::error(format!(
                    "exit after {count} notifications for [{}]",
                    event.path.display()
                ));
                self.outputs.report(report).await;
                return;
            }
            refresh(&mut event, latest);
        }

        if let Some(inspector) = &self.inspector {
            if event.action.expects_existing_path() {
                self.enrich(inspector.clone(), &mut event).await;
            }
        }

        let path = event.path.clone();
        tokio::select! {
            _ = token.cancelled() => {
                debug!(path = %path.display(), "Root stopped before event delivery");
            }
            delivered = self.outputs.emit(event) => {
                if !delivered {
                    trace!("Event stream closed");
                }
            }
        }
    }

    async fn enrich(&self, inspector: Arc<dyn ContentInspector>, event: &mut Event) {
        let path = event.path.clone();
        match tokio::task::spawn_blocking(move || inspector.inspect(&path)).await {
            Ok(Ok(content)) => event.content = Some(content),
            Ok(Err(e)) => {
                let report = WatchError::new(Level::Warning, format!("{e:#}"));
                self.outputs.report(report).await;
            }
            Err(e) => warn!(path = %event.path.display(), "Content inspection panicked: {e}"),
        }
    }

    fn unregister(&self, path: &Path, id: u64) {
        let mut pending = self.pending.lock();
        if pending.get(path).is_some_and(|signal| signal.id == id) {
            pending.remove(path);
        }
    }

    /// Remove the entry unless a signal slipped in before the lock was taken
    fn unregister_if_quiet(
        &self,
        path: &Path,
        id: u64,
        rx: &mut mpsc::UnboundedReceiver<Event>,
    ) -> Option<Event> {
        let mut pending = self.pending.lock();
        if let Ok(latest) = rx.try_recv() {
            return Some(latest);
        }
        if pending.get(path).is_some_and(|signal| signal.id == id) {
            pending.remove(path);
        }
        None
    }
}

/// Keep the first action; take size, time and prior name from the latest
fn refresh(event: &mut Event, latest: Event) {
    event.size = latest.size.or(event.size);
    event.mod_time = latest.mod_time.or(event.mod_time);
    if latest.prior_name.is_some() && event.action == ActionType::RenamedNewName {
        event.prior_name = latest.prior_name;
    }
}
