//! Scripted source for tests and embedders without a native backend
//!
//! Changes are pushed per root with [`FakeSourceFactory::emit`]. Pushes made
//! before the root is opened are queued and delivered once it is.

use super::{check_root, NativeSource, RawChange, SourceError, SourceFactory, WatchTarget};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

type Batch = Result<Vec<RawChange>, SourceError>;

struct Channel {
    tx: Option<mpsc::UnboundedSender<Batch>>,
    rx: Option<mpsc::UnboundedReceiver<Batch>>,
}

impl Channel {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx: Some(tx),
            rx: Some(rx),
        }
    }
}

#[derive(Default)]
struct Inner {
    channels: Mutex<HashMap<PathBuf, Channel>>,
    failing: Mutex<HashSet<PathBuf>>,
    opened: AtomicUsize,
}

/// Hands out sources fed from the test side
#[derive(Clone, Default)]
pub struct FakeSourceFactory {
    inner: Arc<Inner>,
}

impl FakeSourceFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a batch for `root`; false if the root's source was closed
    pub fn emit(&self, root: &Path, changes: Vec<RawChange>) -> bool {
        self.push(root, Ok(changes))
    }

    /// Queue a per-iteration failure for `root`
    pub fn emit_error(&self, root: &Path, error: SourceError) -> bool {
        self.push(root, Err(error))
    }

    /// Close the native handle of `root`; its reader sees end of stream
    pub fn close(&self, root: &Path) {
        if let Some(channel) = self.inner.channels.lock().get_mut(root) {
            channel.tx = None;
        }
    }

    /// Make the next opens of `root` fail as if access were denied
    pub fn fail_open(&self, root: &Path) {
        self.inner.failing.lock().insert(root.to_path_buf());
    }

    /// Number of successful opens so far
    pub fn opened(&self) -> usize {
        self.inner.opened.load(Ordering::SeqCst)
    }

    fn push(&self, root: &Path, batch: Batch) -> bool {
        let mut channels = self.inner.channels.lock();
        let channel = channels
            .entry(root.to_path_buf())
            .or_insert_with(Channel::new);

        match &channel.tx {
            Some(tx) => tx.send(batch).is_ok(),
            None => false,
        }
    }
}

impl SourceFactory for FakeSourceFactory {
    fn open(&self, target: &WatchTarget) -> Result<Box<dyn NativeSource>, SourceError> {
        check_root(&target.root)?;

        if self.inner.failing.lock().contains(&target.root) {
            return Err(SourceError::Io {
                path: target.root.clone(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied"),
            });
        }

        let mut channels = self.inner.channels.lock();
        let channel = channels
            .entry(target.root.clone())
            .or_insert_with(Channel::new);

        // A root opened again after a stop gets a fresh stream
        let rx = match channel.rx.take() {
            Some(rx) => rx,
            None => {
                let (tx, rx) = mpsc::unbounded_channel();
                channel.tx = Some(tx);
                rx
            }
        };

        self.inner.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSource { rx }))
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// Source end of a [`FakeSourceFactory`] channel
pub struct FakeSource {
    rx: mpsc::UnboundedReceiver<Batch>,
}

#[async_trait]
impl NativeSource for FakeSource {
    async fn next_batch(&mut self) -> Option<Result<Vec<RawChange>, SourceError>> {
        self.rx.recv().await
    }
}
