//! The watcher: root lifecycle and the path from native changes to events
//!
//! ```text
//! NativeSource / Scanner -> filters -> validity stat -> Debouncer -> events
//!                 \______________ errors ______________/
//! ```
//!
//! Every root runs one reader task. The reader, the initial scan and the
//! debounce waiters of a root all live on the root's task tracker and observe
//! its cancellation token, so stopping a root can wait for all of them.

use crate::config::{ConfigError, WatcherConfig};
use crate::debounce::Debouncer;
use crate::filter::RootFilter;
use crate::options::WatchingOptions;
use crate::registry::{clean_root, RootContext, RootState, WatchRegistry};
use crate::scan::{ScanItem, ScanReport, Scanner};
use crate::sink::Outputs;
use crate::source::{platform_factory, RawChange, SourceFactory, WatchTarget};
use async_channel::Receiver;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, trace, warn};
use treewatch_core::{ActionType, ContentInspector, DefaultInspector, Event, Level, WatchError};

/// Scan items buffered between the walk and the root task
const SCAN_QUEUE: usize = 256;

/// State shared by the watcher handle and every task it spawns
struct Shared {
    config: WatcherConfig,
    registry: WatchRegistry,
    debouncer: Arc<Debouncer>,
    outputs: Outputs,
    factory: Arc<dyn SourceFactory>,
    /// Parent of every root token
    shutdown: CancellationToken,
    /// Short-lived tasks not tied to a root (error reports)
    tasks: TaskTracker,
}

struct WatcherHandle {
    shared: Arc<Shared>,
    events: Receiver<Event>,
    errors: Receiver<WatchError>,
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        self.shared.shutdown.cancel();
    }
}

/// Watches directory trees and reports debounced file events.
///
/// Cloning is cheap and every clone drives the same roots. Dropping the last
/// clone stops every root. Starting a root spawns tasks, so it must happen
/// inside a tokio runtime.
#[derive(Clone)]
pub struct Watcher {
    handle: Arc<WatcherHandle>,
}

impl Watcher {
    /// A watcher using the native backend of this platform
    pub fn new(config: WatcherConfig) -> Result<Self, ConfigError> {
        Self::with_factory(config, platform_factory())
    }

    /// A watcher whose native sources come from `factory`
    pub fn with_factory(
        config: WatcherConfig,
        factory: Arc<dyn SourceFactory>,
    ) -> Result<Self, ConfigError> {
        let inspector: Option<Arc<dyn ContentInspector>> = if config.enrich {
            Some(Arc::new(DefaultInspector))
        } else {
            None
        };
        Self::build(config, factory, inspector)
    }

    /// Like [`Watcher::with_factory`], enriching every event with `inspector`
    pub fn with_inspector(
        config: WatcherConfig,
        factory: Arc<dyn SourceFactory>,
        inspector: Arc<dyn ContentInspector>,
    ) -> Result<Self, ConfigError> {
        Self::build(config, factory, Some(inspector))
    }

    fn build(
        config: WatcherConfig,
        factory: Arc<dyn SourceFactory>,
        inspector: Option<Arc<dyn ContentInspector>>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let (outputs, events, errors) = Outputs::new(config.channel_capacity);
        let debouncer = Arc::new(Debouncer::new(
            config.debounce_window(),
            config.storm_threshold,
            outputs.clone(),
            inspector,
        ));

        debug!(backend = factory.name(), "Creating watcher");
        let shared = Arc::new(Shared {
            config,
            registry: WatchRegistry::new(),
            debouncer,
            outputs,
            factory,
            shutdown: CancellationToken::new(),
            tasks: TaskTracker::new(),
        });

        Ok(Self {
            handle: Arc::new(WatcherHandle {
                shared,
                events,
                errors,
            }),
        })
    }

    /// Start watching a directory tree.
    ///
    /// Registration happens before this returns; opening the native source
    /// and the initial scan run in the background. A root that is already
    /// watched is left alone. Failures arrive on [`Watcher::errors`].
    pub fn start_watching(&self, root: impl AsRef<Path>, options: WatchingOptions) {
        let shared = &self.handle.shared;
        let root = clean_root(root.as_ref());

        if shared.shutdown.is_cancelled() {
            shared.spawn_report(WatchError::error(format!(
                "cannot start watching [{}]: watcher is shut down",
                root.display()
            )));
            return;
        }

        let filter = RootFilter::new(&options, &shared.config.extra_ignore_folders);
        let Some(ctx) = shared
            .registry
            .register(root.clone(), options, filter, &shared.shutdown)
        else {
            shared.spawn_report(WatchError::info(format!(
                "[{}] is already being watched",
                root.display()
            )));
            return;
        };

        info!(root = %root.display(), "Start watching");
        let task_shared = shared.clone();
        let task_ctx = ctx.clone();
        ctx.scope
            .tracker
            .spawn(async move { task_shared.run_root(task_ctx).await });
    }

    /// Stop watching a root and wait until its tasks have finished.
    ///
    /// No event for the root is emitted once this returns. Returns false if
    /// the root was not watched.
    pub async fn stop_watching(&self, root: impl AsRef<Path>) -> bool {
        let shared = &self.handle.shared;
        let root = clean_root(root.as_ref());

        let Some(ctx) = shared.registry.begin_stop(&root) else {
            debug!(root = %root.display(), "Stop requested for a root that is not watched");
            return false;
        };

        shared.stop_root(&ctx).await;
        info!(root = %root.display(), "Stopped watching");
        true
    }

    /// Walk every watching root again and report its files as added.
    ///
    /// Roots are scanned one after another, each with its own filters. Native
    /// sources keep running.
    pub async fn rescan_all(&self) -> Vec<ScanReport> {
        let shared = &self.handle.shared;
        let mut reports = Vec::new();

        for ctx in shared.registry.snapshot(RootState::Watching) {
            let report = shared.scan_root(&ctx).await;
            if report.aborted && shared.registry.begin_stop(&ctx.root).is_some() {
                shared.stop_root(&ctx).await;
            }
            reports.push(report);
        }

        reports
    }

    /// Stop every root and wait for all of their tasks
    pub async fn shutdown(&self) {
        let shared = &self.handle.shared;
        shared.shutdown.cancel();

        for ctx in shared.registry.stop_all() {
            shared.stop_root(&ctx).await;
        }

        shared.tasks.close();
        shared.tasks.wait().await;
        info!("Watcher shut down");
    }

    pub fn state(&self, root: impl AsRef<Path>) -> Option<RootState> {
        self.handle.shared.registry.state(&clean_root(root.as_ref()))
    }

    /// Registered roots in path order
    pub fn watched_roots(&self) -> Vec<PathBuf> {
        self.handle.shared.registry.roots()
    }

    pub fn len(&self) -> usize {
        self.handle.shared.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Debounced file events from every root
    pub fn events(&self) -> Receiver<Event> {
        self.handle.events.clone()
    }

    /// Error reports from every root. Drain it along with [`Watcher::events`]:
    /// both channels are bounded and a full one stalls the watcher.
    pub fn errors(&self) -> Receiver<WatchError> {
        self.handle.errors.clone()
    }

    /// Token whose cancellation stops every root
    pub fn shutdown_token(&self) -> CancellationToken {
        self.handle.shared.shutdown.clone()
    }

    pub fn config(&self) -> &WatcherConfig {
        &self.handle.shared.config
    }
}

impl Shared {
    fn spawn_report(&self, report: WatchError) {
        let outputs = self.outputs.clone();
        self.tasks.spawn(async move { outputs.report(report).await });
    }

    /// Cancel a root, wait for its tasks, then drop its registration
    async fn stop_root(&self, ctx: &RootContext) {
        ctx.scope.token.cancel();
        ctx.scope.tracker.close();
        ctx.scope.tracker.wait().await;
        self.registry.release(&ctx.root, ctx.generation);
    }

    async fn run_root(self: Arc<Self>, ctx: Arc<RootContext>) {
        self.watch_root(&ctx).await;
        if self.registry.release(&ctx.root, ctx.generation) {
            debug!(root = %ctx.root.display(), "Root released");
        }
    }

    async fn watch_root(&self, ctx: &RootContext) {
        let target = WatchTarget {
            root: ctx.root.clone(),
            recursive: ctx.options.recursive,
            filter: ctx.filter.clone(),
            rename_window: self.config.rename_window(),
        };

        let factory = self.factory.clone();
        let opened = tokio::task::spawn_blocking(move || factory.open(&target)).await;
        let mut source = match opened {
            Ok(Ok(source)) => source,
            Ok(Err(e)) => {
                self.outputs
                    .report(WatchError::from_error(Level::Critical, &e))
                    .await;
                return;
            }
            Err(e) => {
                self.outputs
                    .report(WatchError::critical(format!(
                        "opening native source for [{}] failed: {e}",
                        ctx.root.display()
                    )))
                    .await;
                return;
            }
        };

        if !self
            .registry
            .set_state(&ctx.root, ctx.generation, RootState::Watching)
        {
            debug!(root = %ctx.root.display(), "Root stopped while starting");
            return;
        }
        info!(root = %ctx.root.display(), backend = self.factory.name(), "Watching");

        if ctx.options.rescan && self.scan_root(ctx).await.aborted {
            return;
        }

        loop {
            let batch = tokio::select! {
                _ = ctx.scope.token.cancelled() => break,
                batch = source.next_batch() => batch,
            };

            match batch {
                Some(Ok(changes)) => {
                    for change in changes {
                        self.dispatch(ctx, change).await;
                    }
                }
                Some(Err(e)) => {
                    self.outputs
                        .report(WatchError::from_error(Level::Error, &e))
                        .await;
                }
                None => {
                    debug!(root = %ctx.root.display(), "Native handle closed");
                    break;
                }
            }
        }
    }

    /// Walk a root and feed its files to the debouncer as added.
    ///
    /// The walk runs on the blocking pool and hands its items over a bounded
    /// channel; dropping the receiver ends it.
    async fn scan_root(&self, ctx: &RootContext) -> ScanReport {
        let mut report = ScanReport::new(&ctx.root);
        let suppressed = ctx.filter.action_suppressed(ActionType::Added);

        let (tx, mut rx) = mpsc::channel(SCAN_QUEUE);
        let root = ctx.root.clone();
        let filter = ctx.filter.clone();
        let walk = tokio::task::spawn_blocking(move || {
            for item in Scanner::new(&root, &filter) {
                if tx.blocking_send(item).is_err() {
                    break;
                }
            }
        });

        loop {
            let item = tokio::select! {
                _ = ctx.scope.token.cancelled() => break,
                item = rx.recv() => match item {
                    Some(item) => item,
                    None => break,
                },
            };

            match item {
                ScanItem::File(event) => {
                    if suppressed {
                        continue;
                    }
                    self.debouncer.notify(event, &ctx.scope);
                    report.files += 1;
                }
                ScanItem::SkippedFolder(path) => {
                    trace!(path = %path.display(), "Ignored folder skipped");
                    report.skipped_folders += 1;
                }
                ScanItem::Failed { error, fatal } => {
                    report.errors += 1;
                    report.aborted = fatal;
                    self.outputs.report(error).await;
                }
            }
        }

        drop(rx);
        if let Err(e) = walk.await {
            warn!(root = %ctx.root.display(), "Scan walk panicked: {e}");
        }

        debug!(
            root = %ctx.root.display(),
            files = report.files,
            skipped = report.skipped_folders,
            errors = report.errors,
            "Scan finished"
        );
        report
    }

    /// Filter, validate and debounce one native change
    async fn dispatch(&self, ctx: &RootContext, change: RawChange) {
        if change.action == ActionType::Invalid {
            trace!(path = %change.path.display(), "Dropping invalid action");
            return;
        }
        // Old names only travel as the prior name of a paired rename
        if change.action == ActionType::RenamedFrom {
            trace!(path = %change.path.display(), "Dropping unpaired old name");
            return;
        }
        if ctx.filter.path_ignored(&ctx.root, &change.path) {
            trace!(path = %change.path.display(), "Ignored path");
            return;
        }
        if ctx.filter.action_suppressed(change.action) {
            trace!(action = %change.action, path = %change.path.display(), "Suppressed action");
            return;
        }

        let mut event = Event::new(change.action, change.path);

        // Editors and downloads leave short-lived temp files behind
        if change.action.expects_existing_path() {
            match tokio::fs::metadata(&event.path).await {
                Ok(metadata) if metadata.is_dir() => {
                    debug!(path = %event.path.display(), "Dropping directory notification");
                    return;
                }
                Ok(metadata) => event = event.with_metadata(&metadata),
                Err(e) => {
                    debug!(path = %event.path.display(), "Path vanished before stat: {e}");
                    return;
                }
            }
        }

        if let Some(prior) = change.prior_name {
            event = event.with_prior_name(prior);
        }

        if ctx.scope.token.is_cancelled() {
            debug!(path = %event.path.display(), "Dropping change for a stopping root");
            return;
        }
        self.debouncer.notify(event, &ctx.scope);
    }
}
