//! Content details attached to events

use crate::common::{drain, fake_watcher, init_tracing, wait_for_state, TestTree};
use std::path::Path;
use std::sync::Arc;
use treewatch::{
    ActionType, ContentInfo, ContentInspector, FakeSourceFactory, RawChange, RootState, Watcher,
    WatcherConfig, WatchingOptions,
};

#[tokio::test(start_paused = true)]
async fn enabled_enrichment_adds_type_and_checksum() {
    let tree = TestTree::with_files(&["notes.txt"]);
    let config = WatcherConfig {
        enrich: true,
        ..WatcherConfig::default()
    };
    let (watcher, _factory) = fake_watcher(config);

    watcher.start_watching(tree.root(), WatchingOptions::default());

    let events = drain(&watcher.events()).await;
    assert_eq!(events.len(), 1);
    let content = events[0].content.as_ref().expect("enriched event");
    assert_eq!(content.content_type, "text/plain");
    assert_eq!(content.checksum.len(), 64);
}

#[tokio::test(start_paused = true)]
async fn removals_are_not_inspected() {
    let tree = TestTree::new();
    let config = WatcherConfig {
        enrich: true,
        ..WatcherConfig::default()
    };
    let (watcher, factory) = fake_watcher(config);

    watcher.start_watching(tree.root(), WatchingOptions::default().rescan(false));
    wait_for_state(&watcher, tree.root(), Some(RootState::Watching)).await;
    factory.emit(
        tree.root(),
        vec![RawChange::new(ActionType::Removed, tree.path("gone.txt"))],
    );

    let events = drain(&watcher.events()).await;
    assert_eq!(events.len(), 1);
    assert!(events[0].content.is_none());
    assert!(drain(&watcher.errors()).await.is_empty());
}

struct FixedInspector;

impl ContentInspector for FixedInspector {
    fn inspect(&self, path: &Path) -> anyhow::Result<ContentInfo> {
        if path.extension().is_some_and(|ext| ext == "bad") {
            anyhow::bail!("cannot read [{}]", path.display());
        }
        Ok(ContentInfo {
            content_type: "application/x-test".to_string(),
            checksum: "fixed".to_string(),
        })
    }
}

#[tokio::test(start_paused = true)]
async fn custom_inspector_failures_degrade_to_warnings() {
    init_tracing();
    let tree = TestTree::with_files(&["good.txt", "broken.bad"]);
    let watcher = Watcher::with_inspector(
        WatcherConfig::default(),
        Arc::new(FakeSourceFactory::new()),
        Arc::new(FixedInspector),
    )
    .unwrap();

    watcher.start_watching(tree.root(), WatchingOptions::default());

    let mut events = drain(&watcher.events()).await;
    events.sort_by(|a, b| a.path.cmp(&b.path));
    assert_eq!(events.len(), 2);
    assert!(events[0].content.is_none());
    assert_eq!(events[1].content.as_ref().unwrap().checksum, "fixed");

    let errors = drain(&watcher.errors()).await;
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].level, treewatch::Level::Warning);
}
