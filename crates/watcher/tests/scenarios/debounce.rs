//! Bursts of native notifications on one path

use crate::common::{drain, fake_watcher, wait_for_state, TestTree};
use treewatch::{
    ActionType, Level, RawChange, RootState, SourceError, WatcherConfig, WatchingOptions,
};

fn quiet_start() -> WatchingOptions {
    WatchingOptions::default().rescan(false)
}

#[tokio::test(start_paused = true)]
async fn burst_below_threshold_emits_one_event() {
    let tree = TestTree::new();
    let file = tree.write("report.txt", b"v1");
    let (watcher, factory) = fake_watcher(WatcherConfig::default());

    watcher.start_watching(tree.root(), quiet_start());
    wait_for_state(&watcher, tree.root(), Some(RootState::Watching)).await;

    for _ in 0..4 {
        factory.emit(tree.root(), vec![RawChange::new(ActionType::Modified, &file)]);
    }

    let events = drain(&watcher.events()).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].path, file);
    assert_eq!(events[0].action, ActionType::Modified);
    assert_eq!(events[0].size, Some(2));
    assert!(watcher.errors().is_empty());
}

#[tokio::test(start_paused = true)]
async fn burst_at_threshold_is_a_storm() {
    let tree = TestTree::new();
    let file = tree.write("hot.log", b"x");
    let config = WatcherConfig {
        storm_threshold: 5,
        ..WatcherConfig::default()
    };
    let (watcher, factory) = fake_watcher(config);

    watcher.start_watching(tree.root(), quiet_start());
    wait_for_state(&watcher, tree.root(), Some(RootState::Watching)).await;

    let burst = vec![RawChange::new(ActionType::Modified, &file); 5];
    factory.emit(tree.root(), burst);

    assert!(drain(&watcher.events()).await.is_empty());

    let errors = drain(&watcher.errors()).await;
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].level, Level::Error);
    assert!(errors[0].message.contains("hot.log"));
}

#[tokio::test(start_paused = true)]
async fn vanished_and_directory_paths_are_dropped() {
    let tree = TestTree::new();
    let folder = tree.mkdir("photos");
    let (watcher, factory) = fake_watcher(WatcherConfig::default());

    watcher.start_watching(tree.root(), quiet_start());
    wait_for_state(&watcher, tree.root(), Some(RootState::Watching)).await;

    factory.emit(
        tree.root(),
        vec![
            RawChange::new(ActionType::Added, tree.path("download.crdownload")),
            RawChange::new(ActionType::Added, &folder),
        ],
    );

    assert!(drain(&watcher.events()).await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn removals_skip_the_stat() {
    let tree = TestTree::new();
    let (watcher, factory) = fake_watcher(WatcherConfig::default());

    watcher.start_watching(tree.root(), quiet_start());
    wait_for_state(&watcher, tree.root(), Some(RootState::Watching)).await;

    let gone = tree.path("gone.txt");
    factory.emit(tree.root(), vec![RawChange::new(ActionType::Removed, &gone)]);

    let events = drain(&watcher.events()).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].action, ActionType::Removed);
    assert_eq!(events[0].size, None);
}

#[tokio::test(start_paused = true)]
async fn suppressed_actions_never_reach_the_debouncer() {
    let tree = TestTree::new();
    let file = tree.write("a.txt", b"a");
    let (watcher, factory) = fake_watcher(WatcherConfig::default());

    watcher.start_watching(tree.root(), quiet_start().suppress(ActionType::Modified));
    wait_for_state(&watcher, tree.root(), Some(RootState::Watching)).await;

    factory.emit(tree.root(), vec![RawChange::new(ActionType::Modified, &file)]);
    factory.emit(tree.root(), vec![RawChange::new(ActionType::Invalid, &file)]);

    assert!(drain(&watcher.events()).await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn native_read_errors_are_reported_and_watching_continues() {
    let tree = TestTree::new();
    let file = tree.write("a.txt", b"a");
    let (watcher, factory) = fake_watcher(WatcherConfig::default());

    watcher.start_watching(tree.root(), quiet_start());
    wait_for_state(&watcher, tree.root(), Some(RootState::Watching)).await;

    factory.emit_error(
        tree.root(),
        SourceError::Io {
            path: tree.root().to_path_buf(),
            source: std::io::Error::other("queue overflow"),
        },
    );
    factory.emit(tree.root(), vec![RawChange::new(ActionType::Modified, &file)]);

    let errors = drain(&watcher.errors()).await;
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].level, Level::Error);
    assert!(errors[0].message.contains("queue overflow"));

    assert_eq!(drain(&watcher.events()).await.len(), 1);
    assert_eq!(watcher.state(tree.root()), Some(RootState::Watching));
}
