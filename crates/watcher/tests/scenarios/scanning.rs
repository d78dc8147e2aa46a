//! Initial scans and rescans

use crate::common::{drain, fake_watcher, wait_for_state, TestTree};
use std::path::PathBuf;
use treewatch::{ActionType, RootState, WatcherConfig, WatchingOptions, PLATFORM_IGNORE_FOLDERS};

#[tokio::test(start_paused = true)]
async fn initial_scan_applies_accept_over_ignore() {
    let tree = TestTree::with_files(&["a.jpg", "b.json", "c.txt"]);
    let (watcher, _factory) = fake_watcher(WatcherConfig::default());

    let options = WatchingOptions::default()
        .accept_file(".jpg")
        .ignore_file(".json");
    watcher.start_watching(tree.root(), options);

    let events = drain(&watcher.events()).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].action, ActionType::Added);
    assert_eq!(events[0].path, tree.path("a.jpg"));
}

#[tokio::test(start_paused = true)]
async fn ignored_folder_subtree_produces_nothing() {
    let tree = TestTree::with_files(&[
        "src/main.rs",
        "node_modules/left-pad/index.js",
        "node_modules/left-pad/lib/deep.js",
        "docs/node_modules/x.js",
    ]);
    let (watcher, _factory) = fake_watcher(WatcherConfig::default());

    watcher.start_watching(
        tree.root(),
        WatchingOptions::default().ignore_folder("node_modules"),
    );

    let events = drain(&watcher.events()).await;
    let paths: Vec<PathBuf> = events.into_iter().map(|event| event.path).collect();
    assert_eq!(paths, vec![tree.path("src/main.rs")]);
}

#[tokio::test(start_paused = true)]
async fn configured_and_platform_folders_are_skipped() {
    let mut files = vec!["keep.txt", ".cache/blob.bin"];
    let platform: Vec<String> = PLATFORM_IGNORE_FOLDERS
        .iter()
        .filter(|name| !name.contains('$'))
        .map(|name| format!("{name}/inside.txt"))
        .collect();
    files.extend(platform.iter().map(String::as_str));

    let tree = TestTree::with_files(&files);
    let config = WatcherConfig {
        extra_ignore_folders: vec![".cache".to_string()],
        ..WatcherConfig::default()
    };
    let (watcher, _factory) = fake_watcher(config);

    watcher.start_watching(tree.root(), WatchingOptions::default());

    let events = drain(&watcher.events()).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].path, tree.path("keep.txt"));
}

#[tokio::test(start_paused = true)]
async fn suppressed_added_silences_the_scan() {
    let tree = TestTree::with_files(&["a.txt"]);
    let (watcher, _factory) = fake_watcher(WatcherConfig::default());

    watcher.start_watching(
        tree.root(),
        WatchingOptions::default().suppress(ActionType::Added),
    );

    assert!(drain(&watcher.events()).await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn rescan_all_walks_each_root_with_its_own_filters() {
    let photos = TestTree::with_files(&["a.jpg", "b.png", "notes.txt"]);
    let docs = TestTree::with_files(&["a.pdf", "b.pdf", "c.jpg"]);
    let misc = TestTree::with_files(&["x.bin", "skip/y.bin"]);
    let (watcher, factory) = fake_watcher(WatcherConfig::default());

    watcher.start_watching(
        photos.root(),
        WatchingOptions::default().rescan(false).accept_file("jpg").accept_file("png"),
    );
    watcher.start_watching(
        docs.root(),
        WatchingOptions::default().rescan(false).accept_file("pdf"),
    );
    watcher.start_watching(
        misc.root(),
        WatchingOptions::default().rescan(false).ignore_folder("skip"),
    );
    for tree in [&photos, &docs, &misc] {
        wait_for_state(&watcher, tree.root(), Some(RootState::Watching)).await;
    }
    assert!(drain(&watcher.events()).await.is_empty());

    let mut reports = watcher.rescan_all().await;
    reports.sort_by(|a, b| a.root.cmp(&b.root));
    assert_eq!(reports.len(), 3);

    for report in &reports {
        let expected_files = if report.root == photos.root() {
            2
        } else if report.root == docs.root() {
            2
        } else {
            assert_eq!(report.root, misc.root());
            assert_eq!(report.skipped_folders, 1);
            1
        };
        assert_eq!(report.files, expected_files, "{}", report.root.display());
        assert_eq!(report.errors, 0);
        assert!(!report.aborted);
    }

    assert_eq!(drain(&watcher.events()).await.len(), 5);
    // Rescans don't reopen native sources
    assert_eq!(factory.opened(), 3);
}

#[tokio::test(start_paused = true)]
async fn rescan_skips_roots_that_are_not_watching() {
    let tree = TestTree::with_files(&["a.txt"]);
    let (watcher, factory) = fake_watcher(WatcherConfig::default());
    factory.fail_open(tree.root());

    watcher.start_watching(tree.root(), WatchingOptions::default());
    wait_for_state(&watcher, tree.root(), None).await;

    assert!(watcher.rescan_all().await.is_empty());
}
