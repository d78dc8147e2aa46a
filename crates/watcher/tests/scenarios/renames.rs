//! Rename pairing from native notifications to emitted events

use crate::common::{drain, fake_watcher, wait_for_state, TestTree};
use notify::event::{ModifyKind, RenameMode};
use notify::EventKind;
use std::path::Path;
use std::time::Duration;
use tokio::time::Instant;
use treewatch::source::{translate_paired_event, DirectoryTranslator, RenamePairer};
use treewatch::{ActionType, RawChange, RootState, WatcherConfig, WatchingOptions};

fn rename_half(mode: RenameMode, path: &Path) -> notify::Event {
    notify::Event::new(EventKind::Modify(ModifyKind::Name(mode))).add_path(path.to_path_buf())
}

#[tokio::test(start_paused = true)]
async fn paired_rename_yields_one_event_with_prior_name() {
    let tree = TestTree::new();
    let old = tree.path("draft.txt");
    let new = tree.write("final.txt", b"done");
    let (watcher, factory) = fake_watcher(WatcherConfig::default());

    watcher.start_watching(tree.root(), WatchingOptions::default().rescan(false));
    wait_for_state(&watcher, tree.root(), Some(RootState::Watching)).await;

    let mut pairer = RenamePairer::new(Duration::from_secs(1));
    let start = Instant::now();
    let old_half = rename_half(RenameMode::From, &old);
    let mut changes = translate_paired_event(&old_half, &mut pairer, start);
    changes.extend(translate_paired_event(
        &rename_half(RenameMode::To, &new),
        &mut pairer,
        start + Duration::from_millis(50),
    ));
    factory.emit(tree.root(), changes);

    let events = drain(&watcher.events()).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].action, ActionType::RenamedNewName);
    assert_eq!(events[0].path, new);
    assert_eq!(events[0].prior_name.as_deref(), Some(old.as_path()));
}

#[tokio::test(start_paused = true)]
async fn unmatched_old_name_yields_nothing() {
    let tree = TestTree::new();
    let old = tree.path("draft.txt");
    let (watcher, factory) = fake_watcher(WatcherConfig::default());

    watcher.start_watching(tree.root(), WatchingOptions::default().rescan(false));
    wait_for_state(&watcher, tree.root(), Some(RootState::Watching)).await;

    let mut pairer = RenamePairer::new(Duration::from_secs(1));
    let changes =
        translate_paired_event(&rename_half(RenameMode::From, &old), &mut pairer, Instant::now());
    factory.emit(tree.root(), changes);

    assert!(drain(&watcher.events()).await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn late_new_name_has_no_prior_name() {
    let tree = TestTree::new();
    let old = tree.path("draft.txt");
    let new = tree.write("final.txt", b"done");
    let (watcher, factory) = fake_watcher(WatcherConfig::default());

    watcher.start_watching(tree.root(), WatchingOptions::default().rescan(false));
    wait_for_state(&watcher, tree.root(), Some(RootState::Watching)).await;

    let mut pairer = RenamePairer::new(Duration::from_secs(1));
    let start = Instant::now();
    let old_half = rename_half(RenameMode::From, &old);
    let mut changes = translate_paired_event(&old_half, &mut pairer, start);
    changes.extend(translate_paired_event(
        &rename_half(RenameMode::To, &new),
        &mut pairer,
        start + Duration::from_secs(5),
    ));
    factory.emit(tree.root(), changes);

    let events = drain(&watcher.events()).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].prior_name, None);
}

#[tokio::test(start_paused = true)]
async fn old_name_alone_is_never_emitted() {
    let tree = TestTree::new();
    let moved_out = tree.path("moved-out.txt");
    let moved_in = tree.write("moved-in.txt", b"hi");
    let (watcher, factory) = fake_watcher(WatcherConfig::default());

    watcher.start_watching(tree.root(), WatchingOptions::default().rescan(false));
    wait_for_state(&watcher, tree.root(), Some(RootState::Watching)).await;

    factory.emit(
        tree.root(),
        vec![
            RawChange::new(ActionType::RenamedFrom, &moved_out),
            RawChange::new(ActionType::RenamedNewName, &moved_in),
        ],
    );

    let events = drain(&watcher.events()).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].action, ActionType::RenamedNewName);
    assert_eq!(events[0].path, moved_in);
    assert_eq!(events[0].prior_name, None);
}

#[tokio::test(start_paused = true)]
async fn inotify_move_sequence_yields_one_rename() {
    let tree = TestTree::new();
    let old = tree.path("report.tmp.txt");
    let new = tree.write("report.txt", b"final");
    let (watcher, factory) = fake_watcher(WatcherConfig::default());

    watcher.start_watching(tree.root(), WatchingOptions::default().rescan(false));
    wait_for_state(&watcher, tree.root(), Some(RootState::Watching)).await;

    // inotify order: old half, new half, then the record with both paths
    let mut translator = DirectoryTranslator::new();
    let mut changes = Vec::new();
    for (mode, paths) in [
        (RenameMode::From, vec![old.clone()]),
        (RenameMode::To, vec![new.clone()]),
        (RenameMode::Both, vec![old.clone(), new.clone()]),
    ] {
        let mut event =
            notify::Event::new(EventKind::Modify(ModifyKind::Name(mode))).set_tracker(42);
        for path in paths {
            event = event.add_path(path);
        }
        changes.extend(translator.translate(&event));
    }
    factory.emit(tree.root(), changes);

    let events = drain(&watcher.events()).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].action, ActionType::RenamedNewName);
    assert_eq!(events[0].path, new);
    assert_eq!(events[0].prior_name.as_deref(), Some(old.as_path()));
}
