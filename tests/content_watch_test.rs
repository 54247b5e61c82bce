//! Content watch session behavior against a recording index.

mod common;

use std::sync::Arc;

use common::{IndexCall, POSTS_CONFIG, RecordingIndex, project, project_in, write};
use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::{Event, EventKind};
use tokio::sync::mpsc;
use tina_dev::config::ConfigManager;
use tina_dev::index::{ContentIndex, IndexHandle};
use tina_dev::pipeline::{RebuildPipeline, RunTrigger};
use tina_dev::watcher::{ContentOutcome, ContentWatchSession, FsEvent, translate};

/// Run the initial pipeline over a recording index and build a session for its generation.
async fn started(root: &std::path::Path) -> (Arc<RecordingIndex>, ContentWatchSession) {
    let recorder = RecordingIndex::new();
    let pipeline = RebuildPipeline::builder(ConfigManager::new(root))
        .index(IndexHandle::from_arc(recorder.clone()))
        .build();
    let result = pipeline.run(RunTrigger::Initial).await.unwrap();

    let session = ContentWatchSession::create(
        result.index.clone(),
        result.paths.content_root.clone(),
        result.paths.collection_globs(&result.settings.collections),
    );
    (recorder, session)
}

#[tokio::test]
async fn test_adds_before_ready_never_upsert() {
    let dir = project(POSTS_CONFIG);
    let root = dir.path();
    write(root, "content/posts/b.md", "b");
    let (recorder, session) = started(root).await;

    for name in ["a.md", "b.md"] {
        let outcome = session
            .handle(FsEvent::Add(root.join("content/posts").join(name)))
            .await;
        assert_eq!(outcome, ContentOutcome::Pending);
    }

    assert!(!session.is_ready());
    assert!(recorder.calls_after_initial().is_empty());
}

#[tokio::test]
async fn test_add_and_change_after_ready_upsert_exact_path() {
    let dir = project(POSTS_CONFIG);
    let root = dir.path();
    let (recorder, session) = started(root).await;
    session.handle(FsEvent::Ready).await;

    write(root, "content/posts/new.md", "new");
    session
        .handle(FsEvent::Add(root.join("content/posts/new.md")))
        .await;
    session
        .handle(FsEvent::Change(root.join("content/posts/a.md")))
        .await;

    assert_eq!(
        recorder.calls_after_initial(),
        vec![
            IndexCall::Upsert(vec!["content/posts/new.md".to_string()]),
            IndexCall::Upsert(vec!["content/posts/a.md".to_string()]),
        ]
    );
    assert!(recorder.get("content/posts/new.md").is_some());
}

#[tokio::test]
async fn test_change_before_ready_still_upserts() {
    let dir = project(POSTS_CONFIG);
    let root = dir.path();
    let (recorder, session) = started(root).await;

    session
        .handle(FsEvent::Change(root.join("content/posts/a.md")))
        .await;

    assert_eq!(
        recorder.calls_after_initial(),
        vec![IndexCall::Upsert(vec!["content/posts/a.md".to_string()])]
    );
}

#[tokio::test]
async fn test_unlink_deletes_single_path() {
    let dir = project(POSTS_CONFIG);
    let root = dir.path();
    let (recorder, session) = started(root).await;

    std::fs::remove_file(root.join("content/posts/a.md")).unwrap();
    session
        .handle(FsEvent::Unlink(root.join("content/posts/a.md")))
        .await;

    assert_eq!(
        recorder.calls_after_initial(),
        vec![IndexCall::Delete(vec!["content/posts/a.md".to_string()])]
    );
    assert_eq!(recorder.document_count(), 0);
}

#[tokio::test]
async fn test_queued_events_apply_in_order() {
    let dir = project(POSTS_CONFIG);
    let root = dir.path();
    let (recorder, mut session) = started(root).await;

    let (tx, rx) = mpsc::channel(16);
    session.start(rx).unwrap();

    let path = root.join("content/posts/a.md");
    tx.send(FsEvent::Add(path.clone())).await.unwrap();
    tx.send(FsEvent::Ready).await.unwrap();
    tx.send(FsEvent::Change(path.clone())).await.unwrap();
    tx.send(FsEvent::Unlink(path)).await.unwrap();

    // One full reindex from startup, then the two post-ready events.
    let calls = recorder.wait_for_calls(3).await;
    assert_eq!(
        calls[1..],
        [
            IndexCall::Upsert(vec!["content/posts/a.md".to_string()]),
            IndexCall::Delete(vec!["content/posts/a.md".to_string()]),
        ]
    );
    assert!(session.is_ready());

    drop(tx);
    session.dispose().await;
}

#[tokio::test]
async fn test_events_outside_collections_are_ignored() {
    let dir = project(POSTS_CONFIG);
    let root = dir.path();
    let (recorder, session) = started(root).await;
    session.handle(FsEvent::Ready).await;

    write(root, "content/pages/about.md", "about");
    write(root, "content/posts/notes.txt", "notes");
    for relative in ["content/pages/about.md", "content/posts/notes.txt"] {
        let outcome = session.handle(FsEvent::Change(root.join(relative))).await;
        assert_eq!(outcome, ContentOutcome::Unmatched);
    }

    assert!(recorder.calls_after_initial().is_empty());
}

#[tokio::test]
async fn test_relative_root_matches_absolute_event_paths() {
    let dir = project_in(&std::env::current_dir().unwrap(), POSTS_CONFIG);
    let relative = std::path::PathBuf::from(dir.path().file_name().unwrap());
    assert!(relative.is_relative());
    let (recorder, session) = started(&relative).await;
    session.handle(FsEvent::Ready).await;

    // Watch backends report absolute paths.
    let root = dir.path();
    write(root, "content/posts/new.md", "new");
    session
        .handle(FsEvent::Change(root.join("content/posts/a.md")))
        .await;
    session
        .handle(FsEvent::Add(root.join("content/posts/new.md")))
        .await;

    assert_eq!(
        recorder.calls_after_initial(),
        vec![
            IndexCall::Upsert(vec!["content/posts/a.md".to_string()]),
            IndexCall::Upsert(vec!["content/posts/new.md".to_string()]),
        ]
    );
}

/// Feed every event a notify event translates to through the session.
async fn deliver(session: &ContentWatchSession, event: Event) -> Vec<ContentOutcome> {
    let mut outcomes = Vec::new();
    for fs_event in translate(event) {
        outcomes.push(session.handle(fs_event).await);
    }
    outcomes
}

#[tokio::test]
async fn test_renamed_directory_moves_its_documents() {
    let dir = project(POSTS_CONFIG);
    let root = dir.path();
    let (recorder, session) = started(root).await;
    session.handle(FsEvent::Ready).await;

    let old = root.join("content/posts/2023");
    write(root, "content/posts/2023/y.md", "y");
    let created = Event::new(EventKind::Create(CreateKind::Folder)).add_path(old.clone());
    deliver(&session, created).await;
    assert!(recorder.get("content/posts/2023/y.md").is_some());

    let new = root.join("content/posts/2025");
    std::fs::rename(&old, &new).unwrap();
    let renamed = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
        .add_path(old)
        .add_path(new);
    let outcomes = deliver(&session, renamed).await;
    assert!(matches!(&outcomes[0], ContentOutcome::Directory(removed) if removed.len() == 1));

    assert!(recorder.get("content/posts/2023/y.md").is_none());
    assert!(recorder.get("content/posts/2025/y.md").is_some());
    assert_eq!(
        recorder.calls_after_initial(),
        vec![
            IndexCall::Upsert(vec!["content/posts/2023/y.md".to_string()]),
            IndexCall::Delete(vec!["content/posts/2023/y.md".to_string()]),
            IndexCall::Upsert(vec!["content/posts/2025/y.md".to_string()]),
        ]
    );
}

#[tokio::test]
async fn test_removed_directory_deletes_each_document() {
    let dir = project(POSTS_CONFIG);
    let root = dir.path();
    write(root, "content/posts/archive/x.md", "x");
    write(root, "content/posts/archive/old/z.md", "z");
    let (recorder, session) = started(root).await;
    session.handle(FsEvent::Ready).await;

    std::fs::remove_dir_all(root.join("content/posts/archive")).unwrap();
    let outcome = session
        .handle(FsEvent::Unlink(root.join("content/posts/archive")))
        .await;

    let ContentOutcome::Directory(removed) = outcome else {
        panic!("expected a directory removal, got {outcome:?}");
    };
    assert_eq!(removed.len(), 2);
    assert_eq!(
        recorder.calls_after_initial(),
        vec![
            IndexCall::Delete(vec!["content/posts/archive/old/z.md".to_string()]),
            IndexCall::Delete(vec!["content/posts/archive/x.md".to_string()]),
        ]
    );
    assert_eq!(recorder.document_count(), 1);
}
