//! Content watch session: incremental index updates from file events.
//!
//! One filesystem event produces at most one index call. Events are handled
//! sequentially by a single task, so a `change` followed by an `unlink` for
//! the same path is applied in that order.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::WatchError;
use super::event::{ChangeKind, ContentChangeEvent, FsEvent};
use super::source::NotifySource;
use crate::index::IndexHandle;
use crate::paths::{CollectionGlob, to_content_relative};

/// Result of handling one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentOutcome {
    /// The index call succeeded.
    Applied(ContentChangeEvent),
    /// The index call failed; the path stays stale until the next full rebuild.
    Failed(ContentChangeEvent),
    /// `add` observed before the initial scan finished.
    Pending,
    /// Path outside the content root or not matched by any collection glob.
    Unmatched,
    /// The readiness signal itself.
    Ready,
    /// A removed directory: one removal per indexed document that was under it.
    Directory(Vec<ContentOutcome>),
}

struct SessionState {
    index: IndexHandle,
    content_root: PathBuf,
    globs: Vec<CollectionGlob>,
    ready: AtomicBool,
}

impl SessionState {
    fn translate(&self, kind: ChangeKind, path: &Path) -> Option<ContentChangeEvent> {
        if !self.globs.iter().any(|g| g.matches(path)) {
            return None;
        }
        ContentChangeEvent::from_absolute(kind, &self.content_root, path)
    }

    /// Indexed documents under `dir`, in collections this session watches.
    fn indexed_under(&self, dir: &Path) -> Vec<String> {
        let Some(relative) = to_content_relative(&self.content_root, dir) else {
            return Vec::new();
        };
        let prefix = format!("{relative}/");
        self.index
            .reader()
            .list(None)
            .into_iter()
            .map(|doc| doc.path)
            .filter(|path| path.starts_with(&prefix))
            .filter(|path| self.globs.iter().any(|g| g.matches(&self.content_root.join(path))))
            .collect()
    }

    async fn remove_directory(&self, dir: &Path, paths: Vec<String>) -> ContentOutcome {
        crate::debug_event!(
            "content",
            "directory removed",
            "{} ({} documents)",
            dir.display(),
            paths.len()
        );
        let mut outcomes = Vec::with_capacity(paths.len());
        for path in paths {
            let change = ContentChangeEvent {
                kind: ChangeKind::Removed,
                path_from_root: path,
            };
            outcomes.push(self.apply(change).await);
        }
        ContentOutcome::Directory(outcomes)
    }

    async fn handle(&self, event: FsEvent) -> ContentOutcome {
        let change = match event {
            FsEvent::Ready => {
                self.ready.store(true, Ordering::SeqCst);
                crate::log_event!("content", "ready", "{} collections", self.globs.len());
                return ContentOutcome::Ready;
            }
            FsEvent::Add(path) => {
                if !self.ready.load(Ordering::SeqCst) {
                    return ContentOutcome::Pending;
                }
                self.translate(ChangeKind::Added, &path)
            }
            FsEvent::Change(path) => self.translate(ChangeKind::Changed, &path),
            FsEvent::Unlink(path) => match self.translate(ChangeKind::Removed, &path) {
                Some(change) => Some(change),
                // Not a collection file, possibly a directory that held some.
                None => {
                    let under = self.indexed_under(&path);
                    if !under.is_empty() {
                        return self.remove_directory(&path, under).await;
                    }
                    None
                }
            },
        };

        match change {
            Some(change) => self.apply(change).await,
            None => ContentOutcome::Unmatched,
        }
    }

    async fn apply(&self, change: ContentChangeEvent) -> ContentOutcome {
        let paths = [change.path_from_root.clone()];
        let result = match change.kind {
            ChangeKind::Added | ChangeKind::Changed => self.index.index_content_by_paths(&paths).await,
            ChangeKind::Removed => self.index.delete_content_by_paths(&paths).await,
        };

        match result {
            Ok(()) => {
                crate::log_event!("content", verb(change.kind), "{}", change.path_from_root);
                ContentOutcome::Applied(change)
            }
            Err(e) => {
                tracing::error!("[content] {} failed: {e}", change.path_from_root);
                ContentOutcome::Failed(change)
            }
        }
    }
}

fn verb(kind: ChangeKind) -> &'static str {
    match kind {
        ChangeKind::Added => "added",
        ChangeKind::Changed => "updated",
        ChangeKind::Removed => "removed",
    }
}

/// Watches every collection glob and applies single-path index updates.
///
/// Lifecycle: [`create`](Self::create), [`start`](Self::start) or
/// [`watch_fs`](Self::watch_fs), then [`dispose`](Self::dispose).
pub struct ContentWatchSession {
    state: Arc<SessionState>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    source: Option<NotifySource>,
}

impl ContentWatchSession {
    pub fn create(index: IndexHandle, content_root: PathBuf, globs: Vec<CollectionGlob>) -> Self {
        Self {
            state: Arc::new(SessionState {
                index,
                content_root,
                globs,
                ready: AtomicBool::new(false),
            }),
            cancel: CancellationToken::new(),
            task: None,
            source: None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state.ready.load(Ordering::SeqCst)
    }

    pub fn globs(&self) -> &[CollectionGlob] {
        &self.state.globs
    }

    /// Handle one event directly, bypassing the queue.
    pub async fn handle(&self, event: FsEvent) -> ContentOutcome {
        self.state.handle(event).await
    }

    /// Consume `events` in order on a background task.
    pub fn start(&mut self, mut events: mpsc::Receiver<FsEvent>) -> Result<(), WatchError> {
        if self.task.is_some() {
            return Err(WatchError::AlreadyStarted);
        }

        let state = self.state.clone();
        let cancel = self.cancel.clone();
        self.task = Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    event = events.recv() => match event {
                        Some(event) => {
                            state.handle(event).await;
                        }
                        None => {
                            crate::debug_event!("content", "source closed");
                            break;
                        }
                    },
                }
            }
        }));
        Ok(())
    }

    /// Start with the default notify-backed source over this session's globs.
    pub fn watch_fs(&mut self) -> Result<(), WatchError> {
        let (source, events) = NotifySource::start(&self.state.content_root, &self.state.globs)?;
        self.start(events)?;
        crate::log_event!(
            "content",
            "started",
            "{} globs under {} roots",
            self.state.globs.len(),
            source.roots().len()
        );
        self.source = Some(source);
        Ok(())
    }

    /// Stop consuming events and release the watcher.
    ///
    /// An index call already in progress completes first.
    pub async fn dispose(mut self) {
        self.cancel.cancel();
        self.source = None;
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        crate::debug_event!("content", "disposed");
    }
}
