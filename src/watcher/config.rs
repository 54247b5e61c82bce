//! Config watch session: reruns the pipeline when configuration changes.
//!
//! Subscribes to the dev server's [`ChangeHook`] and only reacts to
//! `Changed` events. Paths the pipeline writes itself (generated folder, lock
//! document, staging files) are skipped.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::WatchError;
use crate::paths::is_generated_path;
use crate::pipeline::{RebuildPipeline, RunTrigger};
use crate::server::{ChangeHook, ServerEvent};

/// Result of handling one server event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOutcome {
    /// Not a `Changed` event, or a pipeline output.
    Ignored,
    /// The pipeline published this generation.
    Rebuilt(u64),
    /// The pipeline failed; the previous generation stays current.
    Failed,
}

struct SessionState {
    pipeline: Arc<RebuildPipeline>,
    /// Collections the content session was started with.
    watched: Option<BTreeSet<String>>,
}

impl SessionState {
    async fn on_event(&self, event: &ServerEvent) -> ConfigOutcome {
        match event {
            ServerEvent::Changed { path } => self.on_change(path).await,
            _ => ConfigOutcome::Ignored,
        }
    }

    async fn on_change(&self, path: &Path) -> ConfigOutcome {
        if is_generated_path(path) {
            crate::debug_event!("config", "skipped generated", "{}", path.display());
            return ConfigOutcome::Ignored;
        }

        crate::log_event!("config", "changed", "{}", path.display());
        match self.pipeline.run(RunTrigger::Watch).await {
            Ok(result) => {
                self.check_collections(result.settings.collections.iter().map(|c| c.name.as_str()));
                ConfigOutcome::Rebuilt(result.generation)
            }
            // Already logged by the pipeline.
            Err(_) => ConfigOutcome::Failed,
        }
    }

    fn check_collections<'a>(&self, names: impl Iterator<Item = &'a str>) {
        let Some(watched) = &self.watched else {
            return;
        };
        let current: BTreeSet<String> = names.map(str::to_string).collect();
        if &current != watched {
            let added: Vec<&String> = current.difference(watched).collect();
            let removed: Vec<&String> = watched.difference(&current).collect();
            tracing::warn!(
                "[config] collection set changed (added {added:?}, removed {removed:?}); \
                 content watching keeps its startup globs until restart"
            );
        }
    }
}

/// Reruns the [`RebuildPipeline`] on configuration edits.
pub struct ConfigWatchSession {
    state: Arc<SessionState>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ConfigWatchSession {
    pub fn create(pipeline: Arc<RebuildPipeline>) -> Self {
        Self {
            state: Arc::new(SessionState {
                pipeline,
                watched: None,
            }),
            cancel: CancellationToken::new(),
            task: None,
        }
    }

    /// Record the collections the content session watches, so a rebuild
    /// that changes them can be reported.
    pub fn with_watched_collections<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let watched = names.into_iter().map(Into::into).collect();
        self.state = Arc::new(SessionState {
            pipeline: self.state.pipeline.clone(),
            watched: Some(watched),
        });
        self
    }

    /// Handle one event directly, bypassing the hook.
    pub async fn handle(&self, event: &ServerEvent) -> ConfigOutcome {
        self.state.on_event(event).await
    }

    /// Subscribe to `hook` and handle events on a background task.
    pub fn start(&mut self, hook: &ChangeHook) -> Result<(), WatchError> {
        if self.task.is_some() {
            return Err(WatchError::AlreadyStarted);
        }

        let mut events = hook.subscribe();
        let state = self.state.clone();
        let cancel = self.cancel.clone();
        self.task = Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    event = events.recv() => match event {
                        Ok(event) => {
                            state.on_event(&event).await;
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!("[config] missed {skipped} events, rebuilding");
                            let _ = state.pipeline.run(RunTrigger::Watch).await;
                        }
                        Err(RecvError::Closed) => {
                            crate::debug_event!("config", "hook closed");
                            break;
                        }
                    },
                }
            }
        }));
        crate::log_event!("config", "started");
        Ok(())
    }

    /// Stop listening. A run already in progress completes first.
    pub async fn dispose(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        crate::debug_event!("config", "disposed");
    }
}
