//! Change notifications emitted by the dev server's own file watcher.
//!
//! The server watches its configuration folder and broadcasts every file
//! event on a [`ChangeHook`]. Subscribers decide which kinds they care about.

use std::path::{Path, PathBuf};

use notify::{Event, EventKind, RecursiveMode, Watcher};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use crate::watcher::WatchError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    Added { path: PathBuf },
    Changed { path: PathBuf },
    Removed { path: PathBuf },
}

impl ServerEvent {
    pub fn path(&self) -> &Path {
        match self {
            ServerEvent::Added { path }
            | ServerEvent::Changed { path }
            | ServerEvent::Removed { path } => path,
        }
    }
}

/// Broadcasts server file events to any number of subscribers.
#[derive(Clone)]
pub struct ChangeHook {
    sender: broadcast::Sender<ServerEvent>,
}

impl ChangeHook {
    /// Create a new hook with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn send(&self, event: ServerEvent) {
        match self.sender.send(event.clone()) {
            Ok(count) => {
                crate::debug_event!("hook", "sent", "{event:?} to {count} subscribers");
            }
            Err(_) => {
                // No receivers, this is fine
                crate::debug_event!("hook", "dropped", "no subscribers for {event:?}");
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }
}

impl Default for ChangeHook {
    fn default() -> Self {
        Self::new(100)
    }
}

/// Translate a notify event into server events.
pub fn translate(event: Event) -> Vec<ServerEvent> {
    let make: fn(PathBuf) -> ServerEvent = match event.kind {
        EventKind::Create(_) => |path| ServerEvent::Added { path },
        EventKind::Modify(_) => |path| ServerEvent::Changed { path },
        EventKind::Remove(_) => |path| ServerEvent::Removed { path },
        _ => return Vec::new(),
    };
    event.paths.into_iter().map(make).collect()
}

/// Watches the configuration folder and feeds a [`ChangeHook`].
pub struct ConfigFolderWatcher {
    _watcher: notify::RecommendedWatcher,
    cancel: CancellationToken,
}

impl ConfigFolderWatcher {
    pub fn start(folder: &Path, hook: ChangeHook) -> Result<Self, WatchError> {
        let (tx, mut rx) = mpsc::channel(100);
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = tx.blocking_send(res);
        })?;
        watcher
            .watch(folder, RecursiveMode::Recursive)
            .map_err(|e| WatchError::PathWatchFailed {
                path: folder.to_path_buf(),
                reason: e.to_string(),
            })?;

        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Some(res) = rx.recv() => match res {
                        Ok(event) => {
                            for server_event in translate(event) {
                                hook.send(server_event);
                            }
                        }
                        Err(e) => tracing::error!("[hook] file watch error: {e}"),
                    },
                    _ = task_cancel.cancelled() => break,
                    else => break,
                }
            }
            crate::debug_event!("hook", "stopped");
        });

        crate::log_event!("hook", "watching", "{}", folder.display());
        Ok(Self {
            _watcher: watcher,
            cancel,
        })
    }
}

impl Drop for ConfigFolderWatcher {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind};

    #[test]
    fn test_translate_kinds() {
        let event = Event::new(EventKind::Modify(ModifyKind::Any))
            .add_path(PathBuf::from("/site/tina/config.toml"));
        assert_eq!(
            translate(event),
            vec![ServerEvent::Changed {
                path: PathBuf::from("/site/tina/config.toml")
            }]
        );

        let event = Event::new(EventKind::Create(CreateKind::File)).add_path(PathBuf::from("/a"));
        assert!(matches!(translate(event)[0], ServerEvent::Added { .. }));

        assert!(translate(Event::new(EventKind::Any).add_path(PathBuf::from("/a"))).is_empty());
    }

    #[tokio::test]
    async fn test_hook_fans_out() {
        let hook = ChangeHook::default();
        let mut a = hook.subscribe();
        let mut b = hook.subscribe();

        hook.send(ServerEvent::Changed {
            path: PathBuf::from("/x"),
        });
        assert_eq!(a.recv().await.unwrap().path(), Path::new("/x"));
        assert_eq!(b.recv().await.unwrap().path(), Path::new("/x"));
    }
}
