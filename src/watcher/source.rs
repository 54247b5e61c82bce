//! Filesystem event source for content watching, backed by `notify`.
//!
//! Emits an `Add` for every file already matching a collection glob, then
//! `Ready`, then live events. Everything goes through one channel so the
//! consumer sees events in the order they were observed.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use notify::event::ModifyKind;
use notify::{Event, EventKind, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use walkdir::WalkDir;

use super::WatchError;
use super::event::FsEvent;
use crate::paths::CollectionGlob;

/// Keeps the underlying watcher alive. Dropping it stops live events.
pub struct NotifySource {
    _watcher: notify::RecommendedWatcher,
    roots: Vec<PathBuf>,
}

impl NotifySource {
    pub fn start(
        content_root: &Path,
        globs: &[CollectionGlob],
    ) -> Result<(Self, mpsc::Receiver<FsEvent>), WatchError> {
        let (tx, rx) = mpsc::channel(256);

        let live_tx = tx.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for fs_event in translate(event) {
                    let _ = live_tx.blocking_send(fs_event);
                }
            }
            Err(e) => tracing::error!("[content] file watch error: {e}"),
        })?;

        let roots = watch_roots(content_root, globs);
        for root in &roots {
            match watcher.watch(root, RecursiveMode::Recursive) {
                Ok(()) => crate::debug_event!("content", "watching", "{}", root.display()),
                Err(e) => {
                    return Err(WatchError::PathWatchFailed {
                        path: root.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let patterns: Vec<String> = globs.iter().map(|g| g.glob_pattern.clone()).collect();
        tokio::task::spawn_blocking(move || {
            let mut seen = BTreeSet::new();
            for pattern in &patterns {
                let entries = match glob::glob(pattern) {
                    Ok(entries) => entries,
                    Err(e) => {
                        tracing::warn!("[content] invalid glob {pattern}: {e}");
                        continue;
                    }
                };
                for path in entries.filter_map(Result::ok).filter(|p| p.is_file()) {
                    if seen.insert(path.clone()) && tx.blocking_send(FsEvent::Add(path)).is_err() {
                        return;
                    }
                }
            }
            crate::debug_event!("content", "initial scan", "{} files", seen.len());
            let _ = tx.blocking_send(FsEvent::Ready);
        });

        Ok((
            Self {
                _watcher: watcher,
                roots,
            },
            rx,
        ))
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}

/// Directories to watch: each glob's base, or its nearest existing ancestor
/// inside the content root when the base does not exist yet.
fn watch_roots(content_root: &Path, globs: &[CollectionGlob]) -> Vec<PathBuf> {
    let mut roots = BTreeSet::new();
    for glob in globs {
        let mut dir = glob.base_dir.as_path();
        while !dir.is_dir() && dir != content_root {
            match dir.parent() {
                Some(parent) => dir = parent,
                None => break,
            }
        }
        if dir.is_dir() {
            roots.insert(dir.to_path_buf());
        }
    }

    // A root nested inside another is already covered recursively.
    let all: Vec<PathBuf> = roots.into_iter().collect();
    all.iter()
        .filter(|root| !all.iter().any(|other| other != *root && root.starts_with(other)))
        .cloned()
        .collect()
}

/// Translate a notify event into content events.
///
/// A directory that appears (created or moved in) becomes one `Add` per file
/// inside it, since files written before the recursive watch reaches the new
/// directory produce no events of their own. A directory that disappears is
/// passed on as a single `Unlink`; the session expands it against the index.
pub fn translate(event: Event) -> Vec<FsEvent> {
    let mut out = Vec::new();
    for path in event.paths {
        let fs_event = match event.kind {
            EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(_)) if path.is_dir() => {
                out.extend(files_under(&path).map(FsEvent::Add));
                continue;
            }
            EventKind::Create(_) => FsEvent::Add(path),
            EventKind::Modify(ModifyKind::Metadata(_)) => continue,
            EventKind::Modify(ModifyKind::Name(_)) => {
                if path.is_file() {
                    FsEvent::Add(path)
                } else {
                    FsEvent::Unlink(path)
                }
            }
            EventKind::Modify(_) => {
                if path.exists() {
                    FsEvent::Change(path)
                } else {
                    FsEvent::Unlink(path)
                }
            }
            EventKind::Remove(_) => FsEvent::Unlink(path),
            _ => continue,
        };
        out.push(fs_event);
    }
    out
}

fn files_under(dir: &Path) -> impl Iterator<Item = PathBuf> {
    WalkDir::new(dir)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CollectionConfig;
    use notify::event::{CreateKind, DataChange, RemoveKind, RenameMode};
    use tempfile::TempDir;

    fn glob_for(root: &Path, path: &str) -> CollectionGlob {
        CollectionGlob::new(
            root,
            &CollectionConfig {
                name: "c".to_string(),
                label: None,
                path: path.to_string(),
                format: None,
                fields: Vec::new(),
            },
        )
    }

    #[test]
    fn test_translate_existing_and_missing_paths() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.md");
        std::fs::write(&file, "x").unwrap();
        let missing = dir.path().join("gone.md");

        let modify = Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path(file.clone())
            .add_path(missing.clone());
        assert_eq!(
            translate(modify),
            vec![FsEvent::Change(file.clone()), FsEvent::Unlink(missing.clone())]
        );

        let rename = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Any)))
            .add_path(file.clone());
        assert_eq!(translate(rename), vec![FsEvent::Add(file.clone())]);

        let remove = Event::new(EventKind::Remove(RemoveKind::File)).add_path(missing.clone());
        assert_eq!(translate(remove), vec![FsEvent::Unlink(missing)]);

        let empty = dir.path().join("empty");
        std::fs::create_dir(&empty).unwrap();
        let create_dir = Event::new(EventKind::Create(CreateKind::Folder)).add_path(empty);
        assert!(translate(create_dir).is_empty());
    }

    #[test]
    fn test_translate_directory_expands_to_files() {
        let dir = TempDir::new().unwrap();
        let moved = dir.path().join("2025");
        std::fs::create_dir_all(moved.join("drafts")).unwrap();
        std::fs::write(moved.join("y.md"), "y").unwrap();
        std::fs::write(moved.join("drafts/z.md"), "z").unwrap();

        let expected = vec![
            FsEvent::Add(moved.join("drafts/z.md")),
            FsEvent::Add(moved.join("y.md")),
        ];

        let create = Event::new(EventKind::Create(CreateKind::Folder)).add_path(moved.clone());
        assert_eq!(translate(create), expected);

        // Rename with both ends: the old path is gone, the new one is a directory.
        let gone = dir.path().join("2023");
        let rename = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(gone.clone())
            .add_path(moved);
        let mut with_unlink = vec![FsEvent::Unlink(gone)];
        with_unlink.extend(expected);
        assert_eq!(translate(rename), with_unlink);
    }

    #[test]
    fn test_watch_roots_fall_back_and_dedupe() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("content/posts")).unwrap();

        let roots = watch_roots(
            root,
            &[
                glob_for(root, "content/posts"),
                glob_for(root, "content/posts/drafts"),
                glob_for(root, "content/pages"),
            ],
        );
        assert_eq!(roots, vec![root.join("content")]);
    }

    #[tokio::test]
    async fn test_initial_scan_then_ready() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("content/posts")).unwrap();
        std::fs::write(root.join("content/posts/a.md"), "a").unwrap();
        std::fs::write(root.join("content/posts/b.json"), "{}").unwrap();

        let (_source, mut rx) = NotifySource::start(root, &[glob_for(root, "content/posts")]).unwrap();

        let mut adds = Vec::new();
        loop {
            match rx.recv().await.unwrap() {
                FsEvent::Ready => break,
                FsEvent::Add(path) => adds.push(path),
                _ => {}
            }
        }
        assert_eq!(adds, vec![root.join("content/posts/a.md")]);
    }
}
