//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;

use tina_dev::index::{
    ContentDocument, ContentIndex, IndexResult, IndexStats, MemoryIndex, SchemaPair,
};

pub const POSTS_CONFIG: &str = r#"
[[collections]]
name = "posts"
label = "Posts"
path = "content/posts"
format = "md"

[[collections.fields]]
name = "title"
type = "string"
required = true
"#;

/// A project root with `tina/config.toml` and one post.
pub fn project(config: &str) -> TempDir {
    populate(TempDir::new().unwrap(), config)
}

/// Like [`project`], created under `base`.
pub fn project_in(base: &Path, config: &str) -> TempDir {
    let dir = tempfile::Builder::new()
        .prefix("site")
        .tempdir_in(base)
        .unwrap();
    populate(dir, config)
}

fn populate(dir: TempDir, config: &str) -> TempDir {
    std::fs::create_dir_all(dir.path().join("tina")).unwrap();
    std::fs::create_dir_all(dir.path().join("content/posts")).unwrap();
    std::fs::write(dir.path().join("tina/config.toml"), config).unwrap();
    std::fs::write(
        dir.path().join("content/posts/a.md"),
        "---\ntitle: A\n---\nFirst post\n",
    )
    .unwrap();
    dir
}

pub fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, contents).unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexCall {
    Full,
    Upsert(Vec<String>),
    Delete(Vec<String>),
}

/// Records every mutating call and delegates to a [`MemoryIndex`].
#[derive(Default)]
pub struct RecordingIndex {
    inner: MemoryIndex,
    calls: Mutex<Vec<IndexCall>>,
}

impl RecordingIndex {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<IndexCall> {
        self.calls.lock().clone()
    }

    /// Calls recorded after the first full reindex.
    pub fn calls_after_initial(&self) -> Vec<IndexCall> {
        let calls = self.calls();
        match calls.iter().position(|c| *c == IndexCall::Full) {
            Some(i) => calls[i + 1..].to_vec(),
            None => calls,
        }
    }

    /// Wait until at least `count` calls were recorded.
    pub async fn wait_for_calls(&self, count: usize) -> Vec<IndexCall> {
        for _ in 0..200 {
            if self.calls.lock().len() >= count {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.calls()
    }
}

#[async_trait]
impl ContentIndex for RecordingIndex {
    async fn index_content(&self, schema: &SchemaPair) -> IndexResult<IndexStats> {
        self.calls.lock().push(IndexCall::Full);
        self.inner.index_content(schema).await
    }

    async fn index_content_by_paths(&self, paths: &[String]) -> IndexResult<()> {
        self.calls.lock().push(IndexCall::Upsert(paths.to_vec()));
        self.inner.index_content_by_paths(paths).await
    }

    async fn delete_content_by_paths(&self, paths: &[String]) -> IndexResult<()> {
        self.calls.lock().push(IndexCall::Delete(paths.to_vec()));
        self.inner.delete_content_by_paths(paths).await
    }

    fn get(&self, path: &str) -> Option<ContentDocument> {
        self.inner.get(path)
    }

    fn list(&self, collection: Option<&str>) -> Vec<ContentDocument> {
        self.inner.list(collection)
    }

    fn document_count(&self) -> usize {
        self.inner.document_count()
    }
}
