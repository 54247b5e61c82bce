//! Content index seam and its single-writer handle.
//!
//! The index is the one piece of mutable state shared by the full reindex
//! (pipeline step 5) and incremental updates from the content watcher.
//! [`IndexHandle`] serializes every mutating call behind one async gate,
//! while reads go straight to the index and never wait on a writer.

mod error;
mod memory;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::config::CollectionConfig;

pub use error::{IndexError, IndexResult};
pub use memory::{ContentDocument, MemoryIndex};

/// Schema inputs for a full reindex.
#[derive(Debug, Clone)]
pub struct SchemaPair {
    pub content_root: PathBuf,
    pub collections: Vec<CollectionConfig>,
    /// Query schema of the generation requesting the reindex.
    pub graphql: Arc<serde_json::Value>,
}

impl SchemaPair {
    /// Collection owning a content-relative path.
    pub fn collection_for(&self, relative: &str) -> Option<&CollectionConfig> {
        self.collections.iter().find(|c| c.contains(relative))
    }
}

/// Counts reported by a full reindex.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub added: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub pruned: usize,
}

impl IndexStats {
    pub fn total(&self) -> usize {
        self.added + self.updated + self.unchanged
    }
}

/// A mutable store of content documents keyed by content-relative path.
///
/// All paths are relative to the content root and `/`-separated.
#[async_trait]
pub trait ContentIndex: Send + Sync {
    /// Reinitialize from disk: insert, update and prune to match the schema's collections.
    async fn index_content(&self, schema: &SchemaPair) -> IndexResult<IndexStats>;

    /// Upsert the given paths from disk.
    async fn index_content_by_paths(&self, paths: &[String]) -> IndexResult<()>;

    /// Remove the given paths.
    async fn delete_content_by_paths(&self, paths: &[String]) -> IndexResult<()>;

    fn get(&self, path: &str) -> Option<ContentDocument>;

    /// Documents of one collection, or all of them.
    fn list(&self, collection: Option<&str>) -> Vec<ContentDocument>;

    fn document_count(&self) -> usize;
}

/// Shared handle enforcing single-writer access to a [`ContentIndex`].
#[derive(Clone)]
pub struct IndexHandle {
    index: Arc<dyn ContentIndex>,
    writer: Arc<Mutex<()>>,
}

impl IndexHandle {
    pub fn new(index: impl ContentIndex + 'static) -> Self {
        Self::from_arc(Arc::new(index))
    }

    pub fn from_arc(index: Arc<dyn ContentIndex>) -> Self {
        Self {
            index,
            writer: Arc::new(Mutex::new(())),
        }
    }

    pub async fn index_content(&self, schema: &SchemaPair) -> IndexResult<IndexStats> {
        let _writer = self.writer.lock().await;
        self.index.index_content(schema).await
    }

    pub async fn index_content_by_paths(&self, paths: &[String]) -> IndexResult<()> {
        let _writer = self.writer.lock().await;
        self.index.index_content_by_paths(paths).await
    }

    pub async fn delete_content_by_paths(&self, paths: &[String]) -> IndexResult<()> {
        let _writer = self.writer.lock().await;
        self.index.delete_content_by_paths(paths).await
    }

    /// Read access. Never waits on the writer gate.
    pub fn reader(&self) -> &dyn ContentIndex {
        self.index.as_ref()
    }
}

impl std::fmt::Debug for IndexHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexHandle")
            .field("documents", &self.index.document_count())
            .finish()
    }
}
