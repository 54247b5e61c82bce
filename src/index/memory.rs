//! In-memory content index backed by the content tree on disk.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use super::{ContentIndex, IndexError, IndexResult, IndexStats, SchemaPair};
use crate::paths::to_content_relative;

/// One indexed content file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentDocument {
    /// Content-relative path, `/`-separated.
    pub path: String,
    pub collection: String,
    pub format: String,
    /// SHA-256 of the raw file contents, hex encoded.
    pub checksum: String,
    pub data: Value,
}

#[derive(Default)]
struct IndexState {
    schema: Option<SchemaPair>,
    documents: BTreeMap<String, ContentDocument>,
}

/// Default [`ContentIndex`] holding parsed documents in memory.
///
/// File reads happen outside the state lock; the lock is held only to swap
/// in results, so readers are never blocked by disk I/O.
#[derive(Default)]
pub struct MemoryIndex {
    state: RwLock<IndexState>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn schema(&self) -> IndexResult<SchemaPair> {
        self.state
            .read()
            .schema
            .clone()
            .ok_or(IndexError::NotInitialized)
    }
}

#[async_trait]
impl ContentIndex for MemoryIndex {
    async fn index_content(&self, schema: &SchemaPair) -> IndexResult<IndexStats> {
        let scan_schema = schema.clone();
        let scanned = tokio::task::spawn_blocking(move || scan_collections(&scan_schema))
            .await
            .map_err(|e| IndexError::Scan(e.to_string()))??;

        let mut state = self.state.write();
        let mut stats = IndexStats::default();

        for (path, doc) in &scanned {
            match state.documents.get(path) {
                None => stats.added += 1,
                Some(existing) if existing.checksum != doc.checksum => stats.updated += 1,
                Some(existing) if existing.collection != doc.collection => stats.updated += 1,
                Some(_) => stats.unchanged += 1,
            }
        }
        stats.pruned = state
            .documents
            .keys()
            .filter(|path| !scanned.contains_key(*path))
            .count();

        state.documents = scanned;
        state.schema = Some(schema.clone());

        crate::debug_event!(
            "index",
            "reindexed",
            "{} added, {} updated, {} unchanged, {} pruned",
            stats.added,
            stats.updated,
            stats.unchanged,
            stats.pruned
        );
        Ok(stats)
    }

    async fn index_content_by_paths(&self, paths: &[String]) -> IndexResult<()> {
        let schema = self.schema()?;

        let mut loaded = Vec::with_capacity(paths.len());
        for path in paths {
            let collection = schema
                .collection_for(path)
                .ok_or_else(|| IndexError::UnknownCollection { path: path.clone() })?;
            let absolute = schema.content_root.join(path);
            let raw = tokio::fs::read(&absolute)
                .await
                .map_err(|source| IndexError::FileRead {
                    path: path.clone(),
                    source,
                })?;
            loaded.push(load_document(
                path.clone(),
                &collection.name,
                collection.format(),
                &raw,
            )?);
        }

        let mut state = self.state.write();
        for doc in loaded {
            crate::debug_event!("index", "upserted", "{}", doc.path);
            state.documents.insert(doc.path.clone(), doc);
        }
        Ok(())
    }

    async fn delete_content_by_paths(&self, paths: &[String]) -> IndexResult<()> {
        let mut state = self.state.write();
        for path in paths {
            if state.documents.remove(path).is_some() {
                crate::debug_event!("index", "deleted", "{path}");
            } else {
                crate::debug_event!("index", "delete skipped", "{path} was not indexed");
            }
        }
        Ok(())
    }

    fn get(&self, path: &str) -> Option<ContentDocument> {
        self.state.read().documents.get(path).cloned()
    }

    fn list(&self, collection: Option<&str>) -> Vec<ContentDocument> {
        self.state
            .read()
            .documents
            .values()
            .filter(|doc| collection.is_none_or(|name| doc.collection == name))
            .cloned()
            .collect()
    }

    fn document_count(&self) -> usize {
        self.state.read().documents.len()
    }
}

/// Walk every collection directory and load matching files.
fn scan_collections(schema: &SchemaPair) -> IndexResult<BTreeMap<String, ContentDocument>> {
    let mut documents = BTreeMap::new();

    for collection in &schema.collections {
        let rel = collection.normalized_path();
        let base: PathBuf = if rel.is_empty() || rel == "." {
            schema.content_root.clone()
        } else {
            schema.content_root.join(&rel)
        };
        if !base.is_dir() {
            crate::debug_event!(
                "index",
                "collection missing",
                "{} ({})",
                collection.name,
                base.display()
            );
            continue;
        }

        for entry in WalkDir::new(&base)
            .follow_links(true)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
        {
            let Some(relative) = to_content_relative(&schema.content_root, entry.path()) else {
                continue;
            };
            if !collection.contains(&relative) || documents.contains_key(&relative) {
                continue;
            }
            let raw = std::fs::read(entry.path()).map_err(|source| IndexError::FileRead {
                path: relative.clone(),
                source,
            })?;
            let doc = load_document(relative.clone(), &collection.name, collection.format(), &raw)?;
            documents.insert(relative, doc);
        }
    }

    Ok(documents)
}

fn load_document(
    path: String,
    collection: &str,
    format: &str,
    raw: &[u8],
) -> IndexResult<ContentDocument> {
    let text = String::from_utf8_lossy(raw);
    let parse_error = |reason: String| IndexError::Parse {
        path: path.clone(),
        format: format.to_string(),
        reason,
    };

    let data = match format {
        "json" => serde_json::from_str(&text).map_err(|e| parse_error(e.to_string()))?,
        "toml" => {
            let value: toml::Table = toml::from_str(&text).map_err(|e| parse_error(e.to_string()))?;
            serde_json::to_value(value).map_err(|e| parse_error(e.to_string()))?
        }
        _ => markdown_data(&text),
    };

    Ok(ContentDocument {
        checksum: checksum(raw),
        path,
        collection: collection.to_string(),
        format: format.to_string(),
        data,
    })
}

/// Split a markdown file into front matter and body.
fn markdown_data(text: &str) -> Value {
    let (frontmatter, body) = split_frontmatter(text);
    json!({
        "frontmatter": frontmatter,
        "body": body,
    })
}

fn split_frontmatter(text: &str) -> (Option<&str>, &str) {
    for fence in ["---", "+++"] {
        let Some(rest) = text.strip_prefix(fence) else {
            continue;
        };
        let Some(rest) = rest.strip_prefix('\n').or_else(|| rest.strip_prefix("\r\n")) else {
            continue;
        };
        let closing = format!("\n{fence}");
        if let Some(end) = rest.find(&closing) {
            let front = &rest[..end];
            let after = &rest[end + closing.len()..];
            let body = after.trim_start_matches(['\r', '\n']);
            return (Some(front), body);
        }
    }
    (None, text)
}

fn checksum(raw: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw);
    format!("{:x}", hasher.finalize())
}
