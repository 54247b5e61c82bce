//! Persistence of derived artifacts and the lock document.
//!
//! Every write goes to a temporary file in the destination directory and is
//! renamed into place, so readers only ever see a complete document.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DevError, DevResult};
use crate::paths::{ResolvedPaths, STAGING_PREFIX};
use crate::schema::BuiltSchema;

/// The three derived structures of one generation, written as one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArtifactSnapshot {
    pub schema: Value,
    pub lookup: Value,
    pub graphql: Value,
}

/// Writes artifacts under the resolved generated folder and lock path.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    paths: ResolvedPaths,
}

impl ArtifactWriter {
    pub fn new(paths: ResolvedPaths) -> Self {
        Self { paths }
    }

    pub fn lock_path(&self) -> &Path {
        &self.paths.lock_file
    }

    /// Write `_schema.json`, `_lookup.json` and `_graphql.json`.
    pub async fn write_generated(&self, built: &BuiltSchema) -> DevResult<()> {
        let files = [
            (self.paths.schema_json(), &built.schema),
            (self.paths.lookup_json(), &built.lookup),
            (self.paths.graphql_json(), &built.graphql),
        ];
        for (path, value) in files {
            let bytes = serde_json::to_vec_pretty(value)?;
            write_atomic(path, bytes).await?;
        }
        Ok(())
    }

    /// Read the three generated files straight from disk.
    ///
    /// No caching: the result always reflects the most recent
    /// [`write_generated`](Self::write_generated).
    pub async fn read_generated(&self) -> DevResult<ArtifactSnapshot> {
        Ok(ArtifactSnapshot {
            schema: read_json(&self.paths.schema_json()).await?,
            lookup: read_json(&self.paths.lookup_json()).await?,
            graphql: read_json(&self.paths.graphql_json()).await?,
        })
    }

    /// Overwrite the lock document with `snapshot`.
    pub async fn write_lock(&self, snapshot: &ArtifactSnapshot) -> DevResult<()> {
        let mut bytes = serde_json::to_vec_pretty(snapshot)?;
        bytes.push(b'\n');
        write_atomic(self.paths.lock_file.clone(), bytes).await
    }

    pub async fn read_lock(&self) -> DevResult<ArtifactSnapshot> {
        let bytes = tokio::fs::read(&self.paths.lock_file)
            .await
            .map_err(|e| DevError::io(&self.paths.lock_file, e))?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

async fn read_json(path: &Path) -> DevResult<Value> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| DevError::io(path, e))?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Replace `path` with `bytes` via temp file and rename.
pub async fn write_atomic(path: PathBuf, bytes: Vec<u8>) -> DevResult<()> {
    tokio::task::spawn_blocking(move || write_atomic_blocking(&path, &bytes))
        .await
        .map_err(|e| DevError::io("<artifact writer>", std::io::Error::other(e.to_string())))?
}

fn write_atomic_blocking(path: &Path, bytes: &[u8]) -> DevResult<()> {
    let parent = path
        .parent()
        .ok_or_else(|| DevError::io(path, std::io::Error::other("path has no parent")))?;
    std::fs::create_dir_all(parent).map_err(|e| DevError::io(parent, e))?;

    let mut tmp = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempfile_in(parent)
        .map_err(|e| DevError::io(parent, e))?;
    tmp.write_all(bytes).map_err(|e| DevError::io(path, e))?;
    tmp.as_file().sync_all().map_err(|e| DevError::io(path, e))?;
    tmp.persist(path).map_err(|e| DevError::io(path, e.error))?;
    Ok(())
}
