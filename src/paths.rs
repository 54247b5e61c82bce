//! Canonical filesystem locations for one project root.

use std::path::{Component, Path, PathBuf};

use crate::config::{CollectionConfig, Settings};

/// Folder holding configuration and generated output.
pub const TINA_FOLDER: &str = "tina";
pub const CONFIG_FILE: &str = "config.toml";
/// Marker segment for everything the pipeline writes itself.
pub const GENERATED_FOLDER: &str = "__generated__";
pub const LOCK_FILE: &str = "tina-lock.json";

pub const SCHEMA_JSON: &str = "_schema.json";
pub const LOOKUP_JSON: &str = "_lookup.json";
pub const GRAPHQL_JSON: &str = "_graphql.json";

/// All paths the pipeline reads from or writes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    pub root: PathBuf,
    pub tina_folder: PathBuf,
    pub config_file: PathBuf,
    pub generated_folder: PathBuf,
    pub lock_file: PathBuf,
    pub content_root: PathBuf,
    pub output_folder: PathBuf,
}

impl ResolvedPaths {
    pub fn resolve(root: &Path, settings: &Settings) -> Self {
        let tina_folder = root.join(TINA_FOLDER);
        let content_root = if settings.content_root.is_absolute() {
            settings.content_root.clone()
        } else {
            normalize(&root.join(&settings.content_root))
        };

        Self {
            root: root.to_path_buf(),
            config_file: tina_folder.join(CONFIG_FILE),
            generated_folder: tina_folder.join(GENERATED_FOLDER),
            lock_file: tina_folder.join(LOCK_FILE),
            output_folder: root.join(&settings.build.output_folder),
            tina_folder,
            content_root,
        }
    }

    pub fn config_file_for(root: &Path) -> PathBuf {
        root.join(TINA_FOLDER).join(CONFIG_FILE)
    }

    pub fn schema_json(&self) -> PathBuf {
        self.generated_folder.join(SCHEMA_JSON)
    }

    pub fn lookup_json(&self) -> PathBuf {
        self.generated_folder.join(LOOKUP_JSON)
    }

    pub fn graphql_json(&self) -> PathBuf {
        self.generated_folder.join(GRAPHQL_JSON)
    }

    /// One glob per configured collection.
    pub fn collection_globs(&self, collections: &[CollectionConfig]) -> Vec<CollectionGlob> {
        collections
            .iter()
            .map(|c| CollectionGlob::new(&self.content_root, c))
            .collect()
    }
}

/// Absolute glob covering every file of one collection.
#[derive(Debug, Clone)]
pub struct CollectionGlob {
    pub collection_name: String,
    pub glob_pattern: String,
    /// Directory the glob is rooted at, used to register the watch.
    pub base_dir: PathBuf,
    pattern: Option<glob::Pattern>,
}

impl CollectionGlob {
    pub fn new(content_root: &Path, collection: &CollectionConfig) -> Self {
        let rel = collection.normalized_path();
        let base_dir = if rel.is_empty() || rel == "." {
            content_root.to_path_buf()
        } else {
            content_root.join(&rel)
        };
        let glob_pattern = format!(
            "{}/**/*.{}",
            glob::Pattern::escape(base_dir.to_string_lossy().trim_end_matches('/')),
            collection.format()
        );
        let pattern = match glob::Pattern::new(&glob_pattern) {
            Ok(p) => Some(p),
            Err(e) => {
                tracing::warn!("[paths] invalid glob {glob_pattern}: {e}");
                None
            }
        };

        Self {
            collection_name: collection.name.clone(),
            glob_pattern,
            base_dir,
            pattern,
        }
    }

    pub fn matches(&self, path: &Path) -> bool {
        self.pattern
            .as_ref()
            .is_some_and(|p| p.matches_path(path))
    }
}

/// Prefix of the staging files used for atomic writes.
pub const STAGING_PREFIX: &str = ".tmp";

/// Check whether a path is something the pipeline writes itself: anything
/// under the generated folder, the lock document, or a staging file.
pub fn is_generated_path(path: &Path) -> bool {
    let in_generated = path
        .components()
        .any(|c| matches!(c, Component::Normal(name) if name == GENERATED_FOLDER));
    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    in_generated || file_name == LOCK_FILE || file_name.starts_with(STAGING_PREFIX)
}

/// Translate an absolute path into a `/`-separated path relative to `content_root`.
///
/// Returns `None` for paths outside the content root.
pub fn to_content_relative(content_root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(content_root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Lexically remove `.` components.
fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}
