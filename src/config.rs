//! Configuration for the content dev server.
//!
//! Settings are layered the same way on every pipeline run:
//! - Default values
//! - `tina/config.toml` under the project root
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `TINA_` and use double underscores
//! to separate nested levels:
//! - `TINA_SERVER__PORT=4002` sets `server.port`
//! - `TINA_BUILD__LEGACY_OUTPUT=true` sets `build.legacy_output`
//! - `TINA_CLOUD__BRANCH=staging` sets `cloud.branch`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::error::{DevError, DevResult};
use crate::paths::ResolvedPaths;

/// File formats a collection may store its documents in.
pub const SUPPORTED_FORMATS: &[&str] = &["md", "mdx", "markdown", "json", "toml"];

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    /// Directory collection paths are resolved against, relative to the root.
    #[serde(default = "default_content_root")]
    pub content_root: PathBuf,

    /// Content collections, in declaration order.
    #[serde(default)]
    pub collections: Vec<CollectionConfig>,

    #[serde(default)]
    pub build: BuildConfig,

    #[serde(default)]
    pub server: ServerConfig,

    /// Hosted content API settings. Local mode when `client_id` is unset.
    #[serde(default)]
    pub cloud: CloudConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CollectionConfig {
    /// Identifier used in the schema and lookup.
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Directory under the content root holding this collection's files.
    pub path: String,

    /// File extension without the dot. Defaults to `md`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    #[serde(default)]
    pub fields: Vec<FieldConfig>,
}

impl CollectionConfig {
    pub fn format(&self) -> &str {
        self.format.as_deref().unwrap_or("md")
    }

    /// Collection path with `./` and trailing separators removed.
    pub fn normalized_path(&self) -> String {
        let trimmed = self.path.trim_start_matches("./").trim_end_matches('/');
        trimmed.replace('\\', "/")
    }

    /// Check whether a content-relative path belongs to this collection.
    pub fn contains(&self, relative: &str) -> bool {
        let base = self.normalized_path();
        let in_dir = if base.is_empty() || base == "." {
            true
        } else {
            relative
                .strip_prefix(&base)
                .is_some_and(|rest| rest.starts_with('/'))
        };
        in_dir
            && Path::new(relative)
                .extension()
                .is_some_and(|ext| ext == self.format())
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct FieldConfig {
    pub name: String,

    #[serde(rename = "type")]
    pub field_type: FieldType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(default)]
    pub required: bool,

    #[serde(default)]
    pub list: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Datetime,
    RichText,
    Image,
    Reference,
}

impl FieldType {
    /// GraphQL scalar name for this field type.
    pub fn graphql_type(self) -> &'static str {
        match self {
            FieldType::String | FieldType::Image | FieldType::Reference => "String",
            FieldType::Number => "Float",
            FieldType::Boolean => "Boolean",
            FieldType::Datetime => "String",
            FieldType::RichText => "JSON",
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct BuildConfig {
    /// Public output folder for the admin shell, relative to the root.
    #[serde(default = "default_output_folder")]
    pub output_folder: String,

    /// Old layout: separate artifact files only, no lock document.
    #[serde(default)]
    pub legacy_output: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CloudConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    #[serde(default = "default_branch")]
    pub branch: String,

    #[serde(default = "default_content_api_url")]
    pub content_api_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Default level for all modules.
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-module level overrides.
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_content_root() -> PathBuf {
    PathBuf::from(".")
}
fn default_output_folder() -> String {
    "admin".to_string()
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    4001
}
fn default_branch() -> String {
    "main".to_string()
}
fn default_content_api_url() -> String {
    "https://content.tinajs.io".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            content_root: default_content_root(),
            collections: Vec::new(),
            build: BuildConfig::default(),
            server: ServerConfig::default(),
            cloud: CloudConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            output_folder: default_output_folder(),
            legacy_output: false,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            branch: default_branch(),
            content_api_url: default_content_api_url(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl Settings {
    /// Load configuration from a specific file, with env overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            .merge(
                Env::prefixed("TINA_").map(|key| key.as_str().to_lowercase().replace("__", ".").into()),
            )
            .extract()
            .map_err(Box::new)
    }

    /// Check the loaded configuration for errors a schema build cannot recover from.
    pub fn validate(&self) -> DevResult<()> {
        let mut seen = HashSet::new();

        for collection in &self.collections {
            let name = collection.name.as_str();
            if name.is_empty() {
                return Err(DevError::config("collection name must not be empty"));
            }
            if !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
                || name.starts_with(|c: char| c.is_ascii_digit())
            {
                return Err(DevError::config(format!(
                    "collection name '{name}' must be alphanumeric or '_' and not start with a digit"
                )));
            }
            if !seen.insert(name) {
                return Err(DevError::config(format!(
                    "duplicate collection name '{name}'"
                )));
            }

            let path = collection.normalized_path();
            if Path::new(&path).is_absolute() || path.split('/').any(|part| part == "..") {
                return Err(DevError::config(format!(
                    "collection '{name}' path '{}' must be relative to the content root",
                    collection.path
                )));
            }

            let format = collection.format();
            if !SUPPORTED_FORMATS.contains(&format) {
                return Err(DevError::config(format!(
                    "collection '{name}' has unsupported format '{format}' (expected one of {})",
                    SUPPORTED_FORMATS.join(", ")
                )));
            }

            let mut field_names = HashSet::new();
            for field in &collection.fields {
                if field.name.is_empty() {
                    return Err(DevError::config(format!(
                        "collection '{name}' has a field with an empty name"
                    )));
                }
                if !field_names.insert(field.name.as_str()) {
                    return Err(DevError::config(format!(
                        "collection '{name}' declares field '{}' twice",
                        field.name
                    )));
                }
            }
        }

        if self.collections.is_empty() {
            tracing::warn!("[config] no collections configured, content index will be empty");
        }

        Ok(())
    }
}

/// Resolves and validates configuration for one project root.
///
/// Every call to [`ConfigManager::process_config`] re-reads the file from disk,
/// so a pipeline run always sees the latest edit.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    root_path: PathBuf,
    overrides: CliOverrides,
}

/// Values from the command line that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub port: Option<u16>,
}

impl ConfigManager {
    /// A relative root is resolved against the working directory. Watch
    /// events carry absolute paths, so every path derived from the root must
    /// be absolute too.
    pub fn new(root_path: impl Into<PathBuf>) -> Self {
        let root_path = root_path.into();
        Self {
            root_path: std::path::absolute(&root_path).unwrap_or(root_path),
            overrides: CliOverrides::default(),
        }
    }

    pub fn with_overrides(mut self, overrides: CliOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    /// Location of the config file, independent of its contents.
    pub fn config_file(&self) -> PathBuf {
        ResolvedPaths::config_file_for(&self.root_path)
    }

    /// Load, apply overrides and validate.
    pub fn process_config(&self) -> DevResult<Settings> {
        let config_path = self.config_file();
        if !config_path.exists() {
            return Err(DevError::ConfigNotFound { path: config_path });
        }

        let mut settings = Settings::load_from(&config_path)
            .map_err(|e| DevError::config(format!("{}: {e}", config_path.display())))?;

        if let Some(port) = self.overrides.port {
            settings.server.port = port;
        }

        settings.validate()?;
        Ok(settings)
    }

    pub fn resolve_paths(&self, settings: &Settings) -> ResolvedPaths {
        ResolvedPaths::resolve(&self.root_path, settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, body: &str) -> ConfigManager {
        let tina = dir.path().join("tina");
        std::fs::create_dir_all(&tina).unwrap();
        std::fs::write(tina.join("config.toml"), body).unwrap();
        ConfigManager::new(dir.path())
    }

    #[test]
    fn test_relative_root_is_made_absolute() {
        let manager = ConfigManager::new("site");
        let cwd = std::env::current_dir().unwrap();
        assert!(manager.root_path().is_absolute());
        assert_eq!(manager.root_path(), cwd.join("site"));
        assert_eq!(manager.config_file(), cwd.join("site/tina/config.toml"));
    }

    #[test]
    fn test_process_config_defaults() {
        let dir = TempDir::new().unwrap();
        let manager = write_config(
            &dir,
            r#"
[[collections]]
name = "posts"
path = "content/posts"
"#,
        );

        let settings = manager.process_config().unwrap();
        assert_eq!(settings.collections.len(), 1);
        assert_eq!(settings.collections[0].format(), "md");
        assert_eq!(settings.server.port, 4001);
        assert!(!settings.build.legacy_output);
    }

    #[test]
    fn test_port_override() {
        let dir = TempDir::new().unwrap();
        let manager = write_config(&dir, "").with_overrides(CliOverrides { port: Some(9000) });
        assert_eq!(manager.process_config().unwrap().server.port, 9000);
    }

    #[test]
    fn test_missing_config() {
        let dir = TempDir::new().unwrap();
        let manager = ConfigManager::new(dir.path());
        assert!(matches!(
            manager.process_config(),
            Err(DevError::ConfigNotFound { .. })
        ));
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let dir = TempDir::new().unwrap();
        let manager = write_config(&dir, "[[collections]\nname = ");
        let err = manager.process_config().unwrap_err();
        assert_eq!(err.kind(), "ConfigError");
    }

    #[test]
    fn test_validation_rejects_duplicates_and_bad_formats() {
        let dir = TempDir::new().unwrap();
        let manager = write_config(
            &dir,
            r#"
[[collections]]
name = "posts"
path = "content/posts"

[[collections]]
name = "posts"
path = "content/other"
"#,
        );
        let err = manager.process_config().unwrap_err();
        assert!(err.to_string().contains("duplicate collection name"));

        let manager = write_config(
            &dir,
            r#"
[[collections]]
name = "posts"
path = "content/posts"
format = "docx"
"#,
        );
        let err = manager.process_config().unwrap_err();
        assert!(err.to_string().contains("unsupported format"));
    }

    #[test]
    fn test_validation_rejects_escaping_paths() {
        let settings = Settings {
            collections: vec![CollectionConfig {
                name: "posts".to_string(),
                label: None,
                path: "../outside".to_string(),
                format: None,
                fields: Vec::new(),
            }],
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_collection_contains() {
        let collection = CollectionConfig {
            name: "posts".to_string(),
            label: None,
            path: "./content/posts/".to_string(),
            format: Some("mdx".to_string()),
            fields: Vec::new(),
        };

        assert!(collection.contains("content/posts/a.mdx"));
        assert!(collection.contains("content/posts/nested/b.mdx"));
        assert!(!collection.contains("content/posts/a.md"));
        assert!(!collection.contains("content/postsx/a.mdx"));
        assert!(!collection.contains("content/pages/a.mdx"));
    }

    #[test]
    fn test_field_types_parse() {
        let settings: Settings = toml::from_str(
            r#"
[[collections]]
name = "posts"
path = "content/posts"
fields = [
  { name = "title", type = "string", required = true },
  { name = "body", type = "rich-text" },
]
"#,
        )
        .unwrap();
        let fields = &settings.collections[0].fields;
        assert_eq!(fields[0].field_type, FieldType::String);
        assert!(fields[0].required);
        assert_eq!(fields[1].field_type.graphql_type(), "JSON");
    }
}
