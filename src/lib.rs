//! Watch-driven rebuild and incremental reindex for a content dev server.
//!
//! A [`RebuildPipeline`] turns `tina/config.toml` into a schema, generated
//! artifacts, a client and a populated content index. The dev server serves
//! the last successful generation while two watch sessions keep it current:
//! configuration edits rerun the pipeline, content edits update single paths.

pub mod artifacts;
pub mod cli;
pub mod codegen;
pub mod config;
pub mod error;
pub mod index;
pub mod logging;
pub mod paths;
pub mod pipeline;
pub mod schema;
pub mod server;
pub mod watcher;

pub use config::{ConfigManager, Settings};
pub use error::{DevError, DevResult};
pub use index::{ContentIndex, IndexHandle, MemoryIndex, SchemaPair};
pub use pipeline::{RebuildPipeline, RebuildResult, RunTrigger};
