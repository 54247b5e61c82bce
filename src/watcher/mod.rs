//! Watch sessions driving the dev server.
//!
//! # Architecture
//!
//! ```text
//! ConfigFolderWatcher ──► ChangeHook ──► ConfigWatchSession ──► RebuildPipeline::run
//!
//! NotifySource ──► mpsc<FsEvent> ──► ContentWatchSession ──► IndexHandle (single path)
//! ```
//!
//! The two sessions are independent. The index's writer gate orders a full
//! reindex from the pipeline against single-path updates from content events.

mod config;
mod content;
mod error;
mod event;
mod source;

pub use config::{ConfigOutcome, ConfigWatchSession};
pub use content::{ContentOutcome, ContentWatchSession};
pub use error::WatchError;
pub use event::{ChangeKind, ContentChangeEvent, FsEvent};
pub use source::{NotifySource, translate};
