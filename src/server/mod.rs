//! Dev server: HTTP surface plus the change hook fed by its config-folder watcher.

mod hook;
mod http;

pub use hook::{ChangeHook, ConfigFolderWatcher, ServerEvent, translate};
pub use http::{AppState, ListQuery, bind, router, serve};
