//! Dev command: initial build, HTTP server, config and content watching.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::cli::DevArgs;
use crate::codegen::ClientCodegen;
use crate::config::{CliOverrides, ConfigManager};
use crate::error::{DevError, DevResult};
use crate::pipeline::{RebuildPipeline, RebuildResult, RunTrigger};
use crate::server::{self, ChangeHook, ConfigFolderWatcher};
use crate::watcher::{ConfigWatchSession, ContentWatchSession};

/// Both watch sessions plus the folder watcher feeding the config session.
pub struct WatchSessions {
    _folder: ConfigFolderWatcher,
    config: ConfigWatchSession,
    content: ContentWatchSession,
}

impl WatchSessions {
    /// Attach the config session to the server hook, then start content
    /// watching with the globs of `result`'s generation.
    pub fn start(pipeline: &Arc<RebuildPipeline>, result: &RebuildResult) -> DevResult<Self> {
        let hook = ChangeHook::default();
        let folder = ConfigFolderWatcher::start(&result.paths.tina_folder, hook.clone())?;

        let collections = &result.settings.collections;
        let mut config = ConfigWatchSession::create(pipeline.clone())
            .with_watched_collections(collections.iter().map(|c| c.name.clone()));
        config.start(&hook)?;

        let globs = result.paths.collection_globs(collections);
        let mut content =
            ContentWatchSession::create(result.index.clone(), result.paths.content_root.clone(), globs);
        content.watch_fs()?;

        Ok(Self {
            _folder: folder,
            config,
            content,
        })
    }

    pub async fn dispose(self) {
        self.config.dispose().await;
        self.content.dispose().await;
    }
}

/// Run the dev command until Ctrl+C.
pub async fn run(root: PathBuf, args: DevArgs) -> DevResult<()> {
    if args.no_telemetry {
        crate::debug_event!("dev", "telemetry disabled");
    }

    let config = ConfigManager::new(root).with_overrides(CliOverrides { port: args.port });
    let pipeline = Arc::new(
        RebuildPipeline::builder(config)
            .codegen(ClientCodegen::new(args.no_client_build))
            .build(),
    );

    let result = pipeline.run(RunTrigger::Initial).await?;

    let server_config = &result.settings.server;
    let listener = server::bind(&format!("{}:{}", server_config.host, server_config.port)).await?;
    let shutdown = CancellationToken::new();
    let server_task = tokio::spawn(server::serve(listener, pipeline.clone(), shutdown.clone()));
    crate::log_event!("dev", "api", "{}", result.api_url);

    let sessions = if args.no_watch {
        crate::log_event!("dev", "watching disabled");
        None
    } else {
        Some(WatchSessions::start(&pipeline, &result)?)
    };

    let child = args
        .command
        .as_deref()
        .map(|command| spawn_command(command, &pipeline));

    shutdown_signal().await;
    crate::log_event!("dev", "shutting down");

    if let Some(child) = child {
        child.abort();
    }
    if let Some(sessions) = sessions {
        sessions.dispose().await;
    }
    shutdown.cancel();
    match server_task.await {
        Ok(result) => result,
        Err(e) => Err(DevError::Server(e.to_string())),
    }
}

/// Run `command` through the shell with the project root as working dir.
fn spawn_command(command: &str, pipeline: &RebuildPipeline) -> tokio::task::JoinHandle<()> {
    let command = command.to_string();
    let root = pipeline.config().root_path().to_path_buf();
    tokio::spawn(async move {
        crate::log_event!("dev", "running", "{command}");
        let status = Command::new(shell())
            .arg(shell_flag())
            .arg(&command)
            .current_dir(&root)
            .kill_on_drop(true)
            .status()
            .await;
        match status {
            Ok(status) if status.success() => crate::log_event!("dev", "command exited", "{status}"),
            Ok(status) => tracing::warn!("[dev] command `{command}` exited with {status}"),
            Err(e) => tracing::error!("[dev] failed to run `{command}`: {e}"),
        }
    })
}

#[cfg(windows)]
fn shell() -> &'static str {
    "cmd"
}

#[cfg(windows)]
fn shell_flag() -> &'static str {
    "/C"
}

#[cfg(not(windows))]
fn shell() -> &'static str {
    "sh"
}

#[cfg(not(windows))]
fn shell_flag() -> &'static str {
    "-c"
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("[dev] failed to listen for ctrl+c: {e}");
        std::future::pending::<()>().await;
    }
}
