//! The rebuild pipeline: validate config, build schema, write artifacts,
//! generate the client, reindex content.
//!
//! Runs are serialized. A run triggered while another is in flight waits for
//! it to finish, so steps of two generations never interleave and a stale
//! full reindex can never land after a fresher incremental update it raced.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::RwLock;
use tokio::sync::Mutex;

use crate::artifacts::{ArtifactSnapshot, ArtifactWriter};
use crate::codegen::{ClientCodegen, Codegen};
use crate::config::{ConfigManager, Settings};
use crate::error::{DevError, DevResult};
use crate::index::{IndexHandle, IndexStats, MemoryIndex, SchemaPair};
use crate::paths::ResolvedPaths;
use crate::schema::{CollectionSchemaBuilder, SchemaBuilder};

/// What started a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunTrigger {
    /// Process startup. Failures are fatal to the caller.
    Initial,
    /// A watched configuration change. Failures leave the last generation in place.
    Watch,
}

impl RunTrigger {
    /// Whether the pipeline logs a failed run itself. Initial failures are
    /// returned to the caller, which reports them once.
    pub fn reports_failure(self) -> bool {
        self == RunTrigger::Watch
    }
}

/// Output of one successful run. Replaced, never mutated, by the next.
#[derive(Debug)]
pub struct RebuildResult {
    pub api_url: String,
    pub index: IndexHandle,
    pub generation: u64,
    pub settings: Arc<Settings>,
    pub paths: ResolvedPaths,
    pub snapshot: Arc<ArtifactSnapshot>,
    pub index_stats: IndexStats,
}

pub struct RebuildPipeline {
    config: ConfigManager,
    schema_builder: Arc<dyn SchemaBuilder>,
    codegen: Arc<dyn Codegen>,
    index: IndexHandle,
    /// Held for the whole duration of a run.
    run_lock: Mutex<()>,
    generation: AtomicU64,
    current: RwLock<Option<Arc<RebuildResult>>>,
}

impl RebuildPipeline {
    pub fn builder(config: ConfigManager) -> RebuildPipelineBuilder {
        RebuildPipelineBuilder::new(config)
    }

    pub fn config(&self) -> &ConfigManager {
        &self.config
    }

    pub fn index(&self) -> &IndexHandle {
        &self.index
    }

    /// The last successful generation, if any.
    ///
    /// Never waits on an in-flight run.
    pub fn current(&self) -> Option<Arc<RebuildResult>> {
        self.current.read().clone()
    }

    /// Check whether a run currently holds the pipeline.
    pub fn is_running(&self) -> bool {
        self.run_lock.try_lock().is_err()
    }

    /// Run one generation. Waits for any in-flight run first.
    pub async fn run(&self, trigger: RunTrigger) -> DevResult<Arc<RebuildResult>> {
        let _running = self.run_lock.lock().await;
        let started = Instant::now();
        crate::debug_event!("pipeline", "started", "{trigger:?}");

        match self.run_steps().await {
            Ok(result) => {
                let result = Arc::new(result);
                *self.current.write() = Some(result.clone());
                crate::log_event!(
                    "pipeline",
                    "generation ready",
                    "#{} in {:.0?}, {} documents",
                    result.generation,
                    started.elapsed(),
                    result.index_stats.total()
                );
                Ok(result)
            }
            Err(e) => {
                if trigger.reports_failure() {
                    tracing::error!("[pipeline] {}: {e}", e.kind());
                    if let Some(current) = self.current() {
                        tracing::warn!(
                            "[pipeline] still serving generation #{}",
                            current.generation
                        );
                    }
                }
                Err(e)
            }
        }
    }

    async fn run_steps(&self) -> DevResult<RebuildResult> {
        // 1. configuration
        let settings = self.config.process_config()?;
        let paths = self.config.resolve_paths(&settings);

        // 2. schema
        let built = self
            .schema_builder
            .build(&self.index, &settings)
            .await
            .map_err(|e| e.in_stage("schema"))?;

        // 3. artifacts
        let writer = ArtifactWriter::new(paths.clone());
        writer.write_generated(&built).await?;
        let snapshot = if settings.build.legacy_output {
            crate::debug_event!("pipeline", "legacy output", "skipping lock document");
            built.snapshot()
        } else {
            let snapshot = writer.read_generated().await?;
            writer.write_lock(&snapshot).await?;
            snapshot
        };

        // 4. codegen
        let output = self
            .codegen
            .generate(&built, &settings, &paths)
            .await
            .map_err(|e| e.in_stage("codegen"))?;

        // 5. full reindex
        let schema_pair = SchemaPair {
            content_root: paths.content_root.clone(),
            collections: settings.collections.clone(),
            graphql: Arc::new(built.graphql),
        };
        let index_stats = self.index.index_content(&schema_pair).await?;

        Ok(RebuildResult {
            api_url: output.api_url,
            index: self.index.clone(),
            generation: self.generation.fetch_add(1, Ordering::SeqCst) + 1,
            settings: Arc::new(settings),
            paths,
            snapshot: Arc::new(snapshot),
            index_stats,
        })
    }
}

/// Builder for a [`RebuildPipeline`]. Unset collaborators use the defaults.
pub struct RebuildPipelineBuilder {
    config: ConfigManager,
    schema_builder: Option<Arc<dyn SchemaBuilder>>,
    codegen: Option<Arc<dyn Codegen>>,
    index: Option<IndexHandle>,
}

impl RebuildPipelineBuilder {
    pub fn new(config: ConfigManager) -> Self {
        Self {
            config,
            schema_builder: None,
            codegen: None,
            index: None,
        }
    }

    pub fn schema_builder(mut self, builder: impl SchemaBuilder + 'static) -> Self {
        self.schema_builder = Some(Arc::new(builder));
        self
    }

    pub fn codegen(mut self, codegen: impl Codegen + 'static) -> Self {
        self.codegen = Some(Arc::new(codegen));
        self
    }

    pub fn index(mut self, index: IndexHandle) -> Self {
        self.index = Some(index);
        self
    }

    pub fn build(self) -> RebuildPipeline {
        RebuildPipeline {
            config: self.config,
            schema_builder: self
                .schema_builder
                .unwrap_or_else(|| Arc::new(CollectionSchemaBuilder)),
            codegen: self
                .codegen
                .unwrap_or_else(|| Arc::new(ClientCodegen::default())),
            index: self
                .index
                .unwrap_or_else(|| IndexHandle::new(MemoryIndex::new())),
            run_lock: Mutex::new(()),
            generation: AtomicU64::new(0),
            current: RwLock::new(None),
        }
    }
}

/// Convenience for callers that only need the error category.
pub fn is_config_error(err: &DevError) -> bool {
    matches!(err, DevError::Config { .. } | DevError::ConfigNotFound { .. })
}
