//! Build command: one pipeline generation without server or watchers.

use std::path::PathBuf;

use crate::codegen::ClientCodegen;
use crate::config::ConfigManager;
use crate::error::DevResult;
use crate::pipeline::{RebuildPipeline, RunTrigger};

pub async fn run(root: PathBuf, no_client_build: bool) -> DevResult<()> {
    let pipeline = RebuildPipeline::builder(ConfigManager::new(root))
        .codegen(ClientCodegen::new(no_client_build))
        .build();
    let result = pipeline.run(RunTrigger::Initial).await?;

    println!("Built generation #{}", result.generation);
    println!("  API URL:     {}", result.api_url);
    println!("  Collections: {}", result.settings.collections.len());
    println!(
        "  Documents:   {} ({} pruned)",
        result.index_stats.total(),
        result.index_stats.pruned
    );
    println!("  Artifacts:   {}", result.paths.generated_folder.display());
    if !result.settings.build.legacy_output {
        println!("  Lock:        {}", result.paths.lock_file.display());
    }
    Ok(())
}
