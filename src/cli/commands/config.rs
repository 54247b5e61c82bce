//! Config command: print the resolved settings as TOML.

use std::path::PathBuf;

use crate::config::ConfigManager;
use crate::error::{DevError, DevResult};

pub fn run(root: PathBuf) -> DevResult<()> {
    let manager = ConfigManager::new(root);
    let settings = manager.process_config()?;
    let rendered = toml::to_string_pretty(&settings).map_err(|e| DevError::config(e.to_string()))?;

    println!("# {}", manager.config_file().display());
    println!("{rendered}");
    Ok(())
}
