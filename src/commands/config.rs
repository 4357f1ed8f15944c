//! Configuration command handlers
//!
//! `tubeforge config show|path|reset|import`

use anyhow::Context;
use std::path::PathBuf;
use tracing::info;

use crate::core::AppConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigAction {
    Show,
    Path,
    Reset,
    Import { file: PathBuf, merge: bool },
}

pub fn run_config(config: &AppConfig, action: ConfigAction) -> anyhow::Result<i32> {
    match action {
        ConfigAction::Show => {
            println!("{}", config.export()?);
        }
        ConfigAction::Path => {
            let path = AppConfig::get_config_path()?;
            println!("{}", path.display());
        }
        ConfigAction::Reset => {
            info!("Resetting configuration to defaults");
            let defaults = AppConfig::reset().context("Failed to reset configuration")?;
            println!("{}", defaults.export()?);
        }
        ConfigAction::Import { file, merge } => {
            let json = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let imported = if merge {
                let merged = merged_with(config, &json)?;
                merged.save()?;
                merged
            } else {
                AppConfig::import(&json)?
            };
            info!("Imported configuration from {}", file.display());
            println!("{}", imported.export()?);
        }
    }
    Ok(0)
}

/// Overlay an imported document on the running configuration
pub fn merged_with(current: &AppConfig, json: &str) -> anyhow::Result<AppConfig> {
    let overlay = AppConfig::from_json(json)?;
    let mut merged = current.clone();
    merged.merge(&overlay);
    merged
        .validate()
        .context("Merged configuration is invalid")?;
    Ok(merged)
}
