//! Subcommands and the helpers they share.

pub mod config;
pub mod evaluate;
pub mod extract;
pub mod feedback;
pub mod models;
pub mod train;

use std::path::PathBuf;

use anyhow::Context as _;
use serde::Serialize;
use serde_json::json;

use invex_core::{AdaptiveEngine, EngineConfig};

/// Global options every subcommand sees.
pub struct Context {
    pub config_path: Option<PathBuf>,
    pub models_dir: Option<PathBuf>,
}

impl Context {
    /// Engine configuration from `--config` (or defaults) with `--models-dir` applied.
    pub fn engine_config(&self) -> anyhow::Result<EngineConfig> {
        let mut config = match &self.config_path {
            Some(path) => EngineConfig::from_file(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => EngineConfig::default(),
        };
        if let Some(dir) = &self.models_dir {
            config.models_dir = dir.clone();
        }
        Ok(config)
    }

    /// Engine loaded from the latest saved model, if any.
    pub fn open_engine(&self) -> anyhow::Result<AdaptiveEngine> {
        Ok(AdaptiveEngine::open(self.engine_config()?)?)
    }
}

/// Print `value` as pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// JSON document reporting a failed command.
pub fn error_json(err: &anyhow::Error) -> serde_json::Value {
    match err.downcast_ref::<feedback::MissingKeys>() {
        Some(missing) => json!({
            "error": missing.to_string(),
            "required_keys": feedback::REQUIRED_KEYS,
        }),
        None => json!({ "error": format!("{err:#}") }),
    }
}
