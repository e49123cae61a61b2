//! Config command - inspect and create engine configuration.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use console::style;

use invex_core::{EngineConfig, ModelStore};

use super::Context;

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Show the configuration the engine runs with
    Show,

    /// Write a configuration file with default settings
    Init(InitArgs),
}

#[derive(Args)]
struct InitArgs {
    /// Output path for configuration file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Overwrite existing file
    #[arg(long)]
    force: bool,
}

pub fn run(args: ConfigArgs, ctx: &Context) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Show => show_config(ctx),
        ConfigCommand::Init(init_args) => init_config(init_args, ctx),
    }
}

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("invex")
        .join("config.json")
}

/// What a models directory currently holds.
#[derive(Debug, PartialEq)]
enum ModelsDirState {
    Missing,
    Empty { pending: usize },
    Trained { latest: u64, pending: usize },
}

/// Inspect `dir` the way the engine will when it opens.
fn inspect_models_dir(dir: &Path) -> anyhow::Result<ModelsDirState> {
    if !dir.exists() {
        return Ok(ModelsDirState::Missing);
    }
    if !dir.is_dir() {
        anyhow::bail!("models_dir {} is not a directory", dir.display());
    }

    let store = ModelStore::new(dir);
    let pending = store.load_pending()?.len();
    Ok(match store.discover_latest()? {
        Some((latest, _)) => ModelsDirState::Trained { latest, pending },
        None => ModelsDirState::Empty { pending },
    })
}

fn report_models_dir(dir: &Path, state: &ModelsDirState) {
    let detail = match state {
        ModelsDirState::Missing => "created on first save".to_string(),
        ModelsDirState::Empty { pending } => format!("no saved models, {pending} pending"),
        ModelsDirState::Trained { latest, pending } => {
            format!("latest v{latest}, {pending} pending")
        }
    };
    eprintln!(
        "{} Models: {} ({})",
        style("ℹ").blue(),
        dir.display(),
        style(detail).dim()
    );
}

fn show_config(ctx: &Context) -> anyhow::Result<()> {
    let source = ctx.config_path.clone().or_else(|| {
        let path = default_config_path();
        path.exists().then_some(path)
    });
    let resolved = Context {
        config_path: source.clone(),
        models_dir: ctx.models_dir.clone(),
    };
    let config = resolved.engine_config()?;
    let state = inspect_models_dir(&config.models_dir)?;

    match &source {
        Some(path) => eprintln!("{} Config: {}", style("ℹ").blue(), path.display()),
        None => eprintln!(
            "{} No config file found, showing defaults.",
            style("ℹ").blue()
        ),
    }
    report_models_dir(&config.models_dir, &state);

    println!("{}", serde_json::to_string_pretty(&config)?);

    Ok(())
}

fn init_config(args: InitArgs, ctx: &Context) -> anyhow::Result<()> {
    let output_path = args.output.unwrap_or_else(default_config_path);

    if output_path.exists() && !args.force {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            output_path.display()
        );
    }

    let mut config = EngineConfig::default();
    if let Some(dir) = &ctx.models_dir {
        config.models_dir = dir.clone();
    }
    config.validate()?;
    let state = inspect_models_dir(&config.models_dir)?;

    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)?;
    }
    config.save(&output_path)?;

    eprintln!(
        "{} Created configuration file at {}",
        style("✓").green(),
        output_path.display()
    );
    report_models_dir(&config.models_dir, &state);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_inspect_models_dir() {
        let dir = TempDir::new().unwrap();
        let models = dir.path().join("models");
        assert_eq!(inspect_models_dir(&models).unwrap(), ModelsDirState::Missing);

        fs::create_dir(&models).unwrap();
        assert_eq!(
            inspect_models_dir(&models).unwrap(),
            ModelsDirState::Empty { pending: 0 }
        );

        fs::create_dir(models.join("invoice_model_v3")).unwrap();
        assert_eq!(
            inspect_models_dir(&models).unwrap(),
            ModelsDirState::Trained { latest: 3, pending: 0 }
        );
    }

    #[test]
    fn test_file_is_not_a_models_dir() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("models");
        fs::write(&file, "").unwrap();

        let err = inspect_models_dir(&file).unwrap_err();
        assert!(err.to_string().contains("not a directory"));
    }
}
