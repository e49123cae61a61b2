//! Models command - inspect saved model versions.

use clap::{Args, Subcommand};
use console::style;

use invex_core::persistence::{self, ModelStore};

use super::Context;

/// Arguments for the models command.
#[derive(Args)]
pub struct ModelsArgs {
    #[command(subcommand)]
    command: ModelsCommand,
}

#[derive(Subcommand)]
enum ModelsCommand {
    /// List saved model versions
    List,
}

pub fn run(args: ModelsArgs, ctx: &Context) -> anyhow::Result<()> {
    match args.command {
        ModelsCommand::List => list_models(ctx),
    }
}

fn list_models(ctx: &Context) -> anyhow::Result<()> {
    let config = ctx.engine_config()?;
    let store = ModelStore::new(&config.models_dir);
    let versions = store.list_versions()?;

    println!("{}", style("Saved models").bold());
    println!("Directory: {}", store.root().display());
    println!();

    if versions.is_empty() {
        println!(
            "{} No saved models, extraction uses pattern rules only.",
            style("ℹ").blue()
        );
    }

    let latest = versions.last().map(|(v, _)| *v);
    for (version, path) in &versions {
        let marker = if Some(*version) == latest {
            style("(latest)").green().to_string()
        } else {
            String::new()
        };

        match persistence::load_snapshot(path) {
            Ok((_, metadata)) => println!(
                "  v{:<4} {}  {} samples pending at save  {}",
                version,
                metadata.last_trained.format("%Y-%m-%d %H:%M:%S"),
                metadata.training_data_count,
                marker
            ),
            Err(e) => println!("  v{:<4} {} {}", version, style(format!("unreadable: {e}")).red(), marker),
        }
    }

    let pending = store.load_pending()?;
    println!();
    println!("Pending feedback: {}", pending.len());

    Ok(())
}
