//! Evaluate command - score extraction against a labeled test set.

use std::path::PathBuf;

use anyhow::Context as _;
use clap::Args;

use invex_core::TestItem;

use super::{print_json, Context};
use crate::input;

/// Arguments for the evaluate command.
#[derive(Args)]
pub struct EvaluateArgs {
    /// JSON array of `{text, entities}` items
    #[arg(required = true)]
    test_file: PathBuf,
}

pub fn run(args: EvaluateArgs, ctx: &Context) -> anyhow::Result<()> {
    let raw = input::read_text(&args.test_file)?;
    let items: Vec<TestItem> = serde_json::from_str(&raw)
        .with_context(|| format!("malformed test set in {}", args.test_file.display()))?;

    let engine = ctx.open_engine()?;
    let report = engine.evaluate(&items)?;
    print_json(&report)
}
