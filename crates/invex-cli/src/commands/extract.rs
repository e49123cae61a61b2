//! Extract command - detect entities in an invoice text file.

use std::path::PathBuf;

use clap::Args;
use serde::Serialize;
use tracing::{debug, info};

use invex_core::{EntityMap, ModelStats};

use super::{print_json, Context};
use crate::input;

/// Arguments for the extract command.
#[derive(Args)]
pub struct ExtractArgs {
    /// Text extracted from the invoice
    #[arg(required = true)]
    text_file: PathBuf,

    /// Invoice image (accepted but not used)
    image: Option<PathBuf>,
}

#[derive(Serialize)]
struct ExtractionOutput {
    entities: EntityMap,
    model_stats: ModelStats,
}

pub fn run(args: ExtractArgs, ctx: &Context) -> anyhow::Result<()> {
    let text = input::read_text(&args.text_file)?;
    if let Some(image) = &args.image {
        debug!("ignoring image {}", image.display());
    }

    let engine = ctx.open_engine()?;
    info!("Processing file: {}", args.text_file.display());

    print_json(&ExtractionOutput {
        entities: engine.extract(&text),
        model_stats: engine.stats(),
    })
}
