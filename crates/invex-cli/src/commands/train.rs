//! Train command - retrain on pending feedback.

use clap::Args;

use invex_core::CancellationToken;

use super::{print_json, Context};

/// Arguments for the train command.
#[derive(Args)]
pub struct TrainArgs {
    /// Training passes (default: from config)
    #[arg(short, long)]
    iterations: Option<usize>,
}

pub fn run(args: TrainArgs, ctx: &Context) -> anyhow::Result<()> {
    let mut engine = ctx.open_engine()?;
    let iterations = args
        .iterations
        .unwrap_or(engine.config().training.iterations);

    let outcome = engine.train_with(iterations, &CancellationToken::new())?;
    print_json(&outcome)
}
