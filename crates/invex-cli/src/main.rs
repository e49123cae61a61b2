//! CLI application for adaptive invoice entity extraction.

mod commands;
mod input;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{config, evaluate, extract, feedback, models, train, Context};

/// Invoice entity extraction that learns from corrections
#[derive(Parser)]
#[command(name = "invex")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Models directory (overrides the config file)
    #[arg(short, long, global = true)]
    models_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract entities from an invoice text file
    Extract(extract::ExtractArgs),

    /// Record a user correction
    Feedback(feedback::FeedbackArgs),

    /// Retrain on pending feedback
    Train(train::TrainArgs),

    /// Score extraction against a labeled test set
    Evaluate(evaluate::EvaluateArgs),

    /// Inspect saved model versions
    Models(models::ModelsArgs),

    /// Manage configuration
    Config(config::ConfigArgs),
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => e.exit(),
            // Usage errors are reported as JSON like every other failure.
            _ => {
                println!("{}", commands::error_json(&anyhow::Error::new(e)));
                return ExitCode::FAILURE;
            }
        },
    };

    // Set up logging based on verbosity. Logs go to stderr, stdout carries JSON.
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to install logger: {e}");
    }

    let ctx = Context {
        config_path: cli.config,
        models_dir: cli.models_dir,
    };

    let result = match cli.command {
        Commands::Extract(args) => extract::run(args, &ctx),
        Commands::Feedback(args) => feedback::run(args, &ctx),
        Commands::Train(args) => train::run(args, &ctx),
        Commands::Evaluate(args) => evaluate::run(args, &ctx),
        Commands::Models(args) => models::run(args, &ctx),
        Commands::Config(args) => config::run(args, &ctx),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            println!("{}", commands::error_json(&e));
            ExitCode::FAILURE
        }
    }
}
