//! CLI for claimprint: score aggregated claims reports for synthetic or altered data.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "claimprint")]
#[command(about = "claimprint: flag claims datasets that look synthetic or altered")]
#[command(version = claimprint_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Calibrate thresholds and score every partition of a report bundle.
    /// A lone partition report is scored against the fallback thresholds.
    Score {
        /// Report bundle (or single partition report) JSON
        input: PathBuf,

        /// Directory for the output documents
        #[arg(long, default_value = "outputs/json")]
        out_dir: PathBuf,

        /// Override the null-model seed
        #[arg(long)]
        seed: Option<u64>,

        /// Calibration config JSON (absent fields take defaults)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Reuse thresholds from an existing calibration document instead of calibrating
        #[arg(long, conflicts_with_all = ["seed", "config"])]
        calibration: Option<PathBuf>,

        /// Also print the ALL score document to stdout
        #[arg(long)]
        json: bool,
    },

    /// Write only the calibration (null-model) document for a report bundle
    Calibrate {
        /// Report bundle JSON
        input: PathBuf,

        /// Directory for the calibration document
        #[arg(long, default_value = "outputs/json")]
        out_dir: PathBuf,

        /// Override the null-model seed
        #[arg(long)]
        seed: Option<u64>,

        /// Calibration config JSON (absent fields take defaults)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Score {
            input,
            out_dir,
            seed,
            config,
            calibration,
            json,
        } => commands::score::run(commands::score::ScoreCommandConfig {
            input: &input,
            out_dir: &out_dir,
            seed,
            config_path: config.as_deref(),
            calibration_path: calibration.as_deref(),
            print_json: json,
        }),
        Commands::Calibrate {
            input,
            out_dir,
            seed,
            config,
        } => commands::calibrate::run(&input, &out_dir, seed, config.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        let mut source = std::error::Error::source(&e);
        while let Some(cause) = source {
            eprintln!("  caused by: {cause}");
            source = std::error::Error::source(cause);
        }
        std::process::exit(1);
    }
}
