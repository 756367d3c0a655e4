//! SteadyFrame CLI — Command-line interface for video stabilization.
//!
//! Usage:
//!   steadyframe analyze <FRAMES_DIR> -o <DATA_FILE>   Estimate and smooth camera motion
//!   steadyframe render <FRAMES_DIR> <DATA_FILE> -o <OUT_DIR>   Write stabilized frames
//!   steadyframe info <DATA_FILE>                      Show stabilization data

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use steadyframe_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "steadyframe",
    about = "2D video stabilization for image sequences",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Track camera motion across a clip and save stabilization data
    Analyze {
        /// Directory of numbered frame images
        frames_dir: PathBuf,

        /// Stabilization data file to write
        #[arg(short, long)]
        output: PathBuf,

        /// Smoothing half-width in frames (overrides config)
        #[arg(long, allow_negative_numbers = true)]
        window: Option<i64>,

        /// Maximum corners tracked per frame (overrides config)
        #[arg(long)]
        max_corners: Option<usize>,
    },

    /// Render stabilized frames from saved stabilization data
    Render {
        /// Directory of numbered frame images
        frames_dir: PathBuf,

        /// Stabilization data file produced by `analyze`
        data_file: PathBuf,

        /// Output directory for stabilized frames
        #[arg(short, long)]
        output: PathBuf,

        /// Border-hiding zoom, >= 1.0 (overrides config)
        #[arg(long)]
        zoom: Option<f32>,
    },

    /// Show the contents of a stabilization data file
    Info {
        /// Stabilization data file
        data_file: PathBuf,

        /// Print the full tables as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load();

    // Initialize logging
    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    steadyframe_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Analyze {
            frames_dir,
            output,
            window,
            max_corners,
        } => commands::analyze::run(frames_dir, output, window, max_corners, &config),
        Commands::Render {
            frames_dir,
            data_file,
            output,
            zoom,
        } => commands::render::run(frames_dir, data_file, output, zoom, &config),
        Commands::Info { data_file, json } => commands::info::run(data_file, json),
    }
}
