mod capture;
mod config;
mod detection;
mod error;
mod output;
mod pipeline;
#[cfg(test)]
mod test_utils;

use anyhow::{bail, Context, Result};
use capture::SamplingMode;
use clap::{Parser, ValueEnum};
use config::DosimeterConfig;
use detection::OtsuContourExtractor;
use error::PipelineError;
use output::{CropArchive, CsvSink};
use pipeline::{run_pipeline, Pipeline, RunOptions};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Sample every frame
    Full,
    /// Sample only every Nth second window
    Filtered,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Video file, or a directory of extracted frame images
    input: PathBuf,

    /// Sampling density
    #[arg(short, long, value_enum, default_value_t = Mode::Full)]
    mode: Mode,

    /// JSON configuration file (color bands, size window, geometry ratios)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for the result CSV
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Save each sampled dosimeter crop into this directory
    #[arg(long)]
    save_crops: Option<PathBuf>,

    /// Frame rate to assume instead of the source's own
    #[arg(long)]
    fps: Option<u32>,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    dump_config: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    let config = match &args.config {
        Some(path) => DosimeterConfig::from_json_file(path)?,
        None => DosimeterConfig::default(),
    };

    if args.dump_config {
        println!("{}", config.to_json_pretty()?);
        return Ok(());
    }

    if !args.input.exists() {
        bail!("Input not found: {}", args.input.display());
    }
    if args.fps == Some(0) {
        bail!("--fps must be positive");
    }

    tracing::info!("Dosimeter tracking starting");
    tracing::info!("Input: {}", args.input.display());
    tracing::info!("Mode: {:?}", args.mode);

    let mode = match args.mode {
        Mode::Full => SamplingMode::Full,
        Mode::Filtered => SamplingMode::Filtered {
            interval: config.timing.filter_interval,
        },
    };
    let options = RunOptions {
        mode,
        fps: args.fps,
    };

    let crops = args
        .save_crops
        .as_ref()
        .map(CropArchive::new)
        .transpose()
        .context("Failed to prepare crop archive")?;

    let (mut sink, result_path) = CsvSink::for_video(&args.output_dir, &args.input)?;
    let mut pipeline = Pipeline::new(config, OtsuContourExtractor)?;

    let input = args.input.clone();
    let result = run_pipeline(
        &mut pipeline,
        || capture::open_source(&input),
        &mut sink,
        options,
        crops.as_ref(),
    );

    let summary = match result {
        Ok(summary) => summary,
        Err(err) => {
            if let Some(PipelineError::Calibration(calibration)) =
                err.downcast_ref::<PipelineError>()
            {
                eprintln!("{}", calibration.user_message());
            }
            return Err(err);
        }
    };

    if let Some(calibration) = pipeline.calibration() {
        println!(
            "Dosimeter calibrated at {}x{}, size window {}",
            calibration.width(),
            calibration.height(),
            calibration.window
        );
    }
    match summary.baseline {
        Some([r, g, b]) => println!("Baseline color: ({r}, {g}, {b})"),
        None => println!("Baseline color unavailable"),
    }
    println!(
        "Processed {} frames: {} sampled, {} failed, {} skipped by filter",
        summary.frames_seen,
        summary.sampled,
        summary.failures(),
        summary.skipped_by_filter
    );
    println!("Results written to {}", result_path.display());

    Ok(())
}
