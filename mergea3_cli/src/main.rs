mod report;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, ValueHint};
use common::log_setup::{setup_logging, LogOptions};
use mergea3::{JobOutcome, MergeConfig, MergeJob, PageFragments, Raster, SUPPORTED_EXTENSIONS};

use crate::report::{summary, StatusTracker};

#[derive(Parser, Debug)]
#[command(
    name = "mergea3",
    author,
    version,
    about = "Merge three overlapping A4 scans (left, center, right) into one A3 page"
)]
struct Cli {
    /// Left fragment
    #[arg(value_hint = ValueHint::FilePath)]
    left: PathBuf,

    /// Center fragment
    #[arg(value_hint = ValueHint::FilePath)]
    center: PathBuf,

    /// Right fragment
    #[arg(value_hint = ValueHint::FilePath)]
    right: PathBuf,

    /// Destination image; the format follows the extension
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    output: PathBuf,

    /// Skip the left-edge bow correction of each fragment
    #[arg(long = "no-scanner-correction", action = ArgAction::SetFalse, default_value_t = true)]
    scanner_correction: bool,

    /// YAML file overriding the default merge configuration
    #[arg(long, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Also write daily rolling log files into this directory
    #[arg(long, value_hint = ValueHint::DirPath)]
    log_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(&LogOptions {
        base_level: cli.log_level.clone(),
        log_dir: cli.log_dir.clone(),
        ..Default::default()
    });

    let config = match &cli.config {
        Some(path) => MergeConfig::from_yaml_file(path)
            .with_context(|| format!("Failed to load configuration {}", path.display()))?,
        None => MergeConfig::default(),
    };
    check_output_extension(&cli.output)?;

    let fragments = PageFragments {
        left: load_fragment(&cli.left, "left")?,
        center: load_fragment(&cli.center, "center")?,
        right: load_fragment(&cli.right, "right")?,
    };

    let expected_merges = config.expected_merges;
    let job = MergeJob::spawn(fragments, cli.scanner_correction, config)
        .context("Failed to start the merge")?;

    let mut progress = job.progress();
    let printer = tokio::spawn(async move {
        let mut tracker = StatusTracker::default();
        // Ends when the worker drops its sender.
        while progress.changed().await.is_ok() {
            let snapshot = progress.borrow_and_update().clone();
            if let Some(line) = snapshot.and_then(|s| tracker.update(&s, expected_merges)) {
                println!("{line}");
            }
        }
    });

    let cancel = job.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling the merge");
            cancel.cancel();
        }
    });

    let outcome = job.finished().await.context("Merge failed")?;
    if let Err(err) = printer.await {
        tracing::warn!(error = %err, "Progress printer stopped abnormally");
    }

    match outcome {
        JobOutcome::Completed { image, reports } => {
            for line in summary(&reports) {
                println!("{line}");
            }
            image
                .save_file(&cli.output)
                .with_context(|| format!("Failed to save {}", cli.output.display()))?;
            tracing::info!(
                path = %cli.output.display(),
                width = image.width(),
                height = image.height(),
                "Saved merged page"
            );
            println!("Saved {}", cli.output.display());
            Ok(())
        }
        JobOutcome::Cancelled {
            completed_steps, ..
        } => bail!(
            "Merge cancelled after {} of {} steps",
            completed_steps,
            expected_merges
        ),
    }
}

fn load_fragment(path: &Path, name: &str) -> Result<Raster> {
    let raster = Raster::read_file(path)
        .with_context(|| format!("Failed to load the {} fragment {}", name, path.display()))?;
    tracing::info!(
        fragment = name,
        path = %path.display(),
        width = raster.width(),
        height = raster.height(),
        "Loaded fragment"
    );
    Ok(raster)
}

/// Fails before any work is done when the output cannot be encoded.
fn check_output_extension(path: &Path) -> Result<()> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match extension {
        Some(ext) if SUPPORTED_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
        _ => bail!(
            "Unsupported output format for {}; expected one of {}",
            path.display(),
            SUPPORTED_EXTENSIONS.join(", ")
        ),
    }
}
