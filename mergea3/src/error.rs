//! Error types for the merger.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by the merger and its building blocks.
///
/// Cancellation is not an error; it is reported through
/// [`MergeOutcome::Cancelled`](crate::MergeOutcome::Cancelled).
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("Fragment has zero area ({width}x{height})")]
    EmptyFragment { width: usize, height: usize },

    #[error(
        "Search window at scale 1/{scale_reduction} is empty: x {x_min}..={x_max}, y {y_min}..={y_max}"
    )]
    EmptySearchWindow {
        scale_reduction: usize,
        x_min: i64,
        x_max: i64,
        y_min: i64,
        y_max: i64,
    },

    #[error(
        "No placement at scale 1/{scale_reduction} overlaps by at least {min_overlap_pixels} pixels"
    )]
    NoScorableCandidate {
        scale_reduction: usize,
        min_overlap_pixels: usize,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to read configuration '{path}': {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse configuration: {source}")]
    ConfigParse {
        #[source]
        source: serde_yml::Error,
    },

    #[error("Unsupported image extension: {0}")]
    UnsupportedExtension(String),

    #[error("Failed to load image '{path}': {source}")]
    ImageLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to save image '{path}': {source}")]
    ImageSave {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to spawn merge worker: {source}")]
    WorkerSpawn {
        #[source]
        source: io::Error,
    },

    #[error("Merge worker stopped without reporting a result")]
    WorkerStopped,
}

pub type Result<T> = std::result::Result<T, MergeError>;
