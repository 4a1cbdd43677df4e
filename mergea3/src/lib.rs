//! mergea3 - merges three overlapping A4 scans into one A3 page.
//!
//! The engine aligns the right edge of the working image with the left edge
//! of the next fragment by a coarse-to-fine search over `(dx, dy, angle)`,
//! then stitches both into a wider raster. Fragments are merged one at a
//! time: left, then center, then right.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use mergea3::{MergeConfig, MergeOutcome, Merger, Raster};
//!
//! let left = Raster::read_file("left.png")?;
//! let center = Raster::read_file("center.png")?;
//! let right = Raster::read_file("right.png")?;
//!
//! let mut merger = Merger::new(&left, true, MergeConfig::default())?;
//! for fragment in [&center, &right] {
//!     if let MergeOutcome::Merged(report) = merger.merge_on_right(fragment, true)? {
//!         println!("deviation {:.1}", report.candidate.deviation);
//!     }
//! }
//! merger.current_working_image().save_file("page.png")?;
//! ```

pub mod compose;
pub mod config;
pub mod deviation;
pub mod error;
pub mod geometry;
pub mod job;
pub mod merger;
pub mod progress;
pub mod pyramid;
pub mod raster;
pub mod search;
pub mod skew;

#[cfg(test)]
pub(crate) mod testing;

// ============================================================================
// Configuration and errors
// ============================================================================

pub use config::{ComposeConfig, MergeConfig, OverlapPriority, SearchConfig, SkewConfig};
pub use error::{MergeError, Result};

// ============================================================================
// Rasters
// ============================================================================

pub use raster::{Plane, Raster, Rgb, SUPPORTED_EXTENSIONS};

// ============================================================================
// Merge pipeline
// ============================================================================

pub use compose::{canvas_layout, compose, CanvasLayout};
pub use deviation::DeviationScorer;
pub use geometry::Placement;
pub use job::{JobOutcome, MergeJob, PageFragments};
pub use merger::{MergeOutcome, MergeReport, MergeState, Merger};
pub use progress::{
    progress_channel, ProgressCallback, ProgressReporter, ProgressSnapshot, SearchStage,
};
pub use pyramid::{build_pyramid, effective_start_reduction, Pyramid, PyramidLevel};
pub use search::{
    AlignmentSearch, Candidate, LevelResult, SearchOutcome, SearchResult, SearchWindow,
    ACCEPTABLE_DEVIATION,
};
pub use skew::SkewCorrector;

pub use common::CancelToken;
