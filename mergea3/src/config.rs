//! Configuration types for the merger.
//!
//! All knobs of the alignment search, the scanner correction and the
//! compositor live here. Every struct deserializes with `#[serde(default)]`,
//! so a YAML file only needs the fields it overrides.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MergeError, Result};
use crate::raster::Rgb;

// =============================================================================
// Alignment search configuration
// =============================================================================

/// Coarse-to-fine alignment search parameters.
///
/// Offsets are expressed as fractions of the raster size so the same
/// configuration works at any scan resolution. Angles are in degrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Requested reduction factor of the coarsest level. The factor actually
    /// used is lowered until both rasters keep `min_level_size` pixels.
    pub first_scale_reduction: usize,
    /// Smallest width/height a pyramid level may have.
    pub min_level_size: usize,
    /// Smallest horizontal overlap, as a fraction of the narrower raster.
    pub min_overlap_fraction: f64,
    /// Largest horizontal overlap, as a fraction of the narrower raster.
    pub max_overlap_fraction: f64,
    /// Largest vertical shift in either direction, as a fraction of the
    /// taller raster.
    pub max_vertical_shift_fraction: f64,
    /// Largest rotation in either direction.
    pub max_angle_degrees: f64,
    /// Angular step at the coarsest level.
    pub angle_step_degrees: f64,
    /// Each finer level divides the angular step by this value.
    pub angle_refine_divisor: f64,
    /// Lower bound for the angular step.
    pub min_angle_step_degrees: f64,
    /// Extra pixels (at the finer level) searched around the rescaled best
    /// candidate, on top of the scale ratio itself.
    pub refine_margin: i64,
    /// Overlaps with fewer samples than this never become a candidate.
    pub min_overlap_pixels: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            first_scale_reduction: 16,
            min_level_size: 24,
            min_overlap_fraction: 0.2,
            max_overlap_fraction: 0.8,
            max_vertical_shift_fraction: 0.04,
            max_angle_degrees: 1.5,
            angle_step_degrees: 0.5,
            angle_refine_divisor: 2.0,
            min_angle_step_degrees: 0.05,
            refine_margin: 1,
            min_overlap_pixels: 32,
        }
    }
}

impl SearchConfig {
    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<()> {
        if self.first_scale_reduction == 0 {
            return invalid("first_scale_reduction must be at least 1");
        }
        if self.min_level_size == 0 {
            return invalid("min_level_size must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.min_overlap_fraction)
            || !(0.0..=1.0).contains(&self.max_overlap_fraction)
        {
            return invalid(format!(
                "overlap fractions must be in [0, 1], got {}..{}",
                self.min_overlap_fraction, self.max_overlap_fraction
            ));
        }
        if self.min_overlap_fraction > self.max_overlap_fraction {
            return invalid(format!(
                "min_overlap_fraction {} exceeds max_overlap_fraction {}",
                self.min_overlap_fraction, self.max_overlap_fraction
            ));
        }
        if !(0.0..=1.0).contains(&self.max_vertical_shift_fraction) {
            return invalid(format!(
                "max_vertical_shift_fraction must be in [0, 1], got {}",
                self.max_vertical_shift_fraction
            ));
        }
        if !(0.0..45.0).contains(&self.max_angle_degrees) {
            return invalid(format!(
                "max_angle_degrees must be in [0, 45), got {}",
                self.max_angle_degrees
            ));
        }
        if self.angle_step_degrees <= 0.0 || self.min_angle_step_degrees <= 0.0 {
            return invalid("angle steps must be positive");
        }
        if self.angle_refine_divisor < 1.0 {
            return invalid(format!(
                "angle_refine_divisor must be >= 1, got {}",
                self.angle_refine_divisor
            ));
        }
        if self.refine_margin < 0 {
            return invalid(format!(
                "refine_margin must be non-negative, got {}",
                self.refine_margin
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Scanner correction configuration
// =============================================================================

/// Parameters of the left-edge bow compensation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkewConfig {
    /// Width of the corrected band at the left edge, as a fraction of the
    /// raster width.
    pub band_fraction: f64,
    /// Horizontal displacement at the band's outer edge in the middle row,
    /// as a fraction of the raster width.
    pub max_shift_fraction: f64,
}

impl Default for SkewConfig {
    fn default() -> Self {
        Self {
            band_fraction: 0.06,
            max_shift_fraction: 0.004,
        }
    }
}

impl SkewConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.band_fraction) {
            return invalid(format!(
                "band_fraction must be in [0, 1], got {}",
                self.band_fraction
            ));
        }
        if !(0.0..=self.band_fraction.max(0.0)).contains(&self.max_shift_fraction) {
            return invalid(format!(
                "max_shift_fraction must be in [0, band_fraction], got {}",
                self.max_shift_fraction
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Compositor configuration
// =============================================================================

/// Which raster wins where the two overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPriority {
    /// The working image keeps its pixels.
    Existing,
    /// The incoming fragment is laid on top.
    #[default]
    Incoming,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposeConfig {
    pub overlap_priority: OverlapPriority,
    /// Fill for canvas pixels covered by neither raster.
    pub background: Rgb,
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            overlap_priority: OverlapPriority::default(),
            background: [255, 255, 255],
        }
    }
}

// =============================================================================
// Top-level configuration
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    pub search: SearchConfig,
    pub skew: SkewConfig,
    pub compose: ComposeConfig,
    /// Number of merge steps the caller intends to run (2 for
    /// left/center/right). Only used to scale overall progress.
    pub expected_merges: usize,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            search: SearchConfig::default(),
            skew: SkewConfig::default(),
            compose: ComposeConfig::default(),
            expected_merges: 2,
        }
    }
}

impl MergeConfig {
    pub fn validate(&self) -> Result<()> {
        self.search.validate()?;
        self.skew.validate()?;
        if self.expected_merges == 0 {
            return invalid("expected_merges must be at least 1");
        }
        Ok(())
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: MergeConfig =
            serde_yml::from_str(yaml).map_err(|source| MergeError::ConfigParse { source })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| MergeError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&yaml)
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yml::to_string(self).map_err(|source| MergeError::ConfigParse { source })
    }
}

fn invalid<T>(msg: impl Into<String>) -> Result<T> {
    Err(MergeError::InvalidConfig(msg.into()))
}
