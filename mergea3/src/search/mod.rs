//! Coarse-to-fine alignment search.
//!
//! Level by level, coarsest first, every `(dx, dy, angle)` of a window is
//! scored and the minimum kept. The first window comes from the configured
//! overlap, vertical shift and angle ranges; each following window is a small
//! neighbourhood of the previous best rescaled to the finer level, clamped to
//! the previous window so it never grows. The best of the full-resolution
//! level is the result.
//!
//! A small rotation moves no nearest-neighbour sample of a coarse level, so
//! the angle range only narrows after a level whose step was at least its
//! [`angle_resolution_degrees`] and whose best angle had no equal-scoring
//! neighbour.

mod types;


use std::time::Instant;

use common::CancelToken;

pub use types::{
    Candidate, LevelResult, SearchOutcome, SearchResult, SearchWindow, ACCEPTABLE_DEVIATION,
};

use crate::config::SearchConfig;
use crate::deviation::DeviationScorer;
use crate::error::{MergeError, Result};
use crate::progress::{LevelCursor, ProgressReporter};
use crate::pyramid::Pyramid;
use crate::raster::Plane;

#[derive(Debug, Clone)]
pub struct AlignmentSearch {
    config: SearchConfig,
    scorer: DeviationScorer,
}

impl AlignmentSearch {
    pub fn new(config: SearchConfig) -> Self {
        let scorer = DeviationScorer::new(config.min_overlap_pixels);
        Self { config, scorer }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Configured window at the coarsest level for planes of the given
    /// `(width, height)`.
    pub fn initial_window(
        &self,
        scale_reduction: usize,
        a: (usize, usize),
        b: (usize, usize),
    ) -> Result<SearchWindow> {
        let config = &self.config;
        let width_a = a.0 as i64;
        let narrower = a.0.min(b.0) as f64;
        let taller = a.1.max(b.1) as f64;

        let overlap_min = (config.min_overlap_fraction * narrower).ceil() as i64;
        let overlap_max = (config.max_overlap_fraction * narrower).floor() as i64;
        let shift = (config.max_vertical_shift_fraction * taller).round() as i64;

        let window = SearchWindow {
            x_min: width_a - overlap_max,
            x_max: width_a - overlap_min,
            y_min: -shift,
            y_max: shift,
            angle_min: -config.max_angle_degrees,
            angle_max: config.max_angle_degrees,
            angle_center: 0.0,
            angle_step: config.angle_step_degrees,
        };

        if window.is_empty() {
            return Err(MergeError::EmptySearchWindow {
                scale_reduction,
                x_min: window.x_min,
                x_max: window.x_max,
                y_min: window.y_min,
                y_max: window.y_max,
            });
        }
        Ok(window)
    }

    /// Window of the next finer level, `ratio` times the resolution of the
    /// level that produced `best`. Unless `angles_resolved`, the previous
    /// angle range, center and step are kept unchanged.
    pub fn refined_window(
        &self,
        previous: &SearchWindow,
        best: &Candidate,
        ratio: usize,
        angles_resolved: bool,
    ) -> SearchWindow {
        let r = ratio.max(1) as i64;
        let margin = r + self.config.refine_margin;
        let center = best.scaled(ratio.max(1));

        let mut window = SearchWindow {
            x_min: (center.dx - margin).max(previous.x_min * r),
            x_max: (center.dx + margin).min(previous.x_max * r + r - 1),
            y_min: (center.dy - margin).max(previous.y_min * r),
            y_max: (center.dy + margin).min(previous.y_max * r + r - 1),
            ..*previous
        };

        if angles_resolved {
            window.angle_min = (best.angle - previous.angle_step).max(previous.angle_min);
            window.angle_max = (best.angle + previous.angle_step).min(previous.angle_max);
            window.angle_center = best.angle;
            window.angle_step = (previous.angle_step / self.config.angle_refine_divisor)
                .max(self.config.min_angle_step_degrees);
        }
        window
    }

    /// Runs the search of `b` (incoming) over `a` (working image). Both
    /// pyramids must have the same reduction factors.
    pub fn run(
        &self,
        a: &Pyramid,
        b: &Pyramid,
        progress: &ProgressReporter<'_>,
        cancel: &CancelToken,
    ) -> Result<SearchOutcome> {
        let levels_a = a.levels();
        let levels_b = b.levels();
        assert_eq!(
            levels_a.len(),
            levels_b.len(),
            "pyramids must have the same number of levels"
        );

        let level_count = levels_a.len();
        let first_scale_reduction = a.first_scale_reduction();
        let mut window = self.initial_window(
            first_scale_reduction,
            (levels_a[0].plane.width(), levels_a[0].plane.height()),
            (levels_b[0].plane.width(), levels_b[0].plane.height()),
        )?;

        let mut trace: Vec<LevelResult> = Vec::with_capacity(level_count);
        let mut evaluations = 0usize;

        for (level_index, (level_a, level_b)) in levels_a.iter().zip(levels_b).enumerate() {
            assert_eq!(level_a.scale_reduction, level_b.scale_reduction);
            let scale_reduction = level_a.scale_reduction;

            let mut carried = None;
            if let Some(previous) = trace.last() {
                let ratio = previous.scale_reduction / scale_reduction;
                window = self.refined_window(
                    &previous.window,
                    &previous.best,
                    ratio,
                    previous.angles_resolved,
                );
                carried = Some(previous.best_so_far.scaled(ratio.max(1)));
            }

            progress.level_started(scale_reduction);
            let started = Instant::now();
            let cursor = LevelCursor {
                level_index,
                level_count,
                first_scale_reduction,
                scale_reduction,
                total: window.candidate_count(),
            };

            let Some(scan) = self.search_level(
                &level_a.plane,
                &level_b.plane,
                &window,
                &cursor,
                carried,
                progress,
                cancel,
            ) else {
                tracing::info!(scale_reduction, "Alignment search cancelled");
                return Ok(SearchOutcome::Cancelled);
            };

            let best = scan.best;
            if !best.deviation.is_finite() {
                return Err(MergeError::NoScorableCandidate {
                    scale_reduction,
                    min_overlap_pixels: self.scorer.min_overlap_pixels(),
                });
            }

            let angles_resolved = !scan.best_angle_tied
                && window.angle_step >= angle_resolution_degrees(level_b.plane.height());
            evaluations += scan.evaluations;
            tracing::debug!(
                scale_reduction,
                x = ?(window.x_min, window.x_max),
                y = ?(window.y_min, window.y_max),
                angle = ?(window.angle_min, window.angle_max, window.angle_step),
                best_dx = best.dx,
                best_dy = best.dy,
                best_angle = best.angle,
                deviation = best.deviation,
                lowest_deviation = scan.best_so_far.deviation,
                angles_resolved,
                evaluations = scan.evaluations,
                "Level searched"
            );

            trace.push(LevelResult {
                scale_reduction,
                window,
                best,
                best_so_far: scan.best_so_far,
                angles_resolved,
                evaluations: scan.evaluations,
                elapsed: started.elapsed(),
            });
        }

        let best = trace[trace.len() - 1].best;
        Ok(SearchOutcome::Found(SearchResult {
            best,
            levels: trace,
            evaluations,
        }))
    }

    /// Scores every candidate of `window`; `None` when cancelled. `carried`
    /// is the lowest-deviation candidate of the coarser levels, rescaled.
    #[allow(clippy::too_many_arguments)]
    fn search_level(
        &self,
        a: &Plane,
        b: &Plane,
        window: &SearchWindow,
        cursor: &LevelCursor,
        carried: Option<Candidate>,
        progress: &ProgressReporter<'_>,
        cancel: &CancelToken,
    ) -> Option<LevelScan> {
        let angles = window.angles();
        let mut best = Candidate::unscored(window.x_min, window.y_min, window.angle_center);
        let mut best_so_far = carried.unwrap_or(best);
        let mut best_angle_tied = false;
        let mut done = 0usize;

        for dy in window.y_min..=window.y_max {
            for dx in window.x_min..=window.x_max {
                for &angle in &angles {
                    if cancel.is_cancelled() {
                        return None;
                    }

                    let deviation = self.scorer.score(a, b, dx, dy, angle);
                    let candidate = Candidate {
                        dx,
                        dy,
                        angle,
                        deviation,
                    };
                    // Strict: the first candidate in scan order wins ties.
                    if deviation < best.deviation {
                        best = candidate;
                        best_angle_tied = false;
                    } else if deviation == best.deviation && dx == best.dx && dy == best.dy {
                        best_angle_tied = true;
                    }
                    if deviation < best_so_far.deviation {
                        best_so_far = candidate;
                    }

                    done += 1;
                    progress.evaluation(cursor, window, done, candidate, best_so_far, false);
                }
            }
        }

        progress.evaluation(cursor, window, done, best, best_so_far, true);
        Some(LevelScan {
            best,
            best_so_far,
            best_angle_tied,
            evaluations: done,
        })
    }
}

struct LevelScan {
    best: Candidate,
    best_so_far: Candidate,
    /// Another angle at the best offset scored exactly the same.
    best_angle_tied: bool,
    evaluations: usize,
}

/// Smallest rotation that moves the corner pixels of a fragment `height` rows
/// tall by one pixel around its left-edge midpoint.
pub fn angle_resolution_degrees(height: usize) -> f64 {
    let half = (height as f64 / 2.0).max(1.0);
    (1.0 / half).atan().to_degrees()
}
