//! Incremental left-to-right merge of fragments.
//!
//! A [`Merger`] owns the working image. Each [`Merger::merge_on_right`] call
//! corrects the incoming fragment, searches its placement against the current
//! working image, composes both and swaps the working image for the result.
//! A cancelled or failed step leaves the working image untouched.

#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::CancelToken;
use tokio::sync::watch;

use crate::compose::{canvas_layout, compose};
use crate::config::MergeConfig;
use crate::error::{MergeError, Result};
use crate::geometry::Placement;
use crate::progress::{ProgressCallback, ProgressReporter};
use crate::pyramid::{build_pyramid, effective_start_reduction};
use crate::raster::Raster;
use crate::search::{AlignmentSearch, Candidate, LevelResult, SearchOutcome};
use crate::skew::SkewCorrector;

/// What the merger is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeState {
    #[default]
    Idle,
    Correcting,
    Searching {
        scale_reduction: usize,
    },
    Compositing,
}

/// Summary of one successful merge step.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeReport {
    /// Position of the merged fragment in the sequence; the first merge
    /// (second fragment) is 1.
    pub fragment_index: usize,
    /// Final placement at full resolution.
    pub candidate: Candidate,
    /// Per-level bests, coarsest first.
    pub levels: Vec<LevelResult>,
    pub evaluations: usize,
    pub first_scale_reduction: usize,
    pub overlap_width: usize,
    pub width: usize,
    pub height: usize,
    pub elapsed: Duration,
}

impl MergeReport {
    pub fn is_acceptable(&self) -> bool {
        self.candidate.is_acceptable()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MergeOutcome {
    Merged(MergeReport),
    Cancelled,
}

#[derive(Debug)]
pub struct Merger {
    config: MergeConfig,
    search: AlignmentSearch,
    working: Arc<Raster>,
    merges: usize,
    progress: ProgressCallback,
    cancel: CancelToken,
    state: watch::Sender<MergeState>,
}

impl Merger {
    /// Starts a merge sequence with `first` as the working image.
    pub fn new(first: &Raster, scanner_correction: bool, config: MergeConfig) -> Result<Self> {
        config.validate()?;
        ensure_not_empty(first)?;

        let corrector = SkewCorrector::new(config.skew.clone(), scanner_correction);
        let working = Arc::new(corrector.correct(first).into_owned());
        let (state, _) = watch::channel(MergeState::Idle);

        tracing::info!(
            width = working.width(),
            height = working.height(),
            scanner_correction,
            "Merger initialized"
        );

        Ok(Self {
            search: AlignmentSearch::new(config.search.clone()),
            config,
            working,
            merges: 0,
            progress: ProgressCallback::none(),
            cancel: CancelToken::new(),
            state,
        })
    }

    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    /// Number of successful merges so far.
    pub fn merges_done(&self) -> usize {
        self.merges
    }

    /// Snapshot of the working image. Later merges replace the working image
    /// and never touch a returned snapshot.
    pub fn current_working_image(&self) -> Arc<Raster> {
        Arc::clone(&self.working)
    }

    pub fn set_progress_callback(&mut self, callback: ProgressCallback) {
        self.progress = callback;
    }

    /// Token checked before every evaluation. It stays cancelled until
    /// [`CancelToken::reset`] is called.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn set_cancel_token(&mut self, cancel: CancelToken) {
        self.cancel = cancel;
    }

    pub fn state(&self) -> MergeState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<MergeState> {
        self.state.subscribe()
    }

    /// Merges `next` onto the right edge of the working image. Blocks until
    /// the step completes or is cancelled.
    pub fn merge_on_right(
        &mut self,
        next: &Raster,
        scanner_correction: bool,
    ) -> Result<MergeOutcome> {
        ensure_not_empty(next)?;
        if self.cancel.is_cancelled() {
            tracing::info!(
                fragment_index = self.merges + 1,
                "Merge cancelled before start"
            );
            return Ok(MergeOutcome::Cancelled);
        }

        let result = self.run_step(next, scanner_correction);
        self.state.send_replace(MergeState::Idle);
        result
    }

    fn run_step(&mut self, next: &Raster, scanner_correction: bool) -> Result<MergeOutcome> {
        let started = Instant::now();
        let fragment_index = self.merges + 1;

        self.state.send_replace(MergeState::Correcting);
        let corrector = SkewCorrector::new(self.config.skew.clone(), scanner_correction);
        let incoming = corrector.correct(next);
        let working = Arc::clone(&self.working);

        let search_config = self.search.config();
        let first_scale_reduction = effective_start_reduction(
            search_config.first_scale_reduction,
            &[
                (working.width(), working.height()),
                (incoming.width(), incoming.height()),
            ],
            search_config.min_level_size,
        );
        let pyramid_a = build_pyramid(&working, first_scale_reduction);
        let pyramid_b = build_pyramid(&incoming, first_scale_reduction);

        tracing::info!(
            fragment_index,
            working = ?(working.width(), working.height()),
            incoming = ?(incoming.width(), incoming.height()),
            first_scale_reduction,
            "Merge step started"
        );

        let reporter =
            ProgressReporter::new(&self.progress, self.merges, self.config.expected_merges)
                .with_state(&self.state);
        let result = match self.search.run(&pyramid_a, &pyramid_b, &reporter, &self.cancel)? {
            SearchOutcome::Found(result) => result,
            SearchOutcome::Cancelled => {
                tracing::info!(fragment_index, "Merge step cancelled");
                return Ok(MergeOutcome::Cancelled);
            }
        };

        self.state.send_replace(MergeState::Compositing);
        let candidate = result.best;
        let merged = compose(&working, &incoming, &candidate, &self.config.compose);
        let layout = canvas_layout(
            working.width(),
            working.height(),
            &Placement::new(
                candidate.dx,
                candidate.dy,
                candidate.angle,
                incoming.width(),
                incoming.height(),
            ),
        );

        let report = MergeReport {
            fragment_index,
            candidate,
            levels: result.levels,
            evaluations: result.evaluations,
            first_scale_reduction,
            overlap_width: layout.overlap_width,
            width: merged.width(),
            height: merged.height(),
            elapsed: started.elapsed(),
        };

        self.working = Arc::new(merged);
        self.merges += 1;

        tracing::info!(
            fragment_index,
            dx = candidate.dx,
            dy = candidate.dy,
            angle = candidate.angle,
            deviation = candidate.deviation,
            width = report.width,
            height = report.height,
            evaluations = report.evaluations,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Merge step finished"
        );
        if !candidate.is_acceptable() {
            tracing::warn!(
                fragment_index,
                deviation = candidate.deviation,
                "Lowest deviation is above the acceptable threshold"
            );
        }

        Ok(MergeOutcome::Merged(report))
    }
}

fn ensure_not_empty(raster: &Raster) -> Result<()> {
    if raster.is_empty() {
        return Err(MergeError::EmptyFragment {
            width: raster.width(),
            height: raster.height(),
        });
    }
    Ok(())
}
