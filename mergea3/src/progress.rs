//! Progress reporting for merge steps.
//!
//! The search emits a [`ProgressSnapshot`] after every evaluation and once
//! more when a level is exhausted. Emission is fire-and-forget: a callback
//! runs inline on the merging thread, and [`progress_channel`] keeps only the
//! latest snapshot so a slow reader never stalls the search.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;

use crate::merger::MergeState;
use crate::search::{Candidate, SearchWindow};

/// Phase of the coarse-to-fine search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStage {
    /// Coarsest level, full configured window.
    Exploring,
    /// Intermediate levels around the previous best.
    Refining,
    /// Full resolution.
    Final,
}

impl SearchStage {
    pub fn from_scale(first_scale_reduction: usize, scale_reduction: usize) -> Self {
        if scale_reduction <= 1 {
            SearchStage::Final
        } else if scale_reduction >= first_scale_reduction {
            SearchStage::Exploring
        } else {
            SearchStage::Refining
        }
    }
}

/// Immutable record of the search state at one evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    /// Progress over all expected merges, 0..=1.
    pub overall: f64,
    /// Progress of the current merge step, 0..=1.
    pub step: f64,
    /// Number of merges completed before this step.
    pub fragment_index: usize,
    pub first_scale_reduction: usize,
    pub scale_reduction: usize,
    pub stage: SearchStage,
    pub window: SearchWindow,
    /// Candidate that was just evaluated.
    pub candidate: Candidate,
    /// Lowest deviation seen so far in this step, across all levels, with
    /// its placement rescaled to the current level.
    pub best: Candidate,
    /// Set on the snapshot emitted after the last evaluation of a level.
    pub level_complete: bool,
}

impl ProgressSnapshot {
    /// Human-readable status, e.g. `Improving precision (scale 1/4)`.
    pub fn status_line(&self) -> String {
        match self.stage {
            SearchStage::Exploring => format!("First exploring (scale 1/{})", self.scale_reduction),
            SearchStage::Refining => {
                format!("Improving precision (scale 1/{})", self.scale_reduction)
            }
            SearchStage::Final => "Final processing".to_string(),
        }
    }
}

/// Optional sink for progress snapshots.
#[derive(Clone, Default)]
pub struct ProgressCallback {
    func: Option<Arc<dyn Fn(&ProgressSnapshot) + Send + Sync>>,
}

impl ProgressCallback {
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&ProgressSnapshot) + Send + Sync + 'static,
    {
        Self {
            func: Some(Arc::new(func)),
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_set(&self) -> bool {
        self.func.is_some()
    }

    #[inline]
    pub fn call(&self, snapshot: &ProgressSnapshot) {
        if let Some(func) = &self.func {
            func(snapshot);
        }
    }
}

impl fmt::Debug for ProgressCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressCallback")
            .field("is_set", &self.is_set())
            .finish()
    }
}

/// Callback that publishes into a watch channel, and the receiving end.
/// The receiver starts at `None` and always holds the latest snapshot.
pub fn progress_channel() -> (ProgressCallback, watch::Receiver<Option<ProgressSnapshot>>) {
    let (tx, rx) = watch::channel(None);
    let callback = ProgressCallback::new(move |snapshot| {
        tx.send_replace(Some(snapshot.clone()));
    });
    (callback, rx)
}

/// Position of the search inside the level sequence.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LevelCursor {
    pub level_index: usize,
    pub level_count: usize,
    pub first_scale_reduction: usize,
    pub scale_reduction: usize,
    pub total: usize,
}

/// Builds snapshots for one merge step and forwards them to the callback.
pub struct ProgressReporter<'a> {
    callback: &'a ProgressCallback,
    state: Option<&'a watch::Sender<MergeState>>,
    fragment_index: usize,
    expected_merges: usize,
}

impl<'a> ProgressReporter<'a> {
    pub fn new(
        callback: &'a ProgressCallback,
        fragment_index: usize,
        expected_merges: usize,
    ) -> Self {
        Self {
            callback,
            state: None,
            fragment_index,
            expected_merges: expected_merges.max(1),
        }
    }

    /// Also publishes `Searching { scale_reduction }` whenever a level starts.
    pub fn with_state(mut self, state: &'a watch::Sender<MergeState>) -> Self {
        self.state = Some(state);
        self
    }

    pub(crate) fn level_started(&self, scale_reduction: usize) {
        if let Some(state) = self.state {
            state.send_replace(MergeState::Searching { scale_reduction });
        }
    }

    pub(crate) fn evaluation(
        &self,
        cursor: &LevelCursor,
        window: &SearchWindow,
        done: usize,
        candidate: Candidate,
        best: Candidate,
        level_complete: bool,
    ) {
        if !self.callback.is_set() {
            return;
        }

        let level_fraction = if cursor.total == 0 {
            1.0
        } else {
            done as f64 / cursor.total as f64
        };
        let step = ((cursor.level_index as f64 + level_fraction) / cursor.level_count.max(1) as f64)
            .clamp(0.0, 1.0);
        let overall =
            ((self.fragment_index as f64 + step) / self.expected_merges as f64).clamp(0.0, 1.0);

        self.callback.call(&ProgressSnapshot {
            overall,
            step,
            fragment_index: self.fragment_index,
            first_scale_reduction: cursor.first_scale_reduction,
            scale_reduction: cursor.scale_reduction,
            stage: SearchStage::from_scale(cursor.first_scale_reduction, cursor.scale_reduction),
            window: *window,
            candidate,
            best,
            level_complete,
        });
    }
}
