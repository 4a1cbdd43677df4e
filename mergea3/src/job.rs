//! Left/center/right merge on a dedicated worker thread.
//!
//! The worker publishes progress through a watch channel and hands the final
//! result back through a oneshot channel. Cancellation is cooperative: the
//! merger stops between evaluations and the job reports how far it got.

use std::sync::Arc;
use std::thread::JoinHandle;

use common::CancelToken;
use tokio::sync::{oneshot, watch};

use crate::config::MergeConfig;
use crate::error::{MergeError, Result};
use crate::merger::{MergeOutcome, MergeReport, Merger};
use crate::progress::{progress_channel, ProgressCallback, ProgressSnapshot};
use crate::raster::Raster;

const WORKER_NAME: &str = "mergea3-worker";

/// Final state of a merge job.
#[derive(Debug, Clone)]
pub enum JobOutcome {
    Completed {
        image: Arc<Raster>,
        reports: Vec<MergeReport>,
    },
    /// The working image as it stood after `completed_steps` merges.
    Cancelled {
        completed_steps: usize,
        image: Arc<Raster>,
    },
}

/// Fragments of one page, left to right.
#[derive(Debug, Clone)]
pub struct PageFragments {
    pub left: Raster,
    pub center: Raster,
    pub right: Raster,
}

pub struct MergeJob {
    handle: Option<JoinHandle<()>>,
    cancel: CancelToken,
    progress: watch::Receiver<Option<ProgressSnapshot>>,
    result: Option<oneshot::Receiver<Result<JobOutcome>>>,
}

impl MergeJob {
    pub fn spawn(
        fragments: PageFragments,
        scanner_correction: bool,
        config: MergeConfig,
    ) -> Result<Self> {
        let cancel = CancelToken::new();
        let (callback, progress) = progress_channel();
        let (tx, rx) = oneshot::channel();

        let worker_cancel = cancel.clone();
        let handle = std::thread::Builder::new()
            .name(WORKER_NAME.to_string())
            .spawn(move || {
                let result = run_sequence(
                    &fragments,
                    scanner_correction,
                    config,
                    callback,
                    worker_cancel,
                );
                if let Err(err) = &result {
                    tracing::error!(error = %err, "Merge job failed");
                }
                // The receiver is gone when the job handle was dropped.
                let _ = tx.send(result);
            })
            .map_err(|source| MergeError::WorkerSpawn { source })?;

        Ok(Self {
            handle: Some(handle),
            cancel,
            progress,
            result: Some(rx),
        })
    }

    /// Receiver holding the latest progress snapshot.
    pub fn progress(&self) -> watch::Receiver<Option<ProgressSnapshot>> {
        self.progress.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Blocks until the worker exits.
    pub fn wait(mut self) -> Result<JobOutcome> {
        if let Some(handle) = self.handle.take() {
            handle.join().map_err(|_| MergeError::WorkerStopped)?;
        }
        let mut rx = self.result.take().ok_or(MergeError::WorkerStopped)?;
        rx.try_recv().map_err(|_| MergeError::WorkerStopped)?
    }

    pub fn cancel_and_wait(self) -> Result<JobOutcome> {
        self.cancel();
        self.wait()
    }

    /// Awaits the result without blocking the runtime. The worker thread is
    /// joined on the blocking pool once the result has arrived.
    ///
    /// Dropping this future before it completes drops the job, and `Drop`
    /// joins the worker on the current thread. The worker stops at its next
    /// evaluation, so that join is short, but it does block an async worker.
    pub async fn finished(mut self) -> Result<JobOutcome> {
        let rx = self.result.take().ok_or(MergeError::WorkerStopped)?;
        let received = rx.await;

        if let Some(handle) = self.handle.take() {
            let joined = tokio::task::spawn_blocking(move || handle.join()).await;
            if !matches!(joined, Ok(Ok(()))) {
                tracing::warn!("Merge worker did not exit cleanly");
            }
        }
        received.map_err(|_| MergeError::WorkerStopped)?
    }
}

/// Cancels the worker and blocks until it exits.
impl Drop for MergeJob {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.cancel.cancel();
            let _ = handle.join();
        }
    }
}

fn run_sequence(
    fragments: &PageFragments,
    scanner_correction: bool,
    config: MergeConfig,
    callback: ProgressCallback,
    cancel: CancelToken,
) -> Result<JobOutcome> {
    let mut merger = Merger::new(&fragments.left, scanner_correction, config)?;
    merger.set_cancel_token(cancel);
    merger.set_progress_callback(callback);

    let mut reports = Vec::with_capacity(2);
    for fragment in [&fragments.center, &fragments.right] {
        match merger.merge_on_right(fragment, scanner_correction)? {
            MergeOutcome::Merged(report) => reports.push(report),
            MergeOutcome::Cancelled => {
                return Ok(JobOutcome::Cancelled {
                    completed_steps: reports.len(),
                    image: merger.current_working_image(),
                });
            }
        }
    }

    Ok(JobOutcome::Completed {
        image: merger.current_working_image(),
        reports,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchConfig;
    use crate::testing::textured_raster;

    fn fragments() -> PageFragments {
        let big = textured_raster(330, 130, 31);
        PageFragments {
            left: big.crop(0, 5, 150, 120),
            center: big.crop(100, 3, 150, 120),
            right: big.crop(200, 6, 130, 110),
        }
    }

    fn test_config() -> MergeConfig {
        MergeConfig {
            search: SearchConfig {
                first_scale_reduction: 4,
                min_level_size: 16,
                max_vertical_shift_fraction: 0.1,
                max_angle_degrees: 1.0,
                angle_step_degrees: 0.5,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_job_merges_three_fragments() {
        let job = MergeJob::spawn(fragments(), false, test_config()).unwrap();
        let progress = job.progress();

        match job.wait().unwrap() {
            JobOutcome::Completed { image, reports } => {
                assert_eq!(reports.len(), 2);
                assert_eq!(reports[0].fragment_index, 1);
                assert_eq!(reports[1].fragment_index, 2);
                assert!((image.width() as i64 - 330).abs() <= 2);
                assert!(reports.iter().all(|r| r.is_acceptable()));
            }
            JobOutcome::Cancelled { .. } => panic!("job was cancelled"),
        }

        let latest = progress.borrow().clone().unwrap();
        assert_eq!(latest.overall, 1.0);
        assert!(latest.level_complete);
    }

    #[test]
    fn test_cancelled_job_reports_progress_so_far() {
        let job = MergeJob::spawn(fragments(), false, test_config()).unwrap();
        job.cancel();

        match job.wait().unwrap() {
            JobOutcome::Cancelled {
                completed_steps,
                image,
            } => {
                assert!(completed_steps <= 2);
                assert!(image.width() >= 150);
            }
            // The worker may finish before it sees the flag.
            JobOutcome::Completed { reports, .. } => assert_eq!(reports.len(), 2),
        }
    }

    #[test]
    fn test_cancel_before_first_step_keeps_left_fragment() {
        let fragments = fragments();
        let left = fragments.left.clone();

        let mut config = test_config();
        // A large window keeps the worker busy long enough to observe the flag.
        config.search.max_angle_degrees = 5.0;
        config.search.angle_step_degrees = 0.05;

        let job = MergeJob::spawn(fragments, false, config).unwrap();
        let mut progress = job.progress();
        // Wait for the first snapshot so the flag lands inside the first step.
        while progress.borrow_and_update().is_none() {
            std::thread::yield_now();
        }

        match job.cancel_and_wait().unwrap() {
            JobOutcome::Cancelled {
                completed_steps,
                image,
            } => {
                assert_eq!(completed_steps, 0);
                assert_eq!(*image, left);
            }
            JobOutcome::Completed { .. } => panic!("job finished despite cancellation"),
        }
    }

    #[test]
    fn test_invalid_fragment_is_reported() {
        let mut fragments = fragments();
        fragments.center = Raster::filled(0, 0, [0, 0, 0]);
        let job = MergeJob::spawn(fragments, false, test_config()).unwrap();
        assert!(matches!(job.wait(), Err(MergeError::EmptyFragment { .. })));
    }

    #[tokio::test]
    async fn test_finished_awaits_result() {
        let job = MergeJob::spawn(fragments(), false, test_config()).unwrap();
        let mut progress = job.progress();

        let outcome = job.finished().await.unwrap();
        assert!(matches!(outcome, JobOutcome::Completed { .. }));

        // The watch channel saw at least one snapshot.
        assert!(progress.borrow_and_update().is_some());
        // The worker has exited and dropped its sender.
        assert!(progress.changed().await.is_err());
    }

    #[tokio::test]
    async fn test_finished_after_cancel_on_current_thread_runtime() {
        let job = MergeJob::spawn(fragments(), false, test_config()).unwrap();
        job.cancel();
        match job.finished().await.unwrap() {
            JobOutcome::Cancelled {
                completed_steps, ..
            } => assert!(completed_steps <= 2),
            JobOutcome::Completed { reports, .. } => assert_eq!(reports.len(), 2),
        }
    }
}
