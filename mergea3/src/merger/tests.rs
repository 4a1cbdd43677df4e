use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::*;
use crate::config::SearchConfig;
use crate::progress::ProgressSnapshot;
use crate::testing::{shifted_pair, textured_raster};

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

fn pair() -> (Raster, Raster) {
    let big = textured_raster(243, 140, 21);
    shifted_pair(&big, 150, 120, 8, 93, 5)
}

fn merged(outcome: MergeOutcome) -> MergeReport {
    match outcome {
        MergeOutcome::Merged(report) => report,
        MergeOutcome::Cancelled => panic!("merge was cancelled"),
    }
}

#[test]
fn test_new_rejects_empty_fragment() {
    let err = Merger::new(&Raster::filled(0, 10, [0, 0, 0]), false, test_config()).unwrap_err();
    assert!(matches!(
        err,
        MergeError::EmptyFragment {
            width: 0,
            height: 10
        }
    ));
}

#[test]
fn test_new_rejects_invalid_config() {
    let config = MergeConfig {
        expected_merges: 0,
        ..test_config()
    };
    let err = Merger::new(&textured_raster(50, 50, 1), false, config).unwrap_err();
    assert!(matches!(err, MergeError::InvalidConfig(_)));
}

#[test]
fn test_working_image_starts_as_first_fragment() {
    let (a, _) = pair();
    let merger = Merger::new(&a, false, test_config()).unwrap();
    assert_eq!(*merger.current_working_image(), a);
    assert_eq!(merger.state(), MergeState::Idle);
    assert_eq!(merger.merges_done(), 0);
}

#[test]
fn test_scanner_correction_applies_to_first_fragment() {
    let (a, _) = pair();
    let merger = Merger::new(&a, true, test_config()).unwrap();
    let working = merger.current_working_image();
    assert_eq!((working.width(), working.height()), (a.width(), a.height()));
    assert_ne!(*working, a);
}

#[test]
fn test_merge_extends_working_image() {
    let (a, b) = pair();
    let mut merger = Merger::new(&a, false, test_config()).unwrap();
    let report = merged(merger.merge_on_right(&b, false).unwrap());

    assert!((report.candidate.dx - 93).abs() <= 1);
    assert!((report.candidate.dy - 5).abs() <= 1);
    assert!(report.is_acceptable());
    assert_eq!(report.fragment_index, 1);
    assert_eq!(report.first_scale_reduction, 4);
    assert_eq!(report.levels.len(), 3);

    let working = merger.current_working_image();
    let expected = (a.width() + b.width() - report.overlap_width) as i64;
    assert!((working.width() as i64 - expected).abs() <= 1);
    assert_eq!((report.width, report.height), (working.width(), working.height()));
    assert_eq!(merger.merges_done(), 1);
    assert_eq!(merger.state(), MergeState::Idle);

    // Columns left of the overlap are the first fragment's.
    for y in 0..a.height() {
        assert_eq!(working.row(y)[..80], a.row(y)[..80]);
    }
}

#[test]
fn test_snapshot_survives_later_merges() {
    let (a, b) = pair();
    let mut merger = Merger::new(&a, false, test_config()).unwrap();
    let before = merger.current_working_image();

    merged(merger.merge_on_right(&b, false).unwrap());

    assert_eq!(*before, a);
    assert!(!Arc::ptr_eq(&before, &merger.current_working_image()));
}

#[test]
fn test_empty_next_fragment_leaves_working_image() {
    let (a, _) = pair();
    let mut merger = Merger::new(&a, false, test_config()).unwrap();
    let before = merger.current_working_image();

    let err = merger
        .merge_on_right(&Raster::filled(10, 0, [0, 0, 0]), false)
        .unwrap_err();
    assert!(matches!(err, MergeError::EmptyFragment { .. }));
    assert!(Arc::ptr_eq(&before, &merger.current_working_image()));
    assert_eq!(merger.merges_done(), 0);
}

#[test]
fn test_cancel_mid_step_leaves_working_image_unchanged() {
    let (a, b) = pair();
    let mut merger = Merger::new(&a, false, test_config()).unwrap();
    let before = merger.current_working_image();

    let token = merger.cancel_token();
    let evaluations = Arc::new(AtomicUsize::new(0));
    let counter = evaluations.clone();
    merger.set_progress_callback(ProgressCallback::new(move |_| {
        if counter.fetch_add(1, Ordering::SeqCst) == 50 {
            token.cancel();
        }
    }));

    let outcome = merger.merge_on_right(&b, false).unwrap();
    assert_eq!(outcome, MergeOutcome::Cancelled);
    assert!(Arc::ptr_eq(&before, &merger.current_working_image()));
    assert_eq!(*merger.current_working_image(), a);
    assert_eq!(merger.merges_done(), 0);
    assert_eq!(merger.state(), MergeState::Idle);
    assert_eq!(evaluations.load(Ordering::SeqCst), 51);
}

#[test]
fn test_cancel_token_is_not_reset_automatically() {
    let (a, b) = pair();
    let mut merger = Merger::new(&a, false, test_config()).unwrap();

    merger.cancel_token().cancel();
    assert_eq!(merger.merge_on_right(&b, false).unwrap(), MergeOutcome::Cancelled);
    assert_eq!(merger.merge_on_right(&b, false).unwrap(), MergeOutcome::Cancelled);

    merger.cancel_token().reset();
    merged(merger.merge_on_right(&b, false).unwrap());
    assert_eq!(merger.merges_done(), 1);
}

#[test]
fn test_state_traverses_search_levels() {
    let (a, b) = pair();
    let mut merger = Merger::new(&a, false, test_config()).unwrap();
    let mut states = merger.subscribe_state();
    assert!(!states.has_changed().unwrap());

    merged(merger.merge_on_right(&b, false).unwrap());

    assert!(states.has_changed().unwrap());
    assert_eq!(*states.borrow_and_update(), MergeState::Idle);
}

#[test]
fn test_progress_is_scaled_by_fragment_index() {
    let big = textured_raster(330, 130, 22);
    let left = big.crop(0, 5, 150, 120);
    let center = big.crop(100, 3, 150, 120);
    let right = big.crop(200, 6, 130, 110);

    let mut merger = Merger::new(&left, false, test_config()).unwrap();
    let seen: Arc<Mutex<Vec<ProgressSnapshot>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    merger.set_progress_callback(ProgressCallback::new(move |s| {
        sink.lock().unwrap().push(s.clone())
    }));

    merged(merger.merge_on_right(&center, false).unwrap());
    let first_step: Vec<ProgressSnapshot> = std::mem::take(&mut *seen.lock().unwrap());
    merged(merger.merge_on_right(&right, false).unwrap());
    let second_step = seen.lock().unwrap().clone();

    assert!(first_step.iter().all(|s| s.fragment_index == 0 && s.overall <= 0.5));
    assert!(second_step.iter().all(|s| s.fragment_index == 1 && s.overall >= 0.5));
    assert_eq!(second_step.last().unwrap().overall, 1.0);

    let working = merger.current_working_image();
    assert!((working.width() as i64 - 330).abs() <= 2, "width {}", working.width());
}

#[test]
fn test_unscorable_fragment_fails_without_mutation() {
    let first = textured_raster(6, 6, 8);
    let mut merger = Merger::new(&first, false, test_config()).unwrap();
    let progress = Arc::new(AtomicUsize::new(0));
    let counter = progress.clone();
    merger.set_progress_callback(ProgressCallback::new(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    let err = merger
        .merge_on_right(&textured_raster(6, 6, 9), false)
        .unwrap_err();

    assert!(matches!(
        err,
        MergeError::NoScorableCandidate {
            scale_reduction: 1,
            ..
        }
    ));
    assert_eq!(*merger.current_working_image(), first);
    assert_eq!(merger.merges_done(), 0);
    assert_eq!(merger.state(), MergeState::Idle);
    assert!(progress.load(Ordering::SeqCst) > 0);
}
