//! Console rendering of merge progress and results.

use mergea3::{MergeReport, ProgressSnapshot, ACCEPTABLE_DEVIATION};

/// Turns the progress stream into one status line per search level.
#[derive(Debug, Default)]
pub struct StatusTracker {
    last: Option<(usize, usize)>,
}

impl StatusTracker {
    /// Returns a line when `snapshot` starts a new level or a new step.
    pub fn update(
        &mut self,
        snapshot: &ProgressSnapshot,
        expected_merges: usize,
    ) -> Option<String> {
        let key = (snapshot.fragment_index, snapshot.scale_reduction);
        if self.last == Some(key) {
            return None;
        }
        self.last = Some(key);

        Some(format!(
            "[{}/{}] {:>3.0}% {} - lowest deviation {}",
            snapshot.fragment_index + 1,
            expected_merges,
            snapshot.overall * 100.0,
            snapshot.status_line(),
            format_deviation(snapshot.best.deviation)
        ))
    }
}

pub fn verdict(deviation: f64) -> &'static str {
    if deviation < ACCEPTABLE_DEVIATION {
        "OK"
    } else {
        "Too high"
    }
}

fn format_deviation(deviation: f64) -> String {
    if deviation.is_finite() {
        format!("{:.1}", deviation)
    } else {
        "-".to_string()
    }
}

/// One line per merge step: placement, deviation and verdict.
pub fn summary(reports: &[MergeReport]) -> Vec<String> {
    reports
        .iter()
        .map(|report| {
            let c = &report.candidate;
            format!(
                "Step {}: dx={} dy={} angle={:.2} deviation {} {} ({} evaluations, {:.1}s)",
                report.fragment_index,
                c.dx,
                c.dy,
                c.angle,
                format_deviation(c.deviation),
                verdict(c.deviation),
                report.evaluations,
                report.elapsed.as_secs_f64()
            )
        })
        .collect()
}
