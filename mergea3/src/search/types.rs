//! Value types produced and consumed by the alignment search.

use std::time::Duration;

/// Deviations below this value are considered a good match. Advisory only:
/// the search never rejects a candidate because of it.
pub const ACCEPTABLE_DEVIATION: f64 = 100.0;

const ANGLE_EPSILON: f64 = 1e-9;

/// Placement of the incoming fragment over the working image, in the pixel
/// units of one pyramid level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    /// Column of the incoming fragment's top-left corner.
    pub dx: i64,
    /// Row of the incoming fragment's top-left corner.
    pub dy: i64,
    /// Rotation in degrees around the midpoint of the fragment's left edge.
    pub angle: f64,
    /// Mean squared luminance difference of the overlap.
    pub deviation: f64,
}

impl Candidate {
    pub fn unscored(dx: i64, dy: i64, angle: f64) -> Self {
        Self {
            dx,
            dy,
            angle,
            deviation: f64::INFINITY,
        }
    }

    #[inline]
    pub fn is_acceptable(&self) -> bool {
        self.deviation < ACCEPTABLE_DEVIATION
    }

    /// Same candidate with offsets multiplied by `ratio`, for use at a finer
    /// level.
    pub fn scaled(&self, ratio: usize) -> Self {
        Self {
            dx: self.dx * ratio as i64,
            dy: self.dy * ratio as i64,
            ..*self
        }
    }
}

/// Inclusive offset ranges and an angle range explored at one level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchWindow {
    pub x_min: i64,
    pub x_max: i64,
    pub y_min: i64,
    pub y_max: i64,
    pub angle_min: f64,
    pub angle_max: f64,
    /// Angle enumeration starts here and walks outwards.
    pub angle_center: f64,
    pub angle_step: f64,
}

impl SearchWindow {
    pub fn is_empty(&self) -> bool {
        self.x_min > self.x_max || self.y_min > self.y_max || self.angle_min > self.angle_max
    }

    pub fn contains(&self, dx: i64, dy: i64) -> bool {
        (self.x_min..=self.x_max).contains(&dx) && (self.y_min..=self.y_max).contains(&dy)
    }

    pub fn width(&self) -> usize {
        (self.x_max - self.x_min + 1).max(0) as usize
    }

    pub fn height(&self) -> usize {
        (self.y_max - self.y_min + 1).max(0) as usize
    }

    /// Angles in evaluation order: the center first, then `center - k*step`,
    /// `center + k*step` for growing `k`, staying inside the range.
    pub fn angles(&self) -> Vec<f64> {
        if self.angle_min > self.angle_max {
            return Vec::new();
        }

        let mut angles = vec![self.angle_center];
        if self.angle_step <= 0.0 {
            return angles;
        }

        let mut k = 1usize;
        loop {
            let offset = k as f64 * self.angle_step;
            let below = self.angle_center - offset;
            let above = self.angle_center + offset;
            let below_fits = below >= self.angle_min - ANGLE_EPSILON;
            let above_fits = above <= self.angle_max + ANGLE_EPSILON;
            if !below_fits && !above_fits {
                break;
            }
            if below_fits {
                angles.push(below);
            }
            if above_fits {
                angles.push(above);
            }
            k += 1;
        }
        angles
    }

    /// Number of evaluations the window takes.
    pub fn candidate_count(&self) -> usize {
        self.width() * self.height() * self.angles().len()
    }
}

/// Outcome of one pyramid level.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelResult {
    pub scale_reduction: usize,
    pub window: SearchWindow,
    /// Lowest-deviation candidate of this level; the next window is centered
    /// on it.
    pub best: Candidate,
    /// Lowest deviation of the step up to and including this level, in this
    /// level's units. Never increases from one level to the next.
    pub best_so_far: Candidate,
    /// Whether this level told its angles apart. Finer levels keep the whole
    /// angle range until one does.
    pub angles_resolved: bool,
    pub evaluations: usize,
    pub elapsed: Duration,
}

/// Outcome of a completed search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    /// Best candidate of the full-resolution level, with its full-resolution
    /// deviation.
    pub best: Candidate,
    /// Per-level trace, coarsest first.
    pub levels: Vec<LevelResult>,
    pub evaluations: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Found(SearchResult),
    Cancelled,
}
