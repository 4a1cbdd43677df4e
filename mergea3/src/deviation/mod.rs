//! Dissimilarity of two luminance planes under a candidate placement.
//!
//! The score is the mean squared luminance difference over the pixels of `a`
//! that the placed `b` covers. Pixels outside either plane are excluded, so
//! candidates with different overlap sizes stay comparable.


use rayon::prelude::*;

use crate::geometry::Placement;
use crate::raster::{Plane, Raster};

/// Scores candidate placements of `b` over `a`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviationScorer {
    min_overlap_pixels: usize,
}

impl Default for DeviationScorer {
    fn default() -> Self {
        Self::new(1)
    }
}

impl DeviationScorer {
    /// Overlaps with fewer samples than `min_overlap_pixels` score infinity.
    pub fn new(min_overlap_pixels: usize) -> Self {
        Self {
            min_overlap_pixels: min_overlap_pixels.max(1),
        }
    }

    pub fn min_overlap_pixels(&self) -> usize {
        self.min_overlap_pixels
    }

    /// Mean squared difference between `a` and `b` placed with its top-left
    /// corner at `(dx, dy)` and rotated by `angle_degrees`. Lower is better.
    pub fn score(&self, a: &Plane, b: &Plane, dx: i64, dy: i64, angle_degrees: f64) -> f64 {
        let placement = Placement::new(dx, dy, angle_degrees, b.width(), b.height());
        let (bx0, by0, bx1, by1) = placement.bounds();

        let x_start = bx0.max(0);
        let x_end = bx1.min(a.width() as i64);
        let y_start = by0.max(0);
        let y_end = by1.min(a.height() as i64);
        if x_start >= x_end || y_start >= y_end {
            return f64::INFINITY;
        }

        let rows: Vec<(f64, usize)> = (y_start..y_end)
            .into_par_iter()
            .map(|y| {
                if placement.is_axis_aligned() {
                    shifted_row(a, b, &placement, y, x_start, x_end)
                } else {
                    rotated_row(a, b, &placement, y, x_start, x_end)
                }
            })
            .collect();

        // Summed in row order so the result does not depend on scheduling.
        let (sum, count) = rows
            .iter()
            .fold((0.0f64, 0usize), |(s, c), &(rs, rc)| (s + rs, c + rc));

        if count < self.min_overlap_pixels {
            return f64::INFINITY;
        }
        sum / count as f64
    }

    /// Scores two rasters by their luminance.
    pub fn score_rasters(
        &self,
        a: &Raster,
        b: &Raster,
        dx: i64,
        dy: i64,
        angle_degrees: f64,
    ) -> f64 {
        self.score(&a.luminance(), &b.luminance(), dx, dy, angle_degrees)
    }
}

/// Mean squared difference with the default scorer (any non-empty overlap
/// counts).
pub fn score(a: &Plane, b: &Plane, dx: i64, dy: i64, angle_degrees: f64) -> f64 {
    DeviationScorer::default().score(a, b, dx, dy, angle_degrees)
}

/// Row of an axis-aligned placement: `[x_start, x_end)` lies inside both
/// planes, so whole slices are compared.
#[inline]
fn shifted_row(
    a: &Plane,
    b: &Plane,
    placement: &Placement,
    y: i64,
    x_start: i64,
    x_end: i64,
) -> (f64, usize) {
    let (u_start, v) = placement.to_incoming(x_start, y);
    let len = (x_end - x_start) as usize;
    let a_row = &a.row(y as usize)[x_start as usize..x_end as usize];
    let b_row = &b.row(v as usize)[u_start as usize..u_start as usize + len];

    let sum = a_row
        .iter()
        .zip(b_row)
        .map(|(&pa, &pb)| {
            let d = (pa - pb) as f64;
            d * d
        })
        .sum();
    (sum, len)
}

#[inline]
fn rotated_row(
    a: &Plane,
    b: &Plane,
    placement: &Placement,
    y: i64,
    x_start: i64,
    x_end: i64,
) -> (f64, usize) {
    let a_row = a.row(y as usize);
    let mut sum = 0.0f64;
    let mut count = 0usize;
    for x in x_start..x_end {
        if let Some((u, v)) = placement.covered(x, y) {
            let d = (a_row[x as usize] - *b.get(u, v)) as f64;
            sum += d * d;
            count += 1;
        }
    }
    (sum, count)
}
