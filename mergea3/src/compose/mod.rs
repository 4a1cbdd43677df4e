//! Stitches the incoming fragment onto the working image.
//!
//! The canvas is the union of the working image at the origin and the
//! bounding box of the placed (and possibly rotated) fragment. Every canvas
//! pixel takes the working-image pixel, the inverse-mapped fragment pixel, or
//! the background, with one side winning the overlap. There is no blending.


use rayon::prelude::*;

use crate::config::{ComposeConfig, OverlapPriority};
use crate::geometry::Placement;
use crate::raster::Raster;
use crate::search::Candidate;

/// Geometry of the merged canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanvasLayout {
    pub width: usize,
    pub height: usize,
    /// Canvas position of the working image's top-left corner.
    pub offset_x: i64,
    pub offset_y: i64,
    /// Width of the horizontal span shared by both rasters.
    pub overlap_width: usize,
}

pub fn canvas_layout(width_a: usize, height_a: usize, placement: &Placement) -> CanvasLayout {
    let (bx0, by0, bx1, by1) = placement.bounds();
    let (width_a, height_a) = (width_a as i64, height_a as i64);

    let x0 = bx0.min(0);
    let y0 = by0.min(0);
    let x1 = bx1.max(width_a);
    let y1 = by1.max(height_a);

    CanvasLayout {
        width: (x1 - x0) as usize,
        height: (y1 - y0) as usize,
        offset_x: -x0,
        offset_y: -y0,
        overlap_width: (bx1.min(width_a) - bx0.max(0)).max(0) as usize,
    }
}

/// Merges `b` onto `a` at `candidate` (full-resolution units).
pub fn compose(a: &Raster, b: &Raster, candidate: &Candidate, config: &ComposeConfig) -> Raster {
    let placement = Placement::new(
        candidate.dx,
        candidate.dy,
        candidate.angle,
        b.width(),
        b.height(),
    );
    let layout = canvas_layout(a.width(), a.height(), &placement);
    let mut canvas = Raster::filled(layout.width, layout.height, config.background);
    if layout.width == 0 {
        return canvas;
    }

    canvas
        .pixels_mut()
        .par_chunks_mut(layout.width)
        .enumerate()
        .for_each(|(cy, row)| {
            let y = cy as i64 - layout.offset_y;
            for (cx, pixel) in row.iter_mut().enumerate() {
                let x = cx as i64 - layout.offset_x;
                let existing = a.try_get(x, y);
                let incoming = placement.covered(x, y).map(|(u, v)| b.get(u, v));

                let chosen = match config.overlap_priority {
                    OverlapPriority::Incoming => incoming.or(existing),
                    OverlapPriority::Existing => existing.or(incoming),
                };
                if let Some(value) = chosen {
                    *pixel = value;
                }
            }
        });

    tracing::debug!(
        width = layout.width,
        height = layout.height,
        overlap = layout.overlap_width,
        "Composed canvas"
    );

    canvas
}
