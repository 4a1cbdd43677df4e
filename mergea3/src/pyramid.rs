//! Scale pyramid of luminance planes.
//!
//! Level `i` holds the plane downsampled by `factors[i]` with an area-average
//! (box) filter. Factors decrease strictly to 1 and each factor is an integer
//! multiple of the next one, so a position found at one level maps to the
//! next by plain integer scaling. Partial blocks at the right and bottom edges
//! are dropped: block `i` at factor `f` covers exactly the full-resolution
//! pixels `[i * f, (i + 1) * f)`.

use rayon::prelude::*;

use crate::raster::{Plane, Raster};

#[derive(Debug, Clone)]
pub struct PyramidLevel {
    pub scale_reduction: usize,
    pub plane: Plane,
}

#[derive(Debug, Clone)]
pub struct Pyramid {
    levels: Vec<PyramidLevel>,
}

impl Pyramid {
    /// Levels ordered coarsest first; the last level is full resolution.
    pub fn levels(&self) -> &[PyramidLevel] {
        &self.levels
    }

    pub fn first_scale_reduction(&self) -> usize {
        self.levels[0].scale_reduction
    }

    pub fn full_resolution(&self) -> &Plane {
        &self.levels[self.levels.len() - 1].plane
    }
}

/// Reduction factors starting at `start_reduction`: halve while even, then
/// jump straight to 1. `12 -> [12, 6, 3, 1]`, `16 -> [16, 8, 4, 2, 1]`.
pub fn reduction_factors(start_reduction: usize) -> Vec<usize> {
    let mut factors = Vec::new();
    let mut factor = start_reduction.max(1);
    while factor > 1 {
        factors.push(factor);
        factor = if factor % 2 == 0 { factor / 2 } else { 1 };
    }
    factors.push(1);
    factors
}

/// Largest factor of `reduction_factors(requested)` at which every raster in
/// `dimensions` still has at least `min_level_size` pixels per side.
pub fn effective_start_reduction(
    requested: usize,
    dimensions: &[(usize, usize)],
    min_level_size: usize,
) -> usize {
    reduction_factors(requested)
        .into_iter()
        .find(|&factor| {
            dimensions
                .iter()
                .all(|&(w, h)| w / factor >= min_level_size && h / factor >= min_level_size)
        })
        .unwrap_or(1)
}

pub fn build_pyramid(raster: &Raster, start_reduction: usize) -> Pyramid {
    build_plane_pyramid(raster.luminance(), start_reduction)
}

pub fn build_plane_pyramid(full: Plane, start_reduction: usize) -> Pyramid {
    let factors = reduction_factors(start_reduction);
    let mut levels: Vec<PyramidLevel> = factors[..factors.len() - 1]
        .iter()
        .map(|&factor| PyramidLevel {
            scale_reduction: factor,
            plane: downsample(&full, factor),
        })
        .collect();
    levels.push(PyramidLevel {
        scale_reduction: 1,
        plane: full,
    });

    tracing::trace!(
        factors = ?factors,
        width = levels[levels.len() - 1].plane.width(),
        height = levels[levels.len() - 1].plane.height(),
        "Built pyramid"
    );

    Pyramid { levels }
}

/// Area-average downsampling by an integer factor.
pub fn downsample(plane: &Plane, factor: usize) -> Plane {
    assert!(factor > 0, "downsample factor must be positive");
    if factor == 1 {
        return plane.clone();
    }

    let new_width = plane.width() / factor;
    let new_height = plane.height() / factor;
    let mut values = vec![0.0f32; new_width * new_height];
    if new_width == 0 || new_height == 0 {
        return Plane::new(new_width, new_height, values);
    }

    let inv_area = 1.0 / (factor * factor) as f32;

    values
        .par_chunks_mut(new_width)
        .enumerate()
        .for_each(|(ny, out_row)| {
            for (nx, out) in out_row.iter_mut().enumerate() {
                let mut sum = 0.0f32;
                for sy in ny * factor..(ny + 1) * factor {
                    let row = plane.row(sy);
                    sum += row[nx * factor..(nx + 1) * factor].iter().sum::<f32>();
                }
                *out = sum * inv_area;
            }
        });

    Plane::new(new_width, new_height, values)
}
