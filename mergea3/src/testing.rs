//! Synthetic fragments shared by the unit tests.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::geometry::Placement;
use crate::raster::{Plane, Raster};

/// Deterministic paper-like texture: blocks of 8 and 3 pixels plus per-pixel
/// noise, with distinct colour channels.
pub fn textured_raster(width: usize, height: usize, seed: u64) -> Raster {
    let mut rng = StdRng::seed_from_u64(seed);

    let coarse_w = width.div_ceil(8);
    let coarse: Vec<u8> = (0..coarse_w * height.div_ceil(8))
        .map(|_| rng.random())
        .collect();
    let fine_w = width.div_ceil(3);
    let fine: Vec<u8> = (0..fine_w * height.div_ceil(3))
        .map(|_| rng.random())
        .collect();
    let noise: Vec<u8> = (0..width * height)
        .map(|_| rng.random_range(0..32))
        .collect();

    Raster::from_fn(width, height, |x, y| {
        let c = coarse[(y / 8) * coarse_w + x / 8] as u32;
        let f = fine[(y / 3) * fine_w + x / 3] as u32;
        let n = noise[y * width + x] as u32;
        let v = (c * 5 + f * 3) / 8 + n / 2;
        [
            v.min(255) as u8,
            ((v + c) / 2).min(255) as u8,
            ((v + f) / 2).min(255) as u8,
        ]
    })
}

pub fn textured_plane(width: usize, height: usize, seed: u64) -> Plane {
    textured_raster(width, height, seed).luminance()
}

/// Two overlapping windows of one texture: `a` is `big[0..width_a)` over rows
/// `[y0, y0 + height)`, `b` starts at `(dx0, y0 + dy0)` and runs to the
/// texture's right edge. The true placement of `b` over `a` is `(dx0, dy0)`.
pub fn shifted_pair(
    big: &Raster,
    width_a: usize,
    height: usize,
    y0: usize,
    dx0: usize,
    dy0: usize,
) -> (Raster, Raster) {
    let a = big.crop(0, y0, width_a, height);
    let b = big.crop(dx0, y0 + dy0, big.width() - dx0, height);
    (a, b)
}

/// Like [`shifted_pair`] with `a` spanning `width_a` columns and `b` a
/// `width_b`-wide fragment whose true placement over `a` is
/// `(dx0, dy0, angle_degrees)`. Each pixel of `b` is the texture sample
/// nearest to where the placement puts it.
#[allow(clippy::too_many_arguments)]
pub fn rotated_pair(
    big: &Raster,
    width_a: usize,
    width_b: usize,
    height: usize,
    y0: usize,
    dx0: usize,
    dy0: usize,
    angle_degrees: f64,
) -> (Raster, Raster) {
    let a = big.crop(0, y0, width_a, height);
    let placement = Placement::new(dx0 as i64, dy0 as i64, angle_degrees, width_b, height);

    let max_x = big.width() as i64 - 1;
    let max_y = big.height() as i64 - 1;
    let b = Raster::from_fn(width_b, height, |u, v| {
        let p = placement.to_existing(u as f64, v as f64);
        let x = (p.x.round() as i64).clamp(0, max_x);
        let y = (p.y.round() as i64 + y0 as i64).clamp(0, max_y);
        big.get(x as usize, y as usize)
    });
    (a, b)
}
