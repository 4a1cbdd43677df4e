//! Scanner (left-edge) correction.
//!
//! A bound page pressed on a flatbed bows near the spine, which squeezes the
//! content at the fragment's left edge more in the middle rows than at the top
//! and bottom. The corrector applies a parabolic horizontal shear in a band at
//! the left edge: the middle row is pulled the furthest, the first and last
//! rows not at all, and the displacement fades linearly to zero at the band's
//! inner edge.

use std::borrow::Cow;

use rayon::prelude::*;

use crate::config::SkewConfig;
use crate::raster::Raster;

#[derive(Debug, Clone)]
pub struct SkewCorrector {
    config: Option<SkewConfig>,
}

impl SkewCorrector {
    pub fn new(config: SkewConfig, enabled: bool) -> Self {
        Self {
            config: enabled.then_some(config),
        }
    }

    pub fn disabled() -> Self {
        Self { config: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.is_some()
    }

    /// Returns the corrected raster, or the input untouched when correction
    /// is disabled or the band is empty.
    pub fn correct<'a>(&self, raster: &'a Raster) -> Cow<'a, Raster> {
        let Some(config) = &self.config else {
            return Cow::Borrowed(raster);
        };

        let width = raster.width();
        let height = raster.height();
        let band = (config.band_fraction * width as f64).round() as usize;
        let max_shift = config.max_shift_fraction * width as f64;
        if band == 0 || max_shift == 0.0 || height == 0 {
            return Cow::Borrowed(raster);
        }

        let center = (height as f64 - 1.0) / 2.0;
        let mut corrected = raster.clone();

        corrected
            .pixels_mut()
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(y, row)| {
                let bow = bow(y, center);
                if bow == 0.0 {
                    return;
                }
                let src = raster.row(y);
                for (x, pixel) in row.iter_mut().enumerate().take(band) {
                    let fade = 1.0 - x as f64 / band as f64;
                    let sx = (x as f64 + max_shift * bow * fade).round() as usize;
                    *pixel = src[sx.min(width - 1)];
                }
            });

        Cow::Owned(corrected)
    }
}

/// Parabolic profile: 1 at the middle row, 0 at the first and last rows.
#[inline]
fn bow(y: usize, center: f64) -> f64 {
    if center <= 0.0 {
        return 0.0;
    }
    let t = (y as f64 - center) / center;
    (1.0 - t * t).max(0.0)
}
