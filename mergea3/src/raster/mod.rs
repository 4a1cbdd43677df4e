//! Owned RGB raster used for fragments, the working image and the merge output.

mod io;


use common::Buffer2;
use rayon::prelude::*;

pub use io::SUPPORTED_EXTENSIONS;

/// 8-bit RGB pixel.
pub type Rgb = [u8; 3];

/// Single-channel luminance plane (0..255 range) used by the search.
pub type Plane = Buffer2<f32>;

/// Rec. 601 luma of an RGB pixel.
#[inline]
pub fn luma(pixel: Rgb) -> f32 {
    0.299 * pixel[0] as f32 + 0.587 * pixel[1] as f32 + 0.114 * pixel[2] as f32
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    buffer: Buffer2<Rgb>,
}

impl Raster {
    pub fn new(width: usize, height: usize, pixels: Vec<Rgb>) -> Self {
        Self {
            buffer: Buffer2::new(width, height, pixels),
        }
    }

    pub fn filled(width: usize, height: usize, color: Rgb) -> Self {
        Self {
            buffer: Buffer2::new_filled(width, height, color),
        }
    }

    pub fn from_fn<F>(width: usize, height: usize, f: F) -> Self
    where
        F: FnMut(usize, usize) -> Rgb,
    {
        Self {
            buffer: Buffer2::from_fn(width, height, f),
        }
    }

    /// Grey raster whose pixels all carry the luminance of the plane.
    pub fn from_plane(plane: &Plane) -> Self {
        Self {
            buffer: plane.map(|&v| {
                let v = v.round().clamp(0.0, 255.0) as u8;
                [v, v, v]
            }),
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.buffer.width()
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.buffer.height()
    }

    /// True when the raster has zero area.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Rgb {
        *self.buffer.get(x, y)
    }

    #[inline]
    pub fn try_get(&self, x: i64, y: i64) -> Option<Rgb> {
        self.buffer.try_get(x, y).copied()
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, pixel: Rgb) {
        *self.buffer.get_mut(x, y) = pixel;
    }

    #[inline]
    pub fn row(&self, y: usize) -> &[Rgb] {
        self.buffer.row(y)
    }

    #[inline]
    pub fn pixels(&self) -> &[Rgb] {
        self.buffer.pixels()
    }

    #[inline]
    pub(crate) fn pixels_mut(&mut self) -> &mut [Rgb] {
        self.buffer.pixels_mut()
    }

    pub fn crop(&self, x: usize, y: usize, width: usize, height: usize) -> Self {
        Self {
            buffer: self.buffer.crop(x, y, width, height),
        }
    }

    /// Luminance plane of the raster, computed row-parallel.
    pub fn luminance(&self) -> Plane {
        let width = self.width();
        let mut values = vec![0.0f32; self.buffer.len()];
        if width > 0 {
            values
                .par_chunks_mut(width)
                .zip(self.pixels().par_chunks(width))
                .for_each(|(dst, src)| {
                    for (d, &s) in dst.iter_mut().zip(src) {
                        *d = luma(s);
                    }
                });
        }
        Plane::new(width, self.height(), values)
    }

    pub fn from_rgb_image(image: &image::RgbImage) -> Self {
        let (width, height) = image.dimensions();
        let pixels = image.pixels().map(|p| p.0).collect();
        Self::new(width as usize, height as usize, pixels)
    }

    pub fn from_dynamic_image(image: &image::DynamicImage) -> Self {
        Self::from_rgb_image(&image.to_rgb8())
    }

    pub fn to_rgb_image(&self) -> image::RgbImage {
        let bytes: Vec<u8> = self.pixels().iter().flatten().copied().collect();
        image::RgbImage::from_raw(self.width() as u32, self.height() as u32, bytes)
            .expect("raster byte length always matches its dimensions")
    }
}
