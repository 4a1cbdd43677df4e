//! Placement of the incoming raster in the working image's frame.
//!
//! The incoming raster's top-left corner sits at `(dx, dy)` and the raster is
//! rotated by `angle` degrees (counter-clockwise in image coordinates, y down)
//! around the midpoint of its left edge.

use glam::DVec2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    dx: i64,
    dy: i64,
    angle_degrees: f64,
    width: usize,
    height: usize,
    pivot: DVec2,
    cos: f64,
    sin: f64,
}

impl Placement {
    pub fn new(dx: i64, dy: i64, angle_degrees: f64, width: usize, height: usize) -> Self {
        let (sin, cos) = angle_degrees.to_radians().sin_cos();
        Self {
            dx,
            dy,
            angle_degrees,
            width,
            height,
            pivot: DVec2::new(0.0, (height as f64 - 1.0).max(0.0) / 2.0),
            cos,
            sin,
        }
    }

    #[inline]
    pub fn is_axis_aligned(&self) -> bool {
        self.angle_degrees == 0.0
    }

    /// Incoming-raster pixel (nearest) that lands on `(x, y)` of the working
    /// frame. The result may lie outside the incoming raster.
    #[inline]
    pub fn to_incoming(&self, x: i64, y: i64) -> (i64, i64) {
        if self.is_axis_aligned() {
            return (x - self.dx, y - self.dy);
        }

        let p = DVec2::new((x - self.dx) as f64, (y - self.dy) as f64) - self.pivot;
        let q = DVec2::new(
            self.cos * p.x + self.sin * p.y,
            -self.sin * p.x + self.cos * p.y,
        ) + self.pivot;

        (q.x.round() as i64, q.y.round() as i64)
    }

    /// Working-frame position of the incoming-raster point `(u, v)`.
    #[inline]
    pub fn to_existing(&self, u: f64, v: f64) -> DVec2 {
        let q = DVec2::new(u, v) - self.pivot;
        let p = DVec2::new(
            self.cos * q.x - self.sin * q.y,
            self.sin * q.x + self.cos * q.y,
        );
        p + self.pivot + DVec2::new(self.dx as f64, self.dy as f64)
    }

    /// Half-open bounding box `(x_min, y_min, x_end, y_end)` of the placed
    /// raster in the working frame.
    pub fn bounds(&self) -> (i64, i64, i64, i64) {
        if self.is_axis_aligned() {
            return (
                self.dx,
                self.dy,
                self.dx + self.width as i64,
                self.dy + self.height as i64,
            );
        }

        let max_u = self.width.saturating_sub(1) as f64;
        let max_v = self.height.saturating_sub(1) as f64;
        let corners = [
            self.to_existing(0.0, 0.0),
            self.to_existing(max_u, 0.0),
            self.to_existing(0.0, max_v),
            self.to_existing(max_u, max_v),
        ];

        let min = corners.iter().fold(DVec2::splat(f64::MAX), |acc, c| acc.min(*c));
        let max = corners.iter().fold(DVec2::splat(f64::MIN), |acc, c| acc.max(*c));

        (
            min.x.round() as i64,
            min.y.round() as i64,
            max.x.round() as i64 + 1,
            max.y.round() as i64 + 1,
        )
    }

    /// Whether the working-frame pixel `(x, y)` is covered by the placed raster;
    /// returns the incoming pixel coordinates when it is.
    #[inline]
    pub fn covered(&self, x: i64, y: i64) -> Option<(usize, usize)> {
        let (u, v) = self.to_incoming(x, y);
        if u < 0 || v < 0 || u as usize >= self.width || v as usize >= self.height {
            return None;
        }
        Some((u as usize, v as usize))
    }
}
