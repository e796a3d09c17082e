//! Affine pixel-to-ground transforms for north-up rasters.

use serde::{Deserialize, Serialize};

use crate::bbox::BoundingBox;
use crate::crs::Crs;
use crate::window::{PixelWindow, Window};

/// Affine mapping between pixel grid coordinates and ground coordinates.
///
/// ```text
/// x = origin_x + col * pixel_width
/// y = origin_y + row * pixel_height
/// ```
///
/// Rasters handled here are north-up, so there are no rotation terms and
/// `pixel_height` is normally negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelTransform {
    /// X coordinate of the upper-left corner
    pub origin_x: f64,
    /// Y coordinate of the upper-left corner
    pub origin_y: f64,
    /// Cell size in X
    pub pixel_width: f64,
    /// Cell size in Y (negative for north-up)
    pub pixel_height: f64,
}

impl PixelTransform {
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
        }
    }

    /// North-up transform anchored at the upper-left (west, north) corner.
    pub fn from_origin(west: f64, north: f64, xres: f64, yres: f64) -> Self {
        Self::new(west, north, xres, -yres.abs())
    }

    /// Ground resolution along X (absolute cell width).
    pub fn resolution(&self) -> f64 {
        self.pixel_width.abs()
    }

    /// Convert (possibly fractional) pixel coordinates to ground coordinates.
    pub fn pixel_to_ground(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.origin_x + col * self.pixel_width,
            self.origin_y + row * self.pixel_height,
        )
    }

    /// Ground coordinates of a pixel's center.
    pub fn pixel_center(&self, col: usize, row: usize) -> (f64, f64) {
        self.pixel_to_ground(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// Convert ground coordinates to fractional pixel coordinates.
    pub fn ground_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.origin_x) / self.pixel_width,
            (y - self.origin_y) / self.pixel_height,
        )
    }

    /// Same origin with both cell sizes multiplied by `factor`.
    pub fn scaled(&self, factor: f64) -> Self {
        Self::new(
            self.origin_x,
            self.origin_y,
            self.pixel_width * factor,
            self.pixel_height * factor,
        )
    }

    /// Transform whose origin is the top-left corner of `window`.
    pub fn window_transform(&self, window: &PixelWindow) -> Self {
        let (x, y) = self.pixel_to_ground(window.col_off as f64, window.row_off as f64);
        Self::new(x, y, self.pixel_width, self.pixel_height)
    }

    /// Ground footprint of a fractional window.
    pub fn window_bounds(&self, window: &Window, crs: Crs) -> BoundingBox {
        let (x0, y0) = self.pixel_to_ground(window.col_off, window.row_off);
        let (x1, y1) = self.pixel_to_ground(
            window.col_off + window.width,
            window.row_off + window.height,
        );
        BoundingBox::new(x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1), crs)
    }

    /// Ground footprint of a `width` x `height` raster using this transform.
    pub fn raster_bounds(&self, width: usize, height: usize, crs: Crs) -> BoundingBox {
        self.window_bounds(&Window::new(0.0, 0.0, width as f64, height as f64), crs)
    }

    /// Six-coefficient GDAL ordering.
    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.origin_x,
            self.pixel_width,
            0.0,
            self.origin_y,
            0.0,
            self.pixel_height,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let t = PixelTransform::from_origin(500000.0, 4100000.0, 2.0, 2.0);
        assert_eq!(t.pixel_height, -2.0);

        let (x, y) = t.pixel_to_ground(10.0, 20.0);
        assert_eq!((x, y), (500020.0, 4099960.0));
        assert_eq!(t.ground_to_pixel(x, y), (10.0, 20.0));
    }

    #[test]
    fn test_scaled_keeps_origin() {
        let t = PixelTransform::from_origin(100.0, 200.0, 1.0, 1.0).scaled(30.0);
        assert_eq!(t.origin_x, 100.0);
        assert_eq!(t.origin_y, 200.0);
        assert_eq!(t.pixel_width, 30.0);
        assert_eq!(t.pixel_height, -30.0);
    }

    #[test]
    fn test_window_transform_and_bounds() {
        let crs = Crs::from_epsg(26915);
        let t = PixelTransform::from_origin(0.0, 100.0, 1.0, 1.0);
        let w = PixelWindow::new(10, 20, 5, 5);

        let wt = t.window_transform(&w);
        assert_eq!((wt.origin_x, wt.origin_y), (10.0, 80.0));

        let b = t.window_bounds(&w.to_window(), crs);
        assert_eq!((b.west, b.south, b.east, b.north), (10.0, 75.0, 15.0, 80.0));
    }
}
