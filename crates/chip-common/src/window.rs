//! Pixel-space windows.

use serde::{Deserialize, Serialize};

use crate::bbox::BoundingBox;
use crate::transform::PixelTransform;

/// Offsets or lengths within this many pixels of an integer are treated as
/// integral before floor/ceil rounding.
pub const RESIDUE_TOLERANCE: f64 = 1e-6;

/// Snap `v` to the nearest integer when it only differs by float residue.
#[inline]
pub fn snap_residue(v: f64) -> f64 {
    let r = v.round();
    if (v - r).abs() < RESIDUE_TOLERANCE {
        r
    } else {
        v
    }
}

/// A fractional pixel rectangle, used during intermediate computation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Window {
    pub col_off: f64,
    pub row_off: f64,
    pub width: f64,
    pub height: f64,
}

impl Window {
    pub fn new(col_off: f64, row_off: f64, width: f64, height: f64) -> Self {
        Self {
            col_off,
            row_off,
            width,
            height,
        }
    }

    /// Pixel window covering `bbox` against `transform`.
    pub fn from_bounds(bbox: &BoundingBox, transform: &PixelTransform) -> Self {
        let (c0, r0) = transform.ground_to_pixel(bbox.west, bbox.north);
        let (c1, r1) = transform.ground_to_pixel(bbox.east, bbox.south);

        let col_off = c0.min(c1);
        let row_off = r0.min(r1);
        Self::new(col_off, row_off, c0.max(c1) - col_off, r0.max(r1) - row_off)
    }

    /// Floor both offsets (after residue snapping).
    pub fn round_offsets_floor(&self) -> Self {
        Self::new(
            snap_residue(self.col_off).floor(),
            snap_residue(self.row_off).floor(),
            self.width,
            self.height,
        )
    }

    /// Ceil both lengths (after residue snapping).
    pub fn round_lengths_ceil(&self) -> Self {
        Self::new(
            self.col_off,
            self.row_off,
            snap_residue(self.width).ceil(),
            snap_residue(self.height).ceil(),
        )
    }

    /// Whether the column offset carries a fractional part beyond residue.
    pub fn has_col_residue(&self) -> bool {
        snap_residue(self.col_off).fract() != 0.0
    }

    /// Whether the row offset carries a fractional part beyond residue.
    pub fn has_row_residue(&self) -> bool {
        snap_residue(self.row_off).fract() != 0.0
    }

    /// A window with no positive area denotes "no coverage".
    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0) || !(self.height > 0.0)
    }

    /// Convert to integer form. Offsets are floored and lengths ceiled.
    pub fn to_pixel_window(&self) -> PixelWindow {
        let w = self.round_offsets_floor().round_lengths_ceil();
        PixelWindow::new(
            w.col_off as i64,
            w.row_off as i64,
            w.width.max(0.0) as usize,
            w.height.max(0.0) as usize,
        )
    }
}

/// An integer pixel rectangle, ready for reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelWindow {
    pub col_off: i64,
    pub row_off: i64,
    pub width: usize,
    pub height: usize,
}

impl PixelWindow {
    pub fn new(col_off: i64, row_off: i64, width: usize, height: usize) -> Self {
        Self {
            col_off,
            row_off,
            width,
            height,
        }
    }

    /// Window covering a full `width` x `height` raster.
    pub fn full(width: usize, height: usize) -> Self {
        Self::new(0, 0, width, height)
    }

    pub fn to_window(&self) -> Window {
        Window::new(
            self.col_off as f64,
            self.row_off as f64,
            self.width as f64,
            self.height as f64,
        )
    }

    pub fn col_end(&self) -> i64 {
        self.col_off + self.width as i64
    }

    pub fn row_end(&self) -> i64 {
        self.row_off + self.height as i64
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Number of cells in the window.
    pub fn area(&self) -> usize {
        self.width * self.height
    }

    /// Overlap of two windows, `None` if they do not share a cell.
    pub fn intersection(&self, other: &PixelWindow) -> Option<PixelWindow> {
        let col_off = self.col_off.max(other.col_off);
        let row_off = self.row_off.max(other.row_off);
        let col_end = self.col_end().min(other.col_end());
        let row_end = self.row_end().min(other.row_end());

        if col_end <= col_off || row_end <= row_off {
            return None;
        }

        Some(PixelWindow::new(
            col_off,
            row_off,
            (col_end - col_off) as usize,
            (row_end - row_off) as usize,
        ))
    }

    /// Split into tiles of at most `tile_width` x `tile_height`, row-major.
    ///
    /// Tile boundaries are anchored at multiples of the tile size in the
    /// window's own coordinate space so neighbouring windows tile alike.
    pub fn tiles(&self, tile_width: usize, tile_height: usize) -> Vec<PixelWindow> {
        self.tiles_anchored((0, 0), tile_width, tile_height)
    }

    /// Like [`tiles`](Self::tiles), with boundaries at `anchor` plus
    /// multiples of the tile size.
    pub fn tiles_anchored(
        &self,
        anchor: (i64, i64),
        tile_width: usize,
        tile_height: usize,
    ) -> Vec<PixelWindow> {
        let tw = tile_width.max(1) as i64;
        let th = tile_height.max(1) as i64;
        let (ac, ar) = anchor;
        let mut tiles = Vec::new();

        let mut row = self.row_off;
        while row < self.row_end() {
            let row_next = ar + ((row - ar).div_euclid(th) + 1) * th;
            let row_stop = row_next.min(self.row_end());

            let mut col = self.col_off;
            while col < self.col_end() {
                let col_next = ac + ((col - ac).div_euclid(tw) + 1) * tw;
                let col_stop = col_next.min(self.col_end());
                tiles.push(PixelWindow::new(
                    col,
                    row,
                    (col_stop - col) as usize,
                    (row_stop - row) as usize,
                ));
                col = col_stop;
            }
            row = row_stop;
        }

        tiles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::Crs;

    #[test]
    fn test_from_bounds() {
        let t = PixelTransform::from_origin(0.0, 100.0, 2.0, 2.0);
        let bbox = BoundingBox::new(10.0, 50.0, 30.0, 90.0, Crs::from_epsg(26915));
        let w = Window::from_bounds(&bbox, &t);
        assert_eq!(w, Window::new(5.0, 5.0, 10.0, 20.0));
    }

    #[test]
    fn test_residue_snapping() {
        let w = Window::new(2.9999999999, 4.0000000001, 9.0000000001, 1.5);
        let w = w.round_offsets_floor().round_lengths_ceil();
        assert_eq!(w, Window::new(3.0, 4.0, 9.0, 2.0));
    }

    #[test]
    fn test_intersection() {
        let a = PixelWindow::new(0, 0, 10, 10);
        let b = PixelWindow::new(5, -5, 10, 10);
        assert_eq!(a.intersection(&b), Some(PixelWindow::new(5, 0, 5, 5)));
        assert_eq!(a.intersection(&PixelWindow::new(10, 0, 3, 3)), None);
    }

    #[test]
    fn test_tiles_cover_window_exactly() {
        let w = PixelWindow::new(3, 5, 20, 7);
        let tiles = w.tiles(8, 4);
        let area: usize = tiles.iter().map(|t| t.area()).sum();
        assert_eq!(area, w.area());
        assert_eq!(tiles[0], PixelWindow::new(3, 5, 5, 3));
        assert!(tiles.iter().all(|t| t.intersection(&w) == Some(*t)));
    }

    #[test]
    fn test_tiles_follow_anchor() {
        let w = PixelWindow::new(5, 5, 64, 64);
        assert_eq!(w.tiles(64, 64).len(), 4);
        assert_eq!(w.tiles_anchored((5, 5), 64, 64), vec![w]);

        let tiles = w.tiles_anchored((-59, 37), 64, 64);
        assert_eq!(tiles[0], PixelWindow::new(5, 5, 64, 32));
        assert_eq!(tiles[1], PixelWindow::new(5, 37, 64, 32));
        assert_eq!(tiles.len(), 2);
    }
}
