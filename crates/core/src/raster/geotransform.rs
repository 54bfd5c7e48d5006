//! Affine georeferencing

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Six-coefficient affine placement of a grid in map coordinates:
///
/// ```text
/// x = origin_x + col * pixel_width + row * row_rotation
/// y = origin_y + col * col_rotation + row * pixel_height
/// ```
///
/// `(origin_x, origin_y)` is the top-left corner of the top-left cell. North-up
/// grids have both rotation terms zero and a negative `pixel_height`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_width: f64,
    pub pixel_height: f64,
    pub row_rotation: f64,
    pub col_rotation: f64,
}

impl GeoTransform {
    /// North-up transform
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
            row_rotation: 0.0,
            col_rotation: 0.0,
        }
    }

    /// From GDAL order `[x0, x/col, x/row, y0, y/col, y/row]`
    pub fn from_gdal(gt: [f64; 6]) -> Self {
        Self {
            origin_x: gt[0],
            pixel_width: gt[1],
            row_rotation: gt[2],
            origin_y: gt[3],
            col_rotation: gt[4],
            pixel_height: gt[5],
        }
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.origin_x,
            self.pixel_width,
            self.row_rotation,
            self.origin_y,
            self.col_rotation,
            self.pixel_height,
        ]
    }

    pub fn is_north_up(&self) -> bool {
        self.row_rotation == 0.0 && self.col_rotation == 0.0
    }

    /// Error unless the grid is north-up; `what` names the raster
    pub fn require_north_up(&self, what: &str) -> Result<()> {
        if self.is_north_up() {
            Ok(())
        } else {
            Err(Error::RotatedGrid {
                what: what.to_string(),
                transform: self.to_gdal(),
            })
        }
    }

    /// Map position of fractional pixel coordinates
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.origin_x + col * self.pixel_width + row * self.row_rotation,
            self.origin_y + col * self.col_rotation + row * self.pixel_height,
        )
    }

    /// Map coordinates of the centre of cell `(col, row)`
    pub fn cell_center(&self, col: usize, row: usize) -> (f64, f64) {
        self.apply(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// Fractional `(col, row)` of a map position; NaN on a degenerate grid
    pub fn locate(&self, x: f64, y: f64) -> (f64, f64) {
        let det = self.pixel_width * self.pixel_height - self.row_rotation * self.col_rotation;
        if det == 0.0 || !det.is_finite() {
            return (f64::NAN, f64::NAN);
        }
        let (dx, dy) = (x - self.origin_x, y - self.origin_y);
        (
            (dx * self.pixel_height - dy * self.row_rotation) / det,
            (dy * self.pixel_width - dx * self.col_rotation) / det,
        )
    }

    pub fn approx_eq(&self, other: &GeoTransform, tolerance: f64) -> bool {
        self.to_gdal()
            .iter()
            .zip(other.to_gdal())
            .all(|(a, b)| (a - b).abs() <= tolerance)
    }

    /// `(min_x, min_y, max_x, max_y)` of a `cols` x `rows` grid, over all four corners
    pub fn bounds(&self, cols: usize, rows: usize) -> (f64, f64, f64, f64) {
        let (c, r) = (cols as f64, rows as f64);
        let corners = [self.apply(0.0, 0.0), self.apply(c, 0.0), self.apply(0.0, r), self.apply(c, r)];
        corners.iter().fold(
            (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
            |(x0, y0, x1, y1), &(x, y)| (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        )
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, -1.0)
    }
}
