//! Geographic extents and nearest-neighbour regridding
//!
//! Categorical layers (classification codes) are only ever moved between
//! grids by nearest-neighbour lookup; no value is interpolated.

use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in map coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

/// Target grid description: a geotransform plus dimensions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSpec {
    pub transform: GeoTransform,
    pub rows: usize,
    pub cols: usize,
}

impl Extent {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Extent covered by a `rows` x `cols` grid under `transform`
    pub fn of_grid(transform: &GeoTransform, rows: usize, cols: usize) -> Self {
        let (min_x, min_y, max_x, max_y) = transform.bounds(cols, rows);
        Self::new(min_x, min_y, max_x, max_y)
    }

    /// Smallest extent containing both `self` and `other`
    pub fn union(&self, other: &Extent) -> Extent {
        Extent::new(
            self.min_x.min(other.min_x),
            self.min_y.min(other.min_y),
            self.max_x.max(other.max_x),
            self.max_y.max(other.max_y),
        )
    }

    /// Union of all extents; `None` for an empty iterator
    pub fn union_all<I: IntoIterator<Item = Extent>>(extents: I) -> Option<Extent> {
        extents.into_iter().reduce(|a, b| a.union(&b))
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Whether `other` lies entirely inside `self` (within `tolerance`)
    pub fn contains(&self, other: &Extent, tolerance: f64) -> bool {
        other.min_x >= self.min_x - tolerance
            && other.min_y >= self.min_y - tolerance
            && other.max_x <= self.max_x + tolerance
            && other.max_y <= self.max_y + tolerance
    }

    /// North-up grid with the given cell size covering this extent.
    ///
    /// The origin is the top-left corner; partial cells at the right and
    /// bottom edges are included.
    pub fn grid(&self, pixel_width: f64, pixel_height: f64) -> Result<GridSpec> {
        if pixel_width <= 0.0 || pixel_height >= 0.0 {
            return Err(Error::InvalidParameter {
                name: "pixel_size",
                value: format!("({pixel_width}, {pixel_height})"),
                reason: "expected positive width and negative height".into(),
            });
        }
        let cols = cells(self.width(), pixel_width);
        let rows = cells(self.height(), -pixel_height);
        if rows == 0 || cols == 0 {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }
        Ok(GridSpec {
            transform: GeoTransform::new(self.min_x, self.max_y, pixel_width, pixel_height),
            rows,
            cols,
        })
    }
}

fn cells(span: f64, size: f64) -> usize {
    // tolerate floating point noise on exact multiples
    let n = span / size;
    let rounded = n.round();
    if (n - rounded).abs() < 1e-6 {
        rounded.max(0.0) as usize
    } else {
        n.ceil().max(0.0) as usize
    }
}

/// Resample `source` onto `target` by nearest-neighbour lookup.
///
/// Target cells whose centre falls outside the source grid, or on a
/// source no-data cell, receive `fill`.
pub fn regrid_nearest<T: RasterElement>(source: &Raster<T>, target: &GridSpec, fill: T) -> Raster<T> {
    let (src_rows, src_cols) = source.shape();
    let src_transform = source.transform();
    let src = source.data();

    let data = Array2::from_shape_fn((target.rows, target.cols), |(row, col)| {
        let (x, y) = target.transform.cell_center(col, row);
        let (fc, fr) = src_transform.locate(x, y);
        if !fc.is_finite() || !fr.is_finite() || fc < 0.0 || fr < 0.0 {
            return fill;
        }
        let (c, r) = (fc.floor() as usize, fr.floor() as usize);
        if r >= src_rows || c >= src_cols {
            return fill;
        }
        let value = src[(r, c)];
        if source.is_nodata(value) {
            fill
        } else {
            value
        }
    });

    let mut out = Raster::from_array(data);
    out.set_transform(target.transform);
    out.set_projection(source.projection().cloned());
    out.set_nodata(Some(fill));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn tile(origin_x: f64, origin_y: f64, values: Vec<u8>, rows: usize, cols: usize) -> Raster<u8> {
        let mut r = Raster::from_vec(values, rows, cols).unwrap();
        r.set_transform(GeoTransform::new(origin_x, origin_y, 30.0, -30.0));
        r.set_nodata(Some(255));
        r
    }

    #[test]
    fn test_union_is_not_intersection() {
        let a = Extent::new(0.0, 0.0, 60.0, 60.0);
        let b = Extent::new(30.0, -30.0, 90.0, 30.0);
        let u = a.union(&b);
        assert_eq!(u, Extent::new(0.0, -30.0, 90.0, 60.0));
        assert!(u.contains(&a, 0.0) && u.contains(&b, 0.0));
    }

    #[test]
    fn test_grid_dimensions() {
        let e = Extent::new(0.0, -30.0, 90.0, 60.0);
        let g = e.grid(30.0, -30.0).unwrap();
        assert_eq!((g.rows, g.cols), (3, 3));
        assert_relative_eq!(g.transform.origin_x, 0.0);
        assert_relative_eq!(g.transform.origin_y, 60.0);
        assert!(e.grid(30.0, 30.0).is_err());
    }

    #[test]
    fn test_regrid_expands_with_fill() {
        // 2x2 tile whose top-left sits one cell right of the target origin
        let src = tile(30.0, 60.0, vec![1, 2, 3, 4], 2, 2);
        let target = Extent::new(0.0, 0.0, 90.0, 60.0).grid(30.0, -30.0).unwrap();

        let out = regrid_nearest(&src, &target, 255);
        assert_eq!(out.shape(), (2, 3));
        assert_eq!(out.data().as_slice().unwrap(), &[255, 1, 2, 255, 3, 4]);
        assert_eq!(out.nodata(), Some(255));
    }

    #[test]
    fn test_regrid_identity() {
        let src = tile(0.0, 60.0, vec![0, 1, 2, 3, 4, 9], 2, 3);
        let target = GridSpec {
            transform: *src.transform(),
            rows: 2,
            cols: 3,
        };
        let out = regrid_nearest(&src, &target, 255);
        assert_eq!(out.data(), src.data());
    }
}
