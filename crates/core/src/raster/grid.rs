//! Georeferenced raster grid

use crate::error::{Error, Result};
use crate::projection::Projection;
use crate::raster::{Extent, GeoTransform, RasterElement};
use ndarray::Array2;

/// Tolerance used when deciding whether two geotransforms describe the same grid
pub const TRANSFORM_TOLERANCE: f64 = 1e-9;

/// A single-band grid of `T` with the georeferencing it was read with.
///
/// Bands of a scene, classified layers and proportion outputs are all
/// `Raster`s; only the element type differs:
///
/// ```ignore
/// use dswe_core::Raster;
///
/// let mut intr: Raster<u8> = Raster::filled(100, 100, 255);
/// intr.set_nodata(Some(255));
/// intr.set(10, 20, 1)?;
/// ```
#[derive(Debug, Clone)]
pub struct Raster<T: RasterElement> {
    data: Array2<T>,
    transform: GeoTransform,
    projection: Option<Projection>,
    nodata: Option<T>,
}

impl<T: RasterElement> Raster<T> {
    /// Zero-filled raster on the default unit grid
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::from_array(Array2::zeros((rows, cols)))
    }

    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self::from_array(Array2::from_elem((rows, cols), value))
    }

    /// Raster from row-major values
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }
        Array2::from_shape_vec((rows, cols), data)
            .map(Self::from_array)
            .map_err(|e| Error::Other(e.to_string()))
    }

    pub fn from_array(data: Array2<T>) -> Self {
        Self {
            data,
            transform: GeoTransform::default(),
            projection: None,
            nodata: None,
        }
    }

    /// New raster holding `data` on the same grid (transform and projection) as `self`
    pub fn with_data<U: RasterElement>(&self, data: Array2<U>, nodata: Option<U>) -> Result<Raster<U>> {
        if data.dim() != self.shape() {
            let (ar, ac) = data.dim();
            return Err(Error::SizeMismatch {
                er: self.rows(),
                ec: self.cols(),
                ar,
                ac,
            });
        }
        Ok(Raster {
            data,
            transform: self.transform,
            projection: self.projection.clone(),
            nodata,
        })
    }

    /// Cell-wise conversion onto the same grid
    pub fn map<U, F>(&self, f: F, nodata: Option<U>) -> Raster<U>
    where
        U: RasterElement,
        F: Fn(T) -> U,
    {
        Raster {
            data: self.data.mapv(f),
            transform: self.transform,
            projection: self.projection.clone(),
            nodata,
        }
    }

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// `(rows, cols)`
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get(&self, row: usize, col: usize) -> Result<T> {
        self.data
            .get((row, col))
            .copied()
            .ok_or(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            })
    }

    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        let (rows, cols) = self.shape();
        let cell = self
            .data
            .get_mut((row, col))
            .ok_or(Error::IndexOutOfBounds { row, col, rows, cols })?;
        *cell = value;
        Ok(())
    }

    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Array2<T> {
        &mut self.data
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = transform;
    }

    pub fn projection(&self) -> Option<&Projection> {
        self.projection.as_ref()
    }

    pub fn set_projection(&mut self, projection: Option<Projection>) {
        self.projection = projection;
    }

    /// Fill value, if the raster has one
    pub fn nodata(&self) -> Option<T> {
        self.nodata
    }

    pub fn set_nodata(&mut self, nodata: Option<T>) {
        self.nodata = nodata;
    }

    /// Map-coordinate footprint
    pub fn extent(&self) -> Extent {
        Extent::of_grid(&self.transform, self.rows(), self.cols())
    }

    pub fn is_nodata(&self, value: T) -> bool {
        value.is_nodata(self.nodata)
    }

    /// Verify that `other` lies on exactly the same grid as `self`.
    ///
    /// `what` names the other raster in the returned error.
    pub fn check_same_grid<U: RasterElement>(&self, other: &Raster<U>, what: &str) -> Result<()> {
        if self.shape() != other.shape() {
            return Err(Error::SizeMismatch {
                er: self.rows(),
                ec: self.cols(),
                ar: other.rows(),
                ac: other.cols(),
            });
        }
        if !self.transform.approx_eq(other.transform(), TRANSFORM_TOLERANCE) {
            return Err(Error::TransformMismatch {
                what: what.to_string(),
                expected: self.transform.to_gdal(),
                actual: other.transform().to_gdal(),
            });
        }
        match (self.projection(), other.projection()) {
            (Some(a), Some(b)) if !a.is_equivalent(b) => {
                Err(Error::ProjectionMismatch(a.to_string(), b.to_string()))
            }
            (Some(a), None) => Err(Error::ProjectionMismatch(a.to_string(), "<none>".into())),
            (None, Some(b)) => Err(Error::ProjectionMismatch("<none>".into(), b.to_string())),
            _ => Ok(()),
        }
    }

    /// Range, mean and valid-cell count, ignoring no-data and NaN cells
    pub fn summary(&self) -> RasterSummary {
        let mut summary = RasterSummary {
            cells: self.len(),
            ..Default::default()
        };
        let mut sum = 0.0;
        for v in self
            .data
            .iter()
            .filter(|&&v| !self.is_nodata(v))
            .filter_map(|&v| v.as_f64())
            .filter(|v| !v.is_nan())
        {
            summary.min = Some(summary.min.map_or(v, |m: f64| m.min(v)));
            summary.max = Some(summary.max.map_or(v, |m: f64| m.max(v)));
            sum += v;
            summary.valid += 1;
        }
        summary.mean = (summary.valid > 0).then(|| sum / summary.valid as f64);
        summary
    }
}

/// Value summary of a raster, as reported by `dswe info`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RasterSummary {
    pub cells: usize,
    pub valid: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
}

impl RasterSummary {
    /// Share of valid cells, in percent
    pub fn valid_percent(&self) -> f64 {
        if self.cells == 0 {
            return 0.0;
        }
        100.0 * self.valid as f64 / self.cells as f64
    }
}
