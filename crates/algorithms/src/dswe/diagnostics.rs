//! Diagnostic Test Engine
//!
//! Five independent threshold tests per pixel, stacked into a
//! `rows x cols x 5` boolean array. All tests run on every pixel including
//! fill; the classifier applies the fill mask afterwards.

use super::indices::SpectralIndices;
use crate::config::Thresholds;
use crate::rows::concat_rows;
use crate::scene::BandSet;
use dswe_core::{Error, Raster, Result};
use ndarray::{Array2, Array3, ArrayView1, Axis};

/// Number of diagnostic tests
pub const NUM_TESTS: usize = 5;

/// No-data value of the encoded DIAG layer
pub const DIAG_FILL: u16 = 255;

/// Reflectance and index values tested at one pixel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelInputs {
    pub blue: f64,
    pub nir: f64,
    pub swir1: f64,
    pub swir2: f64,
    pub mndwi: f64,
    pub mbsrv: f64,
    pub mbsrn: f64,
    pub awesh: f64,
    pub ndvi: f64,
}

/// Evaluate the five tests for one pixel.
///
/// Test 5 compares NIR against `PSWT_1_NIR`; `PSWT_2_NIR` is not read.
pub fn pixel_tests(p: &PixelInputs, t: &Thresholds) -> [bool; NUM_TESTS] {
    [
        p.mndwi > t.wigt,
        p.mbsrv > p.mbsrn,
        p.awesh > t.awgt,
        p.mndwi > t.pswt1_mndwi
            && p.swir1 < t.pswt1_swir1
            && p.nir < t.pswt1_nir
            && p.ndvi < t.pswt1_ndvi,
        p.mndwi > t.pswt2_mndwi
            && p.blue < t.pswt2_blue
            && p.swir1 < t.pswt2_swir1
            && p.swir2 < t.pswt2_swir2
            && p.nir < t.pswt1_nir,
    ]
}

/// Diagnostic Result: test outcomes plus the scene fill mask
#[derive(Debug, Clone)]
pub struct Diagnostics {
    tests: Array3<bool>,
    fill: Array2<bool>,
}

impl Diagnostics {
    /// Assemble from precomputed planes; `tests` is `rows x cols x 5`
    pub fn from_parts(tests: Array3<bool>, fill: Array2<bool>) -> Result<Self> {
        let (rows, cols, n) = tests.dim();
        if n != NUM_TESTS {
            return Err(Error::InvalidParameter {
                name: "tests",
                value: n.to_string(),
                reason: format!("expected {NUM_TESTS} test planes"),
            });
        }
        if fill.dim() != (rows, cols) {
            let (ar, ac) = fill.dim();
            return Err(Error::SizeMismatch {
                er: rows,
                ec: cols,
                ar,
                ac,
            });
        }
        Ok(Self { tests, fill })
    }

    pub fn shape(&self) -> (usize, usize) {
        self.fill.dim()
    }

    /// The `rows x cols x 5` test stack
    pub fn tests(&self) -> &Array3<bool> {
        &self.tests
    }

    /// Pixels where any reflectance band is fill
    pub fn fill_mask(&self) -> &Array2<bool> {
        &self.fill
    }

    /// Test outcomes at one pixel
    pub fn at(&self, row: usize, col: usize) -> Option<[bool; NUM_TESTS]> {
        if row >= self.shape().0 || col >= self.shape().1 {
            return None;
        }
        Some(lane_tests(self.tests.slice(ndarray::s![row, col, ..])))
    }

    /// Encode outcomes as decimal digits, test 1 most significant
    /// (`11000` = tests 1 and 2 passed); fill pixels become 255.
    pub fn encode(&self, grid: &Raster<f64>) -> Result<Raster<u16>> {
        let mut out = Array2::zeros(self.shape());
        ndarray::Zip::from(&mut out)
            .and(self.tests.lanes(Axis(2)))
            .and(&self.fill)
            .for_each(|o, lane, &is_fill| {
                *o = if is_fill {
                    DIAG_FILL
                } else {
                    encode_tests(lane_tests(lane))
                };
            });
        grid.with_data(out, Some(DIAG_FILL))
    }
}

pub(crate) fn lane_tests(lane: ArrayView1<'_, bool>) -> [bool; NUM_TESTS] {
    let mut tests = [false; NUM_TESTS];
    for (dst, src) in tests.iter_mut().zip(lane.iter()) {
        *dst = *src;
    }
    tests
}

/// Decimal digit encoding of one pixel's outcomes
pub fn encode_tests(tests: [bool; NUM_TESTS]) -> u16 {
    tests
        .iter()
        .fold(0u16, |acc, &passed| acc * 10 + u16::from(passed))
}

/// Run all five tests over a Band Set
pub fn diagnostic_tests(set: &BandSet, indices: &SpectralIndices, t: &Thresholds) -> Result<Diagnostics> {
    let (rows, cols) = set.shape();
    let b = set.bands();

    let planes: Vec<bool> = concat_rows(rows, |row| {
        let mut row_data = Vec::with_capacity(cols * NUM_TESTS);
        for col in 0..cols {
            let ix = (row, col);
            let p = PixelInputs {
                blue: b.blue.data()[ix],
                nir: b.nir.data()[ix],
                swir1: b.swir1.data()[ix],
                swir2: b.swir2.data()[ix],
                mndwi: indices.mndwi[ix],
                mbsrv: indices.mbsrv[ix],
                mbsrn: indices.mbsrn[ix],
                awesh: indices.awesh[ix],
                ndvi: indices.ndvi[ix],
            };
            row_data.extend_from_slice(&pixel_tests(&p, t));
        }
        row_data
    });

    let tests = Array3::from_shape_vec((rows, cols, NUM_TESTS), planes)
        .map_err(|e| Error::Other(e.to_string()))?;

    let fill = Array2::from_shape_fn((rows, cols), |ix| {
        [&b.blue, &b.green, &b.red, &b.nir, &b.swir1, &b.swir2]
            .iter()
            .any(|band| set.is_fill(band.data()[ix]))
    });

    Diagnostics::from_parts(tests, fill)
}
