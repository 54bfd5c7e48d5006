//! Percent slope from DEMs
//!
//! Horn (1981) weights all eight neighbours; Zevenbergen & Thorne (1987)
//! uses only the four orthogonal ones.

use super::{gradient_grid, window3};
use dswe_core::raster::Raster;
use dswe_core::{Algorithm, Error, Result};
use serde::{Deserialize, Serialize};

/// Finite-difference scheme for the surface gradient
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SlopeMethod {
    #[default]
    Horn,
    ZevenbergenThorne,
}

/// Parameters for slope calculation
#[derive(Debug, Clone, Copy)]
pub struct SlopeParams {
    pub method: SlopeMethod,
    /// Vertical units per horizontal unit (1.0 when both are metres)
    pub z_factor: f64,
}

impl Default for SlopeParams {
    fn default() -> Self {
        Self {
            method: SlopeMethod::Horn,
            z_factor: 1.0,
        }
    }
}

/// Slope algorithm
#[derive(Debug, Clone, Default)]
pub struct Slope;

impl Algorithm for Slope {
    type Input = Raster<f64>;
    type Output = Raster<f64>;
    type Params = SlopeParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Slope"
    }

    fn description(&self) -> &'static str {
        "Percent slope of a DEM"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        percent_slope(&input, params)
    }
}

/// Gradient `(dz/dx, dz/dy)` at the centre of a 3x3 window
///
/// ```text
/// a b c
/// d e f
/// g h i
/// ```
pub(super) fn gradient(w: &[f64; 9], cell_x: f64, cell_y: f64, method: SlopeMethod) -> (f64, f64) {
    let [a, b, c, d, _e, f, g, h, i] = *w;
    match method {
        SlopeMethod::Horn => (
            ((c + 2.0 * f + i) - (a + 2.0 * d + g)) / (8.0 * cell_x),
            ((g + 2.0 * h + i) - (a + 2.0 * b + c)) / (8.0 * cell_y),
        ),
        SlopeMethod::ZevenbergenThorne => ((f - d) / (2.0 * cell_x), (h - b) / (2.0 * cell_y)),
    }
}

/// Percent slope (`100 * |gradient|`).
///
/// Edge cells and cells touching DEM no-data are NaN.
pub fn percent_slope(dem: &Raster<f64>, params: SlopeParams) -> Result<Raster<f64>> {
    gradient_grid(dem, |row, col, cell_x, cell_y| {
        let w = window3(dem, row, col)?;
        let (dz_dx, dz_dy) = gradient(&w, cell_x, cell_y, params.method);
        Some(100.0 * params.z_factor * (dz_dx * dz_dx + dz_dy * dz_dy).sqrt())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use dswe_core::GeoTransform;

    fn ramp(rise_per_col: f64) -> Raster<f64> {
        let mut dem = Raster::new(6, 6);
        dem.set_transform(GeoTransform::new(0.0, 180.0, 30.0, -30.0));
        for row in 0..6 {
            for col in 0..6 {
                dem.set(row, col, col as f64 * rise_per_col).unwrap();
            }
        }
        dem
    }

    #[test]
    fn test_flat_is_zero() {
        let mut dem = Raster::filled(5, 5, 1500.0);
        dem.set_transform(GeoTransform::new(0.0, 150.0, 30.0, -30.0));
        let s = Slope.execute_default(dem).unwrap();
        assert_relative_eq!(s.get(2, 2).unwrap(), 0.0);
    }

    #[test]
    fn test_ramp_percent() {
        // 3 m rise per 30 m cell = 10 %
        let dem = ramp(3.0);
        for method in [SlopeMethod::Horn, SlopeMethod::ZevenbergenThorne] {
            let s = percent_slope(&dem, SlopeParams { method, z_factor: 1.0 }).unwrap();
            assert_relative_eq!(s.get(3, 3).unwrap(), 10.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_edges_and_nodata_are_nan() {
        let mut dem = ramp(3.0);
        dem.set_nodata(Some(-32768.0));
        dem.set(2, 2, -32768.0).unwrap();
        let s = percent_slope(&dem, SlopeParams::default()).unwrap();
        assert!(s.get(0, 3).unwrap().is_nan());
        assert!(s.get(3, 3).unwrap().is_nan(), "neighbour of no-data");
        assert!(s.get(4, 4).unwrap().is_finite());
    }
}
