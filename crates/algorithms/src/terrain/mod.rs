//! Terrain derivatives used by the mask refiner
//!
//! - Slope: percent slope (Horn or Zevenbergen-Thorne)
//! - Hillshade: illumination for a sun position, 0-255
//!
//! Both use a 3x3 window; cells without a full valid window are NaN.

mod hillshade;
mod slope;

pub use hillshade::{hillshade, Hillshade, HillshadeParams};
pub use slope::{percent_slope, Slope, SlopeMethod, SlopeParams};

use crate::rows::concat_rows;
use crate::scene::SolarGeometry;
use dswe_core::raster::{regrid_nearest, GridSpec, Raster, TRANSFORM_TOLERANCE};
use dswe_core::{Error, Result};
use ndarray::Array2;
use tracing::debug;

/// 3x3 neighbourhood around (row, col) in row-major order, or `None` at the
/// grid edge or when any cell is no-data.
pub(crate) fn window3(dem: &Raster<f64>, row: usize, col: usize) -> Option<[f64; 9]> {
    let (rows, cols) = dem.shape();
    if row == 0 || col == 0 || row + 1 >= rows || col + 1 >= cols {
        return None;
    }
    let data = dem.data();
    let mut w = [0.0; 9];
    for (k, v) in w.iter_mut().enumerate() {
        *v = data[(row + k / 3 - 1, col + k % 3 - 1)];
        if dem.is_nodata(*v) {
            return None;
        }
    }
    Some(w)
}

/// Evaluate `f(row, col, cell_x, cell_y)` for every cell, row-parallel;
/// `None` becomes NaN.
pub(crate) fn gradient_grid<F>(dem: &Raster<f64>, f: F) -> Result<Raster<f64>>
where
    F: Fn(usize, usize, f64, f64) -> Option<f64> + Sync + Send,
{
    dem.transform().require_north_up("DEM")?;
    let (rows, cols) = dem.shape();
    let cell_x = dem.transform().pixel_width.abs();
    let cell_y = dem.transform().pixel_height.abs();
    if cell_x == 0.0 || cell_y == 0.0 {
        return Err(Error::InvalidParameter {
            name: "cell_size",
            value: format!("({cell_x}, {cell_y})"),
            reason: "DEM cell size must be non-zero".into(),
        });
    }

    let data: Vec<f64> = concat_rows(rows, |row| {
        (0..cols)
            .map(|col| f(row, col, cell_x, cell_y).unwrap_or(f64::NAN))
            .collect::<Vec<f64>>()
    });

    let array = Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?;
    dem.with_data(array, Some(f64::NAN))
}

/// Options for deriving terrain layers
#[derive(Debug, Clone, Copy, Default)]
pub struct TerrainParams {
    pub slope: SlopeParams,
    pub sun: SolarGeometry,
}

/// Percent slope and hillshade on a scene grid
#[derive(Debug, Clone)]
pub struct Terrain {
    pub slope: Raster<f64>,
    pub shade: Raster<f64>,
}

impl Terrain {
    /// Derive slope and hillshade from `dem` on the grid of `grid`.
    ///
    /// A DEM on a different grid is first resampled (nearest neighbour)
    /// onto the scene grid; it must share the scene projection.
    pub fn derive<T: dswe_core::RasterElement>(dem: &Raster<f64>, grid: &Raster<T>, params: &TerrainParams) -> Result<Self> {
        if let (Some(a), Some(b)) = (grid.projection(), dem.projection()) {
            if !a.is_equivalent(b) {
                return Err(Error::ProjectionMismatch(a.to_string(), b.to_string()));
            }
        }

        let on_grid = dem.shape() == grid.shape()
            && dem.transform().approx_eq(grid.transform(), TRANSFORM_TOLERANCE);
        let dem = if on_grid {
            dem.clone()
        } else {
            debug!("Resampling DEM onto scene grid");
            let target = GridSpec {
                transform: *grid.transform(),
                rows: grid.rows(),
                cols: grid.cols(),
            };
            regrid_nearest(dem, &target, f64::NAN)
        };

        let mut slope = percent_slope(&dem, params.slope)?;
        let mut shade = hillshade(
            &dem,
            HillshadeParams {
                sun: params.sun,
                z_factor: params.slope.z_factor,
            },
        )?;
        slope.set_projection(grid.projection().cloned());
        shade.set_projection(grid.projection().cloned());

        Ok(Self { slope, shade })
    }
}
