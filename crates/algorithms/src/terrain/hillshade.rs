//! Hillshade (illumination) from DEMs, on the 0-255 scale

use super::slope::{gradient, SlopeMethod};
use super::{gradient_grid, window3};
use crate::scene::SolarGeometry;
use dswe_core::raster::Raster;
use dswe_core::{Algorithm, Error, Result};
use std::f64::consts::PI;

/// Parameters for hillshade calculation
#[derive(Debug, Clone, Copy)]
pub struct HillshadeParams {
    pub sun: SolarGeometry,
    /// Z-factor for vertical exaggeration
    pub z_factor: f64,
}

impl Default for HillshadeParams {
    fn default() -> Self {
        Self {
            sun: SolarGeometry::default(),
            z_factor: 1.0,
        }
    }
}

/// Hillshade algorithm
#[derive(Debug, Clone, Default)]
pub struct Hillshade;

impl Algorithm for Hillshade {
    type Input = Raster<f64>;
    type Output = Raster<f64>;
    type Params = HillshadeParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Hillshade"
    }

    fn description(&self) -> &'static str {
        "Shaded relief of a DEM for a given sun position"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        hillshade(&input, params)
    }
}

/// Hillshade in [0, 255].
///
/// `shade = cos(zenith) cos(slope) + sin(zenith) sin(slope) cos(azimuth - aspect)`,
/// clamped at zero. Edge and no-data cells are NaN rather than 0 so they
/// are never mistaken for shadow.
pub fn hillshade(dem: &Raster<f64>, params: HillshadeParams) -> Result<Raster<f64>> {
    let azimuth_rad = (360.0 - params.sun.azimuth + 90.0).to_radians();
    let zenith_rad = (90.0 - params.sun.altitude).to_radians();
    let (sin_zenith, cos_zenith) = zenith_rad.sin_cos();

    gradient_grid(dem, |row, col, cell_x, cell_y| {
        let w = window3(dem, row, col)?;
        let (dz_dx, dz_dy) = gradient(&w, cell_x, cell_y, SlopeMethod::Horn);
        let (dz_dx, dz_dy) = (dz_dx * params.z_factor, dz_dy * params.z_factor);

        let slope_rad = (dz_dx * dz_dx + dz_dy * dz_dy).sqrt().atan();
        let aspect_rad = if dz_dx.abs() < 1e-10 && dz_dy.abs() < 1e-10 {
            0.0
        } else {
            // dz_dy grows southward, so this is the downslope direction counter-clockwise from east
            let aspect = dz_dy.atan2(-dz_dx);
            if aspect < 0.0 {
                2.0 * PI + aspect
            } else {
                aspect
            }
        };

        let shade = cos_zenith * slope_rad.cos()
            + sin_zenith * slope_rad.sin() * (azimuth_rad - aspect_rad).cos();
        Some((shade.clamp(0.0, 1.0) * 255.0).round())
    })
}
