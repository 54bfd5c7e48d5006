//! Sun position used for hillshading

use dswe_core::io::read_geotiff_metadata;
use dswe_core::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Sun azimuth (degrees clockwise from north) and altitude above the horizon
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolarGeometry {
    pub azimuth: f64,
    pub altitude: f64,
}

impl Default for SolarGeometry {
    fn default() -> Self {
        Self {
            azimuth: 315.0,
            altitude: 45.0,
        }
    }
}

impl SolarGeometry {
    /// Read sun geometry from a `KEY = value` metadata file.
    ///
    /// Landsat `_MTL.txt` files carry `SUN_AZIMUTH` / `SUN_ELEVATION`; HLS
    /// granules carry `MEAN_SUN_AZIMUTH_ANGLE` / `MEAN_SUN_ZENITH_ANGLE`.
    /// Returns `Ok(None)` when either angle is absent.
    pub fn from_metadata_file(path: &Path) -> Result<Option<Self>> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::parse_metadata(&text))
    }

    pub fn parse_metadata(text: &str) -> Option<Self> {
        Self::from_entries(text.lines().filter_map(|line| line.split_once('=')))
    }

    /// Sun geometry from the GDAL metadata of an HLS band or Fmask raster
    pub fn from_raster_metadata(path: &Path) -> Result<Option<Self>> {
        let items = read_geotiff_metadata(path)?;
        Ok(Self::from_entries(items.iter().map(|(k, v)| (k.as_str(), v.as_str()))))
    }

    fn from_entries<'a, I>(entries: I) -> Option<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut azimuth = None;
        let mut altitude = None;

        for (key, value) in entries {
            let Ok(value) = value.trim().trim_matches('"').parse::<f64>() else {
                continue;
            };
            match key.trim().to_ascii_uppercase().as_str() {
                "SUN_AZIMUTH" | "MEAN_SUN_AZIMUTH_ANGLE" => azimuth = Some(value),
                "SUN_ELEVATION" => altitude = Some(value),
                "MEAN_SUN_ZENITH_ANGLE" => altitude = Some(90.0 - value),
                _ => {}
            }
        }

        Some(Self {
            azimuth: azimuth?,
            altitude: altitude?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_landsat_mtl() {
        let mtl = "GROUP = IMAGE_ATTRIBUTES\n    SUN_AZIMUTH = 141.39913129\n    SUN_ELEVATION = 58.26384891\nEND_GROUP = IMAGE_ATTRIBUTES\n";
        let sun = SolarGeometry::parse_metadata(mtl).unwrap();
        assert_relative_eq!(sun.azimuth, 141.39913129);
        assert_relative_eq!(sun.altitude, 58.26384891);
    }

    #[test]
    fn test_hls_zenith() {
        let meta = "MEAN_SUN_AZIMUTH_ANGLE = 150.5\nMEAN_SUN_ZENITH_ANGLE = 30.0\n";
        let sun = SolarGeometry::parse_metadata(meta).unwrap();
        assert_relative_eq!(sun.altitude, 60.0);
    }

    #[test]
    fn test_incomplete_metadata() {
        assert_eq!(SolarGeometry::parse_metadata("SUN_AZIMUTH = 120.0\n"), None);
    }
}
