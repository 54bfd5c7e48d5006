//! Threshold Table
//!
//! All classification and masking cutoffs, loaded once from `thresholds.json`
//! and passed by reference into every stage.

use dswe_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Well-known file name of the threshold table
pub const THRESHOLDS_FILE: &str = "thresholds.json";

/// Classification and masking thresholds.
///
/// Field names serialize to the upper-case keys of the table file. Every
/// key is required; unknown keys are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Thresholds {
    /// Wetness index threshold (test 1)
    pub wigt: f64,
    /// Automated water extent shadow threshold (test 3)
    pub awgt: f64,
    #[serde(rename = "PSWT_1_MNDWI")]
    pub pswt1_mndwi: f64,
    #[serde(rename = "PSWT_1_NIR")]
    pub pswt1_nir: f64,
    #[serde(rename = "PSWT_1_SWIR1")]
    pub pswt1_swir1: f64,
    #[serde(rename = "PSWT_1_NDVI")]
    pub pswt1_ndvi: f64,
    #[serde(rename = "PSWT_2_MNDWI")]
    pub pswt2_mndwi: f64,
    #[serde(rename = "PSWT_2_BLUE")]
    pub pswt2_blue: f64,
    /// Present in every table but not read by test 5, which uses `pswt1_nir`
    #[serde(rename = "PSWT_2_NIR")]
    pub pswt2_nir: f64,
    #[serde(rename = "PSWT_2_SWIR1")]
    pub pswt2_swir1: f64,
    #[serde(rename = "PSWT_2_SWIR2")]
    pub pswt2_swir2: f64,
    pub percent_slope_high: f64,
    pub percent_slope_moderate: f64,
    pub percent_slope_wetland: f64,
    pub percent_slope_low: f64,
    /// Hillshade values at or below this are treated as shadowed
    pub hillshade: f64,
}

impl Default for Thresholds {
    /// USGS DSWE defaults, identical to the shipped `thresholds.json`
    fn default() -> Self {
        Self {
            wigt: 0.124,
            awgt: 0.0,
            pswt1_mndwi: -0.44,
            pswt1_nir: 1500.0,
            pswt1_swir1: 900.0,
            pswt1_ndvi: 0.7,
            pswt2_mndwi: -0.5,
            pswt2_blue: 1000.0,
            pswt2_nir: 2500.0,
            pswt2_swir1: 3000.0,
            pswt2_swir2: 1000.0,
            percent_slope_high: 30.0,
            percent_slope_moderate: 30.0,
            percent_slope_wetland: 20.0,
            percent_slope_low: 10.0,
            hillshade: 110.0,
        }
    }
}

impl Thresholds {
    /// Load a threshold table from a JSON file
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_json(&text).map_err(|reason| Error::Config {
            path: path.to_path_buf(),
            reason,
        })
    }

    /// Parse a threshold table; the error names the offending key
    pub fn from_json(text: &str) -> std::result::Result<Self, String> {
        serde_json::from_str(text).map_err(|e| e.to_string())
    }

    /// Locate and load the table.
    ///
    /// An explicit path wins; otherwise `thresholds.json` is looked up in the
    /// working directory, then next to the running executable.
    pub fn locate(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(p) => p.to_path_buf(),
            None => candidates()
                .into_iter()
                .find(|p| p.is_file())
                .ok_or_else(|| Error::Config {
                    path: PathBuf::from(THRESHOLDS_FILE),
                    reason: "not found in the working directory or next to the executable".into(),
                })?,
        };
        debug!("Loading thresholds from {}", path.display());
        Self::from_path(&path)
    }
}

fn candidates() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(THRESHOLDS_FILE)];
    if let Some(dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        paths.push(dir.join(THRESHOLDS_FILE));
    }
    paths
}
