//! Scene records from a directory of classified rasters

use crate::scene::{matches_tokens, parse_scene_date};
use chrono::NaiveDate;
use dswe_core::{RasterHeader, RasterIo, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Which classified product feeds the aggregator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DsweLayer {
    /// Masked interpretation
    #[default]
    Inwm,
    /// Unmasked interpretation
    Intr,
}

impl DsweLayer {
    pub fn tag(&self) -> &'static str {
        match self {
            DsweLayer::Inwm => "INWM",
            DsweLayer::Intr => "INTR",
        }
    }
}

impl fmt::Display for DsweLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for DsweLayer {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "INWM" => Ok(DsweLayer::Inwm),
            "INTR" => Ok(DsweLayer::Intr),
            other => Err(format!("unknown DSWE layer '{other}', expected INWM or INTR")),
        }
    }
}

/// One classified raster as seen by the aggregator
#[derive(Debug, Clone, PartialEq)]
pub struct SceneRecord {
    pub path: PathBuf,
    pub date: NaiveDate,
    pub header: RasterHeader,
}

impl SceneRecord {
    /// Record for a raster, reading only its header
    pub fn read<IO: RasterIo>(io: &IO, path: &Path, date: NaiveDate) -> Result<Self> {
        Ok(Self {
            path: path.to_path_buf(),
            date,
            header: io.read_header(path)?,
        })
    }

    /// Top-left corner of the raster grid
    pub fn origin(&self) -> (f64, f64) {
        (self.header.transform.origin_x, self.header.transform.origin_y)
    }
}

/// Find every `layer` raster under `main_dir`, sorted by date then path.
///
/// Files whose name carries no acquisition date, or whose header cannot be
/// read, are skipped with a warning. Previous proportion outputs are ignored.
pub fn discover_scenes<IO: RasterIo>(io: &IO, main_dir: &Path, layer: DsweLayer) -> Result<Vec<SceneRecord>> {
    let mut records = Vec::new();

    for entry in WalkDir::new(main_dir)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| {
            !e.file_name()
                .to_str()
                .is_some_and(|n| e.file_type().is_dir() && n.starts_with("proportions_"))
        })
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Cannot read directory entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let is_tiff = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("tif") || e.eq_ignore_ascii_case("tiff"));
        if !is_tiff || !matches_tokens(name, &[layer.tag()]) {
            continue;
        }

        let date = match parse_scene_date(name) {
            Ok(date) => date,
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                continue;
            }
        };
        match SceneRecord::read(io, path, date) {
            Ok(record) => {
                debug!("Found {} ({})", path.display(), date);
                records.push(record);
            }
            Err(e) => warn!("Skipping {}: {}", path.display(), e),
        }
    }

    records.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.path.cmp(&b.path)));
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dswe_core::{GeoTiff, Raster};

    #[test]
    fn test_layer_parse() {
        assert_eq!("inwm".parse::<DsweLayer>().unwrap(), DsweLayer::Inwm);
        assert_eq!("INTR".parse::<DsweLayer>().unwrap(), DsweLayer::Intr);
        assert!("DIAG".parse::<DsweLayer>().is_err());
    }

    #[test]
    fn test_discovery_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let r: Raster<u8> = Raster::filled(2, 2, 1);

        let later = root.join("LC08_X_034032_20200601_20200822_02_T1").join("LC08_X_034032_20200601_20200822_02_T1_INWM.tif");
        let earlier = root.join("a").join("LC08_X_034032_20200101_20200822_02_T1_INWM.tif");
        GeoTiff.write(&r, &later).unwrap();
        GeoTiff.write(&r, &earlier).unwrap();
        // other layer, undated file and old outputs are ignored
        GeoTiff.write(&r, &root.join("a").join("LC08_X_034032_20200101_20200822_02_T1_INTR.tif")).unwrap();
        GeoTiff.write(&r, &root.join("undated_INWM.tif")).unwrap();
        GeoTiff.write(&r, &root.join("proportions_year").join("LC08_X_034032_20200101_INWM.tif")).unwrap();

        let records = discover_scenes(&GeoTiff, root, DsweLayer::Inwm).unwrap();
        let paths: Vec<_> = records.iter().map(|r| r.path.clone()).collect();
        assert_eq!(paths, vec![earlier, later]);
        assert_eq!(records[0].header.rows, 2);
    }
}
