//! Output naming and writing for proportion rasters

use super::accumulate::ProportionRaster;
use dswe_core::{RasterIo, Result};
use std::path::{Path, PathBuf};

/// First free path among `<stem>.tif`, `<stem>(1).tif`, `<stem>(2).tif`, ...
pub fn unique_path<IO: RasterIo>(io: &IO, dir: &Path, stem: &str) -> PathBuf {
    let first = dir.join(format!("{stem}.tif"));
    if !io.exists(&first) {
        return first;
    }
    (1u32..)
        .map(|n| dir.join(format!("{stem}({n}).tif")))
        .find(|p| !io.exists(p))
        .unwrap_or(first)
}

/// Write a proportion raster under a collision-free name
pub fn write_proportion<IO: RasterIo>(io: &IO, dir: &Path, stem: &str, raster: &ProportionRaster) -> Result<PathBuf> {
    let path = unique_path(io, dir, stem);
    match raster {
        ProportionRaster::Percent(r) => io.write(r, &path)?,
        ProportionRaster::Fraction(r) => io.write(r, &path)?,
    }
    Ok(path)
}
