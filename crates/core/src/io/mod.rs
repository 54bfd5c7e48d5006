//! I/O operations for reading and writing georeferenced rasters
//!
//! Algorithms never touch files directly; they go through a [`RasterIo`]
//! implementation. [`GeoTiff`] is the filesystem backend, [`MemoryIo`]
//! keeps encoded rasters in memory and is what tests use.

mod memory;
mod native;

pub use memory::MemoryIo;
pub use native::{
    read_geotiff, read_geotiff_from_buffer, read_geotiff_header, read_geotiff_header_from_buffer, read_geotiff_metadata,
    write_geotiff, write_geotiff_to_buffer, RasterHeader,
};

use crate::error::Result;
use crate::raster::{Raster, RasterElement};
use std::path::Path;

/// Storage backend for single-band georeferenced rasters
pub trait RasterIo: Send + Sync {
    /// Read a full raster, casting samples to `T`
    fn read<T: RasterElement>(&self, path: &Path) -> Result<Raster<T>>;

    /// Read dimensions, geotransform, projection and no-data only
    fn read_header(&self, path: &Path) -> Result<RasterHeader>;

    /// Write a raster, creating parent directories as needed
    fn write<T: RasterElement>(&self, raster: &Raster<T>, path: &Path) -> Result<()>;

    /// Whether a raster exists at `path`
    fn exists(&self, path: &Path) -> bool;

    /// Delete the raster at `path`; a missing raster is not an error
    fn remove(&self, path: &Path) -> Result<()>;
}

/// GeoTIFF files on the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoTiff;

impl RasterIo for GeoTiff {
    fn read<T: RasterElement>(&self, path: &Path) -> Result<Raster<T>> {
        read_geotiff(path)
    }

    fn read_header(&self, path: &Path) -> Result<RasterHeader> {
        read_geotiff_header(path)
    }

    fn write<T: RasterElement>(&self, raster: &Raster<T>, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        write_geotiff(raster, path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn remove(&self, path: &Path) -> Result<()> {
        match std::fs::remove_file(path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::Projection;
    use crate::raster::GeoTransform;
    use ndarray::array;

    #[test]
    fn test_geotiff_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("scene_INTR.tif");

        let mut r = Raster::from_array(array![[0u8, 1], [4, 255]]);
        r.set_transform(GeoTransform::new(300000.0, 4500000.0, 30.0, -30.0));
        r.set_projection(Some(Projection::from_epsg(32612)));
        r.set_nodata(Some(255));

        GeoTiff.write(&r, &path).unwrap();
        assert!(GeoTiff.exists(&path));

        let back: Raster<u8> = GeoTiff.read(&path).unwrap();
        assert_eq!(back.data(), r.data());
        assert_eq!(back.projection(), r.projection());

        let header = GeoTiff.read_header(&path).unwrap();
        assert_eq!((header.rows, header.cols), (2, 2));
        assert_eq!(header.transform, *r.transform());

        GeoTiff.remove(&path).unwrap();
        assert!(!GeoTiff.exists(&path));
        GeoTiff.remove(&path).unwrap();
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.tif");
        assert!(!GeoTiff.exists(&path));
        assert!(matches!(
            GeoTiff.read::<u8>(&path),
            Err(crate::Error::Io(_))
        ));
    }
}
