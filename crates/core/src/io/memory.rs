use super::native::{
    read_geotiff_from_buffer, read_geotiff_header_from_buffer, write_geotiff_to_buffer,
};
use super::{RasterHeader, RasterIo};
use crate::error::Result;
use crate::raster::{Raster, RasterElement};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// In-memory raster store keyed by path.
///
/// Rasters are held as encoded GeoTIFF bytes, so reading back goes through
/// the same decoder as files on disk.
#[derive(Debug, Default)]
pub struct MemoryIo {
    files: Mutex<BTreeMap<PathBuf, Vec<u8>>>,
}

impl MemoryIo {
    pub fn new() -> Self {
        Self::default()
    }

    fn files(&self) -> MutexGuard<'_, BTreeMap<PathBuf, Vec<u8>>> {
        // a poisoned lock only means a writer panicked mid-test; the map is still usable
        self.files.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// All stored paths, sorted
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.files().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files().is_empty()
    }

    fn bytes(&self, path: &Path) -> Result<Vec<u8>> {
        self.files().get(path).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, path.display().to_string()).into()
        })
    }
}

impl RasterIo for MemoryIo {
    fn read<T: RasterElement>(&self, path: &Path) -> Result<Raster<T>> {
        read_geotiff_from_buffer(&self.bytes(path)?)
    }

    fn read_header(&self, path: &Path) -> Result<RasterHeader> {
        read_geotiff_header_from_buffer(&self.bytes(path)?)
    }

    fn write<T: RasterElement>(&self, raster: &Raster<T>, path: &Path) -> Result<()> {
        let bytes = write_geotiff_to_buffer(raster)?;
        self.files().insert(path.to_path_buf(), bytes);
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.files().contains_key(path)
    }

    fn remove(&self, path: &Path) -> Result<()> {
        self.files().remove(path);
        Ok(())
    }
}
