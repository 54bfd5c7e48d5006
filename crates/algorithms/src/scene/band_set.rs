//! Co-registered reflectance bands of one scene

use super::source::{BandKind, SceneFiles};
use dswe_core::{Error, Raster, RasterIo, Result};
use tracing::debug;

/// The six reflectance bands, in the order the classifier reads them
#[derive(Debug, Clone)]
pub struct SpectralBands {
    pub blue: Raster<f64>,
    pub green: Raster<f64>,
    pub red: Raster<f64>,
    pub nir: Raster<f64>,
    pub swir1: Raster<f64>,
    pub swir2: Raster<f64>,
}

impl SpectralBands {
    fn each(&self) -> [(BandKind, &Raster<f64>); 6] {
        [
            (BandKind::Blue, &self.blue),
            (BandKind::Green, &self.green),
            (BandKind::Red, &self.red),
            (BandKind::Nir, &self.nir),
            (BandKind::Swir1, &self.swir1),
            (BandKind::Swir2, &self.swir2),
        ]
    }
}

/// Validated Band Set: six reflectance bands plus an optional QA bitmask,
/// all on one grid, with a single shared fill value.
#[derive(Debug, Clone)]
pub struct BandSet {
    bands: SpectralBands,
    qa: Option<Raster<u16>>,
    fill: f64,
}

impl BandSet {
    /// Validate co-registration and the shared fill value.
    ///
    /// Every band must sit on the blue band's grid (shape, geotransform,
    /// projection) and carry the same no-data value. The QA band must share
    /// the grid; its no-data value is not used.
    pub fn new(bands: SpectralBands, qa: Option<Raster<u16>>) -> Result<Self> {
        let reference = &bands.blue;
        let fill = reference
            .nodata()
            .ok_or_else(|| Error::NoDataNotSet(BandKind::Blue.name().into()))?;

        for (kind, band) in bands.each().into_iter().skip(1) {
            reference.check_same_grid(band, kind.name())?;
            let nodata = band
                .nodata()
                .ok_or_else(|| Error::NoDataNotSet(kind.name().into()))?;
            if nodata != fill && !(nodata.is_nan() && fill.is_nan()) {
                return Err(Error::FillMismatch {
                    what: kind.name().into(),
                    expected: fill,
                    actual: nodata,
                });
            }
        }
        if let Some(qa) = &qa {
            reference.check_same_grid(qa, "qa")?;
        }

        Ok(Self { bands, qa, fill })
    }

    /// Read and validate the bands listed in `files`
    pub fn read<IO: RasterIo>(io: &IO, files: &SceneFiles) -> Result<Self> {
        let read = |kind: BandKind| -> Result<Raster<f64>> {
            let path = files.band(kind)?;
            debug!("{}: reading {} from {}", files.scene, kind, path.display());
            io.read(path)
        };
        let bands = SpectralBands {
            blue: read(BandKind::Blue)?,
            green: read(BandKind::Green)?,
            red: read(BandKind::Red)?,
            nir: read(BandKind::Nir)?,
            swir1: read(BandKind::Swir1)?,
            swir2: read(BandKind::Swir2)?,
        };
        let qa = match &files.qa {
            Some(path) => Some(io.read::<u16>(path)?),
            None => None,
        };
        Self::new(bands, qa)
    }

    pub fn bands(&self) -> &SpectralBands {
        &self.bands
    }

    pub fn qa(&self) -> Option<&Raster<u16>> {
        self.qa.as_ref()
    }

    /// Shared reflectance fill value
    pub fn fill(&self) -> f64 {
        self.fill
    }

    /// Reference grid (the blue band)
    pub fn grid(&self) -> &Raster<f64> {
        &self.bands.blue
    }

    pub fn shape(&self) -> (usize, usize) {
        self.bands.blue.shape()
    }

    /// Whether `value` is the fill value
    pub fn is_fill(&self, value: f64) -> bool {
        value == self.fill || value.is_nan()
    }
}
