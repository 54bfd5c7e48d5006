//! Occurrence Accumulator
//!
//! Per-pixel counts of open water, partial water and non-water observations
//! over one bucket, plus the number of valid observations.

use crate::dswe::DsweClass;
use dswe_core::raster::{GridSpec, Raster, TRANSFORM_TOLERANCE};
use dswe_core::{Error, Projection, Result};
use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};

/// Fill value of proportion rasters
pub const PROPORTION_FILL: u8 = 255;

/// The three disjoint occurrence categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Occurrence {
    /// Classes 1 and 2
    OpenWater,
    /// Classes 3 and 4
    PartialWater,
    /// Class 0
    NonWater,
}

impl Occurrence {
    pub const ALL: [Occurrence; 3] = [
        Occurrence::OpenWater,
        Occurrence::PartialWater,
        Occurrence::NonWater,
    ];

    /// Category of a class code; `None` for 9, 255 and unknown codes
    pub fn of(code: u8) -> Option<Self> {
        match DsweClass::from_code(code)? {
            DsweClass::HighConfidence | DsweClass::ModerateConfidence => Some(Occurrence::OpenWater),
            DsweClass::PotentialWetland | DsweClass::LowConfidence => Some(Occurrence::PartialWater),
            DsweClass::NotWater => Some(Occurrence::NonWater),
            DsweClass::Cloud | DsweClass::Fill => None,
        }
    }

    /// Name used in output file names
    pub fn file_tag(&self) -> &'static str {
        match self {
            Occurrence::OpenWater => "open_sw",
            Occurrence::PartialWater => "partial_sw",
            Occurrence::NonWater => "nonwater",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// How proportions are expressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProportionScale {
    /// Integer percentage 0-100 (`u8`)
    #[default]
    Percent,
    /// Fraction 0-1 (`f32`)
    Fraction,
}

/// A proportion layer in the configured scale; fill is 255 in both
#[derive(Debug, Clone)]
pub enum ProportionRaster {
    Percent(Raster<u8>),
    Fraction(Raster<f32>),
}

impl ProportionRaster {
    pub fn shape(&self) -> (usize, usize) {
        match self {
            ProportionRaster::Percent(r) => r.shape(),
            ProportionRaster::Fraction(r) => r.shape(),
        }
    }
}

/// Rounded percentage `count / valid * 100`, half away from zero
pub fn percent(count: u32, valid: u32) -> Option<u8> {
    if valid == 0 {
        return None;
    }
    let (count, valid) = (u64::from(count), u64::from(valid));
    u8::try_from((count * 200 + valid) / (2 * valid)).ok()
}

/// Counts for one bucket on a common grid
#[derive(Debug, Clone)]
pub struct OccurrenceAccumulator {
    grid: GridSpec,
    projection: Option<Projection>,
    counts: [Array2<u32>; 3],
    valid: Array2<u32>,
    members: usize,
}

impl OccurrenceAccumulator {
    pub fn new(grid: GridSpec, projection: Option<Projection>) -> Self {
        let zeros = || Array2::zeros((grid.rows, grid.cols));
        Self {
            grid,
            projection,
            counts: [zeros(), zeros(), zeros()],
            valid: zeros(),
            members: 0,
        }
    }

    pub fn grid(&self) -> &GridSpec {
        &self.grid
    }

    /// Number of rasters accumulated so far
    pub fn members(&self) -> usize {
        self.members
    }

    /// Add one classified raster already on the accumulator grid
    pub fn add(&mut self, layer: &Raster<u8>) -> Result<()> {
        if layer.shape() != (self.grid.rows, self.grid.cols) {
            return Err(Error::SizeMismatch {
                er: self.grid.rows,
                ec: self.grid.cols,
                ar: layer.rows(),
                ac: layer.cols(),
            });
        }
        if !layer.transform().approx_eq(&self.grid.transform, TRANSFORM_TOLERANCE) {
            return Err(Error::TransformMismatch {
                what: "bucket member".into(),
                expected: self.grid.transform.to_gdal(),
                actual: layer.transform().to_gdal(),
            });
        }

        let [open, partial, nonwater] = &mut self.counts;
        Zip::from(layer.data())
            .and(open)
            .and(partial)
            .and(nonwater)
            .and(&mut self.valid)
            .for_each(|&code, o, p, n, v| {
                if let Some(category) = Occurrence::of(code) {
                    match category {
                        Occurrence::OpenWater => *o += 1,
                        Occurrence::PartialWater => *p += 1,
                        Occurrence::NonWater => *n += 1,
                    }
                    *v += 1;
                }
            });
        self.members += 1;
        Ok(())
    }

    pub fn count(&self, category: Occurrence) -> &Array2<u32> {
        &self.counts[category.index()]
    }

    pub fn valid(&self) -> &Array2<u32> {
        &self.valid
    }

    fn raster<T: dswe_core::RasterElement>(&self, data: Array2<T>, nodata: Option<T>) -> Raster<T> {
        let mut r = Raster::from_array(data);
        r.set_transform(self.grid.transform);
        r.set_projection(self.projection.clone());
        r.set_nodata(nodata);
        r
    }

    /// Proportion of `category` among valid observations.
    ///
    /// Pixels without a valid observation get the fill value 255.
    pub fn proportion(&self, category: Occurrence, scale: ProportionScale) -> ProportionRaster {
        let counts = self.count(category);
        match scale {
            ProportionScale::Percent => {
                let mut data = Array2::from_elem(counts.dim(), PROPORTION_FILL);
                Zip::from(&mut data)
                    .and(counts)
                    .and(&self.valid)
                    .for_each(|out, &c, &v| {
                        if let Some(p) = percent(c, v) {
                            *out = p;
                        }
                    });
                ProportionRaster::Percent(self.raster(data, Some(PROPORTION_FILL)))
            }
            ProportionScale::Fraction => {
                let fill = f32::from(PROPORTION_FILL);
                let mut data = Array2::from_elem(counts.dim(), fill);
                Zip::from(&mut data)
                    .and(counts)
                    .and(&self.valid)
                    .for_each(|out, &c, &v| {
                        if v > 0 {
                            *out = (f64::from(c) / f64::from(v)) as f32;
                        }
                    });
                ProportionRaster::Fraction(self.raster(data, Some(fill)))
            }
        }
    }

    /// Count raster of a category (`u16`, saturating, no fill)
    pub fn count_raster(&self, category: Occurrence) -> Raster<u16> {
        self.raster(self.count(category).mapv(saturate), None)
    }

    /// Valid observation count raster (`u16`, saturating, no fill)
    pub fn valid_raster(&self) -> Raster<u16> {
        self.raster(self.valid.mapv(saturate), None)
    }
}

fn saturate(v: u32) -> u16 {
    u16::try_from(v).unwrap_or(u16::MAX)
}
