//! Raster data structures and operations

mod element;
mod extent;
mod geotransform;
mod grid;

pub use element::{RasterElement, SampleKind};
pub use extent::{regrid_nearest, Extent, GridSpec};
pub use geotransform::GeoTransform;
pub use grid::{Raster, RasterSummary, TRANSFORM_TOLERANCE};
