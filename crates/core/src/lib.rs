//! # DSWE Core
//!
//! Grids, georeferencing and raster storage shared by the DSWE crates.
//!
//! - [`Raster<T>`]: a single band plus its transform, projection and fill
//! - [`GeoTransform`], [`Extent`], [`GridSpec`]: placement and grid unions
//! - [`RasterIo`]: storage seam, with [`GeoTiff`] on disk and [`MemoryIo`] for tests

pub mod error;
pub mod io;
pub mod projection;
pub mod raster;

pub use error::{Error, Result};
pub use io::{GeoTiff, MemoryIo, RasterHeader, RasterIo};
pub use projection::Projection;
pub use raster::{Extent, GeoTransform, GridSpec, Raster, RasterElement};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::io::{GeoTiff, RasterIo};
    pub use crate::projection::Projection;
    pub use crate::raster::{Extent, GeoTransform, Raster, RasterElement};
    pub use crate::Algorithm;
}

/// A named, parameterised raster operation.
///
/// Implemented by the DSWE interpreter and the terrain derivatives so they
/// can be driven uniformly; the free functions remain the primary API.
pub trait Algorithm {
    type Input;
    type Output;
    type Params: Default;
    type Error: std::error::Error;

    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn execute(&self, input: Self::Input, params: Self::Params) -> std::result::Result<Self::Output, Self::Error>;

    /// [`execute`](Algorithm::execute) with `Params::default()`
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
