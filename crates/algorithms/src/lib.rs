//! # DSWE Algorithms
//!
//! Dynamic Surface Water Extent classification of Landsat/HLS surface
//! reflectance scenes, terrain and QA masking, and temporal water
//! proportions.
//!
//! ## Modules
//!
//! - **scene**: band discovery, acquisition dates, solar geometry, band sets
//! - **dswe**: spectral indices, diagnostic tests, interpretation, masking
//! - **terrain**: percent slope and hillshade from a DEM
//! - **pipeline**: per-scene orchestration and product writing
//! - **proportions**: time buckets, occurrence counts, proportion rasters

pub mod config;
pub mod dswe;
pub mod parallel;
pub mod pipeline;
pub mod proportions;
mod rows;
pub mod scene;
pub mod terrain;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::Thresholds;
    pub use crate::dswe::{classify, interpret, refine, DsweClass, Dswe, MaskedLayers};
    pub use crate::parallel::ProcessingMode;
    pub use crate::pipeline::{process_scene, run_scenes, PipelineOptions, RunReport};
    pub use crate::proportions::{
        aggregate, discover_scenes, AggregateOptions, DsweLayer, ProportionScale, TimePeriod,
    };
    pub use crate::scene::{BandSet, BandSource, DirectoryBandSource, SceneFiles, SolarGeometry};
    pub use crate::terrain::{hillshade, percent_slope, Terrain, TerrainParams};
    pub use dswe_core::prelude::*;
}
