//! Scene inputs: band lookup, co-registration, dates and sun geometry

mod band_set;
mod date;
mod solar;
mod source;

pub use band_set::{BandSet, SpectralBands};
pub use date::parse_scene_date;
pub use solar::SolarGeometry;
pub use source::{matches_tokens, BandKind, BandSource, DirectoryBandSource, SceneFiles, QA_TOKENS};
