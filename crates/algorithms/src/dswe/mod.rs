//! Dynamic Surface Water Extent per-scene classification
//!
//! Band Set -> spectral indices -> five diagnostic tests -> interpreted
//! classes (INTR) -> optionally terrain/QA masked classes (INWM).

mod diagnostics;
mod indices;
mod interpret;
mod mask;

pub use diagnostics::{
    diagnostic_tests, encode_tests, pixel_tests, Diagnostics, PixelInputs, DIAG_FILL, NUM_TESTS,
};
pub use indices::{compute_indices, SpectralIndices};
pub use interpret::{classify, interpret_tests, DsweClass, CLASS_FILL};
pub use mask::{
    apply_qa_rules, apply_terrain_rules, reason, refine, MaskedLayers, QA_CLOUD_BIT, QA_SHADOW_BIT,
    QA_SNOW_BIT,
};

use crate::config::Thresholds;
use crate::scene::BandSet;
use dswe_core::{Algorithm, Error, Raster, Result};
use tracing::info;

/// Diagnostic outcomes and the interpreted layer of one Band Set
#[derive(Debug, Clone)]
pub struct Interpretation {
    pub diagnostics: Diagnostics,
    pub intr: Raster<u8>,
}

/// Run indices, tests and classification on a Band Set
pub fn interpret(set: &BandSet, thresholds: &Thresholds) -> Result<Interpretation> {
    info!("Performing diagnostic tests");
    let indices = compute_indices(set)?;
    let diagnostics = diagnostic_tests(set, &indices, thresholds)?;

    info!("Recoding to interpreted");
    let intr = classify(&diagnostics, set.grid())?;

    Ok(Interpretation { diagnostics, intr })
}

/// DSWE interpretation as an [`Algorithm`]
#[derive(Debug, Clone, Default)]
pub struct Dswe;

impl Algorithm for Dswe {
    type Input = BandSet;
    type Output = Raster<u8>;
    type Params = Thresholds;
    type Error = Error;

    fn name(&self) -> &'static str {
        "DSWE"
    }

    fn description(&self) -> &'static str {
        "Interpret six reflectance bands into Dynamic Surface Water Extent classes"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        interpret(&input, &params).map(|i| i.intr)
    }
}
