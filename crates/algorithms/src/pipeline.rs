//! Per-scene pipeline and the multi-scene runner
//!
//! A scene that fails to resolve, read, validate or classify is skipped and
//! recorded in the [`RunReport`]; it never aborts the run.

use crate::config::Thresholds;
use crate::dswe::{interpret, refine, MaskedLayers};
use crate::parallel::ProcessingMode;
use crate::scene::{BandSet, BandSource, SceneFiles, SolarGeometry};
use crate::terrain::{SlopeParams, Terrain, TerrainParams};
use dswe_core::{Error, Raster, RasterIo, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Options for the per-scene pipeline
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineOptions {
    /// Write the encoded diagnostic tests (`_DIAG.tif`)
    pub write_diag: bool,
    /// Write the derived `_SLOPE.tif` and `_SHADE.tif`
    pub write_terrain: bool,
    pub slope: SlopeParams,
    /// Sun position when the scene carries no metadata
    pub default_sun: SolarGeometry,
    pub mode: ProcessingMode,
}

/// Layers produced for one scene
#[derive(Debug, Clone)]
pub struct SceneProducts {
    pub scene: String,
    pub intr: Raster<u8>,
    pub diag: Option<Raster<u16>>,
    pub masked: Option<MaskedLayers>,
    pub terrain: Option<Terrain>,
}

/// Classify one resolved scene.
///
/// With a DEM the interpreted layer is also masked, which requires the QA
/// band.
pub fn process_scene<IO: RasterIo>(
    io: &IO,
    files: &SceneFiles,
    dem: Option<&Raster<f64>>,
    thresholds: &Thresholds,
    options: &PipelineOptions,
) -> Result<SceneProducts> {
    let set = BandSet::read(io, files)?;
    let interpretation = interpret(&set, thresholds)?;

    let diag = if options.write_diag {
        Some(interpretation.diagnostics.encode(set.grid())?)
    } else {
        None
    };

    let (masked, terrain) = match dem {
        Some(dem) => {
            let qa = set.qa().ok_or_else(|| Error::MissingBand {
                scene: files.scene.clone(),
                band: "qa",
            })?;
            let sun = files.solar_geometry().unwrap_or(options.default_sun);
            debug!("{}: sun azimuth {} altitude {}", files.scene, sun.azimuth, sun.altitude);

            let params = TerrainParams {
                slope: options.slope,
                sun,
            };
            let terrain = Terrain::derive(dem, set.grid(), &params)?;
            info!("Calculating mask and masked interpreted layer");
            let masked = refine(&interpretation.intr, &terrain, qa, thresholds)?;
            (Some(masked), options.write_terrain.then_some(terrain))
        }
        None => (None, None),
    };

    Ok(SceneProducts {
        scene: files.scene.clone(),
        intr: interpretation.intr,
        diag,
        masked,
        terrain,
    })
}

/// Output path `<out_dir>/<scene>/<scene>_<LAYER>.tif`
pub fn product_path(out_dir: &Path, scene: &str, layer: &str) -> PathBuf {
    out_dir.join(scene).join(format!("{scene}_{layer}.tif"))
}

/// Write all layers of a scene; returns the written paths.
///
/// If any layer fails, the layers already written for the scene are removed
/// again so that no partial product set is left behind.
pub fn write_products<IO: RasterIo>(io: &IO, out_dir: &Path, products: &SceneProducts) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    match write_layers(io, out_dir, products, &mut written) {
        Ok(()) => Ok(written),
        Err(e) => {
            for path in &written {
                debug!("Removing {}", path.display());
                if let Err(err) = io.remove(path) {
                    warn!("Failed to remove {}: {}", path.display(), err);
                }
            }
            Err(e)
        }
    }
}

/// Paths are recorded before writing so a half-written layer is cleaned up too
fn write_layers<IO: RasterIo>(
    io: &IO,
    out_dir: &Path,
    products: &SceneProducts,
    written: &mut Vec<PathBuf>,
) -> Result<()> {
    let scene = products.scene.as_str();
    let mut save = |layer: &str, write: &dyn Fn(&Path) -> Result<()>| -> Result<()> {
        let path = product_path(out_dir, scene, layer);
        info!("Saving {}", path.display());
        written.push(path.clone());
        write(&path)
    };

    save("INTR", &|p: &Path| io.write(&products.intr, p))?;
    if let Some(diag) = &products.diag {
        save("DIAG", &|p: &Path| io.write(diag, p))?;
    }
    if let Some(masked) = &products.masked {
        save("INWM", &|p: &Path| io.write(&masked.inwm, p))?;
        save("MASK", &|p: &Path| io.write(&masked.mask, p))?;
    }
    if let Some(terrain) = &products.terrain {
        save("SLOPE", &|p: &Path| io.write(&terrain.slope.map(|v| v as f32, Some(f32::NAN)), p))?;
        save("SHADE", &|p: &Path| io.write(&terrain.shade.map(|v| v as f32, Some(f32::NAN)), p))?;
    }
    Ok(())
}

/// A scene that was classified and written
#[derive(Debug, Clone, Serialize)]
pub struct SceneOutcome {
    pub scene: String,
    pub outputs: Vec<PathBuf>,
}

/// A scene that was skipped, with the reason
#[derive(Debug, Clone, Serialize)]
pub struct SkippedScene {
    pub scene: String,
    pub reason: String,
}

/// Result of a multi-scene run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub completed: Vec<SceneOutcome>,
    pub skipped: Vec<SkippedScene>,
}

impl RunReport {
    pub fn total(&self) -> usize {
        self.completed.len() + self.skipped.len()
    }
}

/// Classify every scene of `source` and write products under `out_dir`.
///
/// Scenes run on the worker pool selected by `options.mode`; `on_scene`
/// is called once per finished scene (for progress display).
pub fn run_scenes<IO, S, F>(
    io: &IO,
    source: &S,
    dem: Option<&Raster<f64>>,
    out_dir: &Path,
    thresholds: &Thresholds,
    options: &PipelineOptions,
    on_scene: F,
) -> Result<RunReport>
where
    IO: RasterIo,
    S: BandSource,
    F: Fn(&str) + Sync + Send,
{
    let scenes = source.scenes()?;
    info!("Processing {} scenes", scenes.len());

    let results = options.mode.map(&scenes, |scene| {
        info!("Processing scene {}", scene);
        let result = source
            .locate(scene)
            .and_then(|files| process_scene(io, &files, dem, thresholds, options))
            .and_then(|products| write_products(io, out_dir, &products));
        on_scene(scene);
        result
    })?;

    let mut report = RunReport::default();
    for (scene, result) in scenes.into_iter().zip(results) {
        match result {
            Ok(outputs) => report.completed.push(SceneOutcome { scene, outputs }),
            Err(e) => {
                warn!("Skipping scene {}: {}", scene, e);
                report.skipped.push(SkippedScene {
                    scene,
                    reason: e.to_string(),
                });
            }
        }
    }

    info!(
        "{} of {} scenes classified, {} skipped",
        report.completed.len(),
        report.total(),
        report.skipped.len()
    );
    Ok(report)
}
