//! End-to-end tests of the per-scene pipeline on in-memory scenes.
//!
//! Every raster goes through the GeoTIFF encoder and decoder, so these also
//! cover the on-disk layout of INTR/DIAG/INWM/MASK products.

use dswe_algorithms::config::Thresholds;
use dswe_algorithms::dswe::reason;
use dswe_algorithms::parallel::ProcessingMode;
use dswe_algorithms::pipeline::{process_scene, product_path, run_scenes, PipelineOptions};
use dswe_algorithms::scene::{BandKind, BandSource, SceneFiles};
use dswe_core::{Error, GeoTransform, MemoryIo, Projection, Raster, RasterIo, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

const FILL: i16 = -9999;
const SCENE: &str = "LC08_L2SP_034032_20200601_20200822_02_T1";

/// Reflectance of one pixel: blue, green, red, nir, swir1, swir2
type Spectrum = [i16; 6];

/// Passes all five tests
const WATER: Spectrum = [500, 800, 400, 200, 100, 50];
/// Passes no test
const LAND: Spectrum = [400, 600, 500, 3000, 2000, 1200];
/// Passes tests 1 and 2 only
const WETLAND: Spectrum = [1000, 1500, 5000, 3000, 1000, 1000];
const NO_DATA: Spectrum = [FILL; 6];

/// Scenes held in memory, resolved by name
#[derive(Default)]
struct MemorySource {
    scenes: BTreeMap<String, SceneFiles>,
}

impl BandSource for MemorySource {
    fn scenes(&self) -> Result<Vec<String>> {
        Ok(self.scenes.keys().cloned().collect())
    }

    fn locate(&self, scene: &str) -> Result<SceneFiles> {
        self.scenes
            .get(scene)
            .cloned()
            .ok_or_else(|| Error::Other(format!("unknown scene {scene}")))
    }
}

fn transform() -> GeoTransform {
    GeoTransform::new(500_000.0, 4_200_060.0, 30.0, -30.0)
}

fn georeferenced<T: dswe_core::RasterElement>(values: Vec<T>, nodata: Option<T>) -> Raster<T> {
    let mut r = Raster::from_vec(values, 2, 2).unwrap();
    r.set_transform(transform());
    r.set_projection(Some(Projection::from_epsg(32613)));
    r.set_nodata(nodata);
    r
}

/// Write a 2x2 scene `[[water, land], [wetland, fill]]` and return its files
fn write_scene(io: &MemoryIo, scene: &str, qa: Option<Vec<u16>>, skip: Option<BandKind>) -> SceneFiles {
    let pixels = [WATER, LAND, WETLAND, NO_DATA];
    let dir = PathBuf::from("in").join(scene);
    let mut files = SceneFiles::new(scene);

    for (i, kind) in BandKind::ALL.into_iter().enumerate() {
        if Some(kind) == skip {
            continue;
        }
        let path = dir.join(format!("{scene}_SR_{}.tif", kind.tokens()[2]));
        let band = georeferenced(pixels.iter().map(|p| p[i]).collect(), Some(FILL));
        io.write(&band, &path).unwrap();
        files = files.with_band(kind, path);
    }
    if let Some(bits) = qa {
        let path = dir.join(format!("{scene}_QA_PIXEL.tif"));
        io.write(&georeferenced(bits, None), &path).unwrap();
        files = files.with_qa(path);
    }
    files
}

fn flat_dem() -> Raster<f64> {
    georeferenced(vec![1500.0; 4], Some(-9999.0))
}

fn values(io: &MemoryIo, path: &Path) -> Vec<u8> {
    let r: Raster<u8> = io.read(path).unwrap();
    r.data().iter().copied().collect()
}

#[test]
fn test_interpreted_layer_of_mixed_scene() {
    let io = MemoryIo::new();
    let files = write_scene(&io, SCENE, None, None);

    let products = process_scene(&io, &files, None, &Thresholds::default(), &PipelineOptions::default()).unwrap();

    assert_eq!(products.intr.data().iter().copied().collect::<Vec<_>>(), vec![1, 0, 3, 255]);
    assert_eq!(products.intr.nodata(), Some(255));
    assert_eq!(products.intr.transform(), &transform());
    assert!(products.masked.is_none());
    assert!(products.diag.is_none());
}

#[test]
fn test_diagnostic_layer_encodes_passed_tests() {
    let io = MemoryIo::new();
    let files = write_scene(&io, SCENE, None, None);
    let options = PipelineOptions {
        write_diag: true,
        ..Default::default()
    };

    let products = process_scene(&io, &files, None, &Thresholds::default(), &options).unwrap();
    let diag = products.diag.unwrap();

    assert_eq!(diag.data().iter().copied().collect::<Vec<_>>(), vec![11111, 0, 11000, 255]);
}

#[test]
fn test_masked_layers_follow_qa_bits() {
    let io = MemoryIo::new();
    // cloud over land, shadow over the wetland pixel
    let files = write_scene(&io, SCENE, Some(vec![0, 1 << 1, 1 << 3, 0]), None);
    let dem = flat_dem();

    let products = process_scene(&io, &files, Some(&dem), &Thresholds::default(), &PipelineOptions::default()).unwrap();
    let masked = products.masked.unwrap();

    assert_eq!(masked.inwm.data().iter().copied().collect::<Vec<_>>(), vec![1, 9, 3, 255]);
    assert_eq!(
        masked.mask.data().iter().copied().collect::<Vec<_>>(),
        vec![reason::NONE, reason::CLOUD, reason::NONE, 255]
    );
    // unmasked layer stays as classified
    assert_eq!(products.intr.data().iter().copied().collect::<Vec<_>>(), vec![1, 0, 3, 255]);
}

#[test]
fn test_masking_without_qa_is_an_error() {
    let io = MemoryIo::new();
    let files = write_scene(&io, SCENE, None, None);
    let dem = flat_dem();

    let err = process_scene(&io, &files, Some(&dem), &Thresholds::default(), &PipelineOptions::default()).unwrap_err();
    assert!(matches!(err, Error::MissingBand { band: "qa", .. }));
}

#[test]
fn test_run_writes_products_and_reports_skips() {
    let io = MemoryIo::new();
    let broken = "LC08_L2SP_034032_20200705_20200822_02_T1";
    let mut source = MemorySource::default();
    source
        .scenes
        .insert(SCENE.into(), write_scene(&io, SCENE, Some(vec![0; 4]), None));
    source
        .scenes
        .insert(broken.into(), write_scene(&io, broken, Some(vec![0; 4]), Some(BandKind::Nir)));

    let out = Path::new("out");
    let dem = flat_dem();
    let options = PipelineOptions {
        write_diag: true,
        write_terrain: true,
        mode: ProcessingMode::Sequential,
        ..Default::default()
    };
    let finished = AtomicUsize::new(0);

    let report = run_scenes(&io, &source, Some(&dem), out, &Thresholds::default(), &options, |_| {
        finished.fetch_add(1, Ordering::Relaxed);
    })
    .unwrap();

    assert_eq!(finished.load(Ordering::Relaxed), 2);
    assert_eq!(report.total(), 2);
    assert_eq!(report.completed.len(), 1);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].scene, broken);
    assert!(report.skipped[0].reason.contains("nir"), "{}", report.skipped[0].reason);

    for layer in ["INTR", "DIAG", "INWM", "MASK", "SLOPE", "SHADE"] {
        let path = product_path(out, SCENE, layer);
        assert!(io.exists(&path), "missing {}", path.display());
        assert!(report.completed[0].outputs.contains(&path));
    }
    assert!(!io.exists(&product_path(out, broken, "INTR")));

    let intr = product_path(out, SCENE, "INTR");
    assert_eq!(values(&io, &intr), vec![1, 0, 3, 255]);
    let header = io.read_header(&intr).unwrap();
    assert_eq!(header.nodata, Some(255.0));
    assert_eq!(header.projection.and_then(|p| p.epsg()), Some(32613));
}

#[test]
fn test_parallel_run_matches_sequential() {
    let io = MemoryIo::new();
    let mut source = MemorySource::default();
    for day in 1..=6 {
        let scene = format!("LC08_L2SP_034032_202006{day:02}_20200822_02_T1");
        let files = write_scene(&io, &scene, None, None);
        source.scenes.insert(scene, files);
    }

    let run = |mode, out: &str| {
        let options = PipelineOptions {
            mode,
            ..Default::default()
        };
        run_scenes(&io, &source, None, Path::new(out), &Thresholds::default(), &options, |_| {}).unwrap()
    };
    let sequential = run(ProcessingMode::Sequential, "seq");
    let parallel = run(ProcessingMode::ParallelWith(3), "par");

    assert_eq!(sequential.completed.len(), 6);
    assert_eq!(parallel.completed.len(), 6);
    for (a, b) in sequential.completed.iter().zip(&parallel.completed) {
        assert_eq!(a.scene, b.scene);
        assert_eq!(values(&io, &a.outputs[0]), values(&io, &b.outputs[0]));
    }
}

/// Memory store whose `fail_at`-th write stores the raster and then reports failure
struct FailingIo {
    inner: MemoryIo,
    writes: AtomicUsize,
    fail_at: usize,
}

impl RasterIo for FailingIo {
    fn read<T: dswe_core::RasterElement>(&self, path: &Path) -> Result<Raster<T>> {
        self.inner.read(path)
    }

    fn read_header(&self, path: &Path) -> Result<dswe_core::RasterHeader> {
        self.inner.read_header(path)
    }

    fn write<T: dswe_core::RasterElement>(&self, raster: &Raster<T>, path: &Path) -> Result<()> {
        self.inner.write(raster, path)?;
        if self.writes.fetch_add(1, Ordering::SeqCst) + 1 == self.fail_at {
            return Err(Error::Other(format!("no space left writing {}", path.display())));
        }
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.inner.exists(path)
    }

    fn remove(&self, path: &Path) -> Result<()> {
        self.inner.remove(path)
    }
}

#[test]
fn test_failed_write_leaves_no_partial_products() {
    let io = FailingIo {
        inner: MemoryIo::new(),
        writes: AtomicUsize::new(0),
        // INTR, DIAG, then INWM fails
        fail_at: 3,
    };
    let mut source = MemorySource::default();
    source
        .scenes
        .insert(SCENE.into(), write_scene(&io.inner, SCENE, Some(vec![0; 4]), None));
    let inputs = io.inner.len();

    let out = Path::new("out");
    let dem = flat_dem();
    let options = PipelineOptions {
        write_diag: true,
        mode: ProcessingMode::Sequential,
        ..Default::default()
    };

    let report = run_scenes(&io, &source, Some(&dem), out, &Thresholds::default(), &options, |_| {}).unwrap();

    assert!(report.completed.is_empty());
    assert_eq!(report.skipped.len(), 1);
    assert!(report.skipped[0].reason.contains("no space left"), "{}", report.skipped[0].reason);
    for layer in ["INTR", "DIAG", "INWM", "MASK"] {
        assert!(!io.exists(&product_path(out, SCENE, layer)), "{layer} left behind");
    }
    assert_eq!(io.inner.len(), inputs);
}
