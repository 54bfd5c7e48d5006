//! Band source provider
//!
//! Resolves the files that make up one scene. Landsat products name bands
//! by number (`band05`, `B5`), Sentinel/HLS by band code (`B8A`), so lookup
//! goes through a fixed table of filename tokens per band.

use super::solar::SolarGeometry;
use dswe_core::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// The six reflectance bands used by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BandKind {
    Blue,
    Green,
    Red,
    Nir,
    Swir1,
    Swir2,
}

impl BandKind {
    pub const ALL: [BandKind; 6] = [
        BandKind::Blue,
        BandKind::Green,
        BandKind::Red,
        BandKind::Nir,
        BandKind::Swir1,
        BandKind::Swir2,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            BandKind::Blue => "blue",
            BandKind::Green => "green",
            BandKind::Red => "red",
            BandKind::Nir => "nir",
            BandKind::Swir1 => "swir1",
            BandKind::Swir2 => "swir2",
        }
    }

    /// Filename tokens identifying this band (Landsat number, HLS code, Landsat C2)
    pub fn tokens(&self) -> &'static [&'static str] {
        match self {
            BandKind::Blue => &["band02", "B02", "B2"],
            BandKind::Green => &["band03", "B03", "B3"],
            BandKind::Red => &["band04", "B04", "B4"],
            BandKind::Nir => &["band05", "B8A", "B5"],
            BandKind::Swir1 => &["band06", "B11", "B6"],
            BandKind::Swir2 => &["band07", "B12", "B7"],
        }
    }
}

impl fmt::Display for BandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Filename tokens identifying the quality band
pub const QA_TOKENS: &[&str] = &["PIXELQA", "BQA", "QA_PIXEL", "Fmask", "Grid:QA"];

fn file_tokens(name: &str) -> Vec<&str> {
    let stem = name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(name);
    stem.split(['_', '.']).collect()
}

/// `part` equals `token`, or is `token` behind the `SR` prefix of Landsat
/// ARD band names (`SRB2`)
fn part_matches(part: &str, token: &str) -> bool {
    if part.eq_ignore_ascii_case(token) {
        return true;
    }
    part.get(..2)
        .zip(part.get(2..))
        .is_some_and(|(prefix, rest)| prefix.eq_ignore_ascii_case("SR") && rest.eq_ignore_ascii_case(token))
}

/// Whether a file name carries one of `tokens` as a whole `_`/`.` token.
///
/// Multi-part tokens such as `QA_PIXEL` match consecutive parts.
pub fn matches_tokens(name: &str, tokens: &[&str]) -> bool {
    let parts = file_tokens(name);
    tokens.iter().any(|token| {
        if token.contains(':') {
            // HDF subdataset names, matched as a substring
            return name.contains(token);
        }
        let wanted: Vec<&str> = token.split('_').collect();
        parts.windows(wanted.len()).any(|window| {
            window
                .iter()
                .zip(&wanted)
                .all(|(part, token)| part_matches(part, token))
        })
    })
}

/// Resolved files for one scene
#[derive(Debug, Clone, PartialEq)]
pub struct SceneFiles {
    pub scene: String,
    bands: BTreeMap<BandKind, PathBuf>,
    pub qa: Option<PathBuf>,
    pub metadata: Option<PathBuf>,
}

impl SceneFiles {
    pub fn new(scene: impl Into<String>) -> Self {
        Self {
            scene: scene.into(),
            bands: BTreeMap::new(),
            qa: None,
            metadata: None,
        }
    }

    pub fn with_band(mut self, kind: BandKind, path: impl Into<PathBuf>) -> Self {
        self.bands.insert(kind, path.into());
        self
    }

    pub fn with_qa(mut self, path: impl Into<PathBuf>) -> Self {
        self.qa = Some(path.into());
        self
    }

    /// Path of a reflectance band, or a missing-band error naming the scene
    pub fn band(&self, kind: BandKind) -> Result<&Path> {
        self.bands
            .get(&kind)
            .map(PathBuf::as_path)
            .ok_or_else(|| Error::MissingBand {
                scene: self.scene.clone(),
                band: kind.name(),
            })
    }

    /// Sun geometry of the scene.
    ///
    /// Taken from the Landsat MTL file when one was found, otherwise from the
    /// GDAL metadata HLS writes into its QA and band rasters.
    pub fn solar_geometry(&self) -> Option<SolarGeometry> {
        let (path, read) = match &self.metadata {
            Some(mtl) => (mtl.as_path(), SolarGeometry::from_metadata_file(mtl)),
            None => {
                let raster = self
                    .qa
                    .as_deref()
                    .or_else(|| self.bands.values().next().map(PathBuf::as_path))?;
                (raster, SolarGeometry::from_raster_metadata(raster))
            }
        };
        match read {
            Ok(sun) => sun,
            Err(e) => {
                debug!("{}: cannot read sun angles from {}: {}", self.scene, path.display(), e);
                None
            }
        }
    }
}

/// Collaborator that knows where a scene's bands live
pub trait BandSource: Send + Sync {
    /// Identifiers of all scenes this source can resolve, sorted
    fn scenes(&self) -> Result<Vec<String>>;

    /// Resolve the files of one scene
    fn locate(&self, scene: &str) -> Result<SceneFiles>;
}

/// Scenes stored as one subdirectory per scene under a root directory
#[derive(Debug, Clone)]
pub struct DirectoryBandSource {
    root: PathBuf,
}

fn is_tiff(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("tif") || e.eq_ignore_ascii_case("tiff"))
}

impl DirectoryBandSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl BandSource for DirectoryBandSource {
    fn scenes(&self) -> Result<Vec<String>> {
        let mut scenes = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    scenes.push(name.to_string());
                }
            }
        }
        scenes.sort();
        Ok(scenes)
    }

    fn locate(&self, scene: &str) -> Result<SceneFiles> {
        let dir = self.root.join(scene);
        let mut files = SceneFiles::new(scene);

        let mut paths: Vec<PathBuf> = WalkDir::new(&dir)
            .max_depth(2)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .collect();
        paths.sort();

        for path in paths {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name.to_ascii_uppercase().ends_with("_MTL.TXT") {
                files.metadata = Some(path.clone());
                continue;
            }
            if !is_tiff(&path) {
                continue;
            }
            if files.qa.is_none() && matches_tokens(name, QA_TOKENS) {
                files.qa = Some(path.clone());
                continue;
            }
            if let Some(kind) = BandKind::ALL
                .iter()
                .find(|k| matches_tokens(name, k.tokens()))
            {
                files.bands.entry(*kind).or_insert(path);
            }
        }

        debug!(
            "{}: {} bands, qa={}, metadata={}",
            scene,
            files.bands.len(),
            files.qa.is_some(),
            files.metadata.is_some()
        );
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_matching_is_whole_token() {
        assert!(matches_tokens("LC08_L2SP_034032_20200415_SR_B1.TIF", &["B1"]));
        assert!(!matches_tokens("HLS.S30.T13SDA.2020123T173901.v2.0.B11.tif", &["B1"]));
        assert!(matches_tokens("HLS.S30.T13SDA.2020123T173901.v2.0.B11.tif", BandKind::Swir1.tokens()));
        assert!(matches_tokens("LC08_CU_003009_20200101_20200110_C01_V01_SRB3.tif", BandKind::Green.tokens()));
        assert!(!matches_tokens("LC08_CU_003009_20200101_20200110_C01_V01_SRB3.tif", BandKind::Blue.tokens()));
        assert!(!matches_tokens("LC08_CU_003009_20200101_20200110_C01_V01_SRB1.tif", &["B11"]));
        assert!(matches_tokens("LC08_L2SP_034032_20200415_QA_PIXEL.TIF", QA_TOKENS));
        assert!(!matches_tokens("LC08_L2SP_034032_20200415_QA_RADSAT.TIF", QA_TOKENS));
    }

    #[test]
    fn test_directory_source_ard_names() {
        let dir = tempfile::tempdir().unwrap();
        let scene = "LC08_CU_003009_20200101_20200110_C01_V01";
        let sdir = dir.path().join(scene);
        std::fs::create_dir_all(&sdir).unwrap();
        for suffix in ["SRB1", "SRB2", "SRB3", "SRB4", "SRB5", "SRB6", "SRB7", "PIXELQA"] {
            std::fs::write(sdir.join(format!("{scene}_{suffix}.tif")), b"").unwrap();
        }

        let files = DirectoryBandSource::new(dir.path()).locate(scene).unwrap();
        for (kind, suffix) in BandKind::ALL.into_iter().zip(["SRB2", "SRB3", "SRB4", "SRB5", "SRB6", "SRB7"]) {
            assert!(
                files.band(kind).unwrap().ends_with(format!("{scene}_{suffix}.tif")),
                "{kind}"
            );
        }
        assert!(files.qa.unwrap().ends_with(format!("{scene}_PIXELQA.tif")));
    }

    #[test]
    fn test_hls_sun_angles_from_fmask() {
        use tiff::encoder::{colortype, TiffEncoder};
        use tiff::tags::Tag;

        let dir = tempfile::tempdir().unwrap();
        let fmask = dir.path().join("HLS.S30.T13SDA.2020123T173901.v2.0.Fmask.tif");
        {
            let mut encoder = TiffEncoder::new(std::fs::File::create(&fmask).unwrap()).unwrap();
            let mut image = encoder.new_image::<colortype::Gray8>(1, 1).unwrap();
            let xml = "<GDALMetadata>\
                <Item name=\"MEAN_SUN_AZIMUTH_ANGLE\">150.5</Item>\
                <Item name=\"MEAN_SUN_ZENITH_ANGLE\">30.0</Item>\
                </GDALMetadata>";
            image.encoder().write_tag(Tag::from_u16_exhaustive(42112), xml).unwrap();
            image.write_data(&[0u8][..]).unwrap();
        }

        let files = SceneFiles::new("HLS.S30.T13SDA.2020123T173901.v2.0").with_qa(&fmask);
        let sun = files.solar_geometry().unwrap();
        assert_eq!(sun.azimuth, 150.5);
        assert_eq!(sun.altitude, 60.0);

        assert_eq!(SceneFiles::new("no_files").solar_geometry(), None);
    }

    #[test]
    fn test_directory_source() {
        let dir = tempfile::tempdir().unwrap();
        let scene = "LC08_L2SP_034032_20200415_20200822_02_T1";
        let sdir = dir.path().join(scene);
        std::fs::create_dir_all(&sdir).unwrap();
        for suffix in ["SR_B1", "SR_B2", "SR_B3", "SR_B4", "SR_B5", "SR_B6", "SR_B7", "QA_PIXEL"] {
            std::fs::write(sdir.join(format!("{scene}_{suffix}.TIF")), b"").unwrap();
        }
        std::fs::write(sdir.join(format!("{scene}_MTL.txt")), "SUN_AZIMUTH = 140.0\nSUN_ELEVATION = 55.0\n").unwrap();
        std::fs::create_dir_all(dir.path().join("AAA_empty")).unwrap();

        let source = DirectoryBandSource::new(dir.path());
        assert_eq!(source.scenes().unwrap(), vec!["AAA_empty".to_string(), scene.to_string()]);

        let files = source.locate(scene).unwrap();
        for kind in BandKind::ALL {
            assert!(files.band(kind).is_ok(), "missing {kind}");
        }
        assert!(files.band(BandKind::Nir).unwrap().ends_with(format!("{scene}_SR_B5.TIF")));
        assert!(files.qa.is_some());
        assert_eq!(files.solar_geometry().map(|s| s.altitude), Some(55.0));

        let empty = source.locate("AAA_empty").unwrap();
        assert!(matches!(
            empty.band(BandKind::Blue),
            Err(Error::MissingBand { band: "blue", .. })
        ));
    }
}
