//! Terrain/Cloud Mask Refiner
//!
//! Downgrades interpreted pixels on steep or shadowed terrain to not-water
//! and pixels flagged in the QA band to class 9. A companion MASK layer
//! records why each pixel was excluded.

use super::interpret::{DsweClass, CLASS_FILL};
use crate::config::Thresholds;
use crate::terrain::Terrain;
use dswe_core::{Raster, Result};
use ndarray::{Array2, Zip};

/// Reason codes in the MASK layer
pub mod reason {
    /// Not masked (also cloud shadow)
    pub const NONE: u8 = 0;
    pub const SNOW: u8 = 1;
    pub const CLOUD: u8 = 2;
    pub const SLOPE: u8 = 3;
    pub const HILLSHADE: u8 = 4;
}

/// QA bit positions (0 = least significant)
pub const QA_CLOUD_BIT: u16 = 1;
pub const QA_SHADOW_BIT: u16 = 3;
pub const QA_SNOW_BIT: u16 = 4;

/// Masked interpretation (INWM) and its MASK layer
#[derive(Debug, Clone)]
pub struct MaskedLayers {
    pub inwm: Raster<u8>,
    pub mask: Raster<u8>,
}

fn slope_limit(class: u8, t: &Thresholds) -> Option<f64> {
    match DsweClass::from_code(class)? {
        DsweClass::HighConfidence => Some(t.percent_slope_high),
        DsweClass::ModerateConfidence => Some(t.percent_slope_moderate),
        DsweClass::PotentialWetland => Some(t.percent_slope_wetland),
        DsweClass::LowConfidence => Some(t.percent_slope_low),
        _ => None,
    }
}

/// Slope and hillshade rules, in place.
///
/// A pixel is excluded by slope only when the threshold of its own class is
/// reached. Shadowed pixels (hillshade at or below the threshold) are set to
/// not-water whatever their class. NaN terrain never triggers a rule.
pub fn apply_terrain_rules(
    class: &mut Array2<u8>,
    mask: &mut Array2<u8>,
    slope: &Array2<f64>,
    shade: &Array2<f64>,
    t: &Thresholds,
) {
    Zip::from(class)
        .and(mask)
        .and(slope)
        .and(shade)
        .for_each(|c, m, &s, &h| {
            if *c == CLASS_FILL {
                return;
            }
            if slope_limit(*c, t).is_some_and(|limit| s >= limit) {
                *c = DsweClass::NotWater.code();
                *m = reason::SLOPE;
            }
            if h <= t.hillshade {
                *c = DsweClass::NotWater.code();
                *m = reason::HILLSHADE;
            }
        });
}

/// QA bitmask rules, in place.
///
/// Cloud and snow set class 9; cloud shadow only resets the mask reason.
/// When several bits are set the mask reason follows shadow < snow < cloud.
pub fn apply_qa_rules(class: &mut Array2<u8>, mask: &mut Array2<u8>, qa: &Array2<u16>) {
    Zip::from(class).and(mask).and(qa).for_each(|c, m, &bits| {
        if *c == CLASS_FILL {
            return;
        }
        let set = |bit: u16| bits & (1 << bit) != 0;
        if set(QA_SHADOW_BIT) {
            *m = reason::NONE;
        }
        if set(QA_SNOW_BIT) {
            *c = DsweClass::Cloud.code();
            *m = reason::SNOW;
        }
        if set(QA_CLOUD_BIT) {
            *c = DsweClass::Cloud.code();
            *m = reason::CLOUD;
        }
    });
}

/// Apply terrain then QA rules to an interpreted layer.
///
/// Fill pixels stay 255 in both outputs.
pub fn refine(intr: &Raster<u8>, terrain: &Terrain, qa: &Raster<u16>, t: &Thresholds) -> Result<MaskedLayers> {
    intr.check_same_grid(&terrain.slope, "slope")?;
    intr.check_same_grid(&terrain.shade, "hillshade")?;
    intr.check_same_grid(qa, "qa")?;

    let mut class = intr.data().clone();
    let mut mask = class.mapv(|c| if c == CLASS_FILL { CLASS_FILL } else { reason::NONE });

    apply_terrain_rules(&mut class, &mut mask, terrain.slope.data(), terrain.shade.data(), t);
    apply_qa_rules(&mut class, &mut mask, qa.data());

    Ok(MaskedLayers {
        inwm: intr.with_data(class, Some(CLASS_FILL))?,
        mask: intr.with_data(mask, Some(CLASS_FILL))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn flat(rows: usize, cols: usize) -> (Array2<f64>, Array2<f64>) {
        (Array2::zeros((rows, cols)), Array2::from_elem((rows, cols), 200.0))
    }

    #[test]
    fn test_slope_uses_own_class_threshold() {
        let t = Thresholds::default();
        // slope 25: below HIGH/MODERATE (30), above WETLAND (20) and LOW (10)
        let mut class = array![[1u8, 2, 3, 4, 0]];
        let mut mask = Array2::zeros((1, 5));
        let slope = Array2::from_elem((1, 5), 25.0);
        let (_, shade) = flat(1, 5);

        apply_terrain_rules(&mut class, &mut mask, &slope, &shade, &t);
        assert_eq!(class, array![[1u8, 2, 0, 0, 0]]);
        assert_eq!(mask, array![[0u8, 0, 3, 3, 0]]);
    }

    #[test]
    fn test_shade_overrides_slope_mark() {
        let t = Thresholds::default();
        let mut class = array![[1u8, 0]];
        let mut mask = Array2::zeros((1, 2));
        let slope = array![[45.0, f64::NAN]];
        let shade = array![[110.0, 50.0]];

        apply_terrain_rules(&mut class, &mut mask, &slope, &shade, &t);
        assert_eq!(class, array![[0u8, 0]]);
        assert_eq!(mask, array![[4u8, 4]]);
    }

    #[test]
    fn test_nan_terrain_is_ignored() {
        let t = Thresholds::default();
        let mut class = array![[1u8]];
        let mut mask = array![[0u8]];
        apply_terrain_rules(&mut class, &mut mask, &array![[f64::NAN]], &array![[f64::NAN]], &t);
        assert_eq!(class[(0, 0)], 1);
    }

    #[test]
    fn test_qa_bits() {
        let mut class = array![[1u8, 1, 1, 1, 255]];
        let mut mask = array![[3u8, 3, 3, 3, 255]];
        let qa = array![[1u16 << 1, 1 << 3, 1 << 4, (1 << 1) | (1 << 4), 1 << 1]];

        apply_qa_rules(&mut class, &mut mask, &qa);
        assert_eq!(class, array![[9u8, 1, 9, 9, 255]]);
        assert_eq!(mask, array![[2u8, 0, 1, 2, 255]]);
    }

    #[test]
    fn test_rule_families_commute_on_disjoint_pixels() {
        let t = Thresholds::default();
        let start = array![[1u8, 2, 3, 4], [1, 2, 0, 255]];
        let slope = array![[40.0, 0.0, 0.0, 0.0], [0.0, 0.0, 0.0, 0.0]];
        let shade = array![[200.0, 90.0, 200.0, 200.0], [200.0, 200.0, 200.0, 200.0]];
        let qa = array![[0u16, 0, 1 << 1, 1 << 4], [1 << 3, 0, 1 << 1, 0]];

        let run = |terrain_first: bool| {
            let mut class = start.clone();
            let mut mask = start.mapv(|c| if c == 255 { 255 } else { 0 });
            if terrain_first {
                apply_terrain_rules(&mut class, &mut mask, &slope, &shade, &t);
                apply_qa_rules(&mut class, &mut mask, &qa);
            } else {
                apply_qa_rules(&mut class, &mut mask, &qa);
                apply_terrain_rules(&mut class, &mut mask, &slope, &shade, &t);
            }
            (class, mask)
        };

        let (class, mask) = run(true);
        assert_eq!((class.clone(), mask.clone()), run(false));
        assert_eq!(class, array![[0u8, 0, 9, 9], [1, 2, 9, 255]]);
        assert_eq!(mask, array![[3u8, 4, 2, 1], [0, 0, 2, 255]]);
    }

    #[test]
    fn test_refine_keeps_fill() {
        let t = Thresholds::default();
        let intr = Raster::from_array(array![[1u8, 255]]);
        let terrain = Terrain {
            slope: Raster::from_array(array![[50.0, 50.0]]),
            shade: Raster::from_array(array![[10.0, 10.0]]),
        };
        let qa = Raster::from_array(array![[0u16, 1 << 1]]);

        let out = refine(&intr, &terrain, &qa, &t).unwrap();
        assert_eq!(out.inwm.data(), &array![[0u8, 255]]);
        assert_eq!(out.mask.data(), &array![[4u8, 255]]);
        assert_eq!(out.inwm.nodata(), Some(255));
    }
}
