//! Classifier: test outcomes to interpreted DSWE classes (INTR)

use super::diagnostics::{lane_tests, Diagnostics, NUM_TESTS};
use dswe_core::{Raster, Result};
use ndarray::{Array2, Axis, Zip};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Interpreted DSWE class codes as written to 8-bit rasters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum DsweClass {
    NotWater = 0,
    HighConfidence = 1,
    ModerateConfidence = 2,
    PotentialWetland = 3,
    LowConfidence = 4,
    /// Excluded by cloud or snow in the QA band
    Cloud = 9,
    Fill = 255,
}

impl DsweClass {
    pub const fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => DsweClass::NotWater,
            1 => DsweClass::HighConfidence,
            2 => DsweClass::ModerateConfidence,
            3 => DsweClass::PotentialWetland,
            4 => DsweClass::LowConfidence,
            9 => DsweClass::Cloud,
            255 => DsweClass::Fill,
            _ => return None,
        })
    }

    pub fn label(self) -> &'static str {
        match self {
            DsweClass::NotWater => "not water",
            DsweClass::HighConfidence => "water, high confidence",
            DsweClass::ModerateConfidence => "water, moderate confidence",
            DsweClass::PotentialWetland => "potential wetland",
            DsweClass::LowConfidence => "low confidence water or wetland",
            DsweClass::Cloud => "cloud, shadow or snow",
            DsweClass::Fill => "fill",
        }
    }
}

impl fmt::Display for DsweClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code(), self.label())
    }
}

/// Fill value of every classified layer
pub const CLASS_FILL: u8 = DsweClass::Fill.code();

/// Reduce one pixel's five outcomes to a class.
///
/// | passed | condition | class |
/// |---|---|---|
/// | 0 | | not water |
/// | 1 | only test 1 | low confidence |
/// | 1 | one of tests 2-5 | not water |
/// | 2 | tests 1 and 2 | potential wetland |
/// | 2 | any other pair | low confidence |
/// | 3 | | moderate confidence |
/// | 4, 5 | | high confidence |
pub fn interpret_tests(tests: [bool; NUM_TESTS]) -> DsweClass {
    let passed = tests.iter().filter(|&&t| t).count();
    let first_two = tests[..2].iter().filter(|&&t| t).count();

    match passed {
        0 => DsweClass::NotWater,
        1 if tests[0] => DsweClass::LowConfidence,
        1 => DsweClass::NotWater,
        2 if first_two == 2 => DsweClass::PotentialWetland,
        2 => DsweClass::LowConfidence,
        3 => DsweClass::ModerateConfidence,
        _ => DsweClass::HighConfidence,
    }
}

/// Classify every pixel; fill pixels are overwritten with 255 last.
///
/// `grid` supplies the geotransform and projection of the output.
pub fn classify(diag: &Diagnostics, grid: &Raster<f64>) -> Result<Raster<u8>> {
    let mut intr = Array2::zeros(diag.shape());

    Zip::from(&mut intr)
        .and(diag.tests().lanes(Axis(2)))
        .for_each(|out, lane| *out = interpret_tests(lane_tests(lane)).code());

    Zip::from(&mut intr)
        .and(diag.fill_mask())
        .for_each(|out, &is_fill| {
            if is_fill {
                *out = CLASS_FILL;
            }
        });

    grid.with_data(intr, Some(CLASS_FILL))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn combination(bits: u8) -> [bool; NUM_TESTS] {
        let mut tests = [false; NUM_TESTS];
        for (i, t) in tests.iter_mut().enumerate() {
            *t = bits & (1 << i) != 0;
        }
        tests
    }

    #[test]
    fn test_all_combinations_classified() {
        let mut seen = std::collections::BTreeMap::new();
        for bits in 0..32u8 {
            let tests = combination(bits);
            let class = interpret_tests(tests);
            assert!(class.code() <= 4, "{tests:?} -> {class}");
            *seen.entry(class).or_insert(0) += 1;
        }
        // 1 (none) + 4 (single of 2-5)
        assert_eq!(seen[&DsweClass::NotWater], 5);
        // 5 choose 4 + 5 choose 5
        assert_eq!(seen[&DsweClass::HighConfidence], 6);
        assert_eq!(seen[&DsweClass::ModerateConfidence], 10);
        assert_eq!(seen[&DsweClass::PotentialWetland], 1);
        // 9 other pairs + test 1 alone
        assert_eq!(seen[&DsweClass::LowConfidence], 10);
    }

    #[test]
    fn test_precedence_examples() {
        assert_eq!(interpret_tests([true, false, false, false, false]), DsweClass::LowConfidence);
        assert_eq!(interpret_tests([false, true, false, false, false]), DsweClass::NotWater);
        assert_eq!(interpret_tests([true, true, false, false, false]), DsweClass::PotentialWetland);
        assert_eq!(interpret_tests([true, false, true, false, false]), DsweClass::LowConfidence);
        assert_eq!(interpret_tests([false, false, true, true, true]), DsweClass::ModerateConfidence);
        assert_eq!(interpret_tests([true, true, true, true, false]), DsweClass::HighConfidence);
    }

    #[test]
    fn test_fill_overrides_tests() {
        let tests = Array3::from_elem((1, 2, NUM_TESTS), true);
        let fill = ndarray::array![[false, true]];
        let diag = Diagnostics::from_parts(tests, fill).unwrap();
        let grid: Raster<f64> = Raster::new(1, 2);

        let intr = classify(&diag, &grid).unwrap();
        assert_eq!(intr.data(), &ndarray::array![[1u8, 255]]);
        assert_eq!(intr.nodata(), Some(255));
    }

    #[test]
    fn test_class_codes() {
        for code in [0u8, 1, 2, 3, 4, 9, 255] {
            assert_eq!(DsweClass::from_code(code).map(DsweClass::code), Some(code));
        }
        assert_eq!(DsweClass::from_code(5), None);
    }
}
