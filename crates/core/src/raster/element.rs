//! Cell value types

use num_traits::{NumCast, Zero};
use std::fmt::Debug;

/// Sample layout a raster of the element type is encoded with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleKind {
    U8,
    U16,
    U32,
    I16,
    I32,
    F32,
    F64,
}

/// A value that can live in a [`Raster`](crate::Raster) cell.
///
/// Classified and proportion layers are `u8`, QA bitmasks and DIAG codes
/// `u16`, reflectance is read as `f64`.
pub trait RasterElement:
    Copy + Debug + PartialOrd + NumCast + Zero + Send + Sync + 'static
{
    const SAMPLE: SampleKind;

    /// Stand-in for decoded values that do not fit the type when the file
    /// declares no fill value
    fn sentinel() -> Self;

    /// Whether `self` is the fill value; NaN always counts as fill
    fn is_nodata(&self, nodata: Option<Self>) -> bool;

    fn as_f64(self) -> Option<f64> {
        NumCast::from(self)
    }
}

macro_rules! integer_element {
    ($($t:ty => $kind:ident),* $(,)?) => {$(
        impl RasterElement for $t {
            const SAMPLE: SampleKind = SampleKind::$kind;

            fn sentinel() -> Self {
                <$t>::MAX
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                nodata == Some(*self)
            }
        }
    )*};
}

macro_rules! float_element {
    ($($t:ty => $kind:ident),* $(,)?) => {$(
        impl RasterElement for $t {
            const SAMPLE: SampleKind = SampleKind::$kind;

            fn sentinel() -> Self {
                <$t>::NAN
            }

            // fill values are written and read back exactly
            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                self.is_nan() || nodata == Some(*self)
            }
        }
    )*};
}

integer_element!(u8 => U8, u16 => U16, u32 => U32, i16 => I16, i32 => I32);
float_element!(f32 => F32, f64 => F64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_fill() {
        assert!(255u8.is_nodata(Some(255)));
        assert!(!254u8.is_nodata(Some(255)));
        assert!(!255u8.is_nodata(None));
        assert_eq!(<u16 as RasterElement>::sentinel(), u16::MAX);
    }

    #[test]
    fn test_nan_is_always_fill() {
        assert!(f64::NAN.is_nodata(None));
        assert!((-9999.0f64).is_nodata(Some(-9999.0)));
        assert!(!0.5f32.is_nodata(Some(-9999.0)));
    }
}
