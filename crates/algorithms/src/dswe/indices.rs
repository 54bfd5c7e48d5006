//! Band Index Engine
//!
//! The five spectral indices DSWE tests against. Every index is set to the
//! scene fill value wherever a contributing band is fill. A ratio with a zero
//! denominator is NaN, which fails every strict comparison in the diagnostic
//! tests; the indices themselves are never written out.

use crate::rows::concat_rows;
use crate::scene::BandSet;
use dswe_core::{Error, Result};
use ndarray::Array2;

/// Derived indices, same shape as the Band Set
#[derive(Debug, Clone)]
pub struct SpectralIndices {
    /// Modified normalized difference wetness index: `(green - swir1) / (green + swir1)`
    pub mndwi: Array2<f64>,
    /// Multi-band spectral relationship visible: `green + red`
    pub mbsrv: Array2<f64>,
    /// Multi-band spectral relationship near-infrared: `nir + swir1`
    pub mbsrn: Array2<f64>,
    /// Automated water extent shadow: `blue + 2.5 green - 1.5 mbsrn - 0.25 swir2`
    pub awesh: Array2<f64>,
    /// Normalized difference vegetation index: `(nir - red) / (nir + red)`
    pub ndvi: Array2<f64>,
    pub fill: f64,
}

/// Compute all five indices for a Band Set
pub fn compute_indices(set: &BandSet) -> Result<SpectralIndices> {
    let b = set.bands();
    let fill = set.fill();
    let (blue, green, red, nir, swir1, swir2) = (
        b.blue.data(),
        b.green.data(),
        b.red.data(),
        b.nir.data(),
        b.swir1.data(),
        b.swir2.data(),
    );

    let mndwi = per_pixel([green, swir1], fill, |[g, s1]| ratio(g - s1, g + s1))?;
    let mbsrv = per_pixel([green, red], fill, |[g, r]| g + r)?;
    let mbsrn = per_pixel([nir, swir1], fill, |[n, s1]| n + s1)?;
    let awesh = per_pixel([blue, green, nir, swir1, swir2], fill, |[bl, g, n, s1, s2]| {
        bl + 2.5 * g - 1.5 * (n + s1) - 0.25 * s2
    })?;
    let ndvi = per_pixel([nir, red], fill, |[n, r]| ratio(n - r, n + r))?;

    Ok(SpectralIndices {
        mndwi,
        mbsrv,
        mbsrn,
        awesh,
        ndvi,
        fill,
    })
}

/// NaN unless the quotient is finite
fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        return f64::NAN;
    }
    let v = numerator / denominator;
    if v.is_finite() {
        v
    } else {
        f64::NAN
    }
}

/// Evaluate `f` at every pixel of `inputs`, row-parallel.
///
/// The output is `fill` where any input equals `fill` or is NaN.
fn per_pixel<const N: usize, F>(inputs: [&Array2<f64>; N], fill: f64, f: F) -> Result<Array2<f64>>
where
    F: Fn([f64; N]) -> f64 + Sync + Send,
{
    let (rows, cols) = inputs[0].dim();
    if let Some(other) = inputs.iter().find(|a| a.dim() != (rows, cols)) {
        let (ar, ac) = other.dim();
        return Err(Error::SizeMismatch {
            er: rows,
            ec: cols,
            ar,
            ac,
        });
    }

    let data: Vec<f64> = concat_rows(rows, |row| {
        let mut row_data = vec![fill; cols];
        for (col, out) in row_data.iter_mut().enumerate() {
            let values = inputs.map(|a| a[(row, col)]);
            if values.iter().any(|&v| v == fill || v.is_nan()) {
                continue;
            }
            *out = f(values);
        }
        row_data
    });

    Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::SpectralBands;
    use approx::assert_relative_eq;
    use dswe_core::Raster;

    const FILL: f64 = -9999.0;

    fn band(values: [f64; 2]) -> Raster<f64> {
        let mut r = Raster::from_vec(values.to_vec(), 1, 2).unwrap();
        r.set_nodata(Some(FILL));
        r
    }

    fn set(blue: [f64; 2], green: [f64; 2], red: [f64; 2], nir: [f64; 2], swir1: [f64; 2], swir2: [f64; 2]) -> BandSet {
        BandSet::new(
            SpectralBands {
                blue: band(blue),
                green: band(green),
                red: band(red),
                nir: band(nir),
                swir1: band(swir1),
                swir2: band(swir2),
            },
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_index_formulas() {
        let s = set([100.0; 2], [300.0; 2], [200.0; 2], [400.0; 2], [100.0; 2], [50.0; 2]);
        let idx = compute_indices(&s).unwrap();
        assert_relative_eq!(idx.mndwi[(0, 0)], 0.5);
        assert_relative_eq!(idx.mbsrv[(0, 0)], 500.0);
        assert_relative_eq!(idx.mbsrn[(0, 0)], 500.0);
        // 100 + 750 - 750 - 12.5
        assert_relative_eq!(idx.awesh[(0, 0)], 87.5);
        assert_relative_eq!(idx.ndvi[(0, 0)], 200.0 / 600.0);
    }

    #[test]
    fn test_fill_propagates_per_contributing_band() {
        // red is fill at col 1: mbsrv and ndvi become fill, mndwi does not
        let s = set([100.0; 2], [300.0; 2], [200.0, FILL], [400.0; 2], [100.0; 2], [50.0; 2]);
        let idx = compute_indices(&s).unwrap();
        assert_eq!(idx.mbsrv[(0, 1)], FILL);
        assert_eq!(idx.ndvi[(0, 1)], FILL);
        assert_relative_eq!(idx.mndwi[(0, 1)], 0.5);
        assert_relative_eq!(idx.awesh[(0, 1)], 87.5);
    }

    #[test]
    fn test_zero_denominator_is_nan() {
        let s = set([0.0; 2], [0.0, 10.0], [0.0; 2], [0.0, 10.0], [0.0, 5.0], [0.0; 2]);
        let idx = compute_indices(&s).unwrap();
        assert!(idx.mndwi[(0, 0)].is_nan());
        assert!(idx.ndvi[(0, 0)].is_nan());
        assert!(idx.mndwi.iter().chain(idx.ndvi.iter()).all(|v| !v.is_infinite()));
        assert_relative_eq!(idx.ndvi[(0, 1)], 1.0);
        // sums stay defined
        assert_eq!(idx.mbsrv[(0, 0)], 0.0);
    }
}
