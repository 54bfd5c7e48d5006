//! Spatial merge of per-group bucket results

use super::accumulate::{ProportionRaster, PROPORTION_FILL};
use dswe_core::raster::{regrid_nearest, Extent, Raster, RasterElement};
use dswe_core::{Error, Result};
use ndarray::Zip;

/// Merge rasters over the union of their extents.
///
/// Layers are applied in order; a later layer overwrites earlier values
/// only where it is not `fill`. The cell size of the first layer is used.
pub fn mosaic<T: RasterElement>(layers: &[Raster<T>], fill: T) -> Result<Raster<T>> {
    let first = layers
        .first()
        .ok_or_else(|| Error::Algorithm("mosaic of zero layers".into()))?;

    for layer in &layers[1..] {
        if let (Some(a), Some(b)) = (first.projection(), layer.projection()) {
            if !a.is_equivalent(b) {
                return Err(Error::ProjectionMismatch(a.to_string(), b.to_string()));
            }
        }
    }

    let extent = Extent::union_all(layers.iter().map(Raster::extent))
        .ok_or_else(|| Error::Algorithm("mosaic of zero layers".into()))?;
    let t = first.transform();
    let grid = extent.grid(t.pixel_width, t.pixel_height)?;

    let mut out = regrid_nearest(first, &grid, fill);
    for layer in &layers[1..] {
        let placed = regrid_nearest(layer, &grid, fill);
        Zip::from(out.data_mut())
            .and(placed.data())
            .for_each(|dst, &src| {
                if src != fill {
                    *dst = src;
                }
            });
    }
    Ok(out)
}

/// Mosaic proportion rasters of one bucket and category
pub fn mosaic_proportions(layers: &[ProportionRaster]) -> Result<ProportionRaster> {
    let mismatch = || Error::Algorithm("cannot mosaic percent and fraction layers together".into());
    match layers.first() {
        Some(ProportionRaster::Percent(_)) => {
            let rasters = layers
                .iter()
                .map(|l| match l {
                    ProportionRaster::Percent(r) => Ok(r.clone()),
                    ProportionRaster::Fraction(_) => Err(mismatch()),
                })
                .collect::<Result<Vec<_>>>()?;
            mosaic(&rasters, PROPORTION_FILL).map(ProportionRaster::Percent)
        }
        Some(ProportionRaster::Fraction(_)) => {
            let rasters = layers
                .iter()
                .map(|l| match l {
                    ProportionRaster::Fraction(r) => Ok(r.clone()),
                    ProportionRaster::Percent(_) => Err(mismatch()),
                })
                .collect::<Result<Vec<_>>>()?;
            mosaic(&rasters, f32::from(PROPORTION_FILL)).map(ProportionRaster::Fraction)
        }
        None => Err(Error::Algorithm("mosaic of zero layers".into())),
    }
}
