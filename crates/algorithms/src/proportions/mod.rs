//! Temporal Aggregator
//!
//! Groups classified rasters into time buckets, expands each bucket to the
//! union of its members' extents, counts open, partial and non-water
//! observations per pixel, and writes one proportion raster per category.

mod accumulate;
mod discover;
mod mosaic;
mod output;
mod period;

pub use accumulate::{
    percent, Occurrence, OccurrenceAccumulator, ProportionRaster, ProportionScale, PROPORTION_FILL,
};
pub use discover::{discover_scenes, DsweLayer, SceneRecord};
pub use mosaic::{mosaic, mosaic_proportions};
pub use output::{unique_path, write_proportion};
pub use period::{Bucket, Season, TimePeriod};

use crate::dswe::CLASS_FILL;
use chrono::Datelike;
use dswe_core::raster::{regrid_nearest, Extent, TRANSFORM_TOLERANCE};
use dswe_core::{Error, RasterHeader, RasterIo, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Options for a proportions run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregateOptions {
    pub period: TimePeriod,
    pub scale: ProportionScale,
    /// Also write per-category and valid observation counts
    pub write_counts: bool,
    /// Group by top-left corner, process groups separately, merge per bucket
    pub mosaic: bool,
}

impl AggregateOptions {
    pub fn new(period: TimePeriod) -> Self {
        Self {
            period,
            scale: ProportionScale::default(),
            write_counts: false,
            mosaic: false,
        }
    }
}

/// Outputs of one bucket
#[derive(Debug, Clone, Serialize)]
pub struct BucketOutput {
    pub label: String,
    /// Members that were accumulated
    pub members: usize,
    pub outputs: Vec<PathBuf>,
}

/// A bucket member left out of its bucket
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedMember {
    pub path: PathBuf,
    pub reason: String,
}

/// Result of a proportions run
#[derive(Debug, Clone, Default, Serialize)]
pub struct AggregateReport {
    pub output_dir: PathBuf,
    pub buckets: Vec<BucketOutput>,
    pub skipped: Vec<SkippedMember>,
}

/// Counts of one bucket, plus the members that could not be used
#[derive(Debug, Clone)]
pub struct BucketAccumulation {
    /// `None` when no member could be read
    pub counts: Option<OccurrenceAccumulator>,
    pub skipped: Vec<SkippedMember>,
}

/// Group records into buckets, in chronological bucket order
pub fn group_by_bucket<'a>(records: &'a [SceneRecord], period: &TimePeriod) -> BTreeMap<Bucket, Vec<&'a SceneRecord>> {
    let earliest = records.iter().map(|r| r.date.year()).min().unwrap_or(0);
    let mut buckets: BTreeMap<Bucket, Vec<&SceneRecord>> = BTreeMap::new();
    for record in records {
        buckets
            .entry(period.bucket(record.date, earliest))
            .or_default()
            .push(record);
    }
    buckets
}

/// Accumulate the members of one bucket over their union extent.
///
/// The first north-up member fixes the projection and cell size. Members that
/// disagree with it, are rotated, or cannot be decoded are logged and left
/// out; the rest of the bucket is still accumulated.
pub fn accumulate_bucket<IO: RasterIo>(io: &IO, members: &[&SceneRecord]) -> Result<BucketAccumulation> {
    let mut skipped = Vec::new();
    let mut skip = |member: &SceneRecord, e: Error| {
        warn!("Skipping {}: {}", member.path.display(), e);
        skipped.push(SkippedMember {
            path: member.path.clone(),
            reason: e.to_string(),
        });
    };

    let mut usable: Vec<&SceneRecord> = Vec::with_capacity(members.len());
    for &member in members {
        let checked = member
            .header
            .transform
            .require_north_up(&member.path.display().to_string())
            .and_then(|()| match usable.first() {
                Some(reference) => check_compatible(&reference.header, member),
                None => Ok(()),
            });
        match checked {
            Ok(()) => usable.push(member),
            Err(e) => skip(member, e),
        }
    }

    let Some(reference) = usable.first().map(|m| &m.header) else {
        return Ok(BucketAccumulation { counts: None, skipped });
    };
    let extent = Extent::union_all(usable.iter().map(|m| m.header.extent()))
        .ok_or_else(|| Error::Algorithm("bucket without members".into()))?;
    let grid = extent.grid(reference.transform.pixel_width, reference.transform.pixel_height)?;
    let mut acc = OccurrenceAccumulator::new(grid, reference.projection.clone());

    for member in usable {
        debug!("Accumulating {}", member.path.display());
        let added = io.read::<u8>(&member.path).and_then(|layer| {
            let on_grid = layer.shape() == (grid.rows, grid.cols)
                && layer.transform().approx_eq(&grid.transform, TRANSFORM_TOLERANCE);
            if on_grid {
                acc.add(&layer)
            } else {
                acc.add(&regrid_nearest(&layer, &grid, CLASS_FILL))
            }
        });
        if let Err(e) = added {
            skip(member, e);
        }
    }

    let counts = (acc.members() > 0).then_some(acc);
    Ok(BucketAccumulation { counts, skipped })
}

/// Projection and cell size of `member` must match the bucket reference
fn check_compatible(reference: &RasterHeader, member: &SceneRecord) -> Result<()> {
    let mismatch = match (reference.projection.as_ref(), member.header.projection.as_ref()) {
        (Some(a), Some(b)) if !a.is_equivalent(b) => Some((a.to_string(), b.to_string())),
        (Some(a), None) => Some((a.to_string(), "<none>".into())),
        (None, Some(b)) => Some(("<none>".into(), b.to_string())),
        _ => None,
    };
    if let Some((expected, actual)) = mismatch {
        return Err(Error::ProjectionMismatch(expected, actual));
    }
    let (t, r) = (&member.header.transform, &reference.transform);
    if (t.pixel_width - r.pixel_width).abs() > TRANSFORM_TOLERANCE
        || (t.pixel_height - r.pixel_height).abs() > TRANSFORM_TOLERANCE
    {
        return Err(Error::InvalidParameter {
            name: "pixel_size",
            value: format!("({}, {})", t.pixel_width, t.pixel_height),
            reason: format!("differs from the bucket cell size ({}, {})", r.pixel_width, r.pixel_height),
        });
    }
    Ok(())
}

fn proportion_stem(label: &str, category: Occurrence) -> String {
    format!("{label}_{}_proportion", category.file_tag())
}

fn write_bucket<IO: RasterIo>(
    io: &IO,
    dir: &Path,
    label: &str,
    acc: &OccurrenceAccumulator,
    options: &AggregateOptions,
) -> Result<Vec<PathBuf>> {
    let mut outputs = Vec::new();
    for category in Occurrence::ALL {
        let raster = acc.proportion(category, options.scale);
        outputs.push(write_proportion(io, dir, &proportion_stem(label, category), &raster)?);
    }
    if options.write_counts {
        for category in Occurrence::ALL {
            let path = unique_path(io, dir, &format!("{label}_{}_count", category.file_tag()));
            io.write(&acc.count_raster(category), &path)?;
            outputs.push(path);
        }
        let path = unique_path(io, dir, &format!("{label}_valid_count"));
        io.write(&acc.valid_raster(), &path)?;
        outputs.push(path);
    }
    Ok(outputs)
}

/// Aggregate `records` into proportion rasters under
/// `<main_dir>/proportions_<period>`.
///
/// Buckets without members produce nothing. `on_bucket` is called with each
/// finished bucket label.
pub fn aggregate<IO, F>(
    io: &IO,
    records: &[SceneRecord],
    main_dir: &Path,
    options: &AggregateOptions,
    on_bucket: F,
) -> Result<AggregateReport>
where
    IO: RasterIo,
    F: Fn(&str),
{
    let dir = main_dir.join(options.period.dir_name());
    let mut report = AggregateReport {
        output_dir: dir.clone(),
        ..Default::default()
    };
    if records.is_empty() {
        info!("No scenes to aggregate");
        return Ok(report);
    }

    if options.mosaic {
        if options.write_counts {
            warn!("Count rasters are not written in mosaic mode");
        }
        aggregate_mosaic(io, records, &dir, options, &on_bucket, &mut report)?;
        return Ok(report);
    }

    for (bucket, members) in group_by_bucket(records, &options.period) {
        let label = bucket.label();
        info!("Calculating proportions for {} ({} scenes)", label, members.len());
        let BucketAccumulation { counts, skipped } = accumulate_bucket(io, &members)?;
        report.skipped.extend(skipped);
        let Some(acc) = counts else {
            warn!("No readable scenes for {}, nothing written", label);
            continue;
        };
        let outputs = write_bucket(io, &dir, &label, &acc, options)?;
        info!("Proportions completed for {}", label);
        on_bucket(&label);
        report.buckets.push(BucketOutput {
            label,
            members: acc.members(),
            outputs,
        });
    }
    Ok(report)
}

/// Key for rasters sharing a top-left corner
fn corner_key(record: &SceneRecord) -> (u64, u64) {
    let (x, y) = record.origin();
    (x.to_bits(), y.to_bits())
}

fn aggregate_mosaic<IO, F>(
    io: &IO,
    records: &[SceneRecord],
    dir: &Path,
    options: &AggregateOptions,
    on_bucket: &F,
    report: &mut AggregateReport,
) -> Result<()>
where
    IO: RasterIo,
    F: Fn(&str),
{
    // groups in order of first appearance of their corner
    let mut order: Vec<(u64, u64)> = Vec::new();
    let mut groups: BTreeMap<(u64, u64), Vec<SceneRecord>> = BTreeMap::new();
    for record in records {
        let key = corner_key(record);
        if !groups.contains_key(&key) {
            order.push(key);
        }
        groups.entry(key).or_default().push(record.clone());
    }
    info!("Mosaicking {} spatial groups", order.len());

    // multiyear windows stay aligned across groups
    let earliest = records.iter().map(|r| r.date.year()).min().unwrap_or(0);
    let period = match options.period {
        TimePeriod::Multiyear { years, align } => TimePeriod::Multiyear {
            years,
            align: Some(align.unwrap_or(earliest)),
        },
        other => other,
    };

    let mut per_bucket: BTreeMap<Bucket, (usize, [Vec<ProportionRaster>; 3])> = BTreeMap::new();
    for key in &order {
        let group = groups.get(key).map(Vec::as_slice).unwrap_or_default();
        for (bucket, members) in group_by_bucket(group, &period) {
            let BucketAccumulation { counts, skipped } = accumulate_bucket(io, &members)?;
            report.skipped.extend(skipped);
            let Some(acc) = counts else {
                continue;
            };
            let entry = per_bucket.entry(bucket).or_default();
            entry.0 += acc.members();
            for (slot, category) in entry.1.iter_mut().zip(Occurrence::ALL) {
                slot.push(acc.proportion(category, options.scale));
            }
        }
    }

    for (bucket, (members, layers)) in per_bucket {
        let label = bucket.label();
        let mut paths = Vec::new();
        for (category, layers) in Occurrence::ALL.into_iter().zip(layers.iter()) {
            let merged = mosaic_proportions(layers)?;
            paths.push(write_proportion(io, dir, &proportion_stem(&label, category), &merged)?);
        }
        info!("Proportions completed for {}", label);
        on_bucket(&label);
        report.buckets.push(BucketOutput {
            label,
            members,
            outputs: paths,
        });
    }
    Ok(())
}
