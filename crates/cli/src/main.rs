//! DSWE CLI - surface water classification and water proportions

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use dswe_algorithms::config::Thresholds;
use dswe_algorithms::dswe::DsweClass;
use dswe_algorithms::parallel::{num_workers, ProcessingMode};
use dswe_algorithms::pipeline::{run_scenes, PipelineOptions, RunReport};
use dswe_algorithms::proportions::{
    aggregate, discover_scenes, AggregateOptions, DsweLayer, ProportionScale, TimePeriod,
};
use dswe_algorithms::scene::{BandSource, DirectoryBandSource, SolarGeometry};
use dswe_algorithms::terrain::{SlopeMethod, SlopeParams};
use dswe_core::{GeoTiff, Raster, RasterIo};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "dswe")]
#[command(author, version, about = "Dynamic Surface Water Extent classification and water proportions", long_about = None)]
struct Cli {
    /// Verbose output (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify every scene directory under INPUT
    Classify {
        /// Directory with one subdirectory per scene
        input: PathBuf,
        /// Output directory (one subdirectory per scene)
        output: PathBuf,
        /// DEM for terrain masking; enables INWM and MASK outputs
        #[arg(long)]
        dem: Option<PathBuf>,
        /// Threshold table (default: thresholds.json in the working directory or next to the binary)
        #[arg(short, long)]
        thresholds: Option<PathBuf>,
        /// Also write the encoded diagnostic tests (DIAG)
        #[arg(long)]
        diag: bool,
        /// Also write the derived SLOPE and SHADE rasters
        #[arg(long)]
        terrain_outputs: bool,
        /// Use the Zevenbergen-Thorne slope instead of Horn
        #[arg(long)]
        zevenbergen_thorne: bool,
        /// Z-factor for slope and hillshade
        #[arg(short, long, default_value = "1.0")]
        z_factor: f64,
        /// Sun azimuth when a scene has no metadata file
        #[arg(long, default_value = "315")]
        azimuth: f64,
        /// Sun altitude when a scene has no metadata file
        #[arg(long, default_value = "45")]
        altitude: f64,
        /// Number of scenes processed in parallel (default: all cores)
        #[arg(short = 'j', long)]
        threads: Option<usize>,
        /// Write the run report (completed and skipped scenes) as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Aggregate classified scenes into water proportions per time period
    Proportions {
        /// Directory searched recursively for classified rasters
        main_dir: PathBuf,
        /// Classified layer to aggregate
        #[arg(value_enum, ignore_case = true)]
        dswe_layer: LayerArg,
        /// Time window for each bucket
        #[arg(value_enum)]
        time_period: PeriodArg,
        /// Window length in years (multiyear only)
        #[arg(short = 'y', long = "num-years")]
        num_years: Option<u32>,
        /// First year of a multiyear window (default: earliest scene year)
        #[arg(long)]
        align_year: Option<i32>,
        /// Write fractions 0-1 (f32) instead of percentages 0-100 (u8)
        #[arg(long)]
        fraction: bool,
        /// Process rasters sharing a top-left corner separately and merge per bucket
        #[arg(long)]
        mosaic: bool,
        /// Also write per-category and valid observation counts
        #[arg(long, conflicts_with = "mosaic")]
        write_counts: bool,
    },
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LayerArg {
    #[value(name = "INWM")]
    Inwm,
    #[value(name = "INTR")]
    Intr,
}

impl From<LayerArg> for DsweLayer {
    fn from(layer: LayerArg) -> Self {
        match layer {
            LayerArg::Inwm => DsweLayer::Inwm,
            LayerArg::Intr => DsweLayer::Intr,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PeriodArg {
    Year,
    Month,
    #[value(name = "month_across_years")]
    MonthAcrossYears,
    Season,
    Semidecade,
    Multiyear,
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("dswe={level},dswe_algorithms={level},dswe_core={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn progress_bar(len: u64, what: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    if let Ok(style) =
        ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("=> "));
    }
    pb.set_message(what.to_string());
    pb
}

fn time_period(period: PeriodArg, num_years: Option<u32>, align_year: Option<i32>) -> Result<TimePeriod> {
    if period != PeriodArg::Multiyear && (num_years.is_some() || align_year.is_some()) {
        bail!("-y/--num-years and --align-year only apply to the multiyear time period");
    }
    Ok(match period {
        PeriodArg::Year => TimePeriod::Year,
        PeriodArg::Month => TimePeriod::Month,
        PeriodArg::MonthAcrossYears => TimePeriod::MonthAcrossYears,
        PeriodArg::Season => TimePeriod::Season,
        PeriodArg::Semidecade => TimePeriod::Semidecade,
        PeriodArg::Multiyear => {
            let Some(years) = num_years else {
                bail!("the multiyear time period requires -y NUM_YEARS");
            };
            TimePeriod::multiyear(years, align_year).context("Invalid multiyear window")?
        }
    })
}

fn write_report(report: &RunReport, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialize run report")?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

fn done(name: &str, path: &Path, elapsed: Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

// ─── Commands ───────────────────────────────────────────────────────────

#[allow(clippy::too_many_arguments)]
fn classify(
    input: &Path,
    output: &Path,
    dem: Option<&Path>,
    thresholds: Option<&Path>,
    diag: bool,
    terrain_outputs: bool,
    zevenbergen_thorne: bool,
    z_factor: f64,
    sun: SolarGeometry,
    threads: Option<usize>,
    report_path: Option<&Path>,
) -> Result<()> {
    // a broken threshold table aborts before any scene is touched
    let thresholds = Thresholds::locate(thresholds).context("Failed to load threshold table")?;

    let dem: Option<Raster<f64>> = match dem {
        Some(path) => {
            let pb = spinner("Reading DEM...");
            let raster = GeoTiff
                .read(path)
                .with_context(|| format!("Failed to read DEM {}", path.display()))?;
            pb.finish_and_clear();
            info!("DEM: {} x {}", raster.cols(), raster.rows());
            Some(raster)
        }
        None => None,
    };

    let mode = ProcessingMode::from_threads(threads);
    let options = PipelineOptions {
        write_diag: diag,
        write_terrain: terrain_outputs,
        slope: SlopeParams {
            method: if zevenbergen_thorne {
                SlopeMethod::ZevenbergenThorne
            } else {
                SlopeMethod::Horn
            },
            z_factor,
        },
        default_sun: sun,
        mode,
    };
    if terrain_outputs && dem.is_none() {
        warn!("--terrain-outputs has no effect without --dem");
    }

    let source = DirectoryBandSource::new(input);
    let scenes = source
        .scenes()
        .with_context(|| format!("Failed to list scenes in {}", input.display()))?;
    let workers = match mode {
        ProcessingMode::Sequential => 1,
        ProcessingMode::Parallel => num_workers(),
        ProcessingMode::ParallelWith(n) => n,
    };
    info!("{} scenes, {} workers", scenes.len(), workers);

    let start = Instant::now();
    let pb = progress_bar(scenes.len() as u64, "scenes");
    let report = run_scenes(&GeoTiff, &source, dem.as_ref(), output, &thresholds, &options, |_| pb.inc(1))
        .context("Classification failed")?;
    pb.finish_and_clear();
    let elapsed = start.elapsed();

    println!("Classified {} of {} scenes", report.completed.len(), report.total());
    for skipped in &report.skipped {
        println!("  skipped {}: {}", skipped.scene, skipped.reason);
    }
    if let Some(path) = report_path {
        write_report(&report, path)?;
    }
    done("DSWE", output, elapsed);
    Ok(())
}

fn proportions(
    main_dir: &Path,
    layer: DsweLayer,
    period: TimePeriod,
    fraction: bool,
    mosaic: bool,
    write_counts: bool,
) -> Result<()> {
    let pb = spinner("Searching for classified scenes...");
    let records = discover_scenes(&GeoTiff, main_dir, layer)
        .with_context(|| format!("Failed to search {}", main_dir.display()))?;
    pb.finish_and_clear();
    info!("Found {} {} rasters", records.len(), layer);
    if records.is_empty() {
        println!("No {} rasters found under {}", layer, main_dir.display());
        return Ok(());
    }

    let options = AggregateOptions {
        period,
        scale: if fraction {
            ProportionScale::Fraction
        } else {
            ProportionScale::Percent
        },
        write_counts,
        mosaic,
    };

    let start = Instant::now();
    let pb = spinner("Calculating proportions...");
    let report = aggregate(&GeoTiff, &records, main_dir, &options, |label| {
        pb.set_message(format!("Proportions completed for {label}"))
    })
    .context("Aggregation failed")?;
    pb.finish_and_clear();
    let elapsed = start.elapsed();

    for bucket in &report.buckets {
        println!("{}: {} scenes, {} rasters", bucket.label, bucket.members, bucket.outputs.len());
    }
    for skipped in &report.skipped {
        println!("  skipped {}: {}", skipped.path.display(), skipped.reason);
    }
    done("Proportions", &report.output_dir, elapsed);
    Ok(())
}

fn show_info(input: &Path) -> Result<()> {
    let header = GeoTiff
        .read_header(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let raster: Raster<f64> = GeoTiff.read(input).context("Failed to read raster")?;
    let t = &header.transform;
    let extent = header.extent();
    let summary = raster.summary();

    println!("File: {}", input.display());
    println!("Dimensions: {} x {} ({} cells)", header.cols, header.rows, raster.len());
    println!(
        "Geotransform: origin ({:.6}, {:.6}), pixel ({}, {})",
        t.origin_x, t.origin_y, t.pixel_width, t.pixel_height
    );
    if !t.is_north_up() {
        println!("Rotation: ({}, {})", t.row_rotation, t.col_rotation);
    }
    println!(
        "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
        extent.min_x, extent.min_y, extent.max_x, extent.max_y
    );
    if let Some(projection) = &header.projection {
        println!("Projection: {}", projection);
    }
    if let Some(nodata) = header.nodata {
        println!("NoData: {}", nodata);
    }

    println!("\nStatistics:");
    if let Some(min) = summary.min {
        println!("  Min: {:.4}", min);
    }
    if let Some(max) = summary.max {
        println!("  Max: {:.4}", max);
    }
    if let Some(mean) = summary.mean {
        println!("  Mean: {:.4}", mean);
    }
    println!("  Valid cells: {} ({:.1}%)", summary.valid, summary.valid_percent());

    // class histogram when every value is an 8-bit code
    let codes: Option<Vec<u8>> = raster
        .data()
        .iter()
        .map(|&v| (v.fract() == 0.0 && (0.0..=255.0).contains(&v)).then_some(v as u8))
        .collect();
    if let Some(codes) = codes {
        let mut histogram: BTreeMap<u8, usize> = BTreeMap::new();
        for code in codes {
            *histogram.entry(code).or_default() += 1;
        }
        println!("\nValues:");
        for (code, count) in histogram {
            match DsweClass::from_code(code) {
                Some(class) => println!("  {:>3} {:<28} {}", code, class.label(), count),
                None => println!("  {:>3} {:<28} {}", code, "", count),
            }
        }
    }
    Ok(())
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Classify {
            input,
            output,
            dem,
            thresholds,
            diag,
            terrain_outputs,
            zevenbergen_thorne,
            z_factor,
            azimuth,
            altitude,
            threads,
            report,
        } => classify(
            &input,
            &output,
            dem.as_deref(),
            thresholds.as_deref(),
            diag,
            terrain_outputs,
            zevenbergen_thorne,
            z_factor,
            SolarGeometry { azimuth, altitude },
            threads,
            report.as_deref(),
        )?,

        Commands::Proportions {
            main_dir,
            dswe_layer,
            time_period: period,
            num_years,
            align_year,
            fraction,
            mosaic,
            write_counts,
        } => {
            let period = time_period(period, num_years, align_year)?;
            proportions(&main_dir, dswe_layer.into(), period, fraction, mosaic, write_counts)?
        }

        Commands::Info { input } => show_info(&input)?,
    }

    Ok(())
}
