//! Benchmarks for per-scene classification and aggregation

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use dswe_algorithms::config::Thresholds;
use dswe_algorithms::dswe::interpret;
use dswe_algorithms::proportions::{Occurrence, OccurrenceAccumulator, ProportionScale};
use dswe_algorithms::scene::{BandSet, SpectralBands};
use dswe_algorithms::terrain::{hillshade, HillshadeParams};
use dswe_core::{GeoTransform, GridSpec, Raster};

fn create_band(size: usize, base: f64, step: usize) -> Raster<f64> {
    let mut r = Raster::new(size, size);
    r.set_transform(GeoTransform::new(0.0, size as f64 * 30.0, 30.0, -30.0));
    r.set_nodata(Some(-9999.0));
    for row in 0..size {
        for col in 0..size {
            let v = base + ((row * step + col * 13) % 2000) as f64;
            r.set(row, col, v).unwrap();
        }
    }
    r
}

fn create_band_set(size: usize) -> BandSet {
    let bands = SpectralBands {
        blue: create_band(size, 300.0, 3),
        green: create_band(size, 500.0, 5),
        red: create_band(size, 400.0, 7),
        nir: create_band(size, 200.0, 11),
        swir1: create_band(size, 100.0, 17),
        swir2: create_band(size, 50.0, 19),
    };
    BandSet::new(bands, None).unwrap()
}

fn bench_interpret(c: &mut Criterion) {
    let mut group = c.benchmark_group("dswe/interpret");
    let thresholds = Thresholds::default();
    for size in [256, 512, 1024] {
        let set = create_band_set(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| interpret(black_box(&set), black_box(&thresholds)).unwrap())
        });
    }
    group.finish();
}

fn bench_hillshade(c: &mut Criterion) {
    let mut group = c.benchmark_group("terrain/hillshade");
    for size in [256, 512, 1024] {
        let dem = create_band(size, 1000.0, 1);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| hillshade(black_box(&dem), HillshadeParams::default()).unwrap())
        });
    }
    group.finish();
}

fn bench_accumulate(c: &mut Criterion) {
    let mut group = c.benchmark_group("proportions/accumulate_24");
    for size in [256, 512, 1024] {
        let grid = GridSpec {
            transform: GeoTransform::new(0.0, size as f64 * 30.0, 30.0, -30.0),
            rows: size,
            cols: size,
        };
        let layers: Vec<Raster<u8>> = (0..24u8)
            .map(|i| {
                let mut r = Raster::filled(size, size, i % 5);
                r.set_transform(grid.transform);
                r
            })
            .collect();
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                let mut acc = OccurrenceAccumulator::new(grid, None);
                for layer in &layers {
                    acc.add(black_box(layer)).unwrap();
                }
                acc.proportion(Occurrence::OpenWater, ProportionScale::Percent)
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_interpret, bench_hillshade, bench_accumulate);
criterion_main!(benches);
