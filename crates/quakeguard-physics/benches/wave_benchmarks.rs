//! Benchmarks for the wave physics engine.
//!
//! The engine runs once per (event, observer) on the alert path, so its cost
//! adds directly to the time between an event arriving and an alert firing.
//! The latency check asserts a p95 well under a millisecond.

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use quakeguard_core::types::{GeoPoint, Timestamp};
use quakeguard_physics::region::SeismicRegion;
use quakeguard_physics::{ObserverSite, SeismicInput, WaveEngine};

/// Spread events over every region so each velocity table is exercised.
fn generate_input(index: usize) -> SeismicInput {
    let (lat, lon) = match index % 6 {
        0 => (40.85, 29.10),
        1 => (37.30, 37.00),
        2 => (38.40, 26.80),
        3 => (39.50, 33.00),
        4 => (42.20, 35.00),
        _ => (35.70, 139.70),
    };
    SeismicInput {
        epicenter: GeoPoint::new(lat, lon),
        depth_km: 5.0 + (index % 40) as f64,
        magnitude: 3.0 + (index % 50) as f64 * 0.1,
        origin_time: Timestamp(1_700_000_000_000),
        station_count: Some((index % 8) as u32),
    }
}

fn bench_calculate(c: &mut Criterion) {
    let engine = WaveEngine::new();
    let observer = ObserverSite::device(GeoPoint::new(41.01, 28.97));
    let inputs: Vec<SeismicInput> = (0..1000).map(generate_input).collect();

    let mut group = c.benchmark_group("wave_engine");
    group.sample_size(200);
    group.measurement_time(Duration::from_secs(5));

    group.bench_function("calculate_single", |b| {
        let mut idx = 0usize;
        b.iter(|| {
            let input = &inputs[idx % inputs.len()];
            idx += 1;
            engine.calculate(black_box(input), black_box(&observer))
        });
    });

    // One event fanned out to many observers, as a regional broadcaster would.
    let observers: Vec<ObserverSite> = (0..100)
        .map(|i| {
            let lat = 36.0 + (i / 10) as f64 * 0.7;
            let lon = 26.0 + (i % 10) as f64 * 1.8;
            ObserverSite::device(GeoPoint::new(lat, lon))
        })
        .collect();
    group.bench_function("calculate_fanout_100", |b| {
        b.iter(|| {
            observers
                .iter()
                .filter_map(|o| engine.calculate(&inputs[0], o))
                .count()
        });
    });

    group.finish();
}

fn bench_region_classification(c: &mut Criterion) {
    let points: Vec<GeoPoint> = (0..1000).map(|i| generate_input(i).epicenter).collect();

    c.bench_function("region_classify", |b| {
        let mut idx = 0usize;
        b.iter(|| {
            let p = points[idx % points.len()];
            idx += 1;
            SeismicRegion::classify(black_box(p))
        });
    });
}

fn bench_latency_assertion(c: &mut Criterion) {
    let engine = WaveEngine::new();
    let observer = ObserverSite::device(GeoPoint::new(41.01, 28.97));
    let inputs: Vec<SeismicInput> = (0..1000).map(generate_input).collect();
    let target = Duration::from_micros(500);

    c.bench_function("calculate_latency", |b| {
        b.iter(|| engine.calculate(black_box(&inputs[0]), black_box(&observer)));
    });

    let mut times = Vec::with_capacity(inputs.len());
    for input in &inputs {
        let start = std::time::Instant::now();
        let _result = engine.calculate(input, &observer);
        times.push(start.elapsed());
    }

    times.sort();
    let median = times[499];
    let p95 = times[949];
    let max = *times.last().unwrap();

    eprintln!("\n=== Wave engine latency (1000 events) ===");
    eprintln!("Median:  {:?}", median);
    eprintln!("p95:     {:?} (target: {:?})", p95, target);
    eprintln!("Max:     {:?}", max);

    assert!(p95 < target, "calculate p95 {:?} exceeds {:?}", p95, target);
}

criterion_group!(
    benches,
    bench_calculate,
    bench_region_classification,
    bench_latency_assertion
);
criterion_main!(benches);
