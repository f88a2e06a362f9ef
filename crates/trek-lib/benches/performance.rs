//! Performance benchmarks for trek-lib
//!
//! Run with: cargo bench --package trek-lib

use async_trait::async_trait;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use geo::Point;
use std::sync::Arc;
use trek_lib::{
    Composer, Config, Coordinate, Directions, GeoProvider, NewMarker, Preference, RouteOptions,
    TravelMode, TrekId, TrekStore, aggregate, codec, export,
};

/// Generate a realistic hilly track with the specified number of points.
fn generate_track(num_points: usize, base_lat: f64, base_lon: f64) -> Vec<Coordinate> {
    (0..num_points)
        .map(|i| {
            let t = i as f64 / num_points as f64;
            let lat = base_lat + t * 0.1 + (t * 50.0).sin() * 0.001;
            let lon = base_lon + t * 0.1 + (t * 30.0).cos() * 0.001;
            let ele = 500.0 + (t * 20.0).sin() * 300.0;
            Coordinate::new(lon, lat, ele)
        })
        .collect()
}

/// Provider answering every request with the same long synthetic track
struct SyntheticProvider {
    geometry: String,
}

#[async_trait]
impl GeoProvider for SyntheticProvider {
    async fn search(&self, _address: &str) -> Option<Point<f64>> {
        None
    }

    async fn elevation(&self, _latitude: f64, _longitude: f64) -> Option<f64> {
        None
    }

    async fn directions(
        &self,
        _waypoints: &[Point<f64>],
        _mode: TravelMode,
        _preference: Preference,
    ) -> Option<Directions> {
        Some(Directions {
            geometry: self.geometry.clone(),
            distance: 10_000.0,
            ascent: 300.0,
            descent: 300.0,
        })
    }
}

/// A Trek of `num_routes` computed Routes, each decoding to `points_per_route` coordinates
fn computed_trek(num_routes: usize, points_per_route: usize) -> (TrekStore, TrekId) {
    let geometry = codec::encode(&generate_track(points_per_route, 45.0, 5.7));
    let config = Config {
        max_geometry_len: usize::MAX,
        ..Config::default()
    };
    let composer = Composer::new(TrekStore::new(), Arc::new(SyntheticProvider { geometry }), config);

    let user = composer.add_user("bench", "bench@example.org").unwrap();
    let trek = composer.create_trek("Bench", user).unwrap();
    let start = composer
        .create_marker(user, NewMarker::named("Start").at(5.7, 45.0, None))
        .unwrap();
    let end = composer
        .create_marker(user, NewMarker::named("End").at(5.8, 45.1, None))
        .unwrap();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();
    runtime.block_on(async {
        for i in 0..num_routes {
            let route = composer
                .create_route(trek, &format!("Route {i}"), RouteOptions::default())
                .unwrap();
            composer.append_marker(route, start).await.unwrap();
            composer.append_marker(route, end).await.unwrap();
            composer.recompute(route).await.unwrap();
        }
    });
    (composer.into_store(), trek)
}

// ============================================================================
// Core Benchmarks - Key performance indicators
// ============================================================================

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");

    let geometry = codec::encode(&generate_track(50_000, 45.0, 5.7));
    group.throughput(Throughput::Elements(50_000));
    group.bench_function("single_route_50k", |b| {
        b.iter(|| codec::decode(&geometry));
    });

    group.finish();
}

fn bench_profile(c: &mut Criterion) {
    let mut group = c.benchmark_group("profile");
    group.sample_size(20);

    // 20 routes with 5000 points each
    let (store, trek) = computed_trek(20, 5_000);
    let radius = Config::default().earth_radius_m;

    group.throughput(Throughput::Elements(20 * 5_000));
    group.bench_function("20_routes_5k_each", |b| {
        b.iter(|| aggregate::elevation_profile(&store, trek, radius).unwrap());
    });
    group.bench_function("summary", |b| {
        b.iter(|| aggregate::summarize(&store, trek).unwrap());
    });

    group.finish();
}

fn bench_export(c: &mut Criterion) {
    let mut group = c.benchmark_group("export");
    group.sample_size(10);

    let (store, trek) = computed_trek(5, 5_000);
    group.throughput(Throughput::Elements(5 * 5_000));
    group.bench_function("gpx_5x5k", |b| {
        b.iter(|| export::write_trek_gpx(&store, trek).unwrap());
    });

    group.finish();
}

// ============================================================================
// Criterion Configuration
// ============================================================================

criterion_group!(benches, bench_decode, bench_profile, bench_export);

criterion_main!(benches);
