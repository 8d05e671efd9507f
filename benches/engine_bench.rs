//! Criterion benchmarks for hot paths in the tetherd daemon.
//!
//! Run with:
//!   cargo bench
//!
//! Covers:
//!   - Haversine distance (pure math, evaluated once per bound task per fix)
//!   - Away-set recomputation over realistic and large task lists

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;

use tetherd::geo::{haversine_meters, Coordinate};
use tetherd::notify::Notifier;
use tetherd::reminder::ReminderEngine;
use tetherd::tasks::Task;

struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _title: &str, _body: &str) {}
}

// ─── Distance ────────────────────────────────────────────────────────────────

fn bench_haversine(c: &mut Criterion) {
    let stockholm = Coordinate::new(59.3293, 18.0686).unwrap();
    let uppsala = Coordinate::new(59.8586, 17.6389).unwrap();
    let next_block = Coordinate::new(59.3301, 18.0690).unwrap();

    c.bench_function("haversine_city_to_city", |b| {
        b.iter(|| black_box(haversine_meters(black_box(stockholm), black_box(uppsala))));
    });

    c.bench_function("haversine_short_hop", |b| {
        b.iter(|| black_box(haversine_meters(black_box(stockholm), black_box(next_block))));
    });
}

// ─── Away-set recomputation ──────────────────────────────────────────────────

/// Task list with every third task done and every second task bound to a
/// point scattered around Stockholm — roughly what a heavy user would hold.
fn make_tasks(n: usize) -> Vec<Task> {
    (0..n)
        .map(|i| {
            let bound = if i % 2 == 0 {
                // Spread bindings over ~20 km so fixes flip subsets, not all.
                let lat = 59.3293 + (i as f64 % 100.0) * 0.002;
                let lon = 18.0686 + (i as f64 % 50.0) * 0.002;
                Some(Coordinate::new(lat, lon).unwrap())
            } else {
                None
            };
            Task {
                id: format!("{i:032x}"),
                title: format!("task {i}"),
                done: i % 3 == 0,
                bound_location: bound,
                created_at: 0,
                updated_at: 0,
            }
        })
        .collect()
}

fn bench_recompute(c: &mut Criterion) {
    for n in [100_usize, 1_000] {
        let engine = ReminderEngine::new(Arc::new(NullNotifier));
        engine.on_tasks_changed(make_tasks(n));

        let here = Coordinate::new(59.3293, 18.0686).unwrap();
        let there = Coordinate::new(59.4293, 18.1686).unwrap();

        c.bench_function(&format!("recompute_away_set_{n}_tasks"), |b| {
            let mut flip = false;
            b.iter(|| {
                // Alternate fixes so the away set actually changes shape.
                flip = !flip;
                engine.on_location_changed(Some(if flip { here } else { there }));
            });
        });
    }
}

criterion_group!(benches, bench_haversine, bench_recompute);
criterion_main!(benches);
