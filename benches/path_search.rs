//! Benchmarks for path search and risk scoring.
//!
//! Benchmark targets:
//! - Layered graph, depth 3: <5ms per uncached search
//! - Scoring 1,000 paths: <1ms
//!
//! Graphs are built in memory so the numbers measure traversal and scoring,
//! not `SQLite` I/O.

// Criterion macros generate items without docs - this is expected for benchmarks
// Benchmarks use expect/unwrap for simplicity - panics are acceptable in benchmarks
#![allow(missing_docs)]
#![allow(clippy::expect_used, clippy::unwrap_used)]

use chrono::NaiveDate;
use conflict_graph::models::{
    DataSource, Entity, EntityId, EntityType, Path, PathEdge, PathOptions, Relationship,
    RelationshipMetadata,
};
use conflict_graph::services::{GraphService, RiskCalculator};
use conflict_graph::storage::InMemoryGraphBackend;
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::time::Duration;

// ============================================================================
// Helper Functions
// ============================================================================

fn node(layer: usize, i: usize) -> EntityId {
    EntityId::new(format!("l{layer}-n{i}"))
}

/// Builds `layers` fully connected layers of `width` nodes between a source
/// and a target, so the number of paths grows as `width ^ layers`.
fn layered_graph(layers: usize, width: usize) -> GraphService<InMemoryGraphBackend> {
    let service = GraphService::new(InMemoryGraphBackend::new());
    let source = EntityId::new("source");
    let target = EntityId::new("target");
    for id in [&source, &target] {
        service
            .upsert_entity(&Entity::new(id.clone(), EntityType::Neutral, id.as_str()))
            .unwrap();
    }
    for layer in 0..layers {
        for i in 0..width {
            service
                .upsert_entity(&Entity::new(node(layer, i), EntityType::Organization, "org"))
                .unwrap();
        }
    }

    let link = |a: &EntityId, b: &EntityId| {
        service
            .upsert_relationship(&Relationship::new(
                a.clone(),
                b.clone(),
                RelationshipMetadata::employment(None, None, None),
                DataSource::Manual,
            ))
            .unwrap();
    };
    for i in 0..width {
        link(&source, &node(0, i));
        link(&node(layers - 1, i), &target);
    }
    for layer in 1..layers {
        for i in 0..width {
            for j in 0..width {
                link(&node(layer - 1, i), &node(layer, j));
            }
        }
    }
    service
}

fn sample_paths(count: usize) -> Vec<Path> {
    (0..count)
        .map(|i| {
            let rel = Relationship::new(
                EntityId::new("a"),
                EntityId::new(format!("b{i}")),
                RelationshipMetadata::employment(
                    None,
                    None,
                    NaiveDate::from_ymd_opt(2000 + i32::try_from(i % 25).unwrap(), 1, 1),
                ),
                DataSource::Manual,
            );
            Path::start(EntityId::new("a")).extended(PathEdge::from_relationship(&rel, &rel.source))
        })
        .collect()
}

// ============================================================================
// Benchmarks
// ============================================================================

fn bench_find_paths(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_paths");
    group.measurement_time(Duration::from_secs(10));

    for width in [2_usize, 4, 8] {
        let service = layered_graph(2, width);
        let options = PathOptions::default().with_max_depth(3).bypassing_cache();
        let source = EntityId::new("source");
        let target = EntityId::new("target");

        group.bench_with_input(BenchmarkId::new("layered_depth_3", width), &width, |b, _| {
            b.iter(|| {
                service
                    .find_paths(black_box(&source), black_box(&target), &options)
                    .unwrap()
            });
        });
    }

    group.finish();
}

fn bench_cached_analysis(c: &mut Criterion) {
    let service = layered_graph(2, 8);
    let options = PathOptions::default().with_max_depth(3);
    let source = EntityId::new("source");
    let target = EntityId::new("target");
    service.analyze_conflict(&source, &target, &options).unwrap();

    c.bench_function("analyze_conflict_cached", |b| {
        b.iter(|| {
            service
                .analyze_conflict(black_box(&source), black_box(&target), &options)
                .unwrap()
        });
    });
}

fn bench_scoring(c: &mut Criterion) {
    let calculator = RiskCalculator::default();
    let today = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
    let paths = sample_paths(1_000);

    c.bench_function("calculate_risk_score_1000", |b| {
        b.iter(|| calculator.calculate_risk_score_at(black_box(&paths), today));
    });
}

criterion_group!(
    benches,
    bench_find_paths,
    bench_cached_analysis,
    bench_scoring
);
criterion_main!(benches);
