//! Simulation benchmarks for skirmish_core.
//!
//! Run with: `cargo bench -p skirmish_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use skirmish_core::components::MissionKind;
use skirmish_core::config::SimConfig;
use skirmish_core::data::Rules;
use skirmish_core::grid::{CellCoord, Locomotion, Terrain};
use skirmish_core::house::HouseId;
use skirmish_core::pathfinding::{find_path, DEFAULT_SEARCH_LIMIT};
use skirmish_core::scenario::Scenario;
use skirmish_core::simulation::Simulation;

const RULES: &str = include_str!("../../../data/rules.ron");
const SKIRMISH: &str = include_str!("../../../data/scenarios/skirmish_1v1.ron");

fn rules() -> Arc<Rules> {
    Arc::new(Rules::from_ron_str(RULES).expect("stock rules parse"))
}

fn skirmish() -> Simulation {
    Scenario::from_ron_str(SKIRMISH)
        .expect("scenario parses")
        .build(rules())
        .expect("scenario builds")
}

/// Two armies of `per_side` rifles each, hunting one another.
fn melee(per_side: i32) -> Simulation {
    let mut sim = Simulation::new(64, 64, SimConfig::with_seed(7), rules());
    sim.add_house(HouseId(0), 0);
    sim.add_house(HouseId(1), 0);
    for i in 0..per_side {
        let (x, y) = (i % 8, i / 8);
        for (house, ox) in [(HouseId(0), 4), (HouseId(1), 52)] {
            if let Some(id) = sim.spawn_unit("rifle", house, CellCoord::new(ox + x, 8 + y * 2)) {
                sim.set_mission(id, MissionKind::Hunt, None);
            }
        }
    }
    sim
}

pub fn tick_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick");
    for per_side in [10, 50, 100] {
        let base = melee(per_side);
        group.bench_with_input(BenchmarkId::new("melee", per_side), &base, |b, base| {
            b.iter_batched(
                || base.clone(),
                |mut sim| {
                    sim.run(30);
                    black_box(sim.get_tick())
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }
    let base = skirmish();
    group.bench_function("skirmish_1v1_100", |b| {
        b.iter_batched(
            || base.clone(),
            |mut sim| {
                sim.run(100);
                black_box(sim.get_tick())
            },
            criterion::BatchSize::SmallInput,
        );
    });
    group.finish();
}

pub fn snapshot_benchmark(c: &mut Criterion) {
    let mut sim = skirmish();
    sim.run(100);
    c.bench_function("state_hash", |b| b.iter(|| black_box(sim.state_hash())));
    c.bench_function("serialize", |b| b.iter(|| black_box(sim.serialize())));
}

pub fn pathfinding_benchmark(c: &mut Criterion) {
    let mut sim = Simulation::new(128, 128, SimConfig::default(), rules());
    for y in 0..120 {
        sim.grid_mut().set_terrain(CellCoord::new(64, y), Terrain::Rock);
    }
    let grid = sim.grid().clone();
    c.bench_function("find_path_around_wall", |b| {
        b.iter(|| {
            black_box(find_path(
                &grid,
                CellCoord::new(2, 2),
                CellCoord::new(125, 4),
                Locomotion::Track,
                DEFAULT_SEARCH_LIMIT * 20,
            ))
        });
    });
}

criterion_group!(benches, tick_benchmark, snapshot_benchmark, pathfinding_benchmark);
criterion_main!(benches);
