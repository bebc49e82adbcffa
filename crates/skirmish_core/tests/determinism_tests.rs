//! Lockstep determinism tests on the shipped data files.
//!
//! Two simulations built from the same rules, scenario, and order stream
//! must stay byte-identical forever; a snapshot must resume exactly; a
//! recorded replay must verify.

mod common;

use std::sync::Arc;

use common::data_path;
use proptest::prelude::*;
use skirmish_core::data::Rules;
use skirmish_core::grid::CellCoord;
use skirmish_core::house::HouseId;
use skirmish_core::orders::{FrameOrder, Order};
use skirmish_core::replay::{Replay, ReplayPlayer, ReplayRecorder};
use skirmish_core::scenario::Scenario;
use skirmish_core::simulation::Simulation;
use skirmish_core::world::{EntityId, EntityKind};

fn stock_rules() -> Arc<Rules> {
    Arc::new(Rules::load(data_path("rules.ron")).unwrap())
}

fn skirmish(rules: &Arc<Rules>) -> Simulation {
    Scenario::load(data_path("scenarios/skirmish_1v1.ron"))
        .unwrap()
        .build(Arc::clone(rules))
        .unwrap()
}

/// Living units of a house in id order.
fn units(sim: &Simulation, house: u8) -> Vec<EntityId> {
    sim.world()
        .iter()
        .filter(|e| e.owner == Some(HouseId(house)) && e.kind != EntityKind::Building)
        .map(|e| e.id)
        .collect()
}

/// Both sides send everything across the river.
fn opening(sim: &Simulation) -> Vec<FrameOrder> {
    let mut orders = Vec::new();
    for (house, target) in [(0u8, CellCoord::new(45, 24)), (1u8, CellCoord::new(18, 23))] {
        for (i, unit) in units(sim, house).into_iter().enumerate() {
            let frame = 5 + i as u64 * 3;
            let order = if sim.entity(unit).is_some_and(|e| e.harvester.is_some()) {
                Order::Harvest { unit }
            } else if i % 2 == 0 {
                Order::Hunt { unit }
            } else {
                Order::Move { unit, destination: target }
            };
            orders.push(FrameOrder::new(frame, HouseId(house), order));
        }
    }
    orders
}

#[test]
fn test_stock_data_validates() {
    assert!(stock_rules().validate().is_ok());
}

#[test]
fn test_identical_inputs_give_identical_snapshots() {
    let rules = stock_rules();
    let mut a = skirmish(&rules);
    let mut b = skirmish(&rules);
    for order in opening(&a) {
        a.schedule(order.clone());
        b.schedule(order);
    }

    for _ in 0..20 {
        a.run(25);
        b.run(25);
        assert_eq!(a.serialize().unwrap(), b.serialize().unwrap(), "diverged at tick {}", a.get_tick());
        assert_eq!(a.events(), b.events());
    }
}

#[test]
fn test_snapshot_resumes_exactly() {
    let rules = stock_rules();
    let mut original = skirmish(&rules);
    for order in opening(&original) {
        original.schedule(order);
    }
    original.run(150);

    let bytes = original.serialize().unwrap();
    let mut restored = Simulation::deserialize(&bytes, Arc::clone(&rules)).unwrap();
    assert_eq!(restored.state_hash(), original.state_hash());
    assert_eq!(restored.pending_orders().len(), original.pending_orders().len());

    original.run(200);
    restored.run(200);
    assert_eq!(original.serialize().unwrap(), restored.serialize().unwrap());
}

#[test]
fn test_recorded_replay_verifies_from_file() {
    let rules = stock_rules();
    let sim = skirmish(&rules);
    let orders = opening(&sim);

    let mut recorder = ReplayRecorder::new("skirmish_1v1", sim).unwrap();
    for order in orders {
        recorder.schedule(order);
    }
    recorder.run(300);
    let (replay, live) = recorder.finish();
    assert_eq!(replay.final_tick, 300);
    assert_eq!(replay.final_hash, live.state_hash());

    let path = std::env::temp_dir().join("skirmish_integration_replay.bin");
    replay.save(&path).unwrap();
    let loaded = Replay::load(&path).unwrap();
    let _ = std::fs::remove_file(&path);

    let mut player = ReplayPlayer::new(loaded, rules).unwrap();
    player.verify().unwrap();
    assert_eq!(player.simulation().serialize().unwrap(), live.serialize().unwrap());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Any order stream, valid or not, replays to the same bytes.
    #[test]
    fn prop_order_streams_are_deterministic(
        orders in prop::collection::vec(
            (0u64..80, 0u8..2, 1u32..24, 0i32..64, 0i32..48, 0u8..4),
            0..24,
        ),
    ) {
        let rules = stock_rules();
        let stream: Vec<FrameOrder> = orders
            .into_iter()
            .map(|(frame, house, id, x, y, kind)| {
                let unit = EntityId(id);
                let order = match kind {
                    0 => Order::Move { unit, destination: CellCoord::new(x, y) },
                    1 => Order::Hunt { unit },
                    2 => Order::Attack { unit, target: EntityId(24 - id) },
                    _ => Order::Stop { unit },
                };
                FrameOrder::new(frame, HouseId(house), order)
            })
            .collect();

        let run = || {
            let mut sim = skirmish(&rules);
            for order in &stream {
                sim.schedule(order.clone());
            }
            sim.run(120);
            sim
        };
        let (a, b) = (run(), run());
        prop_assert_eq!(a.serialize().unwrap(), b.serialize().unwrap());

        for entity in a.world().iter() {
            if let Some(health) = entity.health {
                prop_assert!(health.hp > 0 && health.hp <= health.max_hp);
            }
        }
    }
}
