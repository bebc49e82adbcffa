//! Shared setup for the integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use skirmish_core::config::SimConfig;
use skirmish_core::data::Rules;
use skirmish_core::events::SimEvent;
use skirmish_core::grid::CellCoord;
use skirmish_core::house::HouseId;
use skirmish_core::simulation::Simulation;
use skirmish_core::world::EntityId;

pub const PLAYER: HouseId = HouseId(0);
pub const ENEMY: HouseId = HouseId(1);

const RULES: &str = r#"(
    units: [
        UnitData(
            id: "rifle", class: Infantry, cost: 100, build_time: 10, health: 100,
            speed: 16, locomotion: Foot, primary_weapon: Some("m16"),
            prerequisites: ["barracks"],
        ),
        UnitData(
            id: "civilian", class: Vehicle, cost: 50, build_time: 10, health: 100,
            speed: 16, locomotion: Drive,
        ),
        UnitData(
            id: "harvester", class: Vehicle, cost: 1400, build_time: 100, health: 600,
            armor: Heavy, speed: 16, locomotion: Track,
            harvester: Some((capacity: 500, rate: 5)), field_immune: true,
        ),
        UnitData(
            id: "tank", class: Vehicle, cost: 700, build_time: 100, health: 300,
            armor: Heavy, speed: 24, locomotion: Track, turret_rot: Some(2),
            primary_weapon: Some("cannon"), prerequisites: ["war_factory"],
        ),
    ],
    buildings: [
        BuildingData(id: "barracks", cost: 300, build_time: 100, health: 500, footprint: (2, 2), factory: Some(Infantry)),
        BuildingData(id: "war_factory", cost: 2000, build_time: 300, health: 1000, footprint: (3, 3), factory: Some(Vehicle)),
        BuildingData(id: "refinery", cost: 2000, build_time: 300, health: 900, footprint: (3, 2), storage: 2000, refinery: true),
    ],
    weapons: [
        WeaponData(id: "m16", damage: 20, range: 768, rate_of_fire: 10, projectile: "bullet", warhead: "small_arms"),
        WeaponData(id: "cannon", damage: 40, range: 1024, rate_of_fire: 20, projectile: "bullet", warhead: "ap"),
    ],
    projectiles: [
        ProjectileData(id: "bullet", kind: Invisible),
    ],
    warheads: [
        WarheadData(id: "small_arms", modifiers: { Heavy: 25 }),
        WarheadData(id: "ap", modifiers: { Unarmored: 30 }),
    ],
)"#;

pub fn rules() -> Arc<Rules> {
    Arc::new(Rules::from_ron_str(RULES).unwrap())
}

/// Clear map with two houses.
pub fn sim(width: u32, height: u32, credits: i32) -> Simulation {
    let mut sim = Simulation::new(width, height, SimConfig::with_seed(2024), rules());
    sim.add_house(PLAYER, credits);
    sim.add_house(ENEMY, credits);
    sim
}

pub fn spawn(sim: &mut Simulation, type_name: &str, house: HouseId, x: i32, y: i32) -> EntityId {
    sim.spawn_unit(type_name, house, CellCoord::new(x, y)).unwrap()
}

/// Path to a file under the workspace `data/` directory.
pub fn data_path(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../data")
        .join(relative)
}

/// Tick until `done` holds or `limit` ticks pass, collecting every event.
pub fn run_until(
    sim: &mut Simulation,
    limit: u64,
    mut done: impl FnMut(&Simulation) -> bool,
) -> Vec<SimEvent> {
    let mut events = Vec::new();
    for _ in 0..limit {
        events.extend_from_slice(sim.tick());
        if done(sim) {
            break;
        }
    }
    events
}
