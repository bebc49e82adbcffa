//! Test fixtures and helpers.
//!
//! Pre-built rule sets and game states for consistent testing. The stock
//! rules and the 1v1 scenario are the same files the tools ship with, so
//! every test that uses them also checks that the data still parses.

use std::sync::Arc;

use fixed::types::I32F32;
use skirmish_core::config::SimConfig;
use skirmish_core::data::{
    ArmorType, BuildingData, FactoryKind, HarvesterStats, ProjectileData, ProjectileKind, Rules,
    UnitClass, UnitData, WarheadData, WeaponData,
};
use skirmish_core::grid::{CellCoord, Locomotion};
use skirmish_core::house::HouseId;
use skirmish_core::scenario::Scenario;
use skirmish_core::simulation::Simulation;
use skirmish_core::world::EntityId;

/// Stock rule tables.
pub const STOCK_RULES: &str = include_str!("../../../data/rules.ron");

/// The stock 1v1 scenario.
pub const SKIRMISH_1V1: &str = include_str!("../../../data/scenarios/skirmish_1v1.ron");

/// Player house used by fixtures.
pub const PLAYER: HouseId = HouseId(0);

/// Opposing house used by fixtures.
pub const ENEMY: HouseId = HouseId(1);

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Parse the stock rules.
///
/// # Panics
///
/// Panics if the shipped rules file does not parse.
#[must_use]
pub fn stock_rules() -> Arc<Rules> {
    Arc::new(Rules::from_ron_str(STOCK_RULES).expect("stock rules parse"))
}

/// Build the stock 1v1 scenario with the stock rules.
///
/// # Panics
///
/// Panics if the shipped scenario does not parse or build.
#[must_use]
pub fn skirmish_1v1() -> Simulation {
    Scenario::from_ron_str(SKIRMISH_1V1)
        .expect("scenario parses")
        .build(stock_rules())
        .expect("scenario builds")
}

/// A small hand-built rule set with one of everything the systems care
/// about. Independent of the data files, so mechanics tests stay stable
/// when balance numbers change.
#[must_use]
pub fn minimal_rules() -> Arc<Rules> {
    let mut rules = Rules::default();
    rules
        .add_warhead(WarheadData {
            id: "small_arms".to_string(),
            modifiers: [(ArmorType::Heavy, 25)].into_iter().collect(),
            splash_radius: 0,
            destroys_walls: false,
            destroys_fields: false,
        })
        .add_projectile(ProjectileData {
            id: "bullet".to_string(),
            speed: 0,
            kind: ProjectileKind::Invisible,
            inaccurate: false,
            scatter: 0,
        })
        .add_weapon(WeaponData {
            id: "m16".to_string(),
            damage: 20,
            range: 768,
            rate_of_fire: 10,
            projectile: "bullet".to_string(),
            warhead: "small_arms".to_string(),
            anti_air: false,
            anti_ground: true,
        })
        .add_weapon(WeaponData {
            id: "cannon".to_string(),
            damage: 40,
            range: 1024,
            rate_of_fire: 20,
            projectile: "bullet".to_string(),
            warhead: "small_arms".to_string(),
            anti_air: false,
            anti_ground: true,
        });
    rules
        .add_unit(UnitData {
            primary_weapon: Some("m16".to_string()),
            ..UnitData::basic("rifle", UnitClass::Infantry, Locomotion::Foot)
        })
        .add_unit(UnitData {
            health: 300,
            armor: ArmorType::Heavy,
            speed: 24,
            turret_rot: Some(2),
            primary_weapon: Some("cannon".to_string()),
            ..UnitData::basic("tank", UnitClass::Vehicle, Locomotion::Track)
        })
        .add_unit(UnitData {
            health: 600,
            speed: 32,
            field_immune: true,
            harvester: Some(HarvesterStats {
                capacity: 500,
                rate: 5,
            }),
            ..UnitData::basic("harvester", UnitClass::Vehicle, Locomotion::Track)
        })
        .add_building(BuildingData {
            power: 100,
            ..BuildingData::basic("power_plant", (2, 2))
        })
        .add_building(BuildingData {
            factory: Some(FactoryKind::Infantry),
            ..BuildingData::basic("barracks", (2, 2))
        })
        .add_building(BuildingData {
            refinery: true,
            storage: 2000,
            ..BuildingData::basic("refinery", (3, 2))
        });
    Arc::new(rules)
}

/// Open clear map with houses 0 and 1 and no entities.
#[must_use]
pub fn open_field(width: u32, height: u32, seed: u64) -> Simulation {
    let mut sim = Simulation::new(width, height, SimConfig::with_seed(seed), minimal_rules());
    sim.add_house(PLAYER, 1000);
    sim.add_house(ENEMY, 1000);
    sim
}

/// Spawn a unit at a cell.
///
/// # Panics
///
/// Panics if the type is unknown or the cell is off the map.
pub fn spawn(sim: &mut Simulation, type_name: &str, house: HouseId, cell: (i32, i32)) -> EntityId {
    sim.spawn_unit(type_name, house, CellCoord::new(cell.0, cell.1))
        .expect("fixture unit spawns")
}

/// Two squads facing each other across an open field, close enough that
/// the guard scan picks targets without orders.
#[must_use]
pub fn skirmish_duel(seed: u64) -> Simulation {
    let mut sim = open_field(24, 16, seed);
    for y in 5..9 {
        spawn(&mut sim, "rifle", PLAYER, (8, y));
        spawn(&mut sim, "rifle", ENEMY, (11, y));
    }
    spawn(&mut sim, "tank", PLAYER, (6, 7));
    spawn(&mut sim, "tank", ENEMY, (13, 7));
    sim
}

/// A refinery, a harvester on a rich field, and nothing else.
///
/// Returns the simulation and the harvester.
///
/// # Panics
///
/// Panics if the fixture rules are missing the harvester or refinery.
#[must_use]
pub fn harvest_setup(seed: u64) -> (Simulation, EntityId) {
    let mut sim = open_field(24, 16, seed);
    sim.spawn_building("refinery", PLAYER, CellCoord::new(2, 2))
        .expect("fixture refinery spawns");
    for x in 10..13 {
        for y in 6..9 {
            sim.grid_mut().set_field(CellCoord::new(x, y), 10);
        }
    }
    let harvester = spawn(&mut sim, "harvester", PLAYER, (11, 7));
    (sim, harvester)
}
