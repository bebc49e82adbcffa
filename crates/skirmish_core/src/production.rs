//! Spawning, factories, and the build queue.
//!
//! Every factory works on a single item. Cost is paid in full when the item
//! is queued; progress then accrues at the owner's power multiplier each
//! tick. Finished units leave from the house's primary factory for their
//! line, finished structures wait for a placement order.
//!
//! All calculations use integer/fixed-point math for deterministic simulation.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::components::{
    Aircraft, BuildItem, BuildState, Building, Cargo, Cloak, Combat, Harvester, Health, Infantry,
    Mission, MissionKind, Mobile, Production, Transform, Turret,
};
use crate::data::{FactoryKind, Rules, UnitClass, UnitData};
use crate::error::OrderError;
use crate::events::SimEvent;
use crate::grid::{CellCoord, Locomotion};
use crate::house::HouseId;
use crate::math::Fixed;
use crate::mission::set_mission;
use crate::simulation::Simulation;
use crate::world::{Entity, EntityId, EntityKind};

/// Every production line, in ledger order.
const FACTORY_KINDS: [FactoryKind; 4] = [
    FactoryKind::Infantry,
    FactoryKind::Vehicle,
    FactoryKind::Aircraft,
    FactoryKind::Structure,
];

// ============================================================================
// Spawning
// ============================================================================

/// Longest weapon reach among the named weapons, in leptons.
fn weapon_reach(rules: &Rules, weapons: &[&String]) -> Fixed {
    let reach = weapons
        .iter()
        .filter_map(|w| rules.weapon(w))
        .map(|w| w.range)
        .max()
        .unwrap_or(0);
    Fixed::from_num(reach)
}

fn build_unit(rules: &Rules, data: &UnitData, owner: HouseId, cell: CellCoord) -> Entity {
    let mut entity = Entity::new(
        data.class.entity_kind(),
        &data.id,
        Some(owner),
        Transform::at_cell(cell),
    );
    entity.sight = data.sight;
    entity.detects_cloaked = data.detects_cloaked;
    entity.mobile = Some(Mobile::new(Fixed::from_num(data.speed), data.locomotion));
    entity.mission = Some(Mission::default());
    entity.health = Some(Health::new(data.health, data.armor));

    if data.is_combatant() {
        let weapons: Vec<&String> = data
            .primary_weapon
            .iter()
            .chain(&data.secondary_weapon)
            .collect();
        let mut combat = Combat::new(data.primary_weapon.clone(), weapon_reach(rules, &weapons));
        combat.secondary.clone_from(&data.secondary_weapon);
        if data.ammo >= 0 {
            combat = combat.with_ammo(data.ammo);
        }
        entity.combat = Some(combat);
    }
    if let Some(stats) = data.harvester {
        entity.harvester = Some(Harvester::new(stats.capacity, stats.rate));
    }
    if data.is_transport() {
        entity.cargo = Some(Cargo::new(data.passengers));
    }
    if let Some(rot) = data.turret_rot {
        entity.turret = Some(Turret { facing: 0, rot });
    }
    if data.cloakable {
        entity.cloak = Some(Cloak::default());
    }
    match data.class {
        UnitClass::Aircraft => entity.aircraft = Some(Aircraft::default()),
        UnitClass::Infantry => {
            entity.infantry = Some(Infantry {
                fraidy_cat: data.fraidy_cat,
                field_immune: data.field_immune,
                ..Infantry::default()
            });
        }
        UnitClass::Vehicle => {}
    }
    entity
}

fn place_unit(
    sim: &mut Simulation,
    type_name: &str,
    owner: HouseId,
    cell: CellCoord,
    factory: Option<EntityId>,
) -> Option<EntityId> {
    let rules = Arc::clone(&sim.rules);
    let Some(data) = rules.unit(type_name) else {
        warn!(type_name, "Unknown unit type");
        return None;
    };
    if !sim.grid.in_bounds(cell) {
        warn!(type_name, %cell, "Spawn cell off the map");
        return None;
    }

    let entity = build_unit(&rules, data, owner, cell);
    let ground = entity.occupies_ground();
    let id = sim.world.spawn(entity);
    if ground {
        sim.grid.add_unit(cell);
    }
    sim.emit(SimEvent::UnitSpawned { entity: id, factory });
    debug!(entity = %id, type_name, %owner, %cell, "Spawned unit");

    if data.harvester.is_some() && factory.is_some() {
        set_mission(sim, id, MissionKind::Harvest, None);
    }
    Some(id)
}

/// Create a unit from its data definition standing on `cell`.
///
/// Returns `None`, with a warning, for unknown types or off-map cells.
pub fn spawn_unit(
    sim: &mut Simulation,
    type_name: &str,
    owner: HouseId,
    cell: CellCoord,
) -> Option<EntityId> {
    place_unit(sim, type_name, owner, cell, None)
}

/// Create a structure with its top-left corner at `origin`.
///
/// Placement rules are not checked here; see
/// [`placement::check_placement`](crate::placement::check_placement). The
/// footprint must still lie on the map. Factories become primary when the
/// house has none for their line, HQs set the house flag, and a free unit
/// rolls out of the first open exit cell.
pub fn spawn_building(
    sim: &mut Simulation,
    type_name: &str,
    owner: HouseId,
    origin: CellCoord,
) -> Option<EntityId> {
    let rules = Arc::clone(&sim.rules);
    let Some(data) = rules.building(type_name) else {
        warn!(type_name, "Unknown building type");
        return None;
    };
    let footprint = Building::new(origin, data.footprint);
    if !footprint.cells().all(|c| sim.grid.in_bounds(c)) {
        warn!(type_name, %origin, "Footprint off the map");
        return None;
    }

    let mut entity = Entity::new(
        EntityKind::Building,
        &data.id,
        Some(owner),
        Transform {
            position: footprint.center(),
            facing: 0,
        },
    );
    entity.sight = data.sight;
    entity.detects_cloaked = data.detects_cloaked;
    entity.health = Some(Health::new(data.health, data.armor));
    entity.building = Some(footprint);
    if let Some(weapon) = &data.primary_weapon {
        let reach = weapon_reach(&rules, &[weapon]);
        entity.combat = Some(Combat::new(Some(weapon.clone()), reach));
        entity.mission = Some(Mission::default());
    }
    if let Some(rot) = data.turret_rot {
        entity.turret = Some(Turret { facing: 0, rot });
    }
    if let Some(kind) = data.factory {
        entity.production = Some(Production { kind, item: None });
    }

    let id = sim.world.spawn(entity);
    for cell in footprint.cells() {
        sim.grid.set_building(cell, Some(id));
    }

    let mut promoted = None;
    if let Some(house) = sim.houses.get_mut(&owner) {
        if data.hq {
            house.hq_deployed = true;
        }
        if let Some(kind) = data.factory {
            if !house.primary.contains_key(&kind) {
                house.primary.insert(kind, id);
                promoted = Some(kind);
            }
        }
    }
    if let Some(kind) = promoted {
        sim.emit(SimEvent::PrimaryChanged {
            house: owner,
            kind,
            factory: Some(id),
        });
    }
    sim.emit(SimEvent::BuildingPlaced { entity: id, house: owner });
    debug!(entity = %id, type_name, %owner, %origin, "Placed building");

    if let Some(free) = &data.free_unit {
        let locomotion = rules.unit(free).map_or(Locomotion::Foot, |u| u.locomotion);
        match exit_cell(sim, &footprint, locomotion) {
            Some(cell) => {
                place_unit(sim, free, owner, cell, Some(id));
            }
            None => warn!(building = %id, unit = %free, "No room for free unit"),
        }
    }
    Some(id)
}

/// Perimeter cells of a footprint, walked clockwise from the top of the
/// east side: east, south, west, north.
pub fn exit_cells(footprint: &Building) -> Vec<CellCoord> {
    let CellCoord { x: ox, y: oy } = footprint.origin;
    let (w, h) = footprint.footprint;
    let mut cells = Vec::with_capacity(usize::try_from(2 * (w + h) + 4).unwrap_or(0));
    cells.extend((oy..oy + h).map(|y| CellCoord::new(ox + w, y)));
    cells.extend((ox - 1..=ox + w).rev().map(|x| CellCoord::new(x, oy + h)));
    cells.extend((oy..oy + h).rev().map(|y| CellCoord::new(ox - 1, y)));
    cells.extend((ox - 1..=ox + w).map(|x| CellCoord::new(x, oy - 1)));
    cells
}

fn exit_cell(sim: &Simulation, footprint: &Building, locomotion: Locomotion) -> Option<CellCoord> {
    exit_cells(footprint)
        .into_iter()
        .find(|c| sim.grid.is_free(*c, locomotion))
}

// ============================================================================
// Queue
// ============================================================================

/// What it takes to build a type.
struct Recipe {
    kind: FactoryKind,
    is_building: bool,
    cost: i32,
    build_time: u32,
    prerequisites: Vec<String>,
    build_limit: Option<u32>,
}

fn recipe(rules: &Rules, type_name: &str) -> Option<Recipe> {
    if let Some(unit) = rules.unit(type_name) {
        return Some(Recipe {
            kind: unit.class.factory(),
            is_building: false,
            cost: unit.cost,
            build_time: unit.build_time,
            prerequisites: unit.prerequisites.clone(),
            build_limit: unit.build_limit,
        });
    }
    rules.building(type_name).map(|b| Recipe {
        kind: FactoryKind::Structure,
        is_building: true,
        cost: b.cost,
        build_time: b.build_time,
        prerequisites: b.prerequisites.clone(),
        build_limit: b.build_limit,
    })
}

/// Living entities of a type owned by a house, plus the ones in its queues.
pub(crate) fn owned_count(sim: &Simulation, house: HouseId, type_name: &str) -> u32 {
    let mut count = 0u32;
    for entity in sim.world.iter().filter(|e| e.owner == Some(house)) {
        if entity.type_name == type_name {
            count += 1;
        }
        let queued = entity
            .production
            .as_ref()
            .and_then(|p| p.item.as_ref())
            .is_some_and(|item| item.type_name == type_name);
        if queued {
            count += 1;
        }
    }
    count
}

/// Check the per-type cap for a house.
pub(crate) fn check_build_limit(
    sim: &Simulation,
    house: HouseId,
    type_name: &str,
    limit: Option<u32>,
) -> Result<(), OrderError> {
    match limit {
        Some(limit) if owned_count(sim, house, type_name) >= limit => {
            Err(OrderError::BuildLimit(type_name.to_string()))
        }
        _ => Ok(()),
    }
}

/// A living factory owned by `house`.
pub(crate) fn owned_factory(
    sim: &Simulation,
    house: HouseId,
    factory: EntityId,
) -> Result<&Production, OrderError> {
    let entity = sim
        .world
        .get(factory)
        .ok_or(OrderError::UnknownEntity(factory))?;
    if entity.owner != Some(house) {
        return Err(OrderError::NotOwned(factory));
    }
    entity.production.as_ref().ok_or(OrderError::Incapable {
        entity: factory,
        action: "produce",
    })
}

fn pick_factory(
    sim: &Simulation,
    house: HouseId,
    kind: FactoryKind,
    requested: Option<EntityId>,
    type_name: &str,
) -> Result<EntityId, OrderError> {
    if let Some(factory) = requested {
        let production = owned_factory(sim, house, factory)?;
        if production.kind != kind {
            return Err(OrderError::NoFactory(type_name.to_string()));
        }
        if production.item.is_some() {
            return Err(OrderError::FactoryBusy(factory));
        }
        return Ok(factory);
    }

    let idle = |id: EntityId| {
        sim.world
            .get(id)
            .filter(|e| e.owner == Some(house))
            .and_then(|e| e.production.as_ref())
            .is_some_and(|p| p.kind == kind && p.item.is_none())
    };
    let primary = sim.houses.get(&house).and_then(|h| h.primary.get(&kind).copied());
    if let Some(primary) = primary.filter(|&p| idle(p)) {
        return Ok(primary);
    }
    sim.world
        .iter()
        .map(|e| e.id)
        .find(|&id| idle(id))
        .ok_or_else(|| OrderError::NoFactory(type_name.to_string()))
}

/// Start building `type_name`, paying its cost up front.
///
/// With no factory named, the primary factory is used if idle, then the
/// lowest-id idle factory of the right line. Returns the chosen factory.
pub fn queue_build(
    sim: &mut Simulation,
    house: HouseId,
    type_name: &str,
    factory: Option<EntityId>,
) -> Result<EntityId, OrderError> {
    if !sim.houses.contains_key(&house) {
        return Err(OrderError::UnknownHouse(house));
    }
    let recipe = recipe(&sim.rules, type_name)
        .ok_or_else(|| OrderError::UnknownType(type_name.to_string()))?;

    for prereq in &recipe.prerequisites {
        let present = sim
            .world
            .iter()
            .any(|e| e.owner == Some(house) && e.building.is_some() && &e.type_name == prereq);
        if !present {
            return Err(OrderError::MissingPrerequisite(prereq.clone()));
        }
    }
    check_build_limit(sim, house, type_name, recipe.build_limit)?;
    let factory = pick_factory(sim, house, recipe.kind, factory, type_name)?;

    let ledger = sim
        .houses
        .get_mut(&house)
        .ok_or(OrderError::UnknownHouse(house))?;
    if !ledger.spend(recipe.cost) {
        return Err(OrderError::InsufficientCredits {
            required: recipe.cost,
            available: ledger.credits,
        });
    }

    if let Some(production) = sim.world.get_mut(factory).and_then(|e| e.production.as_mut()) {
        production.item = Some(BuildItem {
            type_name: type_name.to_string(),
            is_building: recipe.is_building,
            progress: Fixed::ZERO,
            build_time: recipe.build_time,
            cost: recipe.cost,
            state: BuildState::InProgress,
        });
    }
    debug!(%house, %factory, type_name, cost = recipe.cost, "Queued build");
    Ok(factory)
}

/// Abandon a factory's item and refund the share of its cost not yet
/// worked off.
pub fn cancel_build(sim: &mut Simulation, house: HouseId, factory: EntityId) -> Result<i32, OrderError> {
    let item = owned_factory(sim, house, factory)?
        .item
        .clone()
        .ok_or(OrderError::NothingReady(factory))?;

    let refund = item.unspent_cost();
    if let Some(ledger) = sim.houses.get_mut(&house) {
        ledger.refund(refund);
    }
    if let Some(production) = sim.world.get_mut(factory).and_then(|e| e.production.as_mut()) {
        production.item = None;
    }
    Ok(refund)
}

/// Make `factory` the primary for its line.
pub fn set_primary(sim: &mut Simulation, house: HouseId, factory: EntityId) -> Result<(), OrderError> {
    let kind = owned_factory(sim, house, factory)?.kind;
    let ledger = sim
        .houses
        .get_mut(&house)
        .ok_or(OrderError::UnknownHouse(house))?;
    if ledger.primary.insert(kind, factory) != Some(factory) {
        sim.emit(SimEvent::PrimaryChanged {
            house,
            kind,
            factory: Some(factory),
        });
    }
    Ok(())
}

// ============================================================================
// Systems
// ============================================================================

/// Advance every factory one tick.
pub(crate) fn production_system(sim: &mut Simulation) {
    for id in sim.world.ids() {
        let Some(entity) = sim.world.get(id) else {
            continue;
        };
        let Some(owner) = entity.owner else {
            continue;
        };
        let Some(production) = entity.production.as_ref() else {
            continue;
        };
        let kind = production.kind;
        let Some(item) = production.item.as_ref() else {
            continue;
        };
        let state = item.state;
        let Some(house) = sim.houses.get(&owner) else {
            continue;
        };
        let multiplier = house.power_multiplier();
        let is_primary = house.primary.get(&kind) == Some(&id);

        if state == BuildState::InProgress {
            let Some(item) = sim
                .world
                .get_mut(id)
                .and_then(|e| e.production.as_mut())
                .and_then(|p| p.item.as_mut())
            else {
                continue;
            };
            item.progress += multiplier;
            if item.progress < Fixed::from_num(item.build_time) {
                continue;
            }
            item.state = if item.is_building {
                BuildState::ReadyToPlace
            } else {
                BuildState::Held
            };
            let type_name = item.type_name.clone();
            let held = item.state == BuildState::Held;
            sim.emit(SimEvent::ProductionComplete { factory: id, type_name });
            if !held {
                continue;
            }
        } else if state != BuildState::Held {
            continue;
        }

        if is_primary {
            deliver(sim, id, owner);
        }
    }
}

/// Roll a held unit out of its factory if an exit cell is free.
fn deliver(sim: &mut Simulation, factory: EntityId, owner: HouseId) {
    let Some(entity) = sim.world.get(factory) else {
        return;
    };
    let (Some(footprint), Some(item)) = (
        entity.building,
        entity.production.as_ref().and_then(|p| p.item.as_ref()),
    ) else {
        return;
    };
    let type_name = item.type_name.clone();
    let locomotion = sim
        .rules
        .unit(&type_name)
        .map_or(Locomotion::Foot, |u| u.locomotion);
    let Some(cell) = exit_cell(sim, &footprint, locomotion) else {
        return;
    };
    if place_unit(sim, &type_name, owner, cell, Some(factory)).is_some() {
        if let Some(production) = sim.world.get_mut(factory).and_then(|e| e.production.as_mut()) {
            production.item = None;
        }
    }
}

/// Point each house's primary at a living owned factory of the right line,
/// falling back to the lowest id, or drop it when none remain.
pub(crate) fn reassign_primaries(sim: &mut Simulation) {
    let houses: Vec<HouseId> = sim.houses.keys().copied().collect();
    for house in houses {
        for kind in FACTORY_KINDS {
            let current = sim.houses.get(&house).and_then(|h| h.primary.get(&kind).copied());
            let valid = current.is_some_and(|id| {
                sim.world.get(id).is_some_and(|e| {
                    e.owner == Some(house) && e.production.as_ref().is_some_and(|p| p.kind == kind)
                })
            });
            if valid {
                continue;
            }
            let successor = sim
                .world
                .iter()
                .find(|e| {
                    e.owner == Some(house) && e.production.as_ref().is_some_and(|p| p.kind == kind)
                })
                .map(|e| e.id);
            if successor == current {
                continue;
            }
            if let Some(ledger) = sim.houses.get_mut(&house) {
                match successor {
                    Some(id) => ledger.primary.insert(kind, id),
                    None => ledger.primary.remove(&kind),
                };
            }
            sim.emit(SimEvent::PrimaryChanged {
                house,
                kind,
                factory: successor,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::config::SimConfig;
    use crate::data::{BuildingData, HarvesterStats, Rules};

    fn rules() -> Rules {
        let mut rules = Rules::default();
        rules.add_unit(UnitData {
            cost: 100,
            build_time: 10,
            prerequisites: vec!["barracks".to_string()],
            ..UnitData::basic("rifle", UnitClass::Infantry, Locomotion::Foot)
        });
        rules.add_unit(UnitData {
            harvester: Some(HarvesterStats { capacity: 500, rate: 5 }),
            ..UnitData::basic("harvester", UnitClass::Vehicle, Locomotion::Track)
        });
        rules.add_unit(UnitData {
            build_limit: Some(1),
            ..UnitData::basic("hero", UnitClass::Infantry, Locomotion::Foot)
        });
        rules.add_building(BuildingData {
            factory: Some(FactoryKind::Infantry),
            ..BuildingData::basic("barracks", (2, 2))
        });
        rules.add_building(BuildingData {
            refinery: true,
            free_unit: Some("harvester".to_string()),
            ..BuildingData::basic("refinery", (3, 2))
        });
        rules.add_building(BuildingData {
            power: 100,
            ..BuildingData::basic("power_plant", (2, 2))
        });
        rules.add_building(BuildingData {
            power: -150,
            ..BuildingData::basic("radar", (2, 2))
        });
        rules
    }

    fn sim() -> Simulation {
        let mut sim = Simulation::new(32, 32, SimConfig::default(), Arc::new(rules()));
        sim.add_house(HouseId(0), 1000);
        sim.add_house(HouseId(1), 1000);
        sim
    }

    fn primary(sim: &Simulation, house: u8) -> Option<EntityId> {
        sim.house(HouseId(house))
            .and_then(|h| h.primary.get(&FactoryKind::Infantry).copied())
    }

    #[test]
    fn test_exit_order_is_clockwise_from_east() {
        let footprint = Building::new(CellCoord::new(4, 4), (2, 2));
        let cells = exit_cells(&footprint);
        assert_eq!(cells.len(), 12);
        assert_eq!(cells[0], CellCoord::new(6, 4));
        assert_eq!(cells[1], CellCoord::new(6, 5));
        assert_eq!(cells[2], CellCoord::new(6, 6));
        assert_eq!(cells[5], CellCoord::new(3, 6));
        assert_eq!(cells[6], CellCoord::new(3, 5));
        assert_eq!(cells[11], CellCoord::new(6, 3));
    }

    #[test]
    fn test_build_and_deliver_from_primary() {
        let mut sim = sim();
        let barracks = sim.spawn_building("barracks", HouseId(0), CellCoord::new(4, 4)).unwrap();
        assert_eq!(primary(&sim, 0), Some(barracks));

        let factory = queue_build(&mut sim, HouseId(0), "rifle", None).unwrap();
        assert_eq!(factory, barracks);
        assert_eq!(sim.house(HouseId(0)).unwrap().credits, 900);

        sim.run(10);
        let spawned: Vec<EntityId> = sim
            .world()
            .iter()
            .filter(|e| e.type_name == "rifle")
            .map(|e| e.id)
            .collect();
        assert_eq!(spawned.len(), 1);
        let rifle = sim.entity(spawned[0]).unwrap();
        assert_eq!(rifle.transform.cell(), CellCoord::new(6, 4));
        assert!(sim.entity(barracks).unwrap().production.as_ref().unwrap().item.is_none());
    }

    #[test]
    fn test_non_primary_holds_until_promoted() {
        let mut sim = sim();
        let first = sim.spawn_building("barracks", HouseId(0), CellCoord::new(4, 4)).unwrap();
        let second = sim.spawn_building("barracks", HouseId(0), CellCoord::new(12, 4)).unwrap();
        queue_build(&mut sim, HouseId(0), "rifle", Some(second)).unwrap();
        sim.run(15);

        let item = sim.entity(second).unwrap().production.clone().unwrap().item.unwrap();
        assert_eq!(item.state, BuildState::Held);
        assert_eq!(primary(&sim, 0), Some(first));

        set_primary(&mut sim, HouseId(0), second).unwrap();
        sim.tick();
        assert!(sim.entity(second).unwrap().production.as_ref().unwrap().item.is_none());
    }

    #[test]
    fn test_primary_reassigned_on_loss() {
        let mut sim = sim();
        let first = sim.spawn_building("barracks", HouseId(0), CellCoord::new(4, 4)).unwrap();
        let second = sim.spawn_building("barracks", HouseId(0), CellCoord::new(12, 4)).unwrap();
        let third = sim.spawn_building("barracks", HouseId(0), CellCoord::new(20, 4)).unwrap();
        assert_eq!(primary(&sim, 0), Some(first));

        crate::combat::kill(&mut sim, first, None);
        let events = sim.tick().to_vec();
        assert_eq!(primary(&sim, 0), Some(second));
        assert!(events.contains(&SimEvent::PrimaryChanged {
            house: HouseId(0),
            kind: FactoryKind::Infantry,
            factory: Some(second),
        }));

        // A captured primary counts as lost too.
        sim.world.get_mut(second).unwrap().owner = Some(HouseId(1));
        sim.tick();
        assert_eq!(primary(&sim, 0), Some(third));
        assert_eq!(primary(&sim, 1), Some(second));

        crate::combat::kill(&mut sim, third, None);
        sim.tick();
        assert_eq!(primary(&sim, 0), None);
    }

    #[test]
    fn test_queue_rejections() {
        let mut sim = sim();
        assert_eq!(
            queue_build(&mut sim, HouseId(0), "rifle", None),
            Err(OrderError::MissingPrerequisite("barracks".to_string()))
        );
        assert_eq!(
            queue_build(&mut sim, HouseId(0), "tank", None),
            Err(OrderError::UnknownType("tank".to_string()))
        );
        let barracks = sim.spawn_building("barracks", HouseId(0), CellCoord::new(4, 4)).unwrap();
        sim.houses.get_mut(&HouseId(0)).unwrap().credits = 50;
        assert_eq!(
            queue_build(&mut sim, HouseId(0), "rifle", None),
            Err(OrderError::InsufficientCredits { required: 100, available: 50 })
        );

        sim.houses.get_mut(&HouseId(0)).unwrap().credits = 1000;
        queue_build(&mut sim, HouseId(0), "rifle", None).unwrap();
        assert_eq!(
            queue_build(&mut sim, HouseId(0), "rifle", Some(barracks)),
            Err(OrderError::FactoryBusy(barracks))
        );
        assert_eq!(
            queue_build(&mut sim, HouseId(1), "hero", Some(barracks)),
            Err(OrderError::NotOwned(barracks))
        );
    }

    #[test]
    fn test_build_limit_counts_queue() {
        let mut sim = sim();
        sim.spawn_building("barracks", HouseId(0), CellCoord::new(4, 4)).unwrap();
        sim.spawn_building("barracks", HouseId(0), CellCoord::new(12, 4)).unwrap();
        queue_build(&mut sim, HouseId(0), "hero", None).unwrap();
        assert_eq!(
            queue_build(&mut sim, HouseId(0), "hero", None),
            Err(OrderError::BuildLimit("hero".to_string()))
        );
    }

    #[test]
    fn test_cancel_refunds_unspent_share() {
        let mut sim = sim();
        let barracks = sim.spawn_building("barracks", HouseId(0), CellCoord::new(4, 4)).unwrap();
        queue_build(&mut sim, HouseId(0), "rifle", None).unwrap();
        sim.run(4);
        assert_eq!(cancel_build(&mut sim, HouseId(0), barracks), Ok(60));
        assert_eq!(sim.house(HouseId(0)).unwrap().credits, 960);
        assert_eq!(
            cancel_build(&mut sim, HouseId(0), barracks),
            Err(OrderError::NothingReady(barracks))
        );
    }

    #[test]
    fn test_low_power_slows_production() {
        let mut sim = sim();
        sim.spawn_building("power_plant", HouseId(0), CellCoord::new(20, 20)).unwrap();
        sim.spawn_building("radar", HouseId(0), CellCoord::new(24, 20)).unwrap();
        let barracks = sim.spawn_building("barracks", HouseId(0), CellCoord::new(4, 4)).unwrap();
        queue_build(&mut sim, HouseId(0), "rifle", None).unwrap();
        sim.run(10);

        let item = sim.entity(barracks).unwrap().production.clone().unwrap().item.unwrap();
        assert_eq!(item.progress, Fixed::from_num(5));
        assert_eq!(item.percent(), 50);
    }

    #[test]
    fn test_refinery_grants_harvester() {
        let mut sim = sim();
        let refinery = sim.spawn_building("refinery", HouseId(0), CellCoord::new(4, 4)).unwrap();
        let harvester = sim
            .world()
            .iter()
            .find(|e| e.harvester.is_some())
            .map(|e| e.id)
            .unwrap();
        let unit = sim.entity(harvester).unwrap();
        assert_eq!(unit.transform.cell(), CellCoord::new(7, 4));
        assert_eq!(unit.mission.as_ref().unwrap().kind, MissionKind::Harvest);
        assert!(sim
            .events()
            .contains(&SimEvent::UnitSpawned { entity: harvester, factory: Some(refinery) }));
    }
}
