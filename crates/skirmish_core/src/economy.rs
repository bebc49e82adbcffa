//! Harvester behavior: gathering from fields and unloading at refineries.
//!
//! Both handlers run every tick while active and return a zero delay;
//! multi-tick steps count down on the harvester's dock timer instead of the
//! mission timer so a new order can interrupt them at once.

use tracing::debug;

use crate::components::{Building, DockPhase, Harvester, MissionKind};
use crate::events::SimEvent;
use crate::grid::{CellCoord, Grid, Locomotion};
use crate::math::Fixed;
use crate::mission::set_mission;
use crate::movement;
use crate::production;
use crate::simulation::Simulation;
use crate::world::EntityId;

fn harvester_mut(sim: &mut Simulation, id: EntityId) -> Option<&mut Harvester> {
    sim.world.get_mut(id).and_then(|e| e.harvester.as_mut())
}

/// Release any refinery dock held by `id` and reset the docking phase.
pub(crate) fn leave_dock(sim: &mut Simulation, id: EntityId) {
    let Some(harvester) = harvester_mut(sim, id) else {
        return;
    };
    let refinery = harvester.refinery;
    harvester.reset_dock();
    if let Some(dock) = refinery
        .and_then(|r| sim.world.get_mut(r))
        .and_then(|e| e.building.as_mut())
    {
        if dock.dock_occupant == Some(id) {
            dock.dock_occupant = None;
        }
    }
}

/// Harvest mission.
///
/// On a field: take up to `rate` units, switching to Return the moment the
/// load is full. Off a field: drive to the nearest one found by ring
/// search, or go home with a partial load when there is none.
pub(crate) fn harvest(sim: &mut Simulation, id: EntityId) -> u32 {
    let cfg = sim.config;
    let Some(entity) = sim.world.get(id) else {
        return 0;
    };
    let Some(harvester) = entity.harvester else {
        set_mission(sim, id, MissionKind::Guard, None);
        return 0;
    };
    let locomotion = entity.mobile.as_ref().map_or(Locomotion::Track, |m| m.locomotion);
    let cell = entity.transform.cell();

    if harvester.is_full() {
        set_mission(sim, id, MissionKind::Return, None);
        return 0;
    }
    if movement::is_moving(sim, id) {
        return 0;
    }

    if sim.grid.field_level(cell).is_some() {
        let wanted = harvester.rate.min(harvester.space());
        let taken = sim.grid.harvest(cell, wanted, cfg.field_units_per_level);
        let full = harvester_mut(sim, id).is_some_and(|h| {
            h.add_load(taken);
            h.is_full()
        });
        if full {
            set_mission(sim, id, MissionKind::Return, None);
        }
        return 0;
    }

    let field = (1..=cfg.harvest_search_radius).find_map(|radius| {
        sim.grid
            .ring(cell, radius)
            .into_iter()
            .find(|c| sim.grid.field_level(*c).is_some() && sim.grid.is_passable(*c, locomotion))
    });
    match field {
        Some(field) => {
            if movement::move_to(sim, id, field.center()) {
                0
            } else {
                cfg.guard_scan_interval
            }
        }
        None if harvester.load > 0 => {
            set_mission(sim, id, MissionKind::Return, None);
            0
        }
        None => cfg.guard_scan_interval,
    }
}

/// Cell a harvester drives to when docking at `refinery`.
///
/// That is the dock cell below the footprint, or the first on-map perimeter
/// cell when the footprint sits on the bottom edge.
pub(crate) fn dock_approach(grid: &Grid, refinery: &Building) -> CellCoord {
    let preferred = refinery.dock_cell();
    if grid.in_bounds(preferred) {
        return preferred;
    }
    production::exit_cells(refinery)
        .into_iter()
        .find(|cell| grid.in_bounds(*cell))
        .unwrap_or(preferred)
}

/// Refinery for `id`: unoccupied beats occupied, then nearest dock, then
/// lowest id. `skip` is left out of the running.
pub(crate) fn pick_refinery(
    sim: &Simulation,
    id: EntityId,
    skip: Option<EntityId>,
) -> Option<EntityId> {
    let unit = sim.world.get(id)?;
    let owner = unit.owner?;
    let position = unit.transform.position;

    let mut best: Option<(bool, Fixed, EntityId)> = None;
    for entity in sim.world.iter() {
        if entity.owner != Some(owner) || Some(entity.id) == skip {
            continue;
        }
        let Some(building) = entity.building else {
            continue;
        };
        if !sim.rules.building(&entity.type_name).is_some_and(|d| d.refinery) {
            continue;
        }
        let occupied = sim
            .world
            .resolve(building.dock_occupant)
            .is_some_and(|o| o != id);
        let distance = dock_approach(&sim.grid, &building)
            .center()
            .distance_squared(position);
        let key = (occupied, distance, entity.id);
        if best.map_or(true, |b| key < b) {
            best = Some(key);
        }
    }
    best.map(|(_, _, refinery)| refinery)
}

fn valid_refinery(sim: &Simulation, id: EntityId, refinery: Option<EntityId>) -> bool {
    let (Some(unit), Some(building)) = (
        sim.world.get(id),
        sim.world.resolve(refinery).and_then(|r| sim.world.get(r)),
    ) else {
        return false;
    };
    building.owner == unit.owner
        && building.building.is_some()
        && sim.rules.building(&building.type_name).is_some_and(|d| d.refinery)
}

/// Return mission: drive to a refinery, dock, turn the load into credits,
/// undock, and go back to harvesting.
pub(crate) fn return_to_refinery(sim: &mut Simulation, id: EntityId) -> u32 {
    let cfg = sim.config;
    let Some(harvester) = sim.world.get(id).and_then(|e| e.harvester) else {
        set_mission(sim, id, MissionKind::Guard, None);
        return 0;
    };

    let refinery = if valid_refinery(sim, id, harvester.refinery) {
        harvester.refinery
    } else {
        leave_dock(sim, id);
        let picked = pick_refinery(sim, id, None);
        if let Some(h) = harvester_mut(sim, id) {
            h.refinery = picked;
        }
        picked
    };
    let Some(refinery) = refinery else {
        debug!(entity = %id, "No refinery left; standing guard");
        set_mission(sim, id, MissionKind::Guard, None);
        return 0;
    };
    let Some(dock) = sim.world.get(refinery).and_then(|e| e.building) else {
        return 0;
    };
    let owner = sim.world.get(refinery).and_then(|e| e.owner);

    match harvester.dock {
        DockPhase::Approaching => {
            if harvester.load == 0 {
                set_mission(sim, id, MissionKind::Harvest, None);
                return 0;
            }
            let here = sim.world.get(id).map_or(CellCoord::default(), |e| e.transform.cell());
            let arrived = dock.gap_to(here) <= 1 && !movement::is_moving(sim, id);
            if !arrived {
                if movement::is_moving(sim, id) {
                    return 0;
                }
                let approach = dock_approach(&sim.grid, &dock);
                if movement::move_to(sim, id, approach.center()) {
                    return 0;
                }
                // Unreachable dock: try another refinery, else wait and retry.
                let other = pick_refinery(sim, id, Some(refinery));
                if let (Some(other), Some(h)) = (other, harvester_mut(sim, id)) {
                    h.refinery = Some(other);
                    return 0;
                }
                return cfg.guard_scan_interval;
            }
            let busy = sim
                .world
                .resolve(dock.dock_occupant)
                .is_some_and(|o| o != id);
            if busy {
                return cfg.guard_scan_interval;
            }
            if let Some(building) = sim.world.get_mut(refinery).and_then(|e| e.building.as_mut()) {
                building.dock_occupant = Some(id);
            }
            if let Some(h) = harvester_mut(sim, id) {
                h.dock = DockPhase::Docking;
                h.dock_timer = cfg.docking_ticks;
            }
        }
        DockPhase::Docking => {
            if let Some(h) = harvester_mut(sim, id) {
                if h.dock_timer > 0 {
                    h.dock_timer -= 1;
                } else {
                    h.dock = DockPhase::Unloading;
                }
            }
        }
        DockPhase::Unloading => {
            if harvester.dock_timer > 0 {
                if let Some(h) = harvester_mut(sim, id) {
                    h.dock_timer -= 1;
                }
                return 0;
            }
            let unloaded = harvester_mut(sim, id).map_or(0, |h| {
                let units = h.take_load(cfg.unload_step);
                h.dock_timer = cfg.unload_interval;
                if h.load == 0 {
                    h.dock = DockPhase::Undocking;
                    h.dock_timer = cfg.undocking_ticks;
                }
                units
            });
            if let Some(house) = owner.and_then(|o| sim.houses.get_mut(&o)) {
                let amount = house.deposit(unloaded * cfg.credits_per_unit);
                let house = house.id;
                sim.emit(SimEvent::CreditsDeposited { house, amount });
            }
        }
        DockPhase::Undocking => {
            if let Some(h) = harvester_mut(sim, id) {
                if h.dock_timer > 0 {
                    h.dock_timer -= 1;
                } else {
                    h.dock = DockPhase::Complete;
                }
            }
        }
        DockPhase::Complete => {
            set_mission(sim, id, MissionKind::Harvest, None);
        }
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::SimConfig;
    use crate::data::{BuildingData, HarvesterStats, Rules, UnitClass, UnitData};
    use crate::grid::Terrain;
    use crate::house::HouseId;

    fn rules() -> Rules {
        let mut rules = Rules::default();
        rules.add_unit(UnitData {
            harvester: Some(HarvesterStats {
                capacity: 500,
                rate: 5,
            }),
            ..UnitData::basic("harvester", UnitClass::Vehicle, Locomotion::Track)
        });
        rules.add_building(BuildingData {
            refinery: true,
            storage: 1000,
            ..BuildingData::basic("refinery", (2, 2))
        });
        rules
    }

    fn sim() -> Simulation {
        let mut sim = Simulation::new(24, 24, SimConfig::default(), Arc::new(rules()));
        sim.add_house(HouseId(0), 0);
        sim
    }

    fn mission_kind(sim: &Simulation, id: EntityId) -> MissionKind {
        sim.entity(id).unwrap().mission.as_ref().unwrap().kind
    }

    #[test]
    fn test_fills_in_one_hundred_ticks() {
        let mut sim = sim();
        sim.spawn_building("refinery", HouseId(0), CellCoord::new(2, 2)).unwrap();
        let cell = CellCoord::new(10, 10);
        sim.grid_mut().set_field(cell, 11);
        let harv = sim.spawn_unit("harvester", HouseId(0), cell).unwrap();
        sim.set_mission(harv, MissionKind::Harvest, None);

        sim.run(99);
        assert_eq!(sim.entity(harv).unwrap().harvester.unwrap().load, 495);
        assert_eq!(mission_kind(&sim, harv), MissionKind::Harvest);

        sim.run(1);
        assert_eq!(sim.entity(harv).unwrap().harvester.unwrap().load, 500);
        assert_eq!(mission_kind(&sim, harv), MissionKind::Return);
    }

    #[test]
    fn test_seeks_nearest_field() {
        let mut sim = sim();
        sim.grid_mut().set_field(CellCoord::new(9, 5), 3);
        sim.grid_mut().set_field(CellCoord::new(5, 8), 3);
        let harv = sim.spawn_unit("harvester", HouseId(0), CellCoord::new(5, 5)).unwrap();
        sim.set_mission(harv, MissionKind::Harvest, None);
        sim.tick();
        let dest = sim.entity(harv).unwrap().mobile.as_ref().unwrap().destination();
        assert_eq!(dest, Some(CellCoord::new(5, 8)));
    }

    #[test]
    fn test_unload_cycle_deposits_credits() {
        let mut sim = sim();
        let refinery = sim.spawn_building("refinery", HouseId(0), CellCoord::new(4, 4)).unwrap();
        let harv = sim.spawn_unit("harvester", HouseId(0), CellCoord::new(4, 6)).unwrap();
        sim.world.get_mut(harv).unwrap().harvester.as_mut().unwrap().load = 100;
        sim.set_mission(harv, MissionKind::Return, None);

        sim.run(5);
        let dock = sim.entity(refinery).unwrap().building.unwrap();
        assert_eq!(dock.dock_occupant, Some(harv));

        sim.run(55);
        let house = sim.house(HouseId(0)).unwrap();
        assert_eq!(house.credits, 200);
        assert_eq!(sim.entity(harv).unwrap().harvester.unwrap().load, 0);
        assert_eq!(mission_kind(&sim, harv), MissionKind::Harvest);
        assert_eq!(sim.entity(refinery).unwrap().building.unwrap().dock_occupant, None);
    }

    #[test]
    fn test_deposit_respects_storage() {
        let mut sim = sim();
        sim.spawn_building("refinery", HouseId(0), CellCoord::new(4, 4)).unwrap();
        sim.houses.get_mut(&HouseId(0)).unwrap().credits = 2950;
        let harv = sim.spawn_unit("harvester", HouseId(0), CellCoord::new(4, 6)).unwrap();
        sim.world.get_mut(harv).unwrap().harvester.as_mut().unwrap().load = 100;
        sim.set_mission(harv, MissionKind::Return, None);
        sim.run(60);

        // Base 2000 plus 1000 from the refinery.
        assert_eq!(sim.house(HouseId(0)).unwrap().credits, 3000);
        assert_eq!(sim.entity(harv).unwrap().harvester.unwrap().load, 0);
    }

    #[test]
    fn test_refinery_preference() {
        let mut sim = sim();
        let far = sim.spawn_building("refinery", HouseId(0), CellCoord::new(14, 4)).unwrap();
        let near = sim.spawn_building("refinery", HouseId(0), CellCoord::new(4, 4)).unwrap();
        let harv = sim.spawn_unit("harvester", HouseId(0), CellCoord::new(6, 8)).unwrap();
        let other = sim.spawn_unit("harvester", HouseId(0), CellCoord::new(4, 7)).unwrap();
        assert_eq!(pick_refinery(&sim, harv, None), Some(near));

        sim.world.get_mut(near).unwrap().building.as_mut().unwrap().dock_occupant = Some(other);
        assert_eq!(pick_refinery(&sim, harv, None), Some(far));
        assert_eq!(pick_refinery(&sim, other, None), Some(near));
    }

    #[test]
    fn test_refinery_on_bottom_edge_is_reachable() {
        let mut sim = sim();
        let refinery = sim.spawn_building("refinery", HouseId(0), CellCoord::new(10, 22)).unwrap();
        let dock = sim.entity(refinery).unwrap().building.unwrap();
        assert!(!sim.grid().in_bounds(dock.dock_cell()));
        assert_eq!(dock_approach(sim.grid(), &dock), CellCoord::new(12, 22));

        let harv = sim.spawn_unit("harvester", HouseId(0), CellCoord::new(3, 3)).unwrap();
        sim.world.get_mut(harv).unwrap().harvester.as_mut().unwrap().load = 100;
        sim.set_mission(harv, MissionKind::Return, None);
        sim.run(600);

        assert_eq!(sim.house(HouseId(0)).unwrap().credits, 200);
        assert_eq!(sim.entity(harv).unwrap().harvester.unwrap().load, 0);
    }

    #[test]
    fn test_unreachable_refinery_is_passed_over() {
        let mut sim = sim();
        for y in 0..24 {
            sim.grid_mut().set_terrain(CellCoord::new(12, y), Terrain::Rock);
        }
        let walled_off = sim.spawn_building("refinery", HouseId(0), CellCoord::new(8, 4)).unwrap();
        let reachable = sim.spawn_building("refinery", HouseId(0), CellCoord::new(20, 14)).unwrap();
        let harv = sim.spawn_unit("harvester", HouseId(0), CellCoord::new(14, 4)).unwrap();
        assert_eq!(pick_refinery(&sim, harv, None), Some(walled_off));

        sim.world.get_mut(harv).unwrap().harvester.as_mut().unwrap().load = 100;
        sim.set_mission(harv, MissionKind::Return, None);
        sim.run(2);
        assert_eq!(sim.entity(harv).unwrap().harvester.unwrap().refinery, Some(reachable));

        sim.run(600);
        assert_eq!(sim.house(HouseId(0)).unwrap().credits, 200);
    }

    #[test]
    fn test_no_refinery_falls_back_to_guard() {
        let mut sim = sim();
        let harv = sim.spawn_unit("harvester", HouseId(0), CellCoord::new(4, 6)).unwrap();
        sim.world.get_mut(harv).unwrap().harvester.as_mut().unwrap().load = 100;
        sim.set_mission(harv, MissionKind::Return, None);
        sim.tick();
        assert_eq!(mission_kind(&sim, harv), MissionKind::Guard);
    }
}
