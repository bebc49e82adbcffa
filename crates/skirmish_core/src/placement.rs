//! Building placement validation, placement orders, and unit deployment.
//!
//! A footprint is legal when every cell is on the map, on buildable
//! terrain, free of overlays, structures, and ground units, and the
//! footprint lies within the adjacency distance of a building the house
//! already owns. A house's first headquarters may be placed anywhere.

use std::sync::Arc;

use tracing::debug;

use crate::components::{BuildState, Building};
use crate::data::BuildingData;
use crate::error::{OrderError, PlacementError};
use crate::grid::{CellCoord, Overlay};
use crate::house::HouseId;
use crate::production::{check_build_limit, owned_factory, spawn_building};
use crate::simulation::Simulation;
use crate::world::EntityId;

// ============================================================================
// Validation
// ============================================================================

/// Check whether `type_name` can be placed with its top-left corner at
/// `origin`.
///
/// `ignore` names a unit that will vacate the footprint, such as a vehicle
/// deploying in place.
///
/// # Errors
///
/// Returns [`OrderError::UnknownType`] for undefined structures, otherwise
/// the first placement rule the footprint breaks.
pub fn check_placement(
    sim: &Simulation,
    house: HouseId,
    type_name: &str,
    origin: CellCoord,
    ignore: Option<EntityId>,
) -> Result<(), OrderError> {
    let data = sim
        .rules
        .building(type_name)
        .ok_or_else(|| OrderError::UnknownType(type_name.to_string()))?;
    check_footprint(sim, house, data, origin, ignore)?;
    Ok(())
}

fn check_footprint(
    sim: &Simulation,
    house: HouseId,
    data: &BuildingData,
    origin: CellCoord,
    ignore: Option<EntityId>,
) -> Result<(), PlacementError> {
    let footprint = Building::new(origin, data.footprint);

    for cell in footprint.cells() {
        let Some(c) = sim.grid.cell(cell) else {
            return Err(PlacementError::OutOfBounds);
        };
        if !c.terrain.buildable() {
            return Err(PlacementError::Terrain);
        }
        if c.overlay != Overlay::None {
            return Err(PlacementError::Overlay);
        }
        if c.building.is_some() {
            return Err(PlacementError::Building);
        }
    }

    let blocked = sim.world.iter().any(|e| {
        Some(e.id) != ignore && e.occupies_ground() && footprint.contains(e.transform.cell())
    });
    if blocked {
        return Err(PlacementError::Unit);
    }

    let first_hq = data.hq && sim.houses.get(&house).is_some_and(|h| !h.hq_deployed);
    if first_hq {
        return Ok(());
    }
    let reach = sim.config.adjacency_distance;
    let adjacent = sim
        .world
        .iter()
        .filter(|e| e.owner == Some(house))
        .filter_map(|e| e.building)
        .any(|b| footprint_gap(&b, &footprint) <= reach);
    if adjacent {
        Ok(())
    } else {
        Err(PlacementError::NotAdjacent)
    }
}

/// Chebyshev gap between two footprints; 0 when they overlap.
fn footprint_gap(a: &Building, b: &Building) -> i32 {
    b.cells().map(|cell| a.gap_to(cell)).min().unwrap_or(i32::MAX)
}

// ============================================================================
// Orders
// ============================================================================

/// Put a finished structure on the map and free its factory.
///
/// # Errors
///
/// Fails when the factory is not ours, has nothing ready, the type is
/// capped, or the footprint is illegal.
pub fn place_building(
    sim: &mut Simulation,
    house: HouseId,
    factory: EntityId,
    origin: CellCoord,
) -> Result<EntityId, OrderError> {
    let item = owned_factory(sim, house, factory)?
        .item
        .clone()
        .filter(|item| item.state == BuildState::ReadyToPlace)
        .ok_or(OrderError::NothingReady(factory))?;

    let limit = sim.rules.building(&item.type_name).and_then(|b| b.build_limit);
    if let Some(limit) = limit {
        let placed = sim
            .world
            .iter()
            .filter(|e| e.owner == Some(house) && e.type_name == item.type_name)
            .count();
        if placed >= limit as usize {
            return Err(OrderError::BuildLimit(item.type_name));
        }
    }
    check_placement(sim, house, &item.type_name, origin, None)?;

    let id = spawn_building(sim, &item.type_name, house, origin)
        .ok_or_else(|| OrderError::UnknownType(item.type_name.clone()))?;
    if let Some(production) = sim.world.get_mut(factory).and_then(|e| e.production.as_mut()) {
        production.item = None;
    }
    debug!(%house, %factory, building = %id, type_name = %item.type_name, "Placed structure");
    Ok(id)
}

/// Turn a deployable unit into its structure, centered on the unit's cell.
///
/// # Errors
///
/// Fails when the unit is not ours, cannot deploy, the structure is capped,
/// or the footprint is illegal.
pub fn deploy(sim: &mut Simulation, house: HouseId, unit: EntityId) -> Result<EntityId, OrderError> {
    let rules = Arc::clone(&sim.rules);
    let entity = sim.world.get(unit).ok_or(OrderError::UnknownEntity(unit))?;
    if entity.owner != Some(house) {
        return Err(OrderError::NotOwned(unit));
    }
    if entity.is_transported() {
        return Err(OrderError::Incapable { entity: unit, action: "deploy" });
    }
    let target = rules
        .unit(&entity.type_name)
        .and_then(|u| u.deploys_into.clone())
        .ok_or(OrderError::Incapable { entity: unit, action: "deploy" })?;
    let data = rules
        .building(&target)
        .ok_or_else(|| OrderError::UnknownType(target.clone()))?;

    let (w, h) = data.footprint;
    let origin = entity.transform.cell().offset(-(w / 2), -(h / 2));
    check_build_limit(sim, house, &target, data.build_limit)?;
    check_placement(sim, house, &target, origin, Some(unit))?;

    sim.world.mark_dead(unit);
    crate::movement::refresh_occupancy(sim);
    let id = spawn_building(sim, &target, house, origin)
        .ok_or_else(|| OrderError::UnknownType(target.clone()))?;
    debug!(%house, %unit, building = %id, "Deployed");
    Ok(id)
}
