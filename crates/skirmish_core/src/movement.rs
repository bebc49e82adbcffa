//! Path following and ground occupancy.
//!
//! [`move_to`] plans a route with A* and hands it to the unit's [`Mobile`]
//! component; [`movement_system`] walks every moving unit one tick along
//! its path. Infantry standing in resource fields take periodic damage here
//! as well.

use tracing::debug;

use crate::combat;
use crate::components::Mobile;
use crate::grid::CellCoord;
use crate::math::{facing_from_vector, Vec2Fixed};
use crate::pathfinding::find_path;
use crate::simulation::Simulation;
use crate::world::EntityId;

/// Plan a path for `id` to the cell containing `destination` and start
/// following it.
///
/// An impassable destination snaps to the nearest passable cell within the
/// configured ring radius. Returns `false` when the unit cannot move, the
/// destination is off the map, or no route exists within the search bound;
/// the current path is left untouched in that case.
pub fn move_to(sim: &mut Simulation, id: EntityId, destination: Vec2Fixed) -> bool {
    let cfg = sim.config;
    let Some(entity) = sim.world.get(id) else {
        return false;
    };
    if entity.is_transported() {
        return false;
    }
    let Some(locomotion) = entity.mobile.as_ref().map(|m| m.locomotion) else {
        return false;
    };
    let start = entity.transform.cell();

    let requested = CellCoord::from_position(destination);
    if !sim.grid.in_bounds(requested) {
        return false;
    }
    let Some(goal) = sim
        .grid
        .nearest_passable(requested, locomotion, cfg.nearest_passable_radius)
    else {
        debug!(entity = %id, cell = %requested, "No passable cell near destination");
        return false;
    };

    match find_path(&sim.grid, start, goal, locomotion, cfg.path_search_limit) {
        Ok(path) => {
            if let Some(mobile) = sim.world.get_mut(id).and_then(|e| e.mobile.as_mut()) {
                mobile.set_path(path);
            }
            true
        }
        Err(error) => {
            debug!(entity = %id, from = %start, to = %goal, %error, "Path search failed");
            false
        }
    }
}

/// Stop a unit where it stands.
pub(crate) fn stop(sim: &mut Simulation, id: EntityId) {
    if let Some(mobile) = sim.world.get_mut(id).and_then(|e| e.mobile.as_mut()) {
        mobile.clear_path();
    }
}

/// Whether a unit is following a path.
pub(crate) fn is_moving(sim: &Simulation, id: EntityId) -> bool {
    sim.world
        .get(id)
        .and_then(|e| e.mobile.as_ref())
        .is_some_and(Mobile::is_moving)
}

/// Advance every moving unit one tick, apply field damage, then refresh
/// occupancy.
pub(crate) fn movement_system(sim: &mut Simulation) {
    for id in sim.world.ids() {
        step_unit(sim, id);
    }
    field_damage(sim);
    refresh_occupancy(sim);
}

fn step_unit(sim: &mut Simulation, id: EntityId) {
    let Some(entity) = sim.world.get(id) else {
        return;
    };
    if entity.is_transported() {
        return;
    }
    // Aircraft only travel at cruising altitude.
    if entity
        .aircraft
        .is_some_and(|a| a.phase != crate::components::FlightPhase::Flying)
    {
        return;
    }
    let Some(mobile) = entity.mobile.as_ref() else {
        return;
    };
    let Some(next) = mobile.next_node() else {
        return;
    };

    if !sim.grid.is_passable(next, mobile.locomotion) {
        // The way ahead closed since planning; try once to route around.
        let rerouted = mobile
            .destination()
            .is_some_and(|goal| move_to(sim, id, goal.center()));
        if !rerouted {
            stop(sim, id);
        }
        return;
    }

    let Some(entity) = sim.world.get_mut(id) else {
        return;
    };
    let Some(mobile) = entity.mobile.as_mut() else {
        return;
    };
    let target = next.center();
    let position = entity.transform.position;
    let delta = target - position;
    let distance = delta.length();
    let step = mobile.step_distance();

    if distance <= step {
        entity.transform.position = target;
        mobile.advance();
    } else {
        entity.transform.position = position + delta.scale(step / distance);
    }
    if let Some(facing) = facing_from_vector(delta) {
        entity.transform.facing = facing;
    }
}

/// Recount ground units per cell.
pub(crate) fn refresh_occupancy(sim: &mut Simulation) {
    sim.grid.clear_units();
    let cells: Vec<CellCoord> = sim
        .world
        .iter()
        .filter(|e| e.occupies_ground())
        .map(|e| e.transform.cell())
        .collect();
    for cell in cells {
        sim.grid.add_unit(cell);
    }
}

/// Infantry in resource fields lose health on a fixed cadence. Death here
/// is immediate rather than deferred to cleanup.
fn field_damage(sim: &mut Simulation) {
    let cfg = sim.config;
    if cfg.field_damage_interval == 0 || sim.tick % cfg.field_damage_interval != 0 {
        return;
    }

    for id in sim.world.ids() {
        let Some(entity) = sim.world.get(id) else {
            continue;
        };
        let exposed = entity
            .infantry
            .is_some_and(|inf| !inf.field_immune)
            && entity.occupies_ground()
            && sim.grid.field_level(entity.transform.cell()).is_some();
        if !exposed {
            continue;
        }

        let Some(health) = sim.world.get_mut(id).and_then(|e| e.health.as_mut()) else {
            continue;
        };
        let amount = health.hp.min(cfg.field_damage);
        let destroyed = health.apply_damage(cfg.field_damage);
        sim.emit(crate::events::SimEvent::Damaged {
            target: id,
            amount,
            attacker: None,
        });
        if destroyed {
            combat::destroy_immediately(sim, id);
        }
    }
}
