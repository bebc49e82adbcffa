//! Transports: boarding, unloading, and ejection on death.
//!
//! A passenger keeps its entity slot while aboard but carries
//! `transported_by`, which hides it from targeting, movement, missions,
//! and ground occupancy until it leaves.

use crate::components::MissionKind;
use crate::events::SimEvent;
use crate::grid::{CellCoord, Locomotion};
use crate::mission;
use crate::movement;
use crate::simulation::Simulation;
use crate::world::EntityId;

/// Furthest ring searched for a landing cell when a transport is destroyed.
const EJECT_RADIUS: i32 = 3;

/// Move `passenger` out of its transport onto `cell`.
fn disembark(sim: &mut Simulation, transport: EntityId, passenger: EntityId, cell: CellCoord) {
    if let Some(cargo) = sim.world.get_mut(transport).and_then(|e| e.cargo.as_mut()) {
        cargo.passengers.retain(|&p| p != passenger);
    }
    let Some(entity) = sim.world.get_mut(passenger) else {
        return;
    };
    entity.transported_by = None;
    entity.transform.position = cell.center();
    sim.grid.add_unit(cell);
    sim.emit(SimEvent::Unloaded {
        transport,
        passenger,
    });
    mission::set_mission(sim, passenger, MissionKind::Guard, None);
}

fn locomotion_of(sim: &Simulation, id: EntityId) -> Locomotion {
    sim.world
        .get(id)
        .and_then(|e| e.mobile.as_ref())
        .map_or(Locomotion::Foot, |m| m.locomotion)
}

/// Throw every passenger out of a dying transport.
///
/// Each lands on the nearest free cell within a few rings and keeps half its
/// current health, rounded up. Passengers with nowhere to go die with the
/// transport.
pub(crate) fn eject_all(sim: &mut Simulation, transport: EntityId) {
    let Some(entity) = sim.world.get(transport) else {
        return;
    };
    let Some(cargo) = entity.cargo.as_ref() else {
        return;
    };
    let passengers = cargo.passengers.clone();
    let origin = entity.transform.cell();
    let mut taken: Vec<CellCoord> = Vec::new();

    for passenger in passengers {
        let locomotion = locomotion_of(sim, passenger);
        let landing = (0..=EJECT_RADIUS).find_map(|radius| {
            sim.grid
                .ring(origin, radius)
                .into_iter()
                .find(|c| sim.grid.is_free(*c, locomotion) && !taken.contains(c))
        });

        if let Some(health) = sim.world.get_mut(passenger).and_then(|e| e.health.as_mut()) {
            health.hp -= health.hp / 2;
        }

        match landing {
            Some(cell) => {
                taken.push(cell);
                disembark(sim, transport, passenger, cell);
            }
            None => {
                if let Some(cargo) = sim.world.get_mut(transport).and_then(|e| e.cargo.as_mut()) {
                    cargo.passengers.retain(|&p| p != passenger);
                }
                crate::combat::kill(sim, passenger, None);
            }
        }
    }
}

/// Enter mission: walk up to the transport and climb in.
///
/// Returns the delay until the next check.
pub(crate) fn enter(sim: &mut Simulation, id: EntityId, transport: Option<EntityId>) -> u32 {
    let scan = sim.config.guard_scan_interval;
    let Some(transport) = sim.world.resolve(transport) else {
        mission::set_mission(sim, id, MissionKind::Guard, None);
        return 0;
    };
    let (Some(unit), Some(carrier)) = (sim.world.get(id), sim.world.get(transport)) else {
        return scan;
    };
    let open = carrier.owner == unit.owner
        && carrier.cargo.as_ref().is_some_and(|c| c.has_room())
        && !carrier.is_airborne()
        && transport != id;
    if !open {
        mission::set_mission(sim, id, MissionKind::Guard, None);
        return 0;
    }

    let here = unit.transform.cell();
    let there = carrier.transform.cell();
    if here.chebyshev(there) > 1 {
        if !movement::is_moving(sim, id) {
            movement::move_to(sim, id, there.center());
        }
        return scan;
    }

    movement::stop(sim, id);
    if let Some(cargo) = sim.world.get_mut(transport).and_then(|e| e.cargo.as_mut()) {
        cargo.passengers.push(id);
    }
    if let Some(entity) = sim.world.get_mut(id) {
        entity.transported_by = Some(transport);
        entity.transform.position = there.center();
        if let Some(combat) = entity.combat.as_mut() {
            combat.target = None;
        }
    }
    mission::set_mission(sim, id, MissionKind::Sleep, None);
    sim.emit(SimEvent::Boarded {
        transport,
        passenger: id,
    });
    scan
}

/// Unload mission: drop one passenger per `unload_delay` ticks onto a
/// randomly chosen free neighbour.
pub(crate) fn unload(sim: &mut Simulation, id: EntityId) -> u32 {
    let delay = sim.config.unload_delay;
    let Some(entity) = sim.world.get(id) else {
        return delay;
    };
    if entity.is_airborne() {
        return 1;
    }
    let Some(&passenger) = entity.cargo.as_ref().and_then(|c| c.passengers.first()) else {
        mission::set_mission(sim, id, MissionKind::Guard, None);
        return 0;
    };
    let origin = entity.transform.cell();
    movement::stop(sim, id);

    let locomotion = locomotion_of(sim, passenger);
    let mut exits: Vec<CellCoord> = sim
        .grid
        .neighbours(origin)
        .filter(|c| sim.grid.is_free(*c, locomotion))
        .collect();
    sim.rng.shuffle(&mut exits);

    if let Some(&cell) = exits.first() {
        disembark(sim, id, passenger, cell);
    }
    delay
}
