//! Secondary per-tick systems: cloaking, flight, and building repair.

use tracing::debug;

use crate::components::{Aircraft, CloakPhase, FlightPhase, MissionKind};
use crate::config::SimConfig;
use crate::grid::CellCoord;
use crate::house::HouseId;
use crate::mission::set_mission;
use crate::movement::{self, is_moving};
use crate::simulation::Simulation;
use crate::world::EntityId;

// ============================================================================
// Cloak
// ============================================================================

/// Cloak units that have nothing to shoot at and drop the cloak for those
/// that do. Each transition takes `cloak_ticks`.
pub(crate) fn cloak_system(sim: &mut Simulation) {
    let ticks = sim.config.cloak_ticks;
    for id in sim.world.ids() {
        let Some(entity) = sim.world.get_mut(id) else {
            continue;
        };
        let engaging = entity.combat.as_ref().is_some_and(|c| c.target.is_some());
        let Some(cloak) = entity.cloak.as_mut() else {
            continue;
        };
        cloak.timer = cloak.timer.saturating_sub(1);
        cloak.phase = match (cloak.phase, engaging) {
            (CloakPhase::Uncloaked, false) => {
                cloak.timer = ticks;
                CloakPhase::Cloaking
            }
            (CloakPhase::Cloaking | CloakPhase::Cloaked, true) => {
                cloak.timer = ticks;
                CloakPhase::Decloaking
            }
            (CloakPhase::Cloaking, false) if cloak.timer == 0 => CloakPhase::Cloaked,
            (CloakPhase::Decloaking, _) if cloak.timer == 0 => CloakPhase::Uncloaked,
            (phase, _) => phase,
        };
    }
}

// ============================================================================
// Aircraft
// ============================================================================

/// Whether `pad` is a living landing pad owned by `owner`.
fn is_pad(sim: &Simulation, pad: EntityId, owner: Option<HouseId>) -> bool {
    sim.world.get(pad).is_some_and(|e| {
        e.owner == owner
            && sim
                .rules
                .building(&e.type_name)
                .is_some_and(|b| b.landing_pad)
    })
}

/// Take off when given somewhere to go, land when idle, and restore ammo
/// while parked on a pad.
pub(crate) fn aircraft_system(sim: &mut Simulation) {
    let cfg = sim.config;
    for id in sim.world.ids() {
        let moving = is_moving(sim, id);
        let Some(entity) = sim.world.get(id) else {
            continue;
        };
        let Some(aircraft) = entity.aircraft else {
            continue;
        };
        let owner = entity.owner;
        let cell = entity.transform.cell();
        let engaging = entity.combat.as_ref().is_some_and(|c| c.target.is_some());
        let empty = entity
            .combat
            .as_ref()
            .is_some_and(|c| c.max_ammo > 0 && c.ammo == 0);
        let returning = entity
            .mission
            .as_ref()
            .is_some_and(|m| m.kind == MissionKind::Return);
        let on_pad = sim
            .grid
            .building_at(cell)
            .is_some_and(|pad| is_pad(sim, pad, owner));

        let Some(entity) = sim.world.get_mut(id) else {
            continue;
        };
        let Some(state) = entity.aircraft.as_mut() else {
            continue;
        };
        match aircraft.phase {
            FlightPhase::Landed | FlightPhase::Landing if moving => climb(state, &cfg),
            FlightPhase::TakingOff => climb(state, &cfg),
            FlightPhase::Landed => {
                let rearming = on_pad
                    && entity
                        .combat
                        .as_ref()
                        .is_some_and(|c| c.max_ammo > 0 && c.ammo < c.max_ammo);
                if rearming {
                    state.rearm_timer = state.rearm_timer.saturating_sub(1);
                    if state.rearm_timer == 0 {
                        state.rearm_timer = cfg.aircraft_rearm_ticks;
                        if let Some(combat) = entity.combat.as_mut() {
                            combat.ammo += 1;
                        }
                    }
                }
            }
            FlightPhase::Flying => {
                if !moving && !engaging {
                    state.phase = FlightPhase::Landing;
                }
            }
            FlightPhase::Landing => {
                state.altitude = (state.altitude - cfg.climb_rate).max(0);
                if state.altitude == 0 {
                    state.phase = FlightPhase::Landed;
                    state.rearm_timer = cfg.aircraft_rearm_ticks;
                }
            }
        }

        if empty && !returning && nearest_pad(sim, id).is_some() {
            debug!(entity = %id, "Out of ammo, heading home");
            set_mission(sim, id, MissionKind::Return, None);
        }
    }
}

fn climb(state: &mut Aircraft, cfg: &SimConfig) {
    state.altitude = (state.altitude + cfg.climb_rate).min(cfg.flight_altitude);
    state.phase = if state.altitude >= cfg.flight_altitude {
        FlightPhase::Flying
    } else {
        FlightPhase::TakingOff
    };
}

/// Nearest owned landing pad, by squared distance to its center.
fn nearest_pad(sim: &Simulation, id: EntityId) -> Option<EntityId> {
    let entity = sim.world.get(id)?;
    let position = entity.transform.position;
    sim.world
        .iter()
        .filter(|e| is_pad(sim, e.id, entity.owner))
        .filter_map(|e| e.building.map(|b| (e.id, b.center().distance_squared(position))))
        .min_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(&b.0)))
        .map(|(pad, _)| pad)
}

/// `Return` for aircraft: fly to the home pad and stay until rearmed.
///
/// Picks the nearest pad when the home pad is gone; with none left the
/// aircraft guards where it is.
pub(crate) fn return_to_pad(sim: &mut Simulation, id: EntityId) -> u32 {
    let scan = sim.config.guard_scan_interval;
    let Some(entity) = sim.world.get(id) else {
        return scan;
    };
    let home = entity.aircraft.and_then(|a| a.pad);
    let pad = match home.filter(|&p| is_pad(sim, p, entity.owner)) {
        Some(pad) => Some(pad),
        None => nearest_pad(sim, id),
    };
    let Some(pad) = pad else {
        set_mission(sim, id, MissionKind::Guard, None);
        return scan;
    };
    if let Some(aircraft) = sim.world.get_mut(id).and_then(|e| e.aircraft.as_mut()) {
        aircraft.pad = Some(pad);
    }

    let Some(footprint) = sim.world.get(pad).and_then(|e| e.building) else {
        return scan;
    };
    let Some(entity) = sim.world.get(id) else {
        return scan;
    };
    let cell = entity.transform.cell();
    let landed = entity
        .aircraft
        .is_some_and(|a| a.phase == FlightPhase::Landed);
    let full = entity
        .combat
        .as_ref()
        .map_or(true, |c| c.max_ammo < 0 || c.ammo >= c.max_ammo);

    if footprint.contains(cell) {
        if landed && full {
            set_mission(sim, id, MissionKind::Guard, None);
        }
        return scan;
    }
    let target: CellCoord = footprint.origin;
    let heading_home = sim
        .world
        .get(id)
        .and_then(|e| e.mobile.as_ref())
        .and_then(|m| m.destination())
        .is_some_and(|goal| goal == target);
    if !heading_home {
        movement::move_to(sim, id, target.center());
    }
    scan
}

// ============================================================================
// Repair
// ============================================================================

/// Heal buildings flagged for repair, paying per step. Repair switches off
/// at full health or when the owner cannot pay.
pub(crate) fn repair_system(sim: &mut Simulation) {
    let cfg = sim.config;
    for id in sim.world.ids() {
        let Some(entity) = sim.world.get_mut(id) else {
            continue;
        };
        let owner = entity.owner;
        let (Some(building), Some(health)) = (entity.building.as_mut(), entity.health.as_mut())
        else {
            continue;
        };
        if !building.repairing {
            continue;
        }
        if !health.is_damaged() {
            building.repairing = false;
            continue;
        }
        building.repair_timer = building.repair_timer.saturating_sub(1);
        if building.repair_timer > 0 {
            continue;
        }

        let paid = owner
            .and_then(|o| sim.houses.get_mut(&o))
            .is_some_and(|house| house.spend(cfg.repair_cost));
        if paid {
            health.heal(cfg.repair_step);
            building.repair_timer = cfg.repair_interval;
        } else {
            debug!(building = %id, "Repair stopped, out of credits");
            building.repairing = false;
        }
    }
}

/// Toggle repair on an owned, damaged building.
pub(crate) fn toggle_repair(sim: &mut Simulation, id: EntityId) {
    if let Some(building) = sim.world.get_mut(id).and_then(|e| e.building.as_mut()) {
        building.repairing = !building.repairing;
        building.repair_timer = 0;
    }
}
