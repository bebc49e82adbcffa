//! Unit AI.
//!
//! Every entity with a [`Mission`] runs one handler per tick, gated by the
//! mission timer. A handler does its work and returns how many ticks to
//! wait before it runs again; zero means next tick. Switching missions goes
//! through [`set_mission`] so entry effects happen exactly once.

use tracing::debug;

use crate::auxiliary;
use crate::cargo;
use crate::components::{Building, Mission, MissionKind};
use crate::economy;
use crate::events::SimEvent;
use crate::grid::CellCoord;
use crate::house::HouseId;
use crate::math::{Fixed, Vec2Fixed};
use crate::movement;
use crate::simulation::Simulation;
use crate::targeting;
use crate::world::EntityId;

/// Switch `id` to a new mission.
///
/// Re-issuing the current kind and target only resets the timer. A real
/// change clears the scratch state, emits [`SimEvent::MissionChanged`], and
/// runs the entry effects of the new kind.
pub fn set_mission(sim: &mut Simulation, id: EntityId, kind: MissionKind, target: Option<EntityId>) {
    let Some(mission) = sim.world.get_mut(id).and_then(|e| e.mission.as_mut()) else {
        return;
    };
    if mission.kind == kind && mission.target == target {
        mission.timer = 0;
        return;
    }
    *mission = Mission::new(kind, target);
    sim.emit(SimEvent::MissionChanged { entity: id, mission: kind });
    on_enter(sim, id, kind, target);
}

fn on_enter(sim: &mut Simulation, id: EntityId, kind: MissionKind, target: Option<EntityId>) {
    economy::leave_dock(sim, id);

    match kind {
        MissionKind::Sleep | MissionKind::Stop | MissionKind::Unload => {
            movement::stop(sim, id);
            set_combat_target(sim, id, None);
        }
        MissionKind::Attack => set_combat_target(sim, id, target),
        MissionKind::GuardArea => {
            if let Some(entity) = sim.world.get_mut(id) {
                let here = entity.transform.cell();
                if let Some(mission) = entity.mission.as_mut() {
                    mission.anchor = Some(here);
                }
            }
        }
        MissionKind::Ambush => movement::stop(sim, id),
        MissionKind::Guard
        | MissionKind::Move
        | MissionKind::Hunt
        | MissionKind::Retreat
        | MissionKind::Harvest
        | MissionKind::Return
        | MissionKind::Enter
        | MissionKind::Capture => {}
    }
}

fn set_combat_target(sim: &mut Simulation, id: EntityId, target: Option<EntityId>) {
    if let Some(combat) = sim.world.get_mut(id).and_then(|e| e.combat.as_mut()) {
        combat.target = target;
    }
}

fn combat_target(sim: &Simulation, id: EntityId) -> Option<EntityId> {
    let target = sim.world.get(id)?.combat.as_ref()?.target;
    sim.world.resolve(target)
}

fn mission_mut(sim: &mut Simulation, id: EntityId) -> Option<&mut Mission> {
    sim.world.get_mut(id).and_then(|e| e.mission.as_mut())
}

/// Run every mission handler whose timer has expired.
pub(crate) fn mission_system(sim: &mut Simulation) {
    for id in sim.world.ids() {
        let Some(entity) = sim.world.get_mut(id) else {
            continue;
        };
        if entity.is_transported() {
            continue;
        }
        let Some(mission) = entity.mission.as_mut() else {
            continue;
        };
        if mission.timer > 0 {
            mission.timer -= 1;
            continue;
        }
        let (kind, target) = (mission.kind, mission.target);

        let delay = match kind {
            MissionKind::Sleep => sim.config.guard_scan_interval,
            MissionKind::Stop => {
                set_mission(sim, id, MissionKind::Guard, None);
                0
            }
            MissionKind::Guard => guard(sim, id),
            MissionKind::GuardArea => guard_area(sim, id),
            MissionKind::Attack => attack(sim, id, target),
            MissionKind::Move => travel(sim, id),
            MissionKind::Hunt => hunt(sim, id),
            MissionKind::Retreat => retreat(sim, id),
            MissionKind::Ambush => ambush(sim, id),
            MissionKind::Harvest => economy::harvest(sim, id),
            MissionKind::Return => {
                if sim.world.get(id).is_some_and(|e| e.aircraft.is_some()) {
                    auxiliary::return_to_pad(sim, id)
                } else {
                    economy::return_to_refinery(sim, id)
                }
            }
            MissionKind::Enter => cargo::enter(sim, id, target),
            MissionKind::Unload => cargo::unload(sim, id),
            MissionKind::Capture => capture(sim, id, target),
        };

        if let Some(mission) = mission_mut(sim, id) {
            mission.timer = delay;
        }
    }
}

/// Head toward `position`, re-planning only when the goal cell changed or
/// the unit has stopped.
fn chase(sim: &mut Simulation, id: EntityId, position: Vec2Fixed) {
    let cell = CellCoord::from_position(position);
    let moving = movement::is_moving(sim, id);
    let last = sim.world.get(id).and_then(|e| e.mission.as_ref()).and_then(|m| m.destination);
    if moving && last == Some(cell) {
        return;
    }
    if movement::move_to(sim, id, position) {
        if let Some(mission) = mission_mut(sim, id) {
            mission.destination = Some(cell);
        }
    }
}

/// Engage from where we stand: keep a target still in reach, otherwise
/// scan for the best one.
fn guard(sim: &mut Simulation, id: EntityId) -> u32 {
    let scan = sim.config.guard_scan_interval;
    if let Some(target) = combat_target(sim, id) {
        if targeting::in_range(sim, id, target) {
            return scan;
        }
    }
    let target = targeting::find_target(sim, id);
    set_combat_target(sim, id, target);
    scan
}

fn guard_area(sim: &mut Simulation, id: EntityId) -> u32 {
    let scan = sim.config.guard_scan_interval;
    let Some(entity) = sim.world.get(id) else {
        return scan;
    };
    let here = entity.transform.cell();
    let range = entity.combat.as_ref().map_or(Fixed::ZERO, |c| c.range);
    let anchor = entity.mission.as_ref().and_then(|m| m.anchor).unwrap_or(here);

    let target = combat_target(sim, id).or_else(|| targeting::find_target(sim, id));
    let Some(target) = target else {
        set_combat_target(sim, id, None);
        if here != anchor && !movement::is_moving(sim, id) {
            movement::move_to(sim, id, anchor.center());
        }
        return scan;
    };
    set_combat_target(sim, id, Some(target));

    let Some(position) = sim.world.get(target).map(|t| t.transform.position) else {
        return scan;
    };
    // Leash: never chase further than twice our reach from the anchor.
    if position.distance(anchor.center()) > range * 2 {
        set_combat_target(sim, id, None);
        movement::move_to(sim, id, anchor.center());
        return scan;
    }
    if targeting::in_range(sim, id, target) {
        movement::stop(sim, id);
    } else {
        chase(sim, id, position);
    }
    scan
}

fn attack(sim: &mut Simulation, id: EntityId, target: Option<EntityId>) -> u32 {
    let interval = sim.config.attack_repath_interval;
    let mut valid = None;
    if let Some(target) = sim.world.resolve(target) {
        if let (Some(unit), Some(victim)) = (sim.world.get(id), sim.world.get(target)) {
            if targeting::can_engage(sim, unit, victim) {
                valid = Some((target, victim.transform.position));
            }
        }
    }
    let Some((target, position)) = valid else {
        set_combat_target(sim, id, None);
        set_mission(sim, id, MissionKind::Guard, None);
        return 0;
    };
    set_combat_target(sim, id, Some(target));

    if targeting::in_range(sim, id, target) {
        movement::stop(sim, id);
    } else {
        chase(sim, id, position);
    }
    interval
}

fn travel(sim: &mut Simulation, id: EntityId) -> u32 {
    if movement::is_moving(sim, id) {
        return 0;
    }
    set_mission(sim, id, MissionKind::Guard, None);
    0
}

fn hunt(sim: &mut Simulation, id: EntityId) -> u32 {
    let scan = sim.config.guard_scan_interval;
    let target = combat_target(sim, id).or_else(|| targeting::nearest_visible_enemy(sim, id));

    if let Some(target) = target {
        set_combat_target(sim, id, Some(target));
        if targeting::in_range(sim, id, target) {
            movement::stop(sim, id);
        } else if let Some(position) = sim.world.get(target).map(|t| t.transform.position) {
            chase(sim, id, position);
        }
        return scan;
    }

    set_combat_target(sim, id, None);
    if movement::is_moving(sim, id) {
        return scan;
    }
    patrol(sim, id, scan);
    scan
}

/// Idle hunters wait a random while, then wander within sight range.
fn patrol(sim: &mut Simulation, id: EntityId, scan: u32) {
    let cfg = sim.config;
    let Some(entity) = sim.world.get(id) else {
        return;
    };
    let here = entity.transform.cell();
    let sight = entity.sight.max(1);
    let waiting = entity.mission.as_ref().map_or(0, |m| m.patrol_timer);

    if waiting == 0 {
        let delay = sim.rng.range(cfg.patrol_delay_min, cfg.patrol_delay_max);
        if let Some(mission) = mission_mut(sim, id) {
            mission.patrol_timer = u32::try_from(delay.max(1)).unwrap_or(1);
        }
        return;
    }

    let remaining = waiting.saturating_sub(scan + 1);
    if let Some(mission) = mission_mut(sim, id) {
        mission.patrol_timer = remaining;
    }
    if remaining > 0 {
        return;
    }
    let dx = sim.rng.range(-sight, sight);
    let dy = sim.rng.range(-sight, sight);
    let goal = sim.grid.clamp(here.offset(dx, dy));
    debug!(entity = %id, to = %goal, "Hunt patrol");
    movement::move_to(sim, id, goal.center());
}

fn retreat(sim: &mut Simulation, id: EntityId) -> u32 {
    let scan = sim.config.guard_scan_interval;
    let Some(entity) = sim.world.get(id) else {
        return scan;
    };
    let owner = entity.owner;
    let position = entity.transform.position;
    let started = entity.mission.as_ref().is_some_and(|m| m.destination.is_some());

    if started {
        if !movement::is_moving(sim, id) {
            set_mission(sim, id, MissionKind::Guard, None);
            return 0;
        }
        return scan;
    }

    let mut best: Option<(Fixed, Vec2Fixed, CellCoord)> = None;
    for building in sim.world.iter() {
        if building.owner != owner || owner.is_none() {
            continue;
        }
        let Some(footprint) = building.building else {
            continue;
        };
        let center = footprint.center();
        let distance = center.distance_squared(position);
        if best.map_or(true, |(closest, _, _)| distance < closest) {
            best = Some((distance, center, footprint.origin));
        }
    }

    let Some((_, center, origin)) = best else {
        set_mission(sim, id, MissionKind::Guard, None);
        return 0;
    };
    if movement::move_to(sim, id, center) {
        if let Some(mission) = mission_mut(sim, id) {
            mission.destination = Some(origin);
        }
        scan
    } else {
        set_mission(sim, id, MissionKind::Guard, None);
        0
    }
}

fn ambush(sim: &mut Simulation, id: EntityId) -> u32 {
    let Some(target) = targeting::find_target(sim, id) else {
        return sim.config.guard_scan_interval;
    };
    set_mission(sim, id, MissionKind::Hunt, None);
    set_combat_target(sim, id, Some(target));
    0
}

/// Structure `id` may capture: its footprint, the capturer's cell, and
/// the capturer's house.
pub(crate) fn capture_target(
    sim: &Simulation,
    id: EntityId,
    target: Option<EntityId>,
) -> Option<(EntityId, Building, CellCoord, HouseId)> {
    let target = sim.world.resolve(target)?;
    let unit = sim.world.get(id)?;
    let building = sim.world.get(target)?;
    let footprint = building.building?;
    let owner = unit.owner?;
    let capturable = sim
        .rules
        .building(&building.type_name)
        .is_some_and(|d| d.capturable);
    let able = sim.rules.unit(&unit.type_name).is_some_and(|d| d.can_capture);
    (capturable && able && building.owner != Some(owner)).then_some((
        target,
        footprint,
        unit.transform.cell(),
        owner,
    ))
}

/// Walk up to an enemy structure and take it over, spending the unit.
fn capture(sim: &mut Simulation, id: EntityId, target: Option<EntityId>) -> u32 {
    let scan = sim.config.guard_scan_interval;
    let Some((building, footprint, here, owner)) = capture_target(sim, id, target) else {
        set_mission(sim, id, MissionKind::Guard, None);
        return 0;
    };

    if footprint.gap_to(here) > 1 {
        if !movement::is_moving(sim, id) && !movement::move_to(sim, id, footprint.center()) {
            set_mission(sim, id, MissionKind::Guard, None);
            return 0;
        }
        return scan;
    }

    let Some(entity) = sim.world.get_mut(building) else {
        return scan;
    };
    let from = entity.owner;
    entity.owner = Some(owner);
    let abandoned = entity.production.as_mut().and_then(|p| p.item.take());
    if let Some(combat) = entity.combat.as_mut() {
        combat.target = None;
    }
    if let (Some(item), Some(ledger)) = (abandoned, from.and_then(|h| sim.houses.get_mut(&h))) {
        ledger.refund(item.unspent_cost());
    }
    sim.emit(SimEvent::Captured {
        building,
        from,
        to: owner,
    });
    sim.world.mark_dead(id);
    scan
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::components::{BuildItem, BuildState, Production};
    use crate::config::SimConfig;
    use crate::data::{
        BuildingData, FactoryKind, ProjectileData, ProjectileKind, Rules, UnitClass, UnitData, WarheadData,
        WeaponData,
    };
    use crate::grid::Locomotion;
    use crate::house::HouseId;

    fn rules() -> Rules {
        let mut rules = Rules::default();
        rules.add_weapon(WeaponData {
            id: "gun".to_string(),
            damage: 10,
            range: 768,
            rate_of_fire: 10,
            projectile: "bullet".to_string(),
            warhead: "sa".to_string(),
            anti_air: false,
            anti_ground: true,
        });
        rules.add_projectile(ProjectileData {
            id: "bullet".to_string(),
            speed: 0,
            kind: ProjectileKind::Invisible,
            inaccurate: false,
            scatter: 0,
        });
        rules.add_warhead(WarheadData {
            id: "sa".to_string(),
            modifiers: Default::default(),
            splash_radius: 0,
            destroys_walls: false,
            destroys_fields: false,
        });
        rules.add_unit(UnitData {
            primary_weapon: Some("gun".to_string()),
            speed: 32,
            ..UnitData::basic("tank", UnitClass::Vehicle, Locomotion::Track)
        });
        rules.add_unit(UnitData {
            can_capture: true,
            speed: 32,
            ..UnitData::basic("engineer", UnitClass::Infantry, Locomotion::Foot)
        });
        rules.add_building(BuildingData::basic("depot", (2, 2)));
        rules
    }

    fn sim() -> Simulation {
        let mut sim = Simulation::new(24, 24, SimConfig::default(), Arc::new(rules()));
        sim.add_house(HouseId(0), 0);
        sim.add_house(HouseId(1), 0);
        sim
    }

    fn mission_of(sim: &Simulation, id: EntityId) -> Mission {
        sim.entity(id).unwrap().mission.clone().unwrap()
    }

    #[test]
    fn test_set_mission_is_idempotent() {
        let mut sim = sim();
        let tank = sim.spawn_unit("tank", HouseId(0), CellCoord::new(2, 2)).unwrap();
        let enemy = sim.spawn_unit("tank", HouseId(1), CellCoord::new(20, 20)).unwrap();

        set_mission(&mut sim, tank, MissionKind::Attack, Some(enemy));
        let changes = sim.events().len();
        mission_mut(&mut sim, tank).unwrap().timer = 7;
        mission_mut(&mut sim, tank).unwrap().destination = Some(CellCoord::new(3, 3));

        set_mission(&mut sim, tank, MissionKind::Attack, Some(enemy));
        let mission = mission_of(&sim, tank);
        assert_eq!(mission.timer, 0);
        assert_eq!(mission.destination, Some(CellCoord::new(3, 3)));
        assert_eq!(sim.events().len(), changes);

        set_mission(&mut sim, tank, MissionKind::Guard, None);
        assert_eq!(mission_of(&sim, tank).destination, None);
        assert_eq!(sim.events().len(), changes + 1);
    }

    #[test]
    fn test_attack_reverts_to_guard_when_target_dies() {
        let mut sim = sim();
        let tank = sim.spawn_unit("tank", HouseId(0), CellCoord::new(2, 2)).unwrap();
        let enemy = sim.spawn_unit("tank", HouseId(1), CellCoord::new(12, 2)).unwrap();
        sim.set_mission(tank, MissionKind::Attack, Some(enemy));
        sim.tick();
        assert!(movement::is_moving(&sim, tank));

        crate::combat::kill(&mut sim, enemy, None);
        sim.run(10);
        assert_eq!(mission_of(&sim, tank).kind, MissionKind::Guard);
        assert_eq!(sim.entity(tank).unwrap().combat.as_ref().unwrap().target, None);
    }

    #[test]
    fn test_attack_closes_to_range_and_kills() {
        let mut sim = sim();
        let tank = sim.spawn_unit("tank", HouseId(0), CellCoord::new(2, 2)).unwrap();
        let enemy = sim.spawn_unit("tank", HouseId(1), CellCoord::new(12, 2)).unwrap();
        sim.set_mission(enemy, MissionKind::Sleep, None);
        sim.set_mission(tank, MissionKind::Attack, Some(enemy));
        sim.run(300);
        assert!(sim.entity(enemy).is_none());
        assert_eq!(mission_of(&sim, tank).kind, MissionKind::Guard);
    }

    #[test]
    fn test_move_guards_on_arrival() {
        let mut sim = sim();
        let tank = sim.spawn_unit("tank", HouseId(0), CellCoord::new(2, 2)).unwrap();
        sim.set_mission(tank, MissionKind::Move, None);
        assert!(sim.move_to(tank, CellCoord::new(5, 2).center()));
        sim.run(40);
        assert_eq!(sim.entity(tank).unwrap().transform.cell(), CellCoord::new(5, 2));
        assert_eq!(mission_of(&sim, tank).kind, MissionKind::Guard);
    }

    #[test]
    fn test_stop_becomes_guard() {
        let mut sim = sim();
        let tank = sim.spawn_unit("tank", HouseId(0), CellCoord::new(2, 2)).unwrap();
        assert!(sim.move_to(tank, CellCoord::new(10, 2).center()));
        sim.set_mission(tank, MissionKind::Stop, None);
        assert!(!movement::is_moving(&sim, tank));
        sim.tick();
        assert_eq!(mission_of(&sim, tank).kind, MissionKind::Guard);
    }

    #[test]
    fn test_guard_area_records_anchor() {
        let mut sim = sim();
        let tank = sim.spawn_unit("tank", HouseId(0), CellCoord::new(6, 6)).unwrap();
        sim.set_mission(tank, MissionKind::GuardArea, None);
        assert_eq!(mission_of(&sim, tank).anchor, Some(CellCoord::new(6, 6)));
    }

    #[test]
    fn test_ambush_springs_into_hunt() {
        let mut sim = sim();
        let tank = sim.spawn_unit("tank", HouseId(0), CellCoord::new(2, 2)).unwrap();
        sim.set_mission(tank, MissionKind::Ambush, None);
        sim.run(3);
        assert_eq!(mission_of(&sim, tank).kind, MissionKind::Ambush);

        let enemy = sim.spawn_unit("tank", HouseId(1), CellCoord::new(4, 2)).unwrap();
        sim.run(10);
        assert_eq!(mission_of(&sim, tank).kind, MissionKind::Hunt);
        assert_eq!(sim.entity(tank).unwrap().combat.as_ref().unwrap().target, Some(enemy));
    }

    #[test]
    fn test_retreat_to_nearest_building() {
        let mut sim = sim();
        sim.spawn_building("depot", HouseId(0), CellCoord::new(16, 2)).unwrap();
        sim.spawn_building("depot", HouseId(0), CellCoord::new(2, 10)).unwrap();
        let tank = sim.spawn_unit("tank", HouseId(0), CellCoord::new(3, 4)).unwrap();
        sim.set_mission(tank, MissionKind::Retreat, None);
        sim.run(120);

        let unit = sim.entity(tank).unwrap();
        assert_eq!(unit.mission.as_ref().unwrap().kind, MissionKind::Guard);
        assert!(unit.transform.cell().chebyshev(CellCoord::new(2, 10)) <= 2);
    }

    #[test]
    fn test_capture_transfers_and_consumes() {
        let mut sim = sim();
        let depot = sim.spawn_building("depot", HouseId(1), CellCoord::new(10, 10)).unwrap();
        let engineer = sim.spawn_unit("engineer", HouseId(0), CellCoord::new(6, 10)).unwrap();
        sim.set_mission(engineer, MissionKind::Capture, Some(depot));

        let mut captured = false;
        for _ in 0..200 {
            if sim
                .tick()
                .iter()
                .any(|e| matches!(e, SimEvent::Captured { building, .. } if *building == depot))
            {
                captured = true;
                break;
            }
        }
        assert!(captured);
        assert_eq!(sim.entity(depot).unwrap().owner, Some(HouseId(0)));
        assert!(sim.entity(engineer).is_none());
    }

    #[test]
    fn test_capture_refunds_abandoned_build() {
        let mut sim = sim();
        let depot = sim.spawn_building("depot", HouseId(1), CellCoord::new(10, 10)).unwrap();
        sim.world.get_mut(depot).unwrap().production = Some(Production {
            kind: FactoryKind::Infantry,
            item: Some(BuildItem {
                type_name: "tank".to_string(),
                is_building: false,
                progress: Fixed::from_num(100),
                build_time: 400,
                cost: 300,
                state: BuildState::InProgress,
            }),
        });
        let engineer = sim.spawn_unit("engineer", HouseId(0), CellCoord::new(9, 10)).unwrap();
        sim.set_mission(engineer, MissionKind::Capture, Some(depot));
        sim.run(5);

        let depot = sim.entity(depot).unwrap();
        assert_eq!(depot.owner, Some(HouseId(0)));
        assert_eq!(depot.production.as_ref().unwrap().item, None);
        assert_eq!(sim.house(HouseId(1)).unwrap().credits, 225);
        assert_eq!(sim.house(HouseId(0)).unwrap().credits, 0);
    }

    #[test]
    fn test_capture_refuses_own_building() {
        let mut sim = sim();
        let depot = sim.spawn_building("depot", HouseId(0), CellCoord::new(10, 10)).unwrap();
        let engineer = sim.spawn_unit("engineer", HouseId(0), CellCoord::new(6, 10)).unwrap();
        sim.set_mission(engineer, MissionKind::Capture, Some(depot));
        sim.tick();
        assert_eq!(mission_of(&sim, engineer).kind, MissionKind::Guard);
    }
}
