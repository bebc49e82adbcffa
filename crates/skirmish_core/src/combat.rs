//! Weapon fire, damage resolution, and death.
//!
//! Damage is `floor(base * modifier / 100)` where the modifier comes from
//! the warhead's armor table (100% when absent). Prone infantry take half of
//! that. [`Health::apply_damage`](crate::components::Health::apply_damage)
//! reports destruction exactly once, and only that call runs [`kill`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cargo;
use crate::components::{CloakPhase, Combat, MissionKind};
use crate::data::{Rules, WeaponData};
use crate::events::SimEvent;
use crate::infantry;
use crate::math::{facing_difference, facing_from_vector, rotate_toward, Fixed, Vec2Fixed};
use crate::projectiles;
use crate::simulation::Simulation;
use crate::world::{EntityId, EntityKind};

// ============================================================================
// Effects
// ============================================================================

/// Short-lived visual markers for the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectKind {
    /// Weapon discharge at the shooter.
    MuzzleFlash,
    /// Beam weapon hit.
    Beam,
    /// Shell impact or vehicle wreck.
    Explosion,
    /// Soldier down.
    InfantryDeath,
    /// Structure destroyed.
    BuildingCollapse,
    /// Aircraft shot down.
    AircraftCrash,
}

/// One effect instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Effect {
    /// What to draw.
    pub kind: EffectKind,
    /// Where, in leptons.
    pub position: Vec2Fixed,
    /// Ticks left.
    pub ttl: u32,
}

pub(crate) fn push_effect(sim: &mut Simulation, kind: EffectKind, position: Vec2Fixed) {
    let ttl = sim.config.effect_lifetime;
    sim.effects.push(Effect {
        kind,
        position,
        ttl,
    });
}

/// Count every effect down and drop the expired ones.
pub(crate) fn age_effects(effects: &mut Vec<Effect>) {
    for effect in effects.iter_mut() {
        effect.ttl = effect.ttl.saturating_sub(1);
    }
    effects.retain(|e| e.ttl > 0);
}

// ============================================================================
// Damage
// ============================================================================

/// What a damage application did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageOutcome {
    /// Hit points removed.
    pub dealt: u32,
    /// This call destroyed the target.
    pub destroyed: bool,
}

/// Fear gained from one hit.
const fn fear_for(dealt: u32) -> u32 {
    match dealt {
        0 => 0,
        1..=9 => 2,
        10..=29 => 5,
        _ => 10,
    }
}

/// Damage after armor and posture.
#[must_use]
pub fn scaled_damage(base: i32, modifier: u32, prone: bool) -> u32 {
    let raw = i64::from(base.max(0)) * i64::from(modifier) / 100;
    let raw = u32::try_from(raw).unwrap_or(u32::MAX);
    if prone {
        raw / 2
    } else {
        raw
    }
}

/// Hit `target` with `base` damage through the named warhead.
///
/// Missing targets or warheads do nothing. The victim may pick the attacker
/// as its target if it was idling, and infantry gain fear.
pub fn apply_damage(
    sim: &mut Simulation,
    target: EntityId,
    base: i32,
    warhead: &str,
    attacker: Option<EntityId>,
) -> DamageOutcome {
    let rules = Arc::clone(&sim.rules);
    let Some(warhead) = rules.warhead(warhead) else {
        warn!(warhead, "Unknown warhead");
        return DamageOutcome::default();
    };
    let Some(entity) = sim.world.get_mut(target) else {
        return DamageOutcome::default();
    };
    let prone = entity.infantry.is_some_and(|i| i.prone);
    let Some(health) = entity.health.as_mut() else {
        return DamageOutcome::default();
    };

    let amount = scaled_damage(base, warhead.modifier(health.armor), prone);
    let before = health.hp;
    let destroyed = health.apply_damage(amount);
    let dealt = before - health.hp;

    if let Some(morale) = entity.infantry.as_mut() {
        infantry::add_fear(morale, fear_for(dealt), sim.config.fear_max);
    }

    sim.emit(SimEvent::Damaged {
        target,
        amount: dealt,
        attacker,
    });

    if destroyed {
        kill(sim, target, attacker);
    } else if let Some(attacker) = attacker {
        retaliate(sim, &rules, target, attacker);
    }

    DamageOutcome { dealt, destroyed }
}

/// An idle victim turns its guns on whoever shot it.
fn retaliate(sim: &mut Simulation, rules: &Rules, victim: EntityId, attacker: EntityId) {
    let Some(shooter) = sim.world.get(attacker) else {
        return;
    };
    let Some(entity) = sim.world.get(victim) else {
        return;
    };
    if !entity.is_enemy_of(shooter) || shooter.is_transported() {
        return;
    }
    let idle = entity
        .mission
        .as_ref()
        .is_some_and(|m| matches!(m.kind, MissionKind::Guard | MissionKind::GuardArea));
    let Some(combat) = entity.combat.as_ref() else {
        return;
    };
    if !idle || sim.world.resolve(combat.target).is_some() {
        return;
    }
    if select_weapon(rules, combat, shooter.is_airborne()).is_none() {
        return;
    }
    if let Some(combat) = sim.world.get_mut(victim).and_then(|e| e.combat.as_mut()) {
        combat.target = Some(attacker);
    }
}

/// Destroy an entity: death effect, `Killed` event, cargo ejection,
/// footprint and dock release. Removal waits for end-of-tick cleanup.
pub fn kill(sim: &mut Simulation, id: EntityId, killer: Option<EntityId>) {
    if release(sim, id, killer) {
        sim.world.mark_dead(id);
    }
}

/// Like [`kill`] but removes the entity from the world at once.
pub(crate) fn destroy_immediately(sim: &mut Simulation, id: EntityId) {
    if release(sim, id, None) {
        sim.world.remove_now(id);
    }
}

fn release(sim: &mut Simulation, id: EntityId, killer: Option<EntityId>) -> bool {
    let Some(entity) = sim.world.get(id) else {
        return false;
    };
    let kind = entity.kind;
    let owner = entity.owner;
    let position = entity.transform.position;
    let footprint = entity.building;
    let refinery = entity.harvester.and_then(|h| h.refinery);

    let effect = match kind {
        EntityKind::Infantry => EffectKind::InfantryDeath,
        EntityKind::Vehicle => EffectKind::Explosion,
        EntityKind::Aircraft => EffectKind::AircraftCrash,
        EntityKind::Building => EffectKind::BuildingCollapse,
    };
    push_effect(sim, effect, position);
    sim.emit(SimEvent::Killed {
        entity: id,
        kind,
        owner,
        killer,
    });

    cargo::eject_all(sim, id);

    if let Some(building) = footprint {
        for cell in building.cells() {
            if sim.grid.building_at(cell) == Some(id) {
                sim.grid.set_building(cell, None);
            }
        }
        if let Some(occupant) = building.dock_occupant {
            if let Some(harvester) = sim.world.get_mut(occupant).and_then(|e| e.harvester.as_mut()) {
                harvester.refinery = None;
                harvester.reset_dock();
            }
        }
    }
    if let Some(refinery) = refinery {
        if let Some(dock) = sim.world.get_mut(refinery).and_then(|e| e.building.as_mut()) {
            if dock.dock_occupant == Some(id) {
                dock.dock_occupant = None;
            }
        }
    }
    true
}

// ============================================================================
// Firing
// ============================================================================

/// Outcome of one attempt to fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FireResult {
    /// A shot went off.
    Fired,
    /// The turret turned toward the target instead of firing.
    Rotating,
    /// Weapon still cycling.
    Rearming,
    /// Magazine empty.
    OutOfAmmo,
    /// Target beyond weapon reach.
    OutOfRange,
    /// No weapon can engage the target's layer.
    NoWeapon,
    /// Cloaked units must decloak first.
    Cloaked,
    /// Target is gone, hidden, or friendly-owned by the same entity.
    InvalidTarget,
}

/// First weapon that can hit a target on the given layer: primary, then
/// secondary.
pub(crate) fn select_weapon<'r>(
    rules: &'r Rules,
    combat: &Combat,
    airborne_target: bool,
) -> Option<&'r WeaponData> {
    combat
        .primary
        .iter()
        .chain(&combat.secondary)
        .filter_map(|name| rules.weapon(name))
        .find(|w| if airborne_target { w.anti_air } else { w.anti_ground })
}

/// Try to shoot `target`.
///
/// Checks, in order: weapon for the target layer, range, ammunition,
/// cloak, turret alignment, and rearm timer. A turret further from the
/// target bearing than its per-tick rotation turns by exactly that much and
/// does not fire.
pub fn attempt_attack(sim: &mut Simulation, attacker: EntityId, target: EntityId) -> FireResult {
    let rules = Arc::clone(&sim.rules);
    let Some(victim) = sim.world.get(target) else {
        return FireResult::InvalidTarget;
    };
    if victim.is_transported() || attacker == target {
        return FireResult::InvalidTarget;
    }
    let victim_position = victim.transform.position;
    let victim_airborne = victim.is_airborne();

    let Some(shooter) = sim.world.get(attacker) else {
        return FireResult::InvalidTarget;
    };
    if shooter.is_transported() {
        return FireResult::InvalidTarget;
    }
    let Some(combat) = shooter.combat.as_ref() else {
        return FireResult::NoWeapon;
    };
    let Some(weapon) = select_weapon(&rules, combat, victim_airborne) else {
        return FireResult::NoWeapon;
    };
    let position = shooter.transform.position;
    if position.distance(victim_position) > Fixed::from_num(weapon.range) {
        return FireResult::OutOfRange;
    }
    if !combat.has_ammo() {
        return FireResult::OutOfAmmo;
    }
    if shooter.cloak.is_some_and(|c| c.phase != CloakPhase::Uncloaked) {
        return FireResult::Cloaked;
    }

    let Some(entity) = sim.world.get_mut(attacker) else {
        return FireResult::InvalidTarget;
    };
    if let Some(bearing) = facing_from_vector(victim_position - position) {
        if let Some(turret) = entity.turret.as_mut() {
            if facing_difference(turret.facing, bearing).abs() > i32::from(turret.rot) {
                turret.facing = rotate_toward(turret.facing, bearing, turret.rot);
                return FireResult::Rotating;
            }
            turret.facing = bearing;
        } else if entity.mobile.is_some() {
            entity.transform.facing = bearing;
        }
    }

    let Some(combat) = entity.combat.as_mut() else {
        return FireResult::NoWeapon;
    };
    if combat.rearm > 0 {
        return FireResult::Rearming;
    }
    combat.consume_ammo();
    combat.rearm = weapon.rate_of_fire;

    sim.emit(SimEvent::Fired {
        attacker,
        target,
        weapon: weapon.id.clone(),
    });

    let Some(projectile) = rules.projectile(&weapon.projectile) else {
        warn!(weapon = %weapon.id, projectile = %weapon.projectile, "Unknown projectile");
        return FireResult::Fired;
    };
    if projectile.kind.is_instant() {
        let effect = if projectile.kind == crate::data::ProjectileKind::Laser {
            EffectKind::Beam
        } else {
            EffectKind::MuzzleFlash
        };
        push_effect(sim, effect, victim_position);
        apply_damage(sim, target, weapon.damage, &weapon.warhead, Some(attacker));
    } else {
        projectiles::launch(sim, attacker, target, weapon, projectile);
    }
    FireResult::Fired
}

/// Tick every weapon: count rearm timers down, drop stale targets, and fire
/// at valid ones.
pub(crate) fn combat_system(sim: &mut Simulation) {
    for id in sim.world.ids() {
        let Some(entity) = sim.world.get_mut(id) else {
            continue;
        };
        if entity.is_transported() {
            continue;
        }
        let Some(combat) = entity.combat.as_mut() else {
            continue;
        };
        combat.rearm = combat.rearm.saturating_sub(1);
        let Some(target) = combat.target else {
            continue;
        };

        let valid = sim
            .world
            .get(target)
            .is_some_and(|t| !t.is_transported());
        if !valid {
            if let Some(combat) = sim.world.get_mut(id).and_then(|e| e.combat.as_mut()) {
                combat.target = None;
            }
            continue;
        }
        attempt_attack(sim, id, target);
    }
}
