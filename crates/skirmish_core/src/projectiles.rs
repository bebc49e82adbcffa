//! Projectiles in flight.
//!
//! Homing rounds re-read their target's position every tick; everything
//! else flies at a fixed impact point chosen at launch, scattered by the
//! shared RNG for inaccurate types. On arrival the original target takes the
//! hit if it is still alive. Otherwise a splash warhead damages everything
//! around the impact point, falling off linearly to zero at its radius.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::combat::{self, EffectKind};
use crate::data::{ProjectileData, ProjectileKind, WeaponData};
use crate::events::SimEvent;
use crate::grid::CellCoord;
use crate::house::HouseId;
use crate::math::{fixed_serde, Fixed, Vec2Fixed, LEPTONS_PER_CELL};
use crate::simulation::Simulation;
use crate::world::EntityId;

/// A round on its way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Projectile {
    /// Shooter; may be dead by the time the round lands.
    pub source: EntityId,
    /// Shooter's house at launch.
    pub owner: Option<HouseId>,
    /// Intended victim. Weak.
    pub target: EntityId,
    /// Current position in leptons.
    pub position: Vec2Fixed,
    /// Where the round will land.
    pub impact: Vec2Fixed,
    /// Leptons per tick.
    #[serde(with = "fixed_serde")]
    pub speed: Fixed,
    /// Follows the target.
    pub homing: bool,
    /// Base damage.
    pub damage: i32,
    /// Warhead type.
    pub warhead: String,
}

/// Put a projectile into flight from `source` toward `target`.
pub(crate) fn launch(
    sim: &mut Simulation,
    source: EntityId,
    target: EntityId,
    weapon: &WeaponData,
    projectile: &ProjectileData,
) {
    let (Some(shooter), Some(victim)) = (sim.world.get(source), sim.world.get(target)) else {
        return;
    };
    let position = shooter.transform.position;
    let owner = shooter.owner;
    let mut impact = victim.transform.position;

    let homing = projectile.kind == ProjectileKind::Homing;
    if !homing && projectile.inaccurate && projectile.scatter > 0 {
        let dx = sim.rng.range(-projectile.scatter, projectile.scatter);
        let dy = sim.rng.range(-projectile.scatter, projectile.scatter);
        impact = impact + Vec2Fixed::from_leptons(dx, dy);
    }

    combat::push_effect(sim, EffectKind::MuzzleFlash, position);
    sim.projectiles.push(Projectile {
        source,
        owner,
        target,
        position,
        impact,
        speed: Fixed::from_num(projectile.speed.max(1)),
        homing,
        damage: weapon.damage,
        warhead: weapon.warhead.clone(),
    });
}

/// Move every projectile and resolve the ones that arrive.
pub(crate) fn projectile_system(sim: &mut Simulation) {
    let arrival = Fixed::from_num(sim.config.projectile_arrival);
    let mut in_flight = std::mem::take(&mut sim.projectiles);
    let mut landed = Vec::new();

    for mut projectile in in_flight.drain(..) {
        if projectile.homing {
            if let Some(target) = sim.world.get(projectile.target) {
                projectile.impact = target.transform.position;
            }
        }

        let delta = projectile.impact - projectile.position;
        let distance = delta.length();
        if distance <= projectile.speed + arrival {
            projectile.position = projectile.impact;
            landed.push(projectile);
        } else {
            projectile.position = projectile.position + delta.scale(projectile.speed / distance);
            sim.projectiles.push(projectile);
        }
    }

    for projectile in landed {
        detonate(sim, &projectile);
    }
}

fn detonate(sim: &mut Simulation, projectile: &Projectile) {
    let rules = Arc::clone(&sim.rules);
    combat::push_effect(sim, EffectKind::Explosion, projectile.impact);

    let target_alive = sim
        .world
        .get(projectile.target)
        .is_some_and(|t| !t.is_transported());
    let source = sim.world.resolve(Some(projectile.source));

    if target_alive {
        combat::apply_damage(
            sim,
            projectile.target,
            projectile.damage,
            &projectile.warhead,
            source,
        );
    }

    let Some(warhead) = rules.warhead(&projectile.warhead) else {
        return;
    };
    if !target_alive && warhead.has_splash() {
        splash(sim, projectile, warhead.splash_radius, source);
    }
    if warhead.destroys_walls || warhead.destroys_fields {
        damage_terrain(
            sim,
            projectile,
            warhead.splash_radius,
            warhead.destroys_walls,
            warhead.destroys_fields,
        );
    }
}

/// Linear falloff: full damage at the center, zero at `radius`.
#[must_use]
pub fn splash_damage(base: i32, distance: Fixed, radius: i32) -> i32 {
    if radius <= 0 {
        return 0;
    }
    let radius = Fixed::from_num(radius);
    if distance >= radius {
        return 0;
    }
    let scaled = Fixed::from_num(base) * (radius - distance) / radius;
    scaled.to_num::<i32>()
}

fn splash(sim: &mut Simulation, projectile: &Projectile, radius: i32, source: Option<EntityId>) {
    let victims: Vec<(EntityId, Fixed)> = sim
        .world
        .iter()
        .filter(|e| e.health.is_some() && !e.is_transported() && !e.is_airborne())
        .map(|e| (e.id, e.transform.position.distance(projectile.impact)))
        .filter(|(_, distance)| *distance < Fixed::from_num(radius))
        .collect();

    for (id, distance) in victims {
        let damage = splash_damage(projectile.damage, distance, radius);
        if damage > 0 {
            combat::apply_damage(sim, id, damage, &projectile.warhead, source);
        }
    }
}

/// Walls and fields within the blast radius; the impact cell alone when the
/// warhead has no splash.
fn damage_terrain(
    sim: &mut Simulation,
    projectile: &Projectile,
    radius: i32,
    walls: bool,
    fields: bool,
) {
    let center = CellCoord::from_position(projectile.impact);
    let reach = radius / LEPTONS_PER_CELL;
    let wall_damage = u32::try_from(projectile.damage.max(0)).unwrap_or(0);

    for dy in -reach..=reach {
        for dx in -reach..=reach {
            let cell = center.offset(dx, dy);
            if !sim.grid.in_bounds(cell) {
                continue;
            }
            if cell.center().distance(projectile.impact) > Fixed::from_num(radius.max(LEPTONS_PER_CELL)) {
                continue;
            }
            if walls && sim.grid.damage_wall(cell, wall_damage) {
                sim.emit(SimEvent::WallDestroyed { cell });
            }
            if fields {
                sim.grid.reduce_field(cell);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::config::SimConfig;
    use crate::data::{Rules, UnitClass, UnitData, WarheadData};
    use crate::grid::Locomotion;

    fn rules() -> Rules {
        let mut rules = Rules::default();
        rules.add_weapon(WeaponData {
            id: "mortar".to_string(),
            damage: 60,
            range: 2048,
            rate_of_fire: 30,
            projectile: "shell".to_string(),
            warhead: "he".to_string(),
            anti_air: false,
            anti_ground: true,
        });
        rules.add_projectile(ProjectileData {
            id: "shell".to_string(),
            speed: 64,
            kind: ProjectileKind::Ballistic,
            inaccurate: false,
            scatter: 0,
        });
        rules.add_warhead(WarheadData {
            id: "he".to_string(),
            modifiers: BTreeMap::new(),
            splash_radius: 384,
            destroys_walls: true,
            destroys_fields: true,
        });
        rules.add_unit(UnitData {
            primary_weapon: Some("mortar".to_string()),
            ..UnitData::basic("mortar_team", UnitClass::Infantry, Locomotion::Foot)
        });
        rules.add_unit(UnitData {
            health: 200,
            ..UnitData::basic("truck", UnitClass::Vehicle, Locomotion::Drive)
        });
        rules
    }

    fn sim() -> Simulation {
        let mut sim = Simulation::new(16, 16, SimConfig::default(), Arc::new(rules()));
        sim.add_house(HouseId(0), 0);
        sim.add_house(HouseId(1), 0);
        sim
    }

    #[test]
    fn test_splash_falloff() {
        assert_eq!(splash_damage(60, Fixed::ZERO, 384), 60);
        assert_eq!(splash_damage(60, Fixed::from_num(192), 384), 30);
        assert_eq!(splash_damage(60, Fixed::from_num(384), 384), 0);
        assert_eq!(splash_damage(60, Fixed::from_num(10), 0), 0);
    }

    #[test]
    fn test_shell_travels_and_hits() {
        let mut sim = sim();
        let mortar = sim.spawn_unit("mortar_team", HouseId(0), CellCoord::new(2, 2)).unwrap();
        let truck = sim.spawn_unit("truck", HouseId(1), CellCoord::new(6, 2)).unwrap();

        let weapon = sim.rules().weapon("mortar").unwrap().clone();
        let shell = sim.rules().projectile("shell").unwrap().clone();
        launch(&mut sim, mortar, truck, &weapon, &shell);
        assert_eq!(sim.projectiles.len(), 1);

        // 1024 leptons at 64 per tick.
        for _ in 0..15 {
            projectile_system(&mut sim);
        }
        assert_eq!(sim.projectiles.len(), 1);
        projectile_system(&mut sim);
        assert!(sim.projectiles.is_empty());
        assert_eq!(sim.entity(truck).unwrap().health.unwrap().hp, 140);
    }

    #[test]
    fn test_dead_target_falls_back_to_splash() {
        let mut sim = sim();
        let mortar = sim.spawn_unit("mortar_team", HouseId(0), CellCoord::new(2, 2)).unwrap();
        let decoy = sim.spawn_unit("truck", HouseId(1), CellCoord::new(6, 2)).unwrap();
        let bystander = sim.spawn_unit("truck", HouseId(1), CellCoord::new(6, 3)).unwrap();
        sim.grid_mut().set_wall(CellCoord::new(6, 1), 10);

        let weapon = sim.rules().weapon("mortar").unwrap().clone();
        let shell = sim.rules().projectile("shell").unwrap().clone();
        launch(&mut sim, mortar, decoy, &weapon, &shell);
        combat::kill(&mut sim, decoy, None);
        for _ in 0..16 {
            projectile_system(&mut sim);
        }

        // One cell away: 60 * (384 - 256) / 384 = 20.
        assert_eq!(sim.entity(bystander).unwrap().health.unwrap().hp, 180);
        assert!(!sim.grid().cell(CellCoord::new(6, 1)).unwrap().has_wall());
    }
}
