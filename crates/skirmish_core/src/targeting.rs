//! Threat scoring and target acquisition.

use crate::combat::select_weapon;
use crate::config::ThreatWeights;
use crate::math::Fixed;
use crate::simulation::Simulation;
use crate::world::{Entity, EntityId, EntityKind};

/// Score one candidate for `scorer`. Higher is more attractive.
///
/// Sum of the category priority, a retaliation bonus, a proximity bonus of
/// `proximity * 256 / (distance + 256)`, and a wound bonus.
#[must_use]
pub fn threat_score(weights: &ThreatWeights, scorer: &Entity, candidate: &Entity, distance: Fixed) -> i32 {
    let mut score = if candidate.harvester.is_some() {
        weights.harvester
    } else {
        match candidate.kind {
            EntityKind::Infantry => weights.infantry,
            EntityKind::Vehicle => weights.vehicle,
            EntityKind::Aircraft => weights.aircraft,
            EntityKind::Building => weights.building,
        }
    };

    let retaliating = candidate
        .combat
        .as_ref()
        .is_some_and(|c| c.target == Some(scorer.id));
    if retaliating {
        score += weights.retaliation;
    }

    let distance = distance.to_num::<i64>().max(0);
    let proximity = i64::from(weights.proximity) * 256 / (distance + 256);
    score += i32::try_from(proximity).unwrap_or(0);

    if let Some(health) = candidate.health {
        let percent = health.percent();
        if percent < 25 {
            score += weights.critical_wound;
        } else if percent < 50 {
            score += weights.wounded;
        }
    }
    score
}

/// Whether `scorer` may shoot at `candidate` at all, ignoring range.
pub(crate) fn can_engage(sim: &Simulation, scorer: &Entity, candidate: &Entity) -> bool {
    if !scorer.is_enemy_of(candidate) || candidate.is_transported() || candidate.health.is_none() {
        return false;
    }
    if candidate.is_cloaked() && !scorer.detects_cloaked {
        return false;
    }
    scorer
        .combat
        .as_ref()
        .and_then(|c| select_weapon(&sim.rules, c, candidate.is_airborne()))
        .is_some()
}

/// Best enemy within weapon range of `id`.
///
/// Candidates are visited in ascending id order and only a strictly higher
/// score replaces the current pick, so ties go to the oldest entity.
#[must_use]
pub fn find_target(sim: &Simulation, id: EntityId) -> Option<EntityId> {
    let scorer = sim.world.get(id)?;
    if scorer.is_transported() {
        return None;
    }
    let combat = scorer.combat.as_ref()?;
    let weights = sim.config.threat;
    let position = scorer.transform.position;

    let mut best: Option<(EntityId, i32)> = None;
    for candidate in sim.world.iter() {
        if candidate.id == id || !can_engage(sim, scorer, candidate) {
            continue;
        }
        let Some(weapon) = select_weapon(&sim.rules, combat, candidate.is_airborne()) else {
            continue;
        };
        let distance = position.distance(candidate.transform.position);
        if distance > Fixed::from_num(weapon.range) {
            continue;
        }
        let score = threat_score(&weights, scorer, candidate, distance);
        if best.map_or(true, |(_, top)| score > top) {
            best = Some((candidate.id, score));
        }
    }
    best.map(|(id, _)| id)
}

/// Whether `target` is a legal target for `id` and inside the reach of the
/// weapon that would engage it.
pub(crate) fn in_range(sim: &Simulation, id: EntityId, target: EntityId) -> bool {
    let (Some(scorer), Some(candidate)) = (sim.world.get(id), sim.world.get(target)) else {
        return false;
    };
    if !can_engage(sim, scorer, candidate) {
        return false;
    }
    scorer
        .combat
        .as_ref()
        .and_then(|c| select_weapon(&sim.rules, c, candidate.is_airborne()))
        .is_some_and(|weapon| {
            scorer.transform.position.distance(candidate.transform.position)
                <= Fixed::from_num(weapon.range)
        })
}

/// Nearest enemy standing in a cell the scorer's house can currently see.
pub(crate) fn nearest_visible_enemy(sim: &Simulation, id: EntityId) -> Option<EntityId> {
    let scorer = sim.world.get(id)?;
    let house = sim.houses.get(&scorer.owner?)?;
    let position = scorer.transform.position;

    let mut best: Option<(EntityId, Fixed)> = None;
    for candidate in sim.world.iter() {
        if candidate.id == id || !can_engage(sim, scorer, candidate) {
            continue;
        }
        if !house.visibility.is_visible(candidate.transform.cell()) {
            continue;
        }
        let distance = position.distance_squared(candidate.transform.position);
        if best.map_or(true, |(_, closest)| distance < closest) {
            best = Some((candidate.id, distance));
        }
    }
    best.map(|(id, _)| id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::SimConfig;
    use crate::data::{
        ProjectileData, ProjectileKind, Rules, UnitClass, UnitData, WarheadData, WeaponData,
    };
    use crate::grid::{CellCoord, Locomotion};
    use crate::house::HouseId;

    fn sim() -> Simulation {
        let mut rules = Rules::default();
        rules.add_weapon(WeaponData {
            id: "gun".to_string(),
            damage: 10,
            range: 1280,
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
            ..UnitData::basic("gunner", UnitClass::Infantry, Locomotion::Foot)
        });
        rules.add_unit(UnitData::basic("jeep", UnitClass::Vehicle, Locomotion::Drive));
        rules.add_unit(UnitData {
            harvester: Some(crate::data::HarvesterStats { capacity: 500, rate: 5 }),
            ..UnitData::basic("harv", UnitClass::Vehicle, Locomotion::Track)
        });
        rules.add_unit(UnitData::basic("heli", UnitClass::Aircraft, Locomotion::Fly));

        let mut sim = Simulation::new(20, 20, SimConfig::default(), Arc::new(rules));
        sim.add_house(HouseId(0), 0);
        sim.add_house(HouseId(1), 0);
        sim
    }

    #[test]
    fn test_prefers_harvester_over_vehicle() {
        let mut sim = sim();
        let gunner = sim.spawn_unit("gunner", HouseId(0), CellCoord::new(5, 5)).unwrap();
        let _jeep = sim.spawn_unit("jeep", HouseId(1), CellCoord::new(6, 5)).unwrap();
        let harv = sim.spawn_unit("harv", HouseId(1), CellCoord::new(8, 5)).unwrap();
        assert_eq!(find_target(&sim, gunner), Some(harv));
    }

    #[test]
    fn test_ties_keep_lowest_id() {
        let mut sim = sim();
        let gunner = sim.spawn_unit("gunner", HouseId(0), CellCoord::new(5, 5)).unwrap();
        let first = sim.spawn_unit("jeep", HouseId(1), CellCoord::new(7, 5)).unwrap();
        let _second = sim.spawn_unit("jeep", HouseId(1), CellCoord::new(3, 5)).unwrap();
        assert_eq!(find_target(&sim, gunner), Some(first));
    }

    #[test]
    fn test_skips_friends_air_and_out_of_range() {
        let mut sim = sim();
        let gunner = sim.spawn_unit("gunner", HouseId(0), CellCoord::new(5, 5)).unwrap();
        sim.spawn_unit("jeep", HouseId(0), CellCoord::new(6, 5));
        sim.spawn_unit("jeep", HouseId(1), CellCoord::new(15, 5));
        let heli = sim.spawn_unit("heli", HouseId(1), CellCoord::new(5, 6)).unwrap();
        if let Some(aircraft) = sim.world.get_mut(heli).and_then(|e| e.aircraft.as_mut()) {
            aircraft.altitude = 256;
        }
        assert_eq!(find_target(&sim, gunner), None);
    }

    #[test]
    fn test_score_components() {
        let mut sim = sim();
        let gunner = sim.spawn_unit("gunner", HouseId(0), CellCoord::new(5, 5)).unwrap();
        let jeep = sim.spawn_unit("jeep", HouseId(1), CellCoord::new(6, 5)).unwrap();
        let weights = ThreatWeights::default();

        let scorer = sim.entity(gunner).unwrap().clone();
        let mut candidate = sim.entity(jeep).unwrap().clone();
        // 30 + 50 * 256 / 512.
        assert_eq!(threat_score(&weights, &scorer, &candidate, Fixed::from_num(256)), 55);

        candidate.health.as_mut().unwrap().hp = 20;
        assert_eq!(threat_score(&weights, &scorer, &candidate, Fixed::ZERO), 95);
    }
}
