//! Infantry morale: fear, going prone, and scattering.

use crate::components::Infantry;
use crate::grid::CellCoord;
use crate::movement;
use crate::simulation::Simulation;
use crate::world::EntityId;

/// Raise fear, capped at `max`.
pub(crate) fn add_fear(morale: &mut Infantry, amount: u32, max: u32) {
    morale.fear = morale.fear.saturating_add(amount).min(max);
}

/// Stand a unit up and clear its fear. Called for explicit move orders.
pub(crate) fn calm(sim: &mut Simulation, id: EntityId) {
    let Some(entity) = sim.world.get_mut(id) else {
        return;
    };
    if let Some(morale) = entity.infantry.as_mut() {
        morale.reset_fear();
        if let Some(mobile) = entity.mobile.as_mut() {
            mobile.speed_percent = 100;
        }
    }
}

/// Decay fear, then react to what is left of it.
pub(crate) fn fear_system(sim: &mut Simulation) {
    let cfg = sim.config;
    let decay = cfg.fear_decay_interval > 0 && sim.tick % cfg.fear_decay_interval == 0;

    for id in sim.world.ids() {
        let moving = movement::is_moving(sim, id);
        let Some(entity) = sim.world.get_mut(id) else {
            continue;
        };
        if entity.is_transported() {
            continue;
        }
        let Some(morale) = entity.infantry.as_mut() else {
            continue;
        };
        if decay {
            morale.fear = morale.fear.saturating_sub(1);
        }

        if morale.fear < cfg.prone_threshold {
            let was_prone = morale.prone;
            morale.prone = false;
            morale.panicking = false;
            if was_prone {
                if let Some(mobile) = entity.mobile.as_mut() {
                    mobile.speed_percent = 100;
                }
            }
            continue;
        }
        if moving {
            continue;
        }

        if morale.fraidy_cat {
            if !morale.panicking {
                morale.panicking = true;
                let cell = entity.transform.cell();
                scatter(sim, id, cell);
            }
        } else if !morale.prone {
            morale.prone = true;
            if let Some(mobile) = entity.mobile.as_mut() {
                mobile.speed_percent = 50;
            }
        }
    }
}

/// Run to a random cell within the scatter distance.
fn scatter(sim: &mut Simulation, id: EntityId, from: CellCoord) {
    let reach = sim.config.scatter_distance;
    let dx = sim.rng.range(-reach, reach);
    let dy = sim.rng.range(-reach, reach);
    let goal = sim.grid.clamp(from.offset(dx, dy));
    movement::move_to(sim, id, goal.center());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::SimConfig;
    use crate::data::{Rules, UnitClass, UnitData};
    use crate::grid::Locomotion;
    use crate::house::HouseId;

    fn sim() -> Simulation {
        let mut rules = Rules::default();
        rules.add_unit(UnitData::basic("rifle", UnitClass::Infantry, Locomotion::Foot));
        rules.add_unit(UnitData {
            fraidy_cat: true,
            ..UnitData::basic("civilian", UnitClass::Infantry, Locomotion::Foot)
        });
        let mut sim = Simulation::new(16, 16, SimConfig::default(), Arc::new(rules));
        sim.add_house(HouseId(0), 0);
        sim
    }

    fn set_fear(sim: &mut Simulation, id: EntityId, fear: u32) {
        sim.world.get_mut(id).unwrap().infantry.as_mut().unwrap().fear = fear;
    }

    #[test]
    fn test_add_fear_caps() {
        let mut morale = Infantry::default();
        add_fear(&mut morale, 200, 255);
        add_fear(&mut morale, 200, 255);
        assert_eq!(morale.fear, 255);
    }

    #[test]
    fn test_goes_prone_then_recovers() {
        let mut sim = sim();
        let rifle = sim.spawn_unit("rifle", HouseId(0), CellCoord::new(5, 5)).unwrap();
        set_fear(&mut sim, rifle, 11);

        // Tick 0 decays to 10, still at the threshold.
        fear_system(&mut sim);
        let unit = sim.entity(rifle).unwrap();
        assert!(unit.infantry.unwrap().prone);
        assert_eq!(unit.mobile.as_ref().unwrap().speed_percent, 50);

        // Next decay tick drops below it.
        sim.tick = 4;
        fear_system(&mut sim);
        let unit = sim.entity(rifle).unwrap();
        assert!(!unit.infantry.unwrap().prone);
        assert_eq!(unit.mobile.as_ref().unwrap().speed_percent, 100);
    }

    #[test]
    fn test_fraidy_cat_scatters() {
        let mut sim = sim();
        let civ = sim.spawn_unit("civilian", HouseId(0), CellCoord::new(8, 8)).unwrap();
        set_fear(&mut sim, civ, 50);
        sim.tick = 1;
        fear_system(&mut sim);

        let unit = sim.entity(civ).unwrap();
        let morale = unit.infantry.unwrap();
        assert!(morale.panicking);
        assert!(!morale.prone);
        assert_eq!(sim.rng_draws(), 2);
    }

    #[test]
    fn test_calm_resets() {
        let mut sim = sim();
        let rifle = sim.spawn_unit("rifle", HouseId(0), CellCoord::new(5, 5)).unwrap();
        set_fear(&mut sim, rifle, 40);
        sim.tick = 1;
        fear_system(&mut sim);
        calm(&mut sim, rifle);

        let unit = sim.entity(rifle).unwrap();
        assert_eq!(unit.infantry.unwrap(), Infantry::default());
        assert_eq!(unit.mobile.as_ref().unwrap().speed_percent, 100);
    }
}
