//! Resource field growth and spread.
//!
//! Two work lists drive the process: cells that can still grow and cells
//! dense enough to spread. Picks come from the shared RNG; a cell that
//! maxes out or spreads leaves its list, and both lists are rebuilt from
//! the grid once they are both empty.

use serde::{Deserialize, Serialize};

use crate::config::SimConfig;
use crate::events::SimEvent;
use crate::grid::{CellCoord, Grid, Locomotion, Overlay};
use crate::rng::SimRng;
use crate::simulation::Simulation;

/// Growth and spread candidates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldState {
    /// Fields below the maximum level.
    pub growth: Vec<CellCoord>,
    /// Fields at or above the spread threshold.
    pub spread: Vec<CellCoord>,
}

impl FieldState {
    /// Rebuild both lists from the grid in row-major order.
    pub fn rescan(&mut self, grid: &Grid, config: &SimConfig) {
        self.growth.clear();
        self.spread.clear();
        for (cell, level) in grid.field_cells() {
            if level < config.field_max_level {
                self.growth.push(cell);
            }
            if level >= config.spread_min_level {
                self.spread.push(cell);
            }
        }
    }
}

/// One growth roll for a field cell.
///
/// The chance depends on how many of the eight neighbours are fields.
/// Returns the new level on success. Cells that are not fields or are
/// already at the cap are skipped without a roll.
pub fn try_grow(grid: &mut Grid, rng: &mut SimRng, config: &SimConfig, cell: CellCoord) -> Option<u8> {
    let level = grid.field_level(cell)?;
    if level >= config.field_max_level {
        return None;
    }
    let chance = config.growth_chance(grid.adjacent_fields(cell));
    if rng.percent(chance) {
        grid.grow_field(cell, config.field_max_level)
    } else {
        None
    }
}

/// Whether a spread may seed a new field here.
fn can_seed(grid: &Grid, cell: CellCoord) -> bool {
    grid.cell(cell).is_some_and(|c| {
        c.terrain.passable_for(Locomotion::Foot) && c.overlay == Overlay::None && c.building.is_none()
    })
}

/// Growth and spread passes on their configured cadences.
pub(crate) fn field_system(sim: &mut Simulation) {
    let cfg = sim.config;
    if sim.fields.growth.is_empty() && sim.fields.spread.is_empty() {
        sim.fields.rescan(&sim.grid, &cfg);
    }

    if cfg.growth_interval > 0 && sim.tick % cfg.growth_interval == 0 {
        grow(sim);
    }
    if cfg.spread_interval > 0 && sim.tick % cfg.spread_interval == 0 {
        spread(sim);
    }
}

fn grow(sim: &mut Simulation) {
    let cfg = sim.config;
    for _ in 0..cfg.growth_attempts {
        if sim.fields.growth.is_empty() {
            break;
        }
        let index = sim.rng.index(sim.fields.growth.len());
        let cell = sim.fields.growth[index];

        if let Some(level) = try_grow(&mut sim.grid, &mut sim.rng, &cfg, cell) {
            sim.emit(SimEvent::FieldGrew { cell, level });
        }
        let done = sim
            .grid
            .field_level(cell)
            .map_or(true, |level| level >= cfg.field_max_level);
        if done {
            sim.fields.growth.swap_remove(index);
        }
    }
}

fn spread(sim: &mut Simulation) {
    let cfg = sim.config;
    for _ in 0..cfg.spread_attempts {
        if sim.fields.spread.is_empty() {
            break;
        }
        let index = sim.rng.index(sim.fields.spread.len());
        let from = sim.fields.spread.swap_remove(index);
        if sim.grid.field_level(from).map_or(true, |l| l < cfg.spread_min_level) {
            continue;
        }

        let mut around: Vec<CellCoord> = sim.grid.neighbours(from).collect();
        sim.rng.shuffle(&mut around);
        let Some(&to) = around.iter().find(|c| can_seed(&sim.grid, **c)) else {
            continue;
        };
        sim.grid.set_field(to, 0);
        sim.fields.growth.push(to);
        sim.emit(SimEvent::FieldSpread { from, to });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::data::Rules;
    use crate::grid::Terrain;

    fn trials(neighbours: usize) -> u32 {
        trials_at(3, neighbours)
    }

    /// Growth successes out of 2000 rolls for a cell at `level`.
    fn trials_at(level: u8, neighbours: usize) -> u32 {
        let config = SimConfig::default();
        let mut grid = Grid::new(8, 8);
        let mut rng = SimRng::new(12345);
        let center = CellCoord::new(4, 4);
        let around: Vec<CellCoord> = grid.neighbours(center).take(neighbours).collect();
        for cell in around {
            grid.set_field(cell, 5);
        }

        let mut grown = 0;
        for _ in 0..2000 {
            grid.set_field(center, level);
            if try_grow(&mut grid, &mut rng, &config, center).is_some() {
                grown += 1;
            }
        }
        grown
    }

    #[test]
    fn test_growth_density_tiers() {
        let sparse = trials(1);
        assert!((140..=260).contains(&sparse), "sparse grew {sparse} of 2000");

        let medium = trials(3);
        assert!((400..=600).contains(&medium), "medium grew {medium} of 2000");

        let dense = trials(6);
        assert!((900..=1100).contains(&dense), "dense grew {dense} of 2000");
    }

    #[test]
    fn test_dense_level_five_outgrows_isolated() {
        let isolated = trials_at(5, 0);
        let clustered = trials_at(5, 5);
        assert!((140..=260).contains(&isolated), "isolated grew {isolated} of 2000");
        assert!((900..=1100).contains(&clustered), "clustered grew {clustered} of 2000");
        assert!(clustered > isolated * 3);
    }

    #[test]
    fn test_max_level_does_not_roll() {
        let config = SimConfig::default();
        let mut grid = Grid::new(4, 4);
        let mut rng = SimRng::new(1);
        grid.set_field(CellCoord::new(1, 1), config.field_max_level);
        assert_eq!(try_grow(&mut grid, &mut rng, &config, CellCoord::new(1, 1)), None);
        assert_eq!(try_grow(&mut grid, &mut rng, &config, CellCoord::new(2, 2)), None);
        assert_eq!(rng.draws(), 0);
    }

    #[test]
    fn test_rescan_sorts_cells() {
        let config = SimConfig::default();
        let mut grid = Grid::new(8, 8);
        grid.set_field(CellCoord::new(1, 1), 2);
        grid.set_field(CellCoord::new(2, 1), 7);
        grid.set_field(CellCoord::new(3, 1), config.field_max_level);

        let mut state = FieldState::default();
        state.rescan(&grid, &config);
        assert_eq!(state.growth, vec![CellCoord::new(1, 1), CellCoord::new(2, 1)]);
        assert_eq!(state.spread, vec![CellCoord::new(2, 1), CellCoord::new(3, 1)]);
    }

    #[test]
    fn test_spread_seeds_open_neighbour() {
        let config = SimConfig {
            growth_interval: 1000,
            spread_interval: 1,
            spread_attempts: 1,
            ..SimConfig::default()
        };
        let mut sim = Simulation::new(5, 5, config, Arc::new(Rules::default()));
        let source = CellCoord::new(2, 2);
        sim.grid_mut().set_field(source, 9);
        // Leave exactly one open neighbour.
        for cell in [(1, 1), (2, 1), (3, 1), (1, 2), (1, 3), (2, 3), (3, 3)] {
            sim.grid_mut().set_terrain(CellCoord::new(cell.0, cell.1), Terrain::Water);
        }

        sim.tick();
        assert_eq!(sim.grid().field_level(CellCoord::new(3, 2)), Some(0));
        assert!(sim
            .events()
            .contains(&SimEvent::FieldSpread { from: source, to: CellCoord::new(3, 2) }));
        assert!(sim.fields.spread.is_empty());
    }
}
