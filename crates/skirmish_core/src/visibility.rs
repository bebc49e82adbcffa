//! Fog-of-war data model.
//!
//! Each house keeps two layers over the grid: cells seen at some point
//! (`revealed`, the shroud) and cells seen right now (`visible`). The
//! visible layer is rebuilt every tick from the sight radii of the house's
//! living entities. Drawing any of it is someone else's job.

use serde::{Deserialize, Serialize};

use crate::grid::CellCoord;
use crate::simulation::Simulation;

/// Visibility layers for one house.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visibility {
    width: i32,
    height: i32,
    revealed: Vec<bool>,
    visible: Vec<bool>,
}

impl Visibility {
    /// Fully shrouded layers for a map.
    #[must_use]
    pub fn new(width: i32, height: i32) -> Self {
        let count = (width.max(0) as usize) * (height.max(0) as usize);
        Self {
            width,
            height,
            revealed: vec![false; count],
            visible: vec![false; count],
        }
    }

    fn index(&self, cell: CellCoord) -> Option<usize> {
        if cell.x < 0 || cell.y < 0 || cell.x >= self.width || cell.y >= self.height {
            return None;
        }
        Some((cell.y as usize) * (self.width as usize) + (cell.x as usize))
    }

    /// Start a new tick: nothing is currently visible.
    pub fn begin_update(&mut self) {
        self.visible.fill(false);
    }

    /// Mark a disc of `radius` cells around `center` as seen.
    pub fn reveal_around(&mut self, center: CellCoord, radius: i32) {
        let radius = radius.max(0);
        let limit = i64::from(radius) * i64::from(radius);
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if i64::from(dx * dx + dy * dy) > limit {
                    continue;
                }
                if let Some(i) = self.index(center.offset(dx, dy)) {
                    self.visible[i] = true;
                    self.revealed[i] = true;
                }
            }
        }
    }

    /// Seen this tick.
    #[must_use]
    pub fn is_visible(&self, cell: CellCoord) -> bool {
        self.index(cell).is_some_and(|i| self.visible[i])
    }

    /// Seen at any point.
    #[must_use]
    pub fn is_revealed(&self, cell: CellCoord) -> bool {
        self.index(cell).is_some_and(|i| self.revealed[i])
    }

    /// Number of revealed cells.
    #[must_use]
    pub fn revealed_count(&self) -> usize {
        self.revealed.iter().filter(|&&r| r).count()
    }
}

/// Rebuild every house's visible layer from its entities' sight.
///
/// Passengers see nothing; buildings see from their footprint center.
pub(crate) fn visibility_system(sim: &mut Simulation) {
    for house in sim.houses.values_mut() {
        house.visibility.begin_update();
    }
    for entity in sim.world.iter() {
        if entity.sight <= 0 || entity.is_transported() {
            continue;
        }
        let Some(house) = entity.owner.and_then(|o| sim.houses.get_mut(&o)) else {
            continue;
        };
        house
            .visibility
            .reveal_around(entity.transform.cell(), entity.sight);
    }
}
