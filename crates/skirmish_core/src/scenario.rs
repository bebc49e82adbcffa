//! Scenario loading.
//!
//! A scenario describes the starting state of a match: the map, resource
//! fields, houses with their credits, and the units and buildings each house
//! starts with. It is plain RON data and builds into a ready-to-run
//! [`Simulation`].

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::components::MissionKind;
use crate::config::SimConfig;
use crate::data::Rules;
use crate::error::{GameError, Result};
use crate::grid::{CellCoord, Terrain};
use crate::house::HouseId;
use crate::simulation::Simulation;

/// A rectangle of terrain, inclusive on both corners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerrainPatch {
    /// Ground type.
    pub terrain: Terrain,
    /// One corner.
    pub from: (i32, i32),
    /// Opposite corner.
    pub to: (i32, i32),
}

/// A resource field cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldPlacement {
    /// Cell x.
    pub x: i32,
    /// Cell y.
    pub y: i32,
    /// Starting level.
    pub level: u8,
}

/// A starting unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitPlacement {
    /// Unit type.
    pub type_id: String,
    /// Cell x.
    pub x: i32,
    /// Cell y.
    pub y: i32,
    /// Starting mission.
    #[serde(default)]
    pub mission: MissionKind,
}

impl UnitPlacement {
    /// Guarding unit at a cell.
    #[must_use]
    pub fn new(type_id: &str, x: i32, y: i32) -> Self {
        Self {
            type_id: type_id.to_string(),
            x,
            y,
            mission: MissionKind::Guard,
        }
    }
}

/// A starting structure, by its top-left cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildingPlacement {
    /// Building type.
    pub type_id: String,
    /// Cell x.
    pub x: i32,
    /// Cell y.
    pub y: i32,
}

impl BuildingPlacement {
    /// Structure with its footprint origin at a cell.
    #[must_use]
    pub fn new(type_id: &str, x: i32, y: i32) -> Self {
        Self {
            type_id: type_id.to_string(),
            x,
            y,
        }
    }
}

/// One house's starting state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HouseSetup {
    /// House id.
    pub id: u8,
    /// Starting credits.
    pub credits: i32,
    /// Structures, placed before units.
    #[serde(default)]
    pub buildings: Vec<BuildingPlacement>,
    /// Units.
    #[serde(default)]
    pub units: Vec<UnitPlacement>,
}

/// A complete scenario configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Map dimensions in cells.
    pub map_size: (u32, u32),
    /// Session tunables.
    #[serde(default)]
    pub config: SimConfig,
    /// Terrain painted over a clear map, in order.
    #[serde(default)]
    pub terrain: Vec<TerrainPatch>,
    /// Resource fields.
    #[serde(default)]
    pub fields: Vec<FieldPlacement>,
    /// Houses in id order.
    pub houses: Vec<HouseSetup>,
}

impl Scenario {
    /// Load a scenario from a RON file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let scenario: Self = ron::from_str(&contents).map_err(|e| GameError::DataParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        info!(path = %path.display(), name = %scenario.name, "Loaded scenario");
        Ok(scenario)
    }

    /// Load from a RON string (useful for embedded scenarios).
    ///
    /// # Errors
    /// Returns an error if the text is not a valid scenario.
    pub fn from_ron_str(ron: &str) -> Result<Self> {
        ron::from_str(ron).map_err(|e| GameError::DataParseError {
            path: "<inline>".to_string(),
            message: e.to_string(),
        })
    }

    /// Build the starting simulation.
    ///
    /// # Errors
    /// Returns [`GameError::InvalidData`] for a zero-sized map, unknown types,
    /// or placements off the map.
    pub fn build(&self, rules: Arc<Rules>) -> Result<Simulation> {
        let (width, height) = self.map_size;
        if width == 0 || height == 0 {
            return Err(self.invalid("map size must be non-zero"));
        }
        let mut sim = Simulation::new(width, height, self.config, rules);

        for patch in &self.terrain {
            let (x0, x1) = (patch.from.0.min(patch.to.0), patch.from.0.max(patch.to.0));
            let (y0, y1) = (patch.from.1.min(patch.to.1), patch.from.1.max(patch.to.1));
            for y in y0..=y1 {
                for x in x0..=x1 {
                    sim.grid_mut().set_terrain(CellCoord::new(x, y), patch.terrain);
                }
            }
        }
        for field in &self.fields {
            let cell = CellCoord::new(field.x, field.y);
            if !sim.grid().in_bounds(cell) {
                return Err(self.invalid(&format!("field {cell} is off the map")));
            }
            sim.grid_mut().set_field(cell, field.level);
        }

        for setup in &self.houses {
            sim.add_house(HouseId(setup.id), setup.credits);
        }
        for setup in &self.houses {
            let house = HouseId(setup.id);
            for placement in &setup.buildings {
                let origin = CellCoord::new(placement.x, placement.y);
                sim.spawn_building(&placement.type_id, house, origin)
                    .ok_or_else(|| {
                        self.invalid(&format!("cannot place '{}' at {origin}", placement.type_id))
                    })?;
            }
            for placement in &setup.units {
                let cell = CellCoord::new(placement.x, placement.y);
                let id = sim.spawn_unit(&placement.type_id, house, cell).ok_or_else(|| {
                    self.invalid(&format!("cannot spawn '{}' at {cell}", placement.type_id))
                })?;
                sim.set_mission(id, placement.mission, None);
            }
        }

        info!(
            name = %self.name,
            houses = self.houses.len(),
            entities = sim.world().len(),
            "Built scenario"
        );
        Ok(sim)
    }

    fn invalid(&self, message: &str) -> GameError {
        GameError::InvalidData {
            owner: self.name.clone(),
            message: message.to_string(),
        }
    }
}
