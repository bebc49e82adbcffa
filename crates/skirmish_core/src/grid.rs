//! The cell map.
//!
//! A fixed-size, row-major array of cells. Each cell has terrain, an
//! optional overlay (resource field or wall), and occupancy flags. Cells
//! are never added or removed after construction, only mutated in place.

use serde::{Deserialize, Serialize};

use crate::math::{Vec2Fixed, HALF_CELL, LEPTONS_PER_CELL};
use crate::world::EntityId;

/// Eight neighbour offsets in a fixed order: E, SE, S, SW, W, NW, N, NE.
pub const DIRECTIONS: [(i32, i32); 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];

/// Integer cell coordinates.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct CellCoord {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl CellCoord {
    /// Create a coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Cell containing a lepton position.
    #[must_use]
    pub fn from_position(position: Vec2Fixed) -> Self {
        let (x, y) = position.to_leptons();
        Self::new(
            x.div_euclid(LEPTONS_PER_CELL),
            y.div_euclid(LEPTONS_PER_CELL),
        )
    }

    /// Lepton position of the cell center.
    #[must_use]
    pub fn center(self) -> Vec2Fixed {
        Vec2Fixed::from_leptons(
            self.x * LEPTONS_PER_CELL + HALF_CELL,
            self.y * LEPTONS_PER_CELL + HALF_CELL,
        )
    }

    /// Shift by a cell offset.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// Chebyshev (king-move) distance.
    #[must_use]
    pub fn chebyshev(self, other: Self) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }

    /// Squared Euclidean distance in cells.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> i64 {
        let dx = i64::from(self.x - other.x);
        let dy = i64::from(self.y - other.y);
        dx * dx + dy * dy
    }
}

impl std::fmt::Display for CellCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Ground type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Terrain {
    /// Open ground.
    #[default]
    Clear,
    /// Paved road.
    Road,
    /// Broken ground; tracks and feet only.
    Rough,
    /// Open water.
    Water,
    /// Cliffs and boulders.
    Rock,
}

impl Terrain {
    /// Whether a locomotion type can cross this terrain.
    #[must_use]
    pub const fn passable_for(self, locomotion: Locomotion) -> bool {
        match locomotion {
            Locomotion::Fly => true,
            Locomotion::Foot | Locomotion::Track => {
                matches!(self, Self::Clear | Self::Road | Self::Rough)
            }
            Locomotion::Drive => matches!(self, Self::Clear | Self::Road),
        }
    }

    /// Whether structures can stand here.
    #[must_use]
    pub const fn buildable(self) -> bool {
        matches!(self, Self::Clear | Self::Road)
    }
}

/// How a unit crosses the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Locomotion {
    /// Infantry.
    #[default]
    Foot,
    /// Tracked vehicles.
    Track,
    /// Wheeled vehicles.
    Drive,
    /// Aircraft.
    Fly,
}

/// What sits on top of the terrain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Overlay {
    /// Nothing.
    #[default]
    None,
    /// Harvestable resource field.
    Field {
        /// Density level, `0..=max`.
        level: u8,
        /// Units already taken from the current level.
        spent: i32,
    },
    /// Wall segment.
    Wall {
        /// Remaining hit points.
        hp: u32,
    },
}

/// One map tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Cell {
    /// Ground type.
    pub terrain: Terrain,
    /// Field, wall, or nothing.
    pub overlay: Overlay,
    /// Structure covering this cell.
    pub building: Option<EntityId>,
    /// Ground units standing here.
    pub units: u8,
}

impl Cell {
    /// Resource level, if this is a field.
    #[must_use]
    pub const fn field_level(&self) -> Option<u8> {
        match self.overlay {
            Overlay::Field { level, .. } => Some(level),
            _ => None,
        }
    }

    /// Whether a wall blocks the cell.
    #[must_use]
    pub const fn has_wall(&self) -> bool {
        matches!(self.overlay, Overlay::Wall { .. })
    }
}

/// The map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    width: i32,
    height: i32,
    cells: Vec<Cell>,
}

impl Grid {
    /// Create a map of clear terrain.
    ///
    /// # Panics
    ///
    /// Panics if either dimension is zero.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        assert!(width > 0 && height > 0, "Grid dimensions must be positive");
        let width = i32::try_from(width).unwrap_or(i32::MAX);
        let height = i32::try_from(height).unwrap_or(i32::MAX);
        let count = (width as usize) * (height as usize);
        Self {
            width,
            height,
            cells: vec![Cell::default(); count],
        }
    }

    /// Width in cells.
    #[must_use]
    pub const fn width(&self) -> i32 {
        self.width
    }

    /// Height in cells.
    #[must_use]
    pub const fn height(&self) -> i32 {
        self.height
    }

    /// Total number of cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Always false; a grid has at least one cell.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Whether a coordinate is on the map.
    #[must_use]
    pub const fn in_bounds(&self, cell: CellCoord) -> bool {
        cell.x >= 0 && cell.y >= 0 && cell.x < self.width && cell.y < self.height
    }

    /// Row-major index of an on-map coordinate.
    #[must_use]
    pub fn index(&self, cell: CellCoord) -> Option<usize> {
        if self.in_bounds(cell) {
            Some((cell.y as usize) * (self.width as usize) + (cell.x as usize))
        } else {
            None
        }
    }

    /// Coordinate for a row-major index.
    #[must_use]
    pub fn coord(&self, index: usize) -> CellCoord {
        let width = self.width as usize;
        CellCoord::new((index % width) as i32, (index / width) as i32)
    }

    /// Clamp a coordinate onto the map.
    #[must_use]
    pub fn clamp(&self, cell: CellCoord) -> CellCoord {
        CellCoord::new(
            cell.x.clamp(0, self.width - 1),
            cell.y.clamp(0, self.height - 1),
        )
    }

    /// Borrow a cell.
    #[must_use]
    pub fn cell(&self, cell: CellCoord) -> Option<&Cell> {
        self.index(cell).and_then(|i| self.cells.get(i))
    }

    /// Mutably borrow a cell.
    pub fn cell_mut(&mut self, cell: CellCoord) -> Option<&mut Cell> {
        let index = self.index(cell)?;
        self.cells.get_mut(index)
    }

    /// Set the terrain of a cell. Off-map coordinates are ignored.
    pub fn set_terrain(&mut self, cell: CellCoord, terrain: Terrain) {
        if let Some(c) = self.cell_mut(cell) {
            c.terrain = terrain;
        }
    }

    // ------------------------------------------------------------------------
    // Passability
    // ------------------------------------------------------------------------

    /// Whether a unit of this locomotion may enter the cell.
    #[must_use]
    pub fn is_passable(&self, cell: CellCoord, locomotion: Locomotion) -> bool {
        let Some(c) = self.cell(cell) else {
            return false;
        };
        if locomotion == Locomotion::Fly {
            return true;
        }
        c.terrain.passable_for(locomotion) && !c.has_wall() && c.building.is_none()
    }

    /// Passable and no ground unit standing there.
    #[must_use]
    pub fn is_free(&self, cell: CellCoord, locomotion: Locomotion) -> bool {
        self.is_passable(cell, locomotion) && self.cell(cell).is_some_and(|c| c.units == 0)
    }

    /// On-map cells exactly `radius` steps away (Chebyshev), row-major.
    #[must_use]
    pub fn ring(&self, center: CellCoord, radius: i32) -> Vec<CellCoord> {
        if radius == 0 {
            return if self.in_bounds(center) {
                vec![center]
            } else {
                Vec::new()
            };
        }
        let mut cells = Vec::with_capacity((radius as usize) * 8);
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx.abs() != radius && dy.abs() != radius {
                    continue;
                }
                let cell = center.offset(dx, dy);
                if self.in_bounds(cell) {
                    cells.push(cell);
                }
            }
        }
        cells
    }

    /// The cell itself if passable, else the first passable cell found on
    /// rings of radius `1..=max_radius`.
    #[must_use]
    pub fn nearest_passable(
        &self,
        cell: CellCoord,
        locomotion: Locomotion,
        max_radius: i32,
    ) -> Option<CellCoord> {
        if self.is_passable(cell, locomotion) {
            return Some(cell);
        }
        (1..=max_radius).find_map(|radius| {
            self.ring(cell, radius)
                .into_iter()
                .find(|c| self.is_passable(*c, locomotion))
        })
    }

    /// On-map neighbours in [`DIRECTIONS`] order.
    pub fn neighbours(&self, cell: CellCoord) -> impl Iterator<Item = CellCoord> + '_ {
        DIRECTIONS
            .iter()
            .map(move |&(dx, dy)| cell.offset(dx, dy))
            .filter(move |c| self.in_bounds(*c))
    }

    // ------------------------------------------------------------------------
    // Occupancy
    // ------------------------------------------------------------------------

    /// Structure on a cell.
    #[must_use]
    pub fn building_at(&self, cell: CellCoord) -> Option<EntityId> {
        self.cell(cell).and_then(|c| c.building)
    }

    /// Mark or clear a structure on a cell.
    pub fn set_building(&mut self, cell: CellCoord, building: Option<EntityId>) {
        if let Some(c) = self.cell_mut(cell) {
            c.building = building;
        }
    }

    /// Forget every unit count. Followed by [`Grid::add_unit`] per unit.
    pub fn clear_units(&mut self) {
        for cell in &mut self.cells {
            cell.units = 0;
        }
    }

    /// Count a ground unit on a cell.
    pub fn add_unit(&mut self, cell: CellCoord) {
        if let Some(c) = self.cell_mut(cell) {
            c.units = c.units.saturating_add(1);
        }
    }

    // ------------------------------------------------------------------------
    // Fields
    // ------------------------------------------------------------------------

    /// Resource level of a field cell.
    #[must_use]
    pub fn field_level(&self, cell: CellCoord) -> Option<u8> {
        self.cell(cell).and_then(Cell::field_level)
    }

    /// Turn a cell into a fresh field at `level`.
    pub fn set_field(&mut self, cell: CellCoord, level: u8) {
        if let Some(c) = self.cell_mut(cell) {
            c.overlay = Overlay::Field { level, spent: 0 };
        }
    }

    /// Units left in a field cell.
    #[must_use]
    pub fn field_units(&self, cell: CellCoord, units_per_level: i32) -> i32 {
        match self.cell(cell).map(|c| c.overlay) {
            Some(Overlay::Field { level, spent }) => {
                (i32::from(level) + 1) * units_per_level - spent
            }
            _ => 0,
        }
    }

    /// Take up to `amount` units from a field, dropping levels as they are
    /// used up and removing the overlay when the last level is gone.
    ///
    /// Returns the units actually taken.
    pub fn harvest(&mut self, cell: CellCoord, amount: i32, units_per_level: i32) -> i32 {
        let units_per_level = units_per_level.max(1);
        let Some(c) = self.cell_mut(cell) else {
            return 0;
        };
        let Overlay::Field { mut level, mut spent } = c.overlay else {
            return 0;
        };

        let available = (i32::from(level) + 1) * units_per_level - spent;
        let taken = amount.clamp(0, available);
        spent += taken;
        while spent >= units_per_level {
            spent -= units_per_level;
            if level == 0 {
                c.overlay = Overlay::None;
                return taken;
            }
            level -= 1;
        }
        c.overlay = Overlay::Field { level, spent };
        taken
    }

    /// Knock a field down one level; level 0 fields vanish.
    ///
    /// Returns `true` if the cell held a field.
    pub fn reduce_field(&mut self, cell: CellCoord) -> bool {
        let Some(c) = self.cell_mut(cell) else {
            return false;
        };
        match c.overlay {
            Overlay::Field { level: 0, .. } => {
                c.overlay = Overlay::None;
                true
            }
            Overlay::Field { level, spent } => {
                c.overlay = Overlay::Field {
                    level: level - 1,
                    spent,
                };
                true
            }
            _ => false,
        }
    }

    /// Raise a field one level, up to `max_level`. Returns the new level.
    pub fn grow_field(&mut self, cell: CellCoord, max_level: u8) -> Option<u8> {
        let c = self.cell_mut(cell)?;
        match c.overlay {
            Overlay::Field { level, spent } if level < max_level => {
                c.overlay = Overlay::Field {
                    level: level + 1,
                    spent,
                };
                Some(level + 1)
            }
            _ => None,
        }
    }

    /// Number of the eight neighbours holding a field.
    #[must_use]
    pub fn adjacent_fields(&self, cell: CellCoord) -> u32 {
        let count = self
            .neighbours(cell)
            .filter(|c| self.field_level(*c).is_some())
            .count();
        u32::try_from(count).unwrap_or(8)
    }

    /// Every field cell in row-major order.
    pub fn field_cells(&self) -> impl Iterator<Item = (CellCoord, u8)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter_map(move |(i, c)| c.field_level().map(|level| (self.coord(i), level)))
    }

    // ------------------------------------------------------------------------
    // Walls
    // ------------------------------------------------------------------------

    /// Place a wall segment.
    pub fn set_wall(&mut self, cell: CellCoord, hp: u32) {
        if let Some(c) = self.cell_mut(cell) {
            c.overlay = Overlay::Wall { hp };
        }
    }

    /// Damage a wall. Returns `true` when the segment is destroyed.
    pub fn damage_wall(&mut self, cell: CellCoord, damage: u32) -> bool {
        let Some(c) = self.cell_mut(cell) else {
            return false;
        };
        let Overlay::Wall { hp } = c.overlay else {
            return false;
        };
        if damage >= hp {
            c.overlay = Overlay::None;
            true
        } else {
            c.overlay = Overlay::Wall { hp: hp - damage };
            false
        }
    }
}
