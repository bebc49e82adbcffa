//! Component definitions.
//!
//! Every entity carries a [`Transform`]; the rest are optional and owned by
//! value. Cross-entity references are plain [`EntityId`]s and must go
//! through [`World::resolve`](crate::world::World::resolve) before use.

use serde::{Deserialize, Serialize};

use crate::data::{ArmorType, FactoryKind};
use crate::grid::{CellCoord, Locomotion};
use crate::math::{fixed_serde, Fixed, Vec2Fixed};
use crate::world::EntityId;

// ============================================================================
// Spatial
// ============================================================================

/// Position in leptons and body facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Transform {
    /// Position in leptons.
    pub position: Vec2Fixed,
    /// Fine facing, 0-31, 0 = north.
    pub facing: u8,
}

impl Transform {
    /// Transform at the center of a cell.
    #[must_use]
    pub fn at_cell(cell: CellCoord) -> Self {
        Self {
            position: cell.center(),
            facing: 0,
        }
    }

    /// Cell containing the position.
    #[must_use]
    pub fn cell(&self) -> CellCoord {
        CellCoord::from_position(self.position)
    }

    /// Coarse facing, 0-7.
    #[must_use]
    pub const fn coarse_facing(&self) -> u8 {
        self.facing / 4
    }
}

/// Ground or air movement along a cell path.
///
/// The path and the moving flag change together: a non-empty path means
/// moving, an empty one means stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mobile {
    /// Leptons per tick at full speed.
    #[serde(with = "fixed_serde")]
    pub speed: Fixed,
    /// Terrain class used for passability.
    pub locomotion: Locomotion,
    /// Speed percentage; 50 while crawling.
    pub speed_percent: u32,
    path: Vec<CellCoord>,
    cursor: usize,
    moving: bool,
    destination: Option<CellCoord>,
}

impl Mobile {
    /// Create an idle mover.
    #[must_use]
    pub fn new(speed: Fixed, locomotion: Locomotion) -> Self {
        Self {
            speed,
            locomotion,
            speed_percent: 100,
            path: Vec::new(),
            cursor: 0,
            moving: false,
            destination: None,
        }
    }

    /// Replace the active path. An empty path stops the unit.
    pub fn set_path(&mut self, path: Vec<CellCoord>) {
        if path.is_empty() {
            self.clear_path();
            return;
        }
        self.destination = path.last().copied();
        self.path = path;
        self.cursor = 0;
        self.moving = true;
    }

    /// Drop the path and stop.
    pub fn clear_path(&mut self) {
        self.path.clear();
        self.cursor = 0;
        self.moving = false;
        self.destination = None;
    }

    /// Step past the current node, stopping at the end of the path.
    pub fn advance(&mut self) {
        self.cursor += 1;
        if self.cursor >= self.path.len() {
            self.clear_path();
        }
    }

    /// Whether the unit is following a path.
    #[must_use]
    pub const fn is_moving(&self) -> bool {
        self.moving
    }

    /// Cell the unit is heading toward right now.
    #[must_use]
    pub fn next_node(&self) -> Option<CellCoord> {
        self.path.get(self.cursor).copied()
    }

    /// Final cell of the active path.
    #[must_use]
    pub const fn destination(&self) -> Option<CellCoord> {
        self.destination
    }

    /// Nodes not yet reached.
    #[must_use]
    pub fn remaining(&self) -> &[CellCoord] {
        self.path.get(self.cursor..).unwrap_or(&[])
    }

    /// Distance covered this tick after speed modifiers.
    #[must_use]
    pub fn step_distance(&self) -> Fixed {
        self.speed * Fixed::from_num(self.speed_percent) / Fixed::from_num(100)
    }
}

// ============================================================================
// Combat
// ============================================================================

/// Weapons, ammunition, and the current target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Combat {
    /// Main weapon id.
    pub primary: Option<String>,
    /// Backup weapon id.
    pub secondary: Option<String>,
    /// Reach of the longest weapon, in leptons.
    #[serde(with = "fixed_serde")]
    pub range: Fixed,
    /// Rounds left; `-1` is unlimited.
    pub ammo: i32,
    /// Magazine size; `-1` is unlimited.
    pub max_ammo: i32,
    /// Current target. Weak; revalidate every tick.
    pub target: Option<EntityId>,
    /// Ticks until the next shot.
    pub rearm: u32,
}

impl Combat {
    /// Combat component with an unlimited magazine.
    #[must_use]
    pub fn new(primary: Option<String>, range: Fixed) -> Self {
        Self {
            primary,
            secondary: None,
            range,
            ammo: -1,
            max_ammo: -1,
            target: None,
            rearm: 0,
        }
    }

    /// Set a finite magazine.
    #[must_use]
    pub fn with_ammo(mut self, ammo: i32) -> Self {
        self.ammo = ammo;
        self.max_ammo = ammo;
        self
    }

    /// Whether at least one round is available.
    #[must_use]
    pub const fn has_ammo(&self) -> bool {
        self.ammo != 0
    }

    /// Use up a round. Unlimited magazines are untouched.
    pub fn consume_ammo(&mut self) {
        if self.ammo > 0 {
            self.ammo -= 1;
        }
    }
}

/// Hit points and armor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    /// Current hit points, in `0..=max_hp`.
    pub hp: u32,
    /// Maximum hit points.
    pub max_hp: u32,
    /// Armor class.
    pub armor: ArmorType,
}

impl Health {
    /// Full health.
    #[must_use]
    pub const fn new(max_hp: u32, armor: ArmorType) -> Self {
        Self {
            hp: max_hp,
            max_hp,
            armor,
        }
    }

    /// Subtract damage, clamped at zero.
    ///
    /// Returns `true` only on the call that takes hp from above zero to zero.
    pub fn apply_damage(&mut self, amount: u32) -> bool {
        if self.hp == 0 {
            return false;
        }
        self.hp = self.hp.saturating_sub(amount);
        self.hp == 0
    }

    /// Restore hit points, clamped at the maximum.
    pub fn heal(&mut self, amount: u32) {
        self.hp = self.hp.saturating_add(amount).min(self.max_hp);
    }

    /// Whole percentage of health left.
    #[must_use]
    pub fn percent(&self) -> u32 {
        if self.max_hp == 0 {
            return 0;
        }
        self.hp * 100 / self.max_hp
    }

    /// No hit points left.
    #[must_use]
    pub const fn is_dead(&self) -> bool {
        self.hp == 0
    }

    /// Below maximum.
    #[must_use]
    pub const fn is_damaged(&self) -> bool {
        self.hp < self.max_hp
    }
}

/// Turret with its own facing and a per-tick rotation limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turret {
    /// Fine facing, 0-31.
    pub facing: u8,
    /// Facing steps per tick.
    pub rot: u8,
}

// ============================================================================
// Missions
// ============================================================================

/// The closed set of AI behaviors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MissionKind {
    /// Do nothing until ordered.
    Sleep,
    /// Halt, then guard.
    Stop,
    /// Hold position, engage anything in range.
    #[default]
    Guard,
    /// Guard, but chase and return to an anchor point.
    GuardArea,
    /// Attack a specific target.
    Attack,
    /// Travel to a destination.
    Move,
    /// Seek out enemies across the map.
    Hunt,
    /// Fall back to friendly buildings.
    Retreat,
    /// Lie in wait until a threat appears.
    Ambush,
    /// Gather resources.
    Harvest,
    /// Bring resources (or an aircraft) home.
    Return,
    /// Board a transport.
    Enter,
    /// Disgorge passengers.
    Unload,
    /// Take over a building.
    Capture,
}

/// Current mission plus mission-scoped scratch state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Mission {
    /// Active behavior.
    pub kind: MissionKind,
    /// Mission target (attack, enter, capture).
    pub target: Option<EntityId>,
    /// Ticks until the handler runs again.
    pub timer: u32,
    /// Move or retreat destination.
    pub destination: Option<CellCoord>,
    /// Guard-area anchor.
    pub anchor: Option<CellCoord>,
    /// Hunt patrol countdown.
    pub patrol_timer: u32,
}

impl Mission {
    /// Fresh mission with cleared scratch state.
    #[must_use]
    pub fn new(kind: MissionKind, target: Option<EntityId>) -> Self {
        Self {
            kind,
            target,
            ..Self::default()
        }
    }
}

// ============================================================================
// Economy
// ============================================================================

/// Refinery docking phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DockPhase {
    /// Driving to the refinery.
    #[default]
    Approaching,
    /// Pulling into the bay.
    Docking,
    /// Transferring load to credits.
    Unloading,
    /// Backing out.
    Undocking,
    /// Done; resume harvesting.
    Complete,
}

/// Resource gathering state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Harvester {
    /// Current load, in `0..=max_load`.
    pub load: i32,
    /// Capacity.
    pub max_load: i32,
    /// Units gathered per tick.
    pub rate: i32,
    /// Refinery being returned to. Weak.
    pub refinery: Option<EntityId>,
    /// Docking phase.
    pub dock: DockPhase,
    /// Countdown within the phase.
    pub dock_timer: u32,
}

impl Harvester {
    /// Empty harvester.
    #[must_use]
    pub const fn new(max_load: i32, rate: i32) -> Self {
        Self {
            load: 0,
            max_load,
            rate,
            refinery: None,
            dock: DockPhase::Approaching,
            dock_timer: 0,
        }
    }

    /// Room left.
    #[must_use]
    pub const fn space(&self) -> i32 {
        self.max_load - self.load
    }

    /// Load is at capacity.
    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.load >= self.max_load
    }

    /// Add up to `amount`, returning what fit.
    pub fn add_load(&mut self, amount: i32) -> i32 {
        let taken = amount.clamp(0, self.space());
        self.load += taken;
        taken
    }

    /// Remove up to `amount`, returning what came off.
    pub fn take_load(&mut self, amount: i32) -> i32 {
        let taken = amount.clamp(0, self.load);
        self.load -= taken;
        taken
    }

    /// Reset docking to its initial phase.
    pub fn reset_dock(&mut self) {
        self.dock = DockPhase::Approaching;
        self.dock_timer = 0;
    }
}

// ============================================================================
// Structures
// ============================================================================

/// Footprint and repair state of a structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Building {
    /// Top-left cell of the footprint.
    pub origin: CellCoord,
    /// Size in cells (width, height).
    pub footprint: (i32, i32),
    /// Repair toggle.
    pub repairing: bool,
    /// Ticks to the next repair step.
    pub repair_timer: u32,
    /// Harvester currently using the dock.
    pub dock_occupant: Option<EntityId>,
}

impl Building {
    /// Building with the given footprint.
    #[must_use]
    pub const fn new(origin: CellCoord, footprint: (i32, i32)) -> Self {
        Self {
            origin,
            footprint,
            repairing: false,
            repair_timer: 0,
            dock_occupant: None,
        }
    }

    /// Every cell covered, row by row.
    pub fn cells(&self) -> impl Iterator<Item = CellCoord> {
        let origin = self.origin;
        let (w, h) = self.footprint;
        (0..h).flat_map(move |dy| (0..w).map(move |dx| CellCoord::new(origin.x + dx, origin.y + dy)))
    }

    /// Whether `cell` is inside the footprint.
    #[must_use]
    pub const fn contains(&self, cell: CellCoord) -> bool {
        cell.x >= self.origin.x
            && cell.y >= self.origin.y
            && cell.x < self.origin.x + self.footprint.0
            && cell.y < self.origin.y + self.footprint.1
    }

    /// Chebyshev gap from `cell` to the footprint; 0 inside, 1 adjacent.
    #[must_use]
    pub fn gap_to(&self, cell: CellCoord) -> i32 {
        let max_x = self.origin.x + self.footprint.0 - 1;
        let max_y = self.origin.y + self.footprint.1 - 1;
        let dx = (self.origin.x - cell.x).max(cell.x - max_x).max(0);
        let dy = (self.origin.y - cell.y).max(cell.y - max_y).max(0);
        dx.max(dy)
    }

    /// Cell where harvesters dock: just below the middle of the footprint.
    #[must_use]
    pub const fn dock_cell(&self) -> CellCoord {
        CellCoord::new(
            self.origin.x + self.footprint.0 / 2,
            self.origin.y + self.footprint.1,
        )
    }

    /// Lepton position of the footprint center.
    #[must_use]
    pub fn center(&self) -> Vec2Fixed {
        let cell = crate::math::LEPTONS_PER_CELL;
        Vec2Fixed::from_leptons(
            self.origin.x * cell + self.footprint.0 * cell / 2,
            self.origin.y * cell + self.footprint.1 * cell / 2,
        )
    }
}

/// Build progress of the single queued item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildState {
    /// Accumulating progress.
    InProgress,
    /// Finished unit waiting for this factory to become primary or for a
    /// free exit cell.
    Held,
    /// Finished building waiting for a placement order.
    ReadyToPlace,
}

/// The one item a factory works on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildItem {
    /// Type being built.
    pub type_name: String,
    /// Whether the item is a structure.
    pub is_building: bool,
    /// Ticks of progress, scaled by power.
    #[serde(with = "fixed_serde")]
    pub progress: Fixed,
    /// Ticks needed at full power.
    pub build_time: u32,
    /// Credits paid upfront.
    pub cost: i32,
    /// Lifecycle.
    pub state: BuildState,
}

impl BuildItem {
    /// Whole percentage complete.
    #[must_use]
    pub fn percent(&self) -> u32 {
        if self.build_time == 0 {
            return 100;
        }
        let pct = self.progress * Fixed::from_num(100) / Fixed::from_num(self.build_time);
        pct.to_num::<u32>().min(100)
    }

    /// Share of the upfront cost not yet turned into progress, rounded down.
    #[must_use]
    pub fn unspent_cost(&self) -> i32 {
        if self.build_time == 0 {
            return 0;
        }
        let total = Fixed::from_num(self.build_time);
        let left = total - self.progress.min(total);
        (Fixed::from_num(self.cost) * left / total).to_num::<i32>()
    }
}

/// Factory state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Production {
    /// Production line.
    pub kind: FactoryKind,
    /// Current item.
    pub item: Option<BuildItem>,
}

/// Passenger hold.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Cargo {
    /// Boarded entities in boarding order.
    pub passengers: Vec<EntityId>,
    /// Slots.
    pub capacity: u32,
}

impl Cargo {
    /// Empty hold with `capacity` slots.
    #[must_use]
    pub const fn new(capacity: u32) -> Self {
        Self {
            passengers: Vec::new(),
            capacity,
        }
    }

    /// Whether another passenger fits.
    #[must_use]
    pub fn has_room(&self) -> bool {
        self.passengers.len() < self.capacity as usize
    }
}

// ============================================================================
// Auxiliary
// ============================================================================

/// Cloaking phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CloakPhase {
    /// Fully visible.
    #[default]
    Uncloaked,
    /// Fading out.
    Cloaking,
    /// Invisible to enemies without a detector.
    Cloaked,
    /// Fading in.
    Decloaking,
}

/// Cloak state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Cloak {
    /// Phase.
    pub phase: CloakPhase,
    /// Countdown within the phase.
    pub timer: u32,
}

/// Flight phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FlightPhase {
    /// On the ground.
    #[default]
    Landed,
    /// Climbing.
    TakingOff,
    /// At altitude.
    Flying,
    /// Descending.
    Landing,
}

/// Aircraft state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Aircraft {
    /// Height in leptons.
    pub altitude: i32,
    /// Phase.
    pub phase: FlightPhase,
    /// Home landing pad. Weak.
    pub pad: Option<EntityId>,
    /// Ticks to the next restored round.
    pub rearm_timer: u32,
}

impl Aircraft {
    /// Off the ground.
    #[must_use]
    pub const fn is_airborne(&self) -> bool {
        self.altitude > 0
    }
}

/// Infantry morale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Infantry {
    /// Accumulated fear.
    pub fear: u32,
    /// Lying down.
    pub prone: bool,
    /// Running from danger.
    pub panicking: bool,
    /// Scatters instead of going prone.
    pub fraidy_cat: bool,
    /// Unharmed by resource fields.
    pub field_immune: bool,
}

impl Infantry {
    /// Stand up and forget the fear.
    pub fn reset_fear(&mut self) {
        self.fear = 0;
        self.prone = false;
        self.panicking = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mobile_path_invariant() {
        let mut mobile = Mobile::new(Fixed::from_num(16), Locomotion::Foot);
        assert!(!mobile.is_moving());

        mobile.set_path(vec![CellCoord::new(1, 0), CellCoord::new(2, 0)]);
        assert!(mobile.is_moving());
        assert_eq!(mobile.destination(), Some(CellCoord::new(2, 0)));

        mobile.advance();
        assert!(mobile.is_moving());
        assert_eq!(mobile.next_node(), Some(CellCoord::new(2, 0)));

        mobile.advance();
        assert!(!mobile.is_moving());
        assert!(mobile.remaining().is_empty());
        assert_eq!(mobile.destination(), None);

        mobile.set_path(Vec::new());
        assert!(!mobile.is_moving());
    }

    #[test]
    fn test_step_distance_honours_speed_percent() {
        let mut mobile = Mobile::new(Fixed::from_num(20), Locomotion::Foot);
        assert_eq!(mobile.step_distance(), Fixed::from_num(20));
        mobile.speed_percent = 50;
        assert_eq!(mobile.step_distance(), Fixed::from_num(10));
    }

    #[test]
    fn test_health_destroys_once() {
        let mut health = Health::new(100, ArmorType::Unarmored);
        assert!(!health.apply_damage(60));
        assert!(health.apply_damage(60));
        assert_eq!(health.hp, 0);
        assert!(!health.apply_damage(10));
        assert_eq!(health.percent(), 0);
    }

    #[test]
    fn test_heal_clamps_without_overflow() {
        let mut health = Health::new(300, ArmorType::Heavy);
        health.apply_damage(200);
        health.heal(50);
        assert_eq!(health.hp, 150);
        health.heal(u32::MAX);
        assert_eq!(health.hp, 300);
    }

    #[test]
    fn test_harvester_load_clamped() {
        let mut harvester = Harvester::new(500, 5);
        assert_eq!(harvester.add_load(450), 450);
        assert_eq!(harvester.add_load(100), 50);
        assert!(harvester.is_full());
        assert_eq!(harvester.take_load(600), 500);
        assert_eq!(harvester.load, 0);
    }

    #[test]
    fn test_ammo_consumption() {
        let mut limited = Combat::new(None, Fixed::from_num(512)).with_ammo(2);
        limited.consume_ammo();
        limited.consume_ammo();
        assert!(!limited.has_ammo());

        let mut unlimited = Combat::new(None, Fixed::from_num(512));
        unlimited.consume_ammo();
        assert!(unlimited.has_ammo());
        assert_eq!(unlimited.ammo, -1);
    }

    #[test]
    fn test_building_geometry() {
        let building = Building::new(CellCoord::new(4, 4), (3, 2));
        assert_eq!(building.cells().count(), 6);
        assert!(building.contains(CellCoord::new(6, 5)));
        assert!(!building.contains(CellCoord::new(7, 5)));
        assert_eq!(building.gap_to(CellCoord::new(5, 5)), 0);
        assert_eq!(building.gap_to(CellCoord::new(7, 6)), 1);
        assert_eq!(building.gap_to(CellCoord::new(2, 4)), 2);
        assert_eq!(building.dock_cell(), CellCoord::new(5, 6));
    }
}
