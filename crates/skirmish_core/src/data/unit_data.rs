//! Unit data structures for data-driven unit definitions.

use serde::{Deserialize, Serialize};

use super::building_data::FactoryKind;
use super::weapon_data::ArmorType;
use crate::grid::Locomotion;
use crate::world::EntityKind;

/// Broad category of a mobile unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UnitClass {
    /// Foot soldier; subject to fear, prone, and field damage.
    Infantry,
    /// Ground vehicle.
    Vehicle,
    /// Aircraft; takes off, lands, rearms on pads.
    Aircraft,
}

impl UnitClass {
    /// Entity kind tag for spawned units of this class.
    #[must_use]
    pub const fn entity_kind(self) -> EntityKind {
        match self {
            Self::Infantry => EntityKind::Infantry,
            Self::Vehicle => EntityKind::Vehicle,
            Self::Aircraft => EntityKind::Aircraft,
        }
    }

    /// Factory type that produces this class.
    #[must_use]
    pub const fn factory(self) -> FactoryKind {
        match self {
            Self::Infantry => FactoryKind::Infantry,
            Self::Vehicle => FactoryKind::Vehicle,
            Self::Aircraft => FactoryKind::Aircraft,
        }
    }
}

/// Harvesting capability.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct HarvesterStats {
    /// Maximum resource load.
    pub capacity: i32,
    /// Units gathered per tick.
    pub rate: i32,
}

/// Data-driven unit definition.
///
/// # Example RON
///
/// ```ron
/// UnitData(
///     id: "light_tank",
///     class: Vehicle,
///     cost: 700,
///     build_time: 120,
///     health: 300,
///     armor: Heavy,
///     speed: 24,
///     locomotion: Track,
///     turret_rot: Some(2),
///     primary_weapon: Some("cannon_75mm"),
///     sight: 4,
///     prerequisites: ["war_factory"],
/// )
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitData {
    /// Unique string identifier for this unit type.
    pub id: String,

    /// Infantry, vehicle, or aircraft.
    pub class: UnitClass,

    /// Credits to produce.
    pub cost: i32,

    /// Production time in ticks at full power.
    pub build_time: u32,

    /// Maximum hit points.
    pub health: u32,

    /// Armor class for warhead modifiers.
    #[serde(default)]
    pub armor: ArmorType,

    /// Leptons travelled per tick.
    pub speed: i32,

    /// How the unit crosses terrain.
    pub locomotion: Locomotion,

    /// Turret rotation per tick, in facing steps. `None` for turretless units.
    #[serde(default)]
    pub turret_rot: Option<u8>,

    /// Main weapon.
    #[serde(default)]
    pub primary_weapon: Option<String>,

    /// Backup weapon, used when the primary cannot engage the target layer.
    #[serde(default)]
    pub secondary_weapon: Option<String>,

    /// Ammunition; `-1` is unlimited.
    #[serde(default = "unlimited_ammo")]
    pub ammo: i32,

    /// Sight radius in cells.
    #[serde(default = "default_sight")]
    pub sight: i32,

    /// Harvesting capability.
    #[serde(default)]
    pub harvester: Option<HarvesterStats>,

    /// Passenger slots.
    #[serde(default)]
    pub passengers: u32,

    /// Can cloak when idle.
    #[serde(default)]
    pub cloakable: bool,

    /// Reveals cloaked enemies within sight.
    #[serde(default)]
    pub detects_cloaked: bool,

    /// Flees instead of going prone.
    #[serde(default)]
    pub fraidy_cat: bool,

    /// Unharmed by resource fields.
    #[serde(default)]
    pub field_immune: bool,

    /// Can capture enemy buildings.
    #[serde(default)]
    pub can_capture: bool,

    /// Building this unit unpacks into.
    #[serde(default)]
    pub deploys_into: Option<String>,

    /// Building types the owner must have.
    #[serde(default)]
    pub prerequisites: Vec<String>,

    /// Maximum alive at once per house.
    #[serde(default)]
    pub build_limit: Option<u32>,
}

const fn unlimited_ammo() -> i32 {
    -1
}

const fn default_sight() -> i32 {
    3
}

impl UnitData {
    /// Check if this unit can engage in combat.
    #[must_use]
    pub fn is_combatant(&self) -> bool {
        self.primary_weapon.is_some() || self.secondary_weapon.is_some()
    }

    /// Check if this unit can carry others.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        self.passengers > 0
    }

    /// Minimal definition for tests and tooling; fill in the rest with
    /// struct update syntax.
    #[must_use]
    pub fn basic(id: &str, class: UnitClass, locomotion: Locomotion) -> Self {
        Self {
            id: id.to_string(),
            class,
            cost: 100,
            build_time: 60,
            health: 100,
            armor: ArmorType::Unarmored,
            speed: 16,
            locomotion,
            turret_rot: None,
            primary_weapon: None,
            secondary_weapon: None,
            ammo: -1,
            sight: 3,
            harvester: None,
            passengers: 0,
            cloakable: false,
            detects_cloaked: false,
            fraidy_cat: false,
            field_immune: false,
            can_capture: false,
            deploys_into: None,
            prerequisites: Vec::new(),
            build_limit: None,
        }
    }
}
