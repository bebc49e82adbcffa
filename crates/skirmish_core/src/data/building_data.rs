//! Building data structures for data-driven structure definitions.

use serde::{Deserialize, Serialize};

use super::weapon_data::ArmorType;

/// Which production line a factory feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FactoryKind {
    /// Barracks.
    Infantry,
    /// War factory.
    Vehicle,
    /// Helipad or airfield.
    Aircraft,
    /// Construction yard; produces buildings.
    Structure,
}

/// Data-driven building definition.
///
/// # Example RON
///
/// ```ron
/// BuildingData(
///     id: "refinery",
///     cost: 2000,
///     build_time: 300,
///     health: 900,
///     footprint: (3, 3),
///     power: -40,
///     storage: 2000,
///     refinery: true,
///     free_unit: Some("harvester"),
///     prerequisites: ["power_plant"],
/// )
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildingData {
    /// Unique string identifier for this building type.
    pub id: String,

    /// Credits to build.
    pub cost: i32,

    /// Construction time in ticks at full power.
    pub build_time: u32,

    /// Maximum hit points.
    pub health: u32,

    /// Armor class.
    #[serde(default = "default_armor")]
    pub armor: ArmorType,

    /// Size in cells (width, height).
    #[serde(default = "default_footprint")]
    pub footprint: (i32, i32),

    /// Power produced (positive) or consumed (negative).
    #[serde(default)]
    pub power: i32,

    /// Resource storage added to the owner's ledger.
    #[serde(default)]
    pub storage: i32,

    /// Production line this building runs, if any.
    #[serde(default)]
    pub factory: Option<FactoryKind>,

    /// Harvesters unload here.
    #[serde(default)]
    pub refinery: bool,

    /// Unit granted when the building is placed.
    #[serde(default)]
    pub free_unit: Option<String>,

    /// Aircraft land and rearm here.
    #[serde(default)]
    pub landing_pad: bool,

    /// Headquarters; the first one ignores adjacency rules.
    #[serde(default)]
    pub hq: bool,

    /// Infantry with the capture ability can take it over.
    #[serde(default = "default_capturable")]
    pub capturable: bool,

    /// Defensive weapon.
    #[serde(default)]
    pub primary_weapon: Option<String>,

    /// Turret rotation per tick, in facing steps.
    #[serde(default)]
    pub turret_rot: Option<u8>,

    /// Sight radius in cells.
    #[serde(default = "default_sight")]
    pub sight: i32,

    /// Reveals cloaked enemies within sight.
    #[serde(default)]
    pub detects_cloaked: bool,

    /// Building types the owner must have.
    #[serde(default)]
    pub prerequisites: Vec<String>,

    /// Maximum alive at once per house.
    #[serde(default)]
    pub build_limit: Option<u32>,
}

const fn default_armor() -> ArmorType {
    ArmorType::Concrete
}

const fn default_footprint() -> (i32, i32) {
    (1, 1)
}

const fn default_capturable() -> bool {
    true
}

const fn default_sight() -> i32 {
    2
}

impl BuildingData {
    /// Whether this building produces anything.
    #[must_use]
    pub fn is_factory(&self) -> bool {
        self.factory.is_some()
    }

    /// Minimal definition for tests and tooling.
    #[must_use]
    pub fn basic(id: &str, footprint: (i32, i32)) -> Self {
        Self {
            id: id.to_string(),
            cost: 500,
            build_time: 100,
            health: 500,
            armor: ArmorType::Concrete,
            footprint,
            power: 0,
            storage: 0,
            factory: None,
            refinery: false,
            free_unit: None,
            landing_pad: false,
            hq: false,
            capturable: true,
            primary_weapon: None,
            turret_rot: None,
            sight: 2,
            detects_cloaked: false,
            prerequisites: Vec::new(),
            build_limit: None,
        }
    }
}
