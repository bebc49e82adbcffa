//! Weapon, projectile, and warhead definitions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Armor class used to look up warhead modifiers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub enum ArmorType {
    /// Unarmored, typically infantry.
    #[default]
    Unarmored,
    /// Light structures and fences.
    Wood,
    /// Light vehicles.
    Light,
    /// Tanks.
    Heavy,
    /// Hardened structures.
    Concrete,
}

/// How a projectile reaches its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectileKind {
    /// Flies to a fixed impact point.
    Ballistic,
    /// Tracks the target every tick.
    Homing,
    /// Hitscan; damage applies the moment the weapon fires.
    Invisible,
    /// Beam; instant damage with a visible beam effect.
    Laser,
}

impl ProjectileKind {
    /// Damage resolves on the firing tick.
    #[must_use]
    pub const fn is_instant(self) -> bool {
        matches!(self, Self::Invisible | Self::Laser)
    }
}

/// Weapon definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeaponData {
    /// Unique identifier.
    pub id: String,
    /// Base damage per shot.
    pub damage: i32,
    /// Maximum engagement distance in leptons.
    pub range: i32,
    /// Ticks between shots.
    pub rate_of_fire: u32,
    /// Projectile type id.
    pub projectile: String,
    /// Warhead type id.
    pub warhead: String,
    /// Can hit aircraft in flight.
    #[serde(default)]
    pub anti_air: bool,
    /// Can hit ground targets.
    #[serde(default = "yes")]
    pub anti_ground: bool,
}

/// Projectile definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectileData {
    /// Unique identifier.
    pub id: String,
    /// Leptons travelled per tick.
    #[serde(default)]
    pub speed: i32,
    /// Flight behavior.
    pub kind: ProjectileKind,
    /// Scatter around the aim point.
    #[serde(default)]
    pub inaccurate: bool,
    /// Maximum scatter in leptons per axis.
    #[serde(default)]
    pub scatter: i32,
}

/// Warhead definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarheadData {
    /// Unique identifier.
    pub id: String,
    /// Damage percentage per armor class; missing entries are 100.
    #[serde(default)]
    pub modifiers: BTreeMap<ArmorType, u32>,
    /// Splash radius in leptons; 0 means no splash.
    #[serde(default)]
    pub splash_radius: i32,
    /// Can knock down walls.
    #[serde(default)]
    pub destroys_walls: bool,
    /// Can burn away resource fields.
    #[serde(default)]
    pub destroys_fields: bool,
}

impl WarheadData {
    /// Damage percentage against an armor class.
    #[must_use]
    pub fn modifier(&self, armor: ArmorType) -> u32 {
        self.modifiers.get(&armor).copied().unwrap_or(100)
    }

    /// Whether impacts deal area damage.
    #[must_use]
    pub fn has_splash(&self) -> bool {
        self.splash_radius > 0
    }
}

const fn yes() -> bool {
    true
}
