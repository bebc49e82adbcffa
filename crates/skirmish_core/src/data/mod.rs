//! Static definitions for units, buildings, weapons, projectiles, and
//! warheads.
//!
//! Everything here deserializes from RON and is treated as read-only once
//! a simulation is built. Missing definitions at runtime degrade to a
//! logged no-op, never a panic.

mod building_data;
mod rules;
mod unit_data;
mod weapon_data;

pub use building_data::{BuildingData, FactoryKind};
pub use rules::{Rules, RulesFile};
pub use unit_data::{HarvesterStats, UnitClass, UnitData};
pub use weapon_data::{ArmorType, ProjectileData, ProjectileKind, WarheadData, WeaponData};
