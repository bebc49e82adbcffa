//! Simulation tunables.
//!
//! Everything here is part of the lockstep contract: peers must run with
//! identical values, so the config travels inside snapshots and replays.
//! Values load from RON with every field optional.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};

/// Base priority per target category used by threat scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreatWeights {
    /// Harvesters are the juiciest targets.
    pub harvester: i32,
    /// Foot soldiers.
    pub infantry: i32,
    /// Ground vehicles.
    pub vehicle: i32,
    /// Aircraft.
    pub aircraft: i32,
    /// Structures.
    pub building: i32,
    /// Bonus when the candidate is already attacking the scorer.
    pub retaliation: i32,
    /// Maximum proximity bonus, awarded at distance zero.
    pub proximity: i32,
    /// Bonus for a candidate below 25% health.
    pub critical_wound: i32,
    /// Bonus for a candidate below 50% health.
    pub wounded: i32,
}

impl Default for ThreatWeights {
    fn default() -> Self {
        Self {
            harvester: 60,
            infantry: 40,
            vehicle: 30,
            aircraft: 30,
            building: 10,
            retaliation: 100,
            proximity: 50,
            critical_wound: 15,
            wounded: 10,
        }
    }
}

/// Tunable constants for one simulation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Seed for the shared random stream.
    pub seed: u64,
    /// Logical ticks per second, used only to convert wall-clock figures.
    pub tick_rate: u32,

    /// A* expansion bound.
    pub path_search_limit: u32,
    /// Ring radius searched when snapping an impassable destination.
    pub nearest_passable_radius: i32,

    /// Ticks between resource-field damage pulses on infantry.
    pub field_damage_interval: u64,
    /// Hit points lost per pulse.
    pub field_damage: u32,

    /// Target scoring table.
    pub threat: ThreatWeights,
    /// Ticks between passive guard scans.
    pub guard_scan_interval: u32,
    /// Ticks between attack re-path checks.
    pub attack_repath_interval: u32,
    /// Shortest hunt patrol pause.
    pub patrol_delay_min: i32,
    /// Longest hunt patrol pause.
    pub patrol_delay_max: i32,
    /// Projectile proximity that counts as arrival, in leptons.
    pub projectile_arrival: i32,
    /// Ticks a death or muzzle effect stays in the effect list.
    pub effect_lifetime: u32,

    /// Fear at which infantry hit the dirt.
    pub prone_threshold: u32,
    /// Fear ceiling.
    pub fear_max: u32,
    /// Ticks between fear decay steps.
    pub fear_decay_interval: u64,
    /// Cells a fraidy-cat runs when scattering.
    pub scatter_distance: i32,

    /// Ticks between passengers leaving a transport.
    pub unload_delay: u32,

    /// Resource units contained in one field level.
    pub field_units_per_level: i32,
    /// Highest field level.
    pub field_max_level: u8,
    /// Radius searched by a harvester looking for a field.
    pub harvest_search_radius: i32,
    /// Credits per resource unit unloaded.
    pub credits_per_unit: i32,
    /// Units moved per unloading step.
    pub unload_step: i32,
    /// Ticks between unloading steps.
    pub unload_interval: u32,
    /// Ticks spent in the docking phase.
    pub docking_ticks: u32,
    /// Ticks spent in the undocking phase.
    pub undocking_ticks: u32,
    /// Storage every house has before buildings add to it.
    pub base_storage: i32,

    /// Ticks between growth passes.
    pub growth_interval: u64,
    /// Growth attempts per pass.
    pub growth_attempts: u32,
    /// Ticks between spread passes.
    pub spread_interval: u64,
    /// Spread attempts per pass.
    pub spread_attempts: u32,
    /// Minimum level a cell needs to spread.
    pub spread_min_level: u8,
    /// Growth chance with 0-2 neighbouring fields.
    pub growth_chance_sparse: u32,
    /// Growth chance with 3-4 neighbouring fields.
    pub growth_chance_medium: u32,
    /// Growth chance with 5 or more neighbouring fields.
    pub growth_chance_dense: u32,

    /// Cells of gap allowed between a new building and an owned one.
    pub adjacency_distance: i32,
    /// Ticks between repair steps.
    pub repair_interval: u32,
    /// Hit points restored per repair step.
    pub repair_step: u32,
    /// Credits charged per repair step.
    pub repair_cost: i32,

    /// Ticks to fully cloak or decloak.
    pub cloak_ticks: u32,
    /// Cruising altitude in leptons.
    pub flight_altitude: i32,
    /// Altitude change per tick while taking off or landing.
    pub climb_rate: i32,
    /// Ticks per ammo restored on a landing pad.
    pub aircraft_rearm_ticks: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            tick_rate: 15,

            path_search_limit: 1000,
            nearest_passable_radius: 10,

            field_damage_interval: 8,
            field_damage: 2,

            threat: ThreatWeights::default(),
            guard_scan_interval: 5,
            attack_repath_interval: 8,
            patrol_delay_min: 30,
            patrol_delay_max: 90,
            projectile_arrival: 16,
            effect_lifetime: 12,

            prone_threshold: 10,
            fear_max: 255,
            fear_decay_interval: 4,
            scatter_distance: 3,

            unload_delay: 15,

            field_units_per_level: 50,
            field_max_level: 11,
            harvest_search_radius: 24,
            credits_per_unit: 2,
            unload_step: 25,
            unload_interval: 2,
            docking_ticks: 10,
            undocking_ticks: 10,
            base_storage: 2000,

            growth_interval: 150,
            growth_attempts: 10,
            spread_interval: 300,
            spread_attempts: 5,
            spread_min_level: 6,
            growth_chance_sparse: 10,
            growth_chance_medium: 25,
            growth_chance_dense: 50,

            adjacency_distance: 1,
            repair_interval: 15,
            repair_step: 10,
            repair_cost: 5,

            cloak_ticks: 38,
            flight_altitude: 256,
            climb_rate: 16,
            aircraft_rearm_ticks: 30,
        }
    }
}

impl SimConfig {
    /// Config with the given seed and default tunables.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }

    /// Parse from a RON string; missing fields keep their defaults.
    pub fn from_ron_str(ron: &str) -> Result<Self> {
        ron::from_str(ron).map_err(|e| GameError::DataParseError {
            path: "<inline>".to_string(),
            message: e.to_string(),
        })
    }

    /// Load from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        ron::from_str(&contents).map_err(|e| GameError::DataParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Growth chance in percent for a given number of neighbouring fields.
    #[must_use]
    pub fn growth_chance(&self, neighbours: u32) -> u32 {
        match neighbours {
            0..=2 => self.growth_chance_sparse,
            3..=4 => self.growth_chance_medium,
            _ => self.growth_chance_dense,
        }
    }
}
