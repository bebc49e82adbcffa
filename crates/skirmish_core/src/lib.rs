//! # Skirmish Core
//!
//! Deterministic tactical simulation core for a classic base-building RTS.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No IO beyond loading data files and replays
//! - No system randomness
//! - No floating-point math (uses fixed-point)
//!
//! This separation enables:
//! - Lockstep multiplayer (identical simulation across clients)
//! - Headless batch runs
//! - Replay systems
//! - Determinism testing
//!
//! ## Crate Structure
//!
//! - [`simulation`] - Core tick loop and snapshots
//! - [`world`] - Entity arena and components
//! - [`grid`] - Cell map, terrain, resource fields
//! - [`orders`] - Player commands and frame scheduling
//! - [`data`] - RON rule tables
//! - [`snapshot`] - Read-only views for presentation layers
//! - [`math`] - Fixed-point math utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

mod auxiliary;
mod cargo;
mod economy;
mod infantry;

pub mod combat;
pub mod components;
pub mod config;
pub mod data;
pub mod error;
pub mod events;
pub mod fields;
pub mod grid;
pub mod house;
pub mod math;
pub mod mission;
pub mod movement;
pub mod orders;
pub mod pathfinding;
pub mod placement;
pub mod production;
pub mod projectiles;
pub mod replay;
pub mod rng;
pub mod scenario;
pub mod simulation;
pub mod snapshot;
pub mod targeting;
pub mod visibility;
pub mod world;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::components::*;
    pub use crate::config::SimConfig;
    pub use crate::data::{BuildingData, FactoryKind, Rules, UnitClass, UnitData, WeaponData};
    pub use crate::error::{GameError, OrderError, PlacementError, Result};
    pub use crate::events::SimEvent;
    pub use crate::grid::{CellCoord, Grid, Locomotion, Terrain};
    pub use crate::house::{House, HouseId};
    pub use crate::math::{Fixed, Vec2Fixed};
    pub use crate::orders::{FrameOrder, Order};
    pub use crate::replay::{Replay, ReplayPlayer, ReplayRecorder};
    pub use crate::scenario::Scenario;
    pub use crate::simulation::Simulation;
    pub use crate::snapshot::{AnimState, EntityView};
    pub use crate::world::{Entity, EntityId, EntityKind};
}
