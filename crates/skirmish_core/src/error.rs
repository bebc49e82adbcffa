//! Error types for the simulation.
//!
//! Nothing in here is fatal to the tick loop. [`GameError`] covers data
//! loading, snapshots, and replays; [`OrderError`] is the reason string
//! handed back to whoever issued a rejected order.

use thiserror::Error;

use crate::house::HouseId;
use crate::world::EntityId;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for simulation setup and persistence.
#[derive(Debug, Error)]
pub enum GameError {
    /// Invalid entity reference.
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    /// Data file parsing error.
    #[error("Failed to parse data file '{path}': {message}")]
    DataParseError {
        /// Path to the file that failed to parse.
        path: String,
        /// Error message.
        message: String,
    },

    /// A data table references something that does not exist.
    #[error("Invalid data in '{owner}': {message}")]
    InvalidData {
        /// Type name holding the bad reference.
        owner: String,
        /// What is wrong.
        message: String,
    },

    /// Invalid game state.
    #[error("Invalid game state: {0}")]
    InvalidState(String),

    /// Desync detected between two runs or peers.
    #[error("Desync detected at tick {tick}: local hash {local_hash}, remote hash {remote_hash}")]
    DesyncDetected {
        /// Tick where desync occurred.
        tick: u64,
        /// Local simulation hash.
        local_hash: u64,
        /// Remote simulation hash.
        remote_hash: u64,
    },

    /// Filesystem failure while reading data or replays.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why an order was refused. No state is touched when this is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// The referenced entity is gone or never existed.
    #[error("unknown or dead entity {0}")]
    UnknownEntity(EntityId),

    /// The entity belongs to another house.
    #[error("entity {0} is not owned by the issuing house")]
    NotOwned(EntityId),

    /// The entity cannot carry out this kind of order.
    #[error("entity {entity} cannot {action}")]
    Incapable {
        /// Entity that was ordered.
        entity: EntityId,
        /// What it was asked to do.
        action: &'static str,
    },

    /// The type name has no data definition.
    #[error("unknown type '{0}'")]
    UnknownType(String),

    /// The issuing house does not exist.
    #[error("unknown house {0}")]
    UnknownHouse(HouseId),

    /// No factory can build the item.
    #[error("no factory available for '{0}'")]
    NoFactory(String),

    /// The factory already has an item.
    #[error("factory {0} is busy")]
    FactoryBusy(EntityId),

    /// Nothing to place, cancel, or spawn.
    #[error("factory {0} has nothing ready")]
    NothingReady(EntityId),

    /// A prerequisite building is missing.
    #[error("missing prerequisite '{0}'")]
    MissingPrerequisite(String),

    /// The per-type cap is reached.
    #[error("build limit reached for '{0}'")]
    BuildLimit(String),

    /// Not enough credits.
    #[error("insufficient credits: need {required}, have {available}")]
    InsufficientCredits {
        /// Amount required.
        required: i32,
        /// Amount available.
        available: i32,
    },

    /// Placement rules refused the location.
    #[error("cannot place here: {0}")]
    Placement(#[from] PlacementError),

    /// The destination cannot be reached.
    #[error("no route to destination")]
    Unreachable,
}

impl OrderError {
    /// Human-readable reason for the command issuer.
    #[must_use]
    pub fn reason(&self) -> String {
        self.to_string()
    }
}

/// Reasons a building footprint is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PlacementError {
    /// Part of the footprint lies outside the map.
    #[error("footprint out of bounds")]
    OutOfBounds,
    /// Terrain under the footprint is not buildable.
    #[error("terrain not buildable")]
    Terrain,
    /// A wall or resource field is in the way.
    #[error("overlay in the way")]
    Overlay,
    /// Another building occupies the footprint.
    #[error("building in the way")]
    Building,
    /// A unit stands in the footprint.
    #[error("unit in the way")]
    Unit,
    /// Too far from the house's other buildings.
    #[error("not adjacent to an owned building")]
    NotAdjacent,
}
