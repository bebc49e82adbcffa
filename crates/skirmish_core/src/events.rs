//! Typed messages emitted while a tick runs.
//!
//! Systems push [`SimEvent`]s instead of calling into each other's
//! presentation hooks. The queue is cleared at the start of every tick, so
//! after [`Simulation::tick`](crate::simulation::Simulation::tick) returns it
//! holds exactly that tick's events, in emission order.

use serde::{Deserialize, Serialize};

use crate::components::MissionKind;
use crate::data::FactoryKind;
use crate::grid::CellCoord;
use crate::house::HouseId;
use crate::world::{EntityId, EntityKind};

/// Something observable that happened during a tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimEvent {
    /// A weapon discharged.
    Fired {
        /// Shooter.
        attacker: EntityId,
        /// Intended victim.
        target: EntityId,
        /// Weapon type.
        weapon: String,
    },
    /// Hit points were lost.
    Damaged {
        /// Victim.
        target: EntityId,
        /// Hit points removed after armor.
        amount: u32,
        /// Source, if any.
        attacker: Option<EntityId>,
    },
    /// An entity was destroyed.
    Killed {
        /// The dead entity.
        entity: EntityId,
        /// Category, for picking a death sound or animation.
        kind: EntityKind,
        /// Previous owner.
        owner: Option<HouseId>,
        /// Who landed the final blow.
        killer: Option<EntityId>,
    },
    /// A unit's mission changed.
    MissionChanged {
        /// Unit.
        entity: EntityId,
        /// New mission.
        mission: MissionKind,
    },
    /// A factory finished its item.
    ProductionComplete {
        /// Factory.
        factory: EntityId,
        /// Finished type.
        type_name: String,
    },
    /// A unit left a factory or was granted with a building.
    UnitSpawned {
        /// New unit.
        entity: EntityId,
        /// Producing building, if any.
        factory: Option<EntityId>,
    },
    /// A structure was placed on the map.
    BuildingPlaced {
        /// New building.
        entity: EntityId,
        /// Owner.
        house: HouseId,
    },
    /// A building changed hands.
    Captured {
        /// Building.
        building: EntityId,
        /// Previous owner.
        from: Option<HouseId>,
        /// New owner.
        to: HouseId,
    },
    /// The primary factory of a production line changed.
    PrimaryChanged {
        /// House.
        house: HouseId,
        /// Production line.
        kind: FactoryKind,
        /// New primary, or `None` when the line has no factory left.
        factory: Option<EntityId>,
    },
    /// Harvested resources turned into credits.
    CreditsDeposited {
        /// House.
        house: HouseId,
        /// Credits actually added after the storage cap.
        amount: i32,
    },
    /// A passenger climbed into a transport.
    Boarded {
        /// Transport.
        transport: EntityId,
        /// Passenger.
        passenger: EntityId,
    },
    /// A passenger left a transport.
    Unloaded {
        /// Transport.
        transport: EntityId,
        /// Passenger.
        passenger: EntityId,
    },
    /// A resource field gained a level.
    FieldGrew {
        /// Cell.
        cell: CellCoord,
        /// New level.
        level: u8,
    },
    /// A resource field seeded a neighbour.
    FieldSpread {
        /// Parent cell.
        from: CellCoord,
        /// New field.
        to: CellCoord,
    },
    /// A wall segment was knocked down.
    WallDestroyed {
        /// Cell.
        cell: CellCoord,
    },
    /// A scheduled order failed validation.
    OrderRejected {
        /// Issuer.
        house: HouseId,
        /// Why.
        reason: String,
    },
}
