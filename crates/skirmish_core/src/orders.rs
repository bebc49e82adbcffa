//! Player and AI orders.
//!
//! Orders are the only way outside code changes the simulation once it is
//! running. Each one is validated against the current state before anything
//! is touched; a rejected order leaves the simulation exactly as it was.
//!
//! Lockstep peers exchange [`FrameOrder`]s and schedule them with
//! [`Simulation::schedule`]. The queue applies everything due at the start
//! of a tick, in frame order and then in arrival order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::auxiliary;
use crate::components::MissionKind;
use crate::error::OrderError;
use crate::events::SimEvent;
use crate::grid::CellCoord;
use crate::house::HouseId;
use crate::infantry;
use crate::mission::{capture_target, set_mission};
use crate::movement;
use crate::placement;
use crate::production;
use crate::simulation::Simulation;
use crate::world::{Entity, EntityId};

/// A command issued by a house.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Order {
    /// Travel to a cell.
    Move {
        /// Unit.
        unit: EntityId,
        /// Destination cell.
        destination: CellCoord,
    },
    /// Attack a specific entity.
    Attack {
        /// Attacker.
        unit: EntityId,
        /// Victim.
        target: EntityId,
    },
    /// Halt, then guard.
    Stop {
        /// Unit.
        unit: EntityId,
    },
    /// Hold position and engage anything in range.
    Guard {
        /// Unit.
        unit: EntityId,
    },
    /// Guard the current position with a leash.
    GuardArea {
        /// Unit.
        unit: EntityId,
    },
    /// Seek out enemies.
    Hunt {
        /// Unit.
        unit: EntityId,
    },
    /// Fall back to the nearest friendly building.
    Retreat {
        /// Unit.
        unit: EntityId,
    },
    /// Wait quietly until something comes into range.
    Ambush {
        /// Unit.
        unit: EntityId,
    },
    /// Start gathering resources.
    Harvest {
        /// Harvester.
        unit: EntityId,
    },
    /// Board a transport.
    Enter {
        /// Passenger.
        unit: EntityId,
        /// Transport.
        transport: EntityId,
    },
    /// Drop off every passenger.
    Unload {
        /// Transport.
        unit: EntityId,
    },
    /// Take over an enemy structure.
    Capture {
        /// Capturing unit.
        unit: EntityId,
        /// Structure.
        target: EntityId,
    },
    /// Turn a unit into its structure.
    Deploy {
        /// Unit.
        unit: EntityId,
    },
    /// Queue a unit or structure.
    Build {
        /// Type to build.
        type_name: String,
        /// Specific factory, or `None` for the default pick.
        factory: Option<EntityId>,
    },
    /// Abandon a factory's item with a partial refund.
    CancelBuild {
        /// Factory.
        factory: EntityId,
    },
    /// Place a finished structure.
    Place {
        /// Factory holding the structure.
        factory: EntityId,
        /// Top-left cell of the footprint.
        origin: CellCoord,
    },
    /// Make a factory the primary for its line.
    SetPrimary {
        /// Factory.
        factory: EntityId,
    },
    /// Toggle repair on a building.
    Repair {
        /// Building.
        building: EntityId,
    },
}

/// An order stamped with the frame it takes effect on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameOrder {
    /// Tick on which the order applies.
    pub frame: u64,
    /// Issuing house.
    pub house: HouseId,
    /// The order.
    pub order: Order,
}

impl FrameOrder {
    /// Stamp an order.
    #[must_use]
    pub const fn new(frame: u64, house: HouseId, order: Order) -> Self {
        Self { frame, house, order }
    }
}

/// Orders waiting for their frame, keyed by (frame, arrival sequence).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderQueue {
    pending: BTreeMap<(u64, u64), FrameOrder>,
    next_seq: u64,
}

impl OrderQueue {
    /// Add an order behind everything already queued for its frame.
    pub fn push(&mut self, order: FrameOrder) {
        let key = (order.frame, self.next_seq);
        self.next_seq += 1;
        self.pending.insert(key, order);
    }

    /// Remove and return every order due on or before `frame`, in order.
    pub fn pop_due(&mut self, frame: u64) -> Vec<FrameOrder> {
        let later = self.pending.split_off(&(frame + 1, 0));
        std::mem::replace(&mut self.pending, later)
            .into_values()
            .collect()
    }

    /// Number of waiting orders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Waiting orders in application order.
    pub fn iter(&self) -> impl Iterator<Item = &FrameOrder> {
        self.pending.values()
    }
}

/// Apply every order due this tick. Rejections become
/// [`SimEvent::OrderRejected`].
pub(crate) fn apply_due(sim: &mut Simulation) {
    for FrameOrder { house, order, .. } in sim.orders.pop_due(sim.tick) {
        if let Err(error) = apply(sim, house, &order) {
            debug!(tick = sim.tick, %house, ?order, %error, "Order rejected");
            sim.emit(SimEvent::OrderRejected {
                house,
                reason: error.reason(),
            });
        }
    }
}

// ============================================================================
// Validation
// ============================================================================

fn owned(sim: &Simulation, house: HouseId, id: EntityId) -> Result<&Entity, OrderError> {
    let entity = sim.world.get(id).ok_or(OrderError::UnknownEntity(id))?;
    if entity.owner == Some(house) {
        Ok(entity)
    } else {
        Err(OrderError::NotOwned(id))
    }
}

/// An owned unit that is not riding in a transport.
fn owned_unit(sim: &Simulation, house: HouseId, id: EntityId) -> Result<&Entity, OrderError> {
    let entity = owned(sim, house, id)?;
    if entity.mission.is_none() || entity.building.is_some() {
        return Err(OrderError::Incapable { entity: id, action: "take orders" });
    }
    if entity.is_transported() {
        return Err(OrderError::Incapable { entity: id, action: "act while carried" });
    }
    Ok(entity)
}

fn require(ok: bool, entity: EntityId, action: &'static str) -> Result<(), OrderError> {
    if ok {
        Ok(())
    } else {
        Err(OrderError::Incapable { entity, action })
    }
}

// ============================================================================
// Application
// ============================================================================

/// Validate `order` for `house` and apply it.
///
/// # Errors
///
/// Returns why the order was refused. Nothing changes in that case.
pub(crate) fn apply(sim: &mut Simulation, house: HouseId, order: &Order) -> Result<(), OrderError> {
    if !sim.houses.contains_key(&house) {
        return Err(OrderError::UnknownHouse(house));
    }
    match order {
        Order::Move { unit, destination } => {
            let entity = owned_unit(sim, house, *unit)?;
            require(entity.mobile.is_some(), *unit, "move")?;
            if !movement::move_to(sim, *unit, destination.center()) {
                return Err(OrderError::Unreachable);
            }
            infantry::calm(sim, *unit);
            set_mission(sim, *unit, MissionKind::Move, None);
            if let Some(mission) = sim.world.get_mut(*unit).and_then(|e| e.mission.as_mut()) {
                mission.destination = Some(*destination);
            }
        }
        Order::Attack { unit, target } => {
            let entity = owned_unit(sim, house, *unit)?;
            require(entity.combat.is_some(), *unit, "attack")?;
            if *target == *unit || !sim.world.is_alive(*target) {
                return Err(OrderError::UnknownEntity(*target));
            }
            set_mission(sim, *unit, MissionKind::Attack, Some(*target));
        }
        Order::Stop { unit } => simple(sim, house, *unit, MissionKind::Stop, false)?,
        Order::Guard { unit } => simple(sim, house, *unit, MissionKind::Guard, false)?,
        Order::GuardArea { unit } => simple(sim, house, *unit, MissionKind::GuardArea, true)?,
        Order::Hunt { unit } => simple(sim, house, *unit, MissionKind::Hunt, true)?,
        Order::Ambush { unit } => simple(sim, house, *unit, MissionKind::Ambush, true)?,
        Order::Retreat { unit } => {
            let entity = owned_unit(sim, house, *unit)?;
            require(entity.mobile.is_some(), *unit, "retreat")?;
            set_mission(sim, *unit, MissionKind::Retreat, None);
        }
        Order::Harvest { unit } => {
            let entity = owned_unit(sim, house, *unit)?;
            require(entity.harvester.is_some(), *unit, "harvest")?;
            set_mission(sim, *unit, MissionKind::Harvest, None);
        }
        Order::Enter { unit, transport } => {
            let entity = owned_unit(sim, house, *unit)?;
            require(
                entity.mobile.is_some() && entity.cargo.is_none() && unit != transport,
                *unit,
                "board",
            )?;
            let carrier = owned(sim, house, *transport)?;
            let room = carrier.cargo.as_ref().is_some_and(|c| c.has_room());
            require(room, *transport, "carry passengers")?;
            set_mission(sim, *unit, MissionKind::Enter, Some(*transport));
        }
        Order::Unload { unit } => {
            let entity = owned_unit(sim, house, *unit)?;
            let loaded = entity.cargo.as_ref().is_some_and(|c| !c.passengers.is_empty());
            require(loaded, *unit, "unload")?;
            set_mission(sim, *unit, MissionKind::Unload, None);
        }
        Order::Capture { unit, target } => {
            owned_unit(sim, house, *unit)?;
            if !sim.world.is_alive(*target) {
                return Err(OrderError::UnknownEntity(*target));
            }
            require(capture_target(sim, *unit, Some(*target)).is_some(), *unit, "capture")?;
            set_mission(sim, *unit, MissionKind::Capture, Some(*target));
        }
        Order::Deploy { unit } => {
            owned_unit(sim, house, *unit)?;
            placement::deploy(sim, house, *unit)?;
        }
        Order::Build { type_name, factory } => {
            production::queue_build(sim, house, type_name, *factory)?;
        }
        Order::CancelBuild { factory } => {
            production::cancel_build(sim, house, *factory)?;
        }
        Order::Place { factory, origin } => {
            placement::place_building(sim, house, *factory, *origin)?;
        }
        Order::SetPrimary { factory } => production::set_primary(sim, house, *factory)?,
        Order::Repair { building } => {
            let entity = owned(sim, house, *building)?;
            let repairable = entity.building.is_some_and(|b| b.repairing)
                || entity.health.is_some_and(|h| h.is_damaged());
            require(entity.building.is_some() && repairable, *building, "repair")?;
            auxiliary::toggle_repair(sim, *building);
        }
    }
    Ok(())
}

/// Missions that only need an owned unit, and possibly a weapon.
fn simple(
    sim: &mut Simulation,
    house: HouseId,
    unit: EntityId,
    kind: MissionKind,
    needs_weapon: bool,
) -> Result<(), OrderError> {
    let entity = owned_unit(sim, house, unit)?;
    if needs_weapon {
        require(entity.combat.is_some(), unit, "fight")?;
    }
    set_mission(sim, unit, kind, None);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::SimConfig;
    use crate::data::{Rules, UnitClass, UnitData};
    use crate::grid::{Locomotion, Terrain};

    fn sim() -> Simulation {
        let mut rules = Rules::default();
        rules.add_unit(UnitData {
            speed: 64,
            ..UnitData::basic("rifle", UnitClass::Infantry, Locomotion::Foot)
        });
        let mut sim = Simulation::new(16, 16, SimConfig::default(), Arc::new(rules));
        sim.add_house(HouseId(0), 0);
        sim.add_house(HouseId(1), 0);
        sim
    }

    #[test]
    fn test_queue_orders_by_frame_then_arrival() {
        let mut queue = OrderQueue::default();
        let stop = |n| Order::Stop { unit: EntityId(n) };
        queue.push(FrameOrder::new(5, HouseId(0), stop(1)));
        queue.push(FrameOrder::new(3, HouseId(0), stop(2)));
        queue.push(FrameOrder::new(5, HouseId(1), stop(3)));
        queue.push(FrameOrder::new(9, HouseId(0), stop(4)));

        let due: Vec<Order> = queue.pop_due(5).into_iter().map(|o| o.order).collect();
        assert_eq!(due, vec![stop(2), stop(1), stop(3)]);
        assert_eq!(queue.len(), 1);
        assert!(queue.pop_due(8).is_empty());
    }

    #[test]
    fn test_scheduled_move_applies_on_its_frame() {
        let mut sim = sim();
        let rifle = sim.spawn_unit("rifle", HouseId(0), CellCoord::new(1, 1)).unwrap();
        let destination = CellCoord::new(5, 1);
        sim.schedule(FrameOrder::new(2, HouseId(0), Order::Move { unit: rifle, destination }));

        sim.run(2);
        assert_eq!(sim.entity(rifle).unwrap().mission.as_ref().unwrap().kind, MissionKind::Guard);
        sim.tick();
        let mission = sim.entity(rifle).unwrap().mission.clone().unwrap();
        assert_eq!(mission.kind, MissionKind::Move);
        assert_eq!(mission.destination, Some(destination));
        assert!(sim.pending_orders().is_empty());
    }

    #[test]
    fn test_rejections_leave_state_untouched() {
        let mut sim = sim();
        let rifle = sim.spawn_unit("rifle", HouseId(0), CellCoord::new(1, 1)).unwrap();
        for cell in [(3, 0), (3, 1), (3, 2), (3, 3), (2, 3), (1, 3), (0, 3)] {
            sim.grid_mut().set_terrain(CellCoord::new(cell.0, cell.1), Terrain::Rock);
        }
        let before = sim.serialize().unwrap();
        let events = sim.events().len();

        let unreachable = Order::Move { unit: rifle, destination: CellCoord::new(10, 10) };
        assert_eq!(sim.apply(HouseId(0), &unreachable), Err(OrderError::Unreachable));
        assert_eq!(
            sim.apply(HouseId(1), &Order::Guard { unit: rifle }),
            Err(OrderError::NotOwned(rifle))
        );
        assert_eq!(
            sim.apply(HouseId(0), &Order::Hunt { unit: rifle }),
            Err(OrderError::Incapable { entity: rifle, action: "fight" })
        );
        assert_eq!(
            sim.apply(HouseId(0), &Order::Build { type_name: "tank".to_string(), factory: None }),
            Err(OrderError::UnknownType("tank".to_string()))
        );
        assert_eq!(
            sim.apply(HouseId(7), &Order::Stop { unit: rifle }),
            Err(OrderError::UnknownHouse(HouseId(7)))
        );
        assert_eq!(sim.serialize().unwrap(), before);
        assert_eq!(sim.events().len(), events);
    }

    #[test]
    fn test_rejected_scheduled_order_emits_reason() {
        let mut sim = sim();
        sim.schedule(FrameOrder::new(0, HouseId(0), Order::Stop { unit: EntityId(99) }));
        let events = sim.tick().to_vec();
        assert_eq!(
            events,
            vec![SimEvent::OrderRejected {
                house: HouseId(0),
                reason: OrderError::UnknownEntity(EntityId(99)).reason(),
            }]
        );
    }
}
