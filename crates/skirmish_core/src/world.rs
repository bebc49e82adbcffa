//! Entity storage.
//!
//! Entities live in an id-indexed arena. Ids are handed out in increasing
//! order and never reused, so "lowest id" also means "oldest". An entity
//! that dies has its liveness flag cleared at once but keeps its slot until
//! [`World::flush_dead`] runs at the end of the tick; every lookup through
//! [`World::get`] or [`World::resolve`] checks liveness first.

use serde::{Deserialize, Serialize};

use crate::components::{
    Aircraft, Building, Cargo, Cloak, Combat, Harvester, Health, Infantry, Mission, Mobile,
    Production, Transform, Turret,
};
use crate::house::HouseId;

/// Handle to an entity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct EntityId(pub u32);

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Broad entity category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// Foot soldier.
    Infantry,
    /// Ground vehicle.
    Vehicle,
    /// Aircraft.
    Aircraft,
    /// Structure.
    Building,
}

/// One entity and its components.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Handle; assigned by [`World::spawn`].
    pub id: EntityId,
    /// Category.
    pub kind: EntityKind,
    /// Data type name.
    pub type_name: String,
    /// Owning house.
    pub owner: Option<HouseId>,
    /// Sight radius in cells.
    pub sight: i32,
    /// Reveals cloaked enemies within sight.
    pub detects_cloaked: bool,
    /// Transport carrying this entity; passengers are hidden and inert.
    pub transported_by: Option<EntityId>,
    alive: bool,

    /// Position and facing.
    pub transform: Transform,
    /// Movement.
    pub mobile: Option<Mobile>,
    /// Weapons.
    pub combat: Option<Combat>,
    /// AI behavior.
    pub mission: Option<Mission>,
    /// Hit points.
    pub health: Option<Health>,
    /// Resource gathering.
    pub harvester: Option<Harvester>,
    /// Structure data.
    pub building: Option<Building>,
    /// Passenger hold.
    pub cargo: Option<Cargo>,
    /// Rotating turret.
    pub turret: Option<Turret>,
    /// Cloaking device.
    pub cloak: Option<Cloak>,
    /// Flight state.
    pub aircraft: Option<Aircraft>,
    /// Factory.
    pub production: Option<Production>,
    /// Morale.
    pub infantry: Option<Infantry>,
}

impl Entity {
    /// Bare entity with only a transform.
    #[must_use]
    pub fn new(kind: EntityKind, type_name: &str, owner: Option<HouseId>, transform: Transform) -> Self {
        Self {
            id: EntityId::default(),
            kind,
            type_name: type_name.to_string(),
            owner,
            sight: 0,
            detects_cloaked: false,
            transported_by: None,
            alive: true,
            transform,
            mobile: None,
            combat: None,
            mission: None,
            health: None,
            harvester: None,
            building: None,
            cargo: None,
            turret: None,
            cloak: None,
            aircraft: None,
            production: None,
            infantry: None,
        }
    }

    /// Whether the entity is alive.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.alive
    }

    /// Whether the entity is inside a transport.
    #[must_use]
    pub const fn is_transported(&self) -> bool {
        self.transported_by.is_some()
    }

    /// Whether the entity is a flying aircraft.
    #[must_use]
    pub fn is_airborne(&self) -> bool {
        self.aircraft.is_some_and(|a| a.is_airborne())
    }

    /// Whether the entity is cloaked right now.
    #[must_use]
    pub fn is_cloaked(&self) -> bool {
        self.cloak
            .is_some_and(|c| c.phase == crate::components::CloakPhase::Cloaked)
    }

    /// Whether this entity and `other` belong to different houses.
    #[must_use]
    pub fn is_enemy_of(&self, other: &Self) -> bool {
        match (self.owner, other.owner) {
            (Some(a), Some(b)) => a != b,
            _ => false,
        }
    }

    /// Whether the entity occupies a ground cell.
    #[must_use]
    pub fn occupies_ground(&self) -> bool {
        self.kind != EntityKind::Building && !self.is_transported() && !self.is_airborne()
    }
}

/// The arena.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct World {
    slots: Vec<Option<Entity>>,
    dead: Vec<EntityId>,
}

impl World {
    /// Empty world.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(id: EntityId) -> Option<usize> {
        (id.0 as usize).checked_sub(1)
    }

    /// Id the next spawn will receive.
    #[must_use]
    pub fn next_id(&self) -> EntityId {
        EntityId(u32::try_from(self.slots.len() + 1).unwrap_or(u32::MAX))
    }

    /// Insert an entity, assigning it the next id.
    pub fn spawn(&mut self, mut entity: Entity) -> EntityId {
        let id = self.next_id();
        entity.id = id;
        entity.alive = true;
        self.slots.push(Some(entity));
        id
    }

    /// Living entity by id.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        Self::slot(id)
            .and_then(|i| self.slots.get(i))
            .and_then(Option::as_ref)
            .filter(|e| e.alive)
    }

    /// Living entity by id, mutably.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        let index = Self::slot(id)?;
        self.slots
            .get_mut(index)
            .and_then(Option::as_mut)
            .filter(|e| e.alive)
    }

    /// Entity by id even if it died this tick.
    #[must_use]
    pub fn get_including_dead(&self, id: EntityId) -> Option<&Entity> {
        Self::slot(id)
            .and_then(|i| self.slots.get(i))
            .and_then(Option::as_ref)
    }

    /// Validate a weak reference: the id back if it names a living entity.
    #[must_use]
    pub fn resolve(&self, id: Option<EntityId>) -> Option<EntityId> {
        id.filter(|&id| self.is_alive(id))
    }

    /// Whether `id` names a living entity.
    #[must_use]
    pub fn is_alive(&self, id: EntityId) -> bool {
        self.get(id).is_some()
    }

    /// Living ids in ascending order.
    #[must_use]
    pub fn ids(&self) -> Vec<EntityId> {
        self.iter().map(|e| e.id).collect()
    }

    /// Living entities in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.slots.iter().flatten().filter(|e| e.alive)
    }

    /// Number of living entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// No living entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clear the liveness flag and queue the slot for end-of-tick removal.
    ///
    /// Returns `false` if the entity was already dead or missing.
    pub fn mark_dead(&mut self, id: EntityId) -> bool {
        match self.get_mut(id) {
            Some(entity) => {
                entity.alive = false;
                self.dead.push(id);
                true
            }
            None => false,
        }
    }

    /// Remove an entity right now, bypassing the end-of-tick queue.
    pub fn remove_now(&mut self, id: EntityId) -> Option<Entity> {
        let index = Self::slot(id)?;
        let mut entity = self.slots.get_mut(index)?.take()?;
        entity.alive = false;
        Some(entity)
    }

    /// Drop every entity that died this tick. Returns their ids.
    pub fn flush_dead(&mut self) -> Vec<EntityId> {
        let dead = std::mem::take(&mut self.dead);
        for &id in &dead {
            if let Some(index) = Self::slot(id) {
                if let Some(slot) = self.slots.get_mut(index) {
                    *slot = None;
                }
            }
        }
        dead
    }

    /// Ids waiting for removal.
    #[must_use]
    pub fn pending_removal(&self) -> &[EntityId] {
        &self.dead
    }
}
