//! Read-only queries for presentation layers.
//!
//! A renderer or UI never touches simulation state directly. It pulls plain
//! views once per frame and interpolates between them as it likes.

use crate::combat::Effect;
use crate::components::{BuildState, FlightPhase, MissionKind};
use crate::grid::CellCoord;
use crate::house::HouseId;
use crate::math::Vec2Fixed;
use crate::projectiles::Projectile;
use crate::simulation::Simulation;
use crate::world::{Entity, EntityId, EntityKind};

/// What an entity looks like it is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimState {
    /// Standing still.
    Idle,
    /// Following a path.
    Moving,
    /// Has a live target.
    Attacking,
    /// Infantry lying down.
    Prone,
    /// Aircraft climbing, cruising, or descending.
    Flying,
    /// Harvester gathering or unloading.
    Harvesting,
    /// Factory with an item in progress.
    Building,
}

/// Everything needed to draw one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityView {
    /// Handle.
    pub id: EntityId,
    /// Category.
    pub kind: EntityKind,
    /// Data type name.
    pub type_name: String,
    /// Owner.
    pub owner: Option<HouseId>,
    /// Position in leptons.
    pub position: Vec2Fixed,
    /// Body facing, 0-31.
    pub facing: u8,
    /// Turret facing, when the entity has one.
    pub turret_facing: Option<u8>,
    /// Hit points.
    pub hp: u32,
    /// Maximum hit points.
    pub max_hp: u32,
    /// Height above ground in leptons.
    pub altitude: i32,
    /// Cloaked right now.
    pub cloaked: bool,
    /// Animation hint.
    pub anim: AnimState,
}

impl EntityView {
    fn of(entity: &Entity) -> Self {
        let (hp, max_hp) = entity.health.map_or((0, 0), |h| (h.hp, h.max_hp));
        Self {
            id: entity.id,
            kind: entity.kind,
            type_name: entity.type_name.clone(),
            owner: entity.owner,
            position: entity.transform.position,
            facing: entity.transform.facing,
            turret_facing: entity.turret.map(|t| t.facing),
            hp,
            max_hp,
            altitude: entity.aircraft.map_or(0, |a| a.altitude),
            cloaked: entity.is_cloaked(),
            anim: anim_state(entity),
        }
    }
}

fn anim_state(entity: &Entity) -> AnimState {
    if entity.infantry.is_some_and(|i| i.prone) {
        return AnimState::Prone;
    }
    if entity
        .aircraft
        .is_some_and(|a| a.phase != FlightPhase::Landed)
    {
        return AnimState::Flying;
    }
    if entity.combat.as_ref().is_some_and(|c| c.target.is_some()) {
        return AnimState::Attacking;
    }
    if entity.mobile.as_ref().is_some_and(|m| m.is_moving()) {
        return AnimState::Moving;
    }
    let harvesting = entity.harvester.is_some()
        && entity
            .mission
            .as_ref()
            .is_some_and(|m| matches!(m.kind, MissionKind::Harvest | MissionKind::Return));
    if harvesting {
        return AnimState::Harvesting;
    }
    let building = entity
        .production
        .as_ref()
        .and_then(|p| p.item.as_ref())
        .is_some_and(|item| item.state == BuildState::InProgress);
    if building {
        return AnimState::Building;
    }
    AnimState::Idle
}

impl Simulation {
    /// Views of every entity that is on the map, in id order. Passengers
    /// are hidden.
    #[must_use]
    pub fn entity_views(&self) -> Vec<EntityView> {
        self.world
            .iter()
            .filter(|e| !e.is_transported())
            .map(EntityView::of)
            .collect()
    }

    /// Rounds in flight.
    #[must_use]
    pub fn projectiles(&self) -> &[Projectile] {
        &self.projectiles
    }

    /// Short-lived visual effects.
    #[must_use]
    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }

    /// Whether `house` currently sees `cell`.
    #[must_use]
    pub fn is_cell_visible(&self, house: HouseId, cell: CellCoord) -> bool {
        self.houses
            .get(&house)
            .is_some_and(|h| h.visibility.is_visible(cell))
    }

    /// Whether `house` has ever seen `cell`.
    #[must_use]
    pub fn is_cell_revealed(&self, house: HouseId, cell: CellCoord) -> bool {
        self.houses
            .get(&house)
            .is_some_and(|h| h.visibility.is_revealed(cell))
    }

    /// Percent complete of a factory's item, or `None` when it is idle.
    #[must_use]
    pub fn production_progress(&self, factory: EntityId) -> Option<u32> {
        self.world
            .get(factory)?
            .production
            .as_ref()?
            .item
            .as_ref()
            .map(crate::components::BuildItem::percent)
    }

    /// Spendable credits of a house.
    #[must_use]
    pub fn credits(&self, house: HouseId) -> Option<i32> {
        self.houses.get(&house).map(|h| h.credits)
    }
}
