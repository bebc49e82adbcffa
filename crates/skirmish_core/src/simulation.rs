//! Core simulation loop.
//!
//! The [`Simulation`] owns every piece of mutable game state and advances
//! it one fixed tick at a time. Systems are free functions over
//! `&mut Simulation`; they run in the order documented on
//! [`Simulation::tick`] and each visits entities in ascending id order.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::combat::{self, DamageOutcome, Effect, FireResult};
use crate::components::MissionKind;
use crate::config::SimConfig;
use crate::data::Rules;
use crate::error::{GameError, OrderError, Result};
use crate::events::SimEvent;
use crate::fields::{self, FieldState};
use crate::grid::{CellCoord, Grid};
use crate::house::{self, House, HouseId};
use crate::math::Vec2Fixed;
use crate::orders::{self, FrameOrder, Order, OrderQueue};
use crate::projectiles::{self, Projectile};
use crate::rng::SimRng;
use crate::world::{Entity, EntityId, World};
use crate::{
    auxiliary, infantry, mission, movement, production, targeting, visibility,
};

/// The core game simulation.
///
/// This struct owns all game state and provides methods to advance the
/// simulation deterministically. Two instances built from the same rules,
/// config, setup, and orders stay bit-identical forever.
///
/// # System Execution Order
///
/// Each tick, systems run in this order:
/// 0. **Orders** - Apply orders due this frame
/// 1. **Ledgers** - Recompute power and storage
/// 2. **Movement** - Follow paths, field damage, occupancy
/// 3. **Combat** - Turrets and weapons
/// 4. **Projectiles** - Flight and impact
/// 5. **Missions** - Unit AI
/// 6. **Infantry** - Fear and prone
/// 7. **Fields** - Resource growth and spread
/// 8. **Production** - Factories
/// 9. **Auxiliary** - Cloak, aircraft, repair
/// 10. **Visibility** - Fog of war
/// 11. **Cleanup** - Effects, dead entities, primary factories
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Simulation {
    pub(crate) tick: u64,
    pub(crate) config: SimConfig,
    pub(crate) world: World,
    pub(crate) grid: Grid,
    pub(crate) houses: BTreeMap<HouseId, House>,
    pub(crate) rng: SimRng,
    pub(crate) projectiles: Vec<Projectile>,
    pub(crate) effects: Vec<Effect>,
    pub(crate) fields: FieldState,
    pub(crate) orders: OrderQueue,
    #[serde(skip)]
    pub(crate) events: Vec<SimEvent>,
    #[serde(skip)]
    pub(crate) rules: Arc<Rules>,
}

impl Simulation {
    /// Create an empty simulation on a clear map.
    ///
    /// # Panics
    ///
    /// Panics if either map dimension is zero.
    ///
    /// # Example
    ///
    /// ```
    /// use std::sync::Arc;
    /// use skirmish_core::config::SimConfig;
    /// use skirmish_core::data::Rules;
    /// use skirmish_core::simulation::Simulation;
    ///
    /// let sim = Simulation::new(32, 32, SimConfig::with_seed(7), Arc::new(Rules::default()));
    /// assert_eq!(sim.get_tick(), 0);
    /// ```
    #[must_use]
    pub fn new(width: u32, height: u32, config: SimConfig, rules: Arc<Rules>) -> Self {
        Self {
            tick: 0,
            config,
            world: World::new(),
            grid: Grid::new(width, height),
            houses: BTreeMap::new(),
            rng: SimRng::new(config.seed),
            projectiles: Vec::new(),
            effects: Vec::new(),
            fields: FieldState::default(),
            orders: OrderQueue::default(),
            events: Vec::new(),
            rules,
        }
    }

    /// Register a house with starting credits.
    pub fn add_house(&mut self, id: HouseId, credits: i32) -> &mut House {
        let (width, height) = (self.grid.width(), self.grid.height());
        self.houses
            .entry(id)
            .or_insert_with(|| House::new(id, credits, width, height))
    }

    /// Get the current tick number.
    #[must_use]
    pub const fn get_tick(&self) -> u64 {
        self.tick
    }

    /// Session tunables.
    #[must_use]
    pub const fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Static rule tables.
    #[must_use]
    pub fn rules(&self) -> &Arc<Rules> {
        &self.rules
    }

    /// Entity storage.
    #[must_use]
    pub const fn world(&self) -> &World {
        &self.world
    }

    /// Living entity by id.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.world.get(id)
    }

    /// The map.
    #[must_use]
    pub const fn grid(&self) -> &Grid {
        &self.grid
    }

    /// The map, for scenario setup.
    pub fn grid_mut(&mut self) -> &mut Grid {
        &mut self.grid
    }

    /// One house's ledger.
    #[must_use]
    pub fn house(&self, id: HouseId) -> Option<&House> {
        self.houses.get(&id)
    }

    /// All houses in id order.
    pub fn houses(&self) -> impl Iterator<Item = &House> {
        self.houses.values()
    }

    /// Random draws taken so far.
    #[must_use]
    pub fn rng_draws(&self) -> u64 {
        self.rng.draws()
    }

    /// Push an event onto this tick's queue.
    pub(crate) fn emit(&mut self, event: SimEvent) {
        self.events.push(event);
    }

    // ========================================================================
    // Tick
    // ========================================================================

    /// Advance the simulation by one tick.
    ///
    /// Runs every system in the fixed order and returns the events the tick
    /// produced.
    pub fn tick(&mut self) -> &[SimEvent] {
        self.events.clear();

        orders::apply_due(self);
        house::refresh_ledgers(
            &mut self.houses,
            &self.world,
            &self.rules,
            self.config.base_storage,
        );
        movement::movement_system(self);
        combat::combat_system(self);
        projectiles::projectile_system(self);
        mission::mission_system(self);
        infantry::fear_system(self);
        fields::field_system(self);
        production::production_system(self);
        auxiliary::cloak_system(self);
        auxiliary::aircraft_system(self);
        auxiliary::repair_system(self);
        visibility::visibility_system(self);

        combat::age_effects(&mut self.effects);
        self.world.flush_dead();
        production::reassign_primaries(self);

        self.tick += 1;

        #[cfg(debug_assertions)]
        {
            let hash = self.state_hash();
            tracing::debug!(tick = self.tick, state_hash = hash, "Simulation state hash");
        }

        &self.events
    }

    /// Run `ticks` ticks back to back.
    pub fn run(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.tick();
        }
    }

    /// Events produced by the last tick.
    #[must_use]
    pub fn events(&self) -> &[SimEvent] {
        &self.events
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Queue an order for the frame it names.
    ///
    /// Orders for past frames apply on the next tick.
    pub fn schedule(&mut self, order: FrameOrder) {
        self.orders.push(order);
    }

    /// Orders waiting for their frame.
    #[must_use]
    pub fn pending_orders(&self) -> &OrderQueue {
        &self.orders
    }

    /// Validate and apply an order right now.
    ///
    /// # Errors
    ///
    /// Returns the rejection reason; nothing is changed in that case.
    pub fn apply(&mut self, house: HouseId, order: &Order) -> std::result::Result<(), OrderError> {
        orders::apply(self, house, order)
    }

    /// Path a unit toward a lepton position. See [`movement::move_to`].
    pub fn move_to(&mut self, id: EntityId, destination: Vec2Fixed) -> bool {
        movement::move_to(self, id, destination)
    }

    /// Switch a unit's mission. See [`mission::set_mission`].
    pub fn set_mission(&mut self, id: EntityId, kind: MissionKind, target: Option<EntityId>) {
        mission::set_mission(self, id, kind, target);
    }

    /// Best target in weapon range. See [`targeting::find_target`].
    #[must_use]
    pub fn find_target(&self, id: EntityId) -> Option<EntityId> {
        targeting::find_target(self, id)
    }

    /// Try to fire at a target. See [`combat::attempt_attack`].
    pub fn attempt_attack(&mut self, attacker: EntityId, target: EntityId) -> FireResult {
        combat::attempt_attack(self, attacker, target)
    }

    /// Deal damage through a warhead. See [`combat::apply_damage`].
    pub fn apply_damage(
        &mut self,
        target: EntityId,
        base: i32,
        warhead: &str,
        attacker: Option<EntityId>,
    ) -> DamageOutcome {
        combat::apply_damage(self, target, base, warhead, attacker)
    }

    /// Spawn a unit from its data definition at a cell.
    pub fn spawn_unit(
        &mut self,
        type_name: &str,
        owner: HouseId,
        cell: CellCoord,
    ) -> Option<EntityId> {
        production::spawn_unit(self, type_name, owner, cell)
    }

    /// Spawn a building with its footprint origin at `origin`, skipping
    /// placement rules.
    pub fn spawn_building(
        &mut self,
        type_name: &str,
        owner: HouseId,
        origin: CellCoord,
    ) -> Option<EntityId> {
        production::spawn_building(self, type_name, owner, origin)
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Calculate a hash of the current simulation state.
    ///
    /// Used for desync detection in multiplayer. The hash covers the full
    /// snapshot, so two simulations agree on it exactly when their
    /// snapshots are byte-identical.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        match self.serialize() {
            Ok(bytes) => bytes.hash(&mut hasher),
            Err(_) => self.tick.hash(&mut hasher),
        }
        hasher.finish()
    }

    /// Serialize the simulation state for replay or network sync.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| GameError::InvalidState(format!("Failed to serialize simulation: {e}")))
    }

    /// Restore simulation state from bytes, attaching the static rules.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails.
    pub fn deserialize(data: &[u8], rules: Arc<Rules>) -> Result<Self> {
        let mut sim: Self = bincode::deserialize(data).map_err(|e| {
            GameError::InvalidState(format!("Failed to deserialize simulation: {e}"))
        })?;
        sim.rules = rules;
        Ok(sim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::MissionKind;
    use crate::data::{UnitClass, UnitData};
    use crate::grid::Locomotion;

    fn rules() -> Arc<Rules> {
        let mut rules = Rules::default();
        rules.add_unit(UnitData::basic("rifle", UnitClass::Infantry, Locomotion::Foot));
        Arc::new(rules)
    }

    #[test]
    fn test_simulation_new() {
        let sim = Simulation::new(16, 16, SimConfig::default(), rules());
        assert_eq!(sim.get_tick(), 0);
        assert!(sim.world().is_empty());
        assert_eq!(sim.grid().width(), 16);
    }

    #[test]
    fn test_tick_increments() {
        let mut sim = Simulation::new(8, 8, SimConfig::default(), rules());
        sim.tick();
        sim.tick();
        assert_eq!(sim.get_tick(), 2);
        sim.run(3);
        assert_eq!(sim.get_tick(), 5);
    }

    #[test]
    fn test_spawn_unit_from_data() {
        let mut sim = Simulation::new(8, 8, SimConfig::default(), rules());
        sim.add_house(HouseId(1), 1000);
        let id = sim.spawn_unit("rifle", HouseId(1), CellCoord::new(2, 3)).unwrap();

        let unit = sim.entity(id).unwrap();
        assert_eq!(unit.transform.cell(), CellCoord::new(2, 3));
        assert_eq!(unit.health.unwrap().hp, 100);
        assert_eq!(unit.mission.as_ref().unwrap().kind, MissionKind::Guard);
        assert!(unit.infantry.is_some());
        assert!(sim.spawn_unit("ghost", HouseId(1), CellCoord::new(1, 1)).is_none());
    }

    #[test]
    fn test_serialization_roundtrip() {
        let mut sim = Simulation::new(8, 8, SimConfig::with_seed(5), rules());
        sim.add_house(HouseId(1), 1000);
        sim.spawn_unit("rifle", HouseId(1), CellCoord::new(1, 1));
        sim.run(10);

        let bytes = sim.serialize().unwrap();
        let restored = Simulation::deserialize(&bytes, rules()).unwrap();
        assert_eq!(restored.get_tick(), 10);
        assert_eq!(restored.state_hash(), sim.state_hash());
        assert_eq!(restored.serialize().unwrap(), bytes);
    }

    #[test]
    fn test_hash_tracks_state() {
        let mut a = Simulation::new(8, 8, SimConfig::with_seed(5), rules());
        let b = a.clone();
        assert_eq!(a.state_hash(), b.state_hash());
        a.tick();
        assert_ne!(a.state_hash(), b.state_hash());
    }

    #[test]
    fn test_bad_snapshot_is_error() {
        let err = Simulation::deserialize(&[1, 2, 3], rules()).unwrap_err();
        assert!(matches!(err, GameError::InvalidState(_)));
    }
}
