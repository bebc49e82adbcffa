//! Replay system for recording and playing back games.
//!
//! Replays store the initial simulation snapshot and the stream of orders
//! scheduled during the game. Since the simulation is deterministic, that is
//! enough to recreate any tick exactly.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::data::Rules;
use crate::error::{GameError, Result};
use crate::orders::FrameOrder;
use crate::simulation::Simulation;

/// Replay file format version for compatibility.
pub const REPLAY_VERSION: u32 = 1;

/// Complete replay data structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replay {
    /// Replay format version.
    pub version: u32,
    /// Scenario identifier or name.
    pub scenario_id: String,
    /// Random seed used for the game.
    pub seed: u64,
    /// Serialized initial simulation state.
    pub initial_state: Vec<u8>,
    /// Scheduled orders in arrival order.
    pub orders: Vec<FrameOrder>,
    /// Tick the recording stopped at.
    pub final_tick: u64,
    /// State hash at `final_tick`.
    pub final_hash: u64,
}

impl Replay {
    /// Create a new replay from a simulation's initial state.
    ///
    /// # Errors
    /// Returns an error if the snapshot cannot be serialized.
    pub fn new(scenario_id: impl Into<String>, initial_state: &Simulation) -> Result<Self> {
        Ok(Self {
            version: REPLAY_VERSION,
            scenario_id: scenario_id.into(),
            seed: initial_state.config().seed,
            initial_state: initial_state.serialize()?,
            orders: Vec::new(),
            final_tick: initial_state.get_tick(),
            final_hash: initial_state.state_hash(),
        })
    }

    /// Save the replay to a file.
    ///
    /// # Errors
    /// Returns an error if serialization or file writing fails.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bytes = bincode::serialize(self)
            .map_err(|e| GameError::InvalidState(format!("Failed to serialize replay: {e}")))?;
        std::fs::write(path.as_ref(), bytes)?;
        Ok(())
    }

    /// Load a replay from a file.
    ///
    /// # Errors
    /// Returns an error if file reading or deserialization fails, or the
    /// file was written by a different format version.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        let replay: Self = bincode::deserialize(&bytes)
            .map_err(|e| GameError::InvalidState(format!("Failed to deserialize replay: {e}")))?;

        if replay.version != REPLAY_VERSION {
            return Err(GameError::InvalidState(format!(
                "Replay version mismatch: expected {REPLAY_VERSION}, got {}",
                replay.version
            )));
        }
        info!(
            path = %path.as_ref().display(),
            scenario = %replay.scenario_id,
            orders = replay.orders.len(),
            final_tick = replay.final_tick,
            "Loaded replay"
        );
        Ok(replay)
    }

    /// Rebuild the initial simulation for playback.
    ///
    /// # Errors
    /// Returns an error if state deserialization fails.
    pub fn restore_initial_state(&self, rules: Arc<Rules>) -> Result<Simulation> {
        Simulation::deserialize(&self.initial_state, rules)
    }

    /// Orders that take effect on `frame`.
    pub fn orders_at(&self, frame: u64) -> impl Iterator<Item = &FrameOrder> {
        self.orders.iter().filter(move |o| o.frame == frame)
    }

    /// Get the total number of orders in the replay.
    #[must_use]
    pub fn order_count(&self) -> usize {
        self.orders.len()
    }
}

/// Runs a simulation while recording everything needed to replay it.
#[derive(Debug)]
pub struct ReplayRecorder {
    replay: Replay,
    simulation: Simulation,
}

impl ReplayRecorder {
    /// Start recording from the simulation's current state.
    ///
    /// # Errors
    /// Returns an error if the initial snapshot cannot be serialized.
    pub fn new(scenario_id: impl Into<String>, simulation: Simulation) -> Result<Self> {
        let replay = Replay::new(scenario_id, &simulation)?;
        Ok(Self { replay, simulation })
    }

    /// Record and schedule an order.
    ///
    /// Orders for frames already past are stamped with the next tick, which
    /// is when the simulation will apply them anyway.
    pub fn schedule(&mut self, mut order: FrameOrder) {
        order.frame = order.frame.max(self.simulation.get_tick());
        self.replay.orders.push(order.clone());
        self.simulation.schedule(order);
    }

    /// Advance the recorded simulation one tick.
    pub fn tick(&mut self) {
        self.simulation.tick();
    }

    /// Advance the recorded simulation `ticks` ticks.
    pub fn run(&mut self, ticks: u64) {
        self.simulation.run(ticks);
    }

    /// The simulation being recorded.
    #[must_use]
    pub const fn simulation(&self) -> &Simulation {
        &self.simulation
    }

    /// Stop recording, stamping the final tick and hash.
    #[must_use]
    pub fn finish(mut self) -> (Replay, Simulation) {
        self.replay.final_tick = self.simulation.get_tick();
        self.replay.final_hash = self.simulation.state_hash();
        (self.replay, self.simulation)
    }
}

/// Replay playback controller.
#[derive(Debug)]
pub struct ReplayPlayer {
    replay: Replay,
    rules: Arc<Rules>,
    simulation: Simulation,
}

impl ReplayPlayer {
    /// Create a new replay player from a replay.
    ///
    /// # Errors
    /// Returns an error if the initial state cannot be restored.
    pub fn new(replay: Replay, rules: Arc<Rules>) -> Result<Self> {
        let simulation = Self::restart(&replay, &rules)?;
        Ok(Self {
            replay,
            rules,
            simulation,
        })
    }

    fn restart(replay: &Replay, rules: &Arc<Rules>) -> Result<Simulation> {
        let mut simulation = replay.restore_initial_state(Arc::clone(rules))?;
        for order in &replay.orders {
            simulation.schedule(order.clone());
        }
        Ok(simulation)
    }

    /// Advance the replay by one tick.
    ///
    /// Returns true if there are more ticks to play.
    pub fn advance(&mut self) -> bool {
        if self.is_finished() {
            return false;
        }
        self.simulation.tick();
        !self.is_finished()
    }

    /// Seek to a specific tick, restarting from the beginning if needed.
    ///
    /// # Errors
    /// Returns an error if state restoration fails.
    pub fn seek(&mut self, target_tick: u64) -> Result<()> {
        if target_tick < self.simulation.get_tick() {
            self.simulation = Self::restart(&self.replay, &self.rules)?;
        }
        let target = target_tick.min(self.replay.final_tick);
        while self.simulation.get_tick() < target {
            self.simulation.tick();
        }
        Ok(())
    }

    /// Get the current tick.
    #[must_use]
    pub const fn current_tick(&self) -> u64 {
        self.simulation.get_tick()
    }

    /// Get a reference to the current simulation state.
    #[must_use]
    pub const fn simulation(&self) -> &Simulation {
        &self.simulation
    }

    /// Get the replay being played.
    #[must_use]
    pub const fn replay(&self) -> &Replay {
        &self.replay
    }

    /// Check if the replay has finished.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.simulation.get_tick() >= self.replay.final_tick
    }

    /// Play to the end and compare against the recorded final hash.
    ///
    /// # Errors
    /// Returns [`GameError::DesyncDetected`] on a hash mismatch, or an error
    /// if state restoration fails.
    pub fn verify(&mut self) -> Result<()> {
        self.seek(self.replay.final_tick)?;
        let local_hash = self.simulation.state_hash();
        if local_hash != self.replay.final_hash {
            return Err(GameError::DesyncDetected {
                tick: self.replay.final_tick,
                local_hash,
                remote_hash: self.replay.final_hash,
            });
        }
        info!(
            scenario = %self.replay.scenario_id,
            tick = self.replay.final_tick,
            hash = local_hash,
            "Replay verified"
        );
        Ok(())
    }
}
