//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the simulation
//! produces identical results given identical inputs.
//!
//! # Testing Strategy
//!
//! Lockstep peers and replays only work if every run of the simulation is
//! bit-identical. Sources of non-determinism include:
//!
//! - **Floating-point math**: Different CPUs can produce different results.
//!   We use fixed-point arithmetic via [`skirmish_core::math::Fixed`] throughout.
//!
//! - **HashMap iteration order**: Rust's default hasher is randomized.
//!   Entities are visited in ascending id order and keyed tables are `BTreeMap`s.
//!
//! - **System randomness**: Every random draw comes from the simulation's
//!   own seeded ChaCha stream, and the draw order is part of the contract.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: Individual system determinism (movement, combat, etc.)
//! 2. **Property tests**: Random order streams must still produce deterministic outputs
//! 3. **Integration tests**: Full scenarios are reproducible
//! 4. **Parallel tests**: Running N simulations on N threads all match

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::thread;

use skirmish_core::orders::FrameOrder;
use skirmish_core::simulation::Simulation;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for deterministic simulation).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the simulation was deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the simulation produced different hashes across runs.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Simulation is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a simulation multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run the simulation
/// * `ticks` - Number of ticks to simulate per run
/// * `setup` - Function to create initial simulation state
/// * `step` - Function to advance simulation by one tick
/// * `hash` - Function to compute state hash
///
/// # Example
///
/// ```ignore
/// use skirmish_test_utils::determinism::verify_determinism;
///
/// let result = verify_determinism(
///     5,  // Run 5 times
///     100, // 100 ticks each
///     || skirmish_duel(7),
///     |sim| { sim.tick(); },
///     |sim| sim.state_hash(),
/// );
/// result.assert_deterministic();
/// ```
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for _ in 0..ticks {
            step(&mut state);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Simplified determinism verification for [`Simulation`].
///
/// Runs the simulation twice with identical setup and verifies the final
/// state hashes match exactly.
pub fn verify_simulation_determinism<F>(setup_fn: F, num_ticks: u64) -> bool
where
    F: Fn() -> Simulation,
{
    let result = verify_determinism(
        2,
        num_ticks,
        &setup_fn,
        |sim| {
            sim.tick();
        },
        |sim| sim.state_hash(),
    );
    result.is_deterministic
}

/// Run N simulations on N scoped threads and collect final hashes.
///
/// Catches non-determinism that only shows up under thread scheduling or
/// memory layout differences.
///
/// # Panics
///
/// Panics if a simulation thread panics.
pub fn run_parallel_simulations<F>(setup_fn: F, num_sims: usize, num_ticks: u64) -> DeterminismResult
where
    F: Fn() -> Simulation + Sync,
{
    let hashes: Vec<u64> = thread::scope(|s| {
        let handles: Vec<_> = (0..num_sims)
            .map(|_| {
                s.spawn(|| {
                    let mut sim = setup_fn();
                    sim.run(num_ticks);
                    sim.state_hash()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().expect("simulation thread panicked"))
            .collect()
    });

    DeterminismResult {
        is_deterministic: hashes.windows(2).all(|w| w[0] == w[1]),
        hashes,
        ticks: num_ticks,
    }
}

/// Compare two simulation runs tick-by-tick, finding first divergence.
///
/// # Returns
///
/// `None` if simulations are deterministic, `Some(tick)` if they diverge
/// at that tick.
pub fn find_first_divergence<F>(setup_fn: F, num_ticks: u64) -> Option<u64>
where
    F: Fn() -> Simulation,
{
    let mut sim1 = setup_fn();
    let mut sim2 = setup_fn();

    if sim1.state_hash() != sim2.state_hash() {
        return Some(0);
    }

    for tick in 1..=num_ticks {
        sim1.tick();
        sim2.tick();

        if sim1.state_hash() != sim2.state_hash() {
            return Some(tick);
        }
    }

    None
}

/// Verify that a snapshot taken mid-game resumes exactly.
///
/// Runs `split` ticks, snapshots, then runs both the original and the
/// restored copy `rest` more ticks and compares the results.
pub fn verify_snapshot_resume<F>(setup_fn: F, split: u64, rest: u64) -> bool
where
    F: Fn() -> Simulation,
{
    let mut sim = setup_fn();
    sim.run(split);

    let Ok(bytes) = sim.serialize() else {
        return false;
    };
    let Ok(mut restored) = Simulation::deserialize(&bytes, Arc::clone(sim.rules())) else {
        return false;
    };
    if restored.state_hash() != sim.state_hash() {
        return false;
    }

    sim.run(rest);
    restored.run(rest);
    sim.serialize().ok() == restored.serialize().ok()
}

/// Schedule an order stream on a fresh simulation and run it.
pub fn run_with_orders<F>(setup_fn: F, orders: &[FrameOrder], num_ticks: u64) -> Simulation
where
    F: Fn() -> Simulation,
{
    let mut sim = setup_fn();
    for order in orders {
        sim.schedule(order.clone());
    }
    sim.run(num_ticks);
    sim
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for determinism testing.
///
/// These strategies generate random but reproducible inputs for
/// property-based testing of simulation determinism.
pub mod strategies {
    use proptest::prelude::*;
    use skirmish_core::grid::CellCoord;
    use skirmish_core::house::HouseId;
    use skirmish_core::orders::{FrameOrder, Order};
    use skirmish_core::world::EntityId;

    /// A cell on a `width` x `height` map.
    pub fn arb_cell(width: i32, height: i32) -> impl Strategy<Value = CellCoord> {
        (0..width, 0..height).prop_map(|(x, y)| CellCoord::new(x, y))
    }

    /// A cell anywhere near the map, including a margin off each edge.
    pub fn arb_any_cell(width: i32, height: i32) -> impl Strategy<Value = CellCoord> {
        (-4..width + 4, -4..height + 4).prop_map(|(x, y)| CellCoord::new(x, y))
    }

    /// An entity id up to `max`, which may or may not exist.
    pub fn arb_entity(max: u32) -> impl Strategy<Value = EntityId> {
        (1..=max).prop_map(EntityId)
    }

    /// A unit order referencing ids up to `max_id`.
    pub fn arb_unit_order(max_id: u32, width: i32, height: i32) -> impl Strategy<Value = Order> {
        prop_oneof![
            (arb_entity(max_id), arb_any_cell(width, height))
                .prop_map(|(unit, destination)| Order::Move { unit, destination }),
            (arb_entity(max_id), arb_entity(max_id))
                .prop_map(|(unit, target)| Order::Attack { unit, target }),
            arb_entity(max_id).prop_map(|unit| Order::Stop { unit }),
            arb_entity(max_id).prop_map(|unit| Order::Guard { unit }),
            arb_entity(max_id).prop_map(|unit| Order::GuardArea { unit }),
            arb_entity(max_id).prop_map(|unit| Order::Hunt { unit }),
            arb_entity(max_id).prop_map(|unit| Order::Retreat { unit }),
            arb_entity(max_id).prop_map(|unit| Order::Harvest { unit }),
        ]
    }

    /// A stream of frame-stamped orders from houses 0 and 1.
    pub fn arb_frame_orders(
        max_len: usize,
        max_frame: u64,
        max_id: u32,
        width: i32,
        height: i32,
    ) -> impl Strategy<Value = Vec<FrameOrder>> {
        prop::collection::vec(
            (0..max_frame, 0u8..2, arb_unit_order(max_id, width, height))
                .prop_map(|(frame, house, order)| FrameOrder::new(frame, HouseId(house), order)),
            0..max_len,
        )
    }

    /// A simulation seed.
    pub fn arb_seed() -> impl Strategy<Value = u64> {
        any::<u64>()
    }
}
