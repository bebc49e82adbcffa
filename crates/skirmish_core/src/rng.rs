//! The single seeded random stream shared by every system.
//!
//! Peers in a lockstep session must draw the same values in the same order,
//! so nothing in the simulation may own a private generator. The stream is
//! serializable and travels with snapshots.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Deterministic random source for the simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimRng {
    rng: ChaCha8Rng,
    draws: u64,
}

impl SimRng {
    /// Create a stream from a session seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            draws: 0,
        }
    }

    /// Number of draws taken so far. Handy when hunting desyncs.
    #[must_use]
    pub fn draws(&self) -> u64 {
        self.draws
    }

    /// Uniform value in `low..=high`. Returns `low` if the range is empty.
    pub fn range(&mut self, low: i32, high: i32) -> i32 {
        self.draws += 1;
        if high <= low {
            // Still consume a value so call sites stay in lockstep
            // regardless of the bounds they computed.
            let _: u32 = self.rng.gen();
            return low;
        }
        self.rng.gen_range(low..=high)
    }

    /// Uniform index in `0..len`. `len` must be non-zero.
    ///
    /// Sampled as `u32` so 32- and 64-bit peers draw the same values.
    pub fn index(&mut self, len: usize) -> usize {
        self.draws += 1;
        if len <= 1 {
            let _: u32 = self.rng.gen();
            return 0;
        }
        let bound = u32::try_from(len).unwrap_or(u32::MAX);
        self.rng.gen_range(0..bound) as usize
    }

    /// True with `percent` chance out of 100.
    pub fn percent(&mut self, percent: u32) -> bool {
        self.draws += 1;
        let roll: u32 = self.rng.gen_range(0..100);
        roll < percent
    }

    /// Shuffle a slice in place.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        self.draws += 1;
        items.shuffle(&mut self.rng);
    }
}
