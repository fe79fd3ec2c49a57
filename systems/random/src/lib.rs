#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deterministic pseudo-random generator shared by every simulation system.
//!
//! Every stochastic decision in a battle (critical strikes, evasion, blocks,
//! enemy selection, spawn placement, target shuffling) draws from a single
//! [`RandomManager`] so that a battle is fully reproducible from its seed and
//! command log.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Replacement for a zero seed; xorshift never leaves the all-zero state.
const ZERO_SEED_REPLACEMENT: u32 = 0x9e37_79b9;
const STATE_SCALE: f64 = 4_294_967_296.0;

/// Errors raised by selection helpers given unusable input.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum RandomError {
    /// The candidate slice was empty.
    #[error("cannot select from an empty collection")]
    EmptyInput,
    /// Items and weights differ in length.
    #[error("weighted selection got {items} items but {weights} weights")]
    WeightMismatch {
        /// Number of items supplied.
        items: usize,
        /// Number of weights supplied.
        weights: usize,
    },
}

/// Externally visible generator state used for save/restore.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RandomState {
    /// Seed the generator was last reset to.
    pub seed: u32,
    /// Raw xorshift state.
    pub state: u32,
    /// Number of draws since the last reset.
    pub call_count: u64,
}

/// Seeded 32-bit xorshift generator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RandomManager {
    initial_seed: u32,
    seed: u32,
    state: u32,
    call_count: u64,
}

impl RandomManager {
    /// Creates a generator seeded with the provided value.
    #[must_use]
    pub fn new(seed: u32) -> Self {
        let seed = normalize_seed(seed);
        Self {
            initial_seed: seed,
            seed,
            state: seed,
            call_count: 0,
        }
    }

    /// Advances the generator and returns the next raw 32-bit state.
    pub fn next_state(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        self.call_count += 1;
        x
    }

    /// Returns a value in `[0, 1)`.
    pub fn random(&mut self) -> f64 {
        f64::from(self.next_state()) / STATE_SCALE
    }

    /// Returns an integer in `[min, max]`, both inclusive.
    pub fn random_int(&mut self, min: i64, max: i64) -> i64 {
        let span = (i128::from(max) - i128::from(min) + 1) as f64;
        let offset = (self.random() * span).floor() as i128;
        (i128::from(min) + offset) as i64
    }

    /// Returns a float in `[min, max)`.
    pub fn random_float(&mut self, min: f64, max: f64) -> f64 {
        self.random() * (max - min) + min
    }

    /// Returns `true` with probability `probability`.
    pub fn random_bool(&mut self, probability: f64) -> bool {
        self.random() < probability
    }

    /// Picks a uniformly random element.
    pub fn random_element<'a, T>(&mut self, items: &'a [T]) -> Result<&'a T, RandomError> {
        if items.is_empty() {
            return Err(RandomError::EmptyInput);
        }
        let last = i64::try_from(items.len() - 1).unwrap_or(i64::MAX);
        let index = usize::try_from(self.random_int(0, last)).unwrap_or(0);
        Ok(&items[index.min(items.len() - 1)])
    }

    /// Picks an element with probability proportional to its weight.
    ///
    /// Selection subtracts weights from a uniform draw over the total weight
    /// until the remainder drops below zero. If floating-point rounding lets
    /// the remainder survive every subtraction, the last item is returned.
    pub fn weighted_random<'a, T>(
        &mut self,
        items: &'a [T],
        weights: &[f64],
    ) -> Result<&'a T, RandomError> {
        if items.is_empty() {
            return Err(RandomError::EmptyInput);
        }
        if items.len() != weights.len() {
            return Err(RandomError::WeightMismatch {
                items: items.len(),
                weights: weights.len(),
            });
        }

        let total: f64 = weights.iter().sum();
        let mut remainder = self.random() * total;
        for (item, weight) in items.iter().zip(weights) {
            remainder -= weight;
            if remainder < 0.0 {
                return Ok(item);
            }
        }

        Ok(&items[items.len() - 1])
    }

    /// Returns a Fisher–Yates shuffled copy of `items`.
    pub fn shuffle<T: Clone>(&mut self, items: &[T]) -> Vec<T> {
        let mut shuffled = items.to_vec();
        for i in (1..shuffled.len()).rev() {
            let j = (self.random() * (i + 1) as f64).floor() as usize;
            shuffled.swap(i, j.min(i));
        }
        shuffled
    }

    /// Restores the generator to `seed`, or to the construction seed, and
    /// zeroes the draw counter.
    pub fn reset(&mut self, seed: Option<u32>) {
        self.seed = seed.map_or(self.initial_seed, normalize_seed);
        self.state = self.seed;
        self.call_count = 0;
    }

    /// Seed the generator was last reset to.
    #[must_use]
    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// Number of draws since the last reset.
    #[must_use]
    pub fn call_count(&self) -> u64 {
        self.call_count
    }

    /// Captures the current generator state.
    #[must_use]
    pub fn state(&self) -> RandomState {
        RandomState {
            seed: self.seed,
            state: self.state,
            call_count: self.call_count,
        }
    }

    /// Restores a previously captured state.
    pub fn set_state(&mut self, state: RandomState) {
        self.seed = normalize_seed(state.seed);
        self.state = normalize_seed(state.state);
        self.call_count = state.call_count;
    }
}

impl RngCore for RandomManager {
    fn next_u32(&mut self) -> u32 {
        self.next_state()
    }

    fn next_u64(&mut self) -> u64 {
        let high = u64::from(self.next_state());
        let low = u64::from(self.next_state());
        (high << 32) | low
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let bytes = self.next_state().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

fn normalize_seed(seed: u32) -> u32 {
    if seed == 0 {
        ZERO_SEED_REPLACEMENT
    } else {
        seed
    }
}
