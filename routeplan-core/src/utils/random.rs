#[cfg(test)]
#[path = "../../tests/unit/utils/random_test.rs"]
mod random_test;

use rand::prelude::*;
use std::sync::Mutex;

/// Provides the way to use randomized values in generic way.
pub trait Random: Send + Sync {
    /// Produces integral random value, uniformly distributed on the closed interval [min, max].
    fn uniform_int(&self, min: i32, max: i32) -> i32;

    /// Produces real random value, uniformly distributed on the interval [min, max).
    fn uniform_real(&self, min: f64, max: f64) -> f64;

    /// Flips a coin and returns true if it is "heads", false otherwise.
    fn is_head_not_tails(&self) -> bool;

    /// Returns a random index in `[0, len)`. `len` must be positive.
    fn uniform_index(&self, len: usize) -> usize {
        assert!(len > 0);
        self.uniform_int(0, (len - 1) as i32) as usize
    }
}

/// A default random implementation backed by small, fast RNG.
pub struct DefaultRandom {
    rng: Mutex<SmallRng>,
}

impl DefaultRandom {
    /// Creates an instance of `DefaultRandom` with repeatable (predictable) random generation.
    pub fn new_repeatable() -> Self {
        Self::with_seed(0)
    }

    /// Creates an instance of `DefaultRandom` seeded with given value.
    pub fn with_seed(seed: u64) -> Self {
        Self { rng: Mutex::new(SmallRng::seed_from_u64(seed)) }
    }

    fn with_rng<R>(&self, func: impl FnOnce(&mut SmallRng) -> R) -> R {
        // NOTE a poisoned lock still holds a usable generator
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        func(&mut rng)
    }
}

impl Default for DefaultRandom {
    fn default() -> Self {
        Self { rng: Mutex::new(SmallRng::from_entropy()) }
    }
}

impl Random for DefaultRandom {
    fn uniform_int(&self, min: i32, max: i32) -> i32 {
        if min == max {
            return min;
        }

        assert!(min < max);
        self.with_rng(|rng| rng.gen_range(min..max + 1))
    }

    fn uniform_real(&self, min: f64, max: f64) -> f64 {
        if (min - max).abs() < f64::EPSILON {
            return min;
        }

        assert!(min < max);
        self.with_rng(|rng| rng.gen_range(min..max))
    }

    fn is_head_not_tails(&self) -> bool {
        self.with_rng(|rng| rng.gen_bool(0.5))
    }
}
