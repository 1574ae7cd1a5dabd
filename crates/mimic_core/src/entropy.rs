//! Random source shared by learning, generation and scheduling.
//!
//! Everything probabilistic in the agent draws from an [`Entropy`] so that
//! tests can pin a seed or script the exact sequence of draws.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub trait Entropy: Send {
    /// Uniform float in `[0, 1)`.
    fn next_f64(&mut self) -> f64;

    /// Uniform index in `[0, upper)`. `upper` must be non-zero.
    fn below(&mut self, upper: usize) -> usize;

    /// `true` with probability `probability`.
    fn chance(&mut self, probability: f64) -> bool {
        self.next_f64() < probability
    }

    /// Uniform float in `[lo, hi]`.
    fn between(&mut self, lo: f64, hi: f64) -> f64 {
        if hi <= lo {
            return lo;
        }
        lo + (hi - lo) * self.next_f64()
    }

    /// Uniform integer in `[lo, hi]`.
    fn range_inclusive(&mut self, lo: usize, hi: usize) -> usize {
        if hi <= lo {
            return lo;
        }
        lo + self.below(hi - lo + 1)
    }
}

/// Uniformly pick one element, `None` for an empty slice.
pub fn choose<'a, T, E: Entropy + ?Sized>(entropy: &mut E, items: &'a [T]) -> Option<&'a T> {
    if items.is_empty() {
        None
    } else {
        Some(&items[entropy.below(items.len())])
    }
}

/// [`Entropy`] backed by `rand`'s `StdRng`.
pub struct StdEntropy {
    rng: StdRng,
}

impl StdEntropy {
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Reproducible stream for tests and debugging sessions
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for StdEntropy {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl Entropy for StdEntropy {
    fn next_f64(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    fn below(&mut self, upper: usize) -> usize {
        self.rng.gen_range(0..upper.max(1))
    }
}
