//! Selection of the participants of a round.

use rand::{seq::index, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// Selects the participants of a round.
pub trait Selector {
    /// Selects `count` distinct indices out of a population of `population` participants.
    ///
    /// If `count` is at least the population, the whole population is selected.
    fn select(&mut self, round: u64, population: usize, count: usize) -> Vec<usize>;
}

/// Selects participants uniformly at random without replacement.
///
/// Every round draws from its own stream of a generator seeded once, hence the selection only
/// depends on the seed, the round and the population, but not on the previous rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RandomSelector {
    seed: u64,
}

impl RandomSelector {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }
}

impl Selector for RandomSelector {
    fn select(&mut self, round: u64, population: usize, count: usize) -> Vec<usize> {
        if count >= population {
            return (0..population).collect();
        }

        let mut rng = ChaCha20Rng::seed_from_u64(self.seed);
        rng.set_stream(round);
        let mut selected = index::sample(&mut rng, population, count).into_vec();
        selected.sort_unstable();
        selected
    }
}
