//! Uniform sampling of the search space
//!
//! Uses the xoshiro256++ PRNG, seeded for reproducible searches or from
//! entropy otherwise.

use super::SearchSpace;
use crate::config::RunParameters;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

/// Draws integer points uniformly from every axis of a [`SearchSpace`]
pub struct UniformSampler {
    rng: Xoshiro256PlusPlus,
}

impl UniformSampler {
    /// Sampler with a random seed
    pub fn new() -> Self {
        Self {
            rng: Xoshiro256PlusPlus::from_entropy(),
        }
    }

    /// Sampler with a specific seed
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
        }
    }

    pub fn from_seed(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::with_seed(seed),
            None => Self::new(),
        }
    }

    /// Next point, every coordinate within its inclusive bounds
    pub fn next_point(&mut self, space: &SearchSpace) -> RunParameters {
        RunParameters {
            workers: self.rng.gen_range(space.workers.min..=space.workers.max) as usize,
            granularity: self
                .rng
                .gen_range(space.granularity.min..=space.granularity.max),
            broadcast_rate: self
                .rng
                .gen_range(space.broadcast_rate.min..=space.broadcast_rate.max),
        }
    }
}

impl Default for UniformSampler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Bounds;

    fn space() -> SearchSpace {
        SearchSpace {
            granularity: Bounds::new(0, 20),
            broadcast_rate: Bounds::new(1, 10),
            workers: Bounds::new(2, 4),
        }
    }

    #[test]
    fn test_points_within_bounds() {
        let space = space();
        let mut sampler = UniformSampler::new();

        for _ in 0..500 {
            let p = sampler.next_point(&space);
            assert!(space.granularity.contains(p.granularity));
            assert!(space.broadcast_rate.contains(p.broadcast_rate));
            assert!(space.workers.contains(p.workers as u64));
        }
    }

    #[test]
    fn test_seeded_sampler_is_reproducible() {
        let space = space();
        let mut a = UniformSampler::with_seed(12345);
        let mut b = UniformSampler::with_seed(12345);

        for _ in 0..10 {
            assert_eq!(a.next_point(&space), b.next_point(&space));
        }
    }

    #[test]
    fn test_degenerate_axis() {
        let space = SearchSpace {
            granularity: Bounds::new(3, 3),
            broadcast_rate: Bounds::new(1, 1),
            workers: Bounds::new(1, 1),
        };
        let mut sampler = UniformSampler::with_seed(1);
        let p = sampler.next_point(&space);
        assert_eq!((p.granularity, p.broadcast_rate, p.workers), (3, 1, 1));
    }
}
