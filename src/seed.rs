//! Sources of seed and replacement centroids.

use crate::data::Bounds;
use crate::error::KMeansError;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::VecDeque;

/// Produces centroids for seeding and for reseeding empty clusters.
pub trait SeedSource: Send {
    /// Draw one centroid inside `bounds` (inclusive on both ends).
    fn next_centroid(&mut self, bounds: &Bounds) -> Vec<i32>;
}

/// Independent uniform draws per dimension.
#[derive(Debug, Clone)]
pub struct RandomSeeds<R> {
    rng: R,
}

impl<R: Rng> RandomSeeds<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl RandomSeeds<ChaCha8Rng> {
    /// Reproducible source; both engines use this for the same `seed`.
    pub fn from_seed(seed: u64) -> Self {
        Self::new(ChaCha8Rng::seed_from_u64(seed))
    }
}

impl<R: Rng + Send> SeedSource for RandomSeeds<R> {
    fn next_centroid(&mut self, bounds: &Bounds) -> Vec<i32> {
        bounds
            .lower()
            .iter()
            .zip(bounds.upper())
            .map(|(&lo, &hi)| self.rng.gen_range(lo..=hi))
            .collect()
    }
}

/// Replays a fixed list of centroids, cycling when it runs out.
///
/// Values are handed out as given; bounds are not applied.
#[derive(Debug, Clone)]
pub struct FixedSeeds {
    queue: VecDeque<Vec<i32>>,
}

impl FixedSeeds {
    /// Fails with [`KMeansError::InsufficientData`] if `centroids` is empty.
    pub fn new<I>(centroids: I) -> Result<Self, KMeansError>
    where
        I: IntoIterator<Item = Vec<i32>>,
    {
        let queue: VecDeque<Vec<i32>> = centroids.into_iter().collect();
        if queue.is_empty() {
            return Err(KMeansError::InsufficientData(
                "fixed seed source needs at least one centroid".to_string(),
            ));
        }
        Ok(Self { queue })
    }
}

impl SeedSource for FixedSeeds {
    fn next_centroid(&mut self, _bounds: &Bounds) -> Vec<i32> {
        // Non-empty by construction
        let next = self.queue.pop_front().unwrap_or_default();
        self.queue.push_back(next.clone());
        next
    }
}
