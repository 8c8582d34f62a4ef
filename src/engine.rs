//! The clustering engine contract and its reference implementation.
//!
//! Every implementation follows the same call protocol:
//!
//! ```text
//! seed -> (clear_assignments -> assign -> update -> convergence)* -> clusters -> release
//! ```
//!
//! `assign` always sees the centroids fixed at the start of the pass, and
//! `update` runs only after a complete `assign`.

use crate::cluster::{Cluster, ClusterSnapshot};
use crate::config::KMeansConfig;
use crate::data::{Bounds, DataSet};
use crate::distance::{nearest_centroid, Metric};
use crate::error::KMeansError;
use crate::seed::{RandomSeeds, SeedSource};
use log::{debug, warn};
use std::fmt;

/// Lifecycle of an engine within one run
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EngineState {
    /// No clusters exist yet
    Unseeded,
    /// Clusters are seeded or updated and ready for an assignment pass
    Ready,
    /// Memberships reflect the current centroids; `update` may run
    Assigned,
    /// The last update reached the convergence threshold
    Converged,
}

/// Concrete implementation behind an [`Engine`]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EngineKind {
    Reference,
    Native,
    Cuda,
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Reference => "reference",
                Self::Native => "native",
                Self::Cuda => "cuda",
            }
        )
    }
}

/// Parameters fixed when an engine is initialized
#[derive(Debug, Clone, PartialEq)]
pub struct EngineParams {
    pub k: usize,
    pub threshold: f32,
    pub metric: Metric,
    /// Dimensionality of points and centroids
    pub dim: usize,
    /// Number of points every `assign` call will receive
    pub data_len: usize,
    pub max_channel_value: i32,
    /// Seed of the default random centroid source
    pub seed: u64,
}

impl EngineParams {
    pub fn from_config(config: &KMeansConfig, data: &DataSet) -> Self {
        Self {
            k: config.k,
            threshold: config.threshold,
            metric: config.metric,
            dim: data.dim(),
            data_len: data.len(),
            max_channel_value: config.max_channel_value,
            seed: config.seed,
        }
    }

    /// `K × dim × max_channel_value²`, the drift that maps to 0%.
    pub fn max_drift(&self) -> f64 {
        max_drift(self.k, self.dim, self.max_channel_value)
    }
}

/// Normalization constant for the convergence percentage.
pub fn max_drift(k: usize, dim: usize, max_channel_value: i32) -> f64 {
    let max = max_channel_value as f64;
    k as f64 * dim as f64 * max * max
}

/// `(1 - drift / max_drift) * 100`
pub fn convergence_percent(drift: f64, max_drift: f64) -> f64 {
    (1.0 - drift / max_drift) * 100.0
}

/// Convergence measurement after an update
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Convergence {
    /// Sum over clusters of the metric distance between current and previous centroid
    pub drift: f64,
    pub max_drift: f64,
    /// Percentage converged; exactly 100 when no centroid moved
    pub percent: f64,
}

impl Convergence {
    pub fn new(drift: f64, max_drift: f64) -> Self {
        Self {
            drift,
            max_drift,
            percent: convergence_percent(drift, max_drift),
        }
    }

    pub fn reached(&self, threshold: f32) -> bool {
        self.percent >= threshold as f64
    }
}

/// Whether a pass ends the run.
///
/// Besides reaching `threshold`, a pass that reseeded empty clusters must
/// leave at least `min(k, distinct)` clusters populated. A reseeded cluster
/// reports no drift, so a pass that merged two colors would otherwise pass.
pub(crate) fn pass_settles(
    convergence: &Convergence,
    threshold: f32,
    k: usize,
    reseeded: usize,
    distinct: usize,
) -> bool {
    let populated = k.saturating_sub(reseeded);
    convergence.reached(threshold) && (reseeded == 0 || populated >= k.min(distinct))
}

/// The clustering engine contract shared by every implementation.
///
/// Callers depend on this trait only; the concrete engine is chosen when the
/// run is set up.
pub trait Engine: Send {
    fn kind(&self) -> EngineKind;

    fn params(&self) -> &EngineParams;

    fn state(&self) -> EngineState;

    /// Completed assign + update cycles since seeding
    fn pass_count(&self) -> usize;

    /// Create `k` clusters at random centroids within `bounds`.
    fn seed(&mut self, bounds: &Bounds) -> Result<(), KMeansError>;

    /// Create `k` clusters at the given centroids. `bounds` is kept for reseeding.
    fn seed_with(&mut self, bounds: &Bounds, centroids: &[Vec<i32>]) -> Result<(), KMeansError>;

    /// Empty every membership.
    fn clear_assignments(&mut self) -> Result<(), KMeansError>;

    /// Rebuild memberships: every point joins its nearest cluster.
    fn assign(&mut self, data: &DataSet) -> Result<(), KMeansError>;

    /// Recompute centroids, reseeding empty clusters. Returns how many were reseeded.
    fn update(&mut self) -> Result<usize, KMeansError>;

    /// Current convergence drift
    fn drift(&self) -> Result<f64, KMeansError>;

    fn threshold(&self) -> f32;

    /// Read out centroids and memberships of all `k` clusters.
    fn clusters(&self) -> Result<Vec<ClusterSnapshot>, KMeansError>;

    /// Free resources held by the engine. Idempotent.
    fn release(&mut self);

    fn convergence(&self) -> Result<Convergence, KMeansError> {
        Ok(Convergence::new(self.drift()?, self.params().max_drift()))
    }

    fn is_converged(&self) -> bool {
        self.state() == EngineState::Converged
    }
}

/// Check an explicit centroid list against the engine parameters.
pub(crate) fn check_centroids(
    params: &EngineParams,
    centroids: &[Vec<i32>],
) -> Result<(), KMeansError> {
    if centroids.len() != params.k {
        return Err(KMeansError::InvalidK(format!(
            "expected {} seed centroids, got {}",
            params.k,
            centroids.len()
        )));
    }
    if let Some(c) = centroids.iter().find(|c| c.len() != params.dim) {
        return Err(KMeansError::InvalidDimensions(format!(
            "expected {} dimensions per centroid, got {}",
            params.dim,
            c.len()
        )));
    }
    Ok(())
}

/// Check that seeding is possible with these parameters and bounds.
pub(crate) fn check_seed(params: &EngineParams, bounds: &Bounds) -> Result<(), KMeansError> {
    if params.k == 0 {
        return Err(KMeansError::InvalidK(
            "k must be greater than 0".to_string(),
        ));
    }
    if bounds.dim() != params.dim {
        return Err(KMeansError::InvalidDimensions(format!(
            "bounds cover {} dimensions, engine expects {}",
            bounds.dim(),
            params.dim
        )));
    }
    Ok(())
}

/// Check a data set handed to `assign`.
pub(crate) fn check_data(params: &EngineParams, data: &DataSet) -> Result<(), KMeansError> {
    if data.dim() != params.dim {
        return Err(KMeansError::InvalidDimensions(format!(
            "Expected {} features, got {}",
            params.dim,
            data.dim()
        )));
    }
    if data.len() != params.data_len {
        return Err(KMeansError::InvalidDimensions(format!(
            "Expected {} points, got {}",
            params.data_len,
            data.len()
        )));
    }
    Ok(())
}

/// Sequential reference implementation of [`Engine`].
pub struct ReferenceEngine {
    params: EngineParams,
    clusters: Vec<Cluster>,
    bounds: Option<Bounds>,
    seeds: Box<dyn SeedSource>,
    state: EngineState,
    pass_count: usize,
    /// Distinct points in the data set, counted on the first assign
    distinct: Option<usize>,
}

impl ReferenceEngine {
    /// Create an engine drawing centroids from a ChaCha8 stream seeded with `params.seed`.
    pub fn new(params: EngineParams) -> Self {
        let seeds = Box::new(RandomSeeds::from_seed(params.seed));
        Self::with_seed_source(params, seeds)
    }

    /// Create an engine with a caller-supplied centroid source.
    pub fn with_seed_source(params: EngineParams, seeds: Box<dyn SeedSource>) -> Self {
        Self {
            params,
            clusters: Vec::new(),
            bounds: None,
            seeds,
            state: EngineState::Unseeded,
            pass_count: 0,
            distinct: None,
        }
    }

    /// Borrow the live clusters.
    pub fn cluster_refs(&self) -> &[Cluster] {
        &self.clusters
    }

    fn install(&mut self, bounds: &Bounds, centroids: Vec<Vec<i32>>) {
        self.clusters = centroids.into_iter().map(Cluster::new).collect();
        self.bounds = Some(bounds.clone());
        self.state = EngineState::Ready;
        self.pass_count = 0;
        self.distinct = None;
    }

    fn ensure_seeded(&self) -> Result<(), KMeansError> {
        if self.state == EngineState::Unseeded {
            return Err(KMeansError::NotSeeded);
        }
        Ok(())
    }
}

impl Engine for ReferenceEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Reference
    }

    fn params(&self) -> &EngineParams {
        &self.params
    }

    fn state(&self) -> EngineState {
        self.state
    }

    fn pass_count(&self) -> usize {
        self.pass_count
    }

    fn seed(&mut self, bounds: &Bounds) -> Result<(), KMeansError> {
        check_seed(&self.params, bounds)?;
        let centroids = (0..self.params.k)
            .map(|_| self.seeds.next_centroid(bounds))
            .collect();
        self.install(bounds, centroids);
        debug!("Seeded {} clusters", self.params.k);
        Ok(())
    }

    fn seed_with(&mut self, bounds: &Bounds, centroids: &[Vec<i32>]) -> Result<(), KMeansError> {
        check_seed(&self.params, bounds)?;
        check_centroids(&self.params, centroids)?;
        self.install(bounds, centroids.to_vec());
        Ok(())
    }

    fn clear_assignments(&mut self) -> Result<(), KMeansError> {
        self.ensure_seeded()?;
        self.clusters.iter_mut().for_each(Cluster::clear_members);
        self.state = EngineState::Ready;
        Ok(())
    }

    fn assign(&mut self, data: &DataSet) -> Result<(), KMeansError> {
        self.ensure_seeded()?;
        check_data(&self.params, data)?;
        self.distinct.get_or_insert_with(|| data.distinct_len());

        // Centroids are frozen for the whole pass
        let centroids: Vec<i32> = self
            .clusters
            .iter()
            .flat_map(|c| c.centroid().iter().copied())
            .collect();

        self.clusters.iter_mut().for_each(Cluster::clear_members);
        for (index, point) in data.rows().enumerate() {
            let best = nearest_centroid(point, &centroids, self.params.metric);
            self.clusters[best].add_member(index, point);
        }

        self.state = EngineState::Assigned;
        Ok(())
    }

    fn update(&mut self) -> Result<usize, KMeansError> {
        self.ensure_seeded()?;
        if self.state != EngineState::Assigned {
            return Err(KMeansError::InvalidState(
                "update() requires a preceding assign()".to_string(),
            ));
        }
        let bounds = self.bounds.as_ref().ok_or(KMeansError::NotSeeded)?;

        let mut reseeded = 0;
        for (i, cluster) in self.clusters.iter_mut().enumerate() {
            if cluster.is_empty() {
                let centroid = self.seeds.next_centroid(bounds);
                warn!("Cluster {} is empty, reseeding at {:?}", i, centroid);
                cluster.reseed(centroid);
                reseeded += 1;
            } else {
                cluster.compute_centroid()?;
            }
        }
        self.pass_count += 1;

        let convergence = self.convergence()?;
        let distinct = self.distinct.unwrap_or(self.params.k);
        self.state = if pass_settles(
            &convergence,
            self.params.threshold,
            self.params.k,
            reseeded,
            distinct,
        ) {
            EngineState::Converged
        } else {
            EngineState::Ready
        };
        Ok(reseeded)
    }

    fn drift(&self) -> Result<f64, KMeansError> {
        self.ensure_seeded()?;
        let dist = self.params.metric.func();
        Ok(self
            .clusters
            .iter()
            .map(|c| dist(c.centroid(), c.previous_centroid()) as f64)
            .sum())
    }

    fn threshold(&self) -> f32 {
        self.params.threshold
    }

    fn clusters(&self) -> Result<Vec<ClusterSnapshot>, KMeansError> {
        self.ensure_seeded()?;
        Ok(self.clusters.iter().map(ClusterSnapshot::from).collect())
    }

    fn release(&mut self) {
        self.clusters.clear();
        self.bounds = None;
        self.distinct = None;
        self.state = EngineState::Unseeded;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed::FixedSeeds;
    use approx::assert_relative_eq;

    fn params(k: usize, data: &DataSet) -> EngineParams {
        EngineParams::from_config(&KMeansConfig::new(k), data)
    }

    fn black_and_white() -> DataSet {
        let mut pixels = vec![[0u8, 0, 0]; 50];
        pixels.extend(vec![[255u8, 255, 255]; 50]);
        DataSet::from_rgb(&pixels)
    }

    #[test]
    fn test_seed_creates_k_empty_clusters() {
        let data = black_and_white();
        let mut engine = ReferenceEngine::new(params(5, &data));
        assert_eq!(engine.state(), EngineState::Unseeded);

        engine.seed(&Bounds::rgb()).unwrap();

        let clusters = engine.clusters().unwrap();
        assert_eq!(clusters.len(), 5);
        for c in &clusters {
            assert!(c.members.is_empty());
            assert_eq!(c.centroid, c.previous_centroid);
            assert!(Bounds::rgb().contains(&c.centroid));
        }
        assert_eq!(engine.state(), EngineState::Ready);
    }

    #[test]
    fn test_seed_uses_injected_source() {
        let data = black_and_white();
        let seeds = FixedSeeds::new(vec![vec![1, 2, 3], vec![4, 5, 6]]).unwrap();
        let mut engine = ReferenceEngine::with_seed_source(params(2, &data), Box::new(seeds));
        engine.seed(&Bounds::rgb()).unwrap();

        let clusters = engine.clusters().unwrap();
        assert_eq!(clusters[0].centroid, vec![1, 2, 3]);
        assert_eq!(clusters[1].centroid, vec![4, 5, 6]);
    }

    #[test]
    fn test_seed_rejects_bad_input() {
        let data = black_and_white();
        let mut engine = ReferenceEngine::new(params(0, &data));
        assert!(matches!(
            engine.seed(&Bounds::rgb()),
            Err(KMeansError::InvalidK(_))
        ));

        let mut engine = ReferenceEngine::new(params(2, &data));
        let two_d = Bounds::uniform(2, 0, 255).unwrap();
        assert!(matches!(
            engine.seed(&two_d),
            Err(KMeansError::InvalidDimensions(_))
        ));
        assert!(matches!(
            engine.seed_with(&Bounds::rgb(), &[vec![0, 0, 0]]),
            Err(KMeansError::InvalidK(_))
        ));
    }

    #[test]
    fn test_operations_before_seed_fail() {
        let data = black_and_white();
        let mut engine = ReferenceEngine::new(params(2, &data));
        assert_eq!(engine.assign(&data), Err(KMeansError::NotSeeded));
        assert_eq!(engine.update(), Err(KMeansError::NotSeeded));
        assert_eq!(engine.drift(), Err(KMeansError::NotSeeded));
        assert!(engine.clusters().is_err());
    }

    #[test]
    fn test_update_before_assign_fails() {
        let data = black_and_white();
        let mut engine = ReferenceEngine::new(params(2, &data));
        engine.seed(&Bounds::rgb()).unwrap();
        assert!(matches!(engine.update(), Err(KMeansError::InvalidState(_))));
    }

    #[test]
    fn test_assign_partitions_every_point() {
        let data = black_and_white();
        let mut engine = ReferenceEngine::new(params(3, &data));
        engine.seed(&Bounds::rgb()).unwrap();
        engine.assign(&data).unwrap();

        let mut all: Vec<usize> = engine
            .clusters()
            .unwrap()
            .into_iter()
            .flat_map(|c| c.members)
            .collect();
        all.sort_unstable();
        assert_eq!(all, (0..data.len()).collect::<Vec<_>>());
    }

    #[test]
    fn test_assign_twice_does_not_accumulate() {
        let data = black_and_white();
        let mut engine = ReferenceEngine::new(params(2, &data));
        engine.seed(&Bounds::rgb()).unwrap();
        engine.assign(&data).unwrap();
        engine.assign(&data).unwrap();

        let total: usize = engine.clusters().unwrap().iter().map(|c| c.members.len()).sum();
        assert_eq!(total, data.len());
    }

    #[test]
    fn test_assign_ties_go_to_first_cluster() {
        let data = DataSet::from_rgb(&[[5, 5, 5]]);
        let mut engine = ReferenceEngine::new(params(2, &data));
        engine
            .seed_with(&Bounds::rgb(), &[vec![0, 0, 0], vec![10, 10, 10]])
            .unwrap();
        engine.assign(&data).unwrap();

        let clusters = engine.clusters().unwrap();
        assert_eq!(clusters[0].members, vec![0]);
        assert!(clusters[1].members.is_empty());
    }

    #[test]
    fn test_assign_rejects_other_data() {
        let data = black_and_white();
        let mut engine = ReferenceEngine::new(params(2, &data));
        engine.seed(&Bounds::rgb()).unwrap();
        let other = DataSet::from_rgb(&[[1, 1, 1]]);
        assert!(matches!(
            engine.assign(&other),
            Err(KMeansError::InvalidDimensions(_))
        ));
    }

    #[test]
    fn test_black_and_white_converges() {
        let data = black_and_white();
        let seeds = FixedSeeds::new(vec![vec![10, 10, 10], vec![240, 240, 240]]).unwrap();
        let mut engine = ReferenceEngine::with_seed_source(params(2, &data), Box::new(seeds));
        engine.seed(&Bounds::rgb()).unwrap();

        engine.clear_assignments().unwrap();
        engine.assign(&data).unwrap();
        assert_eq!(engine.update().unwrap(), 0);

        let clusters = engine.clusters().unwrap();
        assert_eq!(clusters[0].centroid, vec![0, 0, 0]);
        assert_eq!(clusters[1].centroid, vec![255, 255, 255]);
        assert_eq!(clusters[0].members, (0..50).collect::<Vec<_>>());
        assert_eq!(clusters[1].members, (50..100).collect::<Vec<_>>());

        // drift = 3 * 10^2 + 3 * 15^2 against max 2 * 3 * 255^2
        let convergence = engine.convergence().unwrap();
        assert_relative_eq!(convergence.drift, 975.0);
        assert_relative_eq!(
            convergence.percent,
            (1.0 - 975.0 / 390_150.0) * 100.0,
            epsilon = 1e-9
        );
        assert!(engine.is_converged());
        assert_eq!(engine.pass_count(), 1);
    }

    #[test]
    fn test_unchanged_centroids_are_fully_converged() {
        let data = black_and_white();
        let mut engine = ReferenceEngine::new(params(2, &data));
        engine
            .seed_with(&Bounds::rgb(), &[vec![0, 0, 0], vec![255, 255, 255]])
            .unwrap();
        engine.assign(&data).unwrap();
        engine.update().unwrap();

        let convergence = engine.convergence().unwrap();
        assert_eq!(convergence.drift, 0.0);
        assert_eq!(convergence.percent, 100.0);
    }

    #[test]
    fn test_empty_cluster_is_reseeded_and_revived() {
        // black, gray, white; cluster 2 duplicates cluster 0 and loses every tie
        let data = DataSet::from_rgb(&[[0, 0, 0], [128, 128, 128], [255, 255, 255]]);
        let seeds = FixedSeeds::new(vec![
            vec![0, 0, 0],
            vec![200, 200, 200],
            vec![0, 0, 0],
            vec![128, 128, 128],
        ])
        .unwrap();
        let mut engine = ReferenceEngine::with_seed_source(params(3, &data), Box::new(seeds));
        engine.seed(&Bounds::rgb()).unwrap();

        engine.assign(&data).unwrap();
        let clusters = engine.clusters().unwrap();
        assert_eq!(clusters[0].members, vec![0]);
        assert_eq!(clusters[1].members, vec![1, 2]);
        assert!(clusters[2].members.is_empty());

        assert_eq!(engine.update().unwrap(), 1);
        let clusters = engine.clusters().unwrap();
        assert_eq!(clusters.len(), 3);
        assert_eq!(clusters[2].centroid, vec![128, 128, 128]);
        assert_eq!(clusters[2].previous_centroid, vec![128, 128, 128]);

        engine.assign(&data).unwrap();
        let clusters = engine.clusters().unwrap();
        assert_eq!(clusters[2].members, vec![1]);
        assert_eq!(clusters[1].members, vec![2]);
    }

    #[test]
    fn test_reseeding_pass_does_not_end_run() {
        // both seeds on gray: cluster 0 takes every point, cluster 1 is reseeded
        let data = black_and_white();
        let seeds = FixedSeeds::new(vec![
            vec![127, 127, 127],
            vec![127, 127, 127],
            vec![200, 200, 200],
        ])
        .unwrap();
        let mut engine = ReferenceEngine::with_seed_source(params(2, &data), Box::new(seeds));
        engine.seed(&Bounds::rgb()).unwrap();

        engine.assign(&data).unwrap();
        assert_eq!(engine.update().unwrap(), 1);
        // floor(12750 / 100) leaves cluster 0 in place: no drift at all
        assert_eq!(engine.convergence().unwrap().percent, 100.0);
        assert_eq!(engine.state(), EngineState::Ready);

        while !engine.is_converged() {
            engine.clear_assignments().unwrap();
            engine.assign(&data).unwrap();
            engine.update().unwrap();
            assert!(engine.pass_count() <= 3);
        }

        let clusters = engine.clusters().unwrap();
        assert_eq!(clusters[0].centroid, vec![0, 0, 0]);
        assert_eq!(clusters[1].centroid, vec![255, 255, 255]);
        assert_eq!(clusters[0].members.len(), 50);
        assert_eq!(clusters[1].members.len(), 50);
    }

    #[test]
    fn test_more_clusters_than_distinct_points_converges() {
        let data = DataSet::from_rgb(&[[0, 0, 0], [0, 0, 0], [255, 255, 255]]);
        let seeds = FixedSeeds::new(vec![
            vec![0, 0, 0],
            vec![255, 255, 255],
            vec![100, 100, 100],
        ])
        .unwrap();
        let mut engine = ReferenceEngine::with_seed_source(params(3, &data), Box::new(seeds));
        engine.seed(&Bounds::rgb()).unwrap();

        engine.assign(&data).unwrap();
        assert_eq!(engine.update().unwrap(), 1);
        assert!(engine.is_converged());
    }

    #[test]
    fn test_pass_settles() {
        let still = Convergence::new(0.0, 100.0);
        let moving = Convergence::new(50.0, 100.0);
        assert!(pass_settles(&still, 99.0, 2, 0, 2));
        assert!(!pass_settles(&moving, 99.0, 2, 0, 2));
        assert!(!pass_settles(&still, 99.0, 2, 1, 2));
        assert!(pass_settles(&still, 99.0, 4, 2, 2));
        assert!(!pass_settles(&still, 99.0, 4, 3, 2));
    }

    #[test]
    fn test_k_one_terminates() {
        let data = DataSet::from_rgb(&[[10, 20, 30], [20, 30, 40], [30, 40, 50]]);
        let mut engine = ReferenceEngine::new(params(1, &data));
        engine.seed(&Bounds::rgb()).unwrap();

        let mut passes = 0;
        while !engine.is_converged() {
            engine.clear_assignments().unwrap();
            engine.assign(&data).unwrap();
            engine.update().unwrap();
            passes += 1;
            assert!(passes <= 2, "k = 1 must converge by the second pass");
        }

        let clusters = engine.clusters().unwrap();
        assert_eq!(clusters[0].centroid, vec![20, 30, 40]);
        assert_eq!(clusters[0].members, vec![0, 1, 2]);
    }

    #[test]
    fn test_manhattan_drift() {
        let data = DataSet::from_rgb(&[[10, 10, 10]]);
        let config = KMeansConfig::new(1).with_metric(Metric::Manhattan);
        let mut engine = ReferenceEngine::new(EngineParams::from_config(&config, &data));
        engine.seed_with(&Bounds::rgb(), &[vec![0, 0, 0]]).unwrap();
        engine.assign(&data).unwrap();
        engine.update().unwrap();
        assert_relative_eq!(engine.drift().unwrap(), 30.0);
    }

    #[test]
    fn test_reseeding_resets_pass_count() {
        let data = black_and_white();
        let mut engine = ReferenceEngine::new(params(2, &data));
        engine.seed(&Bounds::rgb()).unwrap();
        engine.assign(&data).unwrap();
        engine.update().unwrap();
        assert_eq!(engine.pass_count(), 1);

        engine.seed(&Bounds::rgb()).unwrap();
        assert_eq!(engine.pass_count(), 0);
        assert_eq!(engine.state(), EngineState::Ready);
    }

    #[test]
    fn test_release() {
        let data = black_and_white();
        let mut engine = ReferenceEngine::new(params(2, &data));
        engine.seed(&Bounds::rgb()).unwrap();
        engine.release();
        engine.release();
        assert_eq!(engine.state(), EngineState::Unseeded);
        assert!(engine.cluster_refs().is_empty());
    }
}
