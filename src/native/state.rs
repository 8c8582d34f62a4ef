//! Flat-buffer clustering state behind the native ports.
//!
//! Centroids, previous centroids and running sums live in contiguous
//! `k * dim` buffers so the C ABI can hand out views without copying and the
//! CUDA port can upload centroids in one transfer.

use super::RawParams;
use crate::cluster::ClusterSnapshot;
use crate::data::Bounds;
use crate::distance::{nearest_centroid, Metric};
use crate::engine::{max_drift, Convergence};
use crate::error::KMeansError;
use crate::seed::{RandomSeeds, SeedSource};
use log::{debug, warn};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

pub struct NativeState {
    k: usize,
    dim: usize,
    metric: Metric,
    threshold: f32,
    max_channel_value: i32,
    data_len: usize,
    centroids: Vec<i32>,
    previous: Vec<i32>,
    sums: Vec<i64>,
    labels: Vec<u32>,
    members: Vec<Vec<u64>>,
    bounds: Option<Bounds>,
    seeds: RandomSeeds<ChaCha8Rng>,
    assigned: bool,
}

impl NativeState {
    pub fn new(params: &RawParams) -> Result<Self, KMeansError> {
        params.check()?;
        let k = params.k as usize;
        let dim = params.dim as usize;

        Ok(Self {
            k,
            dim,
            metric: Metric::from_id(params.metric),
            threshold: params.threshold,
            max_channel_value: params.max_channel_value,
            data_len: params.data_len as usize,
            centroids: Vec::new(),
            previous: Vec::new(),
            sums: vec![0; k * dim],
            labels: Vec::new(),
            members: vec![Vec::new(); k],
            bounds: None,
            seeds: RandomSeeds::from_seed(params.rng_seed),
            assigned: false,
        })
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn is_seeded(&self) -> bool {
        self.bounds.is_some()
    }

    /// Flat `k * dim` centroid buffer
    pub fn centroids(&self) -> &[i32] {
        &self.centroids
    }

    pub fn previous_centroids(&self) -> &[i32] {
        &self.previous
    }

    pub fn members(&self, cluster: usize) -> &[u64] {
        &self.members[cluster]
    }

    /// Owned copies of every cluster
    pub fn snapshots(&self) -> Result<Vec<ClusterSnapshot>, KMeansError> {
        if !self.is_seeded() {
            return Err(KMeansError::NotSeeded);
        }
        Ok((0..self.k)
            .map(|j| ClusterSnapshot {
                centroid: self.centroids[j * self.dim..(j + 1) * self.dim].to_vec(),
                previous_centroid: self.previous[j * self.dim..(j + 1) * self.dim].to_vec(),
                members: self.members[j].iter().map(|&i| i as usize).collect(),
            })
            .collect())
    }

    /// Seed from `explicit` (flat `k * dim`) or from the random stream.
    pub fn seed(&mut self, bounds: Bounds, explicit: Option<&[i32]>) -> Result<(), KMeansError> {
        if bounds.dim() != self.dim {
            return Err(KMeansError::InvalidDimensions(format!(
                "bounds cover {} dimensions, engine expects {}",
                bounds.dim(),
                self.dim
            )));
        }

        let centroids = match explicit {
            Some(values) => {
                if values.len() != self.k * self.dim {
                    return Err(KMeansError::InvalidDimensions(format!(
                        "expected {} seed values, got {}",
                        self.k * self.dim,
                        values.len()
                    )));
                }
                values.to_vec()
            }
            None => (0..self.k)
                .flat_map(|_| self.seeds.next_centroid(&bounds))
                .collect(),
        };

        self.previous = centroids.clone();
        self.centroids = centroids;
        self.bounds = Some(bounds);
        self.clear();
        debug!("Native state seeded with {} clusters", self.k);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.members.iter_mut().for_each(Vec::clear);
        self.sums.iter_mut().for_each(|s| *s = 0);
        self.assigned = false;
    }

    fn check_data(&self, data: &[i32]) -> Result<(), KMeansError> {
        if !self.is_seeded() {
            return Err(KMeansError::NotSeeded);
        }
        if data.len() != self.data_len * self.dim {
            return Err(KMeansError::InvalidDimensions(format!(
                "expected {} values ({} points x {}), got {}",
                self.data_len * self.dim,
                self.data_len,
                self.dim,
                data.len()
            )));
        }
        Ok(())
    }

    /// Label every point in parallel, then rebuild memberships.
    ///
    /// Each worker writes only the label slot of its own point; memberships
    /// are filled afterwards in index order.
    pub fn assign(&mut self, data: &[i32]) -> Result<(), KMeansError> {
        self.check_data(data)?;

        let centroids = &self.centroids;
        let metric = self.metric;
        let mut labels = std::mem::take(&mut self.labels);
        data.par_chunks_exact(self.dim)
            .map(|point| nearest_centroid(point, centroids, metric) as u32)
            .collect_into_vec(&mut labels);

        let result = self.apply_labels(data, &labels);
        self.labels = labels;
        result
    }

    /// Rebuild memberships from externally computed labels.
    pub fn apply_labels(&mut self, data: &[i32], labels: &[u32]) -> Result<(), KMeansError> {
        self.check_data(data)?;
        if labels.len() != self.data_len {
            return Err(KMeansError::InvalidDimensions(format!(
                "expected {} labels, got {}",
                self.data_len,
                labels.len()
            )));
        }
        if let Some(&bad) = labels.iter().find(|&&l| l as usize >= self.k) {
            return Err(KMeansError::Backend(format!(
                "label {} out of range for k = {}",
                bad, self.k
            )));
        }

        self.clear();
        let dim = self.dim;
        for (index, (point, &label)) in data.chunks_exact(dim).zip(labels).enumerate() {
            let cluster = label as usize;
            self.members[cluster].push(index as u64);
            for (sum, &v) in self.sums[cluster * dim..(cluster + 1) * dim]
                .iter_mut()
                .zip(point)
            {
                *sum += v as i64;
            }
        }
        self.assigned = true;
        Ok(())
    }

    /// Recompute centroids with floored means; reseed empty clusters.
    pub fn update(&mut self) -> Result<u32, KMeansError> {
        let bounds = self.bounds.as_ref().ok_or(KMeansError::NotSeeded)?;
        if !self.assigned {
            return Err(KMeansError::InvalidState(
                "update() requires a preceding assign()".to_string(),
            ));
        }

        let dim = self.dim;
        let mut reseeded = 0;
        for j in 0..self.k {
            let range = j * dim..(j + 1) * dim;
            let count = self.members[j].len() as i64;
            if count == 0 {
                let centroid = self.seeds.next_centroid(bounds);
                warn!("Cluster {} is empty, reseeding at {:?}", j, centroid);
                self.centroids[range.clone()].copy_from_slice(&centroid);
                self.previous[range].copy_from_slice(&centroid);
                reseeded += 1;
            } else {
                self.previous[range.clone()].copy_from_slice(&self.centroids[range.clone()]);
                for (c, &sum) in self.centroids[range.clone()].iter_mut().zip(&self.sums[range]) {
                    *c = sum.div_euclid(count) as i32;
                }
            }
        }
        self.assigned = false;
        Ok(reseeded)
    }

    /// Sum of metric distances between current and previous centroids
    pub fn drift(&self) -> Result<f64, KMeansError> {
        if !self.is_seeded() {
            return Err(KMeansError::NotSeeded);
        }
        let dist = self.metric.func();
        Ok(self
            .centroids
            .chunks_exact(self.dim)
            .zip(self.previous.chunks_exact(self.dim))
            .map(|(c, p)| dist(c, p) as f64)
            .sum())
    }

    /// Drift normalized against `k * dim * max_channel_value²`
    pub fn convergence(&self) -> Result<Convergence, KMeansError> {
        let drift = self.drift()?;
        Ok(Convergence::new(
            drift,
            max_drift(self.k, self.dim, self.max_channel_value),
        ))
    }
}
