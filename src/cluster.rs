use crate::error::KMeansError;

/// A cluster: its centroid, the centroid of the previous update, and the
/// indices of the points assigned to it during the current pass.
///
/// Member vectors are folded into per-dimension `i64` sums as they are added,
/// so computing the centroid does not need the data set again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    centroid: Vec<i32>,
    previous_centroid: Vec<i32>,
    members: Vec<usize>,
    sums: Vec<i64>,
}

impl Cluster {
    /// Create an empty cluster seeded at `centroid`.
    pub fn new(centroid: Vec<i32>) -> Self {
        let dim = centroid.len();
        Self {
            previous_centroid: centroid.clone(),
            centroid,
            members: Vec::new(),
            sums: vec![0; dim],
        }
    }

    pub fn centroid(&self) -> &[i32] {
        &self.centroid
    }

    pub fn previous_centroid(&self) -> &[i32] {
        &self.previous_centroid
    }

    /// Indices of member points, in the order they were added.
    pub fn members(&self) -> &[usize] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.centroid.len()
    }

    pub fn clear_members(&mut self) {
        self.members.clear();
        self.sums.iter_mut().for_each(|s| *s = 0);
    }

    /// Register point `index` with value `vector` for the current pass.
    pub fn add_member(&mut self, index: usize, vector: &[i32]) {
        debug_assert_eq!(vector.len(), self.dim());
        self.members.push(index);
        for (sum, &v) in self.sums.iter_mut().zip(vector) {
            *sum += v as i64;
        }
    }

    /// Replace the centroid with the floored per-dimension mean of the members.
    ///
    /// The old centroid moves to `previous_centroid`. Fails with
    /// [`KMeansError::EmptyCluster`] when there are no members.
    pub fn compute_centroid(&mut self) -> Result<(), KMeansError> {
        if self.members.is_empty() {
            return Err(KMeansError::EmptyCluster);
        }
        let count = self.members.len() as i64;
        let mean = self
            .sums
            .iter()
            .map(|&sum| sum.div_euclid(count) as i32)
            .collect();

        self.previous_centroid = std::mem::replace(&mut self.centroid, mean);
        Ok(())
    }

    /// Move the cluster to `centroid`, dropping its centroid history.
    pub fn reseed(&mut self, centroid: Vec<i32>) {
        debug_assert_eq!(centroid.len(), self.dim());
        self.previous_centroid.clone_from(&centroid);
        self.centroid = centroid;
    }
}

/// Owned read-out of one cluster, identical in shape for every engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterSnapshot {
    pub centroid: Vec<i32>,
    pub previous_centroid: Vec<i32>,
    /// Member point indices in ascending order
    pub members: Vec<usize>,
}

impl From<&Cluster> for ClusterSnapshot {
    fn from(cluster: &Cluster) -> Self {
        Self {
            centroid: cluster.centroid.clone(),
            previous_centroid: cluster.previous_centroid.clone(),
            members: cluster.members.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_cluster() {
        let cluster = Cluster::new(vec![1, 2, 3]);
        assert_eq!(cluster.centroid(), &[1, 2, 3]);
        assert_eq!(cluster.previous_centroid(), &[1, 2, 3]);
        assert!(cluster.is_empty());
    }

    #[test]
    fn test_single_member_centroid() {
        let mut cluster = Cluster::new(vec![0, 0, 0]);
        cluster.add_member(4, &[10, 20, 30]);
        cluster.compute_centroid().unwrap();
        assert_eq!(cluster.centroid(), &[10, 20, 30]);
        assert_eq!(cluster.previous_centroid(), &[0, 0, 0]);
    }

    #[test]
    fn test_two_member_centroid() {
        let mut cluster = Cluster::new(vec![100, 100, 100]);
        cluster.add_member(0, &[0, 0, 0]);
        cluster.add_member(1, &[10, 10, 10]);
        cluster.compute_centroid().unwrap();
        assert_eq!(cluster.centroid(), &[5, 5, 5]);
        assert_eq!(cluster.previous_centroid(), &[100, 100, 100]);
    }

    #[test]
    fn test_centroid_floors() {
        let mut cluster = Cluster::new(vec![0, 0, 0]);
        cluster.add_member(0, &[0, 1, 255]);
        cluster.add_member(1, &[1, 2, 254]);
        cluster.compute_centroid().unwrap();
        // 0.5 -> 0, 1.5 -> 1, 254.5 -> 254
        assert_eq!(cluster.centroid(), &[0, 1, 254]);

        let mut negative = Cluster::new(vec![0]);
        negative.add_member(0, &[-1]);
        negative.add_member(1, &[-2]);
        negative.compute_centroid().unwrap();
        assert_eq!(negative.centroid(), &[-2]);
    }

    #[test]
    fn test_large_cluster_does_not_overflow() {
        let mut cluster = Cluster::new(vec![0, 0, 0]);
        for i in 0..100_000 {
            cluster.add_member(i, &[255, 255, 255]);
        }
        cluster.compute_centroid().unwrap();
        assert_eq!(cluster.centroid(), &[255, 255, 255]);
    }

    #[test]
    fn test_empty_centroid_is_error() {
        let mut cluster = Cluster::new(vec![1, 1, 1]);
        assert_eq!(cluster.compute_centroid(), Err(KMeansError::EmptyCluster));
        assert_eq!(cluster.centroid(), &[1, 1, 1]);
    }

    #[test]
    fn test_clear_members_resets_sums() {
        let mut cluster = Cluster::new(vec![0, 0, 0]);
        cluster.add_member(0, &[200, 200, 200]);
        cluster.clear_members();
        cluster.clear_members();
        assert!(cluster.is_empty());

        cluster.add_member(1, &[2, 4, 6]);
        cluster.compute_centroid().unwrap();
        assert_eq!(cluster.centroid(), &[2, 4, 6]);
    }

    #[test]
    fn test_reseed_drops_history() {
        let mut cluster = Cluster::new(vec![0, 0, 0]);
        cluster.add_member(0, &[10, 10, 10]);
        cluster.compute_centroid().unwrap();
        cluster.reseed(vec![7, 8, 9]);
        assert_eq!(cluster.centroid(), &[7, 8, 9]);
        assert_eq!(cluster.previous_centroid(), &[7, 8, 9]);
    }
}
