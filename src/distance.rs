//! Distance metrics over integer color vectors.
//!
//! Both metrics return an unsigned integer so that the reference engine and
//! the native engine rank candidates and measure drift identically.

use std::fmt;

use log::debug;

/// Distance metric used for assignment and for convergence drift.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum Metric {
    /// Squared Euclidean distance, without the square root
    #[default]
    Euclidean,
    /// Sum of absolute differences
    Manhattan,
}

impl Metric {
    /// Numeric identifier used across the native boundary.
    pub fn id(&self) -> i32 {
        match self {
            Self::Euclidean => 0,
            Self::Manhattan => 1,
        }
    }

    /// Resolve a numeric identifier. Unknown ids fall back to Euclidean.
    pub fn from_id(id: i32) -> Self {
        match id {
            0 => Self::Euclidean,
            1 => Self::Manhattan,
            other => {
                debug!("Unknown metric id {}, using euclidean", other);
                Self::Euclidean
            }
        }
    }

    /// Resolve a metric name. Unknown names fall back to Euclidean.
    pub fn from_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "euclidean" | "l2" => Self::Euclidean,
            "manhattan" | "l1" | "cityblock" => Self::Manhattan,
            other => {
                debug!("Unknown metric '{}', using euclidean", other);
                Self::Euclidean
            }
        }
    }

    /// Returns the distance function for this metric.
    pub fn func(&self) -> fn(&[i32], &[i32]) -> u64 {
        match self {
            Self::Euclidean => euclidean,
            Self::Manhattan => manhattan,
        }
    }

    #[inline]
    pub fn distance(&self, a: &[i32], b: &[i32]) -> u64 {
        (self.func())(a, b)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Euclidean => "euclidean",
                Self::Manhattan => "manhattan",
            }
        )
    }
}

/// Squared Euclidean distance: sum of squared per-dimension differences
#[inline]
pub fn euclidean(a: &[i32], b: &[i32]) -> u64 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b).fold(0u64, |acc, (&x, &y)| {
        let d = x.abs_diff(y) as u64;
        acc.saturating_add(d.saturating_mul(d))
    })
}

/// Manhattan distance: sum of absolute per-dimension differences
#[inline]
pub fn manhattan(a: &[i32], b: &[i32]) -> u64 {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b)
        .fold(0u64, |acc, (&x, &y)| acc.saturating_add(x.abs_diff(y) as u64))
}

/// Index of the nearest centroid to `point`.
///
/// `centroids` is a flat row-major buffer of `k * point.len()` values. Only a
/// strictly smaller distance replaces the current best, so ties resolve to the
/// first centroid in order.
#[inline]
pub fn nearest_centroid(point: &[i32], centroids: &[i32], metric: Metric) -> usize {
    let dist = metric.func();
    let mut best = 0;
    let mut best_dist = u64::MAX;

    for (j, centroid) in centroids.chunks_exact(point.len()).enumerate() {
        let d = dist(centroid, point);
        if d < best_dist {
            best_dist = d;
            best = j;
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_euclidean() {
        assert_eq!(euclidean(&[0, 0, 0], &[1, 2, 3]), 1 + 4 + 9);
        assert_eq!(euclidean(&[255, 255, 255], &[0, 0, 0]), 3 * 255 * 255);
    }

    #[test]
    fn test_manhattan() {
        assert_eq!(manhattan(&[0, 0, 0], &[1, 2, 3]), 6);
        assert_eq!(manhattan(&[10, 0, 5], &[0, 10, 5]), 20);
    }

    #[test]
    fn test_metric_ids_fall_back_to_euclidean() {
        assert_eq!(Metric::from_id(0), Metric::Euclidean);
        assert_eq!(Metric::from_id(1), Metric::Manhattan);
        assert_eq!(Metric::from_id(7), Metric::Euclidean);
        assert_eq!(Metric::from_id(-1), Metric::Euclidean);
        assert_eq!(Metric::from_name("Manhattan"), Metric::Manhattan);
        assert_eq!(Metric::from_name("chebyshev"), Metric::Euclidean);
        assert_eq!(Metric::from_id(Metric::Manhattan.id()), Metric::Manhattan);
    }

    #[test]
    fn test_nearest_centroid() {
        let centroids = [0, 0, 0, 10, 10, 10];
        assert_eq!(nearest_centroid(&[1, 1, 1], &centroids, Metric::Euclidean), 0);
        assert_eq!(nearest_centroid(&[9, 9, 9], &centroids, Metric::Euclidean), 1);
        // (5,5,5) is equidistant, the first centroid wins
        assert_eq!(nearest_centroid(&[5, 5, 5], &centroids, Metric::Euclidean), 0);
        assert_eq!(nearest_centroid(&[5, 5, 5], &centroids, Metric::Manhattan), 0);
    }

    #[test]
    fn test_metrics_can_disagree() {
        // L1 prefers the centroid off by 3 in one channel, squared L2 the one
        // off by 2 in two channels
        let centroids = [3, 0, 0, 2, 2, 0];
        assert_eq!(nearest_centroid(&[0, 0, 0], &centroids, Metric::Manhattan), 0);
        assert_eq!(nearest_centroid(&[0, 0, 0], &centroids, Metric::Euclidean), 1);
    }

    #[test]
    fn test_no_overflow_at_extremes() {
        let d = euclidean(&[i32::MIN, 0, 0], &[i32::MAX, 0, 0]);
        assert_eq!(d, (u32::MAX as u64) * (u32::MAX as u64));
    }

    fn color() -> impl Strategy<Value = Vec<i32>> {
        prop::collection::vec(0i32..=255, 3)
    }

    proptest! {
        #[test]
        fn prop_euclidean_matches_formula(a in color(), b in color()) {
            let expected: i64 = (0..3).map(|i| ((b[i] - a[i]) as i64).pow(2)).sum();
            prop_assert_eq!(euclidean(&a, &b), expected as u64);
        }

        #[test]
        fn prop_manhattan_matches_formula(a in color(), b in color()) {
            let expected: i64 = (0..3).map(|i| ((b[i] - a[i]) as i64).abs()).sum();
            prop_assert_eq!(manhattan(&a, &b), expected as u64);
        }

        #[test]
        fn prop_symmetric(a in color(), b in color()) {
            prop_assert_eq!(euclidean(&a, &b), euclidean(&b, &a));
            prop_assert_eq!(manhattan(&a, &b), manhattan(&b, &a));
        }

        #[test]
        fn prop_zero_iff_equal(a in color(), b in color()) {
            prop_assert_eq!(euclidean(&a, &b) == 0, a == b);
            prop_assert_eq!(manhattan(&a, &b) == 0, a == b);
            prop_assert_eq!(euclidean(&a, &a), 0);
        }
    }
}
