//! Point data and seeding bounds.

use crate::error::KMeansError;
use ndarray::{Array2, ArrayView1, ArrayView2};
use std::collections::HashSet;

/// Number of channels in an RGB color vector
pub const RGB_CHANNELS: usize = 3;

/// Largest value of an 8-bit color channel
pub const MAX_CHANNEL_VALUE: i32 = 255;

/// An immutable set of integer vectors, one row per point.
///
/// The row index of a point is its identity in cluster memberships. The
/// matrix is kept in standard (row-major) layout so it can be handed across
/// the native boundary as one flat buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSet {
    points: Array2<i32>,
}

impl DataSet {
    /// Build a data set from an `(n_points, dim)` matrix.
    pub fn new(points: Array2<i32>) -> Result<Self, KMeansError> {
        if points.ncols() == 0 {
            return Err(KMeansError::InvalidDimensions(
                "points must have at least one dimension".to_string(),
            ));
        }
        let points = if points.is_standard_layout() {
            points
        } else {
            points.as_standard_layout().into_owned()
        };
        Ok(Self { points })
    }

    /// Build a data set from a view, copying it.
    pub fn from_view(points: &ArrayView2<i32>) -> Result<Self, KMeansError> {
        Self::new(points.to_owned())
    }

    /// Build a 3-channel data set from 8-bit RGB pixels.
    pub fn from_rgb(pixels: &[[u8; 3]]) -> Self {
        let mut points = Array2::zeros((pixels.len(), RGB_CHANNELS));
        for (mut row, px) in points.outer_iter_mut().zip(pixels) {
            for (dst, &src) in row.iter_mut().zip(px) {
                *dst = src as i32;
            }
        }
        Self { points }
    }

    /// Number of points
    pub fn len(&self) -> usize {
        self.points.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.points.nrows() == 0
    }

    /// Dimensionality of every point
    pub fn dim(&self) -> usize {
        self.points.ncols()
    }

    pub fn view(&self) -> ArrayView2<'_, i32> {
        self.points.view()
    }

    pub fn point(&self, index: usize) -> ArrayView1<'_, i32> {
        self.points.row(index)
    }

    /// The whole data set as one row-major buffer of `len() * dim()` values.
    pub fn as_flat(&self) -> &[i32] {
        // Standard layout is enforced in every constructor
        self.points
            .as_slice()
            .expect("data set is always in standard layout")
    }

    /// Iterate points as slices in index order.
    pub fn rows(&self) -> impl Iterator<Item = &[i32]> + '_ {
        self.as_flat().chunks_exact(self.dim())
    }

    /// Number of distinct points. No clustering can populate more clusters.
    pub fn distinct_len(&self) -> usize {
        self.rows().collect::<HashSet<_>>().len()
    }
}

/// Inclusive per-dimension `(min, max)` ranges for random centroids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bounds {
    lower: Vec<i32>,
    upper: Vec<i32>,
}

impl Bounds {
    /// Create bounds from lower and upper limits. Limits are inclusive.
    pub fn new(lower: Vec<i32>, upper: Vec<i32>) -> Result<Self, KMeansError> {
        if lower.is_empty() {
            return Err(KMeansError::InvalidBounds(
                "bounds must cover at least one dimension".to_string(),
            ));
        }
        if lower.len() != upper.len() {
            return Err(KMeansError::InvalidBounds(format!(
                "{} lower limits but {} upper limits",
                lower.len(),
                upper.len()
            )));
        }
        if let Some(d) = (0..lower.len()).find(|&d| lower[d] > upper[d]) {
            return Err(KMeansError::InvalidBounds(format!(
                "dimension {}: min {} > max {}",
                d, lower[d], upper[d]
            )));
        }
        Ok(Self { lower, upper })
    }

    /// The same `(min, max)` range on every one of `dim` dimensions.
    pub fn uniform(dim: usize, min: i32, max: i32) -> Result<Self, KMeansError> {
        Self::new(vec![min; dim], vec![max; dim])
    }

    /// Full 8-bit range on each of the three color channels.
    pub fn rgb() -> Self {
        Self {
            lower: vec![0; RGB_CHANNELS],
            upper: vec![MAX_CHANNEL_VALUE; RGB_CHANNELS],
        }
    }

    pub fn dim(&self) -> usize {
        self.lower.len()
    }

    pub fn lower(&self) -> &[i32] {
        &self.lower
    }

    pub fn upper(&self) -> &[i32] {
        &self.upper
    }

    /// Whether `point` lies inside the bounds on every dimension.
    pub fn contains(&self, point: &[i32]) -> bool {
        point.len() == self.dim()
            && point
                .iter()
                .zip(self.lower.iter().zip(&self.upper))
                .all(|(&v, (&lo, &hi))| lo <= v && v <= hi)
    }
}
