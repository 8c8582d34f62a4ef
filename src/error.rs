use thiserror::Error;

/// Error types for the quantkmeans library
#[derive(Error, Debug, Clone, PartialEq)]
pub enum KMeansError {
    /// The number of clusters k is invalid (must be > 0)
    #[error("Invalid k value: {0}")]
    InvalidK(String),

    /// Convergence threshold outside of [0, 100]
    #[error("Invalid threshold: {0}")]
    InvalidThreshold(String),

    /// Seeding bounds are malformed (min > max, or no dimensions)
    #[error("Invalid bounds: {0}")]
    InvalidBounds(String),

    /// Dimension mismatch between data, bounds and model
    #[error("Dimension mismatch: {0}")]
    InvalidDimensions(String),

    /// The data set has no points
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// An engine operation was called before the clusters were seeded
    #[error("Engine has not been seeded. Call seed() first.")]
    NotSeeded,

    /// Model has not been fitted yet
    #[error("Quantizer has not been fitted. Call fit() first.")]
    NotFitted,

    /// An engine operation was called out of order
    #[error("Invalid engine state: {0}")]
    InvalidState(String),

    /// A centroid was requested from a cluster with no members
    #[error("Cluster has no members; its centroid is undefined")]
    EmptyCluster,

    /// The accelerated backend failed to load, initialize or execute
    #[error("Backend error: {0}")]
    Backend(String),
}
