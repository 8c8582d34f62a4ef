use crate::data::{Bounds, MAX_CHANNEL_VALUE};
use crate::distance::Metric;
use crate::error::KMeansError;
use std::fmt;
use std::path::PathBuf;

/// Which engine implementation runs the clustering.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Backend {
    /// Probe CUDA (when compiled in), then the native C ABI engine, then
    /// fall back to the reference engine.
    #[default]
    Auto,
    /// The reference engine only
    Reference,
    /// The native C ABI engine, falling back to the reference engine
    Native,
    /// The CUDA engine, falling back to the reference engine
    Cuda,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Auto => "auto",
                Self::Reference => "reference",
                Self::Native => "native",
                Self::Cuda => "cuda",
            }
        )
    }
}

/// Configuration for a quantization run
#[derive(Debug, Clone)]
pub struct KMeansConfig {
    /// Number of clusters (palette size)
    pub k: usize,

    /// Convergence threshold in percent, within [0, 100]. A run stops once
    /// `(1 - drift / max_drift) * 100` reaches it.
    pub threshold: f32,

    /// Distance metric for assignment and drift
    pub metric: Metric,

    /// Bounds for random seed and reseed centroids.
    /// `None` means `[0, max_channel_value]` on every dimension of the data.
    pub bounds: Option<Bounds>,

    /// Largest value a channel can take; normalizes the convergence drift.
    pub max_channel_value: i32,

    /// Optional ceiling on the number of passes. `None` runs until the
    /// threshold is met, however long that takes.
    pub max_passes: Option<usize>,

    /// Random seed for centroid seeding and reseeding
    pub seed: u64,

    /// Engine selection
    pub backend: Backend,

    /// Shared library providing the `kmq_*` C ABI for the native backend.
    /// `None` uses the entry points compiled into this crate.
    pub native_library: Option<PathBuf>,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            k: 8,
            threshold: 99.0,
            metric: Metric::Euclidean,
            bounds: None,
            max_channel_value: MAX_CHANNEL_VALUE,
            max_passes: None,
            seed: 0,
            backend: Backend::Auto,
            native_library: None,
        }
    }
}

impl KMeansConfig {
    /// Create a new configuration with the specified number of clusters
    pub fn new(k: usize) -> Self {
        Self {
            k,
            ..Default::default()
        }
    }

    /// Set the convergence threshold (percent)
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set the distance metric
    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self
    }

    /// Set explicit seeding bounds
    pub fn with_bounds(mut self, bounds: Bounds) -> Self {
        self.bounds = Some(bounds);
        self
    }

    /// Set the channel maximum used for drift normalization
    pub fn with_max_channel_value(mut self, max_channel_value: i32) -> Self {
        self.max_channel_value = max_channel_value;
        self
    }

    /// Set the pass ceiling
    pub fn with_max_passes(mut self, max_passes: Option<usize>) -> Self {
        self.max_passes = max_passes;
        self
    }

    /// Set the random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the engine backend
    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    /// Load the native engine from a shared library
    pub fn with_native_library(mut self, path: impl Into<PathBuf>) -> Self {
        self.native_library = Some(path.into());
        self
    }

    /// Check parameters before a run starts.
    pub fn validate(&self) -> Result<(), KMeansError> {
        if self.k == 0 {
            return Err(KMeansError::InvalidK(
                "k must be greater than 0".to_string(),
            ));
        }
        if u32::try_from(self.k).is_err() {
            return Err(KMeansError::InvalidK(format!("k = {} is too large", self.k)));
        }
        if !(0.0..=100.0).contains(&self.threshold) {
            return Err(KMeansError::InvalidThreshold(format!(
                "threshold must be within [0, 100], got {}",
                self.threshold
            )));
        }
        if self.max_channel_value < 1 {
            return Err(KMeansError::InvalidBounds(format!(
                "max_channel_value must be positive, got {}",
                self.max_channel_value
            )));
        }
        if self.max_passes == Some(0) {
            return Err(KMeansError::InvalidState(
                "max_passes must allow at least one pass".to_string(),
            ));
        }
        Ok(())
    }

    /// Bounds for a data set of dimensionality `dim`.
    pub fn bounds_for(&self, dim: usize) -> Result<Bounds, KMeansError> {
        match &self.bounds {
            Some(bounds) if bounds.dim() != dim => Err(KMeansError::InvalidDimensions(format!(
                "bounds cover {} dimensions, data has {}",
                bounds.dim(),
                dim
            ))),
            Some(bounds) => Ok(bounds.clone()),
            None => Bounds::uniform(dim, 0, self.max_channel_value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = KMeansConfig::default();
        assert_eq!(config.k, 8);
        assert_eq!(config.threshold, 99.0);
        assert_eq!(config.metric, Metric::Euclidean);
        assert_eq!(config.max_channel_value, 255);
        assert!(config.max_passes.is_none());
        assert_eq!(config.backend, Backend::Auto);
        assert!(config.native_library.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = KMeansConfig::new(4)
            .with_threshold(95.5)
            .with_metric(Metric::Manhattan)
            .with_max_passes(Some(10))
            .with_seed(7)
            .with_backend(Backend::Reference)
            .with_native_library("/opt/kmq/libquantkmeans_rs.so");
        assert_eq!(config.k, 4);
        assert_eq!(config.threshold, 95.5);
        assert_eq!(config.metric, Metric::Manhattan);
        assert_eq!(config.max_passes, Some(10));
        assert_eq!(config.seed, 7);
        assert_eq!(config.backend, Backend::Reference);
        assert_eq!(
            config.native_library,
            Some(PathBuf::from("/opt/kmq/libquantkmeans_rs.so"))
        );
    }

    #[test]
    fn test_validate_rejects_bad_parameters() {
        assert!(matches!(
            KMeansConfig::new(0).validate(),
            Err(KMeansError::InvalidK(_))
        ));
        assert!(matches!(
            KMeansConfig::new(2).with_threshold(100.5).validate(),
            Err(KMeansError::InvalidThreshold(_))
        ));
        assert!(matches!(
            KMeansConfig::new(2).with_threshold(-1.0).validate(),
            Err(KMeansError::InvalidThreshold(_))
        ));
        assert!(matches!(
            KMeansConfig::new(2).with_threshold(f32::NAN).validate(),
            Err(KMeansError::InvalidThreshold(_))
        ));
        assert!(matches!(
            KMeansConfig::new(2).with_max_channel_value(0).validate(),
            Err(KMeansError::InvalidBounds(_))
        ));
        assert!(KMeansConfig::new(2).with_max_passes(Some(0)).validate().is_err());
    }

    #[test]
    fn test_bounds_for() {
        let config = KMeansConfig::new(2);
        assert_eq!(config.bounds_for(3).unwrap(), Bounds::rgb());

        let config = config.with_bounds(Bounds::uniform(2, 0, 9).unwrap());
        assert_eq!(config.bounds_for(2).unwrap().upper(), &[9, 9]);
        assert!(matches!(
            config.bounds_for(3),
            Err(KMeansError::InvalidDimensions(_))
        ));
    }
}
