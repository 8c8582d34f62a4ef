use crate::cluster::ClusterSnapshot;
use crate::config::{Backend, KMeansConfig};
use crate::data::DataSet;
use crate::distance::nearest_centroid;
use crate::engine::{Convergence, Engine, EngineKind, EngineParams, ReferenceEngine};
use crate::error::KMeansError;
use crate::native::{CAbiPort, NativeEngine, NativePort};
use log::{debug, info, warn};
use ndarray::{Array1, Array2, ArrayView2};
use rayon::prelude::*;

/// Builds a port for an injected accelerated backend.
pub type PortFactory = Box<dyn Fn() -> Result<Box<dyn NativePort>, KMeansError> + Send + Sync>;

/// How a run ended
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The convergence percentage reached the threshold
    Converged,
    /// `max_passes` ran out first
    PassLimitReached,
}

/// Measurements taken after one assign + update pass
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PassReport {
    /// 1-based pass number
    pub pass: usize,
    pub drift: f64,
    pub percent: f64,
    /// Empty clusters reseeded during the update
    pub reseeded: usize,
}

/// Result of a quantization run.
#[derive(Debug, Clone)]
pub struct Quantization {
    /// Final clusters, in seeding order
    pub clusters: Vec<ClusterSnapshot>,
    /// Cluster index of every input point, from the final memberships
    pub labels: Array1<i64>,
    pub passes: usize,
    /// Convergence after the last pass
    pub convergence: Convergence,
    pub outcome: RunOutcome,
    /// Engine that actually ran
    pub backend: EngineKind,
    pub history: Vec<PassReport>,
    palette: Array2<i32>,
}

impl Quantization {
    /// Final centroids as a `(k, dim)` array.
    pub fn palette(&self) -> &Array2<i32> {
        &self.palette
    }

    /// Every input point replaced by the centroid of its cluster.
    pub fn quantized(&self) -> Array2<i32> {
        let palette = &self.palette;
        let mut out = Array2::zeros((self.labels.len(), palette.ncols()));
        for (mut row, &label) in out.outer_iter_mut().zip(self.labels.iter()) {
            row.assign(&palette.row(label as usize));
        }
        out
    }

    pub fn converged(&self) -> bool {
        self.outcome == RunOutcome::Converged
    }
}

/// K-means color quantizer.
///
/// Picks an engine according to [`KMeansConfig::backend`], runs passes until
/// the convergence threshold is met, and keeps the resulting palette for
/// [`predict`](Self::predict).
///
/// # Example
///
/// ```
/// use quantkmeans_rs::{Backend, ColorQuantizer, DataSet, KMeansConfig};
///
/// let pixels = [[0u8, 0, 0], [4, 4, 4], [250, 250, 250], [255, 255, 255]];
/// let data = DataSet::from_rgb(&pixels);
///
/// let config = KMeansConfig::new(2).with_seed(7).with_backend(Backend::Reference);
/// let mut quantizer = ColorQuantizer::with_config(config);
/// let result = quantizer.fit(&data).unwrap();
///
/// assert_eq!(result.labels.len(), 4);
/// assert_eq!(result.palette().nrows(), 2);
/// ```
pub struct ColorQuantizer {
    config: KMeansConfig,
    port_factory: Option<PortFactory>,
    palette: Option<Array2<i32>>,
}

impl ColorQuantizer {
    /// Create a quantizer with default configuration and `k` colors.
    pub fn new(k: usize) -> Self {
        Self::with_config(KMeansConfig::new(k))
    }

    pub fn with_config(config: KMeansConfig) -> Self {
        Self {
            config,
            port_factory: None,
            palette: None,
        }
    }

    /// Use ports from `factory` as the accelerated engine instead of probing
    /// the built-in backends. A failing factory or port still falls back to
    /// the reference engine.
    pub fn with_port_factory<F>(config: KMeansConfig, factory: F) -> Self
    where
        F: Fn() -> Result<Box<dyn NativePort>, KMeansError> + Send + Sync + 'static,
    {
        Self {
            config,
            port_factory: Some(Box::new(factory)),
            palette: None,
        }
    }

    /// Cluster `data` and keep the palette.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, `data` is empty or
    /// the engine fails mid-run. The engine is released in every case.
    pub fn fit(&mut self, data: &DataSet) -> Result<Quantization, KMeansError> {
        self.config.validate()?;
        if data.is_empty() {
            return Err(KMeansError::InsufficientData(
                "data set has no points".to_string(),
            ));
        }
        let bounds = self.config.bounds_for(data.dim())?;
        let params = EngineParams::from_config(&self.config, data);

        info!(
            "Quantizing {} points ({} dimensions) into {} clusters, threshold {}%, {} metric",
            data.len(),
            data.dim(),
            self.config.k,
            self.config.threshold,
            self.config.metric
        );

        let mut engine = self.build_engine(params);
        info!("Using {} engine", engine.kind());

        let result = run_passes(engine.as_mut(), data, &bounds, self.config.max_passes)
            .and_then(|(outcome, history)| {
                let clusters = engine.clusters()?;
                let convergence = engine.convergence()?;
                Ok(Quantization {
                    labels: labels_from_clusters(&clusters, data.len()),
                    palette: palette_from_clusters(&clusters, data.dim())?,
                    clusters,
                    passes: engine.pass_count(),
                    convergence,
                    outcome,
                    backend: engine.kind(),
                    history,
                })
            });
        engine.release();

        let result = result?;
        self.palette = Some(result.palette.clone());
        Ok(result)
    }

    /// Label each row of `data` with its nearest palette color.
    pub fn predict(&self, data: &ArrayView2<i32>) -> Result<Array1<i64>, KMeansError> {
        let palette = self.palette.as_ref().ok_or(KMeansError::NotFitted)?;
        if data.ncols() != palette.ncols() {
            return Err(KMeansError::InvalidDimensions(format!(
                "Expected {} features, got {}",
                palette.ncols(),
                data.ncols()
            )));
        }

        let data = DataSet::from_view(data)?;
        let centroids = palette.as_standard_layout();
        let centroids = centroids.as_slice().ok_or_else(|| {
            KMeansError::InvalidState("palette is not contiguous".to_string())
        })?;
        let metric = self.config.metric;

        let labels: Vec<i64> = data
            .as_flat()
            .par_chunks_exact(data.dim())
            .map(|point| nearest_centroid(point, centroids, metric) as i64)
            .collect();
        Ok(Array1::from_vec(labels))
    }

    /// Fit on `data` and return its labels.
    pub fn fit_predict(&mut self, data: &DataSet) -> Result<Array1<i64>, KMeansError> {
        Ok(self.fit(data)?.labels)
    }

    /// Palette of the last successful fit
    pub fn centroids(&self) -> Option<&Array2<i32>> {
        self.palette.as_ref()
    }

    pub fn k(&self) -> usize {
        self.config.k
    }

    pub fn config(&self) -> &KMeansConfig {
        &self.config
    }

    /// Accelerated engine if one is selected and starts, otherwise the
    /// reference engine.
    fn build_engine(&self, params: EngineParams) -> Box<dyn Engine> {
        if let Some(factory) = &self.port_factory {
            match factory().and_then(|port| NativeEngine::new(params.clone(), port)) {
                Ok(engine) => return Box::new(engine),
                Err(e) => warn!("Injected engine unavailable ({}), falling back to reference", e),
            }
            return Box::new(ReferenceEngine::new(params));
        }

        let candidates: &[EngineKind] = match self.config.backend {
            Backend::Auto => &[EngineKind::Cuda, EngineKind::Native],
            Backend::Native => &[EngineKind::Native],
            Backend::Cuda => &[EngineKind::Cuda],
            Backend::Reference => &[],
        };

        for &kind in candidates {
            match open_port(kind, &self.config).and_then(|port| NativeEngine::new(params.clone(), port)) {
                Ok(engine) => return Box::new(engine),
                Err(e) => {
                    // CUDA is optional under Auto; a missing build feature is not news
                    if self.config.backend == Backend::Auto && kind == EngineKind::Cuda {
                        debug!("{} engine unavailable: {}", kind, e);
                    } else {
                        warn!("{} engine unavailable ({}), falling back", kind, e);
                    }
                }
            }
        }

        Box::new(ReferenceEngine::new(params))
    }
}

fn open_port(kind: EngineKind, config: &KMeansConfig) -> Result<Box<dyn NativePort>, KMeansError> {
    match kind {
        EngineKind::Native => match &config.native_library {
            Some(path) => Ok(Box::new(CAbiPort::load(path)?)),
            None => Ok(Box::new(CAbiPort::new())),
        },
        #[cfg(feature = "cuda")]
        EngineKind::Cuda => Ok(Box::new(crate::cuda::CudaPort::new(0)?)),
        #[cfg(not(feature = "cuda"))]
        EngineKind::Cuda => Err(KMeansError::Backend(
            "built without the `cuda` feature".to_string(),
        )),
        EngineKind::Reference => Err(KMeansError::Backend(
            "the reference engine has no port".to_string(),
        )),
    }
}

/// Seed, then assign and update until converged or out of passes.
fn run_passes(
    engine: &mut dyn Engine,
    data: &DataSet,
    bounds: &crate::data::Bounds,
    max_passes: Option<usize>,
) -> Result<(RunOutcome, Vec<PassReport>), KMeansError> {
    engine.seed(bounds)?;
    let mut history = Vec::new();

    loop {
        engine.clear_assignments()?;
        engine.assign(data)?;
        let reseeded = engine.update()?;
        let convergence = engine.convergence()?;
        let pass = engine.pass_count();

        debug!(
            "Pass {}: {:.4}% converged (drift {}, {} reseeded)",
            pass, convergence.percent, convergence.drift, reseeded
        );
        history.push(PassReport {
            pass,
            drift: convergence.drift,
            percent: convergence.percent,
            reseeded,
        });

        if engine.is_converged() {
            info!(
                "Converged after {} passes ({:.4}% >= {}%)",
                pass,
                convergence.percent,
                engine.threshold()
            );
            return Ok((RunOutcome::Converged, history));
        }
        if max_passes.map_or(false, |max| pass >= max) {
            warn!(
                "Stopped after {} passes at {:.4}% converged, threshold {}% not reached",
                pass,
                convergence.percent,
                engine.threshold()
            );
            return Ok((RunOutcome::PassLimitReached, history));
        }
    }
}

/// Stack the centroids of `clusters` into a `(k, dim)` array.
fn palette_from_clusters(
    clusters: &[ClusterSnapshot],
    dim: usize,
) -> Result<Array2<i32>, KMeansError> {
    let flat: Vec<i32> = clusters
        .iter()
        .flat_map(|c| c.centroid.iter().copied())
        .collect();
    Array2::from_shape_vec((clusters.len(), dim), flat).map_err(|e| {
        KMeansError::InvalidDimensions(format!(
            "engine returned centroids that do not form a ({}, {}) palette: {}",
            clusters.len(),
            dim,
            e
        ))
    })
}

fn labels_from_clusters(clusters: &[ClusterSnapshot], n_points: usize) -> Array1<i64> {
    let mut labels = Array1::zeros(n_points);
    for (j, cluster) in clusters.iter().enumerate() {
        for &index in &cluster.members {
            labels[index] = j as i64;
        }
    }
    labels
}
