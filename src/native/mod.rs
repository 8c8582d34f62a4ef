//! Native acceleration binding.
//!
//! The accelerated engine sits behind a C ABI (`kmq_*` functions in [`abi`])
//! that exchanges only fixed-layout records and flat buffers. On the Rust
//! side, [`NativeEngine`] drives that ABI through the [`NativePort`] trait, so
//! tests can put a fake port in its place and other accelerators (CUDA) can
//! plug in at the same seam.
//!
//! The C declarations are in `include/quantkmeans.h`.

pub mod abi;
mod port;
mod state;

pub use port::CAbiPort;
pub use state::NativeState;

use crate::cluster::ClusterSnapshot;
use crate::data::{Bounds, DataSet};
use crate::engine::{
    check_centroids, check_data, check_seed, pass_settles, Convergence, Engine, EngineKind,
    EngineParams, EngineState,
};
use crate::error::KMeansError;
use log::debug;
use std::ptr;

/// Layout version of the records below. Bumped on any field change.
pub const ABI_VERSION: u32 = 1;

pub const KMQ_OK: i32 = 0;
pub const KMQ_ERR_NULL: i32 = -1;
pub const KMQ_ERR_VERSION: i32 = -2;
pub const KMQ_ERR_INVALID_K: i32 = -3;
pub const KMQ_ERR_DIMENSIONS: i32 = -4;
pub const KMQ_ERR_BOUNDS: i32 = -5;
pub const KMQ_ERR_NOT_SEEDED: i32 = -6;
pub const KMQ_ERR_STATE: i32 = -7;
pub const KMQ_ERR_INTERNAL: i32 = -8;

/// Run parameters passed to `kmq_init`
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RawParams {
    /// Must equal [`ABI_VERSION`]
    pub version: u32,
    pub k: u32,
    pub dim: u32,
    /// 0 = euclidean, 1 = manhattan, anything else = euclidean
    pub metric: i32,
    pub threshold: f32,
    pub max_channel_value: i32,
    /// Number of points (not values) in every `kmq_assign` call
    pub data_len: u64,
    pub rng_seed: u64,
}

impl RawParams {
    pub fn check(&self) -> Result<(), KMeansError> {
        if self.version != ABI_VERSION {
            return Err(KMeansError::Backend(format!(
                "ABI version {} requested, {} supported",
                self.version, ABI_VERSION
            )));
        }
        if self.k == 0 {
            return Err(KMeansError::InvalidK(
                "k must be greater than 0".to_string(),
            ));
        }
        if self.dim == 0 {
            return Err(KMeansError::InvalidDimensions(
                "dim must be greater than 0".to_string(),
            ));
        }
        if self.max_channel_value < 1 {
            return Err(KMeansError::InvalidBounds(format!(
                "max_channel_value must be positive, got {}",
                self.max_channel_value
            )));
        }
        Ok(())
    }
}

impl TryFrom<&EngineParams> for RawParams {
    type Error = KMeansError;

    fn try_from(params: &EngineParams) -> Result<Self, Self::Error> {
        let k = u32::try_from(params.k)
            .map_err(|_| KMeansError::InvalidK(format!("k = {} is too large", params.k)))?;
        let dim = u32::try_from(params.dim).map_err(|_| {
            KMeansError::InvalidDimensions(format!("dim = {} is too large", params.dim))
        })?;
        Ok(Self {
            version: ABI_VERSION,
            k,
            dim,
            metric: params.metric.id(),
            threshold: params.threshold,
            max_channel_value: params.max_channel_value,
            data_len: params.data_len as u64,
            rng_seed: params.seed,
        })
    }
}

/// Convergence measurement written by `kmq_convergence`
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct RawConvergence {
    pub drift: f64,
    /// `k * dim * max_channel_value²`
    pub max_drift: f64,
    pub percent: f64,
}

impl From<RawConvergence> for Convergence {
    fn from(raw: RawConvergence) -> Self {
        Self {
            drift: raw.drift,
            max_drift: raw.max_drift,
            percent: raw.percent,
        }
    }
}

impl From<Convergence> for RawConvergence {
    fn from(c: Convergence) -> Self {
        Self {
            drift: c.drift,
            max_drift: c.max_drift,
            percent: c.percent,
        }
    }
}

/// Seeding bounds passed to `kmq_seed`; both arrays hold `dim` values.
#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct RawBounds {
    pub dim: u32,
    pub lower: *const i32,
    pub upper: *const i32,
}

impl RawBounds {
    /// Borrowing view of `bounds`; valid while `bounds` lives.
    pub fn from_bounds(bounds: &Bounds) -> Self {
        Self {
            dim: bounds.dim() as u32,
            lower: bounds.lower().as_ptr(),
            upper: bounds.upper().as_ptr(),
        }
    }
}

/// One cluster as returned by `kmq_clusters`.
///
/// Pointers reference memory owned by the native handle and stay valid until
/// the next mutating call or `kmq_release`.
#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct RawCluster {
    pub dim: u32,
    pub centroid: *const i32,
    pub previous_centroid: *const i32,
    /// Number of member indices
    pub size: u64,
    pub indices: *const u64,
}

impl Default for RawCluster {
    fn default() -> Self {
        Self {
            dim: 0,
            centroid: ptr::null(),
            previous_centroid: ptr::null(),
            size: 0,
            indices: ptr::null(),
        }
    }
}

/// Status code for an error crossing the C ABI.
pub fn status_of(err: &KMeansError) -> i32 {
    match err {
        KMeansError::InvalidK(_) => KMQ_ERR_INVALID_K,
        KMeansError::InvalidDimensions(_) | KMeansError::InsufficientData(_) => KMQ_ERR_DIMENSIONS,
        KMeansError::InvalidBounds(_) => KMQ_ERR_BOUNDS,
        KMeansError::NotSeeded => KMQ_ERR_NOT_SEEDED,
        KMeansError::InvalidState(_) | KMeansError::EmptyCluster | KMeansError::NotFitted => {
            KMQ_ERR_STATE
        }
        KMeansError::Backend(msg) if msg.starts_with("ABI version") => KMQ_ERR_VERSION,
        KMeansError::InvalidThreshold(_) | KMeansError::Backend(_) => KMQ_ERR_INTERNAL,
    }
}

/// Error for a status code returned by `op`.
pub fn error_of(status: i32, op: &str) -> KMeansError {
    match status {
        KMQ_ERR_INVALID_K => KMeansError::InvalidK(format!("{} rejected k", op)),
        KMQ_ERR_DIMENSIONS => KMeansError::InvalidDimensions(format!("{} rejected input size", op)),
        KMQ_ERR_BOUNDS => KMeansError::InvalidBounds(format!("{} rejected bounds", op)),
        KMQ_ERR_NOT_SEEDED => KMeansError::NotSeeded,
        KMQ_ERR_STATE => KMeansError::InvalidState(format!("{} called out of order", op)),
        KMQ_ERR_NULL => KMeansError::Backend(format!("{}: null pointer", op)),
        KMQ_ERR_VERSION => KMeansError::Backend(format!("{}: ABI version mismatch", op)),
        other => KMeansError::Backend(format!("{} failed with status {}", op, other)),
    }
}

/// The call surface of an accelerated engine.
///
/// Implementations own whatever native resources they allocate in `init` and
/// free them in `release`.
pub trait NativePort: Send {
    fn kind(&self) -> EngineKind;

    fn init(&mut self, params: &RawParams) -> Result<(), KMeansError>;

    /// `centroids` is a flat `k * dim` buffer; `None` draws them at random.
    fn seed(&mut self, bounds: &Bounds, centroids: Option<&[i32]>) -> Result<(), KMeansError>;

    fn clear_assignments(&mut self) -> Result<(), KMeansError>;

    /// `data` is the full flat data set of `n_points * dim` values.
    fn assign(&mut self, data: &[i32], n_points: usize) -> Result<(), KMeansError>;

    /// Returns how many empty clusters were reseeded.
    fn update(&mut self) -> Result<u32, KMeansError>;

    /// Drift since the last update, normalized by the native side
    fn convergence(&self) -> Result<Convergence, KMeansError>;

    fn threshold(&self) -> f32;

    fn clusters(&self) -> Result<Vec<ClusterSnapshot>, KMeansError>;

    fn release(&mut self);
}

/// [`Engine`] implemented by an accelerated backend behind a [`NativePort`].
pub struct NativeEngine {
    port: Box<dyn NativePort>,
    params: EngineParams,
    state: EngineState,
    pass_count: usize,
    /// Distinct points in the data set, counted on the first assign
    distinct: Option<usize>,
}

impl NativeEngine {
    /// Initialize `port` with `params`. Fails if the backend rejects them or
    /// cannot start.
    pub fn new(params: EngineParams, mut port: Box<dyn NativePort>) -> Result<Self, KMeansError> {
        let raw = RawParams::try_from(&params)?;
        port.init(&raw)?;
        debug!("{} engine initialized (k = {}, dim = {})", port.kind(), params.k, params.dim);

        Ok(Self {
            port,
            params,
            state: EngineState::Unseeded,
            pass_count: 0,
            distinct: None,
        })
    }

    fn ensure_seeded(&self) -> Result<(), KMeansError> {
        if self.state == EngineState::Unseeded {
            return Err(KMeansError::NotSeeded);
        }
        Ok(())
    }
}

impl Engine for NativeEngine {
    fn kind(&self) -> EngineKind {
        self.port.kind()
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
        self.port.seed(bounds, None)?;
        self.state = EngineState::Ready;
        self.pass_count = 0;
        self.distinct = None;
        Ok(())
    }

    fn seed_with(&mut self, bounds: &Bounds, centroids: &[Vec<i32>]) -> Result<(), KMeansError> {
        check_seed(&self.params, bounds)?;
        check_centroids(&self.params, centroids)?;
        let flat: Vec<i32> = centroids.iter().flatten().copied().collect();
        self.port.seed(bounds, Some(&flat))?;
        self.state = EngineState::Ready;
        self.pass_count = 0;
        self.distinct = None;
        Ok(())
    }

    fn clear_assignments(&mut self) -> Result<(), KMeansError> {
        self.ensure_seeded()?;
        self.port.clear_assignments()?;
        self.state = EngineState::Ready;
        Ok(())
    }

    fn assign(&mut self, data: &DataSet) -> Result<(), KMeansError> {
        self.ensure_seeded()?;
        check_data(&self.params, data)?;
        self.distinct.get_or_insert_with(|| data.distinct_len());
        self.port.assign(data.as_flat(), data.len())?;
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
        let reseeded = self.port.update()? as usize;
        self.pass_count += 1;

        let convergence = self.convergence()?;
        let distinct = self.distinct.unwrap_or(self.params.k);
        self.state = if pass_settles(
            &convergence,
            self.port.threshold(),
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
        Ok(self.convergence()?.drift)
    }

    fn convergence(&self) -> Result<Convergence, KMeansError> {
        self.ensure_seeded()?;
        self.port.convergence()
    }

    fn threshold(&self) -> f32 {
        self.port.threshold()
    }

    fn clusters(&self) -> Result<Vec<ClusterSnapshot>, KMeansError> {
        self.ensure_seeded()?;
        self.port.clusters()
    }

    fn release(&mut self) {
        self.port.release();
        self.distinct = None;
        self.state = EngineState::Unseeded;
    }
}
