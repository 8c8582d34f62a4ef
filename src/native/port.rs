use super::abi;
use super::state::NativeState;
use super::{
    error_of, NativePort, RawBounds, RawCluster, RawConvergence, RawParams, ABI_VERSION, KMQ_OK,
};
use crate::cluster::ClusterSnapshot;
use crate::data::Bounds;
use crate::engine::{Convergence, EngineKind};
use crate::error::KMeansError;
use libloading::Library;
use log::{debug, warn};
use std::path::Path;
use std::ptr::{self, NonNull};
use std::slice;

type Handle = *mut NativeState;

/// Entry points of one `kmq_*` implementation.
#[derive(Clone, Copy)]
struct AbiTable {
    abi_version: unsafe extern "C" fn() -> u32,
    init: unsafe extern "C" fn(*const RawParams, *mut i32) -> Handle,
    seed: unsafe extern "C" fn(Handle, *const RawBounds, *const i32, u64) -> i32,
    clear: unsafe extern "C" fn(Handle) -> i32,
    assign: unsafe extern "C" fn(Handle, *const i32, u64) -> i32,
    update: unsafe extern "C" fn(Handle, *mut u32) -> i32,
    convergence: unsafe extern "C" fn(*const NativeState, *mut RawConvergence) -> i32,
    threshold: unsafe extern "C" fn(*const NativeState) -> f32,
    clusters: unsafe extern "C" fn(*const NativeState, *mut RawCluster, u32) -> i32,
    release: unsafe extern "C" fn(Handle),
}

impl AbiTable {
    /// The implementation compiled into this crate
    fn linked() -> Self {
        Self {
            abi_version: abi::kmq_abi_version,
            init: abi::kmq_init,
            seed: abi::kmq_seed,
            clear: abi::kmq_clear,
            assign: abi::kmq_assign,
            update: abi::kmq_update,
            convergence: abi::kmq_convergence,
            threshold: abi::kmq_threshold,
            clusters: abi::kmq_clusters,
            release: abi::kmq_release,
        }
    }

    /// Look up every entry point in `library`.
    ///
    /// # Safety
    ///
    /// The symbols must have the signatures declared in `quantkmeans.h`, and
    /// the table must not outlive `library`.
    unsafe fn resolve(library: &Library) -> Result<Self, KMeansError> {
        unsafe fn symbol<T: Copy>(library: &Library, name: &str) -> Result<T, KMeansError> {
            library
                .get::<T>(name.as_bytes())
                .map(|sym| *sym)
                .map_err(|e| KMeansError::Backend(format!("missing symbol `{}`: {}", name, e)))
        }

        Ok(Self {
            abi_version: symbol(library, "kmq_abi_version")?,
            init: symbol(library, "kmq_init")?,
            seed: symbol(library, "kmq_seed")?,
            clear: symbol(library, "kmq_clear")?,
            assign: symbol(library, "kmq_assign")?,
            update: symbol(library, "kmq_update")?,
            convergence: symbol(library, "kmq_convergence")?,
            threshold: symbol(library, "kmq_threshold")?,
            clusters: symbol(library, "kmq_clusters")?,
            release: symbol(library, "kmq_release")?,
        })
    }
}

/// [`NativePort`] that calls the `kmq_*` C ABI.
///
/// The entry points come either from this crate ([`CAbiPort::new`]) or from
/// a shared library loaded at runtime ([`CAbiPort::load`]). Holds the opaque
/// handle between `init` and `release`; dropping a port that was never
/// released frees the handle.
pub struct CAbiPort {
    handle: Option<NonNull<NativeState>>,
    k: usize,
    table: AbiTable,
    /// Keeps the loaded entry points valid; dropped after the handle
    library: Option<Library>,
}

// The handle is owned exclusively by this port and the state behind it
// holds no thread-bound resources.
unsafe impl Send for CAbiPort {}

impl CAbiPort {
    /// Port over the entry points linked into this crate.
    pub fn new() -> Self {
        Self {
            handle: None,
            k: 0,
            table: AbiTable::linked(),
            library: None,
        }
    }

    /// Load a `kmq_*` library from `path` and check its ABI version.
    ///
    /// # Errors
    ///
    /// [`KMeansError::Backend`] if the library cannot be opened, lacks an
    /// entry point, or reports another ABI version.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, KMeansError> {
        let path = path.as_ref();
        debug!("Loading native library from {}", path.display());

        let library = unsafe { Library::new(path) }.map_err(|e| {
            KMeansError::Backend(format!("failed to load {}: {}", path.display(), e))
        })?;
        let table = unsafe { AbiTable::resolve(&library)? };

        let port = Self {
            handle: None,
            k: 0,
            table,
            library: Some(library),
        };
        let version = port.abi_version();
        if version != ABI_VERSION {
            return Err(KMeansError::Backend(format!(
                "{} reports ABI version {}, expected {}",
                path.display(),
                version,
                ABI_VERSION
            )));
        }
        Ok(port)
    }

    /// ABI version reported by the entry points
    pub fn abi_version(&self) -> u32 {
        unsafe { (self.table.abi_version)() }
    }

    /// Whether the entry points come from a runtime-loaded library.
    pub fn is_loaded(&self) -> bool {
        self.library.is_some()
    }

    fn handle(&self) -> Result<Handle, KMeansError> {
        self.handle
            .map(NonNull::as_ptr)
            .ok_or_else(|| KMeansError::Backend("native engine is not initialized".to_string()))
    }

    fn check(status: i32, op: &str) -> Result<(), KMeansError> {
        if status == KMQ_OK {
            Ok(())
        } else {
            Err(error_of(status, op))
        }
    }
}

impl Default for CAbiPort {
    fn default() -> Self {
        Self::new()
    }
}

impl NativePort for CAbiPort {
    fn kind(&self) -> EngineKind {
        EngineKind::Native
    }

    fn init(&mut self, params: &RawParams) -> Result<(), KMeansError> {
        self.release();
        let mut status = KMQ_OK;
        let raw = unsafe { (self.table.init)(params, &mut status) };
        Self::check(status, "kmq_init")?;
        let handle = NonNull::new(raw)
            .ok_or_else(|| KMeansError::Backend("kmq_init returned a null handle".to_string()))?;
        self.handle = Some(handle);
        self.k = params.k as usize;
        Ok(())
    }

    fn seed(&mut self, bounds: &Bounds, centroids: Option<&[i32]>) -> Result<(), KMeansError> {
        let handle = self.handle()?;
        let raw_bounds = RawBounds::from_bounds(bounds);
        let (values, len) = match centroids {
            Some(values) => (values.as_ptr(), values.len() as u64),
            None => (ptr::null(), 0),
        };
        let status = unsafe { (self.table.seed)(handle, &raw_bounds, values, len) };
        Self::check(status, "kmq_seed")
    }

    fn clear_assignments(&mut self) -> Result<(), KMeansError> {
        let status = unsafe { (self.table.clear)(self.handle()?) };
        Self::check(status, "kmq_clear")
    }

    fn assign(&mut self, data: &[i32], n_points: usize) -> Result<(), KMeansError> {
        let handle = self.handle()?;
        let status = unsafe { (self.table.assign)(handle, data.as_ptr(), n_points as u64) };
        Self::check(status, "kmq_assign")
    }

    fn update(&mut self) -> Result<u32, KMeansError> {
        let handle = self.handle()?;
        let mut reseeded = 0;
        let status = unsafe { (self.table.update)(handle, &mut reseeded) };
        Self::check(status, "kmq_update")?;
        Ok(reseeded)
    }

    fn convergence(&self) -> Result<Convergence, KMeansError> {
        let handle = self.handle()?;
        let mut raw = RawConvergence::default();
        let status = unsafe { (self.table.convergence)(handle, &mut raw) };
        Self::check(status, "kmq_convergence")?;
        Ok(raw.into())
    }

    fn threshold(&self) -> f32 {
        match self.handle {
            Some(handle) => unsafe { (self.table.threshold)(handle.as_ptr()) },
            None => f32::NAN,
        }
    }

    fn clusters(&self) -> Result<Vec<ClusterSnapshot>, KMeansError> {
        let handle = self.handle()?;
        let mut raw = vec![RawCluster::default(); self.k];
        let status = unsafe { (self.table.clusters)(handle, raw.as_mut_ptr(), self.k as u32) };
        Self::check(status, "kmq_clusters")?;

        // Copy out before any further call invalidates the views.
        let snapshots = raw
            .iter()
            .map(|c| unsafe {
                let dim = c.dim as usize;
                ClusterSnapshot {
                    centroid: slice::from_raw_parts(c.centroid, dim).to_vec(),
                    previous_centroid: slice::from_raw_parts(c.previous_centroid, dim).to_vec(),
                    members: if c.size == 0 {
                        Vec::new()
                    } else {
                        slice::from_raw_parts(c.indices, c.size as usize)
                            .iter()
                            .map(|&i| i as usize)
                            .collect()
                    },
                }
            })
            .collect();
        Ok(snapshots)
    }

    fn release(&mut self) {
        if let Some(handle) = self.handle.take() {
            unsafe { (self.table.release)(handle.as_ptr()) };
        }
    }
}

impl Drop for CAbiPort {
    fn drop(&mut self) {
        if self.handle.is_some() {
            warn!("Native engine dropped without release, freeing handle");
            self.release();
        }
    }
}
