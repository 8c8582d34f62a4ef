//! CUDA-accelerated assignment step.
//!
//! [`CudaPort`] plugs into [`NativeEngine`](crate::native::NativeEngine) like
//! the C ABI port does. Nearest-centroid labels are computed on the GPU with
//! the same integer distances as the host engines; memberships, centroid
//! updates and reseeding run on the host through [`NativeState`], so results
//! match the reference engine exactly.
//!
//! Enable the `cuda` feature to use this functionality.
//!
//! # Example
//!
//! ```no_run
//! use quantkmeans_rs::cuda::CudaPort;
//! use quantkmeans_rs::{ColorQuantizer, DataSet, KMeansConfig, NativePort};
//!
//! let mut quantizer = ColorQuantizer::with_port_factory(KMeansConfig::new(16), || {
//!     CudaPort::new(0).map(|port| Box::new(port) as Box<dyn NativePort>)
//! });
//! let data = DataSet::from_rgb(&[[0, 0, 0], [255, 255, 255]]);
//! quantizer.fit(&data).unwrap();
//! ```

use crate::cluster::ClusterSnapshot;
use crate::data::Bounds;
use crate::engine::{Convergence, EngineKind};
use crate::error::KMeansError;
use crate::native::{NativePort, NativeState, RawParams};
use cudarc::driver::{CudaDevice, CudaFunction, CudaSlice, LaunchAsync, LaunchConfig};
use cudarc::nvrtc::compile_ptx;
use log::{debug, info};
use std::sync::Arc;

/// CUDA kernel for the assignment step
const CUDA_KERNELS: &str = r#"
extern "C" __global__ void assign_labels(
    const int* data,
    const int* centroids,
    unsigned int* labels,
    int n_points,
    int k,
    int dim,
    int metric
) {
    int idx = blockIdx.x * blockDim.x + threadIdx.x;
    if (idx < n_points) {
        const int* point = data + (long long)idx * dim;
        unsigned long long best_dist = 0xFFFFFFFFFFFFFFFFULL;
        unsigned int best_label = 0;

        for (int j = 0; j < k; j++) {
            const int* centroid = centroids + (long long)j * dim;
            unsigned long long dist = 0;
            for (int t = 0; t < dim; t++) {
                long long diff = (long long)point[t] - (long long)centroid[t];
                if (diff < 0) {
                    diff = -diff;
                }
                dist += metric == 1 ? (unsigned long long)diff
                                    : (unsigned long long)(diff * diff);
            }

            // strict comparison keeps the first of equally near centroids
            if (dist < best_dist) {
                best_dist = dist;
                best_label = j;
            }
        }

        labels[idx] = best_label;
    }
}
"#;

const MODULE_NAME: &str = "quantkmeans_kernels";

const BLOCK_SIZE: usize = 256;

fn cuda_error(what: &str, e: impl std::fmt::Display) -> KMeansError {
    KMeansError::Backend(format!("{}: {}", what, e))
}

/// [`NativePort`] that labels points on a CUDA device.
pub struct CudaPort {
    device: Arc<CudaDevice>,
    device_id: usize,
    state: Option<NativeState>,
}

impl CudaPort {
    /// Open CUDA device `device_id` and compile the kernels.
    ///
    /// # Errors
    ///
    /// Returns [`KMeansError::Backend`] if the device is unavailable or the
    /// kernels fail to compile.
    pub fn new(device_id: usize) -> Result<Self, KMeansError> {
        let device = CudaDevice::new(device_id).map_err(|e| {
            cuda_error(&format!("Failed to initialize CUDA device {}", device_id), e)
        })?;

        let ptx = compile_ptx(CUDA_KERNELS)
            .map_err(|e| cuda_error("Failed to compile CUDA kernels", e))?;

        device
            .load_ptx(ptx, MODULE_NAME, &["assign_labels"])
            .map_err(|e| cuda_error("Failed to load CUDA module", e))?;

        info!("CUDA device {} ready", device_id);
        Ok(Self {
            device,
            device_id,
            state: None,
        })
    }

    pub fn device_id(&self) -> usize {
        self.device_id
    }

    fn get_func(&self, name: &str) -> Result<CudaFunction, KMeansError> {
        self.device
            .get_func(MODULE_NAME, name)
            .ok_or_else(|| KMeansError::Backend(format!("Failed to get CUDA function: {}", name)))
    }

    fn state(&self) -> Result<&NativeState, KMeansError> {
        self.state
            .as_ref()
            .ok_or_else(|| KMeansError::Backend("CUDA engine is not initialized".to_string()))
    }

    fn state_mut(&mut self) -> Result<&mut NativeState, KMeansError> {
        self.state
            .as_mut()
            .ok_or_else(|| KMeansError::Backend("CUDA engine is not initialized".to_string()))
    }

    /// Nearest-centroid label for every point, computed on the device.
    fn labels_gpu(&self, data: &[i32], n_points: usize) -> Result<Vec<u32>, KMeansError> {
        let state = self.state()?;
        if !state.is_seeded() {
            return Err(KMeansError::NotSeeded);
        }
        if n_points == 0 {
            return Ok(Vec::new());
        }

        let d_data: CudaSlice<i32> = self
            .device
            .htod_sync_copy(data)
            .map_err(|e| cuda_error("Failed to copy data to GPU", e))?;
        let d_centroids: CudaSlice<i32> = self
            .device
            .htod_sync_copy(state.centroids())
            .map_err(|e| cuda_error("Failed to copy centroids to GPU", e))?;
        let mut d_labels: CudaSlice<u32> = self
            .device
            .alloc_zeros(n_points)
            .map_err(|e| cuda_error("Failed to allocate labels", e))?;

        let grid_size = (n_points + BLOCK_SIZE - 1) / BLOCK_SIZE;
        let cfg = LaunchConfig {
            block_dim: (BLOCK_SIZE as u32, 1, 1),
            grid_dim: (grid_size as u32, 1, 1),
            shared_mem_bytes: 0,
        };

        let func = self.get_func("assign_labels")?;
        unsafe {
            func.launch(
                cfg,
                (
                    &d_data,
                    &d_centroids,
                    &mut d_labels,
                    n_points as i32,
                    state.k() as i32,
                    state.dim() as i32,
                    state.metric().id(),
                ),
            )
        }
        .map_err(|e| cuda_error("Failed to launch kernel", e))?;

        self.device
            .dtoh_sync_copy(&d_labels)
            .map_err(|e| cuda_error("Failed to copy labels", e))
    }
}

impl NativePort for CudaPort {
    fn kind(&self) -> EngineKind {
        EngineKind::Cuda
    }

    fn init(&mut self, params: &RawParams) -> Result<(), KMeansError> {
        if i32::try_from(params.data_len).is_err() {
            return Err(KMeansError::Backend(format!(
                "{} points exceed the CUDA kernel's index range",
                params.data_len
            )));
        }
        self.state = Some(NativeState::new(params)?);
        Ok(())
    }

    fn seed(&mut self, bounds: &Bounds, centroids: Option<&[i32]>) -> Result<(), KMeansError> {
        self.state_mut()?.seed(bounds.clone(), centroids)
    }

    fn clear_assignments(&mut self) -> Result<(), KMeansError> {
        self.state_mut()?.clear();
        Ok(())
    }

    fn assign(&mut self, data: &[i32], n_points: usize) -> Result<(), KMeansError> {
        let labels = self.labels_gpu(data, n_points)?;
        debug!("[CUDA] labelled {} points", labels.len());
        self.state_mut()?.apply_labels(data, &labels)
    }

    fn update(&mut self) -> Result<u32, KMeansError> {
        self.state_mut()?.update()
    }

    fn convergence(&self) -> Result<Convergence, KMeansError> {
        self.state()?.convergence()
    }

    fn threshold(&self) -> f32 {
        self.state.as_ref().map_or(f32::NAN, NativeState::threshold)
    }

    fn clusters(&self) -> Result<Vec<ClusterSnapshot>, KMeansError> {
        self.state()?.snapshots()
    }

    fn release(&mut self) {
        self.state = None;
    }
}
