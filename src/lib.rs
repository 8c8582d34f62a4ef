//! # quantkmeans-rs
//!
//! K-means color quantization over integer pixel vectors, with a sequential
//! reference engine and accelerated engines that produce identical results.
//!
//! ## Features
//!
//! - **Integer arithmetic throughout**: centroids are floored means of `i32`
//!   channels, so every engine computes bit-identical clusters
//! - **Two distance metrics**: squared Euclidean and Manhattan
//! - **Empty-cluster recovery**: clusters that lose all their points are
//!   reseeded at random within the seeding bounds
//! - **Accelerated engines**: a parallel engine behind a C ABI (`kmq_*`
//!   functions, see `include/quantkmeans.h`) and an optional CUDA engine,
//!   both falling back to the reference engine if they cannot start
//!
//! ## Example
//!
//! ```rust
//! use quantkmeans_rs::{ColorQuantizer, DataSet, KMeansConfig};
//!
//! let pixels: Vec<[u8; 3]> = (0..64u8)
//!     .map(|i| if i % 2 == 0 { [i, 0, 0] } else { [0, 0, 255 - i] })
//!     .collect();
//! let data = DataSet::from_rgb(&pixels);
//!
//! let mut quantizer = ColorQuantizer::with_config(KMeansConfig::new(4).with_seed(42));
//! let result = quantizer.fit(&data).unwrap();
//!
//! assert_eq!(result.palette().nrows(), 4);
//! assert_eq!(result.quantized().nrows(), 64);
//! ```
//!
//! ## Driving an engine directly
//!
//! ```rust
//! use quantkmeans_rs::{Bounds, DataSet, Engine, EngineParams, KMeansConfig, ReferenceEngine};
//!
//! let data = DataSet::from_rgb(&[[0, 0, 0], [255, 255, 255]]);
//! let config = KMeansConfig::new(2).with_threshold(100.0);
//! let mut engine = ReferenceEngine::new(EngineParams::from_config(&config, &data));
//!
//! engine
//!     .seed_with(&Bounds::rgb(), &[vec![10, 10, 10], vec![240, 240, 240]])
//!     .unwrap();
//! while !engine.is_converged() {
//!     engine.clear_assignments().unwrap();
//!     engine.assign(&data).unwrap();
//!     engine.update().unwrap();
//! }
//! let clusters = engine.clusters().unwrap();
//! assert_eq!(clusters[1].centroid, vec![255, 255, 255]);
//! engine.release();
//! ```
//!
//! ## CUDA
//!
//! ```toml
//! quantkmeans-rs = { version = "0.1", features = ["cuda"] }
//! ```

pub mod cluster;
mod config;
pub mod data;
pub mod distance;
pub mod engine;
mod error;
pub mod native;
mod quantizer;
pub mod seed;

#[cfg(feature = "cuda")]
pub mod cuda;

pub use cluster::{Cluster, ClusterSnapshot};
pub use config::{Backend, KMeansConfig};
pub use data::{Bounds, DataSet};
pub use distance::Metric;
pub use engine::{Convergence, Engine, EngineKind, EngineParams, EngineState, ReferenceEngine};
pub use error::KMeansError;
pub use native::{CAbiPort, NativeEngine, NativePort};
pub use quantizer::{ColorQuantizer, PassReport, PortFactory, Quantization, RunOutcome};
pub use seed::{FixedSeeds, RandomSeeds, SeedSource};
