//! Benchmark comparing the reference, native and CUDA engines
//!
//! Run with: cargo run --example cuda_benchmark --features cuda --release

use ndarray::Array2;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use quantkmeans_rs::cuda::CudaPort;
use quantkmeans_rs::{
    Backend, ColorQuantizer, DataSet, EngineKind, KMeansConfig, NativePort, Quantization,
};
use std::time::Instant;

fn run(quantizer: &mut ColorQuantizer, data: &DataSet) -> (Quantization, f64) {
    let start = Instant::now();
    let result = quantizer.fit(data).unwrap();
    (result, start.elapsed().as_secs_f64())
}

fn main() {
    env_logger::init();

    // Test configurations: (n_pixels, k)
    let configs = [(100_000, 16), (500_000, 64), (1_000_000, 256)];

    println!("=== quantkmeans-rs engine benchmark ===\n");

    for (n_pixels, k) in configs {
        println!("Configuration: {} pixels, {} colors", n_pixels, k);

        let pixels = Array2::random((n_pixels, 3), Uniform::new_inclusive(0, 255));
        let data = DataSet::new(pixels).unwrap();
        let config = KMeansConfig::new(k)
            .with_seed(42)
            .with_threshold(99.5)
            .with_max_passes(Some(50));

        let mut reference =
            ColorQuantizer::with_config(config.clone().with_backend(Backend::Reference));
        let (ref_result, ref_time) = run(&mut reference, &data);
        println!("  Reference time: {:>8.3}s ({} passes)", ref_time, ref_result.passes);

        let mut native = ColorQuantizer::with_config(config.clone().with_backend(Backend::Native));
        let (_, native_time) = run(&mut native, &data);
        println!("  Native time:    {:>8.3}s", native_time);

        let mut cuda = ColorQuantizer::with_port_factory(config, || {
            CudaPort::new(0).map(|port| Box::new(port) as Box<dyn NativePort>)
        });
        let (cuda_result, cuda_time) = run(&mut cuda, &data);
        if cuda_result.backend == EngineKind::Cuda {
            println!("  CUDA time:      {:>8.3}s", cuda_time);
            println!("  Speedup:        {:>8.2}x", ref_time / cuda_time);

            let matching = ref_result
                .labels
                .iter()
                .zip(cuda_result.labels.iter())
                .filter(|(a, b)| a == b)
                .count();
            println!(
                "  Label agreement: {:.1}%",
                matching as f64 / n_pixels as f64 * 100.0
            );
        } else {
            println!("  CUDA not available");
        }

        println!();
    }

    println!("=== Done ===");
}
