//! Quantize an integer `.npy` point matrix with the assignment step on a GPU.
//!
//! Usage: `quantize-npy-cuda <input.npy> <output.npy> <k> <seed> <threshold> [device]`

use ndarray::Array2;
use ndarray_npy::{ReadNpyExt, WriteNpyExt};
use quantkmeans_rs::cuda::CudaPort;
use quantkmeans_rs::{ColorQuantizer, DataSet, EngineKind, KMeansConfig, NativePort};
use std::env;
use std::fs::File;
use std::io::BufReader;
use std::time::Instant;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Vec<String> = env::args().collect();

    if !(6..=7).contains(&args.len()) {
        eprintln!(
            "Usage: {} <input.npy> <output.npy> <k> <seed> <threshold> [device]",
            args[0]
        );
        std::process::exit(1);
    }

    let input_path = &args[1];
    let output_path = &args[2];
    let k: usize = args[3].parse()?;
    let seed: u64 = args[4].parse()?;
    let threshold: f32 = args[5].parse()?;
    let device_id: usize = match args.get(6) {
        Some(arg) => arg.parse()?,
        None => 0,
    };

    let reader = BufReader::new(File::open(input_path)?);
    let points: Array2<i32> = Array2::read_npy(reader)?;
    let data = DataSet::new(points)?;

    eprintln!("Loaded data: {} points x {} channels", data.len(), data.dim());

    let config = KMeansConfig::new(k).with_seed(seed).with_threshold(threshold);
    let mut quantizer = ColorQuantizer::with_port_factory(config, move || {
        CudaPort::new(device_id).map(|port| Box::new(port) as Box<dyn NativePort>)
    });

    let start = Instant::now();
    let result = quantizer.fit(&data)?;
    let elapsed = start.elapsed();

    if result.backend != EngineKind::Cuda {
        eprintln!("CUDA device {} unavailable, ran on the {} engine", device_id, result.backend);
    }
    eprintln!(
        "{} passes, {:.4}% converged in {:.3}s",
        result.passes,
        result.convergence.percent,
        elapsed.as_secs_f64()
    );

    result.quantized().write_npy(File::create(output_path)?)?;
    eprintln!("Saved quantized points to {}", output_path);

    Ok(())
}
