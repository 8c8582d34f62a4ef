//! Quantize an integer `.npy` point matrix.
//!
//! Reads an `(N, dim)` `i32` array, clusters it, and writes the array with
//! every row replaced by its cluster's centroid. The palette is written too
//! when a third path is given.
//!
//! Usage: `quantize-npy <input.npy> <output.npy> <k> <seed> <threshold> [euclidean|manhattan] [palette.npy]`
//!
//! Set `RUST_LOG=debug` to see per-pass convergence.

use ndarray::Array2;
use ndarray_npy::{ReadNpyExt, WriteNpyExt};
use quantkmeans_rs::{ColorQuantizer, DataSet, KMeansConfig, Metric};
use std::env;
use std::fs::File;
use std::io::BufReader;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Vec<String> = env::args().collect();

    if !(6..=8).contains(&args.len()) {
        eprintln!(
            "Usage: {} <input.npy> <output.npy> <k> <seed> <threshold> [euclidean|manhattan] [palette.npy]",
            args[0]
        );
        std::process::exit(1);
    }

    let input_path = &args[1];
    let output_path = &args[2];
    let k: usize = args[3].parse()?;
    let seed: u64 = args[4].parse()?;
    let threshold: f32 = args[5].parse()?;
    let metric = args.get(6).map_or(Metric::Euclidean, |name| Metric::from_name(name));

    let reader = BufReader::new(File::open(input_path)?);
    let points: Array2<i32> = Array2::read_npy(reader)?;
    let data = DataSet::new(points)?;

    eprintln!("Loaded data: {} points x {} channels", data.len(), data.dim());

    let config = KMeansConfig::new(k)
        .with_seed(seed)
        .with_threshold(threshold)
        .with_metric(metric);
    let mut quantizer = ColorQuantizer::with_config(config);
    let result = quantizer.fit(&data)?;

    eprintln!(
        "{} engine: {} passes, {:.4}% converged ({:?})",
        result.backend, result.passes, result.convergence.percent, result.outcome
    );

    result.quantized().write_npy(File::create(output_path)?)?;
    eprintln!("Saved quantized points to {}", output_path);

    if let Some(palette_path) = args.get(7) {
        result.palette().write_npy(File::create(palette_path)?)?;
        eprintln!("Saved palette to {}", palette_path);
    }

    Ok(())
}
