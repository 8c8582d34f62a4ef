//! Basic example: reduce a noisy four-color image to a four-color palette
//!
//! Run with: RUST_LOG=info cargo run --example basic --release

use ndarray::Array2;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use quantkmeans_rs::{ColorQuantizer, DataSet, KMeansConfig};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn main() {
    env_logger::init();
    println!("=== quantkmeans-rs example ===\n");

    let (width, height) = (64, 48);
    let n_pixels = width * height;
    let base_colors = [[200, 30, 30], [30, 160, 60], [40, 60, 210], [235, 220, 90]];

    println!("Generating a {}x{} image around {} colors...", width, height, base_colors.len());

    // Each quadrant gets one base color plus noise
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let noise = Array2::random_using((n_pixels, 3), Uniform::new_inclusive(-25, 25), &mut rng);
    let mut pixels = Array2::<i32>::zeros((n_pixels, 3));
    for y in 0..height {
        for x in 0..width {
            let i = y * width + x;
            let quadrant = (y * 2 / height) * 2 + x * 2 / width;
            for c in 0..3 {
                pixels[[i, c]] = (base_colors[quadrant][c] + noise[[i, c]]).clamp(0, 255);
            }
        }
    }

    println!("Base colors:");
    for (i, color) in base_colors.iter().enumerate() {
        println!("  Color {}: {:?}", i, color);
    }
    println!();

    let data = DataSet::new(pixels).expect("valid pixel matrix");
    let config = KMeansConfig::new(base_colors.len())
        .with_seed(42)
        .with_threshold(99.9);

    println!("Quantizing with k={}...\n", config.k);

    let mut quantizer = ColorQuantizer::with_config(config);
    let result = quantizer.fit(&data).expect("Quantization failed");

    println!(
        "{} engine finished after {} passes ({:.4}% converged)\n",
        result.backend, result.passes, result.convergence.percent
    );

    println!("Convergence per pass:");
    for report in &result.history {
        println!(
            "  Pass {:>2}: {:>8.4}% (drift {}, {} reseeded)",
            report.pass, report.percent, report.drift, report.reseeded
        );
    }
    println!();

    println!("Palette:");
    for (i, cluster) in result.clusters.iter().enumerate() {
        println!(
            "  Color {}: {:?} ({} pixels, {:.1}%)",
            i,
            cluster.centroid,
            cluster.members.len(),
            cluster.members.len() as f64 / n_pixels as f64 * 100.0
        );
    }
    println!();

    let quantized = result.quantized();
    println!("First 5 pixels:");
    for i in 0..5 {
        println!("  {} -> {}", data.point(i), quantized.row(i));
    }

    println!("\n=== Done! ===");
}
