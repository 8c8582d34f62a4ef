//! Reference and native engines must agree after every pass.

use ndarray::Array2;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use quantkmeans_rs::{
    Bounds, CAbiPort, DataSet, Engine, EngineKind, EngineParams, EngineState, KMeansConfig,
    KMeansError, Metric, NativeEngine, ReferenceEngine,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn random_pixels(n: usize, seed: u64) -> DataSet {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let points = Array2::random_using((n, 3), Uniform::new_inclusive(0, 255), &mut rng);
    DataSet::new(points).unwrap()
}

fn engines(config: &KMeansConfig, data: &DataSet) -> (ReferenceEngine, NativeEngine) {
    let params = EngineParams::from_config(config, data);
    let reference = ReferenceEngine::new(params.clone());
    let native = NativeEngine::new(params, Box::new(CAbiPort::new())).unwrap();
    (reference, native)
}

/// Run both engines pass by pass, comparing everything observable.
/// Returns the number of passes and the total reseed count.
fn run_in_lockstep(
    reference: &mut dyn Engine,
    native: &mut dyn Engine,
    data: &DataSet,
    max_passes: usize,
) -> (usize, usize) {
    assert_eq!(reference.clusters().unwrap(), native.clusters().unwrap());

    let mut reseeded_total = 0;
    for pass in 1..=max_passes {
        reference.clear_assignments().unwrap();
        native.clear_assignments().unwrap();

        reference.assign(data).unwrap();
        native.assign(data).unwrap();
        assert_eq!(
            reference.clusters().unwrap(),
            native.clusters().unwrap(),
            "memberships differ after assign in pass {}",
            pass
        );

        let reseeded = reference.update().unwrap();
        assert_eq!(reseeded, native.update().unwrap(), "reseed count differs in pass {}", pass);
        reseeded_total += reseeded;

        assert_eq!(
            reference.clusters().unwrap(),
            native.clusters().unwrap(),
            "centroids differ after update in pass {}",
            pass
        );
        assert_eq!(reference.convergence().unwrap(), native.convergence().unwrap());
        assert_eq!(reference.state(), native.state());
        assert_eq!(reference.pass_count(), native.pass_count());

        if reference.is_converged() {
            return (pass, reseeded_total);
        }
    }
    (max_passes, reseeded_total)
}

#[test]
fn test_native_engine_kind() {
    let data = random_pixels(10, 0);
    let (reference, native) = engines(&KMeansConfig::new(2), &data);
    assert_eq!(reference.kind(), EngineKind::Reference);
    assert_eq!(native.kind(), EngineKind::Native);
    assert_eq!(native.threshold(), 99.0);
}

#[test]
fn test_equivalence_with_explicit_seeds() {
    let data = random_pixels(2_000, 1);
    let config = KMeansConfig::new(4).with_threshold(99.9);
    let (mut reference, mut native) = engines(&config, &data);

    let seeds = vec![
        vec![10, 10, 10],
        vec![240, 20, 20],
        vec![20, 240, 20],
        vec![128, 128, 240],
    ];
    reference.seed_with(&Bounds::rgb(), &seeds).unwrap();
    native.seed_with(&Bounds::rgb(), &seeds).unwrap();

    let (passes, _) = run_in_lockstep(&mut reference, &mut native, &data, 200);
    assert!(reference.is_converged(), "no convergence within {} passes", passes);
    assert!(native.convergence().unwrap().percent >= 99.9);

    reference.release();
    native.release();
}

#[test]
fn test_equivalence_with_shared_random_seed() {
    let data = random_pixels(1_500, 2);
    for metric in [Metric::Euclidean, Metric::Manhattan] {
        let config = KMeansConfig::new(8).with_seed(77).with_metric(metric);
        let (mut reference, mut native) = engines(&config, &data);

        reference.seed(&Bounds::rgb()).unwrap();
        native.seed(&Bounds::rgb()).unwrap();

        run_in_lockstep(&mut reference, &mut native, &data, 200);
        assert!(native.is_converged());

        reference.release();
        native.release();
    }
}

#[test]
fn test_equivalence_through_reseeding() {
    // three colors, twelve clusters: most clusters start or become empty
    let mut pixels = vec![[250u8, 10, 10]; 40];
    pixels.extend(vec![[10u8, 250, 10]; 40]);
    pixels.extend(vec![[10u8, 10, 250]; 40]);
    let data = DataSet::from_rgb(&pixels);

    let config = KMeansConfig::new(12).with_seed(5);
    let (mut reference, mut native) = engines(&config, &data);
    reference.seed(&Bounds::rgb()).unwrap();
    native.seed(&Bounds::rgb()).unwrap();

    let (_, reseeded) = run_in_lockstep(&mut reference, &mut native, &data, 200);
    assert!(reseeded > 0, "expected empty clusters to be reseeded");

    reference.release();
    native.release();
}

#[test]
fn test_black_and_white_scenario_on_native_engine() {
    let mut pixels = vec![[0u8, 0, 0]; 50];
    pixels.extend(vec![[255u8, 255, 255]; 50]);
    let data = DataSet::from_rgb(&pixels);

    let (_, mut native) = engines(&KMeansConfig::new(2), &data);
    native
        .seed_with(&Bounds::rgb(), &[vec![10, 10, 10], vec![240, 240, 240]])
        .unwrap();
    native.clear_assignments().unwrap();
    native.assign(&data).unwrap();
    assert_eq!(native.update().unwrap(), 0);

    let clusters = native.clusters().unwrap();
    assert_eq!(clusters[0].centroid, vec![0, 0, 0]);
    assert_eq!(clusters[1].centroid, vec![255, 255, 255]);
    assert_eq!(clusters[0].members, (0..50).collect::<Vec<_>>());
    assert_eq!(clusters[1].members, (50..100).collect::<Vec<_>>());
    assert_eq!(native.drift().unwrap(), 975.0);
    assert_eq!(native.state(), EngineState::Converged);
    native.release();
}

#[test]
fn test_merged_seeds_split_on_both_engines() {
    let mut pixels = vec![[0u8, 0, 0]; 50];
    pixels.extend(vec![[255u8, 255, 255]; 50]);
    let data = DataSet::from_rgb(&pixels);

    for seed in 0..20 {
        let config = KMeansConfig::new(2).with_seed(seed);
        let (mut reference, mut native) = engines(&config, &data);
        let gray = vec![vec![127, 127, 127], vec![127, 127, 127]];
        reference.seed_with(&Bounds::rgb(), &gray).unwrap();
        native.seed_with(&Bounds::rgb(), &gray).unwrap();

        let (passes, reseeded) = run_in_lockstep(&mut reference, &mut native, &data, 200);
        assert!(native.is_converged(), "seed {} still running after {} passes", seed, passes);
        assert!(reseeded > 0);

        let mut sizes: Vec<usize> = native
            .clusters()
            .unwrap()
            .iter()
            .map(|c| c.members.len())
            .collect();
        sizes.sort_unstable();
        assert_eq!(sizes, vec![50, 50]);

        reference.release();
        native.release();
    }
}

#[test]
fn test_native_protocol_errors() {
    let data = random_pixels(20, 3);
    let (_, mut native) = engines(&KMeansConfig::new(3), &data);

    assert_eq!(native.assign(&data), Err(KMeansError::NotSeeded));
    assert_eq!(native.drift(), Err(KMeansError::NotSeeded));

    native.seed(&Bounds::rgb()).unwrap();
    assert!(matches!(native.update(), Err(KMeansError::InvalidState(_))));

    let other = random_pixels(21, 3);
    assert!(matches!(
        native.assign(&other),
        Err(KMeansError::InvalidDimensions(_))
    ));
    assert!(matches!(
        native.seed(&Bounds::uniform(2, 0, 255).unwrap()),
        Err(KMeansError::InvalidDimensions(_))
    ));

    native.release();
    native.release();
    assert_eq!(native.state(), EngineState::Unseeded);
    assert!(native.clusters().is_err());
}

#[test]
fn test_native_init_rejects_zero_k() {
    let data = random_pixels(5, 4);
    let params = EngineParams::from_config(&KMeansConfig::new(0), &data);
    assert!(matches!(
        NativeEngine::new(params, Box::new(CAbiPort::new())),
        Err(KMeansError::InvalidK(_))
    ));
}
