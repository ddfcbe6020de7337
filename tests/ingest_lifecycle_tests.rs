// tests/ingest_lifecycle_tests.rs
//
// Tests for the ingest-then-serve lifecycle contract:
// - weights gate sample access and go stale on append
// - the documented eviction scenario (5 timesteps into capacity 3)
// - the state-vector transform works standalone, without frames

use slipstream::config::Config;
use slipstream::dataset::{DatasetError, ImitationDataset};
use slipstream::record::TraceRecord;
use slipstream::telemetry::{state_vector, wheel_omega_std, STATE_DIM};
use slipstream::types::Frame;

fn record(n: usize) -> TraceRecord {
    TraceRecord {
        frames: (0..n).map(|_| Frame::filled(96, 96, 3, 105)).collect(),
        speed: vec![10.0; n],
        wheel_omegas: vec![[30.0; 4]; n],
        angular_velocity: vec![0.0; n],
        steering_joint_angle: vec![0.0; n],
        actions: (0..n)
            .map(|i| [0.0, 0.1 * i as f32, 0.0])
            .collect(),
        curvature: (0..n).map(|i| i as f64).collect(),
    }
}

fn lifecycle_config(capacity: usize) -> Config {
    let mut cfg = Config::default();
    cfg.dataset.capacity = capacity;
    cfg.dataset.sampling_stride = 1;
    cfg.dataset.balance_bins = 2;
    cfg.curvature.mean = 0.0;
    cfg.curvature.std = 1.0;
    cfg
}

#[test]
fn test_five_timesteps_into_capacity_three() {
    let mut ds = ImitationDataset::new(lifecycle_config(3));
    let stats = ds.append(&record(5)).expect("append");
    assert_eq!(stats.appended, 5);
    assert_eq!(stats.evicted, 2);
    assert_eq!(ds.len(), 3);

    ds.recompute_weights();
    // The retained window starts at the record's timestep 2, not 0.
    assert_eq!(ds.get(0).expect("sample").curvature, 2.0);
}

#[test]
fn test_reads_are_gated_on_weight_recomputation() {
    let mut ds = ImitationDataset::new(lifecycle_config(10));
    ds.append(&record(4)).expect("append");

    // Non-empty but never recomputed: every read fails.
    assert!(matches!(
        ds.get(0),
        Err(DatasetError::WeightsNotComputed {
            samples: 4,
            weights: 0,
        })
    ));

    ds.recompute_weights();
    assert!(ds.get(0).is_ok());
    assert!(ds.get(3).is_ok());

    // A further append grows the data past the weight array again.
    ds.append(&record(2)).expect("append");
    assert!(matches!(
        ds.get(0),
        Err(DatasetError::WeightsNotComputed {
            samples: 6,
            weights: 4,
        })
    ));
}

#[test]
fn test_index_errors_are_never_clamped() {
    let mut ds = ImitationDataset::new(lifecycle_config(10));
    ds.append(&record(3)).expect("append");
    ds.recompute_weights();

    assert!(matches!(
        ds.get(3),
        Err(DatasetError::IndexOutOfRange { index: 3, len: 3 })
    ));
    assert!(matches!(
        ds.get(100),
        Err(DatasetError::IndexOutOfRange { index: 100, .. })
    ));
}

#[test]
fn test_empty_dataset_lifecycle() {
    let mut ds = ImitationDataset::new(lifecycle_config(10));
    assert_eq!(ds.len(), 0);
    assert!(ds.is_empty());
    // Recompute before any append is benign and yields an empty array.
    assert!(ds.recompute_weights().is_empty());
    // Reads still fail on the index bound.
    assert!(matches!(
        ds.get(0),
        Err(DatasetError::IndexOutOfRange { index: 0, len: 0 })
    ));
}

#[test]
fn test_state_vector_usable_without_frames() {
    // A control loop normalizes live telemetry with no observation around.
    let cfg = Config::default();
    let omegas = [52.0, 55.0, 54.0, 53.0];
    let state = state_vector(18.0, &omegas, 0.4, -0.1, &cfg.telemetry);
    assert_eq!(state.len(), STATE_DIM);

    let slip = wheel_omega_std(&omegas);
    let expected = cfg.telemetry.wheel_omega_std.apply(slip);
    assert!((state[5] - expected).abs() < 1e-6);
}
