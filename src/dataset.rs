// src/dataset.rs
//
// The bounded multi-stream dataset: five parallel capacity-bounded
// sequences (observation, state, action, curvature, masks) behind a single
// mutation API, plus the derived balancing-weight array.
//
// Core invariant: the five sequences ALWAYS have equal length, and eviction
// past capacity removes the oldest entry of all five simultaneously. No
// per-stream append exists anywhere; a record is validated and fully
// transformed before the first sample of it is committed, so a malformed
// record can never leave the streams torn.
//
// Lifecycle: append all records, recompute weights once, then serve
// positional reads. Reads are immutable and may run concurrently with each
// other, but never with a writer; the type is deliberately not internally
// synchronized.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use crate::action::{self, ActionSpaceError, ModelAction};
use crate::balance::balancing_weights;
use crate::config::Config;
use crate::io::{self, RecordIoError};
use crate::logging::IngestSink;
use crate::observation::{extract_masks, normalize_observation, storage_frame};
use crate::record::{RecordError, TraceRecord};
use crate::telemetry::{state_vector, StateVector};
use crate::types::{Frame, MaskTensor, Sample};

/// Outcome of folding one record into the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendStats {
    /// Samples produced from the record after subsampling.
    pub appended: usize,
    /// Oldest samples evicted to stay within capacity.
    pub evicted: usize,
    /// Dataset size after the append.
    pub len: usize,
}

/// Errors surfaced by dataset mutation and access.
#[derive(Debug, Clone, PartialEq)]
pub enum DatasetError {
    /// The record's series lengths disagree; nothing was committed.
    Record(RecordError),
    /// An action row cannot be projected into model space; nothing was
    /// committed.
    Action(ActionSpaceError),
    /// Positional access outside `0..len`.
    IndexOutOfRange { index: usize, len: usize },
    /// The weight array does not cover the current samples; call
    /// `recompute_weights` after ingesting before serving reads.
    WeightsNotComputed { samples: usize, weights: usize },
}

impl From<RecordError> for DatasetError {
    fn from(err: RecordError) -> Self {
        DatasetError::Record(err)
    }
}

impl From<ActionSpaceError> for DatasetError {
    fn from(err: ActionSpaceError) -> Self {
        DatasetError::Action(err)
    }
}

impl std::fmt::Display for DatasetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatasetError::Record(err) => write!(f, "{}", err),
            DatasetError::Action(err) => write!(f, "{}", err),
            DatasetError::IndexOutOfRange { index, len } => {
                write!(f, "sample index {} out of range (len {})", index, len)
            }
            DatasetError::WeightsNotComputed { samples, weights } => write!(
                f,
                "balancing weights cover {} samples but the dataset holds {}; \
                 recompute_weights must run before samples are served",
                weights, samples
            ),
        }
    }
}

impl std::error::Error for DatasetError {}

/// Errors surfaced when building a dataset from trace files.
#[derive(Debug)]
pub enum BuildError {
    /// The trace directory could not be listed.
    List { path: String, source: String },
    /// A trace archive could not be read or decoded.
    Read(RecordIoError),
    /// A decoded record was rejected by the dataset.
    Ingest { path: String, source: DatasetError },
}

impl From<RecordIoError> for BuildError {
    fn from(err: RecordIoError) -> Self {
        BuildError::Read(err)
    }
}

impl std::fmt::Display for BuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildError::List { path, source } => {
                write!(f, "Failed to list trace directory '{}': {}", path, source)
            }
            BuildError::Read(err) => write!(f, "{}", err),
            BuildError::Ingest { path, source } => {
                write!(f, "Failed to ingest '{}': {}", path, source)
            }
        }
    }
}

impl std::error::Error for BuildError {}

/// Fixed-capacity, class-balanced, multi-modal training set.
///
/// Owns every buffered tensor; nothing aliases the source records after
/// `append` returns. Frames are stored post-crop and pre-normalization
/// (see `observation::storage_frame`) and are re-normalized on every
/// `get`, so normalization constants may change between ingest and
/// sampling.
#[derive(Debug, Clone)]
pub struct ImitationDataset {
    cfg: Config,
    observations: VecDeque<Frame>,
    states: VecDeque<StateVector>,
    actions: VecDeque<ModelAction>,
    curvatures: VecDeque<f32>,
    masks: VecDeque<MaskTensor>,
    weights: Vec<f32>,
}

impl ImitationDataset {
    /// Empty dataset bounded by `cfg.dataset.capacity`.
    pub fn new(cfg: Config) -> Self {
        let capacity = cfg.dataset.capacity;
        Self {
            cfg,
            observations: VecDeque::with_capacity(capacity.min(4096)),
            states: VecDeque::new(),
            actions: VecDeque::new(),
            curvatures: VecDeque::new(),
            masks: VecDeque::new(),
            weights: Vec::new(),
        }
    }

    /// Build a dataset from every trace archive under `dir` (lexicographic
    /// order, symlinks resolved), then recompute weights once.
    pub fn from_directory<P: AsRef<Path>>(
        dir: P,
        cfg: Config,
        sink: &mut dyn IngestSink,
    ) -> Result<Self, BuildError> {
        let paths = io::discover_records(dir.as_ref()).map_err(|e| BuildError::List {
            path: dir.as_ref().display().to_string(),
            source: e.to_string(),
        })?;
        Self::from_files(&paths, cfg, sink)
    }

    /// Build a dataset from an explicit ordered list of trace archives,
    /// then recompute weights once.
    pub fn from_files(
        paths: &[PathBuf],
        cfg: Config,
        sink: &mut dyn IngestSink,
    ) -> Result<Self, BuildError> {
        let mut dataset = Self::new(cfg);
        for path in paths {
            let record = io::read_record(path)?;
            let stats = dataset
                .append(&record)
                .map_err(|source| BuildError::Ingest {
                    path: path.display().to_string(),
                    source,
                })?;
            sink.log_record(&path.display().to_string(), &stats);
        }
        let bins = dataset.cfg.dataset.balance_bins;
        let weights = dataset.recompute_weights();
        sink.log_weights(weights.len(), bins);
        Ok(dataset)
    }

    /// Fold one record into the dataset.
    ///
    /// The record is subsampled by the configured stride, every retained
    /// timestep is run through the action, observation, and telemetry
    /// transforms, and only then are the resulting samples committed to all
    /// five streams. If the total would exceed capacity, the oldest samples
    /// are evicted from every stream in lockstep.
    ///
    /// All-or-nothing: a validation failure (misaligned series or an
    /// unprojectable action row) leaves the dataset untouched. Appending
    /// conceptually invalidates previously computed weights.
    pub fn append(&mut self, record: &TraceRecord) -> Result<AppendStats, DatasetError> {
        record.validate()?;

        let stride = self.cfg.dataset.sampling_stride;
        let kept: Vec<usize> = record.subsample_indices(stride).collect();

        // Fallible stage first: project every retained action row before
        // any transform output is staged.
        let env_actions: Vec<_> = kept.iter().map(|&i| record.actions[i]).collect();
        let model_actions = action::to_model_space(&env_actions)?;

        // Infallible transforms, staged outside the streams.
        let obs_cfg = &self.cfg.observation;
        let mut staged_frames = Vec::with_capacity(kept.len());
        let mut staged_masks = Vec::with_capacity(kept.len());
        let mut staged_states = Vec::with_capacity(kept.len());
        let mut staged_curvatures = Vec::with_capacity(kept.len());
        for &i in &kept {
            let frame = &record.frames[i];
            staged_masks.push(extract_masks(frame, obs_cfg));
            staged_frames.push(storage_frame(frame, obs_cfg));
            staged_states.push(state_vector(
                record.speed[i],
                &record.wheel_omegas[i],
                record.angular_velocity[i],
                record.steering_joint_angle[i],
                &self.cfg.telemetry,
            ));
            staged_curvatures.push(self.cfg.curvature.apply(record.curvature[i]));
        }

        // Commit across all five streams, then evict the oldest entries in
        // lockstep until the capacity bound holds again.
        let appended = kept.len();
        for (((frame, state), (act, curv)), mask) in staged_frames
            .into_iter()
            .zip(staged_states)
            .zip(model_actions.into_iter().zip(staged_curvatures))
            .zip(staged_masks)
        {
            self.observations.push_back(frame);
            self.states.push_back(state);
            self.actions.push_back(act);
            self.curvatures.push_back(curv);
            self.masks.push_back(mask);
        }

        let capacity = self.cfg.dataset.capacity;
        let mut evicted = 0;
        while self.observations.len() > capacity {
            self.observations.pop_front();
            self.states.pop_front();
            self.actions.pop_front();
            self.curvatures.pop_front();
            self.masks.pop_front();
            evicted += 1;
        }

        debug_assert!(self.streams_aligned());

        Ok(AppendStats {
            appended,
            evicted,
            len: self.len(),
        })
    }

    /// Recompute the balancing weights over the entire current action
    /// stream and store them as the authoritative weight array.
    ///
    /// Must run after ingestion and before any `get`. On an empty dataset
    /// this yields an empty array, which is benign.
    pub fn recompute_weights(&mut self) -> &[f32] {
        let actions: Vec<ModelAction> = self.actions.iter().copied().collect();
        self.weights = balancing_weights(&actions, self.cfg.dataset.balance_bins);
        &self.weights
    }

    /// Assemble the full sample at `index`.
    ///
    /// The stored cropped frame is normalized here, at access time, with
    /// the currently configured constants. Fails with `IndexOutOfRange`
    /// for positions outside `0..len`, and with `WeightsNotComputed` when
    /// the weight array does not match the data size (no recompute since
    /// the last append).
    pub fn get(&self, index: usize) -> Result<Sample, DatasetError> {
        let len = self.len();
        if index >= len {
            return Err(DatasetError::IndexOutOfRange { index, len });
        }
        if self.weights.len() != len {
            return Err(DatasetError::WeightsNotComputed {
                samples: len,
                weights: self.weights.len(),
            });
        }

        Ok(Sample {
            observation: normalize_observation(&self.observations[index], &self.cfg.observation),
            state: self.states[index].to_vec(),
            action: self.actions[index],
            curvature: self.curvatures[index],
            masks: self.masks[index].clone(),
            weight: self.weights[index],
        })
    }

    /// Current sample count.
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Maximum retained sample count.
    pub fn capacity(&self) -> usize {
        self.cfg.dataset.capacity
    }

    /// The authoritative weight array for the current snapshot (empty until
    /// `recompute_weights` runs).
    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    /// The injected configuration.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    fn streams_aligned(&self) -> bool {
        let n = self.observations.len();
        self.states.len() == n
            && self.actions.len() == n
            && self.curvatures.len() == n
            && self.masks.len() == n
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::types::Frame;

    /// A record whose curvature series encodes the timestep index, so tests
    /// can tell which timesteps survived eviction.
    fn tagged_record(n: usize) -> TraceRecord {
        TraceRecord {
            frames: (0..n).map(|_| Frame::filled(96, 96, 3, 105)).collect(),
            speed: vec![10.0; n],
            wheel_omegas: vec![[50.0, 50.0, 50.0, 50.0]; n],
            angular_velocity: vec![0.0; n],
            steering_joint_angle: vec![0.0; n],
            actions: (0..n)
                .map(|i| {
                    if i % 2 == 0 {
                        [0.0, 0.5, 0.0]
                    } else {
                        [0.0, 0.0, 0.5]
                    }
                })
                .collect(),
            curvature: (0..n).map(|i| i as f64).collect(),
        }
    }

    fn test_config(capacity: usize) -> Config {
        let mut cfg = Config::default();
        cfg.dataset.capacity = capacity;
        cfg.dataset.sampling_stride = 1;
        cfg.dataset.balance_bins = 4;
        // Identity curvature norm keeps the timestep tags readable.
        cfg.curvature.mean = 0.0;
        cfg.curvature.std = 1.0;
        cfg
    }

    #[test]
    fn test_streams_stay_aligned_across_appends() {
        let mut ds = ImitationDataset::new(test_config(100));
        ds.append(&tagged_record(7)).expect("append");
        ds.append(&tagged_record(5)).expect("append");
        assert_eq!(ds.len(), 12);
        assert!(ds.streams_aligned());
    }

    #[test]
    fn test_eviction_keeps_most_recent_in_arrival_order() {
        // One record with 5 timesteps into a capacity-3 dataset: exactly
        // the last 3 timesteps survive, oldest first.
        let mut ds = ImitationDataset::new(test_config(3));
        let stats = ds.append(&tagged_record(5)).expect("append");
        assert_eq!(stats.appended, 5);
        assert_eq!(stats.evicted, 2);
        assert_eq!(ds.len(), 3);

        ds.recompute_weights();
        let first = ds.get(0).expect("sample");
        assert_eq!(first.curvature, 2.0);
        let last = ds.get(2).expect("sample");
        assert_eq!(last.curvature, 4.0);
    }

    #[test]
    fn test_eviction_spans_append_calls() {
        let mut ds = ImitationDataset::new(test_config(4));
        ds.append(&tagged_record(3)).expect("append");
        let stats = ds.append(&tagged_record(3)).expect("append");
        assert_eq!(stats.evicted, 2);
        assert_eq!(ds.len(), 4);
        ds.recompute_weights();
        // Oldest surviving sample is timestep 2 of the first record.
        assert_eq!(ds.get(0).expect("sample").curvature, 2.0);
        // Newest is timestep 2 of the second record.
        assert_eq!(ds.get(3).expect("sample").curvature, 2.0);
        assert_eq!(ds.get(1).expect("sample").curvature, 0.0);
    }

    #[test]
    fn test_subsampling_stride() {
        let mut cfg = test_config(100);
        cfg.dataset.sampling_stride = 4;
        let mut ds = ImitationDataset::new(cfg);
        let record = tagged_record(10);
        let stats = ds.append(&record).expect("append");
        assert_eq!(stats.appended, 3);
        ds.recompute_weights();
        assert_eq!(ds.get(0).expect("s").curvature, 0.0);
        assert_eq!(ds.get(1).expect("s").curvature, 4.0);
        assert_eq!(ds.get(2).expect("s").curvature, 8.0);
    }

    #[test]
    fn test_misaligned_record_rejected_without_commit() {
        let mut ds = ImitationDataset::new(test_config(100));
        ds.append(&tagged_record(3)).expect("append");

        let mut bad = tagged_record(4);
        bad.speed.pop();
        let err = ds.append(&bad).unwrap_err();
        assert!(matches!(err, DatasetError::Record(_)));
        // Prior state intact.
        assert_eq!(ds.len(), 3);
        assert!(ds.streams_aligned());
    }

    #[test]
    fn test_overlapping_pedals_reject_whole_record() {
        let mut ds = ImitationDataset::new(test_config(100));
        let mut bad = tagged_record(4);
        bad.actions[2] = [0.0, 0.7, 0.3];
        let err = ds.append(&bad).unwrap_err();
        assert!(matches!(
            err,
            DatasetError::Action(ActionSpaceError::ThrottleBrakeOverlap { row: 2, .. })
        ));
        assert_eq!(ds.len(), 0);
    }

    #[test]
    fn test_get_out_of_range() {
        let mut ds = ImitationDataset::new(test_config(100));
        ds.append(&tagged_record(2)).expect("append");
        ds.recompute_weights();
        let err = ds.get(2).unwrap_err();
        assert_eq!(err, DatasetError::IndexOutOfRange { index: 2, len: 2 });
    }

    #[test]
    fn test_get_before_recompute_is_a_state_error() {
        let mut ds = ImitationDataset::new(test_config(100));
        ds.append(&tagged_record(2)).expect("append");
        let err = ds.get(0).unwrap_err();
        assert_eq!(
            err,
            DatasetError::WeightsNotComputed {
                samples: 2,
                weights: 0,
            }
        );
    }

    #[test]
    fn test_append_after_recompute_invalidates_weights() {
        let mut ds = ImitationDataset::new(test_config(100));
        ds.append(&tagged_record(2)).expect("append");
        ds.recompute_weights();
        assert!(ds.get(0).is_ok());
        ds.append(&tagged_record(2)).expect("append");
        assert!(matches!(
            ds.get(0),
            Err(DatasetError::WeightsNotComputed { .. })
        ));
    }

    #[test]
    fn test_recompute_on_empty_dataset_is_benign() {
        let mut ds = ImitationDataset::new(test_config(100));
        assert!(ds.recompute_weights().is_empty());
    }

    #[test]
    fn test_sample_assembly_shapes() {
        let mut ds = ImitationDataset::new(test_config(100));
        ds.append(&tagged_record(3)).expect("append");
        ds.recompute_weights();
        let sample = ds.get(1).expect("sample");
        // Grayscale by default: 1 channel, cropped height.
        assert_eq!(sample.observation.shape(), (1, 84, 96));
        assert_eq!(sample.masks.shape(), (2, 84, 96));
        assert_eq!(sample.state.len(), crate::telemetry::STATE_DIM);
        // Timestep 1 braked at 0.5: signed acceleration is negative.
        assert_eq!(sample.action, [0.0, -0.5]);
        assert!(sample.weight > 0.0);
    }

    #[test]
    fn test_inverse_frequency_weights_through_dataset() {
        let mut cfg = test_config(1000);
        cfg.dataset.balance_bins = 2;
        let mut ds = ImitationDataset::new(cfg);
        let mut record = tagged_record(100);
        for (i, act) in record.actions.iter_mut().enumerate() {
            *act = if i < 80 {
                [0.0, 0.5, 0.0]
            } else {
                [0.0, 0.0, 0.5]
            };
        }
        ds.append(&record).expect("append");
        let weights = ds.recompute_weights().to_vec();
        assert!((weights[99] / weights[0] - 4.0).abs() < 1e-5);
    }
}
