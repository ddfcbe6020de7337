//! Slipstream core library.
//!
//! Slipstream turns recorded driving-session traces (frames, vehicle
//! telemetry, expert actions, road curvature) into a fixed-capacity,
//! class-balanced, multi-modal training set for an imitation-learning
//! policy. The binaries (`src/main.rs`, `src/bin/synth_traces.rs`) are thin
//! harnesses around these components.
//!
//! # Architecture
//!
//! The pipeline separates pure transforms from the one stateful collection:
//!
//! - **Action codec** (`action`): lossless conversion between the
//!   3-channel environment control space and the 2-channel model space.
//!
//! - **Observation transforms** (`observation`): crop, HUD blanking,
//!   marker/drivable segmentation masks, grayscale collapse, and pixel
//!   normalization. Pure per-frame functions.
//!
//! - **Telemetry normalization** (`telemetry`): the flat 8-channel state
//!   vector, usable standalone by a live control loop.
//!
//! - **Balancing weights** (`balance`): inverse-frequency importance
//!   weights over the acceleration distribution.
//!
//! - **Bounded dataset** (`dataset`): five parallel capacity-bounded
//!   streams under one mutation API with synchronized eviction; the only
//!   stateful component.
//!
//! Ingestion is strictly sequential: append every record, recompute the
//! balancing weights once, then serve positional reads. The dataset is not
//! internally synchronized; concurrent readers are safe only once all
//! writes are done.

pub mod action;
pub mod balance;
pub mod config;
pub mod dataset;
pub mod io;
pub mod logging;
pub mod observation;
pub mod record;
pub mod telemetry;
pub mod types;

// --- Re-exports for ergonomic external use ---------------------------------

pub use config::{ChannelNorm, Config, ConfigError, HudRegion, CONFIG_VERSION};

pub use action::{
    to_env_space, to_model_space, ActionSpaceError, EnvAction, ModelAction, ENV_ACTION_DIM,
    MODEL_ACTION_DIM,
};

pub use observation::{
    extract_masks, extract_masks_batch, normalize_observation, MASK_CHANNELS, MASK_DRIVABLE,
    MASK_MARKER,
};

pub use telemetry::{state_vector, wheel_omega_std, StateVector, STATE_DIM, WHEEL_COUNT};

pub use balance::balancing_weights;

pub use record::{RecordError, TraceRecord};

pub use dataset::{AppendStats, BuildError, DatasetError, ImitationDataset};

pub use io::{discover_records, read_record, write_record, RecordIoError, RECORD_EXTENSION};

pub use logging::{ConsoleSink, FileSink, IngestSink, NoopSink};

pub use types::{Frame, MaskTensor, ObsTensor, Sample};
