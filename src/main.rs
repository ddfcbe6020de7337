// src/main.rs
//
// Research-harness CLI for Slipstream.
//
// Builds a bounded training set from a directory of trace archives,
// recomputes balancing weights, and reports a summary. Constraints:
// - Config precedence: CLI overrides > --config YAML > built-in defaults.
// - Deterministic output for identical inputs (no RNG in the pipeline).
// - Print a concise run header (config version/hash, capacity, stride).

use std::path::PathBuf;

use clap::{ArgAction, Parser};
use serde::Serialize;

use slipstream::config::Config;
use slipstream::dataset::ImitationDataset;
use slipstream::logging::{ConsoleSink, FileSink, IngestSink, NoopSink};

#[derive(Debug, Parser)]
#[command(
    name = "slipstream",
    about = "Build a class-balanced imitation-learning dataset from driving traces",
    version
)]
struct Args {
    /// Directory containing trace archives (*.trace).
    #[arg(long)]
    data_dir: PathBuf,

    /// Optional YAML config with normalization constants and bounds.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the dataset capacity.
    #[arg(long)]
    capacity: Option<usize>,

    /// Override the number of balancing bins.
    #[arg(long)]
    bins: Option<usize>,

    /// Override the subsampling stride.
    #[arg(long)]
    stride: Option<usize>,

    /// Keep all three color channels instead of grayscale.
    #[arg(long)]
    color: bool,

    /// Write per-record ingest events to a JSONL file.
    #[arg(long)]
    log: Option<String>,

    /// Write the run summary as JSON to this path.
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Verbosity: -v prints per-record progress to stderr.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

/// Run summary emitted on stdout and optionally as JSON.
#[derive(Debug, Serialize)]
struct RunSummary {
    config_version: String,
    samples: usize,
    capacity: usize,
    weight_min: f32,
    weight_max: f32,
    weight_mean: f32,
}

fn fnv1a64(s: &str) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;
    let mut h = FNV_OFFSET;
    for b in s.as_bytes() {
        h ^= *b as u64;
        h = h.wrapping_mul(FNV_PRIME);
    }
    h
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut cfg = match &args.config {
        Some(path) => Config::from_yaml_file(path)?,
        None => Config::default(),
    };
    if let Some(capacity) = args.capacity {
        cfg.dataset.capacity = capacity;
    }
    if let Some(bins) = args.bins {
        cfg.dataset.balance_bins = bins;
    }
    if let Some(stride) = args.stride {
        cfg.dataset.sampling_stride = stride;
    }
    if args.color {
        cfg.observation.use_color = true;
    }
    cfg.validate()?;

    let cfg_hash = fnv1a64(&format!("{cfg:?}"));
    println!(
        "slipstream | cfg={} | cfg_hash=0x{:016x} | capacity={} | bins={} | stride={}",
        cfg.version,
        cfg_hash,
        cfg.dataset.capacity,
        cfg.dataset.balance_bins,
        cfg.dataset.sampling_stride
    );

    let mut sink: Box<dyn IngestSink> = match &args.log {
        Some(path) => Box::new(FileSink::create(path)?),
        None if args.verbose > 0 => Box::new(ConsoleSink),
        None => Box::new(NoopSink),
    };

    let dataset = ImitationDataset::from_directory(&args.data_dir, cfg, sink.as_mut())?;

    let weights = dataset.weights();
    let (mut min, mut max, mut sum) = (f32::INFINITY, f32::NEG_INFINITY, 0.0_f64);
    for &w in weights {
        min = min.min(w);
        max = max.max(w);
        sum += w as f64;
    }
    let summary = RunSummary {
        config_version: dataset.config().version.to_string(),
        samples: dataset.len(),
        capacity: dataset.capacity(),
        weight_min: if weights.is_empty() { 0.0 } else { min },
        weight_max: if weights.is_empty() { 0.0 } else { max },
        weight_mean: if weights.is_empty() {
            0.0
        } else {
            (sum / weights.len() as f64) as f32
        },
    };

    println!(
        "done | samples={} | weight_min={:.4} | weight_max={:.4} | weight_mean={:.4}",
        summary.samples, summary.weight_min, summary.weight_max, summary.weight_mean
    );

    if let Some(path) = &args.summary {
        std::fs::write(path, serde_json::to_string_pretty(&summary)?)?;
    }

    Ok(())
}

fn main() {
    let args = Args::parse();
    if let Err(err) = run(args) {
        eprintln!("slipstream: {err}");
        std::process::exit(1);
    }
}
