// src/logging.rs
//
// Ingest telemetry sinks.
// - IngestSink: trait notified as records are folded into the dataset
// - NoopSink:   discards all events
// - ConsoleSink: one progress line per record on stderr
// - FileSink:   one JSON line per event for offline inspection

use std::fs::File;
use std::io::{self, BufWriter, Write};

use crate::dataset::AppendStats;

/// Abstract sink for dataset-construction telemetry.
pub trait IngestSink {
    /// Called once per ingested record.
    fn log_record(&mut self, source: &str, stats: &AppendStats);

    /// Called after each full weight recomputation.
    fn log_weights(&mut self, samples: usize, bins: usize);
}

/// Sink that discards all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl IngestSink for NoopSink {
    fn log_record(&mut self, _source: &str, _stats: &AppendStats) {
        // intentionally no-op
    }

    fn log_weights(&mut self, _samples: usize, _bins: usize) {
        // intentionally no-op
    }
}

/// Progress sink writing one line per event to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

impl IngestSink for ConsoleSink {
    fn log_record(&mut self, source: &str, stats: &AppendStats) {
        eprintln!(
            "[ingest] {} appended={} evicted={} total={}",
            source, stats.appended, stats.evicted, stats.len
        );
    }

    fn log_weights(&mut self, samples: usize, bins: usize) {
        eprintln!("[ingest] weights recomputed samples={} bins={}", samples, bins);
    }
}

/// JSONL file sink.
///
/// Each event is written as a single JSON object on its own line. The
/// payload is small and encoded manually to avoid pulling serialization
/// into the hot ingest path.
pub struct FileSink {
    writer: BufWriter<File>,
}

impl FileSink {
    /// Create a new sink writing to `path`.
    pub fn create(path: &str) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }
}

fn escape_json(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

impl IngestSink for FileSink {
    fn log_record(&mut self, source: &str, stats: &AppendStats) {
        let line = format!(
            "{{\"event\":\"record\",\"source\":\"{}\",\"appended\":{},\"evicted\":{},\"total\":{}}}\n",
            escape_json(source),
            stats.appended,
            stats.evicted,
            stats.len
        );
        let _ = self.writer.write_all(line.as_bytes());
    }

    fn log_weights(&mut self, samples: usize, bins: usize) {
        let line = format!(
            "{{\"event\":\"weights\",\"samples\":{},\"bins\":{}}}\n",
            samples, bins
        );
        let _ = self.writer.write_all(line.as_bytes());
        let _ = self.writer.flush();
    }
}
