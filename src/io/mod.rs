// src/io/mod.rs
//
// Trace archive codec and directory discovery.
//
// A trace archive is raw little-endian binary with explicit shape headers:
// a magic + format version, then the seven series in fixed order, each
// written as `ndims: u64 | dims: u64 ... | payload`. Frames are stored as
// bytes, telemetry series as f64, actions as f32.
//
// This layer is a thin collaborator: it only parses bytes into a
// TraceRecord. Cross-series alignment is the dataset's validation concern,
// and skip/retry policies on unreadable files belong to the caller.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::record::TraceRecord;
use crate::telemetry::WHEEL_COUNT;
use crate::types::Frame;

/// File extension of a trace archive.
pub const RECORD_EXTENSION: &str = "trace";

const RECORD_MAGIC: [u8; 4] = *b"SSTR";
const RECORD_FORMAT_VERSION: u32 = 1;

/// Upper bound on elements in a single series; headers claiming more are
/// rejected as malformed before any allocation happens.
const MAX_SERIES_ELEMS: u64 = 1 << 32;

/// Errors raised while reading a trace archive.
#[derive(Debug, Clone)]
pub enum RecordIoError {
    Io { path: String, source: String },
    Format { path: String, message: String },
    UnsupportedVersion { path: String, found: u32 },
}

impl std::fmt::Display for RecordIoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordIoError::Io { path, source } => {
                write!(f, "Failed to read trace archive '{}': {}", path, source)
            }
            RecordIoError::Format { path, message } => {
                write!(f, "Malformed trace archive '{}': {}", path, message)
            }
            RecordIoError::UnsupportedVersion { path, found } => write!(
                f,
                "Trace archive '{}' has format version {} (supported: {})",
                path, found, RECORD_FORMAT_VERSION
            ),
        }
    }
}

impl std::error::Error for RecordIoError {}

/// List the trace archives under `dir` in deterministic (lexicographic by
/// file name) order, with symbolic links resolved to their targets.
pub fn discover_records(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut named: Vec<(String, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_trace = path
            .extension()
            .map(|ext| ext == RECORD_EXTENSION)
            .unwrap_or(false);
        if !is_trace {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        named.push((name, path));
    }
    named.sort_by(|a, b| a.0.cmp(&b.0));

    let mut resolved = Vec::with_capacity(named.len());
    for (_, path) in named {
        // Resolves symlinks; plain files canonicalize to themselves.
        resolved.push(std::fs::canonicalize(&path)?);
    }
    Ok(resolved)
}

struct ArchiveReader {
    inner: BufReader<File>,
    path: String,
}

impl ArchiveReader {
    fn open(path: &Path) -> Result<Self, RecordIoError> {
        let path_str = path.display().to_string();
        let file = File::open(path).map_err(|e| RecordIoError::Io {
            path: path_str.clone(),
            source: e.to_string(),
        })?;
        Ok(Self {
            inner: BufReader::new(file),
            path: path_str,
        })
    }

    fn io_err(&self, e: io::Error) -> RecordIoError {
        RecordIoError::Io {
            path: self.path.clone(),
            source: e.to_string(),
        }
    }

    fn format_err(&self, message: impl Into<String>) -> RecordIoError {
        RecordIoError::Format {
            path: self.path.clone(),
            message: message.into(),
        }
    }

    fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>, RecordIoError> {
        let mut buf = vec![0_u8; len];
        self.inner
            .read_exact(&mut buf)
            .map_err(|e| self.io_err(e))?;
        Ok(buf)
    }

    fn read_u32(&mut self) -> Result<u32, RecordIoError> {
        let mut buf = [0_u8; 4];
        self.inner
            .read_exact(&mut buf)
            .map_err(|e| self.io_err(e))?;
        Ok(u32::from_le_bytes(buf))
    }

    fn read_u64(&mut self) -> Result<u64, RecordIoError> {
        let mut buf = [0_u8; 8];
        self.inner
            .read_exact(&mut buf)
            .map_err(|e| self.io_err(e))?;
        Ok(u64::from_le_bytes(buf))
    }

    /// Read one shape header and return its dims, checking rank and the
    /// element bound.
    fn read_dims(&mut self, series: &str, ndims: usize) -> Result<Vec<u64>, RecordIoError> {
        let found = self.read_u64()?;
        if found as usize != ndims {
            return Err(self.format_err(format!(
                "series '{}' has rank {}, expected {}",
                series, found, ndims
            )));
        }
        let mut dims = Vec::with_capacity(ndims);
        let mut elems: u64 = 1;
        for _ in 0..ndims {
            let d = self.read_u64()?;
            elems = elems
                .checked_mul(d)
                .filter(|&e| e <= MAX_SERIES_ELEMS)
                .ok_or_else(|| {
                    self.format_err(format!("series '{}' claims an implausible size", series))
                })?;
            dims.push(d);
        }
        Ok(dims)
    }

    fn read_f64_series(&mut self, series: &str) -> Result<Vec<f64>, RecordIoError> {
        let dims = self.read_dims(series, 1)?;
        let n = dims[0] as usize;
        let raw = self.read_bytes(n * 8)?;
        Ok(raw
            .chunks_exact(8)
            .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
            .collect())
    }
}

/// Read one trace archive into a `TraceRecord`.
pub fn read_record(path: &Path) -> Result<TraceRecord, RecordIoError> {
    let mut r = ArchiveReader::open(path)?;

    let magic = r.read_bytes(4)?;
    if magic != RECORD_MAGIC {
        return Err(r.format_err("bad magic (not a trace archive)"));
    }
    let version = r.read_u32()?;
    if version != RECORD_FORMAT_VERSION {
        return Err(RecordIoError::UnsupportedVersion {
            path: r.path.clone(),
            found: version,
        });
    }

    // Frames: rank-4 [n, h, w, c], byte components.
    let dims = r.read_dims("frames", 4)?;
    let (n, h, w, c) = (
        dims[0] as usize,
        dims[1] as usize,
        dims[2] as usize,
        dims[3] as usize,
    );
    if n > 0 && (h == 0 || w == 0 || c == 0) {
        return Err(r.format_err("frames series has a zero spatial dimension"));
    }
    let mut frames = Vec::with_capacity(n);
    for _ in 0..n {
        let data = r.read_bytes(h * w * c)?;
        frames.push(Frame::from_raw(h, w, c, data));
    }

    let speed = r.read_f64_series("speed")?;

    // Wheel omegas: rank-2 [n, 4].
    let dims = r.read_dims("wheel_omegas", 2)?;
    if dims[1] as usize != WHEEL_COUNT {
        return Err(r.format_err(format!(
            "wheel_omegas row width {} (expected {})",
            dims[1], WHEEL_COUNT
        )));
    }
    let rows = dims[0] as usize;
    let mut wheel_omegas = Vec::with_capacity(rows);
    for _ in 0..rows {
        let raw = r.read_bytes(WHEEL_COUNT * 8)?;
        let mut row = [0.0_f64; WHEEL_COUNT];
        for (slot, chunk) in row.iter_mut().zip(raw.chunks_exact(8)) {
            *slot = f64::from_le_bytes([
                chunk[0], chunk[1], chunk[2], chunk[3], chunk[4], chunk[5], chunk[6], chunk[7],
            ]);
        }
        wheel_omegas.push(row);
    }

    let angular_velocity = r.read_f64_series("angular_velocity")?;
    let steering_joint_angle = r.read_f64_series("steering_joint_angle")?;

    // Actions: rank-2 [n, 3], f32 components.
    let dims = r.read_dims("actions", 2)?;
    if dims[1] != 3 {
        return Err(r.format_err(format!("actions row width {} (expected 3)", dims[1])));
    }
    let rows = dims[0] as usize;
    let mut actions = Vec::with_capacity(rows);
    for _ in 0..rows {
        let raw = r.read_bytes(3 * 4)?;
        let mut row = [0.0_f32; 3];
        for (slot, chunk) in row.iter_mut().zip(raw.chunks_exact(4)) {
            *slot = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        actions.push(row);
    }

    let curvature = r.read_f64_series("curvature")?;

    Ok(TraceRecord {
        frames,
        speed,
        wheel_omegas,
        angular_velocity,
        steering_joint_angle,
        actions,
        curvature,
    })
}

/// Write a `TraceRecord` as a trace archive.
///
/// Frames must share one shape. Used by the synthetic-trace generator and
/// by tests; the training pipeline itself only reads.
pub fn write_record(path: &Path, record: &TraceRecord) -> io::Result<()> {
    let file = File::create(path)?;
    let mut w = BufWriter::new(file);

    w.write_all(&RECORD_MAGIC)?;
    w.write_all(&RECORD_FORMAT_VERSION.to_le_bytes())?;

    // Frames.
    let (h, wdt, c) = record
        .frames
        .first()
        .map(|f| (f.height(), f.width(), f.channels()))
        .unwrap_or((0, 0, 0));
    write_dims(&mut w, &[record.frames.len() as u64, h as u64, wdt as u64, c as u64])?;
    for frame in &record.frames {
        if (frame.height(), frame.width(), frame.channels()) != (h, wdt, c) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "all frames in a record must share one shape",
            ));
        }
        w.write_all(frame.data())?;
    }

    write_f64_series(&mut w, &record.speed)?;

    write_dims(&mut w, &[record.wheel_omegas.len() as u64, WHEEL_COUNT as u64])?;
    for row in &record.wheel_omegas {
        for v in row {
            w.write_all(&v.to_le_bytes())?;
        }
    }

    write_f64_series(&mut w, &record.angular_velocity)?;
    write_f64_series(&mut w, &record.steering_joint_angle)?;

    write_dims(&mut w, &[record.actions.len() as u64, 3])?;
    for row in &record.actions {
        for v in row {
            w.write_all(&v.to_le_bytes())?;
        }
    }

    write_f64_series(&mut w, &record.curvature)?;
    w.flush()
}

fn write_dims<W: Write>(w: &mut W, dims: &[u64]) -> io::Result<()> {
    w.write_all(&(dims.len() as u64).to_le_bytes())?;
    for &d in dims {
        w.write_all(&d.to_le_bytes())?;
    }
    Ok(())
}

fn write_f64_series<W: Write>(w: &mut W, series: &[f64]) -> io::Result<()> {
    write_dims(w, &[series.len() as u64])?;
    for v in series {
        w.write_all(&v.to_le_bytes())?;
    }
    Ok(())
}
