//! Binary peak-table (`.tabbin`) decoding.
//!
//! The file begins with a little-endian `u64` record count. Records start at
//! byte [`RECORDS_OFFSET`] and are [`RECORD_LEN`] bytes each; only the first
//! 40 bytes of a record (`x`, `y`, `z`, `r` as `f64`, then `i` as `i64`) are
//! decoded.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::endian::{read_f64_le, read_i64_le, read_u64_le};
use crate::error::{ensure_len, Error, Result};

/// Byte offset of the first record.
pub const RECORDS_OFFSET: usize = 312;
/// Size of one record.
pub const RECORD_LEN: usize = 168;

/// One peak from the table: reciprocal-space coordinates, intensity and flag.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeakRecord {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub r: f64,
    pub i: i64,
    /// Set by [`crate::indexing::annotate_peaks`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexed: Option<bool>,
    /// Fractional Miller indices, set by [`crate::indexing::annotate_peaks`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hkl: Option<[f64; 3]>,
}

impl PeakRecord {
    pub fn new(x: f64, y: f64, z: f64, r: f64, i: i64) -> Self {
        PeakRecord {
            x,
            y,
            z,
            r,
            i,
            indexed: None,
            hkl: None,
        }
    }

    /// Value of one column as `f64`.
    pub fn value(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
            Axis::R => self.r,
            Axis::I => self.i as f64,
        }
    }
}

/// Peak-table columns that statistics are reported for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
    R,
    I,
}

impl Axis {
    pub const ALL: [Axis; 5] = [Axis::X, Axis::Y, Axis::Z, Axis::R, Axis::I];

    pub fn name(self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
            Axis::R => "r",
            Axis::I => "i",
        }
    }
}

/// Summary statistics of one column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisStatistics {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Population standard deviation.
    pub std: f64,
    /// Element at index `count / 2` of the sorted values.
    pub median: f64,
    pub count: usize,
}

impl AxisStatistics {
    /// Statistics of `values`, or `None` if empty.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_unstable_by(f64::total_cmp);

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;

        Some(AxisStatistics {
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            mean,
            std: libm::sqrt(variance),
            median: sorted[sorted.len() / 2],
            count: values.len(),
        })
    }
}

/// A decoded peak table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakTable {
    pub records: Vec<PeakRecord>,
    /// Per-column statistics; empty when there are no records.
    pub statistics: BTreeMap<Axis, AxisStatistics>,
    /// Record count from the file header.
    pub declared_chunks: u64,
    /// `true` if the file ended before `declared_chunks` records were read.
    pub truncated: bool,
    /// Length of the input buffer.
    pub source_len: usize,
}

/// Statistics for every column of `records`.
pub fn compute_statistics(records: &[PeakRecord]) -> BTreeMap<Axis, AxisStatistics> {
    let mut stats = BTreeMap::new();
    for axis in Axis::ALL {
        let values: Vec<f64> = records.iter().map(|p| p.value(axis)).collect();
        if let Some(s) = AxisStatistics::from_values(&values) {
            stats.insert(axis, s);
        }
    }
    stats
}

/// Decode a binary peak table.
pub fn parse_peak_table(data: &[u8]) -> Result<PeakTable> {
    if data.is_empty() {
        return Err(Error::EmptyInput);
    }
    ensure_len(data, 8)?;
    let declared_chunks = read_u64_le(data);
    debug!(declared_chunks, len = data.len(), "parsing peak table");

    let body = data.get(RECORDS_OFFSET..).unwrap_or(&[]);
    let available = body.len() / RECORD_LEN;
    let wanted = usize::try_from(declared_chunks).unwrap_or(usize::MAX);

    let mut records = Vec::with_capacity(wanted.min(available));
    for chunk in body.chunks_exact(RECORD_LEN).take(wanted) {
        records.push(PeakRecord::new(
            read_f64_le(&chunk[0..]),
            read_f64_le(&chunk[8..]),
            read_f64_le(&chunk[16..]),
            read_f64_le(&chunk[24..]),
            read_i64_le(&chunk[32..]),
        ));
    }

    let truncated = (records.len() as u64) < declared_chunks;
    if truncated {
        let partial = body.len().saturating_sub(records.len() * RECORD_LEN).min(RECORD_LEN);
        warn!(
            chunk = records.len() + 1,
            bytes = partial,
            expected = RECORD_LEN,
            "peak table chunk is incomplete, stopping"
        );
    }
    debug!(records = records.len(), "read peak table records");

    Ok(PeakTable {
        statistics: compute_statistics(&records),
        records,
        declared_chunks,
        truncated,
        source_len: data.len(),
    })
}

/// Read and decode a peak table from disk.
#[cfg(feature = "std")]
pub fn read_peak_table_file<P: AsRef<std::path::Path>>(path: P) -> Result<PeakTable> {
    let data = std::fs::read(path)?;
    parse_peak_table(&data)
}
