//! Spot indexing against a UB matrix.
//!
//! A peak is indexed when `UB⁻¹·(x, y, z)` lands within a tolerance of
//! integer Miller indices on all three axes. The UB matrix is used as stored,
//! without wavelength scaling.

use alloc::vec::Vec;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cell::UbMatrix;
use crate::matrix::Mat3;
use crate::peaks::PeakRecord;

/// Largest per-axis distance from an integer that still counts as indexed.
pub const DEFAULT_TOLERANCE: f64 = 0.125;

/// Indexing result for one peak.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexedSpot {
    /// Position of the peak in the input.
    pub index: usize,
    pub xyz: [f64; 3],
    /// Fractional Miller indices.
    pub hkl: [f64; 3],
    pub hkl_rounded: [i32; 3],
    /// `|hkl - round(hkl)|` per axis.
    pub distances: [f64; 3],
    pub indexed: bool,
}

/// Indexing statistics for a set of peaks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexingSummary {
    pub indexed_count: usize,
    pub total_count: usize,
    /// One entry per input peak, in input order. Empty if the matrix is singular.
    pub spots: Vec<IndexedSpot>,
    /// Percentage of indexed peaks, rounded to two decimals.
    pub indexing_rate_percent: f64,
}

impl IndexingSummary {
    /// Summary for an input that could not be indexed at all.
    fn unindexed(total_count: usize) -> Self {
        IndexingSummary {
            indexed_count: 0,
            total_count,
            spots: Vec::new(),
            indexing_rate_percent: 0.0,
        }
    }

    /// Only the spots that were indexed.
    pub fn indexed_spots(&self) -> impl Iterator<Item = &IndexedSpot> {
        self.spots.iter().filter(|s| s.indexed)
    }
}

fn locate(inverse: &Mat3, index: usize, xyz: [f64; 3], tolerance: f64) -> IndexedSpot {
    let hkl = inverse.mul_vec(xyz);
    let rounded = hkl.map(libm::round);
    let distances = [
        libm::fabs(hkl[0] - rounded[0]),
        libm::fabs(hkl[1] - rounded[1]),
        libm::fabs(hkl[2] - rounded[2]),
    ];
    IndexedSpot {
        index,
        xyz,
        hkl,
        hkl_rounded: rounded.map(|v| v as i32),
        distances,
        indexed: distances.iter().all(|&d| d <= tolerance),
    }
}

fn invert(ub: &UbMatrix) -> Option<Mat3> {
    let inverse = ub.to_mat3().inverse();
    if inverse.is_none() {
        warn!("UB matrix is singular, no spots can be indexed");
    }
    inverse
}

/// Percentage rounded to two decimals; 0 when `total` is 0.
pub fn indexing_rate(indexed: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    libm::round(indexed as f64 / total as f64 * 100.0 * 100.0) / 100.0
}

/// Classify every peak as indexed or not.
pub fn index_spots(peaks: &[PeakRecord], ub: &UbMatrix, tolerance: f64) -> IndexingSummary {
    let total_count = peaks.len();
    let Some(inverse) = invert(ub) else {
        return IndexingSummary::unindexed(total_count);
    };

    let spots: Vec<IndexedSpot> = peaks
        .iter()
        .enumerate()
        .map(|(i, p)| locate(&inverse, i, [p.x, p.y, p.z], tolerance))
        .collect();
    let indexed_count = spots.iter().filter(|s| s.indexed).count();
    debug!(indexed_count, total_count, tolerance, "indexed spots");

    IndexingSummary {
        indexed_count,
        total_count,
        spots,
        indexing_rate_percent: indexing_rate(indexed_count, total_count),
    }
}

/// Set `indexed` and `hkl` on every peak.
///
/// Returns the number of indexed peaks, or `None` (leaving the peaks
/// untouched) if the matrix is singular.
pub fn annotate_peaks(peaks: &mut [PeakRecord], ub: &UbMatrix, tolerance: f64) -> Option<usize> {
    let inverse = invert(ub)?;
    let mut indexed = 0;
    for (i, peak) in peaks.iter_mut().enumerate() {
        let spot = locate(&inverse, i, [peak.x, peak.y, peak.z], tolerance);
        peak.indexed = Some(spot.indexed);
        peak.hkl = Some(spot.hkl);
        indexed += spot.indexed as usize;
    }
    Some(indexed)
}
