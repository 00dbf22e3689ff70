//! Reduced-cell extraction from CrysAlis `crystal.ini` experiment files.
//!
//! ```text
//! reduced cell plus vol=7.2218583  8.5410638 8.5902173 107.6582105 91.8679754 90.9411566 504.4382028
//! ```

use alloc::vec::Vec;

use tracing::{debug, warn};

use crate::cell::CellParameters;

const REDUCED_CELL_PREFIX: &str = "reduced cell plus vol=";
const LATTICE_CONSTANTS_PREFIX: &str = "constants plus vol";
const LATTICE_SECTION: &str = "[Lattice]";

/// Cell from the numbers after `=`: six parameters and an optional volume.
fn parse_cell_line(line: &str) -> Option<CellParameters> {
    let (_, values) = line.split_once('=')?;
    let numbers: Vec<f64> = values
        .split_whitespace()
        .map_while(|tok| tok.parse::<f64>().ok())
        .collect();
    if numbers.len() < 6 {
        warn!(found = numbers.len(), line, "cell line has fewer than six numbers");
        return None;
    }
    let mut cell = CellParameters::new(
        numbers[0], numbers[1], numbers[2], numbers[3], numbers[4], numbers[5],
    );
    if let Some(&volume) = numbers.get(6) {
        cell.volume = volume;
    }
    Some(cell)
}

/// Reduced cell from the text of a `crystal.ini` file.
///
/// The last `reduced cell plus vol=` line wins. Without one, the
/// `constants plus vol` line of the `[Lattice]` section is used.
pub fn parse_reduced_cell(text: &str) -> Option<CellParameters> {
    let mut reduced = None;
    let mut lattice = None;
    let mut in_lattice = false;

    for line in text.lines().map(str::trim) {
        if line.starts_with(REDUCED_CELL_PREFIX) {
            if let Some(cell) = parse_cell_line(line) {
                reduced = Some(cell);
            }
        }
        if line == LATTICE_SECTION {
            in_lattice = true;
            continue;
        }
        if line.starts_with('[') {
            in_lattice = false;
        }
        if in_lattice && line.starts_with(LATTICE_CONSTANTS_PREFIX) {
            if let Some(cell) = parse_cell_line(line) {
                lattice = Some(cell);
            }
        }
    }

    match (reduced, lattice) {
        (Some(cell), _) => {
            debug!(?cell, "reduced cell from crystal.ini");
            Some(cell)
        }
        (None, Some(cell)) => {
            debug!(?cell, "reduced cell missing, using [Lattice] constants");
            Some(cell)
        }
        (None, None) => None,
    }
}
