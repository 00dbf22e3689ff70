#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod cell;
pub mod contract;
pub mod crysalis;
pub mod endian;
pub mod error;
pub mod header;
pub mod image;
pub mod indexing;
pub mod matrix;
pub mod peaks;
pub mod ty6;

pub use cell::{ub_to_cell, CellParameters, UbMatrix, DEFAULT_WAVELENGTH};
pub use error::{Error, Result};
pub use header::{parse_header, RodHeader};
pub use image::{read_rodhypix, RodImage};
pub use indexing::{annotate_peaks, index_spots, IndexingSummary, DEFAULT_TOLERANCE};
pub use peaks::{parse_peak_table, PeakRecord, PeakTable};
pub use ty6::{decode_image, decode_line, DecodedImage};

#[cfg(feature = "std")]
pub use image::read_rodhypix_file;
#[cfg(feature = "std")]
pub use peaks::read_peak_table_file;
