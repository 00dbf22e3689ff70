//! Whole-file rodhypix reading and writing, plus pixel access on decoded images.

use alloc::vec::Vec;

use bytemuck::pod_collect_to_vec;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::endian::buf_i32_native_to_le;
use crate::error::{Error, Result};
use crate::header::{parse_header, serialize_header, RodHeader, REQUIRED_HEADER_LEN};
use crate::ty6::{decode_image, encode_image, DecodedImage};

/// A parsed header together with its decoded pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RodImage {
    pub header: RodHeader,
    pub image: DecodedImage,
}

/// Parse and decode a complete rodhypix file.
pub fn read_rodhypix(data: &[u8]) -> Result<RodImage> {
    let header = parse_header(data)?;
    let image = decode_image(data, &header)?;
    info!(
        nx = image.nx,
        ny = image.ny,
        zero_filled = image.zero_filled_rows.len(),
        "decoded rodhypix image"
    );
    Ok(RodImage { header, image })
}

/// Read and decode a rodhypix file from disk.
#[cfg(feature = "std")]
pub fn read_rodhypix_file<P: AsRef<std::path::Path>>(path: P) -> Result<RodImage> {
    let data = std::fs::read(path)?;
    read_rodhypix(&data)
}

/// Build a complete rodhypix file from a header and row-major pixels.
///
/// The pixel count must match `header.nx * header.ny`, the header must
/// carry the TY6 compression tag, and `nheader` must leave room for the
/// binary header.
pub fn build_rodhypix(header: &RodHeader, pixels: &[i32]) -> Result<Vec<u8>> {
    if !header.is_ty6() {
        return Err(Error::UnsupportedCompression(header.compression.clone()));
    }
    if header.nheader < REQUIRED_HEADER_LEN {
        return Err(Error::InvalidFormat("NHEADER is shorter than the binary header"));
    }
    if header.pixel_count() != Some(pixels.len()) {
        return Err(Error::InvalidFormat("pixel count does not match dimensions"));
    }
    let mut out = serialize_header(header)?;
    out.truncate(header.nheader);
    out.resize(header.nheader, 0);
    out.extend_from_slice(&encode_image(pixels, header.nx, header.ny)?);
    Ok(out)
}

impl DecodedImage {
    /// Pixel at column `x`, row `y`.
    pub fn get(&self, x: usize, y: usize) -> Option<i32> {
        if x >= self.nx || y >= self.ny {
            return None;
        }
        self.data.get(y * self.nx + x).copied()
    }

    /// One image row.
    pub fn row(&self, y: usize) -> Option<&[i32]> {
        if y >= self.ny {
            return None;
        }
        self.data.get(y * self.nx..(y + 1) * self.nx)
    }

    /// Iterate over rows from top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[i32]> {
        // chunks_exact panics on zero.
        self.data.chunks_exact(self.nx.max(1)).take(self.ny)
    }

    /// Smallest and largest intensity, or `None` for an empty image.
    pub fn min_max(&self) -> Option<(i32, i32)> {
        let first = *self.data.first()?;
        Some(
            self.data
                .iter()
                .fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v))),
        )
    }

    /// Pixels as little-endian `i32` bytes, row-major.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut buf: Vec<u8> = pod_collect_to_vec(&self.data);
        buf_i32_native_to_le(&mut buf);
        buf
    }

    /// Copy the pixels into an `(ny, nx)` array.
    #[cfg(feature = "array")]
    pub fn to_array(&self) -> Result<ndarray::Array2<i32>> {
        ndarray::Array2::from_shape_vec((self.ny, self.nx), self.data.clone())
            .map_err(|_| Error::InvalidFormat("pixel count does not match dimensions"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn ramp(nx: usize, ny: usize) -> Vec<i32> {
        (0..nx * ny).map(|i| (i as i32 * 37) % 1000 - 200).collect()
    }

    #[test]
    fn build_then_read() {
        let header = RodHeader::new(20, 3);
        let pixels = ramp(20, 3);
        let file = build_rodhypix(&header, &pixels).unwrap();
        let rod = read_rodhypix(&file).unwrap();
        assert_eq!(rod.header.nx, 20);
        assert_eq!(rod.image.data, pixels);
        assert!(rod.image.zero_filled_rows.is_empty());
    }

    #[test]
    fn build_rejects_wrong_pixel_count() {
        let header = RodHeader::new(4, 4);
        assert!(matches!(
            build_rodhypix(&header, &[0; 15]),
            Err(Error::InvalidFormat(_))
        ));
    }

    #[test]
    fn build_rejects_short_nheader() {
        let mut header = RodHeader::new(2, 2);
        header.nheader = 1024;
        assert!(matches!(
            build_rodhypix(&header, &[0; 4]),
            Err(Error::InvalidFormat(_))
        ));
    }

    #[test]
    fn pixel_access() {
        let image = DecodedImage {
            nx: 3,
            ny: 2,
            data: vec![1, 2, 3, 4, 5, -6],
            zero_filled_rows: vec![],
        };
        assert_eq!(image.get(2, 1), Some(-6));
        assert_eq!(image.get(3, 0), None);
        assert_eq!(image.get(0, 2), None);
        assert_eq!(image.row(1), Some(&[4, 5, -6][..]));
        assert_eq!(image.row(2), None);
        assert_eq!(image.rows().count(), 2);
        assert_eq!(image.min_max(), Some((-6, 5)));
    }

    #[test]
    fn empty_image_has_no_range() {
        let image = DecodedImage {
            nx: 0,
            ny: 0,
            data: vec![],
            zero_filled_rows: vec![],
        };
        assert_eq!(image.min_max(), None);
        assert_eq!(image.rows().count(), 0);
    }

    #[test]
    fn le_bytes() {
        let image = DecodedImage {
            nx: 2,
            ny: 1,
            data: vec![1, -2],
            zero_filled_rows: vec![],
        };
        assert_eq!(image.to_le_bytes(), vec![1, 0, 0, 0, 0xFE, 0xFF, 0xFF, 0xFF]);
    }

    #[cfg(feature = "array")]
    #[test]
    fn array_shape_is_rows_by_columns() {
        let image = DecodedImage {
            nx: 3,
            ny: 2,
            data: vec![1, 2, 3, 4, 5, 6],
            zero_filled_rows: vec![],
        };
        let arr = image.to_array().unwrap();
        assert_eq!(arr.shape(), &[2, 3]);
        assert_eq!(arr[[1, 0]], 4);
    }
}
