//! TY6 row compression used by rodhypix images.
//!
//! Each image row is stored as its own byte stream. The first pixel is an
//! absolute value, then pixels are delta-coded in blocks of 16 (two halves of
//! [`BLOCKSIZE`] values, each bit-packed at its own width), and the last
//! `(width - 1) % 16` pixels are stored one byte per delta. Values that do not
//! fit are escaped to a trailing 16- or 32-bit little-endian payload.
//!
//! The compressed region of a file is a little-endian `i32` byte count, the
//! concatenated row streams, and one little-endian `u32` start offset per row.

use alloc::vec;
use alloc::vec::Vec;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::endian::{read_i16_le, read_i32_le, read_u32_le, write_i32_le, write_u32_le};
use crate::error::{ensure_len, Error, Result};
use crate::header::RodHeader;

/// Number of pixels in one bit-packed half block.
pub const BLOCKSIZE: usize = 8;
/// Escape byte announcing a 16-bit payload.
pub const SHORT_OVERFLOW: u8 = 254;
/// Escape byte announcing a 32-bit payload.
pub const LONG_OVERFLOW: u8 = 255;

/// Bias of single-byte values.
const BYTE_BIAS: i32 = 127;
/// Packed block values at or above these are escapes.
const SHORT_OVERFLOW_SIGNED: i32 = SHORT_OVERFLOW as i32 - BYTE_BIAS;
const LONG_OVERFLOW_SIGNED: i32 = LONG_OVERFLOW as i32 - BYTE_BIAS;

const MAX_NBIT: u32 = 15;

/// A decompressed image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedImage {
    pub nx: usize,
    pub ny: usize,
    /// Row-major intensities, `nx * ny` long.
    pub data: Vec<i32>,
    /// Rows that could not be located in the compressed stream and were left at zero.
    pub zero_filled_rows: Vec<usize>,
}

// ---------------------------------------------------------------------------
// Row decoding
// ---------------------------------------------------------------------------

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
    exhausted: bool,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Cursor {
            buf,
            pos: 0,
            exhausted: false,
        }
    }

    fn byte(&mut self) -> Option<u8> {
        let b = self.buf.get(self.pos).copied();
        match b {
            Some(_) => self.pos += 1,
            None => self.exhausted = true,
        }
        b
    }

    fn i16(&mut self) -> Option<i16> {
        if self.pos + 2 > self.buf.len() {
            self.exhausted = true;
            return None;
        }
        let v = read_i16_le(&self.buf[self.pos..]);
        self.pos += 2;
        Some(v)
    }

    fn i32(&mut self) -> Option<i32> {
        if self.pos + 4 > self.buf.len() {
            self.exhausted = true;
            return None;
        }
        let v = read_i32_le(&self.buf[self.pos..]);
        self.pos += 4;
        Some(v)
    }

    /// Read up to `n` bytes as a little-endian integer; missing bytes read as zero.
    fn packed(&mut self, n: usize) -> u128 {
        let mut v = 0u128;
        for j in 0..n {
            match self.byte() {
                Some(b) => v |= (b as u128) << (8 * j),
                None => break,
            }
        }
        v
    }

    /// A single-byte value with its optional escape payload. `None` when the
    /// escape payload is missing.
    fn escaped(&mut self, b: u8) -> Option<i32> {
        match b {
            LONG_OVERFLOW => self.i32(),
            SHORT_OVERFLOW => self.i16().map(i32::from),
            _ => Some(b as i32 - BYTE_BIAS),
        }
    }
}

fn zero_offset(nbit: u32) -> i32 {
    if nbit > 1 {
        (1 << (nbit - 1)) - 1
    } else {
        0
    }
}

/// Decode one compressed row of `width` pixels.
///
/// `bytes` may extend past the end of the row. If the stream runs out early
/// the rest of the row is left at zero.
pub fn decode_line(bytes: &[u8], width: usize) -> Vec<i32> {
    let mut out = vec![0i32; width];
    if width == 0 {
        return out;
    }
    let mut cur = Cursor::new(bytes);

    let nblock = (width - 1) / (2 * BLOCKSIZE);
    let nrest = (width - 1) % (2 * BLOCKSIZE);

    let Some(first) = cur.byte() else {
        warn!(width, "TY6 row stream is empty");
        return out;
    };
    if let Some(v) = cur.escaped(first) {
        out[0] = v;
    }
    let mut opos = 1;

    for _ in 0..nblock {
        let Some(control) = cur.byte() else {
            break;
        };
        for nbit in [(control & 0x0f) as u32, (control >> 4) as u32] {
            let z = zero_offset(nbit);
            let mask = (1u128 << nbit) - 1;
            let v = cur.packed(nbit as usize);
            for j in 0..BLOCKSIZE {
                out[opos] = ((v >> (nbit as usize * j)) & mask) as i32 - z;
                opos += 1;
            }
        }

        for i in opos - 2 * BLOCKSIZE..opos {
            let raw = out[i];
            let delta = if raw >= LONG_OVERFLOW_SIGNED {
                cur.i32().unwrap_or(raw)
            } else if raw >= SHORT_OVERFLOW_SIGNED {
                cur.i16().map_or(raw, i32::from)
            } else {
                raw
            };
            out[i] = out[i - 1].wrapping_add(delta);
        }
    }

    for _ in 0..nrest {
        let Some(b) = cur.byte() else {
            break;
        };
        if let Some(delta) = cur.escaped(b) {
            out[opos] = out[opos - 1].wrapping_add(delta);
        }
        opos += 1;
    }

    if cur.exhausted {
        warn!(width, decoded = opos, "TY6 row stream ended early");
    }
    out
}

// ---------------------------------------------------------------------------
// Image decoding
// ---------------------------------------------------------------------------

/// Decode the compressed region of a rodhypix file described by `header`.
pub fn decode_image(data: &[u8], header: &RodHeader) -> Result<DecodedImage> {
    if !header.is_ty6() {
        return Err(Error::UnsupportedCompression(header.compression.clone()));
    }
    let (nx, ny) = (header.nx, header.ny);
    let start = header.nheader;

    ensure_len(data, start + 4)?;
    let field_size = read_i32_le(&data[start..]);
    if field_size < 0 {
        return Err(Error::TruncatedHeader {
            needed: start + 4,
            available: data.len(),
        });
    }
    let field_size = field_size as usize;
    debug!(nx, ny, offset = start, field_size, "decoding TY6 image");

    let line_start = start + 4;
    let line_end = line_start.saturating_add(field_size).min(data.len());
    let line_data = &data[line_start.min(line_end)..line_end];
    if line_data.len() < field_size {
        warn!(
            declared = field_size,
            available = line_data.len(),
            "compressed line data is shorter than declared"
        );
    }

    let table_start = line_start.saturating_add(field_size);
    let table = data.get(table_start..).unwrap_or(&[]);

    let count = header
        .pixel_count()
        .ok_or(Error::InvalidFormat("image dimensions overflow"))?;
    let mut pixels = Vec::with_capacity(count);
    let mut zero_filled_rows = Vec::new();
    for row in 0..ny {
        let offset = table
            .get(4 * row..4 * row + 4)
            .map(|entry| read_u32_le(entry) as usize);
        match offset {
            Some(offset) if offset < line_data.len() => {
                pixels.extend_from_slice(&decode_line(&line_data[offset..], nx));
            }
            Some(offset) => {
                warn!(row, offset, "row offset is past the compressed data, zero-filling");
                pixels.resize(pixels.len() + nx, 0);
                zero_filled_rows.push(row);
            }
            None => {
                warn!(row, "row offset table is truncated, zero-filling");
                pixels.resize(pixels.len() + nx, 0);
                zero_filled_rows.push(row);
            }
        }
    }

    Ok(DecodedImage {
        nx,
        ny,
        data: pixels,
        zero_filled_rows,
    })
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Byte-escaped value as written for the first and remainder pixels.
fn push_escaped(out: &mut Vec<u8>, v: i32) {
    if (-BYTE_BIAS..SHORT_OVERFLOW_SIGNED).contains(&v) {
        out.push((v + BYTE_BIAS) as u8);
    } else if let Ok(short) = i16::try_from(v) {
        out.push(SHORT_OVERFLOW);
        out.extend_from_slice(&short.to_le_bytes());
    } else {
        out.push(LONG_OVERFLOW);
        out.extend_from_slice(&v.to_le_bytes());
    }
}

fn fits_width(nbit: u32, p: i32) -> bool {
    let z = zero_offset(nbit);
    p >= -z && p <= (1 << nbit) - 1 - z
}

/// Encode one row so that [`decode_line`] restores it exactly.
pub fn encode_line(pixels: &[i32]) -> Vec<u8> {
    let mut out = Vec::new();
    let Some(&first) = pixels.first() else {
        return out;
    };
    push_escaped(&mut out, first);

    let width = pixels.len();
    let nblock = (width - 1) / (2 * BLOCKSIZE);
    let min_packed = -zero_offset(MAX_NBIT);

    let mut pos = 1;
    for _ in 0..nblock {
        // Packed value per pixel plus the escape payloads that follow the block.
        let mut packed = [0i32; 2 * BLOCKSIZE];
        let mut payload = Vec::new();
        for (k, p) in packed.iter_mut().enumerate() {
            let i = pos + k;
            let delta = pixels[i].wrapping_sub(pixels[i - 1]);
            *p = if (min_packed..SHORT_OVERFLOW_SIGNED).contains(&delta) {
                delta
            } else if let Ok(short) = i16::try_from(delta) {
                payload.extend_from_slice(&short.to_le_bytes());
                SHORT_OVERFLOW_SIGNED
            } else {
                payload.extend_from_slice(&delta.to_le_bytes());
                LONG_OVERFLOW_SIGNED
            };
        }

        let mut nbits = [0u32; 2];
        for (half, nbit) in nbits.iter_mut().enumerate() {
            let values = &packed[half * BLOCKSIZE..(half + 1) * BLOCKSIZE];
            *nbit = (0..=MAX_NBIT)
                .find(|&n| values.iter().all(|&p| fits_width(n, p)))
                .unwrap_or(MAX_NBIT);
        }
        out.push((nbits[0] | (nbits[1] << 4)) as u8);

        for (half, &nbit) in nbits.iter().enumerate() {
            let z = zero_offset(nbit);
            let mut v = 0u128;
            for (j, &p) in packed[half * BLOCKSIZE..(half + 1) * BLOCKSIZE]
                .iter()
                .enumerate()
            {
                v |= ((p + z) as u128) << (nbit as usize * j);
            }
            out.extend_from_slice(&v.to_le_bytes()[..nbit as usize]);
        }
        out.extend_from_slice(&payload);
        pos += 2 * BLOCKSIZE;
    }

    for i in pos..width {
        push_escaped(&mut out, pixels[i].wrapping_sub(pixels[i - 1]));
    }
    out
}

/// Encode a row-major `nx * ny` image into a complete compressed region:
/// size word, row streams, then the row offset table.
pub fn encode_image(pixels: &[i32], nx: usize, ny: usize) -> Result<Vec<u8>> {
    if nx.checked_mul(ny) != Some(pixels.len()) {
        return Err(Error::InvalidFormat("pixel count does not match dimensions"));
    }

    let mut line_data = Vec::new();
    let mut offsets = Vec::with_capacity(ny);
    if nx > 0 {
        for row in pixels.chunks_exact(nx) {
            offsets.push(line_data.len() as u32);
            line_data.extend_from_slice(&encode_line(row));
        }
    }
    offsets.resize(ny, line_data.len() as u32);

    let field_size = i32::try_from(line_data.len())
        .map_err(|_| Error::InvalidFormat("compressed image exceeds 2 GiB"))?;

    let mut out = vec![0u8; 4 + line_data.len() + 4 * ny];
    write_i32_le(&mut out, field_size);
    out[4..4 + line_data.len()].copy_from_slice(&line_data);
    let table = &mut out[4 + line_data.len()..];
    for (row, offset) in offsets.iter().enumerate() {
        write_u32_le(&mut table[4 * row..], *offset);
    }
    Ok(out)
}
