//! Little-endian byte conversion for rodhypix and peak-table data.
//!
//! Both file formats store every binary field little-endian regardless of the
//! host. The plain `read_*` functions read from the start of a slice and panic
//! on short input like slice indexing does; the `*_at` variants take an
//! absolute offset and report a short buffer as [`Error::TruncatedHeader`].

use crate::error::{ensure_len, Result};

/// Read a little-endian `i16` from the first 2 bytes of the slice.
#[inline]
pub fn read_i16_le(buf: &[u8]) -> i16 {
    i16::from_le_bytes([buf[0], buf[1]])
}

/// Read a little-endian `u16` from the first 2 bytes of the slice.
#[inline]
pub fn read_u16_le(buf: &[u8]) -> u16 {
    u16::from_le_bytes([buf[0], buf[1]])
}

/// Read a little-endian `i32` from the first 4 bytes of the slice.
#[inline]
pub fn read_i32_le(buf: &[u8]) -> i32 {
    i32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]])
}

/// Read a little-endian `u32` from the first 4 bytes of the slice.
#[inline]
pub fn read_u32_le(buf: &[u8]) -> u32 {
    u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]])
}

/// Read a little-endian `i64` from the first 8 bytes of the slice.
#[inline]
pub fn read_i64_le(buf: &[u8]) -> i64 {
    i64::from_le_bytes([
        buf[0], buf[1], buf[2], buf[3], buf[4], buf[5], buf[6], buf[7],
    ])
}

/// Read a little-endian `u64` from the first 8 bytes of the slice.
#[inline]
pub fn read_u64_le(buf: &[u8]) -> u64 {
    u64::from_le_bytes([
        buf[0], buf[1], buf[2], buf[3], buf[4], buf[5], buf[6], buf[7],
    ])
}

/// Read a little-endian `f64` (IEEE 754) from the first 8 bytes of the slice.
#[inline]
pub fn read_f64_le(buf: &[u8]) -> f64 {
    f64::from_le_bytes([
        buf[0], buf[1], buf[2], buf[3], buf[4], buf[5], buf[6], buf[7],
    ])
}

// --- Bounds-checked reads at an absolute offset ---

/// Read a little-endian `u16` at `offset`.
pub fn u16_at(buf: &[u8], offset: usize) -> Result<u16> {
    ensure_len(buf, offset + 2)?;
    Ok(read_u16_le(&buf[offset..]))
}

/// Read a little-endian `i16` at `offset`.
pub fn i16_at(buf: &[u8], offset: usize) -> Result<i16> {
    ensure_len(buf, offset + 2)?;
    Ok(read_i16_le(&buf[offset..]))
}

/// Read a little-endian `i32` at `offset`.
pub fn i32_at(buf: &[u8], offset: usize) -> Result<i32> {
    ensure_len(buf, offset + 4)?;
    Ok(read_i32_le(&buf[offset..]))
}

/// Read a little-endian `f64` at `offset`.
pub fn f64_at(buf: &[u8], offset: usize) -> Result<f64> {
    ensure_len(buf, offset + 8)?;
    Ok(read_f64_le(&buf[offset..]))
}

// --- Single-value writes ---

/// Write an `i16` in little-endian format into the first 2 bytes of the slice.
#[inline]
pub fn write_i16_le(buf: &mut [u8], val: i16) {
    buf[..2].copy_from_slice(&val.to_le_bytes());
}

/// Write a `u16` in little-endian format into the first 2 bytes of the slice.
#[inline]
pub fn write_u16_le(buf: &mut [u8], val: u16) {
    buf[..2].copy_from_slice(&val.to_le_bytes());
}

/// Write an `i32` in little-endian format into the first 4 bytes of the slice.
#[inline]
pub fn write_i32_le(buf: &mut [u8], val: i32) {
    buf[..4].copy_from_slice(&val.to_le_bytes());
}

/// Write a `u32` in little-endian format into the first 4 bytes of the slice.
#[inline]
pub fn write_u32_le(buf: &mut [u8], val: u32) {
    buf[..4].copy_from_slice(&val.to_le_bytes());
}

/// Write an `f64` in little-endian format into the first 8 bytes of the slice.
#[inline]
pub fn write_f64_le(buf: &mut [u8], val: f64) {
    buf[..8].copy_from_slice(&val.to_le_bytes());
}

// --- Bulk conversions ---

/// Convert a byte buffer of native-endian `i32` values to little-endian in place.
///
/// A no-op on little-endian hosts. The buffer length must be a multiple of 4.
pub fn buf_i32_native_to_le(buf: &mut [u8]) {
    if cfg!(target_endian = "big") {
        for chunk in buf.chunks_exact_mut(4) {
            chunk.reverse();
        }
    }
}
