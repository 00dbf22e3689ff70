//! rodhypix header parsing and writing.
//!
//! A rodhypix file opens with a 256-byte ASCII header followed by fixed-size
//! binary sections (general, special, KM4 goniometer, statistics, history)
//! that together fill the first [`DEFAULT_NHEADER`] bytes. The compressed
//! pixel payload starts at the `NHEADER` offset declared in the text header.

use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::endian::{
    f64_at, i16_at, i32_at, u16_at, write_f64_le, write_i16_le, write_i32_le, write_u16_le,
};
use crate::error::{ensure_len, Error, Result};

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

/// Length of the ASCII text header.
pub const TEXT_HEADER_LEN: usize = 256;
/// Header size, and the payload offset used when the text header omits `NHEADER`.
pub const DEFAULT_NHEADER: usize = 5120;

const BINARY_BASE: usize = TEXT_HEADER_LEN;
const GENERAL_NBYTES: usize = 512;
const SPECIAL_NBYTES: usize = 768;

const BINNING_OFFSET: usize = BINARY_BASE + 24;
const DIMENSIONS_OFFSET: usize = BINARY_BASE + 32;
const GAIN_OFFSET: usize = BINARY_BASE + 48;
const COMPRESSION_CODE_OFFSET: usize = BINARY_BASE + 88;
const PIXEL_SIZE_OFFSET: usize = BINARY_BASE + GENERAL_NBYTES + 568;
const DETECTOR_TYPE_OFFSET: usize = BINARY_BASE + GENERAL_NBYTES + 548;
const BEAM_CENTER_OFFSET: usize = BINARY_BASE + GENERAL_NBYTES + SPECIAL_NBYTES + 664;
const DISTANCE_OFFSET: usize = BINARY_BASE + GENERAL_NBYTES + SPECIAL_NBYTES + 712;

/// Smallest buffer that holds every unconditional header field.
pub const REQUIRED_HEADER_LEN: usize = DISTANCE_OFFSET + 8;

/// Binary image dimensions above this are treated as garbage.
const MAX_SANE_DIMENSION: i32 = 10_000;

/// Detector types that carry the multi-panel ("Arc") camera block.
const ARC_DETECTOR_TYPES: [i32; 2] = [12, 14];
/// Absolute offset of the six `i16` Arc camera parameters.
const ARC_BLOCK_OFFSET: usize = DEFAULT_NHEADER + 268;
const ARC_PANEL_WIDTH: i16 = 385;
const ARC_PANEL_HEIGHT: i16 = 775;
const ARC_GAP_X: i16 = 30;
const ARC_GAP_Y: i16 = 0;

/// Binary compression code for TY6.
pub const TY6_COMPRESSION_CODE: i32 = 6;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Panel geometry of a multi-panel (Arc) detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelLayout {
    /// Number of panels side by side (2 or 3).
    pub count: usize,
    /// Width of one panel in pixels.
    pub panel_width: usize,
    /// Height of one panel in pixels.
    pub panel_height: usize,
    /// Horizontal gap between panels in pixels.
    pub gap_x: usize,
}

impl PanelLayout {
    /// Total image width including the gaps between panels.
    pub fn total_width(&self) -> usize {
        self.count * self.panel_width + self.count.saturating_sub(1) * self.gap_x
    }
}

/// Parsed rodhypix header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RodHeader {
    /// Format version token from the `OD SAPPHIRE` line.
    pub version: String,
    /// Compression tag from the `COMPRESSION=` line, trimmed.
    pub compression: String,
    /// `KEY=value` integer definitions found on text lines 2-4.
    pub definitions: BTreeMap<String, i64>,
    /// Acquisition timestamp from the `TIME=` line.
    pub time: Option<String>,
    /// Byte offset of the compressed payload.
    pub nheader: usize,
    pub bin_x: u16,
    pub bin_y: u16,
    pub chip_npx_x: i32,
    pub chip_npx_y: i32,
    /// Resolved image width in pixels.
    pub nx: usize,
    /// Resolved image height in pixels.
    pub ny: usize,
    pub gain: i32,
    pub overflow_flag: i32,
    pub overflow_after_remeasure_flag: i32,
    pub overflow_threshold: i32,
    /// Binary compression code (6 for TY6).
    pub compression_code: i32,
    /// Pixel size (x, y) in millimetres.
    pub pixel_size_mm: [f64; 2],
    pub detector_distance_mm: f64,
    /// Direct-beam position (x, y) in pixels.
    pub beam_center_px: [f64; 2],
    pub detector_type: i32,
    /// Present for multi-panel detectors whose geometry was recognised.
    pub panels: Option<PanelLayout>,
}

impl RodHeader {
    /// A single-panel TY6 header of the given size with neutral metadata.
    pub fn new(nx: usize, ny: usize) -> Self {
        let mut definitions = BTreeMap::new();
        definitions.insert(String::from("NX"), nx as i64);
        definitions.insert(String::from("NY"), ny as i64);
        definitions.insert(String::from("NHEADER"), DEFAULT_NHEADER as i64);
        RodHeader {
            version: String::from("3.0"),
            compression: String::from("TY6"),
            definitions,
            time: None,
            nheader: DEFAULT_NHEADER,
            bin_x: 1,
            bin_y: 1,
            chip_npx_x: nx as i32,
            chip_npx_y: ny as i32,
            nx,
            ny,
            gain: 1,
            overflow_flag: 0,
            overflow_after_remeasure_flag: 0,
            overflow_threshold: 0,
            compression_code: TY6_COMPRESSION_CODE,
            pixel_size_mm: [0.172, 0.172],
            detector_distance_mm: 100.0,
            beam_center_px: [nx as f64 / 2.0, ny as f64 / 2.0],
            detector_type: 0,
            panels: None,
        }
    }

    /// Look up an integer definition from the text header.
    pub fn definition(&self, key: &str) -> Option<i64> {
        self.definitions.get(key).copied()
    }

    /// Returns `true` if the compression tag names the TY6 scheme.
    pub fn is_ty6(&self) -> bool {
        self.compression.starts_with("TY6")
    }

    /// Number of pixels in the resolved image, or `None` if it overflows `usize`.
    pub fn pixel_count(&self) -> Option<usize> {
        self.nx.checked_mul(self.ny)
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

struct TextHeader {
    version: String,
    compression: String,
    definitions: BTreeMap<String, i64>,
    time: Option<String>,
}

/// Parse the rodhypix text and binary header sections.
pub fn parse_header(data: &[u8]) -> Result<RodHeader> {
    ensure_len(data, REQUIRED_HEADER_LEN)?;

    let text = parse_text_header(&data[..TEXT_HEADER_LEN])?;
    debug!(
        version = %text.version,
        compression = %text.compression,
        definitions = ?text.definitions,
        "parsed rodhypix text header"
    );

    let bin_x = u16_at(data, BINNING_OFFSET)?;
    let bin_y = u16_at(data, BINNING_OFFSET + 2)?;

    let chip_npx_x = i32_at(data, DIMENSIONS_OFFSET)?;
    let chip_npx_y = i32_at(data, DIMENSIONS_OFFSET + 4)?;
    let im_npx_x = i32_at(data, DIMENSIONS_OFFSET + 8)?;
    let im_npx_y = i32_at(data, DIMENSIONS_OFFSET + 12)?;

    let gain = i32_at(data, GAIN_OFFSET)?;
    let overflow_flag = i32_at(data, GAIN_OFFSET + 4)?;
    let overflow_after_remeasure_flag = i32_at(data, GAIN_OFFSET + 8)?;
    let overflow_threshold = i32_at(data, GAIN_OFFSET + 12)?;

    let mut compression_code = i32_at(data, COMPRESSION_CODE_OFFSET)?;
    if text.compression.starts_with("TY6") && (compression_code == 0 || compression_code > 10) {
        debug!(
            code = compression_code,
            "binary compression code disagrees with TY6 text tag, using 6"
        );
        compression_code = TY6_COMPRESSION_CODE;
    }

    let pixel_size_mm = [
        f64_at(data, PIXEL_SIZE_OFFSET)?,
        f64_at(data, PIXEL_SIZE_OFFSET + 8)?,
    ];
    let detector_type = i32_at(data, DETECTOR_TYPE_OFFSET)?;
    let beam_center_px = [
        f64_at(data, BEAM_CENTER_OFFSET)?,
        f64_at(data, BEAM_CENTER_OFFSET + 8)?,
    ];
    let detector_distance_mm = f64_at(data, DISTANCE_OFFSET)?;

    let (mut nx, mut ny) = resolve_dimensions(im_npx_x, im_npx_y, &text.definitions)?;

    let mut panels = None;
    if ARC_DETECTOR_TYPES.contains(&detector_type) {
        debug!(detector_type, "multi-panel detector, reading Arc camera block");
        if let Some(layout) = parse_arc_block(data)? {
            nx = layout.total_width();
            ny = layout.panel_height;
            info!(
                panels = layout.count,
                nx, ny, "multi-panel image dimensions"
            );
            panels = Some(layout);
        }
    }

    let nheader = match text.definitions.get("NHEADER") {
        Some(&n) if n > 0 => n as usize,
        _ => DEFAULT_NHEADER,
    };

    Ok(RodHeader {
        version: text.version,
        compression: text.compression,
        definitions: text.definitions,
        time: text.time,
        nheader,
        bin_x,
        bin_y,
        chip_npx_x,
        chip_npx_y,
        nx,
        ny,
        gain,
        overflow_flag,
        overflow_after_remeasure_flag,
        overflow_threshold,
        compression_code,
        pixel_size_mm,
        detector_distance_mm,
        beam_center_px,
        detector_type,
        panels,
    })
}

fn parse_text_header(bytes: &[u8]) -> Result<TextHeader> {
    // Latin-1 decode; NUL padding is dropped.
    let text: String = bytes
        .iter()
        .filter(|&&b| b != 0)
        .map(|&b| b as char)
        .collect();
    let lines: Vec<&str> = text.split('\n').collect();

    let mut tokens = lines[0].split_whitespace();
    let version = match (tokens.next(), tokens.next(), tokens.last()) {
        (Some("OD"), Some("SAPPHIRE"), Some(version)) => String::from(version),
        _ => return Err(Error::InvalidFormat("missing OD SAPPHIRE signature")),
    };

    let compression = lines
        .get(1)
        .and_then(|line| line.split_once('='))
        .filter(|(key, _)| key.trim() == "COMPRESSION")
        .map(|(_, tag)| String::from(tag.trim()))
        .ok_or(Error::InvalidFormat("missing COMPRESSION line"))?;

    let mut definitions = BTreeMap::new();
    for line in lines.iter().skip(2).take(3) {
        scan_definitions(line, &mut definitions);
    }

    let time = lines
        .get(5)
        .and_then(|line| line.rsplit_once("TIME="))
        .map(|(_, stamp)| {
            let cleaned: String = stamp.chars().filter(|c| !c.is_control()).collect();
            String::from(cleaned.trim())
        });

    Ok(TextHeader {
        version,
        compression,
        definitions,
        time,
    })
}

/// Collect every `[A-Z]+=[ 0-9]+` definition on a text header line.
fn scan_definitions(line: &str, out: &mut BTreeMap<String, i64>) {
    let bytes = line.as_bytes();
    for (eq, _) in line.match_indices('=') {
        let key_start = bytes[..eq]
            .iter()
            .rposition(|b| !b.is_ascii_uppercase())
            .map_or(0, |i| i + 1);
        if key_start == eq {
            continue;
        }
        let value_end = bytes[eq + 1..]
            .iter()
            .position(|&b| b != b' ' && !b.is_ascii_digit())
            .map_or(bytes.len(), |i| eq + 1 + i);
        let value = &line[eq + 1..value_end];
        if let Some(Ok(v)) = value.split_whitespace().next().map(str::parse::<i64>) {
            out.insert(String::from(&line[key_start..eq]), v);
        }
    }
}

fn resolve_dimensions(
    im_npx_x: i32,
    im_npx_y: i32,
    definitions: &BTreeMap<String, i64>,
) -> Result<(usize, usize)> {
    let sane = |v: i32| v > 0 && v <= MAX_SANE_DIMENSION;
    if sane(im_npx_x) && sane(im_npx_y) {
        return Ok((im_npx_x as usize, im_npx_y as usize));
    }

    warn!(
        im_npx_x,
        im_npx_y, "binary header dimensions look incorrect, using text header NX/NY"
    );
    let sane_text = |v: i64| v > 0 && v <= i64::from(MAX_SANE_DIMENSION);
    match (definitions.get("NX"), definitions.get("NY")) {
        (Some(&nx), Some(&ny)) if sane_text(nx) && sane_text(ny) => {
            Ok((nx as usize, ny as usize))
        }
        _ => Err(Error::InvalidFormat("image dimensions unavailable")),
    }
}

fn parse_arc_block(data: &[u8]) -> Result<Option<PanelLayout>> {
    let field = |i: usize| i16_at(data, ARC_BLOCK_OFFSET + 2 * i);
    let (ix, iy, nx, ny, gap_x, gap_y) = (
        field(0)?,
        field(1)?,
        field(2)?,
        field(3)?,
        field(4)?,
        field(5)?,
    );
    debug!(ix, iy, nx, ny, gap_x, gap_y, "Arc camera parameters");

    if ix != 2 && ix != 3 {
        warn!(ix, "unexpected Arc panel count, keeping single-panel dimensions");
        return Ok(None);
    }
    if ny != ARC_PANEL_HEIGHT || nx != ARC_PANEL_WIDTH || gap_x != ARC_GAP_X || gap_y != ARC_GAP_Y
    {
        warn!(
            nx,
            ny, gap_x, gap_y, "unexpected Arc panel geometry, keeping single-panel dimensions"
        );
        return Ok(None);
    }

    Ok(Some(PanelLayout {
        count: ix as usize,
        panel_width: nx as usize,
        panel_height: ny as usize,
        gap_x: gap_x as usize,
    }))
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Serialize a header into the byte block that precedes the compressed payload.
///
/// The block is `header.nheader` bytes long. Multi-panel headers also need
/// room for the Arc camera block, so they require `nheader` past it.
pub fn serialize_header(header: &RodHeader) -> Result<Vec<u8>> {
    let mut len = header.nheader.max(REQUIRED_HEADER_LEN);
    if header.panels.is_some() {
        if header.nheader < ARC_BLOCK_OFFSET + 12 {
            return Err(Error::InvalidFormat(
                "multi-panel header needs NHEADER past the Arc camera block",
            ));
        }
        len = len.max(ARC_BLOCK_OFFSET + 12);
    }
    let mut buf = vec![0u8; len];

    let text = format_text_header(header);
    let text_len = text.len().min(TEXT_HEADER_LEN);
    buf[..text_len].copy_from_slice(&text.as_bytes()[..text_len]);

    write_u16_le(&mut buf[BINNING_OFFSET..], header.bin_x);
    write_u16_le(&mut buf[BINNING_OFFSET + 2..], header.bin_y);

    let (im_x, im_y) = match header.panels {
        Some(_) => (header.chip_npx_x, header.chip_npx_y),
        None => (header.nx as i32, header.ny as i32),
    };
    let dims = [header.chip_npx_x, header.chip_npx_y, im_x, im_y];
    for (i, v) in dims.iter().enumerate() {
        write_i32_le(&mut buf[DIMENSIONS_OFFSET + 4 * i..], *v);
    }

    let gain = [
        header.gain,
        header.overflow_flag,
        header.overflow_after_remeasure_flag,
        header.overflow_threshold,
    ];
    for (i, v) in gain.iter().enumerate() {
        write_i32_le(&mut buf[GAIN_OFFSET + 4 * i..], *v);
    }

    write_i32_le(&mut buf[COMPRESSION_CODE_OFFSET..], header.compression_code);
    write_f64_le(&mut buf[PIXEL_SIZE_OFFSET..], header.pixel_size_mm[0]);
    write_f64_le(&mut buf[PIXEL_SIZE_OFFSET + 8..], header.pixel_size_mm[1]);
    write_i32_le(&mut buf[DETECTOR_TYPE_OFFSET..], header.detector_type);
    write_f64_le(&mut buf[BEAM_CENTER_OFFSET..], header.beam_center_px[0]);
    write_f64_le(&mut buf[BEAM_CENTER_OFFSET + 8..], header.beam_center_px[1]);
    write_f64_le(&mut buf[DISTANCE_OFFSET..], header.detector_distance_mm);

    if let Some(layout) = header.panels {
        let fields = [
            layout.count as i16,
            1,
            layout.panel_width as i16,
            layout.panel_height as i16,
            layout.gap_x as i16,
            ARC_GAP_Y,
        ];
        for (i, v) in fields.iter().enumerate() {
            write_i16_le(&mut buf[ARC_BLOCK_OFFSET + 2 * i..], *v);
        }
    }

    Ok(buf)
}

fn format_text_header(header: &RodHeader) -> String {
    let mut definitions = header.definitions.clone();
    definitions.insert(String::from("NX"), header.nx as i64);
    definitions.insert(String::from("NY"), header.ny as i64);
    definitions.insert(String::from("NHEADER"), header.nheader as i64);

    // NX/NY lead line 2; the rest share lines 3 and 4.
    let mut lines: [String; 3] = Default::default();
    let mut rest = 0usize;
    for (key, value) in &definitions {
        let slot = match key.as_str() {
            "NX" | "NY" => 0,
            _ => {
                rest += 1;
                if rest <= 4 {
                    1
                } else {
                    2
                }
            }
        };
        if !lines[slot].is_empty() {
            lines[slot].push(' ');
        }
        lines[slot].push_str(&format!("{key}={value:>6}"));
    }

    let mut out = format!(
        "OD SAPPHIRE  {}\nCOMPRESSION={}\n{}\n{}\n{}\n",
        header.version, header.compression, lines[0], lines[1], lines[2]
    );
    if let Some(time) = &header.time {
        out.push_str(&format!("TIME={time}"));
        out.push('\u{1a}');
    }
    out
}
