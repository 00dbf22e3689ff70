//! JSON-facing result shapes.
//!
//! The decoded-image and peak-table contracts are what front ends consume;
//! the Lepage and G6 types describe requests to, and responses from, external
//! cell-reduction services. This module only builds and parses those values;
//! it performs no I/O.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use serde::de::{Deserializer, IgnoredAny};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cell::CellParameters;
use crate::error::Result;
use crate::image::RodImage;
use crate::peaks::{Axis, AxisStatistics, PeakRecord, PeakTable};

// ---------------------------------------------------------------------------
// Decoded image
// ---------------------------------------------------------------------------

/// Detector metadata reported alongside decoded pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub binning: [u16; 2],
    pub chip_dimensions: [i32; 2],
    pub gain: i32,
    pub overflow_threshold: i32,
    pub detector_distance_mm: f64,
    pub beam_center_px: [f64; 2],
    pub compression_type: i32,
}

/// The decoded-image result shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageContract {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// `[nx, ny]`.
    pub dimensions: [usize; 2],
    /// `[x, y]` in millimetres.
    pub pixel_size: [f64; 2],
    pub image_data: Vec<i32>,
    /// Serialized as `{}` when absent.
    #[serde(with = "empty_object")]
    pub metadata: Option<ImageMetadata>,
}

impl ImageContract {
    pub fn failure(message: impl Into<String>) -> Self {
        ImageContract {
            success: false,
            error: Some(message.into()),
            dimensions: [0, 0],
            pixel_size: [0.0, 0.0],
            image_data: Vec::new(),
            metadata: None,
        }
    }

    /// Contract for a decode attempt.
    pub fn from_result(result: Result<RodImage>) -> Self {
        match result {
            Ok(rod) => ImageContract::from(rod),
            Err(e) => {
                warn!(error = %e, "rodhypix decode failed");
                ImageContract::failure(e.to_string())
            }
        }
    }
}

impl From<RodImage> for ImageContract {
    fn from(rod: RodImage) -> Self {
        let h = &rod.header;
        let metadata = ImageMetadata {
            binning: [h.bin_x, h.bin_y],
            chip_dimensions: [h.chip_npx_x, h.chip_npx_y],
            gain: h.gain,
            overflow_threshold: h.overflow_threshold,
            detector_distance_mm: h.detector_distance_mm,
            beam_center_px: h.beam_center_px,
            compression_type: h.compression_code,
        };
        ImageContract {
            success: true,
            error: None,
            dimensions: [rod.image.nx, rod.image.ny],
            pixel_size: h.pixel_size_mm,
            metadata: Some(metadata),
            image_data: rod.image.data,
        }
    }
}

// ---------------------------------------------------------------------------
// Peak table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeakMetadata {
    pub num_points: usize,
    pub file_size: usize,
}

/// The peak-table result shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakContract {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub data_points: Vec<PeakRecord>,
    pub statistics: BTreeMap<Axis, AxisStatistics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<PeakMetadata>,
}

impl PeakContract {
    pub fn failure(message: impl Into<String>) -> Self {
        PeakContract {
            success: false,
            error: Some(message.into()),
            data_points: Vec::new(),
            statistics: BTreeMap::new(),
            metadata: None,
        }
    }

    pub fn from_result(result: Result<PeakTable>) -> Self {
        match result {
            Ok(table) => PeakContract::from(table),
            Err(e) => {
                warn!(error = %e, "peak table decode failed");
                PeakContract::failure(e.to_string())
            }
        }
    }
}

impl From<PeakTable> for PeakContract {
    fn from(table: PeakTable) -> Self {
        PeakContract {
            success: true,
            error: None,
            metadata: Some(PeakMetadata {
                num_points: table.records.len(),
                file_size: table.source_len,
            }),
            data_points: table.records,
            statistics: table.statistics,
        }
    }
}

// ---------------------------------------------------------------------------
// External cell services
// ---------------------------------------------------------------------------

fn all_positive(cell: &CellParameters) -> bool {
    cell.as_array().iter().all(|v| *v > 0.0)
}

/// Request body for the Lepage cell-reduction service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LepageRequest {
    pub cell: [f64; 6],
    pub lepage_max_delta: f64,
}

impl LepageRequest {
    /// `None` unless all six cell parameters are positive.
    pub fn new(cell: &CellParameters, lepage_max_delta: f64) -> Option<Self> {
        if !all_positive(cell) {
            debug!(?cell, "not building Lepage request for invalid cell");
            return None;
        }
        Some(LepageRequest {
            cell: cell.as_array(),
            lepage_max_delta,
        })
    }
}

/// One candidate lattice returned by the Lepage service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LepageSolution {
    pub bravais: String,
    pub conventional_cell: [f64; 6],
    #[serde(default)]
    pub cb_op: Option<String>,
    #[serde(default)]
    pub volume: Option<f64>,
    #[serde(default)]
    pub distance: f64,
}

impl LepageSolution {
    pub fn cell(&self) -> CellParameters {
        let [a, b, c, alpha, beta, gamma] = self.conventional_cell;
        let mut cell = CellParameters::new(a, b, c, alpha, beta, gamma);
        if let Some(volume) = self.volume {
            cell.volume = volume;
        }
        cell
    }
}

/// Lepage service response; malformed entries are dropped on deserialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct LepageResponse {
    pub solutions: Vec<LepageSolution>,
}

impl LepageResponse {
    /// The primitive (`aP`) solution, or the first one if none is labelled primitive.
    pub fn primitive(&self) -> Option<&LepageSolution> {
        self.solutions
            .iter()
            .find(|s| s.bravais == "aP")
            .or_else(|| self.solutions.first())
    }
}

impl<'de> Deserialize<'de> for LepageResponse {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> core::result::Result<Self, D::Error> {
        Ok(LepageResponse {
            solutions: lenient_list(deserializer, "Lepage")?,
        })
    }
}

/// Request body for the G6 distance service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct G6Request {
    pub reference_cell: [f64; 6],
    pub cells: BTreeMap<String, [f64; 6]>,
}

impl G6Request {
    /// Build a request comparing `reference` to each `(id, cell)`.
    ///
    /// Comparison cells with a non-positive parameter are skipped. Returns
    /// `None` if the reference is invalid or nothing is left to compare.
    pub fn new<I, K>(reference: &CellParameters, cells: I) -> Option<Self>
    where
        I: IntoIterator<Item = (K, CellParameters)>,
        K: ToString,
    {
        if !all_positive(reference) {
            debug!(?reference, "not building G6 request for invalid reference cell");
            return None;
        }
        let mut map = BTreeMap::new();
        for (id, cell) in cells {
            let id = id.to_string();
            if all_positive(&cell) {
                map.insert(id, cell.as_array());
            } else {
                debug!(%id, "skipping invalid cell in G6 request");
            }
        }
        if map.is_empty() {
            return None;
        }
        Some(G6Request {
            reference_cell: reference.as_array(),
            cells: map,
        })
    }
}

/// G6 distance of one compared cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct G6Distance {
    #[serde(deserialize_with = "string_or_number")]
    pub cell_id: String,
    pub g6_distance: f64,
}

/// G6 service response; malformed entries are dropped on deserialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct G6Response {
    pub distances: Vec<G6Distance>,
}

impl G6Response {
    pub fn distance(&self, cell_id: &str) -> Option<f64> {
        self.distances
            .iter()
            .find(|d| d.cell_id == cell_id)
            .map(|d| d.g6_distance)
    }

    /// Ids within `tolerance`, nearest first.
    pub fn within(&self, tolerance: f64) -> Vec<&G6Distance> {
        let mut close: Vec<&G6Distance> = self
            .distances
            .iter()
            .filter(|d| d.g6_distance <= tolerance)
            .collect();
        close.sort_by(|a, b| a.g6_distance.total_cmp(&b.g6_distance));
        close
    }
}

impl<'de> Deserialize<'de> for G6Response {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> core::result::Result<Self, D::Error> {
        Ok(G6Response {
            distances: lenient_list(deserializer, "G6")?,
        })
    }
}

// ---------------------------------------------------------------------------
// serde helpers
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(untagged)]
enum Lenient<T> {
    Valid(T),
    Malformed(IgnoredAny),
}

fn lenient_list<'de, D, T>(deserializer: D, service: &str) -> core::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let entries: Vec<Lenient<T>> = Vec::deserialize(deserializer)?;
    let total = entries.len();
    let valid: Vec<T> = entries
        .into_iter()
        .filter_map(|e| match e {
            Lenient::Valid(v) => Some(v),
            Lenient::Malformed(_) => None,
        })
        .collect();
    if valid.len() < total {
        warn!(service, dropped = total - valid.len(), "dropped malformed response entries");
    }
    Ok(valid)
}

fn string_or_number<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> core::result::Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Int(i64),
        Uint(u64),
    }
    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Int(n) => n.to_string(),
        Id::Uint(n) => n.to_string(),
    })
}

/// `Option<T>` that serializes `None` as an empty object.
mod empty_object {
    use super::*;

    pub fn serialize<S, T>(value: &Option<T>, serializer: S) -> core::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Serialize,
    {
        match value {
            Some(v) => v.serialize(serializer),
            None => serializer.serialize_map(Some(0))?.end(),
        }
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> core::result::Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum MaybeEmpty<T> {
            Full(T),
            Empty(BTreeMap<String, IgnoredAny>),
        }
        Ok(match MaybeEmpty::<T>::deserialize(deserializer)? {
            MaybeEmpty::Full(v) => Some(v),
            MaybeEmpty::Empty(_) => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::header::RodHeader;
    use crate::ty6::DecodedImage;
    use alloc::vec;
    use serde_json::json;

    #[test]
    fn image_contract_field_names() {
        let mut header = RodHeader::new(2, 1);
        header.bin_x = 2;
        header.bin_y = 2;
        let rod = RodImage {
            header,
            image: DecodedImage {
                nx: 2,
                ny: 1,
                data: vec![7, -1],
                zero_filled_rows: vec![],
            },
        };
        let value = serde_json::to_value(ImageContract::from(rod)).unwrap();
        assert_eq!(value["success"], json!(true));
        assert_eq!(value["dimensions"], json!([2, 1]));
        assert_eq!(value["image_data"], json!([7, -1]));
        assert_eq!(value["metadata"]["binning"], json!([2, 2]));
        assert_eq!(value["metadata"]["compression_type"], json!(6));
        assert!(value.get("error").is_none());
    }

    #[test]
    fn image_failure_has_empty_metadata() {
        let contract = ImageContract::from_result(Err(Error::InvalidFormat("bad")));
        let value = serde_json::to_value(&contract).unwrap();
        assert_eq!(value["success"], json!(false));
        assert_eq!(value["error"], json!("invalid rodhypix file: bad"));
        assert_eq!(value["dimensions"], json!([0, 0]));
        assert_eq!(value["image_data"], json!([]));
        assert_eq!(value["metadata"], json!({}));

        let back: ImageContract = serde_json::from_value(value).unwrap();
        assert_eq!(back, contract);
    }

    #[test]
    fn peak_contract_shape() {
        let table = PeakTable {
            records: vec![PeakRecord::new(0.1, 0.2, 0.3, 50.0, 1)],
            statistics: crate::peaks::compute_statistics(&[PeakRecord::new(
                0.1, 0.2, 0.3, 50.0, 1,
            )]),
            declared_chunks: 1,
            truncated: false,
            source_len: 480,
        };
        let value = serde_json::to_value(PeakContract::from(table)).unwrap();
        assert_eq!(
            value["data_points"][0],
            json!({"x": 0.1, "y": 0.2, "z": 0.3, "r": 50.0, "i": 1})
        );
        assert_eq!(value["statistics"]["r"]["count"], json!(1));
        assert_eq!(value["metadata"], json!({"num_points": 1, "file_size": 480}));
    }

    #[test]
    fn peak_failure_shape() {
        let value = serde_json::to_value(PeakContract::from_result(Err(Error::EmptyInput))).unwrap();
        assert_eq!(value["success"], json!(false));
        assert_eq!(value["error"], json!("no binary data provided"));
        assert_eq!(value["data_points"], json!([]));
        assert_eq!(value["statistics"], json!({}));
    }

    #[test]
    fn lepage_request_requires_positive_cell() {
        let cell = CellParameters::new(5.0, 6.0, 7.0, 90.0, 95.0, 90.0);
        let req = LepageRequest::new(&cell, 3.0).unwrap();
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({"cell": [5.0, 6.0, 7.0, 90.0, 95.0, 90.0], "lepage_max_delta": 3.0})
        );
        let bad = CellParameters::new(5.0, 0.0, 7.0, 90.0, 95.0, 90.0);
        assert!(LepageRequest::new(&bad, 3.0).is_none());
    }

    #[test]
    fn lepage_response_prefers_primitive() {
        let body = json!([
            {"bravais": "mC", "conventional_cell": [10.0, 6.0, 7.0, 90.0, 100.0, 90.0],
             "cb_op": "a+b,-a+b,c", "volume": 414.0, "distance": 0.4},
            {"bravais": "aP", "conventional_cell": [5.0, 6.0, 7.0, 80.0, 85.0, 89.0],
             "cb_op": "a,b,c", "volume": 207.0, "distance": 0.0},
            {"bravais": "oP"},
            "garbage"
        ]);
        let resp: LepageResponse = serde_json::from_value(body).unwrap();
        assert_eq!(resp.solutions.len(), 2);
        let primitive = resp.primitive().unwrap();
        assert_eq!(primitive.bravais, "aP");
        assert_eq!(primitive.cell().volume, 207.0);
    }

    #[test]
    fn lepage_response_falls_back_to_first() {
        let body = json!([
            {"bravais": "mP", "conventional_cell": [5.0, 6.0, 7.0, 90.0, 95.0, 90.0]}
        ]);
        let resp: LepageResponse = serde_json::from_value(body).unwrap();
        let first = resp.primitive().unwrap();
        assert_eq!(first.bravais, "mP");
        assert_eq!(first.distance, 0.0);
        assert_eq!(first.cb_op, None);
        assert!(LepageResponse::default().primitive().is_none());
    }

    #[test]
    fn g6_request_skips_invalid_cells() {
        let reference = CellParameters::new(5.0, 6.0, 7.0, 90.0, 90.0, 90.0);
        let cells = vec![
            (12, CellParameters::new(5.1, 6.0, 7.0, 90.0, 90.0, 90.0)),
            (13, CellParameters::new(-1.0, 6.0, 7.0, 90.0, 90.0, 90.0)),
        ];
        let req = G6Request::new(&reference, cells).unwrap();
        assert_eq!(req.cells.len(), 1);
        assert!(req.cells.contains_key("12"));

        let only_bad = vec![(1, CellParameters::new(0.0, 6.0, 7.0, 90.0, 90.0, 90.0))];
        assert!(G6Request::new(&reference, only_bad).is_none());
    }

    #[test]
    fn g6_response_accepts_numeric_ids() {
        let body = json!([
            {"cell_id": "12", "g6_distance": 4.5},
            {"cell_id": 13, "g6_distance": 1.5},
            {"cell_id": "14"}
        ]);
        let resp: G6Response = serde_json::from_value(body).unwrap();
        assert_eq!(resp.distances.len(), 2);
        assert_eq!(resp.distance("13"), Some(1.5));
        let close: Vec<&str> = resp.within(5.0).into_iter().map(|d| d.cell_id.as_str()).collect();
        assert_eq!(close, vec!["13", "12"]);
    }
}
