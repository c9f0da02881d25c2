//! Markers file and marker pair records.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::settings::PairOverrides;

/// Top-level markers file as saved by the marking tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkersFile {
    /// Identifier of the source video on its hosting site.
    #[serde(rename = "videoID", default)]
    pub video_id: String,

    #[serde(default)]
    pub video_title: String,

    /// Output naming stem; the markers file stem is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_suffix: Option<String>,

    /// Player resolution the crops were authored against.
    #[serde(default = "default_crop_res_width")]
    pub crop_res_width: u32,
    #[serde(default = "default_crop_res_height")]
    pub crop_res_height: u32,

    /// Merge list in compact range syntax (e.g. `1-3,7;4-6`).
    #[serde(default)]
    pub marker_pair_merge_list: String,

    #[serde(default, alias = "markers")]
    pub marker_pairs: Vec<MarkerPair>,
}

/// One source clip definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerPair {
    /// Start time in the source video (seconds).
    pub start: f64,

    /// End time in the source video (seconds).
    pub end: f64,

    /// Constant playback speed used when no speed map applies.
    #[serde(default = "default_speed")]
    pub speed: f64,

    /// Crop string `x:y:w:h` in crop-resolution pixels.
    #[serde(default = "default_crop")]
    pub crop: String,

    /// Optional piecewise-linear speed curve.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_map: Option<Vec<SpeedPoint>>,

    #[serde(default)]
    pub overrides: PairOverrides,
}

/// A speed-map control point as stored on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedPoint {
    /// Time in the source video (seconds).
    pub x: f64,
    /// Speed multiplier at that time.
    pub y: f64,
}

fn default_crop_res_width() -> u32 {
    1920
}

fn default_crop_res_height() -> u32 {
    1080
}

fn default_speed() -> f64 {
    1.0
}

fn default_crop() -> String {
    "0:0:iw:ih".to_string()
}

impl MarkersFile {
    /// Parse markers JSON, tolerating a UTF-8 byte order mark.
    pub fn parse(json: &str, origin: &Path) -> Result<Self, ModelError> {
        let json = json.strip_prefix('\u{feff}').unwrap_or(json);
        serde_json::from_str(json).map_err(|e| ModelError::ParseError {
            path: origin.to_path_buf(),
            source: e,
        })
    }

    /// Load a markers file from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ModelError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&content, path)
    }

    /// Number of marker pairs.
    pub fn len(&self) -> usize {
        self.marker_pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marker_pairs.is_empty()
    }
}

impl MarkerPair {
    /// A marker pair at constant speed with a full-frame crop.
    pub fn new(start: f64, end: f64) -> Self {
        Self {
            start,
            end,
            speed: default_speed(),
            crop: default_crop(),
            speed_map: None,
            overrides: PairOverrides::default(),
        }
    }

    /// Input duration before any speed change.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}
