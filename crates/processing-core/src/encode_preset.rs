//! Bitrate-driven encoder presets.

use markercut_clip_model::settings::ClipOptions;
use serde::Serialize;

/// Encoder settings derived from a source bitrate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodePreset {
    pub crf: u8,
    /// Target max bitrate in kb/s; 0 means unconstrained.
    pub auto_target_max_bitrate: u32,
    pub encode_speed: u8,
    pub two_pass: bool,
}

/// `(bitrate ceiling kb/s, crf, target factor, encode speed)`, checked in order.
const PRESET_TABLE: [(f64, u8, f64, u8); 5] = [
    (4000.0, 20, 1.6, 2),
    (6000.0, 22, 1.5, 3),
    (10000.0, 24, 1.4, 4),
    (15000.0, 26, 1.3, 5),
    (20000.0, 30, 1.2, 5),
];

const TOP_PRESET: (u8, f64, u8) = (35, 1.1, 5);

impl EncodePreset {
    /// Used when the source bitrate is unknown.
    pub const FALLBACK: Self = Self {
        crf: 30,
        auto_target_max_bitrate: 0,
        encode_speed: 2,
        two_pass: false,
    };

    /// Look up the preset for a bitrate in kb/s.
    pub fn derive(bitrate_kbps: Option<f64>) -> Self {
        let Some(bitrate) = bitrate_kbps else {
            return Self::FALLBACK;
        };

        let (crf, factor, encode_speed) = PRESET_TABLE
            .iter()
            .find(|(ceiling, ..)| bitrate <= *ceiling)
            .map(|&(_, crf, factor, speed)| (crf, factor, speed))
            .unwrap_or(TOP_PRESET);

        Self {
            crf,
            // Truncation toward zero.
            auto_target_max_bitrate: (factor * bitrate) as u32,
            encode_speed,
            two_pass: false,
        }
    }
}

/// Effective encoder settings for one marker pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodeSettings {
    pub crf: u8,
    pub target_max_bitrate: u32,
    pub encode_speed: u8,
    pub two_pass: bool,
    /// Share of the source frame kept by the crop.
    pub bitrate_crop_factor: f64,
}

impl EncodeSettings {
    /// Derive from the crop-scaled source bitrate, then apply explicit options.
    ///
    /// A user target bitrate is scaled by the crop factor and passed through
    /// the same table, so only its target component is used.
    pub fn for_pair(
        source_bitrate_kbps: Option<f64>,
        bitrate_crop_factor: f64,
        options: &ClipOptions,
    ) -> Self {
        let preset = EncodePreset::derive(source_bitrate_kbps.map(|b| b * bitrate_crop_factor));

        let target_max_bitrate = match options.target_max_bitrate {
            Some(target) => {
                EncodePreset::derive(Some(f64::from(target) * bitrate_crop_factor))
                    .auto_target_max_bitrate
            }
            None => preset.auto_target_max_bitrate,
        };

        Self {
            crf: options.crf.unwrap_or(preset.crf),
            target_max_bitrate,
            encode_speed: options.encode_speed.unwrap_or(preset.encode_speed),
            two_pass: options.two_pass || preset.two_pass,
            bitrate_crop_factor,
        }
    }
}
