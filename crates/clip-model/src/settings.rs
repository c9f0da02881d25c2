//! Clip options, per-pair overrides, and layered resolution.
//!
//! Global options come from the command line; each marker pair may carry a
//! partial set of overrides. [`resolve`] layers the two with pair overrides
//! taking precedence, producing the options a single clip is built with.

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Special looping effect applied to a clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum LoopMode {
    #[default]
    #[serde(rename = "none")]
    None,
    /// Ping-pong loop: forward then reversed.
    #[serde(rename = "fwrev")]
    ForwardReverse,
    /// The end of the clip cross-fades into its beginning.
    #[serde(rename = "fade")]
    Crossfade,
}

impl LoopMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoopMode::None => "none",
            LoopMode::ForwardReverse => "fwrev",
            LoopMode::Crossfade => "fade",
        }
    }
}

/// 90 degree rotation applied through the `transpose` filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rotation {
    #[serde(rename = "clock")]
    Clockwise,
    #[serde(rename = "cclock")]
    CounterClockwise,
}

impl Rotation {
    /// Argument for ffmpeg's `transpose` filter.
    pub fn transpose_arg(&self) -> &'static str {
        match self {
            Rotation::Clockwise => "clock",
            Rotation::CounterClockwise => "cclock",
        }
    }
}

/// hqdn3d denoise strength preset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DenoisePreset {
    pub enabled: bool,
    #[serde(default)]
    pub luma_spatial: u32,
    #[serde(default)]
    pub desc: String,
}

impl DenoisePreset {
    pub const MAX_LEVEL: u8 = 5;

    /// Preset for strength level 0 (disabled) to 5 (very strong).
    pub fn from_level(level: u8) -> Result<Self, ModelError> {
        let (luma_spatial, desc) = match level {
            0 => return Ok(Self::disabled()),
            1 => (1, "Very Weak"),
            2 => (2, "Weak"),
            3 => (4, "Medium"),
            4 => (6, "Strong"),
            5 => (8, "Very Strong"),
            _ => {
                return Err(ModelError::InvalidPresetLevel {
                    preset: "denoise",
                    level,
                    max: Self::MAX_LEVEL,
                })
            }
        };
        Ok(Self {
            enabled: true,
            luma_spatial,
            desc: desc.to_string(),
        })
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            luma_spatial: 0,
            desc: "Disabled".to_string(),
        }
    }
}

impl Default for DenoisePreset {
    fn default() -> Self {
        Self::disabled()
    }
}

/// vid.stab strength preset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StabilizationPreset {
    pub enabled: bool,
    #[serde(default)]
    pub shakiness: u32,
    #[serde(default)]
    pub zoomspeed: f64,
    #[serde(default)]
    pub smoothing: u32,
    #[serde(default)]
    pub desc: String,
}

impl StabilizationPreset {
    pub const MAX_LEVEL: u8 = 6;

    /// Preset for strength level 0 (disabled) to 6 (strongest).
    pub fn from_level(level: u8) -> Result<Self, ModelError> {
        let (shakiness, zoomspeed, smoothing, desc) = match level {
            0 => return Ok(Self::disabled()),
            1 => (2, 0.05, 2, "Very Weak"),
            2 => (4, 0.1, 4, "Weak"),
            3 => (6, 0.2, 6, "Medium"),
            4 => (8, 0.3, 10, "Strong"),
            5 => (10, 0.4, 16, "Very Strong"),
            6 => (10, 0.5, 22, "Strongest"),
            _ => {
                return Err(ModelError::InvalidPresetLevel {
                    preset: "video stabilization",
                    level,
                    max: Self::MAX_LEVEL,
                })
            }
        };
        Ok(Self {
            enabled: true,
            shakiness,
            zoomspeed,
            smoothing,
            desc: desc.to_string(),
        })
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            shakiness: 0,
            zoomspeed: 0.0,
            smoothing: 0,
            desc: "Disabled".to_string(),
        }
    }
}

impl Default for StabilizationPreset {
    fn default() -> Self {
        Self::disabled()
    }
}

/// Fully specified options a clip is built with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClipOptions {
    /// Keep the audio stream.
    pub audio: bool,

    /// Luminance gamma; applied only within `[0, 4]` and when not `1`.
    pub gamma: f64,

    pub rotate: Option<Rotation>,

    pub denoise: DenoisePreset,

    pub video_stabilization: StabilizationPreset,

    /// Let the stabilizer vary its zoom over time.
    pub video_stabilization_dynamic_zoom: bool,

    /// Apply bwdif deinterlacing.
    pub deinterlace: bool,

    /// Expand the output color range to full (0-255).
    pub expand_color_range: bool,

    /// Raw filter text inserted after gamma correction.
    pub extra_video_filters: String,

    #[serde(rename = "loop")]
    pub loop_mode: LoopMode,

    /// Requested crossfade duration in seconds (clamped at compile time).
    pub fade_duration: f64,

    /// Explicit CRF; derived from bitrate when absent.
    pub crf: Option<u8>,

    /// Explicit vp9 encode speed; derived from bitrate when absent.
    pub encode_speed: Option<u8>,

    pub two_pass: bool,

    /// Explicit target max bitrate in kbps, before crop scaling.
    pub target_max_bitrate: Option<u32>,

    /// Honor per-pair speed maps; otherwise each pair plays at its constant speed.
    pub enable_speed_maps: bool,

    /// Seconds added to both ends of every marker pair (may be negative).
    pub delay: f64,

    pub title_prefix: Option<String>,
}

impl Default for ClipOptions {
    fn default() -> Self {
        Self {
            audio: false,
            gamma: 1.0,
            rotate: None,
            denoise: DenoisePreset::disabled(),
            video_stabilization: StabilizationPreset::disabled(),
            video_stabilization_dynamic_zoom: false,
            deinterlace: false,
            expand_color_range: false,
            extra_video_filters: String::new(),
            loop_mode: LoopMode::None,
            fade_duration: 0.5,
            crf: None,
            encode_speed: None,
            two_pass: false,
            target_max_bitrate: None,
            enable_speed_maps: true,
            delay: 0.0,
            title_prefix: None,
        }
    }
}

/// Partial options attached to a single marker pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PairOverrides {
    pub audio: Option<bool>,
    pub gamma: Option<f64>,
    pub rotate: Option<Rotation>,
    pub denoise: Option<DenoisePreset>,
    pub video_stabilization: Option<StabilizationPreset>,
    pub video_stabilization_dynamic_zoom: Option<bool>,
    pub deinterlace: Option<bool>,
    pub expand_color_range: Option<bool>,
    pub extra_video_filters: Option<String>,
    #[serde(rename = "loop")]
    pub loop_mode: Option<LoopMode>,
    pub fade_duration: Option<f64>,
    pub crf: Option<u8>,
    pub encode_speed: Option<u8>,
    pub two_pass: Option<bool>,
    pub target_max_bitrate: Option<u32>,
    pub enable_speed_maps: Option<bool>,
    pub delay: Option<f64>,
    pub title_prefix: Option<String>,
}

impl PairOverrides {
    /// Whether no option is overridden.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Layer per-pair overrides on top of global options.
///
/// Every override that is present wins; absent overrides fall through to
/// the global value. Pure: neither input is modified.
pub fn resolve(global: &ClipOptions, overrides: &PairOverrides) -> ClipOptions {
    ClipOptions {
        audio: overrides.audio.unwrap_or(global.audio),
        gamma: overrides.gamma.unwrap_or(global.gamma),
        rotate: overrides.rotate.or(global.rotate),
        denoise: overrides
            .denoise
            .clone()
            .unwrap_or_else(|| global.denoise.clone()),
        video_stabilization: overrides
            .video_stabilization
            .clone()
            .unwrap_or_else(|| global.video_stabilization.clone()),
        video_stabilization_dynamic_zoom: overrides
            .video_stabilization_dynamic_zoom
            .unwrap_or(global.video_stabilization_dynamic_zoom),
        deinterlace: overrides.deinterlace.unwrap_or(global.deinterlace),
        expand_color_range: overrides
            .expand_color_range
            .unwrap_or(global.expand_color_range),
        extra_video_filters: overrides
            .extra_video_filters
            .clone()
            .unwrap_or_else(|| global.extra_video_filters.clone()),
        loop_mode: overrides.loop_mode.unwrap_or(global.loop_mode),
        fade_duration: overrides.fade_duration.unwrap_or(global.fade_duration),
        crf: overrides.crf.or(global.crf),
        encode_speed: overrides.encode_speed.or(global.encode_speed),
        two_pass: overrides.two_pass.unwrap_or(global.two_pass),
        target_max_bitrate: overrides.target_max_bitrate.or(global.target_max_bitrate),
        enable_speed_maps: overrides
            .enable_speed_maps
            .unwrap_or(global.enable_speed_maps),
        delay: overrides.delay.unwrap_or(global.delay),
        title_prefix: overrides
            .title_prefix
            .clone()
            .or_else(|| global.title_prefix.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_overrides_resolve_to_global() {
        let global = ClipOptions {
            gamma: 0.8,
            loop_mode: LoopMode::Crossfade,
            ..Default::default()
        };
        let resolved = resolve(&global, &PairOverrides::default());
        assert_eq!(resolved, global);
    }

    #[test]
    fn test_pair_overrides_win() {
        let global = ClipOptions {
            crf: Some(30),
            audio: true,
            title_prefix: Some("global".to_string()),
            ..Default::default()
        };
        let overrides = PairOverrides {
            crf: Some(18),
            audio: Some(false),
            loop_mode: Some(LoopMode::ForwardReverse),
            denoise: Some(DenoisePreset::from_level(3).unwrap()),
            ..Default::default()
        };
        let resolved = resolve(&global, &overrides);
        assert_eq!(resolved.crf, Some(18));
        assert!(!resolved.audio);
        assert_eq!(resolved.loop_mode, LoopMode::ForwardReverse);
        assert_eq!(resolved.denoise.luma_spatial, 4);
        assert_eq!(resolved.title_prefix.as_deref(), Some("global"));
    }

    #[test]
    fn test_overrides_deserialize_from_markers_json() {
        let json = r#"{
            "gamma": 0.7,
            "loop": "fade",
            "fadeDuration": 0.3,
            "denoise": {"enabled": true, "lumaSpatial": 6, "desc": "Strong"},
            "videoStabilization": {"enabled": true, "shakiness": 8, "zoomspeed": 0.3, "smoothing": 10, "desc": "Strong"},
            "titlePrefix": "intro",
            "roundSpeedMapEasing": 2
        }"#;
        let overrides: PairOverrides = serde_json::from_str(json).unwrap();
        assert_eq!(overrides.gamma, Some(0.7));
        assert_eq!(overrides.loop_mode, Some(LoopMode::Crossfade));
        assert_eq!(overrides.denoise.unwrap().luma_spatial, 6);
        assert_eq!(overrides.video_stabilization.unwrap().smoothing, 10);
        assert_eq!(overrides.title_prefix.as_deref(), Some("intro"));
        assert!(overrides.crf.is_none());
    }

    #[test]
    fn test_preset_levels() {
        assert!(!DenoisePreset::from_level(0).unwrap().enabled);
        assert_eq!(DenoisePreset::from_level(5).unwrap().luma_spatial, 8);
        assert!(DenoisePreset::from_level(6).is_err());

        let strongest = StabilizationPreset::from_level(6).unwrap();
        assert_eq!(strongest.smoothing, 22);
        assert!((strongest.zoomspeed - 0.5).abs() < 1e-12);
        assert!(StabilizationPreset::from_level(7).is_err());
    }

    #[test]
    fn test_loop_mode_wire_names() {
        assert_eq!(
            serde_json::to_string(&LoopMode::ForwardReverse).unwrap(),
            "\"fwrev\""
        );
        let mode: LoopMode = serde_json::from_str("\"fade\"").unwrap();
        assert_eq!(mode, LoopMode::Crossfade);
    }
}
