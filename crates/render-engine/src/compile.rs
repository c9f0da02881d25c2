//! Per-pair compilation: from a marker pair and source context to every
//! value its encode needs.

use std::str::FromStr;

use markercut_clip_model::crop::{CropMultiple, CropRect, CropSpec};
use markercut_clip_model::markers::{MarkerPair, SpeedPoint};
use markercut_clip_model::settings::{resolve, ClipOptions, LoopMode};
use markercut_clip_model::video::VideoProperties;
use markercut_common::error::{MarkercutError, MarkercutResult};
use markercut_processing_core::encode_preset::EncodeSettings;
use markercut_processing_core::loop_compose::{compose_loop, LoopComposite, LoopSpec};
use markercut_processing_core::speed_map::{normalize, SpeedProfile};
use serde::Serialize;
use tracing::info;

/// Settings shared by every pair of one run.
#[derive(Debug, Clone)]
pub struct SourceContext {
    pub video: VideoProperties,
    pub crop_multiple: CropMultiple,
    pub options: ClipOptions,
}

impl SourceContext {
    /// Options for one pair: its overrides layered over the globals.
    pub fn options_for(&self, pair: &MarkerPair) -> ClipOptions {
        resolve(&self.options, &pair.overrides)
    }
}

/// Everything derived for one marker pair.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledPair {
    /// 1-based marker pair number.
    pub number: usize,
    /// Source start, delay applied.
    pub start: f64,
    /// Source end, delay applied.
    pub end: f64,
    /// The pair's constant speed.
    pub speed: f64,
    pub options: ClipOptions,
    pub crop: CropRect,
    pub profile: SpeedProfile,
    pub composite: LoopComposite,
    pub encode: EncodeSettings,
    /// Audio survives only constant-speed, non-looping clips.
    pub audio: bool,
}

impl CompiledPair {
    /// Input duration.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn output_duration(&self) -> f64 {
        self.composite.output_duration()
    }
}

/// Compile one marker pair.
pub fn compile_pair(
    pair: &MarkerPair,
    number: usize,
    source: &SourceContext,
) -> MarkercutResult<CompiledPair> {
    let options = source.options_for(pair);
    let start = pair.start + options.delay;
    let end = pair.end + options.delay;

    let crop = CropSpec::from_str(&pair.crop)?.resolve(source.crop_multiple, &source.video);
    if crop.w <= 0.0 || crop.h <= 0.0 {
        return Err(MarkercutError::invalid_crop(format!(
            "marker pair {number} resolves to an empty crop"
        )));
    }

    let shifted: Option<Vec<SpeedPoint>> = if options.enable_speed_maps {
        pair.speed_map.as_ref().map(|points| {
            points
                .iter()
                .map(|p| SpeedPoint {
                    x: p.x + options.delay,
                    y: p.y,
                })
                .collect()
        })
    } else {
        None
    };

    let profile = normalize(shifted.as_deref(), pair.speed, start, end, options.loop_mode)?;
    let composite = compose_loop(
        &profile.map,
        source.video.frame_rate,
        LoopSpec::from_options(options.loop_mode, options.fade_duration),
    )?;

    let crop_factor = crop.bitrate_crop_factor(&source.video);
    let encode = EncodeSettings::for_pair(source.video.bit_rate_kbps, crop_factor, &options);
    let audio = options.audio && !profile.is_variable_speed && options.loop_mode == LoopMode::None;

    info!(
        pair = number,
        title_prefix = options.title_prefix.as_deref().unwrap_or(""),
        crf = encode.crf,
        bitrate_crop_factor = crop_factor,
        target_max_bitrate_kbps = encode.target_max_bitrate,
        two_pass = encode.two_pass,
        encode_speed = encode.encode_speed,
        expand_color_range = options.expand_color_range,
        audio,
        denoise = %options.denoise.desc,
        variable_speed = profile.is_variable_speed,
        speed_maps = options.enable_speed_maps,
        loop_mode = options.loop_mode.as_str(),
        output_duration = composite.output_duration(),
        stabilization = %options.video_stabilization.desc,
        dynamic_zoom = options.video_stabilization_dynamic_zoom,
        "Marker pair settings"
    );

    Ok(CompiledPair {
        number,
        start,
        end,
        speed: pair.speed,
        options,
        crop,
        profile,
        composite,
        encode,
        audio,
    })
}
