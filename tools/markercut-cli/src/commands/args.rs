//! Argument groups shared by several subcommands.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, ValueEnum};
use markercut_clip_model::settings::{
    ClipOptions, DenoisePreset, LoopMode, Rotation, StabilizationPreset,
};
use markercut_clip_model::video::{FrameRate, VideoProperties};

/// Which markers file to work on and where its outputs go.
#[derive(Args, Debug, Clone)]
pub struct SessionArgs {
    /// Markers JSON file
    #[arg(short = 'j', long = "markers")]
    pub markers: PathBuf,

    /// Directory holding per-markers output folders (default from config)
    #[arg(short, long)]
    pub output_root: Option<PathBuf>,

    /// Output naming stem (default: markers titleSuffix, else the file stem)
    #[arg(long)]
    pub title_suffix: Option<String>,

    /// Multiply both crop axes by this factor
    #[arg(long, conflicts_with_all = ["multiply_crop_x", "multiply_crop_y"])]
    pub multiply_crop: Option<f64>,

    /// Multiply crop x and width by this factor
    #[arg(long)]
    pub multiply_crop_x: Option<f64>,

    /// Multiply crop y and height by this factor
    #[arg(long)]
    pub multiply_crop_y: Option<f64>,

    /// Keep crops as authored when the markers' crop resolution differs from the video
    #[arg(long)]
    pub no_auto_scale_crop_res: bool,
}

/// Where the source video comes from.
#[derive(Args, Debug, Clone, Default)]
pub struct InputArgs {
    /// Local input video (default: `<titleSuffix>-full.*` in the output folder)
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Require --input instead of looking for `<titleSuffix>-full.*`
    #[arg(long)]
    pub no_auto_find_input_video: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LoopArg {
    None,
    Fwrev,
    Fade,
}

impl From<LoopArg> for LoopMode {
    fn from(arg: LoopArg) -> Self {
        match arg {
            LoopArg::None => LoopMode::None,
            LoopArg::Fwrev => LoopMode::ForwardReverse,
            LoopArg::Fade => LoopMode::Crossfade,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RotateArg {
    Clock,
    Cclock,
}

impl From<RotateArg> for Rotation {
    fn from(arg: RotateArg) -> Self {
        match arg {
            RotateArg::Clock => Rotation::Clockwise,
            RotateArg::Cclock => Rotation::CounterClockwise,
        }
    }
}

/// Global clip options; marker pair overrides win over these.
#[derive(Args, Debug, Clone)]
pub struct ClipArgs {
    /// Keep audio (dropped for variable speed and loops)
    #[arg(long)]
    pub audio: bool,

    /// Gamma correction
    #[arg(long, default_value_t = 1.0)]
    pub gamma: f64,

    /// Rotate 90 degrees
    #[arg(long, value_enum)]
    pub rotate: Option<RotateArg>,

    /// Denoise strength 0-5
    #[arg(long, default_value_t = 0)]
    pub denoise: u8,

    /// Stabilization strength 0-6 (runs a detection pass first)
    #[arg(long, default_value_t = 0)]
    pub video_stabilization: u8,

    /// Let stabilization zoom adapt to the motion
    #[arg(long)]
    pub dynamic_zoom: bool,

    /// Deinterlace with bwdif
    #[arg(long)]
    pub deinterlace: bool,

    /// Expand limited color range to full range
    #[arg(long)]
    pub expand_color_range: bool,

    /// Extra ffmpeg filters appended after the built-in ones
    #[arg(long, default_value = "")]
    pub extra_video_filters: String,

    /// Loop effect
    #[arg(long = "loop", value_enum, default_value = "none")]
    pub loop_mode: LoopArg,

    /// Crossfade duration in seconds (clamped to the clip)
    #[arg(long, default_value_t = 0.5)]
    pub fade_duration: f64,

    /// VP9 constant rate factor
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=63))]
    pub crf: Option<u8>,

    /// libvpx -speed
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=5))]
    pub encode_speed: Option<u8>,

    /// Encode in two passes
    #[arg(long)]
    pub two_pass: bool,

    /// Target max bitrate in kb/s before crop scaling
    #[arg(long)]
    pub target_max_bitrate: Option<u32>,

    /// Ignore marker speed maps and use each pair's constant speed
    #[arg(long)]
    pub no_speed_maps: bool,

    /// Seconds added to every marker time
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub delay: f64,

    /// Prefix for generated clip names
    #[arg(long)]
    pub title_prefix: Option<String>,
}

impl ClipArgs {
    pub fn to_options(&self) -> anyhow::Result<ClipOptions> {
        Ok(ClipOptions {
            audio: self.audio,
            gamma: self.gamma,
            rotate: self.rotate.map(Rotation::from),
            denoise: DenoisePreset::from_level(self.denoise)?,
            video_stabilization: StabilizationPreset::from_level(self.video_stabilization)?,
            video_stabilization_dynamic_zoom: self.dynamic_zoom,
            deinterlace: self.deinterlace,
            expand_color_range: self.expand_color_range,
            extra_video_filters: self.extra_video_filters.clone(),
            loop_mode: self.loop_mode.into(),
            fade_duration: self.fade_duration,
            crf: self.crf,
            encode_speed: self.encode_speed,
            two_pass: self.two_pass,
            target_max_bitrate: self.target_max_bitrate,
            enable_speed_maps: !self.no_speed_maps,
            delay: self.delay,
            title_prefix: self.title_prefix.clone().filter(|p| !p.is_empty()),
        })
    }
}

/// Source properties given on the command line instead of probing.
#[derive(Args, Debug, Clone, Default)]
pub struct VideoArgs {
    #[arg(long)]
    pub video_width: Option<u32>,

    #[arg(long)]
    pub video_height: Option<u32>,

    #[arg(long)]
    pub video_fps: Option<f64>,

    /// Source bitrate in kb/s
    #[arg(long)]
    pub video_bitrate: Option<f64>,
}

impl VideoArgs {
    /// Properties when width, height, and fps are all given.
    pub fn properties(&self) -> anyhow::Result<Option<VideoProperties>> {
        let (Some(width), Some(height), Some(fps)) =
            (self.video_width, self.video_height, self.video_fps)
        else {
            return Ok(None);
        };
        let frame_rate =
            FrameRate::from_fps(fps).with_context(|| format!("invalid --video-fps {fps}"))?;
        Ok(Some(VideoProperties {
            width,
            height,
            frame_rate,
            bit_rate_kbps: self.video_bitrate,
            color_space: None,
        }))
    }
}
