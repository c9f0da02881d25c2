//! Source video probing via ffprobe.

use std::path::Path;
use std::process::Command;

use markercut_clip_model::video::{FrameRate, VideoProperties};
use markercut_common::error::{MarkercutError, MarkercutResult};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    color_space: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    bit_rate: Option<String>,
}

/// Probe the first video stream of `input`.
pub fn probe_video(ffprobe: &Path, input: &Path) -> MarkercutResult<VideoProperties> {
    if !input.exists() {
        return Err(MarkercutError::FileNotFound {
            path: input.to_path_buf(),
        });
    }

    let output = Command::new(ffprobe)
        .arg(input)
        .args([
            "-v",
            "quiet",
            "-select_streams",
            "v",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .output()
        .map_err(|e| MarkercutError::probe(format!("Failed to start ffprobe: {e}")))?;

    if !output.status.success() {
        return Err(MarkercutError::probe(format!(
            "ffprobe exited with status {} for {}",
            output.status,
            input.display()
        )));
    }

    let json = String::from_utf8_lossy(&output.stdout);
    let properties = parse_probe_output(&json)?;
    tracing::info!(
        width = properties.width,
        height = properties.height,
        frame_rate = %properties.frame_rate,
        bit_rate_kbps = ?properties.bit_rate_kbps,
        color_space = ?properties.color_space,
        "Detected video properties"
    );
    Ok(properties)
}

/// Parse ffprobe's `-show_streams -show_format` JSON.
///
/// Bitrate comes from the container (bit/s) and is truncated to kb/s.
pub fn parse_probe_output(json: &str) -> MarkercutResult<VideoProperties> {
    let parsed: ProbeOutput = serde_json::from_str(json)?;
    let stream = parsed
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| MarkercutError::probe("no video stream found"))?;

    let (Some(width), Some(height)) = (stream.width, stream.height) else {
        return Err(MarkercutError::probe("video stream has no dimensions"));
    };

    let frame_rate = [stream.r_frame_rate, stream.avg_frame_rate]
        .into_iter()
        .flatten()
        .find_map(|raw| raw.parse::<FrameRate>().ok())
        .ok_or_else(|| MarkercutError::probe("video stream has no usable frame rate"))?;

    let bit_rate_kbps = parsed
        .format
        .and_then(|f| f.bit_rate)
        .and_then(|b| b.trim().parse::<u64>().ok())
        .map(|bps| (bps / 1000) as f64);

    Ok(VideoProperties {
        width,
        height,
        frame_rate,
        bit_rate_kbps,
        color_space: stream.color_space.filter(|c| !c.is_empty() && c != "unknown"),
    })
}
