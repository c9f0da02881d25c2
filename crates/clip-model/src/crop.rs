//! Crop strings and their resolution to source-pixel rectangles.
//!
//! Crops are authored against a "crop resolution" (the player size the
//! markers were drawn on) as `x:y:w:h`, where `w` may be the literal `iw`
//! and `h` may be `ih` to mean the full source width/height.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::video::VideoProperties;

/// One extent of a crop (width or height).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CropExtent {
    /// The full source dimension (`iw` / `ih`).
    Full,
    /// An explicit size in crop-resolution pixels.
    Pixels(f64),
}

/// A parsed, unresolved crop specification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropSpec {
    pub x: f64,
    pub y: f64,
    pub w: CropExtent,
    pub h: CropExtent,
}

/// Per-axis multipliers mapping crop-resolution pixels to source pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropMultiple {
    pub x: f64,
    pub y: f64,
}

/// A crop rectangle in source-pixel units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropRect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl CropSpec {
    /// The crop covering the whole frame.
    pub const FULL: CropSpec = CropSpec {
        x: 0.0,
        y: 0.0,
        w: CropExtent::Full,
        h: CropExtent::Full,
    };

    /// Resolve against the source video, scaling by the crop multiples.
    pub fn resolve(&self, multiple: CropMultiple, video: &VideoProperties) -> CropRect {
        let w = match self.w {
            CropExtent::Full => video.width as f64,
            CropExtent::Pixels(w) => w * multiple.x,
        };
        let h = match self.h {
            CropExtent::Full => video.height as f64,
            CropExtent::Pixels(h) => h * multiple.y,
        };
        CropRect {
            x: self.x * multiple.x,
            y: self.y * multiple.y,
            w,
            h,
        }
    }
}

impl FromStr for CropSpec {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |message: &str| ModelError::InvalidCrop {
            crop: s.to_string(),
            message: message.to_string(),
        };

        let parts: Vec<&str> = s.trim().split(':').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(invalid("expected four ':'-separated components"));
        }

        let number = |raw: &str, label: &str| -> Result<f64, ModelError> {
            let value = raw
                .parse::<f64>()
                .map_err(|_| invalid(&format!("{label} is not a number")))?;
            if !value.is_finite() || value < 0.0 {
                return Err(invalid(&format!("{label} must be a non-negative number")));
            }
            Ok(value)
        };

        let x = number(parts[0], "x")?;
        let y = number(parts[1], "y")?;
        let w = match parts[2] {
            "iw" => CropExtent::Full,
            raw => CropExtent::Pixels(number(raw, "width")?),
        };
        let h = match parts[3] {
            "ih" => CropExtent::Full,
            raw => CropExtent::Pixels(number(raw, "height")?),
        };

        if w == CropExtent::Pixels(0.0) || h == CropExtent::Pixels(0.0) {
            return Err(invalid("width and height must be positive"));
        }

        Ok(Self { x, y, w, h })
    }
}

impl fmt::Display for CropSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let extent = |e: CropExtent, full: &'static str| match e {
            CropExtent::Full => full.to_string(),
            CropExtent::Pixels(v) => format_pixels(v),
        };
        write!(
            f,
            "{}:{}:{}:{}",
            format_pixels(self.x),
            format_pixels(self.y),
            extent(self.w, "iw"),
            extent(self.h, "ih")
        )
    }
}

impl CropMultiple {
    pub const IDENTITY: CropMultiple = CropMultiple { x: 1.0, y: 1.0 };

    pub fn uniform(factor: f64) -> Self {
        Self {
            x: factor,
            y: factor,
        }
    }

    /// Multiples implied by a crop resolution that differs from the video.
    ///
    /// Returns `None` when the crop resolution already matches.
    pub fn from_resolution_mismatch(
        video: &VideoProperties,
        crop_res_width: u32,
        crop_res_height: u32,
    ) -> Option<Self> {
        if crop_res_width == 0 || crop_res_height == 0 {
            return None;
        }
        if crop_res_width == video.width && crop_res_height == video.height {
            return None;
        }
        Some(Self {
            x: video.width as f64 / crop_res_width as f64,
            y: video.height as f64 / crop_res_height as f64,
        })
    }

    pub fn is_identity(&self) -> bool {
        self.x == 1.0 && self.y == 1.0
    }
}

impl Default for CropMultiple {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl CropRect {
    /// Ratio of cropped area to full source area, used to scale bitrate heuristics.
    pub fn bitrate_crop_factor(&self, video: &VideoProperties) -> f64 {
        let area = video.area();
        if area <= 0.0 {
            return 1.0;
        }
        (self.w * self.h) / area
    }
}

/// Render a pixel value without a trailing `.0` when it is integral.
pub fn format_pixels(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        let s = format!("{value:.3}");
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::FrameRate;

    fn video_1080p() -> VideoProperties {
        VideoProperties {
            width: 1920,
            height: 1080,
            frame_rate: FrameRate::new(30, 1).unwrap(),
            bit_rate_kbps: Some(8000.0),
            color_space: None,
        }
    }

    #[test]
    fn test_parse_full_frame_sentinels() {
        let spec: CropSpec = "0:0:iw:ih".parse().unwrap();
        assert_eq!(spec, CropSpec::FULL);
        let rect = spec.resolve(CropMultiple::IDENTITY, &video_1080p());
        assert_eq!(rect.w, 1920.0);
        assert_eq!(rect.h, 1080.0);
        assert!((rect.bitrate_crop_factor(&video_1080p()) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_multiples_scale_offsets_and_explicit_extents_only() {
        let spec: CropSpec = "100:50:640:ih".parse().unwrap();
        let rect = spec.resolve(CropMultiple { x: 2.0, y: 1.5 }, &video_1080p());
        assert_eq!(rect.x, 200.0);
        assert_eq!(rect.y, 75.0);
        assert_eq!(rect.w, 1280.0);
        // `ih` resolves to the source height and is not multiplied.
        assert_eq!(rect.h, 1080.0);
    }

    #[test]
    fn test_bitrate_crop_factor_quarter_frame() {
        let spec: CropSpec = "0:0:960:540".parse().unwrap();
        let rect = spec.resolve(CropMultiple::IDENTITY, &video_1080p());
        assert!((rect.bitrate_crop_factor(&video_1080p()) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_malformed_crops() {
        assert!("0:0:iw".parse::<CropSpec>().is_err());
        assert!("0:0:ih:iw".parse::<CropSpec>().is_err());
        assert!("a:0:10:10".parse::<CropSpec>().is_err());
        assert!("0:0:0:10".parse::<CropSpec>().is_err());
        assert!("-5:0:10:10".parse::<CropSpec>().is_err());
    }

    #[test]
    fn test_resolution_mismatch_multiples() {
        let video = VideoProperties {
            width: 3840,
            height: 2160,
            ..video_1080p()
        };
        let multiple = CropMultiple::from_resolution_mismatch(&video, 1920, 1080).unwrap();
        assert_eq!(multiple, CropMultiple::uniform(2.0));
        assert!(CropMultiple::from_resolution_mismatch(&video_1080p(), 1920, 1080).is_none());
    }

    #[test]
    fn test_display_round_trips_text() {
        let spec: CropSpec = "10:20:iw:300.5".parse().unwrap();
        assert_eq!(spec.to_string(), "10:20:iw:300.5");
    }

    #[test]
    fn test_format_pixels() {
        assert_eq!(format_pixels(960.0), "960");
        assert_eq!(format_pixels(480.25), "480.25");
        assert_eq!(format_pixels(1.0 / 3.0), "0.333");
    }
}
