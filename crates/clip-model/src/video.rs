//! Source video properties and rational frame rates.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// A frame rate kept as a reduced rational (`30000/1001`, `60/1`).
///
/// Kept rational so frame durations of NTSC-style rates are not
/// truncated before they enter the time-remap arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FrameRate {
    num: u32,
    den: u32,
}

impl FrameRate {
    /// Create a frame rate from numerator and denominator.
    pub fn new(num: u32, den: u32) -> Result<Self, ModelError> {
        if num == 0 || den == 0 {
            return Err(ModelError::InvalidFrameRate {
                value: format!("{num}/{den}"),
            });
        }
        let g = gcd(num, den);
        Ok(Self {
            num: num / g,
            den: den / g,
        })
    }

    /// Approximate a decimal rate (e.g. `29.97`) with millisecond resolution.
    pub fn from_fps(fps: f64) -> Result<Self, ModelError> {
        if !fps.is_finite() || fps <= 0.0 {
            return Err(ModelError::InvalidFrameRate {
                value: fps.to_string(),
            });
        }
        let scaled = (fps * 1000.0).round();
        if scaled > u32::MAX as f64 {
            return Err(ModelError::InvalidFrameRate {
                value: fps.to_string(),
            });
        }
        Self::new(scaled as u32, 1000)
    }

    pub fn numerator(&self) -> u32 {
        self.num
    }

    pub fn denominator(&self) -> u32 {
        self.den
    }

    /// Frames per second as a float.
    pub fn as_f64(&self) -> f64 {
        self.num as f64 / self.den as f64
    }

    /// Duration of a single frame in seconds.
    pub fn frame_duration(&self) -> f64 {
        self.den as f64 / self.num as f64
    }
}

impl FromStr for FrameRate {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let invalid = || ModelError::InvalidFrameRate {
            value: s.to_string(),
        };

        if let Some((num, den)) = trimmed.split_once('/') {
            let num = num.trim().parse::<u32>().map_err(|_| invalid())?;
            let den = den.trim().parse::<u32>().map_err(|_| invalid())?;
            return Self::new(num, den).map_err(|_| invalid());
        }

        if let Ok(whole) = trimmed.parse::<u32>() {
            return Self::new(whole, 1).map_err(|_| invalid());
        }

        let fps = trimmed.parse::<f64>().map_err(|_| invalid())?;
        Self::from_fps(fps).map_err(|_| invalid())
    }
}

impl TryFrom<String> for FrameRate {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FrameRate> for String {
    fn from(rate: FrameRate) -> Self {
        rate.to_string()
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.den == 1 {
            write!(f, "{}", self.num)
        } else {
            write!(f, "{}/{}", self.num, self.den)
        }
    }
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

/// Properties of the source video that clip compilation depends on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoProperties {
    /// Frame width in pixels.
    pub width: u32,

    /// Frame height in pixels.
    pub height: u32,

    /// Native frame rate, also used as the output frame rate.
    pub frame_rate: FrameRate,

    /// Overall bitrate in kbps, when known.
    pub bit_rate_kbps: Option<f64>,

    /// Color space reported by the container (e.g. `bt709`).
    #[serde(default)]
    pub color_space: Option<String>,
}

impl VideoProperties {
    /// Source pixel area.
    pub fn area(&self) -> f64 {
        self.width as f64 * self.height as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ntsc_rate() {
        let rate: FrameRate = "30000/1001".parse().unwrap();
        assert_eq!(rate.numerator(), 30000);
        assert_eq!(rate.denominator(), 1001);
        assert!((rate.as_f64() - 29.97002997).abs() < 1e-6);
        assert!((rate.frame_duration() - 1001.0 / 30000.0).abs() < 1e-12);
    }

    #[test]
    fn test_parse_reduces_and_displays() {
        let rate: FrameRate = "60/1".parse().unwrap();
        assert_eq!(rate.to_string(), "60");
        let rate: FrameRate = "50/2".parse().unwrap();
        assert_eq!(rate.to_string(), "25");
        let rate: FrameRate = "24".parse().unwrap();
        assert_eq!(rate, FrameRate::new(24, 1).unwrap());
    }

    #[test]
    fn test_parse_decimal_rate() {
        let rate: FrameRate = "29.97".parse().unwrap();
        assert_eq!(rate.to_string(), "2997/100");
    }

    #[test]
    fn test_rejects_zero_and_garbage() {
        assert!("0/1".parse::<FrameRate>().is_err());
        assert!("30/0".parse::<FrameRate>().is_err());
        assert!("fast".parse::<FrameRate>().is_err());
        assert!("-30".parse::<FrameRate>().is_err());
    }

    #[test]
    fn test_frame_rate_serializes_as_string() {
        let rate = FrameRate::new(30000, 1001).unwrap();
        let json = serde_json::to_string(&rate).unwrap();
        assert_eq!(json, "\"30000/1001\"");
        let back: FrameRate = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rate);
    }
}
