//! Loop composition.
//!
//! Builds seamless loops from a clip's time remap:
//! - **Forward-reverse:** the clip plays forward, then backward with the
//!   speed multipliers reversed, dropping the shared turnaround frame.
//! - **Crossfade:** the head and tail windows overlap, the tail fading out
//!   over the head so the last frame blends into the first.

use markercut_clip_model::settings::LoopMode;
use markercut_clip_model::video::FrameRate;
use markercut_common::error::MarkercutResult;
use serde::Serialize;

use crate::easing::Easing;
use crate::speed_map::SpeedMap;
use crate::time_remap::{integrate, round_millis, TimeRemap};

/// Shortest crossfade that still reads as a fade.
pub const MIN_FADE_DURATION: f64 = 0.1;

/// Longest crossfade as a share of the clip.
pub const MAX_FADE_FRACTION: f64 = 0.4;

/// Requested loop behavior for one clip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum LoopSpec {
    None,
    ForwardReverse,
    Crossfade { fade_duration: f64, easing: Easing },
}

impl LoopSpec {
    pub fn from_options(mode: LoopMode, fade_duration: f64) -> Self {
        match mode {
            LoopMode::None => Self::None,
            LoopMode::ForwardReverse => Self::ForwardReverse,
            LoopMode::Crossfade => Self::Crossfade {
                fade_duration,
                easing: Easing::default(),
            },
        }
    }
}

/// Head and tail windows of a crossfade loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CrossfadeWindows {
    /// Duration of the remapped clip being looped.
    pub clip_duration: f64,
    /// Clamped fade length.
    pub fade_duration: f64,
    pub easing: Easing,
}

impl CrossfadeWindows {
    pub fn new(clip_duration: f64, requested_fade: f64, easing: Easing) -> Self {
        Self {
            clip_duration,
            fade_duration: clamp_fade_duration(requested_fade, clip_duration),
            easing,
        }
    }

    /// Time where the tail window starts.
    pub fn tail_start(&self) -> f64 {
        self.clip_duration - self.fade_duration
    }

    /// Opacity of the tail at `t` seconds into the fade.
    pub fn tail_alpha(&self, t: f64) -> f64 {
        self.easing.blend(1.0, 0.0, t / self.fade_duration)
    }

    /// Opacity expression over the tail window's own timeline.
    pub fn tail_alpha_expression(&self) -> String {
        self.easing
            .blend_expression("1", "0", &format!("T/{}", self.fade_duration))
    }
}

/// A clip's remap with its loop composition applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LoopComposite {
    Plain {
        remap: TimeRemap,
    },
    ForwardReverse {
        forward: TimeRemap,
        reverse: TimeRemap,
        output_duration: f64,
    },
    Crossfade {
        remap: TimeRemap,
        windows: CrossfadeWindows,
        output_duration: f64,
    },
}

impl LoopComposite {
    /// Duration of the final output.
    pub fn output_duration(&self) -> f64 {
        match self {
            Self::Plain { remap } => remap.output_duration,
            Self::ForwardReverse {
                output_duration, ..
            }
            | Self::Crossfade {
                output_duration, ..
            } => *output_duration,
        }
    }

    /// The remap of the forward (or only) pass.
    pub fn primary_remap(&self) -> &TimeRemap {
        match self {
            Self::Plain { remap } | Self::Crossfade { remap, .. } => remap,
            Self::ForwardReverse { forward, .. } => forward,
        }
    }

    pub fn is_loop(&self) -> bool {
        !matches!(self, Self::Plain { .. })
    }
}

/// `max(0.1, min(requested, 0.4·clip_duration))`.
pub fn clamp_fade_duration(requested: f64, clip_duration: f64) -> f64 {
    requested
        .min(MAX_FADE_FRACTION * clip_duration)
        .max(MIN_FADE_DURATION)
}

/// Integrate `map` and apply the loop composition.
pub fn compose_loop(
    map: &SpeedMap,
    frame_rate: FrameRate,
    spec: LoopSpec,
) -> MarkercutResult<LoopComposite> {
    let remap = integrate(map, frame_rate)?;

    let composite = match spec {
        LoopSpec::None => LoopComposite::Plain { remap },
        LoopSpec::ForwardReverse => {
            let reverse = integrate(&map.with_reversed_speeds(), frame_rate)?;
            let output_duration = round_millis(
                remap.output_duration + reverse.output_duration - remap.frame_duration,
            );
            LoopComposite::ForwardReverse {
                forward: remap,
                reverse,
                output_duration,
            }
        }
        LoopSpec::Crossfade {
            fade_duration,
            easing,
        } => {
            let windows = CrossfadeWindows::new(remap.output_duration, fade_duration, easing);
            let output_duration = round_millis(windows.tail_start());
            LoopComposite::Crossfade {
                remap,
                windows,
                output_duration,
            }
        }
    };
    Ok(composite)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speed_map::ControlPoint;

    fn constant(duration: f64) -> SpeedMap {
        SpeedMap::constant(0.0, duration, 1.0).unwrap()
    }

    fn fps25() -> FrameRate {
        FrameRate::new(25, 1).unwrap()
    }

    #[test]
    fn test_plain_matches_remap() {
        let composite = compose_loop(&constant(2.0), fps25(), LoopSpec::None).unwrap();
        assert!(!composite.is_loop());
        assert_eq!(composite.output_duration(), 2.0);
    }

    #[test]
    fn test_forward_reverse_drops_one_frame() {
        let composite = compose_loop(&constant(2.0), fps25(), LoopSpec::ForwardReverse).unwrap();
        assert_eq!(composite.output_duration(), 3.96);
    }

    #[test]
    fn test_forward_reverse_uses_reversed_speeds() {
        let map = SpeedMap::new(vec![
            ControlPoint {
                time: 0.0,
                speed: 1.0,
            },
            ControlPoint {
                time: 1.0,
                speed: 0.5,
            },
            ControlPoint {
                time: 3.0,
                speed: 0.5,
            },
        ])
        .unwrap();
        let composite = compose_loop(&map, fps25(), LoopSpec::ForwardReverse).unwrap();
        let LoopComposite::ForwardReverse {
            forward, reverse, ..
        } = composite
        else {
            panic!("expected forward-reverse");
        };
        assert_ne!(forward.expression, reverse.expression);
    }

    #[test]
    fn test_crossfade_shortens_by_fade() {
        let spec = LoopSpec::Crossfade {
            fade_duration: 0.5,
            easing: Easing::InOutCubic,
        };
        let composite = compose_loop(&constant(4.0), fps25(), spec).unwrap();
        assert_eq!(composite.output_duration(), 3.5);
    }

    #[test]
    fn test_fade_clamping() {
        assert_eq!(clamp_fade_duration(0.01, 10.0), 0.1);
        assert_eq!(clamp_fade_duration(9.0, 1.0), 0.4);
        assert_eq!(clamp_fade_duration(0.3, 1.0), 0.3);
    }

    #[test]
    fn test_tail_alpha_fades_out() {
        let windows = CrossfadeWindows::new(4.0, 0.5, Easing::Linear);
        assert_eq!(windows.tail_alpha(0.0), 1.0);
        assert_eq!(windows.tail_alpha(0.5), 0.0);
        assert!((windows.tail_alpha(0.25) - 0.5).abs() < 1e-12);
        assert_eq!(
            windows.tail_alpha_expression(),
            "(1+(0-1)*(T/0.5))"
        );
    }

    #[test]
    fn test_spec_from_options() {
        assert_eq!(LoopSpec::from_options(LoopMode::None, 0.5), LoopSpec::None);
        assert!(matches!(
            LoopSpec::from_options(LoopMode::Crossfade, 0.7),
            LoopSpec::Crossfade { fade_duration, .. } if fade_duration == 0.7
        ));
    }
}
