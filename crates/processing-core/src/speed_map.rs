//! Speed map model.
//!
//! A speed map is a piecewise-linear playback-speed curve over a clip's
//! input time, given as control points with strictly increasing times and
//! strictly positive multipliers.

use markercut_clip_model::markers::SpeedPoint;
use markercut_clip_model::settings::LoopMode;
use markercut_common::error::{MarkercutError, MarkercutResult};
use serde::Serialize;

/// A validated control point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ControlPoint {
    /// Input time in seconds.
    pub time: f64,
    /// Speed multiplier at `time`.
    pub speed: f64,
}

/// Ordered control points, at least two, validated on construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeedMap {
    points: Vec<ControlPoint>,
}

/// A normalized speed map plus whether it should be treated as variable speed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeedProfile {
    pub map: SpeedMap,
    pub is_variable_speed: bool,
}

impl SpeedMap {
    /// Validate and wrap control points.
    pub fn new(points: Vec<ControlPoint>) -> MarkercutResult<Self> {
        if points.len() < 2 {
            return Err(MarkercutError::invalid_speed_map(format!(
                "needs at least two control points, got {}",
                points.len()
            )));
        }

        for (i, point) in points.iter().enumerate() {
            if !point.time.is_finite() {
                return Err(MarkercutError::invalid_speed_map(format!(
                    "point {i} has a non-finite time"
                )));
            }
            if !point.speed.is_finite() || point.speed <= 0.0 {
                return Err(MarkercutError::invalid_speed_map(format!(
                    "point {i} has speed {} (must be > 0)",
                    point.speed
                )));
            }
        }

        if let Some(w) = points.windows(2).find(|w| w[1].time <= w[0].time) {
            return Err(MarkercutError::invalid_speed_map(format!(
                "times must be strictly increasing ({} then {})",
                w[0].time, w[1].time
            )));
        }

        Ok(Self { points })
    }

    /// Two-point constant-speed map over `[start, end]`.
    pub fn constant(start: f64, end: f64, speed: f64) -> MarkercutResult<Self> {
        Self::new(vec![
            ControlPoint { time: start, speed },
            ControlPoint { time: end, speed },
        ])
    }

    pub fn points(&self) -> &[ControlPoint] {
        &self.points
    }

    /// Time of the first control point.
    pub fn start(&self) -> f64 {
        self.points[0].time
    }

    /// Time of the last control point.
    pub fn end(&self) -> f64 {
        self.points[self.points.len() - 1].time
    }

    /// Whether every multiplier is the same.
    pub fn is_constant(&self) -> bool {
        self.points.windows(2).all(|w| w[0].speed == w[1].speed)
    }

    /// Adjacent control-point pairs.
    pub fn segments(&self) -> impl Iterator<Item = (ControlPoint, ControlPoint)> + '_ {
        self.points.windows(2).map(|w| (w[0], w[1]))
    }

    /// Same times, multipliers reversed pointwise.
    ///
    /// Used for the reverse half of a forward-reverse loop.
    pub fn with_reversed_speeds(&self) -> SpeedMap {
        let points = self
            .points
            .iter()
            .zip(self.points.iter().rev())
            .map(|(at, from)| ControlPoint {
                time: at.time,
                speed: from.speed,
            })
            .collect();
        Self { points }
    }
}

/// Normalize a marker pair's speed specification.
///
/// Without an explicit map a constant two-point map over `[start, end]` at
/// `fallback_speed` is produced. Variable speed is never reported for
/// forward-reverse loops: reversed variable speed is unsupported there and
/// silently disabled.
pub fn normalize(
    raw: Option<&[SpeedPoint]>,
    fallback_speed: f64,
    start: f64,
    end: f64,
    loop_mode: LoopMode,
) -> MarkercutResult<SpeedProfile> {
    let map = match raw {
        Some(points) => SpeedMap::new(
            points
                .iter()
                .map(|p| ControlPoint {
                    time: p.x,
                    speed: p.y,
                })
                .collect(),
        )?,
        None => SpeedMap::constant(start, end, fallback_speed)?,
    };

    let is_variable_speed = !map.is_constant() && loop_mode != LoopMode::ForwardReverse;

    Ok(SpeedProfile {
        map,
        is_variable_speed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sp(x: f64, y: f64) -> SpeedPoint {
        SpeedPoint { x, y }
    }

    #[test]
    fn test_fallback_is_two_point_constant() {
        let profile = normalize(None, 0.5, 3.0, 7.0, LoopMode::None).unwrap();
        assert_eq!(
            profile.map.points(),
            &[
                ControlPoint {
                    time: 3.0,
                    speed: 0.5
                },
                ControlPoint {
                    time: 7.0,
                    speed: 0.5
                }
            ]
        );
        assert!(!profile.is_variable_speed);
    }

    #[test]
    fn test_explicit_map_detects_variable_speed() {
        let raw = [sp(0.0, 1.0), sp(1.0, 1.0), sp(2.0, 0.25)];
        let profile = normalize(Some(&raw), 1.0, 0.0, 2.0, LoopMode::None).unwrap();
        assert!(profile.is_variable_speed);
        assert_eq!(profile.map.points().len(), 3);
    }

    #[test]
    fn test_forward_reverse_disables_variable_speed() {
        let raw = [sp(0.0, 1.0), sp(2.0, 0.25)];
        let profile = normalize(Some(&raw), 1.0, 0.0, 2.0, LoopMode::ForwardReverse).unwrap();
        assert!(!profile.is_variable_speed);
        assert!(!profile.map.is_constant());
    }

    #[test]
    fn test_rejects_degenerate_maps() {
        assert!(normalize(Some(&[sp(0.0, 1.0)]), 1.0, 0.0, 1.0, LoopMode::None).is_err());
        assert!(normalize(
            Some(&[sp(0.0, 1.0), sp(1.0, 0.0)]),
            1.0,
            0.0,
            1.0,
            LoopMode::None
        )
        .is_err());
        assert!(normalize(
            Some(&[sp(1.0, 1.0), sp(1.0, 2.0)]),
            1.0,
            0.0,
            1.0,
            LoopMode::None
        )
        .is_err());
        assert!(normalize(None, -1.0, 0.0, 1.0, LoopMode::None).is_err());
        assert!(normalize(None, 1.0, 2.0, 1.0, LoopMode::None).is_err());
    }

    #[test]
    fn test_invalid_map_error_kind() {
        let err = SpeedMap::new(vec![]).unwrap_err();
        assert!(matches!(err, MarkercutError::InvalidSpeedMap { .. }));
    }

    #[test]
    fn test_reversed_speeds_keep_times() {
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
                speed: 2.0,
            },
        ])
        .unwrap();
        let reversed = map.with_reversed_speeds();
        let times: Vec<f64> = reversed.points().iter().map(|p| p.time).collect();
        let speeds: Vec<f64> = reversed.points().iter().map(|p| p.speed).collect();
        assert_eq!(times, vec![0.0, 1.0, 3.0]);
        assert_eq!(speeds, vec![2.0, 0.5, 1.0]);
    }
}
