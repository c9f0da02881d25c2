//! Time-remap integration.
//!
//! Integrates the reciprocal of a piecewise-linear speed curve into a
//! closed-form output-time function. Constant segments contribute
//! `elapsed / speed`; ramps with speed `v(t) = m·t + b` contribute
//! `(1/m)·(ln|m·t + b| − ln|m·t₀ + b|)`. The same terms are rendered as a
//! `setpts` expression and evaluated numerically, so the expression and the
//! reported output duration cannot drift apart.
//!
//! Times inside the expression are relative to the first frame boundary at
//! or after the map start: the map start is rarely frame-aligned, so every
//! segment start is shifted back by the gap to the next whole frame
//! ("start correction").

use markercut_clip_model::video::FrameRate;
use markercut_common::error::{MarkercutError, MarkercutResult};
use serde::Serialize;
use tracing::debug;

use crate::speed_map::SpeedMap;

/// Values this close to an integer are treated as that integer before
/// ceil/floor at frame boundaries.
const FRAME_SNAP_EPSILON: f64 = 1e-9;

/// An end point closer than this to the frame boundary below it lands on the
/// boundary and must drop one frame to stay inside the input.
const LAST_FRAME_EPSILON: f64 = 1e-10;

/// Ramps flatter than this (speed change per input second) integrate as a
/// constant segment at their mean speed; `1/slope` is unstable below it.
const MIN_RAMP_SLOPE: f64 = 1e-9;

/// Elapsed-input variable inside the expression.
const ELAPSED: &str = "(T-STARTT)";

/// One additive term of the output-time function.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RemapTerm {
    /// Constant-speed segment starting at `start` lasting `span` input seconds.
    Constant { start: f64, span: f64, speed: f64 },
    /// Linear ramp over `[start, end]` with speed `slope·t + intercept`.
    Ramp {
        start: f64,
        end: f64,
        slope: f64,
        intercept: f64,
    },
}

impl RemapTerm {
    pub fn start(&self) -> f64 {
        match *self {
            Self::Constant { start, .. } | Self::Ramp { start, .. } => start,
        }
    }

    /// Output seconds contributed after `elapsed` corrected input seconds.
    pub fn contribution(&self, elapsed: f64) -> f64 {
        if elapsed < self.start() {
            return 0.0;
        }
        match *self {
            Self::Constant { start, span, speed } => (elapsed - start).min(span) / speed,
            Self::Ramp {
                start,
                end,
                slope,
                intercept,
            } => {
                let upper = elapsed.min(end);
                (1.0 / slope)
                    * ((slope * upper + intercept).abs().ln()
                        - (slope * start + intercept).abs().ln())
            }
        }
    }

    /// Output seconds contributed by the whole segment.
    pub fn total(&self) -> f64 {
        match *self {
            Self::Constant { span, speed, .. } => span / speed,
            Self::Ramp { end, .. } => self.contribution(end),
        }
    }

    /// Gated expression text: zero until the segment starts.
    pub fn render(&self) -> String {
        let body = match *self {
            Self::Constant { start, span, speed } => format!(
                "(min(({ELAPSED}-{}),{})/{})",
                num(start),
                num(span),
                num(speed)
            ),
            Self::Ramp {
                start,
                end,
                slope,
                intercept,
            } => {
                let m = num(slope);
                let b = num(intercept);
                format!(
                    "(1/{m})*(log(abs({m}*min({ELAPSED},{})+{b}))-log(abs({m}*{}+{b})))",
                    num(end),
                    num(start)
                )
            }
        };
        format!("if(gte({ELAPSED},{}),{body},0)", num(self.start()))
    }
}

/// Sum of segment terms, in segment order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemapExpression {
    terms: Vec<RemapTerm>,
}

impl RemapExpression {
    pub fn terms(&self) -> &[RemapTerm] {
        &self.terms
    }

    /// Output time of a frame that sits `elapsed` corrected seconds into the
    /// clip. The first frame is pinned to zero.
    pub fn output_time(&self, frame_index: u64, elapsed: f64) -> f64 {
        if frame_index == 0 {
            return 0.0;
        }
        self.terms.iter().map(|t| t.contribution(elapsed)).sum()
    }

    /// Expression body in seconds, without the `setpts` wrapper.
    pub fn render_body(&self) -> String {
        let mut out = String::new();
        for (i, term) in self.terms.iter().enumerate() {
            if i == 0 {
                out.push_str(&format!("(if(eq(N,0),0,{}))", term.render()));
            } else {
                out.push_str(&format!("+({})", term.render()));
            }
        }
        out
    }

    /// Complete `setpts` filter.
    pub fn render_setpts(&self) -> String {
        format!("setpts='({})/TB'", self.render_body())
    }
}

/// Result of integrating one speed map at one frame rate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeRemap {
    pub expression: RemapExpression,
    /// Gap between the map start and the next frame boundary.
    pub start_correction: f64,
    /// Sum of segment contributions before quantization.
    pub raw_duration: f64,
    /// Frame-quantized output duration, rounded to milliseconds.
    pub output_duration: f64,
    pub frame_duration: f64,
    /// Segments dropped for spanning no time.
    pub skipped_segments: usize,
}

impl TimeRemap {
    pub fn render_setpts(&self) -> String {
        self.expression.render_setpts()
    }
}

/// Integrate a speed map into a time remap.
///
/// Fails only when every segment collapses, which happens for clips shorter
/// than a frame.
pub fn integrate(map: &SpeedMap, frame_rate: FrameRate) -> MarkercutResult<TimeRemap> {
    let frame_duration = frame_rate.frame_duration();
    let map_start = map.start();
    let start_correction = snap_ceil(map_start / frame_duration) * frame_duration - map_start;
    let offset = map_start + start_correction;
    let segment_count = map.points().len() - 1;

    let mut terms = Vec::with_capacity(segment_count);
    let mut raw_duration = 0.0;
    let mut skipped_segments = 0;

    for (i, (left, right)) in map.segments().enumerate() {
        let start = left.time - offset;
        let end = if i + 1 == segment_count {
            last_frame_end(right.time, frame_duration, offset)
        } else {
            right.time - offset
        };

        let span = end - start;
        if span <= 0.0 {
            debug!(segment = i, start, end, "Skipping empty speed-map segment");
            skipped_segments += 1;
            continue;
        }

        let slope = (right.speed - left.speed) / span;
        let term = if slope.abs() < MIN_RAMP_SLOPE {
            RemapTerm::Constant {
                start,
                span,
                speed: (left.speed + right.speed) / 2.0,
            }
        } else {
            RemapTerm::Ramp {
                start,
                end,
                slope,
                intercept: left.speed - slope * start,
            }
        };
        raw_duration += term.total();
        terms.push(term);
    }

    if terms.is_empty() {
        return Err(MarkercutError::invalid_speed_map(format!(
            "no segment spans a full frame between {map_start} and {}",
            map.end()
        )));
    }

    let output_duration = quantize_duration(raw_duration, frame_duration);
    debug!(
        segments = terms.len(),
        skipped_segments, raw_duration, output_duration, "Integrated speed map"
    );

    Ok(TimeRemap {
        expression: RemapExpression { terms },
        start_correction,
        raw_duration,
        output_duration,
        frame_duration,
        skipped_segments,
    })
}

/// Corrected end of the last segment: the last frame boundary strictly
/// before `end`, floored to microseconds.
fn last_frame_end(end: f64, frame_duration: f64, offset: f64) -> f64 {
    let mut boundary = snap_floor(end / frame_duration) * frame_duration;
    if end - boundary < LAST_FRAME_EPSILON {
        boundary -= frame_duration;
    }
    floor_micros(boundary - offset)
}

/// Round to the nearest whole frame, add one frame, round to milliseconds.
pub fn quantize_duration(raw: f64, frame_duration: f64) -> f64 {
    let frames = (raw / frame_duration).round_ties_even();
    round_millis(frames * frame_duration + frame_duration)
}

/// Round to milliseconds, ties to even.
pub fn round_millis(value: f64) -> f64 {
    (value * 1000.0).round_ties_even() / 1000.0
}

fn snap_ceil(value: f64) -> f64 {
    let nearest = value.round();
    if (value - nearest).abs() < FRAME_SNAP_EPSILON {
        nearest
    } else {
        value.ceil()
    }
}

fn snap_floor(value: f64) -> f64 {
    let nearest = value.round();
    if (value - nearest).abs() < FRAME_SNAP_EPSILON {
        nearest
    } else {
        value.floor()
    }
}

fn floor_micros(value: f64) -> f64 {
    // Tolerate representation error just below a whole microsecond.
    (value * 1e6 + 1e-6).floor() / 1e6
}

/// Shortest literal that parses back to `value`, parenthesized when negative.
fn num(value: f64) -> String {
    if value < 0.0 {
        format!("({value})")
    } else {
        format!("{value}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speed_map::ControlPoint;

    fn fps30() -> FrameRate {
        FrameRate::new(30, 1).unwrap()
    }

    fn map(points: &[(f64, f64)]) -> SpeedMap {
        SpeedMap::new(
            points
                .iter()
                .map(|&(time, speed)| ControlPoint { time, speed })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_identity_map_keeps_duration() {
        let remap = integrate(&map(&[(0.0, 1.0), (2.0, 1.0)]), fps30()).unwrap();
        assert_eq!(remap.start_correction, 0.0);
        assert_eq!(remap.output_duration, 2.0);
        assert_eq!(remap.expression.terms().len(), 1);

        let expr = &remap.expression;
        assert_eq!(expr.output_time(0, 0.0), 0.0);
        assert!((expr.output_time(30, 1.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_half_speed_doubles_duration() {
        let remap = integrate(&map(&[(0.0, 0.5), (2.0, 0.5)]), fps30()).unwrap();
        assert!((remap.output_duration - 4.0).abs() <= remap.frame_duration + 1e-9);
    }

    #[test]
    fn test_two_segment_ramp_example() {
        // 1 s at 1x then 1 s ramping from 1x to 0.5x: 1 + 2·ln 2 ≈ 2.386 s.
        let remap = integrate(&map(&[(0.0, 1.0), (1.0, 1.0), (2.0, 0.5)]), fps30()).unwrap();
        let terms = remap.expression.terms();
        assert_eq!(terms.len(), 2);
        assert!(matches!(terms[0], RemapTerm::Constant { .. }));
        assert!(matches!(terms[1], RemapTerm::Ramp { .. }));

        // The last frame is excluded, so the ramp ends slightly early.
        let expected = 1.0 + 2.0 * std::f64::consts::LN_2;
        assert!(remap.raw_duration < expected);
        assert!((remap.raw_duration - expected).abs() < 0.1);
        assert!((remap.output_duration - expected).abs() < 0.1);
    }

    #[test]
    fn test_unaligned_start_is_corrected() {
        let remap = integrate(&map(&[(0.01, 1.0), (1.0, 1.0)]), fps30()).unwrap();
        let fd = 1.0 / 30.0;
        assert!((remap.start_correction - (fd - 0.01)).abs() < 1e-12);
        assert!((remap.expression.terms()[0].start() + remap.start_correction).abs() < 1e-12);
    }

    #[test]
    fn test_zero_span_segment_is_skipped() {
        // The last segment collapses once its end is pulled back a frame.
        let remap = integrate(
            &map(&[(0.0, 1.0), (1.0, 1.0), (1.0 + 1.0 / 60.0, 2.0)]),
            fps30(),
        )
        .unwrap();
        assert_eq!(remap.skipped_segments, 1);
        assert_eq!(remap.expression.terms().len(), 1);
    }

    #[test]
    fn test_subframe_clip_is_rejected() {
        let err = integrate(&map(&[(0.0, 1.0), (0.01, 1.0)]), fps30()).unwrap_err();
        assert!(matches!(err, MarkercutError::InvalidSpeedMap { .. }));
    }

    #[test]
    fn test_rendered_expression_shape() {
        let remap = integrate(&map(&[(0.0, 1.0), (1.0, 1.0), (2.0, 0.5)]), fps30()).unwrap();
        let setpts = remap.render_setpts();
        assert!(setpts.starts_with("setpts='((if(eq(N,0),0,if(gte((T-STARTT),0),(min(((T-STARTT)-0),1)/1)"));
        assert!(setpts.ends_with(")/TB'"));
        assert!(setpts.contains("+(if(gte((T-STARTT),1),(1/(-0.5"));
        assert!(setpts.contains("log(abs("));
    }

    #[test]
    fn test_negative_literals_are_parenthesized() {
        assert_eq!(num(-0.25), "(-0.25)");
        assert_eq!(num(0.25), "0.25");
    }

    #[test]
    fn test_literals_keep_full_precision() {
        for value in [1e-7, 1.67e-4, 1.0 / 3.0, 9.966666, 2.5e-3] {
            assert_eq!(num(value).parse::<f64>().unwrap(), value);
        }
        assert_eq!(num(1e-7), "0.0000001");
    }

    #[test]
    fn test_gentle_ramp_renders_nonzero_coefficients() {
        let remap = integrate(&map(&[(0.0, 1.0), (10.0, 1.000001)]), fps30()).unwrap();
        let RemapTerm::Ramp {
            slope, intercept, ..
        } = remap.expression.terms()[0]
        else {
            panic!("expected a ramp term");
        };
        assert!(slope > 0.0);
        assert_eq!(num(slope).parse::<f64>().unwrap(), slope);
        assert_ne!(num(slope).parse::<f64>().unwrap(), 0.0);
        assert_ne!(num(intercept).parse::<f64>().unwrap(), 0.0);

        let setpts = remap.render_setpts();
        assert!(!setpts.contains("(1/0)"));
        assert!(setpts.contains(&format!("(1/{})", num(slope))));

        let total = remap.expression.terms()[0].total();
        assert!(total.is_finite());
        assert!((total - remap.raw_duration).abs() < 1e-12);
        assert!((remap.raw_duration - 9.966666).abs() < 1e-4);
    }

    #[test]
    fn test_near_flat_ramp_integrates_as_constant() {
        let remap = integrate(&map(&[(0.0, 1.0), (10.0, 1.0 + 1e-12)]), fps30()).unwrap();
        assert!(matches!(
            remap.expression.terms()[0],
            RemapTerm::Constant { .. }
        ));
        assert!(remap.raw_duration.is_finite());
        assert!((remap.raw_duration - 9.966666).abs() < 1e-6);
    }

    #[test]
    fn test_round_millis_ties_to_even() {
        assert_eq!(round_millis(0.0625), 0.062);
        assert_eq!(round_millis(0.1875), 0.188);
        assert_eq!(round_millis(1.2344), 1.234);
    }

    #[test]
    fn test_quantize_duration_adds_one_frame() {
        assert_eq!(quantize_duration(1.0, 0.04), 1.04);
        assert_eq!(quantize_duration(0.999, 0.04), 1.04);
    }

    #[test]
    fn test_remap_serializes_terms_with_kind() {
        let remap = integrate(&map(&[(0.0, 1.0), (1.0, 2.0)]), fps30()).unwrap();
        let json = serde_json::to_value(&remap).unwrap();
        assert_eq!(json["expression"]["terms"][0]["kind"], "ramp");
    }
}
