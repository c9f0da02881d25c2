//! Easing curves for crossfade opacity.
//!
//! Each curve maps progress `p ∈ [0, 1]` to `[0, 1]` and can be evaluated
//! numerically or emitted as ffmpeg expression text over a progress
//! expression.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    Linear,
    #[default]
    InOutCubic,
    InOutSine,
    OutCircle,
}

impl Easing {
    /// Eased progress. Input is clamped to `[0, 1]`.
    pub fn ease(&self, progress: f64) -> f64 {
        let p = progress.clamp(0.0, 1.0);
        match self {
            Self::Linear => p,
            Self::InOutCubic => {
                if 2.0 * p < 1.0 {
                    4.0 * p * p * p
                } else {
                    1.0 + (p - 1.0).powi(3) * 4.0
                }
            }
            Self::InOutSine => 0.5 * (1.0 - (p * std::f64::consts::PI).cos()),
            Self::OutCircle => (1.0 - (p - 1.0).powi(2)).sqrt(),
        }
    }

    /// Interpolate from `from` to `to`.
    pub fn blend(&self, from: f64, to: f64, progress: f64) -> f64 {
        from + (to - from) * self.ease(progress)
    }

    /// Expression text for the eased value of `progress`.
    pub fn expression(&self, progress: &str) -> String {
        let p = format!("({progress})");
        match self {
            Self::Linear => p,
            Self::InOutCubic => {
                format!("if(lt((2*{p}),1),{p}*(2*{p})^2,1+(({p}-1)^3)*4)")
            }
            Self::InOutSine => format!("0.5*(1-cos({p}*PI))"),
            Self::OutCircle => format!("sqrt(1-({p}-1)^2)"),
        }
    }

    /// Expression text interpolating between two expressions.
    pub fn blend_expression(&self, from: &str, to: &str, progress: &str) -> String {
        format!("({from}+({to}-{from})*{})", self.expression(progress))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Easing; 4] = [
        Easing::Linear,
        Easing::InOutCubic,
        Easing::InOutSine,
        Easing::OutCircle,
    ];

    #[test]
    fn test_endpoints() {
        for easing in ALL {
            assert!(easing.ease(0.0).abs() < 1e-12, "{easing:?} at 0");
            assert!((easing.ease(1.0) - 1.0).abs() < 1e-12, "{easing:?} at 1");
        }
    }

    #[test]
    fn test_monotone_on_unit_interval() {
        for easing in ALL {
            let mut prev = easing.ease(0.0);
            for i in 1..=100 {
                let next = easing.ease(i as f64 / 100.0);
                assert!(next + 1e-12 >= prev, "{easing:?} decreased at {i}");
                prev = next;
            }
        }
    }

    #[test]
    fn test_cubic_midpoint_and_clamp() {
        assert!((Easing::InOutCubic.ease(0.5) - 0.5).abs() < 1e-12);
        assert_eq!(Easing::InOutCubic.ease(-1.0), 0.0);
        assert_eq!(Easing::InOutCubic.ease(3.0), 1.0);
    }

    #[test]
    fn test_blend_runs_between_values() {
        assert!((Easing::Linear.blend(1.0, 0.0, 0.25) - 0.75).abs() < 1e-12);
        assert_eq!(Easing::InOutSine.blend(1.0, 0.0, 1.0), 0.0);
    }

    #[test]
    fn test_expression_text() {
        assert_eq!(
            Easing::InOutCubic.expression("T/0.5"),
            "if(lt((2*(T/0.5)),1),(T/0.5)*(2*(T/0.5))^2,1+(((T/0.5)-1)^3)*4)"
        );
        assert_eq!(
            Easing::Linear.blend_expression("1", "0", "T/F"),
            "(1+(0-1)*(T/F))"
        );
    }
}
