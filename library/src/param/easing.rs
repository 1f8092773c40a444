use std::f64::consts::FRAC_PI_2;

use serde::{Deserialize, Serialize};

/// Shapes the normalized position between two keyframes.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EasingFunction {
    #[default]
    Linear,
    EaseInSine,
    EaseOutSine,
    EaseInOutSine,
    EaseInQuad,
    EaseOutQuad,
    EaseInOutQuad,
    EaseInCubic,
    EaseOutCubic,
    EaseInOutCubic,
    EaseInExpo,
    EaseOutExpo,
    EaseInOutExpo,
}

impl EasingFunction {
    const ALL: [EasingFunction; 13] = [
        EasingFunction::Linear,
        EasingFunction::EaseInSine,
        EasingFunction::EaseOutSine,
        EasingFunction::EaseInOutSine,
        EasingFunction::EaseInQuad,
        EasingFunction::EaseOutQuad,
        EasingFunction::EaseInOutQuad,
        EasingFunction::EaseInCubic,
        EasingFunction::EaseOutCubic,
        EasingFunction::EaseInOutCubic,
        EasingFunction::EaseInExpo,
        EasingFunction::EaseOutExpo,
        EasingFunction::EaseInOutExpo,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EasingFunction::Linear => "linear",
            EasingFunction::EaseInSine => "easeInSine",
            EasingFunction::EaseOutSine => "easeOutSine",
            EasingFunction::EaseInOutSine => "easeInOutSine",
            EasingFunction::EaseInQuad => "easeInQuad",
            EasingFunction::EaseOutQuad => "easeOutQuad",
            EasingFunction::EaseInOutQuad => "easeInOutQuad",
            EasingFunction::EaseInCubic => "easeInCubic",
            EasingFunction::EaseOutCubic => "easeOutCubic",
            EasingFunction::EaseInOutCubic => "easeInOutCubic",
            EasingFunction::EaseInExpo => "easeInExpo",
            EasingFunction::EaseOutExpo => "easeOutExpo",
            EasingFunction::EaseInOutExpo => "easeInOutExpo",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.name().eq_ignore_ascii_case(name))
    }

    fn curve(self) -> Option<(fn(f64) -> f64, Mode)> {
        use EasingFunction::*;
        let (curve, mode): (fn(f64) -> f64, Mode) = match self {
            Linear => return None,
            EaseInSine => (in_sine, Mode::In),
            EaseOutSine => (in_sine, Mode::Out),
            EaseInOutSine => (in_sine, Mode::InOut),
            EaseInQuad => (in_quad, Mode::In),
            EaseOutQuad => (in_quad, Mode::Out),
            EaseInOutQuad => (in_quad, Mode::InOut),
            EaseInCubic => (in_cubic, Mode::In),
            EaseOutCubic => (in_cubic, Mode::Out),
            EaseInOutCubic => (in_cubic, Mode::InOut),
            EaseInExpo => (in_expo, Mode::In),
            EaseOutExpo => (in_expo, Mode::Out),
            EaseInOutExpo => (in_expo, Mode::InOut),
        };
        Some((curve, mode))
    }

    /// Maps `t` in `[0, 1]` onto the eased position. Ends stay fixed at 0 and 1.
    pub fn apply(self, t: f64) -> f64 {
        let Some((ease_in, mode)) = self.curve() else {
            return t;
        };
        match mode {
            Mode::In => ease_in(t),
            Mode::Out => 1.0 - ease_in(1.0 - t),
            Mode::InOut if t < 0.5 => ease_in(2.0 * t) / 2.0,
            Mode::InOut => 1.0 - ease_in(2.0 - 2.0 * t) / 2.0,
        }
    }
}

#[derive(Clone, Copy)]
enum Mode {
    In,
    Out,
    InOut,
}

fn in_sine(t: f64) -> f64 {
    1.0 - (t * FRAC_PI_2).cos()
}

fn in_quad(t: f64) -> f64 {
    t * t
}

fn in_cubic(t: f64) -> f64 {
    t * t * t
}

fn in_expo(t: f64) -> f64 {
    if t <= 0.0 { 0.0 } else { 2.0_f64.powf(10.0 * (t - 1.0)) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_end_points_are_fixed() {
        for easing in EasingFunction::ALL {
            assert!(easing.apply(0.0).abs() < 1e-9, "{}", easing.name());
            assert!((easing.apply(1.0) - 1.0).abs() < 1e-9, "{}", easing.name());
        }
    }

    #[test]
    fn test_in_out_is_symmetric() {
        assert!((EasingFunction::EaseInOutCubic.apply(0.5) - 0.5).abs() < 1e-12);
        assert_eq!(EasingFunction::EaseInQuad.apply(0.5), 0.25);
        assert_eq!(EasingFunction::EaseOutQuad.apply(0.5), 0.75);
        assert_eq!(EasingFunction::from_name("EASEINSINE"), Some(EasingFunction::EaseInSine));
    }
}
