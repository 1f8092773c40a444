use std::fmt;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use super::easing::EasingFunction;
use super::types::ParamValue;

/// How values between two keyframes are computed.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Interpolation {
    Constant,
    #[default]
    Linear,
    /// Cubic Hermite through the neighbouring keys.
    Smooth,
    Eased(EasingFunction),
}

impl Interpolation {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "constant" => Some(Interpolation::Constant),
            "linear" => Some(Interpolation::Linear),
            "smooth" => Some(Interpolation::Smooth),
            other => EasingFunction::from_name(other).map(Interpolation::Eased),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Interpolation::Constant => "constant",
            Interpolation::Linear => "linear",
            Interpolation::Smooth => "smooth",
            Interpolation::Eased(easing) => easing.name(),
        }
    }
}

impl fmt::Display for Interpolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct Keyframe {
    pub time: OrderedFloat<f64>,
    pub value: ParamValue,
}

/// Keyframes with strictly increasing times.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug, Default)]
pub struct KeyframeCurve {
    keys: Vec<Keyframe>,
}

const DERIVATIVE_STEP: f64 = 1e-4;

impl KeyframeCurve {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn keys(&self) -> &[Keyframe] {
        &self.keys
    }

    pub fn times(&self) -> impl Iterator<Item = f64> + '_ {
        self.keys.iter().map(|k| k.time.into_inner())
    }

    /// Inserts a key, replacing the value of an existing key at `time`.
    pub fn insert(&mut self, time: f64, value: ParamValue) {
        let time = OrderedFloat(time);
        match self.keys.binary_search_by(|k| k.time.cmp(&time)) {
            Ok(i) => self.keys[i].value = value,
            Err(i) => self.keys.insert(i, Keyframe { time, value }),
        }
    }

    pub fn remove(&mut self, time: f64) -> Option<ParamValue> {
        let time = OrderedFloat(time);
        self.keys
            .binary_search_by(|k| k.time.cmp(&time))
            .ok()
            .map(|i| self.keys.remove(i).value)
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }

    /// Value at `time`. Outside the keyed range the nearest boundary key
    /// holds; `None` only when there are no keys.
    pub fn value_at(&self, time: f64, interpolation: Interpolation) -> Option<ParamValue> {
        let first = self.keys.first()?;
        let last = self.keys.last()?;
        if time.is_nan() || time <= *first.time {
            return Some(first.value.clone());
        }
        if time >= *last.time {
            return Some(last.value.clone());
        }

        // first < time < last, so both neighbours exist.
        let idx = self.keys.partition_point(|k| *k.time <= time) - 1;
        let current = &self.keys[idx];
        let next = &self.keys[idx + 1];

        let (ParamValue::Numbers(a), ParamValue::Numbers(b)) = (&current.value, &next.value) else {
            return Some(current.value.clone());
        };
        if a.len() != b.len() {
            return Some(current.value.clone());
        }

        let duration = *next.time - *current.time;
        let s = (time - *current.time) / duration;
        let values = match interpolation {
            Interpolation::Constant => a.clone(),
            Interpolation::Linear => lerp(a, b, s),
            Interpolation::Eased(easing) => lerp(a, b, easing.apply(s)),
            Interpolation::Smooth => self.hermite(idx, s),
        };
        Some(ParamValue::Numbers(values))
    }

    fn hermite(&self, idx: usize, s: f64) -> Vec<f64> {
        let k0 = &self.keys[idx];
        let k1 = &self.keys[idx + 1];
        let (Some(v0), Some(v1)) = (k0.value.as_f64s(), k1.value.as_f64s()) else {
            return Vec::new();
        };
        let h = *k1.time - *k0.time;
        let prev = idx.checked_sub(1).and_then(|i| self.keys.get(i));
        let after = self.keys.get(idx + 2);

        let h00 = 2.0 * s.powi(3) - 3.0 * s.powi(2) + 1.0;
        let h10 = s.powi(3) - 2.0 * s.powi(2) + s;
        let h01 = -2.0 * s.powi(3) + 3.0 * s.powi(2);
        let h11 = s.powi(3) - s.powi(2);

        (0..v0.len())
            .map(|c| {
                let chord = v1[c] - v0[c];
                let m0 = match prev.and_then(|k| k.value.as_f64s().map(|v| (*k.time, v))) {
                    Some((tp, vp)) if vp.len() == v0.len() => (v1[c] - vp[c]) / (*k1.time - tp) * h,
                    _ => chord,
                };
                let m1 = match after.and_then(|k| k.value.as_f64s().map(|v| (*k.time, v))) {
                    Some((tn, vn)) if vn.len() == v0.len() => (vn[c] - v0[c]) / (tn - *k0.time) * h,
                    _ => chord,
                };
                h00 * v0[c] + h10 * m0 + h01 * v1[c] + h11 * m1
            })
            .collect()
    }

    /// Per-component rate of change. Zero outside the keyed range.
    pub fn derivative_at(&self, time: f64, interpolation: Interpolation) -> Option<Vec<f64>> {
        let first = self.keys.first()?;
        let last = self.keys.last()?;
        let dimension = first.value.as_f64s()?.len();
        if time < *first.time || time > *last.time || interpolation == Interpolation::Constant {
            return Some(vec![0.0; dimension]);
        }
        let lo = (time - DERIVATIVE_STEP).max(*first.time);
        let hi = (time + DERIVATIVE_STEP).min(*last.time);
        if hi <= lo {
            return Some(vec![0.0; dimension]);
        }
        let a = self.value_at(lo, interpolation)?;
        let b = self.value_at(hi, interpolation)?;
        let (a, b) = (a.as_f64s()?, b.as_f64s()?);
        Some(a.iter().zip(b).map(|(a, b)| (b - a) / (hi - lo)).collect())
    }

    /// Per-component integral over `[from, to]`.
    ///
    /// The range is split at key times and each piece is integrated with
    /// Simpson's rule, which is exact for the linear and cubic segments.
    pub fn integrate(&self, from: f64, to: f64, interpolation: Interpolation) -> Option<Vec<f64>> {
        if to < from {
            return self
                .integrate(to, from, interpolation)
                .map(|v| v.into_iter().map(|x| -x).collect());
        }
        let dimension = self.keys.first()?.value.as_f64s()?.len();
        let mut bounds = vec![from];
        bounds.extend(self.times().filter(|t| *t > from && *t < to));
        bounds.push(to);

        let mut total = vec![0.0; dimension];
        for window in bounds.windows(2) {
            let (a, b) = (window[0], window[1]);
            if b <= a {
                continue;
            }
            let m = (a + b) / 2.0;
            let (fa, fm, fb) = match interpolation {
                // Held values are flat inside a piece; sample just after the left edge.
                Interpolation::Constant => {
                    let v = self.value_at(a + (b - a) * 1e-9, interpolation)?;
                    (v.clone(), v.clone(), v)
                }
                _ => (
                    self.value_at(a, interpolation)?,
                    self.value_at(m, interpolation)?,
                    self.value_at(b, interpolation)?,
                ),
            };
            let (fa, fm, fb) = (fa.as_f64s()?.to_vec(), fm.as_f64s()?.to_vec(), fb.as_f64s()?.to_vec());
            for c in 0..dimension {
                total[c] += (b - a) / 6.0 * (fa[c] + 4.0 * fm[c] + fb[c]);
            }
        }
        Some(total)
    }
}

fn lerp(a: &[f64], b: &[f64], t: f64) -> Vec<f64> {
    a.iter().zip(b).map(|(a, b)| a + (b - a) * t).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> KeyframeCurve {
        let mut curve = KeyframeCurve::new();
        curve.insert(10.0, 100.0.into());
        curve.insert(0.0, 0.0.into());
        curve
    }

    fn at(curve: &KeyframeCurve, time: f64, interpolation: Interpolation) -> f64 {
        curve.value_at(time, interpolation).and_then(|v| v.as_f64()).unwrap()
    }

    #[test]
    fn test_linear_interpolation_and_holds() {
        let curve = ramp();
        assert_eq!(at(&curve, 5.0, Interpolation::Linear), 50.0);
        assert_eq!(at(&curve, -1.0, Interpolation::Linear), 0.0);
        assert_eq!(at(&curve, 11.0, Interpolation::Linear), 100.0);
    }

    #[test]
    fn test_keys_stay_sorted_and_unique() {
        let mut curve = ramp();
        curve.insert(5.0, 7.0.into());
        curve.insert(5.0, 8.0.into());
        assert_eq!(curve.times().collect::<Vec<_>>(), vec![0.0, 5.0, 10.0]);
        assert_eq!(at(&curve, 5.0, Interpolation::Linear), 8.0);
        assert_eq!(curve.remove(5.0), Some(8.0.into()));
        assert_eq!(curve.remove(5.0), None);
    }

    #[test]
    fn test_constant_holds_previous_key() {
        let curve = ramp();
        assert_eq!(at(&curve, 9.9, Interpolation::Constant), 0.0);
        assert_eq!(at(&curve, 10.0, Interpolation::Constant), 100.0);
    }

    #[test]
    fn test_smooth_with_two_keys_matches_linear() {
        let curve = ramp();
        assert!((at(&curve, 2.5, Interpolation::Smooth) - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_eased_interpolation() {
        let curve = ramp();
        let value = at(&curve, 5.0, Interpolation::Eased(EasingFunction::EaseInQuad));
        assert!((value - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_text_values_hold() {
        let mut curve = KeyframeCurve::new();
        curve.insert(0.0, "a".into());
        curve.insert(10.0, "b".into());
        assert_eq!(curve.value_at(5.0, Interpolation::Linear), Some("a".into()));
        assert_eq!(curve.value_at(10.0, Interpolation::Linear), Some("b".into()));
    }

    #[test]
    fn test_derivative_and_integral_of_ramp() {
        let curve = ramp();
        let slope = curve.derivative_at(5.0, Interpolation::Linear).unwrap();
        assert!((slope[0] - 10.0).abs() < 1e-6);
        assert_eq!(curve.derivative_at(20.0, Interpolation::Linear).unwrap(), vec![0.0]);

        // ramp area 0..10 is 500, then held at 100 for 2 frames.
        let area = curve.integrate(0.0, 12.0, Interpolation::Linear).unwrap();
        assert!((area[0] - 700.0).abs() < 1e-9);
        let reversed = curve.integrate(12.0, 0.0, Interpolation::Linear).unwrap();
        assert!((reversed[0] + 700.0).abs() < 1e-9);
    }

    #[test]
    fn test_interpolation_names() {
        assert_eq!(Interpolation::from_name("smooth"), Some(Interpolation::Smooth));
        assert_eq!(
            Interpolation::from_name("easeOutCubic"),
            Some(Interpolation::Eased(EasingFunction::EaseOutCubic))
        );
        assert_eq!(Interpolation::from_name("bezier"), None);
    }
}
