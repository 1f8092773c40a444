use std::fmt;
use std::sync::Arc;

use log::debug;

use super::ParamError;
use super::expression::{Assignment, parse_expression};
use super::keyframe::{Interpolation, Keyframe, KeyframeCurve};
use super::types::{Capabilities, ParamType, ParamValue};
use crate::property::{PropertyHook, PropertyKind, PropertySet, PropertyValue, keys};

/// Keeps the display range inside the value range when read.
struct DisplayRange;

impl PropertyHook for DisplayRange {
    fn on_get(&self, set: &PropertySet, _key: &str, index: usize, stored: &PropertyValue) -> PropertyValue {
        let bound = |key| set.get_raw(key, index).cloned();
        match (stored, bound(keys::PARAM_MIN), bound(keys::PARAM_MAX)) {
            (PropertyValue::Double(v), Some(PropertyValue::Double(lo)), Some(PropertyValue::Double(hi)))
                if lo <= hi =>
            {
                PropertyValue::Double((*v).clamp(lo, hi))
            }
            (PropertyValue::Int(v), Some(PropertyValue::Int(lo)), Some(PropertyValue::Int(hi))) if lo <= hi => {
                PropertyValue::Int((*v).clamp(lo, hi))
            }
            _ => stored.clone(),
        }
    }
}

/// A typed, optionally keyframed value of an instance.
///
/// Without keyframes the parameter holds a single static value. Once keyed,
/// values at other times come from the curve using the parameter's
/// interpolation.
pub struct Param {
    name: String,
    param_type: ParamType,
    properties: PropertySet,
    value: ParamValue,
    curve: KeyframeCurve,
    _display_range: Arc<dyn PropertyHook>,
}

impl fmt::Debug for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Param")
            .field("name", &self.name)
            .field("type", &self.param_type)
            .field("value", &self.value)
            .field("keyframes", &self.curve.len())
            .finish()
    }
}

impl Param {
    /// Builds an instance parameter from its descriptor properties.
    pub fn new(name: &str, param_type: ParamType, descriptor: &PropertySet) -> Result<Self, ParamError> {
        let mut properties = descriptor.clone();
        let display_range: Arc<dyn PropertyHook> = Arc::new(DisplayRange);
        for key in [keys::PARAM_DISPLAY_MIN, keys::PARAM_DISPLAY_MAX] {
            if properties.contains(key) {
                properties.set_hook(key, &display_range)?;
            }
        }
        let value = properties
            .get_all(keys::PARAM_DEFAULT)
            .ok()
            .and_then(|values| ParamValue::from_property_values(&values))
            .unwrap_or_else(|| param_type.zero());
        let mut param = Self {
            name: name.to_string(),
            param_type,
            properties,
            value: param_type.zero(),
            curve: KeyframeCurve::new(),
            _display_range: display_range,
        };
        param.value = param.normalize(value)?;
        Ok(param)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn param_type(&self) -> ParamType {
        self.param_type
    }

    pub fn capabilities(&self) -> Capabilities {
        let mut caps = self.param_type.capabilities();
        if self.properties.get_int(keys::PARAM_ANIMATES, 0).map_or(false, |v| v == 0) {
            caps.animatable = false;
        }
        caps
    }

    pub fn properties(&self) -> &PropertySet {
        &self.properties
    }

    pub(crate) fn properties_mut(&mut self) -> &mut PropertySet {
        &mut self.properties
    }

    pub fn label(&self) -> String {
        self.properties
            .get_string(keys::LABEL, 0)
            .unwrap_or_else(|_| self.name.clone())
    }

    pub fn hint(&self) -> String {
        self.properties.get_string(keys::PARAM_HINT, 0).unwrap_or_default()
    }

    pub fn choice_options(&self) -> Vec<String> {
        self.properties
            .get_strings(keys::PARAM_CHOICE_OPTIONS)
            .unwrap_or_default()
    }

    pub fn interpolation(&self) -> Interpolation {
        if self.param_type.is_discrete() {
            return Interpolation::Constant;
        }
        self.properties
            .get_string(keys::PARAM_INTERPOLATION, 0)
            .ok()
            .and_then(|name| Interpolation::from_name(&name))
            .unwrap_or_default()
    }

    pub fn is_animated(&self) -> bool {
        !self.curve.is_empty()
    }

    pub fn keyframes(&self) -> &[Keyframe] {
        self.curve.keys()
    }

    /// The static value, or the value at time zero once keyed.
    pub fn get(&self) -> ParamValue {
        self.get_at_time(0.0)
    }

    pub fn get_at_time(&self, time: f64) -> ParamValue {
        self.curve
            .value_at(time, self.interpolation())
            .unwrap_or_else(|| self.value.clone())
    }

    /// Sets the static value, dropping any keyframes.
    pub fn set(&mut self, value: impl Into<ParamValue>) -> Result<(), ParamError> {
        let value = self.normalize(value.into())?;
        self.curve.clear();
        self.value = value;
        Ok(())
    }

    pub fn set_at_time(&mut self, time: f64, value: impl Into<ParamValue>) -> Result<(), ParamError> {
        if !self.capabilities().animatable {
            return Err(ParamError::NotAnimatable(self.name.clone()));
        }
        if !time.is_finite() {
            return Err(ParamError::BadTime {
                param: self.name.clone(),
                time,
            });
        }
        let value = self.normalize(value.into())?;
        self.curve.insert(time, value);
        Ok(())
    }

    pub fn delete_keyframe(&mut self, time: f64) -> bool {
        self.curve.remove(time).is_some()
    }

    pub fn set_component(&mut self, index: usize, component: f64) -> Result<(), ParamError> {
        if self.is_animated() {
            return Err(ParamError::Animated(self.name.clone()));
        }
        let mut values = match &self.value {
            ParamValue::Numbers(values) if index < values.len() => values.clone(),
            _ => {
                return Err(ParamError::BadComponent {
                    param: self.name.clone(),
                    index,
                    dimension: self.param_type.dimension(),
                });
            }
        };
        values[index] = component;
        self.value = self.normalize(ParamValue::Numbers(values))?;
        Ok(())
    }

    pub fn derivative_at_time(&self, time: f64) -> Result<Vec<f64>, ParamError> {
        self.require_differentiable()?;
        Ok(self
            .curve
            .derivative_at(time, self.interpolation())
            .unwrap_or_else(|| vec![0.0; self.param_type.dimension()]))
    }

    pub fn integrate_over_time(&self, from: f64, to: f64) -> Result<Vec<f64>, ParamError> {
        self.require_differentiable()?;
        if let Some(area) = self.curve.integrate(from, to, self.interpolation()) {
            return Ok(area);
        }
        let values = self.value.as_f64s().unwrap_or_default();
        Ok(values.iter().map(|v| v * (to - from)).collect())
    }

    /// The static value and keyframes, for undoing a batch of writes.
    pub(crate) fn snapshot(&self) -> (ParamValue, KeyframeCurve) {
        (self.value.clone(), self.curve.clone())
    }

    pub(crate) fn restore(&mut self, (value, curve): (ParamValue, KeyframeCurve)) {
        self.value = value;
        self.curve = curve;
    }

    /// Parses `text` and applies it. Nothing changes when parsing fails.
    pub fn set_value_from_expression(&mut self, text: &str) -> Result<(), ParamError> {
        let assignment =
            parse_expression(self.param_type, text, &self.choice_options()).map_err(|reason| ParamError::Parse {
                param: self.name.clone(),
                text: text.to_string(),
                reason,
            })?;
        debug!("{} <- {}", self.name, text);
        match assignment {
            Assignment::Whole(value) => self.set(value),
            Assignment::Component { index, value } => self.set_component(index, value),
        }
    }

    /// Values written into `param.value` before Render.
    pub(crate) fn value_properties(&self, time: f64) -> Vec<PropertyValue> {
        self.get_at_time(time).to_property_values(self.param_type)
    }

    fn require_differentiable(&self) -> Result<(), ParamError> {
        if self.param_type.capabilities().differentiable {
            Ok(())
        } else {
            Err(ParamError::NotDifferentiable(self.name.clone()))
        }
    }

    /// Checks the shape of `value` for this type and clamps it into
    /// `[param.min, param.max]`.
    fn normalize(&self, value: ParamValue) -> Result<ParamValue, ParamError> {
        let mismatch = |value: &ParamValue| ParamError::WrongValue {
            param: self.name.clone(),
            param_type: self.param_type,
            value: value.to_string(),
        };
        match (self.param_type, value) {
            (ParamType::String, ParamValue::Text(text)) => Ok(ParamValue::Text(text)),
            (ParamType::String, other) => Err(mismatch(&other)),
            (_, ParamValue::Text(text)) => Err(mismatch(&ParamValue::Text(text))),
            (param_type, ParamValue::Numbers(values)) => {
                if values.len() != param_type.dimension() {
                    return Err(mismatch(&ParamValue::Numbers(values)));
                }
                let integral = param_type.value_kind() == PropertyKind::Int;
                let values: Vec<f64> = values
                    .iter()
                    .enumerate()
                    .map(|(i, v)| match param_type {
                        ParamType::Boolean => (*v != 0.0) as i32 as f64,
                        _ if integral => self.clamp(i, v.round()),
                        _ => self.clamp(i, *v),
                    })
                    .collect();
                if param_type == ParamType::Choice {
                    let options = self.choice_options().len();
                    if options > 0 && (values[0] < 0.0 || values[0] as usize >= options) {
                        return Err(mismatch(&ParamValue::Numbers(values)));
                    }
                }
                Ok(ParamValue::Numbers(values))
            }
        }
    }

    fn clamp(&self, index: usize, value: f64) -> f64 {
        let bound = |key| {
            self.properties.get_raw(key, index).and_then(|v| {
                v.as_double().or_else(|| v.as_int().map(f64::from))
            })
        };
        match (bound(keys::PARAM_MIN), bound(keys::PARAM_MAX)) {
            (Some(lo), Some(hi)) if lo <= hi => value.clamp(lo, hi),
            _ => value,
        }
    }
}
