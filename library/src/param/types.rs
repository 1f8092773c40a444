use std::fmt;

use serde::{Deserialize, Serialize};

use crate::property::{Dimension, PropertyError, PropertyKind, PropertySet, PropertySpec, PropertyValue, keys};

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ParamType {
    Double,
    Integer,
    Boolean,
    String,
    Choice,
    Double2D,
    Double3D,
    Integer2D,
    Integer3D,
    Rgb,
    Rgba,
}

/// What a parameter type supports beyond get/set.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Capabilities {
    pub animatable: bool,
    pub differentiable: bool,
}

impl ParamType {
    pub const ALL: [ParamType; 11] = [
        ParamType::Double,
        ParamType::Integer,
        ParamType::Boolean,
        ParamType::String,
        ParamType::Choice,
        ParamType::Double2D,
        ParamType::Double3D,
        ParamType::Integer2D,
        ParamType::Integer3D,
        ParamType::Rgb,
        ParamType::Rgba,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ParamType::Double => "double",
            ParamType::Integer => "integer",
            ParamType::Boolean => "boolean",
            ParamType::String => "string",
            ParamType::Choice => "choice",
            ParamType::Double2D => "double2d",
            ParamType::Double3D => "double3d",
            ParamType::Integer2D => "integer2d",
            ParamType::Integer3D => "integer3d",
            ParamType::Rgb => "rgb",
            ParamType::Rgba => "rgba",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    pub fn dimension(self) -> usize {
        match self {
            ParamType::Double
            | ParamType::Integer
            | ParamType::Boolean
            | ParamType::String
            | ParamType::Choice => 1,
            ParamType::Double2D | ParamType::Integer2D => 2,
            ParamType::Double3D | ParamType::Integer3D | ParamType::Rgb => 3,
            ParamType::Rgba => 4,
        }
    }

    pub fn value_kind(self) -> PropertyKind {
        match self {
            ParamType::Double
            | ParamType::Double2D
            | ParamType::Double3D
            | ParamType::Rgb
            | ParamType::Rgba => PropertyKind::Double,
            ParamType::Integer
            | ParamType::Integer2D
            | ParamType::Integer3D
            | ParamType::Boolean
            | ParamType::Choice => PropertyKind::Int,
            ParamType::String => PropertyKind::String,
        }
    }

    pub fn capabilities(self) -> Capabilities {
        Capabilities {
            animatable: self != ParamType::String,
            differentiable: self.value_kind() == PropertyKind::Double,
        }
    }

    pub fn is_numeric(self) -> bool {
        self.value_kind() != PropertyKind::String
    }

    /// Integer-valued types round and never interpolate between keys.
    pub fn is_discrete(self) -> bool {
        matches!(self, ParamType::Boolean | ParamType::Choice | ParamType::String)
    }

    pub fn zero(self) -> ParamValue {
        match self {
            ParamType::String => ParamValue::Text(String::new()),
            ParamType::Rgba => ParamValue::Numbers(vec![0.0, 0.0, 0.0, 1.0]),
            other => ParamValue::Numbers(vec![0.0; other.dimension()]),
        }
    }

    /// Properties of a freshly defined parameter descriptor.
    pub fn descriptor_properties(self, name: &str) -> Result<PropertySet, PropertyError> {
        let kind = self.value_kind();
        let n = self.dimension();
        let mut set = PropertySet::from_specs([
            PropertySpec::string(keys::PARAM_TYPE, self.name()).read_only(),
            PropertySpec::string(keys::LABEL, name),
            PropertySpec::string(keys::PARAM_HINT, ""),
            PropertySpec::int(keys::PARAM_ANIMATES, self.capabilities().animatable as i32),
            PropertySpec::string(
                keys::PARAM_INTERPOLATION,
                if self.is_discrete() { "constant" } else { "linear" },
            ),
            PropertySpec::new(keys::PARAM_DEFAULT, kind, Dimension::Fixed(n))
                .with_defaults(self.zero().to_property_values(self)),
            PropertySpec::new(keys::PARAM_VALUE, kind, Dimension::Fixed(n)).read_only(),
        ])?;
        if self.is_numeric() && !self.is_discrete() {
            for (key, bound) in [
                (keys::PARAM_MIN, f64::MIN),
                (keys::PARAM_MAX, f64::MAX),
                (keys::PARAM_DISPLAY_MIN, f64::MIN),
                (keys::PARAM_DISPLAY_MAX, f64::MAX),
            ] {
                let bound = match kind {
                    PropertyKind::Int => PropertyValue::Int(if bound < 0.0 { i32::MIN } else { i32::MAX }),
                    _ => PropertyValue::from(bound),
                };
                set.define(PropertySpec::new(key, kind, Dimension::Fixed(n)).with_defaults(vec![bound; n]))?;
            }
        }
        if self == ParamType::Choice {
            set.define(PropertySpec::new(keys::PARAM_CHOICE_OPTIONS, PropertyKind::String, Dimension::Variable))?;
        }
        Ok(set)
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Value of a whole parameter. Integer-like types are carried as whole
/// numbers in `Numbers`.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub enum ParamValue {
    Numbers(Vec<f64>),
    Text(String),
}

impl ParamValue {
    pub fn scalar(value: f64) -> Self {
        ParamValue::Numbers(vec![value])
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Numbers(values) => values.first().copied(),
            ParamValue::Text(_) => None,
        }
    }

    pub fn as_f64s(&self) -> Option<&[f64]> {
        match self {
            ParamValue::Numbers(values) => Some(values),
            ParamValue::Text(_) => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        self.as_f64().map(|v| v.round() as i32)
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.as_f64().map(|v| v != 0.0)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Text(text) => Some(text),
            ParamValue::Numbers(_) => None,
        }
    }

    pub fn to_property_values(&self, param_type: ParamType) -> Vec<PropertyValue> {
        match self {
            ParamValue::Text(text) => vec![PropertyValue::String(text.clone())],
            ParamValue::Numbers(values) => match param_type.value_kind() {
                PropertyKind::Int => values.iter().map(|v| PropertyValue::Int(v.round() as i32)).collect(),
                _ => values.iter().map(|v| PropertyValue::from(*v)).collect(),
            },
        }
    }

    pub fn from_property_values(values: &[PropertyValue]) -> Option<Self> {
        match values {
            [PropertyValue::String(text)] => Some(ParamValue::Text(text.clone())),
            _ => values
                .iter()
                .map(|v| v.as_double().or_else(|| v.as_int().map(f64::from)))
                .collect::<Option<Vec<_>>>()
                .map(ParamValue::Numbers),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Text(text) => write!(f, "\"{}\"", text),
            ParamValue::Numbers(values) => {
                let parts: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                f.write_str(&parts.join(", "))
            }
        }
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::scalar(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        ParamValue::scalar(value as f64)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::scalar(if value { 1.0 } else { 0.0 })
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<Vec<f64>> for ParamValue {
    fn from(value: Vec<f64>) -> Self {
        ParamValue::Numbers(value)
    }
}
