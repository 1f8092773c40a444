use std::fmt;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize, Serializer};

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum PropertyKind {
    String,
    Int,
    Double,
    Pointer,
}

impl PropertyKind {
    pub fn zero(self) -> PropertyValue {
        match self {
            PropertyKind::String => PropertyValue::String(String::new()),
            PropertyKind::Int => PropertyValue::Int(0),
            PropertyKind::Double => PropertyValue::Double(OrderedFloat(0.0)),
            PropertyKind::Pointer => PropertyValue::Pointer(0),
        }
    }
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PropertyKind::String => "string",
            PropertyKind::Int => "int",
            PropertyKind::Double => "double",
            PropertyKind::Pointer => "pointer",
        };
        f.write_str(name)
    }
}

/// A single element of a property array.
///
/// Pointers are process-local addresses; they are written out as null so a
/// persisted set never carries a dangling address into another run.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Hash, Debug)]
pub enum PropertyValue {
    String(String),
    Int(i32),
    Double(OrderedFloat<f64>),
    Pointer(#[serde(serialize_with = "serialize_null_pointer")] usize),
}

fn serialize_null_pointer<S>(_value: &usize, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_u64(0)
}

impl PropertyValue {
    pub fn kind(&self) -> PropertyKind {
        match self {
            PropertyValue::String(_) => PropertyKind::String,
            PropertyValue::Int(_) => PropertyKind::Int,
            PropertyValue::Double(_) => PropertyKind::Double,
            PropertyValue::Pointer(_) => PropertyKind::Pointer,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            PropertyValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            PropertyValue::Double(v) => Some(v.into_inner()),
            _ => None,
        }
    }

    pub fn as_pointer(&self) -> Option<usize> {
        match self {
            PropertyValue::Pointer(p) => Some(*p),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::String(s) => write!(f, "\"{}\"", s),
            PropertyValue::Int(v) => write!(f, "{}", v),
            PropertyValue::Double(v) => write!(f, "{}", v),
            PropertyValue::Pointer(p) => write!(f, "{:#x}", p),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        PropertyValue::Int(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Int(value as i32)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Double(OrderedFloat(value))
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub enum Dimension {
    Fixed(usize),
    Variable,
}

/// Declaration of one key: its kind, arity and initial values.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct PropertySpec {
    pub name: String,
    pub kind: PropertyKind,
    pub dimension: Dimension,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub defaults: Vec<PropertyValue>,
}

impl PropertySpec {
    pub fn new(name: impl Into<String>, kind: PropertyKind, dimension: Dimension) -> Self {
        Self {
            name: name.into(),
            kind,
            dimension,
            read_only: false,
            defaults: Vec::new(),
        }
    }

    pub fn string(name: impl Into<String>, value: &str) -> Self {
        Self::new(name, PropertyKind::String, Dimension::Fixed(1)).with_defaults([value.into()])
    }

    pub fn strings<'a>(name: impl Into<String>, values: impl IntoIterator<Item = &'a str>) -> Self {
        Self::new(name, PropertyKind::String, Dimension::Variable)
            .with_defaults(values.into_iter().map(PropertyValue::from))
    }

    pub fn int(name: impl Into<String>, value: i32) -> Self {
        Self::new(name, PropertyKind::Int, Dimension::Fixed(1)).with_defaults([value.into()])
    }

    pub fn ints(name: impl Into<String>, values: &[i32]) -> Self {
        Self::new(name, PropertyKind::Int, Dimension::Fixed(values.len()))
            .with_defaults(values.iter().map(|v| PropertyValue::Int(*v)))
    }

    pub fn double(name: impl Into<String>, value: f64) -> Self {
        Self::new(name, PropertyKind::Double, Dimension::Fixed(1)).with_defaults([value.into()])
    }

    pub fn doubles(name: impl Into<String>, values: &[f64]) -> Self {
        Self::new(name, PropertyKind::Double, Dimension::Fixed(values.len()))
            .with_defaults(values.iter().map(|v| PropertyValue::from(*v)))
    }

    pub fn pointer(name: impl Into<String>) -> Self {
        Self::new(name, PropertyKind::Pointer, Dimension::Fixed(1))
    }

    pub fn with_defaults(mut self, defaults: impl IntoIterator<Item = PropertyValue>) -> Self {
        self.defaults = defaults.into_iter().collect();
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Values a freshly defined property starts with.
    pub(crate) fn initial_values(&self) -> Vec<PropertyValue> {
        match self.dimension {
            Dimension::Variable => self.defaults.clone(),
            Dimension::Fixed(n) => (0..n)
                .map(|i| {
                    self.defaults
                        .get(i)
                        .cloned()
                        .unwrap_or_else(|| self.kind.zero())
                })
                .collect(),
        }
    }
}
