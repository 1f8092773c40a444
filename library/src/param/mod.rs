//! Parameters and clips of plugin instances.

mod clip;
mod easing;
pub mod expression;
mod keyframe;
mod parameter;
mod types;

use thiserror::Error;

use crate::property::PropertyError;

pub use clip::{Clip, ClipMetadata};
pub use easing::EasingFunction;
pub use keyframe::{Interpolation, Keyframe, KeyframeCurve};
pub use parameter::Param;
pub use types::{Capabilities, ParamType, ParamValue};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParamError {
    #[error("cannot parse \"{text}\" for '{param}': {reason}")]
    Parse {
        param: String,
        text: String,
        reason: String,
    },
    #[error("{value} is not a valid {param_type} value for '{param}'")]
    WrongValue {
        param: String,
        param_type: ParamType,
        value: String,
    },
    #[error("component {index} out of range for '{param}' ({dimension} components)")]
    BadComponent {
        param: String,
        index: usize,
        dimension: usize,
    },
    #[error("'{param}' cannot be keyed at time {time}")]
    BadTime { param: String, time: f64 },
    #[error("'{0}' is not animatable")]
    NotAnimatable(String),
    #[error("'{0}' is animated; set a keyframe instead")]
    Animated(String),
    #[error("'{0}' is not differentiable")]
    NotDifferentiable(String),
    #[error("unknown parameter '{0}'")]
    UnknownParam(String),
    #[error(transparent)]
    Property(#[from] PropertyError),
}
