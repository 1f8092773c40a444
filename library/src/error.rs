use thiserror::Error;

use crate::abi::action::Status;
use crate::param::ParamError;
use crate::property::PropertyError;

#[derive(Error, Debug)]
pub enum HostError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Libloading error: {0}")]
    Libloading(#[from] libloading::Error),
    #[error("Property error: {0}")]
    Property(#[from] PropertyError),
    #[error("Parameter error: {0}")]
    Param(ParamError),

    #[error("Failed to load plugin '{plugin}': {reason}")]
    PluginLoad { plugin: String, reason: String },
    #[error("Describe action failed for '{plugin}' ({status})")]
    DescribeActionFailed { plugin: String, status: Status },
    #[error("Plugin '{plugin}' does not support the '{context}' context")]
    ContextUnsupported { plugin: String, context: String },
    #[error("Action '{action}' failed on '{plugin}' ({status})")]
    ActionFailed {
        plugin: String,
        action: &'static str,
        status: Status,
    },

    #[error("Unrecognized node name \"{0}\"")]
    UnknownNodeName(String),
    #[error("Ambiguous node name \"{name}\". Possible nodes: {}", candidates.join(", "))]
    AmbiguousNodeName {
        name: String,
        candidates: Vec<String>,
    },
    #[error("Cannot parse \"{text}\" for parameter '{param}': {reason}")]
    ParameterParse {
        param: String,
        text: String,
        reason: String,
    },

    #[error("Graph contains a cycle through '{0}'")]
    GraphCycle(String),
    #[error("Required clip '{clip}' of node '{node}' is not connected")]
    MissingRequiredConnection { node: String, clip: String },
    #[error("Render failed on '{node}' at frame {frame} ({status})")]
    RenderActionFailed {
        node: String,
        frame: f64,
        status: Status,
    },
    #[error("Node '{node}' reported an unusable region of definition {rod:?} at frame {frame}")]
    InvalidRegionOfDefinition {
        node: String,
        frame: f64,
        rod: [f64; 4],
    },
    #[error("Clip '{clip}' of node '{node}' already has a producer")]
    ClipAlreadyConnected { node: String, clip: String },
    #[error("Clip '{clip}' of node '{node}' cannot be used as an {expected}")]
    ClipDirection {
        node: String,
        clip: String,
        expected: &'static str,
    },
    #[error("Node not found: {0}")]
    UnknownNode(String),
    #[error("Clip '{clip}' not found on node '{node}'")]
    UnknownClip { node: String, clip: String },
    #[error("Invalid frame range: {0}")]
    InvalidFrameRange(String),
    #[error("Invalid connection: {0}")]
    InvalidConnection(String),

    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl From<ParamError> for HostError {
    fn from(err: ParamError) -> Self {
        match err {
            ParamError::Parse {
                param,
                text,
                reason,
            } => HostError::ParameterParse {
                param,
                text,
                reason,
            },
            other => HostError::Param(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, HostError>;
