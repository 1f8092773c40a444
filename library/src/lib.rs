//! Plugin host runtime for image processing pipelines.
//!
//! Plugins live in binaries found on the plugin path (or linked into the
//! process) and talk to the host only through property sets. A [`Graph`]
//! wires their instances together and drives Render over frame ranges.

pub mod abi;
pub mod config;
pub mod error;
pub mod graph;
pub mod host;
pub mod image;
pub mod instance;
pub mod param;
pub mod plugin;
pub mod property;
pub mod util;

pub use config::HostConfig;
pub use error::{HostError, Result};
pub use graph::{ComputeOptions, ComputeReport, FrameRange, Graph, NodeId};
pub use host::Host;
