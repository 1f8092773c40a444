//! The binary contract between host and plugins.
//!
//! `ffi` holds the `repr(C)` tables, `suite` the host functions behind them
//! and `plugin` the helpers plugin crates use from the other side.

pub mod action;
pub mod ffi;
mod handle;
pub mod plugin;
mod suite;

pub use action::{Action, Status};
pub use handle::PluginHandle;
pub use suite::EffectTarget;

pub(crate) use suite::publish_host_suite;
