use std::fmt;
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::connection::NodeId;
use crate::error::{HostError, Result};
use crate::instance::Instance;
use crate::param::{Clip, Param, ParamError, ParamValue};
use crate::plugin::Plugin;

/// Lifecycle of a node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeState {
    /// Removed from its graph; the instance goes once the last holder drops it.
    Uninstantiated,
    /// Instance created but not yet placed in a graph.
    Instantiated,
    Described(String),
    Connected,
    Computed,
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeState::Uninstantiated => write!(f, "uninstantiated"),
            NodeState::Instantiated => write!(f, "instantiated"),
            NodeState::Described(context) => write!(f, "described ({})", context),
            NodeState::Connected => write!(f, "connected"),
            NodeState::Computed => write!(f, "computed"),
        }
    }
}

/// A plugin instance placed in a graph.
///
/// Render holds the instance's write lock, and so do parameter edits made
/// through the node, so values never change under a running render.
pub struct Node {
    id: NodeId,
    name: String,
    plugin: Arc<Plugin>,
    context: String,
    state: Mutex<NodeState>,
    instance: RwLock<Instance>,
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("plugin", &self.plugin.raw_identifier())
            .field("context", &self.context)
            .field("state", &self.state())
            .finish()
    }
}

impl Node {
    pub(crate) fn new(name: String, instance: Instance) -> Self {
        Self {
            id: NodeId::new(),
            name,
            plugin: instance.plugin().clone(),
            context: instance.context().to_string(),
            state: Mutex::new(NodeState::Instantiated),
            instance: RwLock::new(instance),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn plugin(&self) -> &Arc<Plugin> {
        &self.plugin
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn state(&self) -> NodeState {
        self.state.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub(crate) fn set_state(&self, state: NodeState) {
        *self.state.lock().unwrap_or_else(|p| p.into_inner()) = state;
    }

    pub fn instance(&self) -> RwLockReadGuard<'_, Instance> {
        self.instance.read().unwrap_or_else(|p| p.into_inner())
    }

    pub fn instance_mut(&self) -> RwLockWriteGuard<'_, Instance> {
        self.instance.write().unwrap_or_else(|p| p.into_inner())
    }

    pub fn param_names(&self) -> Vec<String> {
        self.instance().params().iter().map(|p| p.name().to_string()).collect()
    }

    pub fn with_param<R>(&self, name: &str, f: impl FnOnce(&Param) -> R) -> Result<R> {
        let instance = self.instance();
        Ok(f(instance.param(name)?))
    }

    pub fn with_param_mut<R>(&self, name: &str, f: impl FnOnce(&mut Param) -> R) -> Result<R> {
        let mut instance = self.instance_mut();
        Ok(f(instance.param_mut(name)?))
    }

    /// Parameter by declaration order.
    pub fn with_param_at_mut<R>(&self, index: usize, f: impl FnOnce(&mut Param) -> R) -> Result<R> {
        let mut instance = self.instance_mut();
        let count = instance.params().len();
        let param = instance.param_at_mut(index).ok_or_else(|| {
            HostError::Param(ParamError::UnknownParam(format!(
                "#{} (node '{}' has {} parameters)",
                index, self.name, count
            )))
        })?;
        Ok(f(param))
    }

    pub fn param(&self, name: &str) -> Result<ParamValue> {
        self.with_param(name, |p| p.get())
    }

    pub fn param_at_time(&self, name: &str, time: f64) -> Result<ParamValue> {
        self.with_param(name, |p| p.get_at_time(time))
    }

    pub fn set_param(&self, name: &str, value: impl Into<ParamValue>) -> Result<()> {
        Ok(self.with_param_mut(name, |p| p.set(value))??)
    }

    pub fn set_param_at_time(&self, name: &str, time: f64, value: impl Into<ParamValue>) -> Result<()> {
        Ok(self.with_param_mut(name, |p| p.set_at_time(time, value))??)
    }

    pub fn set_param_expression(&self, name: &str, text: &str) -> Result<()> {
        Ok(self.with_param_mut(name, |p| p.set_value_from_expression(text))??)
    }

    pub fn clip_names(&self) -> Vec<String> {
        self.instance().clips().iter().map(|c| c.name().to_string()).collect()
    }

    /// Snapshot of a clip's current properties.
    pub fn clip(&self, name: &str) -> Option<Clip> {
        self.instance().clip(name).cloned()
    }
}
