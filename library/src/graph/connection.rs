use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Stable identity of a node for the life of its graph.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub Uuid);

impl NodeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A clip of a node.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ClipPort {
    pub node: NodeId,
    pub clip: String,
}

impl ClipPort {
    pub fn new(node: NodeId, clip: &str) -> Self {
        Self {
            node,
            clip: clip.to_string(),
        }
    }
}

/// An edge from a producer's output clip to a consumer's input clip.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Connection {
    pub id: Uuid,
    pub from: ClipPort,
    pub to: ClipPort,
}

impl Connection {
    pub fn new(from: ClipPort, to: ClipPort) -> Self {
        Self {
            id: Uuid::new_v4(),
            from,
            to,
        }
    }
}
