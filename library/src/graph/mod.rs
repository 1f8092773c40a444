//! Graphs of plugin instances connected through their clips.

pub mod analysis;
pub mod command;
mod compute;
mod connection;
mod node;

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info, warn};

use crate::error::{HostError, Result};
use crate::host::Host;
use crate::plugin::Plugin;
use crate::property::keys;

use analysis::ConnectionProblem;
pub use command::{ArgumentTarget, NodeArgument, apply_arguments, parse_arguments};
pub use compute::{ComputeOptions, ComputeReport, FrameRange, RenderRecord};
use compute::{ComputePlan, PlannedNode};
pub use connection::{ClipPort, Connection, NodeId};
pub use node::{Node, NodeState};

/// A set of nodes and the connections between their clips.
///
/// Every mutation is validated first and applied whole, so a failed call
/// leaves the graph as it was.
pub struct Graph {
    host: Arc<Host>,
    nodes: Vec<Arc<Node>>,
    connections: Vec<Connection>,
    name_counters: HashMap<String, usize>,
}

impl Graph {
    pub fn new(host: Arc<Host>) -> Self {
        Self {
            host,
            nodes: Vec::new(),
            connections: Vec::new(),
            name_counters: HashMap::new(),
        }
    }

    pub fn host(&self) -> &Arc<Host> {
        &self.host
    }

    pub fn nodes(&self) -> &[Arc<Node>] {
        &self.nodes
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn node(&self, id: NodeId) -> Result<&Arc<Node>> {
        self.nodes
            .iter()
            .find(|n| n.id() == id)
            .ok_or_else(|| HostError::UnknownNode(id.to_string()))
    }

    pub fn node_by_name(&self, name: &str) -> Option<&Arc<Node>> {
        self.nodes.iter().find(|n| n.name() == name)
    }

    fn next_name(&mut self, identifier: &str) -> String {
        let counter = self.name_counters.entry(identifier.to_string()).or_insert(0);
        *counter += 1;
        format!("{}{}", identifier, counter)
    }

    /// Creates a node for the plugin `name` resolves to, in the first
    /// context of the configured priority the plugin supports.
    pub fn create_node(&mut self, name: &str) -> Result<NodeId> {
        let plugin = self.host.resolve_plugin(name)?;
        let context = self.host.preferred_context(&plugin)?;
        self.insert_node(&plugin, &context)
    }

    pub fn create_node_in_context(&mut self, name: &str, context: &str) -> Result<NodeId> {
        let plugin = self.host.resolve_plugin(name)?;
        self.insert_node(&plugin, context)
    }

    fn insert_node(&mut self, plugin: &Arc<Plugin>, context: &str) -> Result<NodeId> {
        let instance = plugin.create_instance(context)?;
        let node = Arc::new(Node::new(self.next_name(&plugin.identifier()), instance));
        node.set_state(NodeState::Described(context.to_string()));
        info!("Created node {} ({} in {} context)", node.name(), plugin.raw_identifier(), context);
        let id = node.id();
        self.nodes.push(node);
        Ok(id)
    }

    /// Applies textual arguments to a node's parameters.
    pub fn apply_arguments<S: AsRef<str>>(&self, node: NodeId, tokens: &[S]) -> Result<()> {
        apply_arguments(self.node(node)?, tokens)
    }

    fn default_input(&self, consumer: &Node, connections: &[Connection]) -> Result<String> {
        let instance = consumer.instance();
        let free = |name: &str| analysis::input_connection(connections, &ClipPort::new(consumer.id(), name)).is_none();
        if instance.clip(keys::SOURCE_CLIP).is_some() && free(keys::SOURCE_CLIP) {
            return Ok(keys::SOURCE_CLIP.to_string());
        }
        instance
            .input_clips()
            .map(|c| c.name())
            .find(|name| free(*name))
            .map(str::to_string)
            .ok_or_else(|| {
                HostError::InvalidConnection(format!("node '{}' has no free input clip", consumer.name()))
            })
    }

    /// Checks one connection against `connections` and returns it.
    fn plan_connection(
        &self,
        connections: &[Connection],
        producer: NodeId,
        output: &str,
        consumer: NodeId,
        input: &str,
    ) -> Result<Connection> {
        let from = self.node(producer)?;
        let to = self.node(consumer)?;
        let from_clip = from.clip(output).ok_or_else(|| HostError::UnknownClip {
            node: from.name().to_string(),
            clip: output.to_string(),
        })?;
        if !from_clip.is_output() {
            return Err(HostError::ClipDirection {
                node: from.name().to_string(),
                clip: output.to_string(),
                expected: "output",
            });
        }
        let to_clip = to.clip(input).ok_or_else(|| HostError::UnknownClip {
            node: to.name().to_string(),
            clip: input.to_string(),
        })?;
        if to_clip.is_output() {
            return Err(HostError::ClipDirection {
                node: to.name().to_string(),
                clip: input.to_string(),
                expected: "input",
            });
        }

        let conn = Connection::new(ClipPort::new(producer, output), ClipPort::new(consumer, input));
        analysis::validate_connection(connections, &conn).map_err(|problem| match problem {
            ConnectionProblem::SelfConnection => {
                HostError::InvalidConnection(format!("cannot connect '{}' to itself", from.name()))
            }
            ConnectionProblem::InputTaken => HostError::ClipAlreadyConnected {
                node: to.name().to_string(),
                clip: input.to_string(),
            },
            ConnectionProblem::Cycle => HostError::GraphCycle(from.name().to_string()),
        })?;
        Ok(conn)
    }

    fn commit(&mut self, added: Vec<Connection>) {
        for conn in added {
            debug!("Connected {:?} -> {:?}", conn.from, conn.to);
            self.connections.push(conn);
        }
        self.refresh_connection_state();
    }

    /// Mirrors the connection list into clip and node state.
    fn refresh_connection_state(&self) {
        for node in &self.nodes {
            let id = node.id();
            let mut instance = node.instance_mut();
            let names: Vec<String> = instance.clips().iter().map(|c| c.name().to_string()).collect();
            let mut any = false;
            for name in names {
                let connected = self
                    .connections
                    .iter()
                    .any(|c| (c.to.node == id && c.to.clip == name) || (c.from.node == id && c.from.clip == name));
                any |= connected;
                if let Some(clip) = instance.clip_mut(&name) {
                    if let Err(e) = clip.set_connected(connected) {
                        warn!("Cannot mark clip {} of {} as connected: {}", name, node.name(), e);
                    }
                }
            }
            drop(instance);
            match (any, node.state()) {
                (true, NodeState::Described(_)) => node.set_state(NodeState::Connected),
                (false, NodeState::Connected | NodeState::Computed) => {
                    node.set_state(NodeState::Described(node.context().to_string()))
                }
                _ => {}
            }
        }
    }

    /// Connects `producer`'s output to `consumer`'s `Source` clip, or its
    /// first free input.
    pub fn connect(&mut self, producer: NodeId, consumer: NodeId) -> Result<()> {
        let input = self.default_input(self.node(consumer)?, &self.connections)?;
        self.connect_clips(producer, keys::OUTPUT_CLIP, consumer, &input)
    }

    pub fn connect_clips(&mut self, producer: NodeId, output: &str, consumer: NodeId, input: &str) -> Result<()> {
        let conn = self.plan_connection(&self.connections, producer, output, consumer, input)?;
        self.commit(vec![conn]);
        Ok(())
    }

    /// Connects each node to the next. Nothing is connected unless every
    /// link is valid.
    pub fn connect_chain(&mut self, nodes: &[NodeId]) -> Result<()> {
        let mut planned = self.connections.clone();
        let mut added = Vec::new();
        for pair in nodes.windows(2) {
            let input = self.default_input(self.node(pair[1])?, &planned)?;
            let conn = self.plan_connection(&planned, pair[0], keys::OUTPUT_CLIP, pair[1], &input)?;
            planned.push(conn.clone());
            added.push(conn);
        }
        self.commit(added);
        Ok(())
    }

    /// Removes the connection feeding `consumer`'s `input` clip.
    pub fn disconnect(&mut self, consumer: NodeId, input: &str) -> Result<Connection> {
        let port = ClipPort::new(consumer, input);
        let index = self
            .connections
            .iter()
            .position(|c| c.to == port)
            .ok_or_else(|| {
                HostError::InvalidConnection(format!("clip '{}' of node {} is not connected", input, consumer))
            })?;
        let removed = self.connections.remove(index);
        self.refresh_connection_state();
        Ok(removed)
    }

    /// Removes a node and every connection touching it. The instance is
    /// destroyed once nothing else holds the node.
    pub fn remove_node(&mut self, id: NodeId) -> Result<()> {
        let index = self
            .nodes
            .iter()
            .position(|n| n.id() == id)
            .ok_or_else(|| HostError::UnknownNode(id.to_string()))?;
        self.connections.retain(|c| c.from.node != id && c.to.node != id);
        let node = self.nodes.remove(index);
        node.set_state(NodeState::Uninstantiated);
        info!("Removed node {}", node.name());
        self.refresh_connection_state();
        Ok(())
    }

    fn plan(&self, target: NodeId) -> Result<ComputePlan> {
        self.node(target)?;
        let reachable = analysis::upstream(&self.connections, target);
        let members: Vec<NodeId> = self
            .nodes
            .iter()
            .map(|n| n.id())
            .filter(|id| reachable.contains(id))
            .collect();

        for id in &members {
            let node = self.node(*id)?;
            let instance = node.instance();
            for clip in instance.input_clips() {
                let port = ClipPort::new(*id, clip.name());
                if !clip.is_optional() && analysis::input_connection(&self.connections, &port).is_none() {
                    return Err(HostError::MissingRequiredConnection {
                        node: node.name().to_string(),
                        clip: clip.name().to_string(),
                    });
                }
            }
        }

        let order = analysis::topological_sort(&members, &self.connections).map_err(|stuck| {
            let name = self.node(stuck).map(|n| n.name().to_string()).unwrap_or_else(|_| stuck.to_string());
            HostError::GraphCycle(name)
        })?;

        let mut nodes = Vec::with_capacity(order.len());
        for id in order {
            let inputs = self
                .connections
                .iter()
                .filter(|c| c.to.node == id)
                .map(|c| (c.to.clip.clone(), c.from.node))
                .collect();
            nodes.push(PlannedNode {
                node: self.node(id)?.clone(),
                inputs,
            });
        }
        let config = self.host.config();
        Ok(ComputePlan {
            nodes,
            target,
            project_size: config.project_size,
            default_depth: config.default_bit_depth,
        })
    }

    /// Renders `target` and everything it depends on over `range`, using
    /// the configured number of workers.
    pub fn compute(&self, target: NodeId, range: FrameRange) -> Result<ComputeReport> {
        let options = ComputeOptions {
            workers: self.host.config().workers,
            ..ComputeOptions::default()
        };
        self.compute_with(target, range, options)
    }

    pub fn compute_with(&self, target: NodeId, range: FrameRange, options: ComputeOptions) -> Result<ComputeReport> {
        let plan = self.plan(target)?;
        info!(
            "Computing {} over {}..{} step {} ({} node(s))",
            self.node(target)?.name(),
            range.start,
            range.end,
            range.step,
            plan.nodes.len()
        );
        plan.execute(range, options)
    }

    /// Frames `target` can produce: the intersection of the time domains
    /// reported by the nodes it depends on, or frame 0 when none reports.
    pub fn compute_time_domain(&self, target: NodeId) -> Result<FrameRange> {
        self.node(target)?;
        let reachable = analysis::upstream(&self.connections, target);
        let mut domain: Option<(f64, f64)> = None;
        for node in self.nodes.iter().filter(|n| reachable.contains(&n.id())) {
            let Some((start, end)) = node.instance_mut().time_domain()? else {
                continue;
            };
            domain = Some(match domain {
                Some((s, e)) => (s.max(start), e.min(end)),
                None => (start, end),
            });
        }
        match domain {
            Some((start, end)) if start <= end => FrameRange::new(start, end, 1.0),
            Some((start, end)) => Err(HostError::InvalidFrameRange(format!(
                "time domains of the inputs do not overlap ({}..{})",
                start, end
            ))),
            None => Ok(FrameRange::single(0.0)),
        }
    }
}
