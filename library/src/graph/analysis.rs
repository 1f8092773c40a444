//! Structural queries over a graph's connections.
//!
//! Everything here works on plain connection lists so the graph can check a
//! change against a copy before applying it.

use std::collections::{HashMap, HashSet, VecDeque};

use super::connection::{ClipPort, Connection, NodeId};

/// The connection feeding `port`, if any.
pub fn input_connection<'a>(connections: &'a [Connection], port: &ClipPort) -> Option<&'a Connection> {
    connections.iter().find(|c| &c.to == port)
}

/// Validates a connection before it is added.
///
/// Each input accepts at most one connection and the graph must stay
/// acyclic. The caller checks that nodes and clips exist.
pub fn validate_connection(connections: &[Connection], conn: &Connection) -> Result<(), ConnectionProblem> {
    if conn.from.node == conn.to.node {
        return Err(ConnectionProblem::SelfConnection);
    }
    if input_connection(connections, &conn.to).is_some() {
        return Err(ConnectionProblem::InputTaken);
    }
    if would_create_cycle(connections, conn.from.node, conn.to.node) {
        return Err(ConnectionProblem::Cycle);
    }
    Ok(())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionProblem {
    SelfConnection,
    InputTaken,
    Cycle,
}

/// True when `to` already reaches `from`, so adding `from -> to` closes a
/// loop.
pub fn would_create_cycle(connections: &[Connection], from: NodeId, to: NodeId) -> bool {
    let mut visited = HashSet::new();
    let mut queue = VecDeque::new();
    queue.push_back(to);

    while let Some(current) = queue.pop_front() {
        if current == from {
            return true;
        }
        if !visited.insert(current) {
            continue;
        }
        for conn in connections {
            if conn.from.node == current {
                queue.push_back(conn.to.node);
            }
        }
    }
    false
}

/// Distinct producers feeding `node`.
pub fn producers(connections: &[Connection], node: NodeId) -> Vec<NodeId> {
    let mut result = Vec::new();
    for conn in connections.iter().filter(|c| c.to.node == node) {
        if !result.contains(&conn.from.node) {
            result.push(conn.from.node);
        }
    }
    result
}

/// Distinct consumers fed by `node`.
pub fn consumers(connections: &[Connection], node: NodeId) -> Vec<NodeId> {
    let mut result = Vec::new();
    for conn in connections.iter().filter(|c| c.from.node == node) {
        if !result.contains(&conn.to.node) {
            result.push(conn.to.node);
        }
    }
    result
}

/// `target` and every node it depends on.
pub fn upstream(connections: &[Connection], target: NodeId) -> HashSet<NodeId> {
    let mut visited = HashSet::new();
    let mut stack = vec![target];
    while let Some(current) = stack.pop() {
        if visited.insert(current) {
            stack.extend(producers(connections, current));
        }
    }
    visited
}

/// Orders `nodes` producers first, keeping the given order among
/// independent nodes. Connections to nodes outside `nodes` are ignored.
///
/// On a cycle, returns one of the nodes that could not be ordered.
pub fn topological_sort(nodes: &[NodeId], connections: &[Connection]) -> Result<Vec<NodeId>, NodeId> {
    let members: HashSet<NodeId> = nodes.iter().copied().collect();
    let position: HashMap<NodeId, usize> = nodes.iter().enumerate().map(|(i, n)| (*n, i)).collect();
    let mut in_degree: HashMap<NodeId, usize> = nodes.iter().map(|n| (*n, 0)).collect();
    let mut adjacency: HashMap<NodeId, Vec<NodeId>> = HashMap::new();

    for conn in connections {
        if members.contains(&conn.from.node) && members.contains(&conn.to.node) {
            adjacency.entry(conn.from.node).or_default().push(conn.to.node);
            if let Some(degree) = in_degree.get_mut(&conn.to.node) {
                *degree += 1;
            }
        }
    }

    // Kahn's algorithm, always taking the earliest ready node.
    let mut ready: Vec<NodeId> = nodes.iter().filter(|n| in_degree[*n] == 0).copied().collect();
    let mut sorted = Vec::with_capacity(nodes.len());
    while !ready.is_empty() {
        ready.sort_by_key(|n| std::cmp::Reverse(position[n]));
        let Some(node) = ready.pop() else { break };
        sorted.push(node);
        for next in adjacency.get(&node).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(next) {
                *degree -= 1;
                if *degree == 0 {
                    ready.push(*next);
                }
            }
        }
    }

    if sorted.len() != nodes.len() {
        let stuck = nodes
            .iter()
            .find(|n| !sorted.contains(n))
            .copied()
            .unwrap_or(nodes[0]);
        return Err(stuck);
    }
    Ok(sorted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(from: NodeId, to: NodeId, clip: &str) -> Connection {
        Connection::new(ClipPort::new(from, "Output"), ClipPort::new(to, clip))
    }

    #[test]
    fn test_cycle_is_detected() {
        let (a, b, c) = (NodeId::new(), NodeId::new(), NodeId::new());
        let connections = vec![link(a, b, "Source"), link(b, c, "Source")];
        assert!(would_create_cycle(&connections, c, a));
        assert!(!would_create_cycle(&connections, a, c));
        assert_eq!(
            validate_connection(&connections, &link(c, a, "Source")),
            Err(ConnectionProblem::Cycle)
        );
    }

    #[test]
    fn test_single_writer() {
        let (a, b, c) = (NodeId::new(), NodeId::new(), NodeId::new());
        let connections = vec![link(a, c, "Source")];
        assert_eq!(
            validate_connection(&connections, &link(b, c, "Source")),
            Err(ConnectionProblem::InputTaken)
        );
        assert_eq!(validate_connection(&connections, &link(b, c, "Mask")), Ok(()));
        // Fan-out from one output is fine.
        assert_eq!(validate_connection(&connections, &link(a, b, "Source")), Ok(()));
    }

    #[test]
    fn test_topological_order_is_stable() {
        let (read, blur, mask, merge) = (NodeId::new(), NodeId::new(), NodeId::new(), NodeId::new());
        let connections = vec![
            link(read, blur, "Source"),
            link(blur, merge, "Source"),
            link(mask, merge, "Mask"),
        ];
        let order = topological_sort(&[merge, read, mask, blur], &connections).unwrap();
        assert_eq!(order, vec![read, mask, blur, merge]);
    }

    #[test]
    fn test_upstream_stops_at_target() {
        let (a, b, c) = (NodeId::new(), NodeId::new(), NodeId::new());
        let connections = vec![link(a, b, "Source"), link(b, c, "Source")];
        let nodes = upstream(&connections, b);
        assert!(nodes.contains(&a) && nodes.contains(&b));
        assert!(!nodes.contains(&c));
        assert_eq!(producers(&connections, c), vec![b]);
        assert_eq!(consumers(&connections, a), vec![b]);
    }

    #[test]
    fn test_sort_reports_cycle() {
        let (a, b) = (NodeId::new(), NodeId::new());
        let connections = vec![link(a, b, "Source"), link(b, a, "Source")];
        assert!(topological_sort(&[a, b], &connections).is_err());
    }
}
