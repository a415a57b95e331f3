//! Structural validation of automation graphs.
//!
//! [`validate`] is a pure report generator: it inspects a node/edge list and
//! returns every shape defect it finds as a human-readable string. An empty
//! report means the graph may be saved and executed. It never panics on
//! malformed-but-representable input and never stops at the first problem.
//!
//! The same report gates two doors: persisting an automation (create and
//! update) and starting an execution. Re-validating at execution time guards
//! against automations edited into an invalid state after they were saved.

use chrono::{DateTime, Utc};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;

use crate::model::{BranchHandle, DelaySpec, Edge, Node, NodeKind};

/// Validate an automation graph, returning one message per defect.
///
/// Absolute delay times are checked against the current wall clock; see
/// [`validate_at`] for a fixed-instant variant.
pub fn validate(nodes: &[Node], edges: &[Edge]) -> Vec<String> {
    validate_at(nodes, edges, Utc::now())
}

/// [`validate`] with an explicit "now" for the absolute-delay check.
pub fn validate_at(nodes: &[Node], edges: &[Edge], now: DateTime<Utc>) -> Vec<String> {
    let mut errors = Vec::new();

    if nodes.is_empty() {
        errors.push("Automation must have at least one node".to_string());
        return errors;
    }

    let start_count = nodes.iter().filter(|n| n.kind.is_start()).count();
    let end_count = nodes.iter().filter(|n| n.kind.is_end()).count();
    if start_count != 1 {
        errors.push("Flow must have exactly one Start node".to_string());
    }
    if end_count != 1 {
        errors.push("Flow must have exactly one End node".to_string());
    }

    for node in nodes {
        check_node_data(node, now, &mut errors);
    }

    if !edges.is_empty() {
        check_edges(nodes, edges, &mut errors);
    }

    if start_count == 1 && !edges.is_empty() {
        if let Some(start) = nodes.iter().find(|n| n.kind.is_start()) {
            let end = nodes.iter().find(|n| n.kind.is_end());
            check_reachability(nodes, edges, start, end, &mut errors);
        }
    }

    errors
}

/// Per-type field completeness, dispatched on the node's type tag.
fn check_node_data(node: &Node, now: DateTime<Utc>, errors: &mut Vec<String>) {
    if node.id.is_empty() {
        errors.push("Node is missing id".to_string());
        return;
    }

    match &node.kind {
        NodeKind::Start | NodeKind::End => {}
        NodeKind::Action(data) => {
            if data.message.trim().is_empty() {
                errors.push(format!("Action node {} is missing message", node.id));
            }
        }
        NodeKind::Delay(DelaySpec::Absolute { absolute_time }) => {
            if *absolute_time <= now {
                errors.push(format!(
                    "Delay node {} absolute time must be in the future",
                    node.id
                ));
            }
        }
        NodeKind::Delay(DelaySpec::Relative { relative_value, .. }) => {
            if *relative_value == 0 {
                errors.push(format!(
                    "Delay node {} relative value must be greater than 0",
                    node.id
                ));
            }
        }
        NodeKind::Condition(data) => {
            if data.rules.is_empty() {
                errors.push(format!(
                    "Condition node {} must have at least one rule",
                    node.id
                ));
            } else {
                for (idx, rule) in data.rules.iter().enumerate() {
                    if rule.operator.is_none() || rule.value.is_empty() {
                        errors.push(format!(
                            "Condition node {} rule {} is incomplete",
                            node.id,
                            idx + 1
                        ));
                    }
                }
            }
        }
        NodeKind::Unknown(tag) => {
            errors.push(format!("Unknown node type: {tag}"));
        }
    }
}

/// Dangling-reference and degree checks over the edge list grouped by source.
fn check_edges(nodes: &[Node], edges: &[Edge], errors: &mut Vec<String>) {
    let node_ids: FxHashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();

    for edge in edges {
        if !node_ids.contains(edge.source.as_str()) {
            errors.push(format!(
                "Edge {} has invalid source node {}",
                edge.id, edge.source
            ));
        }
        if !node_ids.contains(edge.target.as_str()) {
            errors.push(format!(
                "Edge {} has invalid target node {}",
                edge.id, edge.target
            ));
        }
    }

    let mut outgoing: FxHashMap<&str, Vec<&Edge>> = FxHashMap::default();
    for edge in edges {
        outgoing.entry(edge.source.as_str()).or_default().push(edge);
    }
    let degree = |id: &str| outgoing.get(id).map(Vec::len).unwrap_or(0);

    for node in nodes {
        match &node.kind {
            NodeKind::Start => {
                if degree(&node.id) != 1 {
                    errors.push("Start node must have exactly one outgoing edge".to_string());
                }
            }
            NodeKind::End => {
                if degree(&node.id) > 0 {
                    errors.push("End node cannot have outgoing edges".to_string());
                }
            }
            NodeKind::Condition(_) => {
                let out = outgoing.get(node.id.as_str()).map(Vec::as_slice).unwrap_or(&[]);
                if out.len() != 2 {
                    errors.push(format!(
                        "Condition node {} must have exactly 2 outgoing edges (true/false)",
                        node.id
                    ));
                } else {
                    let has_true = out
                        .iter()
                        .any(|e| e.source_handle == Some(BranchHandle::True));
                    let has_false = out
                        .iter()
                        .any(|e| e.source_handle == Some(BranchHandle::False));
                    if !has_true || !has_false {
                        errors.push(format!(
                            "Condition node {} must have 'true' and 'false' handles",
                            node.id
                        ));
                    }
                }
            }
            // Promoted from a run-time-only failure: a non-branching step
            // with zero or several outgoing edges is a save-time defect.
            NodeKind::Action(_) => {
                if degree(&node.id) != 1 {
                    errors.push(format!(
                        "Action node {} must have exactly one outgoing edge",
                        node.id
                    ));
                }
            }
            NodeKind::Delay(_) => {
                if degree(&node.id) != 1 {
                    errors.push(format!(
                        "Delay node {} must have exactly one outgoing edge",
                        node.id
                    ));
                }
            }
            NodeKind::Unknown(_) => {}
        }
    }
}

/// Breadth-first reachability from the start node over the directed
/// adjacency. Unreachable nodes are reported together; an unreachable end
/// node gets its own message even though it also appears in the list.
fn check_reachability(
    nodes: &[Node],
    edges: &[Edge],
    start: &Node,
    end: Option<&Node>,
    errors: &mut Vec<String>,
) {
    let mut adjacency: FxHashMap<&str, Vec<&str>> = FxHashMap::default();
    for node in nodes {
        adjacency.entry(node.id.as_str()).or_default();
    }
    for edge in edges {
        if let Some(targets) = adjacency.get_mut(edge.source.as_str()) {
            targets.push(edge.target.as_str());
        }
    }

    let mut reachable: FxHashSet<&str> = FxHashSet::default();
    let mut queue: VecDeque<&str> = VecDeque::new();
    reachable.insert(start.id.as_str());
    queue.push_back(start.id.as_str());

    while let Some(current) = queue.pop_front() {
        for &neighbor in adjacency.get(current).map(Vec::as_slice).unwrap_or(&[]) {
            if reachable.insert(neighbor) {
                queue.push_back(neighbor);
            }
        }
    }

    let unreachable: Vec<&str> = nodes
        .iter()
        .filter(|n| !reachable.contains(n.id.as_str()))
        .map(|n| n.id.as_str())
        .collect();
    if !unreachable.is_empty() {
        errors.push(format!("Unreachable nodes: {}", unreachable.join(", ")));
    }

    if let Some(end) = end {
        if !reachable.contains(end.id.as_str()) {
            errors.push("End node is not reachable from Start node".to_string());
        }
    }
}
