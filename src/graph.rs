//! Read-only adjacency view over an automation's nodes and edges.
//!
//! [`GraphView`] is rebuilt from the stored [`Automation`](crate::model::Automation)
//! every time the interpreter (re)enters an execution, so a view never
//! outlives one pass over the graph and always reflects the latest saved
//! edit. It offers exactly the lookups the interpreter and validator need:
//! node by id, single successor by source id, and branch successor by
//! source id + handle.

use rustc_hash::FxHashMap;

use crate::model::{BranchHandle, Edge, Node};

/// Indexed lookups over one automation graph. Borrows the automation's
/// nodes and edges; no mutation API.
pub struct GraphView<'a> {
    nodes: FxHashMap<&'a str, &'a Node>,
    outgoing: FxHashMap<&'a str, Vec<&'a Edge>>,
}

impl<'a> GraphView<'a> {
    pub fn new(nodes: &'a [Node], edges: &'a [Edge]) -> Self {
        let mut node_index: FxHashMap<&str, &Node> = FxHashMap::default();
        for node in nodes {
            node_index.insert(node.id.as_str(), node);
        }
        let mut outgoing: FxHashMap<&str, Vec<&Edge>> = FxHashMap::default();
        for edge in edges {
            outgoing.entry(edge.source.as_str()).or_default().push(edge);
        }
        Self {
            nodes: node_index,
            outgoing,
        }
    }

    pub fn node(&self, id: &str) -> Option<&'a Node> {
        self.nodes.get(id).copied()
    }

    /// The automation's single start node, if exactly one exists.
    pub fn start_node(&self) -> Option<&'a Node> {
        let mut starts = self.nodes.values().filter(|n| n.kind.is_start());
        match (starts.next(), starts.next()) {
            (Some(node), None) => Some(node),
            _ => None,
        }
    }

    /// All edges leaving `source`, in document order.
    pub fn outgoing(&self, source: &str) -> &[&'a Edge] {
        self.outgoing.get(source).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Target of the single outgoing edge from `source`.
    ///
    /// Returns the first edge's target when several exist; callers that care
    /// about the single-edge invariant check [`outgoing`](Self::outgoing)
    /// (the validator) or fail the run (the interpreter on zero edges).
    pub fn successor(&self, source: &str) -> Option<&'a str> {
        self.outgoing(source).first().map(|e| e.target.as_str())
    }

    /// Target of the outgoing edge from a condition node carrying `handle`.
    pub fn branch_successor(&self, source: &str, handle: BranchHandle) -> Option<&'a str> {
        self.outgoing(source)
            .iter()
            .find(|e| e.source_handle == Some(handle))
            .map(|e| e.target.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ActionData, NodeKind};

    fn sample() -> (Vec<Node>, Vec<Edge>) {
        let nodes = vec![
            Node::new("s", NodeKind::Start),
            Node::new("a", NodeKind::Action(ActionData::default())),
            Node::new("e", NodeKind::End),
        ];
        let edges = vec![Edge::new("e1", "s", "a"), Edge::new("e2", "a", "e")];
        (nodes, edges)
    }

    #[test]
    fn successor_follows_single_edge() {
        let (nodes, edges) = sample();
        let graph = GraphView::new(&nodes, &edges);
        assert_eq!(graph.successor("s"), Some("a"));
        assert_eq!(graph.successor("a"), Some("e"));
        assert_eq!(graph.successor("e"), None);
    }

    #[test]
    fn branch_successor_selects_by_handle() {
        let nodes = vec![Node::new("c", NodeKind::Start)];
        let edges = vec![
            Edge::new("t", "c", "yes").with_handle(BranchHandle::True),
            Edge::new("f", "c", "no").with_handle(BranchHandle::False),
        ];
        let graph = GraphView::new(&nodes, &edges);
        assert_eq!(graph.branch_successor("c", BranchHandle::True), Some("yes"));
        assert_eq!(graph.branch_successor("c", BranchHandle::False), Some("no"));
    }

    #[test]
    fn start_node_requires_exactly_one() {
        let (nodes, edges) = sample();
        let graph = GraphView::new(&nodes, &edges);
        assert_eq!(graph.start_node().map(|n| n.id.as_str()), Some("s"));

        let two_starts = vec![
            Node::new("s1", NodeKind::Start),
            Node::new("s2", NodeKind::Start),
        ];
        let graph = GraphView::new(&two_starts, &[]);
        assert!(graph.start_node().is_none());
    }
}
