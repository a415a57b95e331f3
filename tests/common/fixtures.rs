//! Graph fixtures shared by the integration tests.

use mailgraph::model::{
    ActionData, BranchHandle, ConditionData, ConditionRule, DelaySpec, Edge, Node, NodeKind,
    RuleLogic, RuleOperator,
};

pub fn action(id: &str, message: &str) -> Node {
    Node::new(
        id,
        NodeKind::Action(ActionData {
            message: message.into(),
        }),
    )
}

pub fn rule(operator: RuleOperator, value: &str) -> ConditionRule {
    ConditionRule {
        operator: Some(operator),
        value: value.into(),
    }
}

/// `start -> action(message) -> end`.
pub fn linear_graph(message: &str) -> (Vec<Node>, Vec<Edge>) {
    let nodes = vec![
        Node::new("start", NodeKind::Start),
        action("send", message),
        Node::new("end", NodeKind::End),
    ];
    let edges = vec![
        Edge::new("e1", "start", "send"),
        Edge::new("e2", "send", "end"),
    ];
    (nodes, edges)
}

/// `start -> delay(spec) -> action(message) -> end`.
pub fn delay_graph(spec: DelaySpec, message: &str) -> (Vec<Node>, Vec<Edge>) {
    let nodes = vec![
        Node::new("start", NodeKind::Start),
        Node::new("wait", NodeKind::Delay(spec)),
        action("send", message),
        Node::new("end", NodeKind::End),
    ];
    let edges = vec![
        Edge::new("e1", "start", "wait"),
        Edge::new("e2", "wait", "send"),
        Edge::new("e3", "send", "end"),
    ];
    (nodes, edges)
}

/// Branching graph: the condition's rules route matching subjects to the
/// `matched` action and everything else to the `other` action; both
/// branches converge on the single end node.
///
/// ```text
/// start -> check -(true)-> matched -> end
///                \(false)-> other --/
/// ```
pub fn branching_graph(rules: Vec<ConditionRule>, logic: RuleLogic) -> (Vec<Node>, Vec<Edge>) {
    let nodes = vec![
        Node::new("start", NodeKind::Start),
        Node::new("check", NodeKind::Condition(ConditionData { rules, logic })),
        action("matched", "matched-branch"),
        action("other", "other-branch"),
        Node::new("end", NodeKind::End),
    ];
    let edges = vec![
        Edge::new("e1", "start", "check"),
        Edge::new("e2", "check", "matched").with_handle(BranchHandle::True),
        Edge::new("e3", "check", "other").with_handle(BranchHandle::False),
        Edge::new("e4", "matched", "end"),
        Edge::new("e5", "other", "end"),
    ];
    (nodes, edges)
}
