//! Core value types for automation graphs.
//!
//! An [`Automation`] is the saved, named workflow: a list of [`Node`]s plus a
//! list of directed [`Edge`]s. The engine treats these as immutable input —
//! there is no mutation API here, and the interpreter re-reads the stored
//! automation on every resumption so edits made while an execution is
//! suspended are picked up.
//!
//! Node payloads are a tagged variant ([`NodeKind`]) keyed by the node's
//! `type` field rather than a bag of optional fields, so a constructed node
//! can only carry the data its type allows. Unrecognized type tags round-trip
//! as [`NodeKind::Unknown`] so the validator can report them instead of the
//! deserializer rejecting the whole document.

use chrono::{DateTime, Duration, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// Milliseconds per relative-delay unit.
const MINUTE_MS: i64 = 60_000;
const HOUR_MS: i64 = 3_600_000;
const DAY_MS: i64 = 86_400_000;

/// A saved workflow graph.
///
/// `name` is unique across the store (1–100 characters, enforced by the
/// storage layer); `created_at`/`updated_at` are maintained by storage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Automation {
    pub id: String,
    pub name: String,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single typed step in an automation graph.
///
/// Serialized form matches the stored document shape:
/// `{ "id": "...", "type": "action", "data": { ... } }`.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    /// Unique within the owning automation.
    pub id: String,
    pub kind: NodeKind,
}

impl Node {
    pub fn new(id: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }

    /// The wire name of this node's type (`"start"`, `"action"`, ...).
    ///
    /// Unknown kinds report their original tag so log entries and validation
    /// messages show what the document actually said.
    pub fn type_name(&self) -> &str {
        self.kind.type_name()
    }
}

/// Node payload, tagged by the node's `type` field.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    /// Entry point; exactly one per automation, no payload.
    Start,
    /// Terminal node; exactly one per automation, no payload.
    End,
    /// Send a message to the execution's subject identity.
    Action(ActionData),
    /// Suspend the execution until a due time.
    Delay(DelaySpec),
    /// Branch on rules evaluated against the subject identity.
    Condition(ConditionData),
    /// Unrecognized type tag, preserved verbatim for error reporting.
    Unknown(String),
}

impl NodeKind {
    pub fn type_name(&self) -> &str {
        match self {
            NodeKind::Start => "start",
            NodeKind::End => "end",
            NodeKind::Action(_) => "action",
            NodeKind::Delay(_) => "delay",
            NodeKind::Condition(_) => "condition",
            NodeKind::Unknown(tag) => tag,
        }
    }

    pub fn is_start(&self) -> bool {
        matches!(self, Self::Start)
    }

    pub fn is_end(&self) -> bool {
        matches!(self, Self::End)
    }

    pub fn is_condition(&self) -> bool {
        matches!(self, Self::Condition(_))
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Payload of an `action` node.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionData {
    /// Message text delivered to the subject identity. Must be non-empty;
    /// enforced by validation, not construction, so drafts are representable.
    #[serde(default)]
    pub message: String,
}

/// Payload of a `delay` node, tagged by its `mode` field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum DelaySpec {
    /// Wait until a fixed wall-clock instant.
    #[serde(rename_all = "camelCase")]
    Absolute { absolute_time: DateTime<Utc> },
    /// Wait for a span relative to when the node is reached.
    #[serde(rename_all = "camelCase")]
    Relative {
        relative_value: u32,
        relative_unit: DelayUnit,
    },
}

impl DelaySpec {
    /// Delay duration measured from `now`, clamped at zero.
    ///
    /// Absolute times already in the past and zero-valued relative delays
    /// both yield zero, which the interpreter treats as "continue
    /// immediately" rather than suspending.
    pub fn duration_from(&self, now: DateTime<Utc>) -> Duration {
        match self {
            DelaySpec::Absolute { absolute_time } => {
                (*absolute_time - now).max(Duration::zero())
            }
            DelaySpec::Relative {
                relative_value,
                relative_unit,
            } => Duration::milliseconds(i64::from(*relative_value) * relative_unit.millis()),
        }
    }

    /// Human-readable form used in execution log entries
    /// (`"until 2026-08-07T12:00:00Z"` / `"2 hours"`).
    pub fn describe(&self) -> String {
        match self {
            DelaySpec::Absolute { absolute_time } => {
                format!("until {}", absolute_time.to_rfc3339())
            }
            DelaySpec::Relative {
                relative_value,
                relative_unit,
            } => format!("{relative_value} {relative_unit}"),
        }
    }
}

/// Unit of a relative delay.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DelayUnit {
    Minutes,
    Hours,
    Days,
}

impl DelayUnit {
    pub fn millis(self) -> i64 {
        match self {
            DelayUnit::Minutes => MINUTE_MS,
            DelayUnit::Hours => HOUR_MS,
            DelayUnit::Days => DAY_MS,
        }
    }
}

impl fmt::Display for DelayUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DelayUnit::Minutes => f.write_str("minutes"),
            DelayUnit::Hours => f.write_str("hours"),
            DelayUnit::Days => f.write_str("days"),
        }
    }
}

/// Payload of a `condition` node.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionData {
    #[serde(default)]
    pub rules: Vec<ConditionRule>,
    #[serde(default)]
    pub logic: RuleLogic,
}

/// One comparison against the execution's subject identity.
///
/// `operator` stays optional so a half-edited rule is representable; the
/// validator reports it as incomplete and the evaluator treats it as false.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConditionRule {
    #[serde(default)]
    pub operator: Option<RuleOperator>,
    #[serde(default)]
    pub value: String,
}

/// Comparison operator of a condition rule. All comparisons are
/// case-insensitive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleOperator {
    Equals,
    NotEquals,
    Includes,
    StartsWith,
    EndsWith,
}

/// How a condition node combines its rule outcomes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RuleLogic {
    #[default]
    And,
    Or,
}

/// Branch tag on a condition node's outgoing edges.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchHandle {
    True,
    False,
}

impl BranchHandle {
    pub fn from_outcome(outcome: bool) -> Self {
        if outcome {
            BranchHandle::True
        } else {
            BranchHandle::False
        }
    }
}

impl fmt::Display for BranchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BranchHandle::True => f.write_str("true"),
            BranchHandle::False => f.write_str("false"),
        }
    }
}

/// A directed connection between two nodes.
///
/// `source_handle` is only meaningful on edges leaving a condition node,
/// where the pair of outgoing edges must carry `true` and `false`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<BranchHandle>,
}

impl Edge {
    pub fn new(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            source_handle: None,
        }
    }

    #[must_use]
    pub fn with_handle(mut self, handle: BranchHandle) -> Self {
        self.source_handle = Some(handle);
        self
    }
}

/* ---------- Node wire (de)serialization ---------- */

// The stored shape keeps `type` and `data` as sibling fields. Serde's
// adjacent tagging cannot express the Unknown fallback, so the mapping is
// spelled out against a raw carrier struct.

#[derive(Serialize, Deserialize)]
struct NodeWire {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let (kind, data) = match &self.kind {
            NodeKind::Start => ("start".to_string(), Value::Object(Default::default())),
            NodeKind::End => ("end".to_string(), Value::Object(Default::default())),
            NodeKind::Action(data) => (
                "action".to_string(),
                serde_json::to_value(data).map_err(serde::ser::Error::custom)?,
            ),
            NodeKind::Delay(spec) => (
                "delay".to_string(),
                serde_json::to_value(spec).map_err(serde::ser::Error::custom)?,
            ),
            NodeKind::Condition(data) => (
                "condition".to_string(),
                serde_json::to_value(data).map_err(serde::ser::Error::custom)?,
            ),
            NodeKind::Unknown(tag) => (tag.clone(), Value::Object(Default::default())),
        };
        NodeWire {
            id: self.id.clone(),
            kind,
            data,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut wire = NodeWire::deserialize(deserializer)?;
        // Absent and null payloads both read as the empty object.
        if wire.data.is_null() {
            wire.data = Value::Object(Default::default());
        }
        let kind = match wire.kind.as_str() {
            "start" => NodeKind::Start,
            "end" => NodeKind::End,
            "action" => {
                NodeKind::Action(serde_json::from_value(wire.data).map_err(D::Error::custom)?)
            }
            "delay" => {
                NodeKind::Delay(serde_json::from_value(wire.data).map_err(D::Error::custom)?)
            }
            "condition" => {
                NodeKind::Condition(serde_json::from_value(wire.data).map_err(D::Error::custom)?)
            }
            other => NodeKind::Unknown(other.to_string()),
        };
        Ok(Node { id: wire.id, kind })
    }
}
