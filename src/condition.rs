//! Condition rule evaluation.
//!
//! Pure string comparison against the execution's subject identity; no I/O,
//! no side effects. Every operator compares case-insensitively: both the
//! subject and the rule value are lower-cased before the comparison.

use crate::model::{ConditionData, ConditionRule, RuleLogic, RuleOperator};

/// Evaluate a condition node's rules against the subject identity.
///
/// Rule outcomes are combined with the node's logic: `AND` requires every
/// rule to match, `OR` any. An empty rule list is vacuously true under `AND`
/// and false under `OR` (validation rejects empty rule lists before they
/// reach an execution). An incomplete rule evaluates to false.
pub fn evaluate(data: &ConditionData, subject: &str) -> bool {
    let subject = subject.to_lowercase();
    match data.logic {
        RuleLogic::And => data.rules.iter().all(|rule| matches(rule, &subject)),
        RuleLogic::Or => data.rules.iter().any(|rule| matches(rule, &subject)),
    }
}

fn matches(rule: &ConditionRule, subject_lower: &str) -> bool {
    let value = rule.value.to_lowercase();
    match rule.operator {
        Some(RuleOperator::Equals) => subject_lower == value,
        Some(RuleOperator::NotEquals) => subject_lower != value,
        Some(RuleOperator::Includes) => subject_lower.contains(&value),
        Some(RuleOperator::StartsWith) => subject_lower.starts_with(&value),
        Some(RuleOperator::EndsWith) => subject_lower.ends_with(&value),
        None => false,
    }
}
