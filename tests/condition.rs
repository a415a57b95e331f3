mod common;

use common::fixtures::rule;
use mailgraph::condition::evaluate;
use mailgraph::model::{ConditionData, ConditionRule, RuleLogic, RuleOperator};

#[test]
fn single_includes_rule() {
    let data = ConditionData {
        rules: vec![rule(RuleOperator::Includes, "test")],
        logic: RuleLogic::And,
    };
    assert!(evaluate(&data, "test@example.com"));
    assert!(!evaluate(&data, "foo@example.com"));
}

#[test]
fn two_rules_or_vs_and() {
    // Exactly one of the two rules matches this subject.
    let rules = vec![
        rule(RuleOperator::Includes, "test"),
        rule(RuleOperator::EndsWith, "@corp.example"),
    ];
    let or = ConditionData {
        rules: rules.clone(),
        logic: RuleLogic::Or,
    };
    let and = ConditionData {
        rules,
        logic: RuleLogic::And,
    };
    assert!(evaluate(&or, "test@example.com"));
    assert!(!evaluate(&and, "test@example.com"));
}

#[test]
fn every_operator_compares_case_insensitively() {
    let subject = "Test@Example.COM";
    let cases = [
        (RuleOperator::Equals, "test@example.com", true),
        (RuleOperator::NotEquals, "test@example.com", false),
        (RuleOperator::Includes, "EXAMPLE", true),
        (RuleOperator::StartsWith, "tEsT", true),
        (RuleOperator::EndsWith, ".com", true),
    ];
    for (operator, value, expected) in cases {
        let data = ConditionData {
            rules: vec![rule(operator, value)],
            logic: RuleLogic::And,
        };
        assert_eq!(
            evaluate(&data, subject),
            expected,
            "operator {operator:?} value {value:?}"
        );
    }
}

#[test]
fn rule_without_operator_never_matches() {
    let data = ConditionData {
        rules: vec![ConditionRule {
            operator: None,
            value: "anything".into(),
        }],
        logic: RuleLogic::Or,
    };
    assert!(!evaluate(&data, "anything"));
}
