use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::answers::AnswerValue;

/// Comparison used by simple conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum Operator {
    #[serde(rename = "=", alias = "equals")]
    Equals,
    #[serde(rename = "!=", alias = "not_equals")]
    NotEquals,
    #[serde(rename = "exists")]
    Exists,
    #[serde(rename = ">", alias = "greater_than")]
    GreaterThan,
    #[serde(rename = "<", alias = "less_than")]
    LessThan,
    #[serde(rename = ">=", alias = "greater_or_equal")]
    GreaterOrEqual,
    #[serde(rename = "<=", alias = "less_or_equal")]
    LessOrEqual,
}

impl Operator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Equals => "=",
            Operator::NotEquals => "!=",
            Operator::Exists => "exists",
            Operator::GreaterThan => ">",
            Operator::LessThan => "<",
            Operator::GreaterOrEqual => ">=",
            Operator::LessOrEqual => "<=",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// `question <operator> answer` shorthand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SimpleCondition {
    pub question: String,
    pub operator: Operator,
    /// Literal operand; a boolean for `exists`.
    pub answer: AnswerValue,
}

/// Declared visibility rule of an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Condition {
    Simple(SimpleCondition),
    Expression { expression: String },
}

impl Condition {
    pub fn simple(question: impl Into<String>, operator: Operator, answer: AnswerValue) -> Self {
        Condition::Simple(SimpleCondition {
            question: question.into(),
            operator,
            answer,
        })
    }

    pub fn expression(source: impl Into<String>) -> Self {
        Condition::Expression {
            expression: source.into(),
        }
    }
}

/// How several conditions of one item combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CombinationMode {
    #[default]
    All,
    Any,
}

impl FromStr for CombinationMode {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(CombinationMode::All),
            "any" => Ok(CombinationMode::Any),
            _ => Err(raw.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn conditions_deserialize_both_variants() {
        let simple: Condition = serde_json::from_value(json!({
            "kind": "simple",
            "question": "q1",
            "operator": "=",
            "answer": {"type": "string", "value": "Yes"}
        }))
        .expect("simple condition");
        assert_eq!(
            simple,
            Condition::simple("q1", Operator::Equals, AnswerValue::String("Yes".into()))
        );

        let worded: Condition = serde_json::from_value(json!({
            "kind": "simple",
            "question": "q2",
            "operator": "greater_or_equal",
            "answer": {"type": "integer", "value": 10}
        }))
        .expect("aliased operator");
        assert!(matches!(
            worded,
            Condition::Simple(SimpleCondition {
                operator: Operator::GreaterOrEqual,
                ..
            })
        ));

        let expression: Condition = serde_json::from_value(json!({
            "kind": "expression",
            "expression": "exists(q1)"
        }))
        .expect("expression condition");
        assert_eq!(expression, Condition::expression("exists(q1)"));
    }

    #[test]
    fn combination_mode_parses_case_insensitively() {
        assert_eq!("ANY".parse(), Ok(CombinationMode::Any));
        assert_eq!(" all ".parse(), Ok(CombinationMode::All));
        assert_eq!("some".parse::<CombinationMode>(), Err("some".to_string()));
    }
}
