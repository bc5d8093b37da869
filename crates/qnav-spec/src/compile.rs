use std::collections::HashMap;
use std::fmt;

use tracing::{debug, warn};

use crate::answers::{AnswerStore, AnswerValue};
use crate::error::{CompileError, EvaluationError, LoadError, StructuralError};
use crate::expr::{self, CompareOp, Expr};
use crate::spec::{CombinationMode, Condition, Item, ItemKind, Operator, SimpleCondition};

/// Compiled visibility rule of an item.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Always,
    Simple(SimpleCondition),
    /// Parsed once at load time; `source` is kept for diagnostics.
    Expression {
        source: String,
        expr: Expr,
    },
    All(Vec<Predicate>),
    Any(Vec<Predicate>),
}

impl Predicate {
    /// Conjunction that drops `Always` operands.
    pub fn and(self, other: Predicate) -> Predicate {
        match (self, other) {
            (Predicate::Always, other) | (other, Predicate::Always) => other,
            (Predicate::All(mut left), Predicate::All(right)) => {
                left.extend(right);
                Predicate::All(left)
            }
            (Predicate::All(mut left), other) => {
                left.push(other);
                Predicate::All(left)
            }
            (left, right) => Predicate::All(vec![left, right]),
        }
    }

    pub fn is_always(&self) -> bool {
        matches!(self, Predicate::Always)
    }

    /// Three-valued evaluation: `false` decides a conjunction and `true` a
    /// disjunction even when a sibling faults.
    pub fn evaluate(&self, store: &AnswerStore) -> Result<bool, EvaluationError> {
        match self {
            Predicate::Always => Ok(true),
            Predicate::Simple(condition) => evaluate_simple(condition, store),
            Predicate::Expression { expr, .. } => expr.evaluate(store),
            Predicate::All(parts) => {
                let mut fault = None;
                for part in parts {
                    match part.evaluate(store) {
                        Ok(false) => return Ok(false),
                        Ok(true) => {}
                        Err(err) => {
                            fault.get_or_insert(err);
                        }
                    }
                }
                fault.map_or(Ok(true), Err)
            }
            Predicate::Any(parts) => {
                let mut fault = None;
                for part in parts {
                    match part.evaluate(store) {
                        Ok(true) => return Ok(true),
                        Ok(false) => {}
                        Err(err) => {
                            fault.get_or_insert(err);
                        }
                    }
                }
                fault.map_or(Ok(false), Err)
            }
        }
    }

    /// Navigation-time view: faults count as "not yet satisfied".
    pub fn is_satisfied(&self, store: &AnswerStore) -> bool {
        match self.evaluate(store) {
            Ok(value) => value,
            Err(err) => {
                debug!(predicate = %self, error = %err, "predicate fault treated as false");
                false
            }
        }
    }
}

fn evaluate_simple(
    condition: &SimpleCondition,
    store: &AnswerStore,
) -> Result<bool, EvaluationError> {
    let op = match condition.operator {
        Operator::Exists => {
            return match &condition.answer {
                AnswerValue::Boolean(expected) => {
                    Ok(store.is_answered(&condition.question) == *expected)
                }
                other => Err(EvaluationError::TypeMismatch {
                    expected: "boolean".into(),
                    found: other.kind_label().into(),
                }),
            };
        }
        Operator::Equals => CompareOp::Eq,
        Operator::NotEquals => CompareOp::Ne,
        Operator::GreaterThan => CompareOp::Gt,
        Operator::LessThan => CompareOp::Lt,
        Operator::GreaterOrEqual => CompareOp::Ge,
        Operator::LessOrEqual => CompareOp::Le,
    };
    match store.values(&condition.question) {
        Some(values) if !values.is_empty() => expr::compare_answers(op, values, &condition.answer),
        _ => Err(EvaluationError::MissingAnswer(condition.question.clone())),
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, parts: &[Predicate], word: &str) -> fmt::Result {
    for (index, part) in parts.iter().enumerate() {
        if index > 0 {
            write!(f, " {word} ")?;
        }
        match part {
            Predicate::All(_) | Predicate::Any(_) | Predicate::Expression { .. } => {
                write!(f, "({part})")?
            }
            other => write!(f, "{other}")?,
        }
    }
    Ok(())
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Always => f.write_str("always"),
            Predicate::Simple(condition) => write!(
                f,
                "{} {} {}",
                condition.question,
                condition.operator,
                Expr::Literal(condition.answer.clone())
            ),
            Predicate::Expression { source, .. } => f.write_str(source),
            Predicate::All(parts) => write_joined(f, parts, "and"),
            Predicate::Any(parts) => write_joined(f, parts, "or"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct IndexEntry {
    position: usize,
    kind: ItemKind,
}

/// Arena view of the item tree: identifier to document position and kind.
#[derive(Debug, Default)]
pub(crate) struct ItemIndex {
    entries: HashMap<String, IndexEntry>,
}

impl ItemIndex {
    /// Indexes `items` in pre-order, rejecting empty and duplicate identifiers.
    pub(crate) fn build(items: &[Item]) -> Result<Self, StructuralError> {
        let mut index = ItemIndex::default();
        index.insert_all(items, "<root>")?;
        Ok(index)
    }

    fn insert_all(&mut self, items: &[Item], parent: &str) -> Result<(), StructuralError> {
        for item in items {
            if item.id.trim().is_empty() {
                return Err(StructuralError::EmptyIdentifier {
                    parent: parent.to_string(),
                });
            }
            let entry = IndexEntry {
                position: self.entries.len(),
                kind: item.kind,
            };
            if self.entries.insert(item.id.clone(), entry).is_some() {
                return Err(StructuralError::DuplicateIdentifier(item.id.clone()));
            }
            self.insert_all(&item.items, &item.id)?;
        }
        Ok(())
    }

    pub(crate) fn position(&self, id: &str) -> Option<usize> {
        self.entries.get(id).map(|entry| entry.position)
    }

    fn check_reference(&self, item: &Item, reference: &str) -> Result<(), LoadError> {
        let entry = self
            .entries
            .get(reference)
            .ok_or_else(|| CompileError::UnknownQuestion {
                item: item.id.clone(),
                reference: reference.to_string(),
            })?;
        let own = self.position(&item.id).unwrap_or(usize::MAX);
        if entry.position >= own {
            return Err(StructuralError::ForwardReference {
                item: item.id.clone(),
                reference: reference.to_string(),
            }
            .into());
        }
        if !entry.kind.is_answerable() {
            return Err(CompileError::NotAnswerable {
                item: item.id.clone(),
                reference: reference.to_string(),
            }
            .into());
        }
        Ok(())
    }
}

/// Compiles an item's `enable_when` list into one predicate.
///
/// Expressions are parsed here, once. Every referenced identifier must name
/// an answerable item declared earlier in document order.
pub(crate) fn compile_conditions(item: &Item, index: &ItemIndex) -> Result<Predicate, LoadError> {
    let mode = match &item.enable_behavior {
        Some(raw) => raw
            .parse::<CombinationMode>()
            .map_err(|mode| CompileError::InvalidCombination {
                item: item.id.clone(),
                mode,
            })?,
        None => {
            if item.enable_when.len() > 1 {
                warn!(
                    item = %item.id,
                    conditions = item.enable_when.len(),
                    "no enable behavior declared for several conditions, combining with ALL"
                );
            }
            CombinationMode::All
        }
    };

    let mut parts = Vec::with_capacity(item.enable_when.len());
    for condition in &item.enable_when {
        let predicate = match condition {
            Condition::Simple(simple) => {
                index.check_reference(item, &simple.question)?;
                Predicate::Simple(simple.clone())
            }
            Condition::Expression { expression } => {
                let expr = expr::parse(expression).map_err(|source| LoadError::Parse {
                    item: item.id.clone(),
                    source,
                })?;
                for reference in expr.references() {
                    index.check_reference(item, reference)?;
                }
                Predicate::Expression {
                    source: expression.clone(),
                    expr,
                }
            }
        };
        parts.push(predicate);
    }

    Ok(match (parts.len(), mode) {
        (0, _) => Predicate::Always,
        (1, _) => parts.remove(0),
        (_, CombinationMode::All) => Predicate::All(parts),
        (_, CombinationMode::Any) => Predicate::Any(parts),
    })
}
