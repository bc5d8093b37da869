use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Malformed expression source. Positions are byte offsets into the source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("at position {position}: expected {expected}, found {found}")]
pub struct ParseError {
    pub position: usize,
    pub expected: String,
    pub found: String,
}

impl ParseError {
    pub(crate) fn new(position: usize, expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self {
            position,
            expected: expected.into(),
            found: found.into(),
        }
    }
}

/// Condition lists that cannot be compiled into a predicate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("item '{item}' references unknown question '{reference}'")]
    UnknownQuestion { item: String, reference: String },
    #[error("item '{item}' references '{reference}', which does not take answers")]
    NotAnswerable { item: String, reference: String },
    #[error("item '{item}' declares unsupported enable behavior '{mode}' (expected 'all' or 'any')")]
    InvalidCombination { item: String, mode: String },
    #[error("item '{item}' references value set '{reference}', which is not contained in the questionnaire")]
    UnknownValueSet { item: String, reference: String },
    #[error("item '{item}' declares an invalid pattern '{pattern}': {message}")]
    InvalidPattern {
        item: String,
        pattern: String,
        message: String,
    },
}

/// Problems with the shape of the item tree itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralError {
    #[error("questionnaire has no items")]
    NoItems,
    #[error("an item below '{parent}' has an empty identifier")]
    EmptyIdentifier { parent: String },
    #[error("identifier '{0}' is declared more than once")]
    DuplicateIdentifier(String),
    #[error("item '{item}' references '{reference}', which is not declared before it")]
    ForwardReference { item: String, reference: String },
}

/// Single failure surfaced by navigable task construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("item '{item}' has a malformed expression {source}")]
    Parse {
        item: String,
        #[source]
        source: ParseError,
    },
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Structural(#[from] StructuralError),
}

/// Navigation-time predicate fault. Callers resolve these as "not satisfied".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvaluationError {
    #[error("question '{0}' has no recorded answer")]
    MissingAnswer(String),
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },
    #[error("cannot order {left} against {right}")]
    Incomparable { left: String, right: String },
}

/// Rejected answer for a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{step_id}: {message}")]
pub struct AnswerError {
    pub step_id: String,
    pub message: String,
    pub code: String,
}

impl AnswerError {
    pub(crate) fn new(step_id: &str, message: impl Into<String>, code: &str) -> Self {
        Self {
            step_id: step_id.to_string(),
            message: message.into(),
            code: code.to_string(),
        }
    }
}

/// Failures of a running interview session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InterviewError {
    #[error("step '{0}' requires an answer before advancing")]
    RequiredAnswerMissing(String),
    #[error("already at the first step")]
    AtFirstStep,
    #[error("the interview is already complete")]
    Completed,
    #[error("invalid answer: {0}")]
    InvalidAnswer(#[from] AnswerError),
}
