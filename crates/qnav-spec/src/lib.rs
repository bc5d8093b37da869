#![allow(missing_docs)]

pub mod answers;
pub mod compile;
pub mod config;
pub mod error;
pub mod expr;
pub mod navigation;
pub mod options;
pub mod render;
pub mod response;
pub mod spec;
pub mod validate;
pub mod visibility;

pub use answers::{Answer, AnswerStore, AnswerValue, Coding, DatePrecision, PartialDate};
pub use compile::Predicate;
pub use config::{CompletionStep, TaskOptions};
pub use error::{
    AnswerError, CompileError, EvaluationError, InterviewError, LoadError, ParseError,
    StructuralError,
};
pub use expr::{CompareOp, Expr, Function};
pub use navigation::{Interview, NavigableTask, NavigationRule, Step, StepRole};
pub use options::{ResolvedOption, resolve_options};
pub use render::{
    RenderPayload, RenderProgress, RenderStatus, RenderStep, build_render_payload,
    render_json_ui, render_text,
};
pub use response::{
    ResponseAnswer, ResponseDocument, ResponseItem, ResponseStatus, build_response,
};
pub use spec::{
    AnswerOption, CombinationMode, Condition, Constraint, Item, ItemKind, Operator, Questionnaire,
    SimpleCondition, ValueSet, ValueSetConcept,
};
pub use validate::{ValidationResult, normalize_answer, validate_answer, validate_store};
pub use visibility::{VisibilityMap, resolve_visibility};

/// JSON Schema describing questionnaire definitions.
pub fn questionnaire_schema() -> serde_json::Value {
    serde_json::to_value(schemars::schema_for!(Questionnaire)).unwrap_or(serde_json::Value::Null)
}
