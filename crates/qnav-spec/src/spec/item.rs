use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::answers::{AnswerValue, DatePrecision};
use crate::spec::condition::Condition;

/// Supported item kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    SingleChoice,
    MultipleChoice,
    OpenChoice,
    Text,
    Numeric,
    Decimal,
    Date,
    DateTime,
    Time,
    Slider,
    Display,
    Group,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::SingleChoice => "single_choice",
            ItemKind::MultipleChoice => "multiple_choice",
            ItemKind::OpenChoice => "open_choice",
            ItemKind::Text => "text",
            ItemKind::Numeric => "numeric",
            ItemKind::Decimal => "decimal",
            ItemKind::Date => "date",
            ItemKind::DateTime => "date_time",
            ItemKind::Time => "time",
            ItemKind::Slider => "slider",
            ItemKind::Display => "display",
            ItemKind::Group => "group",
        }
    }

    /// Whether answers can be recorded against items of this kind.
    pub fn is_answerable(&self) -> bool {
        !matches!(self, ItemKind::Display | ItemKind::Group)
    }

    pub fn is_choice(&self) -> bool {
        matches!(
            self,
            ItemKind::SingleChoice | ItemKind::MultipleChoice | ItemKind::OpenChoice
        )
    }
}

/// One selectable answer declared inline on an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnswerOption {
    pub value: AnswerValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Value constraints applied to answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
pub struct Constraint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<AnswerValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<AnswerValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// Shown instead of the generic message when `pattern` does not match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Slider increment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
}

/// Question, display or group node of the questionnaire tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Item {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint: Option<Constraint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_precision: Option<DatePrecision>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub answer_options: Vec<AnswerOption>,
    /// `#id` of a contained value set, or its canonical url.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer_value_set: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enable_when: Vec<Condition>,
    /// `all` or `any`; defaults to `all` when several conditions are declared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_behavior: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<Item>,
}

impl Item {
    pub fn new(id: impl Into<String>, kind: ItemKind) -> Self {
        Self {
            id: id.into(),
            kind,
            text: None,
            required: false,
            constraint: None,
            date_precision: None,
            answer_options: Vec::new(),
            answer_value_set: None,
            enable_when: Vec::new(),
            enable_behavior: None,
            items: Vec::new(),
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_options(mut self, values: impl IntoIterator<Item = AnswerValue>) -> Self {
        self.answer_options
            .extend(values.into_iter().map(|value| AnswerOption { value, label: None }));
        self
    }

    pub fn enable_when(mut self, condition: Condition) -> Self {
        self.enable_when.push(condition);
        self
    }

    pub fn enable_behavior(mut self, behavior: impl Into<String>) -> Self {
        self.enable_behavior = Some(behavior.into());
        self
    }

    pub fn with_items(mut self, items: Vec<Item>) -> Self {
        self.items = items;
        self
    }
}
