use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Coded answer, typically drawn from an option list or value set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct Coding {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl Coding {
    pub fn new(system: Option<&str>, code: &str, display: Option<&str>) -> Self {
        Self {
            system: system.map(str::to_string),
            code: code.to_string(),
            display: display.map(str::to_string),
        }
    }

    /// Codes must agree; systems only when both sides declare one.
    pub fn matches(&self, other: &Coding) -> bool {
        if self.code != other.code {
            return false;
        }
        match (&self.system, &other.system) {
            (Some(left), Some(right)) => left == right,
            _ => true,
        }
    }

    pub fn label(&self) -> &str {
        self.display.as_deref().unwrap_or(&self.code)
    }
}

/// Declared precision of a date item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum DatePrecision {
    Year,
    Month,
    Day,
}

/// Calendar date known to year, month or day precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PartialDate {
    Year(i32),
    YearMonth(i32, u32),
    Full(NaiveDate),
}

impl PartialDate {
    pub fn precision(&self) -> DatePrecision {
        match self {
            PartialDate::Year(_) => DatePrecision::Year,
            PartialDate::YearMonth(..) => DatePrecision::Month,
            PartialDate::Full(_) => DatePrecision::Day,
        }
    }

    fn components(&self) -> (i32, Option<u32>, Option<u32>) {
        match self {
            PartialDate::Year(year) => (*year, None, None),
            PartialDate::YearMonth(year, month) => (*year, Some(*month), None),
            PartialDate::Full(date) => (date.year(), Some(date.month()), Some(date.day())),
        }
    }

    /// Drops components finer than `precision`; coarser dates are returned as-is.
    pub fn truncate(&self, precision: DatePrecision) -> PartialDate {
        let (year, month, _) = self.components();
        match (precision, self) {
            (DatePrecision::Year, _) => PartialDate::Year(year),
            (DatePrecision::Month, PartialDate::Full(_)) => {
                PartialDate::YearMonth(year, month.unwrap_or(1))
            }
            _ => *self,
        }
    }

    /// Orders two dates on their shared components. `None` when the shared
    /// components are equal but the precisions differ.
    pub fn compare(&self, other: &PartialDate) -> Option<Ordering> {
        let (left_year, left_month, left_day) = self.components();
        let (right_year, right_month, right_day) = other.components();
        let pairs = [
            (Some(left_year as i64), Some(right_year as i64)),
            (left_month.map(i64::from), right_month.map(i64::from)),
            (left_day.map(i64::from), right_day.map(i64::from)),
        ];
        for pair in pairs {
            match pair {
                (Some(left), Some(right)) => match left.cmp(&right) {
                    Ordering::Equal => continue,
                    other => return Some(other),
                },
                (None, None) => return Some(Ordering::Equal),
                _ => return None,
            }
        }
        Some(Ordering::Equal)
    }
}

impl fmt::Display for PartialDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartialDate::Year(year) => write!(f, "{year:04}"),
            PartialDate::YearMonth(year, month) => write!(f, "{year:04}-{month:02}"),
            PartialDate::Full(date) => write!(f, "{}", date.format("%Y-%m-%d")),
        }
    }
}

impl FromStr for PartialDate {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = || format!("'{raw}' is not a date (expected YYYY, YYYY-MM or YYYY-MM-DD)");
        let parts: Vec<&str> = raw.split('-').collect();
        if parts.iter().any(|part| part.is_empty() || !part.chars().all(|c| c.is_ascii_digit())) {
            return Err(invalid());
        }
        match parts.as_slice() {
            [year] if year.len() == 4 => year.parse().map(PartialDate::Year).map_err(|_| invalid()),
            [year, month] if year.len() == 4 && month.len() == 2 => {
                let year = year.parse().map_err(|_| invalid())?;
                let month: u32 = month.parse().map_err(|_| invalid())?;
                if !(1..=12).contains(&month) {
                    return Err(invalid());
                }
                Ok(PartialDate::YearMonth(year, month))
            }
            [year, month, day] if year.len() == 4 && month.len() == 2 && day.len() == 2 => {
                NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .map(PartialDate::Full)
                    .map_err(|_| invalid())
            }
            _ => Err(invalid()),
        }
    }
}

impl TryFrom<String> for PartialDate {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PartialDate> for String {
    fn from(value: PartialDate) -> Self {
        value.to_string()
    }
}

/// Typed answer value; also the literal type of conditions and expressions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AnswerValue {
    Boolean(bool),
    Integer(i64),
    Decimal(f64),
    String(String),
    Date(#[schemars(with = "String")] PartialDate),
    DateTime(NaiveDateTime),
    Time(NaiveTime),
    Coding(Coding),
}

impl AnswerValue {
    pub fn kind_label(&self) -> &'static str {
        match self {
            AnswerValue::Boolean(_) => "boolean",
            AnswerValue::Integer(_) => "integer",
            AnswerValue::Decimal(_) => "decimal",
            AnswerValue::String(_) => "string",
            AnswerValue::Date(_) => "date",
            AnswerValue::DateTime(_) => "date-time",
            AnswerValue::Time(_) => "time",
            AnswerValue::Coding(_) => "coding",
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AnswerValue::Integer(value) => Some(*value as f64),
            AnswerValue::Decimal(value) => Some(*value),
            _ => None,
        }
    }

    /// Option identity: codings by system and code, everything else by value.
    pub fn same_option(&self, other: &AnswerValue) -> bool {
        match (self, other) {
            (AnswerValue::Coding(left), AnswerValue::Coding(right)) => left.matches(right),
            (left, right) => left == right,
        }
    }
}

impl fmt::Display for AnswerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnswerValue::Boolean(value) => write!(f, "{value}"),
            AnswerValue::Integer(value) => write!(f, "{value}"),
            AnswerValue::Decimal(value) => write!(f, "{value:?}"),
            AnswerValue::String(value) => f.write_str(value),
            AnswerValue::Date(value) => write!(f, "{value}"),
            AnswerValue::DateTime(value) => write!(f, "{}", value.format("%Y-%m-%dT%H:%M:%S")),
            AnswerValue::Time(value) => write!(f, "{}", value.format("%H:%M:%S")),
            AnswerValue::Coding(coding) => f.write_str(coding.label()),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AnswerRepr {
    Many(Vec<AnswerValue>),
    One(AnswerValue),
}

impl From<AnswerRepr> for Answer {
    fn from(repr: AnswerRepr) -> Self {
        match repr {
            AnswerRepr::Many(values) => Answer { values },
            AnswerRepr::One(value) => Answer::single(value),
        }
    }
}

impl From<Answer> for Vec<AnswerValue> {
    fn from(answer: Answer) -> Self {
        answer.values
    }
}

/// Ordered values recorded against one item. Only multiple choice items hold more than one.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "AnswerRepr", into = "Vec<AnswerValue>")]
pub struct Answer {
    values: Vec<AnswerValue>,
}

impl Answer {
    pub fn single(value: AnswerValue) -> Self {
        Self {
            values: vec![value],
        }
    }

    pub fn many(values: Vec<AnswerValue>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[AnswerValue] {
        &self.values
    }

    pub fn first(&self) -> Option<&AnswerValue> {
        self.values.first()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<AnswerValue> for Answer {
    fn from(value: AnswerValue) -> Self {
        Answer::single(value)
    }
}

/// Answers recorded so far in one interview, keyed by item identifier.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerStore {
    answers: BTreeMap<String, Answer>,
}

impl AnswerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `answer`, returning the answer it replaced.
    pub fn record(&mut self, id: impl Into<String>, answer: impl Into<Answer>) -> Option<Answer> {
        self.answers.insert(id.into(), answer.into())
    }

    pub fn get(&self, id: &str) -> Option<&Answer> {
        self.answers.get(id)
    }

    pub fn values(&self, id: &str) -> Option<&[AnswerValue]> {
        self.answers.get(id).map(Answer::values)
    }

    /// True iff an answer with at least one value is recorded.
    pub fn is_answered(&self, id: &str) -> bool {
        self.answers.get(id).is_some_and(|answer| !answer.is_empty())
    }

    pub fn clear(&mut self, id: &str) -> Option<Answer> {
        self.answers.remove(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Answer)> {
        self.answers.iter().map(|(id, answer)| (id.as_str(), answer))
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }
}
