use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::answers::{Answer, AnswerStore, AnswerValue, PartialDate};
use crate::error::AnswerError;
use crate::navigation::{NavigableTask, Step};
use crate::spec::ItemKind;

/// Outcome of validating a whole answer store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<AnswerError>,
    pub missing_required: Vec<String>,
    pub unknown_fields: Vec<String>,
}

/// Checks every stored answer against its step, and every visible required
/// step for an answer.
pub fn validate_store(task: &NavigableTask, store: &AnswerStore) -> ValidationResult {
    let visibility = task.visibility(store);

    let mut errors = Vec::new();
    let mut missing_required = Vec::new();

    for step in &task.steps {
        if !visibility.get(&step.id).copied().unwrap_or(true) {
            continue;
        }
        match store.get(&step.id) {
            Some(answer) if !answer.is_empty() => {
                if let Err(error) = validate_answer(step, answer) {
                    errors.push(error);
                }
            }
            _ => {
                if step.is_interactive() && step.required {
                    missing_required.push(step.id.clone());
                }
            }
        }
    }

    let unknown_fields: Vec<String> = store
        .iter()
        .map(|(id, _)| id)
        .filter(|id| task.step(id).is_none())
        .map(str::to_string)
        .collect();

    ValidationResult {
        valid: errors.is_empty() && missing_required.is_empty() && unknown_fields.is_empty(),
        errors,
        missing_required,
        unknown_fields,
    }
}

/// Checks one answer against the step's kind, options and constraint.
pub fn validate_answer(step: &Step, answer: &Answer) -> Result<(), AnswerError> {
    if !step.is_interactive() {
        return Err(base_error(step, "step does not take answers", "not_answerable"));
    }
    check_cardinality(step, answer)?;
    for value in answer.values() {
        check_type(step, value)?;
        if step.kind.is_choice() {
            check_option(step, value)?;
        }
        enforce_constraint(step, value)?;
    }
    Ok(())
}

/// Rewrites an answer into the encoding its step declares: integers on
/// decimal steps become decimals and dates narrow to the declared precision.
pub fn normalize_answer(step: &Step, answer: Answer) -> Answer {
    let values = Vec::from(answer)
        .into_iter()
        .map(|value| match (step.kind, value) {
            (ItemKind::Decimal, AnswerValue::Integer(number)) => AnswerValue::Decimal(number as f64),
            (ItemKind::Date, AnswerValue::Date(date)) => match step.date_precision {
                Some(precision) => AnswerValue::Date(date.truncate(precision)),
                None => AnswerValue::Date(date),
            },
            (_, value) => value,
        })
        .collect();
    Answer::many(values)
}

fn check_cardinality(step: &Step, answer: &Answer) -> Result<(), AnswerError> {
    if step.kind == ItemKind::MultipleChoice {
        if answer.is_empty() {
            return Err(base_error(step, "select at least one option", "cardinality"));
        }
        let values = answer.values();
        let repeated = values
            .iter()
            .enumerate()
            .any(|(index, value)| values[..index].iter().any(|seen| seen.same_option(value)));
        if repeated {
            return Err(base_error(step, "options may only be selected once", "cardinality"));
        }
        return Ok(());
    }
    if answer.len() != 1 {
        return Err(base_error(step, "exactly one value expected", "cardinality"));
    }
    Ok(())
}

fn check_type(step: &Step, value: &AnswerValue) -> Result<(), AnswerError> {
    let matches = match step.kind {
        ItemKind::SingleChoice | ItemKind::MultipleChoice | ItemKind::OpenChoice => true,
        ItemKind::Text => matches!(value, AnswerValue::String(_)),
        ItemKind::Numeric => matches!(value, AnswerValue::Integer(_)),
        ItemKind::Decimal | ItemKind::Slider => {
            matches!(value, AnswerValue::Integer(_) | AnswerValue::Decimal(_))
        }
        ItemKind::Date => matches!(value, AnswerValue::Date(_)),
        ItemKind::DateTime => matches!(value, AnswerValue::DateTime(_)),
        ItemKind::Time => matches!(value, AnswerValue::Time(_)),
        ItemKind::Display | ItemKind::Group => false,
    };
    if matches {
        Ok(())
    } else {
        Err(base_error(
            step,
            &format!("expected a {} answer, got {}", step.kind.as_str(), value.kind_label()),
            "type_mismatch",
        ))
    }
}

fn check_option(step: &Step, value: &AnswerValue) -> Result<(), AnswerError> {
    if step.options.iter().any(|option| option.value.same_option(value)) {
        return Ok(());
    }
    if step.allows_other() && matches!(value, AnswerValue::String(_)) {
        return Ok(());
    }
    Err(base_error(step, &format!("'{value}' is not one of the options"), "not_an_option"))
}

fn enforce_constraint(step: &Step, value: &AnswerValue) -> Result<(), AnswerError> {
    let Some(constraint) = &step.constraint else {
        return Ok(());
    };

    if let AnswerValue::String(text) = value {
        if let Some(max_length) = constraint.max_length
            && text.chars().count() > max_length
        {
            return Err(base_error(
                step,
                &format!("text longer than {max_length} characters"),
                "max_length",
            ));
        }
        if let Some(pattern) = &step.pattern
            && !pattern.is_match(text)
        {
            let message = constraint
                .message
                .clone()
                .unwrap_or_else(|| "value does not match pattern".to_string());
            return Err(base_error(step, &message, "pattern_mismatch"));
        }
    }

    if let Some(min) = &constraint.min
        && bound(value, min) == Some(Ordering::Less)
    {
        return Err(base_error(step, &format!("value below minimum {min}"), "min"));
    }

    if let Some(max) = &constraint.max
        && bound(value, max) == Some(Ordering::Greater)
    {
        return Err(base_error(step, &format!("value above maximum {max}"), "max"));
    }

    if step.kind == ItemKind::Slider
        && let Some(increment) = constraint.step
        && increment > 0.0
        && let Some(number) = value.as_f64()
    {
        let origin = constraint.min.as_ref().and_then(AnswerValue::as_f64).unwrap_or(0.0);
        let ratio = (number - origin) / increment;
        if (ratio - ratio.round()).abs() > 1e-9 {
            return Err(base_error(
                step,
                &format!("value must move in steps of {increment}"),
                "step",
            ));
        }
    }

    Ok(())
}

/// Orders an answer against a constraint bound of a compatible type.
fn bound(value: &AnswerValue, limit: &AnswerValue) -> Option<Ordering> {
    match (value, limit) {
        (AnswerValue::Date(date), AnswerValue::Date(limit)) => date.compare(limit),
        (AnswerValue::DateTime(left), AnswerValue::DateTime(right)) => left.partial_cmp(right),
        (AnswerValue::DateTime(left), AnswerValue::Date(limit)) => {
            PartialDate::Full(left.date()).compare(limit)
        }
        (AnswerValue::Time(left), AnswerValue::Time(right)) => left.partial_cmp(right),
        _ => value.as_f64()?.partial_cmp(&limit.as_f64()?),
    }
}

fn base_error(step: &Step, message: &str, code: &str) -> AnswerError {
    AnswerError::new(&step.id, message, code)
}
