use serde::{Deserialize, Serialize};

use crate::answers::AnswerValue;
use crate::error::CompileError;
use crate::spec::{Item, Questionnaire};

/// Selectable option of a choice step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedOption {
    pub value: AnswerValue,
    pub label: String,
}

/// Flattens an item's inline options and contained value set concepts into
/// one ordered list. Inline options come first; later duplicates are dropped.
pub fn resolve_options(
    questionnaire: &Questionnaire,
    item: &Item,
) -> Result<Vec<ResolvedOption>, CompileError> {
    let mut resolved: Vec<ResolvedOption> = Vec::new();

    let inline = item.answer_options.iter().map(|option| ResolvedOption {
        label: option
            .label
            .clone()
            .unwrap_or_else(|| option.value.to_string()),
        value: option.value.clone(),
    });

    let concepts = match &item.answer_value_set {
        Some(reference) => {
            let value_set =
                questionnaire
                    .value_set(reference)
                    .ok_or_else(|| CompileError::UnknownValueSet {
                        item: item.id.clone(),
                        reference: reference.clone(),
                    })?;
            value_set
                .concepts
                .iter()
                .map(|concept| {
                    let coding = concept.to_coding();
                    ResolvedOption {
                        label: coding.label().to_string(),
                        value: AnswerValue::Coding(coding),
                    }
                })
                .collect()
        }
        None => Vec::new(),
    };

    for option in inline.chain(concepts) {
        if !resolved
            .iter()
            .any(|existing| existing.value.same_option(&option.value))
        {
            resolved.push(option);
        }
    }
    Ok(resolved)
}
