use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::answers::Coding;
use crate::spec::item::Item;

/// One concept of a contained value set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ValueSetConcept {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl ValueSetConcept {
    pub fn to_coding(&self) -> Coding {
        Coding {
            system: self.system.clone(),
            code: self.code.clone(),
            display: self.display.clone(),
        }
    }
}

/// Value set embedded in the questionnaire, already expanded to its concepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ValueSet {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub concepts: Vec<ValueSetConcept>,
}

/// Top-level questionnaire definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Questionnaire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contained: Vec<ValueSet>,
    #[serde(default)]
    pub items: Vec<Item>,
}

impl Questionnaire {
    /// Looks up a contained value set by local reference (`#id`) or canonical url.
    pub fn value_set(&self, reference: &str) -> Option<&ValueSet> {
        match reference.strip_prefix('#') {
            Some(local) => self.contained.iter().find(|set| set.id == local),
            None => self
                .contained
                .iter()
                .find(|set| set.url.as_deref() == Some(reference) || set.id == reference),
        }
    }
}
