use serde::{Deserialize, Serialize};

/// Terminal informational step appended after the last questionnaire item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionStep {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Task construction options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskOptions {
    /// Overrides the questionnaire title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Overrides the task identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion: Option<CompletionStep>,
}

impl TaskOptions {
    pub fn with_completion(mut self, id: impl Into<String>, text: impl Into<String>) -> Self {
        self.completion = Some(CompletionStep {
            id: id.into(),
            title: None,
            text: Some(text.into()),
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_field_defaults() {
        let options: TaskOptions = serde_json::from_str("{}").expect("empty options");
        assert_eq!(options, TaskOptions::default());

        let options: TaskOptions = serde_json::from_str(
            r#"{"identifier": "intake", "completion": {"id": "done", "text": "Thanks"}}"#,
        )
        .expect("options");
        assert_eq!(options.identifier.as_deref(), Some("intake"));
        assert_eq!(
            options.completion,
            Some(CompletionStep {
                id: "done".into(),
                title: None,
                text: Some("Thanks".into()),
            })
        );
    }
}
