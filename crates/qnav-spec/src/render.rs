use serde_json::{Map, Value, json};

use crate::answers::{Answer, AnswerStore};
use crate::navigation::{Interview, NavigableTask, StepRole};
use crate::options::ResolvedOption;
use crate::spec::ItemKind;

/// Status labels returned by the renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStatus {
    /// The current step is waiting for the runner.
    NeedInput,
    /// No visible step remains.
    Complete,
}

impl RenderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderStatus::NeedInput => "need_input",
            RenderStatus::Complete => "complete",
        }
    }
}

/// Progress counters over visible interactive steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderProgress {
    pub answered: usize,
    pub total: usize,
}

/// Describes a single step for render outputs.
#[derive(Debug, Clone)]
pub struct RenderStep {
    pub id: String,
    pub title: String,
    pub kind: ItemKind,
    pub role: StepRole,
    pub required: bool,
    pub visible: bool,
    pub current_value: Option<Answer>,
    pub choices: Vec<ResolvedOption>,
    pub parents: Vec<String>,
}

/// Collected payload used by both text and JSON renderers.
#[derive(Debug, Clone)]
pub struct RenderPayload {
    pub task_id: String,
    pub title: Option<String>,
    pub status: RenderStatus,
    pub current_step: Option<String>,
    pub progress: RenderProgress,
    pub help: Option<String>,
    pub steps: Vec<RenderStep>,
}

/// Build the renderer payload for a task and answer store.
///
/// `current` is the step the runner is positioned on; without one the
/// payload points at the step a resumed interview would land on.
pub fn build_render_payload(
    task: &NavigableTask,
    store: &AnswerStore,
    current: Option<&str>,
) -> RenderPayload {
    let visibility = task.visibility(store);
    let current_step = match current {
        Some(id) => task.step(id).map(|step| step.id.clone()),
        None => Interview::resume(task, store.clone())
            .current()
            .map(|step| step.id.clone()),
    };

    let steps = task
        .steps
        .iter()
        .map(|step| RenderStep {
            id: step.id.clone(),
            title: step.title().to_string(),
            kind: step.kind,
            role: step.role,
            required: step.required,
            visible: visibility.get(&step.id).copied().unwrap_or(true),
            current_value: store.get(&step.id).cloned(),
            choices: step.options.clone(),
            parents: step.parents.clone(),
        })
        .collect::<Vec<_>>();

    let interactive = steps
        .iter()
        .filter(|step| step.visible && step.role == StepRole::Question);
    let total = interactive.clone().count();
    let answered = interactive
        .filter(|step| step.current_value.as_ref().is_some_and(|answer| !answer.is_empty()))
        .count();

    let status = if current_step.is_some() {
        RenderStatus::NeedInput
    } else {
        RenderStatus::Complete
    };

    RenderPayload {
        task_id: task.identifier.clone(),
        title: task.title.clone(),
        status,
        current_step,
        progress: RenderProgress { answered, total },
        help: task.description.clone(),
        steps,
    }
}

/// Render the payload as a structured JSON-friendly value.
pub fn render_json_ui(payload: &RenderPayload) -> Value {
    let steps = payload
        .steps
        .iter()
        .map(|step| {
            let mut map = Map::new();
            map.insert("id".into(), Value::String(step.id.clone()));
            map.insert("title".into(), Value::String(step.title.clone()));
            map.insert("type".into(), Value::String(step.kind.as_str().to_string()));
            map.insert("role".into(), Value::String(step.role.as_str().to_string()));
            map.insert("required".into(), Value::Bool(step.required));
            map.insert("visible".into(), Value::Bool(step.visible));
            if let Some(answer) = &step.current_value {
                map.insert(
                    "current_value".into(),
                    serde_json::to_value(answer).unwrap_or(Value::Null),
                );
            }
            if !step.choices.is_empty() {
                let choices = step
                    .choices
                    .iter()
                    .map(|choice| {
                        json!({
                            "label": choice.label,
                            "value": choice.value,
                        })
                    })
                    .collect();
                map.insert("choices".into(), Value::Array(choices));
            }
            if !step.parents.is_empty() {
                map.insert("parents".into(), json!(step.parents));
            }
            Value::Object(map)
        })
        .collect::<Vec<_>>();

    json!({
        "task_id": payload.task_id,
        "title": payload.title,
        "status": payload.status.as_str(),
        "current_step": payload.current_step,
        "progress": {
            "answered": payload.progress.answered,
            "total": payload.progress.total,
        },
        "help": payload.help,
        "steps": steps,
    })
}

/// Render the payload as human-friendly text.
pub fn render_text(payload: &RenderPayload) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "Task: {} ({})",
        payload.title.as_deref().unwrap_or("untitled"),
        payload.task_id
    ));
    lines.push(format!(
        "Status: {} ({}/{})",
        payload.status.as_str(),
        payload.progress.answered,
        payload.progress.total
    ));
    if let Some(help) = &payload.help {
        lines.push(format!("Help: {}", help));
    }

    match payload
        .current_step
        .as_ref()
        .and_then(|id| payload.steps.iter().find(|step| &step.id == id))
    {
        Some(step) => {
            lines.push(format!("Current step: {}", step.id));
            lines.push(format!("  Title: {}", step.title));
            if step.required {
                lines.push("  Required: yes".to_string());
            }
            for (index, choice) in step.choices.iter().enumerate() {
                lines.push(format!("  {}) {}", index + 1, choice.label));
            }
            if let Some(answer) = &step.current_value {
                lines.push(format!("  Current value: {}", answer_to_display(answer)));
            }
        }
        None => lines.push("All visible steps are done.".to_string()),
    }

    lines.push("Visible steps:".to_string());
    for step in payload.steps.iter().filter(|step| step.visible) {
        let mut entry = format!(" - {} ({})", step.id, step.title);
        if step.required {
            entry.push_str(" [required]");
        }
        if let Some(answer) = &step.current_value {
            entry.push_str(&format!(" = {}", answer_to_display(answer)));
        }
        lines.push(entry);
    }

    lines.join("\n")
}

fn answer_to_display(answer: &Answer) -> String {
    answer
        .values()
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
