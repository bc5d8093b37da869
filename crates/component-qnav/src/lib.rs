use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::debug;

use qnav_spec::{
    Answer, AnswerError, AnswerStore, Interview, LoadError, NavigableTask, Questionnaire,
    RenderPayload, ResponseStatus, TaskOptions, build_render_payload, build_response,
    normalize_answer, render_json_ui as qnav_render_json_ui, render_text as qnav_render_text,
    validate_answer, validate_store,
};

const DEFAULT_QUESTIONNAIRE: &str = include_str!("../../qnav-spec/tests/fixtures/skip_logic.json");

#[derive(Debug, Error)]
enum ComponentError {
    #[error("failed to parse config: {0}")]
    ConfigParse(#[source] serde_json::Error),
    #[error("failed to parse questionnaire: {0}")]
    QuestionnaireParse(#[source] serde_json::Error),
    #[error("failed to parse answers: {0}")]
    AnswersParse(#[source] serde_json::Error),
    #[error("questionnaire rejected: {0}")]
    Load(#[from] LoadError),
    #[error("task '{0}' is not available")]
    TaskUnavailable(String),
    #[error("step '{0}' does not exist")]
    UnknownStep(String),
    #[error("json encode error: {0}")]
    JsonEncode(#[source] serde_json::Error),
}

#[derive(Debug, Deserialize, Serialize, Default)]
struct ComponentConfig {
    #[serde(default)]
    questionnaire_json: Option<String>,
    #[serde(default)]
    options: TaskOptions,
}

fn load_task(config_json: &str) -> Result<NavigableTask, ComponentError> {
    let config = if config_json.trim().is_empty() {
        ComponentConfig::default()
    } else {
        serde_json::from_str(config_json).map_err(ComponentError::ConfigParse)?
    };

    let source = config
        .questionnaire_json
        .as_deref()
        .unwrap_or(DEFAULT_QUESTIONNAIRE);
    let questionnaire: Questionnaire =
        serde_json::from_str(source).map_err(ComponentError::QuestionnaireParse)?;
    Ok(NavigableTask::build(&questionnaire, &config.options)?)
}

fn ensure_task(task_id: &str, config_json: &str) -> Result<NavigableTask, ComponentError> {
    let task = load_task(config_json)?;
    if task.identifier != task_id {
        Err(ComponentError::TaskUnavailable(task_id.to_string()))
    } else {
        Ok(task)
    }
}

fn parse_answers(task: &NavigableTask, answers_json: &str) -> Result<AnswerStore, ComponentError> {
    if answers_json.trim().is_empty() {
        return Ok(AnswerStore::new());
    }
    let mut store = serde_json::from_str(answers_json).map_err(ComponentError::AnswersParse)?;
    task.normalize(&mut store);
    Ok(store)
}

fn respond(result: Result<Value, ComponentError>) -> String {
    match result {
        Ok(value) => serde_json::to_string(&value).unwrap_or_else(|error| {
            json!({"error": format!("json encode: {}", error)}).to_string()
        }),
        Err(err) => json!({ "error": err.to_string() }).to_string(),
    }
}

fn respond_string(result: Result<String, ComponentError>) -> String {
    match result {
        Ok(value) => value,
        Err(err) => json!({ "error": err.to_string() }).to_string(),
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Value, ComponentError> {
    serde_json::to_value(value).map_err(ComponentError::JsonEncode)
}

/// Steps and skip rules of the compiled task.
pub fn describe(task_id: &str, config_json: &str) -> String {
    respond(ensure_task(task_id, config_json).map(|task| {
        let steps = task
            .steps
            .iter()
            .enumerate()
            .map(|(position, step)| {
                json!({
                    "id": step.id,
                    "type": step.kind.as_str(),
                    "role": step.role.as_str(),
                    "title": step.title(),
                    "required": step.required,
                    "parents": step.parents,
                    "enable_when": task
                        .rule_for(position)
                        .map(|rule| rule.predicate.to_string()),
                })
            })
            .collect::<Vec<_>>();
        json!({
            "id": task.identifier,
            "title": task.title,
            "description": task.description,
            "steps": steps,
        })
    }))
}

fn progress(payload: &RenderPayload) -> Value {
    json!({
        "answered": payload.progress.answered,
        "total": payload.progress.total,
    })
}

fn status_view(task: &NavigableTask, store: &AnswerStore) -> Value {
    let payload = build_render_payload(task, store, None);
    json!({
        "status": payload.status.as_str(),
        "current_step": payload.current_step,
        "path": task.visible_path(store),
        "skipped": skipped(task, store),
        "progress": progress(&payload),
    })
}

fn skipped(task: &NavigableTask, store: &AnswerStore) -> Vec<Value> {
    task.steps
        .iter()
        .enumerate()
        .filter(|(position, _)| !task.is_visible(*position, store))
        .map(|(position, step)| {
            json!({
                "step": step.id,
                "lands_on": task.skip_target(position, store).map(|target| &target.id),
            })
        })
        .collect()
}

/// Where a resumed interview over `answers_json` would stand.
pub fn next(task_id: &str, config_json: &str, answers_json: &str) -> String {
    respond(ensure_task(task_id, config_json).and_then(|task| {
        let mut store = parse_answers(&task, answers_json)?;
        let cleared = task.clear_hidden(&mut store);
        let mut view = status_view(&task, &store);
        view["cleared"] = json!(cleared);
        Ok(view)
    }))
}

fn error_response(
    task: &NavigableTask,
    store: &AnswerStore,
    error: &AnswerError,
) -> Result<Value, ComponentError> {
    let mut view = status_view(task, store);
    view["status"] = json!("error");
    view["error"] = encode(error)?;
    view["answers"] = encode(store)?;
    Ok(view)
}

/// Records one answer, clearing answers of steps it hides.
pub fn submit_patch(
    task_id: &str,
    config_json: &str,
    answers_json: &str,
    step_id: &str,
    value_json: &str,
) -> String {
    respond(ensure_task(task_id, config_json).and_then(|task| {
        let mut store = parse_answers(&task, answers_json)?;
        let step = task
            .step(step_id)
            .ok_or_else(|| ComponentError::UnknownStep(step_id.to_string()))?;
        let answer: Answer = serde_json::from_str(value_json).map_err(ComponentError::AnswersParse)?;

        if let Err(error) = validate_answer(step, &answer) {
            return error_response(&task, &store, &error);
        }

        store.record(step_id, normalize_answer(step, answer));
        let cleared = task.clear_hidden(&mut store);
        debug!(step = %step_id, ?cleared, "patch applied");

        let mut view = status_view(&task, &store);
        view["cleared"] = json!(cleared);
        view["answers"] = encode(&store)?;
        Ok(view)
    }))
}

pub fn validate_answers(task_id: &str, config_json: &str, answers_json: &str) -> String {
    respond(ensure_task(task_id, config_json).and_then(|task| {
        let store = parse_answers(&task, answers_json)?;
        encode(&validate_store(&task, &store))
    }))
}

fn render_payload(
    task_id: &str,
    config_json: &str,
    answers_json: &str,
) -> Result<RenderPayload, ComponentError> {
    let task = ensure_task(task_id, config_json)?;
    let store = parse_answers(&task, answers_json)?;
    Ok(build_render_payload(&task, &store, None))
}

pub fn render_text(task_id: &str, config_json: &str, answers_json: &str) -> String {
    respond_string(
        render_payload(task_id, config_json, answers_json)
            .map(|payload| qnav_render_text(&payload)),
    )
}

pub fn render_json_ui(task_id: &str, config_json: &str, answers_json: &str) -> String {
    respond(
        render_payload(task_id, config_json, answers_json)
            .map(|payload| qnav_render_json_ui(&payload)),
    )
}

/// Response document for the answers; `completed` once no step remains.
pub fn render_response(task_id: &str, config_json: &str, answers_json: &str) -> String {
    respond(ensure_task(task_id, config_json).and_then(|task| {
        let interview = Interview::resume(&task, parse_answers(&task, answers_json)?);
        let status = if interview.is_complete() {
            ResponseStatus::Completed
        } else {
            ResponseStatus::InProgress
        };
        encode(&build_response(&task, interview.store(), status))
    }))
}
