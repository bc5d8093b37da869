mod wizard;

use chrono::{NaiveDateTime, NaiveTime};
use clap::{Args, Parser, Subcommand};
use component_qnav::next as qnav_next;
use qnav_spec::{
    Answer, AnswerStore, AnswerValue, Interview, InterviewError, ItemKind, NavigableTask,
    PartialDate, Questionnaire, Step, StepRole, TaskOptions, ValidationResult,
    build_render_payload, questionnaire_schema, validate_store,
};
use serde_json::{Value, json};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use wizard::{AnswerParseError, PromptContext, Verbosity, WizardPresenter};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Skip-logic questionnaire runner",
    long_about = "Compiles questionnaire enable conditions into a navigable task and runs it as a text interview"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct TaskArgs {
    /// Path to the questionnaire JSON definition.
    #[arg(long, value_name = "QUESTIONNAIRE")]
    questionnaire: PathBuf,
    /// Optional JSON file with task options (title, identifier, completion step).
    #[arg(long, value_name = "OPTIONS")]
    options: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the questionnaire as an interactive text interview.
    Run {
        #[command(flatten)]
        task: TaskArgs,
        /// Optional JSON file with answers to resume from.
        #[arg(long, value_name = "ANSWERS")]
        answers: Option<PathBuf>,
        /// Show verbose output (status, visible steps, cleared answers).
        #[arg(long, alias = "debug")]
        verbose: bool,
    },
    /// Compile the questionnaire and list its steps and skip rules.
    Check {
        #[command(flatten)]
        task: TaskArgs,
    },
    /// Print the steps visible for a set of answers.
    Path {
        #[command(flatten)]
        task: TaskArgs,
        /// JSON file with recorded answers.
        #[arg(long, value_name = "ANSWERS")]
        answers: Option<PathBuf>,
    },
    /// Validate an answers file against the questionnaire.
    Validate {
        #[command(flatten)]
        task: TaskArgs,
        /// JSON file with recorded answers.
        #[arg(long, value_name = "ANSWERS")]
        answers: PathBuf,
    },
    /// Print the JSON Schema for questionnaire definitions.
    Schema,
}

fn main() -> CliResult<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            task,
            answers,
            verbose,
        } => run_interview(task, answers, verbose),
        Command::Check { task } => run_check(task),
        Command::Path { task, answers } => run_path(task, answers),
        Command::Validate { task, answers } => run_validate(task, answers),
        Command::Schema => run_schema(),
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

struct LoadedTask {
    source: String,
    options: TaskOptions,
    task: NavigableTask,
}

impl LoadedTask {
    /// Config JSON for the component facade, pinned to this task's identifier.
    fn component_config(&self) -> CliResult<String> {
        let mut options = self.options.clone();
        options.identifier = Some(self.task.identifier.clone());
        let config = json!({
            "questionnaire_json": self.source,
            "options": serde_json::to_value(&options)?,
        });
        Ok(config.to_string())
    }
}

fn read_file(path: &Path) -> CliResult<String> {
    fs::read_to_string(path)
        .map_err(|err| format!("failed to read {}: {}", path.display(), err).into())
}

fn load_task(args: &TaskArgs) -> CliResult<LoadedTask> {
    let source = read_file(&args.questionnaire)?;
    let questionnaire: Questionnaire = serde_json::from_str(&source)
        .map_err(|err| format!("invalid questionnaire {}: {}", args.questionnaire.display(), err))?;
    let options = match &args.options {
        Some(path) => serde_json::from_str(&read_file(path)?)
            .map_err(|err| format!("invalid options {}: {}", path.display(), err))?,
        None => TaskOptions::default(),
    };
    let task = NavigableTask::build(&questionnaire, &options)
        .map_err(|err| format!("questionnaire rejected: {}", err))?;
    Ok(LoadedTask {
        source,
        options,
        task,
    })
}

fn read_answers(path: Option<&Path>) -> CliResult<AnswerStore> {
    match path {
        Some(path) => Ok(serde_json::from_str(&read_file(path)?)
            .map_err(|err| format!("invalid answers {}: {}", path.display(), err))?),
        None => Ok(AnswerStore::new()),
    }
}

fn run_check(args: TaskArgs) -> CliResult<()> {
    let loaded = load_task(&args)?;
    let task = &loaded.task;
    println!(
        "Task: {} ({})",
        task.title.as_deref().unwrap_or("untitled"),
        task.identifier
    );
    println!("Steps:");
    for (position, step) in task.steps.iter().enumerate() {
        let mut line = format!(
            "  {}. {} [{}, {}]",
            position + 1,
            step.id,
            step.kind.as_str(),
            step.role.as_str()
        );
        if step.required {
            line.push_str(" *");
        }
        println!("{}", line);
        if let Some(rule) = task.rule_for(position) {
            println!("     enable when: {}", rule.predicate);
        }
    }
    println!("Skip rules: {}", task.rules.len());
    Ok(())
}

fn run_path(args: TaskArgs, answers: Option<PathBuf>) -> CliResult<()> {
    let loaded = load_task(&args)?;
    let answers_json = match answers {
        Some(path) => read_file(&path)?,
        None => String::new(),
    };
    let config = loaded.component_config()?;
    let view = parse_component_result(&qnav_next(
        &loaded.task.identifier,
        &config,
        &answers_json,
    ))?;

    println!("Visible path: {}", string_list(&view["path"]).join(" -> "));
    println!(
        "Progress: {}/{}",
        view["progress"]["answered"], view["progress"]["total"]
    );
    match view["current_step"].as_str() {
        Some(step) => println!("Next step: {}", step),
        None => println!("All visible steps are done."),
    }
    for skipped in view["skipped"].as_array().into_iter().flatten() {
        println!(
            "Skipped: {} -> {}",
            skipped["step"].as_str().unwrap_or_default(),
            skipped["lands_on"].as_str().unwrap_or("completion")
        );
    }
    let cleared = string_list(&view["cleared"]);
    if !cleared.is_empty() {
        println!("Cleared hidden answers: {}", cleared.join(", "));
    }
    Ok(())
}

fn string_list(value: &Value) -> Vec<&str> {
    value
        .as_array()
        .map(|items| items.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}

fn parse_component_result(response: &str) -> CliResult<Value> {
    let value: Value = serde_json::from_str(response)?;
    if let Some(error) = value.get("error").and_then(Value::as_str) {
        Err(error.into())
    } else {
        Ok(value)
    }
}

fn run_validate(args: TaskArgs, answers: PathBuf) -> CliResult<()> {
    let loaded = load_task(&args)?;
    let store = read_answers(Some(&answers))?;
    let result = validate_store(&loaded.task, &store);
    println!(
        "Validation result: {}",
        if result.valid { "valid" } else { "invalid" }
    );
    describe_validation(&result);

    if result.valid {
        Ok(())
    } else {
        Err("validation failed".into())
    }
}

fn describe_validation(result: &ValidationResult) {
    if !result.errors.is_empty() {
        println!("Errors:");
        for error in &result.errors {
            println!("  {} - {} ({})", error.step_id, error.message, error.code);
        }
    }
    if !result.missing_required.is_empty() {
        println!(
            "Missing required answers: {}",
            result.missing_required.join(", ")
        );
    }
    if !result.unknown_fields.is_empty() {
        println!(
            "Unknown answer fields: {}",
            result.unknown_fields.join(", ")
        );
    }
}

fn run_schema() -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(&questionnaire_schema())?);
    Ok(())
}

enum Input {
    Answer(Answer),
    Keep,
    Back,
    Exit,
}

fn run_interview(args: TaskArgs, answers: Option<PathBuf>, verbose: bool) -> CliResult<()> {
    let loaded = load_task(&args)?;
    let task = &loaded.task;
    let store = read_answers(answers.as_deref())?;
    let mut interview = if store.is_empty() {
        Interview::start(task)
    } else {
        Interview::resume(task, store)
    };
    let mut presenter = WizardPresenter::new(Verbosity::from_verbose(verbose));
    presenter.show_header(task);

    while let Some(step) = interview.current() {
        if step.role != StepRole::Question {
            presenter.show_instruction(step);
            interview.advance()?;
            continue;
        }

        let payload = build_render_payload(task, interview.store(), Some(&step.id));
        presenter.show_status(&payload);
        let current = interview.store().get(&step.id).map(display_answer);
        let prompt = PromptContext::new(step, &payload.progress, current);

        match prompt_step(&prompt, step, &presenter)? {
            Input::Exit => return Err("interview aborted by user".into()),
            Input::Back => step_back(&mut interview),
            Input::Keep => match interview.advance() {
                Ok(_) => {}
                Err(InterviewError::RequiredAnswerMissing(_)) => {
                    eprintln!("This step requires an answer.");
                }
                Err(err) => return Err(err.into()),
            },
            Input::Answer(answer) => match interview.answer(answer) {
                Ok(cleared) => {
                    presenter.show_cleared(&cleared);
                    interview.advance()?;
                }
                Err(InterviewError::InvalidAnswer(error)) => presenter.show_answer_error(&error),
                Err(err) => return Err(err.into()),
            },
        }
    }

    presenter.show_completion(&interview.response());
    Ok(())
}

/// Moves back to the previous step that takes an answer.
fn step_back(interview: &mut Interview<'_>) {
    loop {
        match interview.back() {
            Ok(step) if step.is_interactive() => return,
            Ok(step) => debug!(step = %step.id, "passing back over non-interactive step"),
            Err(err) => {
                eprintln!("Cannot go back: {}", err);
                return;
            }
        }
    }
}

fn display_answer(answer: &Answer) -> String {
    answer
        .values()
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn prompt_step(
    prompt: &PromptContext,
    step: &Step,
    presenter: &WizardPresenter,
) -> CliResult<Input> {
    loop {
        presenter.show_prompt(prompt);
        print!("> ");
        io::stdout().flush()?;
        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            return Ok(Input::Exit);
        }

        let trimmed = input.trim();
        if trimmed.eq_ignore_ascii_case("exit") {
            return Ok(Input::Exit);
        }
        if trimmed.eq_ignore_ascii_case("back") {
            return Ok(Input::Back);
        }
        if trimmed.is_empty() {
            return Ok(Input::Keep);
        }

        match parse_answer(step, trimmed) {
            Ok(answer) => return Ok(Input::Answer(answer)),
            Err(err) => presenter.show_parse_error(&err),
        }
    }
}

fn parse_answer(step: &Step, raw: &str) -> Result<Answer, AnswerParseError> {
    let value = match step.kind {
        ItemKind::SingleChoice => parse_choice(step, raw)?,
        ItemKind::OpenChoice => {
            parse_choice(step, raw).unwrap_or_else(|_| AnswerValue::String(raw.to_string()))
        }
        ItemKind::MultipleChoice => {
            let values = raw
                .split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(|part| parse_choice(step, part))
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(Answer::many(values));
        }
        ItemKind::Numeric => parse_integer(raw)?,
        ItemKind::Decimal | ItemKind::Slider => parse_number(raw)?,
        ItemKind::Date => parse_date(raw)?,
        ItemKind::DateTime => parse_date_time(raw)?,
        ItemKind::Time => parse_time(raw)?,
        ItemKind::Text => AnswerValue::String(raw.to_string()),
        ItemKind::Display | ItemKind::Group => {
            return Err(AnswerParseError::new(
                "This step does not take answers.",
                None,
            ));
        }
    };
    Ok(Answer::from(value))
}

/// Accepts a 1-based option number, an option label or the option value.
fn parse_choice(step: &Step, raw: &str) -> Result<AnswerValue, AnswerParseError> {
    if let Ok(number) = raw.parse::<usize>()
        && let Some(option) = number
            .checked_sub(1)
            .and_then(|index| step.options.get(index))
    {
        return Ok(option.value.clone());
    }
    step.options
        .iter()
        .find(|option| {
            option.label.eq_ignore_ascii_case(raw)
                || option.value.to_string().eq_ignore_ascii_case(raw)
        })
        .map(|option| option.value.clone())
        .ok_or_else(|| {
            let labels = step
                .options
                .iter()
                .map(|option| option.label.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            AnswerParseError::new(
                format!("'{}' is not one of the choices.", raw),
                Some(format!("one of {}", labels)),
            )
        })
}

fn parse_integer(raw: &str) -> Result<AnswerValue, AnswerParseError> {
    raw.parse::<i64>().map(AnswerValue::Integer).map_err(|_| {
        AnswerParseError::new(
            "Please enter a whole number.",
            Some("expected integer".to_string()),
        )
    })
}

fn parse_number(raw: &str) -> Result<AnswerValue, AnswerParseError> {
    if let Ok(value) = raw.parse::<i64>() {
        return Ok(AnswerValue::Integer(value));
    }
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(AnswerValue::Decimal(value)),
        _ => Err(AnswerParseError::new(
            "Please enter a number.",
            Some("expected decimal number".to_string()),
        )),
    }
}

fn parse_date(raw: &str) -> Result<AnswerValue, AnswerParseError> {
    raw.parse::<PartialDate>().map(AnswerValue::Date).map_err(|_| {
        AnswerParseError::new(
            "Please enter a date.",
            Some("expected YYYY, YYYY-MM or YYYY-MM-DD".to_string()),
        )
    })
}

fn parse_date_time(raw: &str) -> Result<AnswerValue, AnswerParseError> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M"))
        .map(AnswerValue::DateTime)
        .map_err(|_| {
            AnswerParseError::new(
                "Please enter a date and time.",
                Some("expected YYYY-MM-DDThh:mm[:ss]".to_string()),
            )
        })
}

fn parse_time(raw: &str) -> Result<AnswerValue, AnswerParseError> {
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .map(AnswerValue::Time)
        .map_err(|_| {
            AnswerParseError::new(
                "Please enter a time.",
                Some("expected hh:mm[:ss]".to_string()),
            )
        })
}
