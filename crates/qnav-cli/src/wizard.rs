use qnav_spec::{
    AnswerError, ItemKind, NavigableTask, RenderPayload, RenderProgress, RenderStatus,
    ResponseDocument, Step,
};

/// Controls which bits of state the wizard prints.
#[derive(Copy, Clone, Eq, PartialEq)]
pub enum Verbosity {
    /// Clean output: step prompts only.
    Clean,
    /// Verbose output: status, visible steps, cleared answers, choices.
    Verbose,
}

impl Verbosity {
    pub fn from_verbose(verbose: bool) -> Self {
        if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Clean
        }
    }

    pub fn is_verbose(&self) -> bool {
        matches!(self, Verbosity::Verbose)
    }
}

/// Prints prompts and progress for the interview loop.
pub struct WizardPresenter {
    verbosity: Verbosity,
    header_printed: bool,
}

impl WizardPresenter {
    pub fn new(verbosity: Verbosity) -> Self {
        Self {
            verbosity,
            header_printed: false,
        }
    }

    pub fn show_header(&mut self, task: &NavigableTask) {
        if self.header_printed {
            return;
        }
        println!(
            "Questionnaire: {}",
            task.title.as_deref().unwrap_or(&task.identifier)
        );
        if let Some(description) = &task.description {
            println!("{}", description);
        }
        println!("Type 'back' to revisit the previous step or 'exit' to stop.");
        self.header_printed = true;
    }

    pub fn show_status(&self, payload: &RenderPayload) {
        if !self.verbosity.is_verbose() {
            return;
        }
        println!(
            "Status: {} ({}/{})",
            payload.status.as_str(),
            payload.progress.answered,
            payload.progress.total
        );
        println!("Visible steps:");
        for step in payload.steps.iter().filter(|step| step.visible) {
            let mut entry = format!(" - {} ({})", step.id, step.title);
            if step.required {
                entry.push_str(" [required]");
            }
            println!("{}", entry);
        }
        if payload.status == RenderStatus::NeedInput && payload.progress.total == 0 {
            println!("No visible questions are available; check the enable conditions.");
        }
    }

    pub fn show_instruction(&self, step: &Step) {
        println!("{}", step.title());
    }

    pub fn show_prompt(&self, prompt: &PromptContext) {
        let mut line = if prompt.total > 0 {
            format!("{}/{} {}", prompt.index, prompt.total, prompt.title)
        } else {
            format!("{} {}", prompt.index, prompt.title)
        };
        if prompt.required {
            line.push_str(" *");
        }
        if let Some(hint) = &prompt.hint {
            line.push(' ');
            line.push_str(hint);
        }
        println!("{}", line);
        for (index, choice) in prompt.choices.iter().enumerate() {
            println!("  {}) {}", index + 1, choice);
        }
        if let Some(current) = &prompt.current {
            println!("Current answer: {} (press enter to keep it)", current);
        }
    }

    pub fn show_parse_error(&self, error: &AnswerParseError) {
        eprintln!("Invalid answer: {}", error.user_message);
        if self.verbosity.is_verbose()
            && let Some(debug) = &error.debug_message
        {
            eprintln!("  Expected: {}", debug);
        }
    }

    pub fn show_answer_error(&self, error: &AnswerError) {
        eprintln!("Invalid answer: {}", error.message);
        if self.verbosity.is_verbose() {
            eprintln!("  Code: {}", error.code);
        }
    }

    pub fn show_cleared(&self, cleared: &[String]) {
        if self.verbosity.is_verbose() && !cleared.is_empty() {
            println!("Cleared answers of hidden steps: {}", cleared.join(", "));
        }
    }

    pub fn show_completion(&self, response: &ResponseDocument) {
        println!("Done ✅");
        match response.to_json_pretty() {
            Ok(pretty) => println!("{}", pretty),
            Err(err) => eprintln!("Failed to serialize response to JSON: {}", err),
        }
        match response.to_cbor() {
            Ok(bytes) => println!("Response (CBOR hex): {}", encode_hex(&bytes)),
            Err(err) => eprintln!("Failed to serialize response to CBOR: {}", err),
        }
    }
}

/// Context used to format a single prompt.
pub struct PromptContext {
    pub index: usize,
    pub total: usize,
    pub title: String,
    pub required: bool,
    pub hint: Option<String>,
    pub choices: Vec<String>,
    pub current: Option<String>,
}

impl PromptContext {
    pub fn new(step: &Step, progress: &RenderProgress, current: Option<String>) -> Self {
        Self {
            index: (progress.answered + 1).min(progress.total.max(1)),
            total: progress.total,
            title: step.title().to_string(),
            required: step.required,
            hint: kind_hint(step.kind),
            choices: step.options.iter().map(|option| option.label.clone()).collect(),
            current,
        }
    }
}

fn kind_hint(kind: ItemKind) -> Option<String> {
    let hint = match kind {
        ItemKind::SingleChoice => "(number or label)",
        ItemKind::MultipleChoice => "(comma-separated numbers or labels)",
        ItemKind::OpenChoice => "(number, label or your own text)",
        ItemKind::Numeric => "(integer)",
        ItemKind::Decimal | ItemKind::Slider => "(number)",
        ItemKind::Date => "(YYYY, YYYY-MM or YYYY-MM-DD)",
        ItemKind::DateTime => "(YYYY-MM-DDThh:mm[:ss])",
        ItemKind::Time => "(hh:mm[:ss])",
        ItemKind::Text | ItemKind::Display | ItemKind::Group => return None,
    };
    Some(hint.to_string())
}

/// Error produced when parsing answers from the user.
#[derive(Debug)]
pub struct AnswerParseError {
    pub user_message: String,
    pub debug_message: Option<String>,
}

impl AnswerParseError {
    pub fn new(user_message: impl Into<String>, debug_message: Option<String>) -> Self {
        Self {
            user_message: user_message.into(),
            debug_message,
        }
    }
}

fn encode_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{:02x}", byte)).collect()
}
