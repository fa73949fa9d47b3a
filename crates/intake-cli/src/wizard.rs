use std::collections::BTreeSet;

use intake_spec::QuestionType;
use serde::Deserialize;
use serde_json::Value;

/// Controls which bits of state the wizard prints.
#[derive(Copy, Clone, Eq, PartialEq)]
pub enum Verbosity {
    /// Clean output: question prompts only.
    Clean,
    /// Verbose output: status, enabled questions, visibility changes.
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

/// Prints prompts, errors and the final submission for the text shell.
pub struct WizardPresenter {
    verbosity: Verbosity,
    header_printed: bool,
    show_answers_json: bool,
}

impl WizardPresenter {
    pub fn new(verbosity: Verbosity, show_answers_json: bool) -> Self {
        Self {
            verbosity,
            header_printed: false,
            show_answers_json,
        }
    }

    pub fn show_header(&mut self, payload: &WizardPayload) {
        if self.header_printed {
            return;
        }
        println!("Questionnaire: {}", payload.title);
        self.header_printed = true;
    }

    pub fn show_status(&self, payload: &WizardPayload) {
        if !self.verbosity.is_verbose() {
            return;
        }
        println!(
            "Status: {} ({}/{})",
            payload.status, payload.progress.answered, payload.progress.total
        );
        println!("Enabled questions:");
        for question in payload.questions().filter(|question| question.enabled) {
            let mut entry = format!(" - {} ({})", question.id, question.title);
            if question.required {
                entry.push_str(" [required]");
            }
            println!("{}", entry);
        }
    }

    pub fn show_section(&self, title: &str) {
        println!("== {}", title);
    }

    pub fn show_prompt(&self, prompt: &PromptContext) {
        let mut line = format!("{}/{} {}", prompt.index, prompt.total, prompt.title);
        if prompt.required {
            line.push_str(" *");
        }
        if let Some(hint) = &prompt.hint {
            line.push(' ');
            line.push_str(hint);
        }
        if let Some(current) = &prompt.current {
            line.push_str(&format!(" [current: {}]", current));
        }
        println!("{}", line);
        if let Some(note) = &prompt.note {
            println!("{}", note);
        }
        if let Some(placeholder) = &prompt.placeholder {
            println!("e.g. {}", placeholder);
        }
        for (position, option) in prompt.options.iter().enumerate() {
            println!("  {}. {}", position + 1, option);
        }
    }

    pub fn show_detail_prompt(&self, label: &str) {
        println!("  补充 ({}):", label);
    }

    pub fn show_parse_error(&self, error: &AnswerParseError) {
        eprintln!("Invalid answer: {}", error.user_message);
        if let Some(debug) = &error.debug_message
            && self.verbosity.is_verbose()
        {
            eprintln!("  Expected: {}", debug);
        }
    }

    pub fn show_changes(&self, changes: &Value) {
        if !self.verbosity.is_verbose() {
            return;
        }
        for change in changes.as_array().into_iter().flatten() {
            let id = change["question_id"].as_str().unwrap_or("<unknown>");
            let state = if change["visible"] == true {
                "shown"
            } else if change["cleared"] == true {
                "hidden, answer cleared"
            } else {
                "hidden"
            };
            println!("  [{}: {}]", id, state);
        }
    }

    pub fn show_notice(&self, notice: &str) {
        eprintln!("{}", notice);
    }

    pub fn show_completion(&self, submission: &Value, answers: &Value) {
        println!("Done ✅");
        for section in submission["sections"].as_array().into_iter().flatten() {
            println!("== {}", section["title"].as_str().unwrap_or_default());
            println!("{}", section["text"].as_str().unwrap_or_default());
            match (section.get("code"), section.get("code_error")) {
                (Some(code), _) => println!(
                    "QR: version {}, level {}, {}/{} bytes",
                    code["version"],
                    code["error_correction"].as_str().unwrap_or("H"),
                    code["bytes"],
                    code["capacity"]
                ),
                (None, Some(error)) => println!(
                    "QR: failed to encode ({})",
                    error.as_str().unwrap_or_default()
                ),
                (None, None) => {}
            }
        }
        if self.show_answers_json {
            match serde_json::to_string_pretty(answers) {
                Ok(pretty) => println!("{}", pretty),
                Err(err) => eprintln!("Failed to serialize answers to JSON: {}", err),
            }
        }
    }
}

/// Render payload read back from the component's JSON UI.
#[derive(Debug, Deserialize)]
pub struct WizardPayload {
    pub title: String,
    pub status: String,
    pub progress: RenderProgress,
    pub sections: Vec<WizardSection>,
}

impl WizardPayload {
    pub fn from_json(json: &Value) -> Result<Self, String> {
        serde_json::from_value(json.clone()).map_err(|err| format!("wizard payload: {}", err))
    }

    pub fn questions(&self) -> impl Iterator<Item = &WizardQuestion> {
        self.sections
            .iter()
            .flat_map(|section| section.questions.iter())
    }

    /// First enabled question that has not been asked yet, with its section title.
    pub fn next_question(&self, asked: &BTreeSet<String>) -> Option<(&str, &WizardQuestion)> {
        self.sections.iter().find_map(|section| {
            section
                .questions
                .iter()
                .find(|question| question.enabled && !asked.contains(&question.id))
                .map(|question| (section.title.as_str(), question))
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct RenderProgress {
    pub answered: usize,
    pub total: usize,
}

#[derive(Debug, Deserialize)]
pub struct WizardSection {
    pub title: String,
    pub questions: Vec<WizardQuestion>,
}

/// Minimal view of a question used for rendering prompts.
#[derive(Debug, Deserialize)]
pub struct WizardQuestion {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub current_value: Option<String>,
    #[serde(default)]
    pub options: Vec<WizardOption>,
}

#[derive(Debug, Deserialize)]
pub struct WizardOption {
    pub label: String,
    #[serde(default)]
    pub selected: bool,
    #[serde(default)]
    pub exclusive: bool,
    #[serde(default)]
    pub requires_detail: bool,
    #[serde(default)]
    pub detail: Option<String>,
}

/// Context used to format a single prompt.
pub struct PromptContext {
    pub index: usize,
    pub total: usize,
    pub title: String,
    pub note: Option<String>,
    pub placeholder: Option<String>,
    pub required: bool,
    pub hint: Option<String>,
    pub current: Option<String>,
    pub options: Vec<String>,
}

impl PromptContext {
    pub fn new(question: &WizardQuestion, progress: &RenderProgress) -> Self {
        let options = question
            .options
            .iter()
            .map(|option| {
                let mut line = option.label.clone();
                if option.exclusive {
                    line.push_str(" (exclusive)");
                }
                if option.requires_detail {
                    line.push_str(" (needs detail)");
                }
                match (&option.detail, option.selected) {
                    (Some(detail), true) => line.push_str(&format!(" [x: {}]", detail)),
                    (None, true) => line.push_str(" [x]"),
                    _ => {}
                }
                line
            })
            .collect();
        Self {
            index: (progress.answered + 1).min(progress.total.max(1)),
            total: progress.total,
            title: question.title.clone(),
            note: question.note.clone(),
            placeholder: question.placeholder.clone(),
            required: question.required,
            hint: kind_hint(question.kind),
            current: question.current_value.clone(),
            options,
        }
    }
}

fn kind_hint(kind: QuestionType) -> Option<String> {
    match kind {
        QuestionType::Text => None,
        QuestionType::Date => Some("(YYYY-MM-DD)".to_string()),
        QuestionType::Radio => Some("(pick one number)".to_string()),
        QuestionType::Checkbox => Some("(numbers separated by commas)".to_string()),
    }
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
