use serde_json::{Map, Value, json};

use crate::answers::AnswerValue;
use crate::session::FormSession;
use crate::spec::QuestionType;

/// Status labels returned by the renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStatus {
    /// A required visible question is still unanswered.
    NeedInput,
    /// The form can be submitted.
    Complete,
    /// Answers are present but malformed.
    Error,
}

impl RenderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderStatus::NeedInput => "need_input",
            RenderStatus::Complete => "complete",
            RenderStatus::Error => "error",
        }
    }
}

/// One checkbox or radio entry as the shell should draw it.
#[derive(Debug, Clone)]
pub struct RenderOption {
    pub label: String,
    pub selected: bool,
    pub exclusive: bool,
    pub requires_detail: bool,
    pub detail: Option<String>,
}

/// Describes a single question for render outputs.
#[derive(Debug, Clone)]
pub struct RenderQuestion {
    pub id: String,
    pub title: String,
    pub kind: QuestionType,
    pub required: bool,
    pub enabled: bool,
    pub note: Option<String>,
    pub placeholder: Option<String>,
    pub current_value: Option<String>,
    pub options: Vec<RenderOption>,
}

#[derive(Debug, Clone)]
pub struct RenderSection {
    pub title: String,
    pub questions: Vec<RenderQuestion>,
}

/// Collected payload used by both text and JSON renderers.
#[derive(Debug, Clone)]
pub struct RenderPayload {
    pub title: String,
    pub status: RenderStatus,
    pub answered: usize,
    pub total: usize,
    pub sections: Vec<RenderSection>,
}

impl RenderPayload {
    pub fn questions(&self) -> impl Iterator<Item = &RenderQuestion> {
        self.sections
            .iter()
            .flat_map(|section| section.questions.iter())
    }
}

pub fn build_render_payload(session: &FormSession) -> RenderPayload {
    let answers = session.answers();
    let validation = session.validate();

    let sections = session
        .model()
        .spec()
        .sections
        .iter()
        .map(|section| RenderSection {
            title: section.title.clone(),
            questions: section
                .questions
                .iter()
                .map(|question| RenderQuestion {
                    id: question.id.clone(),
                    title: question.display_title().to_string(),
                    kind: question.kind,
                    required: question.required,
                    enabled: session.is_enabled(&question.id),
                    note: question.note.clone(),
                    placeholder: question.placeholder.clone(),
                    current_value: match answers.value(&question.id) {
                        Some(AnswerValue::Text(text)) => Some(text.clone()),
                        _ => None,
                    },
                    options: question
                        .options
                        .iter()
                        .enumerate()
                        .map(|(index, option)| RenderOption {
                            label: option.label().to_string(),
                            selected: answers.is_selected(&question.id, option.label()),
                            exclusive: option.is_exclusive(),
                            requires_detail: option.requires_detail(),
                            detail: answers.detail(&question.id, index).map(str::to_string),
                        })
                        .collect(),
                })
                .collect(),
        })
        .collect::<Vec<_>>();

    let enabled: Vec<&RenderQuestion> = sections
        .iter()
        .flat_map(|section| section.questions.iter())
        .filter(|question| question.enabled)
        .collect();
    let total = enabled.len();
    let answered = enabled
        .iter()
        .filter(|question| answers.value(&question.id).is_some_and(|v| !v.is_blank()))
        .count();

    let status = if validation.valid {
        RenderStatus::Complete
    } else if validation.missing_required.is_empty() {
        RenderStatus::Error
    } else {
        RenderStatus::NeedInput
    };

    RenderPayload {
        title: session.model().spec().title.clone(),
        status,
        answered,
        total,
        sections,
    }
}

/// Render the payload as a structured JSON-friendly value.
pub fn render_json_ui(payload: &RenderPayload) -> Value {
    let sections = payload
        .sections
        .iter()
        .map(|section| {
            let questions = section
                .questions
                .iter()
                .map(|question| {
                    let mut map = Map::new();
                    map.insert("id".into(), Value::String(question.id.clone()));
                    map.insert("title".into(), Value::String(question.title.clone()));
                    map.insert(
                        "type".into(),
                        Value::String(question.kind.as_str().to_string()),
                    );
                    map.insert("required".into(), Value::Bool(question.required));
                    map.insert("enabled".into(), Value::Bool(question.enabled));
                    if let Some(note) = &question.note {
                        map.insert("note".into(), Value::String(note.clone()));
                    }
                    if let Some(placeholder) = &question.placeholder {
                        map.insert("placeholder".into(), Value::String(placeholder.clone()));
                    }
                    if let Some(current_value) = &question.current_value {
                        map.insert("current_value".into(), Value::String(current_value.clone()));
                    }
                    if !question.options.is_empty() {
                        map.insert(
                            "options".into(),
                            Value::Array(question.options.iter().map(option_json).collect()),
                        );
                    }
                    Value::Object(map)
                })
                .collect::<Vec<_>>();
            json!({ "title": section.title, "questions": questions })
        })
        .collect::<Vec<_>>();

    json!({
        "title": payload.title,
        "status": payload.status.as_str(),
        "progress": {
            "answered": payload.answered,
            "total": payload.total,
        },
        "sections": sections,
    })
}

fn option_json(option: &RenderOption) -> Value {
    let mut map = Map::new();
    map.insert("label".into(), Value::String(option.label.clone()));
    map.insert("selected".into(), Value::Bool(option.selected));
    if option.exclusive {
        map.insert("exclusive".into(), Value::Bool(true));
    }
    if option.requires_detail {
        map.insert("requires_detail".into(), Value::Bool(true));
        map.insert(
            "detail".into(),
            option
                .detail
                .clone()
                .map(Value::String)
                .unwrap_or(Value::Null),
        );
    }
    Value::Object(map)
}

/// Render the payload as human-friendly text.
pub fn render_text(payload: &RenderPayload) -> String {
    let mut lines = Vec::new();
    lines.push(format!("Questionnaire: {}", payload.title));
    lines.push(format!(
        "Status: {} ({}/{})",
        payload.status.as_str(),
        payload.answered,
        payload.total
    ));

    for section in &payload.sections {
        lines.push(format!("== {}", section.title));
        for question in section.questions.iter().filter(|question| question.enabled) {
            let mut entry = format!(" - {} ({})", question.id, question.title);
            if question.required {
                entry.push_str(" *");
            }
            if let Some(value) = &question.current_value {
                entry.push_str(&format!(" = {}", value));
            }
            let selected: Vec<&str> = question
                .options
                .iter()
                .filter(|option| option.selected && question.kind == QuestionType::Checkbox)
                .map(|option| option.label.as_str())
                .collect();
            if !selected.is_empty() {
                entry.push_str(&format!(" = [{}]", selected.join(", ")));
            }
            lines.push(entry);
        }
    }

    lines.join("\n")
}
