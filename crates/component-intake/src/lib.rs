use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::debug;

use intake_spec::{
    AnswerSnapshot, FormModel, FormSession, QrPlanner, QuestionType, SessionError, SpecError,
    SubmitError, ValidationResult, VisibilityChange, build_render_payload, load_questionnaire,
    render_json_ui as intake_render_json_ui, render_text as intake_render_text, validate,
};

const DEFAULT_SPEC: &str = include_str!("../../intake-spec/tests/fixtures/symptom_intake.json");

#[derive(Debug, Error)]
enum ComponentError {
    #[error("failed to parse config: {0}")]
    ConfigParse(#[source] serde_json::Error),
    #[error("failed to parse answers: {0}")]
    AnswersParse(#[source] serde_json::Error),
    #[error("failed to parse value: {0}")]
    ValueParse(#[source] serde_json::Error),
    #[error("questionnaire unavailable: {0}")]
    Spec(#[from] SpecError),
    #[error("{0}")]
    Session(#[from] SessionError),
    #[error("json encode error: {0}")]
    JsonEncode(#[source] serde_json::Error),
}

#[derive(Debug, Deserialize, Serialize, Default)]
struct ComponentConfig {
    #[serde(default)]
    questionnaire_json: Option<String>,
}

fn load_model(config_json: &str) -> Result<FormModel, ComponentError> {
    let config = if config_json.trim().is_empty() {
        ComponentConfig::default()
    } else {
        serde_json::from_str(config_json).map_err(ComponentError::ConfigParse)?
    };

    let spec_json = config.questionnaire_json.as_deref().unwrap_or(DEFAULT_SPEC);
    Ok(load_questionnaire(spec_json)?)
}

fn parse_answers(answers_json: &str) -> Result<AnswerSnapshot, ComponentError> {
    if answers_json.trim().is_empty() {
        return Ok(AnswerSnapshot::default());
    }
    serde_json::from_str(answers_json).map_err(ComponentError::AnswersParse)
}

fn open_session(config_json: &str, answers_json: &str) -> Result<FormSession, ComponentError> {
    let model = load_model(config_json)?;
    let answers = parse_answers(answers_json)?;
    Ok(FormSession::with_answers(model, answers))
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

fn changes_json(changes: &[VisibilityChange]) -> Value {
    Value::Array(
        changes
            .iter()
            .map(|change| {
                json!({
                    "question_id": change.question_id,
                    "visible": change.visible,
                    "cleared": change.cleared,
                })
            })
            .collect(),
    )
}

fn session_state(session: &FormSession, changes: &[VisibilityChange]) -> Result<Value, ComponentError> {
    let answers = serde_json::to_value(session.answers()).map_err(ComponentError::JsonEncode)?;
    Ok(json!({
        "answers": answers,
        "visibility": session.visibility(),
        "changes": changes_json(changes),
    }))
}

/// Returns the questionnaire document together with authoring warnings.
pub fn describe(config_json: &str) -> String {
    respond(load_model(config_json).and_then(|model| {
        let spec = serde_json::to_value(model.spec()).map_err(ComponentError::JsonEncode)?;
        let warnings: Vec<String> = model.warnings().iter().map(ToString::to_string).collect();
        Ok(json!({ "questionnaire": spec, "warnings": warnings }))
    }))
}

pub fn get_visibility(config_json: &str, answers_json: &str) -> String {
    respond(
        open_session(config_json, answers_json)
            .and_then(|session| session_state(&session, &[])),
    )
}

/// Applies a text, date or single-choice input event.
pub fn set_value(config_json: &str, answers_json: &str, question_id: &str, value: &str) -> String {
    respond(open_session(config_json, answers_json).and_then(|mut session| {
        let changes = session.set_value(question_id, value)?;
        session_state(&session, &changes)
    }))
}

/// Applies a checkbox input event.
pub fn toggle_option(
    config_json: &str,
    answers_json: &str,
    question_id: &str,
    option_index: usize,
    selected: bool,
) -> String {
    respond(open_session(config_json, answers_json).and_then(|mut session| {
        let changes = session.toggle(question_id, option_index, selected)?;
        session_state(&session, &changes)
    }))
}

pub fn set_detail(
    config_json: &str,
    answers_json: &str,
    question_id: &str,
    option_index: usize,
    text: &str,
) -> String {
    respond(open_session(config_json, answers_json).and_then(|mut session| {
        session.set_detail(question_id, option_index, text)?;
        session_state(&session, &[])
    }))
}

/// Applies a JSON-encoded value: a string for scalar questions, an array of
/// labels to replace a multi-choice selection.
pub fn submit_patch(
    config_json: &str,
    answers_json: &str,
    question_id: &str,
    value_json: &str,
) -> String {
    respond(open_session(config_json, answers_json).and_then(|mut session| {
        let value: Value = serde_json::from_str(value_json).map_err(ComponentError::ValueParse)?;
        let changes = match value {
            Value::Array(labels) => replace_selection(&mut session, question_id, &labels)?,
            Value::String(text) => session.set_value(question_id, &text)?,
            Value::Null => session.set_value(question_id, "")?,
            other => session.set_value(question_id, &other.to_string())?,
        };
        session_state(&session, &changes)
    }))
}

fn replace_selection(
    session: &mut FormSession,
    question_id: &str,
    labels: &[Value],
) -> Result<Vec<VisibilityChange>, ComponentError> {
    let question = session
        .model()
        .question(question_id)
        .ok_or_else(|| SessionError::UnknownQuestion(question_id.to_string()))?;
    if question.kind != QuestionType::Checkbox {
        return Err(SessionError::WrongType {
            question_id: question_id.to_string(),
            kind: question.kind.as_str(),
        }
        .into());
    }
    let options: Vec<String> = question
        .options
        .iter()
        .map(|option| option.label().to_string())
        .collect();
    let wanted: Vec<&str> = labels.iter().filter_map(Value::as_str).collect();
    if let Some(unknown) = wanted
        .iter()
        .find(|label| !options.iter().any(|option| option == *label))
    {
        return Err(SessionError::UnknownLabel {
            question_id: question_id.to_string(),
            label: unknown.to_string(),
        }
        .into());
    }

    let mut changes = Vec::new();
    for (index, label) in options.iter().enumerate() {
        if !wanted.contains(&label.as_str()) {
            changes.extend(session.toggle(question_id, index, false)?);
        }
    }
    for (index, label) in options.iter().enumerate() {
        if wanted.contains(&label.as_str()) {
            changes.extend(session.toggle(question_id, index, true)?);
        }
    }
    Ok(changes)
}

pub fn validate_answers(config_json: &str, answers_json: &str) -> String {
    respond(load_model(config_json).and_then(|model| {
        let answers = parse_answers(answers_json)?;
        serde_json::to_value(validate(&model, &answers)).map_err(ComponentError::JsonEncode)
    }))
}

pub fn render_text(config_json: &str, answers_json: &str) -> String {
    respond_string(
        open_session(config_json, answers_json)
            .map(|session| intake_render_text(&build_render_payload(&session))),
    )
}

pub fn render_json_ui(config_json: &str, answers_json: &str) -> String {
    respond(
        open_session(config_json, answers_json)
            .map(|session| intake_render_json_ui(&build_render_payload(&session))),
    )
}

fn rejected(notice: &str, result: &ValidationResult) -> Result<Value, ComponentError> {
    let validation = serde_json::to_value(result).map_err(ComponentError::JsonEncode)?;
    Ok(json!({
        "status": "error",
        "notice": notice,
        "validation": validation,
    }))
}

/// Validates and aggregates. Returns `status: "error"` with the single notice
/// on validation failure, otherwise one text block and one code plan (or
/// encoding error) per section. The snapshot is checked as sent, so a
/// conflicting selection is refused here exactly as in `validate_answers`.
pub fn submit_all(config_json: &str, answers_json: &str) -> String {
    respond(load_model(config_json).and_then(|model| {
        let answers = parse_answers(answers_json)?;
        let result = validate(&model, &answers);
        if let Some(notice) = result.notice() {
            return rejected(notice, &result);
        }

        let session = FormSession::with_answers(model, answers);
        match session.submit_encoded(&QrPlanner::default()) {
            Err(SubmitError::Validation { notice, result }) => rejected(notice, &result),
            Ok(submission) => {
                let sections = submission
                    .sections
                    .iter()
                    .map(|section| {
                        let mut entry = json!({
                            "title": section.title,
                            "text": section.text,
                        });
                        match &section.code {
                            Ok(plan) => entry["code"] = json!(plan),
                            Err(error) => entry["code_error"] = json!(error.to_string()),
                        }
                        entry
                    })
                    .collect::<Vec<_>>();
                debug!(sections = sections.len(), "questionnaire submitted");
                Ok(json!({
                    "status": "complete",
                    "sections": sections,
                }))
            }
        }
    }))
}
