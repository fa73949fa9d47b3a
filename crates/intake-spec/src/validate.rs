use std::collections::BTreeSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::aggregate::parse_date;
use crate::answers::{AnswerSnapshot, AnswerValue};
use crate::exclusivity::exclusivity_holds;
use crate::model::FormModel;
use crate::spec::{QuestionSpec, QuestionType};
use crate::visibility::settle;

/// Shown once when a required visible question is unanswered.
pub const REQUIRED_NOTICE: &str = "请确保所有必选题目都已回答！";
/// Shown once when answers are present but malformed.
pub const INVALID_NOTICE: &str = "部分答案格式有误，请检查后重新提交！";

/// Validation error metadata reported by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ValidationError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// Outcome of checking a snapshot before aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ValidationResult {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ValidationError>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_required: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unknown_fields: Vec<String>,
}

impl ValidationResult {
    /// The single user-facing notice for a failed validation.
    pub fn notice(&self) -> Option<&'static str> {
        if self.valid {
            None
        } else if !self.missing_required.is_empty() {
            Some(REQUIRED_NOTICE)
        } else {
            Some(INVALID_NOTICE)
        }
    }
}

/// Checks required visible questions and the shape of every visible answer.
/// Hidden questions are exempt and their stale answers are ignored.
pub fn validate(model: &FormModel, answers: &AnswerSnapshot) -> ValidationResult {
    let (effective, visibility) = settle(model, answers);

    let mut errors = Vec::new();
    let mut missing_required = Vec::new();

    for question in model.questions() {
        if !visibility.get(&question.id).copied().unwrap_or(true) {
            continue;
        }

        match effective.value(&question.id) {
            Some(value) if !value.is_blank() => {
                if let Some(error) = validate_value(question, value) {
                    errors.push(error);
                }
            }
            _ => {
                if question.required {
                    missing_required.push(question.id.clone());
                }
            }
        }

        if let Some(error) = validate_details(question, &effective) {
            errors.push(error);
        }
    }

    let unknown_fields: Vec<String> = answers
        .answers
        .keys()
        .chain(answers.details.keys())
        .filter(|key| !model.contains(key))
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    ValidationResult {
        valid: errors.is_empty() && missing_required.is_empty() && unknown_fields.is_empty(),
        errors,
        missing_required,
        unknown_fields,
    }
}

fn validate_value(question: &QuestionSpec, value: &AnswerValue) -> Option<ValidationError> {
    match (question.kind, value) {
        (QuestionType::Text, AnswerValue::Text(_)) => None,
        (QuestionType::Date, AnswerValue::Text(text)) => match parse_date(text) {
            Some(_) => None,
            None => Some(base_error(
                question,
                "date must be formatted as YYYY-MM-DD",
                "invalid_date",
            )),
        },
        (QuestionType::Radio, AnswerValue::Text(label)) => {
            if question.option_index(label).is_some() {
                None
            } else {
                Some(base_error(question, "invalid option", "unknown_option"))
            }
        }
        (QuestionType::Checkbox, AnswerValue::Selected(labels)) => {
            if labels
                .iter()
                .any(|label| question.option_index(label).is_none())
            {
                Some(base_error(question, "invalid option", "unknown_option"))
            } else if !exclusivity_holds(&question.options, labels) {
                Some(base_error(
                    question,
                    "exclusive option selected together with other options",
                    "exclusive_conflict",
                ))
            } else {
                None
            }
        }
        _ => Some(base_error(question, "type mismatch", "type_mismatch")),
    }
}

fn validate_details(question: &QuestionSpec, answers: &AnswerSnapshot) -> Option<ValidationError> {
    let details = answers.details_for(&question.id)?;
    let stray = details.keys().any(|&index| {
        question.options.get(index).is_none_or(|option| {
            !option.requires_detail() || !answers.is_selected(&question.id, option.label())
        })
    });
    stray.then(|| {
        base_error(
            question,
            "detail given for an option that is not selected",
            "detail_without_selection",
        )
    })
}

fn base_error(question: &QuestionSpec, message: &str, code: &str) -> ValidationError {
    ValidationError {
        question_id: Some(question.id.clone()),
        path: Some(format!("/{}", question.id)),
        message: message.into(),
        code: Some(code.into()),
    }
}
