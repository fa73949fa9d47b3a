use thiserror::Error;
use tracing::{debug, warn};

use crate::aggregate::{SectionResult, aggregate, parse_date};
use crate::answers::AnswerSnapshot;
use crate::encode::{CodeEncoder, EncodeError};
use crate::exclusivity::{apply_toggle, exclusivity_holds};
use crate::model::FormModel;
use crate::spec::{QuestionSpec, QuestionType};
use crate::validate::{ValidationResult, validate};
use crate::visibility::{VisibilityChange, VisibilityMap, recompute, settle};

/// Rejected input events. The session state is untouched when one is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("unknown question '{0}'")]
    UnknownQuestion(String),
    #[error("question '{0}' is hidden and cannot be answered")]
    Disabled(String),
    #[error("question '{question_id}' is a {kind} question")]
    WrongType {
        question_id: String,
        kind: &'static str,
    },
    #[error("question '{question_id}' has no option #{index}")]
    UnknownOption { question_id: String, index: usize },
    #[error("'{value}' is not a date in YYYY-MM-DD form")]
    InvalidDate { question_id: String, value: String },
    #[error("question '{question_id}' has no option '{label}'")]
    UnknownLabel { question_id: String, label: String },
    #[error("option #{index} of '{question_id}' does not take a detail")]
    NoDetail { question_id: String, index: usize },
    #[error("option #{index} of '{question_id}' is not selected")]
    NotSelected { question_id: String, index: usize },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SubmitError {
    #[error("{notice}")]
    Validation {
        notice: &'static str,
        result: ValidationResult,
    },
}

/// Result view of one section: the serialized text is always kept, even when
/// encoding it failed.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionOutput<T> {
    pub title: String,
    pub text: String,
    pub code: Result<T, EncodeError>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Submission<T> {
    pub sections: Vec<SectionOutput<T>>,
}

impl<T> Submission<T> {
    pub fn has_encoding_errors(&self) -> bool {
        self.sections.iter().any(|section| section.code.is_err())
    }
}

/// Live form state. Every input event runs to completion, including
/// exclusivity enforcement and visibility cascades, before it returns.
#[derive(Debug, Clone)]
pub struct FormSession {
    model: FormModel,
    answers: AnswerSnapshot,
    visibility: VisibilityMap,
}

impl FormSession {
    pub fn new(model: FormModel) -> Self {
        Self::with_answers(model, AnswerSnapshot::new())
    }

    /// Starts from existing answers. Hidden answers are dropped and
    /// selections violating exclusivity are replayed in option order.
    pub fn with_answers(model: FormModel, answers: AnswerSnapshot) -> Self {
        let (mut answers, _) = settle(&model, &answers);
        for question in model.questions() {
            if question.kind == QuestionType::Checkbox {
                normalize_selection(question, &mut answers);
            }
        }
        let (answers, visibility) = settle(&model, &answers);
        Self {
            model,
            answers,
            visibility,
        }
    }

    pub fn model(&self) -> &FormModel {
        &self.model
    }

    pub fn answers(&self) -> &AnswerSnapshot {
        &self.answers
    }

    pub fn visibility(&self) -> &VisibilityMap {
        &self.visibility
    }

    /// Hidden questions are disabled.
    pub fn is_enabled(&self, question_id: &str) -> bool {
        self.visibility.get(question_id).copied().unwrap_or(false)
    }

    /// Sets a text, date or single-choice answer. Blank input clears it.
    pub fn set_value(
        &mut self,
        question_id: &str,
        value: &str,
    ) -> Result<Vec<VisibilityChange>, SessionError> {
        let question = enabled_question(&self.model, &self.visibility, question_id)?;
        match question.kind {
            QuestionType::Text => {
                self.answers.set_text(question_id, value);
            }
            QuestionType::Date => {
                if !value.trim().is_empty() && parse_date(value).is_none() {
                    return Err(SessionError::InvalidDate {
                        question_id: question_id.to_string(),
                        value: value.to_string(),
                    });
                }
                self.answers.set_text(question_id, value.trim());
            }
            QuestionType::Radio => {
                let keep = if value.trim().is_empty() {
                    None
                } else {
                    Some(question.option_index(value).ok_or_else(|| {
                        SessionError::UnknownLabel {
                            question_id: question_id.to_string(),
                            label: value.to_string(),
                        }
                    })?)
                };
                let stale: Vec<usize> = (0..question.options.len())
                    .filter(|index| Some(*index) != keep)
                    .collect();
                self.answers.set_text(question_id, value);
                for index in stale {
                    self.answers.clear_detail(question_id, index);
                }
            }
            QuestionType::Checkbox => return Err(wrong_type(question)),
        }
        debug!(question = %question_id, "answer updated");
        Ok(self.propagate(question_id))
    }

    /// Checks or unchecks one option of a multi-choice question.
    pub fn toggle(
        &mut self,
        question_id: &str,
        index: usize,
        now_selected: bool,
    ) -> Result<Vec<VisibilityChange>, SessionError> {
        let question = enabled_question(&self.model, &self.visibility, question_id)?;
        if question.kind != QuestionType::Checkbox {
            return Err(wrong_type(question));
        }
        if index >= question.options.len() {
            return Err(SessionError::UnknownOption {
                question_id: question_id.to_string(),
                index,
            });
        }

        let mut selected = self
            .answers
            .selected(question_id)
            .cloned()
            .unwrap_or_default();
        let outcome = apply_toggle(&question.options, &mut selected, index, now_selected);
        if !exclusivity_holds(&question.options, &selected) {
            warn!(question = %question_id, "exclusive selection conflict after toggle");
        }
        debug_assert!(exclusivity_holds(&question.options, &selected));

        let mut cleared = outcome.cleared;
        if !now_selected {
            cleared.push(index);
        }
        self.answers.set_selected(question_id, selected);
        for index in cleared {
            self.answers.clear_detail(question_id, index);
        }
        debug!(question = %question_id, index, now_selected, "option toggled");
        Ok(self.propagate(question_id))
    }

    /// Fills the free-text detail of a selected option that asks for one.
    pub fn set_detail(
        &mut self,
        question_id: &str,
        index: usize,
        text: &str,
    ) -> Result<(), SessionError> {
        let question = enabled_question(&self.model, &self.visibility, question_id)?;
        let option = question
            .options
            .get(index)
            .ok_or_else(|| SessionError::UnknownOption {
                question_id: question_id.to_string(),
                index,
            })?;
        if !option.requires_detail() {
            return Err(SessionError::NoDetail {
                question_id: question_id.to_string(),
                index,
            });
        }
        if !self.answers.is_selected(question_id, option.label()) {
            return Err(SessionError::NotSelected {
                question_id: question_id.to_string(),
                index,
            });
        }
        self.answers.set_detail(question_id, index, text);
        Ok(())
    }

    /// Back to the freshly rendered state.
    pub fn reset(&mut self) {
        self.answers = AnswerSnapshot::new();
        self.visibility = settle(&self.model, &self.answers).1;
    }

    pub fn validate(&self) -> ValidationResult {
        validate(&self.model, &self.answers)
    }

    /// Validates, then aggregates one result per section. Nothing changes on
    /// failure.
    pub fn submit(&self) -> Result<Vec<SectionResult>, SubmitError> {
        let result = self.validate();
        if let Some(notice) = result.notice() {
            debug!(
                missing = result.missing_required.len(),
                errors = result.errors.len(),
                "submission rejected"
            );
            return Err(SubmitError::Validation { notice, result });
        }
        Ok(aggregate(&self.model, &self.answers))
    }

    /// Like [`FormSession::submit`], also encoding each section.
    pub fn submit_encoded<E: CodeEncoder>(
        &self,
        encoder: &E,
    ) -> Result<Submission<E::Output>, SubmitError> {
        let sections = self
            .submit()?
            .into_iter()
            .map(|SectionResult { title, text }| {
                let code = encoder.encode(&text);
                if let Err(error) = &code {
                    warn!(section = %title, %error, "section could not be encoded");
                }
                SectionOutput { title, text, code }
            })
            .collect();
        Ok(Submission { sections })
    }

    fn propagate(&mut self, question_id: &str) -> Vec<VisibilityChange> {
        if !self.model.graph().is_watched(question_id) {
            return Vec::new();
        }
        recompute(
            &self.model,
            &mut self.answers,
            &mut self.visibility,
            question_id,
        )
    }
}

fn enabled_question<'a>(
    model: &'a FormModel,
    visibility: &VisibilityMap,
    question_id: &str,
) -> Result<&'a QuestionSpec, SessionError> {
    let question = model
        .question(question_id)
        .ok_or_else(|| SessionError::UnknownQuestion(question_id.to_string()))?;
    if !visibility.get(question_id).copied().unwrap_or(false) {
        return Err(SessionError::Disabled(question_id.to_string()));
    }
    Ok(question)
}

fn wrong_type(question: &QuestionSpec) -> SessionError {
    SessionError::WrongType {
        question_id: question.id.clone(),
        kind: question.kind.as_str(),
    }
}

fn normalize_selection(question: &QuestionSpec, answers: &mut AnswerSnapshot) {
    let Some(current) = answers.selected(&question.id).cloned() else {
        return;
    };
    if exclusivity_holds(&question.options, &current) {
        return;
    }
    warn!(question = %question.id, "replaying conflicting selection in option order");
    let mut selected = Default::default();
    for (index, option) in question.options.iter().enumerate() {
        if current.contains(option.label()) {
            apply_toggle(&question.options, &mut selected, index, true);
        }
    }
    answers.set_selected(&question.id, selected);
}
