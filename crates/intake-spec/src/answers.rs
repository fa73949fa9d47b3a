use std::collections::{BTreeMap, BTreeSet};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Raw value held for one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum AnswerValue {
    /// Text, date (ISO `YYYY-MM-DD`) or the selected single-choice label.
    Text(String),
    /// Selected labels of a multi-choice question.
    Selected(BTreeSet<String>),
}

impl AnswerValue {
    pub fn is_blank(&self) -> bool {
        match self {
            AnswerValue::Text(text) => text.trim().is_empty(),
            AnswerValue::Selected(labels) => labels.is_empty(),
        }
    }
}

/// Live answers keyed by question id, plus detail sub-answers keyed by
/// question id and option index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AnswerSnapshot {
    #[serde(default)]
    pub answers: BTreeMap<String, AnswerValue>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, BTreeMap<usize, String>>,
}

impl AnswerSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty() && self.details.is_empty()
    }

    pub fn value(&self, question_id: &str) -> Option<&AnswerValue> {
        self.answers.get(question_id)
    }

    pub fn text(&self, question_id: &str) -> Option<&str> {
        match self.answers.get(question_id) {
            Some(AnswerValue::Text(text)) => Some(text),
            _ => None,
        }
    }

    pub fn selected(&self, question_id: &str) -> Option<&BTreeSet<String>> {
        match self.answers.get(question_id) {
            Some(AnswerValue::Selected(labels)) => Some(labels),
            _ => None,
        }
    }

    pub fn is_selected(&self, question_id: &str, label: &str) -> bool {
        match self.answers.get(question_id) {
            Some(AnswerValue::Selected(labels)) => labels.contains(label),
            Some(AnswerValue::Text(text)) => text == label,
            None => false,
        }
    }

    /// Non-empty answer values used for condition matching: the trimmed text
    /// for scalar answers, every selected label for multi-choice answers.
    pub fn answered_values<'a>(&'a self, question_id: &str) -> Box<dyn Iterator<Item = &'a str> + 'a> {
        match self.answers.get(question_id) {
            Some(AnswerValue::Text(text)) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    Box::new(std::iter::empty())
                } else {
                    Box::new(std::iter::once(trimmed))
                }
            }
            Some(AnswerValue::Selected(labels)) => Box::new(labels.iter().map(String::as_str)),
            None => Box::new(std::iter::empty()),
        }
    }

    /// Stores a scalar answer; blank input removes the entry.
    pub fn set_text(&mut self, question_id: &str, value: impl Into<String>) {
        let value = value.into();
        if value.trim().is_empty() {
            self.answers.remove(question_id);
        } else {
            self.answers
                .insert(question_id.to_string(), AnswerValue::Text(value));
        }
    }

    /// Stores a multi-choice selection; an empty set removes the entry.
    pub fn set_selected(&mut self, question_id: &str, labels: BTreeSet<String>) {
        if labels.is_empty() {
            self.answers.remove(question_id);
        } else {
            self.answers
                .insert(question_id.to_string(), AnswerValue::Selected(labels));
        }
    }

    pub fn detail(&self, question_id: &str, option_index: usize) -> Option<&str> {
        self.details
            .get(question_id)
            .and_then(|details| details.get(&option_index))
            .map(String::as_str)
    }

    pub fn details_for(&self, question_id: &str) -> Option<&BTreeMap<usize, String>> {
        self.details.get(question_id)
    }

    /// Stores a detail sub-answer; blank input clears it.
    pub fn set_detail(&mut self, question_id: &str, option_index: usize, text: impl Into<String>) {
        let text = text.into();
        if text.trim().is_empty() {
            self.clear_detail(question_id, option_index);
            return;
        }
        self.details
            .entry(question_id.to_string())
            .or_default()
            .insert(option_index, text);
    }

    pub fn clear_detail(&mut self, question_id: &str, option_index: usize) {
        if let Some(details) = self.details.get_mut(question_id) {
            details.remove(&option_index);
            if details.is_empty() {
                self.details.remove(question_id);
            }
        }
    }

    /// Drops the answer and every detail of a question. Returns whether the
    /// snapshot changed.
    pub fn clear_question(&mut self, question_id: &str) -> bool {
        let had_answer = self.answers.remove(question_id).is_some();
        let had_details = self.details.remove(question_id).is_some();
        had_answer || had_details
    }
}
