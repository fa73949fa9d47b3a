use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::answers::{AnswerSnapshot, AnswerValue};
use crate::model::FormModel;
use crate::spec::{QuestionSpec, QuestionType, SectionSpec};
use crate::visibility::settle;

pub const ENTRY_SEPARATOR: &str = ";";
pub const LABEL_SEPARATOR: &str = ":";
pub const OPTION_SEPARATOR: &str = "、";
pub const DETAIL_PREFIX: &str = "；补充:";
const DATE_INPUT_FORMAT: &str = "%Y-%m-%d";
const DATE_OUTPUT_FORMAT: &str = "%Y年%m月%d日";

/// Serialized answers of one section, encoded as one scannable unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SectionResult {
    pub title: String,
    pub text: String,
}

/// Builds one `label:value;label:value` string per section, in declaration
/// order. Hidden and unanswered questions are skipped. Output depends only on
/// the model and the snapshot.
///
/// Text answers are emitted trimmed, so `" 张三 "` serializes as `姓名:张三`.
/// Earlier form builds kept surrounding whitespace in the output once a value
/// was non-blank; consumers comparing against those strings should trim too.
pub fn aggregate(model: &FormModel, answers: &AnswerSnapshot) -> Vec<SectionResult> {
    let (effective, _) = settle(model, answers);
    model
        .spec()
        .sections
        .iter()
        .map(|section| aggregate_section(section, &effective))
        .collect()
}

fn aggregate_section(section: &SectionSpec, answers: &AnswerSnapshot) -> SectionResult {
    let entries: Vec<String> = section
        .questions
        .iter()
        .filter_map(|question| aggregate_entry(question, answers))
        .collect();
    SectionResult {
        title: section.title.clone(),
        text: entries.join(ENTRY_SEPARATOR),
    }
}

fn aggregate_entry(question: &QuestionSpec, answers: &AnswerSnapshot) -> Option<String> {
    let value = match (question.kind, answers.value(&question.id)?) {
        (QuestionType::Checkbox, AnswerValue::Selected(labels)) => {
            let chosen: Vec<&str> = question
                .options
                .iter()
                .map(|option| option.label())
                .filter(|label| labels.contains(*label))
                .collect();
            if chosen.is_empty() {
                return None;
            }
            chosen.join(OPTION_SEPARATOR)
        }
        (QuestionType::Checkbox, AnswerValue::Text(_)) | (_, AnswerValue::Selected(_)) => {
            return None;
        }
        (QuestionType::Date, AnswerValue::Text(text)) => format_date(non_blank(text)?),
        (_, AnswerValue::Text(text)) => non_blank(text)?.to_string(),
    };

    let mut entry = format!("{}{}{}", question.result_title(), LABEL_SEPARATOR, value);
    for detail in selected_details(question, answers) {
        entry.push_str(DETAIL_PREFIX);
        entry.push_str(detail);
    }
    Some(entry)
}

fn selected_details<'a>(
    question: &'a QuestionSpec,
    answers: &'a AnswerSnapshot,
) -> impl Iterator<Item = &'a str> {
    question
        .options
        .iter()
        .enumerate()
        .filter(|(_, option)| {
            option.requires_detail() && answers.is_selected(&question.id, option.label())
        })
        .filter_map(|(index, _)| answers.detail(&question.id, index))
        .filter_map(non_blank)
}

fn non_blank(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_INPUT_FORMAT).ok()
}

/// Renders an ISO date as `YYYY年MM月DD日`; anything unparsable is kept as is.
pub fn format_date(value: &str) -> String {
    match parse_date(value) {
        Some(date) => date.format(DATE_OUTPUT_FORMAT).to_string(),
        None => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_iso_dates() {
        assert_eq!(format_date("2024-03-05"), "2024年03月05日");
        assert_eq!(format_date("昨天"), "昨天");
    }
}
