use std::sync::LazyLock;

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::predicate::VisibleIf;

/// Labels that mark an option as mutually exclusive with its siblings when the
/// schema does not say so explicitly.
const EXCLUSIVE_KEYWORDS: &[&str] = &[
    "以上都没有",
    "以上均无",
    "以上皆无",
    "否认",
    "无就诊",
    "none of the above",
    "denies",
    "no prior visits",
];

static RESULT_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"（(.+?)）").expect("static result title pattern"));

/// Supported question input kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    Text,
    Date,
    Radio,
    Checkbox,
}

impl QuestionType {
    pub fn is_choice(self) -> bool {
        matches!(self, QuestionType::Radio | QuestionType::Checkbox)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QuestionType::Text => "text",
            QuestionType::Date => "date",
            QuestionType::Radio => "radio",
            QuestionType::Checkbox => "checkbox",
        }
    }
}

/// Option carrying per-option behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DetailedOption {
    pub label: String,
    #[serde(default)]
    pub requires_detail: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclusive: Option<bool>,
}

/// A single choice as written in the schema: a bare label or a labeled object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum ChoiceOption {
    Plain(String),
    Detailed(DetailedOption),
}

impl ChoiceOption {
    pub fn label(&self) -> &str {
        match self {
            ChoiceOption::Plain(label) => label,
            ChoiceOption::Detailed(option) => &option.label,
        }
    }

    pub fn requires_detail(&self) -> bool {
        match self {
            ChoiceOption::Plain(_) => false,
            ChoiceOption::Detailed(option) => option.requires_detail,
        }
    }

    /// Explicit `exclusive` wins; otherwise the label is matched against known
    /// "none" keywords.
    pub fn is_exclusive(&self) -> bool {
        match self {
            ChoiceOption::Detailed(DetailedOption {
                exclusive: Some(flag),
                ..
            }) => *flag,
            other => label_implies_exclusive(other.label()),
        }
    }
}

impl From<&str> for ChoiceOption {
    fn from(label: &str) -> Self {
        ChoiceOption::Plain(label.to_string())
    }
}

fn label_implies_exclusive(label: &str) -> bool {
    let lowered = label.to_lowercase();
    EXCLUSIVE_KEYWORDS
        .iter()
        .any(|keyword| lowered.contains(keyword))
}

/// Definition of a single question inside a section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestionSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    pub title: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<ChoiceOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible_if: Option<VisibleIf>,
}

impl QuestionSpec {
    /// On-screen title: everything before the first full-width parenthesis.
    pub fn display_title(&self) -> &str {
        display_title(&self.title)
    }

    /// Compact label used in aggregated output.
    pub fn result_title(&self) -> &str {
        result_title(&self.title)
    }

    pub fn option_index(&self, label: &str) -> Option<usize> {
        self.options.iter().position(|option| option.label() == label)
    }
}

pub fn display_title(title: &str) -> &str {
    title.split('（').next().unwrap_or(title)
}

pub fn result_title(title: &str) -> &str {
    RESULT_TITLE
        .captures(title)
        .and_then(|captures| captures.get(1))
        .map(|group| group.as_str())
        .unwrap_or(title)
}
