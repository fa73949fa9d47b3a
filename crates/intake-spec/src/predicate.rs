use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::answers::AnswerSnapshot;

/// True when the referenced question's current answer intersects `any_of`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub question_id: String,
    #[serde(default)]
    pub any_of: Vec<String>,
}

impl Condition {
    pub fn new<I, S>(question_id: impl Into<String>, any_of: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            question_id: question_id.into(),
            any_of: any_of.into_iter().map(Into::into).collect(),
        }
    }

    pub fn evaluate(&self, answers: &AnswerSnapshot) -> bool {
        answers.answered_values(&self.question_id).any(|value| {
            self.any_of
                .iter()
                .any(|accepted| accepted.trim() == value)
        })
    }
}

/// The four accepted `visibleIf` shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum VisibleIf {
    Any { any: Vec<Condition> },
    All { all: Vec<Condition> },
    List(Vec<Condition>),
    Single(Condition),
}

/// How the conditions of a normalized predicate combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    All,
    Any,
}

/// `visibleIf` resolved to a mode and a flat condition list.
#[derive(Debug, Clone, Copy)]
pub struct Predicate<'a> {
    pub mode: MatchMode,
    pub conditions: &'a [Condition],
}

impl VisibleIf {
    pub fn normalize(&self) -> Predicate<'_> {
        match self {
            VisibleIf::Any { any } => Predicate {
                mode: MatchMode::Any,
                conditions: any,
            },
            VisibleIf::All { all } => Predicate {
                mode: MatchMode::All,
                conditions: all,
            },
            VisibleIf::List(conditions) => Predicate {
                mode: MatchMode::All,
                conditions,
            },
            VisibleIf::Single(condition) => Predicate {
                mode: MatchMode::All,
                conditions: std::slice::from_ref(condition),
            },
        }
    }

    /// Evaluates against a snapshot. An empty condition list is never visible.
    pub fn evaluate(&self, answers: &AnswerSnapshot) -> bool {
        self.normalize().evaluate(answers)
    }

    /// Question ids this predicate reads.
    pub fn referenced_ids(&self) -> impl Iterator<Item = &str> {
        self.normalize()
            .conditions
            .iter()
            .map(|condition| condition.question_id.as_str())
    }
}

impl Predicate<'_> {
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn evaluate(&self, answers: &AnswerSnapshot) -> bool {
        if self.conditions.is_empty() {
            return false;
        }
        match self.mode {
            MatchMode::All => self
                .conditions
                .iter()
                .all(|condition| condition.evaluate(answers)),
            MatchMode::Any => self
                .conditions
                .iter()
                .any(|condition| condition.evaluate(answers)),
        }
    }
}
