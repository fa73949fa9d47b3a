use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use thiserror::Error;
use tracing::{debug, warn};

use crate::spec::{QuestionSpec, QuestionnaireSpec};
use crate::visibility::DependencyGraph;

/// Reasons a questionnaire document cannot be loaded.
#[derive(Debug, Error)]
pub enum SpecError {
    #[error("failed to parse questionnaire: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("question id '{0}' is declared more than once")]
    DuplicateQuestion(String),
    #[error("choice question '{0}' declares no options")]
    MissingOptions(String),
    #[error("question '{question_id}' repeats option '{label}'")]
    DuplicateOption { question_id: String, label: String },
    #[error("question '{question_id}' depends on unknown question '{referenced}'")]
    UnknownReference {
        question_id: String,
        referenced: String,
    },
    #[error("question '{0}' depends on its own answer")]
    SelfReference(String),
    #[error("visibility rules form a cycle: {}", .0.join(" -> "))]
    Cycle(Vec<String>),
}

/// Authoring issues that do not stop the questionnaire from loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecWarning {
    /// `visibleIf` resolved to zero conditions; the question is always hidden.
    EmptyPredicate(String),
    /// Options declared on a text or date question are ignored.
    OptionsIgnored(String),
}

impl fmt::Display for SpecWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecWarning::EmptyPredicate(id) => write!(
                f,
                "question '{}' has an empty visibility rule and will never be shown",
                id
            ),
            SpecWarning::OptionsIgnored(id) => {
                write!(f, "question '{}' is not a choice question; options are ignored", id)
            }
        }
    }
}

/// A questionnaire resolved once at load time: ids indexed, references
/// checked, dependency graph built.
#[derive(Debug, Clone)]
pub struct FormModel {
    spec: QuestionnaireSpec,
    index: BTreeMap<String, (usize, usize)>,
    graph: DependencyGraph,
    warnings: Vec<SpecWarning>,
}

impl FormModel {
    pub fn compile(spec: QuestionnaireSpec) -> Result<Self, SpecError> {
        let mut index = BTreeMap::new();
        let mut warnings = Vec::new();

        for (section_idx, section) in spec.sections.iter().enumerate() {
            for (question_idx, question) in section.questions.iter().enumerate() {
                if index
                    .insert(question.id.clone(), (section_idx, question_idx))
                    .is_some()
                {
                    return Err(SpecError::DuplicateQuestion(question.id.clone()));
                }
                check_options(question, &mut warnings)?;
            }
        }

        for question in spec.questions() {
            let Some(visible_if) = &question.visible_if else {
                continue;
            };
            if visible_if.normalize().is_empty() {
                warn!(question = %question.id, "empty visibility rule, question stays hidden");
                warnings.push(SpecWarning::EmptyPredicate(question.id.clone()));
            }
            for referenced in visible_if.referenced_ids() {
                if referenced == question.id {
                    return Err(SpecError::SelfReference(question.id.clone()));
                }
                if !index.contains_key(referenced) {
                    return Err(SpecError::UnknownReference {
                        question_id: question.id.clone(),
                        referenced: referenced.to_string(),
                    });
                }
            }
        }

        let graph = DependencyGraph::build(&spec)?;
        debug!(
            title = %spec.title,
            questions = index.len(),
            watched = graph.watched_count(),
            "questionnaire compiled"
        );

        Ok(Self {
            spec,
            index,
            graph,
            warnings,
        })
    }

    pub fn spec(&self) -> &QuestionnaireSpec {
        &self.spec
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn warnings(&self) -> &[SpecWarning] {
        &self.warnings
    }

    pub fn question(&self, id: &str) -> Option<&QuestionSpec> {
        let (section_idx, question_idx) = *self.index.get(id)?;
        self.spec
            .sections
            .get(section_idx)
            .and_then(|section| section.questions.get(question_idx))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn questions(&self) -> impl Iterator<Item = &QuestionSpec> {
        self.spec.questions()
    }
}

fn check_options(question: &QuestionSpec, warnings: &mut Vec<SpecWarning>) -> Result<(), SpecError> {
    if !question.kind.is_choice() {
        if !question.options.is_empty() {
            warnings.push(SpecWarning::OptionsIgnored(question.id.clone()));
        }
        return Ok(());
    }
    if question.options.is_empty() {
        return Err(SpecError::MissingOptions(question.id.clone()));
    }
    let mut seen = BTreeSet::new();
    for option in &question.options {
        if !seen.insert(option.label()) {
            return Err(SpecError::DuplicateOption {
                question_id: question.id.clone(),
                label: option.label().to_string(),
            });
        }
    }
    Ok(())
}

/// Parses and compiles a questionnaire JSON document.
pub fn load_questionnaire(json: &str) -> Result<FormModel, SpecError> {
    let spec: QuestionnaireSpec = serde_json::from_str(json)?;
    FormModel::compile(spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn compile(value: serde_json::Value) -> Result<FormModel, SpecError> {
        FormModel::compile(serde_json::from_value(value).expect("spec json"))
    }

    #[test]
    fn rejects_duplicate_ids_across_sections() {
        let err = compile(json!({
            "title": "t",
            "sections": [
                { "title": "a", "questions": [{ "id": "q1", "type": "text", "title": "A" }] },
                { "title": "b", "questions": [{ "id": "q1", "type": "text", "title": "B" }] }
            ]
        }))
        .unwrap_err();
        assert!(matches!(err, SpecError::DuplicateQuestion(id) if id == "q1"));
    }

    #[test]
    fn rejects_choice_without_options() {
        let err = compile(json!({
            "title": "t",
            "sections": [{ "title": "a", "questions": [
                { "id": "q1", "type": "checkbox", "title": "A" }
            ]}]
        }))
        .unwrap_err();
        assert!(matches!(err, SpecError::MissingOptions(_)));
    }

    #[test]
    fn rejects_unknown_and_self_references() {
        let unknown = compile(json!({
            "title": "t",
            "sections": [{ "title": "a", "questions": [
                { "id": "q1", "type": "text", "title": "A",
                  "visibleIf": { "questionId": "missing", "anyOf": ["x"] } }
            ]}]
        }))
        .unwrap_err();
        assert!(matches!(unknown, SpecError::UnknownReference { .. }));

        let own = compile(json!({
            "title": "t",
            "sections": [{ "title": "a", "questions": [
                { "id": "q1", "type": "text", "title": "A",
                  "visibleIf": { "questionId": "q1", "anyOf": ["x"] } }
            ]}]
        }))
        .unwrap_err();
        assert!(matches!(own, SpecError::SelfReference(_)));
    }

    #[test]
    fn empty_predicate_loads_with_warning() {
        let model = compile(json!({
            "title": "t",
            "sections": [{ "title": "a", "questions": [
                { "id": "q1", "type": "text", "title": "A", "visibleIf": [] }
            ]}]
        }))
        .expect("compile");
        assert_eq!(model.warnings(), &[SpecWarning::EmptyPredicate("q1".into())]);
    }

    #[test]
    fn lookup_by_id() {
        let model = compile(json!({
            "title": "t",
            "sections": [
                { "title": "a", "questions": [{ "id": "q1", "type": "text", "title": "A" }] },
                { "title": "b", "questions": [{ "id": "q2", "type": "date", "title": "B" }] }
            ]
        }))
        .expect("compile");
        assert_eq!(model.question("q2").map(|q| q.title.as_str()), Some("B"));
        assert!(model.question("q3").is_none());
    }
}
