use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::spec::question::QuestionSpec;

/// Named, ordered group of questions serialized and encoded together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SectionSpec {
    pub title: String,
    #[serde(default)]
    pub questions: Vec<QuestionSpec>,
}

/// Top-level questionnaire document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QuestionnaireSpec {
    pub title: String,
    #[serde(default)]
    pub sections: Vec<SectionSpec>,
}

impl QuestionnaireSpec {
    /// Iterates every question in declaration order across sections.
    pub fn questions(&self) -> impl Iterator<Item = &QuestionSpec> {
        self.sections
            .iter()
            .flat_map(|section| section.questions.iter())
    }

    pub fn question(&self, id: &str) -> Option<&QuestionSpec> {
        self.questions().find(|question| question.id == id)
    }
}
