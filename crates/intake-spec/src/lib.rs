#![allow(missing_docs)]

pub mod aggregate;
pub mod answers;
pub mod encode;
pub mod exclusivity;
pub mod model;
pub mod predicate;
pub mod render;
pub mod session;
pub mod spec;
pub mod validate;
pub mod visibility;

pub use aggregate::{SectionResult, aggregate, format_date, parse_date};
pub use answers::{AnswerSnapshot, AnswerValue};
pub use encode::{CodeEncoder, EncodeError, QrPlan, QrPlanner};
pub use exclusivity::{ToggleOutcome, apply_toggle, exclusivity_holds};
pub use model::{FormModel, SpecError, SpecWarning, load_questionnaire};
pub use predicate::{Condition, MatchMode, Predicate, VisibleIf};
pub use render::{
    RenderPayload, RenderQuestion, RenderStatus, build_render_payload, render_json_ui, render_text,
};
pub use session::{FormSession, SectionOutput, SessionError, SubmitError, Submission};
pub use spec::{ChoiceOption, DetailedOption, QuestionSpec, QuestionType, QuestionnaireSpec, SectionSpec};
pub use validate::{REQUIRED_NOTICE, ValidationError, ValidationResult, validate};
pub use visibility::{
    DependencyGraph, VisibilityChange, VisibilityMap, is_visible, recompute, resolve_visibility,
    settle,
};
