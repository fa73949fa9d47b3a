pub mod form;
pub mod question;

pub use form::{QuestionnaireSpec, SectionSpec};
pub use question::{ChoiceOption, DetailedOption, QuestionSpec, QuestionType};
