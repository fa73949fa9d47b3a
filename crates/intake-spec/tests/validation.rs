use serde_json::json;

use intake_spec::{
    AnswerSnapshot, ChoiceOption, Condition, FormModel, FormSession, QuestionSpec, QuestionType,
    QuestionnaireSpec, REQUIRED_NOTICE, SectionSpec, SubmitError, VisibleIf, load_questionnaire,
    resolve_visibility, validate,
};

fn question(id: &str, kind: QuestionType, title: &str, required: bool) -> QuestionSpec {
    QuestionSpec {
        id: id.into(),
        kind,
        title: title.into(),
        required,
        options: Vec::new(),
        note: None,
        placeholder: None,
        visible_if: None,
    }
}

fn make_simple_form() -> FormModel {
    let mut fever = question("fever", QuestionType::Radio, "是否发热", true);
    fever.options = vec![ChoiceOption::from("是"), ChoiceOption::from("否")];
    let mut temperature = question("temperature", QuestionType::Text, "体温", true);
    temperature.visible_if = Some(VisibleIf::Single(Condition::new("fever", ["是"])));

    FormModel::compile(QuestionnaireSpec {
        title: "Simple".into(),
        sections: vec![SectionSpec {
            title: "s".into(),
            questions: vec![
                question("name", QuestionType::Text, "姓名", true),
                fever,
                temperature,
            ],
        }],
    })
    .expect("compile")
}

fn snapshot(value: serde_json::Value) -> AnswerSnapshot {
    serde_json::from_value(value).expect("snapshot")
}

#[test]
fn validation_reports_missing() {
    let model = make_simple_form();
    let result = validate(&model, &AnswerSnapshot::new());
    assert!(!result.valid);
    assert_eq!(result.missing_required, vec!["name", "fever"]);
    assert_eq!(result.notice(), Some(REQUIRED_NOTICE));
}

#[test]
fn hidden_required_question_does_not_block() {
    let model = make_simple_form();
    let answers = snapshot(json!({ "answers": { "name": "张三", "fever": "否" } }));
    let visibility = resolve_visibility(&model, &answers);
    assert!(!visibility["temperature"]);

    let result = validate(&model, &answers);
    assert!(result.valid, "{result:?}");
    assert_eq!(result.notice(), None);
}

#[test]
fn shown_required_question_blocks_with_single_notice() {
    let model = make_simple_form();
    let mut session = FormSession::new(model);
    session.set_value("name", "张三").expect("name");
    session.set_value("fever", "是").expect("fever");

    let err = session.submit().unwrap_err();
    let SubmitError::Validation { notice, result } = err;
    assert_eq!(notice, REQUIRED_NOTICE);
    assert_eq!(result.missing_required, vec!["temperature"]);
}

#[test]
fn stale_answer_of_hidden_question_is_ignored() {
    let model = make_simple_form();
    let answers = snapshot(json!({
        "answers": { "name": "张三", "fever": "否", "temperature": [] }
    }));
    let result = validate(&model, &answers);
    assert!(result.valid, "{result:?}");
}

#[test]
fn malformed_answers_are_reported() {
    let model = load_questionnaire(include_str!("fixtures/symptom_intake.json")).expect("model");
    let answers = snapshot(json!({
        "answers": {
            "name": "张三",
            "birth": "1990/01/02",
            "gender": "未知",
            "chief": ["咳嗽"],
            "symptoms": ["恶心", "无伴随症状"],
            "fever": "否",
            "history": ["以上都没有"],
            "extra": "x"
        },
        "details": { "history": { "2": "哮喘" } }
    }));

    let result = validate(&model, &answers);
    assert!(!result.valid);
    let codes: Vec<&str> = result
        .errors
        .iter()
        .filter_map(|error| error.code.as_deref())
        .collect();
    assert_eq!(
        codes,
        vec![
            "invalid_date",
            "unknown_option",
            "type_mismatch",
            "exclusive_conflict",
            "detail_without_selection"
        ]
    );
    assert_eq!(result.unknown_fields, vec!["extra"]);
    assert!(result.missing_required.is_empty());
    assert_eq!(result.notice(), Some(intake_spec::validate::INVALID_NOTICE));
}

#[test]
fn required_checkbox_needs_a_selection() {
    let model = load_questionnaire(include_str!("fixtures/symptom_intake.json")).expect("model");
    let answers = snapshot(json!({
        "answers": {
            "name": "张三",
            "birth": "1990-01-02",
            "gender": "男",
            "chief": "咳嗽",
            "fever": "否",
            "history": ["高血压"]
        }
    }));
    let result = validate(&model, &answers);
    assert_eq!(result.missing_required, vec!["symptoms"]);
}
