use proptest::prelude::*;
use serde_json::json;

use intake_spec::{FormSession, exclusivity_holds, load_questionnaire};

fn session() -> FormSession {
    let model = load_questionnaire(
        &json!({
            "title": "toggle",
            "sections": [{ "title": "s", "questions": [
                { "id": "q", "type": "checkbox", "title": "症状", "options": [
                    { "label": "E", "exclusive": true },
                    "A",
                    "B",
                    { "label": "C", "requiresDetail": true },
                    "以上都没有"
                ]},
                { "id": "follow", "type": "text", "title": "随访",
                  "visibleIf": { "questionId": "q", "anyOf": ["A"] } }
            ]}]
        })
        .to_string(),
    )
    .expect("model");
    FormSession::new(model)
}

proptest! {
    #[test]
    fn exclusivity_holds_after_every_toggle(
        toggles in prop::collection::vec((0usize..5, any::<bool>()), 0..40)
    ) {
        let mut session = session();
        for (index, selected) in toggles {
            session.toggle("q", index, selected).expect("toggle");
            if selected && index == 3 {
                session.set_detail("q", 3, "detail").expect("detail");
            }

            let question = session.model().question("q").expect("question");
            let current = session.answers().selected("q").cloned().unwrap_or_default();
            prop_assert!(exclusivity_holds(&question.options, &current));

            if let Some(details) = session.answers().details_for("q") {
                prop_assert!(details.keys().all(|index| *index == 3));
                prop_assert!(current.contains("C"));
            }

            let follow_visible = current.contains("A");
            prop_assert_eq!(session.is_enabled("follow"), follow_visible);
            if !follow_visible {
                prop_assert!(session.answers().value("follow").is_none());
            } else {
                session.set_value("follow", "x").expect("follow");
            }
        }
    }
}

#[test]
fn exclusive_then_regular() {
    let mut session = session();
    session.toggle("q", 0, true).expect("E");
    session.toggle("q", 1, true).expect("A");
    let selected: Vec<&String> = session.answers().selected("q").expect("selection").iter().collect();
    assert_eq!(selected, vec!["A"]);
}

#[test]
fn regulars_then_exclusive() {
    let mut session = session();
    session.toggle("q", 1, true).expect("A");
    session.toggle("q", 2, true).expect("B");
    session.toggle("q", 0, true).expect("E");
    let selected: Vec<&String> = session.answers().selected("q").expect("selection").iter().collect();
    assert_eq!(selected, vec!["E"]);
}
