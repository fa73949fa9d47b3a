use std::collections::{BTreeMap, VecDeque};

use tracing::{debug, trace};

use crate::answers::AnswerSnapshot;
use crate::model::{FormModel, SpecError};
use crate::spec::{QuestionSpec, QuestionnaireSpec};

pub type VisibilityMap = BTreeMap<String, bool>;

/// A visibility transition produced by [`recompute`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibilityChange {
    pub question_id: String,
    pub visible: bool,
    /// The question held an answer or detail that was dropped on hide.
    pub cleared: bool,
}

/// Question → questions whose `visibleIf` reads it, plus an evaluation order
/// in which every question follows the questions it depends on.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    dependents: BTreeMap<String, Vec<String>>,
    order: Vec<String>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

impl DependencyGraph {
    pub fn build(spec: &QuestionnaireSpec) -> Result<Self, SpecError> {
        let mut requires: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        let mut dependents: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for question in spec.questions() {
            let entry = requires.entry(question.id.as_str()).or_default();
            if let Some(visible_if) = &question.visible_if {
                for referenced in visible_if.referenced_ids() {
                    if entry.contains(&referenced) {
                        continue;
                    }
                    entry.push(referenced);
                    dependents
                        .entry(referenced.to_string())
                        .or_default()
                        .push(question.id.clone());
                }
            }
        }

        let mut marks = BTreeMap::new();
        let mut order = Vec::with_capacity(requires.len());
        let mut stack = Vec::new();
        for question in spec.questions() {
            visit(
                question.id.as_str(),
                &requires,
                &mut marks,
                &mut stack,
                &mut order,
            )?;
        }

        Ok(Self { dependents, order })
    }

    /// Questions whose visibility must be re-evaluated when `id` changes.
    pub fn dependents(&self, id: &str) -> &[String] {
        self.dependents.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// A question referenced by at least one visibility condition.
    pub fn is_watched(&self, id: &str) -> bool {
        self.dependents.contains_key(id)
    }

    pub fn watched_count(&self) -> usize {
        self.dependents.len()
    }

    pub fn order(&self) -> &[String] {
        &self.order
    }
}

fn visit<'a>(
    id: &'a str,
    requires: &BTreeMap<&'a str, Vec<&'a str>>,
    marks: &mut BTreeMap<&'a str, Mark>,
    stack: &mut Vec<&'a str>,
    order: &mut Vec<String>,
) -> Result<(), SpecError> {
    match marks.get(id) {
        Some(Mark::Done) => return Ok(()),
        Some(Mark::Visiting) => {
            let start = stack.iter().position(|entry| *entry == id).unwrap_or(0);
            let mut cycle: Vec<String> = stack[start..].iter().map(|s| s.to_string()).collect();
            cycle.push(id.to_string());
            return Err(SpecError::Cycle(cycle));
        }
        None => {}
    }

    marks.insert(id, Mark::Visiting);
    stack.push(id);
    for &prerequisite in requires.get(id).into_iter().flatten() {
        visit(prerequisite, requires, marks, stack, order)?;
    }
    stack.pop();
    marks.insert(id, Mark::Done);
    order.push(id.to_string());
    Ok(())
}

/// Evaluates a question's own predicate. Questions without `visibleIf` are
/// always visible.
pub fn is_visible(question: &QuestionSpec, answers: &AnswerSnapshot) -> bool {
    question
        .visible_if
        .as_ref()
        .is_none_or(|predicate| predicate.evaluate(answers))
}

/// Derives the effective snapshot: questions are evaluated in dependency order
/// and hidden questions lose their answers before anything downstream reads
/// them.
pub fn settle(model: &FormModel, answers: &AnswerSnapshot) -> (AnswerSnapshot, VisibilityMap) {
    let mut effective = answers.clone();
    let mut map = VisibilityMap::new();

    for id in model.graph().order() {
        let Some(question) = model.question(id) else {
            continue;
        };
        let visible = is_visible(question, &effective);
        if !visible && effective.clear_question(id) {
            trace!(question = %id, "dropped answer of hidden question");
        }
        map.insert(id.clone(), visible);
    }

    (effective, map)
}

pub fn resolve_visibility(model: &FormModel, answers: &AnswerSnapshot) -> VisibilityMap {
    settle(model, answers).1
}

/// Re-evaluates everything downstream of `changed_id`, clearing answers of
/// questions that become hidden and following the cascade those clears cause.
pub fn recompute(
    model: &FormModel,
    answers: &mut AnswerSnapshot,
    visibility: &mut VisibilityMap,
    changed_id: &str,
) -> Vec<VisibilityChange> {
    let mut changes = Vec::new();
    let mut queue: VecDeque<&str> = model
        .graph()
        .dependents(changed_id)
        .iter()
        .map(String::as_str)
        .collect();

    while let Some(id) = queue.pop_front() {
        let Some(question) = model.question(id) else {
            continue;
        };
        let visible = is_visible(question, answers);
        let previous = visibility.insert(id.to_string(), visible).unwrap_or(true);
        if previous == visible {
            continue;
        }

        let cleared = !visible && answers.clear_question(id);
        debug!(question = %id, visible, cleared, trigger = %changed_id, "visibility changed");
        if cleared {
            queue.extend(model.graph().dependents(id).iter().map(String::as_str));
        }
        changes.push(VisibilityChange {
            question_id: id.to_string(),
            visible,
            cleared,
        });
    }

    changes
}
