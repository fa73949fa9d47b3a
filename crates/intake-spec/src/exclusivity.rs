use std::collections::BTreeSet;

use tracing::trace;

use crate::spec::ChoiceOption;

/// Side effects of a single toggle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToggleOutcome {
    /// Sibling options deselected by the toggle, in option order. Their detail
    /// fields must be cleared by the caller.
    pub cleared: Vec<usize>,
}

/// Applies one checkbox toggle to `selected` and enforces exclusivity:
/// selecting an exclusive option clears every sibling, selecting a regular
/// option clears every exclusive sibling, deselecting never cascades.
pub fn apply_toggle(
    options: &[ChoiceOption],
    selected: &mut BTreeSet<String>,
    index: usize,
    now_selected: bool,
) -> ToggleOutcome {
    let Some(toggled) = options.get(index) else {
        return ToggleOutcome::default();
    };
    let label = toggled.label();

    if !now_selected {
        selected.remove(label);
        return ToggleOutcome::default();
    }

    selected.insert(label.to_string());
    let exclusive = toggled.is_exclusive();
    let mut cleared = Vec::new();
    for (idx, option) in options.iter().enumerate() {
        if idx == index || !selected.contains(option.label()) {
            continue;
        }
        if exclusive || option.is_exclusive() {
            selected.remove(option.label());
            cleared.push(idx);
        }
    }
    if exclusive {
        selected.retain(|entry| entry == label);
    }

    trace!(option = %label, exclusive, cleared = cleared.len(), "toggle applied");
    ToggleOutcome { cleared }
}

/// At most one exclusive option is selected, and never alongside another
/// option.
pub fn exclusivity_holds(options: &[ChoiceOption], selected: &BTreeSet<String>) -> bool {
    let exclusive_selected = options
        .iter()
        .filter(|option| option.is_exclusive() && selected.contains(option.label()))
        .count();
    match exclusive_selected {
        0 => true,
        1 => selected.len() == 1,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::DetailedOption;

    fn options() -> Vec<ChoiceOption> {
        vec![
            ChoiceOption::from("恶心"),
            ChoiceOption::from("头痛"),
            ChoiceOption::Detailed(DetailedOption {
                label: "无伴随症状".into(),
                requires_detail: false,
                exclusive: Some(true),
            }),
        ]
    }

    fn labels(selected: &BTreeSet<String>) -> Vec<&str> {
        selected.iter().map(String::as_str).collect()
    }

    #[test]
    fn exclusive_then_regular_keeps_regular() {
        let options = options();
        let mut selected = BTreeSet::new();
        apply_toggle(&options, &mut selected, 2, true);
        let outcome = apply_toggle(&options, &mut selected, 0, true);
        assert_eq!(labels(&selected), vec!["恶心"]);
        assert_eq!(outcome.cleared, vec![2]);
    }

    #[test]
    fn regular_options_then_exclusive_keeps_exclusive() {
        let options = options();
        let mut selected = BTreeSet::new();
        apply_toggle(&options, &mut selected, 0, true);
        apply_toggle(&options, &mut selected, 1, true);
        let outcome = apply_toggle(&options, &mut selected, 2, true);
        assert_eq!(labels(&selected), vec!["无伴随症状"]);
        assert_eq!(outcome.cleared, vec![0, 1]);
    }

    #[test]
    fn deselect_does_not_cascade() {
        let options = options();
        let mut selected = BTreeSet::new();
        apply_toggle(&options, &mut selected, 0, true);
        apply_toggle(&options, &mut selected, 1, true);
        let outcome = apply_toggle(&options, &mut selected, 0, false);
        assert_eq!(labels(&selected), vec!["头痛"]);
        assert!(outcome.cleared.is_empty());
    }

    #[test]
    fn holds_detects_conflicts() {
        let options = options();
        let conflict = BTreeSet::from(["恶心".to_string(), "无伴随症状".to_string()]);
        assert!(!exclusivity_holds(&options, &conflict));
        let fine = BTreeSet::from(["恶心".to_string(), "头痛".to_string()]);
        assert!(exclusivity_holds(&options, &fine));
    }
}
