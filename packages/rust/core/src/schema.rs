//! Question schema extraction from form definitions.
//!
//! A definition's `survey` is the ordered list of form items; `choices` holds
//! the named answer lists that select questions link to. The extractor keeps
//! declaration order and drops system items (reserved `_` prefix) and items
//! lacking a type or a name.

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use toolscope_shared::{Choice, FormDefinition, QuestionDescriptor, contract};

/// Turn a form definition into its render-ready question list.
pub fn extract_questions(form: &FormDefinition) -> Vec<QuestionDescriptor> {
    let lists = choice_lists(&form.choices);

    form.survey
        .iter()
        .filter_map(|item| {
            let kind = text(item.get("type"))?;
            let name = text(item.get("name"))?;
            if name.starts_with(contract::RESERVED_FIELD_PREFIX) {
                return None;
            }

            let label = label(item.get("label")).unwrap_or_else(|| name.clone());
            let choices = match linked_list(item, &kind) {
                Some(list) => lists.get(&list).cloned().unwrap_or_else(|| {
                    debug!(question = %name, %list, "choice list not declared");
                    Vec::new()
                }),
                None => Vec::new(),
            };

            Some(QuestionDescriptor {
                name,
                label,
                kind,
                choices,
            })
        })
        .collect()
}

/// Index the choice dictionary by list name.
///
/// Accepts the flat form (`[{list_name, name, label}, ...]`) and the grouped
/// form (`{list_name: [{name, label}, ...]}`).
fn choice_lists(choices: &Value) -> HashMap<String, Vec<Choice>> {
    let mut lists: HashMap<String, Vec<Choice>> = HashMap::new();

    match choices {
        Value::Array(entries) => {
            for entry in entries {
                let Some(list) = text(entry.get("list_name")) else {
                    continue;
                };
                if let Some(choice) = to_choice(entry) {
                    lists.entry(list).or_default().push(choice);
                }
            }
        }
        Value::Object(grouped) => {
            for (list, entries) in grouped {
                let parsed = entries
                    .as_array()
                    .map(|items| items.iter().filter_map(to_choice).collect())
                    .unwrap_or_default();
                lists.insert(list.clone(), parsed);
            }
        }
        _ => {}
    }

    lists
}

fn to_choice(entry: &Value) -> Option<Choice> {
    let name = text(entry.get("name"))?;
    let label = label(entry.get("label")).unwrap_or_else(|| name.clone());
    Some(Choice { name, label })
}

/// The choice list a select question draws from.
///
/// `select_from_list_name` wins; otherwise `select_one <list>` style types
/// carry the list name as their second word.
fn linked_list(item: &Value, kind: &str) -> Option<String> {
    if let Some(list) = text(item.get("select_from_list_name")) {
        return Some(list);
    }
    let mut words = kind.split_whitespace();
    let base = words.next()?;
    if base.starts_with("select_") {
        words.next().map(str::to_string)
    } else {
        None
    }
}

/// Display label: a plain string, or the first non-blank translation.
fn label(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Array(translations) => translations.iter().find_map(|t| text(Some(t))),
        other => text(Some(other)),
    }
}

fn text(value: Option<&Value>) -> Option<String> {
    let s = match value? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(value: Value) -> FormDefinition {
        serde_json::from_value(value).expect("form definition")
    }

    #[test]
    fn reserved_items_are_skipped_in_order() {
        let def = form(serde_json::json!({
            "survey": [
                {"type": "calculate", "name": "_meta"},
                {"type": "text", "name": "q1", "label": "First"},
                {"type": "integer", "name": "q2", "label": ["Second", "Deuxième"]}
            ]
        }));

        let questions = extract_questions(&def);
        let names: Vec<_> = questions.iter().map(|q| q.name.as_str()).collect();
        assert_eq!(names, ["q1", "q2"]);
        assert_eq!(questions[1].label, "Second");
        assert_eq!(questions[1].kind, "integer");
    }

    #[test]
    fn items_without_type_or_name_are_skipped() {
        let def = form(serde_json::json!({
            "survey": [
                {"type": "end_group"},
                {"name": "orphan"},
                {"type": "note", "name": "  "},
                {"type": "text", "name": "kept"}
            ]
        }));

        let questions = extract_questions(&def);
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].name, "kept");
        assert_eq!(questions[0].label, "kept");
    }

    #[test]
    fn flat_choice_lists_resolve() {
        let def = form(serde_json::json!({
            "survey": [
                {"type": "select_one", "name": "usage", "label": ["How often?"],
                 "select_from_list_name": "freq"}
            ],
            "choices": [
                {"list_name": "freq", "name": "daily", "label": ["Daily"]},
                {"list_name": "other", "name": "x", "label": ["X"]},
                {"list_name": "freq", "name": "weekly"}
            ]
        }));

        let questions = extract_questions(&def);
        assert_eq!(
            questions[0].choices,
            vec![
                Choice {
                    name: "daily".into(),
                    label: "Daily".into()
                },
                Choice {
                    name: "weekly".into(),
                    label: "weekly".into()
                },
            ]
        );
    }

    #[test]
    fn grouped_choices_and_type_suffix() {
        let def = form(serde_json::json!({
            "survey": [
                {"type": "select_multiple barriers", "name": "barriers"},
                {"type": "select_one missing_list", "name": "broken"}
            ],
            "choices": {
                "barriers": [
                    {"name": "cost", "label": "Cost"},
                    {"name": "network", "label": "Network"}
                ]
            }
        }));

        let questions = extract_questions(&def);
        let choices: Vec<_> = questions[0].choices.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(choices, ["Cost", "Network"]);
        assert!(questions[1].choices.is_empty());
    }

    #[test]
    fn empty_definition() {
        assert!(extract_questions(&FormDefinition::default()).is_empty());
    }
}
