//! The planning request sent to the oracle.

use std::fmt::Write;

use crate::extractor::InteractiveElement;
use crate::page_kind::PageKind;
use crate::plan::HistoryEntry;
use crate::profile::UserProfile;

/// Where the agent is; rendered as the `Page:` line.
#[derive(Debug, Clone, PartialEq)]
pub struct PageContext {
    pub title: String,
    pub url: String,
    pub kind: PageKind,
}

pub const RULES: &str = r#"CRITICAL RULES:
1. ONLY use the information provided in "User data available" to fill forms.
2. If a required field asks for information NOT present in "User data available" (e.g. Phone Number), DO NOT fill it. DO NOT invent fake data. Skip it or stop.
3. Use the most specific keys from User Data (e.g. use "Work Email" for business forms if available)."#;

const RESPONSE_FORMAT: &str = r#"Return ONLY valid JSON (no markdown):
{
  "actions": [
    {"action": "type", "elementId": 0, "value": "John Doe"},
    {"action": "click", "elementId": 2}
  ],
  "reasoning": "Using Name from user data.",
  "complete": false
}"#;

pub fn build_prompt(
    goal: &str,
    user_data: &UserProfile,
    elements: &[InteractiveElement],
    history: &[HistoryEntry],
    page: &PageContext,
) -> String {
    let user_data = serde_json::to_string_pretty(user_data).unwrap_or_else(|_| "{}".to_string());
    let history = serde_json::to_string(history).unwrap_or_else(|_| "[]".to_string());

    let mut prompt = String::new();
    let _ = writeln!(prompt, "You are controlling a web browser. Task: \"{}\"", goal);
    let _ = writeln!(prompt);
    let _ = writeln!(prompt, "Page: {} - {} ({} page)", page.title, page.url, page.kind);
    let _ = writeln!(prompt);
    let _ = writeln!(prompt, "User data available:");
    let _ = writeln!(prompt, "{}", user_data);
    let _ = writeln!(prompt);
    let _ = writeln!(prompt, "Interactive elements:");
    for element in elements {
        let _ = writeln!(prompt, "{}", element_line(element));
    }
    let _ = writeln!(prompt);
    let _ = writeln!(prompt, "Previous actions: {}", history);
    let _ = writeln!(prompt);
    let _ = writeln!(prompt, "{}", RULES);
    let _ = writeln!(prompt);
    let _ = writeln!(prompt, "{}", RESPONSE_FORMAT);
    prompt
}

fn element_line(element: &InteractiveElement) -> String {
    let mut line = format!(
        "[{}] {} - Label: \"{}\" Placeholder: \"{}\" Value: \"{}\" Type: {}",
        element.id, element.tag, element.label, element.placeholder, element.value, element.kind
    );
    if element.required {
        line.push_str(" (required)");
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::{Locator, LocatorStrategy};
    use crate::plan::{Action, ActionKind, ActionResult};

    fn element(id: u32, label: &str, required: bool) -> InteractiveElement {
        InteractiveElement {
            id,
            tag: "input".to_string(),
            kind: "text".to_string(),
            name: String::new(),
            label: label.to_string(),
            placeholder: String::new(),
            value: String::new(),
            classes: String::new(),
            required,
            locator: Locator { selector: format!("#f{}", id), strategy: LocatorStrategy::Id },
        }
    }

    fn page() -> PageContext {
        PageContext {
            title: "Sign up".to_string(),
            url: "https://example.test/signup".to_string(),
            kind: PageKind::Generic,
        }
    }

    #[test]
    fn test_prompt_contains_rules_and_inventory() {
        let profile: UserProfile = [("Name", "Manu")].into_iter().collect();
        let prompt = build_prompt(
            "fill this form",
            &profile,
            &[element(0, "Name", false), element(1, "Phone", true)],
            &[],
            &page(),
        );
        assert!(prompt.contains("Task: \"fill this form\""));
        assert!(prompt.contains("Page: Sign up - https://example.test/signup (generic page)"));
        assert!(prompt.contains("\"Name\": \"Manu\""));
        assert!(prompt.contains(RULES));
        assert!(prompt.contains("[0] input - Label: \"Name\" Placeholder: \"\" Value: \"\" Type: text\n"));
        assert!(prompt.contains("[1] input - Label: \"Phone\" Placeholder: \"\" Value: \"\" Type: text (required)"));
        assert!(prompt.contains("Previous actions: []"));
    }

    #[test]
    fn test_history_is_serialized_flat() {
        let history = vec![HistoryEntry {
            action: Action::new(ActionKind::Type).on(0).with_value("Manu"),
            result: ActionResult::ok(),
        }];
        let prompt = build_prompt("goal", &UserProfile::new(), &[], &history, &page());
        assert!(prompt.contains(
            r#"Previous actions: [{"action":"type","elementId":0,"value":"Manu","result":{"success":true}}]"#
        ));
    }

    #[test]
    fn test_prompt_is_pure() {
        let profile = UserProfile::new();
        let elements = [element(0, "Email", true)];
        assert_eq!(
            build_prompt("goal", &profile, &elements, &[], &page()),
            build_prompt("goal", &profile, &elements, &[], &page())
        );
    }
}
