//! Structural locators that re-find an element without its session id.
//!
//! Tiers, first satisfied wins: `#id`, `tag[name="…"]`, `tag.classes` when
//! it matches exactly one node, and finally `tag.classes:nth-of-type(n)`
//! scoped to the immediate parent. The last tier never checks that the
//! parent path itself is unique, so it is flagged ambiguous.

use std::fmt;

use serde::Serialize;

use crate::dom_utils::Document;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LocatorStrategy {
    Id,
    Name,
    UniqueClasses,
    Positional,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Locator {
    pub selector: String,
    pub strategy: LocatorStrategy,
}

impl Locator {
    /// Positional locators may match a different node on repeated layouts.
    pub fn is_ambiguous(&self) -> bool {
        self.strategy == LocatorStrategy::Positional
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.selector)
    }
}

pub fn locate<D: Document + ?Sized>(document: &D, node: &D::Node) -> Locator {
    let tag = document.tag_name(node);

    if let Some(id) = document.attribute(node, "id").filter(|id| !id.is_empty()) {
        let selector = if is_css_identifier(&id) {
            format!("#{}", id)
        } else {
            format!("[id=\"{}\"]", escape_attribute_value(&id))
        };
        return Locator { selector, strategy: LocatorStrategy::Id };
    }

    if let Some(name) = document.attribute(node, "name").filter(|name| !name.is_empty()) {
        return Locator {
            selector: format!("{}[name=\"{}\"]", tag, escape_attribute_value(&name)),
            strategy: LocatorStrategy::Name,
        };
    }

    let mut selector = tag.clone();
    for class in document.class_list(node) {
        if is_css_identifier(&class) {
            selector.push('.');
            selector.push_str(&class);
        }
    }

    let unique = document
        .query_selector_all(&selector)
        .map(|matches| matches.len() == 1)
        .unwrap_or(false);
    if unique {
        return Locator { selector, strategy: LocatorStrategy::UniqueClasses };
    }

    if let Some(parent) = document.parent(node) {
        let position = document
            .children(&parent)
            .iter()
            .filter(|sibling| document.tag_name(sibling) == tag)
            .position(|sibling| sibling == node)
            .map_or(1, |index| index + 1);
        selector.push_str(&format!(":nth-of-type({})", position));
    }

    Locator { selector, strategy: LocatorStrategy::Positional }
}

fn is_css_identifier(value: &str) -> bool {
    let mut chars = value.chars().peekable();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        Some('-') => match chars.peek() {
            Some(second) if second.is_ascii_alphabetic() || *second == '_' => {}
            _ => return false,
        },
        _ => return false,
    }
    chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
}

pub(crate) fn escape_attribute_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_dom::{ElementSpec, MemoryDocument};

    #[test]
    fn test_id_wins_over_everything() {
        let doc = MemoryDocument::new("t", "u");
        let input = doc.append(
            doc.body(),
            ElementSpec::new("input").attr("id", "email").attr("name", "mail").attr("class", "field"),
        );
        let locator = locate(&doc, &input);
        assert_eq!(locator.selector, "#email");
        assert_eq!(locator.strategy, LocatorStrategy::Id);
        assert!(!locator.is_ambiguous());
    }

    #[test]
    fn test_unusual_id_uses_attribute_form() {
        let doc = MemoryDocument::new("t", "u");
        let input = doc.append(doc.body(), ElementSpec::new("input").attr("id", "2fa:code"));
        let locator = locate(&doc, &input);
        assert_eq!(locator.selector, "[id=\"2fa:code\"]");
        assert_eq!(doc.query_selector_all(&locator.selector).unwrap(), vec![input]);
    }

    #[test]
    fn test_name_combines_with_tag() {
        let doc = MemoryDocument::new("t", "u");
        let input = doc.append(doc.body(), ElementSpec::new("input").attr("name", "first_name"));
        let locator = locate(&doc, &input);
        assert_eq!(locator.selector, "input[name=\"first_name\"]");
        assert_eq!(locator.strategy, LocatorStrategy::Name);
    }

    #[test]
    fn test_unique_class_combination() {
        let doc = MemoryDocument::new("t", "u");
        doc.append(doc.body(), ElementSpec::new("button").attr("class", "btn"));
        let primary = doc.append(doc.body(), ElementSpec::new("button").attr("class", "btn primary"));
        let locator = locate(&doc, &primary);
        assert_eq!(locator.selector, "button.btn.primary");
        assert_eq!(locator.strategy, LocatorStrategy::UniqueClasses);
    }

    #[test]
    fn test_positional_fallback_is_ambiguous() {
        let doc = MemoryDocument::new("t", "u");
        let list = doc.append(doc.body(), ElementSpec::new("div"));
        doc.append(list, ElementSpec::new("button").attr("class", "item"));
        doc.append(list, ElementSpec::new("span"));
        let second = doc.append(list, ElementSpec::new("button").attr("class", "item"));
        let locator = locate(&doc, &second);
        assert_eq!(locator.selector, "button.item:nth-of-type(2)");
        assert!(locator.is_ambiguous());
        assert_eq!(doc.query_selector_all(&locator.selector).unwrap(), vec![second]);
    }

    #[test]
    fn test_unsafe_class_names_are_skipped() {
        let doc = MemoryDocument::new("t", "u");
        let link = doc.append(
            doc.body(),
            ElementSpec::new("a").attr("href", "/x").attr("class", "nav md:w-1/2"),
        );
        assert_eq!(locate(&doc, &link).selector, "a.nav");
    }

    #[test]
    fn test_locator_is_deterministic() {
        let doc = MemoryDocument::new("t", "u");
        let row = doc.append(doc.body(), ElementSpec::new("div"));
        let first = doc.append(row, ElementSpec::new("input"));
        doc.append(row, ElementSpec::new("input"));
        assert_eq!(locate(&doc, &first), locate(&doc, &first));
    }
}
