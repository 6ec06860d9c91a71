//! Snapshot of the page's visible interactive controls.
//!
//! Every call to [`extract`] starts a fresh [`ExtractionPass`]: session ids
//! are reassigned from zero and the id → node side-table of the previous
//! pass is dropped with it. Nothing is written into the page.

use log::{debug, warn};
use serde::Serialize;

use crate::dom_utils::{closest_ancestor, is_visible, Document};
use crate::locator::{escape_attribute_value, locate, Locator};

pub const INTERACTIVE_SELECTOR: &str =
    "input, textarea, select, button, a[href], [role=\"button\"]";

const SIBLING_LABEL_TAGS: [&str; 3] = ["label", "span", "div"];
const SIBLING_LABEL_MAX_CHARS: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InteractiveElement {
    pub id: u32,
    pub tag: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub label: String,
    pub placeholder: String,
    /// Current value, truncated.
    pub value: String,
    /// Class names joined with `.`.
    pub classes: String,
    pub required: bool,
    pub locator: Locator,
}

/// One extraction pass: the elements handed to the planner plus the
/// handles the executor resolves their ids against.
#[derive(Debug, Clone)]
pub struct ExtractionPass<N> {
    elements: Vec<InteractiveElement>,
    handles: Vec<N>,
}

impl<N> Default for ExtractionPass<N> {
    fn default() -> Self {
        ExtractionPass { elements: Vec::new(), handles: Vec::new() }
    }
}

impl<N> ExtractionPass<N> {
    pub fn elements(&self) -> &[InteractiveElement] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn element(&self, id: u32) -> Option<&InteractiveElement> {
        self.elements.get(id as usize)
    }

    pub fn handle(&self, id: u32) -> Option<&N> {
        self.handles.get(id as usize)
    }

    /// The element whose locator is exactly `selector`, with its handle.
    pub fn find_by_locator(&self, selector: &str) -> Option<(&InteractiveElement, &N)> {
        let selector = selector.trim();
        self.elements
            .iter()
            .zip(self.handles.iter())
            .find(|(element, _)| element.locator.selector == selector)
    }
}

/// Scans `document` for visible interactive controls, in document order.
pub fn extract<D: Document + ?Sized>(document: &D, snippet_len: usize) -> ExtractionPass<D::Node> {
    let candidates = match document.query_selector_all(INTERACTIVE_SELECTOR) {
        Ok(candidates) => candidates,
        Err(err) => {
            warn!("Element scan failed: {}", err);
            return ExtractionPass::default();
        }
    };

    let mut pass = ExtractionPass::default();
    for node in candidates {
        if !is_visible(document, &node) {
            continue;
        }
        let id = pass.elements.len() as u32;
        pass.elements.push(describe(document, &node, id, snippet_len));
        pass.handles.push(node);
    }
    debug!("Extracted {} interactive elements", pass.len());
    pass
}

fn describe<D: Document + ?Sized>(
    document: &D,
    node: &D::Node,
    id: u32,
    snippet_len: usize,
) -> InteractiveElement {
    let value = document
        .value(node)
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| document.inner_text(node).trim().to_string());
    let kind = document
        .control_type(node)
        .or_else(|| document.attribute(node, "role"))
        .filter(|kind| !kind.is_empty())
        .unwrap_or_else(|| "unknown".to_string());
    InteractiveElement {
        id,
        tag: document.tag_name(node),
        kind,
        name: document.attribute(node, "name").unwrap_or_default(),
        label: find_label(document, node),
        placeholder: document.attribute(node, "placeholder").unwrap_or_default(),
        value: value.chars().take(snippet_len).collect(),
        classes: document.class_list(node).join("."),
        required: document.attribute(node, "required").is_some(),
        locator: locate(document, node),
    }
}

/// Human-readable label, first non-empty strategy wins:
/// `label[for]`, enclosing label, `aria-label`, a short preceding
/// label/span/div sibling, then the control's own text for buttons and links.
pub fn find_label<D: Document + ?Sized>(document: &D, node: &D::Node) -> String {
    if let Some(id) = document.attribute(node, "id").filter(|id| !id.is_empty()) {
        let selector = format!("label[for=\"{}\"]", escape_attribute_value(&id));
        if let Ok(Some(label)) = document.query_selector(&selector) {
            let text = document.inner_text(&label).trim().to_string();
            if !text.is_empty() {
                return text;
            }
        }
    }

    if let Some(label) = closest_ancestor(document, node, "label") {
        let text = document.text_excluding(&label, node).trim().to_string();
        if !text.is_empty() {
            return text;
        }
    }

    if let Some(aria) = document.attribute(node, "aria-label") {
        let aria = aria.trim();
        if !aria.is_empty() {
            return aria.to_string();
        }
    }

    let mut sibling = document.previous_element_sibling(node);
    while let Some(candidate) = sibling {
        if SIBLING_LABEL_TAGS.contains(&document.tag_name(&candidate).as_str()) {
            let text = document.inner_text(&candidate);
            if text.chars().count() < SIBLING_LABEL_MAX_CHARS && !text.trim().is_empty() {
                return text.trim().to_string();
            }
            break;
        }
        sibling = document.previous_element_sibling(&candidate);
    }

    let tag = document.tag_name(node);
    let button_like = tag == "button"
        || tag == "a"
        || document.attribute(node, "role").as_deref() == Some("button");
    if button_like {
        let text = document.inner_text(node).trim().to_string();
        if !text.is_empty() {
            return text;
        }
        if let Some(title) = document.attribute(node, "title") {
            return title.trim().to_string();
        }
    }

    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_dom::{ElementSpec, MemoryDocument};

    fn label_of(doc: &MemoryDocument, id: &str) -> String {
        find_label(doc, &doc.element_by_id(id).unwrap())
    }

    #[test]
    fn test_descriptor_falls_back_to_role_and_text() {
        let doc = MemoryDocument::new("Menu", "https://example.test/");
        doc.append(doc.body(), ElementSpec::new("div").attr("role", "button").text(" Open menu "));
        doc.append(doc.body(), ElementSpec::new("p").child(ElementSpec::new("a").attr("href", "/help").text("Help")));
        doc.append(doc.body(), ElementSpec::new("p").child(ElementSpec::new("button").text("Send")));
        doc.append(doc.body(), ElementSpec::new("input").attr("id", "empty"));

        let pass = extract(&doc, 50);
        let described: Vec<(&str, &str)> = pass
            .elements()
            .iter()
            .map(|element| (element.kind.as_str(), element.value.as_str()))
            .collect();
        assert_eq!(
            described,
            vec![("button", "Open menu"), ("unknown", "Help"), ("submit", "Send"), ("text", "")]
        );
    }

    #[test]
    fn test_only_visible_controls_are_extracted() {
        let doc = MemoryDocument::new("Form", "https://example.test/");
        doc.append(doc.body(), ElementSpec::new("input").attr("id", "shown"));
        doc.append(doc.body(), ElementSpec::new("input").attr("type", "hidden").attr("name", "csrf"));
        doc.append(doc.body(), ElementSpec::new("button").attr("style", "opacity: 0").text("Ghost"));
        doc.append(
            doc.body(),
            ElementSpec::new("div")
                .attr("style", "display:none")
                .child(ElementSpec::new("textarea").attr("id", "nested")),
        );
        doc.append(doc.body(), ElementSpec::new("a").text("no href"));
        doc.append(doc.body(), ElementSpec::new("div").attr("role", "button").text("Go"));

        let pass = extract(&doc, 50);
        let tags: Vec<&str> = pass.elements().iter().map(|element| element.tag.as_str()).collect();
        assert_eq!(tags, vec!["input", "div"]);

        for node in doc.query_selector_all(INTERACTIVE_SELECTOR).unwrap() {
            let kept = pass.find_by_locator(&locate(&doc, &node).selector).is_some();
            assert_eq!(kept, is_visible(&doc, &node));
        }
    }

    #[test]
    fn test_ids_are_sequential_and_handles_match() {
        let doc = MemoryDocument::new("Form", "https://example.test/");
        let first = doc.append(doc.body(), ElementSpec::new("input").attr("name", "a"));
        doc.append(doc.body(), ElementSpec::new("input").attr("hidden", ""));
        let second = doc.append(doc.body(), ElementSpec::new("select").attr("name", "b"));

        let pass = extract(&doc, 50);
        assert_eq!(pass.len(), 2);
        assert_eq!(pass.element(0).unwrap().id, 0);
        assert_eq!(pass.element(1).unwrap().id, 1);
        assert_eq!(pass.handle(0), Some(&first));
        assert_eq!(pass.handle(1), Some(&second));
        assert!(pass.handle(2).is_none());
    }

    #[test]
    fn test_descriptor_fields() {
        let doc = MemoryDocument::new("Form", "https://example.test/");
        doc.append(
            doc.body(),
            ElementSpec::new("input")
                .attr("id", "email")
                .attr("type", "email")
                .attr("name", "email")
                .attr("placeholder", "you@example.com")
                .attr("class", "field wide")
                .attr("required", "")
                .attr("value", "0123456789abcdef"),
        );
        let pass = extract(&doc, 10);
        let element = pass.element(0).unwrap();
        assert_eq!(element.kind, "email");
        assert_eq!(element.name, "email");
        assert_eq!(element.placeholder, "you@example.com");
        assert_eq!(element.value, "0123456789");
        assert_eq!(element.classes, "field.wide");
        assert!(element.required);
        assert_eq!(element.locator.selector, "#email");
    }

    #[test]
    fn test_label_strategies_in_order() {
        let doc = MemoryDocument::new("Form", "https://example.test/");
        doc.append(doc.body(), ElementSpec::new("label").attr("for", "first").text("First name"));
        doc.append(doc.body(), ElementSpec::new("input").attr("id", "first").attr("aria-label", "ignored"));
        doc.append(
            doc.body(),
            ElementSpec::new("label")
                .text(" Phone ")
                .child(ElementSpec::new("input").attr("id", "phone")),
        );
        doc.append(doc.body(), ElementSpec::new("input").attr("id", "city").attr("aria-label", "City"));
        doc.append(
            doc.body(),
            ElementSpec::new("div")
                .child(ElementSpec::new("span").text("Zip code"))
                .child(ElementSpec::new("br"))
                .child(ElementSpec::new("input").attr("id", "zip")),
        );
        doc.append(
            doc.body(),
            ElementSpec::new("p").child(ElementSpec::new("button").attr("id", "send").text(" Send ")),
        );
        doc.append(
            doc.body(),
            ElementSpec::new("p").child(ElementSpec::new("a").attr("id", "icon").attr("href", "/").attr("title", "Home")),
        );

        assert_eq!(label_of(&doc, "first"), "First name");
        assert_eq!(label_of(&doc, "phone"), "Phone");
        assert_eq!(label_of(&doc, "city"), "City");
        assert_eq!(label_of(&doc, "zip"), "Zip code");
        assert_eq!(label_of(&doc, "send"), "Send");
        assert_eq!(label_of(&doc, "icon"), "Home");
    }

    #[test]
    fn test_long_sibling_text_is_not_a_label() {
        let doc = MemoryDocument::new("Form", "https://example.test/");
        doc.append(
            doc.body(),
            ElementSpec::new("div")
                .child(ElementSpec::new("div").text(&"x".repeat(80)))
                .child(ElementSpec::new("input").attr("id", "notes")),
        );
        assert_eq!(label_of(&doc, "notes"), "");
    }

    #[test]
    fn test_empty_page_yields_empty_pass() {
        let doc = MemoryDocument::new("Blank", "about:blank");
        doc.append(doc.body(), ElementSpec::new("p").text("Nothing to do here"));
        assert!(extract(&doc, 50).is_empty());
    }
}
