//! Page boundary: the operations the agent needs from a live document.
//!
//! The agent never talks to `web_sys` directly. Everything it senses or
//! actuates goes through [`Document`], which the browser backend
//! (`web_dom::WebDocument`) and the in-memory page used by native tests
//! (`memory_dom::MemoryDocument`) both implement.

use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomError {
    #[error("ElementNotFound: No element found for selector '{selector}'")]
    ElementNotFound { selector: String },
    #[error("InvalidSelector: Invalid selector '{selector}'. Details: {error}")]
    InvalidSelector { selector: String, error: String },
    #[error("ElementTypeError: Element '{element}' is not of expected type '{expected_type}'")]
    ElementTypeError { element: String, expected_type: String },
    #[error("JsError: {message}")]
    JsError { message: String },
}

#[cfg(target_arch = "wasm32")]
impl From<wasm_bindgen::JsValue> for DomError {
    fn from(value: wasm_bindgen::JsValue) -> Self {
        DomError::JsError {
            message: value
                .as_string()
                .unwrap_or_else(|| format!("{:?}", value)),
        }
    }
}

#[cfg(target_arch = "wasm32")]
impl From<DomError> for wasm_bindgen::JsValue {
    fn from(err: DomError) -> Self {
        wasm_bindgen::JsValue::from_str(&err.to_string())
    }
}

/// Synthetic events raised so reactive frameworks observe programmatic changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyntheticEvent {
    Input,
    Change,
    MouseDown,
    MouseUp,
}

impl SyntheticEvent {
    pub fn name(self) -> &'static str {
        match self {
            SyntheticEvent::Input => "input",
            SyntheticEvent::Change => "change",
            SyntheticEvent::MouseDown => "mousedown",
            SyntheticEvent::MouseUp => "mouseup",
        }
    }

    pub fn is_mouse(self) -> bool {
        matches!(self, SyntheticEvent::MouseDown | SyntheticEvent::MouseUp)
    }
}

impl fmt::Display for SyntheticEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Computed rendering facts used by the visibility predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderState {
    /// False when the element generates no layout box (no offset parent).
    pub has_layout_box: bool,
    pub display: String,
    pub visibility: String,
    pub opacity: f64,
}

impl Default for RenderState {
    fn default() -> Self {
        RenderState {
            has_layout_box: true,
            display: "inline".to_string(),
            visibility: "visible".to_string(),
            opacity: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    pub value: String,
    pub text: String,
}

/// A live, mutable page.
///
/// Node handles are cheap clones that stay valid only as long as the page
/// keeps the node attached; callers re-query every iteration instead of
/// holding on to them.
pub trait Document {
    type Node: Clone + PartialEq + fmt::Debug;

    fn title(&self) -> String;
    fn url(&self) -> String;

    fn query_selector_all(&self, selector: &str) -> Result<Vec<Self::Node>, DomError>;

    fn query_selector(&self, selector: &str) -> Result<Option<Self::Node>, DomError> {
        Ok(self.query_selector_all(selector)?.into_iter().next())
    }

    /// Lowercase tag name.
    fn tag_name(&self, node: &Self::Node) -> String;
    fn attribute(&self, node: &Self::Node, name: &str) -> Option<String>;

    fn class_list(&self, node: &Self::Node) -> Vec<String> {
        self.attribute(node, "class")
            .map(|classes| classes.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// The control's `type` property (`text`, `submit`, `select-one`, ...), if it has one.
    fn control_type(&self, node: &Self::Node) -> Option<String>;
    /// Current value of a form control; `None` for elements without one.
    fn value(&self, node: &Self::Node) -> Option<String>;
    fn inner_text(&self, node: &Self::Node) -> String;
    /// Text of `container` with the first descendant sharing `excluded`'s tag removed.
    fn text_excluding(&self, container: &Self::Node, excluded: &Self::Node) -> String;

    fn parent(&self, node: &Self::Node) -> Option<Self::Node>;
    fn children(&self, node: &Self::Node) -> Vec<Self::Node>;
    fn previous_element_sibling(&self, node: &Self::Node) -> Option<Self::Node>;

    fn render_state(&self, node: &Self::Node) -> RenderState;

    /// False once `node` has been detached from the page.
    fn is_connected(&self, node: &Self::Node) -> bool;

    fn is_body(&self, node: &Self::Node) -> bool {
        self.tag_name(node) == "body"
    }

    fn options(&self, node: &Self::Node) -> Result<Vec<SelectOption>, DomError>;

    fn focus(&self, node: &Self::Node) -> Result<(), DomError>;
    fn blur(&self, node: &Self::Node) -> Result<(), DomError>;
    fn set_value(&self, node: &Self::Node, value: &str) -> Result<(), DomError>;
    fn dispatch(&self, node: &Self::Node, event: SyntheticEvent) -> Result<(), DomError>;
    fn scroll_into_view(&self, node: &Self::Node) -> Result<(), DomError>;
    fn click(&self, node: &Self::Node) -> Result<(), DomError>;
}

impl<D: Document + ?Sized> Document for &D {
    type Node = D::Node;

    fn title(&self) -> String {
        (**self).title()
    }
    fn url(&self) -> String {
        (**self).url()
    }
    fn query_selector_all(&self, selector: &str) -> Result<Vec<Self::Node>, DomError> {
        (**self).query_selector_all(selector)
    }
    fn query_selector(&self, selector: &str) -> Result<Option<Self::Node>, DomError> {
        (**self).query_selector(selector)
    }
    fn tag_name(&self, node: &Self::Node) -> String {
        (**self).tag_name(node)
    }
    fn attribute(&self, node: &Self::Node, name: &str) -> Option<String> {
        (**self).attribute(node, name)
    }
    fn class_list(&self, node: &Self::Node) -> Vec<String> {
        (**self).class_list(node)
    }
    fn control_type(&self, node: &Self::Node) -> Option<String> {
        (**self).control_type(node)
    }
    fn value(&self, node: &Self::Node) -> Option<String> {
        (**self).value(node)
    }
    fn inner_text(&self, node: &Self::Node) -> String {
        (**self).inner_text(node)
    }
    fn text_excluding(&self, container: &Self::Node, excluded: &Self::Node) -> String {
        (**self).text_excluding(container, excluded)
    }
    fn parent(&self, node: &Self::Node) -> Option<Self::Node> {
        (**self).parent(node)
    }
    fn children(&self, node: &Self::Node) -> Vec<Self::Node> {
        (**self).children(node)
    }
    fn previous_element_sibling(&self, node: &Self::Node) -> Option<Self::Node> {
        (**self).previous_element_sibling(node)
    }
    fn render_state(&self, node: &Self::Node) -> RenderState {
        (**self).render_state(node)
    }
    fn is_connected(&self, node: &Self::Node) -> bool {
        (**self).is_connected(node)
    }
    fn is_body(&self, node: &Self::Node) -> bool {
        (**self).is_body(node)
    }
    fn options(&self, node: &Self::Node) -> Result<Vec<SelectOption>, DomError> {
        (**self).options(node)
    }
    fn focus(&self, node: &Self::Node) -> Result<(), DomError> {
        (**self).focus(node)
    }
    fn blur(&self, node: &Self::Node) -> Result<(), DomError> {
        (**self).blur(node)
    }
    fn set_value(&self, node: &Self::Node, value: &str) -> Result<(), DomError> {
        (**self).set_value(node, value)
    }
    fn dispatch(&self, node: &Self::Node, event: SyntheticEvent) -> Result<(), DomError> {
        (**self).dispatch(node, event)
    }
    fn scroll_into_view(&self, node: &Self::Node) -> Result<(), DomError> {
        (**self).scroll_into_view(node)
    }
    fn click(&self, node: &Self::Node) -> Result<(), DomError> {
        (**self).click(node)
    }
}

/// True when `node` is rendered: it has a layout box (the body is exempt)
/// and is not hidden by `display`, `visibility` or `opacity`.
pub fn is_visible<D: Document + ?Sized>(document: &D, node: &D::Node) -> bool {
    let state = document.render_state(node);
    if !state.has_layout_box && !document.is_body(node) {
        return false;
    }
    !(state.display == "none" || state.visibility == "hidden" || state.opacity == 0.0)
}

/// Nearest ancestor (excluding `node` itself) with the given lowercase tag.
pub fn closest_ancestor<D: Document + ?Sized>(
    document: &D,
    node: &D::Node,
    tag: &str,
) -> Option<D::Node> {
    let mut current = document.parent(node);
    while let Some(candidate) = current {
        if document.tag_name(&candidate) == tag {
            return Some(candidate);
        }
        current = document.parent(&candidate);
    }
    None
}
