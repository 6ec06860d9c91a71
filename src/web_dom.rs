//! [`Document`] over the live browser DOM.

use wasm_bindgen::JsCast;
use web_sys::{
    Element, Event, EventInit, HtmlButtonElement, HtmlElement, HtmlInputElement, HtmlOptionElement,
    HtmlSelectElement, HtmlTextAreaElement, MouseEvent, MouseEventInit, ScrollBehavior,
    ScrollIntoViewOptions, ScrollLogicalPosition, Window,
};

use crate::dom_utils::{Document, DomError, RenderState, SelectOption, SyntheticEvent};

#[derive(Debug, Clone)]
pub struct WebDocument {
    window: Window,
    document: web_sys::Document,
}

impl WebDocument {
    /// The page this module was loaded into.
    pub fn from_window() -> Result<Self, DomError> {
        let window = web_sys::window().ok_or_else(|| DomError::JsError {
            message: "Failed to get window object".to_string(),
        })?;
        let document = window.document().ok_or_else(|| DomError::JsError {
            message: "Failed to get document object".to_string(),
        })?;
        Ok(WebDocument { window, document })
    }

    pub fn document(&self) -> &web_sys::Document {
        &self.document
    }

    fn html(element: &Element) -> Result<&HtmlElement, DomError> {
        element.dyn_ref::<HtmlElement>().ok_or_else(|| DomError::ElementTypeError {
            element: element.tag_name().to_ascii_lowercase(),
            expected_type: "HtmlElement".to_string(),
        })
    }
}

fn collect_elements(list: &web_sys::NodeList) -> Vec<Element> {
    (0..list.length())
        .filter_map(|index| list.item(index))
        .filter_map(|node| node.dyn_into::<Element>().ok())
        .collect()
}

impl Document for WebDocument {
    type Node = Element;

    fn title(&self) -> String {
        self.document.title()
    }

    fn url(&self) -> String {
        self.document
            .location()
            .and_then(|location| location.href().ok())
            .unwrap_or_default()
    }

    fn query_selector_all(&self, selector: &str) -> Result<Vec<Element>, DomError> {
        let list = self
            .document
            .query_selector_all(selector)
            .map_err(|e| DomError::InvalidSelector {
                selector: selector.to_string(),
                error: e.as_string().unwrap_or_else(|| format!("{:?}", e)),
            })?;
        Ok(collect_elements(&list))
    }

    fn query_selector(&self, selector: &str) -> Result<Option<Element>, DomError> {
        self.document
            .query_selector(selector)
            .map_err(|e| DomError::InvalidSelector {
                selector: selector.to_string(),
                error: e.as_string().unwrap_or_else(|| format!("{:?}", e)),
            })
    }

    fn tag_name(&self, node: &Element) -> String {
        node.tag_name().to_ascii_lowercase()
    }

    fn attribute(&self, node: &Element, name: &str) -> Option<String> {
        node.get_attribute(name)
    }

    fn control_type(&self, node: &Element) -> Option<String> {
        if let Some(input) = node.dyn_ref::<HtmlInputElement>() {
            Some(input.type_())
        } else if let Some(button) = node.dyn_ref::<HtmlButtonElement>() {
            Some(button.type_())
        } else if let Some(select) = node.dyn_ref::<HtmlSelectElement>() {
            Some(select.type_())
        } else {
            node.dyn_ref::<HtmlTextAreaElement>().map(HtmlTextAreaElement::type_)
        }
    }

    fn value(&self, node: &Element) -> Option<String> {
        if let Some(input) = node.dyn_ref::<HtmlInputElement>() {
            Some(input.value())
        } else if let Some(area) = node.dyn_ref::<HtmlTextAreaElement>() {
            Some(area.value())
        } else if let Some(select) = node.dyn_ref::<HtmlSelectElement>() {
            Some(select.value())
        } else {
            node.dyn_ref::<HtmlButtonElement>().map(HtmlButtonElement::value)
        }
    }

    fn inner_text(&self, node: &Element) -> String {
        match node.dyn_ref::<HtmlElement>() {
            Some(html) => html.inner_text(),
            None => node.text_content().unwrap_or_default(),
        }
    }

    fn text_excluding(&self, container: &Element, excluded: &Element) -> String {
        let Ok(copy) = container.clone_node_with_deep(true) else {
            return String::new();
        };
        let Ok(copy) = copy.dyn_into::<Element>() else {
            return String::new();
        };
        if let Ok(Some(inner)) = copy.query_selector(&excluded.tag_name()) {
            inner.remove();
        }
        self.inner_text(&copy)
    }

    fn parent(&self, node: &Element) -> Option<Element> {
        node.parent_element()
    }

    fn children(&self, node: &Element) -> Vec<Element> {
        let children = node.children();
        (0..children.length()).filter_map(|index| children.item(index)).collect()
    }

    fn previous_element_sibling(&self, node: &Element) -> Option<Element> {
        node.previous_element_sibling()
    }

    fn render_state(&self, node: &Element) -> RenderState {
        let has_layout_box = node
            .dyn_ref::<HtmlElement>()
            .map_or(false, |html| html.offset_parent().is_some());
        let mut state = RenderState { has_layout_box, ..RenderState::default() };
        if let Ok(Some(style)) = self.window.get_computed_style(node) {
            if let Ok(display) = style.get_property_value("display") {
                state.display = display;
            }
            if let Ok(visibility) = style.get_property_value("visibility") {
                state.visibility = visibility;
            }
            if let Some(opacity) = style
                .get_property_value("opacity")
                .ok()
                .and_then(|opacity| opacity.trim().parse::<f64>().ok())
            {
                state.opacity = opacity;
            }
        }
        state
    }

    fn is_connected(&self, node: &Element) -> bool {
        node.is_connected()
    }

    fn is_body(&self, node: &Element) -> bool {
        self.document
            .body()
            .map_or(false, |body| body.unchecked_ref::<Element>() == node)
    }

    fn options(&self, node: &Element) -> Result<Vec<SelectOption>, DomError> {
        if node.dyn_ref::<HtmlSelectElement>().is_none() {
            return Err(DomError::ElementTypeError {
                element: self.tag_name(node),
                expected_type: "select".to_string(),
            });
        }
        let list = node.query_selector_all("option")?;
        Ok(collect_elements(&list)
            .into_iter()
            .filter_map(|option| option.dyn_into::<HtmlOptionElement>().ok())
            .map(|option| SelectOption { value: option.value(), text: option.text() })
            .collect())
    }

    fn focus(&self, node: &Element) -> Result<(), DomError> {
        Ok(Self::html(node)?.focus()?)
    }

    fn blur(&self, node: &Element) -> Result<(), DomError> {
        Ok(Self::html(node)?.blur()?)
    }

    fn set_value(&self, node: &Element, value: &str) -> Result<(), DomError> {
        if let Some(input) = node.dyn_ref::<HtmlInputElement>() {
            input.set_value(value);
        } else if let Some(area) = node.dyn_ref::<HtmlTextAreaElement>() {
            area.set_value(value);
        } else if let Some(select) = node.dyn_ref::<HtmlSelectElement>() {
            select.set_value(value);
        } else {
            return Err(DomError::ElementTypeError {
                element: self.tag_name(node),
                expected_type: "input, textarea or select".to_string(),
            });
        }
        Ok(())
    }

    fn dispatch(&self, node: &Element, event: SyntheticEvent) -> Result<(), DomError> {
        let event: Event = if event.is_mouse() {
            let init = MouseEventInit::new();
            init.set_bubbles(true);
            init.set_cancelable(true);
            MouseEvent::new_with_mouse_event_init_dict(event.name(), &init)?.into()
        } else {
            let init = EventInit::new();
            init.set_bubbles(true);
            Event::new_with_event_init_dict(event.name(), &init)?
        };
        node.dispatch_event(&event)?;
        Ok(())
    }

    fn scroll_into_view(&self, node: &Element) -> Result<(), DomError> {
        let options = ScrollIntoViewOptions::new();
        options.set_behavior(ScrollBehavior::Smooth);
        options.set_block(ScrollLogicalPosition::Center);
        node.scroll_into_view_with_scroll_into_view_options(&options);
        Ok(())
    }

    fn click(&self, node: &Element) -> Result<(), DomError> {
        Self::html(node)?.click();
        Ok(())
    }
}
