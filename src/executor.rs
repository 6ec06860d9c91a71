//! Turns one planned action into page interactions.
//!
//! Failures never propagate: [`ActionExecutor::execute`] folds every
//! [`ExecutionError`] into a failed [`ActionResult`] so the caller can keep
//! going with the next action.

use log::{debug, warn};
use thiserror::Error;

use crate::config::AgentConfig;
use crate::dom_utils::{Document, DomError, SyntheticEvent};
use crate::extractor::ExtractionPass;
use crate::plan::{Action, ActionKind, ActionResult};
use crate::timer::sleep;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutionError {
    #[error("Element not found: {target}")]
    ElementNotFound { target: String },
    #[error("Option not found: '{value}'")]
    OptionNotFound { value: String },
    #[error("Missing value for '{action}' action")]
    MissingValue { action: &'static str },
    #[error("Unknown action type")]
    UnknownAction,
    #[error(transparent)]
    Interaction(#[from] DomError),
}

pub struct ActionExecutor<'a, D: Document + ?Sized> {
    document: &'a D,
    pass: &'a ExtractionPass<D::Node>,
    config: &'a AgentConfig,
}

impl<'a, D: Document + ?Sized> ActionExecutor<'a, D> {
    pub fn new(document: &'a D, pass: &'a ExtractionPass<D::Node>, config: &'a AgentConfig) -> Self {
        ActionExecutor { document, pass, config }
    }

    pub async fn execute(&self, action: &Action) -> ActionResult {
        match self.try_execute(action).await {
            Ok(()) => ActionResult::ok(),
            Err(err) => {
                warn!("Action {:?} failed: {}", action.kind, err);
                ActionResult::failure(err.to_string())
            }
        }
    }

    async fn try_execute(&self, action: &Action) -> Result<(), ExecutionError> {
        match action.kind {
            ActionKind::Type => {
                let value = action
                    .value
                    .as_deref()
                    .ok_or(ExecutionError::MissingValue { action: "type" })?;
                let node = self.resolve(action)?;
                self.type_text(&node, value)
            }
            ActionKind::Click => {
                let node = self.resolve(action)?;
                self.click(&node).await
            }
            ActionKind::Select => {
                let value = action
                    .value
                    .as_deref()
                    .ok_or(ExecutionError::MissingValue { action: "select" })?;
                let node = self.resolve(action)?;
                self.select(&node, value)
            }
            ActionKind::Wait => {
                let duration = self.config.wait_duration(action.value.as_deref());
                debug!("Waiting {:?}", duration);
                sleep(duration).await;
                Ok(())
            }
            ActionKind::Unknown => Err(ExecutionError::UnknownAction),
        }
    }

    /// Session id first, then the selector: through this pass's handles when
    /// it is one of our own locators, otherwise by querying the page.
    /// Handles detached since extraction are skipped.
    pub fn resolve(&self, action: &Action) -> Result<D::Node, ExecutionError> {
        if let Some(id) = action.element_id {
            match self.pass.handle(id) {
                Some(node) if self.document.is_connected(node) => return Ok(node.clone()),
                Some(_) => debug!("Element [{}] is no longer attached to the page", id),
                None => {}
            }
        }

        let selector = action
            .selector
            .as_deref()
            .map(str::trim)
            .filter(|selector| !selector.is_empty());
        if let Some(selector) = selector {
            if let Some((element, node)) = self.pass.find_by_locator(selector) {
                if self.document.is_connected(node) {
                    debug!("Selector '{}' resolved through element [{}]", selector, element.id);
                    return Ok(node.clone());
                }
            }
            match self.document.query_selector_all(selector) {
                Ok(matches) => {
                    if matches.len() > 1 {
                        warn!(
                            "Selector '{}' matches {} elements, using the first",
                            selector,
                            matches.len()
                        );
                    }
                    if let Some(node) = matches.into_iter().next() {
                        return Ok(node);
                    }
                }
                Err(err) => warn!("{}", err),
            }
        }

        Err(ExecutionError::ElementNotFound { target: describe_target(action) })
    }

    fn type_text(&self, node: &D::Node, value: &str) -> Result<(), ExecutionError> {
        self.document.focus(node)?;
        self.document.set_value(node, value)?;
        self.document.dispatch(node, SyntheticEvent::Input)?;
        self.document.dispatch(node, SyntheticEvent::Change)?;
        self.document.blur(node)?;
        Ok(())
    }

    async fn click(&self, node: &D::Node) -> Result<(), ExecutionError> {
        self.document.scroll_into_view(node)?;
        sleep(self.config.click_settle()).await;
        self.document.dispatch(node, SyntheticEvent::MouseDown)?;
        self.document.dispatch(node, SyntheticEvent::MouseUp)?;
        self.document.click(node)?;
        Ok(())
    }

    fn select(&self, node: &D::Node, requested: &str) -> Result<(), ExecutionError> {
        self.document.focus(node)?;
        let options = self.document.options(node)?;
        let option = options
            .iter()
            .find(|option| option.value == requested)
            .or_else(|| options.iter().find(|option| option.text.trim() == requested.trim()))
            .ok_or_else(|| ExecutionError::OptionNotFound { value: requested.to_string() })?;
        self.document.set_value(node, &option.value)?;
        self.document.dispatch(node, SyntheticEvent::Change)?;
        Ok(())
    }
}

fn describe_target(action: &Action) -> String {
    match (action.element_id, action.selector.as_deref()) {
        (Some(id), Some(selector)) => format!("elementId {} / selector '{}'", id, selector),
        (Some(id), None) => format!("elementId {}", id),
        (None, Some(selector)) => format!("selector '{}'", selector),
        (None, None) => "no elementId or selector given".to_string(),
    }
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;
    use crate::extractor::extract;
    use crate::memory_dom::{ElementSpec, MemoryDocument, NodeId};

    fn quick_config() -> AgentConfig {
        let mut config = AgentConfig::default();
        config.with_pacing(0, 0, 0).with_wait_bounds(1, 5);
        config
    }

    fn form() -> (MemoryDocument, NodeId, NodeId, NodeId) {
        let doc = MemoryDocument::new("Form", "https://example.test/form");
        let name = doc.append(doc.body(), ElementSpec::new("input").attr("id", "name"));
        let country = doc.append(
            doc.body(),
            ElementSpec::new("select")
                .attr("name", "country")
                .child(ElementSpec::new("option").attr("value", "").text("Choose"))
                .child(ElementSpec::new("option").attr("value", "fr").text("France"))
                .child(ElementSpec::new("option").attr("value", "de").text(" Germany ")),
        );
        let submit = doc.append(doc.body(), ElementSpec::new("button").attr("class", "submit").text("Send"));
        (doc, name, country, submit)
    }

    #[tokio::test]
    async fn test_type_sets_value_and_fires_events() {
        let (doc, name, _, _) = form();
        let pass = extract(&doc, 50);
        let config = quick_config();
        let executor = ActionExecutor::new(&doc, &pass, &config);

        let result = executor.execute(&Action::new(ActionKind::Type).on(0).with_value("Manu")).await;
        assert_eq!(result, ActionResult::ok());
        assert_eq!(doc.value_of(name), "Manu");
        assert_eq!(doc.events_for(name), vec![SyntheticEvent::Input, SyntheticEvent::Change]);
        assert_eq!(doc.focused(), None);
    }

    #[tokio::test]
    async fn test_click_dispatches_mouse_events_then_clicks() {
        let (doc, _, _, submit) = form();
        let pass = extract(&doc, 50);
        let config = quick_config();
        let executor = ActionExecutor::new(&doc, &pass, &config);

        assert!(executor.execute(&Action::new(ActionKind::Click).on(2)).await.success);
        assert_eq!(doc.events_for(submit), vec![SyntheticEvent::MouseDown, SyntheticEvent::MouseUp]);
        assert_eq!(doc.click_count(submit), 1);
    }

    #[tokio::test]
    async fn test_select_by_value_then_text() {
        let (doc, _, country, _) = form();
        let pass = extract(&doc, 50);
        let config = quick_config();
        let executor = ActionExecutor::new(&doc, &pass, &config);

        assert!(executor.execute(&Action::new(ActionKind::Select).on(1).with_value("fr")).await.success);
        assert_eq!(doc.value_of(country), "fr");
        assert!(executor.execute(&Action::new(ActionKind::Select).on(1).with_value("Germany")).await.success);
        assert_eq!(doc.value_of(country), "de");
        assert_eq!(doc.events_for(country), vec![SyntheticEvent::Change, SyntheticEvent::Change]);

        let missing = executor.execute(&Action::new(ActionKind::Select).on(1).with_value("Spain")).await;
        assert!(!missing.success);
        assert_eq!(missing.error.as_deref(), Some("Option not found: 'Spain'"));
        assert_eq!(doc.value_of(country), "de");
    }

    #[tokio::test]
    async fn test_selector_fallback_and_not_found() {
        let (doc, name, _, submit) = form();
        let pass = extract(&doc, 50);
        let config = quick_config();
        let executor = ActionExecutor::new(&doc, &pass, &config);

        let by_locator = Action::new(ActionKind::Click).at("button.submit");
        assert_eq!(executor.resolve(&by_locator), Ok(submit));

        let stale_id = Action::new(ActionKind::Type).on(42).at("#name").with_value("x");
        assert_eq!(executor.resolve(&stale_id), Ok(name));

        let result = executor.execute(&Action::new(ActionKind::Click).on(42)).await;
        assert_eq!(result.error.as_deref(), Some("Element not found: elementId 42"));

        let result = executor.execute(&Action::new(ActionKind::Click).at("#nowhere")).await;
        assert!(!result.success);
    }

    #[tokio::test]
    async fn test_detached_handles_are_not_used() {
        let (doc, name, _, _) = form();
        let pass = extract(&doc, 50);
        let config = quick_config();
        let executor = ActionExecutor::new(&doc, &pass, &config);
        doc.remove(name);

        let result = executor.execute(&Action::new(ActionKind::Type).on(0).with_value("Manu")).await;
        assert_eq!(result.error.as_deref(), Some("Element not found: elementId 0"));
        let result = executor.execute(&Action::new(ActionKind::Type).at("#name").with_value("Manu")).await;
        assert_eq!(result.error.as_deref(), Some("Element not found: selector '#name'"));
        assert_eq!(doc.value_of(name), "");

        let replacement = doc.append(doc.body(), ElementSpec::new("input").attr("id", "name"));
        let action = Action::new(ActionKind::Type).on(0).at("#name").with_value("Manu");
        assert_eq!(executor.resolve(&action), Ok(replacement));
    }

    #[tokio::test]
    async fn test_invalid_selector_is_element_not_found() {
        let (doc, _, _, _) = form();
        let pass = extract(&doc, 50);
        let config = quick_config();
        let executor = ActionExecutor::new(&doc, &pass, &config);
        let result = executor.execute(&Action::new(ActionKind::Click).at("form > button")).await;
        assert_eq!(result.error.as_deref(), Some("Element not found: selector 'form > button'"));
    }

    #[tokio::test]
    async fn test_wait_and_unknown_need_no_element() {
        let (doc, _, _, _) = form();
        let pass = extract(&doc, 50);
        let config = quick_config();
        let executor = ActionExecutor::new(&doc, &pass, &config);

        assert!(executor.execute(&Action::new(ActionKind::Wait).with_value("1")).await.success);
        assert!(executor.execute(&Action::new(ActionKind::Wait)).await.success);
        let unknown = executor.execute(&Action::new(ActionKind::Unknown).on(0)).await;
        assert_eq!(unknown.error.as_deref(), Some("Unknown action type"));
    }

    #[tokio::test]
    async fn test_interaction_errors_become_failed_results() {
        let (doc, _, _, submit) = form();
        let pass = extract(&doc, 50);
        let config = quick_config();
        let executor = ActionExecutor::new(&doc, &pass, &config);

        let result = executor.execute(&Action::new(ActionKind::Type).on(2).with_value("x")).await;
        assert!(!result.success);
        assert!(result.error.unwrap().starts_with("ElementTypeError"));
        assert_eq!(doc.value_of(submit), "");

        let result = executor.execute(&Action::new(ActionKind::Type).on(0)).await;
        assert_eq!(result.error.as_deref(), Some("Missing value for 'type' action"));
    }
}
