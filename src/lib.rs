//! A DOM automation agent: it reads a page's interactive controls, asks a
//! language model for a plan and carries the plan out, filling fields only
//! with data the user supplied.

pub mod agent;
pub mod config;
pub mod dom_utils;
pub mod executor;
pub mod extractor;
pub mod llm;
pub mod locator;
pub mod logging;
pub mod memory_dom;
pub mod page_kind;
pub mod plan;
pub mod profile;
pub mod prompt;
pub mod timer;
#[cfg(target_arch = "wasm32")]
pub mod web_dom;

pub use agent::{DomAgent, TaskContext, TaskFailure, TaskOutcome, TaskReport};
pub use config::{AgentConfig, OracleConfig, Provider};
pub use dom_utils::{Document, DomError};
pub use llm::{HttpTransport, OracleError, PlanningClient, PlanningError, PlanningTransport};
pub use plan::{Action, ActionKind, ActionResult, HistoryEntry, Plan};
pub use profile::{MemoryProfileStore, ProfileStore, StoreError, UserProfile};

#[cfg(target_arch = "wasm32")]
mod bindings {
    use wasm_bindgen::prelude::*;

    use crate::agent::DomAgent;
    use crate::config::AgentConfig;
    use crate::llm::HttpTransport;
    use crate::logging;
    use crate::profile::{LocalStorageProfileStore, UserProfile};
    use crate::web_dom::WebDocument;

    #[wasm_bindgen(start)]
    pub fn run() -> Result<(), JsValue> {
        #[cfg(debug_assertions)]
        console_error_panic_hook::set_once();
        logging::init(log::LevelFilter::Info);
        log::info!("domagent initialized");
        Ok(())
    }

    /// Runs one task against `window.document` and resolves with the JSON report.
    /// Invalid config or task data rejects the promise; task failures resolve
    /// with `{"success": false, "error": ...}`.
    #[wasm_bindgen]
    pub async fn perform_task(config_json: String, goal: String, task_data_json: String) -> Result<String, JsValue> {
        let config = AgentConfig::from_json(&config_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid config: {}", e)))?;
        logging::init(logging::parse_level(&config.log_level));
        let task_data = UserProfile::from_json(&task_data_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid task data: {}", e)))?;

        let document = WebDocument::from_window()?;
        let transport = HttpTransport::new(config.oracle.clone());
        let mut agent = DomAgent::new(document, transport, LocalStorageProfileStore, config);
        let outcome = agent.perform_task(&goal, &task_data).await;

        serde_json::to_string(&outcome.report())
            .map_err(|e| JsValue::from_str(&format!("Failed to serialize report: {}", e)))
    }
}
