//! Plans produced by the planner and the per-action history the agent keeps.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// The declarative interactions a plan may ask for.
///
/// Matching is case-insensitive; anything unrecognised becomes `Unknown`
/// so one bad action fails on its own instead of discarding the whole plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Type,
    Click,
    Select,
    Wait,
    Unknown,
}

impl<'de> Deserialize<'de> for ActionKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.trim().to_ascii_lowercase().as_str() {
            "type" => ActionKind::Type,
            "click" => ActionKind::Click,
            "select" => ActionKind::Select,
            "wait" => ActionKind::Wait,
            _ => ActionKind::Unknown,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "action")]
    pub kind: ActionKind,
    #[serde(
        rename = "elementId",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_element_id"
    )]
    pub element_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text")]
    pub value: Option<String>,
}

impl Action {
    pub fn new(kind: ActionKind) -> Self {
        Action { kind, element_id: None, selector: None, value: None }
    }

    pub fn on(mut self, element_id: u32) -> Self {
        self.element_id = Some(element_id);
        self
    }

    pub fn at(mut self, selector: &str) -> Self {
        self.selector = Some(selector.to_string());
        self
    }

    pub fn with_value(mut self, value: &str) -> Self {
        self.value = Some(value.to_string());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default, deserialize_with = "lenient_actions")]
    pub actions: Vec<Action>,
    /// Informational only; never drives control flow.
    #[serde(default, deserialize_with = "lenient_reasoning")]
    pub reasoning: String,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub complete: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionResult {
    pub fn ok() -> Self {
        ActionResult { success: true, error: None }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        ActionResult { success: false, error: Some(reason.into()) }
    }
}

/// One executed action with its outcome, serialized flat as the planner sees it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub action: Action,
    pub result: ActionResult,
}

fn lenient_element_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(number)) => number.as_u64().and_then(|id| u32::try_from(id).ok()),
        Some(Value::String(text)) => text.trim().parse::<u32>().ok(),
        _ => None,
    })
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => Some(text),
        Some(other) => Some(other.to_string()),
    })
}

fn lenient_reasoning<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(lenient_text(deserializer)?.unwrap_or_default())
}

fn lenient_actions<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Action>, D::Error> {
    Ok(Option::<Vec<Action>>::deserialize(deserializer)?.unwrap_or_default())
}

fn lenient_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Bool(flag)) => flag,
        Some(Value::String(text)) => text.trim().eq_ignore_ascii_case("true"),
        _ => false,
    })
}
