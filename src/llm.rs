//! Planning oracle client.
//!
//! [`PlanningTransport`] moves a prompt to a language model and returns its
//! raw reply; [`PlanningClient`] bounds the round trip with a timeout and
//! normalizes the reply into a [`Plan`]. Every failure is a typed
//! [`PlanningError`], never an empty plan.

use std::time::Duration;

use async_trait::async_trait;
use futures::future::{select, Either};
use log::{debug, error};
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::{OracleConfig, Provider};
use crate::plan::Plan;
use crate::timer::sleep;

const PLACEHOLDER_KEY: &str = "YOUR_GEMINI_API_KEY_HERE";
const MIN_KEY_LEN: usize = 10;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OracleError {
    #[error("Planning oracle is not configured: {0}")]
    NotConfigured(String),
    #[error("Request error: {0}")]
    Http(String),
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("Failed to extract content from response: {0}")]
    MalformedResponse(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanningError {
    #[error(transparent)]
    Transport(#[from] OracleError),
    #[error("no reply within {0:?}")]
    Timeout(Duration),
    #[error("empty reply")]
    EmptyResponse,
    #[error("reply is not a plan: {0}")]
    Unparsable(String),
}

/// Sends one opaque text prompt and returns the model's raw text reply.
#[async_trait(?Send)]
pub trait PlanningTransport {
    async fn send(&self, prompt: &str) -> Result<String, OracleError>;
}

/// Talks to Gemini `generateContent` or an OpenAI-compatible chat endpoint.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    config: OracleConfig,
}

impl HttpTransport {
    pub fn new(config: OracleConfig) -> Self {
        HttpTransport { client: reqwest::Client::new(), config }
    }

    pub fn config(&self) -> &OracleConfig {
        &self.config
    }
}

#[async_trait(?Send)]
impl PlanningTransport for HttpTransport {
    async fn send(&self, prompt: &str) -> Result<String, OracleError> {
        validate_api_key(&self.config)?;
        let endpoint = self.config.endpoint();
        let key = self.config.api_key.trim();
        debug!("Sending {} prompt chars to {}", prompt.len(), endpoint);

        let request = self.client.post(&endpoint).json(&request_body(&self.config, prompt));
        let request = match self.config.provider {
            Provider::Gemini => request.header("x-goog-api-key", key),
            Provider::OpenAi => request.bearer_auth(key),
        };
        let response = request.send().await.map_err(|e| {
            error!("Request error: {}", e);
            OracleError::Http(e.to_string())
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| OracleError::Http(e.to_string()))?;
        debug!("Response status: {}", status);

        let body: Value = match serde_json::from_str(&text) {
            Ok(body) => body,
            Err(_) if !status.is_success() => {
                return Err(OracleError::Api { status: status.as_u16(), message: text });
            }
            Err(e) => return Err(OracleError::MalformedResponse(e.to_string())),
        };
        if !status.is_success() || body.get("error").is_some() {
            let err = api_error(status.as_u16(), &body);
            error!("{}", err);
            return Err(err);
        }
        extract_reply(self.config.provider, &body)
    }
}

/// Rejects keys that are obviously unset before any request is made.
pub fn validate_api_key(config: &OracleConfig) -> Result<(), OracleError> {
    let key = config.api_key.trim();
    if key.len() < MIN_KEY_LEN || key == PLACEHOLDER_KEY {
        return Err(OracleError::NotConfigured("a valid API key is required".to_string()));
    }
    Ok(())
}

pub fn request_body(config: &OracleConfig, prompt: &str) -> Value {
    match config.provider {
        Provider::Gemini => json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": { "temperature": config.temperature },
        }),
        Provider::OpenAi => json!({
            "model": config.effective_model(),
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": config.temperature,
        }),
    }
}

pub fn extract_reply(provider: Provider, body: &Value) -> Result<String, OracleError> {
    let content = match provider {
        Provider::Gemini => body.pointer("/candidates/0/content/parts/0/text"),
        Provider::OpenAi => body.pointer("/choices/0/message/content"),
    };
    content
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| OracleError::MalformedResponse("structure was not as expected".to_string()))
}

fn api_error(status: u16, body: &Value) -> OracleError {
    let message = body
        .pointer("/error/message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string());
    OracleError::Api { status, message }
}

/// Locates the JSON object in a model reply: the last ```` ```json ```` block,
/// else the last fenced block holding an object, else the outermost `{...}`.
pub fn extract_json_payload(reply: &str) -> Option<&str> {
    if let Some(block) = fenced_blocks(reply)
        .into_iter()
        .filter(|(lang, _)| lang.eq_ignore_ascii_case("json"))
        .map(|(_, body)| body)
        .last()
    {
        return Some(block);
    }
    if let Some(block) = fenced_blocks(reply)
        .into_iter()
        .map(|(_, body)| body)
        .filter(|body| body.starts_with('{'))
        .last()
    {
        return Some(block);
    }
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    (start < end).then(|| &reply[start..=end])
}

/// `(language, trimmed body)` of each closed, non-empty code fence.
fn fenced_blocks(reply: &str) -> Vec<(&str, &str)> {
    let mut blocks = Vec::new();
    let mut rest = reply;
    while let Some(open) = rest.find("```") {
        let after = &rest[open + 3..];
        let Some(close) = after.find("```") else {
            break;
        };
        let inner = &after[..close];
        let (lang, body) = match inner.find('\n') {
            Some(newline) => (inner[..newline].trim(), inner[newline + 1..].trim()),
            None => ("", inner.trim()),
        };
        if !body.is_empty() {
            blocks.push((lang, body));
        }
        rest = &after[close + 3..];
    }
    blocks
}

pub fn parse_plan(reply: &str) -> Result<Plan, PlanningError> {
    if reply.trim().is_empty() {
        return Err(PlanningError::EmptyResponse);
    }
    let payload = extract_json_payload(reply)
        .ok_or_else(|| PlanningError::Unparsable("no JSON object found".to_string()))?;
    serde_json::from_str(payload).map_err(|e| PlanningError::Unparsable(e.to_string()))
}

pub struct PlanningClient<T> {
    transport: T,
    timeout: Duration,
}

impl<T: PlanningTransport> PlanningClient<T> {
    /// A zero `timeout` disables the deadline.
    pub fn new(transport: T, timeout: Duration) -> Self {
        PlanningClient { transport, timeout }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn plan(&self, prompt: &str) -> Result<Plan, PlanningError> {
        let reply = if self.timeout.is_zero() {
            self.transport.send(prompt).await?
        } else {
            match select(Box::pin(self.transport.send(prompt)), Box::pin(sleep(self.timeout))).await {
                Either::Left((reply, _)) => reply?,
                Either::Right(_) => return Err(PlanningError::Timeout(self.timeout)),
            }
        };
        debug!("Planner reply: {}", reply);
        parse_plan(&reply)
    }
}
