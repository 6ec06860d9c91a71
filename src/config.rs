//! Agent and planning-oracle configuration.
//!
//! Hosts pass JSON; every field is optional and falls back to the defaults
//! below. Programmatic callers use the `with_*` setters.

use std::time::Duration;

use serde::{Deserialize, Serialize};

const GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const OPENAI_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "gemini-2.5-flash-lite";
/// Gemini model names that no longer serve `generateContent`.
const RETIRED_GEMINI_MODELS: [&str; 4] = [
    "gemini-pro",
    "gemini-1.5-flash",
    "gemini-1.5-flash-latest",
    "gemini-1.5-flash-001",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Gemini,
    /// Any OpenAI-compatible chat completions endpoint.
    OpenAi,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub provider: Provider,
    /// Overrides the provider's public endpoint.
    pub api_url: Option<String>,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
}

impl Default for OracleConfig {
    fn default() -> Self {
        OracleConfig {
            provider: Provider::Gemini,
            api_url: None,
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.7,
        }
    }
}

impl OracleConfig {
    pub fn with_provider(&mut self, provider: Provider) -> &mut Self {
        self.provider = provider;
        self
    }

    pub fn with_api_url(&mut self, api_url: Option<&str>) -> &mut Self {
        self.api_url = api_url.map(str::to_string);
        self
    }

    pub fn with_api_key(&mut self, api_key: &str) -> &mut Self {
        self.api_key = api_key.to_string();
        self
    }

    pub fn with_model(&mut self, model: &str) -> &mut Self {
        self.model = model.to_string();
        self
    }

    pub fn with_temperature(&mut self, temperature: f32) -> &mut Self {
        self.temperature = temperature;
        self
    }

    /// The model actually requested: retired Gemini names map to the default.
    pub fn effective_model(&self) -> &str {
        let model = self.model.trim();
        if model.is_empty()
            || (self.provider == Provider::Gemini && RETIRED_GEMINI_MODELS.contains(&model))
        {
            DEFAULT_MODEL
        } else {
            model
        }
    }

    pub fn endpoint(&self) -> String {
        if let Some(url) = self.api_url.as_deref().filter(|url| !url.trim().is_empty()) {
            return url.to_string();
        }
        match self.provider {
            Provider::Gemini => format!("{}/{}:generateContent", GEMINI_ENDPOINT, self.effective_model()),
            Provider::OpenAi => OPENAI_ENDPOINT.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub max_iterations: usize,
    /// Pause after each executed action.
    pub action_delay_ms: u64,
    /// Pause after a plan's actions, before the next observation.
    pub settle_delay_ms: u64,
    /// Pause between scrolling a click target into view and clicking it.
    pub click_settle_ms: u64,
    pub default_wait_ms: u64,
    pub max_wait_ms: u64,
    pub planning_timeout_ms: u64,
    /// Characters of a control's current value shown to the planner.
    pub value_snippet_len: usize,
    /// Name of the persisted user profile record.
    pub profile_record: String,
    pub log_level: String,
    pub oracle: OracleConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        AgentConfig {
            max_iterations: 10,
            action_delay_ms: 500,
            settle_delay_ms: 1000,
            click_settle_ms: 500,
            default_wait_ms: 1000,
            max_wait_ms: 30_000,
            planning_timeout_ms: 60_000,
            value_snippet_len: 50,
            profile_record: "userProfileData".to_string(),
            log_level: "info".to_string(),
            oracle: OracleConfig::default(),
        }
    }
}

impl AgentConfig {
    /// Parses host JSON. An empty string yields the defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        if json.trim().is_empty() {
            return Ok(AgentConfig::default());
        }
        serde_json::from_str(json)
    }

    pub fn with_max_iterations(&mut self, max_iterations: usize) -> &mut Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Sets action, settle and click pacing at once; tests use zero.
    pub fn with_pacing(&mut self, action_delay_ms: u64, settle_delay_ms: u64, click_settle_ms: u64) -> &mut Self {
        self.action_delay_ms = action_delay_ms;
        self.settle_delay_ms = settle_delay_ms;
        self.click_settle_ms = click_settle_ms;
        self
    }

    pub fn with_wait_bounds(&mut self, default_wait_ms: u64, max_wait_ms: u64) -> &mut Self {
        self.default_wait_ms = default_wait_ms;
        self.max_wait_ms = max_wait_ms;
        self
    }

    pub fn with_planning_timeout(&mut self, planning_timeout_ms: u64) -> &mut Self {
        self.planning_timeout_ms = planning_timeout_ms;
        self
    }

    pub fn with_value_snippet_len(&mut self, value_snippet_len: usize) -> &mut Self {
        self.value_snippet_len = value_snippet_len;
        self
    }

    pub fn with_profile_record(&mut self, profile_record: &str) -> &mut Self {
        self.profile_record = profile_record.to_string();
        self
    }

    pub fn with_oracle(&mut self, oracle: OracleConfig) -> &mut Self {
        self.oracle = oracle;
        self
    }

    pub fn action_delay(&self) -> Duration {
        Duration::from_millis(self.action_delay_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn click_settle(&self) -> Duration {
        Duration::from_millis(self.click_settle_ms)
    }

    pub fn planning_timeout(&self) -> Duration {
        Duration::from_millis(self.planning_timeout_ms)
    }

    /// Duration for a `wait` action: leading digits of `value` in milliseconds,
    /// the default when absent, zero or unparsable, capped at `max_wait_ms`.
    pub fn wait_duration(&self, value: Option<&str>) -> Duration {
        let requested = value
            .map(|value| {
                value
                    .trim()
                    .chars()
                    .take_while(char::is_ascii_digit)
                    .collect::<String>()
            })
            .and_then(|digits| digits.parse::<u64>().ok())
            .filter(|millis| *millis > 0)
            .unwrap_or(self.default_wait_ms);
        Duration::from_millis(requested.min(self.max_wait_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let config = AgentConfig::from_json("").unwrap();
        assert_eq!(config, AgentConfig::default());
        assert_eq!(config.max_iterations, 10);
        assert_eq!(config.action_delay(), Duration::from_millis(500));
        assert_eq!(config.oracle.model, "gemini-2.5-flash-lite");
    }

    #[test]
    fn test_partial_json_keeps_other_defaults() {
        let config = AgentConfig::from_json(
            r#"{"max_iterations": 3, "oracle": {"provider": "openai", "api_key": "sk-0123456789"}}"#,
        )
        .unwrap();
        assert_eq!(config.max_iterations, 3);
        assert_eq!(config.settle_delay_ms, 1000);
        assert_eq!(config.oracle.provider, Provider::OpenAi);
        assert_eq!(config.oracle.temperature, 0.7);
        assert_eq!(config.oracle.endpoint(), "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        assert!(AgentConfig::from_json("{not json").is_err());
    }

    #[test]
    fn test_retired_gemini_models_are_remapped() {
        let mut oracle = OracleConfig::default();
        oracle.with_model("gemini-pro");
        assert_eq!(oracle.effective_model(), "gemini-2.5-flash-lite");
        assert_eq!(
            oracle.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash-lite:generateContent"
        );
        oracle.with_provider(Provider::OpenAi).with_model("gpt-4o-mini");
        assert_eq!(oracle.effective_model(), "gpt-4o-mini");
        oracle.with_api_url(Some("http://localhost:8080/v1/chat/completions"));
        assert_eq!(oracle.endpoint(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn test_wait_duration() {
        let mut config = AgentConfig::default();
        config.with_wait_bounds(1000, 5000);
        assert_eq!(config.wait_duration(Some("1500")), Duration::from_millis(1500));
        assert_eq!(config.wait_duration(Some("250ms")), Duration::from_millis(250));
        assert_eq!(config.wait_duration(Some("soon")), Duration::from_millis(1000));
        assert_eq!(config.wait_duration(Some("0")), Duration::from_millis(1000));
        assert_eq!(config.wait_duration(None), Duration::from_millis(1000));
        assert_eq!(config.wait_duration(Some("600000")), Duration::from_millis(5000));
    }
}
