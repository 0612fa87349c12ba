//! Anthropic Messages API backend.

use serde_json::{Value, json};

use super::{Backend, HttpRequest, Prompt, ProviderConfig, ProviderKind, join_url};
use crate::config::credentials::ApiKey;

pub const API_VERSION: &str = "2023-06-01";

/// The Messages API accepts temperatures in [0, 1] only.
const MAX_TEMPERATURE: f32 = 1.0;

pub struct AnthropicBackend;

impl Backend for AnthropicBackend {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    fn build_request(
        &self,
        prompt: &Prompt,
        creativity: f32,
        config: &ProviderConfig,
        credential: Option<&ApiKey>,
    ) -> HttpRequest {
        let body = json!({
            "model": config.model,
            "max_tokens": prompt.max_tokens,
            "temperature": creativity.clamp(0.0, MAX_TEMPERATURE),
            "system": prompt.system,
            "messages": [{"role": "user", "content": prompt.user}],
        });

        let request = HttpRequest::post(join_url(&config.endpoint, "messages"), body, config.timeout)
            .header("anthropic-version", API_VERSION);
        match credential {
            Some(key) => request.header("x-api-key", key.expose()),
            None => request,
        }
    }

    fn extract_text(&self, body: &Value) -> Option<String> {
        let blocks = body.get("content")?.as_array()?;
        let text: String = blocks
            .iter()
            .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
            .filter_map(|b| b.get("text").and_then(Value::as_str))
            .collect();
        Some(text)
    }
}
