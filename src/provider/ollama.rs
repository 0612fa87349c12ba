//! Local model server (Ollama) backend.

use serde_json::{Value, json};

use super::{Backend, HttpRequest, Prompt, ProviderConfig, ProviderKind, join_url};
use crate::config::credentials::ApiKey;
use crate::error::ProviderError;

pub struct OllamaBackend;

impl Backend for OllamaBackend {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    fn build_request(
        &self,
        prompt: &Prompt,
        creativity: f32,
        config: &ProviderConfig,
        _credential: Option<&ApiKey>,
    ) -> HttpRequest {
        let body = json!({
            "model": config.model,
            "system": prompt.system,
            "prompt": prompt.user,
            "stream": false,
            "options": {
                "temperature": creativity,
                "num_predict": prompt.max_tokens,
            },
        });
        HttpRequest::post(join_url(&config.endpoint, "api/generate"), body, config.timeout)
    }

    fn extract_text(&self, body: &Value) -> Option<String> {
        body.get("response")
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    fn map_status(&self, status: u16, body: &str) -> ProviderError {
        // A missing model is a 404 with {"error": "model 'x' not found"}.
        if status == 404 {
            let reason = serde_json::from_str::<Value>(body)
                .ok()
                .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_else(|| "endpoint not found".to_string());
            return ProviderError::Response {
                provider: ProviderKind::Ollama,
                reason: format!("{} (is the model pulled? try `ollama pull`)", reason),
            };
        }
        ProviderError::Response {
            provider: ProviderKind::Ollama,
            reason: format!("HTTP {}: {}", status, super::excerpt(body)),
        }
    }
}
