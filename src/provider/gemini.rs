//! Google Gemini `generateContent` backend.

use serde_json::{Value, json};

use super::{Backend, HttpRequest, Prompt, ProviderConfig, ProviderKind, excerpt, join_url};
use crate::config::credentials::ApiKey;
use crate::error::ProviderError;

pub struct GeminiBackend;

impl Backend for GeminiBackend {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    fn build_request(
        &self,
        prompt: &Prompt,
        creativity: f32,
        config: &ProviderConfig,
        credential: Option<&ApiKey>,
    ) -> HttpRequest {
        let body = json!({
            "systemInstruction": {"parts": [{"text": prompt.system}]},
            "contents": [{"role": "user", "parts": [{"text": prompt.user}]}],
            "generationConfig": {
                "temperature": creativity,
                "maxOutputTokens": prompt.max_tokens,
            },
        });

        let path = format!("models/{}:generateContent", config.model);
        let request = HttpRequest::post(join_url(&config.endpoint, &path), body, config.timeout);
        // Header rather than ?key= so the key never shows up in logged URLs.
        match credential {
            Some(key) => request.header("x-goog-api-key", key.expose()),
            None => request,
        }
    }

    fn extract_text(&self, body: &Value) -> Option<String> {
        let parts = body
            .get("candidates")?
            .get(0)?
            .get("content")?
            .get("parts")?
            .as_array()?;
        let text: String = parts
            .iter()
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .collect();
        Some(text)
    }

    fn map_status(&self, status: u16, body: &str) -> ProviderError {
        // Gemini reports a bad key as 400 INVALID_ARGUMENT.
        let reason = format!("HTTP {}: {}", status, excerpt(body));
        if matches!(status, 401 | 403) || body.contains("API_KEY_INVALID") {
            return ProviderError::Auth {
                provider: ProviderKind::Gemini,
                reason,
            };
        }
        match status {
            408 | 502 | 503 | 504 => ProviderError::Unreachable {
                provider: ProviderKind::Gemini,
                reason,
            },
            _ => ProviderError::Response {
                provider: ProviderKind::Gemini,
                reason,
            },
        }
    }
}
