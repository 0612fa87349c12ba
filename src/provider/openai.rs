//! OpenAI chat completions backend.

use serde_json::{Value, json};

use super::{Backend, HttpRequest, Prompt, ProviderConfig, ProviderKind, join_url};
use crate::config::credentials::ApiKey;

pub struct OpenAiBackend;

impl Backend for OpenAiBackend {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
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
            "messages": [
                {"role": "system", "content": prompt.system},
                {"role": "user", "content": prompt.user},
            ],
            "temperature": creativity,
            "max_tokens": prompt.max_tokens,
        });

        let request =
            HttpRequest::post(join_url(&config.endpoint, "chat/completions"), body, config.timeout);
        match credential {
            Some(key) => request.header("authorization", format!("Bearer {}", key.expose())),
            None => request,
        }
    }

    fn extract_text(&self, body: &Value) -> Option<String> {
        body.get("choices")?
            .get(0)?
            .get("message")?
            .get("content")?
            .as_str()
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;

    #[test]
    fn test_request_shape() {
        let prompt = Prompt {
            system: "You write commit messages.".into(),
            user: "+x".into(),
            max_tokens: 200,
        };
        let config = ProviderConfig::new(ProviderKind::OpenAi).with_model("gpt-4o");
        let key = ApiKey::new("sk-test");
        let request = OpenAiBackend.build_request(&prompt, 1.2, &config, Some(&key));

        assert_eq!(request.url, "https://api.openai.com/v1/chat/completions");
        assert_eq!(request.header_value("authorization"), Some("Bearer sk-test"));
        assert_eq!(request.body["model"], "gpt-4o");
        assert_eq!(request.body["messages"][0]["role"], "system");
        assert_eq!(request.body["messages"][1]["content"], "+x");
        assert_eq!(request.body["max_tokens"], 200);
        let temp = request.body["temperature"].as_f64().unwrap();
        assert!((temp - 1.2).abs() < 1e-6);
    }

    #[test]
    fn test_extract_text() {
        let body = json!({
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "feat: add login"}}]
        });
        assert_eq!(OpenAiBackend.extract_text(&body).as_deref(), Some("feat: add login"));
        assert_eq!(OpenAiBackend.extract_text(&json!({"choices": []})), None);
    }

    #[test]
    fn test_invalid_key_is_auth_error() {
        let err = OpenAiBackend.map_status(401, r#"{"error":{"message":"Incorrect API key"}}"#);
        assert!(matches!(err, ProviderError::Auth { provider: ProviderKind::OpenAi, .. }));
    }
}
