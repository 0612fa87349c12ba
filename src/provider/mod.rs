//! Provider adapter: one request/response contract over four AI backends.
//!
//! A [`Backend`] knows how to shape the request and read the reply for one
//! provider. The [`ProviderAdapter`] owns the transport and applies the rules
//! shared by every backend: credentials are checked before anything goes on
//! the wire, transport failures become [`ProviderError::Unreachable`], and
//! nothing is retried.

pub mod anthropic;
pub mod gemini;
pub mod ollama;
pub mod openai;
pub mod transport;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::credentials::ApiKey;
use crate::error::{ConfigError, ProviderError};

pub use transport::{HttpRequest, HttpResponse, HttpTransport, Transport, TransportError};

/// Default timeout for a single provider call.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Supported AI providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Ollama,
    OpenAi,
    Gemini,
    Anthropic,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::Ollama,
        ProviderKind::OpenAi,
        ProviderKind::Gemini,
        ProviderKind::Anthropic,
    ];

    /// Identifier used in config files and on the command line.
    pub fn id(&self) -> &'static str {
        match self {
            ProviderKind::Ollama => "ollama",
            ProviderKind::OpenAi => "openai",
            ProviderKind::Gemini => "gemini",
            ProviderKind::Anthropic => "anthropic",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::Ollama => "Ollama",
            ProviderKind::OpenAi => "OpenAI",
            ProviderKind::Gemini => "Gemini",
            ProviderKind::Anthropic => "Anthropic",
        }
    }

    /// Hosted providers need an API key; the local model server does not.
    pub fn is_hosted(&self) -> bool {
        !matches!(self, ProviderKind::Ollama)
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::Ollama => "llama3.2",
            ProviderKind::OpenAi => "gpt-4o-mini",
            ProviderKind::Gemini => "gemini-1.5-flash",
            ProviderKind::Anthropic => "claude-3-haiku-20240307",
        }
    }

    pub fn default_endpoint(&self) -> &'static str {
        match self {
            ProviderKind::Ollama => "http://localhost:11434",
            ProviderKind::OpenAi => "https://api.openai.com/v1",
            ProviderKind::Gemini => "https://generativelanguage.googleapis.com/v1beta",
            ProviderKind::Anthropic => "https://api.anthropic.com/v1",
        }
    }

    /// Environment variables consulted for the API key, in priority order.
    pub fn credential_env_vars(&self) -> &'static [&'static str] {
        match self {
            ProviderKind::Ollama => &[],
            ProviderKind::OpenAi => &["OPENAI_API_KEY"],
            ProviderKind::Gemini => &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
            ProviderKind::Anthropic => &["ANTHROPIC_API_KEY"],
        }
    }

    /// Where users can create an API key.
    pub fn key_url(&self) -> Option<&'static str> {
        match self {
            ProviderKind::Ollama => None,
            ProviderKind::OpenAi => Some("https://platform.openai.com/api-keys"),
            ProviderKind::Gemini => Some("https://aistudio.google.com/app/apikey"),
            ProviderKind::Anthropic => Some("https://console.anthropic.com/settings/keys"),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ollama" | "local" => Ok(ProviderKind::Ollama),
            "openai" | "gpt" => Ok(ProviderKind::OpenAi),
            "gemini" | "google" => Ok(ProviderKind::Gemini),
            "anthropic" | "claude" => Ok(ProviderKind::Anthropic),
            _ => Err(ConfigError::UnknownProvider(s.to_string())),
        }
    }
}

/// The active provider and everything needed to call it.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub endpoint: String,
    pub model: String,
    pub credential: Option<ApiKey>,
    pub timeout: Duration,
}

impl ProviderConfig {
    /// Config with the provider's default endpoint and model and no credential.
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            endpoint: kind.default_endpoint().to_string(),
            model: kind.default_model().to_string(),
            credential: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_credential(mut self, credential: ApiKey) -> Self {
        self.credential = Some(credential);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Provider-neutral prompt handed to a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
}

/// Normalized text returned by a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub provider: ProviderKind,
    pub model: String,
}

/// Request shaping and reply parsing for a single provider.
pub trait Backend: Send + Sync {
    fn kind(&self) -> ProviderKind;

    fn requires_credential(&self) -> bool {
        self.kind().is_hosted()
    }

    /// Build the wire request. `credential` is `Some` whenever
    /// [`Backend::requires_credential`] is true.
    fn build_request(
        &self,
        prompt: &Prompt,
        creativity: f32,
        config: &ProviderConfig,
        credential: Option<&ApiKey>,
    ) -> HttpRequest;

    /// Pull the generated text out of a successful JSON body.
    fn extract_text(&self, body: &Value) -> Option<String>;

    /// Map a non-2xx response to an error.
    fn map_status(&self, status: u16, body: &str) -> ProviderError {
        let provider = self.kind();
        let reason = format!("HTTP {}: {}", status, excerpt(body));
        match status {
            401 | 403 => ProviderError::Auth { provider, reason },
            408 | 502 | 503 | 504 => ProviderError::Unreachable { provider, reason },
            _ => ProviderError::Response { provider, reason },
        }
    }
}

/// Select the backend implementation for a provider.
pub fn backend_for(kind: ProviderKind) -> &'static dyn Backend {
    match kind {
        ProviderKind::Ollama => &ollama::OllamaBackend,
        ProviderKind::OpenAi => &openai::OpenAiBackend,
        ProviderKind::Gemini => &gemini::GeminiBackend,
        ProviderKind::Anthropic => &anthropic::AnthropicBackend,
    }
}

/// Runs prompts against the configured provider.
pub struct ProviderAdapter<T = HttpTransport> {
    transport: T,
}

impl ProviderAdapter<HttpTransport> {
    pub fn new() -> Self {
        Self {
            transport: HttpTransport::new(),
        }
    }
}

impl Default for ProviderAdapter<HttpTransport> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Transport> ProviderAdapter<T> {
    pub fn with_transport(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send one prompt and return the normalized text.
    ///
    /// Fails with [`ProviderError::Auth`] before any network call when a hosted
    /// provider has no credential.
    pub async fn complete(
        &self,
        prompt: &Prompt,
        creativity: f32,
        config: &ProviderConfig,
    ) -> Result<Completion, ProviderError> {
        let backend = backend_for(config.kind);
        let provider = config.kind;

        let credential = if backend.requires_credential() {
            let key = config
                .credential
                .as_ref()
                .filter(|k| !k.is_empty())
                .ok_or_else(|| ProviderError::Auth {
                    provider,
                    reason: missing_key_reason(provider),
                })?;
            Some(key)
        } else {
            None
        };

        let request = backend.build_request(prompt, creativity, config, credential);
        debug!(
            "{} request: model={}, creativity={:.2}, prompt={} chars",
            provider,
            config.model,
            creativity,
            prompt.system.len() + prompt.user.len()
        );

        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| ProviderError::Unreachable {
                provider,
                reason: e.reason,
            })?;

        if !(200..300).contains(&response.status) {
            let err = backend.map_status(response.status, &response.body);
            warn!("{} call failed: {}", provider, err);
            return Err(err);
        }

        let body: Value =
            serde_json::from_str(&response.body).map_err(|e| ProviderError::Response {
                provider,
                reason: format!("body is not JSON ({}): {}", e, excerpt(&response.body)),
            })?;

        let text = backend
            .extract_text(&body)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ProviderError::Response {
                provider,
                reason: format!("no text in response: {}", excerpt(&response.body)),
            })?;

        Ok(Completion {
            text,
            provider,
            model: config.model.clone(),
        })
    }
}

fn missing_key_reason(provider: ProviderKind) -> String {
    match provider.credential_env_vars().first() {
        Some(var) => format!("no API key configured (set {} or store one with setup)", var),
        None => "no API key configured".to_string(),
    }
}

/// Join an endpoint and a path without doubling slashes.
pub(crate) fn join_url(endpoint: &str, path: &str) -> String {
    format!(
        "{}/{}",
        endpoint.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// First 200 characters of a body, for error messages.
pub(crate) fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    let cut: String = trimmed.chars().take(200).collect();
    if cut.len() < trimmed.len() {
        format!("{}...", cut)
    } else {
        cut
    }
}
