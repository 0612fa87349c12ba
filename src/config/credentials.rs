//! API key storage and lookup.
//!
//! Keys come from the provider's environment variable first, then from the
//! config file. An empty value in either place counts as absent.

use std::env;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Settings;
use crate::provider::ProviderKind;

/// A provider API key. Never printed by `Debug`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into().trim().to_string())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Last four characters, for status output.
    pub fn masked(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        if chars.len() <= 8 {
            return "****".to_string();
        }
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("****{}", tail)
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(****)")
    }
}

/// Where a resolved key came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    Environment(&'static str),
    ConfigFile,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Environment(var) => write!(f, "${}", var),
            CredentialSource::ConfigFile => f.write_str("config file"),
        }
    }
}

/// Find the API key for a provider.
pub fn resolve_api_key(kind: ProviderKind, settings: &Settings) -> Option<(ApiKey, CredentialSource)> {
    for var in kind.credential_env_vars() {
        if let Ok(value) = env::var(var) {
            let key = ApiKey::new(value);
            if !key.is_empty() {
                debug!("Using {} key from ${}", kind, var);
                return Some((key, CredentialSource::Environment(var)));
            }
        }
    }

    settings
        .api_keys
        .get(&kind)
        .filter(|k| !k.is_empty())
        .map(|k| (k.clone(), CredentialSource::ConfigFile))
}
