//! Persistent settings: active provider, models, endpoints, keys and tuning.
//!
//! Settings live in a JSON file at `$GITBRO_CONFIG`, or `~/.gitbro/config.json`
//! when that variable is unset. A missing file means defaults. Writes go through
//! a temporary file in the same directory and are renamed into place, so a
//! crash never leaves a half-written config behind.

pub mod credentials;

use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::ConfigError;
use crate::provider::{ProviderConfig, ProviderKind};
use crate::session::CreativityPolicy;

pub use credentials::{ApiKey, CredentialSource, resolve_api_key};

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "GITBRO_CONFIG";

pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const MAX_TEMPERATURE: f32 = 2.0;
pub const DEFAULT_CREATIVITY_STEP: f32 = 0.1;
pub const DEFAULT_MAX_SUBJECT_LENGTH: usize = 72;

/// Everything stored in the config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub provider: Option<ProviderKind>,
    pub models: BTreeMap<ProviderKind, String>,
    pub endpoints: BTreeMap<ProviderKind, String>,
    pub api_keys: BTreeMap<ProviderKind, ApiKey>,
    pub generation: GenerationSettings,
    pub validation: ValidationSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// Baseline creativity for the first proposal.
    pub temperature: f32,
    /// Added per regeneration.
    pub creativity_step: f32,
    pub creativity_ceiling: f32,
    pub timeout_secs: u64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            creativity_step: DEFAULT_CREATIVITY_STEP,
            creativity_ceiling: MAX_TEMPERATURE,
            timeout_secs: crate::provider::DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationSettings {
    pub max_subject_length: usize,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            max_subject_length: DEFAULT_MAX_SUBJECT_LENGTH,
        }
    }
}

impl Settings {
    /// Baseline creativity, clamped to [0, 2].
    pub fn temperature(&self) -> f32 {
        clamp_creativity(self.generation.temperature)
    }

    pub fn creativity_policy(&self) -> CreativityPolicy {
        let baseline = self.temperature();
        let ceiling = clamp_creativity(self.generation.creativity_ceiling).max(baseline);
        CreativityPolicy::new(baseline, self.generation.creativity_step.max(0.0), ceiling)
    }

    pub fn model_for(&self, kind: ProviderKind) -> String {
        self.models
            .get(&kind)
            .filter(|m| !m.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| kind.default_model().to_string())
    }

    pub fn endpoint_for(&self, kind: ProviderKind) -> String {
        self.endpoints
            .get(&kind)
            .filter(|e| !e.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| kind.default_endpoint().to_string())
    }

    /// Build the config for the active provider.
    ///
    /// `override_kind` (from `--provider`) takes precedence over the stored
    /// choice. The credential may still be absent; the adapter reports that
    /// as an auth error when a call is attempted.
    pub fn provider_config(
        &self,
        override_kind: Option<ProviderKind>,
    ) -> Result<ProviderConfig, ConfigError> {
        let kind = override_kind
            .or(self.provider)
            .ok_or(ConfigError::NoProvider)?;

        let mut config = ProviderConfig::new(kind)
            .with_endpoint(self.endpoint_for(kind))
            .with_model(self.model_for(kind))
            .with_timeout(Duration::from_secs(self.generation.timeout_secs.max(1)));
        if kind.is_hosted()
            && let Some((key, _)) = resolve_api_key(kind, self)
        {
            config = config.with_credential(key);
        }
        Ok(config)
    }
}

pub fn clamp_creativity(value: f32) -> f32 {
    if value.is_nan() {
        return DEFAULT_TEMPERATURE;
    }
    value.clamp(0.0, MAX_TEMPERATURE)
}

/// Reads and writes the settings file.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// Store at `$GITBRO_CONFIG`, or the default location in the home directory.
    pub fn locate() -> Result<Self, ConfigError> {
        if let Ok(path) = std::env::var(CONFIG_ENV)
            && !path.trim().is_empty()
        {
            return Ok(Self::at(path));
        }
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(Self::at(home.join(".gitbro").join("config.json")))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load settings. A missing file yields defaults.
    pub fn load(&self) -> Result<Settings, ConfigError> {
        let path_str = self.path.display().to_string();
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No config at {}, using defaults", path_str);
                return Ok(Settings::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path_str,
                    source,
                });
            }
        };

        if content.trim().is_empty() {
            return Ok(Settings::default());
        }

        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path_str,
            source,
        })
    }

    /// Load settings, falling back to defaults when the file is unreadable or
    /// corrupt. For commands that never talk to a provider.
    pub fn load_or_default(&self) -> Settings {
        self.load().unwrap_or_else(|e| {
            warn!("{}; using default settings", e);
            Settings::default()
        })
    }

    /// Atomically replace the settings file. The file is readable by the owner only.
    pub fn save(&self, settings: &Settings) -> Result<(), ConfigError> {
        let path_str = self.path.display().to_string();
        let write_err = |source: std::io::Error| ConfigError::Write {
            path: path_str.clone(),
            source,
        };

        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(write_err)?;

        let json = serde_json::to_string_pretty(settings)
            .map_err(|e| write_err(std::io::Error::other(e)))?;

        let mut tmp = NamedTempFile::new_in(&dir).map_err(write_err)?;
        tmp.write_all(json.as_bytes()).map_err(write_err)?;
        tmp.write_all(b"\n").map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(tmp.path(), fs::Permissions::from_mode(0o600))
                .map_err(write_err)?;
        }

        tmp.persist(&self.path).map_err(|e| write_err(e.error))?;
        debug!("Saved config to {}", path_str);
        Ok(())
    }

    /// Load, apply `update`, and save.
    pub fn update<F>(&self, update: F) -> Result<Settings, ConfigError>
    where
        F: FnOnce(&mut Settings),
    {
        let mut settings = self.load()?;
        update(&mut settings);
        self.save(&settings)?;
        Ok(settings)
    }
}
