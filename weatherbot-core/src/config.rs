use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, path::PathBuf, time::Duration};

use crate::{agent::DEFAULT_MAX_ITERATIONS, error::AgentError, session::DEFAULT_SESSION_TTL};

/// Secrets the bot needs from its operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialId {
    OpenAi,
    OpenWeather,
}

impl CredentialId {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialId::OpenAi => "openai",
            CredentialId::OpenWeather => "openweather",
        }
    }

    /// Human-facing service name.
    pub fn label(&self) -> &'static str {
        match self {
            CredentialId::OpenAi => "OpenAI",
            CredentialId::OpenWeather => "OpenWeather",
        }
    }

    /// Environment variable that overrides the stored key.
    pub fn env_var(&self) -> &'static str {
        match self {
            CredentialId::OpenAi => "OPENAI_API_KEY",
            CredentialId::OpenWeather => "WEATHER_API_KEY",
        }
    }

    pub const fn all() -> &'static [CredentialId] {
        &[CredentialId::OpenAi, CredentialId::OpenWeather]
    }
}

impl std::fmt::Display for CredentialId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for CredentialId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "openai" => Ok(CredentialId::OpenAi),
            "openweather" => Ok(CredentialId::OpenWeather),
            _ => Err(anyhow!(
                "Unknown credential '{value}'. Supported credentials: openai, openweather."
            )),
        }
    }
}

/// A single stored secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialConfig {
    pub api_key: String,
}

/// Base URLs of the upstream services.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub llm: String,
    pub geocoding: String,
    pub weather: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            llm: "https://api.openai.com/v1".to_string(),
            geocoding: "https://nominatim.openstreetmap.org".to_string(),
            weather: "http://api.openweathermap.org".to_string(),
        }
    }
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Chat model name sent to the completions endpoint.
    pub model: String,
    pub temperature: f32,
    /// Upper bound on model rounds per user turn.
    pub max_iterations: usize,
    pub http_timeout_secs: u64,
    /// Web sessions idle for longer than this are dropped.
    pub session_ttl_secs: u64,
    /// Sent to the geocoder, which rejects anonymous clients.
    pub user_agent: String,

    /// Example TOML:
    /// [credentials.openai]
    /// api_key = "..."
    pub credentials: HashMap<String, CredentialConfig>,

    pub endpoints: Endpoints,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".to_string(),
            temperature: 0.0,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            http_timeout_secs: 60,
            session_ttl_secs: DEFAULT_SESSION_TTL.as_secs(),
            user_agent: format!("weatherbot/{}", env!("CARGO_PKG_VERSION")),
            credentials: HashMap::new(),
            endpoints: Endpoints::default(),
        }
    }
}

impl Config {
    /// Load the config file (if any) and apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut cfg = Self::load_file()?;
        cfg.apply_env(|name| std::env::var(name).ok());
        Ok(cfg)
    }

    /// Load config from disk only, or return defaults if it doesn't exist yet.
    pub fn load_file() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("Invalid weatherbot configuration")
    }

    /// Override file values with environment variables resolved through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        for id in CredentialId::all() {
            if let Some(key) = value(id.env_var()) {
                self.upsert_api_key(*id, key);
            }
        }
        if let Some(model) = value("WEATHERBOT_MODEL") {
            self.model = model;
        }
        if let Some(base) = value("OPENAI_BASE_URL") {
            self.endpoints.llm = base;
        }
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weatherbot", "weatherbot")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Set or replace a stored key.
    pub fn upsert_api_key(&mut self, id: CredentialId, api_key: String) {
        self.credentials.insert(id.as_str().to_string(), CredentialConfig { api_key });
    }

    /// Returns the key for a credential, if present and not blank.
    pub fn api_key(&self, id: CredentialId) -> Option<&str> {
        self.credentials
            .get(id.as_str())
            .map(|cfg| cfg.api_key.as_str())
            .filter(|key| !key.trim().is_empty())
    }

    /// Like [`Config::api_key`], but a missing key is the blocking error shown to users.
    pub fn require_api_key(&self, id: CredentialId) -> Result<&str, AgentError> {
        self.api_key(id).ok_or(AgentError::MissingCredential(id))
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}
