use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

use crate::settings::read_env_file;

/// The AI backends a prompt can be sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[serde(rename = "openai")]
    OpenAI,
    #[default]
    Gemini,
}

impl Provider {
    pub const ALL: [Provider; 2] = [Provider::OpenAI, Provider::Gemini];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAI => "openai",
            Provider::Gemini => "gemini",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAI),
            "gemini" => Ok(Provider::Gemini),
            other => bail!("Unknown provider: {}", other),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub settings: SettingsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP API listens on (default: "127.0.0.1:3000")
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding `filoprompt.db` (default: "data")
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl StorageConfig {
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("filoprompt.db")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(default)]
    pub default_provider: Provider,

    #[serde(default = "default_openai_model")]
    pub openai_model: String,

    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,

    /// Models used to score outputs against golden results
    #[serde(default = "default_openai_comparison_model")]
    pub openai_comparison_model: String,

    #[serde(default = "default_gemini_comparison_model")]
    pub gemini_comparison_model: String,

    #[serde(default = "default_openai_key_env")]
    pub openai_api_key_env: String,

    #[serde(default = "default_gemini_key_env")]
    pub gemini_api_key_env: String,

    /// Override for OpenAI-compatible gateways and tests
    #[serde(default)]
    pub openai_base_url: Option<String>,

    #[serde(default)]
    pub gemini_base_url: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Optional: cap on output tokens. Provider/model defaults apply otherwise.
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            default_provider: Provider::default(),
            openai_model: default_openai_model(),
            gemini_model: default_gemini_model(),
            openai_comparison_model: default_openai_comparison_model(),
            gemini_comparison_model: default_gemini_comparison_model(),
            openai_api_key_env: default_openai_key_env(),
            gemini_api_key_env: default_gemini_key_env(),
            openai_base_url: None,
            gemini_base_url: None,
            timeout_secs: default_timeout_secs(),
            max_tokens: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsConfig {
    /// Env-style file edited by the settings endpoint (default: ".env.local")
    #[serde(default = "default_env_file")]
    pub env_file: PathBuf,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            env_file: default_env_file(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_openai_model() -> String {
    "gpt-5.2-chat-latest".to_string()
}

fn default_gemini_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_openai_comparison_model() -> String {
    "gpt-5.2-pro".to_string()
}

fn default_gemini_comparison_model() -> String {
    "gemini-3-pro".to_string()
}

fn default_openai_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_gemini_key_env() -> String {
    "GOOGLE_AI_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_env_file() -> PathBuf {
    PathBuf::from(".env.local")
}

/// Values written by the settings screen before a real key is entered.
const KEY_PLACEHOLDERS: [&str; 2] = ["sk-xxx", "xxx"];

impl Config {
    /// Load configuration from a specific path, or use default search paths
    pub fn load_with_path(path: Option<String>) -> Result<Self> {
        if let Some(config_path) = path {
            debug!("Loading config from explicit path: {}", config_path);
            return Self::load_from_path(&config_path)
                .with_context(|| format!("failed to load config from {}", config_path));
        }

        if let Ok(config) = Self::load_from_path("filoprompt.toml") {
            debug!("Loaded config from ./filoprompt.toml");
            return Ok(config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join("filoprompt").join("config.toml");
            if let Ok(config) = Self::load_from_path(&config_path) {
                debug!("Loaded config from {:?}", config_path);
                return Ok(config);
            }
        }

        debug!("Using default config");
        Ok(Self::default())
    }

    fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Look a setting up in the process environment, then in the env file.
    /// Empty values count as unset.
    pub fn lookup(&self, key: &str) -> Option<String> {
        if let Ok(value) = env::var(key) {
            if !value.trim().is_empty() {
                return Some(value.trim().to_string());
            }
        }
        read_env_file(&self.settings.env_file)
            .ok()
            .and_then(|mut vars| vars.remove(key))
    }

    pub fn api_key_env(&self, provider: Provider) -> &str {
        match provider {
            Provider::OpenAI => &self.ai.openai_api_key_env,
            Provider::Gemini => &self.ai.gemini_api_key_env,
        }
    }

    /// API key for `provider`. Missing keys and settings placeholders are errors.
    pub fn api_key(&self, provider: Provider) -> Result<String> {
        let var = self.api_key_env(provider);
        match self.lookup(var) {
            Some(key) if !KEY_PLACEHOLDERS.contains(&key.as_str()) => Ok(key),
            _ => bail!("{} is not set", var),
        }
    }

    /// Provider used when a request names none: env/env file, then config.
    pub fn default_provider(&self) -> Provider {
        self.lookup("DEFAULT_AI_PROVIDER")
            .and_then(|p| p.parse().ok())
            .unwrap_or(self.ai.default_provider)
    }

    /// Generation model used when a request names none.
    pub fn default_model(&self, provider: Provider) -> String {
        match provider {
            Provider::OpenAI => self
                .lookup("OPENAI_MODEL")
                .unwrap_or_else(|| self.ai.openai_model.clone()),
            Provider::Gemini => self
                .lookup("GEMINI_MODEL")
                .unwrap_or_else(|| self.ai.gemini_model.clone()),
        }
    }

    pub fn comparison_model(&self, provider: Provider) -> &str {
        match provider {
            Provider::OpenAI => &self.ai.openai_comparison_model,
            Provider::Gemini => &self.ai.gemini_comparison_model,
        }
    }

    /// Fill in whatever the caller left out of a provider/model choice.
    pub fn resolve_ai(&self, provider: Option<&str>, model: Option<&str>) -> Result<(Provider, String)> {
        let provider = match provider.map(str::trim).filter(|p| !p.is_empty()) {
            Some(p) => p.parse()?,
            None => self.default_provider(),
        };
        let model = model
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.default_model(provider));
        Ok((provider, model))
    }
}
