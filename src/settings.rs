//! The `.env.local` file behind the settings screen.
//!
//! Keys live here so they can be entered from the browser. The file is always
//! rewritten in one fixed layout; comments and unknown keys are dropped.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

const MASKED: &str = "***configured***";
const DEFAULT_PROVIDER: &str = "gemini";
const DEFAULT_OPENAI_MODEL: &str = "gpt-5.2-chat-latest";
const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

pub const SAVED_MESSAGE: &str =
    "Settings saved. Please restart the server for changes to take effect.";

/// What the settings screen shows. Keys are never returned in clear.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsView {
    pub openai_api_key: String,
    pub google_api_key: String,
    pub openai_key_configured: bool,
    pub google_key_configured: bool,
    pub default_provider: String,
    pub openai_model: String,
    pub gemini_model: String,
}

/// Fields posted by the settings screen. Absent or empty fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsUpdate {
    pub openai_api_key: Option<String>,
    pub google_api_key: Option<String>,
    pub default_provider: Option<String>,
    pub openai_model: Option<String>,
    pub gemini_model: Option<String>,
}

/// Parse dotenv content. Quotes are removed, comments and empty values skipped.
/// Lines that are not assignments are logged and ignored.
pub fn parse_env(content: &str) -> BTreeMap<String, String> {
    collect_vars(dotenvy::from_read_iter(content.as_bytes()))
}

/// Variables in the env file. A missing file reads as empty.
pub fn read_env_file(path: &Path) -> Result<BTreeMap<String, String>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let iter = dotenvy::from_path_iter(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(collect_vars(iter))
}

fn collect_vars(
    items: impl Iterator<Item = std::result::Result<(String, String), dotenvy::Error>>,
) -> BTreeMap<String, String> {
    items
        .filter_map(|item| match item {
            Ok((key, value)) => {
                let value = value.trim();
                (!value.is_empty()).then(|| (key, value.to_string()))
            }
            Err(e) => {
                warn!("skipping env file line: {}", e);
                None
            }
        })
        .collect()
}

pub fn openai_key_configured(key: &str) -> bool {
    key.starts_with("sk-") && key != "sk-xxx"
}

pub fn google_key_configured(key: &str) -> bool {
    key != "xxx" && key.chars().count() > 10
}

pub fn load_settings(path: &Path) -> Result<SettingsView> {
    let vars = read_env_file(path)?;
    let openai_ok = vars
        .get("OPENAI_API_KEY")
        .is_some_and(|key| openai_key_configured(key));
    let google_ok = vars
        .get("GOOGLE_AI_API_KEY")
        .is_some_and(|key| google_key_configured(key));
    let or_default = |key: &str, default: &str| {
        vars.get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    };

    Ok(SettingsView {
        openai_api_key: if openai_ok { MASKED.to_string() } else { String::new() },
        google_api_key: if google_ok { MASKED.to_string() } else { String::new() },
        openai_key_configured: openai_ok,
        google_key_configured: google_ok,
        default_provider: or_default("DEFAULT_AI_PROVIDER", DEFAULT_PROVIDER),
        openai_model: or_default("OPENAI_MODEL", DEFAULT_OPENAI_MODEL),
        gemini_model: or_default("GEMINI_MODEL", DEFAULT_GEMINI_MODEL),
    })
}

/// Merge `update` into the file and rewrite it atomically.
pub fn save_settings(path: &Path, update: &SettingsUpdate) -> Result<()> {
    let mut vars = read_env_file(path)?;

    let mut set = |key: &str, value: &Option<String>, reject_masked: bool| {
        if let Some(value) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            if reject_masked && value.contains("***") {
                return;
            }
            vars.insert(key.to_string(), value.to_string());
        }
    };
    set("OPENAI_API_KEY", &update.openai_api_key, true);
    set("GOOGLE_AI_API_KEY", &update.google_api_key, true);
    set("DEFAULT_AI_PROVIDER", &update.default_provider, false);
    set("OPENAI_MODEL", &update.openai_model, false);
    set("GEMINI_MODEL", &update.gemini_model, false);

    let value = |key: &str, default: &str| {
        vars.get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    };
    let content = format!(
        "# AI API Keys\n\
         OPENAI_API_KEY={}\n\
         GOOGLE_AI_API_KEY={}\n\
         \n\
         # Default AI Provider: openai | gemini\n\
         DEFAULT_AI_PROVIDER={}\n\
         \n\
         # Default Model\n\
         OPENAI_MODEL={}\n\
         GEMINI_MODEL={}\n",
        value("OPENAI_API_KEY", "sk-xxx"),
        value("GOOGLE_AI_API_KEY", "xxx"),
        value("DEFAULT_AI_PROVIDER", DEFAULT_PROVIDER),
        value("OPENAI_MODEL", DEFAULT_OPENAI_MODEL),
        value("GEMINI_MODEL", DEFAULT_GEMINI_MODEL),
    );

    write_atomically(path, &content)?;
    info!("Saved settings to {}", path.display());
    Ok(())
}

fn write_atomically(path: &Path, content: &str) -> Result<()> {
    let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(dir) => {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
            dir
        }
        None => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("failed to create temp file in {}", dir.display()))?;
    tmp.write_all(content.as_bytes())
        .context("failed to write settings")?;
    tmp.persist(path)
        .with_context(|| format!("failed to replace {}", path.display()))?;
    Ok(())
}
