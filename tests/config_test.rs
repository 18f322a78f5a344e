//! Configuration loading from files and the settings env file.

use anyhow::Result;
use filoprompt::config::{Config, Provider};
use serial_test::serial;
use std::env;
use std::fs;

#[test]
fn test_config_has_defaults() -> Result<()> {
    let config = Config::default();

    assert_eq!(config.ai.timeout_secs, 120);
    assert!(config.ai.max_tokens.is_none());
    assert!(config.ai.openai_base_url.is_none());
    assert!(!config.ai.gemini_model.is_empty());

    Ok(())
}

#[test]
fn test_load_from_explicit_path() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("custom.toml");
    fs::write(
        &path,
        r#"
[server]
bind = "0.0.0.0:9000"

[storage]
data_dir = "/var/lib/filoprompt"

[ai]
default_provider = "openai"
openai_model = "gpt-4o"
max_tokens = 2048
"#,
    )?;

    let config = Config::load_with_path(Some(path.display().to_string()))?;
    assert_eq!(config.server.bind, "0.0.0.0:9000");
    assert_eq!(
        config.storage.db_path().display().to_string(),
        "/var/lib/filoprompt/filoprompt.db"
    );
    assert_eq!(config.ai.default_provider, Provider::OpenAI);
    assert_eq!(config.ai.openai_model, "gpt-4o");
    assert_eq!(config.ai.max_tokens, Some(2048));
    Ok(())
}

#[test]
fn test_missing_explicit_path_is_an_error() {
    let err = Config::load_with_path(Some("/nonexistent/filoprompt.toml".to_string())).unwrap_err();
    assert!(err.to_string().contains("failed to load config"));
}

#[test]
fn test_invalid_toml_is_an_error() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("bad.toml");
    fs::write(&path, "[ai\ndefault_provider = ")?;
    assert!(Config::load_with_path(Some(path.display().to_string())).is_err());
    Ok(())
}

#[test]
#[serial]
fn test_env_file_overrides_model_defaults() -> Result<()> {
    env::remove_var("DEFAULT_AI_PROVIDER");
    env::remove_var("OPENAI_MODEL");

    let dir = tempfile::tempdir()?;
    let mut config = Config::default();
    config.settings.env_file = dir.path().join(".env.local");
    fs::write(
        &config.settings.env_file,
        "DEFAULT_AI_PROVIDER=openai\nOPENAI_MODEL=gpt-4o-mini\n",
    )?;

    assert_eq!(config.default_provider(), Provider::OpenAI);
    let (provider, model) = config.resolve_ai(None, None)?;
    assert_eq!(provider, Provider::OpenAI);
    assert_eq!(model, "gpt-4o-mini");
    Ok(())
}

#[test]
#[serial]
fn test_process_env_wins_over_env_file() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut config = Config::default();
    config.settings.env_file = dir.path().join(".env.local");
    config.ai.gemini_api_key_env = "FILOPROMPT_IT_GEMINI_KEY".to_string();
    fs::write(&config.settings.env_file, "FILOPROMPT_IT_GEMINI_KEY=from-file-key\n")?;

    env::set_var("FILOPROMPT_IT_GEMINI_KEY", "from-env-key");
    let key = config.api_key(Provider::Gemini);
    env::remove_var("FILOPROMPT_IT_GEMINI_KEY");

    assert_eq!(key?, "from-env-key");
    assert_eq!(config.api_key(Provider::Gemini)?, "from-file-key");
    Ok(())
}

#[test]
#[serial]
fn test_quoted_key_in_env_file_is_unquoted() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut config = Config::default();
    config.settings.env_file = dir.path().join(".env.local");
    config.ai.openai_api_key_env = "FILOPROMPT_IT_QUOTED_OPENAI_KEY".to_string();
    env::remove_var("FILOPROMPT_IT_QUOTED_OPENAI_KEY");
    fs::write(
        &config.settings.env_file,
        "FILOPROMPT_IT_QUOTED_OPENAI_KEY=\"sk-abc123\"\n",
    )?;

    assert_eq!(config.api_key(Provider::OpenAI)?, "sk-abc123");
    Ok(())
}
