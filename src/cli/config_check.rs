use anyhow::Result;
use std::path::PathBuf;

use crate::config::{Config, Provider};
use crate::settings::{google_key_configured, openai_key_configured, read_env_file};
use crate::store::Store;

struct CheckResult {
    passed: Vec<String>,
    warnings: Vec<String>,
    errors: Vec<String>,
}

impl CheckResult {
    fn new() -> Self {
        Self {
            passed: Vec::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn pass(&mut self, msg: impl Into<String>) {
        self.passed.push(msg.into());
    }

    fn warn(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    fn error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }
}

pub fn run(config_path: Option<String>, db: Option<PathBuf>) -> Result<()> {
    let results = check(config_path, db);
    print_results(&results);

    if !results.errors.is_empty() {
        anyhow::bail!("{} config error(s) found", results.errors.len());
    }
    Ok(())
}

fn check(config_path: Option<String>, db: Option<PathBuf>) -> CheckResult {
    let mut results = CheckResult::new();

    let config = match Config::load_with_path(config_path.clone()) {
        Ok(config) => {
            let source = config_path.as_deref().unwrap_or("default search path");
            results.pass(format!("Config loaded from {}", source));
            config
        }
        Err(e) => {
            results.error(format!("Failed to load config: {:#}", e));
            return results;
        }
    };

    // Env file
    let env_file = &config.settings.env_file;
    match read_env_file(env_file) {
        Ok(vars) if env_file.exists() => {
            results.pass(format!("Env file {} ({} values)", env_file.display(), vars.len()));
        }
        Ok(_) => results.warn(format!(
            "Env file {} not found; keys must come from the environment",
            env_file.display()
        )),
        Err(e) => results.error(format!("Env file {}: {:#}", env_file.display(), e)),
    }

    // Providers
    let default_provider = config.default_provider();
    results.pass(format!(
        "Default provider: {} (model: {})",
        default_provider,
        config.default_model(default_provider)
    ));
    for provider in Provider::ALL {
        check_api_key(&config, provider, provider == default_provider, &mut results);
    }

    // Database
    let db_path = db.unwrap_or_else(|| config.storage.db_path());
    match Store::open(&db_path).and_then(|store| store.count_emails()) {
        Ok(count) => results.pass(format!("Database {} ({} emails)", db_path.display(), count)),
        Err(e) => results.error(format!("Database {}: {:#}", db_path.display(), e)),
    }

    results
}

fn check_api_key(config: &Config, provider: Provider, is_default: bool, results: &mut CheckResult) {
    let var = config.api_key_env(provider);
    let Some(key) = config.lookup(var) else {
        let msg = format!("{}: {} is not set", provider, var);
        if is_default {
            results.error(msg);
        } else {
            results.warn(msg);
        }
        return;
    };

    let looks_valid = match provider {
        Provider::OpenAI => openai_key_configured(&key),
        Provider::Gemini => google_key_configured(&key),
    };
    if looks_valid {
        results.pass(format!("{}: {} is set", provider, var));
    } else {
        results.warn(format!("{}: {} does not look like a real key", provider, var));
    }
}

fn print_results(results: &CheckResult) {
    println!();
    for msg in &results.passed {
        println!("  \u{2713} {}", msg);
    }
    for msg in &results.warnings {
        println!("  ! {}", msg);
    }
    for msg in &results.errors {
        println!("  \u{2717} {}", msg);
    }
    println!();
    println!(
        "{} passed, {} warnings, {} errors",
        results.passed.len(),
        results.warnings.len(),
        results.errors.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use std::fs;

    /// Saves an env var and restores it on drop.
    struct EnvGuard {
        var: &'static str,
        saved: Option<String>,
    }

    impl EnvGuard {
        fn new(var: &'static str) -> Self {
            Self {
                var,
                saved: env::var(var).ok(),
            }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match &self.saved {
                Some(val) => env::set_var(self.var, val),
                None => env::remove_var(self.var),
            }
        }
    }

    fn write_config(dir: &std::path::Path) -> String {
        let path = dir.join("filoprompt.toml");
        let content = format!(
            "[ai]\ndefault_provider = \"openai\"\n\n[settings]\nenv_file = \"{}\"\n",
            dir.join(".env.local").display()
        );
        fs::write(&path, content).unwrap();
        path.display().to_string()
    }

    #[test]
    #[serial]
    fn test_missing_default_key_is_an_error() {
        let _openai = EnvGuard::new("OPENAI_API_KEY");
        let _google = EnvGuard::new("GOOGLE_AI_API_KEY");
        let _provider = EnvGuard::new("DEFAULT_AI_PROVIDER");
        env::remove_var("OPENAI_API_KEY");
        env::remove_var("GOOGLE_AI_API_KEY");
        env::remove_var("DEFAULT_AI_PROVIDER");

        let dir = tempfile::tempdir().unwrap();
        let config = write_config(dir.path());
        let results = check(Some(config.clone()), Some(dir.path().join("check.db")));

        assert!(results
            .errors
            .iter()
            .any(|e| e.contains("OPENAI_API_KEY is not set")));
        assert!(results
            .warnings
            .iter()
            .any(|w| w.contains("GOOGLE_AI_API_KEY is not set")));
        assert!(run(Some(config), Some(dir.path().join("check.db"))).is_err());
    }

    #[test]
    #[serial]
    fn test_keys_from_env_file_pass() {
        let _openai = EnvGuard::new("OPENAI_API_KEY");
        let _google = EnvGuard::new("GOOGLE_AI_API_KEY");
        let _provider = EnvGuard::new("DEFAULT_AI_PROVIDER");
        env::remove_var("OPENAI_API_KEY");
        env::remove_var("GOOGLE_AI_API_KEY");
        env::remove_var("DEFAULT_AI_PROVIDER");

        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(".env.local"),
            "OPENAI_API_KEY=sk-real-key\nGOOGLE_AI_API_KEY=xxx\n",
        )
        .unwrap();
        let config = write_config(dir.path());
        let results = check(Some(config), Some(dir.path().join("check.db")));

        assert!(results.errors.is_empty(), "{:?}", results.errors);
        assert!(results.passed.iter().any(|p| p.contains("OPENAI_API_KEY is set")));
        assert!(results
            .warnings
            .iter()
            .any(|w| w.contains("does not look like a real key")));
        assert!(results.passed.iter().any(|p| p.contains("0 emails")));
    }

    #[test]
    fn test_bad_config_path_reports_error() {
        let results = check(Some("/nonexistent/filoprompt.toml".to_string()), None);
        assert_eq!(results.errors.len(), 1);
        assert!(results.errors[0].starts_with("Failed to load config"));
    }
}
