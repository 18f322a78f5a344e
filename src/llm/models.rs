//! Model names offered per provider.

use serde::Serialize;

use crate::config::{Config, Provider};

const OPENAI_MODELS: &[&str] = &[
    "gpt-5.2-chat-latest",
    "gpt-5.2-pro",
    "gpt-5.2-pro-2025-12-11",
    "gpt-5.1-codex",
    "gpt-5.1-codex-mini",
    "gpt-5.1-codex-max",
    "gpt-4o",
    "gpt-4o-mini",
    "o1",
    "o1-mini",
];

const GEMINI_MODELS: &[&str] = &[
    "gemini-3-flash-preview",
    "gemini-3-pro-preview",
    "gemini-2.5-flash",
    "gemini-2.5-pro",
    "gemini-2.0-flash",
    "gemini-2.0-flash-lite",
];

const OPENAI_COMPARISON_MODELS: &[&str] = &["gpt-5.2-pro", "o1", "gpt-4o"];
const GEMINI_COMPARISON_MODELS: &[&str] = &["gemini-3-pro", "gemini-2.5-pro"];

/// Models that can generate drafts.
pub fn available_models(provider: Provider) -> &'static [&'static str] {
    match provider {
        Provider::OpenAI => OPENAI_MODELS,
        Provider::Gemini => GEMINI_MODELS,
    }
}

/// Models suited to scoring outputs against golden results, best first.
pub fn comparison_models(provider: Provider) -> &'static [&'static str] {
    match provider {
        Provider::OpenAI => OPENAI_COMPARISON_MODELS,
        Provider::Gemini => GEMINI_COMPARISON_MODELS,
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderModels {
    pub provider: Provider,
    pub models: Vec<String>,
    pub comparison_models: Vec<String>,
    pub default_model: String,
    pub default_comparison_model: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelCatalogue {
    pub default_provider: Provider,
    pub providers: Vec<ProviderModels>,
}

/// Everything the model pickers need, with configured defaults filled in.
pub fn catalogue(config: &Config) -> ModelCatalogue {
    let to_owned = |names: &[&str]| names.iter().map(|n| n.to_string()).collect();
    ModelCatalogue {
        default_provider: config.default_provider(),
        providers: Provider::ALL
            .into_iter()
            .map(|provider| ProviderModels {
                provider,
                models: to_owned(available_models(provider)),
                comparison_models: to_owned(comparison_models(provider)),
                default_model: config.default_model(provider),
                default_comparison_model: config.comparison_model(provider).to_string(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_models_are_offered() {
        assert!(available_models(Provider::Gemini).contains(&"gemini-2.5-flash"));
        assert!(available_models(Provider::OpenAI).contains(&"gpt-5.2-chat-latest"));
        assert_eq!(comparison_models(Provider::Gemini)[0], "gemini-3-pro");
        assert_eq!(comparison_models(Provider::OpenAI)[0], "gpt-5.2-pro");
    }

    #[test]
    fn test_catalogue_covers_every_provider() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.settings.env_file = dir.path().join(".env.local");
        let catalogue = catalogue(&config);
        assert_eq!(catalogue.providers.len(), 2);
        let json = serde_json::to_value(&catalogue).unwrap();
        assert_eq!(json["providers"][0]["provider"], "openai");
        assert_eq!(json["providers"][1]["defaultComparisonModel"], "gemini-3-pro");
    }
}
