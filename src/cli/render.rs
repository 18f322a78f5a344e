use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

use crate::cli::open_store;
use crate::compose::{compose, compose_saved, ComposedPrompt};
use crate::config::Config;
use crate::model::{OperationPrompt, OperationType, PromptTestConfig, StyleStrategy};

/// Everything `render` needs to build a request context.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub config_path: Option<String>,
    pub db: Option<PathBuf>,
    pub operation: OperationType,
    pub email_id: Option<String>,
    /// Prompt file used instead of the saved operation prompt.
    pub template: Option<PathBuf>,
    pub user_input: Option<String>,
    pub sender_name: Option<String>,
    pub sender_email: Option<String>,
    pub style: Option<StyleStrategy>,
    pub locale: Option<String>,
    pub custom_instruction: Option<String>,
}

impl RenderOptions {
    fn prompt_config(&self) -> PromptTestConfig {
        let mut config = PromptTestConfig::new(self.operation);
        config.user_input = self.user_input.clone().unwrap_or_default();
        config.sender_context.name = self.sender_name.clone().unwrap_or_default();
        config.sender_context.email = self.sender_email.clone();
        config.style_strategy = self.style.unwrap_or_default();
        config.locale = self.locale.clone();
        config.custom_instruction = self.custom_instruction.clone();
        config
    }
}

/// Print the prompt that would be sent for the given context. No AI call is made.
pub fn run(options: RenderOptions) -> Result<()> {
    let config = Config::load_with_path(options.config_path.clone())?;
    let store = open_store(&config, options.db.as_deref())?;
    let prompt_config = options.prompt_config();

    let email = match options.email_id.as_deref() {
        Some(id) => Some(
            store
                .get_email(id)?
                .with_context(|| format!("email {} not found", id))?,
        ),
        None => None,
    };

    let composed = match &options.template {
        Some(path) => {
            let template = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let saved = OperationPrompt {
                operation_type: options.operation,
                prompt: template,
                user_message: None,
                updated_at: None,
            };
            compose_saved(&saved, &prompt_config, email.as_ref())
        }
        None => {
            let saved = store.get_operation_prompt(options.operation)?;
            compose(saved.as_ref(), &prompt_config, email.as_ref())
        }
    };

    print!("{}", format_composed(&composed));
    Ok(())
}

fn format_composed(composed: &ComposedPrompt) -> String {
    match &composed.system {
        Some(system) => format!("=== SYSTEM ===\n{}\n\n=== USER ===\n{}\n", system, composed.user),
        None => format!("=== USER ===\n{}\n", composed.user),
    }
}
