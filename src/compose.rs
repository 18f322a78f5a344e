//! Turn an operation prompt plus request context into what gets sent to a model.

use serde::Serialize;

use crate::llm::client::CompletionRequest;
use crate::llm::prompts::build_prompt;
use crate::model::{OperationPrompt, PromptTestConfig, TestEmail};
use crate::variables::{build_final_prompt, substitute, VariableContext};

/// A rendered prompt. Without a system part the whole prompt travels as the user turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposedPrompt {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub user: String,
}

impl ComposedPrompt {
    /// The prompt recorded on test results: the system part when there is one.
    pub fn generated_prompt(&self) -> &str {
        self.system.as_deref().unwrap_or(&self.user)
    }

    pub fn is_empty(&self) -> bool {
        self.generated_prompt().trim().is_empty()
    }

    pub fn to_request(&self, max_tokens: Option<u32>) -> CompletionRequest {
        let (system, user) = match &self.system {
            // Some providers reject an empty user turn.
            Some(system) if self.user.trim().is_empty() => (None, system.clone()),
            other => (other.clone(), self.user.clone()),
        };
        CompletionRequest {
            system,
            user,
            temperature: None,
            max_tokens,
        }
    }
}

/// Render a saved operation prompt and its user message template.
///
/// The user turn is the rendered template when one is saved, else the raw user input.
pub fn compose_saved(
    saved: &OperationPrompt,
    config: &PromptTestConfig,
    email: Option<&TestEmail>,
) -> ComposedPrompt {
    let ctx = VariableContext::from_config(config, email);
    let user = match saved.user_message.as_deref().filter(|m| !m.trim().is_empty()) {
        Some(template) => substitute(template, &ctx),
        None => config.user_input.clone(),
    };
    ComposedPrompt {
        system: Some(build_final_prompt(&saved.prompt, &ctx)),
        user,
    }
}

/// The built-in compose prompt, sent as a single user turn.
pub fn compose_builtin(config: &PromptTestConfig, email: Option<&TestEmail>) -> ComposedPrompt {
    ComposedPrompt {
        system: None,
        user: build_prompt(config, email),
    }
}

/// Saved prompt when there is a non-empty one, else the built-in prompt.
pub fn compose(
    saved: Option<&OperationPrompt>,
    config: &PromptTestConfig,
    email: Option<&TestEmail>,
) -> ComposedPrompt {
    match saved.filter(|s| !s.prompt.trim().is_empty()) {
        Some(saved) => compose_saved(saved, config, email),
        None => compose_builtin(config, email),
    }
}
