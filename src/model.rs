//! Domain types shared by the store, the prompt engine and the HTTP layer.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::llm::client::Completion;

/// A sample message uploaded for prompt testing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestEmail {
    pub id: String,
    pub subject: String,
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cc: Option<String>,
    pub date: String,
    /// Extracted plain text, derived from `raw_eml` / `body_html`.
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_html: Option<String>,
    pub raw_eml: String,
    pub file_name: String,
    pub created_at: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// The email-assistant actions a prompt can be written for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    NewEmail,
    ReplyEmail,
    ForwardEmail,
    Summarize,
    ExtractActionItems,
    Todo,
}

impl OperationType {
    pub const ALL: [OperationType; 6] = [
        OperationType::NewEmail,
        OperationType::ReplyEmail,
        OperationType::ForwardEmail,
        OperationType::Summarize,
        OperationType::ExtractActionItems,
        OperationType::Todo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::NewEmail => "new_email",
            OperationType::ReplyEmail => "reply_email",
            OperationType::ForwardEmail => "forward_email",
            OperationType::Summarize => "summarize",
            OperationType::ExtractActionItems => "extract_action_items",
            OperationType::Todo => "todo",
        }
    }

    /// Label rendered into `{{EXTRA.operationType}}`.
    pub fn label(&self) -> &'static str {
        match self {
            OperationType::NewEmail => "NEW",
            OperationType::ReplyEmail => "REPLY",
            OperationType::ForwardEmail => "FORWARD",
            OperationType::Summarize => "SUMMARIZE",
            OperationType::ExtractActionItems => "EXTRACT_ACTION_ITEMS",
            OperationType::Todo => "TODO",
        }
    }

    /// Phrase used by the built-in compose prompt.
    pub fn description(&self) -> &'static str {
        match self {
            OperationType::NewEmail => "composing a new email",
            OperationType::ReplyEmail => "replying to an email thread",
            OperationType::ForwardEmail => "forwarding an email with additional context",
            OperationType::Summarize => "summarizing an email or thread",
            OperationType::ExtractActionItems => "extracting action items from an email",
            OperationType::Todo => "extracting todo items from an email",
        }
    }

    /// Operations that act on an existing message and therefore see `MAIL*` variables.
    pub fn acts_on_email(&self) -> bool {
        !matches!(self, OperationType::NewEmail)
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "new_email" => Ok(OperationType::NewEmail),
            "reply_email" => Ok(OperationType::ReplyEmail),
            "forward_email" => Ok(OperationType::ForwardEmail),
            "summarize" => Ok(OperationType::Summarize),
            "extract_action_items" => Ok(OperationType::ExtractActionItems),
            "todo" => Ok(OperationType::Todo),
            other => bail!("Unknown operation type: {}", other),
        }
    }
}

/// Writing style selected for a compose request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StyleStrategy {
    #[default]
    Professional,
    Casual,
    Concise,
    Detailed,
    Friendly,
}

impl StyleStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            StyleStrategy::Professional => "Professional",
            StyleStrategy::Casual => "Casual",
            StyleStrategy::Concise => "Concise",
            StyleStrategy::Detailed => "Detailed",
            StyleStrategy::Friendly => "Friendly",
        }
    }

    pub fn guidelines(&self) -> &'static str {
        match self {
            StyleStrategy::Professional => "Maintain a formal, respectful, and objective tone. Use standard business vocabulary and complete sentences. Avoid colloquialisms and maintain appropriate distance.",
            StyleStrategy::Casual => "Use a relaxed, friendly tone. Contractions and informal language are acceptable. Keep it conversational but still respectful.",
            StyleStrategy::Concise => "Be brief and to the point. Use short sentences and bullet points where appropriate. Eliminate unnecessary words and filler content.",
            StyleStrategy::Detailed => "Provide comprehensive information with context and explanation. Use structured formatting with headers and lists for clarity.",
            StyleStrategy::Friendly => "Warm and approachable tone. Use positive language and show genuine interest. Include appropriate pleasantries.",
        }
    }
}

impl fmt::Display for StyleStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StyleStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "professional" => Ok(StyleStrategy::Professional),
            "casual" => Ok(StyleStrategy::Casual),
            "concise" => Ok(StyleStrategy::Concise),
            "detailed" => Ok(StyleStrategy::Detailed),
            "friendly" => Ok(StyleStrategy::Friendly),
            other => bail!("Unknown style strategy: {}", other),
        }
    }
}

/// Who the assistant is writing on behalf of.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SenderContext {
    pub name: String,
    pub email: Option<String>,
    pub has_external_signature: bool,
}

/// Request-side configuration of a prompt test, as submitted by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptTestConfig {
    pub operation_type: OperationType,
    #[serde(default)]
    pub user_input: String,
    #[serde(default)]
    pub style_strategy: StyleStrategy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_instruction: Option<String>,
    #[serde(default)]
    pub sender_context: SenderContext,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all_mails: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profiles: Option<String>,
}

impl PromptTestConfig {
    pub fn new(operation_type: OperationType) -> Self {
        Self {
            operation_type,
            user_input: String::new(),
            style_strategy: StyleStrategy::default(),
            custom_instruction: None,
            sender_context: SenderContext::default(),
            all_mails: None,
            locale: None,
            category: None,
            profiles: None,
        }
    }
}

/// Saved system prompt (and optional user-message template) for one operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationPrompt {
    pub operation_type: OperationType,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_message: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Approved reference output for an (email, operation) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoldenResult {
    pub id: String,
    pub email_id: String,
    pub operation_type: OperationType,
    pub prompt: String,
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptTemplate {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub template: String,
    #[serde(default)]
    pub variables: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// One persisted generation run against a test email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub id: String,
    pub test_email_id: String,
    pub config: PromptTestConfig,
    pub generated_prompt: String,
    pub ai_response: Completion,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub human_critique: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blame_analysis: Option<BlameAnalysis>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblematicSection {
    pub section: String,
    pub issue: String,
    pub suggestion: String,
}

/// Diagnosis of why an output missed the critic's expectations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlameAnalysis {
    pub reasoning: String,
    #[serde(default)]
    pub problematic_sections: Vec<ProblematicSection>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    KeepNew,
    KeepOld,
    #[default]
    Review,
}

impl Recommendation {
    /// Lenient parse; anything unrecognised needs a human look.
    pub fn parse_lenient(s: &str) -> Self {
        match s {
            "keep_new" => Recommendation::KeepNew,
            "keep_old" => Recommendation::KeepOld,
            _ => Recommendation::Review,
        }
    }
}

/// Score of a new output measured against a golden result. 50 means equal quality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonScore {
    pub score: u8,
    pub reasoning: String,
    #[serde(default)]
    pub improvements: Vec<String>,
    #[serde(default)]
    pub regressions: Vec<String>,
    pub recommendation: Recommendation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiSelection {
    pub provider: String,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchConfig {
    pub name: String,
    pub email_ids: Vec<String>,
    pub prompt_config: PromptTestConfig,
    pub ai_config: AiSelection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItemResult {
    pub email_id: String,
    pub email_subject: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    pub has_golden_result: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub golden_output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparison: Option<ComparisonScore>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub avg_latency_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRun {
    pub id: String,
    pub config: BatchConfig,
    pub results: Vec<BatchItemResult>,
    pub summary: BatchSummary,
    #[serde(default)]
    pub status: String,
    pub created_at: String,
}

/// Built-in text rewriting actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WritingToolId {
    Expand,
    Shorten,
    SpellCheck,
    Formal,
    Casual,
    TranslateZh,
    TranslateEn,
}

impl WritingToolId {
    pub const ALL: [WritingToolId; 7] = [
        WritingToolId::Expand,
        WritingToolId::Shorten,
        WritingToolId::SpellCheck,
        WritingToolId::Formal,
        WritingToolId::Casual,
        WritingToolId::TranslateZh,
        WritingToolId::TranslateEn,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WritingToolId::Expand => "expand",
            WritingToolId::Shorten => "shorten",
            WritingToolId::SpellCheck => "spell_check",
            WritingToolId::Formal => "formal",
            WritingToolId::Casual => "casual",
            WritingToolId::TranslateZh => "translate_zh",
            WritingToolId::TranslateEn => "translate_en",
        }
    }
}

impl FromStr for WritingToolId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        WritingToolId::ALL
            .into_iter()
            .find(|tool| tool.as_str() == s.trim())
            .ok_or_else(|| anyhow::anyhow!("Unknown tool: {}", s))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WritingTool {
    pub id: WritingToolId,
    pub name: String,
    pub description: String,
    pub prompt: String,
    pub updated_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_type_round_trips_through_str() {
        for op in OperationType::ALL {
            assert_eq!(op.as_str().parse::<OperationType>().unwrap(), op);
        }
    }

    #[test]
    fn test_operation_type_unknown_fails() {
        let err = "reply_all".parse::<OperationType>().unwrap_err();
        assert!(err.to_string().contains("Unknown operation type"));
    }

    #[test]
    fn test_operation_labels() {
        assert_eq!(OperationType::NewEmail.label(), "NEW");
        assert_eq!(
            OperationType::ExtractActionItems.label(),
            "EXTRACT_ACTION_ITEMS"
        );
        assert!(!OperationType::NewEmail.acts_on_email());
        assert!(OperationType::Todo.acts_on_email());
    }

    #[test]
    fn test_operation_type_serde_snake_case() {
        let json = serde_json::to_string(&OperationType::ForwardEmail).unwrap();
        assert_eq!(json, "\"forward_email\"");
    }

    #[test]
    fn test_style_strategy_parse_is_case_insensitive() {
        assert_eq!(
            "concise".parse::<StyleStrategy>().unwrap(),
            StyleStrategy::Concise
        );
        assert_eq!(StyleStrategy::default(), StyleStrategy::Professional);
        assert!("shouty".parse::<StyleStrategy>().is_err());
    }

    #[test]
    fn test_prompt_test_config_defaults_from_minimal_json() {
        let config: PromptTestConfig =
            serde_json::from_str(r#"{"operationType": "reply_email"}"#).unwrap();
        assert_eq!(config.operation_type, OperationType::ReplyEmail);
        assert_eq!(config.style_strategy, StyleStrategy::Professional);
        assert!(config.user_input.is_empty());
        assert!(!config.sender_context.has_external_signature);
    }

    #[test]
    fn test_recommendation_lenient_parse() {
        assert_eq!(Recommendation::parse_lenient("keep_new"), Recommendation::KeepNew);
        assert_eq!(Recommendation::parse_lenient("keep_old"), Recommendation::KeepOld);
        assert_eq!(Recommendation::parse_lenient("maybe"), Recommendation::Review);
    }

    #[test]
    fn test_writing_tool_id_parse() {
        assert_eq!(
            "spell_check".parse::<WritingToolId>().unwrap(),
            WritingToolId::SpellCheck
        );
        assert!("custom".parse::<WritingToolId>().is_err());
    }
}
