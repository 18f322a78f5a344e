use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One prompt to send: an optional system prompt plus the user turn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionRequest {
    pub system: Option<String>,
    pub user: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            ..Default::default()
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// A provider's answer plus what it cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Completion {
    pub output: String,
    pub model: String,
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    pub latency_ms: u64,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion>;

    /// Model name reported on completions.
    fn model(&self) -> &str;
}

/// Offline client for dry runs and tests.
///
/// Review prompts get well-formed JSON so the blame and compare flows can be
/// exercised end to end; everything else gets a canned draft.
pub struct MockLlmClient {
    model: String,
    fixed_output: Option<String>,
}

impl Default for MockLlmClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self {
            model: "mock".to_string(),
            fixed_output: None,
        }
    }

    /// Always answer with `output`.
    pub fn with_output(output: impl Into<String>) -> Self {
        Self {
            model: "mock".to_string(),
            fixed_output: Some(output.into()),
        }
    }

    fn canned(prompt: &str) -> String {
        if prompt.contains("You are an AI prompt debugging assistant") {
            r#"```json
{
  "reasoning": "The prompt does not tell the model how long the reply should be.",
  "problematicSections": [
    {
      "section": "CORE TASK",
      "issue": "No length guidance",
      "suggestion": "Add an explicit length limit"
    }
  ]
}
```"#
                .to_string()
        } else if prompt.contains("You are an expert email quality evaluator") {
            r#"```json
{
  "score": 50,
  "reasoning": "Both outputs cover the same points with a similar tone.",
  "improvements": [],
  "regressions": [],
  "recommendation": "review"
}
```"#
                .to_string()
        } else {
            "```filomail\nsubject: Mock subject\n\nThis is a mock response.\n```".to_string()
        }
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        let output = match &self.fixed_output {
            Some(output) => output.clone(),
            None => {
                let prompt = format!(
                    "{}\n{}",
                    request.system.as_deref().unwrap_or_default(),
                    request.user
                );
                Self::canned(&prompt)
            }
        };
        Ok(Completion {
            output,
            model: self.model.clone(),
            provider: "mock".to_string(),
            usage: None,
            latency_ms: 0,
        })
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_answers_review_prompts_with_json() {
        let client = MockLlmClient::new();
        let blame = client
            .complete(&CompletionRequest::new(
                "You are an AI prompt debugging assistant. Analyze...",
            ))
            .await
            .unwrap();
        assert!(blame.output.contains("problematicSections"));

        let compare = client
            .complete(
                &CompletionRequest::new("## Task Type")
                    .with_system("You are an expert email quality evaluator."),
            )
            .await
            .unwrap();
        assert!(compare.output.contains("\"score\": 50"));
    }

    #[tokio::test]
    async fn test_mock_fixed_output() {
        let client = MockLlmClient::with_output("fixed");
        let completion = client.complete(&CompletionRequest::new("x")).await.unwrap();
        assert_eq!(completion.output, "fixed");
        assert_eq!(completion.provider, "mock");
    }

    #[test]
    fn test_completion_serializes_camel_case() {
        let completion = Completion {
            output: "hi".to_string(),
            model: "m".to_string(),
            provider: "openai".to_string(),
            usage: Some(TokenUsage {
                prompt_tokens: 1,
                completion_tokens: 2,
                total_tokens: 3,
            }),
            latency_ms: 42,
        };
        let json = serde_json::to_value(&completion).unwrap();
        assert_eq!(json["latencyMs"], 42);
        assert_eq!(json["usage"]["totalTokens"], 3);
    }
}
