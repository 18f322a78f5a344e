use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

use super::client::{Completion, CompletionRequest, LlmClient, TokenUsage};
use crate::util::SecretString;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const REASONING_MAX_TOKENS: u32 = 16384;
const CHAT_MAX_TOKENS: u32 = 4096;
const CHAT_TEMPERATURE: f32 = 0.7;

fn http_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .context("failed to build HTTP client")
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

// ============================================================================
// OpenAI Client
// ============================================================================

/// How a chat model family wants its sampling parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFamily {
    /// gpt-5 and o1/o3: `max_completion_tokens`, fixed temperature.
    Reasoning,
    /// gpt-4 and older: `max_tokens` plus temperature.
    Chat,
}

impl ModelFamily {
    pub fn of(model: &str) -> Self {
        if model.starts_with("gpt-5") || model.starts_with("o1") || model.starts_with("o3") {
            ModelFamily::Reasoning
        } else {
            ModelFamily::Chat
        }
    }
}

pub struct OpenAIClient {
    api_key: SecretString,
    model: String,
    base_url: String,
    client: Client,
}

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    #[serde(default)]
    total_tokens: u64,
}

impl OpenAIClient {
    pub fn new(api_key: String, model: String, timeout_secs: u64) -> Result<Self> {
        Self::with_base_url(api_key, model, OPENAI_BASE_URL.to_string(), timeout_secs)
    }

    pub fn with_base_url(
        api_key: String,
        model: String,
        base_url: String,
        timeout_secs: u64,
    ) -> Result<Self> {
        Ok(Self {
            api_key: api_key.into(),
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            client: http_client(timeout_secs)?,
        })
    }

    fn build_request(&self, request: &CompletionRequest) -> OpenAIRequest {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = request.system.as_deref().filter(|s| !s.is_empty()) {
            messages.push(OpenAIMessage {
                role: "system".to_string(),
                content: Some(system.to_string()),
            });
        }
        messages.push(OpenAIMessage {
            role: "user".to_string(),
            content: Some(request.user.clone()),
        });

        let (temperature, max_tokens, max_completion_tokens) = match ModelFamily::of(&self.model) {
            ModelFamily::Reasoning => (
                None,
                None,
                Some(request.max_tokens.unwrap_or(REASONING_MAX_TOKENS)),
            ),
            ModelFamily::Chat => (
                Some(request.temperature.unwrap_or(CHAT_TEMPERATURE)),
                Some(request.max_tokens.unwrap_or(CHAT_MAX_TOKENS)),
                None,
            ),
        };

        OpenAIRequest {
            model: self.model.clone(),
            messages,
            temperature,
            max_tokens,
            max_completion_tokens,
        }
    }
}

#[async_trait]
impl LlmClient for OpenAIClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        let body = self.build_request(request);
        debug!("Calling OpenAI API at {} with model: {}", self.base_url, self.model);

        let start = Instant::now();
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("content-type", "application/json")
            .header("authorization", format!("Bearer {}", self.api_key.expose()))
            .json(&body)
            .send()
            .await
            .context("Failed to send request to OpenAI API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            bail!("OpenAI API error {}: {}", status, error_text);
        }

        let api_response: OpenAIResponse = response
            .json()
            .await
            .context("Failed to parse OpenAI API response")?;
        let latency_ms = elapsed_ms(start);

        let output = api_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        Ok(Completion {
            output,
            model: self.model.clone(),
            provider: "openai".to_string(),
            usage: api_response.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
            latency_ms,
        })
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Gemini Client (Google Generative AI)
// ============================================================================

pub struct GeminiClient {
    api_key: SecretString,
    model: String,
    base_url: String,
    client: Client,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsage>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
    #[serde(default)]
    total_token_count: u64,
}

impl GeminiClient {
    pub fn new(api_key: String, model: String, timeout_secs: u64) -> Result<Self> {
        Self::with_base_url(api_key, model, GEMINI_BASE_URL.to_string(), timeout_secs)
    }

    pub fn with_base_url(
        api_key: String,
        model: String,
        base_url: String,
        timeout_secs: u64,
    ) -> Result<Self> {
        Ok(Self {
            api_key: api_key.into(),
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            client: http_client(timeout_secs)?,
        })
    }

    fn build_request(request: &CompletionRequest) -> GeminiRequest {
        let text_content = |role: Option<&str>, text: &str| GeminiContent {
            role: role.map(str::to_string),
            parts: vec![GeminiPart {
                text: text.to_string(),
            }],
        };
        let generation_config = (request.max_tokens.is_some() || request.temperature.is_some())
            .then_some(GeminiGenerationConfig {
                max_output_tokens: request.max_tokens,
                temperature: request.temperature,
            });

        GeminiRequest {
            system_instruction: request
                .system
                .as_deref()
                .filter(|s| !s.is_empty())
                .map(|s| text_content(None, s)),
            contents: vec![text_content(Some("user"), &request.user)],
            generation_config,
        }
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        let body = Self::build_request(request);
        debug!("Calling Gemini API with model: {}", self.model);

        let start = Instant::now();
        let response = self
            .client
            .post(format!("{}/models/{}:generateContent", self.base_url, self.model))
            .header("content-type", "application/json")
            .header("x-goog-api-key", self.api_key.expose())
            .json(&body)
            .send()
            .await
            .context("Failed to send request to Gemini API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            bail!("Gemini API error {}: {}", status, error_text);
        }

        let api_response: GeminiResponse = response
            .json()
            .await
            .context("Failed to parse Gemini API response")?;
        let latency_ms = elapsed_ms(start);

        let output = api_response
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .map(|p| p.text.as_str())
                    .collect::<String>()
            })
            .context("No content in Gemini response")?;

        Ok(Completion {
            output,
            model: self.model.clone(),
            provider: "gemini".to_string(),
            usage: api_response.usage_metadata.map(|u| TokenUsage {
                prompt_tokens: u.prompt_token_count,
                completion_tokens: u.candidates_token_count,
                total_tokens: u.total_token_count,
            }),
            latency_ms,
        })
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn openai(model: &str) -> OpenAIClient {
        OpenAIClient::new("sk-test".to_string(), model.to_string(), 30).unwrap()
    }

    #[test]
    fn test_model_family() {
        assert_eq!(ModelFamily::of("gpt-5.2-chat-latest"), ModelFamily::Reasoning);
        assert_eq!(ModelFamily::of("o1-mini"), ModelFamily::Reasoning);
        assert_eq!(ModelFamily::of("o3"), ModelFamily::Reasoning);
        assert_eq!(ModelFamily::of("gpt-4o"), ModelFamily::Chat);
        assert_eq!(ModelFamily::of("gpt-3.5-turbo"), ModelFamily::Chat);
    }

    #[test]
    fn test_openai_client_creation() {
        let client = openai("gpt-4o");
        assert_eq!(client.api_key.expose(), "sk-test");
        assert_eq!(client.base_url, OPENAI_BASE_URL);

        let custom = OpenAIClient::with_base_url(
            "k".to_string(),
            "gpt-4o".to_string(),
            "http://localhost:8080/v1/".to_string(),
            30,
        )
        .unwrap();
        assert_eq!(custom.base_url, "http://localhost:8080/v1");
    }

    #[test]
    fn test_reasoning_request_omits_temperature() {
        let request = CompletionRequest::new("hi").with_system("sys");
        let json = serde_json::to_value(openai("gpt-5.2-pro").build_request(&request)).unwrap();
        assert_eq!(json["max_completion_tokens"], 16384);
        assert!(json.get("temperature").is_none());
        assert!(json.get("max_tokens").is_none());
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
    }

    #[test]
    fn test_chat_request_uses_max_tokens() {
        let json =
            serde_json::to_value(openai("gpt-4o").build_request(&CompletionRequest::new("hi")))
                .unwrap();
        assert_eq!(json["max_tokens"], 4096);
        assert!((json["temperature"].as_f64().unwrap() - 0.7).abs() < 0.0001);
        assert!(json.get("max_completion_tokens").is_none());
        assert_eq!(json["messages"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_openai_response_parsing() {
        let json = r#"{
            "choices": [{"message": {"role": "assistant", "content": "Hello"}}],
            "usage": {"prompt_tokens": 3, "completion_tokens": 1, "total_tokens": 4}
        }"#;
        let response: OpenAIResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.choices[0].message.content.as_deref(), Some("Hello"));
        assert_eq!(response.usage.unwrap().total_tokens, 4);
    }

    #[test]
    fn test_gemini_request_structure() {
        let request = CompletionRequest {
            system: Some("be brief".to_string()),
            user: "hello".to_string(),
            temperature: None,
            max_tokens: Some(256),
        };
        let json = serde_json::to_value(GeminiClient::build_request(&request)).unwrap();
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "be brief");
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 256);
    }

    #[test]
    fn test_gemini_usage_defaults_to_zero() {
        let json = r#"{
            "candidates": [{"content": {"parts": [{"text": "a"}, {"text": "b"}]}}],
            "usageMetadata": {"promptTokenCount": 7}
        }"#;
        let response: GeminiResponse = serde_json::from_str(json).unwrap();
        let usage = response.usage_metadata.unwrap();
        assert_eq!(usage.prompt_token_count, 7);
        assert_eq!(usage.candidates_token_count, 0);
        assert_eq!(usage.total_token_count, 0);
    }
}
