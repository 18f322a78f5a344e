use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::error::{message, success, ApiError, ApiResult};
use super::AppState;
use crate::llm::client::{CompletionRequest, TokenUsage};
use crate::llm::models::catalogue;
use crate::model::WritingToolId;
use crate::settings::{self, SettingsUpdate, SAVED_MESSAGE};
use crate::writing_tools::{fill_template, list_tools, resolve_prompt};

fn parse_tool(id: Option<&str>) -> Result<WritingToolId, ApiError> {
    id.and_then(|id| id.parse().ok())
        .ok_or_else(|| ApiError::bad_request("Invalid tool id"))
}

// -- writing tools -----------------------------------------------------------

pub async fn list_writing_tools(State(state): State<AppState>) -> ApiResult {
    success(list_tools(&state.store)?)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveToolRequest {
    tool_id: Option<String>,
    #[serde(default)]
    prompt: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SavedTool {
    tool_id: WritingToolId,
    prompt: String,
    updated_at: String,
}

pub async fn save_writing_tool(
    State(state): State<AppState>,
    Json(body): Json<SaveToolRequest>,
) -> ApiResult {
    let tool_id = parse_tool(body.tool_id.as_deref())?;
    let updated_at = state.store.upsert_writing_tool(tool_id, &body.prompt)?;
    info!("Saved prompt for writing tool {}", tool_id.as_str());
    success(SavedTool {
        tool_id,
        prompt: body.prompt,
        updated_at,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyToolRequest {
    tool_id: Option<String>,
    content: Option<String>,
    /// Unsaved prompt to try instead of the stored one.
    custom_prompt: Option<String>,
    provider: Option<String>,
    model: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AppliedTool {
    tool_id: WritingToolId,
    output: String,
    usage: Option<TokenUsage>,
    latency_ms: u64,
}

pub async fn apply_writing_tool(
    State(state): State<AppState>,
    Json(body): Json<ApplyToolRequest>,
) -> ApiResult {
    let (Some(tool_id), Some(content)) = (
        body.tool_id.as_deref().filter(|id| !id.is_empty()),
        body.content.as_deref().filter(|c| !c.trim().is_empty()),
    ) else {
        return Err(ApiError::bad_request("Missing toolId or content"));
    };
    let tool_id = parse_tool(Some(tool_id))?;

    let template = resolve_prompt(&state.store, tool_id, body.custom_prompt.as_deref())?;
    let (client, _, _) = state.client(body.provider.as_deref(), body.model.as_deref())?;
    let mut request = CompletionRequest::new(fill_template(&template, content));
    request.max_tokens = state.config.ai.max_tokens;
    let completion = client.complete(&request).await?;

    success(AppliedTool {
        tool_id,
        output: completion.output.trim().to_string(),
        usage: completion.usage,
        latency_ms: completion.latency_ms,
    })
}

// -- settings & models -------------------------------------------------------

pub async fn get_settings(State(state): State<AppState>) -> ApiResult {
    success(settings::load_settings(&state.config.settings.env_file)?)
}

pub async fn save_settings(
    State(state): State<AppState>,
    Json(update): Json<SettingsUpdate>,
) -> ApiResult {
    settings::save_settings(&state.config.settings.env_file, &update)?;
    message(SAVED_MESSAGE)
}

pub async fn models(State(state): State<AppState>) -> ApiResult {
    success(catalogue(&state.config))
}
