use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::error::{message, success, ApiError, ApiResult};
use super::AppState;
use crate::batch;
use crate::model::{AiSelection, BatchConfig, BlameAnalysis, OperationType, PromptTestConfig};
use crate::review;
use crate::store::GoldenInput;
use crate::util::now_rfc3339;

fn required(value: Option<String>) -> Result<String, ApiError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing required fields"))
}

// -- blame -------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlameRequest {
    test_result_id: Option<String>,
    original_prompt: Option<String>,
    ai_output: Option<String>,
    human_critique: Option<String>,
    provider: Option<String>,
    model: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BlameResponse {
    blame_analysis: BlameAnalysis,
    raw_response: String,
}

pub async fn blame(State(state): State<AppState>, Json(body): Json<BlameRequest>) -> ApiResult {
    let prompt = required(body.original_prompt)?;
    let output = required(body.ai_output)?;
    let critique = required(body.human_critique)?;

    let (client, _, _) = state.client(body.provider.as_deref(), body.model.as_deref())?;
    let outcome = review::blame(client.as_ref(), &prompt, &output, &critique).await?;

    if let Some(id) = body.test_result_id.as_deref().filter(|id| !id.is_empty()) {
        if !state
            .store
            .update_test_result_critique(id, &critique, Some(&outcome.analysis))?
        {
            info!("blame: test result {} not found, critique not stored", id);
        }
    }

    success(BlameResponse {
        blame_analysis: outcome.analysis,
        raw_response: outcome.raw_response,
    })
}

// -- compare -----------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareRequest {
    original_email: Option<String>,
    golden_output: Option<String>,
    new_output: Option<String>,
    operation_type: Option<String>,
    provider: Option<String>,
    model: Option<String>,
}

pub async fn compare(State(state): State<AppState>, Json(body): Json<CompareRequest>) -> ApiResult {
    let golden = required(body.golden_output)?;
    let new = required(body.new_output)?;
    let email = body.original_email.unwrap_or_default();
    let operation = body
        .operation_type
        .unwrap_or_else(|| OperationType::ReplyEmail.as_str().to_string());

    let judge = state.judge(body.provider.as_deref(), body.model.as_deref())?;
    success(review::compare(judge.as_ref(), &email, &golden, &new, &operation).await?)
}

// -- batch -------------------------------------------------------------------

pub async fn list_batches(State(state): State<AppState>) -> ApiResult {
    success(state.store.list_batches()?)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    name: Option<String>,
    #[serde(default)]
    email_ids: Vec<String>,
    config: Option<PromptTestConfig>,
    provider: Option<String>,
    model: Option<String>,
    #[serde(default)]
    compare_with_golden: bool,
    comparison_provider: Option<String>,
    comparison_model: Option<String>,
}

pub async fn run_batch(State(state): State<AppState>, Json(body): Json<BatchRequest>) -> ApiResult {
    let Some(prompt_config) = body.config.filter(|_| !body.email_ids.is_empty()) else {
        return Err(ApiError::bad_request("Missing required fields"));
    };

    let (client, provider, model) = state.client(body.provider.as_deref(), body.model.as_deref())?;
    let judge = if body.compare_with_golden {
        Some(state.judge(
            body.comparison_provider.as_deref(),
            body.comparison_model.as_deref(),
        )?)
    } else {
        None
    };

    let config = BatchConfig {
        name: body
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| format!("Batch {}", now_rfc3339())),
        email_ids: body.email_ids,
        prompt_config,
        ai_config: AiSelection {
            provider: provider.to_string(),
            model,
        },
    };
    info!("Running batch \"{}\" over {} emails", config.name, config.email_ids.len());
    let run = batch::run_batch(&state.store, client.as_ref(), judge.as_deref(), config).await?;
    success(run)
}

// -- golden results ----------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoldenQuery {
    email_id: Option<String>,
    operation_type: Option<String>,
}

pub async fn list_golden_results(
    State(state): State<AppState>,
    Query(query): Query<GoldenQuery>,
) -> ApiResult {
    let op = match query.operation_type.as_deref().filter(|op| !op.is_empty()) {
        Some(op) => Some(
            op.parse::<OperationType>()
                .map_err(|_| ApiError::bad_request("Invalid operation type"))?,
        ),
        None => None,
    };
    let email_id = query.email_id.as_deref().filter(|id| !id.is_empty());
    success(state.store.list_golden_results(email_id, op)?)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveGoldenRequest {
    email_id: Option<String>,
    operation_type: Option<String>,
    prompt: Option<String>,
    output: Option<String>,
    notes: Option<String>,
}

pub async fn save_golden_result(
    State(state): State<AppState>,
    Json(body): Json<SaveGoldenRequest>,
) -> ApiResult {
    let email_id = required(body.email_id)?;
    let output = required(body.output)?;
    let operation_type = required(body.operation_type)?
        .parse::<OperationType>()
        .map_err(|_| ApiError::bad_request("Invalid operation type"))?;
    if state.store.get_email(&email_id)?.is_none() {
        return Err(ApiError::not_found("Email not found"));
    }

    let golden = state.store.upsert_golden_result(&GoldenInput {
        email_id,
        operation_type,
        prompt: body.prompt.unwrap_or_default(),
        output,
        notes: body.notes.filter(|n| !n.trim().is_empty()),
    })?;
    info!("Saved golden result for email {} ({})", golden.email_id, operation_type);
    success(golden)
}

pub async fn delete_golden_result(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult {
    if !state.store.delete_golden_result(&id)? {
        return Err(ApiError::not_found("Golden result not found"));
    }
    message("Golden result deleted")
}
