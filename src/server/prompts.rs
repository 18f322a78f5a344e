use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use super::error::{message, success, ApiError, ApiResult};
use super::AppState;
use crate::compose::{compose, compose_saved, ComposedPrompt};
use crate::llm::client::Completion;
use crate::model::{OperationType, PromptTestConfig, TestEmail, TestResult};
use crate::store::TemplateInput;
use crate::util::{generate_id, now_rfc3339};
use crate::variables::{grouped_variables, substitute, VariableContext, DYNAMIC_VARIABLES};

fn parse_operation(value: Option<&str>) -> Result<OperationType, ApiError> {
    value
        .and_then(|op| op.parse().ok())
        .ok_or_else(|| ApiError::bad_request("Invalid operation type"))
}

// -- operation prompts -------------------------------------------------------

pub async fn list_operation_prompts(State(state): State<AppState>) -> ApiResult {
    success(state.store.list_operation_prompts()?)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveOperationPrompt {
    operation_type: Option<String>,
    #[serde(default)]
    prompt: String,
    user_message: Option<String>,
}

pub async fn save_operation_prompt(
    State(state): State<AppState>,
    Json(body): Json<SaveOperationPrompt>,
) -> ApiResult {
    let op = parse_operation(body.operation_type.as_deref())?;
    let saved = state
        .store
        .upsert_operation_prompt(op, &body.prompt, body.user_message.as_deref())?;
    info!("Saved operation prompt for {}", op);
    success(saved)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariablesQuery {
    operation_type: Option<String>,
}

/// Placeholder catalogue, narrowed to one operation when asked.
pub async fn variables(Query(query): Query<VariablesQuery>) -> ApiResult {
    match query.operation_type.as_deref().filter(|op| !op.is_empty()) {
        Some(op) => {
            let op = parse_operation(Some(op))?;
            success(json!({
                "operationType": op,
                "groups": grouped_variables(op),
            }))
        }
        None => success(json!({ "variables": DYNAMIC_VARIABLES })),
    }
}

// -- preview & generate ------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    config: PromptTestConfig,
    thread_email_id: Option<String>,
    provider: Option<String>,
    model: Option<String>,
    #[serde(default)]
    save_result: bool,
    /// Already rendered system prompt; wins over the saved one.
    custom_system_prompt: Option<String>,
    /// Older name for `custom_system_prompt`.
    custom_prompt: Option<String>,
    /// User-message template rendered against the request context.
    custom_user_message: Option<String>,
}

impl GenerateRequest {
    fn custom_system(&self) -> Option<&str> {
        [&self.custom_system_prompt, &self.custom_prompt]
            .into_iter()
            .filter_map(|p| p.as_deref())
            .find(|p| !p.trim().is_empty())
    }
}

fn load_thread_email(state: &AppState, id: Option<&str>) -> Result<Option<TestEmail>, ApiError> {
    match id.filter(|id| !id.is_empty()) {
        Some(id) => Ok(state.store.get_email(id)?),
        None => Ok(None),
    }
}

/// Prompt for a generate call. `None` when no prompt exists for the operation.
fn resolve_prompt(
    state: &AppState,
    request: &GenerateRequest,
    email: Option<&TestEmail>,
) -> Result<Option<ComposedPrompt>, ApiError> {
    let ctx = VariableContext::from_config(&request.config, email);
    let saved = state
        .store
        .get_operation_prompt(request.config.operation_type)?
        .filter(|s| !s.prompt.trim().is_empty());

    let mut composed = match (request.custom_system(), &saved) {
        (Some(custom), _) => ComposedPrompt {
            system: Some(custom.to_string()),
            user: request.config.user_input.clone(),
        },
        (None, Some(saved)) => compose_saved(saved, &request.config, email),
        (None, None) => return Ok(None),
    };

    if let Some(template) = request
        .custom_user_message
        .as_deref()
        .filter(|m| !m.trim().is_empty())
    {
        composed.user = substitute(template, &ctx);
    } else if request.custom_system().is_some() {
        if let Some(template) = saved
            .as_ref()
            .and_then(|s| s.user_message.as_deref())
            .filter(|m| !m.trim().is_empty())
        {
            composed.user = substitute(template, &ctx);
        }
    }
    Ok(Some(composed))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PreviewResponse {
    system_prompt: Option<String>,
    user_message: String,
    source: &'static str,
}

/// Render what generate would send, without calling a model.
pub async fn preview(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> ApiResult {
    let email = load_thread_email(&state, request.thread_email_id.as_deref())?;
    let (composed, source) = match resolve_prompt(&state, &request, email.as_ref())? {
        Some(composed) if request.custom_system().is_some() => (composed, "custom"),
        Some(composed) => (composed, "saved"),
        None => (compose(None, &request.config, email.as_ref()), "builtin"),
    };
    success(PreviewResponse {
        system_prompt: composed.system,
        user_message: composed.user,
        source,
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    generated_prompt: String,
    user_message: String,
    ai_response: Completion,
    #[serde(skip_serializing_if = "Option::is_none")]
    test_result_id: Option<String>,
}

pub async fn generate(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> ApiResult {
    let email = load_thread_email(&state, request.thread_email_id.as_deref())?;
    let Some(composed) = resolve_prompt(&state, &request, email.as_ref())? else {
        return Err(ApiError::bad_request(format!(
            "Please configure a prompt for \"{}\" first",
            request.config.operation_type
        )));
    };
    if composed.is_empty() {
        return Err(ApiError::bad_request("Prompt cannot be empty"));
    }

    let (client, _, _) = state.client(request.provider.as_deref(), request.model.as_deref())?;
    let completion = client
        .complete(&composed.to_request(state.config.ai.max_tokens))
        .await?;

    let test_result_id = match (&email, request.save_result) {
        (Some(email), true) => {
            let result = TestResult {
                id: generate_id(),
                test_email_id: email.id.clone(),
                config: request.config.clone(),
                generated_prompt: composed.generated_prompt().to_string(),
                ai_response: completion.clone(),
                human_critique: None,
                blame_analysis: None,
                created_at: now_rfc3339(),
            };
            state.store.save_test_result(&result)?;
            Some(result.id)
        }
        _ => None,
    };

    success(GenerateResponse {
        generated_prompt: composed.generated_prompt().to_string(),
        user_message: composed.user,
        ai_response: completion,
        test_result_id,
    })
}

// -- templates ---------------------------------------------------------------

pub async fn list_templates(State(state): State<AppState>) -> ApiResult {
    success(state.store.list_templates()?)
}

pub async fn get_template(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    match state.store.get_template(&id)? {
        Some(template) => success(template),
        None => Err(ApiError::not_found("Template not found")),
    }
}

pub async fn create_template(
    State(state): State<AppState>,
    Json(input): Json<TemplateInput>,
) -> ApiResult {
    if input.name.trim().is_empty() || input.template.trim().is_empty() {
        return Err(ApiError::bad_request("Name and template are required"));
    }
    success(state.store.create_template(&input)?)
}

pub async fn update_template(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<TemplateInput>,
) -> ApiResult {
    if !state.store.update_template(&id, &input)? {
        return Err(ApiError::not_found("Template not found"));
    }
    message("Template updated")
}

pub async fn delete_template(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    if !state.store.delete_template(&id)? {
        return Err(ApiError::not_found("Template not found"));
    }
    message("Template deleted")
}
