use axum::extract::{Multipart, Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use super::error::{message, success, success_with, ApiError, ApiResult};
use super::AppState;
use crate::extract::reparse::{reparse_all as reparse_all_emails, reparse_email};
use crate::extract::{clean_email_for_ai, parse_eml_files};
use crate::util::estimate_token_count;

pub async fn list(State(state): State<AppState>) -> ApiResult {
    let emails = state.store.list_emails()?;
    let total = state.store.count_emails()?;
    success_with(emails, &[("total", json!(total))])
}

/// Import every file posted under the `files` field.
pub async fn upload(State(state): State<AppState>, mut multipart: Multipart) -> ApiResult {
    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Failed to read multipart field: {}", e)))?
    {
        if field.name() != Some("files") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload.eml").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read {}: {}", file_name, e)))?;
        files.push((file_name, bytes.to_vec()));
    }

    if files.is_empty() {
        return Err(ApiError::bad_request("No files provided"));
    }

    let report = parse_eml_files(files);
    let saved = state.store.insert_emails(&report.emails)?;
    info!(saved, failed = report.failures.len(), "Imported uploaded emails");
    success_with(
        report.emails,
        &[("count", json!(saved)), ("failures", json!(report.failures))],
    )
}

pub async fn get_one(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    match state.store.get_email(&id)? {
        Some(email) => success(email),
        None => Err(ApiError::not_found("Email not found")),
    }
}

pub async fn delete_one(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    if !state.store.delete_email(&id)? {
        return Err(ApiError::not_found("Email not found"));
    }
    message("Email deleted")
}

/// Re-extract one email's body from its raw message.
pub async fn reparse_one(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    match reparse_email(&state.store, &id)? {
        Some(email) => success(email),
        None => Err(ApiError::not_found("Email not found")),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReparseRequest {
    force_all: bool,
}

pub async fn reparse_all(
    State(state): State<AppState>,
    body: Option<Json<ReparseRequest>>,
) -> ApiResult {
    let force_all = body.map(|Json(b)| b.force_all).unwrap_or_default();
    success(reparse_all_emails(&state.store, force_all)?)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CleanedEmail {
    id: String,
    cleaned: String,
    original_length: usize,
    cleaned_length: usize,
    estimated_tokens: usize,
}

/// Headers that matter plus the readable body, sized for a model prompt.
pub async fn clean(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    let Some(email) = state.store.get_email(&id)? else {
        return Err(ApiError::not_found("Email not found"));
    };
    let cleaned = clean_email_for_ai(&email.raw_eml);
    success(CleanedEmail {
        original_length: email.raw_eml.chars().count(),
        cleaned_length: cleaned.chars().count(),
        estimated_tokens: estimate_token_count(&cleaned),
        cleaned,
        id: email.id,
    })
}
