use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::error;

/// Errors a handler can answer with. Rendered as `{ "success": false, "error": ... }`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            ApiError::Internal(e) => {
                error!("request failed: {:#}", e);
                format!("{:#}", e)
            }
            other => other.to_string(),
        };
        let body = json!({ "success": false, "error": message });
        (self.status(), Json(body)).into_response()
    }
}

pub type ApiResult = Result<Json<Value>, ApiError>;

fn to_json<T: Serialize>(value: T) -> Result<Value, ApiError> {
    serde_json::to_value(value).map_err(|e| ApiError::Internal(e.into()))
}

/// `{ "success": true, "data": data }`
pub fn success<T: Serialize>(data: T) -> ApiResult {
    Ok(Json(json!({ "success": true, "data": to_json(data)? })))
}

/// Success envelope with extra top-level fields next to `data`.
pub fn success_with<T: Serialize>(data: T, extra: &[(&str, Value)]) -> ApiResult {
    let mut body = json!({ "success": true, "data": to_json(data)? });
    if let Value::Object(map) = &mut body {
        for (key, value) in extra {
            map.insert((*key).to_string(), value.clone());
        }
    }
    Ok(Json(body))
}

/// `{ "success": true, "message": message }`
pub fn message(message: &str) -> ApiResult {
    Ok(Json(json!({ "success": true, "message": message })))
}
