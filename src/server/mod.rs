//! JSON API served to the browser UI.

mod emails;
mod error;
mod prompts;
mod review;
mod tools;

use anyhow::{Context, Result};
use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

pub use error::{ApiError, ApiResult};

use crate::config::{Config, Provider};
use crate::llm::client::LlmClient;
use crate::llm::factory::create_client;
use crate::store::Store;

/// Uploads of whole mailboxes exceed axum's 2 MB default.
const MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

/// Shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub config: Arc<Config>,
    /// Answer every AI call with the offline mock client.
    pub dry_run: bool,
}

impl AppState {
    pub fn new(store: Store, config: Config, dry_run: bool) -> Self {
        Self {
            store,
            config: Arc::new(config),
            dry_run,
        }
    }

    /// Client for the requested provider/model, falling back to the configured defaults.
    fn client(
        &self,
        provider: Option<&str>,
        model: Option<&str>,
    ) -> Result<(Box<dyn LlmClient>, Provider, String), ApiError> {
        let (provider, model) = self
            .config
            .resolve_ai(provider, model)
            .map_err(|e| ApiError::bad_request(e.to_string()))?;
        let client = create_client(&self.config, provider, &model, self.dry_run)?;
        Ok((client, provider, model))
    }

    /// Client used to score outputs against golden results.
    fn judge(&self, provider: Option<&str>, model: Option<&str>) -> Result<Box<dyn LlmClient>, ApiError> {
        let provider = match provider.map(str::trim).filter(|p| !p.is_empty()) {
            Some(p) => p.parse().map_err(|e: anyhow::Error| ApiError::bad_request(e.to_string()))?,
            None => self.config.default_provider(),
        };
        let model = model
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| self.config.comparison_model(provider))
            .to_string();
        Ok(create_client(&self.config, provider, &model, self.dry_run)?)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/emails", get(emails::list).post(emails::upload))
        .route("/api/emails/reparse", post(emails::reparse_all))
        .route(
            "/api/emails/{id}",
            get(emails::get_one)
                .delete(emails::delete_one)
                .patch(emails::reparse_one),
        )
        .route("/api/emails/{id}/clean", get(emails::clean))
        .route(
            "/api/operation-prompts",
            get(prompts::list_operation_prompts).post(prompts::save_operation_prompt),
        )
        .route("/api/variables", get(prompts::variables))
        .route("/api/preview", post(prompts::preview))
        .route("/api/generate", post(prompts::generate))
        .route(
            "/api/templates",
            get(prompts::list_templates).post(prompts::create_template),
        )
        .route(
            "/api/templates/{id}",
            get(prompts::get_template)
                .put(prompts::update_template)
                .delete(prompts::delete_template),
        )
        .route("/api/blame", post(review::blame))
        .route("/api/compare", post(review::compare))
        .route("/api/batch", get(review::list_batches).post(review::run_batch))
        .route(
            "/api/golden-results",
            get(review::list_golden_results).post(review::save_golden_result),
        )
        .route("/api/golden-results/{id}", delete(review::delete_golden_result))
        .route(
            "/api/writing-tools",
            get(tools::list_writing_tools).post(tools::save_writing_tool),
        )
        .route("/api/writing-tools/apply", post(tools::apply_writing_tool))
        .route("/api/settings", get(tools::get_settings).post(tools::save_settings))
        .route("/api/models", get(tools::models))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

/// Serve on an already-bound listener until the process stops.
pub async fn serve(state: AppState, listener: TcpListener) -> Result<()> {
    let addr = listener.local_addr().context("listener has no local address")?;
    info!("Listening on http://{}", addr);
    axum::serve(listener, router(state))
        .await
        .context("HTTP server failed")
}
