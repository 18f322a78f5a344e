use anyhow::{Context, Result};
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::cli::open_store;
use crate::config::Config;
use crate::server::{self, AppState};

pub async fn run(
    config_path: Option<String>,
    bind: Option<String>,
    db: Option<PathBuf>,
    dry_run: bool,
) -> Result<()> {
    let config = Config::load_with_path(config_path)?;
    let bind = bind.unwrap_or_else(|| config.server.bind.clone());
    let store = open_store(&config, db.as_deref())?;
    info!("{} test emails in store", store.count_emails()?);
    if dry_run {
        warn!("Dry run: AI calls are answered by the mock client");
    }

    let listener = TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {}", bind))?;
    server::serve(AppState::new(store, config, dry_run), listener).await
}
