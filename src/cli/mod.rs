//! Subcommand implementations behind `main`.

pub mod clean;
pub mod config_check;
pub mod import;
pub mod render;
pub mod reparse;
pub mod serve;

use anyhow::Result;
use std::path::Path;
use tracing::debug;

use crate::config::Config;
use crate::store::Store;

/// Open the database at `db` when given, else the configured one.
pub fn open_store(config: &Config, db: Option<&Path>) -> Result<Store> {
    let path = db
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.storage.db_path());
    debug!("Opening database {}", path.display());
    Store::open(&path)
}
