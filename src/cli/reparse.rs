use anyhow::Result;
use std::path::PathBuf;

use crate::cli::open_store;
use crate::config::Config;
use crate::extract::reparse::reparse_all;

pub fn run(config_path: Option<String>, db: Option<PathBuf>, force_all: bool) -> Result<()> {
    let config = Config::load_with_path(config_path)?;
    let store = open_store(&config, db.as_deref())?;
    let summary = reparse_all(&store, force_all)?;

    println!();
    for detail in &summary.details {
        let lengths = match (detail.current_body_length, detail.body_length) {
            (Some(before), Some(after)) => format!(" ({} -> {} chars)", before, after),
            (None, Some(len)) | (Some(len), None) => format!(" ({} chars)", len),
            (None, None) => String::new(),
        };
        println!("  {} [{}] {}{}", detail.id, detail.status, detail.subject, lengths);
    }
    println!();
    println!(
        "{} emails, {} updated, {} failed",
        summary.total, summary.updated, summary.failed
    );
    Ok(())
}
