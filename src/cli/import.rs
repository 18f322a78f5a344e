use anyhow::{bail, Result};
use std::fs;
use std::path::PathBuf;
use tracing::info;

use crate::cli::open_store;
use crate::config::Config;
use crate::extract::parse_eml_files;

/// Parse and store `.eml` files. Fails only when nothing could be imported.
pub fn run(config_path: Option<String>, db: Option<PathBuf>, files: Vec<PathBuf>) -> Result<()> {
    let config = Config::load_with_path(config_path)?;
    let store = open_store(&config, db.as_deref())?;

    let mut unreadable = Vec::new();
    let mut inputs = Vec::new();
    for path in &files {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        match fs::read(path) {
            Ok(bytes) => inputs.push((name, bytes)),
            Err(e) => unreadable.push((name, e.to_string())),
        }
    }

    let report = parse_eml_files(inputs);
    let saved = store.insert_emails(&report.emails)?;
    info!("Imported {} of {} files", saved, files.len());

    println!();
    for email in &report.emails {
        println!("  \u{2713} {}: {}", email.file_name, email.subject);
    }
    let failures = report
        .failures
        .iter()
        .map(|f| (f.file_name.clone(), f.error.clone()))
        .chain(unreadable);
    let mut failed = 0;
    for (name, error) in failures {
        println!("  \u{2717} {}: {}", name, error);
        failed += 1;
    }
    println!();
    println!("{} imported, {} failed", saved, failed);

    if saved == 0 && failed > 0 {
        bail!("no emails imported");
    }
    Ok(())
}
