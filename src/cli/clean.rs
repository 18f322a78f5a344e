use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::extract::clean_email_for_ai;
use crate::util::estimate_token_count;

/// Print the model-ready rendering of one `.eml` file.
pub fn run(file: &Path) -> Result<()> {
    let bytes = fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;
    let raw = String::from_utf8_lossy(&bytes);
    let cleaned = clean_email_for_ai(&raw);

    println!("{}", cleaned);
    eprintln!();
    eprintln!(
        "{} -> {} chars, ~{} tokens",
        raw.chars().count(),
        cleaned.chars().count(),
        estimate_token_count(&cleaned)
    );
    Ok(())
}
