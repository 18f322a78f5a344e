//! filoprompt - a workbench for email-assistant prompts
//!
//! Imports `.eml` files as test emails, renders operation prompts with
//! `{{VARIABLE}}` substitution, sends them to OpenAI or Gemini, and keeps the
//! results around for blame analysis, golden comparisons and batch runs. The
//! same functionality is exposed over a JSON HTTP API and a small CLI.

pub mod batch;
pub mod cli;
pub mod compose;
pub mod config;
pub mod extract;
pub mod llm;
pub mod model;
pub mod review;
pub mod server;
pub mod settings;
pub mod store;
pub mod util;
pub mod variables;
pub mod writing_tools;
