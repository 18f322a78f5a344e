//! Run one prompt configuration across many stored emails.

use anyhow::Result;
use tracing::{info, warn};

use crate::compose::compose;
use crate::llm::client::LlmClient;
use crate::model::{
    BatchConfig, BatchItemResult, BatchRun, BatchSummary, ComparisonScore, TestEmail,
};
use crate::review;
use crate::store::Store;
use crate::util::{generate_id, now_rfc3339, truncate_chars};

/// User input stand-in taken from the email body when the config has none.
const DEFAULT_INPUT_CHARS: usize = 500;

/// Generate a draft for every email in `config.email_ids`, in order.
///
/// A missing email or a failed provider call marks that item failed and the
/// loop moves on. When `judge` is given, successful items that have a golden
/// result are scored against it. The run is persisted before it is returned.
pub async fn run_batch(
    store: &Store,
    client: &dyn LlmClient,
    judge: Option<&dyn LlmClient>,
    config: BatchConfig,
) -> Result<BatchRun> {
    let saved = store.get_operation_prompt(config.prompt_config.operation_type)?;
    let mut results = Vec::with_capacity(config.email_ids.len());

    for email_id in &config.email_ids {
        let email = match store.get_email(email_id) {
            Ok(Some(email)) => email,
            Ok(None) => {
                warn!("batch: email {} not found", email_id);
                results.push(failed_item(email_id, String::new(), "Email not found".to_string()));
                continue;
            }
            Err(e) => {
                warn!("batch: failed to load email {}: {:#}", email_id, e);
                results.push(failed_item(email_id, String::new(), format!("{:#}", e)));
                continue;
            }
        };

        let mut item_config = config.prompt_config.clone();
        if item_config.user_input.trim().is_empty() {
            item_config.user_input = truncate_chars(&email.body, DEFAULT_INPUT_CHARS).to_string();
        }
        let prompt = compose(saved.as_ref(), &item_config, Some(&email));

        let completion = match client.complete(&prompt.to_request(None)).await {
            Ok(completion) => completion,
            Err(e) => {
                warn!("batch: failed to process email {}: {:#}", email_id, e);
                results.push(failed_item(email_id, email.subject.clone(), format!("{:#}", e)));
                continue;
            }
        };

        // a failed lookup skips the comparison only
        let golden = store
            .get_golden_result(email_id, config.prompt_config.operation_type)
            .unwrap_or_else(|e| {
                warn!("batch: failed to load golden result for {}: {:#}", email_id, e);
                None
            });
        let comparison = match (judge, &golden) {
            (Some(judge), Some(golden)) => {
                score_against_golden(judge, &email, &golden.output, &completion.output, &config)
                    .await
            }
            _ => None,
        };

        results.push(BatchItemResult {
            email_id: email_id.clone(),
            email_subject: email.subject.clone(),
            success: true,
            output: Some(completion.output),
            error: None,
            latency_ms: Some(completion.latency_ms),
            has_golden_result: golden.is_some(),
            golden_output: golden.map(|g| g.output),
            comparison,
        });
    }

    let run = BatchRun {
        id: generate_id(),
        summary: summarize(&results),
        config,
        results,
        status: "completed".to_string(),
        created_at: now_rfc3339(),
    };
    store.save_batch(&run)?;
    info!(
        total = run.summary.total,
        completed = run.summary.completed,
        failed = run.summary.failed,
        "Batch {} finished",
        run.id
    );
    Ok(run)
}

async fn score_against_golden(
    judge: &dyn LlmClient,
    email: &TestEmail,
    golden_output: &str,
    new_output: &str,
    config: &BatchConfig,
) -> Option<ComparisonScore> {
    let operation = config.prompt_config.operation_type.as_str();
    match review::compare(judge, &email.body, golden_output, new_output, operation).await {
        Ok(score) => Some(score),
        Err(e) => {
            warn!("batch: comparison failed for email {}: {:#}", email.id, e);
            None
        }
    }
}

fn failed_item(email_id: &str, subject: String, error: String) -> BatchItemResult {
    BatchItemResult {
        email_id: email_id.to_string(),
        email_subject: subject,
        success: false,
        output: None,
        error: Some(error),
        latency_ms: None,
        has_golden_result: false,
        golden_output: None,
        comparison: None,
    }
}

/// Totals over the items; average latency counts completed items only.
pub fn summarize(results: &[BatchItemResult]) -> BatchSummary {
    let latencies: Vec<u64> = results
        .iter()
        .filter(|r| r.success)
        .filter_map(|r| r.latency_ms)
        .collect();
    let completed = results.iter().filter(|r| r.success).count();
    BatchSummary {
        total: results.len(),
        completed,
        failed: results.len() - completed,
        avg_latency_ms: if latencies.is_empty() {
            0.0
        } else {
            latencies.iter().sum::<u64>() as f64 / latencies.len() as f64
        },
    }
}
