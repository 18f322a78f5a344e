//! Review flows: blame analysis of a bad output and scoring against golden results.
//!
//! Models are asked for JSON, but nothing guarantees they comply. Parsing
//! therefore yields a [`ReviewParse`] that either carries the parsed value or
//! a fallback plus the reason parsing failed; callers can always proceed.

use anyhow::Result;
use serde_json::Value;
use tracing::{debug, warn};

use crate::llm::client::{CompletionRequest, LlmClient};
use crate::llm::prompts::{build_blame_prompt, build_comparison_prompt};
use crate::model::{BlameAnalysis, ComparisonScore, ProblematicSection, Recommendation};

const NEUTRAL_SCORE: u8 = 50;
const PARSE_FAILURE_REASONING: &str = "Failed to parse AI response";

/// Outcome of reading a model's JSON answer.
#[derive(Debug, Clone, PartialEq)]
pub enum ReviewParse<T> {
    Parsed(T),
    ParseFailure { fallback: T, error: String },
}

impl<T> ReviewParse<T> {
    pub fn is_parsed(&self) -> bool {
        matches!(self, ReviewParse::Parsed(_))
    }

    pub fn into_value(self) -> T {
        match self {
            ReviewParse::Parsed(value) => value,
            ReviewParse::ParseFailure { fallback, .. } => fallback,
        }
    }
}

/// Blame analysis together with the text the model actually returned.
#[derive(Debug, Clone, PartialEq)]
pub struct BlameOutcome {
    pub analysis: BlameAnalysis,
    pub raw_response: String,
}

pub async fn blame(
    client: &dyn LlmClient,
    original_prompt: &str,
    ai_output: &str,
    critique: &str,
) -> Result<BlameOutcome> {
    let request = CompletionRequest::new(build_blame_prompt(original_prompt, ai_output, critique));
    let completion = client.complete(&request).await?;
    let analysis = match parse_blame_response(&completion.output) {
        ReviewParse::Parsed(analysis) => analysis,
        ReviewParse::ParseFailure { fallback, error } => {
            warn!("blame: falling back to raw response: {}", error);
            fallback
        }
    };
    Ok(BlameOutcome {
        analysis,
        raw_response: completion.output,
    })
}

pub async fn compare(
    client: &dyn LlmClient,
    original_email: &str,
    golden_output: &str,
    new_output: &str,
    operation_type: &str,
) -> Result<ComparisonScore> {
    let prompt = build_comparison_prompt(original_email, golden_output, new_output, operation_type);
    let completion = client.complete(&CompletionRequest::new(prompt)).await?;
    debug!("compare: model answered in {}ms", completion.latency_ms);
    Ok(match parse_comparison_response(&completion.output) {
        ReviewParse::Parsed(score) => score,
        ReviewParse::ParseFailure { fallback, error } => {
            warn!("compare: failed to parse comparison response: {}", error);
            fallback
        }
    })
}

/// Read `{reasoning, problematicSections}`. On failure the raw text becomes the reasoning.
pub fn parse_blame_response(response: &str) -> ReviewParse<BlameAnalysis> {
    let fallback = || BlameAnalysis {
        reasoning: response.to_string(),
        problematic_sections: Vec::new(),
    };
    let value = match parse_json_object(response) {
        Ok(value) => value,
        Err(error) => {
            return ReviewParse::ParseFailure {
                fallback: fallback(),
                error,
            }
        }
    };

    let reasoning = value
        .get("reasoning")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let problematic_sections = value
        .get("problematicSections")
        .and_then(Value::as_array)
        .map(|sections| {
            sections
                .iter()
                .map(|item| {
                    let field = |name: &str| {
                        item.get(name)
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string()
                    };
                    ProblematicSection {
                        section: field("section"),
                        issue: field("issue"),
                        suggestion: field("suggestion"),
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    ReviewParse::Parsed(BlameAnalysis {
        reasoning,
        problematic_sections,
    })
}

/// Read a comparison verdict. Scores are clamped to 1..=100 and a missing or
/// zero score counts as 50.
pub fn parse_comparison_response(response: &str) -> ReviewParse<ComparisonScore> {
    let value = match parse_json_object(response) {
        Ok(value) => value,
        Err(error) => {
            return ReviewParse::ParseFailure {
                fallback: ComparisonScore {
                    score: NEUTRAL_SCORE,
                    reasoning: PARSE_FAILURE_REASONING.to_string(),
                    improvements: Vec::new(),
                    regressions: Vec::new(),
                    recommendation: Recommendation::Review,
                },
                error,
            }
        }
    };

    let score = value
        .get("score")
        .and_then(Value::as_f64)
        .filter(|s| *s != 0.0 && s.is_finite())
        .map(|s| s.round().clamp(1.0, 100.0) as u8)
        .unwrap_or(NEUTRAL_SCORE);
    let strings = |name: &str| -> Vec<String> {
        value
            .get(name)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    };

    ReviewParse::Parsed(ComparisonScore {
        score,
        reasoning: value
            .get("reasoning")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        improvements: strings("improvements"),
        regressions: strings("regressions"),
        recommendation: value
            .get("recommendation")
            .and_then(Value::as_str)
            .map(Recommendation::parse_lenient)
            .unwrap_or_default(),
    })
}

fn parse_json_object(response: &str) -> std::result::Result<Value, String> {
    let json = extract_json_block(response);
    match serde_json::from_str::<Value>(json) {
        Ok(value) if value.is_object() => Ok(value),
        Ok(_) => Err("response is not a JSON object".to_string()),
        Err(e) => Err(e.to_string()),
    }
}

/// The body of the first ```` ```json ```` fence, else the whole text.
fn extract_json_block(text: &str) -> &str {
    let trimmed = text.trim();
    if let Some(start) = trimmed.find("```json") {
        let body = &trimmed[start + "```json".len()..];
        if let Some(end) = body.find("```") {
            return body[..end].trim();
        }
    }
    trimmed
}
