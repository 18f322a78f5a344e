//! Refresh stored bodies after extractor improvements.

use anyhow::Result;
use serde::Serialize;
use tracing::{info, warn};

use super::eml::{html_part, reextract_body};
use super::{extract_from_raw, html_to_text, is_extraction_sentinel};
use crate::model::TestEmail;
use crate::store::Store;

/// Bodies longer than this are left alone unless the caller forces a reparse.
const SUBSTANTIAL_BODY_CHARS: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReparseDetail {
    pub id: String,
    pub subject: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_body_length: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReparseSummary {
    pub total: usize,
    pub updated: usize,
    pub failed: usize,
    pub details: Vec<ReparseDetail>,
}

/// Re-extract one email from its raw message and persist the result.
/// Returns `None` when the id is unknown.
pub fn reparse_email(store: &Store, id: &str) -> Result<Option<TestEmail>> {
    let Some(mut email) = store.get_email(id)? else {
        return Ok(None);
    };
    let (body, body_html) = reextract_body(&email.raw_eml)?;
    store.update_email_body(id, &body, body_html.as_deref())?;
    email.body = body;
    email.body_html = body_html;
    Ok(Some(email))
}

/// Walk every stored email and rebuild thin bodies from their HTML.
///
/// Each email gets its own status line; an error on one never stops the loop.
pub fn reparse_all(store: &Store, force_all: bool) -> Result<ReparseSummary> {
    let emails = store.list_emails()?;
    let mut summary = ReparseSummary {
        total: emails.len(),
        ..Default::default()
    };

    for email in &emails {
        let current = email.body.trim().chars().count();
        if !force_all && current > SUBSTANTIAL_BODY_CHARS {
            summary.details.push(detail(email, "skipped - has body", Some(current), None));
            continue;
        }

        match rebuild_body(email) {
            Ok(Some((body, body_html))) => {
                if let Err(e) = store.update_email_body(&email.id, &body, body_html.as_deref()) {
                    warn!("Failed to reparse email {}: {:#}", email.id, e);
                    summary.failed += 1;
                    summary
                        .details
                        .push(detail(email, &format!("error: {}", e), None, None));
                    continue;
                }
                summary.updated += 1;
                summary.details.push(detail(
                    email,
                    "updated",
                    Some(body.chars().count()),
                    Some(current),
                ));
            }
            Ok(None) => {
                summary
                    .details
                    .push(detail(email, "no body found in HTML", None, Some(current)));
            }
            Err(e) => {
                warn!("Failed to reparse email {}: {:#}", email.id, e);
                summary.failed += 1;
                summary
                    .details
                    .push(detail(email, &format!("error: {}", e), None, None));
            }
        }
    }

    info!(
        total = summary.total,
        updated = summary.updated,
        failed = summary.failed,
        "Reparse finished"
    );
    Ok(summary)
}

/// New `(body, body_html)` for an email, or `None` when nothing readable turned up.
fn rebuild_body(email: &TestEmail) -> Result<Option<(String, Option<String>)>> {
    let html = match email.body_html.as_deref().filter(|h| !h.trim().is_empty()) {
        Some(stored) => Some(stored.to_string()),
        None if !email.raw_eml.is_empty() => html_part(&email.raw_eml),
        None => None,
    };

    if let Some(html) = &html {
        let text = html_to_text(html);
        if !is_extraction_sentinel(&text) {
            return Ok(Some((text, Some(html.clone()))));
        }
    }

    if email.raw_eml.trim().is_empty() {
        return Ok(None);
    }
    let scanned = extract_from_raw(&email.raw_eml);
    if is_extraction_sentinel(&scanned) || scanned.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some((scanned, html)))
}

fn detail(
    email: &TestEmail,
    status: &str,
    body_length: Option<usize>,
    current_body_length: Option<usize>,
) -> ReparseDetail {
    ReparseDetail {
        id: email.id.clone(),
        subject: email.subject.clone(),
        status: status.to_string(),
        body_length,
        current_body_length,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::parse_eml;

    fn store_with(emails: Vec<TestEmail>) -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(&dir.path().join("test.db")).unwrap();
        store.insert_emails(&emails).unwrap();
        (dir, store)
    }

    fn html_email(body: &str) -> TestEmail {
        let raw = b"From: a@x.com\r\nTo: b@x.com\r\nSubject: Promo\r\n\
Content-Type: text/html\r\n\r\n<div>Spring sale starts today for members</div>";
        let mut email = parse_eml(raw, "promo.eml").unwrap();
        email.body = body.to_string();
        email
    }

    #[test]
    fn test_thin_body_is_rebuilt_from_html() {
        let (_dir, store) = store_with(vec![html_email("")]);
        let summary = reparse_all(&store, false).unwrap();
        assert_eq!(summary.total, 1);
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.details[0].status, "updated");
        let stored = store.list_emails().unwrap().remove(0);
        assert_eq!(stored.body, "Spring sale starts today for members");
    }

    #[test]
    fn test_substantial_body_is_skipped_unless_forced() {
        let long = "x".repeat(60);
        let (_dir, store) = store_with(vec![html_email(&long)]);

        let summary = reparse_all(&store, false).unwrap();
        assert_eq!(summary.updated, 0);
        assert_eq!(summary.details[0].status, "skipped - has body");
        assert_eq!(summary.details[0].body_length, Some(60));

        let forced = reparse_all(&store, true).unwrap();
        assert_eq!(forced.updated, 1);
    }

    #[test]
    fn test_nothing_readable_reports_status() {
        let mut email = html_email("");
        email.body_html = Some("<p></p>".to_string());
        email.raw_eml = "Subject: x\n".to_string();
        let (_dir, store) = store_with(vec![email]);
        let summary = reparse_all(&store, false).unwrap();
        assert_eq!(summary.updated, 0);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.details[0].status, "no body found in HTML");
    }

    #[test]
    fn test_single_reparse_unknown_id() {
        let (_dir, store) = store_with(Vec::new());
        assert!(reparse_email(&store, "missing").unwrap().is_none());
    }

    #[test]
    fn test_single_reparse_refreshes_body() {
        let (_dir, store) = store_with(vec![html_email("stale")]);
        let id = store.list_emails().unwrap()[0].id.clone();
        let email = reparse_email(&store, &id).unwrap().unwrap();
        assert_eq!(email.body, "Spring sale starts today for members");
        assert_eq!(store.get_email(&id).unwrap().unwrap().body, email.body);
    }
}
