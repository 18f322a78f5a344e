//! `.eml` import through `mail-parser`.

use anyhow::{bail, Result};
use chrono::{DateTime, SecondsFormat};
use mail_parser::{Address, Message, MessageParser, PartType};
use serde::Serialize;
use tracing::{debug, warn};

use super::{extract_plain_text, is_extraction_sentinel, RawEmailInput};
use crate::model::TestEmail;
use crate::util::{generate_id, now_rfc3339};

/// Files that could not be turned into a [`TestEmail`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportFailure {
    pub file_name: String,
    pub error: String,
}

/// Result of importing several files. One bad file never sinks the rest.
#[derive(Debug, Default)]
pub struct ImportReport {
    pub emails: Vec<TestEmail>,
    pub failures: Vec<ImportFailure>,
}

/// Parse one message into a fresh, unsaved [`TestEmail`].
pub fn parse_eml(bytes: &[u8], file_name: &str) -> Result<TestEmail> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        bail!("{} is empty", file_name);
    }
    let Some(message) = MessageParser::default().parse(bytes) else {
        bail!("{} is not a valid email message", file_name);
    };

    let raw_eml = String::from_utf8_lossy(bytes).into_owned();
    let text = first_text_body(&message);
    let body_html = first_html_body(&message);
    let body = body_text(text.as_deref(), body_html.as_deref(), &raw_eml);

    let subject = message
        .subject()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("(No Subject)")
        .to_string();

    let date = message
        .date()
        .and_then(|d| DateTime::from_timestamp(d.to_timestamp(), 0))
        .map(|d| d.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(now_rfc3339);

    let cc = format_addresses(message.cc());

    debug!(file_name, subject = %subject, body_chars = body.chars().count(), "Parsed email");

    Ok(TestEmail {
        id: generate_id(),
        subject,
        from: format_addresses(message.from()),
        to: format_addresses(message.to()),
        cc: (!cc.is_empty()).then_some(cc),
        date,
        body,
        body_html,
        raw_eml,
        file_name: file_name.to_string(),
        created_at: now_rfc3339(),
        tags: Vec::new(),
    })
}

/// Parse each `(file_name, bytes)` pair independently.
pub fn parse_eml_files<I>(files: I) -> ImportReport
where
    I: IntoIterator<Item = (String, Vec<u8>)>,
{
    let mut report = ImportReport::default();
    for (file_name, bytes) in files {
        match parse_eml(&bytes, &file_name) {
            Ok(email) => report.emails.push(email),
            Err(e) => {
                warn!("Failed to parse {}: {}", file_name, e);
                report.failures.push(ImportFailure {
                    file_name,
                    error: e.to_string(),
                });
            }
        }
    }
    report
}

/// Re-derive `(body, body_html)` from stored raw message text.
pub fn reextract_body(raw_eml: &str) -> Result<(String, Option<String>)> {
    let Some(message) = MessageParser::default().parse(raw_eml.as_bytes()) else {
        bail!("stored message could not be parsed");
    };
    let text = first_text_body(&message);
    let html = first_html_body(&message);
    let body = body_text(text.as_deref(), html.as_deref(), raw_eml);
    Ok((body, html))
}

/// First HTML part of a stored raw message, if any.
pub fn html_part(raw_eml: &str) -> Option<String> {
    MessageParser::default()
        .parse(raw_eml.as_bytes())
        .and_then(|m| first_html_body(&m))
}

fn body_text(text: Option<&str>, html: Option<&str>, raw: &str) -> String {
    let parsed = extract_plain_text(RawEmailInput::Parsed { text, html });
    if !is_extraction_sentinel(&parsed) {
        return parsed;
    }
    let scanned = extract_plain_text(RawEmailInput::Raw(raw));
    if is_extraction_sentinel(&scanned) {
        String::new()
    } else {
        scanned
    }
}

fn first_text_body(message: &Message<'_>) -> Option<String> {
    message.text_bodies().find_map(|part| match &part.body {
        PartType::Text(text) => Some(text.to_string()),
        _ => None,
    })
}

fn first_html_body(message: &Message<'_>) -> Option<String> {
    message.html_bodies().find_map(|part| match &part.body {
        PartType::Html(html) => Some(html.to_string()),
        _ => None,
    })
}

/// `"Name" <addr>` or bare `addr`, comma separated.
fn format_addresses(addresses: Option<&Address<'_>>) -> String {
    let Some(addresses) = addresses else {
        return String::new();
    };
    addresses
        .iter()
        .filter_map(|addr| {
            let address = addr.address().map(str::trim).filter(|a| !a.is_empty());
            let name = addr.name().map(str::trim).filter(|n| !n.is_empty());
            match (name, address) {
                (Some(name), Some(address)) => Some(format!("\"{}\" <{}>", name, address)),
                (None, Some(address)) => Some(address.to_string()),
                (Some(name), None) => Some(name.to_string()),
                (None, None) => None,
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE: &[u8] = b"From: Alice Smith <alice@example.com>\r\n\
To: bob@example.com, \"Carol\" <carol@example.com>\r\n\
Cc: dave@example.com\r\n\
Subject: =?UTF-8?B?5L2g5aW9?= budget\r\n\
Date: Mon, 1 Jan 2024 12:00:00 +0000\r\n\
\r\n\
Please review the attached budget before Friday.";

    #[test]
    fn test_parse_simple_email() {
        let email = parse_eml(SIMPLE, "simple.eml").unwrap();
        assert_eq!(email.from, "\"Alice Smith\" <alice@example.com>");
        assert_eq!(email.to, "bob@example.com, \"Carol\" <carol@example.com>");
        assert_eq!(email.cc.as_deref(), Some("dave@example.com"));
        assert_eq!(email.subject, "你好 budget");
        assert_eq!(email.date, "2024-01-01T12:00:00.000Z");
        assert_eq!(email.body, "Please review the attached budget before Friday.");
        assert!(email.body_html.is_none());
        assert_eq!(email.file_name, "simple.eml");
        assert!(email.raw_eml.starts_with("From: Alice"));
    }

    #[test]
    fn test_missing_subject_and_cc() {
        let raw = b"From: a@x.com\r\nTo: b@x.com\r\n\r\nShort body text here.";
        let email = parse_eml(raw, "bare.eml").unwrap();
        assert_eq!(email.subject, "(No Subject)");
        assert!(email.cc.is_none());
        assert!(!email.date.is_empty());
    }

    #[test]
    fn test_html_only_email() {
        let raw = b"From: a@x.com\r\n\
To: b@x.com\r\n\
Subject: Newsletter\r\n\
Content-Type: text/html; charset=utf-8\r\n\
\r\n\
<html><body><p>Big news this week</p><p style=\"display:none\">preheader</p></body></html>";
        let email = parse_eml(raw, "news.eml").unwrap();
        assert_eq!(email.body, "Big news this week");
        assert!(email.body_html.unwrap().contains("<p>Big news"));
    }

    #[test]
    fn test_empty_file_rejected() {
        let err = parse_eml(b"  \r\n", "empty.eml").unwrap_err();
        assert!(err.to_string().contains("empty.eml"));
    }

    #[test]
    fn test_batch_reports_failures_per_file() {
        let report = parse_eml_files(vec![
            ("good.eml".to_string(), SIMPLE.to_vec()),
            ("empty.eml".to_string(), Vec::new()),
        ]);
        assert_eq!(report.emails.len(), 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].file_name, "empty.eml");
    }

    #[test]
    fn test_reextract_matches_import() {
        let email = parse_eml(SIMPLE, "simple.eml").unwrap();
        let (body, html) = reextract_body(&email.raw_eml).unwrap();
        assert_eq!(body, email.body);
        assert_eq!(html, email.body_html);
    }
}
