//! Manual MIME scanning over raw message text.
//!
//! Used for messages the structured parser could not make sense of, and for
//! rendering a compact header/body view of an EML file.

use once_cell::sync::Lazy;
use regex::Regex;

use super::decode::{decode_mime_header, decode_transfer_encoding};
use super::html::html_to_text;
use super::{is_extraction_sentinel, NO_BODY, NO_READABLE_CONTENT};

/// Text parts shorter than this are treated as empty inside a multipart body.
const MIN_PART_CHARS: usize = 10;
/// Threshold for text found by scanning for part headers directly.
const MIN_SCAN_CHARS: usize = 20;
/// Cap applied to an undecorated single-part body.
const MAX_SINGLE_PART_CHARS: usize = 5000;

const IMPORTANT_HEADERS: [&str; 14] = [
    "From",
    "To",
    "Cc",
    "Bcc",
    "Date",
    "Subject",
    "Reply-To",
    "Message-ID",
    "In-Reply-To",
    "References",
    "List-Unsubscribe",
    "List-Unsubscribe-Post",
    "Content-Type",
    "MIME-Version",
];

static HEADER_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z0-9-]+):\s*(.*)$").expect("valid regex"));

static BOUNDARY_PARAM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\bboundary\s*=\s*"?([^";\s]+)"?"#).expect("valid regex"));

static TRANSFER_ENCODING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^content-transfer-encoding:\s*([A-Za-z0-9-]+)").expect("valid regex")
});

/// One leaf of a MIME tree, body already transfer-decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MimePart {
    /// Lowercased `type/subtype`, `text/plain` when the part declares none.
    pub content_type: String,
    pub body: String,
}

impl MimePart {
    pub fn is_plain(&self) -> bool {
        self.content_type == "text/plain"
    }

    pub fn is_html(&self) -> bool {
        self.content_type == "text/html"
    }
}

/// Ordered, unfolded headers of a message or part.
#[derive(Debug, Clone, Default)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    /// Parse a header block. Continuation lines are folded into the previous value.
    pub fn parse(block: &str) -> Self {
        let mut headers: Vec<(String, String)> = Vec::new();
        for line in block.lines() {
            if line.starts_with([' ', '\t']) {
                if let Some((_, value)) = headers.last_mut() {
                    value.push(' ');
                    value.push_str(line.trim());
                }
                continue;
            }
            if let Some(caps) = HEADER_LINE.captures(line) {
                headers.push((caps[1].to_string(), caps[2].trim().to_string()));
            }
        }
        Self(headers)
    }

    /// First value of `name`, compared case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    fn mime_type(&self) -> String {
        self.get("Content-Type")
            .and_then(|ct| ct.split(';').next())
            .map(|t| t.trim().to_ascii_lowercase())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "text/plain".to_string())
    }

    fn boundary(&self) -> Option<String> {
        let ct = self.get("Content-Type")?;
        BOUNDARY_PARAM.captures(ct).map(|caps| caps[1].to_string())
    }
}

fn normalize_newlines(raw: &str) -> String {
    raw.replace("\r\n", "\n").replace('\r', "\n")
}

/// Split at the first blank line. A block with no blank line is all headers.
fn split_headers_body(text: &str) -> (&str, &str) {
    if let Some(rest) = text.strip_prefix('\n') {
        return ("", rest);
    }
    match text.find("\n\n") {
        Some(idx) => (&text[..idx], &text[idx + 2..]),
        None => (text, ""),
    }
}

/// Walk a multipart body and return its leaf parts in document order.
/// Nested multiparts are flattened in place. Expects `\n` line endings.
pub fn extract_parts(body: &str, boundary: &str) -> Vec<MimePart> {
    let delimiter = format!("--{}", boundary);
    let mut parts = Vec::new();

    // the first segment is the preamble
    for segment in body.split(delimiter.as_str()).skip(1) {
        if segment.starts_with("--") {
            break;
        }
        // rest of the delimiter line
        let segment = match segment.find('\n') {
            Some(idx) => &segment[idx + 1..],
            None => continue,
        };
        let segment = segment.strip_suffix('\n').unwrap_or(segment);

        let (header_block, content) = split_headers_body(segment);
        let headers = Headers::parse(header_block);
        let content_type = headers.mime_type();

        if content_type.starts_with("multipart/") {
            if let Some(nested) = headers.boundary() {
                parts.extend(extract_parts(content, &nested));
            }
            continue;
        }

        let body = decode_transfer_encoding(content, headers.get("Content-Transfer-Encoding"));
        parts.push(MimePart { content_type, body });
    }

    parts
}

/// Choose readable text from a part list: first substantial plain part,
/// else the first HTML part that converts to substantial text.
pub fn readable_text(parts: &[MimePart]) -> Option<String> {
    let plain = parts
        .iter()
        .filter(|p| p.is_plain())
        .map(|p| p.body.trim())
        .find(|text| text.chars().count() > MIN_PART_CHARS)
        .map(str::to_string);

    plain.or_else(|| {
        parts
            .iter()
            .filter(|p| p.is_html())
            .map(|p| html_to_text(&p.body))
            .find(|text| {
                !is_extraction_sentinel(text) && text.chars().count() > MIN_PART_CHARS
            })
    })
}

/// Readable text of a multipart body, or [`NO_READABLE_CONTENT`].
pub fn extract_from_multipart(body: &str, boundary: &str) -> String {
    let body = normalize_newlines(body);
    readable_text(&extract_parts(&body, boundary))
        .unwrap_or_else(|| NO_READABLE_CONTENT.to_string())
}

/// Best-effort plain text of a complete raw message.
pub fn extract_from_raw(raw: &str) -> String {
    let raw = normalize_newlines(raw);
    let (header_block, body) = split_headers_body(&raw);
    let headers = Headers::parse(header_block);
    let content_type = headers.mime_type();
    let is_multipart = content_type.starts_with("multipart/");
    let boundary = headers.boundary();

    if is_multipart {
        if let Some(boundary) = &boundary {
            if let Some(text) = readable_text(&extract_parts(body, boundary)) {
                return text;
            }
        }
    }

    if let Some(text) = scan_for_part(&raw, "text/html", boundary.as_deref()) {
        return text;
    }
    if let Some(text) = scan_for_part(&raw, "text/plain", boundary.as_deref()) {
        return text;
    }

    if !is_multipart {
        let decoded =
            decode_transfer_encoding(body, headers.get("Content-Transfer-Encoding"));
        if content_type == "text/html" {
            return html_to_text(&decoded);
        }
        let trimmed = decoded.trim();
        if !trimmed.is_empty() {
            return crate::util::truncate_chars(trimmed, MAX_SINGLE_PART_CHARS).to_string();
        }
    }

    NO_BODY.to_string()
}

/// Delimiter prefix assumed when the message declares no boundary.
const GENERIC_DELIMITER: &str = "\n------";

/// Find a `Content-Type: <mime>` header line anywhere in the message and read
/// the content that follows it up to the next delimiter line.
///
/// The delimiter is `--<boundary>` when the message has one. A `-- ` signature
/// separator is body text, not a delimiter.
fn scan_for_part(raw: &str, mime: &str, boundary: Option<&str>) -> Option<String> {
    let lowered = raw.to_ascii_lowercase();
    let marker = format!("content-type: {}", mime);
    let start = lowered.find(&marker)?;
    let content_start = raw[start..].find("\n\n").map(|i| start + i + 2)?;
    let delimiter = match boundary {
        Some(boundary) => format!("\n--{}", boundary),
        None => GENERIC_DELIMITER.to_string(),
    };
    let content_end = raw[content_start..]
        .find(&delimiter)
        .map(|i| content_start + i)
        .unwrap_or(raw.len());

    let header_part = &raw[start..content_start];
    let encoding = TRANSFER_ENCODING
        .captures(header_part)
        .map(|caps| caps[1].to_string());
    let decoded = decode_transfer_encoding(&raw[content_start..content_end], encoding.as_deref());

    let text = if mime == "text/html" {
        html_to_text(&decoded)
    } else {
        decoded.trim().to_string()
    };

    (!is_extraction_sentinel(&text) && text.chars().count() > MIN_SCAN_CHARS).then_some(text)
}

/// Compact rendering of a raw EML file for pasting into a model prompt:
/// the headers that matter (decoded), then the readable body.
pub fn clean_email_for_ai(raw: &str) -> String {
    let normalized = normalize_newlines(raw);
    let (header_block, _) = split_headers_body(&normalized);
    let headers = Headers::parse(header_block);

    let mut lines = vec!["=== EMAIL HEADERS ===".to_string()];
    for name in IMPORTANT_HEADERS {
        if let Some(value) = headers.get(name).filter(|v| !v.is_empty()) {
            lines.push(format!("{}: {}", name, decode_mime_header(value)));
        }
    }
    lines.push(String::new());
    lines.push("=== EMAIL BODY ===".to_string());
    lines.push(extract_from_raw(&normalized));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALTERNATIVE: &str = "From: a@x.com\r\n\
Content-Type: multipart/alternative; boundary=\"b1\"\r\n\
\r\n\
preamble text\r\n\
--b1\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
Content-Transfer-Encoding: quoted-printable\r\n\
\r\n\
Plain body with caf=C3=A9 inside\r\n\
--b1\r\n\
Content-Type: text/html; charset=utf-8\r\n\
\r\n\
<p>HTML body that should lose</p>\r\n\
--b1--\r\n";

    #[test]
    fn test_headers_unfold_and_lookup() {
        let headers = Headers::parse("Subject: first\n  second\nX-Other: y");
        assert_eq!(headers.get("subject"), Some("first second"));
        assert_eq!(headers.get("X-OTHER"), Some("y"));
        assert_eq!(headers.get("missing"), None);
    }

    #[test]
    fn test_extract_parts_skips_preamble_and_epilogue() {
        let raw = normalize_newlines(ALTERNATIVE);
        let (_, body) = split_headers_body(&raw);
        let parts = extract_parts(body, "b1");
        assert_eq!(parts.len(), 2);
        assert!(parts[0].is_plain());
        assert_eq!(parts[0].body, "Plain body with café inside");
        assert!(parts[1].is_html());
    }

    #[test]
    fn test_plain_preferred_over_html() {
        assert_eq!(extract_from_raw(ALTERNATIVE), "Plain body with café inside");
    }

    #[test]
    fn test_short_plain_falls_back_to_html() {
        let body = "--b\nContent-Type: text/plain\n\nhi\n--b\nContent-Type: text/html\n\n<p>The HTML version is longer</p>\n--b--\n";
        assert_eq!(
            extract_from_multipart(body, "b"),
            "The HTML version is longer"
        );
    }

    #[test]
    fn test_nested_multipart() {
        let raw = "Content-Type: multipart/mixed; boundary=outer\n\n\
--outer\n\
Content-Type: multipart/alternative; boundary=inner\n\n\
--inner\n\
Content-Type: text/plain\n\
Content-Transfer-Encoding: base64\n\n\
TmVzdGVkIHBsYWluIHRleHQgYm9keQ==\n\
--inner--\n\
--outer\n\
Content-Type: application/pdf\n\n\
JVBERi0=\n\
--outer--\n";
        assert_eq!(extract_from_raw(raw), "Nested plain text body");
    }

    #[test]
    fn test_no_readable_content_sentinel() {
        let body = "--b\nContent-Type: image/png\n\nAAAA\n--b--\n";
        assert_eq!(extract_from_multipart(body, "b"), NO_READABLE_CONTENT);
    }

    #[test]
    fn test_single_part_plain_is_trimmed_and_capped() {
        let long = "x".repeat(6000);
        let raw = format!("Subject: s\n\n  {}  \n", long);
        let text = extract_from_raw(&raw);
        assert_eq!(text.chars().count(), MAX_SINGLE_PART_CHARS);
    }

    #[test]
    fn test_single_part_html() {
        let raw = "Content-Type: text/html\nContent-Transfer-Encoding: quoted-printable\n\n<div>Short=\nHTML note =E2=80=94 ok</div>";
        assert_eq!(extract_from_raw(raw), "ShortHTML note — ok");
    }

    #[test]
    fn test_no_body_sentinel() {
        assert_eq!(extract_from_raw("Subject: only headers\n"), NO_BODY);
        assert_eq!(extract_from_raw(""), NO_BODY);
    }

    #[test]
    fn test_missing_boundary_uses_direct_scan() {
        let raw = "Content-Type: multipart/alternative\n\n\
------=_Part_1\n\
Content-Type: text/plain\n\n\
Scanned plain text long enough to use\n\
------=_Part_1--\n";
        assert_eq!(extract_from_raw(raw), "Scanned plain text long enough to use");
    }

    #[test]
    fn test_signature_separator_is_kept_in_plain_body() {
        let raw = "From: alice@x.com\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
Hi Bob,\r\n\
\r\n\
Please find the budget attached for review.\r\n\
\r\n\
-- \r\n\
Alice Smith\r\n\
VP Finance";
        let text = extract_from_raw(raw);
        assert!(text.ends_with("-- \nAlice Smith\nVP Finance"), "{}", text);
        assert!(clean_email_for_ai(raw).ends_with("VP Finance"));
    }

    #[test]
    fn test_scan_stops_at_declared_boundary_only() {
        let raw = "Content-Type: multipart/mixed; boundary=zz\n\n\
--zz\n\
Content-Type: text/plain\n\n\
Numbers below\n\
--- a dashed line ---\n\
still the same part\n\
--zz\n\
Content-Type: text/plain\n\n\
second\n\
--zz--\n";
        let parts_text = scan_for_part(&normalize_newlines(raw), "text/plain", Some("zz"));
        assert_eq!(
            parts_text.as_deref(),
            Some("Numbers below\n--- a dashed line ---\nstill the same part")
        );
    }

    #[test]
    fn test_clean_email_for_ai_layout() {
        let raw = "Received: from relay\n\
From: =?UTF-8?B?5byg5LiJ?= <zs@x.com>\n\
To: a@x.com\n\
Subject: Weekly\n  report\n\
Content-Type: text/plain\n\n\
Body text for the weekly report.\n";
        let cleaned = clean_email_for_ai(raw);
        assert_eq!(
            cleaned,
            "=== EMAIL HEADERS ===\n\
From: 张三 <zs@x.com>\n\
To: a@x.com\n\
Subject: Weekly report\n\
Content-Type: text/plain\n\
\n\
=== EMAIL BODY ===\n\
Body text for the weekly report."
        );
    }

    #[test]
    fn test_extraction_is_idempotent() {
        assert_eq!(extract_from_raw(ALTERNATIVE), extract_from_raw(ALTERNATIVE));
    }
}
