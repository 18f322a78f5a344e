//! Readable text from email messages.
//!
//! Every function here is a pure transformation of its input. Failure is
//! reported in-band through one of the sentinel strings below so callers can
//! store something and decide whether to try another source.

pub mod decode;
pub mod eml;
pub mod html;
pub mod mime;
pub mod reparse;

pub use decode::{decode_base64, decode_mime_header, decode_quoted_printable};
pub use eml::{parse_eml, parse_eml_files, ImportFailure, ImportReport};
pub use html::html_to_text;
pub use mime::{clean_email_for_ai, extract_from_multipart, extract_from_raw, extract_parts, MimePart};

pub const HTML_UNREADABLE: &str = "(HTML content could not be extracted)";
pub const NO_READABLE_CONTENT: &str = "(No readable content found)";
pub const NO_BODY: &str = "(No body found)";

/// Whether `text` is one of the extractor's failure markers.
pub fn is_extraction_sentinel(text: &str) -> bool {
    matches!(text, HTML_UNREADABLE | NO_READABLE_CONTENT | NO_BODY)
}

/// What the extractor is given to work with.
#[derive(Debug, Clone, Copy)]
pub enum RawEmailInput<'a> {
    /// Bodies already located by a MIME parser.
    Parsed {
        text: Option<&'a str>,
        html: Option<&'a str>,
    },
    /// A complete message, scanned manually.
    Raw(&'a str),
}

/// Plain text for display and prompting.
///
/// A parsed text body wins when it has content; HTML is converted otherwise.
pub fn extract_plain_text(input: RawEmailInput<'_>) -> String {
    match input {
        RawEmailInput::Parsed { text, html } => {
            if let Some(text) = text.map(str::trim).filter(|t| !t.is_empty()) {
                return text.to_string();
            }
            match html {
                Some(html) => html_to_text(html),
                None => NO_BODY.to_string(),
            }
        }
        RawEmailInput::Raw(raw) => extract_from_raw(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parsed_text_preferred() {
        let text = extract_plain_text(RawEmailInput::Parsed {
            text: Some("  plain body  "),
            html: Some("<p>html body that is long</p>"),
        });
        assert_eq!(text, "plain body");
    }

    #[test]
    fn test_parsed_html_fallback() {
        let text = extract_plain_text(RawEmailInput::Parsed {
            text: Some("   "),
            html: Some("<p>html body that is long</p>"),
        });
        assert_eq!(text, "html body that is long");
    }

    #[test]
    fn test_parsed_nothing() {
        let text = extract_plain_text(RawEmailInput::Parsed {
            text: None,
            html: None,
        });
        assert_eq!(text, NO_BODY);
        assert!(is_extraction_sentinel(&text));
    }

    #[test]
    fn test_sentinels_recognised() {
        assert!(is_extraction_sentinel(HTML_UNREADABLE));
        assert!(is_extraction_sentinel(NO_READABLE_CONTENT));
        assert!(!is_extraction_sentinel("(No body found) but more"));
    }
}
