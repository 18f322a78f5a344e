//! Transfer-encoding and header-word decoding.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, PAD};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;

/// Standard alphabet that tolerates missing or extra padding, as found in real mail.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    PAD.with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

static SOFT_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"=\r?\n").expect("valid regex"));

static ENCODED_WORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"=\?([^?\s]+)\?([BbQq])\?([^?]*)\?=").expect("valid regex")
});

/// Decode a quoted-printable body. Escaped octets are collected as bytes and
/// the whole sequence is read as UTF-8, so multi-byte characters survive.
pub fn decode_quoted_printable(input: &str) -> String {
    let joined = SOFT_BREAK.replace_all(input, "");
    String::from_utf8_lossy(&qp_bytes(joined.as_bytes(), false)).into_owned()
}

fn qp_bytes(input: &[u8], underscore_is_space: bool) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    let mut i = 0;
    while i < input.len() {
        let b = input[i];
        if b == b'=' && i + 2 < input.len() {
            if let (Some(hi), Some(lo)) = (hex_value(input[i + 1]), hex_value(input[i + 2])) {
                out.push(hi << 4 | lo);
                i += 3;
                continue;
            }
        }
        if underscore_is_space && b == b'_' {
            out.push(b' ');
        } else {
            out.push(b);
        }
        i += 1;
    }
    out
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Decode a base64 body as UTF-8. Input that is not valid base64 is returned unchanged.
pub fn decode_base64(input: &str) -> String {
    let cleaned: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    match LENIENT_BASE64.decode(cleaned.as_bytes()) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(_) => input.to_string(),
    }
}

/// Decode a body according to its `Content-Transfer-Encoding` header value.
pub fn decode_transfer_encoding(body: &str, encoding: Option<&str>) -> String {
    match encoding.map(|e| e.trim().to_ascii_lowercase()).as_deref() {
        Some("base64") => decode_base64(body),
        Some("quoted-printable") => decode_quoted_printable(body),
        _ => body.to_string(),
    }
}

/// Decode RFC 2047 encoded words (`=?charset?B?...?=`, `=?charset?Q?...?=`)
/// in a header value. Whitespace between two adjacent encoded words is dropped.
/// Words that fail to decode are kept verbatim.
pub fn decode_mime_header(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut last_end = 0;
    let mut prev_was_word = false;

    for caps in ENCODED_WORD.captures_iter(value) {
        let Some(whole) = caps.get(0) else { continue };
        let gap = &value[last_end..whole.start()];
        if !(prev_was_word && gap.trim().is_empty()) {
            out.push_str(gap);
        }

        match decode_word(&caps[1], &caps[2], &caps[3]) {
            Some(decoded) => {
                out.push_str(&decoded);
                prev_was_word = true;
            }
            None => {
                out.push_str(whole.as_str());
                prev_was_word = false;
            }
        }
        last_end = whole.end();
    }

    out.push_str(&value[last_end..]);
    out
}

fn decode_word(charset: &str, encoding: &str, text: &str) -> Option<String> {
    let bytes = match encoding {
        "B" | "b" => LENIENT_BASE64.decode(text.as_bytes()).ok()?,
        _ => qp_bytes(text.as_bytes(), true),
    };
    Some(decode_charset(charset, &bytes))
}

fn decode_charset(charset: &str, bytes: &[u8]) -> String {
    // RFC 2231 language suffix: utf-8*en
    let charset = charset.split('*').next().unwrap_or(charset);
    match charset.to_ascii_lowercase().as_str() {
        "iso-8859-1" | "latin1" | "latin-1" | "us-ascii" | "ascii" => {
            bytes.iter().map(|&b| b as char).collect()
        }
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}
