//! HTML to readable plain text.
//!
//! A regex pipeline rather than a DOM: mail HTML is routinely malformed and we
//! only need visible text, a few link targets and sensible line breaks.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::HTML_UNREADABLE;

const MIN_HTML_TEXT_CHARS: usize = 10;

/// Inside of a tag. Quoted attribute values may contain `>`.
const ATTRS: &str = r#"(?:[^>"']|"[^"]*"|'[^']*')*"#;

static COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid regex"));

static NON_CONTENT_BLOCKS: Lazy<Vec<Regex>> = Lazy::new(|| {
    ["script", "style", "head", "noscript"]
        .iter()
        .map(|tag| {
            Regex::new(&format!(r"(?is)<{tag}\b{ATTRS}>.*?</{tag}\s*>")).expect("valid regex")
        })
        .collect()
});

static VOID_META: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?is)<(?:meta|link)\b{ATTRS}>")).expect("valid regex")
});

static OPEN_WITH_STYLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r#"(?is)<([a-z][a-z0-9]*)\b(?:[^>"']|"[^"]*"|'[^']*')*?\bstyle\s*=\s*(?:"([^"]*)"|'([^']*)'){ATTRS}>"#
    ))
    .expect("valid regex")
});

static HIDDEN_STYLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)display\s*:\s*none|visibility\s*:\s*hidden").expect("valid regex")
});

static ANY_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?is)<(/?)([a-z][a-z0-9]*)\b{ATTRS}>")).expect("valid regex")
});

static ANCHOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?is)<a\b({ATTRS})>(.*?)</a\s*>")).expect("valid regex")
});

static HREF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)\bhref\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#).expect("valid regex")
});

static BLOCK_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)</?(?:div|p|br|hr|tr|li|h[1-6]|td|th|table)\b{ATTRS}>"
    ))
    .expect("valid regex")
});

static TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?s)<{ATTRS}>")).expect("valid regex"));

static ENTITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z][a-zA-Z0-9]{1,15});")
        .expect("valid regex")
});

static HORIZONTAL_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").expect("valid regex"));

static EXCESS_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

const VOID_ELEMENTS: [&str; 6] = ["br", "hr", "img", "input", "meta", "link"];

/// Convert an HTML fragment or document into plain text.
///
/// Returns [`HTML_UNREADABLE`] when fewer than ten characters survive.
pub fn html_to_text(html: &str) -> String {
    let html = html.replace("\r\n", "\n");
    let html = COMMENT.replace_all(&html, "");
    let mut html = html.into_owned();
    for block in NON_CONTENT_BLOCKS.iter() {
        html = block.replace_all(&html, "").into_owned();
    }
    let html = VOID_META.replace_all(&html, "");
    let html = remove_hidden_elements(&html);
    let html = annotate_unsubscribe_links(&html);
    let html = BLOCK_TAG.replace_all(&html, "\n");
    let text = TAG.replace_all(&html, "");
    let text = decode_entities(&text);
    let text = normalize_whitespace(&text);

    if text.chars().count() < MIN_HTML_TEXT_CHARS {
        return HTML_UNREADABLE.to_string();
    }
    text
}

/// Drop elements styled `display:none` or `visibility:hidden`, content included.
fn remove_hidden_elements(html: &str) -> String {
    let mut html = html.to_string();
    loop {
        let Some((start, open_end, tag)) = find_hidden_open_tag(&html) else {
            return html;
        };
        let self_closing = html[start..open_end].ends_with("/>");
        let end = if self_closing || VOID_ELEMENTS.contains(&tag.as_str()) {
            open_end
        } else {
            matching_close(&html, open_end, &tag).unwrap_or(open_end)
        };
        html.replace_range(start..end, "");
    }
}

fn find_hidden_open_tag(html: &str) -> Option<(usize, usize, String)> {
    OPEN_WITH_STYLE.captures_iter(html).find_map(|caps| {
        let style = caps.get(2).or_else(|| caps.get(3))?.as_str();
        if !HIDDEN_STYLE.is_match(style) {
            return None;
        }
        let whole = caps.get(0)?;
        Some((whole.start(), whole.end(), caps[1].to_ascii_lowercase()))
    })
}

/// End offset of the close tag balancing an element opened just before `from`.
fn matching_close(html: &str, from: usize, tag: &str) -> Option<usize> {
    let mut depth = 1usize;
    for caps in ANY_TAG.captures_iter(&html[from..]) {
        if !caps[2].eq_ignore_ascii_case(tag) {
            continue;
        }
        let whole = caps.get(0)?;
        if caps[1].is_empty() {
            if !whole.as_str().ends_with("/>") {
                depth += 1;
            }
        } else {
            depth -= 1;
            if depth == 0 {
                return Some(from + whole.end());
            }
        }
    }
    None
}

/// Keep the target of unsubscribe links, which would otherwise be lost with the tag.
fn annotate_unsubscribe_links(html: &str) -> String {
    ANCHOR
        .replace_all(html, |caps: &Captures<'_>| {
            let whole = caps[0].to_string();
            let Some(href) = HREF.captures(&caps[1]).and_then(|h| {
                h.get(1)
                    .or_else(|| h.get(2))
                    .or_else(|| h.get(3))
                    .map(|m| m.as_str().to_string())
            }) else {
                return whole;
            };

            let inner = TAG.replace_all(&caps[2], "");
            let visible = decode_entities(&inner);
            let visible = visible.trim();
            if visible.is_empty() || visible.contains("http") {
                return whole;
            }

            let mentions_unsubscribe = href.to_lowercase().contains("unsubscribe")
                || visible.to_lowercase().contains("unsubscribe")
                || visible.contains("退订");
            if mentions_unsubscribe {
                format!("{} [{}]", inner.trim(), href)
            } else {
                whole
            }
        })
        .into_owned()
}

/// Decode the handful of named entities mail HTML uses plus numeric references.
/// Zero-width joiners are dropped entirely.
pub fn decode_entities(text: &str) -> String {
    ENTITY
        .replace_all(text, |caps: &Captures<'_>| {
            let name = &caps[1];
            if let Some(num) = name.strip_prefix('#') {
                let code = match num.strip_prefix(['x', 'X']) {
                    Some(hex) => u32::from_str_radix(hex, 16).ok(),
                    None => num.parse::<u32>().ok(),
                };
                return match code.and_then(char::from_u32) {
                    Some('\u{200c}') | Some('\u{200d}') => String::new(),
                    Some('\u{a0}') => " ".to_string(),
                    Some(c) => c.to_string(),
                    None => caps[0].to_string(),
                };
            }
            match name {
                "nbsp" | "ensp" | "emsp" | "thinsp" => " ",
                "amp" => "&",
                "lt" => "<",
                "gt" => ">",
                "quot" => "\"",
                "apos" => "'",
                "zwnj" | "zwj" | "shy" => "",
                "copy" => "©",
                "reg" => "®",
                "trade" => "™",
                "hellip" => "…",
                "mdash" => "—",
                "ndash" => "–",
                "lsquo" => "‘",
                "rsquo" => "’",
                "ldquo" => "“",
                "rdquo" => "”",
                "middot" => "·",
                "bull" => "•",
                "euro" => "€",
                _ => return caps[0].to_string(),
            }
            .to_string()
        })
        .into_owned()
}

fn normalize_whitespace(text: &str) -> String {
    let text: String = text
        .chars()
        .filter(|c| !matches!(c, '\u{200b}' | '\u{200c}' | '\u{200d}' | '\u{feff}'))
        .map(|c| if c == '\u{a0}' { ' ' } else { c })
        .collect();
    let text = text.replace('\r', "");
    let text = HORIZONTAL_WS.replace_all(&text, " ");
    let text = text
        .split('\n')
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n");
    EXCESS_NEWLINES
        .replace_all(&text, "\n\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_non_content_elements() {
        let html = r#"<html><head><title>T</title><style>p{color:red}</style></head>
            <body><script>alert(1)</script><noscript>enable js</noscript>
            <p>Visible paragraph text</p><!-- hidden comment --></body></html>"#;
        let text = html_to_text(html);
        assert_eq!(text, "Visible paragraph text");
    }

    #[test]
    fn test_block_elements_become_line_breaks() {
        let html = "<div>First line here</div><div>Second line here</div><p>Third</p>";
        let text = html_to_text(html);
        assert_eq!(text, "First line here\n\nSecond line here\n\nThird");
    }

    #[test]
    fn test_hidden_elements_removed_with_content() {
        let html = r#"<div>Shown text stays</div>
            <div style="display: none"><div>nested preheader</div>secret</div>
            <span style='visibility:hidden'>also secret</span>
            <p>More shown text</p>"#;
        let text = html_to_text(html);
        assert!(text.contains("Shown text stays"));
        assert!(text.contains("More shown text"));
        assert!(!text.contains("secret"));
        assert!(!text.contains("preheader"));
    }

    #[test]
    fn test_unsubscribe_link_keeps_href() {
        let html = r#"<p>Weekly news digest</p><a href="https://x.com/unsubscribe?id=1">Unsubscribe</a>"#;
        let text = html_to_text(html);
        assert!(text.contains("Unsubscribe [https://x.com/unsubscribe?id=1]"));
    }

    #[test]
    fn test_chinese_unsubscribe_link() {
        let html = r#"<p>本周新闻摘要内容</p><a href="https://x.com/u/1">点此退订</a>"#;
        let text = html_to_text(html);
        assert!(text.contains("点此退订 [https://x.com/u/1]"));
    }

    #[test]
    fn test_ordinary_link_text_only() {
        let html = r#"<p>Read the <a href="https://x.com/post">full article</a> online</p>"#;
        assert_eq!(html_to_text(html), "Read the full article online");
    }

    #[test]
    fn test_link_text_with_url_not_annotated() {
        let html = r#"<p>Footer</p><a href="https://x.com/unsubscribe">https://x.com/unsubscribe</a>"#;
        let text = html_to_text(html);
        assert!(!text.contains('['));
    }

    #[test]
    fn test_gt_inside_quoted_attribute_stays_in_tag() {
        let html = r#"<p>Quarterly results are in</p><img alt="a > b" src="chart.png"><p>See above</p>"#;
        assert_eq!(html_to_text(html), "Quarterly results are in\n\nSee above");

        let html = r#"<div title='x > y' style="color: red">Styled block text</div>"#;
        assert_eq!(html_to_text(html), "Styled block text");

        let html = r#"<p>Weekly news digest</p><a data-note="1 > 0" href="https://x.com/unsubscribe">Unsubscribe</a>"#;
        assert!(html_to_text(html).contains("Unsubscribe [https://x.com/unsubscribe]"));
    }

    #[test]
    fn test_entities_decoded() {
        let html = "<p>Tom&nbsp;&amp;&nbsp;Jerry &lt;3 &#39;quoted&#x27; caf&eacute;&zwnj;&zwj;</p>";
        let text = html_to_text(html);
        assert_eq!(text, "Tom & Jerry <3 'quoted' caf&eacute;");
    }

    #[test]
    fn test_whitespace_normalized() {
        let html = "<p>  lots   of \t space  </p>\n\n\n\n<p>next block</p>";
        assert_eq!(html_to_text(html), "lots of space\n\nnext block");
    }

    #[test]
    fn test_short_output_returns_sentinel() {
        assert_eq!(html_to_text("<p>hi</p>"), HTML_UNREADABLE);
        assert_eq!(html_to_text(""), HTML_UNREADABLE);
    }

    #[test]
    fn test_idempotent_on_same_input() {
        let html = "<div>Repeatable <b>output</b> every time</div>";
        assert_eq!(html_to_text(html), html_to_text(html));
    }
}
