//! Placeholder discovery and text substitution.
//!
//! Tokens are the literal `{{KEY}}` and are matched directly against the raw
//! XML of the document body. This is the minimum viable strategy: a token that
//! an editor split across several runs (`{{` in one `w:r`, `KEY}}` in the next)
//! is invisible to it. [`split_keys`] finds such tokens by reading paragraph
//! text through the parsed tree, so callers can report them instead of silently
//! leaving them in the output.

use super::{WML_NS, is_wml, parse_body};

pub const TOKEN_OPEN: &str = "{{";
pub const TOKEN_CLOSE: &str = "}}";

pub fn token(key: &str) -> String {
    format!("{TOKEN_OPEN}{key}{TOKEN_CLOSE}")
}

pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

pub fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Byte offsets of every `{{key}}` in `body`.
pub fn find_tokens(body: &str, key: &str) -> Vec<usize> {
    if !is_valid_key(key) {
        return Vec::new();
    }
    body.match_indices(&token(key)).map(|(i, _)| i).collect()
}

/// Replace every `{{key}}` with the escaped `value`. Returns the number of
/// replacements; zero leaves `body` untouched.
pub fn substitute_text(body: &mut String, key: &str, value: &str) -> usize {
    let count = find_tokens(body, key).len();
    if count > 0 {
        *body = body.replace(&token(key), &xml_escape(value));
    }
    count
}

/// Distinct placeholder keys in order of first appearance.
pub fn scan_keys(text: &str) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find(TOKEN_OPEN) {
        let after = &rest[open + TOKEN_OPEN.len()..];
        let Some(close) = after.find(TOKEN_CLOSE) else {
            break;
        };
        let candidate = &after[..close];
        if is_valid_key(candidate) {
            if !keys.iter().any(|k| k == candidate) {
                keys.push(candidate.to_string());
            }
            rest = &after[close + TOKEN_CLOSE.len()..];
        } else {
            // "{{{KEY}}" style: retry one character further on
            rest = &rest[open + 1..];
        }
    }
    keys
}

/// Keys that appear in a paragraph's visible text but not literally in the XML,
/// i.e. tokens broken up by run boundaries. Unparseable bodies yield nothing.
pub fn split_keys(body: &str) -> Vec<String> {
    let Ok(xml) = parse_body(body) else {
        return Vec::new();
    };
    let mut split: Vec<String> = Vec::new();
    for para in xml.descendants().filter(|n| is_wml(*n, "p")) {
        let text: String = para
            .descendants()
            .filter(|n| is_wml(*n, "t"))
            .filter(|t| nearest_paragraph(*t) == Some(para))
            .filter_map(|t| t.text())
            .collect();
        for key in scan_keys(&text) {
            if !body.contains(&token(&key)) && !split.contains(&key) {
                split.push(key);
            }
        }
    }
    split
}

pub(crate) fn nearest_paragraph<'a>(
    node: roxmltree::Node<'a, 'a>,
) -> Option<roxmltree::Node<'a, 'a>> {
    node.ancestors()
        .find(|n| n.tag_name().name() == "p" && n.tag_name().namespace() == Some(WML_NS))
}
