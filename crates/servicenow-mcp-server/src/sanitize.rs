//! Plain-text cleanup for knowledge search results.
//!
//! Article bodies are HTML and can be large. Search results carry a cleaned,
//! truncated copy so a listing stays readable; fetching a single article
//! returns it untouched.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

/// Character budget for the article body
pub const TEXT_LIMIT: usize = 1000;
/// Character budget for description fields
pub const FIELD_LIMIT: usize = 500;

const DESCRIPTION_FIELDS: [&str; 3] = ["short_description", "meta_description", "description"];

/// Clean the HTML-bearing fields of one article in place.
///
/// Fields may be plain strings or `{value, display_value}` objects.
pub fn sanitize_article(article: &mut Value) {
    sanitize_field(article, "text", TEXT_LIMIT);
    for field in DESCRIPTION_FIELDS {
        sanitize_field(article, field, FIELD_LIMIT);
    }
}

fn sanitize_field(article: &mut Value, field: &str, limit: usize) {
    let Some(slot) = article.get_mut(field) else {
        return;
    };
    match slot {
        Value::String(raw) => {
            if !raw.is_empty() {
                *raw = clean_html(raw, limit);
            }
        }
        Value::Object(map) => {
            let Some(raw) = map.get("value").and_then(Value::as_str) else {
                return;
            };
            if raw.is_empty() {
                return;
            }
            let clean = clean_html(raw, limit);
            map.insert("display_value".to_string(), Value::String(clean.clone()));
            map.insert("value".to_string(), Value::String(clean));
        }
        _ => {}
    }
}

/// Unescape entities, drop tags, collapse whitespace, drop control
/// characters, and cut to `limit` characters (with a trailing `...`).
pub fn clean_html(input: &str, limit: usize) -> String {
    static TAG_RE: OnceLock<Regex> = OnceLock::new();
    static WHITESPACE_RE: OnceLock<Regex> = OnceLock::new();
    static CONTROL_RE: OnceLock<Regex> = OnceLock::new();

    let tag_re = TAG_RE.get_or_init(|| Regex::new(r"<[^>]+>").expect("tag pattern"));
    let whitespace_re = WHITESPACE_RE.get_or_init(|| Regex::new(r"\s+").expect("whitespace pattern"));
    // C0 and C1 controls, plus DEL
    let control_re = CONTROL_RE
        .get_or_init(|| Regex::new(r"[\x00-\x1f\x7f-\x{9f}]").expect("control pattern"));

    let unescaped = html_escape::decode_html_entities(input);
    let untagged = tag_re.replace_all(&unescaped, "");
    let collapsed = whitespace_re.replace_all(&untagged, " ");
    let cleaned = control_re.replace_all(collapsed.trim(), "");

    match cleaned.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}...", &cleaned[..cut]),
        None => cleaned.into_owned(),
    }
}
