//! Text normalization: HTML entity decoding, URL → domain-token
//! substitution, and whitespace policy.

use std::sync::LazyLock;

use regex::Regex;

use crate::domains::DomainTokenMap;
use crate::message::{flatten_content, Message};

// http(s) URLs, terminated by whitespace, a closing paren or a double quote
pub(crate) static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)https?://[^\s)"]+"#).unwrap());
// intra-line blank characters, newlines excluded
static INLINE_WS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t\x0B\x0C\r]+").unwrap());
// three or more consecutive newlines
static BLANK_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());
// any run of whitespace, newlines included
static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Placeholder for URLs whose hostname is not in the top-K domain map.
pub const OTHER_DOMAIN_TOKEN: &str = "<URL:OTHER>";

/// Extract the lowercased hostname from a URL string, if it parses.
pub(crate) fn url_host(url: &str) -> Option<String> {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
}

/// Normalize raw message text into its canonical form.
///
/// HTML entities are decoded first (`&amp;` → `&`), then every URL is
/// replaced by its domain token (or [`OTHER_DOMAIN_TOKEN`] when the hostname
/// is unranked or unparseable). With `keep_newlines`, line endings collapse
/// to `\n`, intra-line blank runs to one space, and three-plus consecutive
/// newlines to exactly two; otherwise all whitespace collapses to single
/// spaces. The result is trimmed; empty input yields an empty string.
pub fn normalize_text(raw: &str, domains: &DomainTokenMap, keep_newlines: bool) -> String {
    if raw.is_empty() {
        return String::new();
    }

    let text = html_escape::decode_html_entities(raw);

    let text = URL_RE.replace_all(&text, |caps: &regex::Captures<'_>| {
        match url_host(&caps[0]) {
            Some(host) => domains.token_for(&host).to_string(),
            None => OTHER_DOMAIN_TOKEN.to_string(),
        }
    });

    let text = if keep_newlines {
        let text = text.replace("\r\n", "\n");
        let text = INLINE_WS_RE.replace_all(&text, " ");
        BLANK_RUN_RE.replace_all(&text, "\n\n").into_owned()
    } else {
        WS_RE.replace_all(&text, " ").into_owned()
    };

    text.trim().to_string()
}

/// Flatten a message's content and normalize it in one step.
pub fn normalized_message_text(
    message: &Message,
    domains: &DomainTokenMap,
    keep_newlines: bool,
) -> String {
    normalize_text(&flatten_content(&message.text), domains, keep_newlines)
}
