//! Domain frequency analysis: ranks URL hostnames across the whole export
//! and produces the bounded hostname → placeholder-token map consumed by the
//! normalizer.

use indexmap::IndexMap;

use crate::message::{flatten_content, Message};
use crate::normalize::{url_host, OTHER_DOMAIN_TOKEN, URL_RE};

/// Count URL hostnames across all messages, in first-seen order.
///
/// Scans each message's flattened content once; hostnames are lowercased.
/// The insertion order of the returned map is the tie-break order for
/// [`DomainTokenMap::build`].
pub fn collect_domain_counts(messages: &[Message]) -> IndexMap<String, usize> {
    let mut counts: IndexMap<String, usize> = IndexMap::new();
    for m in messages {
        let text = flatten_content(&m.text);
        for mat in URL_RE.find_iter(&text) {
            if let Some(host) = url_host(mat.as_str()) {
                *counts.entry(host).or_insert(0) += 1;
            }
        }
    }
    counts
}

/// Merge per-export counts into `total`, preserving first-seen order.
pub fn merge_domain_counts(total: &mut IndexMap<String, usize>, counts: IndexMap<String, usize>) {
    for (host, n) in counts {
        *total.entry(host).or_insert(0) += n;
    }
}

/// Bounded mapping from lowercase hostname to its placeholder token.
/// Built once per run and immutable afterward; hostnames outside the top-K
/// map to [`OTHER_DOMAIN_TOKEN`].
#[derive(Debug, Clone, Default)]
pub struct DomainTokenMap {
    tokens: IndexMap<String, String>,
}

impl DomainTokenMap {
    /// Rank hostnames descending by count (ties in first-seen order),
    /// truncate to `top_k`, and assign each survivor its `<URL:host>` token.
    pub fn build(counts: IndexMap<String, usize>, top_k: usize) -> Self {
        let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
        // stable sort keeps first-seen order among equal counts
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.truncate(top_k);

        let tokens = ranked
            .into_iter()
            .map(|(host, _)| {
                let token = format!("<URL:{host}>");
                (host, token)
            })
            .collect();
        Self { tokens }
    }

    /// The token for a hostname, falling back to the generic placeholder.
    pub fn token_for(&self, host: &str) -> &str {
        self.tokens
            .get(host)
            .map(String::as_str)
            .unwrap_or(OTHER_DOMAIN_TOKEN)
    }

    /// Ranked (hostname, token) entries, most frequent first.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.tokens.iter().map(|(h, t)| (h.as_str(), t.as_str()))
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}
