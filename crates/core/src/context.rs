//! Context reconstruction for a collapsed chain: walk the reply-to chain
//! upward, fall back to a temporal rolling window over preceding messages,
//! and apply the idle-gap override that can reclassify windowed context as
//! standalone.

use chrono::Duration;
use tracing::debug;

use crate::domains::DomainTokenMap;
use crate::message::{parse_timestamp, Message, MessageIndex};
use crate::normalize::normalized_message_text;
use crate::pipeline::PairingConfig;

/// How the prompt context for a pair was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextSource {
    /// Walked up an explicit reply-to chain.
    Reply,
    /// Rolling window over immediately preceding messages.
    Window,
    /// No causal or windowed antecedent; the pair is standalone.
    None,
}

/// True if `child - parent` is within `max_gap_hours`. Unparseable or
/// missing timestamps keep the ancestor (fail open) so valid data is not
/// silently dropped.
fn is_recent_enough(parent_ts: Option<&str>, child_ts: Option<&str>, max_gap_hours: i64) -> bool {
    let parsed = parent_ts
        .and_then(parse_timestamp)
        .zip(child_ts.and_then(parse_timestamp));
    match parsed {
        Some((parent, child)) => child - parent <= Duration::hours(max_gap_hours),
        None => {
            debug!(?parent_ts, ?child_ts, "unparseable timestamps, keeping ancestor");
            true
        }
    }
}

/// Reconstruct the prompt context for `root`, the oldest message of a
/// collapsed self-chain.
///
/// Phase A walks the reply-to chain upward, at most `thread_cap` hops,
/// stopping at dangling links and at ancestors staler than
/// `time_gap_hours`; only non-empty texts by other authors are collected.
/// Phase B, entered only when Phase A yielded nothing, walks backward over
/// the flat sequence collecting up to `window_size` qualifying predecessors.
/// Phase C discards window-derived parts again when the chat had been idle
/// for at least `idle_cutoff_min` minutes before `root` (timestamp parse
/// failures leave the parts unchanged).
///
/// Returns the prompt parts in chronological order plus the context source.
pub fn reconstruct_context(
    root: &Message,
    index: &MessageIndex<'_>,
    domains: &DomainTokenMap,
    config: &PairingConfig,
) -> (Vec<String>, ContextSource) {
    let author = config.author_id.as_str();
    let mut parts: Vec<String> = Vec::new();
    let mut source = if root.reply_to_message_id.is_some() {
        ContextSource::Reply
    } else {
        debug!(id = root.id, "not a reply, initially standalone");
        ContextSource::None
    };

    // Phase A: reply-chain walk
    let mut parent_id = root.reply_to_message_id;
    let mut hops = 0;
    while let Some(pid) = parent_id {
        if hops >= config.thread_cap {
            break;
        }
        let Some(parent) = index.get(pid) else {
            break;
        };
        if !is_recent_enough(
            parent.date.as_deref(),
            root.date.as_deref(),
            config.time_gap_hours,
        ) {
            break;
        }
        let text = normalized_message_text(parent, domains, config.keep_newlines);
        if !text.is_empty() && parent.author() != Some(author) {
            parts.push(text);
        }
        parent_id = parent.reply_to_message_id;
        hops += 1;
    }
    parts.reverse();

    // Phase B: rolling-window fallback
    if parts.is_empty() {
        let messages = index.messages();
        let root_pos = index.position(root.id).unwrap_or(0);
        let mut included = 0;
        let mut last_scanned: Option<usize> = None;

        for idx in (0..root_pos).rev() {
            if included >= config.window_size {
                break;
            }
            last_scanned = Some(idx);
            let prev = &messages[idx];
            if prev.author() == Some(author) {
                continue; // the author's own lines are never window context
            }
            let text = normalized_message_text(prev, domains, config.keep_newlines);
            if !text.is_empty() {
                parts.push(text);
                included += 1;
            }
        }
        parts.reverse();

        if !parts.is_empty() {
            source = ContextSource::Window;
        }

        // Phase C: idle-gap override. The anchor is the last message the
        // window walk examined, included or not. Parse failures are lenient
        // here, unlike the reply-chain recency gate.
        if config.idle_cutoff_min > 0 && !parts.is_empty() {
            if let Some(anchor) = last_scanned.map(|idx| &messages[idx]) {
                let parsed = anchor
                    .date
                    .as_deref()
                    .and_then(parse_timestamp)
                    .zip(root.date.as_deref().and_then(parse_timestamp));
                if let Some((anchor_ts, root_ts)) = parsed {
                    if root_ts - anchor_ts >= Duration::minutes(i64::from(config.idle_cutoff_min)) {
                        parts.clear();
                        source = ContextSource::None;
                        debug!(id = root.id, "marked standalone (idle gap)");
                    }
                }
            }
        }
    }

    (parts, source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use serde_json::json;

    fn msg(id: i64, from: &str, date: &str, reply_to: Option<i64>, text: &str) -> Message {
        serde_json::from_value(json!({
            "id": id,
            "from_id": from,
            "date": date,
            "reply_to_message_id": reply_to,
            "text": text,
        }))
        .unwrap()
    }

    fn config() -> PairingConfig {
        PairingConfig {
            author_id: "bob".to_string(),
            ..PairingConfig::default()
        }
    }

    fn no_domains() -> DomainTokenMap {
        DomainTokenMap::build(IndexMap::new(), 0)
    }

    #[test]
    fn direct_reply_yields_parent_text() {
        let messages = vec![
            msg(1, "alice", "2023-01-15T12:00:00", None, "what time?"),
            msg(2, "bob", "2023-01-15T12:01:00", Some(1), "6pm"),
        ];
        let index = MessageIndex::new(&messages);
        let (parts, source) = reconstruct_context(&messages[1], &index, &no_domains(), &config());
        assert_eq!(parts, vec!["what time?"]);
        assert_eq!(source, ContextSource::Reply);
    }

    #[test]
    fn reply_walk_is_capped_by_thread_cap() {
        // 8 ancestors chained by reply links, cap at 6 hops
        let mut messages: Vec<Message> = (1..=8)
            .map(|i| {
                let reply_to = if i == 1 { None } else { Some(i - 1) };
                msg(i, "alice", "2023-01-15T12:00:00", reply_to, &format!("a{i}"))
            })
            .collect();
        messages.push(msg(9, "bob", "2023-01-15T12:05:00", Some(8), "reply"));
        let index = MessageIndex::new(&messages);

        let (parts, source) = reconstruct_context(&messages[8], &index, &no_domains(), &config());
        assert_eq!(source, ContextSource::Reply);
        assert_eq!(parts.len(), 6);
        // chronological order, nearest six ancestors
        assert_eq!(parts, vec!["a3", "a4", "a5", "a6", "a7", "a8"]);
    }

    #[test]
    fn stale_ancestor_ends_the_walk() {
        let messages = vec![
            msg(1, "alice", "2023-01-14T10:00:00", None, "yesterday"),
            msg(2, "bob", "2023-01-15T12:00:00", Some(1), "today"),
        ];
        let index = MessageIndex::new(&messages);
        let (parts, source) = reconstruct_context(&messages[1], &index, &no_domains(), &config());
        // the stale ancestor contributes nothing via the reply walk, but the
        // window fallback still picks it up as a nearby predecessor
        assert_eq!(parts, vec!["yesterday"]);
        assert_eq!(source, ContextSource::Window);
    }

    #[test]
    fn unparseable_ancestor_timestamp_fails_open() {
        let messages = vec![
            msg(1, "alice", "not-a-date", None, "hello"),
            msg(2, "bob", "2023-01-15T12:00:00", Some(1), "hi"),
        ];
        let index = MessageIndex::new(&messages);
        let (parts, source) = reconstruct_context(&messages[1], &index, &no_domains(), &config());
        assert_eq!(parts, vec!["hello"]);
        assert_eq!(source, ContextSource::Reply);
    }

    #[test]
    fn own_ancestors_are_skipped_but_walked_through() {
        let messages = vec![
            msg(1, "alice", "2023-01-15T11:58:00", None, "question"),
            msg(2, "bob", "2023-01-15T11:59:00", Some(1), "aside"),
            msg(3, "carol", "2023-01-15T12:00:00", Some(2), "noted"),
            msg(4, "bob", "2023-01-15T12:01:00", Some(3), "answer"),
        ];
        let index = MessageIndex::new(&messages);
        let (parts, _) = reconstruct_context(&messages[3], &index, &no_domains(), &config());
        assert_eq!(parts, vec!["question", "noted"]);
    }

    #[test]
    fn window_fallback_collects_other_authors_only() {
        let messages = vec![
            msg(1, "alice", "2023-01-15T11:58:00", None, "one"),
            msg(2, "bob", "2023-01-15T11:59:00", None, "mine"),
            msg(3, "carol", "2023-01-15T12:00:00", None, "two"),
            msg(4, "bob", "2023-01-15T12:01:00", None, "seed"),
        ];
        let index = MessageIndex::new(&messages);
        let (parts, source) = reconstruct_context(&messages[3], &index, &no_domains(), &config());
        assert_eq!(parts, vec!["one", "two"]);
        assert_eq!(source, ContextSource::Window);
    }

    #[test]
    fn window_respects_window_size() {
        let mut messages: Vec<Message> = (1..=5)
            .map(|i| {
                msg(
                    i,
                    "alice",
                    "2023-01-15T12:00:00",
                    None,
                    &format!("w{i}"),
                )
            })
            .collect();
        messages.push(msg(6, "bob", "2023-01-15T12:01:00", None, "seed"));
        let index = MessageIndex::new(&messages);

        let (parts, _) = reconstruct_context(&messages[5], &index, &no_domains(), &config());
        assert_eq!(parts, vec!["w3", "w4", "w5"]);
    }

    #[test]
    fn idle_gap_reclassifies_window_context_as_standalone() {
        let messages = vec![
            msg(1, "alice", "2023-01-15T09:00:00", None, "long ago"),
            msg(2, "bob", "2023-01-15T12:00:00", None, "spontaneous"),
        ];
        let index = MessageIndex::new(&messages);
        let cfg = PairingConfig {
            idle_cutoff_min: 30,
            ..config()
        };
        let (parts, source) = reconstruct_context(&messages[1], &index, &no_domains(), &cfg);
        assert!(parts.is_empty());
        assert_eq!(source, ContextSource::None);
    }

    #[test]
    fn recent_window_context_survives_idle_check() {
        let messages = vec![
            msg(1, "alice", "2023-01-15T11:55:00", None, "recent"),
            msg(2, "bob", "2023-01-15T12:00:00", None, "reply-ish"),
        ];
        let index = MessageIndex::new(&messages);
        let cfg = PairingConfig {
            idle_cutoff_min: 30,
            ..config()
        };
        let (parts, source) = reconstruct_context(&messages[1], &index, &no_domains(), &cfg);
        assert_eq!(parts, vec!["recent"]);
        assert_eq!(source, ContextSource::Window);
    }

    #[test]
    fn idle_check_is_lenient_on_parse_failure() {
        let messages = vec![
            msg(1, "alice", "garbled", None, "kept"),
            msg(2, "bob", "2023-01-15T12:00:00", None, "seed"),
        ];
        let index = MessageIndex::new(&messages);
        let cfg = PairingConfig {
            idle_cutoff_min: 30,
            ..config()
        };
        let (parts, source) = reconstruct_context(&messages[1], &index, &no_domains(), &cfg);
        assert_eq!(parts, vec!["kept"]);
        assert_eq!(source, ContextSource::Window);
    }

    #[test]
    fn no_predecessors_means_standalone() {
        let messages = vec![msg(1, "bob", "2023-01-15T12:00:00", None, "first ever")];
        let index = MessageIndex::new(&messages);
        let (parts, source) = reconstruct_context(&messages[0], &index, &no_domains(), &config());
        assert!(parts.is_empty());
        assert_eq!(source, ContextSource::None);
    }
}
