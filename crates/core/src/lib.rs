//! Conversation-reconstruction and pairing engine for Telegram chat exports.
//!
//! This crate turns a raw chat export (a flat, time-ordered `messages` array
//! where messages reference each other via reply links) into supervised
//! (prompt, completion) training pairs attributable to one designated author:
//! consecutive same-author self-replies are merged into single completions,
//! upstream context is reconstructed from reply links or a temporal rolling
//! window, and staleness/idle-gap/length policies decide which candidate
//! pairs are emitted.

mod chain;
mod context;
mod domains;
mod message;
mod normalize;
pub mod pipeline;

pub use chain::collapse_self_chain;
pub use context::{reconstruct_context, ContextSource};
pub use domains::{collect_domain_counts, merge_domain_counts, DomainTokenMap};
pub use message::{flatten_content, parse_timestamp, ChatExport, Message, MessageIndex};
pub use normalize::{normalize_text, normalized_message_text, OTHER_DOMAIN_TOKEN};
pub use pipeline::{
    build_pairs, discover_export_files, pair_messages, process_inputs, write_jsonl_output,
    ConversationPair, PairStats, PairingConfig, PairingError, ProcessedExport,
};

/// Default size bound for the domain token map.
pub const DEFAULT_TOP_DOMAINS: usize = 50;

/// Default maximum hops in the reply-chain walk.
pub const DEFAULT_THREAD_CAP: usize = 6;

/// Default rolling-window size when no reply context exists.
pub const DEFAULT_WINDOW_SIZE: usize = 3;

/// Default minimum completion length in words.
pub const DEFAULT_MIN_TOKENS: usize = 4;

/// Default maximum completion length in words.
pub const DEFAULT_MAX_TOKENS: usize = 256;

/// Default staleness threshold for reply-chain ancestors, in hours.
pub const DEFAULT_TIME_GAP_HOURS: i64 = 6;

/// Approximate token count: whitespace-separated words.
///
/// No model vocabulary is involved; completion length bounds are enforced
/// against this count.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_count_splits_on_any_whitespace() {
        assert_eq!(word_count("one two\tthree\nfour"), 4);
        assert_eq!(word_count("  padded  "), 1);
        assert_eq!(word_count(""), 0);
    }
}
