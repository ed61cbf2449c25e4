//! Self-reply chain collapsing: a burst of consecutive same-author messages
//! linked by direct reply is merged into one logical utterance, the unit a
//! completion is built from.

use std::collections::HashSet;

use crate::message::{Message, MessageIndex};

/// Walk backward from `seed` through same-author reply links, marking every
/// visited id processed, and return the run oldest-first.
///
/// The walk stops at a dangling reply link, at a message by a different
/// author (that message belongs to the *context*, not the chain), or at an
/// id that is already processed. The last rule both terminates on cyclic
/// reply links in malformed exports and keeps a message consumed by an
/// earlier chain from being merged into a later one.
pub fn collapse_self_chain<'a>(
    seed: &'a Message,
    index: &MessageIndex<'a>,
    processed: &mut HashSet<i64>,
) -> Vec<&'a Message> {
    let author = seed.author();
    let mut chain: Vec<&Message> = Vec::new();
    let mut cur = Some(seed);

    while let Some(m) = cur {
        chain.push(m);
        processed.insert(m.id);
        cur = m
            .reply_to_message_id
            .and_then(|pid| index.get(pid))
            .filter(|parent| parent.author() == author && !processed.contains(&parent.id));
    }

    chain.reverse();
    chain
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn msg(id: i64, from: &str, reply_to: Option<i64>) -> Message {
        serde_json::from_value(json!({
            "id": id,
            "from_id": from,
            "reply_to_message_id": reply_to,
            "text": format!("m{id}"),
        }))
        .unwrap()
    }

    #[test]
    fn seed_without_reply_is_singleton() {
        let messages = vec![msg(1, "alice", None)];
        let index = MessageIndex::new(&messages);
        let mut processed = HashSet::new();

        let chain = collapse_self_chain(&messages[0], &index, &mut processed);
        assert_eq!(chain.len(), 1);
        assert!(processed.contains(&1));
    }

    #[test]
    fn burst_collapses_oldest_first() {
        let messages = vec![
            msg(1, "alice", None),
            msg(2, "alice", Some(1)),
            msg(3, "alice", Some(2)),
        ];
        let index = MessageIndex::new(&messages);
        let mut processed = HashSet::new();

        // seed at the newest end of the burst
        let chain = collapse_self_chain(&messages[2], &index, &mut processed);
        let ids: Vec<i64> = chain.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(processed.len(), 3);
    }

    #[test]
    fn stops_at_other_author() {
        let messages = vec![
            msg(1, "bob", None),
            msg(2, "alice", Some(1)),
            msg(3, "alice", Some(2)),
        ];
        let index = MessageIndex::new(&messages);
        let mut processed = HashSet::new();

        let chain = collapse_self_chain(&messages[2], &index, &mut processed);
        let ids: Vec<i64> = chain.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![2, 3]);
        assert!(!processed.contains(&1));
    }

    #[test]
    fn stops_on_dangling_link() {
        let messages = vec![msg(5, "alice", Some(999))];
        let index = MessageIndex::new(&messages);
        let mut processed = HashSet::new();

        let chain = collapse_self_chain(&messages[0], &index, &mut processed);
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn cyclic_links_terminate() {
        let messages = vec![msg(1, "alice", Some(2)), msg(2, "alice", Some(1))];
        let index = MessageIndex::new(&messages);
        let mut processed = HashSet::new();

        let chain = collapse_self_chain(&messages[0], &index, &mut processed);
        let ids: Vec<i64> = chain.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn does_not_reenter_previously_processed_ids() {
        let messages = vec![msg(1, "alice", None), msg(2, "alice", Some(1))];
        let index = MessageIndex::new(&messages);
        let mut processed = HashSet::new();
        processed.insert(1);

        let chain = collapse_self_chain(&messages[1], &index, &mut processed);
        let ids: Vec<i64> = chain.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![2]);
    }
}
