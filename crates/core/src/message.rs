//! Message records from a Telegram chat export, plus the id lookups shared
//! by all reconstruction logic.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::Value;

/// A Telegram chat export document. Exports without a `messages` field are
/// treated as empty collections, not as errors.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatExport {
    #[serde(default)]
    pub messages: Vec<Message>,
}

/// A single message from the export. Only the fields the engine reads are
/// deserialized; everything else in the export record is ignored.
///
/// `reply_to_message_id` may dangle (reference an id not present in the
/// collection) or point forward in sequence order; both are tolerated.
#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub id: i64,
    #[serde(default)]
    pub from_id: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub reply_to_message_id: Option<i64>,
    /// Either a plain string or an array of fragments (strings or tagged
    /// objects carrying a `text` field). Kept as raw JSON so malformed
    /// shapes flatten to an empty string instead of failing deserialization.
    #[serde(default)]
    pub text: Value,
}

impl Message {
    /// The message author, when present.
    pub fn author(&self) -> Option<&str> {
        self.from_id.as_deref()
    }
}

/// Flatten the heterogeneous `text` field to a plain string.
///
/// Strings pass through; fragment arrays concatenate each fragment's `text`
/// field (or its JSON string form when untagged) in order; any other shape
/// flattens to empty so the candidate can be rejected by the empty-completion
/// gate rather than aborting the run.
pub fn flatten_content(content: &Value) -> String {
    match content {
        Value::String(s) => s.clone(),
        Value::Array(parts) => {
            let mut out = String::new();
            for part in parts {
                match part {
                    Value::String(s) => out.push_str(s),
                    Value::Object(fields) => match fields.get("text") {
                        Some(Value::String(s)) => out.push_str(s),
                        _ => out.push_str(&part.to_string()),
                    },
                    other => out.push_str(&other.to_string()),
                }
            }
            out
        }
        _ => String::new(),
    }
}

/// Parse an ISO-8601 timestamp, tolerating a trailing UTC `Z` marker.
/// Returns `None` on malformed input; callers decide fail-open vs fail-closed.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    raw.trim_end_matches('Z').parse::<NaiveDateTime>().ok()
}

/// Read-only lookups over the flat message list: id → message and
/// id → sequential position. Built once per export and shared by the
/// collapser, the context reconstructor and the orchestrator.
pub struct MessageIndex<'a> {
    messages: &'a [Message],
    by_id: HashMap<i64, &'a Message>,
    position: HashMap<i64, usize>,
}

impl<'a> MessageIndex<'a> {
    pub fn new(messages: &'a [Message]) -> Self {
        let mut by_id = HashMap::with_capacity(messages.len());
        let mut position = HashMap::with_capacity(messages.len());
        for (idx, m) in messages.iter().enumerate() {
            by_id.insert(m.id, m);
            position.insert(m.id, idx);
        }
        Self {
            messages,
            by_id,
            position,
        }
    }

    pub fn get(&self, id: i64) -> Option<&'a Message> {
        self.by_id.get(&id).copied()
    }

    pub fn position(&self, id: i64) -> Option<usize> {
        self.position.get(&id).copied()
    }

    pub fn messages(&self) -> &'a [Message] {
        self.messages
    }
}
