//! Pipeline for turning chat exports into (prompt, completion) pairs:
//! orchestration over the message stream, export-file discovery, parallel
//! per-file processing, and JSONL output.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::chain::collapse_self_chain;
use crate::context::{reconstruct_context, ContextSource};
use crate::domains::{collect_domain_counts, merge_domain_counts, DomainTokenMap};
use crate::message::{ChatExport, Message, MessageIndex};
use crate::normalize::normalized_message_text;
use crate::word_count;
use crate::{
    DEFAULT_MAX_TOKENS, DEFAULT_MIN_TOKENS, DEFAULT_THREAD_CAP, DEFAULT_TIME_GAP_HOURS,
    DEFAULT_TOP_DOMAINS, DEFAULT_WINDOW_SIZE,
};

/// Configuration for one pairing run.
#[derive(Debug, Clone)]
pub struct PairingConfig {
    /// Target author; only this author's messages seed completions.
    pub author_id: String,
    /// Size bound for the domain token map.
    pub top_domains: usize,
    /// Max hops in the reply-chain walk.
    pub thread_cap: usize,
    /// Max qualifying predecessors in the rolling-window fallback.
    pub window_size: usize,
    /// Completion word-count acceptance bounds.
    pub min_tokens: usize,
    pub max_tokens: usize,
    /// Staleness threshold for reply-chain ancestors, in hours.
    pub time_gap_hours: i64,
    /// Idle gap (minutes) that reclassifies window context as standalone.
    /// Zero disables the check.
    pub idle_cutoff_min: u32,
    /// Preserve newlines inside messages instead of collapsing them.
    pub keep_newlines: bool,
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            author_id: String::new(),
            top_domains: DEFAULT_TOP_DOMAINS,
            thread_cap: DEFAULT_THREAD_CAP,
            window_size: DEFAULT_WINDOW_SIZE,
            min_tokens: DEFAULT_MIN_TOKENS,
            max_tokens: DEFAULT_MAX_TOKENS,
            time_gap_hours: DEFAULT_TIME_GAP_HOURS,
            idle_cutoff_min: 0,
            keep_newlines: false,
        }
    }
}

impl PairingConfig {
    pub fn new(author_id: impl Into<String>) -> Self {
        Self {
            author_id: author_id.into(),
            ..Self::default()
        }
    }
}

/// An accepted (prompt, completion) training pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationPair {
    pub prompt: String,
    pub completion: String,
    pub standalone: bool,
}

/// Errors surfaced by the file-handling side of the pipeline.
#[derive(Debug, Error)]
pub enum PairingError {
    #[error("failed to read export {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse export {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("no export files found under {0}")]
    NoInputs(PathBuf),
    #[error("failed to write output {path}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Pairs extracted from one export file.
#[derive(Debug)]
pub struct ProcessedExport {
    pub source_path: PathBuf,
    pub pairs: Vec<ConversationPair>,
}

/// Counters reported after writing the output stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct PairStats {
    pub pairs_written: usize,
    pub standalone_pairs: usize,
}

/// Drive the pairing state machine over one export's messages with an
/// already-built domain token map.
///
/// Messages are visited in original order; each unprocessed target-author
/// message seeds a self-chain whose normalized texts join into a completion,
/// the chain root's context becomes the prompt, and the acceptance gates of
/// the engine decide whether a pair is emitted. Inputs are never mutated;
/// the only state grown is the per-run processed set.
pub fn build_pairs(
    messages: &[Message],
    domains: &DomainTokenMap,
    config: &PairingConfig,
) -> Vec<ConversationPair> {
    let index = MessageIndex::new(messages);
    let mut processed: HashSet<i64> = HashSet::new();
    let mut pairs: Vec<ConversationPair> = Vec::new();

    for m in messages {
        if m.author() != Some(config.author_id.as_str()) {
            continue;
        }
        if processed.contains(&m.id) {
            continue;
        }

        let chain = collapse_self_chain(m, &index, &mut processed);

        let completion = chain
            .iter()
            .map(|s| normalized_message_text(s, domains, config.keep_newlines))
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string();

        if completion.is_empty() {
            debug!(id = m.id, "skipped, empty completion after cleansing");
            continue;
        }
        let words = word_count(&completion);
        if words < config.min_tokens || words > config.max_tokens {
            debug!(
                id = m.id,
                words,
                min = config.min_tokens,
                max = config.max_tokens,
                "skipped, completion length out of bounds"
            );
            continue;
        }

        let root = chain[0];
        let (parts, source) = reconstruct_context(root, &index, domains, config);
        let prompt = parts.join("\n").trim().to_string();

        if source != ContextSource::None && (prompt.is_empty() || prompt == completion) {
            debug!(id = m.id, "skipped, prompt empty or identical to completion");
            continue;
        }

        pairs.push(ConversationPair {
            prompt,
            completion,
            standalone: source == ContextSource::None,
        });
    }

    pairs
}

/// Convenience entry point for a single in-memory message collection:
/// builds the domain token map from these messages, then pairs them.
pub fn pair_messages(messages: &[Message], config: &PairingConfig) -> Vec<ConversationPair> {
    let domains = DomainTokenMap::build(collect_domain_counts(messages), config.top_domains);
    build_pairs(messages, &domains, config)
}

/// Discover all `.json` export files under a directory, sorted by path.
pub fn discover_export_files(root: &Path) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().map_or(false, |ext| ext == "json"))
        .map(|e| e.path().to_path_buf())
        .collect();
    paths.sort();
    paths
}

fn read_export(path: &Path) -> Result<ChatExport, PairingError> {
    let raw = std::fs::read_to_string(path).map_err(|source| PairingError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| PairingError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Process an input path that is either one export file or a directory of
/// exports.
///
/// Files are parsed in parallel; the domain token map is built once over all
/// loaded messages; pairing then runs per export in parallel, so reply
/// indices and rolling windows never cross chats. A malformed file is fatal
/// when named explicitly, but only logged and skipped in directory mode.
/// Output order follows sorted file paths, so results are deterministic.
pub fn process_inputs(
    input: &Path,
    config: &PairingConfig,
) -> Result<(Vec<ProcessedExport>, DomainTokenMap), PairingError> {
    let exports: Vec<(PathBuf, ChatExport)> = if input.is_dir() {
        let files = discover_export_files(input);
        if files.is_empty() {
            return Err(PairingError::NoInputs(input.to_path_buf()));
        }
        files
            .into_par_iter()
            .filter_map(|path| match read_export(&path) {
                Ok(export) => Some((path, export)),
                Err(e) => {
                    warn!("skipping export: {e}");
                    None
                }
            })
            .collect()
    } else {
        vec![(input.to_path_buf(), read_export(input)?)]
    };

    // One token map for the whole run, ties in first-seen order across
    // exports in sorted-path order.
    let mut counts: IndexMap<String, usize> = IndexMap::new();
    for (_, export) in &exports {
        merge_domain_counts(&mut counts, collect_domain_counts(&export.messages));
    }
    let domains = DomainTokenMap::build(counts, config.top_domains);

    let results: Vec<ProcessedExport> = exports
        .into_par_iter()
        .map(|(source_path, export)| ProcessedExport {
            pairs: build_pairs(&export.messages, &domains, config),
            source_path,
        })
        .collect();

    Ok((results, domains))
}

/// Write every pair as one JSON object per line.
pub fn write_jsonl_output(
    results: &[ProcessedExport],
    output: &Path,
) -> Result<PairStats, PairingError> {
    let io_err = |source| PairingError::Output {
        path: output.to_path_buf(),
        source,
    };

    let file = File::create(output).map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    let mut stats = PairStats::default();

    for result in results {
        for pair in &result.pairs {
            let line = serde_json::to_string(pair).map_err(|source| PairingError::Parse {
                path: output.to_path_buf(),
                source,
            })?;
            writeln!(writer, "{line}").map_err(io_err)?;
            stats.pairs_written += 1;
            if pair.standalone {
                stats.standalone_pairs += 1;
            }
        }
    }

    writer.flush().map_err(io_err)?;
    Ok(stats)
}
