//! CLI tool for extracting prompt/completion training pairs from Telegram
//! chat exports.
//!
//! Reads a chat export JSON file (or a directory of them), reconstructs
//! conversations around one designated author, and writes accepted pairs as
//! JSONL records.

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use telegram_pairs_core::{
    process_inputs, write_jsonl_output, PairingConfig, DEFAULT_MAX_TOKENS, DEFAULT_MIN_TOKENS,
    DEFAULT_THREAD_CAP, DEFAULT_TIME_GAP_HOURS, DEFAULT_TOP_DOMAINS, DEFAULT_WINDOW_SIZE,
};

/// Extract (prompt, completion) pairs for one author from chat exports.
#[derive(Parser, Debug)]
#[command(name = "telegram-pairs")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Chat export in .json format, or a directory of exports
    #[arg(long)]
    input: PathBuf,

    /// Output file in .jsonl format
    #[arg(long)]
    output: PathBuf,

    /// Keep only messages whose `from_id` equals this value
    #[arg(long)]
    author_id: String,

    /// How many frequent domains get their own <URL:domain> token
    #[arg(long, default_value_t = DEFAULT_TOP_DOMAINS)]
    top_domains: usize,

    /// Max hops walked up in a reply-to chain
    #[arg(long, default_value_t = DEFAULT_THREAD_CAP)]
    thread_cap: usize,

    /// Fallback rolling window size if no explicit reply context
    #[arg(long, default_value_t = DEFAULT_WINDOW_SIZE)]
    window_size: usize,

    /// Drop completions shorter than this many words
    #[arg(long, default_value_t = DEFAULT_MIN_TOKENS)]
    min_tokens: usize,

    /// Drop completions longer than this many words
    #[arg(long, default_value_t = DEFAULT_MAX_TOKENS)]
    max_tokens: usize,

    /// Ignore reply ancestors older than this gap (in hours)
    #[arg(long, default_value_t = DEFAULT_TIME_GAP_HOURS)]
    time_gap_hours: i64,

    /// If >0, treat a non-reply message as standalone when the previous
    /// message is older than this many minutes
    #[arg(long, default_value_t = 0)]
    idle_cutoff_min: u32,

    /// Preserve original newlines inside messages
    #[arg(long)]
    keep_newlines: bool,

    /// Print verbose debugging information
    #[arg(long)]
    debug: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let default_level = if args.debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = PairingConfig {
        author_id: args.author_id,
        top_domains: args.top_domains,
        thread_cap: args.thread_cap,
        window_size: args.window_size,
        min_tokens: args.min_tokens,
        max_tokens: args.max_tokens,
        time_gap_hours: args.time_gap_hours,
        idle_cutoff_min: args.idle_cutoff_min,
        keep_newlines: args.keep_newlines,
    };

    let (results, domains) = process_inputs(&args.input, &config)?;
    let stats = write_jsonl_output(&results, &args.output)?;

    println!(
        "Wrote {} pairs ({} standalone) -> {}",
        stats.pairs_written,
        stats.standalone_pairs,
        args.output.display()
    );
    if results.len() > 1 {
        println!("Exports processed: {}", results.len());
    }
    println!("Top domain tokens (first 10):");
    for (host, token) in domains.iter().take(10) {
        println!("  {host} -> {token}");
    }
    if domains.len() < args.top_domains {
        println!("(Only {} unique domains found.)", domains.len());
    }

    Ok(())
}
