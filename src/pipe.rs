//! Stdin log source for `courier pipe`.
//!
//! Reads another process's output line by line. Lines in the JSON shape
//! written by `tracing-subscriber` (`level`, `target`, `fields.message`) keep
//! their level and target; plain lines take their level from a leading token
//! such as `[WARN]`, `ERROR:` or `SEVERE` and default to `INFO`.

use std::sync::{Arc, LazyLock};

use anyhow::Context;
use regex::Regex;
use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::relay::{LogRelay, LogRecord, RecordOutcome};

/// Logger name given to plain (non-JSON) lines.
pub const STDIN_LOGGER: &str = "stdin";

/// Lines longer than this are skipped (1 MB).
const MAX_LINE_LEN: usize = 1_048_576;

static LEVEL_PREFIX: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?:\d{4}-\d{2}-\d{2}[T ][\d:.,]+Z?\s+)?\[?(TRACE|DEBUG|INFO|WARN(?:ING)?|ERROR|SEVERE|FATAL)\b\]?:?\s*",
    )
    .ok()
});

/// Subset of a `tracing-subscriber` JSON line.
#[derive(Debug, Deserialize)]
struct JsonLine {
    level: String,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    fields: JsonFields,
}

#[derive(Debug, Default, Deserialize)]
struct JsonFields {
    #[serde(default)]
    message: Option<String>,
}

/// Counters reported when the input ends.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PipeStats {
    /// Non-empty lines read.
    pub lines: u64,
    /// Lines that were queued for dispatch.
    pub queued: u64,
}

/// Parse one output line into a record. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Option<LogRecord> {
    let trimmed = line.trim_end_matches(['\r', '\n']);
    if trimmed.trim().is_empty() {
        return None;
    }

    if trimmed.trim_start().starts_with('{') {
        if let Ok(json) = serde_json::from_str::<JsonLine>(trimmed.trim()) {
            return Some(LogRecord {
                level: json.level.to_ascii_uppercase(),
                logger_name: json.target,
                message: json.fields.message,
            });
        }
    }

    let captures = LEVEL_PREFIX.as_ref().and_then(|re| re.captures(trimmed));
    let (level, message) = match captures {
        Some(caps) => {
            let level = caps
                .get(1)
                .map_or("INFO", |m| m.as_str())
                .to_ascii_uppercase();
            let rest = caps.get(0).map_or(trimmed, |m| &trimmed[m.end()..]);
            (normalize_level(&level), rest)
        }
        None => ("INFO".to_owned(), trimmed),
    };

    Some(LogRecord::new(level, STDIN_LOGGER, message))
}

fn normalize_level(level: &str) -> String {
    match level {
        "WARNING" => "WARN".to_owned(),
        other => other.to_owned(),
    }
}

/// Feed every line of `reader` to `relay` until EOF.
///
/// # Errors
///
/// Returns an error if reading from the input fails.
pub async fn forward_lines<R>(reader: R, relay: &Arc<LogRelay>) -> anyhow::Result<PipeStats>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut stats = PipeStats::default();

    while let Some(line) = lines.next_line().await.context("failed to read input line")? {
        if line.len() > MAX_LINE_LEN {
            continue;
        }
        let Some(record) = parse_line(&line) else {
            continue;
        };
        stats.lines = stats.lines.saturating_add(1);
        if relay.on_record(&record) == RecordOutcome::Queued {
            stats.queued = stats.queued.saturating_add(1);
        }
    }

    Ok(stats)
}
