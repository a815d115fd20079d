//! Shared helpers for integration tests

#![allow(dead_code)]

use ccledger::types::{
    ISOTimestamp, ModelName, ResolvedUsage, SessionId, TokenCounts, UsageEvent,
};
use chrono::{DateTime, Utc};
use std::io::Write;
use std::path::{Path, PathBuf};

/// One JSONL line in the assistant log format
pub fn entry_line(
    session: &str,
    timestamp: &str,
    request: &str,
    input: u64,
    output: u64,
    cost: Option<f64>,
) -> String {
    let cost_field = match cost {
        Some(c) => format!(r#","costUSD":{c}"#),
        None => String::new(),
    };
    format!(
        r#"{{"sessionId":"{session}","timestamp":"{timestamp}","requestId":"{request}","message":{{"model":"claude-3-opus","usage":{{"input_tokens":{input},"output_tokens":{output}}}}}{cost_field}}}"#
    )
}

/// Write a JSONL file under `dir` and return its path
pub fn write_jsonl(dir: &Path, name: &str, lines: &[String]) -> PathBuf {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    for line in lines {
        writeln!(file, "{line}").unwrap();
    }
    path
}

/// A resolved event for exercising the pure stages directly
pub fn resolved_event(
    at: DateTime<Utc>,
    session: &str,
    tokens: TokenCounts,
    cost: f64,
) -> ResolvedUsage {
    ResolvedUsage {
        event: UsageEvent {
            session_id: SessionId::new(session),
            timestamp: ISOTimestamp::new(at),
            model: ModelName::new("claude-3-opus"),
            project: None,
            request_id: None,
            tokens,
            precomputed_cost: Some(cost),
            is_error: false,
        },
        cost_usd: cost,
        unpriced: false,
    }
}
