//! Event loader: multi-source JSONL ingestion
//!
//! Reads raw records from caller-supplied source locations, normalizes each
//! into a [`UsageEvent`], deduplicates across sources, and returns a
//! time-ascending snapshot. Sources are read concurrently, one task per
//! source; a slow or unreadable source never blocks the others, and the
//! merge happens only after every source has finished or failed.
//!
//! Malformed records are dropped, counted, and logged, never fatal. The
//! load as a whole fails only when zero sources were readable.
//!
//! # Examples
//!
//! ```no_run
//! use ccledger::config::EngineConfig;
//! use ccledger::data_loader::EventLoader;
//!
//! # async fn example() -> ccledger::Result<()> {
//! let loader = EventLoader::new(["/home/user/.claude/projects".into()]);
//! let outcome = loader.load(&EngineConfig::default()).await?;
//! println!(
//!     "{} events, {} malformed records skipped",
//!     outcome.events.len(),
//!     outcome.malformed_records
//! );
//! # Ok(())
//! # }
//! ```

use crate::config::EngineConfig;
use crate::error::{LedgerError, Result};
use crate::types::{ModelName, UsageEvent};
use futures::stream::{Stream, StreamExt};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

/// A source that could not be read, with the reason it was skipped
#[derive(Debug, Clone)]
pub struct SkippedSource {
    /// The source path
    pub path: PathBuf,
    /// Why it was skipped
    pub reason: String,
}

/// Result of a load pass: partial data plus what was dropped along the way
#[derive(Debug, Default)]
pub struct LoadOutcome {
    /// Deduplicated events in ascending timestamp order; ties keep
    /// source-iteration order
    pub events: Vec<UsageEvent>,
    /// Records dropped for invalid JSON or a missing/invalid timestamp
    pub malformed_records: u64,
    /// Events collapsed away by cross-source deduplication
    pub duplicate_records: u64,
    /// Sources that could not be read
    pub skipped_sources: Vec<SkippedSource>,
}

enum ParsedLine {
    Event(Box<UsageEvent>),
    Malformed,
}

struct SourceData {
    events: Vec<UsageEvent>,
    malformed: u64,
}

/// Loader over a fixed set of source locations
///
/// Each source may be a single `.jsonl` file or a directory searched
/// recursively. The engine never decides where logs live; callers supply
/// the paths.
pub struct EventLoader {
    sources: Vec<PathBuf>,
}

impl EventLoader {
    /// Create a loader for the given source locations
    pub fn new(sources: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            sources: sources.into_iter().collect(),
        }
    }

    /// The configured source locations
    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    /// Load, normalize, deduplicate, and time-order events from all sources
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NoUsableSources`] when every configured
    /// source failed to read (including the zero-source case). Individual
    /// source failures are reported in `LoadOutcome::skipped_sources`.
    pub async fn load(&self, config: &EngineConfig) -> Result<LoadOutcome> {
        let handles: Vec<_> = self
            .sources
            .iter()
            .map(|source| {
                let source = source.clone();
                let default_model = config.default_model.clone();
                tokio::spawn(async move { load_source(source, default_model).await })
            })
            .collect();

        let mut outcome = LoadOutcome::default();
        let mut seen = HashSet::new();
        let mut readable = 0usize;

        for (handle, source) in handles.into_iter().zip(&self.sources) {
            let loaded = match handle.await {
                Ok(result) => result,
                Err(join_err) => Err(std::io::Error::other(join_err).into()),
            };
            match loaded {
                Ok(data) => {
                    readable += 1;
                    outcome.malformed_records += data.malformed;
                    for event in data.events {
                        if seen.insert(event.dedup_key()) {
                            outcome.events.push(event);
                        } else {
                            outcome.duplicate_records += 1;
                        }
                    }
                }
                Err(e) => {
                    warn!("Skipping unreadable source {}: {}", source.display(), e);
                    outcome.skipped_sources.push(SkippedSource {
                        path: source.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        if readable == 0 {
            return Err(LedgerError::NoUsableSources(self.sources.len()));
        }

        // Stable sort: timestamp ties keep source-iteration order
        outcome.events.sort_by_key(|e| e.timestamp);

        debug!(
            "Loaded {} events ({} malformed, {} duplicates, {} sources skipped)",
            outcome.events.len(),
            outcome.malformed_records,
            outcome.duplicate_records,
            outcome.skipped_sources.len()
        );
        Ok(outcome)
    }
}

/// Read one source to completion, in deterministic file order
async fn load_source(source: PathBuf, default_model: ModelName) -> Result<SourceData> {
    let files = {
        let source = source.clone();
        tokio::task::spawn_blocking(move || discover_jsonl_files(&source))
            .await
            .map_err(std::io::Error::other)??
    };

    let mut data = SourceData {
        events: Vec::new(),
        malformed: 0,
    };

    for file_path in files {
        let fallback_project = file_path
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .map(str::to_string);

        let lines = parse_jsonl_stream(file_path, default_model.clone(), fallback_project);
        tokio::pin!(lines);
        while let Some(parsed) = lines.next().await {
            match parsed {
                ParsedLine::Event(event) => data.events.push(*event),
                ParsedLine::Malformed => data.malformed += 1,
            }
        }
    }

    Ok(data)
}

/// Find `.jsonl` files under a source, sorted by path for determinism
fn discover_jsonl_files(source: &Path) -> Result<Vec<PathBuf>> {
    let metadata = std::fs::metadata(source)?;
    if metadata.is_file() {
        return Ok(vec![source.to_path_buf()]);
    }

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(source)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_type().is_file()
                && entry.path().extension().and_then(|s| s.to_str()) == Some("jsonl")
        })
        .map(|entry| entry.into_path())
        .collect();
    files.sort();

    debug!("Found {} JSONL files under {}", files.len(), source.display());
    Ok(files)
}

/// Parse a single JSONL file as a stream of normalized events
fn parse_jsonl_stream(
    path: PathBuf,
    default_model: ModelName,
    fallback_project: Option<String>,
) -> impl Stream<Item = ParsedLine> {
    async_stream::stream! {
        let file = match tokio::fs::File::open(&path).await {
            Ok(f) => f,
            Err(e) => {
                // An individual unreadable file degrades to zero events;
                // source-level failure is decided by discovery, not here
                warn!("Failed to open {}: {}", path.display(), e);
                return;
            }
        };

        let reader = BufReader::new(file);
        let mut lines = reader.lines();
        let mut line_number = 0u64;

        while let Ok(Some(line)) = lines.next_line().await {
            line_number += 1;

            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str(&line) {
                Ok(raw) => {
                    match UsageEvent::from_raw(raw, &default_model, fallback_project.as_deref()) {
                        Some(event) => yield ParsedLine::Event(Box::new(event)),
                        None => {
                            warn!(
                                "Dropping record without valid timestamp at {}:{}",
                                path.display(),
                                line_number
                            );
                            yield ParsedLine::Malformed;
                        }
                    }
                }
                Err(e) => {
                    warn!(
                        "Failed to parse line {} in {}: {}",
                        line_number,
                        path.display(),
                        e
                    );
                    yield ParsedLine::Malformed;
                }
            }
        }
    }
}
