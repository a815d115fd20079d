//! Error types for ccledger
//!
//! All errors derive from `thiserror` for convenient propagation with `?`.
//! Recoverable conditions (malformed records, unreadable individual sources,
//! unpriced models, missing limits) are reported as data on the relevant
//! result types, not as errors; only conditions that leave the engine with
//! nothing to work on surface here.

use thiserror::Error;

/// Main error type for ccledger operations
#[derive(Error, Debug)]
pub enum LedgerError {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Every configured log source failed to yield data
    #[error("no usable log sources: all {0} configured sources failed")]
    NoUsableSources(usize),

    /// Invalid timezone string
    #[error("invalid timezone: {0}. Use format like 'America/New_York', 'Asia/Tokyo', or 'UTC'")]
    InvalidTimezone(String),

    /// Engine configuration failed validation
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Convenience type alias for Results in ccledger
pub type Result<T> = std::result::Result<T, LedgerError>;
