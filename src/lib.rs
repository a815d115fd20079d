//! ccledger - usage aggregation and billing-block engine
//!
//! Turns raw JSONL usage logs from AI coding assistants into priced,
//! deduplicated, time-ordered usage data, then derives billing blocks,
//! daily/monthly/session rollups, burn rates, quota forecasts, and
//! at-a-glance percentages from it.
//!
//! The pipeline is a loader followed by pure stages:
//!
//! 1. [`data_loader::EventLoader`] reads every source concurrently,
//!    normalizes records, and deduplicates across overlapping sources
//! 2. [`cost_resolver`] attaches a USD cost to each event under a
//!    [`types::CostMode`] policy, with pricing injected by the caller
//! 3. [`blocks`] partitions the stream into fixed-duration billing blocks
//!    and derives which one is currently active
//! 4. [`aggregation`] folds events into daily, monthly, and session rollups
//!    in a caller-supplied timezone
//! 5. [`burn_rate`] and [`percentage`] derive rates, exhaustion forecasts,
//!    and composite percentages against configured limits
//!
//! [`engine::UsageEngine`] wires the stages together behind one call.
//!
//! # Example
//!
//! ```no_run
//! use ccledger::config::{EngineConfig, QuotaLimits};
//! use ccledger::data_loader::EventLoader;
//! use ccledger::engine::UsageEngine;
//! use ccledger::pricing::StaticPricing;
//! use chrono::Utc;
//!
//! # async fn example() -> ccledger::Result<()> {
//! let config = EngineConfig::default().with_limits(QuotaLimits {
//!     token_limit: Some(200_000),
//!     ..Default::default()
//! });
//! let engine = UsageEngine::new(config, StaticPricing::new());
//! let loader = EventLoader::new(["/home/user/.claude/projects".into()]);
//!
//! let (report, outcome) = engine.load_and_report(&loader, Utc::now()).await?;
//! println!(
//!     "{} events across {} blocks, {:.1}% of quota",
//!     report.totals.message_count,
//!     report.blocks.len(),
//!     report.critical_percentage.value
//! );
//! if outcome.malformed_records > 0 {
//!     eprintln!("skipped {} malformed records", outcome.malformed_records);
//! }
//! # Ok(())
//! # }
//! ```

pub mod aggregation;
pub mod blocks;
pub mod burn_rate;
pub mod config;
pub mod cost_resolver;
pub mod data_loader;
pub mod engine;
pub mod error;
pub mod percentage;
pub mod pricing;
pub mod timezone;
pub mod types;

pub use error::{LedgerError, Result};
