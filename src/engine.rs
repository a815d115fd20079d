//! Top-level engine facade
//!
//! Wires the pipeline stages together: resolve costs, segment blocks, roll
//! up daily/monthly/session summaries, derive burn rates and forecasts for
//! the active block, and compute the critical percentage. Every stage
//! downstream of the loader is a pure function of `(events, config, now)`,
//! so a report is fully reproducible from its inputs.

use crate::aggregation::{
    aggregate_daily, aggregate_monthly, aggregate_sessions, DailyUsage, MonthlyUsage,
    SessionUsage, Totals,
};
use crate::blocks::{active_block, segment, UsageBlock};
use crate::burn_rate::{block_burn_rate, quota_forecasts, BurnRate, QuotaForecasts};
use crate::config::EngineConfig;
use crate::cost_resolver::resolve_all;
use crate::data_loader::{EventLoader, LoadOutcome};
use crate::error::Result;
use crate::percentage::{critical_percentage, Percentage};
use crate::pricing::PricingSource;
use crate::types::{ResolvedUsage, UsageEvent};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A complete snapshot-in-time view of usage
#[derive(Debug, Clone, Serialize)]
pub struct UsageReport {
    /// Every resolved event, in ascending timestamp order
    pub events: Vec<ResolvedUsage>,
    /// Billing blocks segmented from the event stream
    pub blocks: Vec<UsageBlock>,
    /// Daily rollups in the configured timezone
    pub daily: Vec<DailyUsage>,
    /// Monthly rollups derived from the daily ones
    pub monthly: Vec<MonthlyUsage>,
    /// Per-session rollups, ordered by session start
    pub sessions: Vec<SessionUsage>,
    /// Grand totals across all events
    pub totals: Totals,
    /// Burn rates for the active block, when one exists
    pub active_burn_rate: Option<BurnRate>,
    /// Quota forecasts for the active block, when one exists
    pub active_forecasts: Option<QuotaForecasts>,
    /// Composite at-a-glance percentage
    pub critical_percentage: Percentage,
    /// Events that resolved without pricing
    pub unpriced_count: usize,
}

impl UsageReport {
    /// The currently active block, if any
    pub fn active_block(&self) -> Option<&UsageBlock> {
        active_block(&self.blocks)
    }
}

/// The assembled pipeline: configuration plus an injected pricing source
///
/// # Examples
///
/// ```
/// use ccledger::config::EngineConfig;
/// use ccledger::engine::UsageEngine;
/// use ccledger::pricing::StaticPricing;
/// use chrono::Utc;
///
/// let engine = UsageEngine::new(EngineConfig::default(), StaticPricing::new());
/// let report = engine.report(Vec::new(), Utc::now());
/// assert!(report.blocks.is_empty());
/// ```
pub struct UsageEngine<P: PricingSource> {
    config: EngineConfig,
    pricing: P,
}

impl<P: PricingSource> UsageEngine<P> {
    /// Create an engine from a configuration and a pricing source
    pub fn new(config: EngineConfig, pricing: P) -> Self {
        Self { config, pricing }
    }

    /// The engine's configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Build a full report from loaded events at the given instant
    ///
    /// Events must be in ascending timestamp order, as produced by
    /// [`EventLoader::load`]. `now` is an explicit parameter so reports are
    /// reproducible and testable at any instant.
    pub fn report(&self, events: Vec<UsageEvent>, now: DateTime<Utc>) -> UsageReport {
        let resolved = resolve_all(events, self.config.cost_mode, &self.pricing, &self.config);

        let blocks = segment(&resolved, &self.config, now);
        let daily = aggregate_daily(&resolved, &self.config.timezone);
        let monthly = aggregate_monthly(&daily);
        let sessions = aggregate_sessions(&resolved);
        let totals = Totals::from_events(&resolved);
        let unpriced_count = resolved.iter().filter(|e| e.unpriced).count();

        let active = active_block(&blocks);
        let active_burn_rate = active.and_then(|b| block_burn_rate(b, now, &self.config));
        let active_forecasts = active.zip(active_burn_rate.as_ref()).map(|(block, rate)| {
            quota_forecasts(
                rate,
                block.tokens.total(),
                block.cost_usd,
                block.message_count(),
                &self.config,
            )
        });

        // The monthly fallback must reflect the month containing `now`, not
        // the latest month with data; an idle month reads as zero usage
        let current_month = now
            .with_timezone(&self.config.timezone)
            .format("%Y-%m")
            .to_string();
        let monthly_now = monthly.iter().find(|m| m.month == current_month);
        let critical = critical_percentage(active, monthly_now, &self.config.limits);

        UsageReport {
            events: resolved,
            blocks,
            daily,
            monthly,
            sessions,
            totals,
            active_burn_rate,
            active_forecasts,
            critical_percentage: critical,
            unpriced_count,
        }
    }

    /// Load events from the given loader and build a report
    ///
    /// Partial-load information (malformed records, skipped sources) is
    /// returned alongside the report.
    ///
    /// # Errors
    ///
    /// Fails when the configuration is invalid or every source was
    /// unreadable.
    pub async fn load_and_report(
        &self,
        loader: &EventLoader,
        now: DateTime<Utc>,
    ) -> Result<(UsageReport, LoadOutcome)> {
        self.config.validate()?;
        let mut outcome = loader.load(&self.config).await?;
        let events = std::mem::take(&mut outcome.events);
        Ok((self.report(events, now), outcome))
    }
}
