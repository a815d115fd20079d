//! Engine configuration
//!
//! Everything the engine accepts but does not own: cost mode, block
//! duration, quota limits, grouping timezone, and the forecast heuristics.
//! One explicit structure with named, validated fields, passed by value into
//! each pure stage, never an ad-hoc parameter trickle.

use crate::error::{LedgerError, Result};
use crate::types::{CostMode, ModelName};
use chrono::Duration;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Caller-supplied quota limits
///
/// All limits are optional; a zero or negative value supplied by a caller is
/// normalized to "no limit" rather than fed into percentage math.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct QuotaLimits {
    /// Token limit for an active block or context window
    pub token_limit: Option<u64>,
    /// Per-block cost baseline in USD
    pub cost_limit: Option<f64>,
    /// Monthly plan cost limit in USD
    pub monthly_cost_limit: Option<f64>,
    /// Message quota for an active block
    pub message_limit: Option<u64>,
}

impl QuotaLimits {
    /// Normalize limits: zero or negative values become "no limit"
    pub fn normalized(self) -> Self {
        Self {
            token_limit: self.token_limit.filter(|&l| l > 0),
            cost_limit: self.cost_limit.filter(|&l| l.is_finite() && l > 0.0),
            monthly_cost_limit: self
                .monthly_cost_limit
                .filter(|&l| l.is_finite() && l > 0.0),
            message_limit: self.message_limit.filter(|&l| l > 0),
        }
    }
}

/// Thresholds classifying a forecast duration into severities
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SeverityThresholds {
    /// Forecasts below this many hours are imminent
    pub imminent_hours: f64,
    /// Forecasts below this many hours (but not imminent) are soon
    pub soon_hours: f64,
}

impl Default for SeverityThresholds {
    fn default() -> Self {
        Self {
            imminent_hours: 1.0,
            soon_hours: 6.0,
        }
    }
}

/// Per-hour magnitude cutoffs selecting a display unit bucket for rates
///
/// These are configuration, not formatting: the engine tags each rate with a
/// suggested unit and callers decide how to render it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateUnitThresholds {
    /// Rates at or below this per-hour value display best per day
    pub per_day_at_or_below: f64,
    /// Rates at or above this per-hour value display best per minute
    pub per_minute_at_or_above: f64,
}

impl Default for RateUnitThresholds {
    fn default() -> Self {
        Self {
            per_day_at_or_below: 10.0,
            per_minute_at_or_above: 6000.0,
        }
    }
}

/// Complete engine configuration with documented defaults
///
/// # Examples
/// ```
/// use ccledger::config::{EngineConfig, QuotaLimits};
/// use ccledger::types::CostMode;
///
/// let config = EngineConfig::default()
///     .with_cost_mode(CostMode::Calculate)
///     .with_limits(QuotaLimits {
///         token_limit: Some(200_000),
///         ..Default::default()
///     });
/// config.validate().unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Cost resolution policy
    pub cost_mode: CostMode,
    /// Fixed billing-block duration (default 5 hours)
    pub block_duration: Duration,
    /// Caller-supplied quota limits
    pub limits: QuotaLimits,
    /// Timezone used for daily/monthly grouping keys
    pub timezone: Tz,
    /// Model to price events whose log record carries no model name
    pub default_model: ModelName,
    /// Context-window growth approximated as this fraction of the
    /// cumulative token rate. A rough heuristic carried over from the
    /// original monitors; overridable, not a silent constant.
    pub context_growth_fraction: f64,
    /// Severity classification thresholds for forecasts
    pub severity_thresholds: SeverityThresholds,
    /// Unit bucket cutoffs for burn rates
    pub rate_unit_thresholds: RateUnitThresholds,
    /// Floor on elapsed hours in rate math, guarding brand-new sessions and
    /// clock skew against division blow-up (default 1 minute)
    pub min_elapsed_hours: f64,
    /// Whether the segmenter synthesizes gap blocks for display continuity
    pub include_gap_blocks: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cost_mode: CostMode::Auto,
            block_duration: Duration::hours(5),
            limits: QuotaLimits::default(),
            timezone: Tz::UTC,
            default_model: ModelName::new("claude-3-5-sonnet"),
            context_growth_fraction: 0.2,
            severity_thresholds: SeverityThresholds::default(),
            rate_unit_thresholds: RateUnitThresholds::default(),
            min_elapsed_hours: 1.0 / 60.0,
            include_gap_blocks: false,
        }
    }
}

impl EngineConfig {
    /// Set the cost resolution mode
    pub fn with_cost_mode(mut self, mode: CostMode) -> Self {
        self.cost_mode = mode;
        self
    }

    /// Set the billing-block duration
    pub fn with_block_duration(mut self, duration: Duration) -> Self {
        self.block_duration = duration;
        self
    }

    /// Set quota limits (normalized: zero/negative become "no limit")
    pub fn with_limits(mut self, limits: QuotaLimits) -> Self {
        self.limits = limits.normalized();
        self
    }

    /// Set the grouping timezone
    pub fn with_timezone(mut self, tz: Tz) -> Self {
        self.timezone = tz;
        self
    }

    /// Set the default model used for events without a recorded model
    pub fn with_default_model(mut self, model: ModelName) -> Self {
        self.default_model = model;
        self
    }

    /// Override the context-growth heuristic fraction
    pub fn with_context_growth_fraction(mut self, fraction: f64) -> Self {
        self.context_growth_fraction = fraction;
        self
    }

    /// Enable gap-block synthesis
    pub fn with_gap_blocks(mut self, include: bool) -> Self {
        self.include_gap_blocks = include;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.block_duration <= Duration::zero() {
            return Err(LedgerError::InvalidConfig(format!(
                "block duration must be positive, got {}",
                self.block_duration
            )));
        }
        if !(0.0..=1.0).contains(&self.context_growth_fraction) {
            return Err(LedgerError::InvalidConfig(format!(
                "context growth fraction must be within [0, 1], got {}",
                self.context_growth_fraction
            )));
        }
        if self.min_elapsed_hours <= 0.0 || !self.min_elapsed_hours.is_finite() {
            return Err(LedgerError::InvalidConfig(format!(
                "minimum elapsed hours must be positive, got {}",
                self.min_elapsed_hours
            )));
        }
        let sev = &self.severity_thresholds;
        if sev.imminent_hours <= 0.0 || sev.soon_hours <= sev.imminent_hours {
            return Err(LedgerError::InvalidConfig(format!(
                "severity thresholds must satisfy 0 < imminent < soon, got {} and {}",
                sev.imminent_hours, sev.soon_hours
            )));
        }
        let units = &self.rate_unit_thresholds;
        if units.per_day_at_or_below < 0.0
            || units.per_minute_at_or_above <= units.per_day_at_or_below
        {
            return Err(LedgerError::InvalidConfig(format!(
                "rate unit thresholds must satisfy 0 <= per-day cutoff < per-minute cutoff, got {} and {}",
                units.per_day_at_or_below, units.per_minute_at_or_above
            )));
        }
        Ok(())
    }
}
