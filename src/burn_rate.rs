//! Burn-rate derivation and quota-exhaustion forecasting
//!
//! Rates come from an active block or session: cumulative totals divided by
//! elapsed hours, with the elapsed time floored so brand-new sessions and
//! skewed clocks never produce absurd rates. Forecast severity is a discrete
//! enumerated value classified against configured thresholds; color and
//! formatting belong to callers.

use crate::blocks::UsageBlock;
use crate::config::{EngineConfig, RateUnitThresholds, SeverityThresholds};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Suggested display unit for a rate, selected purely by magnitude
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RateUnit {
    /// Low-magnitude rates read best per day
    PerDay,
    /// Mid-range rates read best per hour
    PerHour,
    /// High-magnitude rates read best per minute
    PerMinute,
}

/// Classify a per-hour rate into a display unit bucket
pub fn suggested_unit(rate_per_hour: f64, thresholds: &RateUnitThresholds) -> RateUnit {
    if rate_per_hour >= thresholds.per_minute_at_or_above {
        RateUnit::PerMinute
    } else if rate_per_hour <= thresholds.per_day_at_or_below {
        RateUnit::PerDay
    } else {
        RateUnit::PerHour
    }
}

/// Consumption rates derived from an active block or session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BurnRate {
    /// Tokens consumed per hour
    pub tokens_per_hour: f64,
    /// Cost in USD per hour
    pub cost_per_hour: f64,
    /// Messages per hour
    pub messages_per_hour: f64,
    /// Approximated context-window growth per hour; a configured fraction
    /// of the token rate, not a measured delta
    pub context_growth_per_hour: f64,
    /// Elapsed hours used in the division, after flooring
    pub elapsed_hours: f64,
    /// Suggested display unit for the token rate
    pub token_unit: RateUnit,
}

/// Severity of a quota forecast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    /// The limit is already at or past; the duration signals this as
    /// zero/negative rather than pretending to forecast
    Exceeded,
    /// Exhaustion within the imminent threshold
    Imminent,
    /// Exhaustion within the soon threshold
    Soon,
    /// Exhaustion comfortably far out
    Distant,
}

/// Projected time until a quota is exhausted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Forecast {
    /// Hours until the limit is reached; zero or negative means the limit
    /// is already exceeded
    pub hours_until_limit: f64,
    /// Discrete severity classification
    pub severity: Severity,
}

/// Forecasts against each configured quota
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuotaForecasts {
    /// Forecast against the token limit
    pub tokens: Option<Forecast>,
    /// Forecast against the per-block cost baseline
    pub cost: Option<Forecast>,
    /// Forecast against the message quota
    pub messages: Option<Forecast>,
}

/// Derive burn rates from cumulative totals since `start`
///
/// Elapsed time is floored at `config.min_elapsed_hours`; this also covers
/// clock skew, where `now` lags the latest event timestamp.
pub fn burn_rate(
    start: DateTime<Utc>,
    total_tokens: u64,
    total_cost: f64,
    message_count: usize,
    now: DateTime<Utc>,
    config: &EngineConfig,
) -> BurnRate {
    let elapsed_hours = ((now - start).num_milliseconds() as f64 / 3_600_000.0)
        .max(config.min_elapsed_hours);

    let tokens_per_hour = total_tokens as f64 / elapsed_hours;
    BurnRate {
        tokens_per_hour,
        cost_per_hour: total_cost / elapsed_hours,
        messages_per_hour: message_count as f64 / elapsed_hours,
        context_growth_per_hour: config.context_growth_fraction * tokens_per_hour,
        elapsed_hours,
        token_unit: suggested_unit(tokens_per_hour, &config.rate_unit_thresholds),
    }
}

/// Burn rates for an active block
///
/// Returns `None` for gap blocks and blocks without events.
pub fn block_burn_rate(
    block: &UsageBlock,
    now: DateTime<Utc>,
    config: &EngineConfig,
) -> Option<BurnRate> {
    if block.is_gap || block.events.is_empty() {
        return None;
    }
    Some(burn_rate(
        block.start_time,
        block.tokens.total(),
        block.cost_usd,
        block.message_count(),
        now,
        config,
    ))
}

/// Project hours until a limit is exhausted at the given rate
///
/// Returns `None` when no limit is configured, or when the rate is zero and
/// the limit is not yet reached (no exhaustion to forecast). An already
/// exceeded limit yields a zero/negative duration with `Severity::Exceeded`.
pub fn forecast(
    current: f64,
    limit: Option<f64>,
    rate_per_hour: f64,
    thresholds: &SeverityThresholds,
) -> Option<Forecast> {
    let limit = limit.filter(|l| l.is_finite() && *l > 0.0)?;
    let remaining = limit - current;

    if remaining <= 0.0 {
        return Some(Forecast {
            hours_until_limit: if rate_per_hour > 0.0 {
                remaining / rate_per_hour
            } else {
                0.0
            },
            severity: Severity::Exceeded,
        });
    }

    if rate_per_hour <= 0.0 {
        return None;
    }

    let hours = remaining / rate_per_hour;
    let severity = if hours < thresholds.imminent_hours {
        Severity::Imminent
    } else if hours < thresholds.soon_hours {
        Severity::Soon
    } else {
        Severity::Distant
    };

    Some(Forecast {
        hours_until_limit: hours,
        severity,
    })
}

/// Forecast every configured quota from a burn rate and current totals
pub fn quota_forecasts(
    rate: &BurnRate,
    current_tokens: u64,
    current_cost: f64,
    current_messages: usize,
    config: &EngineConfig,
) -> QuotaForecasts {
    let limits = config.limits.normalized();
    let thresholds = &config.severity_thresholds;

    QuotaForecasts {
        tokens: forecast(
            current_tokens as f64,
            limits.token_limit.map(|l| l as f64),
            rate.tokens_per_hour,
            thresholds,
        ),
        cost: forecast(
            current_cost,
            limits.cost_limit,
            rate.cost_per_hour,
            thresholds,
        ),
        messages: forecast(
            current_messages as f64,
            limits.message_limit.map(|l| l as f64),
            rate.messages_per_hour,
            thresholds,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QuotaLimits;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_burn_rate_basic() {
        let config = EngineConfig::default();
        let rate = burn_rate(t0(), 3000, 0.30, 6, t0() + Duration::hours(2), &config);

        assert!((rate.tokens_per_hour - 1500.0).abs() < 1e-9);
        assert!((rate.cost_per_hour - 0.15).abs() < 1e-9);
        assert!((rate.messages_per_hour - 3.0).abs() < 1e-9);
        assert!((rate.elapsed_hours - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_elapsed_floor_for_new_sessions() {
        let config = EngineConfig::default();
        // 10 seconds in: elapsed floors at one minute
        let rate = burn_rate(t0(), 1000, 0.10, 1, t0() + Duration::seconds(10), &config);
        assert!((rate.elapsed_hours - 1.0 / 60.0).abs() < 1e-9);
        assert!((rate.tokens_per_hour - 60_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_clock_skew_floors_elapsed() {
        let config = EngineConfig::default();
        // now behind start: no negative rates
        let rate = burn_rate(t0(), 1000, 0.10, 1, t0() - Duration::minutes(5), &config);
        assert!(rate.tokens_per_hour > 0.0);
        assert!((rate.elapsed_hours - config.min_elapsed_hours).abs() < 1e-12);
    }

    #[test]
    fn test_context_growth_fraction_applied() {
        let config = EngineConfig::default().with_context_growth_fraction(0.5);
        let rate = burn_rate(t0(), 2000, 0.0, 1, t0() + Duration::hours(1), &config);
        assert!((rate.context_growth_per_hour - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_unit_buckets() {
        let thresholds = RateUnitThresholds::default();
        assert_eq!(suggested_unit(5.0, &thresholds), RateUnit::PerDay);
        assert_eq!(suggested_unit(500.0, &thresholds), RateUnit::PerHour);
        assert_eq!(suggested_unit(10_000.0, &thresholds), RateUnit::PerMinute);
    }

    #[test]
    fn test_forecast_severities() {
        let thresholds = SeverityThresholds::default();

        let f = forecast(900.0, Some(1000.0), 200.0, &thresholds).unwrap();
        assert_eq!(f.severity, Severity::Imminent);
        assert!((f.hours_until_limit - 0.5).abs() < 1e-9);

        let f = forecast(500.0, Some(1000.0), 100.0, &thresholds).unwrap();
        assert_eq!(f.severity, Severity::Soon);

        let f = forecast(100.0, Some(1000.0), 10.0, &thresholds).unwrap();
        assert_eq!(f.severity, Severity::Distant);
    }

    #[test]
    fn test_forecast_already_exceeded() {
        let thresholds = SeverityThresholds::default();
        let f = forecast(1200.0, Some(1000.0), 100.0, &thresholds).unwrap();
        assert_eq!(f.severity, Severity::Exceeded);
        assert!(f.hours_until_limit <= 0.0);
    }

    #[test]
    fn test_forecast_no_limit() {
        let thresholds = SeverityThresholds::default();
        assert!(forecast(100.0, None, 50.0, &thresholds).is_none());
        assert!(forecast(100.0, Some(0.0), 50.0, &thresholds).is_none());
    }

    #[test]
    fn test_forecast_zero_rate() {
        let thresholds = SeverityThresholds::default();
        assert!(forecast(100.0, Some(1000.0), 0.0, &thresholds).is_none());
        // Zero rate but already exceeded still reports exceeded
        let f = forecast(1200.0, Some(1000.0), 0.0, &thresholds).unwrap();
        assert_eq!(f.severity, Severity::Exceeded);
    }

    #[test]
    fn test_quota_forecasts_independent() {
        let config = EngineConfig::default().with_limits(QuotaLimits {
            token_limit: Some(10_000),
            cost_limit: Some(5.0),
            monthly_cost_limit: None,
            message_limit: None,
        });
        let rate = burn_rate(t0(), 5000, 1.0, 10, t0() + Duration::hours(1), &config);
        let forecasts = quota_forecasts(&rate, 5000, 1.0, 10, &config);

        assert!(forecasts.tokens.is_some());
        assert!(forecasts.cost.is_some());
        assert!(forecasts.messages.is_none());
    }
}
