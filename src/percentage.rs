//! Percentage and threshold calculation
//!
//! The single place percentages are computed. Every caller (status line,
//! dashboard view model, report formatter) consumes these functions rather
//! than dividing on its own; the historical drift between independent
//! reimplementations is exactly what this module exists to end.
//!
//! A zero or unset limit yields a percentage of 0 with the `no_limit` flag
//! set, never NaN or infinity: "no limit configured" is a distinct state
//! from "0% used" and callers can tell them apart.

use crate::aggregation::MonthlyUsage;
use crate::blocks::UsageBlock;
use crate::config::QuotaLimits;
use serde::{Deserialize, Serialize};

/// A computed percentage with its "no limit configured" side channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Percentage {
    /// Percentage value; clamped at or above 0, deliberately not capped at
    /// 100. Callers decide whether to cap display
    pub value: f64,
    /// True when the limit was zero or unset and the value defaulted to 0
    pub no_limit: bool,
}

impl Percentage {
    /// A zero percentage flagged as having no configured limit
    pub fn no_limit() -> Self {
        Self {
            value: 0.0,
            no_limit: true,
        }
    }

    fn of(value: f64) -> Self {
        Self {
            value: value.max(0.0),
            no_limit: false,
        }
    }
}

/// Baseline against which a cost percentage is computed
///
/// Selected explicitly by the caller; the calculator never switches
/// baselines on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CostBaseline {
    /// Per-block cost baseline
    Block,
    /// Monthly plan cost limit
    MonthlyPlan,
}

/// Token usage as a percentage of a token limit
pub fn token_percentage(tokens: u64, limit: Option<u64>) -> Percentage {
    match limit.filter(|&l| l > 0) {
        Some(limit) => Percentage::of(100.0 * tokens as f64 / limit as f64),
        None => Percentage::no_limit(),
    }
}

/// Cost as a percentage of the explicitly selected baseline
pub fn cost_percentage(cost: f64, limits: &QuotaLimits, baseline: CostBaseline) -> Percentage {
    let limit = match baseline {
        CostBaseline::Block => limits.cost_limit,
        CostBaseline::MonthlyPlan => limits.monthly_cost_limit,
    };
    match limit.filter(|l| l.is_finite() && *l > 0.0) {
        Some(limit) => Percentage::of(100.0 * cost / limit),
        None => Percentage::no_limit(),
    }
}

/// The composite "critical" percentage for at-a-glance status
///
/// With an active block: the maximum of its token percentage and its
/// per-block cost percentage. Without one: the monthly-usage percentage
/// when a monthly plan limit is configured, else 0 flagged as no-limit.
/// This max-of-metrics, explicit-fallback composition is the contract every
/// caller uses verbatim.
pub fn critical_percentage(
    active: Option<&UsageBlock>,
    monthly: Option<&MonthlyUsage>,
    limits: &QuotaLimits,
) -> Percentage {
    if let Some(block) = active {
        let token_pct = token_percentage(block.tokens.total(), limits.token_limit);
        let cost_pct = cost_percentage(block.cost_usd, limits, CostBaseline::Block);
        return max_percentage(token_pct, cost_pct);
    }

    match monthly {
        Some(month) => cost_percentage(month.total_cost, limits, CostBaseline::MonthlyPlan),
        None => Percentage::no_limit(),
    }
}

fn max_percentage(a: Percentage, b: Percentage) -> Percentage {
    // A real measurement beats a no-limit placeholder of equal value
    match (a.no_limit, b.no_limit) {
        (true, true) => Percentage::no_limit(),
        (true, false) => b,
        (false, true) => a,
        (false, false) => {
            if b.value > a.value {
                b
            } else {
                a
            }
        }
    }
}
