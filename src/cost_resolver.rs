//! Cost resolver: one monetary cost per event, under a selectable policy
//!
//! This stage is pure and side-effect-free. Given the same event, mode, and
//! pricing table it always produces the same [`ResolvedUsage`], the
//! property that keeps batch reports and live dashboards in agreement.

use crate::config::EngineConfig;
use crate::pricing::PricingSource;
use crate::types::{CostMode, ModelPricing, ResolvedUsage, TokenCounts, UsageEvent};
use tracing::debug;

/// Compute a cost from token counts and per-category rates
///
/// Categories without a rate contribute zero.
pub fn compute_cost(tokens: &TokenCounts, pricing: &ModelPricing) -> f64 {
    let mut cost = 0.0;

    if let Some(rate) = pricing.input_cost_per_token {
        cost += tokens.input_tokens as f64 * rate;
    }
    if let Some(rate) = pricing.output_cost_per_token {
        cost += tokens.output_tokens as f64 * rate;
    }
    if let Some(rate) = pricing.cache_creation_cost_per_token {
        cost += tokens.cache_creation_tokens as f64 * rate;
    }
    if let Some(rate) = pricing.cache_read_cost_per_token {
        cost += tokens.cache_read_tokens as f64 * rate;
    }

    cost.max(0.0)
}

/// Resolve a single event's cost under the configured mode
///
/// - `auto`: trust a positive precomputed cost, otherwise compute from tokens
/// - `calculate`: always compute from tokens
/// - `display`: always use the precomputed cost, zero when absent
///
/// Computation falls back through an explicit chain: the event's model, then
/// the configured default model, then zero with `unpriced` set. An unpriced
/// event is visible to callers, never silently reported as a real $0 cost.
pub fn resolve(
    event: UsageEvent,
    mode: CostMode,
    pricing: &dyn PricingSource,
    config: &EngineConfig,
) -> ResolvedUsage {
    let precomputed = event.precomputed_cost;

    match mode {
        CostMode::Display => ResolvedUsage {
            cost_usd: precomputed.unwrap_or(0.0),
            unpriced: false,
            event,
        },
        CostMode::Auto if precomputed.is_some_and(|c| c > 0.0) => ResolvedUsage {
            cost_usd: precomputed.unwrap_or(0.0),
            unpriced: false,
            event,
        },
        CostMode::Auto | CostMode::Calculate => {
            let (cost_usd, unpriced) = match lookup_with_fallback(&event, pricing, config) {
                Some(model_pricing) => (compute_cost(&event.tokens, &model_pricing), false),
                None => (0.0, true),
            };
            ResolvedUsage {
                event,
                cost_usd,
                unpriced,
            }
        }
    }
}

/// Resolve a batch of events, preserving order
pub fn resolve_all(
    events: Vec<UsageEvent>,
    mode: CostMode,
    pricing: &dyn PricingSource,
    config: &EngineConfig,
) -> Vec<ResolvedUsage> {
    events
        .into_iter()
        .map(|event| resolve(event, mode, pricing, config))
        .collect()
}

fn lookup_with_fallback(
    event: &UsageEvent,
    pricing: &dyn PricingSource,
    config: &EngineConfig,
) -> Option<ModelPricing> {
    if let Some(found) = pricing.pricing_for(&event.model) {
        return Some(found);
    }
    if event.model != config.default_model {
        if let Some(found) = pricing.pricing_for(&config.default_model) {
            debug!(
                "No pricing for {}, using default model {}",
                event.model, config.default_model
            );
            return Some(found);
        }
    }
    debug!("No pricing for {} or default model, event unpriced", event.model);
    None
}
