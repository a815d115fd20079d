//! Injected pricing capability
//!
//! The engine never fetches pricing itself. Callers hand it a
//! [`PricingSource`], typically a table loaded from wherever they keep
//! rates, and the Cost Resolver consults it through this seam so the
//! reporting path and the live-dashboard path price identically.

use crate::types::{ModelName, ModelPricing};
use std::collections::HashMap;
use tracing::debug;

/// Capability for looking up per-category USD rates by model name
///
/// Implementations must be deterministic: the resolver's purity guarantee
/// rests on identical inputs producing identical rates.
pub trait PricingSource: Send + Sync {
    /// Rates for the given model, or `None` when the model is unknown
    fn pricing_for(&self, model: &ModelName) -> Option<ModelPricing>;
}

/// In-memory pricing table with lenient model-name matching
///
/// Matching tries the exact name first, then common prefix variants, then a
/// substring match, since usage logs and pricing feeds rarely agree on the exact
/// spelling of a model name.
///
/// # Examples
/// ```
/// use ccledger::pricing::{PricingSource, StaticPricing};
/// use ccledger::types::{ModelName, ModelPricing};
///
/// let pricing = StaticPricing::new().with_model(
///     "claude-3-opus",
///     ModelPricing {
///         input_cost_per_token: Some(0.000015),
///         output_cost_per_token: Some(0.000075),
///         ..Default::default()
///     },
/// );
/// assert!(pricing.pricing_for(&ModelName::new("claude-3-opus")).is_some());
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticPricing {
    table: HashMap<String, ModelPricing>,
}

impl StaticPricing {
    /// Create an empty pricing table
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from an iterator of (model name, pricing) pairs
    pub fn from_iter<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, ModelPricing)>,
        S: Into<String>,
    {
        Self {
            table: entries
                .into_iter()
                .map(|(name, pricing)| (name.into(), pricing))
                .collect(),
        }
    }

    /// Add a model's pricing, replacing any existing entry
    pub fn with_model(mut self, name: impl Into<String>, pricing: ModelPricing) -> Self {
        self.table.insert(name.into(), pricing);
        self
    }

    /// Number of models in the table
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    fn find(&self, model_name: &str) -> Option<&ModelPricing> {
        if let Some(pricing) = self.table.get(model_name) {
            return Some(pricing);
        }

        let variations = [
            format!("anthropic/{model_name}"),
            format!("claude-{model_name}"),
            model_name.replace("claude-3-", "claude-3."),
            model_name.replace("claude-3.", "claude-3-"),
        ];
        for variant in &variations {
            if let Some(pricing) = self.table.get(variant) {
                debug!("Found pricing for {} using variant {}", model_name, variant);
                return Some(pricing);
            }
        }

        // Deterministic partial match: shortest key first, then lexicographic
        let mut candidates: Vec<(&String, &ModelPricing)> = self
            .table
            .iter()
            .filter(|(key, _)| key.contains(model_name) || model_name.contains(key.as_str()))
            .collect();
        candidates.sort_by(|(a, _), (b, _)| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));

        if let Some((key, pricing)) = candidates.first() {
            debug!("Found pricing for {} using partial match {}", model_name, key);
            return Some(pricing);
        }

        None
    }
}

impl PricingSource for StaticPricing {
    fn pricing_for(&self, model: &ModelName) -> Option<ModelPricing> {
        self.find(model.as_str()).cloned()
    }
}
