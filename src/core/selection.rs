//! The selection engine (C3): filters the catalog by a `SelectionPredicate`,
//! scores survivors, and returns the best match (or the full ranked list for
//! `search`).

use std::sync::Arc;

use crate::core::registry::ModelCatalog;
use crate::types::capability::Tier;
use crate::types::catalog::ModelInfo;
use crate::types::predicate::{SelectionPredicate, Weights};

/// A model paired with its score under a given predicate's weights.
#[derive(Debug, Clone)]
pub struct ScoredModel {
    pub model: Arc<ModelInfo>,
    pub score: f64,
}

pub struct SelectionEngine<'a> {
    catalog: &'a ModelCatalog,
}

impl<'a> SelectionEngine<'a> {
    pub fn new(catalog: &'a ModelCatalog) -> Self {
        Self { catalog }
    }

    /// Returns every catalog model that satisfies the predicate's hard
    /// constraints, ranked best-first. A pinned `predicate.model` bypasses
    /// filtering and scoring: the pinned model (if found) is the sole
    /// result, scored at `1.0`.
    pub fn search(&self, predicate: &SelectionPredicate) -> Vec<ScoredModel> {
        if let Some(pinned) = &predicate.model {
            return match self.catalog.get(pinned) {
                Some(model) => vec![ScoredModel { model, score: 1.0 }],
                None => Vec::new(),
            };
        }

        let weights = predicate.resolve_weights();

        let mut scored: Vec<ScoredModel> = self
            .catalog
            .all()
            .into_iter()
            .filter(|model| predicate.satisfies(model))
            .filter(|model| within_budget(model, predicate))
            .map(|model| {
                let score = score_model(&model, predicate, &weights);
                ScoredModel { model, score }
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored
    }

    /// The single best match, or `None` if no model satisfies the
    /// predicate's hard constraints (or a pinned model isn't in the
    /// catalog).
    pub fn select(&self, predicate: &SelectionPredicate) -> Option<Arc<ModelInfo>> {
        self.search(predicate).into_iter().next().map(|s| s.model)
    }
}

fn within_budget(model: &ModelInfo, predicate: &SelectionPredicate) -> bool {
    let Some(budget) = predicate.budget else {
        return true;
    };
    // Without a concrete request we can only budget-check models that
    // publish an input price; models with no pricing data pass through
    // (the cost calculator will surface a later error if costing is
    // actually required).
    match &model.pricing.input {
        Some(band) => band.price_per_unit <= budget.max_cost_usd,
        None => true,
    }
}

/// Cheaper models score closer to `1.0`; `None` when a model publishes no
/// input/output pricing at all (excluded from the weighted average rather
/// than guessed at).
fn cost_component(model: &ModelInfo) -> Option<f64> {
    let prices: Vec<f64> = [model.pricing.input, model.pricing.output]
        .iter()
        .filter_map(|p| p.map(|b| b.price_per_unit))
        .collect();
    if prices.is_empty() {
        return None;
    }
    let avg = prices.iter().sum::<f64>() / prices.len() as f64;
    Some(1.0 / (1.0 + avg / 10.0))
}

/// `None` when the model reports no throughput metric.
fn speed_component(model: &ModelInfo) -> Option<f64> {
    model
        .metrics
        .tokens_per_second
        .map(|tps| (tps / 100.0).min(1.0))
}

/// Always available: falls back to a tier-derived constant when the model
/// reports no externally-measured accuracy.
fn accuracy_component(model: &ModelInfo) -> f64 {
    model.metrics.accuracy_score.unwrap_or(match model.tier {
        Tier::Flagship => 1.0,
        Tier::Efficient => 0.7,
        Tier::Experimental | Tier::Legacy => 0.5,
    })
}

/// Always available from the catalog entry itself.
fn context_window_component(model: &ModelInfo) -> f64 {
    (model.context_window as f64 / 100_000.0).min(1.0)
}

fn score_model(model: &ModelInfo, predicate: &SelectionPredicate, weights: &Weights) -> f64 {
    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;

    if let Some(cost) = cost_component(model) {
        weighted_sum += weights.cost * cost;
        weight_total += weights.cost;
    }
    if let Some(speed) = speed_component(model) {
        weighted_sum += weights.speed * speed;
        weight_total += weights.speed;
    }
    weighted_sum += weights.accuracy * accuracy_component(model);
    weight_total += weights.accuracy;
    weighted_sum += weights.context_window * context_window_component(model);
    weight_total += weights.context_window;

    let mut base = if weight_total > 0.0 {
        weighted_sum / weight_total
    } else {
        0.0
    };

    // Reward (don't require) optional capabilities and parameters: each one
    // present nudges the score up without making its absence disqualifying.
    if !predicate.optional_capabilities.is_empty() {
        let satisfied = predicate
            .optional_capabilities
            .iter()
            .filter(|c| model.has_capability(**c))
            .count();
        let fraction = satisfied as f64 / predicate.optional_capabilities.len() as f64;
        base *= 1.0 + fraction;
    }

    if !predicate.optional_parameters.is_empty() {
        let satisfied = predicate
            .optional_parameters
            .iter()
            .filter(|p| model.supports_parameter(p))
            .count();
        let fraction = satisfied as f64 / predicate.optional_parameters.len() as f64;
        base *= 1.0 + 0.5 * fraction;
    }

    base
}
