//! Statistics aggregator (C9): running per-model counters fed by the
//! pipeline's `after_request`/`on_error` hooks, exposed as point-in-time
//! snapshots, plus a catalog-wide view for dashboards that want to see every
//! known model rather than only the ones that have actually been dispatched
//! to yet.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::core::cost::CostCalculator;
use crate::core::registry::ModelCatalog;
use crate::types::catalog::ModelInfo;
use crate::types::usage::Usage;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ModelStats {
    pub requests: u64,
    pub errors: u64,
    pub total_cost_usd: f64,
    pub total_latency: Duration,
}

impl ModelStats {
    pub fn average_cost_usd(&self) -> f64 {
        if self.requests == 0 {
            0.0
        } else {
            self.total_cost_usd / self.requests as f64
        }
    }

    pub fn error_rate(&self) -> f64 {
        if self.requests == 0 {
            0.0
        } else {
            self.errors as f64 / self.requests as f64
        }
    }

    pub fn average_latency(&self) -> Duration {
        if self.requests == 0 {
            Duration::ZERO
        } else {
            self.total_latency / self.requests as u32
        }
    }
}

/// Catalog-wide roll-up across every model this aggregator has recorded
/// anything for.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GlobalStats {
    pub models: usize,
    pub requests: u64,
    pub errors: u64,
    pub total_cost_usd: f64,
}

impl GlobalStats {
    pub fn error_rate(&self) -> f64 {
        if self.requests == 0 {
            0.0
        } else {
            self.errors as f64 / self.requests as f64
        }
    }
}

/// A catalog model's self-reported health, independent of what this
/// aggregator has recorded: `ModelInfo::metrics` is filled in by whatever
/// `ModelSource` produced the entry, and may already carry request counts
/// from the provider's own telemetry.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelHealth {
    pub key: String,
    pub success_count: u64,
    pub failure_count: u64,
    pub accuracy_score: Option<f64>,
}

impl ModelHealth {
    pub fn error_rate(&self) -> f64 {
        let total = self.success_count + self.failure_count;
        if total == 0 {
            0.0
        } else {
            self.failure_count as f64 / total as f64
        }
    }
}

pub struct StatisticsAggregator {
    catalog: Arc<ModelCatalog>,
    by_model: Mutex<HashMap<String, ModelStats>>,
}

impl StatisticsAggregator {
    pub fn new(catalog: Arc<ModelCatalog>) -> Self {
        Self {
            catalog,
            by_model: Mutex::new(HashMap::new()),
        }
    }

    pub fn record_success(&self, model: &ModelInfo, usage: &Usage, latency: Duration) {
        let (cost, _) = CostCalculator::calculate(model, usage);
        let mut guard = self.by_model.lock().unwrap();
        let entry = guard.entry(model.key()).or_default();
        entry.requests += 1;
        entry.total_cost_usd += cost.total();
        entry.total_latency += latency;
    }

    pub fn record_error(&self, model_key: &str, latency: Duration) {
        let mut guard = self.by_model.lock().unwrap();
        let entry = guard.entry(model_key.to_string()).or_default();
        entry.requests += 1;
        entry.errors += 1;
        entry.total_latency += latency;
    }

    pub fn snapshot(&self, model_key: &str) -> ModelStats {
        self.by_model
            .lock()
            .unwrap()
            .get(model_key)
            .copied()
            .unwrap_or_default()
    }

    pub fn snapshot_all(&self) -> HashMap<String, ModelStats> {
        self.by_model.lock().unwrap().clone()
    }

    /// Rolls every recorded model's stats up into one catalog-wide summary.
    pub fn global_snapshot(&self) -> GlobalStats {
        let guard = self.by_model.lock().unwrap();
        guard.values().fold(
            GlobalStats {
                models: guard.len(),
                ..GlobalStats::default()
            },
            |mut acc, stats| {
                acc.requests += stats.requests;
                acc.errors += stats.errors;
                acc.total_cost_usd += stats.total_cost_usd;
                acc
            },
        )
    }

    /// Number of catalog models registered per provider, independent of
    /// whether any of them have ever been dispatched to.
    pub fn provider_model_counts(&self) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for model in self.catalog.all() {
            *counts.entry(model.provider.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Self-reported health for every catalog model, read straight off
    /// `ModelInfo::metrics` rather than this aggregator's own counters.
    pub fn model_health_summary(&self) -> Vec<ModelHealth> {
        self.catalog
            .all()
            .into_iter()
            .map(|model| ModelHealth {
                key: model.key(),
                success_count: model.metrics.success_count,
                failure_count: model.metrics.failure_count,
                accuracy_score: model.metrics.accuracy_score,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::capability::Tier;
    use crate::types::catalog::{Metrics, PriceBand, Pricing};
    use crate::types::usage::TextUsage;
    use std::collections::{BTreeMap, HashSet};

    fn model() -> ModelInfo {
        ModelInfo {
            id: "m".into(),
            provider: "p".into(),
            display_name: "M".into(),
            tier: Tier::Flagship,
            capabilities: HashSet::new(),
            parameters: BTreeMap::new(),
            context_window: 4096,
            max_output_tokens: None,
            pricing: Pricing {
                input: Some(PriceBand::new(0.01)),
                ..Default::default()
            },
            metrics: Metrics::default(),
            registration_seq: 0,
        }
    }

    #[test]
    fn average_cost_reflects_recorded_requests() {
        let stats = StatisticsAggregator::new(Arc::new(ModelCatalog::new()));
        let m = model();
        stats.record_success(
            &m,
            &Usage::from_text(TextUsage {
                input_tokens: 100,
                ..Default::default()
            }),
            Duration::from_millis(10),
        );
        stats.record_success(
            &m,
            &Usage::from_text(TextUsage {
                input_tokens: 200,
                ..Default::default()
            }),
            Duration::from_millis(20),
        );

        let snapshot = stats.snapshot(&m.key());
        assert_eq!(snapshot.requests, 2);
        assert!((snapshot.average_cost_usd() - 1.5).abs() < 1e-9);
        assert_eq!(snapshot.average_latency(), Duration::from_millis(15));
    }

    #[test]
    fn error_rate_counts_errors_against_total_requests() {
        let stats = StatisticsAggregator::new(Arc::new(ModelCatalog::new()));
        let m = model();
        stats.record_success(&m, &Usage::default(), Duration::from_millis(5));
        stats.record_error(&m.key(), Duration::from_millis(5));

        let snapshot = stats.snapshot(&m.key());
        assert_eq!(snapshot.requests, 2);
        assert!((snapshot.error_rate() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn global_snapshot_rolls_up_every_recorded_model() {
        let stats = StatisticsAggregator::new(Arc::new(ModelCatalog::new()));
        let mut other = model();
        other.id = "m2".into();
        stats.record_success(&model(), &Usage::default(), Duration::from_millis(1));
        stats.record_error(&other.key(), Duration::from_millis(1));

        let global = stats.global_snapshot();
        assert_eq!(global.models, 2);
        assert_eq!(global.requests, 2);
        assert_eq!(global.errors, 1);
    }

    #[test]
    fn provider_model_counts_reads_the_catalog_not_recorded_stats() {
        let catalog = Arc::new(ModelCatalog::new());
        catalog.register(model());
        let mut other = model();
        other.id = "m2".into();
        catalog.register(other);

        let stats = StatisticsAggregator::new(catalog);
        let counts = stats.provider_model_counts();
        assert_eq!(counts.get("p"), Some(&2));
    }

    #[test]
    fn model_health_summary_reads_catalog_metrics() {
        let catalog = Arc::new(ModelCatalog::new());
        let mut m = model();
        m.metrics.success_count = 9;
        m.metrics.failure_count = 1;
        catalog.register(m);

        let stats = StatisticsAggregator::new(catalog);
        let summary = stats.model_health_summary();
        assert_eq!(summary.len(), 1);
        assert!((summary[0].error_rate() - 0.1).abs() < 1e-9);
    }
}
