//! Refresh coordinator (C4): pulls fresh catalog data from each provider's
//! `ModelSource`, fills in defaults, applies overrides, and publishes the
//! result atomically via `ModelCatalog`.

use std::sync::Arc;

use tracing::{info, warn};

use crate::core::capabilities::CapabilityDetector;
use crate::core::error::GatewayError;
use crate::core::registry::ModelCatalog;
use crate::provider::{ModelSource, Provider};
use crate::types::capability::Tier;
use crate::types::predicate::ModelOverride;

/// One provider's registered source of catalog truth, paired with the
/// `Provider` used to probe its dispatch-level capabilities.
struct Source {
    provider: Arc<dyn Provider>,
    model_source: Arc<dyn ModelSource>,
}

/// Drives catalog refreshes. Holds no mutable state of its own beyond the
/// registered sources and override rules; all mutation happens through
/// `ModelCatalog`, which is safe to read from concurrently mid-refresh.
pub struct RefreshCoordinator {
    catalog: Arc<ModelCatalog>,
    sources: Vec<Source>,
    overrides: Vec<ModelOverride>,
}

impl RefreshCoordinator {
    pub fn new(catalog: Arc<ModelCatalog>) -> Self {
        Self {
            catalog,
            sources: Vec::new(),
            overrides: Vec::new(),
        }
    }

    pub fn register_source(&mut self, provider: Arc<dyn Provider>, model_source: Arc<dyn ModelSource>) {
        self.sources.push(Source {
            provider,
            model_source,
        });
    }

    pub fn set_overrides(&mut self, overrides: Vec<ModelOverride>) {
        self.overrides = overrides;
    }

    /// Refreshes every registered provider. A single provider's failure is
    /// logged and skipped rather than aborting the whole refresh, so one
    /// flaky listing endpoint never blanks the catalog for every other
    /// provider.
    pub async fn refresh_all(&self) {
        for source in &self.sources {
            if let Err(err) = self.refresh_one(source).await {
                warn!(provider = source.provider.name(), error = %err, "catalog refresh failed");
            }
        }
    }

    pub async fn refresh_provider(&self, provider_name: &str) -> Result<(), GatewayError> {
        let source = self
            .sources
            .iter()
            .find(|s| s.provider.name() == provider_name)
            .ok_or_else(|| GatewayError::registry(format!("unknown provider '{provider_name}'")))?;
        self.refresh_one(source).await
    }

    async fn refresh_one(&self, source: &Source) -> Result<(), GatewayError> {
        let mut models = source.model_source.list_models().await?;

        for model in &mut models {
            if model.display_name.is_empty() {
                model.display_name = model.id.clone();
            }
            // Only default capabilities when the source reported none of
            // its own: a model's self-reported capability set always wins
            // over the provider-wide probe.
            if model.capabilities.is_empty() {
                model.capabilities = CapabilityDetector::detect(source.provider.as_ref(), model);
            }
            for rule in &self.overrides {
                rule.apply(model);
            }
        }

        let count = models.len();
        for model in models {
            self.catalog.register(model);
        }
        info!(provider = source.provider.name(), models = count, "catalog refreshed");
        Ok(())
    }
}

/// Falls back to name-pattern tier detection when a listed model omits one.
/// `ModelSource` implementations may call this directly, or leave tier
/// detection to `RefreshCoordinator` by using `Tier::detect_from_name`
/// themselves before returning from `list_models`.
pub fn fill_missing_tier(tier: Option<Tier>, model_id: &str) -> Tier {
    tier.unwrap_or_else(|| Tier::detect_from_name(model_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::capability::Tier as TierEnum;
    use crate::types::catalog::{Metrics, ModelInfo, Pricing};
    use async_trait::async_trait;
    use std::collections::{BTreeMap, HashSet};

    struct StubProvider;

    #[async_trait]
    impl Provider for StubProvider {
        fn name(&self) -> &str {
            "stub"
        }
        fn supports_chat(&self) -> bool {
            true
        }
    }

    struct StubSource;

    #[async_trait]
    impl ModelSource for StubSource {
        async fn list_models(&self) -> Result<Vec<ModelInfo>, GatewayError> {
            Ok(vec![ModelInfo {
                id: "stub-1".into(),
                provider: "stub".into(),
                display_name: String::new(),
                tier: TierEnum::Flagship,
                capabilities: HashSet::new(),
                parameters: BTreeMap::new(),
                context_window: 4096,
                max_output_tokens: None,
                pricing: Pricing::default(),
                metrics: Metrics::default(),
                registration_seq: 0,
            }])
        }
    }

    #[tokio::test]
    async fn refresh_registers_models_with_detected_capabilities() {
        let catalog = Arc::new(ModelCatalog::new());
        let mut coordinator = RefreshCoordinator::new(catalog.clone());
        coordinator.register_source(Arc::new(StubProvider), Arc::new(StubSource));

        coordinator.refresh_all().await;

        let model = catalog.get("stub-1").unwrap();
        assert_eq!(model.display_name, "stub-1");
        assert!(model
            .capabilities
            .contains(&crate::types::capability::Capability::Chat));
    }

    struct SelfReportingSource;

    #[async_trait]
    impl ModelSource for SelfReportingSource {
        async fn list_models(&self) -> Result<Vec<ModelInfo>, GatewayError> {
            Ok(vec![ModelInfo {
                id: "stub-2".into(),
                provider: "stub".into(),
                display_name: "Stub Two".into(),
                tier: TierEnum::Flagship,
                capabilities: HashSet::from([crate::types::capability::Capability::Embedding]),
                parameters: BTreeMap::new(),
                context_window: 4096,
                max_output_tokens: None,
                pricing: Pricing::default(),
                metrics: Metrics::default(),
                registration_seq: 0,
            }])
        }
    }

    #[tokio::test]
    async fn refresh_preserves_self_reported_capabilities() {
        let catalog = Arc::new(ModelCatalog::new());
        let mut coordinator = RefreshCoordinator::new(catalog.clone());
        coordinator.register_source(Arc::new(StubProvider), Arc::new(SelfReportingSource));

        coordinator.refresh_all().await;

        let model = catalog.get("stub-2").unwrap();
        // StubProvider only advertises `supports_chat`, so a detector-driven
        // overwrite would have dropped Embedding and added Chat instead.
        assert!(model
            .capabilities
            .contains(&crate::types::capability::Capability::Embedding));
        assert!(!model
            .capabilities
            .contains(&crate::types::capability::Capability::Chat));
    }

    #[test]
    fn fill_missing_tier_detects_from_name_pattern() {
        assert_eq!(fill_missing_tier(None, "gpt-4o-mini"), TierEnum::Efficient);
        assert_eq!(fill_missing_tier(Some(TierEnum::Legacy), "gpt-4o-mini"), TierEnum::Legacy);
    }
}
