//! Lifecycle hooks: observers the pipeline calls at each stage of a request,
//! used for logging, metrics export, and policy enforcement.

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::error::GatewayError;
use crate::types::catalog::ModelInfo;
use crate::types::context::Metadata;
use crate::types::usage::Usage;

/// Observer invoked at each pipeline stage. All methods are no-ops by
/// default so implementors only override what they need.
///
/// `before_model_selection`/`on_model_selected` bracket the selection step
/// itself, ahead of any dispatch; `before_request` runs once a model is
/// resolved and an estimate is available, and is the only hook that can
/// abort the request outright (returning `Err` short-circuits the whole
/// pipeline, distinct from the fallback ladder's dispatch-unsupported
/// retries).
#[async_trait]
pub trait Hooks: Send + Sync {
    async fn before_model_selection(&self, _metadata: &mut Metadata) {}

    async fn on_model_selected(&self, _metadata: &Metadata, _model: &Arc<ModelInfo>) {}

    async fn before_request(
        &self,
        _metadata: &Metadata,
        _model: &Arc<ModelInfo>,
        _estimated_usage: Option<&Usage>,
        _estimated_cost: f64,
    ) -> Result<(), GatewayError> {
        Ok(())
    }

    async fn after_request(
        &self,
        _metadata: &Metadata,
        _model: &Arc<ModelInfo>,
        _usage: &Usage,
        _cost: f64,
    ) {
    }

    async fn on_error(&self, _metadata: &Metadata, _tag: &str, _error: &GatewayError) {}
}

/// Fans a single lifecycle event out to every registered hook, in
/// registration order. A panicking hook would abort the request, so hooks
/// are expected to handle their own errors internally; the pipeline never
/// treats a hook's observation as part of the request's success/failure,
/// except for `before_request`'s `Result`, which is a deliberate abort path.
#[derive(Default)]
pub struct HookChain {
    hooks: Vec<Arc<dyn Hooks>>,
}

impl HookChain {
    pub fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    pub fn push(&mut self, hook: Arc<dyn Hooks>) {
        self.hooks.push(hook);
    }

    pub async fn before_model_selection(&self, metadata: &mut Metadata) {
        for hook in &self.hooks {
            hook.before_model_selection(metadata).await;
        }
    }

    pub async fn on_model_selected(&self, metadata: &Metadata, model: &Arc<ModelInfo>) {
        for hook in &self.hooks {
            hook.on_model_selected(metadata, model).await;
        }
    }

    /// Runs every hook's `before_request` in order, stopping at the first
    /// `Err` and propagating it. A single hook vetoing the request prevents
    /// later hooks in the chain from running.
    pub async fn before_request(
        &self,
        metadata: &Metadata,
        model: &Arc<ModelInfo>,
        estimated_usage: Option<&Usage>,
        estimated_cost: f64,
    ) -> Result<(), GatewayError> {
        for hook in &self.hooks {
            hook.before_request(metadata, model, estimated_usage, estimated_cost)
                .await?;
        }
        Ok(())
    }

    pub async fn after_request(
        &self,
        metadata: &Metadata,
        model: &Arc<ModelInfo>,
        usage: &Usage,
        cost: f64,
    ) {
        for hook in &self.hooks {
            hook.after_request(metadata, model, usage, cost).await;
        }
    }

    pub async fn on_error(&self, metadata: &Metadata, tag: &str, error: &GatewayError) {
        for hook in &self.hooks {
            hook.on_error(metadata, tag, error).await;
        }
    }
}
