//! Per-request context: cancellation, metadata, and the composed
//! execute/stream/estimate operations a `Provider` hands the pipeline.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use futures_core::stream::BoxStream;
use serde_json::Value;

use crate::core::error::GatewayError;
use crate::types::catalog::ModelInfo;
use crate::types::predicate::ProviderFilter;
use crate::types::usage::Usage;

use super::predicate::recompute_allow;

/// Cooperative cancellation token, checked by the pipeline between
/// lifecycle stages and forwarded to provider dispatch. Backed by a
/// `tokio::sync::watch` channel rather than `tokio-util`'s `CancellationToken`
/// since the gateway has no other use for that crate.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: tokio::sync::watch::Receiver<bool>,
}

/// Paired handle used by the caller who owns the request to trigger
/// cancellation; never exposed to providers or hooks.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: tokio::sync::watch::Sender<bool>,
}

impl CancelSignal {
    pub fn pair() -> (CancelHandle, CancelSignal) {
        let (tx, rx) = tokio::sync::watch::channel(false);
        (CancelHandle { tx }, CancelSignal { rx })
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    pub async fn cancelled(&mut self) {
        let _ = self.rx.wait_for(|v| *v).await;
    }
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Provider allow/deny metadata, merged across a request's lifecycle using
/// set-union semantics with `allow` always recomputed afterward.
#[derive(Debug, Clone, Default)]
pub struct ProvidersMeta {
    pub preferred: HashSet<String>,
    pub excluded: HashSet<String>,
    allow: HashSet<String>,
}

impl ProvidersMeta {
    pub fn allow(&self) -> &HashSet<String> {
        &self.allow
    }

    /// Union `preferred`/`excluded` with `other` and recompute `allow` as
    /// `preferred - excluded` (§4.7 metadata merge table).
    pub fn merge(&mut self, other: &ProvidersMeta) {
        self.preferred.extend(other.preferred.iter().cloned());
        self.excluded.extend(other.excluded.iter().cloned());
        self.allow = recompute_allow(&self.preferred, &self.excluded);
    }

    pub fn as_filter(&self) -> ProviderFilter {
        ProviderFilter {
            preferred: self.allow.clone(),
            excluded: self.excluded.clone(),
        }
    }
}

/// Free-form, mergeable request metadata threaded through the pipeline and
/// handed to hooks. `model` is always the resolved model's bare id string.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    pub model: Option<String>,
    pub providers: ProvidersMeta,
    pub tags: HashSet<String>,
    pub extra: serde_json::Map<String, Value>,
}

impl Metadata {
    /// Merge an overlay onto `self` following the per-field merge table:
    /// `tags` union, `providers` union-then-recompute, `extra` keys are
    /// overwritten by the overlay, and `model` is replaced if the overlay
    /// sets it.
    pub fn merge(&mut self, overlay: &Metadata) {
        if let Some(model) = &overlay.model {
            self.model = Some(model.clone());
        }
        self.providers.merge(&overlay.providers);
        self.tags.extend(overlay.tags.iter().cloned());
        for (k, v) in &overlay.extra {
            self.extra.insert(k.clone(), v.clone());
        }
    }
}

/// The operations a resolved provider+model pair exposes to the pipeline
/// for one request, bound at dispatch time. A trait object in place of
/// boxed closures keeps dispatch nameable and testable without `dyn Fn`
/// trait-object ergonomics friction across the async boundary.
#[async_trait]
pub trait ComposedOps: Send + Sync {
    /// Runs the bound operation to completion, returning the raw JSON
    /// response alongside the usage it consumed. Pairing usage with the
    /// response here (rather than requiring the pipeline to parse it back
    /// out of arbitrary response shapes) is what lets the pipeline stay
    /// generic across operation families.
    async fn execute(
        &self,
        request: Value,
        cancel: CancelSignal,
    ) -> Result<(Value, Usage), GatewayError>;

    /// Streams incremental JSON chunks. Each chunk may carry a usage
    /// snapshot (see `Usage::accumulate`); most won't.
    fn stream(
        &self,
        request: Value,
        cancel: CancelSignal,
    ) -> BoxStream<'static, Result<(Value, Option<Usage>), GatewayError>>;

    /// Best-effort usage/cost estimate prior to dispatch, used for budget
    /// enforcement (§5.3 `Budget`). Returns `None` when the model cannot
    /// produce an estimate (e.g. no pricing data).
    async fn estimate_usage(&self, request: &Value) -> Option<Usage>;
}

/// The full per-request context threaded through the pipeline: the
/// resolved model, composed provider operations, cancellation, and
/// metadata.
pub struct Context {
    pub model: Arc<ModelInfo>,
    pub ops: Arc<dyn ComposedOps>,
    pub cancel: CancelSignal,
    pub metadata: Metadata,
}

impl Context {
    pub fn new(model: Arc<ModelInfo>, ops: Arc<dyn ComposedOps>, cancel: CancelSignal) -> Self {
        let mut metadata = Metadata::default();
        metadata.model = Some(model.id.clone());
        Self {
            model,
            ops,
            cancel,
            metadata,
        }
    }
}
