//! Operation pipeline (C8): selects one model for a request and runs it
//! through that model's dispatch ladder, trying a registered per-model
//! `ModelHandler` ahead of the model's provider, and an operation's
//! streaming and non-streaming dispatch methods in whichever order the
//! request actually needs.
//!
//! Selection happens exactly once per request. There is no cross-model
//! fallback: a model that satisfies the predicate but can't actually serve
//! the operation is a dispatch failure, not a reason to pick a different
//! model behind the caller's back.

use std::sync::Arc;

use futures_util::StreamExt;
use serde_json::Value;

use crate::core::assembler::ContextAssembler;
use crate::core::cost::CostCalculator;
use crate::core::error::{ErrorKind, GatewayError};
use crate::core::hooks::HookChain;
use crate::core::registry::ModelCatalog;
use crate::core::selection::SelectionEngine;
use crate::types::catalog::ModelInfo;
use crate::types::context::{CancelSignal, ComposedOps, Metadata};
use crate::types::operations::Operation;
use crate::types::predicate::SelectionPredicate;
use crate::types::usage::Usage;

/// Resolves a candidate model's provider-level `ComposedOps` for one
/// operation family. Supplied by the gateway facade, which knows how to
/// bind a `Provider`'s concrete dispatch method for the operation being run.
pub type OpsResolver<'a> = dyn Fn(&ModelInfo) -> Arc<dyn ComposedOps> + Send + Sync + 'a;

pub struct Pipeline {
    catalog: Arc<ModelCatalog>,
    hooks: HookChain,
}

impl Pipeline {
    pub fn new(catalog: Arc<ModelCatalog>, hooks: HookChain) -> Self {
        Self { catalog, hooks }
    }

    /// The dispatch ladder for the selected model: a registered
    /// `ModelHandler`'s ops (if any) ahead of the provider's own ops. Both
    /// are plain `ComposedOps`, so the rest of the pipeline doesn't need to
    /// know which rung actually served the request.
    fn dispatch_rungs(
        &self,
        operation: Operation,
        model: &ModelInfo,
        ops_resolver: &OpsResolver<'_>,
    ) -> Vec<Arc<dyn ComposedOps>> {
        let mut rungs = Vec::with_capacity(2);
        if let Some(handler) = self.catalog.get_handler(&model.provider, &model.id) {
            if let Some(ops) = handler.ops_for(operation) {
                rungs.push(ops);
            }
        }
        rungs.push(ops_resolver(model));
        rungs
    }

    /// Runs a non-streaming operation: selects one model, then tries its
    /// dispatch ladder execute-first, falling back to draining each rung's
    /// stream only once every rung's `execute` has reported
    /// `DispatchUnsupported`.
    pub async fn execute(
        &self,
        operation: Operation,
        predicate: &SelectionPredicate,
        assembler: &ContextAssembler,
        ops_resolver: &OpsResolver<'_>,
        request: Value,
        overlay: Option<&Metadata>,
    ) -> Result<(Value, Usage, Arc<ModelInfo>), GatewayError> {
        let mut metadata = assembler.merged_metadata(overlay);
        self.hooks.before_model_selection(&mut metadata).await;

        let model = SelectionEngine::new(&self.catalog)
            .select(predicate)
            .ok_or(GatewayError::NoModelFound {
                operation: operation.as_str(),
            })?;

        self.hooks.on_model_selected(&metadata, &model).await;

        let (_handle, cancel) = CancelSignal::pair();
        let rungs = self.dispatch_rungs(operation, &model, ops_resolver);
        let ctx = assembler.assemble_with_metadata(model.clone(), rungs[0].clone(), cancel.clone(), metadata);

        let estimate = ctx.ops.estimate_usage(&request).await;
        let estimated_cost = estimate
            .as_ref()
            .map(|usage| CostCalculator::calculate(&model, usage).0.total())
            .unwrap_or(0.0);

        if let Some(budget) = predicate.budget {
            if estimated_cost > budget.max_cost_usd {
                let err = GatewayError::ValidationFailed {
                    message: format!(
                        "estimated cost {estimated_cost} exceeds budget of {} for model {}",
                        budget.max_cost_usd, model.id
                    ),
                    cause: None,
                };
                self.hooks
                    .on_error(&ctx.metadata, &tag(operation, false), &err)
                    .await;
                return Err(err);
            }
        }

        if cancel.is_cancelled() {
            let err = GatewayError::Cancelled;
            self.hooks
                .on_error(&ctx.metadata, &tag(operation, false), &err)
                .await;
            return Err(err);
        }

        if let Err(err) = self
            .hooks
            .before_request(&ctx.metadata, &model, estimate.as_ref(), estimated_cost)
            .await
        {
            self.hooks
                .on_error(&ctx.metadata, &tag(operation, false), &err)
                .await;
            return Err(err);
        }

        match run_non_streaming(&rungs, request, ctx.cancel.clone()).await {
            Ok((response, usage)) => {
                let cost = CostCalculator::calculate(&model, &usage).0.total();
                self.hooks
                    .after_request(&ctx.metadata, &model, &usage, cost)
                    .await;
                Ok((response, usage, model))
            }
            Err(err) => {
                self.hooks
                    .on_error(&ctx.metadata, &tag(operation, false), &err)
                    .await;
                Err(err)
            }
        }
    }

    /// Runs a streaming operation the same way, but tries each rung's
    /// `stream` first and only falls back to wrapping a plain `execute` as
    /// a single-item stream once every rung's `stream` is exhausted.
    /// Chunks are drained fully before returning, same contract as before:
    /// callers that want incremental delivery read the accumulated vector.
    pub async fn execute_stream(
        &self,
        operation: Operation,
        predicate: &SelectionPredicate,
        assembler: &ContextAssembler,
        ops_resolver: &OpsResolver<'_>,
        request: Value,
        overlay: Option<&Metadata>,
    ) -> Result<(Vec<Value>, Usage, Arc<ModelInfo>), GatewayError> {
        let mut metadata = assembler.merged_metadata(overlay);
        self.hooks.before_model_selection(&mut metadata).await;

        let model = SelectionEngine::new(&self.catalog)
            .select(predicate)
            .ok_or(GatewayError::NoModelFound {
                operation: operation.as_str(),
            })?;

        self.hooks.on_model_selected(&metadata, &model).await;

        let (_handle, cancel) = CancelSignal::pair();
        let rungs = self.dispatch_rungs(operation, &model, ops_resolver);
        let ctx = assembler.assemble_with_metadata(model.clone(), rungs[0].clone(), cancel.clone(), metadata);

        let estimate = ctx.ops.estimate_usage(&request).await;
        let estimated_cost = estimate
            .as_ref()
            .map(|usage| CostCalculator::calculate(&model, usage).0.total())
            .unwrap_or(0.0);

        if let Err(err) = self
            .hooks
            .before_request(&ctx.metadata, &model, estimate.as_ref(), estimated_cost)
            .await
        {
            self.hooks
                .on_error(&ctx.metadata, &tag(operation, true), &err)
                .await;
            return Err(err);
        }

        match run_streaming(&rungs, request, ctx.cancel.clone()).await {
            Ok((chunks, usage)) => {
                let cost = CostCalculator::calculate(&model, &usage).0.total();
                self.hooks
                    .after_request(&ctx.metadata, &model, &usage, cost)
                    .await;
                Ok((chunks, usage, model))
            }
            Err(err) => {
                self.hooks
                    .on_error(&ctx.metadata, &tag(operation, true), &err)
                    .await;
                Err(err)
            }
        }
    }
}

/// Drains one rung's stream fully, accumulating usage via
/// `Usage::accumulate` across chunks that carry a snapshot.
/// `DispatchUnsupported` is the only error the ladder treats as "try the
/// next rung"; any other error (or a mid-stream failure after chunks have
/// already been produced) is returned as-is.
async fn drain_stream(
    ops: &Arc<dyn ComposedOps>,
    request: Value,
    cancel: CancelSignal,
) -> Result<(Vec<Value>, Usage), GatewayError> {
    let mut stream = ops.stream(request, cancel);
    let mut chunks = Vec::new();
    let mut usage = Usage::default();

    while let Some(item) = stream.next().await {
        match item {
            Ok((value, chunk_usage)) => {
                if let Some(chunk_usage) = chunk_usage {
                    usage.accumulate(&chunk_usage);
                }
                chunks.push(value);
            }
            Err(err) => return Err(err),
        }
    }

    if chunks.is_empty() {
        return Err(GatewayError::DispatchUnsupported { operation: "stream" });
    }
    Ok((chunks, usage))
}

/// Ladder for a non-streaming request: every rung's `execute` first, then
/// every rung's `stream` collapsed to its last chunk.
async fn run_non_streaming(
    rungs: &[Arc<dyn ComposedOps>],
    request: Value,
    cancel: CancelSignal,
) -> Result<(Value, Usage), GatewayError> {
    let mut last_error: Option<GatewayError> = None;

    for ops in rungs {
        match ops.execute(request.clone(), cancel.clone()).await {
            Ok(result) => return Ok(result),
            Err(err) if err.kind() == ErrorKind::DispatchUnsupported => {
                last_error = Some(err);
                continue;
            }
            Err(err) => return Err(err),
        }
    }

    for ops in rungs {
        match drain_stream(ops, request.clone(), cancel.clone()).await {
            Ok((chunks, usage)) => {
                let value = chunks.into_iter().next_back().unwrap_or(Value::Null);
                return Ok((value, usage));
            }
            Err(err) if err.kind() == ErrorKind::DispatchUnsupported => {
                last_error = Some(err);
                continue;
            }
            Err(err) => return Err(err),
        }
    }

    Err(last_error.unwrap_or(GatewayError::DispatchUnsupported {
        operation: "dispatch",
    }))
}

/// Ladder for a streaming request: every rung's `stream` first, then every
/// rung's `execute` expanded into a single-chunk result.
async fn run_streaming(
    rungs: &[Arc<dyn ComposedOps>],
    request: Value,
    cancel: CancelSignal,
) -> Result<(Vec<Value>, Usage), GatewayError> {
    let mut last_error: Option<GatewayError> = None;

    for ops in rungs {
        match drain_stream(ops, request.clone(), cancel.clone()).await {
            Ok(result) => return Ok(result),
            Err(err) if err.kind() == ErrorKind::DispatchUnsupported => {
                last_error = Some(err);
                continue;
            }
            Err(err) => return Err(err),
        }
    }

    for ops in rungs {
        match ops.execute(request.clone(), cancel.clone()).await {
            Ok((value, usage)) => return Ok((vec![value], usage)),
            Err(err) if err.kind() == ErrorKind::DispatchUnsupported => {
                last_error = Some(err);
                continue;
            }
            Err(err) => return Err(err),
        }
    }

    Err(last_error.unwrap_or(GatewayError::DispatchUnsupported {
        operation: "stream",
    }))
}

fn tag(operation: Operation, streaming: bool) -> String {
    let suffix = if streaming { "stream-failed" } else { "failed" };
    format!("{}-{suffix}", operation.as_str())
}
