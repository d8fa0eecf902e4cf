//! Context assembler (C7): builds the per-request `Context` from a selected
//! model, its composed operations, and merged metadata.

use std::sync::Arc;

use crate::types::catalog::ModelInfo;
use crate::types::context::{CancelSignal, ComposedOps, Context, Metadata};

pub struct ContextAssembler {
    base_metadata: Metadata,
}

impl ContextAssembler {
    pub fn new(base_metadata: Metadata) -> Self {
        Self { base_metadata }
    }

    /// Assembles a `Context` for one request: starts from the gateway's
    /// base metadata, merges in the per-call overlay, and stamps `model`
    /// with the resolved model's id (overriding any overlay-provided value,
    /// per the resolved open question that `metadata.model` always reflects
    /// what was actually dispatched to).
    pub fn assemble(
        &self,
        model: Arc<ModelInfo>,
        ops: Arc<dyn ComposedOps>,
        cancel: CancelSignal,
        overlay: Option<&Metadata>,
    ) -> Context {
        let metadata = self.merged_metadata(overlay);
        self.assemble_with_metadata(model, ops, cancel, metadata)
    }

    /// Merges the gateway's base metadata with a per-call overlay, without
    /// stamping a model yet. Used ahead of model selection, when
    /// `Hooks::before_model_selection` needs to see (and mutate) metadata
    /// before a model is known.
    pub fn merged_metadata(&self, overlay: Option<&Metadata>) -> Metadata {
        let mut metadata = self.base_metadata.clone();
        if let Some(overlay) = overlay {
            metadata.merge(overlay);
        }
        metadata
    }

    /// Stamps `model` onto already-merged metadata and builds the `Context`.
    /// Split from `merged_metadata` so the pipeline can run
    /// `before_model_selection`/`on_model_selected` between the merge and
    /// the stamp.
    pub fn assemble_with_metadata(
        &self,
        model: Arc<ModelInfo>,
        ops: Arc<dyn ComposedOps>,
        cancel: CancelSignal,
        mut metadata: Metadata,
    ) -> Context {
        metadata.model = Some(model.id.clone());
        Context {
            model,
            ops,
            cancel,
            metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::capability::Tier;
    use crate::types::catalog::{Metrics, Pricing};
    use async_trait::async_trait;
    use futures_core::stream::BoxStream;
    use serde_json::Value;
    use std::collections::{BTreeMap, HashSet};

    struct NoopOps;

    #[async_trait]
    impl ComposedOps for NoopOps {
        async fn execute(
            &self,
            _request: Value,
            _cancel: CancelSignal,
        ) -> Result<(Value, crate::types::usage::Usage), crate::core::error::GatewayError> {
            Ok((Value::Null, crate::types::usage::Usage::default()))
        }

        fn stream(
            &self,
            _request: Value,
            _cancel: CancelSignal,
        ) -> BoxStream<'static, Result<(Value, Option<crate::types::usage::Usage>), crate::core::error::GatewayError>>
        {
            Box::pin(futures_util::stream::empty())
        }

        async fn estimate_usage(&self, _request: &Value) -> Option<crate::types::usage::Usage> {
            None
        }
    }

    fn model() -> Arc<ModelInfo> {
        Arc::new(ModelInfo {
            id: "m1".into(),
            provider: "p".into(),
            display_name: "M1".into(),
            tier: Tier::Flagship,
            capabilities: HashSet::new(),
            parameters: BTreeMap::new(),
            context_window: 4096,
            max_output_tokens: None,
            pricing: Pricing::default(),
            metrics: Metrics::default(),
            registration_seq: 0,
        })
    }

    #[test]
    fn assembled_metadata_model_always_reflects_resolved_model() {
        let assembler = ContextAssembler::new(Metadata::default());
        let (_handle, cancel) = CancelSignal::pair();
        let mut overlay = Metadata::default();
        overlay.model = Some("something-else".into());

        let ctx = assembler.assemble(model(), Arc::new(NoopOps), cancel, Some(&overlay));

        assert_eq!(ctx.metadata.model.as_deref(), Some("m1"));
    }
}
