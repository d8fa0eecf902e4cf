//! Gateway facade (C10): the single entry point applications use. Wires the
//! catalog, selection engine, refresh coordinator, pipeline, and statistics
//! aggregator together behind one small per-operation API.

use std::sync::Arc;
use std::time::Instant;

use futures_core::stream::BoxStream;
use serde_json::Value;

use crate::core::assembler::ContextAssembler;
use crate::core::error::GatewayError;
use crate::core::hooks::{HookChain, Hooks};
use crate::core::pipeline::Pipeline;
use crate::core::refresh::RefreshCoordinator;
use crate::core::registry::ModelCatalog;
use crate::core::selection::{ScoredModel, SelectionEngine};
use crate::core::stats::StatisticsAggregator;
use crate::provider::{
    ChatOps, EmbedOps, ImageEditOps, ImageGenerateOps, ModelSource, Provider, SpeechOps,
    TranscribeOps,
};
use crate::types::catalog::ModelInfo;
use crate::types::context::{ComposedOps, Metadata};
use crate::types::operations::{
    ChatChunk, ChatRequest, ChatResponse, EmbedRequest, EmbedResponse, ImageAnalyzeRequest,
    ImageAnalyzeResponse, ImageEditRequest, ImageGenerateRequest, ImageResponse, Operation,
    RequestMeta, SpeechRequest, SpeechResponse, TranscribeChunk, TranscribeRequest,
    TranscribeResponse,
};
use crate::types::predicate::SelectionPredicate;

/// Provider-agnostic AI gateway. Cheap to clone (every field is an `Arc` or
/// behind one); clones share the same catalog, stats, and registered
/// providers.
#[derive(Clone)]
pub struct Gateway {
    catalog: Arc<ModelCatalog>,
    refresh: Arc<tokio::sync::Mutex<RefreshCoordinator>>,
    hooks: Arc<Vec<Arc<dyn Hooks>>>,
    stats: Arc<StatisticsAggregator>,
    base_metadata: Metadata,
}

impl Gateway {
    pub fn new() -> Self {
        let catalog = Arc::new(ModelCatalog::new());
        Self {
            refresh: Arc::new(tokio::sync::Mutex::new(RefreshCoordinator::new(catalog.clone()))),
            stats: Arc::new(StatisticsAggregator::new(catalog.clone())),
            catalog,
            hooks: Arc::new(Vec::new()),
            base_metadata: Metadata::default(),
        }
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    pub fn stats(&self) -> &StatisticsAggregator {
        &self.stats
    }

    /// Registers a provider's dispatch implementation and its catalog source.
    /// The catalog itself owns the provider binding, so any model refreshed
    /// under this provider's name becomes dispatchable immediately.
    pub async fn register_provider(
        &self,
        provider: Arc<dyn Provider>,
        model_source: Arc<dyn ModelSource>,
    ) {
        self.catalog.register_provider_binding(provider.clone());
        self.refresh
            .lock()
            .await
            .register_source(provider, model_source);
    }

    pub async fn refresh_all(&self) {
        self.refresh.lock().await.refresh_all().await;
    }

    pub async fn set_overrides(&self, overrides: Vec<crate::types::predicate::ModelOverride>) {
        self.refresh.lock().await.set_overrides(overrides);
    }

    /// Returns every catalog model satisfying `predicate`, ranked best-first.
    pub fn search(&self, predicate: &SelectionPredicate) -> Vec<ScoredModel> {
        SelectionEngine::new(&self.catalog).search(predicate)
    }

    /// Returns the single best catalog model satisfying `predicate`.
    pub fn select(&self, predicate: &SelectionPredicate) -> Option<Arc<ModelInfo>> {
        SelectionEngine::new(&self.catalog).select(predicate)
    }

    /// Layers an additional hook onto a new `Gateway` sharing this one's
    /// catalog and statistics. Hooks fire in registration order, base hooks
    /// before extension hooks, so an extension observes every stage after
    /// the base gateway's own hooks have already run.
    pub fn extend(&self, hook: Arc<dyn Hooks>) -> Gateway {
        let mut hooks = (*self.hooks).clone();
        hooks.push(hook);
        Gateway {
            catalog: self.catalog.clone(),
            refresh: self.refresh.clone(),
            hooks: Arc::new(hooks),
            stats: self.stats.clone(),
            base_metadata: self.base_metadata.clone(),
        }
    }

    fn pipeline(&self) -> Pipeline {
        let mut chain = HookChain::new();
        for hook in self.hooks.iter() {
            chain.push(hook.clone());
        }
        Pipeline::new(self.catalog.clone(), chain)
    }

    fn assembler(&self) -> ContextAssembler {
        ContextAssembler::new(self.base_metadata.clone())
    }

    /// Widens a caller-supplied predicate with what the operation and the
    /// request itself imply: the operation's static capability requirement,
    /// any capability the request's payload derives (e.g. an image part
    /// implies vision), and a pinned model id from the request body when the
    /// predicate didn't already name one.
    fn augment_predicate<Req: RequestMeta>(
        &self,
        operation: Operation,
        predicate: &SelectionPredicate,
        request: &Req,
    ) -> SelectionPredicate {
        let mut augmented = predicate.clone();
        augmented
            .required_capabilities
            .extend(operation.static_capabilities());
        augmented
            .required_capabilities
            .extend(request.derived_capabilities());
        if augmented.model.is_none() {
            augmented.model = request.pinned_model().map(String::from);
        }
        augmented
    }

    fn resolver(&self, build_ops: impl Fn(Arc<dyn Provider>, String) -> Arc<dyn ComposedOps> + Send + Sync + 'static) -> impl Fn(&ModelInfo) -> Arc<dyn ComposedOps> + Send + Sync {
        let catalog = self.catalog.clone();
        move |model: &ModelInfo| -> Arc<dyn ComposedOps> {
            let provider = catalog
                .get_provider(&model.provider)
                .expect("catalog model references an unregistered provider");
            build_ops(provider, model.id.clone())
        }
    }

    async fn dispatch<Req, Resp>(
        &self,
        operation: Operation,
        predicate: &SelectionPredicate,
        request: Req,
        build_ops: impl Fn(Arc<dyn Provider>, String) -> Arc<dyn ComposedOps> + Send + Sync + 'static,
    ) -> Result<Resp, GatewayError>
    where
        Req: RequestMeta + serde::Serialize,
        Resp: serde::de::DeserializeOwned,
    {
        let predicate = self.augment_predicate(operation, predicate, &request);
        let assembler = self.assembler();
        let pipeline = self.pipeline();
        let resolver = self.resolver(build_ops);

        let payload = serde_json::to_value(&request).map_err(|e| GatewayError::ValidationFailed {
            message: format!("invalid request: {e}"),
            cause: None,
        })?;

        let started = Instant::now();
        let result = pipeline
            .execute(operation, &predicate, &assembler, &resolver, payload, None)
            .await;
        let latency = started.elapsed();

        match &result {
            Ok((_, usage, model)) => {
                self.stats.record_success(model, usage, latency);
            }
            Err(_) => {
                if let Some(pinned) = &predicate.model {
                    self.stats.record_error(pinned, latency);
                }
            }
        }

        let (response, _, _) = result?;
        serde_json::from_value(response).map_err(|e| GatewayError::ProviderError {
            message: format!("malformed provider response: {e}"),
            cause: Some(Box::new(e)),
        })
    }

    pub async fn chat(
        &self,
        predicate: &SelectionPredicate,
        request: ChatRequest,
    ) -> Result<ChatResponse, GatewayError> {
        self.dispatch(Operation::Chat, predicate, request, |provider, model_id| {
            Arc::new(ChatOps { provider, model_id })
        })
        .await
    }

    pub async fn embed(
        &self,
        predicate: &SelectionPredicate,
        request: EmbedRequest,
    ) -> Result<EmbedResponse, GatewayError> {
        self.dispatch(Operation::Embed, predicate, request, |provider, model_id| {
            Arc::new(EmbedOps { provider, model_id })
        })
        .await
    }

    pub async fn image_generate(
        &self,
        predicate: &SelectionPredicate,
        request: ImageGenerateRequest,
    ) -> Result<ImageResponse, GatewayError> {
        self.dispatch(Operation::ImageGenerate, predicate, request, |provider, model_id| {
            Arc::new(ImageGenerateOps { provider, model_id })
        })
        .await
    }

    pub async fn image_edit(
        &self,
        predicate: &SelectionPredicate,
        request: ImageEditRequest,
    ) -> Result<ImageResponse, GatewayError> {
        self.dispatch(Operation::ImageEdit, predicate, request, |provider, model_id| {
            Arc::new(ImageEditOps { provider, model_id })
        })
        .await
    }

    /// Image analysis dispatches as a chat call (the catalog's `{chat,
    /// vision}` capability mapping), so it reuses `ChatOps`.
    pub async fn image_analyze(
        &self,
        predicate: &SelectionPredicate,
        request: ImageAnalyzeRequest,
    ) -> Result<ImageAnalyzeResponse, GatewayError> {
        self.dispatch(Operation::ImageAnalyze, predicate, request, |provider, model_id| {
            Arc::new(ChatOps { provider, model_id })
        })
        .await
    }

    pub async fn speech(
        &self,
        predicate: &SelectionPredicate,
        request: SpeechRequest,
    ) -> Result<SpeechResponse, GatewayError> {
        self.dispatch(Operation::Speech, predicate, request, |provider, model_id| {
            Arc::new(SpeechOps { provider, model_id })
        })
        .await
    }

    pub async fn transcribe(
        &self,
        predicate: &SelectionPredicate,
        request: TranscribeRequest,
    ) -> Result<TranscribeResponse, GatewayError> {
        self.dispatch(Operation::Transcribe, predicate, request, |provider, model_id| {
            Arc::new(TranscribeOps { provider, model_id })
        })
        .await
    }

    /// Streams a chat response, returning the ranked-ordered raw chunks and
    /// the fully-accumulated usage once the stream completes.
    pub async fn chat_stream(
        &self,
        predicate: &SelectionPredicate,
        request: ChatRequest,
    ) -> Result<(Vec<ChatChunk>, crate::types::usage::Usage), GatewayError> {
        let predicate = self.augment_predicate(Operation::Chat, predicate, &request);
        let assembler = self.assembler();
        let pipeline = self.pipeline();
        let resolver = self.resolver(|provider, model_id| Arc::new(ChatOps { provider, model_id }));

        let payload = serde_json::to_value(&request).map_err(|e| GatewayError::ValidationFailed {
            message: format!("invalid request: {e}"),
            cause: None,
        })?;

        let started = Instant::now();
        let result = pipeline
            .execute_stream(Operation::Chat, &predicate, &assembler, &resolver, payload, None)
            .await;
        let latency = started.elapsed();

        match &result {
            Ok((_, usage, model)) => self.stats.record_success(model, usage, latency),
            Err(_) => {
                if let Some(pinned) = &predicate.model {
                    self.stats.record_error(pinned, latency);
                }
            }
        }

        let (raw_chunks, usage, _) = result?;
        let chunks = raw_chunks
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<ChatChunk>, _>>()
            .map_err(|e| GatewayError::ProviderError {
                message: format!("malformed stream chunk: {e}"),
                cause: Some(Box::new(e)),
            })?;

        Ok((chunks, usage))
    }

    pub async fn transcribe_stream(
        &self,
        predicate: &SelectionPredicate,
        request: TranscribeRequest,
    ) -> Result<(Vec<TranscribeChunk>, crate::types::usage::Usage), GatewayError> {
        let predicate = self.augment_predicate(Operation::Transcribe, predicate, &request);
        let assembler = self.assembler();
        let pipeline = self.pipeline();
        let resolver = self.resolver(|provider, model_id| Arc::new(TranscribeOps { provider, model_id }));

        let payload = serde_json::to_value(&request).map_err(|e| GatewayError::ValidationFailed {
            message: format!("invalid request: {e}"),
            cause: None,
        })?;

        let started = Instant::now();
        let result = pipeline
            .execute_stream(
                Operation::Transcribe,
                &predicate,
                &assembler,
                &resolver,
                payload,
                None,
            )
            .await;
        let latency = started.elapsed();

        match &result {
            Ok((_, usage, model)) => self.stats.record_success(model, usage, latency),
            Err(_) => {
                if let Some(pinned) = &predicate.model {
                    self.stats.record_error(pinned, latency);
                }
            }
        }

        let (raw_chunks, usage, _) = result?;
        let chunks = raw_chunks
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<TranscribeChunk>, _>>()
            .map_err(|e| GatewayError::ProviderError {
                message: format!("malformed stream chunk: {e}"),
                cause: Some(Box::new(e)),
            })?;

        Ok((chunks, usage))
    }
}

impl Default for Gateway {
    fn default() -> Self {
        Self::new()
    }
}

// `BoxStream` is re-exported for downstream crates building custom
// `ModelSource`/`Provider` impls that need to name the stream type.
pub type ProviderChunkStream<T> = BoxStream<'static, Result<T, GatewayError>>;
