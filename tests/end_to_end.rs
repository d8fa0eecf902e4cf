use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures_core::stream::BoxStream;

use ai_gateway_core::core::error::GatewayError;
use ai_gateway_core::core::hooks::Hooks;
use ai_gateway_core::core::{Gateway, ModelHandler};
use ai_gateway_core::provider::{ModelSource, Provider};
use ai_gateway_core::types::capability::{Capability, Tier};
use ai_gateway_core::types::catalog::{Metrics, ModelInfo, PriceBand, Pricing};
use ai_gateway_core::types::context::{CancelSignal, ComposedOps};
use ai_gateway_core::types::operations::{
    ChatChunk, ChatMessage, ChatRequest, ChatResponse, ContentPart, FinishReason, Operation, Role,
};
use ai_gateway_core::types::predicate::{Budget, SelectionPredicate};
use ai_gateway_core::types::usage::{TextUsage, Usage};

fn stub_model(provider: &str, id: &str, price_per_input_token: f64) -> ModelInfo {
    ModelInfo {
        id: id.into(),
        provider: provider.into(),
        display_name: id.into(),
        tier: Tier::Flagship,
        capabilities: HashSet::new(),
        parameters: BTreeMap::new(),
        context_window: 8192,
        max_output_tokens: None,
        pricing: Pricing {
            input: Some(PriceBand::new(price_per_input_token)),
            output: Some(PriceBand::new(price_per_input_token * 2.0)),
            ..Default::default()
        },
        metrics: Metrics::default(),
        registration_seq: 0,
    }
}

struct StaticSource(Vec<ModelInfo>);

#[async_trait]
impl ModelSource for StaticSource {
    async fn list_models(&self) -> Result<Vec<ModelInfo>, GatewayError> {
        Ok(self.0.clone())
    }
}

/// A provider that answers chat deterministically and never streams.
struct EchoProvider {
    name: String,
}

#[async_trait]
impl Provider for EchoProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports_chat(&self) -> bool {
        true
    }

    async fn chat(
        &self,
        _model: &str,
        request: ChatRequest,
        _cancel: CancelSignal,
    ) -> Result<ChatResponse, GatewayError> {
        let input_tokens = request
            .messages
            .iter()
            .flat_map(|m| &m.content)
            .map(|p| match p {
                ContentPart::Text { text } => text.len() as u64 / 4,
                _ => 0,
            })
            .sum();

        Ok(ChatResponse {
            message: ChatMessage {
                role: Role::Assistant,
                content: vec![ContentPart::Text {
                    text: "hello from echo provider".into(),
                }],
                tokens: None,
            },
            finish_reason: FinishReason::Stop,
            usage: Usage::from_text(TextUsage {
                input_tokens,
                output_tokens: 5,
                ..Default::default()
            }),
            model: None,
        })
    }
}

/// A provider that advertises chat (so its model clears capability
/// filtering) but whose `chat` dispatch always fails as unsupported, used to
/// exercise the single-model dispatch ladder end to end.
struct UnsupportedProvider {
    name: String,
}

#[async_trait]
impl Provider for UnsupportedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports_chat(&self) -> bool {
        true
    }
}

/// A chat streaming provider yielding two chunks, the second carrying the
/// cumulative usage snapshot.
struct StreamingProvider;

#[async_trait]
impl Provider for StreamingProvider {
    fn name(&self) -> &str {
        "streaming"
    }

    fn supports_chat(&self) -> bool {
        true
    }

    fn supports_chat_streaming(&self) -> bool {
        true
    }

    fn chat_stream(
        &self,
        _model: &str,
        _request: ChatRequest,
        _cancel: CancelSignal,
    ) -> BoxStream<'static, Result<ChatChunk, GatewayError>> {
        let chunks = vec![
            Ok(ChatChunk {
                delta: Some(ContentPart::Text { text: "hel".into() }),
                finish_reason: None,
                usage: Some(Usage::from_text(TextUsage {
                    input_tokens: 10,
                    output_tokens: 1,
                    ..Default::default()
                })),
            }),
            Ok(ChatChunk {
                delta: Some(ContentPart::Text { text: "lo".into() }),
                finish_reason: Some(FinishReason::Stop),
                usage: Some(Usage::from_text(TextUsage {
                    input_tokens: 10,
                    output_tokens: 2,
                    ..Default::default()
                })),
            }),
        ];
        Box::pin(futures_util::stream::iter(chunks))
    }
}

/// A per-model dispatch override that never serves chat, used to prove the
/// ladder falls through to the provider rather than stopping at a
/// registered handler that can't help.
struct UnsupportedHandler;

impl ModelHandler for UnsupportedHandler {
    fn ops_for(&self, _operation: Operation) -> Option<Arc<dyn ComposedOps>> {
        None
    }
}

fn chat_request(text: &str) -> ChatRequest {
    ChatRequest {
        messages: vec![ChatMessage {
            role: Role::User,
            content: vec![ContentPart::Text { text: text.into() }],
            tokens: None,
        }],
        ..Default::default()
    }
}

#[tokio::test]
async fn end_to_end_chat_dispatch_succeeds() {
    let gateway = Gateway::new();
    let provider = Arc::new(EchoProvider {
        name: "echo".into(),
    });
    gateway
        .register_provider(
            provider,
            Arc::new(StaticSource(vec![stub_model("echo", "echo-1", 0.0001)])),
        )
        .await;
    gateway.refresh_all().await;

    let predicate = SelectionPredicate {
        required_capabilities: HashSet::from([Capability::Chat]),
        ..Default::default()
    };

    let response = gateway.chat(&predicate, chat_request("hi there")).await.unwrap();
    assert_eq!(response.finish_reason, FinishReason::Stop);
    assert_eq!(response.usage.text.unwrap().output_tokens, 5);
}

#[tokio::test]
async fn pinned_model_request_field_bypasses_selection() {
    let gateway = Gateway::new();
    gateway
        .register_provider(
            Arc::new(EchoProvider { name: "echo".into() }),
            Arc::new(StaticSource(vec![
                stub_model("echo", "cheap", 0.0001),
                stub_model("echo", "pricey", 10.0),
            ])),
        )
        .await;
    gateway.refresh_all().await;

    let mut request = chat_request("hi");
    request.model = Some("pricey".into());

    let response = gateway
        .chat(&SelectionPredicate::default(), request)
        .await
        .unwrap();
    assert_eq!(response.finish_reason, FinishReason::Stop);
}

#[tokio::test]
async fn handler_unsupported_for_operation_falls_back_to_the_models_own_provider() {
    let gateway = Gateway::new();
    gateway
        .register_provider(
            Arc::new(EchoProvider { name: "echo".into() }),
            Arc::new(StaticSource(vec![stub_model("echo", "echo-1", 0.0001)])),
        )
        .await;
    gateway.refresh_all().await;
    gateway
        .catalog()
        .register_handler("echo/echo-1", Arc::new(UnsupportedHandler));

    let predicate = SelectionPredicate {
        required_capabilities: HashSet::from([Capability::Chat]),
        ..Default::default()
    };

    let response = gateway.chat(&predicate, chat_request("hi")).await.unwrap();
    assert_eq!(response.finish_reason, FinishReason::Stop);
}

#[tokio::test]
async fn dispatch_unsupported_when_the_selected_models_provider_cannot_serve_the_operation() {
    let gateway = Gateway::new();
    gateway
        .register_provider(
            Arc::new(UnsupportedProvider {
                name: "unsupported".into(),
            }),
            Arc::new(StaticSource(vec![stub_model("unsupported", "u-1", 0.0001)])),
        )
        .await;
    gateway.refresh_all().await;

    let predicate = SelectionPredicate {
        required_capabilities: HashSet::from([Capability::Chat]),
        ..Default::default()
    };

    let result = gateway.chat(&predicate, chat_request("hi")).await;
    assert!(matches!(
        result,
        Err(GatewayError::DispatchUnsupported { .. })
    ));
}

#[tokio::test]
async fn no_model_found_when_catalog_has_no_matching_candidates() {
    let gateway = Gateway::new();
    gateway.refresh_all().await;

    let predicate = SelectionPredicate {
        required_capabilities: HashSet::from([Capability::Chat]),
        ..Default::default()
    };

    let result = gateway.chat(&predicate, chat_request("hi")).await;
    assert!(matches!(result, Err(GatewayError::NoModelFound { .. })));
}

#[tokio::test]
async fn budget_rejects_models_priced_above_the_ceiling() {
    let gateway = Gateway::new();
    gateway
        .register_provider(
            Arc::new(EchoProvider { name: "echo".into() }),
            Arc::new(StaticSource(vec![stub_model("echo", "expensive", 1.0)])),
        )
        .await;
    gateway.refresh_all().await;

    let predicate = SelectionPredicate {
        required_capabilities: HashSet::from([Capability::Chat]),
        budget: Some(Budget {
            max_cost_usd: 0.0000001,
        }),
        ..Default::default()
    };

    let result = gateway.chat(&predicate, chat_request("a longer message to price")).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn streaming_usage_accumulates_last_cumulative_snapshot() {
    let gateway = Gateway::new();
    gateway
        .register_provider(
            Arc::new(StreamingProvider),
            Arc::new(StaticSource(vec![stub_model("streaming", "s-1", 0.0001)])),
        )
        .await;
    gateway.refresh_all().await;

    let predicate = SelectionPredicate {
        required_capabilities: HashSet::from([Capability::Streaming]),
        ..Default::default()
    };

    let (chunks, usage) = gateway.chat_stream(&predicate, chat_request("hi")).await.unwrap();
    assert_eq!(chunks.len(), 2);
    let text = usage.text.unwrap();
    assert_eq!(text.output_tokens, 2, "last chunk's cumulative usage should win, not the sum");
}

struct CountingHook(Arc<AtomicUsize>);

#[async_trait]
impl Hooks for CountingHook {
    async fn after_request(
        &self,
        _metadata: &ai_gateway_core::types::context::Metadata,
        _model: &Arc<ModelInfo>,
        _usage: &Usage,
        _cost: f64,
    ) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn extend_preserves_base_hooks_and_adds_new_ones() {
    let base_calls = Arc::new(AtomicUsize::new(0));
    let extension_calls = Arc::new(AtomicUsize::new(0));

    let base = Gateway::new();
    let base = base.extend(Arc::new(CountingHook(base_calls.clone())));
    let extended = base.extend(Arc::new(CountingHook(extension_calls.clone())));

    extended
        .register_provider(
            Arc::new(EchoProvider { name: "echo".into() }),
            Arc::new(StaticSource(vec![stub_model("echo", "echo-1", 0.0001)])),
        )
        .await;
    extended.refresh_all().await;

    let predicate = SelectionPredicate {
        required_capabilities: HashSet::from([Capability::Chat]),
        ..Default::default()
    };
    extended.chat(&predicate, chat_request("hi")).await.unwrap();

    assert_eq!(base_calls.load(Ordering::SeqCst), 1);
    assert_eq!(extension_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn search_and_select_agree_and_deny_list_excludes_providers() {
    let gateway = Gateway::new();
    gateway
        .register_provider(
            Arc::new(EchoProvider { name: "a".into() }),
            Arc::new(StaticSource(vec![stub_model("a", "m1", 0.001)])),
        )
        .await;
    gateway
        .register_provider(
            Arc::new(EchoProvider { name: "b".into() }),
            Arc::new(StaticSource(vec![stub_model("b", "m2", 0.002)])),
        )
        .await;
    gateway.refresh_all().await;

    let mut predicate = SelectionPredicate {
        required_capabilities: HashSet::from([Capability::Chat]),
        ..Default::default()
    };
    predicate.providers.excluded.insert("a".into());

    let results = gateway.search(&predicate);
    assert!(results.iter().all(|r| r.model.provider != "a"));

    let selected = gateway.select(&predicate).unwrap();
    assert_eq!(selected.provider, "b");
}

#[tokio::test]
async fn stats_are_recorded_against_the_dispatched_model() {
    let gateway = Gateway::new();
    gateway
        .register_provider(
            Arc::new(EchoProvider { name: "echo".into() }),
            Arc::new(StaticSource(vec![stub_model("echo", "echo-1", 0.0001)])),
        )
        .await;
    gateway.refresh_all().await;

    let predicate = SelectionPredicate {
        required_capabilities: HashSet::from([Capability::Chat]),
        ..Default::default()
    };
    gateway.chat(&predicate, chat_request("hi")).await.unwrap();

    let snapshot = gateway.stats().snapshot("echo/echo-1");
    assert_eq!(snapshot.requests, 1);
    assert_eq!(snapshot.errors, 0);
}
