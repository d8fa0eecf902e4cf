//! The `Provider` trait: the seam between the gateway core and concrete
//! provider integrations (HTTP clients, SDKs, local runtimes), none of which
//! live in this crate (see SPEC_FULL.md §1 scope).

use async_trait::async_trait;
use futures_core::stream::BoxStream;

use crate::core::error::GatewayError;
use crate::types::capability::Capability;
use crate::types::context::CancelSignal;
use crate::types::operations::{
    ChatChunk, ChatRequest, ChatResponse, EmbedRequest, EmbedResponse, ImageEditRequest,
    ImageGenerateRequest, ImageResponse, SpeechRequest, SpeechResponse, TranscribeChunk,
    TranscribeRequest, TranscribeResponse,
};

/// A concrete backend capable of serving zero or more operation families for
/// zero or more models. Capability advertisement is boolean and per-family;
/// `CapabilityDetector` probes these to build each model's effective
/// `Capability` set (plus model-level-only tags it cannot probe for, like
/// `Vision`/`Tools`, which come from the catalog entry itself).
///
/// Every dispatch method defaults to `DispatchUnsupported`, so a provider
/// implementing only `chat` needn't stub out the rest.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    fn supports_chat(&self) -> bool {
        false
    }
    fn supports_chat_streaming(&self) -> bool {
        false
    }
    fn supports_embed(&self) -> bool {
        false
    }
    fn supports_image_generate(&self) -> bool {
        false
    }
    fn supports_image_edit(&self) -> bool {
        false
    }
    fn supports_speech(&self) -> bool {
        false
    }
    fn supports_transcribe(&self) -> bool {
        false
    }
    fn supports_transcribe_streaming(&self) -> bool {
        false
    }

    async fn chat(
        &self,
        _model: &str,
        _request: ChatRequest,
        _cancel: CancelSignal,
    ) -> Result<ChatResponse, GatewayError> {
        Err(GatewayError::DispatchUnsupported { operation: "chat" })
    }

    fn chat_stream(
        &self,
        _model: &str,
        _request: ChatRequest,
        _cancel: CancelSignal,
    ) -> BoxStream<'static, Result<ChatChunk, GatewayError>> {
        Box::pin(futures_util::stream::once(async {
            Err(GatewayError::DispatchUnsupported {
                operation: "chat-stream",
            })
        }))
    }

    async fn embed(
        &self,
        _model: &str,
        _request: EmbedRequest,
        _cancel: CancelSignal,
    ) -> Result<EmbedResponse, GatewayError> {
        Err(GatewayError::DispatchUnsupported { operation: "embed" })
    }

    async fn image_generate(
        &self,
        _model: &str,
        _request: ImageGenerateRequest,
        _cancel: CancelSignal,
    ) -> Result<ImageResponse, GatewayError> {
        Err(GatewayError::DispatchUnsupported {
            operation: "image-generate",
        })
    }

    async fn image_edit(
        &self,
        _model: &str,
        _request: ImageEditRequest,
        _cancel: CancelSignal,
    ) -> Result<ImageResponse, GatewayError> {
        Err(GatewayError::DispatchUnsupported {
            operation: "image-edit",
        })
    }

    async fn speech(
        &self,
        _model: &str,
        _request: SpeechRequest,
        _cancel: CancelSignal,
    ) -> Result<SpeechResponse, GatewayError> {
        Err(GatewayError::DispatchUnsupported {
            operation: "speech",
        })
    }

    async fn transcribe(
        &self,
        _model: &str,
        _request: TranscribeRequest,
        _cancel: CancelSignal,
    ) -> Result<TranscribeResponse, GatewayError> {
        Err(GatewayError::DispatchUnsupported {
            operation: "transcribe",
        })
    }

    fn transcribe_stream(
        &self,
        _model: &str,
        _request: TranscribeRequest,
        _cancel: CancelSignal,
    ) -> BoxStream<'static, Result<TranscribeChunk, GatewayError>> {
        Box::pin(futures_util::stream::once(async {
            Err(GatewayError::DispatchUnsupported {
                operation: "transcribe-stream",
            })
        }))
    }
}

/// Families a `Provider` can advertise support for, used by
/// `CapabilityDetector` to build the base `Capability` set before
/// model-level-only tags are layered on.
pub const PROBED_CAPABILITIES: &[(Capability, fn(&dyn Provider) -> bool)] = &[
    (Capability::Chat, |p| p.supports_chat()),
    (Capability::Streaming, |p| p.supports_chat_streaming()),
    (Capability::Embedding, |p| p.supports_embed()),
    (Capability::Image, |p| {
        p.supports_image_generate() || p.supports_image_edit()
    }),
    (Capability::Audio, |p| p.supports_speech()),
    (Capability::Hearing, |p| p.supports_transcribe()),
];

/// Supplies catalog entries to the refresh coordinator: either a static
/// list or a live query against the provider's own listing endpoint.
#[async_trait]
pub trait ModelSource: Send + Sync {
    async fn list_models(&self) -> Result<Vec<crate::types::catalog::ModelInfo>, GatewayError>;
}
