//! Adapts a `Provider`'s typed dispatch methods to the JSON-level
//! `ComposedOps` seam the pipeline runs against, one adapter per operation
//! family. The gateway facade binds one of these per candidate model.

use std::sync::Arc;

use async_trait::async_trait;
use futures_core::stream::BoxStream;
use futures_util::StreamExt;
use serde_json::Value;

use crate::core::error::GatewayError;
use crate::types::context::{CancelSignal, ComposedOps};
use crate::types::operations::{
    ChatRequest, EmbedRequest, EmbedResponse, ImageEditRequest, ImageGenerateRequest,
    ImageResponse, SpeechRequest, SpeechResponse, TranscribeRequest,
};
use crate::types::usage::Usage;

use super::traits::Provider;

fn decode<T: serde::de::DeserializeOwned>(request: Value) -> Result<T, GatewayError> {
    serde_json::from_value(request).map_err(|e| GatewayError::ValidationFailed {
        message: format!("malformed request: {e}"),
        cause: None,
    })
}

fn encode<T: serde::Serialize>(response: &T) -> Result<Value, GatewayError> {
    serde_json::to_value(response).map_err(|e| {
        GatewayError::ProviderError {
            message: format!("failed to encode response: {e}"),
            cause: Some(Box::new(e)),
        }
    })
}

macro_rules! composed_ops_impl {
    ($name:ident, $req_ty:ty, $resp_ty:ty, $dispatch:ident) => {
        pub struct $name {
            pub provider: Arc<dyn Provider>,
            pub model_id: String,
        }

        #[async_trait]
        impl ComposedOps for $name {
            async fn execute(
                &self,
                request: Value,
                cancel: CancelSignal,
            ) -> Result<(Value, Usage), GatewayError> {
                let request: $req_ty = decode(request)?;
                let mut response = self.provider.$dispatch(&self.model_id, request, cancel).await?;
                response.model = Some(self.model_id.clone());
                let usage = response.usage.clone();
                Ok((encode(&response)?, usage))
            }

            fn stream(
                &self,
                _request: Value,
                _cancel: CancelSignal,
            ) -> BoxStream<'static, Result<(Value, Option<Usage>), GatewayError>> {
                Box::pin(futures_util::stream::once(async {
                    Err(GatewayError::DispatchUnsupported {
                        operation: stringify!($dispatch),
                    })
                }))
            }

            async fn estimate_usage(&self, _request: &Value) -> Option<Usage> {
                None
            }
        }
    };
}

composed_ops_impl!(EmbedOps, EmbedRequest, EmbedResponse, embed);
composed_ops_impl!(ImageGenerateOps, ImageGenerateRequest, ImageResponse, image_generate);
composed_ops_impl!(ImageEditOps, ImageEditRequest, ImageResponse, image_edit);
composed_ops_impl!(SpeechOps, SpeechRequest, SpeechResponse, speech);

/// Chat needs its own impl (not the macro) because it's the one family that
/// actually streams.
pub struct ChatOps {
    pub provider: Arc<dyn Provider>,
    pub model_id: String,
}

#[async_trait]
impl ComposedOps for ChatOps {
    async fn execute(
        &self,
        request: Value,
        cancel: CancelSignal,
    ) -> Result<(Value, Usage), GatewayError> {
        let request: ChatRequest = decode(request)?;
        let mut response = self.provider.chat(&self.model_id, request, cancel).await?;
        response.model = Some(self.model_id.clone());
        let usage = response.usage.clone();
        Ok((encode(&response)?, usage))
    }

    fn stream(
        &self,
        request: Value,
        cancel: CancelSignal,
    ) -> BoxStream<'static, Result<(Value, Option<Usage>), GatewayError>> {
        let request: ChatRequest = match decode(request) {
            Ok(r) => r,
            Err(e) => return Box::pin(futures_util::stream::once(async move { Err(e) })),
        };
        let inner = self.provider.chat_stream(&self.model_id, request, cancel);
        Box::pin(inner.map(|item| {
            item.and_then(|chunk| {
                let usage = chunk.usage.clone();
                encode(&chunk).map(|v| (v, usage))
            })
        }))
    }

    async fn estimate_usage(&self, request: &Value) -> Option<Usage> {
        let request: ChatRequest = serde_json::from_value(request.clone()).ok()?;
        Some(crate::core::estimate::TokenEstimator::estimate_chat_input(&request))
    }
}

/// Transcribe also streams, so it gets its own impl.
pub struct TranscribeOps {
    pub provider: Arc<dyn Provider>,
    pub model_id: String,
}

#[async_trait]
impl ComposedOps for TranscribeOps {
    async fn execute(
        &self,
        request: Value,
        cancel: CancelSignal,
    ) -> Result<(Value, Usage), GatewayError> {
        let request: TranscribeRequest = decode(request)?;
        let mut response = self
            .provider
            .transcribe(&self.model_id, request, cancel)
            .await?;
        response.model = Some(self.model_id.clone());
        let usage = response.usage.clone();
        Ok((encode(&response)?, usage))
    }

    fn stream(
        &self,
        request: Value,
        cancel: CancelSignal,
    ) -> BoxStream<'static, Result<(Value, Option<Usage>), GatewayError>> {
        let request: TranscribeRequest = match decode(request) {
            Ok(r) => r,
            Err(e) => return Box::pin(futures_util::stream::once(async move { Err(e) })),
        };
        let inner = self
            .provider
            .transcribe_stream(&self.model_id, request, cancel);
        Box::pin(inner.map(|item| {
            item.and_then(|chunk| {
                let usage = chunk.usage.clone();
                encode(&chunk).map(|v| (v, usage))
            })
        }))
    }

    async fn estimate_usage(&self, _request: &Value) -> Option<Usage> {
        None
    }
}
