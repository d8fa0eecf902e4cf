//! Per-operation-family request/response/chunk types.
//!
//! Each family (chat, embed, image, speech, transcribe) gets its own request
//! and response shape; only `chat` and `transcribe` also get a streaming
//! chunk shape, matching what the `Provider` trait actually dispatches.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::capability::Capability;
use super::usage::Usage;

/// Speaker role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// One piece of a (possibly multi-modal) chat message. Distinguishing
/// variants lets `TokenEstimator` apply a different heuristic per part
/// (§5.5): plain text is counted directly, images/audio use a
/// divisor-based estimate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { url: String },
    AudioUrl { url: String },
    ToolCall { id: String, name: String, arguments: Value },
    ToolResult { tool_call_id: String, result: Value },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: Vec<ContentPart>,
    /// Caller-supplied token count for this message, overriding the
    /// heuristic estimate `TokenEstimator` would otherwise compute for it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Criteria an operation request can contribute to model selection beyond
/// its static, operation-level capability set: capabilities implied by the
/// payload's actual content, and an optional pinned model id.
pub trait RequestMeta {
    fn derived_capabilities(&self) -> HashSet<Capability> {
        HashSet::new()
    }

    fn pinned_model(&self) -> Option<&str> {
        None
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolSpec>,
    #[serde(default)]
    pub json_mode: bool,
    #[serde(default)]
    pub structured_output: bool,
    #[serde(default)]
    pub reasoning: bool,
    #[serde(default)]
    pub stream: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl RequestMeta for ChatRequest {
    fn derived_capabilities(&self) -> HashSet<Capability> {
        let mut caps = HashSet::new();
        for message in &self.messages {
            for part in &message.content {
                match part {
                    ContentPart::ImageUrl { .. } => {
                        caps.insert(Capability::Vision);
                    }
                    ContentPart::AudioUrl { .. } => {
                        caps.insert(Capability::Hearing);
                    }
                    ContentPart::Text { .. } | ContentPart::ToolCall { .. } | ContentPart::ToolResult { .. } => {}
                }
            }
        }
        if self.reasoning {
            caps.insert(Capability::Reasoning);
        }
        if self.json_mode {
            caps.insert(Capability::Json);
        }
        if self.structured_output {
            caps.insert(Capability::Structured);
        }
        if !self.tools.is_empty() {
            caps.insert(Capability::Tools);
        }
        caps
    }

    fn pinned_model(&self) -> Option<&str> {
        self.model.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    Cancelled,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub message: ChatMessage,
    pub finish_reason: FinishReason,
    pub usage: Usage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// One incremental chunk of a streamed chat response. `usage` is only
/// populated on chunks where the provider includes a cumulative usage
/// snapshot (see `Usage::accumulate`). Chunks don't carry `model`; only the
/// final assembled response does.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatChunk {
    #[serde(default)]
    pub delta: Option<ContentPart>,
    #[serde(default)]
    pub finish_reason: Option<FinishReason>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedRequest {
    pub input: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl RequestMeta for EmbedRequest {
    fn pinned_model(&self) -> Option<&str> {
        self.model.as_deref()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedResponse {
    pub embeddings: Vec<Vec<f32>>,
    pub usage: Usage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageGenerateRequest {
    pub prompt: String,
    pub size: String,
    pub quality: String,
    #[serde(default = "default_image_count")]
    pub n: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl RequestMeta for ImageGenerateRequest {
    fn pinned_model(&self) -> Option<&str> {
        self.model.as_deref()
    }
}

fn default_image_count() -> u64 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageEditRequest {
    pub prompt: String,
    pub image: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mask: Option<Value>,
    pub size: String,
    pub quality: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl RequestMeta for ImageEditRequest {
    fn pinned_model(&self) -> Option<&str> {
        self.model.as_deref()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageResponse {
    pub images: Vec<Value>,
    pub usage: Usage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Image analysis reuses the chat request/response shapes, matching the
/// `{chat, vision}` capability mapping in the model data model: an
/// analyze call is a chat call whose content includes an `ImageUrl` part.
pub type ImageAnalyzeRequest = ChatRequest;
pub type ImageAnalyzeResponse = ChatResponse;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechRequest {
    pub text: String,
    pub voice: String,
    pub format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl RequestMeta for SpeechRequest {
    fn pinned_model(&self) -> Option<&str> {
        self.model.as_deref()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechResponse {
    pub audio: Vec<u8>,
    pub usage: Usage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscribeRequest {
    pub audio: Vec<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl RequestMeta for TranscribeRequest {
    fn pinned_model(&self) -> Option<&str> {
        self.model.as_deref()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscribeResponse {
    pub text: String,
    pub usage: Usage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranscribeChunk {
    #[serde(default)]
    pub delta: Option<String>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

/// Enumerates the operation families the pipeline and selection engine
/// reason about generically (logging tags, capability requirements).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Chat,
    Embed,
    ImageGenerate,
    ImageEdit,
    ImageAnalyze,
    Speech,
    Transcribe,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Chat => "chat",
            Operation::Embed => "embed",
            Operation::ImageGenerate => "image-generate",
            Operation::ImageEdit => "image-edit",
            Operation::ImageAnalyze => "image-analyze",
            Operation::Speech => "speech",
            Operation::Transcribe => "transcribe",
        }
    }

    pub fn supports_streaming(&self) -> bool {
        matches!(self, Operation::Chat | Operation::Transcribe)
    }

    /// The capability set every request of this operation family requires,
    /// regardless of payload. Combined with a request's own
    /// `RequestMeta::derived_capabilities` before selection.
    pub fn static_capabilities(&self) -> HashSet<Capability> {
        match self {
            Operation::Chat => HashSet::from([Capability::Chat]),
            Operation::Embed => HashSet::from([Capability::Embedding]),
            Operation::ImageGenerate | Operation::ImageEdit => HashSet::from([Capability::Image]),
            Operation::ImageAnalyze => HashSet::from([Capability::Chat, Capability::Vision]),
            Operation::Speech => HashSet::from([Capability::Audio]),
            Operation::Transcribe => HashSet::from([Capability::Hearing]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_capabilities_detect_vision_and_tools_from_payload() {
        let request = ChatRequest {
            messages: vec![ChatMessage {
                role: Role::User,
                content: vec![ContentPart::ImageUrl {
                    url: "https://example.com/a.png".into(),
                }],
                tokens: None,
            }],
            tools: vec![ToolSpec {
                name: "lookup".into(),
                description: "".into(),
                parameters: Value::Null,
            }],
            ..Default::default()
        };

        let derived = request.derived_capabilities();
        assert!(derived.contains(&Capability::Vision));
        assert!(derived.contains(&Capability::Tools));
    }

    #[test]
    fn pinned_model_is_read_from_request_field() {
        let request = ChatRequest {
            model: Some("gpt-4".into()),
            ..Default::default()
        };
        assert_eq!(request.pinned_model(), Some("gpt-4"));
    }

    #[test]
    fn embed_request_has_no_derived_capabilities_by_default() {
        let request = EmbedRequest {
            input: vec!["hello".into()],
            model: None,
        };
        assert!(request.derived_capabilities().is_empty());
        assert_eq!(request.pinned_model(), None);
    }
}
