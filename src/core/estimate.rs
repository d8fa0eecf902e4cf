//! Token estimator (C5): a provider-agnostic, pre-dispatch guess at request
//! size, used for budget enforcement before a model is ever called.
//!
//! Returns a full `Usage` split across modalities rather than a flat count,
//! so the budget check and `Hooks::before_request` can reason about the same
//! shape `CostCalculator` prices.

use crate::types::operations::{ChatRequest, ContentPart, Role};
use crate::types::usage::{AudioUsage, TextUsage, Usage};

/// Per-modality character-to-token divisors, keyed by how the content was
/// encoded. `cap` bounds the estimate for modalities (like images) whose
/// provider-side token cost saturates rather than growing with payload
/// size.
struct ModalityDivisors {
    plain_chars_per_unit: f64,
    base64_chars_per_unit: f64,
    fallback_chars_per_unit: f64,
    cap: Option<u64>,
}

const TEXT: ModalityDivisors = ModalityDivisors {
    plain_chars_per_unit: 4.0,
    base64_chars_per_unit: 3.0,
    fallback_chars_per_unit: 1000.0,
    cap: None,
};

const IMAGE: ModalityDivisors = ModalityDivisors {
    plain_chars_per_unit: 1125.0,
    base64_chars_per_unit: 1500.0,
    fallback_chars_per_unit: 1360.0,
    cap: Some(1360),
};

const AUDIO: ModalityDivisors = ModalityDivisors {
    plain_chars_per_unit: 3.0,
    base64_chars_per_unit: 4.0,
    fallback_chars_per_unit: 200.0,
    cap: None,
};

const TOOL_SPEC_OVERHEAD_TOKENS: u64 = 20;
const ROLE_OVERHEAD_TOKENS: u64 = 4;

pub struct TokenEstimator;

impl TokenEstimator {
    /// Estimated input usage for a chat request, split across text and
    /// audio input tokens. Monotonically increasing in message count,
    /// content length, and attachment count (the testable property from
    /// §9: adding any content never decreases the estimate), except for a
    /// message whose `tokens` field overrides the heuristic entirely.
    pub fn estimate_chat_input(request: &ChatRequest) -> Usage {
        let mut text_tokens = 0u64;
        let mut audio_tokens = 0u64;

        for message in &request.messages {
            if let Some(override_tokens) = message.tokens {
                text_tokens += override_tokens;
                continue;
            }
            text_tokens += ROLE_OVERHEAD_TOKENS + role_overhead(message.role);
            for part in &message.content {
                match part {
                    ContentPart::Text { text } => {
                        text_tokens += estimate_chars(text, &TEXT);
                    }
                    ContentPart::ImageUrl { url } => {
                        text_tokens += estimate_uri(url, &IMAGE);
                    }
                    ContentPart::AudioUrl { url } => {
                        audio_tokens += estimate_uri(url, &AUDIO);
                    }
                    ContentPart::ToolCall { arguments, .. } => {
                        text_tokens += estimate_chars(&arguments.to_string(), &TEXT);
                    }
                    ContentPart::ToolResult { result, .. } => {
                        text_tokens += estimate_chars(&result.to_string(), &TEXT);
                    }
                }
            }
        }
        text_tokens += request.tools.len() as u64 * TOOL_SPEC_OVERHEAD_TOKENS;

        let mut usage = Usage::from_text(TextUsage {
            input_tokens: text_tokens,
            ..Default::default()
        });
        if audio_tokens > 0 {
            usage.audio = Some(AudioUsage {
                input_tokens: audio_tokens,
                ..Default::default()
            });
        }
        usage
    }
}

fn role_overhead(role: Role) -> u64 {
    match role {
        Role::Tool => 2,
        _ => 0,
    }
}

/// Classifies a URI by how its content is actually encoded: a `data:` URI
/// is base64 (or close enough to price as such), an `http(s)://` URI (or
/// anything else unrecognized) falls back to a fixed per-attachment
/// estimate since the estimator can't inspect bytes it hasn't fetched.
fn estimate_uri(uri: &str, m: &ModalityDivisors) -> u64 {
    let divisor = if uri.starts_with("data:") {
        m.base64_chars_per_unit
    } else {
        m.fallback_chars_per_unit
    };
    let raw = (uri.chars().count() as f64 / divisor).ceil() as u64;
    match m.cap {
        Some(cap) => raw.min(cap),
        None => raw,
    }
}

fn estimate_chars(text: &str, m: &ModalityDivisors) -> u64 {
    let raw = (text.chars().count() as f64 / m.plain_chars_per_unit).ceil() as u64;
    match m.cap {
        Some(cap) => raw.min(cap),
        None => raw,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::operations::ChatMessage;

    fn text_request(text: &str) -> ChatRequest {
        ChatRequest {
            messages: vec![ChatMessage {
                role: Role::User,
                content: vec![ContentPart::Text { text: text.into() }],
                tokens: None,
            }],
            ..Default::default()
        }
    }

    fn text_tokens(usage: &Usage) -> u64 {
        usage.text.unwrap().input_tokens
    }

    #[test]
    fn longer_text_never_decreases_estimate() {
        let short = TokenEstimator::estimate_chat_input(&text_request("hi"));
        let long = TokenEstimator::estimate_chat_input(&text_request(&"hi ".repeat(200)));
        assert!(text_tokens(&long) >= text_tokens(&short));
    }

    #[test]
    fn adding_image_part_increases_estimate() {
        let mut request = text_request("describe this");
        let without = TokenEstimator::estimate_chat_input(&request);
        request.messages[0].content.push(ContentPart::ImageUrl {
            url: "https://example.test/a.png".into(),
        });
        let with = TokenEstimator::estimate_chat_input(&request);
        assert!(text_tokens(&with) > text_tokens(&without));
    }

    #[test]
    fn adding_tool_spec_increases_estimate() {
        let mut request = text_request("hi");
        let without = TokenEstimator::estimate_chat_input(&request);
        request.tools.push(crate::types::operations::ToolSpec {
            name: "lookup".into(),
            description: "look something up".into(),
            parameters: serde_json::json!({}),
        });
        let with = TokenEstimator::estimate_chat_input(&request);
        assert!(text_tokens(&with) > text_tokens(&without));
    }

    #[test]
    fn audio_url_contributes_to_audio_input_tokens_not_text() {
        let mut request = text_request("transcribe please");
        request.messages[0].content.push(ContentPart::AudioUrl {
            url: "https://example.test/a.wav".into(),
        });
        let usage = TokenEstimator::estimate_chat_input(&request);
        assert!(usage.audio.unwrap().input_tokens > 0);
    }

    #[test]
    fn message_token_override_bypasses_content_estimate() {
        let request = ChatRequest {
            messages: vec![ChatMessage {
                role: Role::User,
                content: vec![ContentPart::Text {
                    text: "x".repeat(10_000),
                }],
                tokens: Some(7),
            }],
            ..Default::default()
        };
        let usage = TokenEstimator::estimate_chat_input(&request);
        assert_eq!(text_tokens(&usage), 7);
    }

    #[test]
    fn data_uri_image_is_capped() {
        let huge_data_uri = format!("data:image/png;base64,{}", "A".repeat(1_000_000));
        let mut request = text_request("describe");
        request.messages[0]
            .content
            .push(ContentPart::ImageUrl { url: huge_data_uri });
        let usage = TokenEstimator::estimate_chat_input(&request);
        // Image tokens are folded into text; a single huge image can't push
        // the whole message past its own role overhead plus the 1360 cap.
        assert!(text_tokens(&usage) <= ROLE_OVERHEAD_TOKENS + 1360 + 100);
    }
}
