//! Capability and parameter tags shared by models, providers, and predicates.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A tag describing a feature a model or provider supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Chat,
    Streaming,
    Vision,
    Tools,
    Json,
    Structured,
    Reasoning,
    Image,
    Audio,
    Hearing,
    Embedding,
    Zdr,
}

impl Capability {
    pub const ALL: &'static [Capability] = &[
        Capability::Chat,
        Capability::Streaming,
        Capability::Vision,
        Capability::Tools,
        Capability::Json,
        Capability::Structured,
        Capability::Reasoning,
        Capability::Image,
        Capability::Audio,
        Capability::Hearing,
        Capability::Embedding,
        Capability::Zdr,
    ];

    /// Capabilities that are model-level, not provider-level: presence is
    /// never required of a *provider* during capability detection, only of
    /// the model (see `core::capabilities`).
    pub fn is_model_level(&self) -> bool {
        matches!(
            self,
            Capability::Vision
                | Capability::Tools
                | Capability::Json
                | Capability::Structured
                | Capability::Reasoning
                | Capability::Zdr
        )
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Capability::Chat => "chat",
            Capability::Streaming => "streaming",
            Capability::Vision => "vision",
            Capability::Tools => "tools",
            Capability::Json => "json",
            Capability::Structured => "structured",
            Capability::Reasoning => "reasoning",
            Capability::Image => "image",
            Capability::Audio => "audio",
            Capability::Hearing => "hearing",
            Capability::Embedding => "embedding",
            Capability::Zdr => "zdr",
        };
        f.write_str(s)
    }
}

/// A per-request tunable a model must accept (`max_tokens`, `temperature`,
/// `tools`, ...). Open vocabulary, unlike `Capability`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Parameter(pub String);

impl Parameter {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl From<&str> for Parameter {
    fn from(s: &str) -> Self {
        Parameter(s.to_string())
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Coarse quality band for a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Flagship,
    Efficient,
    Legacy,
    Experimental,
}

impl Tier {
    /// Pattern-based detector used by the refresh coordinator when a
    /// provider-listed model omits a tier (§4.4 step 2).
    pub fn detect_from_name(name: &str) -> Tier {
        let lower = name.to_ascii_lowercase();
        if lower.contains("mini")
            || lower.contains("lite")
            || lower.contains("small")
            || lower.contains("flash")
            || lower.contains("haiku")
        {
            Tier::Efficient
        } else if lower.contains("preview")
            || lower.contains("experimental")
            || lower.contains("beta")
            || lower.contains("alpha")
        {
            Tier::Experimental
        } else if lower.contains("legacy") || lower.contains("deprecated") {
            Tier::Legacy
        } else {
            Tier::Flagship
        }
    }
}
