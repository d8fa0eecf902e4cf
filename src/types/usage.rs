//! Usage accounting types, shared across operation families.

use serde::{Deserialize, Serialize};

/// Token counts for a chat/completion call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TextUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub cached_input_tokens: u64,
    #[serde(default)]
    pub reasoning_tokens: u64,
}

impl TextUsage {
    pub fn add(&self, other: &TextUsage) -> TextUsage {
        TextUsage {
            input_tokens: self.input_tokens + other.input_tokens,
            output_tokens: self.output_tokens + other.output_tokens,
            cached_input_tokens: self.cached_input_tokens + other.cached_input_tokens,
            reasoning_tokens: self.reasoning_tokens + other.reasoning_tokens,
        }
    }
}

/// Token counts for an embeddings call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingsUsage {
    #[serde(default)]
    pub input_tokens: u64,
}

impl EmbeddingsUsage {
    pub fn add(&self, other: &EmbeddingsUsage) -> EmbeddingsUsage {
        EmbeddingsUsage {
            input_tokens: self.input_tokens + other.input_tokens,
        }
    }
}

/// Token and duration counts for a speech/transcription call. `input_tokens`
/// and `output_tokens` are priced per-token (e.g. a transcript's text
/// output); `seconds` is priced separately via `Pricing::audio_per_second`
/// when a provider bills audio duration as a flat rate instead of (or in
/// addition to) tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub seconds: f64,
}

impl AudioUsage {
    pub fn add(&self, other: &AudioUsage) -> AudioUsage {
        AudioUsage {
            input_tokens: self.input_tokens + other.input_tokens,
            output_tokens: self.output_tokens + other.output_tokens,
            seconds: self.seconds + other.seconds,
        }
    }
}

/// Image counts for an image-generation/edit call, keyed by `(quality, size)`
/// at cost-calculation time rather than here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageOutputUsage {
    #[serde(default)]
    pub images: u64,
    pub quality: String,
    pub size: String,
}

/// Full usage envelope as accumulated by the pipeline and reported to
/// `Hooks::after_request` / the statistics aggregator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<TextUsage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embeddings: Option<EmbeddingsUsage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioUsage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageOutputUsage>,
}

impl Usage {
    pub fn from_text(text: TextUsage) -> Self {
        Self {
            text: Some(text),
            ..Default::default()
        }
    }

    pub fn from_embeddings(embeddings: EmbeddingsUsage) -> Self {
        Self {
            embeddings: Some(embeddings),
            ..Default::default()
        }
    }

    pub fn from_audio(audio: AudioUsage) -> Self {
        Self {
            audio: Some(audio),
            ..Default::default()
        }
    }

    pub fn from_image(image: ImageOutputUsage) -> Self {
        Self {
            image: Some(image),
            ..Default::default()
        }
    }

    /// Arithmetic sum, used by cost-additivity tests: two partial usages
    /// covering disjoint dimensions sum cleanly, and overlapping dimensions
    /// add component-wise.
    pub fn add(&self, other: &Usage) -> Usage {
        Usage {
            text: merge_opt(&self.text, &other.text, TextUsage::add),
            embeddings: merge_opt(&self.embeddings, &other.embeddings, EmbeddingsUsage::add),
            audio: merge_opt(&self.audio, &other.audio, AudioUsage::add),
            image: other.image.clone().or_else(|| self.image.clone()),
        }
    }

    /// Streaming accumulation: providers resend a cumulative usage snapshot
    /// on (most) chunks, so each new non-empty reading replaces the
    /// previous one rather than summing ("last-cumulative-wins").
    pub fn accumulate(&mut self, chunk: &Usage) {
        if chunk.text.is_some() {
            self.text = chunk.text;
        }
        if chunk.embeddings.is_some() {
            self.embeddings = chunk.embeddings;
        }
        if chunk.audio.is_some() {
            self.audio = chunk.audio;
        }
        if chunk.image.is_some() {
            self.image = chunk.image.clone();
        }
    }
}

fn merge_opt<T: Copy>(a: &Option<T>, b: &Option<T>, f: impl Fn(&T, &T) -> T) -> Option<T> {
    match (a, b) {
        (Some(a), Some(b)) => Some(f(a, b)),
        (Some(a), None) => Some(*a),
        (None, Some(b)) => Some(*b),
        (None, None) => None,
    }
}
