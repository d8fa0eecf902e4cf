//! Model and pricing data model (`ModelInfo`, `Pricing`, `Metrics`).

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use super::capability::{Capability, Parameter, Tier};

/// Per-unit price band, e.g. input/output token rates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBand {
    /// USD per single unit (token, character, second, depending on context).
    pub price_per_unit: f64,
}

impl PriceBand {
    pub fn new(price_per_unit: f64) -> Self {
        Self { price_per_unit }
    }

    pub fn cost(&self, units: f64) -> f64 {
        self.price_per_unit * units
    }
}

/// Price for one `(size, quality)` image-generation combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSizeCost {
    pub size: String,
    pub price: f64,
}

/// A quality tier's set of per-size image prices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageQualityPricing {
    pub quality: String,
    pub sizes: Vec<ImageSizeCost>,
}

impl ImageQualityPricing {
    pub fn price_for_size(&self, size: &str) -> Option<f64> {
        self.sizes.iter().find(|s| s.size == size).map(|s| s.price)
    }
}

/// Full pricing schedule for a model, grouped by modality. Any field left
/// `None` means that usage dimension cannot be costed for this model (see
/// `CostCalculator`). `embeddings` is a distinct group from `input`/`output`
/// (a model that serves both chat and embeddings prices them separately).
/// `audio_input`/`audio_output` are per-token rates; `audio_per_second` is a
/// separate absolute per-second rate some providers charge instead of (or in
/// addition to) token-based audio pricing. `per_request` is a flat fee added
/// once per request regardless of usage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pricing {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<PriceBand>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PriceBand>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached_input: Option<PriceBand>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<PriceBand>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embeddings: Option<PriceBand>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_input: Option<PriceBand>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_output: Option<PriceBand>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_per_second: Option<PriceBand>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub image: Vec<ImageQualityPricing>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_request: Option<f64>,
}

impl Pricing {
    pub fn image_price(&self, quality: &str, size: &str) -> Option<f64> {
        self.image
            .iter()
            .find(|q| q.quality == quality)
            .and_then(|q| q.price_for_size(size))
    }
}

/// Mutable, refresh-driven health and load signals for a model. All fields
/// are optional except the monotonic counters, which start at zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_per_second: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_to_first_token_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_request_duration_ms: Option<f64>,
    /// Externally-reported accuracy, in `[0, 1]`. Falls back to a
    /// tier-derived constant in selection scoring when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy_score: Option<f64>,
    #[serde(default)]
    pub request_count: u64,
    #[serde(default)]
    pub success_count: u64,
    #[serde(default)]
    pub failure_count: u64,
    pub last_updated: chrono::DateTime<chrono::Utc>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            tokens_per_second: None,
            time_to_first_token_ms: None,
            average_request_duration_ms: None,
            accuracy_score: None,
            request_count: 0,
            success_count: 0,
            failure_count: 0,
            last_updated: chrono::DateTime::<chrono::Utc>::UNIX_EPOCH,
        }
    }
}

/// A single catalog entry: one model offered by one provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub provider: String,
    pub display_name: String,
    pub tier: Tier,
    #[serde(default)]
    pub capabilities: HashSet<Capability>,
    #[serde(default)]
    pub parameters: BTreeMap<Parameter, bool>,
    pub context_window: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u64>,
    #[serde(default)]
    pub pricing: Pricing,
    #[serde(default)]
    pub metrics: Metrics,
    /// Monotonic registration order, assigned by the catalog. Used to break
    /// bare-id ownership ties in favor of the first-registered provider.
    #[serde(skip)]
    pub registration_seq: u64,
}

impl ModelInfo {
    /// Fully-qualified catalog key: `"provider/id"`.
    pub fn key(&self) -> String {
        format!("{}/{}", self.provider, self.id)
    }

    pub fn has_capability(&self, cap: Capability) -> bool {
        self.capabilities.contains(&cap)
    }

    pub fn supports_parameter(&self, param: &Parameter) -> bool {
        self.parameters.get(param).copied().unwrap_or(false)
    }

    /// Merge a re-registration of the same `(provider, id)` into `self`,
    /// following the field-by-field rule table (§5.1): scalar descriptive
    /// fields are replaced, `capabilities`/`parameters` are unioned, and
    /// `metrics` is replaced wholesale (it is always a fresh snapshot).
    pub fn merge_from(&mut self, incoming: &ModelInfo) {
        self.display_name = incoming.display_name.clone();
        self.tier = incoming.tier;
        self.context_window = incoming.context_window;
        self.max_output_tokens = incoming.max_output_tokens;
        self.pricing = incoming.pricing.clone();
        self.metrics = incoming.metrics.clone();
        self.capabilities
            .extend(incoming.capabilities.iter().copied());
        for (param, supported) in &incoming.parameters {
            self.parameters
                .entry(param.clone())
                .and_modify(|v| *v = *v || *supported)
                .or_insert(*supported);
        }
    }
}
