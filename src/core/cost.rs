//! Cost calculator (C6): turns a `Usage` snapshot and the model's `Pricing`
//! schedule into a USD cost breakdown.

use serde::{Deserialize, Serialize};

use crate::types::catalog::{ModelInfo, Pricing};
use crate::types::usage::Usage;

/// Per-dimension cost breakdown. Fields are `0.0` (not `None`) when the
/// dimension wasn't used, distinct from "couldn't be costed", which is
/// surfaced via `CostCalculator::calculate`'s `uncosted` list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub input: f64,
    pub output: f64,
    pub cached_input: f64,
    pub reasoning: f64,
    pub embeddings: f64,
    pub audio_input: f64,
    pub audio_output: f64,
    pub audio_duration: f64,
    pub image: f64,
    pub per_request: f64,
}

impl CostBreakdown {
    pub fn total(&self) -> f64 {
        self.input
            + self.output
            + self.cached_input
            + self.reasoning
            + self.embeddings
            + self.audio_input
            + self.audio_output
            + self.audio_duration
            + self.image
            + self.per_request
    }
}

/// A usage dimension that was present but had no matching price entry.
/// Per the resolved open question (SPEC_FULL.md §10), an unmatched
/// image `(quality, size)` combination is silently skipped rather than
/// treated as an error; this list is how callers can still observe it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UncostedDimension {
    ImageSizeQuality { quality: String, size: String },
}

pub struct CostCalculator;

impl CostCalculator {
    pub fn calculate(model: &ModelInfo, usage: &Usage) -> (CostBreakdown, Vec<UncostedDimension>) {
        let mut breakdown = CostBreakdown::default();
        let mut uncosted = Vec::new();
        let pricing = &model.pricing;

        if let Some(text) = &usage.text {
            breakdown.input = priced(pricing.input.map(|b| b.price_per_unit), text.input_tokens);
            breakdown.output = priced(pricing.output.map(|b| b.price_per_unit), text.output_tokens);
            // A model with no distinct cached-input rate is priced at its
            // ordinary input rate rather than left uncosted.
            let cached_rate = pricing
                .cached_input
                .or(pricing.input)
                .map(|b| b.price_per_unit);
            breakdown.cached_input = priced(cached_rate, text.cached_input_tokens);
            breakdown.reasoning = priced(
                pricing.reasoning.map(|b| b.price_per_unit),
                text.reasoning_tokens,
            );
        }

        if let Some(embeddings) = &usage.embeddings {
            breakdown.embeddings = priced(
                pricing.embeddings.map(|b| b.price_per_unit),
                embeddings.input_tokens,
            );
        }

        if let Some(audio) = &usage.audio {
            breakdown.audio_input = priced(
                pricing.audio_input.map(|b| b.price_per_unit),
                audio.input_tokens,
            );
            breakdown.audio_output = priced(
                pricing.audio_output.map(|b| b.price_per_unit),
                audio.output_tokens,
            );
            breakdown.audio_duration = priced_f64(
                pricing.audio_per_second.map(|b| b.price_per_unit),
                audio.seconds,
            );
        }

        if let Some(image) = &usage.image {
            match pricing.image_price(&image.quality, &image.size) {
                Some(price) => breakdown.image = price * image.images as f64,
                None if !pricing.image.is_empty() || has_any_pricing(pricing) => {
                    uncosted.push(UncostedDimension::ImageSizeQuality {
                        quality: image.quality.clone(),
                        size: image.size.clone(),
                    });
                }
                None => {}
            }
        }

        if let Some(flat) = pricing.per_request {
            breakdown.per_request = flat;
        }

        (breakdown, uncosted)
    }
}

fn priced(rate: Option<f64>, units: u64) -> f64 {
    rate.map(|r| r * units as f64).unwrap_or(0.0)
}

fn priced_f64(rate: Option<f64>, units: f64) -> f64 {
    rate.map(|r| r * units).unwrap_or(0.0)
}

fn has_any_pricing(pricing: &Pricing) -> bool {
    pricing.input.is_some() || pricing.output.is_some() || !pricing.image.is_empty()
}
