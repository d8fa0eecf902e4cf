//! Builds a model's effective capability set from what its provider can
//! dispatch plus the model-level-only tags the catalog entry carries.

use std::collections::HashSet;

use crate::provider::{Provider, PROBED_CAPABILITIES};
use crate::types::capability::Capability;
use crate::types::catalog::ModelInfo;

/// Combines provider-probed capabilities (chat, streaming, embedding, ...)
/// with a model's own model-level-only tags (vision, tools, json,
/// structured, reasoning, zdr) which no provider-wide probe can determine.
pub struct CapabilityDetector;

impl CapabilityDetector {
    /// Effective capability set for `model`, dispatched by `provider`.
    pub fn detect(provider: &dyn Provider, model: &ModelInfo) -> HashSet<Capability> {
        let mut caps: HashSet<Capability> = PROBED_CAPABILITIES
            .iter()
            .filter(|(_, probe)| probe(provider))
            .map(|(cap, _)| *cap)
            .collect();

        for cap in &model.capabilities {
            if cap.is_model_level() {
                caps.insert(*cap);
            }
        }

        caps
    }
}
