//! Selection predicates, weighting, budgets, and catalog override patches.

use std::collections::HashSet;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::capability::{Capability, Parameter, Tier};
use super::catalog::{ModelInfo, Pricing};

/// Restricts selection to an allow/deny set of provider names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderFilter {
    #[serde(default)]
    pub preferred: HashSet<String>,
    #[serde(default)]
    pub excluded: HashSet<String>,
}

impl ProviderFilter {
    pub fn allows(&self, provider: &str) -> bool {
        if self.excluded.contains(provider) {
            return false;
        }
        self.preferred.is_empty() || self.preferred.contains(provider)
    }
}

/// A hard ceiling on estimated per-request cost, in USD.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    pub max_cost_usd: f64,
}

/// Relative importance of each scoring dimension. Values need not sum to 1;
/// the selection engine normalizes internally.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    #[serde(default)]
    pub cost: f64,
    #[serde(default)]
    pub speed: f64,
    #[serde(default)]
    pub accuracy: f64,
    #[serde(default)]
    pub context_window: f64,
}

impl Weights {
    pub const ZERO: Weights = Weights {
        cost: 0.0,
        speed: 0.0,
        accuracy: 0.0,
        context_window: 0.0,
    };

    pub fn balanced() -> Self {
        Weights {
            cost: 0.34,
            speed: 0.33,
            accuracy: 0.33,
            context_window: 0.0,
        }
    }

    pub fn cheapest() -> Self {
        Weights {
            cost: 0.8,
            speed: 0.1,
            accuracy: 0.1,
            context_window: 0.0,
        }
    }

    pub fn fastest() -> Self {
        Weights {
            cost: 0.1,
            speed: 0.8,
            accuracy: 0.1,
            context_window: 0.0,
        }
    }

    pub fn most_capable() -> Self {
        Weights {
            cost: 0.1,
            speed: 0.1,
            accuracy: 0.8,
            context_window: 0.0,
        }
    }

    /// The weight profile used when a predicate names no weights and no
    /// `weight_profile` at all: a cost-leaning default distinct from
    /// `balanced()`, per the registry's documented fallback order.
    pub fn default_fallback() -> Self {
        Weights {
            cost: 0.5,
            speed: 0.3,
            accuracy: 0.2,
            context_window: 0.0,
        }
    }

    /// Looks up a built-in named weight profile (§3 supplement). Returns
    /// `None` for unrecognized names so callers can fall back to a custom
    /// profile or surface a validation error.
    pub fn named(name: &str) -> Option<Self> {
        match name {
            "balanced" => Some(Self::balanced()),
            "cheapest" => Some(Self::cheapest()),
            "fastest" => Some(Self::fastest()),
            "most-capable" => Some(Self::most_capable()),
            _ => None,
        }
    }

    fn sum(&self) -> f64 {
        self.cost + self.speed + self.accuracy + self.context_window
    }

    pub fn normalized(&self) -> Weights {
        let total = self.sum();
        if total <= 0.0 {
            return Self::balanced();
        }
        Weights {
            cost: self.cost / total,
            speed: self.speed / total,
            accuracy: self.accuracy / total,
            context_window: self.context_window / total,
        }
    }
}

/// Criteria an operation uses to pick a model from the catalog.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectionPredicate {
    /// A specific model id or `"provider/id"` pin. When set, selection
    /// bypasses filtering and scoring entirely and resolves straight to
    /// this model.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub required_capabilities: HashSet<Capability>,
    #[serde(default)]
    pub optional_capabilities: HashSet<Capability>,
    #[serde(default)]
    pub required_parameters: HashSet<Parameter>,
    #[serde(default)]
    pub optional_parameters: HashSet<Parameter>,
    #[serde(default)]
    pub min_context_window: Option<u64>,
    #[serde(default)]
    pub tier: Option<Tier>,
    #[serde(default)]
    pub providers: ProviderFilter,
    #[serde(default)]
    pub budget: Option<Budget>,
    #[serde(default)]
    pub weights: Option<Weights>,
    /// Name of a built-in weight profile, consulted when `weights` is
    /// unset. See `Weights::named` for the recognized names.
    #[serde(default)]
    pub weight_profile: Option<String>,
}

impl SelectionPredicate {
    /// Hard filter: a model either satisfies every required constraint or is
    /// excluded from consideration entirely.
    pub fn satisfies(&self, model: &ModelInfo) -> bool {
        if !self.providers.allows(&model.provider) {
            return false;
        }
        if let Some(tier) = self.tier {
            if model.tier != tier {
                return false;
            }
        }
        if !self
            .required_capabilities
            .iter()
            .all(|c| model.has_capability(*c))
        {
            return false;
        }
        if !self
            .required_parameters
            .iter()
            .all(|p| model.supports_parameter(p))
        {
            return false;
        }
        if let Some(min_ctx) = self.min_context_window {
            if model.context_window < min_ctx {
                return false;
            }
        }
        true
    }

    /// Resolves the weights to score with, following the documented
    /// fallback order: explicit `weights`, then a named `weight_profile`,
    /// then the engine-wide default.
    pub fn resolve_weights(&self) -> Weights {
        self.weights
            .or_else(|| self.weight_profile.as_deref().and_then(Weights::named))
            .unwrap_or_else(Weights::default_fallback)
            .normalized()
    }
}

/// Matcher used by `ModelOverride` to select which catalog entries a patch
/// applies to.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OverrideMatcher {
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default, with = "serde_regex_opt")]
    pub model_pattern: Option<Regex>,
}

impl OverrideMatcher {
    pub fn matches(&self, model: &ModelInfo) -> bool {
        if let Some(provider) = &self.provider {
            if provider != &model.provider {
                return false;
            }
        }
        if let Some(pattern) = &self.model_pattern {
            if !pattern.is_match(&model.id) {
                return false;
            }
        }
        true
    }
}

/// A partial update applied on top of a matched `ModelInfo` (§4.7 merge
/// rules). `None` fields are left untouched; `Some` fields replace, except
/// where noted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelInfoPatch {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub tier: Option<Tier>,
    #[serde(default)]
    pub add_capabilities: HashSet<Capability>,
    #[serde(default)]
    pub remove_capabilities: HashSet<Capability>,
    #[serde(default)]
    pub pricing: Option<Pricing>,
    #[serde(default)]
    pub providers: Option<ProviderFilter>,
}

/// A named override rule: matcher + patch, applied by the refresh
/// coordinator after each provider sync (§4.4 step 3, §4.7).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelOverride {
    pub matcher: OverrideMatcher,
    pub patch: ModelInfoPatch,
}

impl ModelOverride {
    pub fn apply(&self, model: &mut ModelInfo) {
        if !self.matcher.matches(model) {
            return;
        }
        if let Some(name) = &self.patch.display_name {
            model.display_name = name.clone();
        }
        if let Some(tier) = self.patch.tier {
            model.tier = tier;
        }
        for cap in &self.patch.add_capabilities {
            model.capabilities.insert(*cap);
        }
        for cap in &self.patch.remove_capabilities {
            model.capabilities.remove(cap);
        }
        if let Some(pricing) = &self.patch.pricing {
            model.pricing = pricing.clone();
        }
    }
}

/// Recomputes a provider allow-set as `preferred - excluded`, per the
/// metadata merge table's `providers.allow` derivation rule.
pub fn recompute_allow(preferred: &HashSet<String>, excluded: &HashSet<String>) -> HashSet<String> {
    preferred.difference(excluded).cloned().collect()
}

/// `serde` helper module for `Option<Regex>` (Regex has no native serde
/// support; only debug/test fixtures round-trip overrides through JSON).
mod serde_regex_opt {
    use regex::Regex;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Regex>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(r) => r.as_str().serialize(s),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Regex>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        match raw {
            Some(s) => Regex::new(&s).map(Some).map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}
