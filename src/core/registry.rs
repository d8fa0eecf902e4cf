//! The model catalog (C1): the authoritative, concurrently-readable store of
//! every known `ModelInfo`, keyed both by its fully-qualified `"provider/id"`
//! key and by its bare `id` for convenience lookups.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::core::handler::ModelHandler;
use crate::provider::Provider;
use crate::types::catalog::ModelInfo;

/// Immutable snapshot backing the catalog. Readers get a cheap `Arc` clone
/// via `ArcSwap::load`, so a refresh never exposes a partially-updated or
/// momentarily-empty catalog to concurrent selection/search calls.
#[derive(Debug, Default, Clone)]
struct CatalogState {
    by_key: HashMap<String, Arc<ModelInfo>>,
    /// Bare id -> fully-qualified key of the model currently owning that
    /// bare id, chosen by lowest provider priority (ties keep the
    /// earliest-registered owner).
    bare_alias: HashMap<String, String>,
}

/// Concurrency-safe registry of models across providers.
///
/// Writers (`register`, `remove_provider`) take the internal mutex and
/// publish a new `Arc<CatalogState>` atomically; readers never block and
/// never observe a half-applied mutation.
pub struct ModelCatalog {
    state: ArcSwap<CatalogState>,
    write_lock: std::sync::Mutex<()>,
    sequence: AtomicU64,
    provider_priority: std::sync::Mutex<HashMap<String, u32>>,
    /// Bound `Provider` implementations, keyed by provider name. Lives here
    /// (rather than on `Gateway`) so `get_provider_for` can resolve a model
    /// to its provider in one place.
    providers: std::sync::Mutex<HashMap<String, Arc<dyn Provider>>>,
    /// Per-model dispatch overrides, keyed by `"provider/id"` (falls back to
    /// bare id on lookup, same as `get`).
    handlers: std::sync::Mutex<HashMap<String, Arc<dyn ModelHandler>>>,
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelCatalog {
    pub fn new() -> Self {
        Self {
            state: ArcSwap::from_pointee(CatalogState::default()),
            write_lock: std::sync::Mutex::new(()),
            sequence: AtomicU64::new(0),
            provider_priority: std::sync::Mutex::new(HashMap::new()),
            providers: std::sync::Mutex::new(HashMap::new()),
            handlers: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Registers every model in `models`, in order.
    pub fn register_all(&self, models: Vec<ModelInfo>) {
        for model in models {
            self.register(model);
        }
    }

    /// Clears every registered model and alias. Provider bindings, handler
    /// registrations, and priority settings are untouched: those are
    /// setup-time wiring, not catalog contents.
    pub fn clear(&self) {
        let _guard = self.write_lock.lock().unwrap();
        self.state.store(Arc::new(CatalogState::default()));
    }

    /// Models belonging to a provider that currently has a bound `Provider`
    /// implementation, i.e. models the gateway can actually dispatch to
    /// right now as opposed to catalog entries awaiting a provider.
    pub fn get_owned(&self) -> Vec<Arc<ModelInfo>> {
        let providers = self.providers.lock().unwrap();
        self.all()
            .into_iter()
            .filter(|m| providers.contains_key(&m.provider))
            .collect()
    }

    /// Registers a handler for one model, keyed by `"provider/id"` or a bare
    /// id (bare keys are matched only when no qualified key matches, same
    /// precedence as `get`).
    pub fn register_handler(&self, key: impl Into<String>, handler: Arc<dyn ModelHandler>) {
        self.handlers.lock().unwrap().insert(key.into(), handler);
    }

    /// Looks up a handler for `(provider, id)`, trying the fully-qualified
    /// key first and falling back to the bare id.
    pub fn get_handler(&self, provider: &str, id: &str) -> Option<Arc<dyn ModelHandler>> {
        let handlers = self.handlers.lock().unwrap();
        let qualified = format!("{provider}/{id}");
        handlers
            .get(&qualified)
            .or_else(|| handlers.get(id))
            .cloned()
    }

    /// Binds a `Provider` implementation under its own name, making every
    /// catalog model with that provider name dispatchable.
    pub fn register_provider_binding(&self, provider: Arc<dyn Provider>) {
        let name = provider.name().to_string();
        self.providers.lock().unwrap().insert(name, provider);
    }

    pub fn get_provider(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.lock().unwrap().get(name).cloned()
    }

    /// Resolves `model_id` (bare id or `"provider/id"`) to its catalog entry
    /// and that entry's bound provider, if both exist.
    pub fn get_provider_for(&self, model_id: &str) -> Option<(String, Arc<dyn Provider>)> {
        let model = self.get(model_id)?;
        let provider = self.get_provider(&model.provider)?;
        Some((model.key(), provider))
    }

    /// Sets a provider's priority for bare-id ownership disputes. Lower
    /// values win. Providers with no explicit priority are treated as
    /// lowest priority (`u32::MAX`).
    pub fn set_provider_priority(&self, provider: impl Into<String>, priority: u32) {
        self.provider_priority
            .lock()
            .unwrap()
            .insert(provider.into(), priority);
    }

    fn priority_of(&self, provider: &str) -> u32 {
        self.provider_priority
            .lock()
            .unwrap()
            .get(provider)
            .copied()
            .unwrap_or(u32::MAX)
    }

    /// Registers or re-registers a model. If an entry already exists under
    /// the same fully-qualified key, the incoming info is merged onto it
    /// per `ModelInfo::merge_from` rather than replacing it outright.
    pub fn register(&self, mut model: ModelInfo) {
        let _guard = self.write_lock.lock().unwrap();
        let mut state = (**self.state.load()).clone();

        let key = model.key();
        let bare_id = model.id.clone();
        let provider = model.provider.clone();

        if let Some(existing) = state.by_key.get(&key) {
            let mut merged = (**existing).clone();
            merged.merge_from(&model);
            state.by_key.insert(key.clone(), Arc::new(merged));
        } else {
            model.registration_seq = self.sequence.fetch_add(1, Ordering::SeqCst);
            state.by_key.insert(key.clone(), Arc::new(model));
        }

        let challenger_priority = self.priority_of(&provider);
        let should_claim_bare = match state.bare_alias.get(&bare_id) {
            None => true,
            Some(current_key) if current_key == &key => true,
            Some(current_key) => {
                let current = state.by_key.get(current_key);
                match current {
                    Some(current_model) => {
                        let incumbent_priority = self.priority_of(&current_model.provider);
                        challenger_priority < incumbent_priority
                    }
                    None => true,
                }
            }
        };
        if should_claim_bare {
            state.bare_alias.insert(bare_id, key);
        }

        self.state.store(Arc::new(state));
    }

    /// Removes every model belonging to `provider`, e.g. after a failed
    /// refresh or explicit deregistration.
    pub fn remove_provider(&self, provider: &str) {
        let _guard = self.write_lock.lock().unwrap();
        let mut state = (**self.state.load()).clone();

        state
            .by_key
            .retain(|_, model| model.provider != provider);

        state.bare_alias.retain(|_, key| {
            state
                .by_key
                .get(key)
                .map(|m| m.provider != provider)
                .unwrap_or(false)
        });

        self.state.store(Arc::new(state));
    }

    /// Looks up by fully-qualified `"provider/id"` key, falling back to
    /// bare-id alias resolution if no exact key match exists.
    pub fn get(&self, id_or_key: &str) -> Option<Arc<ModelInfo>> {
        let state = self.state.load();
        if let Some(model) = state.by_key.get(id_or_key) {
            return Some(model.clone());
        }
        let key = state.bare_alias.get(id_or_key)?;
        state.by_key.get(key).cloned()
    }

    /// All currently-registered models, in no particular order.
    pub fn all(&self) -> Vec<Arc<ModelInfo>> {
        self.state.load().by_key.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.state.load().by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
