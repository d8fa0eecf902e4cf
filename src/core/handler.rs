//! Per-model handlers: a way for an embedding application to intercept
//! dispatch for one specific catalog entry (by `"provider/id"`, falling back
//! to bare id) ahead of its provider's own dispatch.
//!
//! Grounded on the teacher's `Provider`/`ComposedOps` split
//! (`crates/core/src/v2/mod.rs`): a handler is exactly the same shape the
//! pipeline already dispatches against (`ComposedOps`), just registered
//! per-model rather than derived from a `Provider` impl at request time.
//! This is what lets the pipeline's dispatch ladder treat "does this model
//! have a handler" and "does this model's provider support the operation"
//! as two instances of one interface instead of two code paths.

use std::sync::Arc;

use crate::types::context::ComposedOps;
use crate::types::operations::Operation;

/// Supplies a `ComposedOps` implementation for specific operations on one
/// model, ahead of the model's own provider. A handler that doesn't cover an
/// operation returns `None`, letting the pipeline fall through to the next
/// rung of the dispatch ladder.
pub trait ModelHandler: Send + Sync {
    fn ops_for(&self, operation: Operation) -> Option<Arc<dyn ComposedOps>>;
}
