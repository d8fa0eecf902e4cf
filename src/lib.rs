//! Provider-agnostic AI gateway: a model catalog, a selection engine that
//! scores candidates against weighted predicates, a request lifecycle
//! pipeline with automatic fallback, and usage/cost accounting, all
//! independent of any one provider's wire format.
//!
//! Concrete provider integrations (HTTP clients, SDKs, local runtimes)
//! implement [`provider::Provider`] and [`provider::ModelSource`] and are
//! registered with a [`core::Gateway`]; none ship in this crate.

pub mod core;
pub mod provider;
pub mod types;

pub use core::error::{ErrorKind, GatewayError};
pub use core::gateway::Gateway;
pub use core::handler::ModelHandler;
pub use provider::{ModelSource, Provider};
pub use types::{
    Capability, ChatRequest, ChatResponse, Context, ModelInfo, Parameter, RequestMeta,
    SelectionPredicate, Usage, Weights,
};
