//! Error taxonomy for the gateway pipeline.
//!
//! Every error the pipeline raises carries an operation-family prefix when it
//! reaches `on_error` (see `GatewayError::operation_tag`); the variant itself
//! stays provider/operation-agnostic so callers can match on `kind()`.

use thiserror::Error;

/// Coarse-grained error kind, delivered to `Hooks::on_error` alongside the
/// operation-family message prefix (e.g. `"chat-stream-failed"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NoModelFound,
    ProviderCapabilityMissing,
    DispatchUnsupported,
    ValidationFailed,
    Cancelled,
    ProviderError,
    RegistryError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NoModelFound => "no-model-found",
            ErrorKind::ProviderCapabilityMissing => "provider-capability-missing",
            ErrorKind::DispatchUnsupported => "dispatch-unsupported",
            ErrorKind::ValidationFailed => "validation-failed",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::ProviderError => "provider-error",
            ErrorKind::RegistryError => "registry-error",
        }
    }
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("no compatible model found for {operation}")]
    NoModelFound { operation: &'static str },

    #[error("model '{model}' does not support required capability for {operation}")]
    ProviderCapabilityMissing {
        operation: &'static str,
        model: String,
    },

    #[error("provider does not support {operation} and no fallback available")]
    DispatchUnsupported { operation: &'static str },

    #[error("validation failed: {message}")]
    ValidationFailed {
        message: String,
        #[source]
        cause: Option<Box<GatewayError>>,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("provider error: {message}")]
    ProviderError {
        message: String,
        #[source]
        cause: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("registry error: {message}")]
    RegistryError { message: String },
}

impl GatewayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::NoModelFound { .. } => ErrorKind::NoModelFound,
            GatewayError::ProviderCapabilityMissing { .. } => ErrorKind::ProviderCapabilityMissing,
            GatewayError::DispatchUnsupported { .. } => ErrorKind::DispatchUnsupported,
            GatewayError::ValidationFailed { .. } => ErrorKind::ValidationFailed,
            GatewayError::Cancelled => ErrorKind::Cancelled,
            GatewayError::ProviderError { .. } => ErrorKind::ProviderError,
            GatewayError::RegistryError { .. } => ErrorKind::RegistryError,
        }
    }

    /// Operation-family-prefixed tag used when forwarding to `on_error`,
    /// e.g. `"chat-stream-failed"`.
    pub fn operation_tag(&self, operation: &str, streaming: bool) -> String {
        let suffix = if streaming { "stream-failed" } else { "failed" };
        format!("{operation}-{suffix}")
    }

    pub fn provider_error(message: impl Into<String>) -> Self {
        GatewayError::ProviderError {
            message: message.into(),
            cause: None,
        }
    }

    pub fn registry(message: impl Into<String>) -> Self {
        GatewayError::RegistryError {
            message: message.into(),
        }
    }
}
