//! Error types for the Colloquy domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Colloquy operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Store errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Transport errors ---
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures calling the completion/embedding provider.
///
/// `Network`, `Timeout`, and `ApiError` mean the provider was unreachable
/// or refused the request; `Malformed` means it answered but the body did
/// not decode into the expected shape. Callers that recover (adjudication
/// fallback, compression truncation) treat both classes the same, but the
/// distinction must survive into logs.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Malformed provider response: {0}")]
    Malformed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

impl ProviderError {
    /// True when the provider answered but the payload was undecodable,
    /// as opposed to being unreachable.
    pub fn is_malformed(&self) -> bool {
        matches!(self, ProviderError::Malformed(_))
    }
}

/// Failures at the persistent store boundary.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Version conflict on node {node_id}: expected v{expected}, store has v{actual}")]
    VersionConflict {
        node_id: String,
        expected: u64,
        actual: u64,
    },

    #[error("Storage error: {0}")]
    Storage(String),
}

impl StoreError {
    pub fn node_not_found(id: impl Into<String>) -> Self {
        StoreError::NotFound {
            kind: "node",
            id: id.into(),
        }
    }

    pub fn message_not_found(id: impl Into<String>) -> Self {
        StoreError::NotFound {
            kind: "message",
            id: id.into(),
        }
    }
}

/// Failures at the transport boundary.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("Transport closed")]
    Closed,

    #[error("Delivery failed for message {message_id}: {reason}")]
    DeliveryFailed { message_id: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_status() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn malformed_is_distinguishable_from_network() {
        let malformed = ProviderError::Malformed("not json".into());
        let network = ProviderError::Network("connection refused".into());
        assert!(malformed.is_malformed());
        assert!(!network.is_malformed());
    }

    #[test]
    fn version_conflict_names_both_versions() {
        let err = StoreError::VersionConflict {
            node_id: "n1".into(),
            expected: 3,
            actual: 5,
        };
        let text = err.to_string();
        assert!(text.contains("v3"));
        assert!(text.contains("v5"));
    }

    #[test]
    fn not_found_helpers() {
        assert!(StoreError::node_not_found("abc").to_string().contains("node"));
        assert!(StoreError::message_not_found("abc")
            .to_string()
            .contains("message"));
    }
}
