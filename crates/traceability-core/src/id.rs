//! Correlation identifier type and generation.
//!
//! A correlation id is an opaque, case-preserving string used to join log
//! lines and calls belonging to one logical operation. The default generator
//! produces a 32-character lowercase hex identifier (UUID v4, simple form);
//! ids can also be derived from a 128-bit trace id so the correlation id and
//! the distributed trace agree on the request's identity.
//!
//! # Example
//!
//! ```rust
//! use traceability_core::id::CorrelationId;
//!
//! let id = CorrelationId::generate();
//! assert_eq!(id.as_str().len(), 32);
//!
//! let explicit = CorrelationId::new("order-7781");
//! assert_eq!(explicit.as_str(), "order-7781");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::trace_context::TraceId;

/// Opaque per-request correlation identifier.
///
/// Uniqueness is the caller's responsibility; values adopted from inbound
/// headers are preserved byte for byte, including case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Create a correlation id from an existing value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Generate a fresh random identifier in the default format
    /// (32 lowercase hex characters).
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Derive the correlation id from a 128-bit trace id, so logs joined by
    /// correlation id and spans joined by trace id line up.
    pub fn from_trace_id(trace_id: TraceId) -> Self {
        Self(trace_id.to_string())
    }

    /// Get the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the id, returning the underlying string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CorrelationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for CorrelationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for CorrelationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl PartialEq<str> for CorrelationId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for CorrelationId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}
