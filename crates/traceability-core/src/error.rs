//! Error types for the traceability core.
//!
//! Almost every failure in this crate is swallowed by design: malformed
//! inbound identifiers are replaced, late header writes are skipped, and
//! downstream transport errors pass through untouched. The errors defined
//! here cover the one class that must fail loudly, host misconfiguration.

use thiserror::Error;

/// Main error type for traceability operations
#[derive(Error, Debug)]
pub enum TraceabilityError {
    /// No service source could be resolved from configuration, the
    /// `TRACEABILITY_SERVICENAME` environment variable, or the process name.
    #[error(
        "no service source configured: set `source`, export TRACEABILITY_SERVICENAME, \
         or enable the process-name fallback"
    )]
    SourceNotConfigured,

    /// A configured header name is not a valid HTTP header token.
    #[error("invalid header name '{0}'")]
    InvalidHeaderName(String),
}

impl TraceabilityError {
    /// Check if this error indicates host misconfiguration (vs runtime state)
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            TraceabilityError::SourceNotConfigured | TraceabilityError::InvalidHeaderName(_)
        )
    }
}

/// Result type alias for traceability operations
pub type Result<T> = std::result::Result<T, TraceabilityError>;
