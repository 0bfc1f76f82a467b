//! Configuration surface for correlation handling.
//!
//! Options are plain data, loaded by the host through whatever configuration
//! mechanism it already uses (`serde` deserialization is derived for that
//! purpose) and shared read-only across concurrent request flows.

use serde::Deserialize;

use crate::error::{Result, TraceabilityError};

/// Default name of the correlation header, used for both the inbound read
/// and the response reflection.
pub const DEFAULT_CORRELATION_HEADER: &str = "X-Correlation-Id";

/// Environment variable consulted for the service name when no explicit
/// source is configured.
pub const SERVICE_NAME_ENV: &str = "TRACEABILITY_SERVICENAME";

/// Recognized correlation options.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TraceabilityOptions {
    /// Header carrying the correlation id (default `X-Correlation-Id`).
    pub header_name: String,

    /// When set, inbound ids are checked for shape (length and character
    /// class) and discarded on mismatch. Off by default; ids are opaque.
    pub validate_correlation_id_format: bool,

    /// When set, a fresh id is minted for every request even if the caller
    /// supplied one.
    pub always_generate_new: bool,

    /// Explicit service name used to label telemetry originating here.
    pub source: Option<String>,

    /// Allow falling back to the current executable's name when neither
    /// `source` nor the environment provides one.
    pub use_process_name_as_fallback: bool,
}

impl Default for TraceabilityOptions {
    fn default() -> Self {
        Self {
            header_name: DEFAULT_CORRELATION_HEADER.to_string(),
            validate_correlation_id_format: false,
            always_generate_new: false,
            source: None,
            use_process_name_as_fallback: true,
        }
    }
}

impl TraceabilityOptions {
    /// Options with a custom correlation header name.
    pub fn with_header_name(header_name: impl Into<String>) -> Self {
        Self {
            header_name: header_name.into(),
            ..Default::default()
        }
    }

    /// Enable or disable inbound id format validation.
    pub fn validate_format(mut self, enabled: bool) -> Self {
        self.validate_correlation_id_format = enabled;
        self
    }

    /// Force a fresh id per request.
    pub fn always_generate_new(mut self, enabled: bool) -> Self {
        self.always_generate_new = enabled;
        self
    }

    /// Set the explicit service name.
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Allow or forbid the process-name fallback for the service name.
    pub fn process_name_fallback(mut self, enabled: bool) -> Self {
        self.use_process_name_as_fallback = enabled;
        self
    }

    /// Fail fast on options that can never work at runtime.
    ///
    /// Meant for host startup, where a typo in the header name should stop
    /// the process instead of silently dropping every header write later.
    pub fn ensure_valid(&self) -> Result<()> {
        if http::header::HeaderName::try_from(self.header_name.as_str()).is_err() {
            return Err(TraceabilityError::InvalidHeaderName(
                self.header_name.clone(),
            ));
        }
        Ok(())
    }

    /// Resolve the service name used to label telemetry.
    ///
    /// Order: explicit `source`, then the `TRACEABILITY_SERVICENAME`
    /// environment variable, then the executable name if the fallback is
    /// permitted. With nothing resolvable this is a hard configuration
    /// error; silently mislabeled telemetry would be worse than failing.
    pub fn resolve_source(&self) -> Result<String> {
        if let Some(source) = self.source.as_deref() {
            if !source.is_empty() {
                return Ok(source.to_string());
            }
        }

        match std::env::var(SERVICE_NAME_ENV) {
            Ok(value) if !value.is_empty() => return Ok(value),
            _ => {}
        }

        if self.use_process_name_as_fallback {
            if let Some(name) = process_name() {
                return Ok(name);
            }
        }

        Err(TraceabilityError::SourceNotConfigured)
    }
}

/// File stem of the running executable, if it can be determined.
fn process_name() -> Option<String> {
    std::env::current_exe()
        .ok()?
        .file_stem()?
        .to_str()
        .map(str::to_owned)
}
