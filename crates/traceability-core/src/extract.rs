//! Pulling candidate correlation ids out of inbound requests.
//!
//! Transport integrations differ in how they expose headers, so extraction
//! is split in two: a [`HeaderCarrier`] adapter over the transport's header
//! surface, and a [`CorrelationExtractor`] strategy that reads the candidate
//! value through it. Both have one default implementation; hosts with exotic
//! transports supply their own.

use std::collections::HashMap;

/// Read-only view over a transport's request headers.
///
/// Lookups are case-insensitive, matching HTTP header semantics.
pub trait HeaderCarrier {
    fn get(&self, name: &str) -> Option<&str>;
}

impl HeaderCarrier for http::HeaderMap {
    fn get(&self, name: &str) -> Option<&str> {
        // HeaderMap lookups are case-insensitive already; values that are
        // not valid UTF-8 are treated as absent.
        self.get(name).and_then(|value| value.to_str().ok())
    }
}

impl HeaderCarrier for HashMap<String, String> {
    fn get(&self, name: &str) -> Option<&str> {
        self.iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Strategy for extracting a candidate correlation id from a request.
pub trait CorrelationExtractor: Send + Sync {
    /// The first value of `header_name`, or `None` when the header is
    /// absent. Never fails.
    fn extract(&self, headers: &dyn HeaderCarrier, header_name: &str) -> Option<String>;
}

/// Default extractor: a plain header read. Blank values count as absent so
/// an empty header can never become the request's identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderCorrelationExtractor;

impl CorrelationExtractor for HeaderCorrelationExtractor {
    fn extract(&self, headers: &dyn HeaderCarrier, header_name: &str) -> Option<String> {
        headers
            .get(header_name)
            .filter(|value| !value.is_empty())
            .map(str::to_owned)
    }
}
