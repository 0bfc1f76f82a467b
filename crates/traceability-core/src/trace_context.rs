//! W3C trace-context model and wire format.
//!
//! Implements the `traceparent` header (`version-traceid-spanid-flags`, all
//! lowercase hex, version `00`) and the companion `tracestate` header (an
//! ordered list of opaque vendor `key=value` pairs), as defined in
//! <https://www.w3.org/TR/trace-context/>.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use uuid::Uuid;

/// Header carrying the trace id, span id, and flags of the calling span.
pub const TRACEPARENT_HEADER: &str = "traceparent";

/// Header carrying ordered vendor-specific trace state.
pub const TRACESTATE_HEADER: &str = "tracestate";

/// W3C sampled flag bit.
pub const SAMPLED_FLAG: u8 = 0x01;

/// The only `traceparent` version this implementation understands.
const SUPPORTED_VERSION: &str = "00";

/// 128-bit trace identifier, rendered as 32 lowercase hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraceId(u128);

impl TraceId {
    /// Generate a random, non-zero trace id.
    pub fn generate() -> Self {
        // The all-zero id is invalid on the wire.
        loop {
            let candidate = Uuid::new_v4().as_u128();
            if candidate != 0 {
                return Self(candidate);
            }
        }
    }

    /// Parse 32 lowercase hex characters. Rejects uppercase, wrong lengths,
    /// and the all-zero id.
    pub fn parse(value: &str) -> Option<Self> {
        if value.len() != 32 || !is_lower_hex(value) {
            return None;
        }
        match u128::from_str_radix(value, 16) {
            Ok(0) => None,
            Ok(id) => Some(Self(id)),
            Err(_) => None,
        }
    }

    /// The raw 128-bit value.
    pub const fn as_u128(self) -> u128 {
        self.0
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

/// 64-bit span identifier, rendered as 16 lowercase hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpanId(u64);

impl SpanId {
    /// Generate a random, non-zero span id.
    pub fn generate() -> Self {
        loop {
            let candidate = Uuid::new_v4().as_u128() as u64;
            if candidate != 0 {
                return Self(candidate);
            }
        }
    }

    /// Parse 16 lowercase hex characters. Rejects uppercase, wrong lengths,
    /// and the all-zero id.
    pub fn parse(value: &str) -> Option<Self> {
        if value.len() != 16 || !is_lower_hex(value) {
            return None;
        }
        match u64::from_str_radix(value, 16) {
            Ok(0) => None,
            Ok(id) => Some(Self(id)),
            Err(_) => None,
        }
    }

    /// The raw 64-bit value.
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

fn is_lower_hex(value: &str) -> bool {
    value
        .bytes()
        .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

impl Serialize for TraceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TraceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        TraceId::parse(&value).ok_or_else(|| D::Error::custom("invalid trace id"))
    }
}

impl Serialize for SpanId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SpanId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        SpanId::parse(&value).ok_or_else(|| D::Error::custom("invalid span id"))
    }
}

/// Ordered vendor `key=value` pairs from the `tracestate` header.
///
/// Entries are opaque to this crate; order is preserved because W3C gives
/// the leftmost entry the highest precedence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TraceState(Vec<(String, String)>);

impl TraceState {
    /// Empty trace state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a comma-joined `key=value` list. Malformed entries are skipped;
    /// an input with no usable entries yields an empty state.
    pub fn parse(header: &str) -> Self {
        let entries = header
            .split(',')
            .filter_map(|entry| {
                let entry = entry.trim();
                let (key, value) = entry.split_once('=')?;
                if key.is_empty() {
                    return None;
                }
                Some((key.to_string(), value.to_string()))
            })
            .collect();
        Self(entries)
    }

    /// Build a trace state from ordered pairs.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Append an entry, preserving insertion order.
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.push((key.into(), value.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate entries in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Render the comma-joined header value.
    pub fn header_value(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// A parsed or generated W3C trace context: trace id, span id, flags, and
/// any accompanying trace state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceContext {
    pub trace_id: TraceId,
    pub span_id: SpanId,
    pub flags: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracestate: Option<TraceState>,
}

impl TraceContext {
    /// Create a new root context with random ids and the sampled flag set.
    pub fn root() -> Self {
        Self {
            trace_id: TraceId::generate(),
            span_id: SpanId::generate(),
            flags: SAMPLED_FLAG,
            tracestate: None,
        }
    }

    /// Parse an inbound `traceparent` header and optional `tracestate`.
    ///
    /// Returns `None` for anything other than a well-formed version-00
    /// header with non-zero lowercase-hex ids.
    pub fn parse(traceparent: &str, tracestate: Option<&str>) -> Option<Self> {
        let parts: Vec<&str> = traceparent.trim().split('-').collect();
        if parts.len() != 4 {
            return None;
        }
        if parts[0] != SUPPORTED_VERSION {
            return None;
        }

        let trace_id = TraceId::parse(parts[1])?;
        let span_id = SpanId::parse(parts[2])?;
        if parts[3].len() != 2 || !is_lower_hex(parts[3]) {
            return None;
        }
        let flags = u8::from_str_radix(parts[3], 16).ok()?;

        let tracestate = tracestate
            .map(TraceState::parse)
            .filter(|state| !state.is_empty());

        Some(Self {
            trace_id,
            span_id,
            flags,
            tracestate,
        })
    }

    /// Derive a child context: same trace id and flags, fresh span id,
    /// inherited trace state.
    pub fn child(&self) -> Self {
        Self {
            trace_id: self.trace_id,
            span_id: SpanId::generate(),
            flags: self.flags,
            tracestate: self.tracestate.clone(),
        }
    }

    /// Render the `traceparent` header value for this context.
    pub fn traceparent(&self) -> String {
        format!(
            "{}-{}-{}-{:02x}",
            SUPPORTED_VERSION, self.trace_id, self.span_id, self.flags
        )
    }

    /// Whether the caller recorded this trace (W3C sampled bit).
    pub fn is_sampled(&self) -> bool {
        self.flags & SAMPLED_FLAG != 0
    }
}
