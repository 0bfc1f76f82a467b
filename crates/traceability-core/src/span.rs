//! Span model and bridge.
//!
//! Spans are timed, tagged units of work keyed by W3C trace/span ids and
//! assembled into a hierarchy through parent contexts. The [`SpanBridge`]
//! is the gate that creates them: it returns nothing when no exporter is
//! attached, and it refuses to create a second server span for a flow that
//! already has one, so a host whose own tracing integration covers the
//! request does not get the same operation exported twice.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use crate::ambient::ActiveSpanContext;
use crate::trace_context::{SpanId, TraceContext};

/// Fixed tag vocabulary used on request, response, and error metadata.
pub mod tags {
    pub const HTTP_METHOD: &str = "http.method";
    pub const HTTP_URL: &str = "http.url";
    pub const HTTP_SCHEME: &str = "http.scheme";
    pub const HTTP_HOST: &str = "http.host";
    pub const HTTP_STATUS_CODE: &str = "http.status_code";
    pub const ERROR: &str = "error";
    pub const ERROR_TYPE: &str = "error.type";
    pub const ERROR_MESSAGE: &str = "error.message";
}

/// Role of a span within the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanKind {
    /// Handles an inbound request.
    Server,
    /// Performs an outbound call on behalf of the request.
    Client,
}

/// Terminal status of a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanStatus {
    Unset,
    Ok,
    Error,
}

/// A single span: context, timing, tags, and outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestSpan {
    pub name: String,
    pub kind: SpanKind,
    /// This span's own trace context (trace id shared with the parent).
    pub context: TraceContext,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<SpanId>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    pub status: SpanStatus,
    pub attributes: BTreeMap<String, String>,
    /// Ordered `key=value` pairs propagated downstream via `tracestate`.
    pub baggage: Vec<(String, String)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RequestSpan {
    fn new(
        name: impl Into<String>,
        kind: SpanKind,
        context: TraceContext,
        parent_span_id: Option<SpanId>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            context,
            parent_span_id,
            started_at: Utc::now(),
            ended_at: None,
            duration_ms: None,
            status: SpanStatus::Unset,
            attributes: BTreeMap::new(),
            baggage: Vec::new(),
            error: None,
        }
    }

    /// Attach or replace a tag.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// Append a baggage entry, preserving insertion order.
    pub fn set_baggage(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.baggage.push((key.into(), value.into()));
    }

    /// Tag the request side: method, url, scheme, host.
    pub fn tag_request(&mut self, method: &http::Method, uri: &http::Uri) {
        self.set_attribute(tags::HTTP_METHOD, method.as_str());
        self.set_attribute(tags::HTTP_URL, uri.to_string());
        if let Some(scheme) = uri.scheme_str() {
            self.set_attribute(tags::HTTP_SCHEME, scheme);
        }
        if let Some(host) = uri.host() {
            self.set_attribute(tags::HTTP_HOST, host);
        }
    }

    /// Tag the terminal response status. Server errors mark the span as
    /// failed; everything else is a completed exchange.
    pub fn tag_response(&mut self, status: http::StatusCode) {
        self.set_attribute(tags::HTTP_STATUS_CODE, status.as_u16().to_string());
        self.status = if status.is_server_error() {
            SpanStatus::Error
        } else {
            SpanStatus::Ok
        };
    }

    /// Tag error metadata and mark the span as failed.
    pub fn record_error<E: std::error::Error>(&mut self, error: &E) {
        let message = error.to_string();
        self.set_attribute(tags::ERROR, "true");
        self.set_attribute(tags::ERROR_TYPE, std::any::type_name::<E>());
        self.set_attribute(tags::ERROR_MESSAGE, message.clone());
        self.status = SpanStatus::Error;
        self.error = Some(message);
    }
}

/// Exporter for completed spans.
pub trait SpanExporter: Send + Sync {
    fn export(&self, span: RequestSpan);
}

static EXPORTER: OnceLock<Arc<dyn SpanExporter>> = OnceLock::new();

/// Attach the process-global span exporter.
///
/// Only the first registration wins; returns `false` if an exporter was
/// already attached.
pub fn set_span_exporter(exporter: Arc<dyn SpanExporter>) -> bool {
    EXPORTER.set(exporter).is_ok()
}

/// Whether a process-global exporter is attached.
pub fn span_exporter_attached() -> bool {
    EXPORTER.get().is_some()
}

/// Creates and finalizes spans.
///
/// The bridge is an injectable collaborator: [`SpanBridge::new`] picks up
/// the process-global exporter, [`SpanBridge::with_exporter`] takes an
/// explicit one, and [`SpanBridge::disabled`] records nothing.
#[derive(Clone)]
pub struct SpanBridge {
    exporter: Option<Arc<dyn SpanExporter>>,
}

impl SpanBridge {
    /// Bridge backed by the process-global exporter (if attached).
    pub fn new() -> Self {
        Self {
            exporter: EXPORTER.get().cloned(),
        }
    }

    /// Bridge backed by an explicit exporter.
    pub fn with_exporter(exporter: Arc<dyn SpanExporter>) -> Self {
        Self {
            exporter: Some(exporter),
        }
    }

    /// Bridge that never records.
    pub fn disabled() -> Self {
        Self { exporter: None }
    }

    /// Whether spans started through this bridge will be recorded.
    pub fn is_enabled(&self) -> bool {
        self.exporter.is_some()
    }

    /// Start a span as a child of `parent` (a fresh root when absent).
    ///
    /// Returns `None` when recording is disabled, and for `Server` spans
    /// when the flow already carries an active span context, which means
    /// some other integration has this request covered.
    pub fn start_span(
        &self,
        name: &str,
        kind: SpanKind,
        parent: Option<&TraceContext>,
    ) -> Option<RequestSpan> {
        if self.exporter.is_none() {
            return None;
        }
        if kind == SpanKind::Server && ActiveSpanContext::current().is_some() {
            tracing::debug!(name, "active span already present, skipping duplicate");
            return None;
        }

        let (context, parent_span_id) = match parent {
            Some(parent) => (parent.child(), Some(parent.span_id)),
            None => (TraceContext::root(), None),
        };
        Some(RequestSpan::new(name, kind, context, parent_span_id))
    }

    /// Start a span whose context the caller has already derived (the
    /// outbound path computes its child context up front so headers can be
    /// injected whether or not recording is enabled).
    pub fn start_span_in(
        &self,
        name: &str,
        kind: SpanKind,
        context: TraceContext,
        parent_span_id: Option<SpanId>,
    ) -> Option<RequestSpan> {
        if self.exporter.is_none() {
            return None;
        }
        Some(RequestSpan::new(name, kind, context, parent_span_id))
    }

    /// Finalize a span: stamp end time and duration, hand it to the
    /// exporter, and log it.
    pub fn end_span(&self, mut span: RequestSpan) {
        let now = Utc::now();
        if span.ended_at.is_none() {
            span.ended_at = Some(now);
            span.duration_ms = Some((now - span.started_at).num_milliseconds().max(0) as u64);
        }
        if span.status == SpanStatus::Unset {
            span.status = SpanStatus::Ok;
        }

        tracing::debug!(
            trace_id = %span.context.trace_id,
            span_id = %span.context.span_id,
            name = %span.name,
            kind = ?span.kind,
            status = ?span.status,
            duration_ms = span.duration_ms,
            "span completed"
        );

        if let Some(exporter) = &self.exporter {
            exporter.export(span);
        }
    }
}

impl Default for SpanBridge {
    fn default() -> Self {
        Self::new()
    }
}
