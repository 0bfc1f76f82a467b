//! Traceability Core
//!
//! Request-scoped correlation: one identifier per logical request, decided
//! once, visible everywhere the request's code runs, and propagated to
//! every outbound call the request makes.
//!
//! ## Features
//!
//! - **Decision Policy**: reconciles the inbound correlation header, the
//!   flow's pre-existing ambient id, and W3C trace context into a single
//!   authoritative id, with one precedence order shared by every transport
//!   integration
//! - **Flow-Local Ambient Store**: the current id follows the logical call
//!   chain across `.await` points and worker threads, isolated from
//!   concurrent requests
//! - **W3C Trace Context**: `traceparent`/`tracestate` parsing and
//!   rendering, strict version-00 lowercase-hex form
//! - **Span Bridge**: hierarchical request/outbound spans with a fixed tag
//!   vocabulary, free when no exporter is attached, and duplicate-safe when
//!   a host tracing integration already covers the request
//! - **Outbound Propagation**: wraps caller-supplied transports (closure or
//!   `tower` stack) to inject trace and correlation headers and to tag the
//!   downstream outcome
//! - **Diagnostics**: opt-in structured failure events that never affect
//!   request outcome
//!
//! ## Architecture
//!
//! 1. **Extraction** (`extract`): pull the candidate id out of the inbound
//!    request's headers.
//! 2. **Validation** (`validate`): opt-in shape check for inbound ids.
//! 3. **Decision** (`policy`): combine header, ambient, and trace context
//!    into a [`policy::Decision`].
//! 4. **Ambient state** (`ambient`): the decided id (and active span
//!    context) for the rest of the flow.
//! 5. **Spans** (`span`) and **outbound calls** (`outbound`): record the
//!    request hierarchy and carry identity downstream.
//!
//! Transport integrations (an Axum middleware lives in
//! `traceability-axum`) consume the decision API and the ambient store;
//! they contain no policy of their own.
//!
//! ## Example
//!
//! ```rust
//! use traceability_core::ambient::AmbientCorrelation;
//! use traceability_core::options::TraceabilityOptions;
//! use traceability_core::policy::CorrelationPolicy;
//!
//! #[tokio::main]
//! async fn main() {
//!     let policy = CorrelationPolicy::new(TraceabilityOptions::default());
//!
//!     // Inbound request carried an id; the decision adopts it.
//!     let decision = policy.decide_inbound(Some("order-7781"), None, None, None);
//!     assert_eq!(decision.correlation_id.as_str(), "order-7781");
//!
//!     // Everything running inside the scope sees the decided id.
//!     AmbientCorrelation::scope(Some(decision.correlation_id.clone()), async {
//!         assert_eq!(AmbientCorrelation::current(), Some(decision.correlation_id.clone()));
//!     })
//!     .await;
//! }
//! ```

pub mod ambient;
pub mod diagnostics;
pub mod error;
pub mod extract;
pub mod id;
pub mod options;
pub mod outbound;
pub mod policy;
pub mod span;
pub mod trace_context;
pub mod validate;

pub use ambient::{ActiveSpanContext, AmbientCorrelation};
pub use diagnostics::{set_diagnostics_listener, DiagnosticsEvent, DiagnosticsListener};
pub use error::{Result, TraceabilityError};
pub use extract::{CorrelationExtractor, HeaderCarrier, HeaderCorrelationExtractor};
pub use id::CorrelationId;
pub use options::{TraceabilityOptions, DEFAULT_CORRELATION_HEADER, SERVICE_NAME_ENV};
pub use outbound::{OutboundPropagator, PropagationLayer, PropagationService};
pub use policy::{CorrelationPolicy, Decision};
pub use span::{
    set_span_exporter, RequestSpan, SpanBridge, SpanExporter, SpanKind, SpanStatus,
};
pub use trace_context::{
    SpanId, TraceContext, TraceId, TraceState, TRACEPARENT_HEADER, TRACESTATE_HEADER,
};
pub use validate::{
    CorrelationValidator, DefaultCorrelationValidator, MAX_CORRELATION_ID_LENGTH,
};
