//! Inbound correlation middleware.
//!
//! The middleware is thin on purpose: all policy lives in
//! `traceability-core`. Per request it extracts the candidate header, asks
//! the policy for a decision, runs the rest of the stack inside the
//! flow-local scope (so handlers, logging, and outbound calls all see the
//! decided id), and reflects the id into the response.
//!
//! # Wiring
//!
//! ```rust,no_run
//! use axum::{middleware::from_fn_with_state, routing::get, Router};
//! use traceability_axum::{correlation_middleware, CorrelationState};
//! use traceability_core::options::TraceabilityOptions;
//!
//! let state = CorrelationState::new(TraceabilityOptions::default());
//! let app: Router = Router::new()
//!     .route("/", get(|| async { "ok" }))
//!     .layer(from_fn_with_state(state, correlation_middleware));
//! ```

use axum::extract::{Request, State};
use axum::http::header::{HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use std::sync::Arc;
use tracing::Instrument;

use traceability_core::ambient::{ActiveSpanContext, AmbientCorrelation};
use traceability_core::diagnostics::{self, DiagnosticsEvent};
use traceability_core::extract::{CorrelationExtractor, HeaderCorrelationExtractor};
use traceability_core::options::TraceabilityOptions;
use traceability_core::policy::{CorrelationPolicy, Decision};
use traceability_core::span::{SpanBridge, SpanKind};
use traceability_core::trace_context::{TRACEPARENT_HEADER, TRACESTATE_HEADER};

/// Shared state for [`correlation_middleware`].
#[derive(Clone)]
pub struct CorrelationState {
    policy: Arc<CorrelationPolicy>,
    bridge: Arc<SpanBridge>,
    extractor: Arc<dyn CorrelationExtractor>,
}

impl CorrelationState {
    /// State with the default extractor and the process-global span bridge.
    pub fn new(options: TraceabilityOptions) -> Self {
        Self {
            policy: Arc::new(CorrelationPolicy::new(options)),
            bridge: Arc::new(SpanBridge::new()),
            extractor: Arc::new(HeaderCorrelationExtractor),
        }
    }

    /// State with an explicit span bridge.
    pub fn with_bridge(options: TraceabilityOptions, bridge: Arc<SpanBridge>) -> Self {
        Self {
            policy: Arc::new(CorrelationPolicy::new(options)),
            bridge,
            extractor: Arc::new(HeaderCorrelationExtractor),
        }
    }

    /// Replace the extractor strategy.
    pub fn with_extractor(mut self, extractor: Arc<dyn CorrelationExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Replace the policy (for a custom validator).
    pub fn with_policy(mut self, policy: Arc<CorrelationPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &CorrelationPolicy {
        &self.policy
    }
}

/// Decide the request's correlation id, establish the flow scope, and
/// reflect the id into the response.
pub async fn correlation_middleware(
    State(state): State<CorrelationState>,
    mut request: Request,
    next: Next,
) -> Response {
    let header_name = &state.policy.options().header_name;
    let header_value = state.extractor.extract(request.headers(), header_name);
    let traceparent = header_str(&request, TRACEPARENT_HEADER);
    let tracestate = header_str(&request, TRACESTATE_HEADER);
    let ambient = AmbientCorrelation::current();

    let decision = state.policy.decide_inbound(
        header_value.as_deref(),
        ambient.as_ref(),
        traceparent.as_deref(),
        tracestate.as_deref(),
    );

    // Handlers get typed access through the `Correlation` extractor.
    request
        .extensions_mut()
        .insert(decision.correlation_id.clone());

    let method = request.method().clone();
    let uri = request.uri().clone();
    let mut server_span = state.bridge.start_span(
        &format!("{} {}", method, uri.path()),
        SpanKind::Server,
        decision.parent.as_ref(),
    );
    if let Some(span) = server_span.as_mut() {
        span.tag_request(&method, &uri);
    }

    // Outbound calls parent under our server span; with recording off they
    // still continue the caller's trace when one arrived.
    let active_context = server_span
        .as_ref()
        .map(|span| span.context.clone())
        .or_else(|| decision.parent.clone());

    let log_span = tracing::info_span!(
        "request",
        correlation_id = %decision.correlation_id,
        method = %method,
        path = %uri.path(),
    );

    let bridge = state.bridge.clone();
    let correlation_id = decision.correlation_id.clone();
    let mut response = AmbientCorrelation::scope(Some(correlation_id), async move {
        let run = async move {
            let response = next.run(request).await;
            if let Some(mut span) = server_span {
                span.tag_response(response.status());
                bridge.end_span(span);
            }
            response
        }
        .instrument(log_span);

        match active_context {
            Some(context) => ActiveSpanContext::scope(context, run).await,
            None => run.await,
        }
    })
    .await;

    write_response_header(&mut response, &decision);
    response
}

fn header_str(request: &Request, name: &str) -> Option<String> {
    request
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}

/// Reflect the decided id into the response. A value or name that cannot
/// be written is skipped and reported, never an error for the caller.
fn write_response_header(response: &mut Response, decision: &Decision) {
    let name = match HeaderName::try_from(decision.response_header_name.as_str()) {
        Ok(name) => name,
        Err(error) => {
            diagnostics::emit(DiagnosticsEvent::ResponseHeaderWriteFailed {
                header_name: decision.response_header_name.clone(),
                reason: error.to_string(),
            });
            return;
        }
    };

    match HeaderValue::from_str(decision.correlation_id.as_str()) {
        Ok(value) => {
            response.headers_mut().insert(name, value);
        }
        Err(error) => {
            diagnostics::emit(DiagnosticsEvent::ResponseHeaderWriteFailed {
                header_name: decision.response_header_name.clone(),
                reason: error.to_string(),
            });
        }
    }
}
