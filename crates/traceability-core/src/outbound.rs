//! Outbound propagation.
//!
//! Wraps a caller-supplied transport operation so every outbound call made
//! during a request carries the request's identity downstream: a child
//! `traceparent` (parented under the flow's active span), a `tracestate`
//! built from the child span's baggage, and exactly one copy of the legacy
//! correlation header. Completion and failure are tagged onto the child
//! span; errors pass through unchanged, as does cancellation of the
//! transport future.
//!
//! Two surfaces expose the same behavior: [`OutboundPropagator::send`] for
//! direct use around any `http`-shaped transport closure, and
//! [`PropagationLayer`] for `tower`-based clients.

use http::header::{HeaderName, HeaderValue};
use http::{Request, Response};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

use crate::ambient::{ActiveSpanContext, AmbientCorrelation};
use crate::diagnostics::{self, DiagnosticsEvent};
use crate::options::TraceabilityOptions;
use crate::span::{RequestSpan, SpanBridge, SpanKind};
use crate::trace_context::{TraceContext, TraceState, TRACEPARENT_HEADER, TRACESTATE_HEADER};

/// Injects propagation headers and records a client span around an
/// outbound call.
#[derive(Clone)]
pub struct OutboundPropagator {
    options: Arc<TraceabilityOptions>,
    bridge: Arc<SpanBridge>,
}

impl OutboundPropagator {
    /// Propagator with the process-global span bridge.
    pub fn new(options: TraceabilityOptions) -> Self {
        Self {
            options: Arc::new(options),
            bridge: Arc::new(SpanBridge::new()),
        }
    }

    /// Propagator with an explicit span bridge.
    pub fn with_bridge(options: TraceabilityOptions, bridge: Arc<SpanBridge>) -> Self {
        Self {
            options: Arc::new(options),
            bridge,
        }
    }

    /// Run `transport` for `request` with propagation applied.
    ///
    /// The transport keeps its own error type and cancellation semantics;
    /// this wrapper only decorates the request and observes the outcome.
    pub async fn send<B, RB, E, F, Fut>(
        &self,
        mut request: Request<B>,
        transport: F,
    ) -> Result<Response<RB>, E>
    where
        F: FnOnce(Request<B>) -> Fut,
        Fut: Future<Output = Result<Response<RB>, E>>,
        E: std::error::Error,
    {
        // The child context exists whether or not a span is recorded, so
        // downstream always receives a coherent traceparent.
        let parent = ActiveSpanContext::current();
        let context = match &parent {
            Some(parent) => parent.child(),
            None => TraceContext::root(),
        };

        let name = format!("{} {}", request.method(), request.uri().path());
        let mut span = self.bridge.start_span_in(
            &name,
            SpanKind::Client,
            context.clone(),
            parent.as_ref().map(|p| p.span_id),
        );
        if let Some(span) = span.as_mut() {
            span.tag_request(request.method(), request.uri());
        }

        self.inject_headers(&mut request, &context, span.as_ref());

        match transport(request).await {
            Ok(response) => {
                if let Some(mut span) = span {
                    span.tag_response(response.status());
                    self.bridge.end_span(span);
                }
                Ok(response)
            }
            Err(error) => {
                if let Some(mut span) = span {
                    span.record_error(&error);
                    self.bridge.end_span(span);
                }
                Err(error)
            }
        }
    }

    fn inject_headers<B>(
        &self,
        request: &mut Request<B>,
        context: &TraceContext,
        span: Option<&RequestSpan>,
    ) {
        let headers = request.headers_mut();

        if let Ok(value) = HeaderValue::from_str(&context.traceparent()) {
            headers.insert(HeaderName::from_static(TRACEPARENT_HEADER), value);
        }

        if let Some(span) = span {
            if !span.baggage.is_empty() {
                let state = TraceState::from_pairs(span.baggage.iter().cloned());
                if let Ok(value) = HeaderValue::from_str(&state.header_value()) {
                    headers.insert(HeaderName::from_static(TRACESTATE_HEADER), value);
                }
            }
        }

        // insert() replaces every previous value, which is what keeps the
        // correlation header single-valued downstream.
        let correlation_id = AmbientCorrelation::get_or_create();
        match (
            HeaderName::try_from(self.options.header_name.as_str()),
            HeaderValue::from_str(correlation_id.as_str()),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            (name_result, _) => {
                let reason = if name_result.is_err() {
                    "invalid header name"
                } else {
                    "correlation id is not valid header data"
                };
                diagnostics::emit(DiagnosticsEvent::OutboundHeaderWriteFailed {
                    header_name: self.options.header_name.clone(),
                    reason: reason.to_string(),
                });
            }
        }
    }
}

/// `tower` layer applying [`OutboundPropagator`] to a client service stack.
#[derive(Clone)]
pub struct PropagationLayer {
    propagator: OutboundPropagator,
}

impl PropagationLayer {
    pub fn new(options: TraceabilityOptions) -> Self {
        Self {
            propagator: OutboundPropagator::new(options),
        }
    }

    pub fn with_bridge(options: TraceabilityOptions, bridge: Arc<SpanBridge>) -> Self {
        Self {
            propagator: OutboundPropagator::with_bridge(options, bridge),
        }
    }
}

impl<S> Layer<S> for PropagationLayer {
    type Service = PropagationService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        PropagationService {
            inner,
            propagator: self.propagator.clone(),
        }
    }
}

/// Service produced by [`PropagationLayer`].
#[derive(Clone)]
pub struct PropagationService<S> {
    inner: S,
    propagator: OutboundPropagator,
}

impl<S, B, RB> Service<Request<B>> for PropagationService<S>
where
    S: Service<Request<B>, Response = Response<RB>> + Clone + Send + 'static,
    S::Error: std::error::Error,
    S::Future: Send,
    B: Send + 'static,
    RB: Send + 'static,
{
    type Response = Response<RB>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<B>) -> Self::Future {
        // Take the service that was polled ready, leave a fresh clone.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let propagator = self.propagator.clone();

        Box::pin(async move { propagator.send(request, move |req| inner.call(req)).await })
    }
}
