//! Integration tests for the Axum correlation middleware
//!
//! Drives a real router through `tower::ServiceExt::oneshot` and checks:
//! - adoption and reflection of caller-supplied correlation ids
//! - replacement of malformed ids when validation is enabled
//! - trace-context fallback (`traceparent` supplies the id)
//! - fresh-id generation and flow-stable ambient reads
//! - nesting (an inner middleware never replaces the outer decision)
//! - outbound propagation continuing the inbound trace

use axum::body::Body;
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::{Json, Router};
use http::{Request, StatusCode};
use std::sync::Arc;
use tower::ServiceExt;

use traceability_axum::{correlation_middleware, Correlation, CorrelationState};
use traceability_core::ambient::AmbientCorrelation;
use traceability_core::options::TraceabilityOptions;
use traceability_core::outbound::OutboundPropagator;
use traceability_core::span::SpanBridge;
use traceability_core::trace_context::TraceContext;

const TRACEPARENT: &str = "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01";

/// Echoes the decided id after checking that the extractor and the ambient
/// store agree.
async fn echo_correlation(Correlation(id): Correlation) -> String {
    let ambient = AmbientCorrelation::current().expect("flow scope must be active");
    assert_eq!(ambient, id);

    // A second read within the same flow returns the same id.
    assert_eq!(AmbientCorrelation::current(), Some(id.clone()));

    id.into_inner()
}

fn app(options: TraceabilityOptions) -> Router {
    let state = CorrelationState::with_bridge(options, Arc::new(SpanBridge::disabled()));
    Router::new()
        .route("/", get(echo_correlation))
        .layer(from_fn_with_state(state, correlation_middleware))
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    String::from_utf8(bytes.to_vec()).expect("utf8 body")
}

fn is_generated_format(id: &str) -> bool {
    id.len() == 32 && id.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

#[tokio::test]
async fn test_inbound_id_is_adopted_and_reflected() {
    let response = app(TraceabilityOptions::default())
        .oneshot(
            Request::builder()
                .uri("/")
                .header("X-Correlation-Id", "order-7781")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("X-Correlation-Id").unwrap(),
        "order-7781"
    );
    assert_eq!(body_string(response).await, "order-7781");
}

#[tokio::test]
async fn test_malformed_id_is_replaced_when_validation_enabled() {
    let response = app(TraceabilityOptions::default().validate_format(true))
        .oneshot(
            Request::builder()
                .uri("/")
                .header("X-Correlation-Id", "abc def")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let reflected = response
        .headers()
        .get("X-Correlation-Id")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert_ne!(reflected, "abc def");
    assert!(is_generated_format(&reflected));
    assert_eq!(body_string(response).await, reflected);
}

#[tokio::test]
async fn test_traceparent_supplies_the_id() {
    let response = app(TraceabilityOptions::default())
        .oneshot(
            Request::builder()
                .uri("/")
                .header("traceparent", TRACEPARENT)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        response.headers().get("X-Correlation-Id").unwrap(),
        "4bf92f3577b34da6a3ce929d0e0e4736"
    );
    assert_eq!(
        body_string(response).await,
        "4bf92f3577b34da6a3ce929d0e0e4736"
    );
}

#[tokio::test]
async fn test_fresh_id_generated_when_header_absent() {
    let response = app(TraceabilityOptions::default())
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let reflected = response
        .headers()
        .get("X-Correlation-Id")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(is_generated_format(&reflected));
    // The handler saw the same id on every ambient read.
    assert_eq!(body_string(response).await, reflected);
}

#[tokio::test]
async fn test_custom_header_name() {
    let response = app(TraceabilityOptions::with_header_name("X-Request-Id"))
        .oneshot(
            Request::builder()
                .uri("/")
                .header("X-Request-Id", "custom-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.headers().get("X-Request-Id").unwrap(), "custom-123");
    assert!(response.headers().get("X-Correlation-Id").is_none());
}

#[tokio::test]
async fn test_nested_middleware_preserves_outer_decision() {
    let outer = CorrelationState::with_bridge(
        TraceabilityOptions::default(),
        Arc::new(SpanBridge::disabled()),
    );
    let inner = CorrelationState::with_bridge(
        TraceabilityOptions::default(),
        Arc::new(SpanBridge::disabled()),
    );

    // The later `.layer(...)` call is the outer one; the request passes it
    // first, so the inner instance sees an ambient id already decided.
    let app = Router::new()
        .route("/", get(echo_correlation))
        .layer(from_fn_with_state(inner, correlation_middleware))
        .layer(from_fn_with_state(outer, correlation_middleware));

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let reflected = response
        .headers()
        .get("X-Correlation-Id")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(is_generated_format(&reflected));
    // The handler saw the outer id, not a second generated one.
    assert_eq!(body_string(response).await, reflected);
}

#[derive(serde::Deserialize)]
struct OutboundReport {
    correlation: String,
    traceparent: String,
}

/// Handler that makes an outbound call and reports what was injected.
async fn call_downstream(Correlation(id): Correlation) -> Json<serde_json::Value> {
    let propagator = OutboundPropagator::with_bridge(
        TraceabilityOptions::default(),
        Arc::new(SpanBridge::disabled()),
    );

    let request = Request::builder()
        .uri("http://downstream.internal/stock")
        .body(())
        .expect("static request");

    let response = propagator
        .send(request, |request: Request<()>| {
            let correlation = request
                .headers()
                .get("X-Correlation-Id")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            let traceparent = request
                .headers()
                .get("traceparent")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            std::future::ready(Ok::<_, std::io::Error>(
                http::Response::builder()
                    .status(200)
                    .body((correlation, traceparent))
                    .expect("static response"),
            ))
        })
        .await
        .expect("stub transport cannot fail");

    let (correlation, traceparent) = response.into_body();
    assert_eq!(correlation, id.as_str());

    Json(serde_json::json!({
        "correlation": correlation,
        "traceparent": traceparent,
    }))
}

#[tokio::test]
async fn test_outbound_call_continues_inbound_trace() {
    let state = CorrelationState::with_bridge(
        TraceabilityOptions::default(),
        Arc::new(SpanBridge::disabled()),
    );
    let app = Router::new()
        .route("/proxy", get(call_downstream))
        .layer(from_fn_with_state(state, correlation_middleware));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/proxy")
                .header("traceparent", TRACEPARENT)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let report: OutboundReport = serde_json::from_str(&body_string(response).await).unwrap();

    // The outbound call carried the decided correlation id.
    assert_eq!(report.correlation, "4bf92f3577b34da6a3ce929d0e0e4736");

    // The outbound traceparent stays in the inbound trace, one hop down.
    let outbound = TraceContext::parse(&report.traceparent, None).unwrap();
    assert_eq!(
        outbound.trace_id.to_string(),
        "4bf92f3577b34da6a3ce929d0e0e4736"
    );
    assert_ne!(outbound.span_id.to_string(), "00f067aa0ba902b7");
}

#[tokio::test]
async fn test_handler_without_middleware_is_rejected() {
    let app = Router::new().route("/", get(echo_correlation));

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_string(response).await;
    assert!(body.contains("CORRELATION_NOT_DECIDED"));
}
