//! Axum extractor for the request's correlation id.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{request::Parts, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use traceability_core::ambient::AmbientCorrelation;
use traceability_core::id::CorrelationId;

/// Extractor handing the decided correlation id to a handler.
///
/// Reads the id the middleware stored in request extensions, falling back
/// to the ambient slot. Requires [`correlation_middleware`] (or another
/// source of ambient correlation) upstream.
///
/// [`correlation_middleware`]: crate::middleware::correlation_middleware
///
/// ```rust,no_run
/// use traceability_axum::Correlation;
///
/// async fn handler(Correlation(id): Correlation) -> String {
///     format!("handling {}", id)
/// }
/// ```
pub struct Correlation(pub CorrelationId);

/// Rejection for requests that reached a handler without a decided id.
pub struct CorrelationRejection;

impl IntoResponse for CorrelationRejection {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({
                "error": "CORRELATION_NOT_DECIDED",
                "message": "correlation middleware is not installed on this route"
            })),
        )
            .into_response()
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Correlation {
    type Rejection = CorrelationRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(id) = parts.extensions.get::<CorrelationId>() {
            return Ok(Self(id.clone()));
        }
        AmbientCorrelation::current()
            .map(Self)
            .ok_or(CorrelationRejection)
    }
}
