//! Axum integration for `traceability-core`.
//!
//! Provides the inbound half of correlation handling for Axum services:
//!
//! 1. [`correlation_middleware`] decides the request's correlation id,
//!    establishes the flow-local scope, opens the server span, and reflects
//!    the id into the response header.
//! 2. [`Correlation`] gives handlers typed access to the decided id.
//!
//! All decision logic lives in `traceability-core`; this crate only adapts
//! it to Axum's request model. For the outbound half see
//! `traceability_core::outbound`.

pub mod extract;
pub mod middleware;

pub use extract::{Correlation, CorrelationRejection};
pub use middleware::{correlation_middleware, CorrelationState};
