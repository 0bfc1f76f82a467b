//! The correlation decision engine.
//!
//! One request, three possible identity sources: the inbound correlation
//! header, a correlation id already sitting in the ambient slot, and a W3C
//! trace context. [`CorrelationPolicy::decide_inbound`] reconciles them into
//! a single authoritative [`Decision`], applied identically by every
//! transport integration.
//!
//! Precedence, highest first:
//!
//! 1. `always_generate_new` mints a fresh id regardless of the rest
//!    (trace-id-derived when a sampled trace context is present).
//! 2. A valid inbound header value is adopted verbatim, so callers that
//!    already correlate keep their ids.
//! 3. An ambient value set by an enclosing invocation is preserved; nested
//!    middleware never silently replaces an already-decided id.
//! 4. A parseable `traceparent` contributes its trace id, keeping logs and
//!    traces joined even when only a tracing system called us.
//! 5. Otherwise a fresh random id.

use crate::diagnostics::{self, DiagnosticsEvent};
use crate::id::CorrelationId;
use crate::options::TraceabilityOptions;
use crate::trace_context::TraceContext;
use crate::validate::{CorrelationValidator, DefaultCorrelationValidator};

/// Immutable result of one policy evaluation.
#[derive(Debug, Clone)]
pub struct Decision {
    /// The authoritative correlation id for this request.
    pub correlation_id: CorrelationId,

    /// Header name under which the id is reflected into the response.
    pub response_header_name: String,

    /// The caller's trace context, when a parseable `traceparent` arrived.
    /// New spans for this request parent under it instead of starting a
    /// fresh root trace.
    pub parent: Option<TraceContext>,
}

/// Decision engine combining options, validator, and the three identity
/// sources.
pub struct CorrelationPolicy {
    options: TraceabilityOptions,
    validator: Box<dyn CorrelationValidator>,
}

impl CorrelationPolicy {
    /// Policy with the default validator.
    pub fn new(options: TraceabilityOptions) -> Self {
        Self {
            options,
            validator: Box::new(DefaultCorrelationValidator),
        }
    }

    /// Policy with a custom validator implementation.
    pub fn with_validator(
        options: TraceabilityOptions,
        validator: Box<dyn CorrelationValidator>,
    ) -> Self {
        Self { options, validator }
    }

    pub fn options(&self) -> &TraceabilityOptions {
        &self.options
    }

    /// Evaluate the decision for one inbound request.
    ///
    /// `header_value` is the extracted correlation header, `ambient` the
    /// flow's pre-existing id, `traceparent`/`tracestate` the raw trace
    /// propagation headers. Malformed inputs are never errors: an invalid
    /// header id is discarded (reported on the diagnostics channel) and an
    /// unparseable `traceparent` is ignored.
    pub fn decide_inbound(
        &self,
        header_value: Option<&str>,
        ambient: Option<&CorrelationId>,
        traceparent: Option<&str>,
        tracestate: Option<&str>,
    ) -> Decision {
        let parent = traceparent.and_then(|value| TraceContext::parse(value, tracestate));

        let correlation_id = if self.options.always_generate_new {
            self.fresh_id(parent.as_ref())
        } else if let Some(value) = header_value {
            if self.validator.validate(value, &self.options) {
                CorrelationId::new(value)
            } else {
                diagnostics::emit(DiagnosticsEvent::CorrelationIdRejected {
                    rejected: value.to_string(),
                });
                tracing::debug!(
                    rejected = %value,
                    "inbound correlation id failed validation, generating a new one"
                );
                self.decide_without_header(ambient, parent.as_ref())
            }
        } else {
            self.decide_without_header(ambient, parent.as_ref())
        };

        Decision {
            correlation_id,
            response_header_name: self.options.header_name.clone(),
            parent,
        }
    }

    /// Tiers 3..5: no usable header value.
    fn decide_without_header(
        &self,
        ambient: Option<&CorrelationId>,
        parent: Option<&TraceContext>,
    ) -> CorrelationId {
        if let Some(existing) = ambient {
            existing.clone()
        } else if let Some(context) = parent {
            CorrelationId::from_trace_id(context.trace_id)
        } else {
            CorrelationId::generate()
        }
    }

    /// A fresh id for `always_generate_new`: derived from the trace id when
    /// the caller is recording, random otherwise.
    fn fresh_id(&self, parent: Option<&TraceContext>) -> CorrelationId {
        match parent {
            Some(context) if context.is_sampled() => {
                CorrelationId::from_trace_id(context.trace_id)
            }
            _ => CorrelationId::generate(),
        }
    }
}
