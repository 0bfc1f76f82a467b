//! Flow-local ambient state.
//!
//! Holds the "current" correlation id (and the active span context) for one
//! logical flow of execution. Storage is a `tokio::task_local!` slot: values
//! follow the logical call chain across `.await` suspension points and
//! worker-thread migrations, and are invisible to concurrently running
//! flows. Spawned tasks start empty unless run through [`AmbientCorrelation::fork`],
//! which seeds the child with a copy of the parent's value; the copies then
//! evolve independently.
//!
//! # Example
//!
//! ```rust
//! use traceability_core::ambient::AmbientCorrelation;
//! use traceability_core::id::CorrelationId;
//!
//! #[tokio::main]
//! async fn main() {
//!     let id = CorrelationId::generate();
//!     AmbientCorrelation::scope(Some(id.clone()), async move {
//!         assert_eq!(AmbientCorrelation::current(), Some(id));
//!     })
//!     .await;
//! }
//! ```

use std::cell::RefCell;
use std::future::Future;

use crate::id::CorrelationId;
use crate::trace_context::TraceContext;

tokio::task_local! {
    static CURRENT_CORRELATION: RefCell<Option<CorrelationId>>;
    static ACTIVE_SPAN: RefCell<Option<TraceContext>>;
}

/// The flow-local correlation id slot.
pub struct AmbientCorrelation;

impl AmbientCorrelation {
    /// Side-effect-free read of the flow's current correlation id.
    ///
    /// Returns `None` when the flow has no id yet or the caller is outside
    /// any flow scope. Never mints an identifier; diagnostics and logging
    /// can observe the slot without changing it.
    pub fn current() -> Option<CorrelationId> {
        CURRENT_CORRELATION
            .try_with(|slot| slot.borrow().clone())
            .ok()
            .flatten()
    }

    /// Replace the flow's current correlation id.
    ///
    /// Returns `false` when no flow scope is active, in which case nothing
    /// is stored.
    pub fn set(id: CorrelationId) -> bool {
        CURRENT_CORRELATION
            .try_with(|slot| {
                *slot.borrow_mut() = Some(id);
            })
            .is_ok()
    }

    /// The flow's current id, or a freshly generated one stored for the
    /// rest of the flow.
    ///
    /// Outside a flow scope there is nothing to store in; a fresh id is
    /// returned each call.
    pub fn get_or_create() -> CorrelationId {
        CURRENT_CORRELATION
            .try_with(|slot| {
                let mut slot = slot.borrow_mut();
                match slot.as_ref() {
                    Some(id) => id.clone(),
                    None => {
                        let id = CorrelationId::generate();
                        *slot = Some(id.clone());
                        id
                    }
                }
            })
            .unwrap_or_else(|_| CorrelationId::generate())
    }

    /// Run `future` inside a flow scope seeded with `initial`.
    ///
    /// This is the flow boundary: everything the future awaits sees the
    /// same slot, and the slot disappears when the future completes.
    pub async fn scope<F: Future>(initial: Option<CorrelationId>, future: F) -> F::Output {
        CURRENT_CORRELATION
            .scope(RefCell::new(initial), future)
            .await
    }

    /// Run `future` as a child flow seeded with a copy of the caller's
    /// current value.
    ///
    /// The child may overwrite its copy freely; the parent never observes
    /// the change, and vice versa.
    pub async fn fork<F: Future>(future: F) -> F::Output {
        let snapshot = Self::current();
        CURRENT_CORRELATION
            .scope(RefCell::new(snapshot), future)
            .await
    }
}

/// The flow-local active span context.
///
/// Set by the inbound integration for the duration of a request and read by
/// the outbound propagator to parent child spans. Also the signal that a
/// span already covers this operation, so the bridge can skip creating a
/// duplicate.
pub struct ActiveSpanContext;

impl ActiveSpanContext {
    /// The span context covering the current flow, if any.
    pub fn current() -> Option<TraceContext> {
        ACTIVE_SPAN
            .try_with(|slot| slot.borrow().clone())
            .ok()
            .flatten()
    }

    /// Run `future` with `context` as the flow's active span context.
    pub async fn scope<F: Future>(context: TraceContext, future: F) -> F::Output {
        ACTIVE_SPAN
            .scope(RefCell::new(Some(context)), future)
            .await
    }
}
