//! Injected logging capability.

use std::fmt;
use std::future::Future;
use tracing::instrument::{Instrument, Instrumented, WithDispatch, WithSubscriber};
use tracing::Dispatch;

/// Logging capability handed to a store at construction.
///
/// The store never installs or relies on a global subscriber. Every
/// operation runs inside a `store_op` span delivered to the dispatch held
/// here, so two stores in one process can log to different sinks.
#[derive(Clone)]
pub struct Telemetry {
    dispatch: Dispatch,
}

impl Telemetry {
    /// Routes store events to the given subscriber.
    pub fn new(dispatch: impl Into<Dispatch>) -> Self {
        Self {
            dispatch: dispatch.into(),
        }
    }

    /// Captures whatever subscriber is the default at the call site.
    pub fn current() -> Self {
        Self {
            dispatch: tracing::dispatcher::get_default(Dispatch::clone),
        }
    }

    /// Discards all store events.
    pub fn silent() -> Self {
        Self {
            dispatch: Dispatch::none(),
        }
    }

    /// Runs `f` with this telemetry's subscriber as the default.
    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }

    /// Wraps an operation future in a span routed to this subscriber.
    pub(crate) fn operation<F: Future>(
        &self,
        operation: &'static str,
        database: &str,
        collection: &str,
        fut: F,
    ) -> WithDispatch<Instrumented<F>> {
        let span = self.in_scope(|| {
            tracing::debug_span!("store_op", op = operation, db = database, coll = collection)
        });
        fut.instrument(span).with_subscriber(self.dispatch.clone())
    }
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::current()
    }
}

impl fmt::Debug for Telemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Telemetry").finish_non_exhaustive()
    }
}
