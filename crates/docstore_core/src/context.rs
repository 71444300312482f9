//! Per-call deadlines and cancellation.

use futures::future;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Caller-supplied context for a store operation.
///
/// Carries an optional deadline and the cancellation signals it inherited.
/// The store bounds every call by the shorter of the context deadline and
/// its configured timeout.
#[derive(Clone, Default)]
pub struct Context {
    deadline: Option<Instant>,
    /// Own signal last, ancestors before it.
    cancel: Vec<watch::Receiver<bool>>,
}

impl Context {
    /// A context with no deadline and no cancellation.
    pub fn background() -> Self {
        Self::default()
    }

    /// Returns a context whose deadline is at most `timeout` from now.
    ///
    /// A timeout too large to represent leaves the deadline unchanged.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self,
        }
    }

    /// Returns a context with the given deadline.
    ///
    /// An earlier existing deadline is kept.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    /// Returns a cancellable child context and the handle that cancels it.
    ///
    /// The child also observes every signal of its parent, so cancelling
    /// the parent cancels the child. The handle does not reach the parent.
    pub fn with_cancel(mut self) -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        self.cancel.push(rx);
        (self, CancelHandle { tx: Arc::new(tx) })
    }

    /// The deadline, if one was set.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns true if cancellation was requested here or on an ancestor.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.iter().any(|rx| *rx.borrow())
    }

    /// Time left before the deadline, capped at `limit`.
    pub fn budget(&self, limit: Duration) -> Duration {
        match self.deadline {
            Some(deadline) => deadline.saturating_duration_since(Instant::now()).min(limit),
            None => limit,
        }
    }

    /// Resolves once cancellation is requested; never resolves otherwise.
    pub(crate) async fn cancelled(&self) {
        if self.cancel.is_empty() {
            return std::future::pending().await;
        }
        let waits = self.cancel.iter().cloned().map(|mut rx| {
            Box::pin(async move {
                // A dropped handle can no longer cancel.
                if rx.wait_for(|c| *c).await.is_err() {
                    std::future::pending::<()>().await;
                }
            })
        });
        future::select_all(waits).await;
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("deadline", &self.deadline)
            .field("cancellable", &!self.cancel.is_empty())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Cancels the [`Context`] it was created with.
///
/// Cloning the handle shares the same signal.
#[derive(Clone, Debug)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Returns true if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}
