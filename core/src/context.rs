//! Cancellation and deadlines for in-flight requests.
//!
//! # Design
//! A `Context` is a cheap, cloneable value carrying an optional deadline and
//! the cancellation signals of every `with_cancel` on its ancestry. Deriving
//! a context never loosens it: a later deadline than the current one is
//! ignored, and a child stays cancelled by every handle of its parents. The
//! resource service races every transport call against `Context::done`, so
//! dropping the request future is what aborts the I/O.

use std::future::pending;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{select_all, FutureExt};
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};

/// Why a context stopped accepting work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Cancelled {
    #[error("context canceled")]
    Canceled,
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// Execution context passed to every resource operation.
#[derive(Debug, Clone, Default)]
pub struct Context {
    deadline: Option<Instant>,
    cancel: Vec<watch::Receiver<bool>>,
}

/// Cancels every context derived from the one returned alongside it.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Context {
    /// A context that never expires and cannot be cancelled.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        let deadline = Instant::now()
            .checked_add(timeout)
            .unwrap_or_else(far_future);
        self.with_deadline(deadline)
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) if current <= deadline => current,
            _ => deadline,
        });
        self
    }

    /// Attach a new cancellation signal. Signals inherited from the parent
    /// stay attached, so the child ends when any of its handles fires.
    pub fn with_cancel(mut self) -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        self.cancel.push(rx);
        (self, CancelHandle { tx: Arc::new(tx) })
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Non-blocking check of whether the context is already done.
    pub fn err(&self) -> Option<Cancelled> {
        if self.cancel.iter().any(|rx| *rx.borrow()) {
            return Some(Cancelled::Canceled);
        }
        match self.deadline {
            Some(deadline) if deadline <= Instant::now() => Some(Cancelled::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the context is cancelled or its deadline passes.
    /// Never resolves for a background context.
    pub async fn done(&self) -> Cancelled {
        let deadline = async {
            match self.deadline {
                Some(deadline) => sleep_until(deadline).await,
                None => pending::<()>().await,
            }
        };

        let cancelled = async {
            if self.cancel.is_empty() {
                return pending::<()>().await;
            }
            let signals = self.cancel.iter().cloned().map(|mut rx| {
                async move {
                    // A dropped handle can no longer cancel.
                    if rx.wait_for(|cancelled| *cancelled).await.is_err() {
                        pending::<()>().await;
                    }
                }
                .boxed()
            });
            select_all(signals).await;
        };

        tokio::select! {
            biased;
            _ = cancelled => Cancelled::Canceled,
            _ = deadline => Cancelled::DeadlineExceeded,
        }
    }
}

fn far_future() -> Instant {
    // Roughly 30 years, same horizon tokio uses internally.
    Instant::now() + Duration::from_secs(86400 * 365 * 30)
}
