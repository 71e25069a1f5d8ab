//! Call context carrying a deadline and cancellation signals.
//!
//! A [`Context`] is handed to the orchestrator and from there to connectors
//! and fallbacks. It never cancels anything by itself; code that wants to
//! honour it either polls [`Context::err`] or races work through
//! [`Context::run`].

use std::future::Future;
use std::time::Duration;

use futures_util::future::{select_all, FutureExt};
use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::ContextError;

/// Deadline and cancellation scope for a single call.
#[derive(Debug, Clone, Default)]
pub struct Context {
    deadline: Option<Instant>,
    cancels: Vec<watch::Receiver<bool>>,
}

/// Cancels every context derived from the one that created it.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl Context {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// Derive a context that expires after `timeout`.
    ///
    /// A timeout too large to represent as an instant adds no deadline.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(at) => self.with_deadline(at),
            None => self,
        }
    }

    /// Derive a context that expires at `at`. The earlier deadline wins.
    pub fn with_deadline(mut self, at: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) if existing <= at => existing,
            _ => at,
        });
        self
    }

    /// Derive a cancellable context.
    pub fn with_cancel(mut self) -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        self.cancels.push(rx);
        (self, CancelHandle { tx })
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Why the context is done, or `None` while it is still live.
    pub fn err(&self) -> Option<ContextError> {
        if self.cancels.iter().any(|rx| *rx.borrow()) {
            return Some(ContextError::Cancelled);
        }
        match self.deadline {
            Some(at) if Instant::now() >= at => Some(ContextError::DeadlineExceeded),
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Resolves once the context is cancelled or its deadline passes.
    ///
    /// Never resolves for a background context.
    pub async fn done(&self) -> ContextError {
        let cancelled = async {
            if self.cancels.is_empty() {
                return std::future::pending::<()>().await;
            }
            let waits = self.cancels.iter().cloned().map(|mut rx| {
                async move {
                    // A dropped handle can no longer cancel.
                    let closed = rx.wait_for(|c| *c).await.is_err();
                    if closed {
                        std::future::pending::<()>().await;
                    }
                }
                .boxed()
            });
            select_all(waits).await;
        };
        let expired = async {
            match self.deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = cancelled => ContextError::Cancelled,
            _ = expired => ContextError::DeadlineExceeded,
        }
    }

    /// Race `fut` against the context.
    pub async fn run<F>(&self, fut: F) -> Result<F::Output, ContextError>
    where
        F: Future,
    {
        if let Some(err) = self.err() {
            return Err(err);
        }
        tokio::select! {
            biased;
            err = self.done() => Err(err),
            out = fut => Ok(out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_background_runs_to_completion() {
        let ctx = Context::background();
        assert!(ctx.err().is_none());
        assert_eq!(ctx.run(async { 7 }).await, Ok(7));
    }

    #[tokio::test]
    async fn test_cancelled_context_short_circuits() {
        let (ctx, handle) = Context::background().with_cancel();
        handle.cancel();
        assert_eq!(ctx.err(), Some(ContextError::Cancelled));

        let out = ctx.run(async { 1 }).await;
        assert_eq!(out, Err(ContextError::Cancelled));
    }

    #[tokio::test]
    async fn test_cancel_interrupts_pending_work() {
        let (ctx, handle) = Context::background().with_cancel();
        let child = ctx.clone();
        let task = tokio::spawn(async move { child.run(std::future::pending::<()>()).await });
        handle.cancel();
        assert_eq!(task.await.ok(), Some(Err(ContextError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_expires() {
        let ctx = Context::background().with_timeout(Duration::from_millis(50));
        let out = ctx
            .run(tokio::time::sleep(Duration::from_secs(5)))
            .await;
        assert_eq!(out, Err(ContextError::DeadlineExceeded));
        assert_eq!(ctx.err(), Some(ContextError::DeadlineExceeded));
    }

    #[tokio::test]
    async fn test_unrepresentable_timeout_adds_no_deadline() {
        let ctx = Context::background().with_timeout(Duration::MAX);
        assert_eq!(ctx.deadline(), None);
        assert_eq!(ctx.run(async { 3 }).await, Ok(3));

        let bounded = Context::background()
            .with_timeout(Duration::from_secs(5))
            .with_timeout(Duration::MAX);
        assert!(bounded.deadline().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_earliest_deadline_wins() {
        let now = Instant::now();
        let ctx = Context::background()
            .with_deadline(now + Duration::from_secs(1))
            .with_deadline(now + Duration::from_secs(10));
        assert_eq!(ctx.deadline(), Some(now + Duration::from_secs(1)));
    }

    #[tokio::test]
    async fn test_dropped_handle_never_cancels() {
        let (ctx, handle) = Context::background().with_cancel();
        drop(handle);
        assert!(ctx.err().is_none());
        assert_eq!(ctx.run(async { "ok" }).await, Ok("ok"));
    }
}
