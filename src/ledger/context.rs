//! Cancellation scope for a ledger operation
//!
//! A [`TxContext`] carries a cancellation token and an optional deadline. The
//! transaction runner races every store call against it, so a cancelled
//! operation stops at its next await point and is then rolled back.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::error::LedgerError;

#[derive(Debug, Clone, Default)]
pub struct TxContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl TxContext {
    /// Never cancelled, no deadline
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Cancelled together with `token` (e.g. a request or shutdown token)
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Child context: cancelled with the parent, deadline is the earlier of both
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let own = Instant::now() + timeout;
        Self {
            token: self.token.child_token(),
            deadline: Some(self.deadline.map_or(own, |d| d.min(own))),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// `Err` if the context is already done
    pub fn check(&self) -> Result<(), LedgerError> {
        if self.token.is_cancelled() {
            return Err(LedgerError::Cancelled);
        }
        match self.deadline {
            Some(d) if Instant::now() >= d => Err(LedgerError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Drive `fut` until it completes or the context is done, whichever is first.
    /// On cancellation `fut` is dropped at its current await point.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, LedgerError> {
        self.check()?;

        let deadline = async {
            match self.deadline {
                Some(d) => tokio::time::sleep_until(d).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(LedgerError::Cancelled),
            _ = deadline => Err(LedgerError::DeadlineExceeded),
            out = fut => Ok(out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_background_runs_to_completion() {
        let ctx = TxContext::background();
        assert_eq!(ctx.run(async { 7 }).await.unwrap(), 7);
        assert!(ctx.check().is_ok());
    }

    #[tokio::test]
    async fn test_cancel_interrupts_pending_future() {
        let ctx = TxContext::background();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let res = ctx.run(std::future::pending::<()>()).await;
        assert!(matches!(res, Err(LedgerError::Cancelled)));
        assert!(matches!(ctx.check(), Err(LedgerError::Cancelled)));
    }

    #[tokio::test]
    async fn test_deadline_interrupts_pending_future() {
        let ctx = TxContext::with_timeout(Duration::from_millis(20));
        let res = ctx.run(std::future::pending::<()>()).await;
        assert!(matches!(res, Err(LedgerError::DeadlineExceeded)));
    }

    #[tokio::test]
    async fn test_external_token_cancels_context() {
        let token = CancellationToken::new();
        let ctx = TxContext::with_token(token.clone());
        assert!(ctx.deadline().is_none());
        token.cancel();
        let res = ctx.run(std::future::pending::<()>()).await;
        assert!(matches!(res, Err(LedgerError::Cancelled)));
    }

    #[tokio::test]
    async fn test_child_inherits_cancellation_and_earlier_deadline() {
        let parent = TxContext::with_timeout(Duration::from_millis(100));
        let child = parent.child_with_timeout(Duration::from_secs(60));
        assert_eq!(child.deadline(), parent.deadline());

        parent.cancel();
        assert!(matches!(child.check(), Err(LedgerError::Cancelled)));
    }
}
