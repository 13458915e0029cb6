//! Transaction Runner
//!
//! Opens one transaction, runs a unit of work against it exactly once, then
//! commits on success or rolls back on failure. No retries, and no error is
//! ever dropped: a failed rollback is reported together with the failure
//! that caused it.

use futures::future::BoxFuture;
use tracing::{debug, error, warn};

use super::context::TxContext;
use super::error::LedgerError;
use crate::store::{Store, Transaction};

/// Run `work` inside a new transaction on `store`.
///
/// Exactly one of commit/rollback is issued on every path that got past
/// `begin`. Cancellation or deadline expiry of `ctx` interrupts the unit of
/// work and begin, never commit or rollback; a context that is done by the
/// time the unit of work returns leads to a rollback.
pub async fn exec_tx<S, T, F>(store: &S, ctx: &TxContext, work: F) -> Result<T, LedgerError>
where
    S: Store,
    T: Send,
    F: for<'c> FnOnce(&'c mut S::Tx) -> BoxFuture<'c, Result<T, LedgerError>> + Send,
{
    let mut tx = ctx.run(store.begin()).await??;
    debug!(store = store.name(), "tx begin");

    let outcome = ctx
        .run(work(&mut tx))
        .await
        .and_then(|res| res)
        .and_then(|value| ctx.check().map(|_| value));

    match outcome {
        Ok(value) => {
            tx.commit().await?;
            debug!(store = store.name(), "tx committed");
            Ok(value)
        }
        Err(tx_err) => match tx.rollback().await {
            Ok(()) => {
                warn!(store = store.name(), error = %tx_err, "tx rolled back");
                Err(tx_err)
            }
            Err(rb_err) => {
                error!(
                    store = store.name(),
                    error = %tx_err,
                    rollback_error = %rb_err,
                    "tx rollback failed"
                );
                Err(LedgerError::RollbackFailed {
                    tx_err: Box::new(tx_err),
                    rb_err,
                })
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::currency::Currency;
    use crate::store::{
        CreateAccountParams, CreateUserParams, FaultPoint, MemoryStore, Queries, StoreError,
        StoreErrorKind,
    };

    async fn seed(store: &MemoryStore, balance: i64) -> i64 {
        exec_tx(store, &TxContext::background(), |q| {
            Box::pin(async move {
                q.create_user(CreateUserParams {
                    username: "runner".into(),
                    hashed_password: "h".into(),
                    full_name: "Runner".into(),
                    email: "runner@example.com".into(),
                })
                .await?;
                let account = q
                    .create_account(CreateAccountParams {
                        owner: "runner".into(),
                        currency: Currency::CAD,
                        balance,
                    })
                    .await?;
                Ok(account.id)
            })
        })
        .await
        .unwrap()
    }

    async fn balance(store: &MemoryStore, id: i64) -> i64 {
        exec_tx(store, &TxContext::background(), |q| {
            Box::pin(async move { Ok(q.get_account(id).await?.balance) })
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_commit_on_success() {
        let store = MemoryStore::new();
        let id = seed(&store, 10).await;

        let updated = exec_tx(&store, &TxContext::background(), |q| {
            Box::pin(async move { Ok(q.add_account_balance(id, 5).await?) })
        })
        .await
        .unwrap();

        assert_eq!(updated.balance, 15);
        assert_eq!(balance(&store, id).await, 15);
    }

    #[tokio::test]
    async fn test_rollback_on_failure_returns_original_error() {
        let store = MemoryStore::new();
        let id = seed(&store, 10).await;

        let err = exec_tx(&store, &TxContext::background(), |q| {
            Box::pin(async move {
                q.add_account_balance(id, 100).await?;
                Err::<(), _>(StoreError::other("boom").into())
            })
        })
        .await
        .unwrap_err();

        assert_eq!(err.to_string(), "boom");
        assert_eq!(balance(&store, id).await, 10);
    }

    #[tokio::test]
    async fn test_failed_rollback_reports_both_errors() {
        let store = MemoryStore::new();
        let id = seed(&store, 10).await;
        store.fail_on(FaultPoint::Rollback, 0);

        let err = exec_tx(&store, &TxContext::background(), |q| {
            Box::pin(async move {
                q.add_account_balance(id, 1).await?;
                Err::<(), _>(StoreError::not_found("gone").into())
            })
        })
        .await
        .unwrap_err();

        match &err {
            LedgerError::RollbackFailed { tx_err, rb_err } => {
                assert!(tx_err.is_not_found());
                assert_eq!(rb_err.kind, StoreErrorKind::Unavailable);
            }
            other => panic!("expected RollbackFailed, got {:?}", other),
        }
        assert!(err.to_string().starts_with("tx err: gone, rb err: "));
        assert_eq!(balance(&store, id).await, 10);
    }

    #[tokio::test]
    async fn test_commit_failure_is_the_result() {
        let store = MemoryStore::new();
        let id = seed(&store, 10).await;
        store.fail_on(FaultPoint::Commit, 0);

        let err = exec_tx(&store, &TxContext::background(), |q| {
            Box::pin(async move { Ok(q.add_account_balance(id, 1).await?) })
        })
        .await
        .unwrap_err();

        assert_eq!(err.store_kind(), Some(StoreErrorKind::Unavailable));
        assert_eq!(balance(&store, id).await, 10);
    }

    #[tokio::test]
    async fn test_begin_failure_never_runs_work() {
        let store = MemoryStore::new();
        store.fail_on(FaultPoint::Begin, 0);

        let mut ran = false;
        let res = exec_tx(&store, &TxContext::background(), |_q| {
            ran = true;
            Box::pin(async move { Ok(()) })
        })
        .await;

        assert!(res.is_err());
        assert!(!ran);
    }

    #[tokio::test]
    async fn test_cancellation_rolls_back_and_releases_locks() {
        let store = MemoryStore::with_lock_timeout(Duration::from_millis(200));
        let id = seed(&store, 10).await;

        let ctx = TxContext::background();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let err = exec_tx(&store, &ctx, |q| {
            Box::pin(async move {
                q.add_account_balance(id, 50).await?;
                // Hold the row lock until cancelled
                std::future::pending::<()>().await;
                Ok(())
            })
        })
        .await
        .unwrap_err();
        assert!(matches!(err, LedgerError::Cancelled));

        // Lock must be free again and the write gone
        let locked = exec_tx(&store, &TxContext::background(), |q| {
            Box::pin(async move { Ok(q.get_account_for_update(id).await?) })
        })
        .await
        .unwrap();
        assert_eq!(locked.balance, 10);
    }

    #[tokio::test]
    async fn test_deadline_rolls_back() {
        let store = MemoryStore::new();
        let id = seed(&store, 10).await;

        let ctx = TxContext::with_timeout(Duration::from_millis(20));
        let err = exec_tx(&store, &ctx, |q| {
            Box::pin(async move {
                q.add_account_balance(id, 1).await?;
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
        })
        .await
        .unwrap_err();

        assert!(matches!(err, LedgerError::DeadlineExceeded));
        assert_eq!(balance(&store, id).await, 10);
    }

    #[tokio::test]
    async fn test_already_cancelled_context_never_begins() {
        let store = MemoryStore::new();
        let ctx = TxContext::background();
        ctx.cancel();

        let res = exec_tx(&store, &ctx, |_q| Box::pin(async move { Ok(1) })).await;
        assert!(matches!(res, Err(LedgerError::Cancelled)));
    }
}
