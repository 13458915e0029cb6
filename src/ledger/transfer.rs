//! Transfer Coordinator
//!
//! Moves `amount` from one account to another as a single transaction:
//!
//! ```text
//! begin
//!   INSERT transfer (from, to, amount)
//!   INSERT entry (from, -amount)
//!   INSERT entry (to,   +amount)
//!   UPDATE balance += delta   -- lower account id first
//!   UPDATE balance += delta
//! commit | rollback
//! ```
//!
//! Inputs are assumed valid (positive amount, existing accounts, matching
//! currency); that is checked by the caller. Mutual exclusion comes only from
//! the store's row locks, and no partial transfer is ever visible.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use super::balance::{BalanceDelta, LockOrder, add_money};
use super::context::TxContext;
use super::error::LedgerError;
use super::runner::exec_tx;
use crate::store::{
    Account, CreateEntryParams, CreateTransferParams, Entry, Queries, Store, Transfer,
};

/// Input of [`TransferCoordinator::transfer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferParams {
    pub from_account_id: i64,
    pub to_account_id: i64,
    /// Must be positive
    pub amount: i64,
}

/// Everything a successful transfer wrote, with accounts in request order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TransferResult {
    pub transfer: Transfer,
    pub from_account: Account,
    pub to_account: Account,
    pub from_entry: Entry,
    pub to_entry: Entry,
}

pub struct TransferCoordinator<S: Store> {
    store: Arc<S>,
}

impl<S: Store> Clone for TransferCoordinator<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: Store> TransferCoordinator<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Execute a transfer. Either every row is written or none is.
    pub async fn transfer(
        &self,
        ctx: &TxContext,
        params: TransferParams,
    ) -> Result<TransferResult, LedgerError> {
        debug!(
            from = params.from_account_id,
            to = params.to_account_id,
            amount = params.amount,
            "transfer started"
        );

        let res = exec_tx(&*self.store, ctx, |q| {
            Box::pin(async move { transfer_tx(q, params).await })
        })
        .await;

        match &res {
            Ok(result) => info!(
                transfer_id = result.transfer.id,
                from = params.from_account_id,
                to = params.to_account_id,
                amount = params.amount,
                from_balance = result.from_account.balance,
                to_balance = result.to_account.balance,
                "transfer committed"
            ),
            Err(e) => warn!(
                from = params.from_account_id,
                to = params.to_account_id,
                amount = params.amount,
                code = e.code(),
                retryable = e.is_retryable(),
                "transfer failed: {}",
                e
            ),
        }
        res
    }
}

/// The unit of work run by [`TransferCoordinator::transfer`]
async fn transfer_tx<Q>(q: &mut Q, params: TransferParams) -> Result<TransferResult, LedgerError>
where
    Q: Queries + ?Sized,
{
    let transfer = q
        .create_transfer(CreateTransferParams {
            from_account_id: params.from_account_id,
            to_account_id: params.to_account_id,
            amount: params.amount,
        })
        .await?;

    let from_entry = q
        .create_entry(CreateEntryParams {
            account_id: params.from_account_id,
            amount: -params.amount,
        })
        .await?;

    let to_entry = q
        .create_entry(CreateEntryParams {
            account_id: params.to_account_id,
            amount: params.amount,
        })
        .await?;

    let debit = BalanceDelta::new(params.from_account_id, -params.amount);
    let credit = BalanceDelta::new(params.to_account_id, params.amount);
    let order = LockOrder::for_pair(params.from_account_id, params.to_account_id);

    let (first, second) = order.arrange(debit, credit);
    let (account1, account2) = add_money(q, first, second).await?;
    let (from_account, to_account) = order.restore(account1, account2);

    Ok(TransferResult {
        transfer,
        from_account,
        to_account,
        from_entry,
        to_entry,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::Currency;
    use crate::store::{
        CreateAccountParams, CreateUserParams, FaultPoint, ListTransfersParams, MemoryStore, Page,
        StoreErrorKind, Transaction,
    };

    async fn setup(balances: &[i64]) -> (Arc<MemoryStore>, Vec<Account>) {
        let store = Arc::new(MemoryStore::new());
        let mut tx = store.begin().await.unwrap();
        let mut accounts = Vec::new();
        for (i, balance) in balances.iter().enumerate() {
            let owner = format!("owner{}", i);
            tx.create_user(CreateUserParams {
                username: owner.clone(),
                hashed_password: "h".into(),
                full_name: owner.clone(),
                email: format!("{}@example.com", owner),
            })
            .await
            .unwrap();
            accounts.push(
                tx.create_account(CreateAccountParams {
                    owner,
                    currency: Currency::USD,
                    balance: *balance,
                })
                .await
                .unwrap(),
            );
        }
        tx.commit().await.unwrap();
        (store, accounts)
    }

    fn params(from: &Account, to: &Account, amount: i64) -> TransferParams {
        TransferParams {
            from_account_id: from.id,
            to_account_id: to.id,
            amount,
        }
    }

    #[tokio::test]
    async fn test_transfer_result_shape() {
        let (store, accounts) = setup(&[1000, 1000]).await;
        let (a1, a2) = (&accounts[0], &accounts[1]);
        let coordinator = TransferCoordinator::new(store.clone());

        let result = coordinator
            .transfer(&TxContext::background(), params(a1, a2, 10))
            .await
            .unwrap();

        assert!(result.transfer.id > 0);
        assert_eq!(result.transfer.from_account_id, a1.id);
        assert_eq!(result.transfer.to_account_id, a2.id);
        assert_eq!(result.transfer.amount, 10);

        assert_eq!(result.from_entry.account_id, a1.id);
        assert_eq!(result.from_entry.amount, -10);
        assert_eq!(result.to_entry.account_id, a2.id);
        assert_eq!(result.to_entry.amount, 10);
        assert_eq!(result.from_entry.amount, -result.to_entry.amount);

        assert_eq!(result.from_account.id, a1.id);
        assert_eq!(result.from_account.balance, 990);
        assert_eq!(result.to_account.id, a2.id);
        assert_eq!(result.to_account.balance, 1010);
    }

    #[tokio::test]
    async fn test_reverse_direction_keeps_request_order() {
        let (store, accounts) = setup(&[500, 500]).await;
        let (low, high) = (&accounts[0], &accounts[1]);
        assert!(low.id < high.id);
        let coordinator = TransferCoordinator::new(store);

        // Source has the higher id: locks are taken destination first
        let result = coordinator
            .transfer(&TxContext::background(), params(high, low, 25))
            .await
            .unwrap();

        assert_eq!(result.from_account.id, high.id);
        assert_eq!(result.from_account.balance, 475);
        assert_eq!(result.to_account.id, low.id);
        assert_eq!(result.to_account.balance, 525);
        assert_eq!(result.from_entry.account_id, high.id);
        assert_eq!(result.to_entry.account_id, low.id);
    }

    #[tokio::test]
    async fn test_balance_may_go_negative() {
        let (store, accounts) = setup(&[5, 0]).await;
        let coordinator = TransferCoordinator::new(store);

        let result = coordinator
            .transfer(
                &TxContext::background(),
                params(&accounts[0], &accounts[1], 20),
            )
            .await
            .unwrap();
        assert_eq!(result.from_account.balance, -15);
        assert_eq!(result.to_account.balance, 20);
    }

    #[tokio::test]
    async fn test_second_balance_update_failure_leaves_nothing_behind() {
        for reversed in [false, true] {
            let (store, accounts) = setup(&[1000, 1000]).await;
            let (from, to) = if reversed {
                (&accounts[1], &accounts[0])
            } else {
                (&accounts[0], &accounts[1])
            };
            let coordinator = TransferCoordinator::new(store.clone());
            store.fail_on(FaultPoint::AddAccountBalance, 1);

            let err = coordinator
                .transfer(&TxContext::background(), params(from, to, 10))
                .await
                .unwrap_err();
            assert_eq!(err.store_kind(), Some(StoreErrorKind::Unavailable));

            let mut tx = store.begin().await.unwrap();
            let transfers = tx
                .list_transfers(ListTransfersParams {
                    from_account_id: from.id,
                    to_account_id: to.id,
                    page: Page::new(1, 10),
                })
                .await
                .unwrap();
            assert!(transfers.is_empty(), "no transfer row may survive");
            assert!(tx.list_entries(from.id, Page::new(1, 10)).await.unwrap().is_empty());
            assert!(tx.list_entries(to.id, Page::new(1, 10)).await.unwrap().is_empty());
            assert_eq!(tx.get_account(from.id).await.unwrap().balance, 1000);
            assert_eq!(tx.get_account(to.id).await.unwrap().balance, 1000);
        }
    }

    #[tokio::test]
    async fn test_failure_at_every_step_is_atomic() {
        for point in [
            FaultPoint::CreateTransfer,
            FaultPoint::CreateEntry,
            FaultPoint::AddAccountBalance,
            FaultPoint::Commit,
        ] {
            let (store, accounts) = setup(&[100, 100]).await;
            let coordinator = TransferCoordinator::new(store.clone());
            store.fail_on(point, 0);

            let res = coordinator
                .transfer(
                    &TxContext::background(),
                    params(&accounts[0], &accounts[1], 30),
                )
                .await;
            assert!(res.is_err(), "{:?} should abort", point);

            let mut tx = store.begin().await.unwrap();
            assert_eq!(tx.get_account(accounts[0].id).await.unwrap().balance, 100);
            assert_eq!(tx.get_account(accounts[1].id).await.unwrap().balance, 100);
            assert!(tx.get_transfer(1).await.unwrap_err().is_not_found());
        }
    }

    #[tokio::test]
    async fn test_unknown_account_aborts() {
        let (store, accounts) = setup(&[100]).await;
        let coordinator = TransferCoordinator::new(store.clone());

        let err = coordinator
            .transfer(
                &TxContext::background(),
                TransferParams {
                    from_account_id: accounts[0].id,
                    to_account_id: 9999,
                    amount: 1,
                },
            )
            .await
            .unwrap_err();
        assert!(err.store_kind().is_some());

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.get_account(accounts[0].id).await.unwrap().balance, 100);
    }
}
