//! Balance Updater
//!
//! Applies two signed balance deltas inside one transaction. Row locks are
//! always taken lower account id first: two transfers moving money in
//! opposite directions over the same pair then queue on the same row instead
//! of each holding the row the other one needs.

use crate::store::{Account, Queries};

use super::error::LedgerError;

/// A signed change to one account's balance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceDelta {
    pub account_id: i64,
    pub amount: i64,
}

impl BalanceDelta {
    pub fn new(account_id: i64, amount: i64) -> Self {
        Self { account_id, amount }
    }
}

/// Which side of a transfer gets its row locked first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOrder {
    /// `from < to`
    SourceFirst,
    /// `from >= to`
    DestinationFirst,
}

impl LockOrder {
    pub fn for_pair(from_account_id: i64, to_account_id: i64) -> Self {
        if from_account_id < to_account_id {
            LockOrder::SourceFirst
        } else {
            LockOrder::DestinationFirst
        }
    }

    /// Put `(debit, credit)` into lock-acquisition order
    pub fn arrange(self, debit: BalanceDelta, credit: BalanceDelta) -> (BalanceDelta, BalanceDelta) {
        match self {
            LockOrder::SourceFirst => (debit, credit),
            LockOrder::DestinationFirst => (credit, debit),
        }
    }

    /// Inverse of [`arrange`](Self::arrange) for the snapshots the updater returns
    pub fn restore<T>(self, first: T, second: T) -> (T, T) {
        match self {
            LockOrder::SourceFirst => (first, second),
            LockOrder::DestinationFirst => (second, first),
        }
    }
}

/// Apply `first` then `second` and return both post-update rows.
///
/// The caller must pass the lower account id as `first` (see [`LockOrder`]).
/// Each change is `balance = balance + amount`, never an overwrite.
pub async fn add_money<Q>(
    q: &mut Q,
    first: BalanceDelta,
    second: BalanceDelta,
) -> Result<(Account, Account), LedgerError>
where
    Q: Queries + ?Sized,
{
    debug_assert!(
        first.account_id <= second.account_id,
        "balance deltas out of lock order: {} before {}",
        first.account_id,
        second.account_id
    );

    let account1 = q.add_account_balance(first.account_id, first.amount).await?;
    let account2 = q.add_account_balance(second.account_id, second.amount).await?;
    Ok((account1, account2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::Currency;
    use crate::store::{CreateAccountParams, CreateUserParams, FaultPoint, MemoryStore, Store, Transaction};

    #[test]
    fn test_lock_order_for_pair() {
        assert_eq!(LockOrder::for_pair(1, 2), LockOrder::SourceFirst);
        assert_eq!(LockOrder::for_pair(2, 1), LockOrder::DestinationFirst);
        assert_eq!(LockOrder::for_pair(5, 5), LockOrder::DestinationFirst);
    }

    #[test]
    fn test_arrange_always_puts_lower_id_first() {
        for (from, to) in [(1, 2), (2, 1), (10, 3), (3, 10)] {
            let order = LockOrder::for_pair(from, to);
            let (first, second) =
                order.arrange(BalanceDelta::new(from, -7), BalanceDelta::new(to, 7));
            assert!(first.account_id < second.account_id, "{} -> {}", from, to);
        }
    }

    #[test]
    fn test_restore_undoes_arrange() {
        for (from, to) in [(1, 2), (2, 1)] {
            let order = LockOrder::for_pair(from, to);
            let (a, b) = order.arrange(BalanceDelta::new(from, -1), BalanceDelta::new(to, 1));
            let (debit, credit) = order.restore(a, b);
            assert_eq!(debit.account_id, from);
            assert_eq!(credit.account_id, to);
        }
    }

    async fn two_accounts(store: &MemoryStore) -> (i64, i64) {
        let mut tx = store.begin().await.unwrap();
        tx.create_user(CreateUserParams {
            username: "updater".into(),
            hashed_password: "h".into(),
            full_name: "Updater".into(),
            email: "updater@example.com".into(),
        })
        .await
        .unwrap();
        let mut ids = Vec::new();
        for currency in [Currency::USD, Currency::EUR] {
            let a = tx
                .create_account(CreateAccountParams {
                    owner: "updater".into(),
                    currency,
                    balance: 100,
                })
                .await
                .unwrap();
            ids.push(a.id);
        }
        tx.commit().await.unwrap();
        (ids[0], ids[1])
    }

    #[tokio::test]
    async fn test_add_money_applies_deltas() {
        let store = MemoryStore::new();
        let (a, b) = two_accounts(&store).await;

        let mut tx = store.begin().await.unwrap();
        let (acc_a, acc_b) = add_money(&mut tx, BalanceDelta::new(a, -40), BalanceDelta::new(b, 40))
            .await
            .unwrap();
        assert_eq!((acc_a.id, acc_a.balance), (a, 60));
        assert_eq!((acc_b.id, acc_b.balance), (b, 140));
    }

    #[tokio::test]
    async fn test_add_money_propagates_second_failure() {
        let store = MemoryStore::new();
        let (a, b) = two_accounts(&store).await;
        store.fail_on(FaultPoint::AddAccountBalance, 1);

        let mut tx = store.begin().await.unwrap();
        let res = add_money(&mut tx, BalanceDelta::new(a, -1), BalanceDelta::new(b, 1)).await;
        assert!(res.is_err());
    }
}
