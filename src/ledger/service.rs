//! Ledger service facade
//!
//! The object-safe entry point the HTTP gateway talks to. Every operation runs
//! inside its own transaction; transfers go through the coordinator.

use std::sync::Arc;

use async_trait::async_trait;

use super::context::TxContext;
use super::error::LedgerError;
use super::runner::exec_tx;
use super::transfer::{TransferCoordinator, TransferParams, TransferResult};
use crate::store::{
    Account, CreateAccountParams, CreateUserParams, Entry, Page, Queries, Store, Transfer, User,
};

#[async_trait]
pub trait LedgerService: Send + Sync {
    /// Backend name, for logs and health output
    fn backend(&self) -> &'static str;

    async fn create_user(
        &self,
        ctx: &TxContext,
        params: CreateUserParams,
    ) -> Result<User, LedgerError>;

    async fn create_account(
        &self,
        ctx: &TxContext,
        params: CreateAccountParams,
    ) -> Result<Account, LedgerError>;

    async fn get_account(&self, ctx: &TxContext, id: i64) -> Result<Account, LedgerError>;

    async fn list_accounts(&self, ctx: &TxContext, page: Page)
    -> Result<Vec<Account>, LedgerError>;

    async fn list_entries(
        &self,
        ctx: &TxContext,
        account_id: i64,
        page: Page,
    ) -> Result<Vec<Entry>, LedgerError>;

    async fn get_transfer(&self, ctx: &TxContext, id: i64) -> Result<Transfer, LedgerError>;

    async fn transfer(
        &self,
        ctx: &TxContext,
        params: TransferParams,
    ) -> Result<TransferResult, LedgerError>;

    async fn health_check(&self) -> Result<(), LedgerError>;
}

/// [`LedgerService`] over any [`Store`]
pub struct Ledger<S: Store> {
    store: Arc<S>,
    coordinator: TransferCoordinator<S>,
}

impl<S: Store> Ledger<S> {
    pub fn new(store: Arc<S>) -> Self {
        let coordinator = TransferCoordinator::new(store.clone());
        Self { store, coordinator }
    }
}

#[async_trait]
impl<S: Store> LedgerService for Ledger<S> {
    fn backend(&self) -> &'static str {
        self.store.name()
    }

    async fn create_user(
        &self,
        ctx: &TxContext,
        params: CreateUserParams,
    ) -> Result<User, LedgerError> {
        exec_tx(&*self.store, ctx, |q| {
            Box::pin(async move { Ok(q.create_user(params).await?) })
        })
        .await
    }

    async fn create_account(
        &self,
        ctx: &TxContext,
        params: CreateAccountParams,
    ) -> Result<Account, LedgerError> {
        exec_tx(&*self.store, ctx, |q| {
            Box::pin(async move { Ok(q.create_account(params).await?) })
        })
        .await
    }

    async fn get_account(&self, ctx: &TxContext, id: i64) -> Result<Account, LedgerError> {
        exec_tx(&*self.store, ctx, |q| {
            Box::pin(async move { Ok(q.get_account(id).await?) })
        })
        .await
    }

    async fn list_accounts(
        &self,
        ctx: &TxContext,
        page: Page,
    ) -> Result<Vec<Account>, LedgerError> {
        exec_tx(&*self.store, ctx, |q| {
            Box::pin(async move { Ok(q.list_accounts(page).await?) })
        })
        .await
    }

    async fn list_entries(
        &self,
        ctx: &TxContext,
        account_id: i64,
        page: Page,
    ) -> Result<Vec<Entry>, LedgerError> {
        exec_tx(&*self.store, ctx, |q| {
            Box::pin(async move { Ok(q.list_entries(account_id, page).await?) })
        })
        .await
    }

    async fn get_transfer(&self, ctx: &TxContext, id: i64) -> Result<Transfer, LedgerError> {
        exec_tx(&*self.store, ctx, |q| {
            Box::pin(async move { Ok(q.get_transfer(id).await?) })
        })
        .await
    }

    async fn transfer(
        &self,
        ctx: &TxContext,
        params: TransferParams,
    ) -> Result<TransferResult, LedgerError> {
        self.coordinator.transfer(ctx, params).await
    }

    async fn health_check(&self) -> Result<(), LedgerError> {
        Ok(self.store.health_check().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::Currency;
    use crate::store::MemoryStore;

    fn service() -> Arc<dyn LedgerService> {
        Arc::new(Ledger::new(Arc::new(MemoryStore::new())))
    }

    fn user(name: &str) -> CreateUserParams {
        CreateUserParams {
            username: name.into(),
            hashed_password: "hash".into(),
            full_name: name.into(),
            email: format!("{}@example.com", name),
        }
    }

    #[tokio::test]
    async fn test_account_lifecycle_through_trait_object() {
        let svc = service();
        let ctx = TxContext::background();
        assert_eq!(svc.backend(), "memory");

        svc.create_user(&ctx, user("alice")).await.unwrap();
        let usd = svc
            .create_account(
                &ctx,
                CreateAccountParams {
                    owner: "alice".into(),
                    currency: Currency::USD,
                    balance: 0,
                },
            )
            .await
            .unwrap();

        let fetched = svc.get_account(&ctx, usd.id).await.unwrap();
        assert_eq!(fetched, usd);

        let all = svc.list_accounts(&ctx, Page::new(1, 5)).await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(svc.health_check().await.is_ok());
    }

    #[tokio::test]
    async fn test_duplicate_user_is_conflict() {
        let svc = service();
        let ctx = TxContext::background();
        svc.create_user(&ctx, user("bob")).await.unwrap();

        let err = svc.create_user(&ctx, user("bob")).await.unwrap_err();
        assert_eq!(
            err.store_kind(),
            Some(crate::store::StoreErrorKind::Conflict)
        );
    }

    #[tokio::test]
    async fn test_transfer_and_lookups() {
        let svc = service();
        let ctx = TxContext::background();
        svc.create_user(&ctx, user("carol")).await.unwrap();
        svc.create_user(&ctx, user("dave")).await.unwrap();
        let mut ids = Vec::new();
        for owner in ["carol", "dave"] {
            let a = svc
                .create_account(
                    &ctx,
                    CreateAccountParams {
                        owner: owner.into(),
                        currency: Currency::EUR,
                        balance: 100,
                    },
                )
                .await
                .unwrap();
            ids.push(a.id);
        }

        let result = svc
            .transfer(
                &ctx,
                TransferParams {
                    from_account_id: ids[0],
                    to_account_id: ids[1],
                    amount: 40,
                },
            )
            .await
            .unwrap();

        let transfer = svc.get_transfer(&ctx, result.transfer.id).await.unwrap();
        assert_eq!(transfer, result.transfer);

        let entries = svc.list_entries(&ctx, ids[0], Page::new(1, 5)).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].amount, -40);

        assert!(svc.get_transfer(&ctx, 999).await.unwrap_err().is_not_found());
    }
}
