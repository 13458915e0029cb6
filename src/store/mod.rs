//! Row Store
//!
//! Atomic single-row operations over the `users`, `accounts`, `entries` and
//! `transfers` tables. Every operation is issued against an open
//! [`Transaction`]; the ledger layer decides when to begin, commit or roll back.
//!
//! Two backends are provided:
//! - [`PgStore`] - PostgreSQL via sqlx (production)
//! - [`MemoryStore`] - embedded store with real row locks (dev mode, tests)

pub mod error;
pub mod memory;
pub mod models;
pub mod postgres;

pub use error::{StoreError, StoreErrorKind, StoreResult};
pub use memory::{FaultPoint, MemoryStore};
pub use models::{
    Account, CreateAccountParams, CreateEntryParams, CreateTransferParams, CreateUserParams,
    Entry, ListTransfersParams, Page, Transfer, User,
};
pub use postgres::PgStore;

use async_trait::async_trait;

/// Row-level operations available inside a transaction.
#[async_trait]
pub trait Queries: Send {
    // === Accounts ===

    async fn create_account(&mut self, arg: CreateAccountParams) -> StoreResult<Account>;

    /// Plain read, no row lock
    async fn get_account(&mut self, id: i64) -> StoreResult<Account>;

    /// Read and hold the row lock until the transaction ends
    async fn get_account_for_update(&mut self, id: i64) -> StoreResult<Account>;

    async fn list_accounts(&mut self, page: Page) -> StoreResult<Vec<Account>>;

    /// `balance = balance + amount`, returning the updated row.
    /// Takes the row lock if not already held.
    async fn add_account_balance(&mut self, id: i64, amount: i64) -> StoreResult<Account>;

    async fn delete_account(&mut self, id: i64) -> StoreResult<()>;

    // === Entries ===

    async fn create_entry(&mut self, arg: CreateEntryParams) -> StoreResult<Entry>;

    async fn get_entry(&mut self, id: i64) -> StoreResult<Entry>;

    async fn list_entries(&mut self, account_id: i64, page: Page) -> StoreResult<Vec<Entry>>;

    // === Transfers ===

    async fn create_transfer(&mut self, arg: CreateTransferParams) -> StoreResult<Transfer>;

    async fn get_transfer(&mut self, id: i64) -> StoreResult<Transfer>;

    async fn list_transfers(&mut self, arg: ListTransfersParams) -> StoreResult<Vec<Transfer>>;

    // === Users ===

    async fn create_user(&mut self, arg: CreateUserParams) -> StoreResult<User>;

    async fn get_user(&mut self, username: &str) -> StoreResult<User>;
}

/// An open transaction. Dropping it without `commit` discards its writes.
#[async_trait]
pub trait Transaction: Queries + Sized + 'static {
    async fn commit(self) -> StoreResult<()>;

    async fn rollback(self) -> StoreResult<()>;
}

/// Entry point of a backend: hands out transactions.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    type Tx: Transaction;

    /// Short name for logs
    fn name(&self) -> &'static str;

    async fn begin(&self) -> StoreResult<Self::Tx>;

    async fn health_check(&self) -> StoreResult<()>;
}
