//! Embedded row store
//!
//! Behaves like the PostgreSQL schema for everything the ledger relies on:
//! - per-account row locks (tokio mutexes) held until commit/rollback
//! - writes staged per transaction, invisible to others until commit
//! - id sequences that are not rolled back
//! - unique / foreign-key / check constraints, re-validated at commit
//! - lock waits bounded by a timeout, reported as a retryable conflict
//!
//! Faults can be injected at named points to exercise abort paths.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::OwnedMutexGuard;

use super::error::{StoreError, StoreResult};
use super::models::{
    Account, CreateAccountParams, CreateEntryParams, CreateTransferParams, CreateUserParams,
    Entry, ListTransfersParams, Page, Transfer, User,
};
use super::{Queries, Store, Transaction};

pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Operations at which a failure can be injected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    Begin,
    CreateTransfer,
    CreateEntry,
    AddAccountBalance,
    Commit,
    Rollback,
}

#[derive(Debug)]
struct PendingFault {
    point: FaultPoint,
    /// Matching calls to let through before failing
    skip: usize,
}

#[derive(Default)]
struct Tables {
    users: BTreeMap<String, User>,
    accounts: BTreeMap<i64, Account>,
    entries: BTreeMap<i64, Entry>,
    transfers: BTreeMap<i64, Transfer>,
}

impl Tables {
    fn account_referenced(&self, id: i64) -> bool {
        self.entries.values().any(|e| e.account_id == id)
            || self
                .transfers
                .values()
                .any(|t| t.from_account_id == id || t.to_account_id == id)
    }
}

struct Inner {
    tables: Mutex<Tables>,
    row_locks: Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>,
    faults: Mutex<Vec<PendingFault>>,
    next_account_id: AtomicI64,
    next_entry_id: AtomicI64,
    next_transfer_id: AtomicI64,
    lock_timeout: Duration,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Inner {
    fn tables(&self) -> MutexGuard<'_, Tables> {
        lock(&self.tables)
    }

    fn row_lock(&self, id: i64) -> Arc<tokio::sync::Mutex<()>> {
        lock(&self.row_locks)
            .entry(id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    fn trip(&self, point: FaultPoint) -> StoreResult<()> {
        let mut faults = lock(&self.faults);
        if let Some(pos) = faults.iter().position(|f| f.point == point) {
            if faults[pos].skip == 0 {
                faults.remove(pos);
                tracing::debug!(?point, "memory store: injected fault fired");
                return Err(StoreError::unavailable(format!(
                    "injected fault at {:?}",
                    point
                )));
            }
            faults[pos].skip -= 1;
        }
        Ok(())
    }
}

/// In-process row store; cheap to clone, all clones share the same tables.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                tables: Mutex::new(Tables::default()),
                row_locks: Mutex::new(HashMap::new()),
                faults: Mutex::new(Vec::new()),
                next_account_id: AtomicI64::new(1),
                next_entry_id: AtomicI64::new(1),
                next_transfer_id: AtomicI64::new(1),
                lock_timeout,
            }),
        }
    }

    /// Make the call at `point` fail after letting `skip` matching calls through.
    /// Each registered fault fires once.
    pub fn fail_on(&self, point: FaultPoint, skip: usize) {
        lock(&self.inner.faults).push(PendingFault { point, skip });
    }
}

#[async_trait]
impl Store for MemoryStore {
    type Tx = MemoryTx;

    fn name(&self) -> &'static str {
        "memory"
    }

    async fn begin(&self) -> StoreResult<MemoryTx> {
        self.inner.trip(FaultPoint::Begin)?;
        Ok(MemoryTx {
            inner: self.inner.clone(),
            locks: HashMap::new(),
            staged: Staged::default(),
        })
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// Writes made by a transaction, applied to the shared tables on commit
#[derive(Default)]
struct Staged {
    users: Vec<User>,
    /// New and modified accounts, latest version
    accounts: BTreeMap<i64, Account>,
    created_accounts: BTreeSet<i64>,
    deleted_accounts: BTreeSet<i64>,
    entries: Vec<Entry>,
    transfers: Vec<Transfer>,
}

impl Staged {
    fn is_empty(&self) -> bool {
        self.users.is_empty()
            && self.accounts.is_empty()
            && self.deleted_accounts.is_empty()
            && self.entries.is_empty()
            && self.transfers.is_empty()
    }

    fn user_exists(&self, tables: &Tables, username: &str) -> bool {
        tables.users.contains_key(username) || self.users.iter().any(|u| u.username == username)
    }

    fn account(&self, tables: &Tables, id: i64) -> Option<Account> {
        if self.deleted_accounts.contains(&id) {
            return None;
        }
        self.accounts
            .get(&id)
            .or_else(|| tables.accounts.get(&id))
            .cloned()
    }

    fn account_referenced(&self, tables: &Tables, id: i64) -> bool {
        tables.account_referenced(id)
            || self.entries.iter().any(|e| e.account_id == id)
            || self
                .transfers
                .iter()
                .any(|t| t.from_account_id == id || t.to_account_id == id)
    }

    /// Re-check constraints against the tables as they are now. Other
    /// transactions may have committed since the write was staged.
    fn validate(&self, tables: &Tables) -> StoreResult<()> {
        for (i, user) in self.users.iter().enumerate() {
            let dup = tables.users.contains_key(&user.username)
                || self.users[..i].iter().any(|u| u.username == user.username);
            if dup {
                return Err(StoreError::conflict(format!(
                    "duplicate key value violates unique constraint \"users_pkey\" ({})",
                    user.username
                )));
            }
            let dup_email = tables.users.values().any(|u| u.email == user.email)
                || self.users[..i].iter().any(|u| u.email == user.email);
            if dup_email {
                return Err(StoreError::conflict(format!(
                    "duplicate key value violates unique constraint \"users_email_key\" ({})",
                    user.email
                )));
            }
        }

        for id in &self.created_accounts {
            let Some(account) = self.accounts.get(id) else {
                continue;
            };
            if !self.user_exists(tables, &account.owner) {
                return Err(StoreError::conflict(format!(
                    "insert on table \"accounts\" violates foreign key constraint \"accounts_owner_fkey\" ({})",
                    account.owner
                )));
            }
            let dup = tables
                .accounts
                .values()
                .chain(
                    self.created_accounts
                        .iter()
                        .filter(|other| *other != id)
                        .filter_map(|other| self.accounts.get(other)),
                )
                .filter(|a| !self.deleted_accounts.contains(&a.id))
                .any(|a| a.owner == account.owner && a.currency == account.currency);
            if dup {
                return Err(StoreError::conflict(format!(
                    "duplicate key value violates unique constraint \"owner_currency_key\" ({}, {})",
                    account.owner, account.currency
                )));
            }
        }

        let account_live = |id: i64| self.account(tables, id).is_some();
        for entry in &self.entries {
            if !account_live(entry.account_id) {
                return Err(fk_violation("entries", entry.account_id));
            }
        }
        for transfer in &self.transfers {
            for id in [transfer.from_account_id, transfer.to_account_id] {
                if !account_live(id) {
                    return Err(fk_violation("transfers", id));
                }
            }
        }
        for id in &self.deleted_accounts {
            if self.account_referenced(tables, *id) {
                return Err(StoreError::conflict(format!(
                    "delete on table \"accounts\" violates foreign key constraint (account {})",
                    id
                )));
            }
        }
        Ok(())
    }

    fn apply(self, tables: &mut Tables) {
        for user in self.users {
            tables.users.insert(user.username.clone(), user);
        }
        for (id, account) in self.accounts {
            tables.accounts.insert(id, account);
        }
        for id in self.deleted_accounts {
            tables.accounts.remove(&id);
        }
        for entry in self.entries {
            tables.entries.insert(entry.id, entry);
        }
        for transfer in self.transfers {
            tables.transfers.insert(transfer.id, transfer);
        }
    }
}

fn fk_violation(table: &str, account_id: i64) -> StoreError {
    StoreError::conflict(format!(
        "insert on table \"{}\" violates foreign key constraint (account {})",
        table, account_id
    ))
}

fn account_not_found(id: i64) -> StoreError {
    StoreError::not_found(format!("account {} not found", id))
}

fn paginate<T>(items: impl Iterator<Item = T>, page: Page) -> Vec<T> {
    items
        .skip(page.offset.max(0) as usize)
        .take(page.limit.max(0) as usize)
        .collect()
}

/// Open transaction on a [`MemoryStore`]. Dropping it releases every row
/// lock and discards staged writes.
pub struct MemoryTx {
    inner: Arc<Inner>,
    locks: HashMap<i64, OwnedMutexGuard<()>>,
    staged: Staged,
}

impl MemoryTx {
    fn visible_account(&self, id: i64) -> Option<Account> {
        let tables = self.inner.tables();
        self.staged.account(&tables, id)
    }

    /// Acquire the row lock for `id` (re-entrant within this transaction),
    /// then return the freshest visible version of the row.
    async fn lock_account(&mut self, id: i64) -> StoreResult<Account> {
        if !self.locks.contains_key(&id) {
            if self.visible_account(id).is_none() {
                return Err(account_not_found(id));
            }

            let row_lock = self.inner.row_lock(id);
            let guard = tokio::time::timeout(self.inner.lock_timeout, row_lock.lock_owned())
                .await
                .map_err(|_| {
                    StoreError::aborted(format!("lock wait timeout on account {}", id))
                })?;
            self.locks.insert(id, guard);
        }

        // The previous holder may have committed a new version or deleted the row
        self.visible_account(id).ok_or_else(|| account_not_found(id))
    }
}

#[async_trait]
impl Transaction for MemoryTx {
    async fn commit(mut self) -> StoreResult<()> {
        self.inner.trip(FaultPoint::Commit)?;

        let staged = std::mem::take(&mut self.staged);
        if !staged.is_empty() {
            let mut tables = self.inner.tables();
            staged.validate(&tables)?;
            staged.apply(&mut tables);
        }
        // Row locks are released when `self` drops
        Ok(())
    }

    async fn rollback(self) -> StoreResult<()> {
        // Locks and staged writes go away with `self` even if the fault fires
        self.inner.trip(FaultPoint::Rollback)
    }
}

#[async_trait]
impl Queries for MemoryTx {
    async fn create_account(&mut self, arg: CreateAccountParams) -> StoreResult<Account> {
        tokio::task::yield_now().await;
        {
            let tables = self.inner.tables();
            if !self.staged.user_exists(&tables, &arg.owner) {
                return Err(StoreError::conflict(format!(
                    "insert on table \"accounts\" violates foreign key constraint \"accounts_owner_fkey\" ({})",
                    arg.owner
                )));
            }
        }

        let account = Account {
            id: self.inner.next_account_id.fetch_add(1, Ordering::SeqCst),
            owner: arg.owner,
            currency: arg.currency,
            balance: arg.balance,
            created_at: Utc::now(),
        };
        self.staged.created_accounts.insert(account.id);
        self.staged.accounts.insert(account.id, account.clone());

        // Surface the unique violation at insert time like the SQL backend does
        let tables = self.inner.tables();
        if let Err(e) = self.staged.validate(&tables) {
            self.staged.created_accounts.remove(&account.id);
            self.staged.accounts.remove(&account.id);
            return Err(e);
        }
        Ok(account)
    }

    async fn get_account(&mut self, id: i64) -> StoreResult<Account> {
        self.visible_account(id).ok_or_else(|| account_not_found(id))
    }

    async fn get_account_for_update(&mut self, id: i64) -> StoreResult<Account> {
        self.lock_account(id).await
    }

    async fn list_accounts(&mut self, page: Page) -> StoreResult<Vec<Account>> {
        let tables = self.inner.tables();
        let ids: BTreeSet<i64> = tables
            .accounts
            .keys()
            .chain(self.staged.accounts.keys())
            .copied()
            .collect();
        let visible = ids
            .into_iter()
            .filter_map(|id| self.staged.account(&tables, id));
        Ok(paginate(visible, page))
    }

    async fn add_account_balance(&mut self, id: i64, amount: i64) -> StoreResult<Account> {
        self.inner.trip(FaultPoint::AddAccountBalance)?;
        let mut account = self.lock_account(id).await?;
        tokio::task::yield_now().await;

        account.balance = account
            .balance
            .checked_add(amount)
            .ok_or_else(|| StoreError::other(format!("bigint out of range (account {})", id)))?;
        self.staged.accounts.insert(id, account.clone());
        Ok(account)
    }

    async fn delete_account(&mut self, id: i64) -> StoreResult<()> {
        self.lock_account(id).await?;
        {
            let tables = self.inner.tables();
            if self.staged.account_referenced(&tables, id) {
                return Err(StoreError::conflict(format!(
                    "delete on table \"accounts\" violates foreign key constraint (account {})",
                    id
                )));
            }
        }
        if self.staged.created_accounts.remove(&id) {
            self.staged.accounts.remove(&id);
        } else {
            self.staged.accounts.remove(&id);
            self.staged.deleted_accounts.insert(id);
        }
        Ok(())
    }

    async fn create_entry(&mut self, arg: CreateEntryParams) -> StoreResult<Entry> {
        self.inner.trip(FaultPoint::CreateEntry)?;
        tokio::task::yield_now().await;
        if self.visible_account(arg.account_id).is_none() {
            return Err(fk_violation("entries", arg.account_id));
        }

        let entry = Entry {
            id: self.inner.next_entry_id.fetch_add(1, Ordering::SeqCst),
            account_id: arg.account_id,
            amount: arg.amount,
            created_at: Utc::now(),
        };
        self.staged.entries.push(entry.clone());
        Ok(entry)
    }

    async fn get_entry(&mut self, id: i64) -> StoreResult<Entry> {
        if let Some(entry) = self.staged.entries.iter().find(|e| e.id == id) {
            return Ok(entry.clone());
        }
        self.inner
            .tables()
            .entries
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(format!("entry {} not found", id)))
    }

    async fn list_entries(&mut self, account_id: i64, page: Page) -> StoreResult<Vec<Entry>> {
        let tables = self.inner.tables();
        let mut entries: Vec<Entry> = tables
            .entries
            .values()
            .chain(self.staged.entries.iter())
            .filter(|e| e.account_id == account_id)
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.id);
        Ok(paginate(entries.into_iter(), page))
    }

    async fn create_transfer(&mut self, arg: CreateTransferParams) -> StoreResult<Transfer> {
        self.inner.trip(FaultPoint::CreateTransfer)?;
        tokio::task::yield_now().await;
        if arg.amount <= 0 {
            return Err(StoreError::conflict(
                "new row for relation \"transfers\" violates check constraint \"transfers_amount_check\"",
            ));
        }
        for id in [arg.from_account_id, arg.to_account_id] {
            if self.visible_account(id).is_none() {
                return Err(fk_violation("transfers", id));
            }
        }

        let transfer = Transfer {
            id: self.inner.next_transfer_id.fetch_add(1, Ordering::SeqCst),
            from_account_id: arg.from_account_id,
            to_account_id: arg.to_account_id,
            amount: arg.amount,
            created_at: Utc::now(),
        };
        self.staged.transfers.push(transfer.clone());
        Ok(transfer)
    }

    async fn get_transfer(&mut self, id: i64) -> StoreResult<Transfer> {
        if let Some(transfer) = self.staged.transfers.iter().find(|t| t.id == id) {
            return Ok(transfer.clone());
        }
        self.inner
            .tables()
            .transfers
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(format!("transfer {} not found", id)))
    }

    async fn list_transfers(&mut self, arg: ListTransfersParams) -> StoreResult<Vec<Transfer>> {
        let tables = self.inner.tables();
        let mut transfers: Vec<Transfer> = tables
            .transfers
            .values()
            .chain(self.staged.transfers.iter())
            .filter(|t| t.from_account_id == arg.from_account_id || t.to_account_id == arg.to_account_id)
            .cloned()
            .collect();
        transfers.sort_by_key(|t| t.id);
        Ok(paginate(transfers.into_iter(), arg.page))
    }

    async fn create_user(&mut self, arg: CreateUserParams) -> StoreResult<User> {
        let now = Utc::now();
        let user = User {
            username: arg.username,
            hashed_password: arg.hashed_password,
            full_name: arg.full_name,
            email: arg.email,
            password_changed_at: now,
            created_at: now,
        };
        self.staged.users.push(user.clone());
        let tables = self.inner.tables();
        if let Err(e) = self.staged.validate(&tables) {
            self.staged.users.pop();
            return Err(e);
        }
        Ok(user)
    }

    async fn get_user(&mut self, username: &str) -> StoreResult<User> {
        if let Some(user) = self.staged.users.iter().find(|u| u.username == username) {
            return Ok(user.clone());
        }
        self.inner
            .tables()
            .users
            .get(username)
            .cloned()
            .ok_or_else(|| StoreError::not_found(format!("user {} not found", username)))
    }
}
