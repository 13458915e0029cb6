//! Row types and query parameters for the ledger tables

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::currency::Currency;

/// A balance-holding account.
///
/// `balance` is expressed in minor units and only ever changes through
/// signed deltas (see [`Queries::add_account_balance`](super::Queries::add_account_balance)).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Account {
    #[schema(example = 1)]
    pub id: i64,
    #[schema(example = "alice")]
    pub owner: String,
    pub currency: Currency,
    #[schema(example = 1000)]
    pub balance: i64,
    pub created_at: DateTime<Utc>,
}

/// Immutable record of one balance change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Entry {
    pub id: i64,
    pub account_id: i64,
    /// Signed amount: negative for debits, positive for credits
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

/// Immutable record of a transfer intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Transfer {
    pub id: i64,
    pub from_account_id: i64,
    pub to_account_id: i64,
    /// Always positive
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

/// Ledger user. `hashed_password` never leaves the service layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub username: String,
    pub hashed_password: String,
    pub full_name: String,
    pub email: String,
    pub password_changed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateAccountParams {
    pub owner: String,
    pub currency: Currency,
    pub balance: i64,
}

#[derive(Debug, Clone)]
pub struct CreateUserParams {
    pub username: String,
    pub hashed_password: String,
    pub full_name: String,
    pub email: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateTransferParams {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateEntryParams {
    pub account_id: i64,
    pub amount: i64,
}

/// Offset pagination, ordered by id ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    /// Build from a 1-based page number.
    pub fn new(page_id: i64, page_size: i64) -> Self {
        Self {
            limit: page_size,
            offset: (page_id.max(1) - 1).saturating_mul(page_size),
        }
    }
}

/// Transfers touching either side of an account pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListTransfersParams {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub page: Page,
}
