//! Simple Ledger - double-entry money transfers
//!
//! Accounts hold a balance in minor units; every transfer writes one transfer
//! record, two entries and two balance updates inside a single database
//! transaction, locking the two account rows lower id first.
//!
//! # Modules
//!
//! - [`store`] - Row store traits with PostgreSQL and in-memory backends
//! - [`ledger`] - Transaction runner, balance updater and transfer coordinator
//! - [`db`] - PostgreSQL pool and schema
//! - [`gateway`] - HTTP API (axum) with OpenAPI docs
//! - [`currency`] - Supported currencies
//! - [`password`] - Password hashing
//! - [`config`] / [`logging`] - YAML configuration and tracing setup

pub mod config;
pub mod currency;
pub mod db;
pub mod gateway;
pub mod ledger;
pub mod logging;
pub mod password;
pub mod store;

pub use currency::Currency;
pub use ledger::{
    Ledger, LedgerError, LedgerService, TransferCoordinator, TransferParams, TransferResult,
    TxContext,
};
pub use store::{MemoryStore, PgStore, Store, StoreError, StoreErrorKind};
