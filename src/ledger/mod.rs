//! Ledger core
//!
//! - [`runner`]: Transaction Runner (begin / unit of work / commit or rollback)
//! - [`balance`]: Balance Updater with lower-id-first lock order
//! - [`transfer`]: Transfer Coordinator
//! - [`service`]: object-safe facade used by the HTTP gateway

pub mod balance;
pub mod context;
pub mod error;
pub mod runner;
pub mod service;
pub mod transfer;


pub use balance::{BalanceDelta, LockOrder, add_money};
pub use context::TxContext;
pub use error::LedgerError;
pub use runner::exec_tx;
pub use service::{Ledger, LedgerService};
pub use transfer::{TransferCoordinator, TransferParams, TransferResult};
