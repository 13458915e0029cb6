//! Ledger Error Types

use thiserror::Error;

use crate::store::{StoreError, StoreErrorKind};

/// Errors surfaced by the transaction runner and the transfer coordinator
#[derive(Error, Debug, Clone)]
pub enum LedgerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("transaction cancelled")]
    Cancelled,

    #[error("transaction deadline exceeded")]
    DeadlineExceeded,

    /// The unit of work failed and so did the rollback. Both causes are kept.
    #[error("tx err: {tx_err}, rb err: {rb_err}")]
    RollbackFailed {
        tx_err: Box<LedgerError>,
        rb_err: StoreError,
    },
}

impl LedgerError {
    /// Get the error code for logs and API responses
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::Store(e) => e.kind.as_str(),
            LedgerError::Cancelled => "CANCELLED",
            LedgerError::DeadlineExceeded => "DEADLINE_EXCEEDED",
            LedgerError::RollbackFailed { .. } => "ROLLBACK_FAILED",
        }
    }

    /// Kind of the underlying store failure, if the error came from the store.
    /// For a failed rollback this is the kind of the original failure.
    pub fn store_kind(&self) -> Option<StoreErrorKind> {
        match self {
            LedgerError::Store(e) => Some(e.kind),
            LedgerError::RollbackFailed { tx_err, .. } => tx_err.store_kind(),
            LedgerError::Cancelled | LedgerError::DeadlineExceeded => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.store_kind() == Some(StoreErrorKind::NotFound)
    }

    /// True when the store aborted the transaction to break a conflict
    /// (deadlock, serialization failure, lock wait timeout). Retrying is left
    /// to the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Store(e) if e.retryable)
    }
}
