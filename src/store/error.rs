//! Store error taxonomy
//!
//! Backends translate their driver errors into a [`StoreErrorKind`] so callers
//! branch on a stable set of kinds instead of driver sentinel values.

use thiserror::Error;

/// Classification of a row-store failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    /// The addressed row does not exist
    NotFound,
    /// Constraint violation, deadlock, serialization or lock-wait abort
    Conflict,
    /// Connection lost, pool exhausted, store shut down
    Unavailable,
    Other,
}

impl StoreErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreErrorKind::NotFound => "NOT_FOUND",
            StoreErrorKind::Conflict => "CONFLICT",
            StoreErrorKind::Unavailable => "UNAVAILABLE",
            StoreErrorKind::Other => "OTHER",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct StoreError {
    pub kind: StoreErrorKind,
    pub message: String,
    /// Set for conflicts the store aborted on its own (deadlock, serialization,
    /// lock timeout); the same call may succeed if reissued.
    pub retryable: bool,
}

impl StoreError {
    pub fn new(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Conflict, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Unavailable, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Other, message)
    }

    /// Conflict that the store resolved by aborting this transaction
    pub fn aborted(message: impl Into<String>) -> Self {
        Self {
            retryable: true,
            ..Self::conflict(message)
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == StoreErrorKind::NotFound
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        assert!(StoreError::not_found("x").is_not_found());
        assert!(!StoreError::conflict("dup").retryable);

        let err = StoreError::aborted("deadlock detected");
        assert_eq!(err.kind, StoreErrorKind::Conflict);
        assert!(err.retryable);
        assert_eq!(err.to_string(), "deadlock detected");
    }

    #[test]
    fn test_kind_codes() {
        assert_eq!(StoreErrorKind::Unavailable.as_str(), "UNAVAILABLE");
        assert_eq!(StoreErrorKind::Other.as_str(), "OTHER");
    }
}
