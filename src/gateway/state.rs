use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::ledger::{LedgerService, TxContext};

/// Gateway shared state
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<dyn LedgerService>,
    /// Upper bound for one request's transaction, lock waits included
    pub transfer_timeout: Duration,
    /// Parent of every request context; cancelled on shutdown
    root: TxContext,
}

impl AppState {
    pub fn new(
        ledger: Arc<dyn LedgerService>,
        transfer_timeout: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            ledger,
            transfer_timeout,
            root: TxContext::with_token(shutdown),
        }
    }

    /// Context for one request: bounded by `transfer_timeout`, cancelled on shutdown
    pub fn request_ctx(&self) -> TxContext {
        self.root.child_with_timeout(self.transfer_timeout)
    }
}
