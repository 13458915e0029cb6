//! HTTP handlers
//!
//! - [`account`]: accounts and their entries
//! - [`transfer`]: transfers
//! - [`user`]: user registration
//! - [`health`]: liveness + store check

pub mod account;
pub mod health;
pub mod transfer;
pub mod user;

pub use account::{
    AccountIdPath, CreateAccountRequest, PageQuery, create_account, get_account, list_accounts,
    list_entries,
};
pub use health::{HealthResponse, health_check};
pub use transfer::{CreateTransferRequest, TransferIdPath, create_transfer, get_transfer};
pub use user::{CreateUserRequest, UserResponse, create_user};
