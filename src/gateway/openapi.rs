//! OpenAPI / Swagger UI Documentation
//!
//! - Swagger UI: `http://localhost:8080/docs`
//! - OpenAPI JSON: `http://localhost:8080/api-docs/openapi.json`

use utoipa::OpenApi;

use crate::currency::Currency;
use crate::gateway::handlers::{
    CreateAccountRequest, CreateTransferRequest, CreateUserRequest, HealthResponse, UserResponse,
};
use crate::ledger::TransferResult;
use crate::store::{Account, Entry, Transfer};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Simple Ledger API",
        version = "1.0.0",
        description = "Accounts, users and atomic money transfers with a double-entry history.",
        license(
            name = "MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Development"),
    ),
    paths(
        crate::gateway::handlers::health::health_check,
        crate::gateway::handlers::account::create_account,
        crate::gateway::handlers::account::get_account,
        crate::gateway::handlers::account::list_accounts,
        crate::gateway::handlers::account::list_entries,
        crate::gateway::handlers::transfer::create_transfer,
        crate::gateway::handlers::transfer::get_transfer,
        crate::gateway::handlers::user::create_user,
    ),
    components(
        schemas(
            Currency,
            Account,
            Entry,
            Transfer,
            TransferResult,
            CreateAccountRequest,
            CreateTransferRequest,
            CreateUserRequest,
            UserResponse,
            HealthResponse,
        )
    ),
    tags(
        (name = "Account", description = "Accounts and entry history"),
        (name = "Transfer", description = "Money transfers between accounts"),
        (name = "User", description = "User registration"),
        (name = "System", description = "Health checks")
    )
)]
pub struct ApiDoc;
