//! Account handlers (create, lookup, listing, entry history)

use std::sync::Arc;

use axum::extract::State;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::super::state::AppState;
use super::super::types::{
    ApiError, ApiResponse, ApiResult, ValidatedJson, ValidatedPath, ValidatedQuery, ok,
};
use crate::currency::Currency;
use crate::store::{Account, CreateAccountParams, Entry, Page};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateAccountRequest {
    #[validate(length(min = 1))]
    #[schema(example = "alice")]
    pub owner: String,
    /// One of USD, EUR, CAD
    #[schema(example = "USD")]
    pub currency: String,
}

#[derive(Debug, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Path)]
pub struct AccountIdPath {
    #[validate(range(min = 1))]
    pub id: i64,
}

#[derive(Debug, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// 1-based page number
    #[validate(range(min = 1, max = 1_000_000))]
    pub page_id: i64,
    #[validate(range(min = 5, max = 10))]
    pub page_size: i64,
}

impl PageQuery {
    pub fn page(&self) -> Page {
        Page::new(self.page_id, self.page_size)
    }
}

/// Create an account with a zero balance
#[utoipa::path(
    post,
    path = "/accounts",
    request_body = CreateAccountRequest,
    responses(
        (status = 200, description = "Account created", body = ApiResponse<Account>),
        (status = 400, description = "Invalid owner or unsupported currency"),
        (status = 403, description = "Unknown owner, or owner already has an account in this currency")
    ),
    tag = "Account"
)]
pub async fn create_account(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<CreateAccountRequest>,
) -> ApiResult<Account> {
    let currency = req
        .currency
        .parse::<Currency>()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let account = state
        .ledger
        .create_account(
            &state.request_ctx(),
            CreateAccountParams {
                owner: req.owner,
                currency,
                balance: 0,
            },
        )
        .await?;

    tracing::info!(account_id = account.id, owner = %account.owner, %currency, "account created");
    ok(account)
}

/// Get an account by id
#[utoipa::path(
    get,
    path = "/accounts/{id}",
    params(AccountIdPath),
    responses(
        (status = 200, description = "Account", body = ApiResponse<Account>),
        (status = 400, description = "Invalid id"),
        (status = 404, description = "Account not found")
    ),
    tag = "Account"
)]
pub async fn get_account(
    State(state): State<Arc<AppState>>,
    ValidatedPath(path): ValidatedPath<AccountIdPath>,
) -> ApiResult<Account> {
    let account = state
        .ledger
        .get_account(&state.request_ctx(), path.id)
        .await?;
    ok(account)
}

/// List accounts, ordered by id
#[utoipa::path(
    get,
    path = "/accounts",
    params(PageQuery),
    responses(
        (status = 200, description = "One page of accounts", body = ApiResponse<Vec<Account>>),
        (status = 400, description = "Invalid page parameters")
    ),
    tag = "Account"
)]
pub async fn list_accounts(
    State(state): State<Arc<AppState>>,
    ValidatedQuery(query): ValidatedQuery<PageQuery>,
) -> ApiResult<Vec<Account>> {
    let accounts = state
        .ledger
        .list_accounts(&state.request_ctx(), query.page())
        .await?;
    ok(accounts)
}

/// List the ledger entries of one account, ordered by id
#[utoipa::path(
    get,
    path = "/accounts/{id}/entries",
    params(AccountIdPath, PageQuery),
    responses(
        (status = 200, description = "One page of entries", body = ApiResponse<Vec<Entry>>),
        (status = 400, description = "Invalid id or page parameters"),
        (status = 404, description = "Account not found")
    ),
    tag = "Account"
)]
pub async fn list_entries(
    State(state): State<Arc<AppState>>,
    ValidatedPath(path): ValidatedPath<AccountIdPath>,
    ValidatedQuery(query): ValidatedQuery<PageQuery>,
) -> ApiResult<Vec<Entry>> {
    let ctx = state.request_ctx();
    // 404 for unknown accounts rather than an empty page
    state.ledger.get_account(&ctx, path.id).await?;
    let entries = state
        .ledger
        .list_entries(&ctx, path.id, query.page())
        .await?;
    ok(entries)
}
