//! Transfer handlers

use std::sync::Arc;

use axum::{extract::State, http::StatusCode};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::super::state::AppState;
use super::super::types::{
    ApiError, ApiResponse, ApiResult, ValidatedJson, ValidatedPath, error_codes, ok,
};
use crate::currency::Currency;
use crate::ledger::{TransferParams, TransferResult, TxContext};
use crate::store::{Account, Transfer};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateTransferRequest {
    #[validate(range(min = 1))]
    #[schema(example = 1)]
    pub from_account_id: i64,
    #[validate(range(min = 1))]
    #[schema(example = 2)]
    pub to_account_id: i64,
    /// Minor units, must be positive
    #[validate(range(min = 1))]
    #[schema(example = 100)]
    pub amount: i64,
    /// Both accounts must hold this currency
    #[schema(example = "USD")]
    pub currency: String,
}

#[derive(Debug, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Path)]
pub struct TransferIdPath {
    #[validate(range(min = 1))]
    pub id: i64,
}

/// Move money between two accounts of the same currency
#[utoipa::path(
    post,
    path = "/transfers",
    request_body = CreateTransferRequest,
    responses(
        (status = 200, description = "Transfer committed", body = ApiResponse<TransferResult>),
        (status = 400, description = "Invalid parameters or currency mismatch"),
        (status = 404, description = "Account not found"),
        (status = 409, description = "Lock conflict, safe to retry"),
        (status = 504, description = "Transfer did not finish in time")
    ),
    tag = "Transfer"
)]
pub async fn create_transfer(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<CreateTransferRequest>,
) -> ApiResult<TransferResult> {
    let currency = req
        .currency
        .parse::<Currency>()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let ctx = state.request_ctx();
    valid_account(&state, &ctx, req.from_account_id, currency).await?;
    valid_account(&state, &ctx, req.to_account_id, currency).await?;

    let result = state
        .ledger
        .transfer(
            &ctx,
            TransferParams {
                from_account_id: req.from_account_id,
                to_account_id: req.to_account_id,
                amount: req.amount,
            },
        )
        .await?;
    ok(result)
}

/// The account must exist and hold `currency`
async fn valid_account(
    state: &AppState,
    ctx: &TxContext,
    account_id: i64,
    currency: Currency,
) -> Result<Account, ApiError> {
    let account = state.ledger.get_account(ctx, account_id).await?;
    if account.currency != currency {
        return ApiError::new(
            StatusCode::BAD_REQUEST,
            error_codes::CURRENCY_MISMATCH,
            format!(
                "account [{}] currency mismatch: {} vs {}",
                account.id, account.currency, currency
            ),
        )
        .into_err();
    }
    Ok(account)
}

/// Get a transfer by id
#[utoipa::path(
    get,
    path = "/transfers/{id}",
    params(TransferIdPath),
    responses(
        (status = 200, description = "Transfer", body = ApiResponse<Transfer>),
        (status = 400, description = "Invalid id"),
        (status = 404, description = "Transfer not found")
    ),
    tag = "Transfer"
)]
pub async fn get_transfer(
    State(state): State<Arc<AppState>>,
    ValidatedPath(path): ValidatedPath<TransferIdPath>,
) -> ApiResult<Transfer> {
    let transfer = state
        .ledger
        .get_transfer(&state.request_ctx(), path.id)
        .await?;
    ok(transfer)
}
