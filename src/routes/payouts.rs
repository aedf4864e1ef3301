use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post, put},
};
use uuid::Uuid;

use crate::{
    dto::payouts::{BankAccountRequest, BankAccountView, PayoutOverview, WithdrawResponse},
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::payout_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/summary", get(payout_summary))
        .route("/{id}/withdraw", post(withdraw))
        .route(
            "/bank-account",
            get(get_bank_account).put(put_bank_account),
        )
}

#[utoipa::path(
    get,
    path = "/api/payouts/summary",
    responses(
        (status = 200, description = "Pending/available/released balances and recent payouts", body = ApiResponse<PayoutOverview>)
    ),
    security(("bearer_auth" = [])),
    tag = "Payouts"
)]
pub async fn payout_summary(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<PayoutOverview>>> {
    let resp = payout_service::summary(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/payouts/{id}/withdraw",
    params(
        ("id" = Uuid, Path, description = "Payout ID")
    ),
    responses(
        (status = 200, description = "Payout released; bank details frozen into the record", body = ApiResponse<WithdrawResponse>),
        (status = 400, description = "No bank account on file"),
        (status = 404, description = "Unknown payout or not the caller's"),
        (status = 409, description = "Payout not yet available; data carries available_on"),
    ),
    security(("bearer_auth" = [])),
    tag = "Payouts"
)]
pub async fn withdraw(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<WithdrawResponse>>> {
    let resp = payout_service::withdraw(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/payouts/bank-account",
    responses(
        (status = 200, description = "The caller's bank account, if registered", body = ApiResponse<BankAccountView>)
    ),
    security(("bearer_auth" = [])),
    tag = "Payouts"
)]
pub async fn get_bank_account(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<BankAccountView>>> {
    let resp = payout_service::get_bank_account(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/payouts/bank-account",
    request_body = BankAccountRequest,
    responses(
        (status = 200, description = "Bank account created or replaced", body = ApiResponse<BankAccountView>),
        (status = 400, description = "Unknown account or document type"),
    ),
    security(("bearer_auth" = [])),
    tag = "Payouts"
)]
pub async fn put_bank_account(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<BankAccountRequest>,
) -> AppResult<Json<ApiResponse<BankAccountView>>> {
    let resp = payout_service::put_bank_account(&state, &user, payload).await?;
    Ok(Json(resp))
}
