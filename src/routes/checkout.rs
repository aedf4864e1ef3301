use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
};

use crate::{
    dto::checkout::{CheckoutCompleteRequest, CheckoutReceipt, CheckoutSummary},
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    routes::params::CouponQuery,
    services::checkout_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/summary", get(checkout_summary))
        .route("/complete", post(checkout_complete))
}

#[utoipa::path(
    get,
    path = "/api/checkout/summary",
    params(
        ("coupon" = Option<String>, Query, description = "Coupon name, case-insensitive")
    ),
    responses(
        (status = 200, description = "Priced cart with tax, coupon and savings", body = ApiResponse<CheckoutSummary>),
        (status = 400, description = "Empty cart or insufficient stock"),
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn checkout_summary(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<CouponQuery>,
) -> AppResult<Json<ApiResponse<CheckoutSummary>>> {
    let resp = checkout_service::summary(&state, &user, query.coupon).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/checkout/complete",
    request_body = CheckoutCompleteRequest,
    responses(
        (status = 201, description = "Order settled: stock decremented, payouts created, cart cleared", body = ApiResponse<CheckoutReceipt>),
        (status = 400, description = "Precondition failed: empty cart, stock, shipping fields or payment"),
        (status = 409, description = "Stock changed while settling; nothing was written"),
        (status = 502, description = "Card processor unreachable"),
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn checkout_complete(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CheckoutCompleteRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<CheckoutReceipt>>)> {
    let resp = checkout_service::complete(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}
