use axum::{
    Json, Router,
    extract::{Path, State},
    routing::patch,
};
use uuid::Uuid;

use crate::{
    dto::payouts::{AdminPayoutStatusRequest, PayoutView},
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::payout_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/payouts/{id}/status", patch(update_payout_status))
}

#[utoipa::path(
    patch,
    path = "/api/admin/payouts/{id}/status",
    params(
        ("id" = Uuid, Path, description = "Payout ID")
    ),
    request_body = AdminPayoutStatusRequest,
    responses(
        (status = 200, description = "Payout status overridden", body = ApiResponse<PayoutView>),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "Unknown payout"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn update_payout_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<AdminPayoutStatusRequest>,
) -> AppResult<Json<ApiResponse<PayoutView>>> {
    let resp = payout_service::admin_update_payout_status(&state, &user, id, payload).await?;
    Ok(Json(resp))
}
