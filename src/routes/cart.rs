use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, put},
};
use uuid::Uuid;

use crate::{
    dto::cart::{
        AddItemRequest, CartCount, CartTotals, CartView, SyncCartRequest, UpdateItemRequest,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::cart_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/items", get(list_items).post(add_item).put(update_item))
        .route("/items/{product_id}", delete(remove_item))
        .route("/", delete(empty_cart))
        .route("/count", get(item_count))
        .route("/totals", get(cart_totals))
        .route("/sync", put(sync_cart))
}

#[utoipa::path(
    get,
    path = "/api/cart/items",
    responses(
        (status = 200, description = "Cart contents with reservation deadlines", body = ApiResponse<CartView>)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn list_items(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<CartView>>> {
    let resp = cart_service::list_items(&state.pool, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/cart/items",
    request_body = AddItemRequest,
    responses(
        (status = 201, description = "New cart line created", body = ApiResponse<CartView>),
        (status = 200, description = "Existing line incremented", body = ApiResponse<CartView>),
        (status = 400, description = "Insufficient stock"),
        (status = 404, description = "Product not found"),
        (status = 409, description = "Product reserved by another cart; data carries reservation_expires_at and reservation_seconds_left"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn add_item(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<AddItemRequest>,
) -> AppResult<impl IntoResponse> {
    let (created, resp) = cart_service::add_item(&state.pool, &user, payload).await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(resp)))
}

#[utoipa::path(
    put,
    path = "/api/cart/items",
    request_body = UpdateItemRequest,
    responses(
        (status = 200, description = "Line count updated, reservation refreshed", body = ApiResponse<CartView>),
        (status = 400, description = "Count outside 1..=stock"),
        (status = 404, description = "Product or cart line not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn update_item(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<UpdateItemRequest>,
) -> AppResult<Json<ApiResponse<CartView>>> {
    let resp = cart_service::update_item(&state.pool, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/cart/items/{product_id}",
    params(
        ("product_id" = Uuid, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Line removed", body = ApiResponse<CartView>),
        (status = 404, description = "No such line in this cart"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn remove_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<CartView>>> {
    let resp = cart_service::remove_item(&state.pool, &user, product_id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/cart",
    responses(
        (status = 200, description = "All lines removed", body = ApiResponse<serde_json::Value>)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn empty_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = cart_service::empty_cart(&state.pool, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/cart/count",
    responses(
        (status = 200, description = "Number of active lines", body = ApiResponse<CartCount>)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn item_count(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<CartCount>>> {
    let resp = cart_service::item_count(&state.pool, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/cart/totals",
    responses(
        (status = 200, description = "Quick discounted/regular totals", body = ApiResponse<CartTotals>)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn cart_totals(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<CartTotals>>> {
    let resp = cart_service::cart_totals(&state.pool, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/cart/sync",
    request_body = SyncCartRequest,
    responses(
        (status = 200, description = "Device cart merged into the server cart", body = ApiResponse<CartView>)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn sync_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<SyncCartRequest>,
) -> AppResult<Json<ApiResponse<CartView>>> {
    let resp = cart_service::sync_cart(&state.pool, &user, payload).await?;
    Ok(Json(resp))
}
