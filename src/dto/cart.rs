use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::Product;

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddItemRequest {
    pub product_id: Uuid,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateItemRequest {
    pub product_id: Uuid,
    pub count: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SyncCartRequest {
    #[serde(default)]
    pub cart_items: Vec<SyncCartEntry>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SyncCartEntry {
    pub product_id: Uuid,
    #[serde(default = "default_sync_count")]
    pub count: i32,
}

fn default_sync_count() -> i32 {
    1
}

/// One cart line as the client sees it, product snapshot included.
#[derive(Debug, Serialize, ToSchema)]
pub struct CartLine {
    pub id: Uuid,
    pub product_id: Uuid,
    pub count: i32,
    pub product: Product,
    pub reservation_expires_at: Option<DateTime<Utc>>,
    pub reservation_seconds_left: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartView {
    pub items: Vec<CartLine>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartCount {
    pub total_items: i32,
}

/// Quick estimate for the cart screen; the checkout summary is authoritative.
#[derive(Debug, Serialize, ToSchema)]
pub struct CartTotals {
    pub total_cost: Decimal,
    pub total_compare_cost: Decimal,
}
