use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckoutCompleteRequest {
    /// "card" (default) or "cash". Anything else falls back to card.
    #[serde(default)]
    pub payment_method: Option<String>,
    /// Required for card payments; ignored for cash.
    #[serde(default)]
    pub payment_intent_id: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub telephone_number: Option<String>,
    #[serde(default)]
    pub address_line_1: Option<String>,
    #[serde(default)]
    pub address_line_2: Option<String>,
    /// Used as the second address line when `address_line_2` is absent.
    #[serde(default)]
    pub pickup_notes: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state_province_region: Option<String>,
    #[serde(default)]
    pub postal_zip_code: Option<String>,
    #[serde(default)]
    pub country_region: Option<String>,
    #[serde(default)]
    pub coupon_name: Option<String>,
}

/// Buyer-facing totals; amounts are formatted for the settlement currency.
#[derive(Debug, Serialize, ToSchema)]
pub struct CheckoutSummary {
    pub currency: String,
    pub discounted_subtotal: String,
    pub total_amount: String,
    pub estimated_tax: String,
    pub savings_from_discounts: String,
    pub coupon_name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckoutReceipt {
    pub order_id: Uuid,
    pub status: String,
    pub transaction_id: String,
    pub amount: String,
}
