use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entity::vendor_payouts::PayoutStatus;
use crate::models::BankAccount;

/// One payout row joined with its order's reference data.
#[derive(Debug, Serialize, ToSchema)]
pub struct PayoutView {
    pub id: Uuid,
    pub order: Uuid,
    pub order_transaction_id: String,
    pub order_date: DateTime<Utc>,
    pub status: PayoutStatus,
    pub gross_amount: Decimal,
    pub platform_fee: Decimal,
    pub net_amount: Decimal,
    pub items_count: i32,
    pub buyer_confirmed_at: Option<DateTime<Utc>>,
    pub available_on: Option<DateTime<Utc>>,
    pub released_at: Option<DateTime<Utc>>,
}

/// Aggregated balances, formatted for display in the settlement currency.
#[derive(Debug, Serialize, ToSchema)]
pub struct PayoutSummary {
    pub pending_amount: String,
    pub available_amount: String,
    pub in_transfer_amount: String,
    pub next_release_on: Option<DateTime<Utc>>,
    pub has_bank_account: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PayoutOverview {
    pub summary: PayoutSummary,
    pub payouts: Vec<PayoutView>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WithdrawResponse {
    pub success: String,
    pub payout: PayoutView,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BankAccountRequest {
    pub bank_name: String,
    /// "savings" or "checking".
    pub account_type: String,
    pub account_number: String,
    pub account_holder_name: String,
    /// "cc", "ce", "nit" or "other".
    pub document_type: String,
    pub document_number: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BankAccountView {
    pub account: Option<BankAccount>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AdminPayoutStatusRequest {
    pub status: PayoutStatus,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub available_on: Option<DateTime<Utc>>,
    /// When true, stamps buyer confirmation if the payout has none yet.
    #[serde(default)]
    pub buyer_confirmed: bool,
}
