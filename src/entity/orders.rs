use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Fulfilment pipeline for an order. Stored as a string column; transitions
/// are validated in the order service.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[sea_orm(string_value = "not_processed")]
    NotProcessed,
    #[sea_orm(string_value = "processed")]
    Processed,
    #[sea_orm(string_value = "shipping")]
    Shipping,
    #[sea_orm(string_value = "delivered")]
    Delivered,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl OrderStatus {
    /// Position in the pipeline; status may only move to an equal or higher
    /// rank, except when cancelling.
    pub fn rank(self) -> u8 {
        match self {
            OrderStatus::NotProcessed => 1,
            OrderStatus::Processed => 2,
            OrderStatus::Shipping => 3,
            OrderStatus::Delivered => 4,
            OrderStatus::Cancelled => 5,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub transaction_id: String,
    pub status: OrderStatus,
    #[sea_orm(column_type = "Decimal(Some((15, 2)))")]
    pub amount: Decimal,
    pub full_name: String,
    pub address_line_1: String,
    pub address_line_2: String,
    pub city: String,
    pub state_province_region: String,
    pub postal_zip_code: String,
    pub country_region: String,
    pub telephone_number: String,
    pub shipping_name: String,
    pub shipping_time: String,
    #[sea_orm(column_type = "Decimal(Some((15, 2)))")]
    pub shipping_price: Decimal,
    pub date_issued: DateTimeWithTimeZone,
    pub buyer_confirmed_at: Option<DateTimeWithTimeZone>,
    pub shipped_at: Option<DateTimeWithTimeZone>,
    pub completed_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id"
    )]
    Users,
    #[sea_orm(has_many = "super::order_items::Entity")]
    OrderItems,
    #[sea_orm(has_many = "super::vendor_payouts::Entity")]
    VendorPayouts,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl Related<super::order_items::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl Related<super::vendor_payouts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::VendorPayouts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
