use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        cart::{
            AddItemRequest, CartCount, CartLine, CartTotals, CartView, SyncCartEntry,
            SyncCartRequest, UpdateItemRequest,
        },
        checkout::{CheckoutCompleteRequest, CheckoutReceipt, CheckoutSummary},
        orders::{ConfirmDeliveryResponse, OrderList, OrderWithItems, UpdateOrderStatusRequest},
        payouts::{
            AdminPayoutStatusRequest, BankAccountRequest, BankAccountView, PayoutOverview,
            PayoutSummary, PayoutView, WithdrawResponse,
        },
    },
    entity::{orders::OrderStatus, vendor_payouts::PayoutStatus},
    models::{BankAccount, CartItem, Order, OrderItem, Product},
    response::{ApiResponse, Meta},
    routes::{admin, cart, checkout, health, orders, params, payouts},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        cart::list_items,
        cart::add_item,
        cart::update_item,
        cart::remove_item,
        cart::empty_cart,
        cart::item_count,
        cart::cart_totals,
        cart::sync_cart,
        checkout::checkout_summary,
        checkout::checkout_complete,
        orders::list_orders,
        orders::get_order,
        orders::update_status,
        orders::confirm_delivery,
        payouts::payout_summary,
        payouts::withdraw,
        payouts::get_bank_account,
        payouts::put_bank_account,
        admin::update_payout_status
    ),
    components(
        schemas(
            Product,
            CartItem,
            Order,
            OrderItem,
            BankAccount,
            OrderStatus,
            PayoutStatus,
            health::HealthData,
            AddItemRequest,
            UpdateItemRequest,
            SyncCartRequest,
            SyncCartEntry,
            CartLine,
            CartView,
            CartCount,
            CartTotals,
            CheckoutCompleteRequest,
            CheckoutSummary,
            CheckoutReceipt,
            OrderList,
            OrderWithItems,
            UpdateOrderStatusRequest,
            ConfirmDeliveryResponse,
            PayoutView,
            PayoutSummary,
            PayoutOverview,
            WithdrawResponse,
            BankAccountRequest,
            BankAccountView,
            AdminPayoutStatusRequest,
            params::Pagination,
            params::OrderListQuery,
            Meta,
            ApiResponse<CartView>,
            ApiResponse<CheckoutSummary>,
            ApiResponse<CheckoutReceipt>,
            ApiResponse<OrderList>,
            ApiResponse<OrderWithItems>,
            ApiResponse<PayoutOverview>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Cart", description = "Cart and stock reservation endpoints"),
        (name = "Checkout", description = "Checkout pricing and settlement endpoints"),
        (name = "Orders", description = "Order lifecycle endpoints"),
        (name = "Payouts", description = "Vendor payout endpoints"),
        (name = "Admin", description = "Admin endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
