use std::collections::HashMap;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::checkout::{CheckoutCompleteRequest, CheckoutReceipt, CheckoutSummary},
    entity::{
        cart_items::{self, Column as CartItemCol, Entity as CartItems},
        carts::{Column as CartCol, Entity as Carts},
        order_items::ActiveModel as OrderItemActive,
        orders::{ActiveModel as OrderActive, OrderStatus},
        products::{self, Column as ProdCol, Entity as Products},
        users::Entity as Users,
        vendor_payouts::{ActiveModel as PayoutActive, PayoutStatus},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    pricing::{self, LineInput},
    response::{ApiResponse, Meta},
    services::{cart_service, coupon_service},
    state::AppState,
};

struct ShippingDetails {
    telephone_number: String,
    address_line_1: String,
    address_line_2: String,
    city: String,
    state_province_region: String,
    postal_zip_code: String,
    country_region: String,
}

fn nonempty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Validate and normalize the shipping block. Address basics are required and
/// reported together; postal code and country fall back to platform defaults.
fn resolve_shipping(payload: &CheckoutCompleteRequest) -> AppResult<ShippingDetails> {
    let mut missing = Vec::new();
    let mut require = |value: &Option<String>, name: &'static str| match nonempty(value) {
        Some(v) => v,
        None => {
            missing.push(name);
            String::new()
        }
    };

    let telephone_number = require(&payload.telephone_number, "telephone_number");
    let address_line_1 = require(&payload.address_line_1, "address_line_1");
    let city = require(&payload.city, "city");
    let state_province_region = require(&payload.state_province_region, "state_province_region");

    if !missing.is_empty() {
        return Err(AppError::BadRequest(format!(
            "Missing shipping fields: {}",
            missing.join(", ")
        )));
    }

    let address_line_2 = nonempty(&payload.address_line_2)
        .or_else(|| nonempty(&payload.pickup_notes))
        .unwrap_or_default();
    let postal_zip_code = nonempty(&payload.postal_zip_code).unwrap_or_else(|| "000000".into());
    let country_region = nonempty(&payload.country_region).unwrap_or_else(|| "Colombia".into());

    Ok(ShippingDetails {
        telephone_number,
        address_line_1,
        address_line_2,
        city,
        state_province_region,
        postal_zip_code,
        country_region,
    })
}

/// Cart lines paired with their product rows, both ordered by product id so
/// concurrent settlements take row locks in the same order.
async fn load_cart_lines<C>(
    conn: &C,
    cart_id: Uuid,
    lock: bool,
) -> AppResult<Vec<(cart_items::Model, products::Model)>>
where
    C: ConnectionTrait,
{
    let mut item_query = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart_id))
        .order_by_asc(CartItemCol::ProductId);
    if lock {
        item_query = item_query.lock(LockType::Update);
    }
    let items = item_query.all(conn).await?;
    if items.is_empty() {
        return Ok(Vec::new());
    }

    let product_ids: Vec<Uuid> = items.iter().map(|item| item.product_id).collect();
    let mut product_query = Products::find()
        .filter(ProdCol::Id.is_in(product_ids))
        .order_by_asc(ProdCol::Id);
    if lock {
        product_query = product_query.lock(LockType::Update);
    }
    let mut products: HashMap<Uuid, products::Model> = product_query
        .all(conn)
        .await?
        .into_iter()
        .map(|product| (product.id, product))
        .collect();

    let mut lines = Vec::with_capacity(items.len());
    for item in items {
        let product = products
            .remove(&item.product_id)
            .ok_or_else(|| AppError::BadRequest("Cart references a removed product".into()))?;
        lines.push((item, product));
    }
    Ok(lines)
}

fn line_input(item: &cart_items::Model, product: &products::Model) -> LineInput {
    LineInput {
        unit_price: product.price,
        discount_percent: product.discount_percent,
        count: item.count,
    }
}

fn check_stock(lines: &[(cart_items::Model, products::Model)]) -> AppResult<()> {
    for (item, product) in lines {
        if item.count > product.stock {
            return Err(AppError::BadRequest(format!(
                "Insufficient stock for {}",
                product.name
            )));
        }
    }
    Ok(())
}

/// Price the cart as it would settle right now, with an optional coupon.
pub async fn summary(
    state: &AppState,
    user: &AuthUser,
    coupon_name: Option<String>,
) -> AppResult<ApiResponse<CheckoutSummary>> {
    let coupon = coupon_service::resolve(&state.orm, coupon_name.as_deref()).await?;

    let cart = cart_service::get_or_create_cart(&state.pool, user.user_id).await?;
    cart_service::sweep_expired(&state.pool, Some(cart.id), None).await?;

    let lines = load_cart_lines(&state.orm, cart.id, false).await?;
    if lines.is_empty() {
        return Err(AppError::BadRequest("Cart is empty".into()));
    }
    check_stock(&lines)?;

    let inputs: Vec<LineInput> = lines
        .iter()
        .map(|(item, product)| line_input(item, product))
        .collect();
    let quote = pricing::checkout_quote(&inputs, coupon.as_ref());

    let summary = CheckoutSummary {
        currency: pricing::CURRENCY.into(),
        discounted_subtotal: pricing::format_money(quote.discounted_subtotal, pricing::CURRENCY),
        total_amount: pricing::format_money(quote.total_amount, pricing::CURRENCY),
        estimated_tax: pricing::format_money(quote.estimated_tax, pricing::CURRENCY),
        savings_from_discounts: pricing::format_money(
            quote.savings_from_discounts,
            pricing::CURRENCY,
        ),
        coupon_name: quote.coupon_name,
    };
    Ok(ApiResponse::success("OK", summary, None))
}

#[derive(Default)]
struct VendorTotals {
    gross: Decimal,
    fee: Decimal,
    net: Decimal,
    items: i32,
}

/// Settle the cart into an order. Everything between reading the lines and
/// clearing the cart happens in one transaction; payment verification and
/// notifications happen outside it.
pub async fn complete(
    state: &AppState,
    user: &AuthUser,
    payload: CheckoutCompleteRequest,
) -> AppResult<ApiResponse<CheckoutReceipt>> {
    let method = match payload.payment_method.as_deref() {
        Some("cash") => "cash",
        _ => "card",
    };

    if method == "card" {
        if !state.payments.is_enabled() {
            return Err(AppError::BadRequest(
                "Card payments are temporarily unavailable".into(),
            ));
        }
        let intent_id = nonempty(&payload.payment_intent_id).ok_or_else(|| {
            AppError::BadRequest("payment_intent_id is required for card payments".into())
        })?;
        if !state.payments.verify_intent(&intent_id).await? {
            return Err(AppError::BadRequest(
                "We could not confirm your payment".into(),
            ));
        }
    }

    let coupon = coupon_service::resolve(&state.orm, payload.coupon_name.as_deref()).await?;
    let shipping = resolve_shipping(&payload)?;

    let full_name = match nonempty(&payload.full_name) {
        Some(name) => name,
        None => Users::find_by_id(user.user_id)
            .one(&state.orm)
            .await?
            .map(|u| u.full_name)
            .unwrap_or_default(),
    };

    let cart = cart_service::get_or_create_cart(&state.pool, user.user_id).await?;
    cart_service::sweep_expired(&state.pool, Some(cart.id), None).await?;

    let txn = state.orm.begin().await?;

    let lines = load_cart_lines(&txn, cart.id, true).await?;
    if lines.is_empty() {
        return Err(AppError::BadRequest("Cart is empty".into()));
    }
    check_stock(&lines)?;

    let inputs: Vec<LineInput> = lines
        .iter()
        .map(|(item, product)| line_input(item, product))
        .collect();
    let quote = pricing::checkout_quote(&inputs, coupon.as_ref());

    let transaction_id = Uuid::new_v4().to_string();
    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        transaction_id: Set(transaction_id.clone()),
        status: Set(OrderStatus::NotProcessed),
        amount: Set(quote.total_amount),
        full_name: Set(full_name),
        address_line_1: Set(shipping.address_line_1),
        address_line_2: Set(shipping.address_line_2),
        city: Set(shipping.city),
        state_province_region: Set(shipping.state_province_region),
        postal_zip_code: Set(shipping.postal_zip_code),
        country_region: Set(shipping.country_region),
        telephone_number: Set(shipping.telephone_number),
        shipping_name: Set(pricing::DELIVERY_NAME.into()),
        shipping_time: Set(pricing::DELIVERY_TIME.into()),
        shipping_price: Set(quote.shipping_price),
        date_issued: Set(Utc::now().into()),
        buyer_confirmed_at: Set(None),
        shipped_at: Set(None),
        completed_at: Set(None),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut vendor_totals: HashMap<Uuid, VendorTotals> = HashMap::new();

    for (item, product) in &lines {
        let breakdown = pricing::line_breakdown(&line_input(item, product));
        let share = pricing::vendor_split(breakdown.line_total);

        OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(product.id),
            name: Set(product.name.clone()),
            price: Set(breakdown.final_unit_price),
            count: Set(item.count),
            platform_fee: Set(share.platform_fee),
            vendor_earnings: Set(share.vendor_earnings),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;

        // Conditional decrement: if another settlement got here first the
        // guard fails and the whole checkout rolls back.
        let remaining = product.stock - item.count;
        let updated = Products::update_many()
            .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).sub(item.count))
            .col_expr(ProdCol::IsAvailable, Expr::value(remaining > 0))
            .col_expr(ProdCol::UpdatedAt, Expr::value(Utc::now()))
            .filter(ProdCol::Id.eq(product.id))
            .filter(ProdCol::Stock.gte(item.count))
            .exec(&txn)
            .await?;
        if updated.rows_affected == 0 {
            return Err(AppError::conflict(
                "Stock changed while completing checkout",
                serde_json::json!({ "product_id": product.id }),
            ));
        }

        let totals = vendor_totals.entry(product.vendor_id).or_default();
        totals.gross += breakdown.line_total;
        totals.fee += share.platform_fee;
        totals.net += share.vendor_earnings;
        totals.items += item.count;
    }

    for (vendor_id, totals) in &vendor_totals {
        if totals.net <= Decimal::ZERO {
            continue;
        }
        PayoutActive {
            id: Set(Uuid::new_v4()),
            vendor_id: Set(*vendor_id),
            order_id: Set(order.id),
            items_count: Set(totals.items),
            gross_amount: Set(pricing::quantize(totals.gross)),
            platform_fee: Set(pricing::quantize(totals.fee)),
            net_amount: Set(pricing::quantize(totals.net)),
            status: Set(PayoutStatus::WaitingConfirmation),
            buyer_confirmed_at: Set(None),
            available_on: Set(None),
            released_at: Set(None),
            bank_account_snapshot: Set(None),
            notes: Set(None),
            created_at: NotSet,
            updated_at: NotSet,
        }
        .insert(&txn)
        .await?;
    }

    CartItems::delete_many()
        .filter(CartItemCol::CartId.eq(cart.id))
        .exec(&txn)
        .await?;
    Carts::update_many()
        .col_expr(CartCol::TotalItems, Expr::value(0))
        .col_expr(CartCol::UpdatedAt, Expr::value(Utc::now()))
        .filter(CartCol::Id.eq(cart.id))
        .exec(&txn)
        .await?;

    txn.commit().await?;

    let amount = pricing::format_money(quote.total_amount, pricing::CURRENCY);

    state.notifier.dispatch(
        Some(user.user_id),
        "¡Pedido confirmado!",
        format!(
            "Tu pedido #{transaction_id} ha sido recibido y está siendo procesado."
        ),
        Some(serde_json::json!({
            "type": "order_created",
            "order_id": order.id,
            "transaction_id": transaction_id,
            "amount": amount,
        })),
    );
    for (vendor_id, totals) in &vendor_totals {
        state.notifier.dispatch(
            Some(*vendor_id),
            "¡Nueva venta!",
            format!(
                "Tienes {} producto(s) vendido(s). Contacta al comprador para coordinar la entrega.",
                totals.items
            ),
            Some(serde_json::json!({
                "type": "new_sale",
                "order_id": order.id,
                "items_count": totals.items,
            })),
        );
    }

    audit::record(
        &state.pool,
        Some(user.user_id),
        "checkout",
        Some("orders"),
        Some(serde_json::json!({
            "order_id": order.id,
            "payment_method": method,
            "amount": amount,
        })),
    )
    .await;

    let receipt = CheckoutReceipt {
        order_id: order.id,
        status: "confirmed".into(),
        transaction_id,
        amount,
    };
    Ok(ApiResponse::success(
        "Checkout success",
        receipt,
        Some(Meta::empty()),
    ))
}
