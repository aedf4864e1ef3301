use std::collections::HashSet;

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveEnum, ActiveModelTrait, ColumnTrait, Condition, EntityTrait, JoinType, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::orders::{ConfirmDeliveryResponse, OrderList, OrderWithItems, UpdateOrderStatusRequest},
    entity::{
        order_items::{self, Column as OrderItemCol, Entity as OrderItems, Model as OrderItemModel},
        orders::{
            ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel,
            OrderStatus,
        },
        products::{Column as ProdCol, Entity as Products},
        vendor_payouts::{Column as PayoutCol, Entity as VendorPayouts, PayoutStatus},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Order, OrderItem},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    schedule,
    state::AppState,
};

fn status_push_message(status: OrderStatus) -> (&'static str, &'static str) {
    match status {
        OrderStatus::NotProcessed => (
            "Pedido recibido",
            "Tu pedido ha sido recibido y pronto será procesado. Te mantendremos informado.",
        ),
        OrderStatus::Processed => (
            "¡Estamos empacando tu pedido!",
            "El vendedor está preparando tu orden con cuidado.",
        ),
        OrderStatus::Shipping => (
            "¡Tu pedido va en camino!",
            "Nuestro equipo coordina la entrega en tu dirección.",
        ),
        OrderStatus::Delivered => (
            "Pedido completado",
            "¡Gracias por tu compra! Esperamos que la disfrutes.",
        ),
        OrderStatus::Cancelled => (
            "Pedido cancelado",
            "Tu pedido fue cancelado. Si tienes dudas, contáctanos.",
        ),
    }
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination.normalize();

    let mut condition = Condition::all();
    if !user.is_admin() {
        condition = condition.add(OrderCol::UserId.eq(user.user_id));
    }
    if let Some(status) = query.status {
        condition = condition.add(OrderCol::Status.eq(status));
    }

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    let mut finder = Orders::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "OK",
        OrderList { items: orders },
        Some(meta),
    ))
}

/// Fetch one order by its transaction id. The buyer and admins see every
/// line; a vendor sees only the lines that belong to them and gets a 404
/// when none do.
pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    transaction_id: &str,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = Orders::find()
        .filter(OrderCol::TransactionId.eq(transaction_id))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(&state.orm)
        .await?;

    let visible: Vec<OrderItemModel> = if order.user_id == user.user_id || user.is_admin() {
        items
    } else {
        let product_ids: Vec<Uuid> = items.iter().map(|item| item.product_id).collect();
        let owned: HashSet<Uuid> = Products::find()
            .filter(ProdCol::Id.is_in(product_ids))
            .filter(ProdCol::VendorId.eq(user.user_id))
            .all(&state.orm)
            .await?
            .into_iter()
            .map(|product| product.id)
            .collect();
        let filtered: Vec<OrderItemModel> = items
            .into_iter()
            .filter(|item| owned.contains(&item.product_id))
            .collect();
        if filtered.is_empty() {
            return Err(AppError::NotFound);
        }
        filtered
    };

    Ok(ApiResponse::success(
        "OK",
        OrderWithItems {
            order: order_from_entity(order),
            items: visible.into_iter().map(order_item_from_entity).collect(),
        },
        Some(Meta::empty()),
    ))
}

/// Move an order along the fulfilment pipeline. Allowed for admins and for
/// vendors with at least one line in the order; anyone else gets a 404 so
/// the order's existence is not leaked.
pub async fn update_status(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    let order = Orders::find_by_id(order_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    if !user.is_admin() {
        let owned_lines = OrderItems::find()
            .filter(OrderItemCol::OrderId.eq(order.id))
            .join(JoinType::InnerJoin, order_items::Relation::Products.def())
            .filter(ProdCol::VendorId.eq(user.user_id))
            .count(&state.orm)
            .await?;
        if owned_lines == 0 {
            return Err(AppError::NotFound);
        }
    }

    if order.status.is_terminal() {
        return Err(AppError::BadRequest(format!(
            "Cannot modify an order that is already {}",
            order.status.to_value()
        )));
    }

    let new_status = payload.status;
    if new_status != OrderStatus::Cancelled && new_status.rank() < order.status.rank() {
        return Err(AppError::BadRequest(
            "Cannot move the order status backwards".into(),
        ));
    }

    let now = Utc::now();
    let mut active: OrderActive = order.clone().into();
    active.status = Set(new_status);
    active.updated_at = Set(now.into());
    if new_status == OrderStatus::Shipping && order.shipped_at.is_none() {
        active.shipped_at = Set(Some(now.into()));
    }
    if new_status == OrderStatus::Delivered && order.completed_at.is_none() {
        active.completed_at = Set(Some(now.into()));
    }
    let order = active.update(&state.orm).await?;

    let (title, body) = status_push_message(order.status);
    state.notifier.dispatch(
        Some(order.user_id),
        title,
        body,
        Some(serde_json::json!({
            "type": "order_status",
            "transaction_id": order.transaction_id,
            "order_id": order.id,
            "status": order.status,
        })),
    );

    audit::record(
        &state.pool,
        Some(user.user_id),
        "order_status_update",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "status": order.status })),
    )
    .await;

    Ok(ApiResponse::success(
        "Order status updated",
        order_from_entity(order),
        Some(Meta::empty()),
    ))
}

/// Buyer acknowledges receipt. First call stamps the order, forces it to
/// delivered and moves every payout of the order into clearance; repeat
/// calls are answered idempotently with the original release date.
pub async fn confirm_delivery(
    state: &AppState,
    user: &AuthUser,
    transaction_id: &str,
) -> AppResult<ApiResponse<ConfirmDeliveryResponse>> {
    let order = Orders::find()
        .filter(OrderCol::TransactionId.eq(transaction_id))
        .filter(OrderCol::UserId.eq(user.user_id))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    if order.status == OrderStatus::Cancelled {
        return Err(AppError::BadRequest(
            "The order was cancelled and cannot be confirmed".into(),
        ));
    }
    if !matches!(order.status, OrderStatus::Shipping | OrderStatus::Delivered) {
        return Err(AppError::BadRequest(format!(
            "Delivery can only be confirmed once the order is shipping or delivered (current status: {})",
            order.status.to_value()
        )));
    }

    if let Some(confirmed_at) = order.buyer_confirmed_at {
        let release_date = schedule::payout_available_on(confirmed_at.with_timezone(&Utc));
        return Ok(ApiResponse::success(
            "Already confirmed",
            ConfirmDeliveryResponse {
                success: "Ya confirmaste la recepción.".into(),
                available_on: Some(release_date),
                payouts_updated: 0,
            },
            Some(Meta::empty()),
        ));
    }

    let now = Utc::now();
    let release_date = schedule::payout_available_on(now);

    // The confirmation stamp and the payout advance land together or not at
    // all; a stamped order with waiting payouts would be unrecoverable
    // through the idempotent path above.
    let txn = state.orm.begin().await?;

    let mut active: OrderActive = order.clone().into();
    active.buyer_confirmed_at = Set(Some(now.into()));
    active.updated_at = Set(now.into());
    if order.status != OrderStatus::Delivered {
        active.status = Set(OrderStatus::Delivered);
        if order.completed_at.is_none() {
            active.completed_at = Set(Some(now.into()));
        }
    }
    let order = active.update(&txn).await?;

    let updated = VendorPayouts::update_many()
        .col_expr(PayoutCol::BuyerConfirmedAt, Expr::value(now))
        .col_expr(PayoutCol::AvailableOn, Expr::value(release_date))
        .col_expr(PayoutCol::Status, Expr::value(PayoutStatus::PendingClearance))
        .col_expr(PayoutCol::UpdatedAt, Expr::value(now))
        .filter(PayoutCol::OrderId.eq(order.id))
        .exec(&txn)
        .await?;

    txn.commit().await?;

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(&state.orm)
        .await?;
    let product_ids: Vec<Uuid> = items.iter().map(|item| item.product_id).collect();
    let mut vendor_ids: Vec<Uuid> = Products::find()
        .filter(ProdCol::Id.is_in(product_ids))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|product| product.vendor_id)
        .filter(|vendor_id| *vendor_id != user.user_id)
        .collect();
    vendor_ids.sort_unstable();
    vendor_ids.dedup();

    for vendor_id in vendor_ids {
        state.notifier.dispatch(
            Some(vendor_id),
            "Cliente confirmó la entrega",
            format!("Tu pago será liberado el {}.", release_date.format("%d/%m/%Y")),
            Some(serde_json::json!({
                "type": "order_confirmed",
                "transaction_id": order.transaction_id,
                "order_id": order.id,
                "release_date": release_date,
            })),
        );
    }

    audit::record(
        &state.pool,
        Some(user.user_id),
        "delivery_confirm",
        Some("orders"),
        Some(serde_json::json!({
            "order_id": order.id,
            "payouts_updated": updated.rows_affected,
        })),
    )
    .await;

    Ok(ApiResponse::success(
        "Delivery confirmed",
        ConfirmDeliveryResponse {
            success: "¡Gracias! Avisaremos al vendedor para liberar el pago.".into(),
            available_on: Some(release_date),
            payouts_updated: updated.rows_affected,
        },
        Some(Meta::empty()),
    ))
}

fn order_from_entity(model: OrderModel) -> Order {
    Order {
        id: model.id,
        user_id: model.user_id,
        transaction_id: model.transaction_id,
        status: model.status,
        amount: model.amount,
        full_name: model.full_name,
        address_line_1: model.address_line_1,
        address_line_2: model.address_line_2,
        city: model.city,
        state_province_region: model.state_province_region,
        postal_zip_code: model.postal_zip_code,
        country_region: model.country_region,
        telephone_number: model.telephone_number,
        shipping_name: model.shipping_name,
        shipping_time: model.shipping_time,
        shipping_price: model.shipping_price,
        date_issued: model.date_issued.with_timezone(&Utc),
        buyer_confirmed_at: model.buyer_confirmed_at.map(|dt| dt.with_timezone(&Utc)),
        shipped_at: model.shipped_at.map(|dt| dt.with_timezone(&Utc)),
        completed_at: model.completed_at.map(|dt| dt.with_timezone(&Utc)),
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

fn order_item_from_entity(model: OrderItemModel) -> OrderItem {
    OrderItem {
        id: model.id,
        order_id: model.order_id,
        product_id: model.product_id,
        name: model.name,
        price: model.price,
        count: model.count,
        platform_fee: model.platform_fee,
        vendor_earnings: model.vendor_earnings,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
