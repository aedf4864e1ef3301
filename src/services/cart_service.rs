use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    audit,
    db::DbPool,
    dto::cart::{
        AddItemRequest, CartCount, CartLine, CartTotals, CartView, SyncCartEntry, SyncCartRequest,
        UpdateItemRequest,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Cart, CartItem, Product},
    pricing::{self, LineInput},
    response::{ApiResponse, Meta},
    schedule,
};

#[derive(FromRow)]
struct LineRow {
    id: Uuid,
    product_id: Uuid,
    count: i32,
    reserved_until: Option<DateTime<Utc>>,
    vendor_id: Uuid,
    name: String,
    description: Option<String>,
    price: Decimal,
    discount_percent: i32,
    currency: String,
    stock: i32,
    is_available: bool,
    product_created_at: DateTime<Utc>,
    product_updated_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct PriceRow {
    price: Decimal,
    discount_percent: i32,
    count: i32,
}

pub async fn get_or_create_cart(pool: &DbPool, user_id: Uuid) -> AppResult<Cart> {
    let cart = sqlx::query_as::<_, Cart>(
        r#"
        INSERT INTO carts (id, user_id) VALUES ($1, $2)
        ON CONFLICT (user_id) DO UPDATE SET updated_at = now()
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .fetch_one(pool)
    .await?;
    Ok(cart)
}

/// Delete cart lines whose reservation deadline has passed, then resync the
/// affected cart counters. Scoped to rows touching the given cart or product;
/// with neither given, every expired row goes. Returns the number of lines
/// released.
pub async fn sweep_expired(
    pool: &DbPool,
    cart_id: Option<Uuid>,
    product_id: Option<Uuid>,
) -> AppResult<u64> {
    let rows: Vec<(Uuid,)> = sqlx::query_as(
        r#"
        DELETE FROM cart_items
        WHERE reserved_until IS NOT NULL
          AND reserved_until < now()
          AND (($1::uuid IS NULL AND $2::uuid IS NULL)
               OR cart_id = $1
               OR product_id = $2)
        RETURNING cart_id
        "#,
    )
    .bind(cart_id)
    .bind(product_id)
    .fetch_all(pool)
    .await?;

    let released = rows.len() as u64;
    let mut affected: Vec<Uuid> = rows.into_iter().map(|(id,)| id).collect();
    affected.sort_unstable();
    affected.dedup();
    for cart in affected {
        resync_total(pool, cart).await?;
    }
    if released > 0 {
        tracing::debug!(released, "expired cart reservations released");
    }
    Ok(released)
}

/// Recompute `carts.total_items` from the surviving lines.
pub async fn resync_total<'e, E>(executor: E, cart_id: Uuid) -> AppResult<()>
where
    E: sqlx::Executor<'e, Database = sqlx::Postgres>,
{
    sqlx::query(
        r#"
        UPDATE carts
        SET total_items = (SELECT COUNT(*) FROM cart_items WHERE cart_id = $1),
            updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(cart_id)
    .execute(executor)
    .await?;
    Ok(())
}

fn line_from_row(row: LineRow) -> CartLine {
    CartLine {
        id: row.id,
        product_id: row.product_id,
        count: row.count,
        product: Product {
            id: row.product_id,
            vendor_id: row.vendor_id,
            name: row.name,
            description: row.description,
            price: row.price,
            discount_percent: row.discount_percent,
            currency: row.currency,
            stock: row.stock,
            is_available: row.is_available,
            created_at: row.product_created_at,
            updated_at: row.product_updated_at,
        },
        reservation_expires_at: row.reserved_until,
        reservation_seconds_left: row.reserved_until.map(schedule::seconds_until),
    }
}

async fn cart_view(pool: &DbPool, cart_id: Uuid) -> AppResult<CartView> {
    let rows = sqlx::query_as::<_, LineRow>(
        r#"
        SELECT ci.id, ci.product_id, ci.count, ci.reserved_until,
               p.vendor_id, p.name, p.description, p.price, p.discount_percent,
               p.currency, p.stock, p.is_available,
               p.created_at AS product_created_at, p.updated_at AS product_updated_at
        FROM cart_items ci
        JOIN products p ON p.id = ci.product_id
        WHERE ci.cart_id = $1
        ORDER BY p.id
        "#,
    )
    .bind(cart_id)
    .fetch_all(pool)
    .await?;

    let items = rows.into_iter().map(line_from_row).collect();
    Ok(CartView { items })
}

/// Newest active reservation on this product held by a different cart.
async fn blocking_reservation(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    product_id: Uuid,
    own_cart_id: Uuid,
) -> AppResult<Option<DateTime<Utc>>> {
    let row: Option<(DateTime<Utc>,)> = sqlx::query_as(
        r#"
        SELECT reserved_until FROM cart_items
        WHERE product_id = $1
          AND cart_id <> $2
          AND reserved_until IS NOT NULL
          AND reserved_until > now()
        ORDER BY reserved_until DESC
        LIMIT 1
        "#,
    )
    .bind(product_id)
    .bind(own_cart_id)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(row.map(|(deadline,)| deadline))
}

fn reserved_conflict(deadline: DateTime<Utc>) -> AppError {
    AppError::conflict(
        "This item is reserved by another shopper right now.",
        serde_json::json!({
            "reservation_expires_at": deadline,
            "reservation_seconds_left": schedule::seconds_until(deadline),
        }),
    )
}

async fn lock_product(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    product_id: Uuid,
) -> AppResult<Option<Product>> {
    let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1 FOR UPDATE")
        .bind(product_id)
        .fetch_optional(&mut **tx)
        .await?;
    Ok(product)
}

pub async fn list_items(pool: &DbPool, user: &AuthUser) -> AppResult<ApiResponse<CartView>> {
    let cart = get_or_create_cart(pool, user.user_id).await?;
    sweep_expired(pool, Some(cart.id), None).await?;
    let view = cart_view(pool, cart.id).await?;
    Ok(ApiResponse::success("OK", view, None))
}

/// Add one unit of a product. Returns `true` when a new line was created so
/// the route can answer 201 instead of 200. The product row is locked for the
/// whole transaction, so two shoppers racing for the last unit serialize here.
pub async fn add_item(
    pool: &DbPool,
    user: &AuthUser,
    payload: AddItemRequest,
) -> AppResult<(bool, ApiResponse<CartView>)> {
    let cart = get_or_create_cart(pool, user.user_id).await?;
    sweep_expired(pool, Some(cart.id), Some(payload.product_id)).await?;

    let mut tx = pool.begin().await?;

    let product = lock_product(&mut tx, payload.product_id)
        .await?
        .ok_or(AppError::NotFound)?;

    if let Some(deadline) = blocking_reservation(&mut tx, payload.product_id, cart.id).await? {
        return Err(reserved_conflict(deadline));
    }

    let existing: Option<CartItem> =
        sqlx::query_as("SELECT * FROM cart_items WHERE cart_id = $1 AND product_id = $2")
            .bind(cart.id)
            .bind(payload.product_id)
            .fetch_optional(&mut *tx)
            .await?;

    let created = match existing {
        Some(item) => {
            if item.count + 1 > product.stock {
                return Err(AppError::BadRequest("Insufficient stock".into()));
            }
            sqlx::query(
                r#"
                UPDATE cart_items
                SET count = count + 1, reserved_until = $2, updated_at = now()
                WHERE id = $1
                "#,
            )
            .bind(item.id)
            .bind(schedule::reservation_deadline())
            .execute(&mut *tx)
            .await?;
            false
        }
        None => {
            if product.stock < 1 {
                return Err(AppError::BadRequest("Insufficient stock".into()));
            }
            sqlx::query(
                r#"
                INSERT INTO cart_items (id, cart_id, product_id, count, reserved_until)
                VALUES ($1, $2, $3, 1, $4)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(cart.id)
            .bind(payload.product_id)
            .bind(schedule::reservation_deadline())
            .execute(&mut *tx)
            .await?;
            resync_total(&mut *tx, cart.id).await?;
            true
        }
    };

    tx.commit().await?;

    audit::record(
        pool,
        Some(user.user_id),
        "cart_add",
        Some("cart_items"),
        Some(serde_json::json!({ "product_id": payload.product_id })),
    )
    .await;

    let view = cart_view(pool, cart.id).await?;
    let message = if created { "Added to cart" } else { "Cart updated" };
    Ok((created, ApiResponse::success(message, view, None)))
}

/// Set an exact line count and push the reservation deadline forward.
pub async fn update_item(
    pool: &DbPool,
    user: &AuthUser,
    payload: UpdateItemRequest,
) -> AppResult<ApiResponse<CartView>> {
    let cart = get_or_create_cart(pool, user.user_id).await?;
    sweep_expired(pool, Some(cart.id), Some(payload.product_id)).await?;

    let mut tx = pool.begin().await?;

    let product = lock_product(&mut tx, payload.product_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let item: Option<CartItem> = sqlx::query_as(
        "SELECT * FROM cart_items WHERE cart_id = $1 AND product_id = $2 FOR UPDATE",
    )
    .bind(cart.id)
    .bind(payload.product_id)
    .fetch_optional(&mut *tx)
    .await?;
    let item = item.ok_or(AppError::NotFound)?;

    if payload.count < 1 || payload.count > product.stock {
        return Err(AppError::BadRequest("Quantity not allowed".into()));
    }

    sqlx::query(
        r#"
        UPDATE cart_items
        SET count = $2, reserved_until = $3, updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(item.id)
    .bind(payload.count)
    .bind(schedule::reservation_deadline())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    audit::record(
        pool,
        Some(user.user_id),
        "cart_update",
        Some("cart_items"),
        Some(serde_json::json!({ "product_id": payload.product_id, "count": payload.count })),
    )
    .await;

    let view = cart_view(pool, cart.id).await?;
    Ok(ApiResponse::success("Cart updated", view, None))
}

pub async fn remove_item(
    pool: &DbPool,
    user: &AuthUser,
    product_id: Uuid,
) -> AppResult<ApiResponse<CartView>> {
    let cart = get_or_create_cart(pool, user.user_id).await?;
    sweep_expired(pool, Some(cart.id), Some(product_id)).await?;

    let result = sqlx::query("DELETE FROM cart_items WHERE cart_id = $1 AND product_id = $2")
        .bind(cart.id)
        .bind(product_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }
    resync_total(pool, cart.id).await?;

    audit::record(
        pool,
        Some(user.user_id),
        "cart_remove",
        Some("cart_items"),
        Some(serde_json::json!({ "product_id": product_id })),
    )
    .await;

    let view = cart_view(pool, cart.id).await?;
    Ok(ApiResponse::success("Removed from cart", view, None))
}

pub async fn empty_cart(
    pool: &DbPool,
    user: &AuthUser,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let cart = get_or_create_cart(pool, user.user_id).await?;

    sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
        .bind(cart.id)
        .execute(pool)
        .await?;
    sqlx::query("UPDATE carts SET total_items = 0, updated_at = now() WHERE id = $1")
        .bind(cart.id)
        .execute(pool)
        .await?;

    audit::record(pool, Some(user.user_id), "cart_empty", Some("carts"), None).await;

    Ok(ApiResponse::success(
        "Cart emptied",
        serde_json::json!({ "success": true }),
        Some(Meta::empty()),
    ))
}

pub async fn item_count(pool: &DbPool, user: &AuthUser) -> AppResult<ApiResponse<CartCount>> {
    let cart = get_or_create_cart(pool, user.user_id).await?;
    sweep_expired(pool, Some(cart.id), None).await?;

    let (total_items,): (i32,) = sqlx::query_as("SELECT total_items FROM carts WHERE id = $1")
        .bind(cart.id)
        .fetch_one(pool)
        .await?;

    Ok(ApiResponse::success("OK", CartCount { total_items }, None))
}

pub async fn cart_totals(pool: &DbPool, user: &AuthUser) -> AppResult<ApiResponse<CartTotals>> {
    let cart = get_or_create_cart(pool, user.user_id).await?;
    sweep_expired(pool, Some(cart.id), None).await?;

    let rows = sqlx::query_as::<_, PriceRow>(
        r#"
        SELECT p.price, p.discount_percent, ci.count
        FROM cart_items ci
        JOIN products p ON p.id = ci.product_id
        WHERE ci.cart_id = $1
        "#,
    )
    .bind(cart.id)
    .fetch_all(pool)
    .await?;

    let lines: Vec<LineInput> = rows
        .iter()
        .map(|row| LineInput {
            unit_price: row.price,
            discount_percent: row.discount_percent,
            count: row.count,
        })
        .collect();
    let estimate = pricing::cart_estimate(&lines);

    Ok(ApiResponse::success(
        "OK",
        CartTotals {
            total_cost: estimate.total_cost,
            total_compare_cost: estimate.total_compare_cost,
        },
        None,
    ))
}

/// Merge one offline entry into the cart. Entries that cannot apply (unknown
/// product, zero count, reserved elsewhere, out of stock) are skipped without
/// failing the whole sync.
async fn sync_entry(pool: &DbPool, cart_id: Uuid, entry: &SyncCartEntry) -> AppResult<()> {
    if entry.count < 1 {
        return Ok(());
    }

    let mut tx = pool.begin().await?;

    let Some(product) = lock_product(&mut tx, entry.product_id).await? else {
        return Ok(());
    };

    if blocking_reservation(&mut tx, entry.product_id, cart_id)
        .await?
        .is_some()
    {
        return Ok(());
    }

    let existing: Option<CartItem> =
        sqlx::query_as("SELECT * FROM cart_items WHERE cart_id = $1 AND product_id = $2")
            .bind(cart_id)
            .bind(entry.product_id)
            .fetch_optional(&mut *tx)
            .await?;

    match existing {
        Some(item) => {
            // Stockless products keep their merged count instead of clamping to zero.
            let limit = if product.stock > 0 {
                product.stock
            } else {
                item.count + entry.count
            };
            let new_count = (item.count + entry.count).min(limit);
            sqlx::query(
                r#"
                UPDATE cart_items
                SET count = $2, reserved_until = $3, updated_at = now()
                WHERE id = $1
                "#,
            )
            .bind(item.id)
            .bind(new_count)
            .bind(schedule::reservation_deadline())
            .execute(&mut *tx)
            .await?;
        }
        None => {
            if product.stock < 1 {
                return Ok(());
            }
            let count = entry.count.min(product.stock).max(1);
            sqlx::query(
                r#"
                INSERT INTO cart_items (id, cart_id, product_id, count, reserved_until)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(cart_id)
            .bind(entry.product_id)
            .bind(count)
            .bind(schedule::reservation_deadline())
            .execute(&mut *tx)
            .await?;
        }
    }

    tx.commit().await?;
    Ok(())
}

/// Merge a client-side cart (e.g. built while logged out) into the server
/// cart, entry by entry.
pub async fn sync_cart(
    pool: &DbPool,
    user: &AuthUser,
    payload: SyncCartRequest,
) -> AppResult<ApiResponse<CartView>> {
    let cart = get_or_create_cart(pool, user.user_id).await?;
    sweep_expired(pool, Some(cart.id), None).await?;

    for entry in &payload.cart_items {
        sync_entry(pool, cart.id, entry).await?;
    }
    resync_total(pool, cart.id).await?;

    audit::record(
        pool,
        Some(user.user_id),
        "cart_sync",
        Some("cart_items"),
        Some(serde_json::json!({ "entries": payload.cart_items.len() })),
    )
    .await;

    let view = cart_view(pool, cart.id).await?;
    Ok(ApiResponse::success("Cart synchronized", view, None))
}
