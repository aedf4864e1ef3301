use rust_decimal::Decimal;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, Set, Statement};
use uuid::Uuid;
use yuancity_api::{
    db::{create_orm_conn, create_pool, run_migrations},
    dto::{
        cart::{AddItemRequest, UpdateItemRequest},
        checkout::CheckoutCompleteRequest,
    },
    entity::{
        orders::Entity as Orders,
        products::{ActiveModel as ProductActive, Entity as Products},
        users::ActiveModel as UserActive,
        vendor_payouts::Entity as VendorPayouts,
    },
    error::AppError,
    middleware::auth::AuthUser,
    notify::Notifier,
    payments::CardProcessor,
    services::{cart_service, checkout_service},
    state::AppState,
};

// Stock guard: a cart line whose count outgrew the remaining stock blocks
// both the summary and the settlement, and a rejected settlement leaves no
// trace — no order, no payouts, stock and cart untouched.
#[tokio::test]
async fn oversized_cart_line_blocks_settlement() -> anyhow::Result<()> {
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
            );
            return Ok(());
        }
    };

    let state = setup_state(&database_url).await?;

    let vendor_id = create_user(&state, "vendor", "artesanias@example.com").await?;
    let buyer = AuthUser {
        user_id: create_user(&state, "client", "cliente@example.com").await?,
        role: "client".into(),
    };

    let mochila = create_product(&state, vendor_id, "Mochila Wayuu", 100000, 0, 3).await?;

    cart_service::add_item(&state.pool, &buyer, AddItemRequest { product_id: mochila }).await?;
    cart_service::update_item(
        &state.pool,
        &buyer,
        UpdateItemRequest {
            product_id: mochila,
            count: 3,
        },
    )
    .await?;

    // Another sale shrinks the stock underneath the reserved line.
    let product = Products::find_by_id(mochila).one(&state.orm).await?.unwrap();
    let mut active: ProductActive = product.into();
    active.stock = Set(1);
    active.update(&state.orm).await?;

    let err = checkout_service::summary(&state, &buyer, None)
        .await
        .expect_err("summary must not price an oversized line");
    assert!(matches!(err, AppError::BadRequest(message) if message.contains("Mochila Wayuu")));

    let err = checkout_service::complete(&state, &buyer, shipping_request())
        .await
        .expect_err("settlement must reject an oversized line");
    assert!(matches!(err, AppError::BadRequest(message) if message.contains("Mochila Wayuu")));

    // Nothing was written: no order, no payouts, stock and cart as before.
    assert!(Orders::find().all(&state.orm).await?.is_empty());
    assert!(VendorPayouts::find().all(&state.orm).await?.is_empty());
    let product = Products::find_by_id(mochila).one(&state.orm).await?.unwrap();
    assert_eq!(product.stock, 1);
    assert!(product.is_available);
    let count = cart_service::item_count(&state.pool, &buyer).await?.data.unwrap();
    assert_eq!(count.total_items, 1);

    // Shrinking the line to what is left lets the same checkout through.
    cart_service::update_item(
        &state.pool,
        &buyer,
        UpdateItemRequest {
            product_id: mochila,
            count: 1,
        },
    )
    .await?;
    let receipt = checkout_service::complete(&state, &buyer, shipping_request())
        .await?
        .data
        .unwrap();
    assert_eq!(receipt.status, "confirmed");
    let product = Products::find_by_id(mochila).one(&state.orm).await?.unwrap();
    assert_eq!(product.stock, 0);
    assert!(!product.is_available);

    Ok(())
}

fn shipping_request() -> CheckoutCompleteRequest {
    CheckoutCompleteRequest {
        payment_method: Some("cash".into()),
        payment_intent_id: None,
        full_name: Some("Camila Rojas".into()),
        telephone_number: Some("3001234567".into()),
        address_line_1: Some("Calle 12 # 34-56".into()),
        address_line_2: Some("Apto 201".into()),
        pickup_notes: None,
        city: Some("Bogotá".into()),
        state_province_region: Some("Cundinamarca".into()),
        postal_zip_code: Some("110111".into()),
        country_region: None,
        coupon_name: None,
    }
}

async fn setup_state(database_url: &str) -> anyhow::Result<AppState> {
    let pool = create_pool(database_url).await?;
    let orm = create_orm_conn(database_url).await?;
    run_migrations(&orm).await?;

    // Clean tables between runs
    let backend = orm.get_database_backend();
    orm.execute(Statement::from_string(
        backend,
        "TRUNCATE TABLE vendor_payouts, vendor_bank_accounts, order_items, orders, cart_items, carts, \
         fixed_price_coupons, percentage_coupons, notifications, audit_logs, products, users RESTART IDENTITY CASCADE",
    ))
    .await?;

    Ok(AppState {
        payments: CardProcessor::disabled(),
        notifier: Notifier::new(pool.clone()),
        pool,
        orm,
    })
}

async fn create_user(state: &AppState, role: &str, email: &str) -> anyhow::Result<Uuid> {
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        full_name: Set(email.split('@').next().unwrap_or_default().to_string()),
        phone: Set(String::new()),
        role: Set(role.into()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(user.id)
}

async fn create_product(
    state: &AppState,
    vendor_id: Uuid,
    name: &str,
    price: i64,
    discount_percent: i32,
    stock: i32,
) -> anyhow::Result<Uuid> {
    let product = ProductActive {
        id: Set(Uuid::new_v4()),
        vendor_id: Set(vendor_id),
        name: Set(name.into()),
        description: Set(None),
        price: Set(Decimal::from(price)),
        discount_percent: Set(discount_percent),
        currency: NotSet,
        stock: Set(stock),
        is_available: NotSet,
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(product.id)
}
