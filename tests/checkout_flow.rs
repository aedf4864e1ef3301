use rust_decimal::Decimal;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set, Statement};
use uuid::Uuid;
use yuancity_api::{
    db::{create_orm_conn, create_pool, run_migrations},
    dto::{cart::AddItemRequest, cart::UpdateItemRequest, checkout::CheckoutCompleteRequest},
    entity::{
        order_items::{Column as OrderItemCol, Entity as OrderItems},
        orders::{Entity as Orders, OrderStatus},
        percentage_coupons::ActiveModel as PercentageCouponActive,
        products::{ActiveModel as ProductActive, Entity as Products},
        users::ActiveModel as UserActive,
        vendor_payouts::{Column as PayoutCol, Entity as VendorPayouts, PayoutStatus},
    },
    error::AppError,
    middleware::auth::AuthUser,
    notify::Notifier,
    payments::CardProcessor,
    routes::params::{OrderListQuery, Pagination},
    services::{cart_service, checkout_service, order_service},
    state::AppState,
};

// Settlement flow: a cart with lines from two vendors is priced with a
// coupon, settled with cash, and leaves behind the order, its lines, the
// stock decrements and one waiting payout per vendor.
#[tokio::test]
async fn checkout_settles_across_vendors() -> anyhow::Result<()> {
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

    let vendor_a = create_user(&state, "vendor", "artesanias@example.com").await?;
    let vendor_b = create_user(&state, "vendor", "cafetera@example.com").await?;
    let vendor_c = create_user(&state, "vendor", "sin-ventas@example.com").await?;
    let buyer = AuthUser {
        user_id: create_user(&state, "client", "cliente@example.com").await?,
        role: "client".into(),
    };

    let mochila = create_product(&state, vendor_a, "Mochila Wayuu", 100000, 10, 5).await?;
    let cafe = create_product(&state, vendor_b, "Café de origen 500g", 38000, 0, 10).await?;

    PercentageCouponActive {
        id: Set(Uuid::new_v4()),
        name: Set("SALE20".into()),
        discount_percentage: Set(20),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    // Cart: one mochila at 10 % off, two bags of coffee.
    cart_service::add_item(&state.pool, &buyer, AddItemRequest { product_id: mochila }).await?;
    cart_service::add_item(&state.pool, &buyer, AddItemRequest { product_id: cafe }).await?;
    cart_service::update_item(
        &state.pool,
        &buyer,
        UpdateItemRequest {
            product_id: cafe,
            count: 2,
        },
    )
    .await?;

    // Quote without coupon: 90000 + 76000 subtotal, 15 % tax on top.
    let quote = checkout_service::summary(&state, &buyer, None).await?.data.unwrap();
    assert_eq!(quote.currency, "COP");
    assert_eq!(quote.discounted_subtotal, "166000");
    assert_eq!(quote.estimated_tax, "24900");
    assert_eq!(quote.total_amount, "190900");
    assert_eq!(quote.savings_from_discounts, "10000");
    assert_eq!(quote.coupon_name, "");

    // Coupon names resolve case-insensitively.
    let quote = checkout_service::summary(&state, &buyer, Some("sale20".into()))
        .await?
        .data
        .unwrap();
    assert_eq!(quote.coupon_name, "SALE20");
    assert_eq!(quote.estimated_tax, "19920");
    assert_eq!(quote.total_amount, "152720");

    // Missing address basics are reported together, before anything settles.
    let err = checkout_service::complete(&state, &buyer, empty_request())
        .await
        .expect_err("shipping fields are required");
    match err {
        AppError::BadRequest(message) => {
            assert!(message.contains("telephone_number"));
            assert!(message.contains("address_line_1"));
            assert!(message.contains("city"));
            assert!(message.contains("state_province_region"));
        }
        other => panic!("expected bad request, got {other:?}"),
    }
    assert!(
        Orders::find().all(&state.orm).await?.is_empty(),
        "a rejected checkout must leave nothing behind"
    );

    // Settle with cash. The card processor is not even configured here.
    let receipt = checkout_service::complete(&state, &buyer, shipping_request())
        .await?
        .data
        .unwrap();
    assert_eq!(receipt.status, "confirmed");
    assert_eq!(receipt.amount, "152720");

    // The order snapshot: pickup notes became the second address line,
    // postal code and country fell back to platform defaults.
    let order = Orders::find_by_id(receipt.order_id)
        .one(&state.orm)
        .await?
        .expect("order row");
    assert_eq!(order.status, OrderStatus::NotProcessed);
    assert_eq!(order.amount, Decimal::from(152720));
    assert_eq!(order.transaction_id, receipt.transaction_id);
    assert_eq!(order.address_line_2, "Torre 2, apto 501");
    assert_eq!(order.postal_zip_code, "000000");
    assert_eq!(order.country_region, "Colombia");
    assert_eq!(order.shipping_price, Decimal::ZERO);

    // Stock went down, per line count.
    let mochila_row = Products::find_by_id(mochila).one(&state.orm).await?.unwrap();
    assert_eq!(mochila_row.stock, 4);
    let cafe_row = Products::find_by_id(cafe).one(&state.orm).await?.unwrap();
    assert_eq!(cafe_row.stock, 8);

    // Order lines carry the discounted unit price and the fee split.
    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(&state.orm)
        .await?;
    assert_eq!(items.len(), 2);
    let mochila_line = items.iter().find(|i| i.product_id == mochila).unwrap();
    assert_eq!(mochila_line.price, Decimal::from(90000));
    assert_eq!(mochila_line.count, 1);
    assert_eq!(mochila_line.platform_fee, Decimal::from(13500));
    assert_eq!(mochila_line.vendor_earnings, Decimal::from(76500));
    let cafe_line = items.iter().find(|i| i.product_id == cafe).unwrap();
    assert_eq!(cafe_line.price, Decimal::from(38000));
    assert_eq!(cafe_line.count, 2);
    assert_eq!(cafe_line.platform_fee, Decimal::from(11400));
    assert_eq!(cafe_line.vendor_earnings, Decimal::from(64600));

    // One payout per vendor, waiting for the buyer's confirmation. The
    // coupon came out of the platform's pocket, not the vendors'.
    let payouts = VendorPayouts::find()
        .filter(PayoutCol::OrderId.eq(order.id))
        .all(&state.orm)
        .await?;
    assert_eq!(payouts.len(), 2);
    let payout_a = payouts.iter().find(|p| p.vendor_id == vendor_a).unwrap();
    assert_eq!(payout_a.status, PayoutStatus::WaitingConfirmation);
    assert_eq!(payout_a.gross_amount, Decimal::from(90000));
    assert_eq!(payout_a.platform_fee, Decimal::from(13500));
    assert_eq!(payout_a.net_amount, Decimal::from(76500));
    assert_eq!(payout_a.items_count, 1);
    assert!(payout_a.available_on.is_none());
    let payout_b = payouts.iter().find(|p| p.vendor_id == vendor_b).unwrap();
    assert_eq!(payout_b.net_amount, Decimal::from(64600));
    assert_eq!(payout_b.items_count, 2);

    // The cart was cleared inside the same transaction.
    let count = cart_service::item_count(&state.pool, &buyer).await?.data.unwrap();
    assert_eq!(count.total_items, 0);
    let err = checkout_service::complete(&state, &buyer, shipping_request())
        .await
        .expect_err("an empty cart cannot settle");
    assert!(matches!(err, AppError::BadRequest(message) if message == "Cart is empty"));

    // Visibility: the buyer sees both lines, each vendor only their own,
    // and a vendor without lines cannot tell the order exists.
    let full = order_service::get_order(&state, &buyer, &receipt.transaction_id)
        .await?
        .data
        .unwrap();
    assert_eq!(full.items.len(), 2);

    let vendor_view = order_service::get_order(
        &state,
        &AuthUser {
            user_id: vendor_a,
            role: "vendor".into(),
        },
        &receipt.transaction_id,
    )
    .await?
    .data
    .unwrap();
    assert_eq!(vendor_view.items.len(), 1);
    assert_eq!(vendor_view.items[0].product_id, mochila);

    let err = order_service::get_order(
        &state,
        &AuthUser {
            user_id: vendor_c,
            role: "vendor".into(),
        },
        &receipt.transaction_id,
    )
    .await
    .expect_err("uninvolved vendor must not see the order");
    assert!(matches!(err, AppError::NotFound));

    let listed = order_service::list_orders(
        &state,
        &buyer,
        OrderListQuery {
            pagination: Pagination {
                page: None,
                per_page: None,
            },
            status: None,
            sort_order: None,
        },
    )
    .await?;
    assert_eq!(listed.data.unwrap().items.len(), 1);
    assert_eq!(listed.meta.unwrap().total, Some(1));

    // Selling the last unit marks the product unavailable.
    let prensa = create_product(&state, vendor_b, "Prensa francesa", 72000, 0, 1).await?;
    cart_service::add_item(&state.pool, &buyer, AddItemRequest { product_id: prensa }).await?;
    checkout_service::complete(&state, &buyer, shipping_request()).await?;
    let prensa_row = Products::find_by_id(prensa).one(&state.orm).await?.unwrap();
    assert_eq!(prensa_row.stock, 0);
    assert!(!prensa_row.is_available);

    Ok(())
}

fn empty_request() -> CheckoutCompleteRequest {
    CheckoutCompleteRequest {
        payment_method: Some("cash".into()),
        payment_intent_id: None,
        full_name: None,
        telephone_number: None,
        address_line_1: None,
        address_line_2: None,
        pickup_notes: None,
        city: None,
        state_province_region: None,
        postal_zip_code: None,
        country_region: None,
        coupon_name: None,
    }
}

fn shipping_request() -> CheckoutCompleteRequest {
    CheckoutCompleteRequest {
        payment_method: Some("cash".into()),
        payment_intent_id: None,
        full_name: Some("Camila Rojas".into()),
        telephone_number: Some("3001234567".into()),
        address_line_1: Some("Calle 12 # 34-56".into()),
        address_line_2: None,
        pickup_notes: Some("Torre 2, apto 501".into()),
        city: Some("Bogotá".into()),
        state_province_region: Some("Cundinamarca".into()),
        postal_zip_code: None,
        country_region: None,
        coupon_name: Some("SALE20".into()),
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
