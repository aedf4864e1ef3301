use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set, Statement};
use uuid::Uuid;
use yuancity_api::{
    db::{create_orm_conn, create_pool, run_migrations},
    dto::{
        cart::AddItemRequest,
        checkout::CheckoutCompleteRequest,
        orders::UpdateOrderStatusRequest,
        payouts::{AdminPayoutStatusRequest, BankAccountRequest},
    },
    entity::{
        orders::{Entity as Orders, OrderStatus},
        products::ActiveModel as ProductActive,
        users::ActiveModel as UserActive,
        vendor_payouts::{
            ActiveModel as PayoutActive, Column as PayoutCol, Entity as VendorPayouts, PayoutStatus,
        },
    },
    error::AppError,
    middleware::auth::AuthUser,
    notify::Notifier,
    payments::CardProcessor,
    services::{cart_service, checkout_service, order_service, payout_service},
    state::AppState,
};

// Payout lifecycle: earnings wait for the buyer's delivery confirmation,
// clear after five business days, and can then be withdrawn to a saved bank
// account exactly once.
#[tokio::test]
async fn payouts_clear_and_release() -> anyhow::Result<()> {
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

    let buyer = AuthUser {
        user_id: create_user(&state, "client", "cliente@example.com").await?,
        role: "client".into(),
    };
    let vendor_a = AuthUser {
        user_id: create_user(&state, "vendor", "artesanias@example.com").await?,
        role: "vendor".into(),
    };
    let vendor_b = AuthUser {
        user_id: create_user(&state, "vendor", "cafetera@example.com").await?,
        role: "vendor".into(),
    };
    let admin = AuthUser {
        user_id: create_user(&state, "admin", "admin@example.com").await?,
        role: "admin".into(),
    };

    let mochila = create_product(&state, vendor_a.user_id, "Mochila Wayuu", 100000, 0, 3).await?;
    let cafe = create_product(&state, vendor_b.user_id, "Café de origen 500g", 40000, 0, 5).await?;

    cart_service::add_item(&state.pool, &buyer, AddItemRequest { product_id: mochila }).await?;
    cart_service::add_item(&state.pool, &buyer, AddItemRequest { product_id: cafe }).await?;
    let receipt = checkout_service::complete(&state, &buyer, shipping_request())
        .await?
        .data
        .unwrap();

    // Fresh sale: everything is pending, nothing has a release date yet.
    let overview = payout_service::summary(&state, &vendor_a).await?.data.unwrap();
    assert_eq!(overview.summary.pending_amount, "85000");
    assert_eq!(overview.summary.available_amount, "0");
    assert_eq!(overview.summary.in_transfer_amount, "0");
    assert!(overview.summary.next_release_on.is_none());
    assert!(!overview.summary.has_bank_account);
    assert_eq!(overview.payouts.len(), 1);
    assert_eq!(overview.payouts[0].status, PayoutStatus::WaitingConfirmation);
    assert_eq!(overview.payouts[0].order_transaction_id, receipt.transaction_id);
    let payout_a_id = overview.payouts[0].id;

    let err = payout_service::withdraw(&state, &vendor_a, payout_a_id)
        .await
        .expect_err("unconfirmed earnings cannot be withdrawn");
    assert!(matches!(err, AppError::Conflict { .. }));

    // The buyer cannot confirm until the order ships.
    let err = order_service::confirm_delivery(&state, &buyer, &receipt.transaction_id)
        .await
        .expect_err("confirmation requires the order to be shipping");
    assert!(matches!(err, AppError::BadRequest(_)));

    // A bystander cannot even see the order, let alone move it.
    let err = order_service::update_status(
        &state,
        &buyer,
        receipt.order_id,
        UpdateOrderStatusRequest {
            status: OrderStatus::Shipping,
        },
    )
    .await
    .expect_err("buyers do not drive fulfilment");
    assert!(matches!(err, AppError::NotFound));

    // The vendor ships.
    let shipped = order_service::update_status(
        &state,
        &vendor_a,
        receipt.order_id,
        UpdateOrderStatusRequest {
            status: OrderStatus::Shipping,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(shipped.status, OrderStatus::Shipping);
    assert!(shipped.shipped_at.is_some());

    let err = order_service::update_status(
        &state,
        &vendor_a,
        receipt.order_id,
        UpdateOrderStatusRequest {
            status: OrderStatus::Processed,
        },
    )
    .await
    .expect_err("the pipeline does not move backwards");
    assert!(matches!(err, AppError::BadRequest(_)));

    // Buyer confirms receipt: all payouts of the order enter clearance with
    // the same release date, five business days out.
    let before = Utc::now();
    let confirmed = order_service::confirm_delivery(&state, &buyer, &receipt.transaction_id)
        .await?
        .data
        .unwrap();
    assert_eq!(confirmed.payouts_updated, 2);
    let release = confirmed.available_on.expect("release date");
    assert!(release > before + Duration::days(4));
    assert!(release < before + Duration::days(8));

    // The confirmation stamp and the payout advance are one atomic write: a
    // stamped order never coexists with a payout still waiting confirmation,
    // and every payout carries the same stamp and release date as the order.
    let order = Orders::find_by_id(receipt.order_id)
        .one(&state.orm)
        .await?
        .unwrap();
    assert_eq!(order.status, OrderStatus::Delivered);
    let confirmed_at = order.buyer_confirmed_at.expect("confirmation stamp");
    let payouts = VendorPayouts::find().all(&state.orm).await?;
    assert_eq!(payouts.len(), 2);
    let shared_release = payouts[0].available_on.expect("release date on payout");
    for payout in &payouts {
        assert_eq!(payout.status, PayoutStatus::PendingClearance);
        assert_eq!(payout.buyer_confirmed_at, Some(confirmed_at));
        assert_eq!(payout.available_on, Some(shared_release));
    }
    assert!((shared_release.with_timezone(&Utc) - release).num_seconds().abs() < 1);

    // Confirming again is answered idempotently.
    let resp = order_service::confirm_delivery(&state, &buyer, &receipt.transaction_id).await?;
    assert_eq!(resp.message, "Already confirmed");
    let repeat = resp.data.unwrap();
    assert_eq!(repeat.payouts_updated, 0);
    assert!(repeat.available_on.is_some());

    let overview = payout_service::summary(&state, &vendor_a).await?.data.unwrap();
    assert_eq!(overview.summary.pending_amount, "85000");
    assert!(overview.summary.next_release_on.is_some());

    // Still inside the clearance window.
    let err = payout_service::withdraw(&state, &vendor_a, payout_a_id)
        .await
        .expect_err("clearance window has not elapsed");
    assert!(matches!(err, AppError::Conflict { .. }));

    // Let the window lapse.
    let payout = VendorPayouts::find_by_id(payout_a_id)
        .one(&state.orm)
        .await?
        .unwrap();
    let mut active: PayoutActive = payout.into();
    active.available_on = Set(Some((Utc::now() - Duration::days(1)).into()));
    active.update(&state.orm).await?;

    // The next read promotes the payout; no background job involved.
    let overview = payout_service::summary(&state, &vendor_a).await?.data.unwrap();
    assert_eq!(overview.summary.pending_amount, "0");
    assert_eq!(overview.summary.available_amount, "85000");

    // Available, but there is no account to send the money to.
    let err = payout_service::withdraw(&state, &vendor_a, payout_a_id)
        .await
        .expect_err("withdrawal needs a bank account");
    assert!(matches!(err, AppError::BadRequest(_)));

    let err = payout_service::put_bank_account(
        &state,
        &vendor_a,
        bank_account_request("corriente"),
    )
    .await
    .expect_err("unknown account type must be rejected");
    assert!(matches!(err, AppError::BadRequest(_)));

    payout_service::put_bank_account(&state, &vendor_a, bank_account_request("savings")).await?;
    let stored = payout_service::get_bank_account(&state, &vendor_a)
        .await?
        .data
        .unwrap()
        .account
        .expect("bank account");
    assert_eq!(stored.bank_name, "Bancolombia");

    // Withdraw: released exactly once, with the account frozen into the row.
    let withdrawal = payout_service::withdraw(&state, &vendor_a, payout_a_id)
        .await?
        .data
        .unwrap();
    assert_eq!(withdrawal.payout.status, PayoutStatus::Released);
    assert!(withdrawal.payout.released_at.is_some());

    let row = VendorPayouts::find_by_id(payout_a_id)
        .one(&state.orm)
        .await?
        .unwrap();
    let snapshot = row.bank_account_snapshot.expect("snapshot");
    assert_eq!(snapshot.get("bank_name").and_then(|v| v.as_str()), Some("Bancolombia"));

    let overview = payout_service::summary(&state, &vendor_a).await?.data.unwrap();
    assert_eq!(overview.summary.available_amount, "0");
    assert_eq!(overview.summary.in_transfer_amount, "85000");

    let err = payout_service::withdraw(&state, &vendor_a, payout_a_id)
        .await
        .expect_err("a released payout cannot be withdrawn again");
    assert!(matches!(err, AppError::Conflict { .. }));

    // Admin overrides for the other vendor's payout.
    let payout_b = VendorPayouts::find()
        .filter(PayoutCol::VendorId.eq(vendor_b.user_id))
        .one(&state.orm)
        .await?
        .unwrap();

    let err = payout_service::admin_update_payout_status(
        &state,
        &vendor_a,
        payout_b.id,
        admin_request(PayoutStatus::Available),
    )
    .await
    .expect_err("only admins may override payouts");
    assert!(matches!(err, AppError::Forbidden));

    let released = payout_service::admin_update_payout_status(
        &state,
        &admin,
        payout_b.id,
        admin_request(PayoutStatus::Released),
    )
    .await?
    .data
    .unwrap();
    assert_eq!(released.status, PayoutStatus::Released);
    assert!(released.released_at.is_some());

    // Moving away from released clears the release stamp again.
    let reverted = payout_service::admin_update_payout_status(
        &state,
        &admin,
        payout_b.id,
        admin_request(PayoutStatus::Available),
    )
    .await?
    .data
    .unwrap();
    assert_eq!(reverted.status, PayoutStatus::Available);
    assert!(reverted.released_at.is_none());

    Ok(())
}

fn admin_request(status: PayoutStatus) -> AdminPayoutStatusRequest {
    AdminPayoutStatusRequest {
        status,
        notes: None,
        available_on: None,
        buyer_confirmed: false,
    }
}

fn bank_account_request(account_type: &str) -> BankAccountRequest {
    BankAccountRequest {
        bank_name: "Bancolombia".into(),
        account_type: account_type.into(),
        account_number: "012345678901".into(),
        account_holder_name: "Artesanías del Valle SAS".into(),
        document_type: "nit".into(),
        document_number: "900123456-7".into(),
    }
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
