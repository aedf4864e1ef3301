use std::collections::HashMap;

use chrono::{DateTime, Utc};
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
    dto::payouts::{
        AdminPayoutStatusRequest, BankAccountRequest, BankAccountView, PayoutOverview,
        PayoutSummary, PayoutView, WithdrawResponse,
    },
    entity::{
        orders::{Column as OrderCol, Entity as Orders},
        vendor_bank_accounts::{
            ActiveModel as BankActive, Column as BankCol, Entity as VendorBankAccounts,
            Model as BankModel,
        },
        vendor_payouts::{
            ActiveModel as PayoutActive, Column as PayoutCol, Entity as VendorPayouts,
            Model as PayoutModel, PayoutStatus,
        },
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::BankAccount,
    pricing,
    response::{ApiResponse, Meta},
    state::AppState,
};

const ACCOUNT_TYPES: [&str; 2] = ["savings", "checking"];
const DOCUMENT_TYPES: [&str; 4] = ["cc", "ce", "nit", "other"];

/// Promote every payout of this vendor whose clearance window has elapsed.
/// Clearance is lazy: there is no background job, the promotion happens on
/// the next read or withdrawal attempt.
pub async fn refresh_vendor_payouts<C>(conn: &C, vendor_id: Uuid) -> AppResult<u64>
where
    C: ConnectionTrait,
{
    let now = Utc::now();
    let updated = VendorPayouts::update_many()
        .col_expr(PayoutCol::Status, Expr::value(PayoutStatus::Available))
        .col_expr(PayoutCol::UpdatedAt, Expr::value(now))
        .filter(PayoutCol::VendorId.eq(vendor_id))
        .filter(PayoutCol::Status.eq(PayoutStatus::PendingClearance))
        .filter(PayoutCol::AvailableOn.is_not_null())
        .filter(PayoutCol::AvailableOn.lte(now))
        .exec(conn)
        .await?;
    Ok(updated.rows_affected)
}

fn bank_snapshot(account: &BankModel) -> serde_json::Value {
    serde_json::json!({
        "bank_name": account.bank_name,
        "account_type": account.account_type,
        "account_number": account.account_number,
        "account_holder_name": account.account_holder_name,
        "document_type": account.document_type,
        "document_number": account.document_number,
    })
}

fn bank_account_from_entity(model: BankModel) -> BankAccount {
    BankAccount {
        id: model.id,
        bank_name: model.bank_name,
        account_type: model.account_type,
        account_number: model.account_number,
        account_holder_name: model.account_holder_name,
        document_type: model.document_type,
        document_number: model.document_number,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

async fn payout_views<C>(conn: &C, payouts: Vec<PayoutModel>) -> AppResult<Vec<PayoutView>>
where
    C: ConnectionTrait,
{
    let mut order_ids: Vec<Uuid> = payouts.iter().map(|payout| payout.order_id).collect();
    order_ids.sort_unstable();
    order_ids.dedup();

    let orders: HashMap<Uuid, (String, DateTime<Utc>)> = Orders::find()
        .filter(OrderCol::Id.is_in(order_ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|order| {
            (
                order.id,
                (order.transaction_id, order.date_issued.with_timezone(&Utc)),
            )
        })
        .collect();

    let mut views = Vec::with_capacity(payouts.len());
    for payout in payouts {
        let (order_transaction_id, order_date) = orders
            .get(&payout.order_id)
            .cloned()
            .unwrap_or_else(|| (String::new(), payout.created_at.with_timezone(&Utc)));
        views.push(PayoutView {
            id: payout.id,
            order: payout.order_id,
            order_transaction_id,
            order_date,
            status: payout.status,
            gross_amount: payout.gross_amount,
            platform_fee: payout.platform_fee,
            net_amount: payout.net_amount,
            items_count: payout.items_count,
            buyer_confirmed_at: payout.buyer_confirmed_at.map(|dt| dt.with_timezone(&Utc)),
            available_on: payout.available_on.map(|dt| dt.with_timezone(&Utc)),
            released_at: payout.released_at.map(|dt| dt.with_timezone(&Utc)),
        });
    }
    Ok(views)
}

/// Balance overview plus the five most recent payouts.
pub async fn summary(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<PayoutOverview>> {
    refresh_vendor_payouts(&state.orm, user.user_id).await?;

    let payouts = VendorPayouts::find()
        .filter(PayoutCol::VendorId.eq(user.user_id))
        .order_by_desc(PayoutCol::CreatedAt)
        .all(&state.orm)
        .await?;

    let mut pending = Decimal::ZERO;
    let mut available = Decimal::ZERO;
    let mut in_transfer = Decimal::ZERO;
    let mut next_release: Option<DateTime<Utc>> = None;

    for payout in &payouts {
        match payout.status {
            PayoutStatus::WaitingConfirmation | PayoutStatus::PendingClearance => {
                pending += payout.net_amount;
                if let Some(available_on) = payout.available_on {
                    let available_on = available_on.with_timezone(&Utc);
                    if next_release.is_none_or(|current| available_on < current) {
                        next_release = Some(available_on);
                    }
                }
            }
            PayoutStatus::Available => available += payout.net_amount,
            PayoutStatus::Released => in_transfer += payout.net_amount,
        }
    }

    let has_bank_account = VendorBankAccounts::find()
        .filter(BankCol::UserId.eq(user.user_id))
        .one(&state.orm)
        .await?
        .is_some();

    let recent: Vec<PayoutModel> = payouts.into_iter().take(5).collect();
    let views = payout_views(&state.orm, recent).await?;

    let overview = PayoutOverview {
        summary: PayoutSummary {
            pending_amount: pricing::format_money(pending, pricing::CURRENCY),
            available_amount: pricing::format_money(available, pricing::CURRENCY),
            in_transfer_amount: pricing::format_money(in_transfer, pricing::CURRENCY),
            next_release_on: next_release,
            has_bank_account,
        },
        payouts: views,
    };
    Ok(ApiResponse::success("OK", overview, None))
}

/// Release an available payout to the vendor's bank account. The payout row
/// is locked so a double-tap cannot release it twice, and the bank account is
/// frozen into the payout as a snapshot.
pub async fn withdraw(
    state: &AppState,
    user: &AuthUser,
    payout_id: Uuid,
) -> AppResult<ApiResponse<WithdrawResponse>> {
    let txn = state.orm.begin().await?;

    let payout = VendorPayouts::find()
        .filter(PayoutCol::Id.eq(payout_id))
        .filter(PayoutCol::VendorId.eq(user.user_id))
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    let now = Utc::now();
    let mut status = payout.status;
    if status == PayoutStatus::PendingClearance
        && payout
            .available_on
            .is_some_and(|available_on| available_on.with_timezone(&Utc) <= now)
    {
        status = PayoutStatus::Available;
    }

    if status != PayoutStatus::Available {
        return Err(AppError::conflict(
            "This payout is not yet available to withdraw",
            serde_json::json!({ "available_on": payout.available_on }),
        ));
    }

    let account = VendorBankAccounts::find()
        .filter(BankCol::UserId.eq(user.user_id))
        .one(&txn)
        .await?
        .ok_or_else(|| {
            AppError::BadRequest("Add a bank account to request withdrawals".into())
        })?;
    let snapshot = bank_snapshot(&account);

    let mut active: PayoutActive = payout.into();
    active.status = Set(PayoutStatus::Released);
    active.released_at = Set(Some(now.into()));
    active.bank_account_snapshot = Set(Some(snapshot));
    active.updated_at = Set(now.into());
    let payout = active.update(&txn).await?;

    txn.commit().await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "payout_withdraw",
        Some("vendor_payouts"),
        Some(serde_json::json!({ "payout_id": payout.id })),
    )
    .await;

    let view = payout_views(&state.orm, vec![payout])
        .await?
        .pop()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("payout view missing after withdraw")))?;

    Ok(ApiResponse::success(
        "Withdrawal requested",
        WithdrawResponse {
            success: "Estamos procesando tu retiro. El dinero se enviará a tu cuenta bancaria."
                .into(),
            payout: view,
        },
        Some(Meta::empty()),
    ))
}

pub async fn get_bank_account(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<BankAccountView>> {
    let account = VendorBankAccounts::find()
        .filter(BankCol::UserId.eq(user.user_id))
        .one(&state.orm)
        .await?;
    Ok(ApiResponse::success(
        "OK",
        BankAccountView {
            account: account.map(bank_account_from_entity),
        },
        None,
    ))
}

pub async fn put_bank_account(
    state: &AppState,
    user: &AuthUser,
    payload: BankAccountRequest,
) -> AppResult<ApiResponse<BankAccountView>> {
    if !ACCOUNT_TYPES.contains(&payload.account_type.as_str()) {
        return Err(AppError::BadRequest(format!(
            "account_type must be one of: {}",
            ACCOUNT_TYPES.join(", ")
        )));
    }
    if !DOCUMENT_TYPES.contains(&payload.document_type.as_str()) {
        return Err(AppError::BadRequest(format!(
            "document_type must be one of: {}",
            DOCUMENT_TYPES.join(", ")
        )));
    }

    let existing = VendorBankAccounts::find()
        .filter(BankCol::UserId.eq(user.user_id))
        .one(&state.orm)
        .await?;

    let saved = match existing {
        Some(account) => {
            let mut active: BankActive = account.into();
            active.bank_name = Set(payload.bank_name);
            active.account_type = Set(payload.account_type);
            active.account_number = Set(payload.account_number);
            active.account_holder_name = Set(payload.account_holder_name);
            active.document_type = Set(payload.document_type);
            active.document_number = Set(payload.document_number);
            active.updated_at = Set(Utc::now().into());
            active.update(&state.orm).await?
        }
        None => {
            BankActive {
                id: Set(Uuid::new_v4()),
                user_id: Set(user.user_id),
                bank_name: Set(payload.bank_name),
                account_type: Set(payload.account_type),
                account_number: Set(payload.account_number),
                account_holder_name: Set(payload.account_holder_name),
                document_type: Set(payload.document_type),
                document_number: Set(payload.document_number),
                created_at: NotSet,
                updated_at: NotSet,
            }
            .insert(&state.orm)
            .await?
        }
    };

    audit::record(
        &state.pool,
        Some(user.user_id),
        "bank_account_update",
        Some("vendor_bank_accounts"),
        None,
    )
    .await;

    Ok(ApiResponse::success(
        "Bank account saved",
        BankAccountView {
            account: Some(bank_account_from_entity(saved)),
        },
        None,
    ))
}

/// Admin override for a payout's lifecycle. Setting `released` stamps the
/// release time and freezes the vendor's current bank account unless a
/// snapshot was already taken; leaving `released` clears the stamp again.
pub async fn admin_update_payout_status(
    state: &AppState,
    user: &AuthUser,
    payout_id: Uuid,
    payload: AdminPayoutStatusRequest,
) -> AppResult<ApiResponse<PayoutView>> {
    ensure_admin(user)?;

    let payout = VendorPayouts::find_by_id(payout_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let now = Utc::now();
    let mut active: PayoutActive = payout.clone().into();
    active.status = Set(payload.status);
    active.updated_at = Set(now.into());

    if let Some(notes) = payload.notes {
        active.notes = Set(Some(notes));
    }
    if let Some(available_on) = payload.available_on {
        active.available_on = Set(Some(available_on.into()));
    }
    if payload.buyer_confirmed && payout.buyer_confirmed_at.is_none() {
        active.buyer_confirmed_at = Set(Some(now.into()));
    }

    if payload.status == PayoutStatus::Released {
        active.released_at = Set(Some(now.into()));
        if payout.bank_account_snapshot.is_none() {
            let account = VendorBankAccounts::find()
                .filter(BankCol::UserId.eq(payout.vendor_id))
                .one(&state.orm)
                .await?;
            if let Some(account) = account {
                active.bank_account_snapshot = Set(Some(bank_snapshot(&account)));
            }
        }
    } else if payout.released_at.is_some() {
        active.released_at = Set(None);
    }

    let payout = active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "payout_status_update",
        Some("vendor_payouts"),
        Some(serde_json::json!({ "payout_id": payout.id, "status": payout.status })),
    )
    .await;

    let view = payout_views(&state.orm, vec![payout])
        .await?
        .pop()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("payout view missing after update")))?;

    Ok(ApiResponse::success(
        "Payout updated",
        view,
        Some(Meta::empty()),
    ))
}
