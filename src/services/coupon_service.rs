use sea_orm::sea_query::{Expr, Func};
use sea_orm::{ConnectionTrait, EntityTrait, QueryFilter};

use crate::{
    entity::{FixedPriceCoupons, PercentageCoupons, fixed_price_coupons, percentage_coupons},
    error::AppResult,
    pricing::Coupon,
};

/// Look up a coupon by name, case-insensitively. Fixed-price coupons win when
/// both tables carry the same name. An unknown or blank name resolves to
/// `None`; checkout proceeds without a discount rather than failing.
pub async fn resolve<C>(conn: &C, raw: Option<&str>) -> AppResult<Option<Coupon>>
where
    C: ConnectionTrait,
{
    let Some(raw) = raw else {
        return Ok(None);
    };
    let needle = raw.trim().to_lowercase();
    if needle.is_empty() {
        return Ok(None);
    }

    if let Some(fixed) = FixedPriceCoupons::find()
        .filter(Expr::expr(Func::lower(Expr::col(fixed_price_coupons::Column::Name))).eq(needle.clone()))
        .one(conn)
        .await?
    {
        return Ok(Some(Coupon::Fixed {
            name: fixed.name,
            discount_price: fixed.discount_price,
        }));
    }

    if let Some(percentage) = PercentageCoupons::find()
        .filter(
            Expr::expr(Func::lower(Expr::col(percentage_coupons::Column::Name))).eq(needle),
        )
        .one(conn)
        .await?
    {
        return Ok(Some(Coupon::Percentage {
            name: percentage.name,
            discount_percentage: percentage.discount_percentage,
        }));
    }

    Ok(None)
}
