//! Money math for checkout and cart totals.
//!
//! Every amount is a [`Decimal`]; rounding happens at fixed checkpoints with
//! half-up rounding to two decimal places, and nowhere else. The checkout
//! pipeline rounds per line, the cart estimate only rounds the final sums.

use rust_decimal::{Decimal, RoundingStrategy};

/// Platform settlement currency. Colombian pesos have no cents in practice,
/// so formatted amounts drop the fractional part.
pub const CURRENCY: &str = "COP";

pub const DELIVERY_NAME: &str = "Entrega a domicilio";
pub const DELIVERY_TIME: &str = "Estamos coordinando el envío";

const ZERO_DECIMAL_CURRENCIES: [&str; 5] = ["COP", "CLP", "JPY", "KRW", "VND"];

/// 15 % estimated tax charged to the buyer on the post-coupon total.
pub fn buyer_tax_rate() -> Decimal {
    Decimal::new(15, 2)
}

/// 15 % marketplace fee withheld from each vendor line.
pub fn seller_fee_rate() -> Decimal {
    Decimal::new(15, 2)
}

/// Flat shipping, currently free.
pub fn delivery_price() -> Decimal {
    Decimal::ZERO
}

/// Round half-up to two decimal places. This is the only rounding rule in the
/// engine.
pub fn quantize(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn is_zero_decimal(currency: &str) -> bool {
    ZERO_DECIMAL_CURRENCIES
        .iter()
        .any(|c| c.eq_ignore_ascii_case(currency))
}

/// Quantize, then render for the wire: zero-decimal currencies truncate to an
/// integer string, everything else keeps two decimals.
pub fn format_money(value: Decimal, currency: &str) -> String {
    let quantized = quantize(value);
    if is_zero_decimal(currency) {
        quantized.trunc().normalize().to_string()
    } else {
        format!("{quantized:.2}")
    }
}

/// One cart line as the pricing engine sees it.
#[derive(Debug, Clone, Copy)]
pub struct LineInput {
    pub unit_price: Decimal,
    pub discount_percent: i32,
    pub count: i32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineBreakdown {
    pub final_unit_price: Decimal,
    pub line_total: Decimal,
}

fn discount_multiplier(discount_percent: i32) -> Decimal {
    let multiplier = Decimal::ONE - Decimal::from(discount_percent) / Decimal::ONE_HUNDRED;
    if multiplier < Decimal::ZERO {
        Decimal::ZERO
    } else {
        multiplier
    }
}

/// Discounted unit price (rounded) and the line total derived from it.
pub fn line_breakdown(line: &LineInput) -> LineBreakdown {
    let final_unit_price = quantize(line.unit_price * discount_multiplier(line.discount_percent));
    let line_total = quantize(final_unit_price * Decimal::from(line.count));
    LineBreakdown {
        final_unit_price,
        line_total,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Subtotals {
    /// Sum of undiscounted unit price x count.
    pub original: Decimal,
    /// Sum of rounded line totals.
    pub discounted: Decimal,
}

pub fn subtotals(lines: &[LineInput]) -> Subtotals {
    let mut original = Decimal::ZERO;
    let mut discounted = Decimal::ZERO;
    for line in lines {
        original += line.unit_price * Decimal::from(line.count);
        discounted += line_breakdown(line).line_total;
    }
    Subtotals {
        original: quantize(original),
        discounted: quantize(discounted),
    }
}

/// A resolved coupon, ready to apply.
#[derive(Debug, Clone, PartialEq)]
pub enum Coupon {
    Fixed {
        name: String,
        discount_price: Decimal,
    },
    Percentage {
        name: String,
        discount_percentage: i32,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CouponOutcome {
    pub total: Decimal,
    /// Name of the coupon that actually applied, empty when none did.
    pub applied_name: String,
}

/// Apply a coupon to the discounted subtotal. A coupon that does not qualify
/// (fixed amount >= subtotal, or percentage outside 1..100 exclusive) is
/// silently ignored rather than rejected. The result never goes below zero.
pub fn apply_coupon(subtotal: Decimal, coupon: Option<&Coupon>) -> CouponOutcome {
    let skipped = CouponOutcome {
        total: subtotal,
        applied_name: String::new(),
    };

    let Some(coupon) = coupon else {
        return skipped;
    };

    match coupon {
        Coupon::Fixed {
            name,
            discount_price,
        } => {
            if *discount_price < subtotal {
                let total = (subtotal - discount_price).max(Decimal::ZERO);
                CouponOutcome {
                    total,
                    applied_name: name.clone(),
                }
            } else {
                skipped
            }
        }
        Coupon::Percentage {
            name,
            discount_percentage,
        } => {
            let percent = *discount_percentage;
            if percent > 1 && percent < 100 {
                let total = (subtotal * discount_multiplier(percent)).max(Decimal::ZERO);
                CouponOutcome {
                    total,
                    applied_name: name.clone(),
                }
            } else {
                skipped
            }
        }
    }
}

/// Full buyer-side quote: subtotals, coupon, tax, shipping and savings.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutQuote {
    pub original_subtotal: Decimal,
    pub discounted_subtotal: Decimal,
    pub total_after_coupon: Decimal,
    pub estimated_tax: Decimal,
    pub shipping_price: Decimal,
    pub total_amount: Decimal,
    pub savings_from_discounts: Decimal,
    pub coupon_name: String,
}

pub fn checkout_quote(lines: &[LineInput], coupon: Option<&Coupon>) -> CheckoutQuote {
    let totals = subtotals(lines);
    let outcome = apply_coupon(totals.discounted, coupon);

    let estimated_tax = quantize(outcome.total * buyer_tax_rate());
    let shipping_price = delivery_price();
    let total_amount = quantize(outcome.total + estimated_tax + shipping_price);
    let savings_from_discounts = (totals.original - totals.discounted).max(Decimal::ZERO);

    CheckoutQuote {
        original_subtotal: totals.original,
        discounted_subtotal: totals.discounted,
        total_after_coupon: outcome.total,
        estimated_tax,
        shipping_price,
        total_amount,
        savings_from_discounts,
        coupon_name: outcome.applied_name,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VendorShare {
    pub platform_fee: Decimal,
    pub vendor_earnings: Decimal,
}

/// Split a settled line total between the marketplace and the vendor.
/// fee + earnings always reconstructs the line total exactly.
pub fn vendor_split(line_total: Decimal) -> VendorShare {
    let platform_fee = quantize(line_total * seller_fee_rate());
    let vendor_earnings = quantize(line_total - platform_fee);
    VendorShare {
        platform_fee,
        vendor_earnings,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CartEstimate {
    pub total_cost: Decimal,
    pub total_compare_cost: Decimal,
}

/// Quick cart totals for the cart screen. Unlike [`checkout_quote`] the line
/// amounts are accumulated unrounded and only the two sums are quantized.
pub fn cart_estimate(lines: &[LineInput]) -> CartEstimate {
    let mut discounted = Decimal::ZERO;
    let mut regular = Decimal::ZERO;
    for line in lines {
        let count = Decimal::from(line.count);
        regular += line.unit_price * count;
        discounted += line.unit_price * discount_multiplier(line.discount_percent) * count;
    }
    CartEstimate {
        total_cost: quantize(discounted),
        total_compare_cost: quantize(regular),
    }
}
