//! Price computation for a stay
//!
//! All amounts are whole currency units. Percentages are applied with
//! round-half-up in integer arithmetic, so `subtotal = 105` yields a 10% tax
//! of 11 (10.5 rounded up) and never drifts through floating point.

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::model::Money;

/// Tax rate in percent
pub const TAX_PERCENT: Money = 10;

/// Service fee rate in percent
pub const SERVICE_FEE_PERCENT: Money = 5;

/// Itemized price of a stay
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceBreakdown {
    pub nights: u32,
    pub nightly_rate: Money,
    pub subtotal: Money,
    pub tax: Money,
    pub service_fee: Money,
    pub total: Money,
}

/// Number of nights billed for a stay; at least one
pub fn nights_between(check_in: NaiveDate, check_out: NaiveDate) -> u32 {
    let days = (check_out - check_in).num_days();
    u32::try_from(days).unwrap_or(0).max(1)
}

/// `amount * percent / 100`, rounded half-up; `None` on overflow
fn percent_of(amount: Money, percent: Money) -> Option<Money> {
    Some(amount.checked_mul(percent)?.checked_add(50)? / 100)
}

/// Itemizes a stay of `nights` (at least one) at `nightly_rate`
///
/// Fails with [`AppError::Validation`] when the amounts do not fit in
/// [`Money`], which only a corrupt or absurd room price can cause.
pub fn compute_price(nightly_rate: Money, nights: u32) -> AppResult<PriceBreakdown> {
    let nights = nights.max(1);
    let overflow = || {
        AppError::Validation(format!(
            "price of {} nights at {} per night is out of range",
            nights, nightly_rate
        ))
    };

    let subtotal = nightly_rate
        .checked_mul(Money::from(nights))
        .ok_or_else(overflow)?;
    let tax = percent_of(subtotal, TAX_PERCENT).ok_or_else(overflow)?;
    let service_fee = percent_of(subtotal, SERVICE_FEE_PERCENT).ok_or_else(overflow)?;
    let total = subtotal
        .checked_add(tax)
        .and_then(|sum| sum.checked_add(service_fee))
        .ok_or_else(overflow)?;

    Ok(PriceBreakdown {
        nights,
        nightly_rate,
        subtotal,
        tax,
        service_fee,
        total,
    })
}
