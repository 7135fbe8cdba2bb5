//! Money

use num_traits::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use rusty_money::{Money, MoneyError, iso::Currency};
use thiserror::Error;

/// Errors raised by minor-unit arithmetic.
#[derive(Debug, Error, PartialEq)]
pub enum AmountError {
    /// Wrapped money arithmetic or currency mismatch error.
    #[error(transparent)]
    Money(#[from] MoneyError),

    /// The result does not fit in `i64` minor units.
    #[error("amount overflowed the minor unit range")]
    Overflow,

    /// Division by a zero quantity.
    #[error("cannot divide an amount by a zero quantity")]
    ZeroQuantity,
}

/// A zero amount in the given currency.
pub fn zero(currency: &Currency) -> Money<'_, Currency> {
    Money::from_minor(0, currency)
}

/// Multiply an amount by a quantity.
///
/// # Errors
///
/// Returns [`AmountError::Overflow`] if the product does not fit in minor units.
pub fn multiply<'a>(
    money: &Money<'a, Currency>,
    quantity: u32,
) -> Result<Money<'a, Currency>, AmountError> {
    let minor = money
        .to_minor_units()
        .checked_mul(i64::from(quantity))
        .ok_or(AmountError::Overflow)?;

    Ok(Money::from_minor(minor, money.currency()))
}

/// Divide an amount by a quantity, rounding half away from zero to the nearest minor unit.
///
/// # Errors
///
/// Returns [`AmountError::ZeroQuantity`] when `quantity` is zero.
pub fn divide_rounded<'a>(
    money: &Money<'a, Currency>,
    quantity: u32,
) -> Result<Money<'a, Currency>, AmountError> {
    if quantity == 0 {
        return Err(AmountError::ZeroQuantity);
    }

    let minor = Decimal::from(money.to_minor_units()) / Decimal::from(quantity);

    let rounded = minor
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or(AmountError::Overflow)?;

    Ok(Money::from_minor(rounded, money.currency()))
}

/// Sum amounts into `currency`, failing on the first mismatched currency.
///
/// # Errors
///
/// Returns [`AmountError::Money`] on a currency mismatch.
pub fn sum<'a, 'm>(
    amounts: impl IntoIterator<Item = &'m Money<'a, Currency>>,
    currency: &'a Currency,
) -> Result<Money<'a, Currency>, AmountError>
where
    'a: 'm,
{
    amounts
        .into_iter()
        .try_fold(zero(currency), |acc, amount| Ok(acc.add(*amount)?))
}

/// Fail with a currency mismatch unless `money` is denominated in `currency`.
///
/// # Errors
///
/// Returns [`AmountError::Money`] when the currencies differ.
pub fn ensure_currency(money: &Money<'_, Currency>, currency: &Currency) -> Result<(), AmountError> {
    if money.currency() == currency {
        Ok(())
    } else {
        Err(AmountError::Money(MoneyError::CurrencyMismatch {
            expected: currency.iso_alpha_code,
            actual: money.currency().iso_alpha_code,
        }))
    }
}

/// Compare two amounts, checking the currencies first.
///
/// # Errors
///
/// Returns [`AmountError::Money`] when the currencies differ.
pub fn exceeds(
    money: &Money<'_, Currency>,
    limit: &Money<'_, Currency>,
) -> Result<bool, AmountError> {
    ensure_currency(money, limit.currency())?;

    Ok(money.to_minor_units() > limit.to_minor_units())
}

/// Parse a decimal major-unit amount (`"10.99"`) into money in `currency`.
///
/// Returns `None` if the amount has more fractional digits than the currency
/// allows or does not fit in minor units.
pub fn from_major(amount: Decimal, currency: &Currency) -> Option<Money<'_, Currency>> {
    let scale = Decimal::from_u64(10_u64.checked_pow(currency.exponent)?)?;
    let minor = amount.checked_mul(scale)?;

    if minor.fract() != Decimal::ZERO {
        return None;
    }

    Some(Money::from_minor(minor.to_i64()?, currency))
}
