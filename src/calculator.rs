//! Calculators
//!
//! A [`PriceCalculator`] is a small immutable value: each builder call returns
//! a reconfigured copy, so a calculator held by a snapshot can be read from any
//! number of threads.

use rust_decimal::Decimal;
use rusty_money::{Money, iso::Currency};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::money::{self, AmountError};

/// Errors raised by price calculators.
#[derive(Debug, Error, PartialEq)]
pub enum CalculatorError {
    /// The item has no resolved price.
    #[error("no price has been set for this item")]
    NoPrice,

    /// Wrapped amount arithmetic error.
    #[error(transparent)]
    Amount(#[from] AmountError),
}

/// How a store's prices relate to tax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxMode {
    /// Prices exclude tax; tax is added on top.
    #[default]
    Exclusive,

    /// Prices already include tax.
    Inclusive,
}

impl TaxMode {
    /// Tax mode for a store's tax-inclusive flag.
    pub fn from_inclusive(inclusive: bool) -> Self {
        if inclusive {
            TaxMode::Inclusive
        } else {
            TaxMode::Exclusive
        }
    }

    /// Whether prices include tax.
    pub fn is_inclusive(self) -> bool {
        self == TaxMode::Inclusive
    }
}

/// Computes a line item amount as a unit or line total, with or without cart discounts.
///
/// Defaults to the line total with discounts excluded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceCalculator<'a> {
    unit_price: Option<Money<'a, Currency>>,
    quantity: u32,
    discount: Money<'a, Currency>,
    include_discounts: bool,
    unit_only: bool,
}

impl<'a> PriceCalculator<'a> {
    /// Create a calculator for `quantity` units at `unit_price` with an
    /// accumulated line `discount`.
    pub fn new(
        unit_price: Option<Money<'a, Currency>>,
        quantity: u32,
        discount: Money<'a, Currency>,
    ) -> Self {
        Self {
            unit_price,
            quantity,
            discount,
            include_discounts: false,
            unit_only: false,
        }
    }

    /// Include cart discounts.
    #[must_use]
    pub fn with_cart_discounts(mut self) -> Self {
        self.include_discounts = true;
        self
    }

    /// Exclude cart discounts.
    #[must_use]
    pub fn without_cart_discounts(mut self) -> Self {
        self.include_discounts = false;
        self
    }

    /// Compute a per-unit amount.
    #[must_use]
    pub fn for_unit_price(mut self) -> Self {
        self.unit_only = true;
        self
    }

    /// Compute the line total.
    #[must_use]
    pub fn for_total_price(mut self) -> Self {
        self.unit_only = false;
        self
    }

    /// Whether a unit price is available.
    pub fn has_price(&self) -> bool {
        self.unit_price.is_some()
    }

    /// Quantity priced.
    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    /// Accumulated line discount.
    pub fn discount(&self) -> Money<'a, Currency> {
        self.discount
    }

    /// Whether the unit view is selected.
    pub fn is_unit_price_only(&self) -> bool {
        self.unit_only
    }

    /// Computed amount for the selected combination.
    ///
    /// Discounted amounts never go below zero.
    ///
    /// # Errors
    ///
    /// - [`CalculatorError::NoPrice`]: the item has no price.
    /// - [`CalculatorError::Amount`]: arithmetic overflowed or currencies differ.
    pub fn money(&self) -> Result<Money<'a, Currency>, CalculatorError> {
        let unit = self.unit_price.ok_or(CalculatorError::NoPrice)?;

        money::ensure_currency(&self.discount, unit.currency())?;

        let (base, discount) = if self.unit_only {
            let discount = if self.quantity == 0 {
                money::zero(unit.currency())
            } else {
                money::divide_rounded(&self.discount, self.quantity)?
            };

            (unit, discount)
        } else {
            (money::multiply(&unit, self.quantity)?, self.discount)
        };

        if !self.include_discounts {
            return Ok(base);
        }

        let minor = base
            .to_minor_units()
            .saturating_sub(discount.to_minor_units())
            .max(0);

        Ok(Money::from_minor(minor, unit.currency()))
    }

    /// Computed amount as a decimal in major units.
    ///
    /// # Errors
    ///
    /// See [`PriceCalculator::money`].
    pub fn amount(&self) -> Result<Decimal, CalculatorError> {
        self.money().map(|money| *money.amount())
    }
}

/// A [`PriceCalculator`] that also accounts for an item's tax.
///
/// Exclusive stores add the tax, inclusive stores subtract it so the result is
/// the before-tax amount.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaxPriceCalculator<'a> {
    inner: PriceCalculator<'a>,
    tax: Money<'a, Currency>,
    mode: TaxMode,
}

impl<'a> TaxPriceCalculator<'a> {
    /// Wrap a calculator with the item's line tax.
    pub fn new(inner: PriceCalculator<'a>, tax: Money<'a, Currency>, mode: TaxMode) -> Self {
        Self { inner, tax, mode }
    }

    /// Include cart discounts.
    #[must_use]
    pub fn with_cart_discounts(mut self) -> Self {
        self.inner = self.inner.with_cart_discounts();
        self
    }

    /// Exclude cart discounts.
    #[must_use]
    pub fn without_cart_discounts(mut self) -> Self {
        self.inner = self.inner.without_cart_discounts();
        self
    }

    /// Compute a per-unit amount.
    #[must_use]
    pub fn for_unit_price(mut self) -> Self {
        self.inner = self.inner.for_unit_price();
        self
    }

    /// Compute the line total.
    #[must_use]
    pub fn for_total_price(mut self) -> Self {
        self.inner = self.inner.for_total_price();
        self
    }

    /// Tax mode chosen at construction.
    pub fn mode(&self) -> TaxMode {
        self.mode
    }

    /// Whether a unit price is available.
    pub fn has_price(&self) -> bool {
        self.inner.has_price()
    }

    /// Computed amount for the selected combination, adjusted for tax.
    ///
    /// # Errors
    ///
    /// See [`PriceCalculator::money`].
    pub fn money(&self) -> Result<Money<'a, Currency>, CalculatorError> {
        let base = self.inner.money()?;

        money::ensure_currency(&self.tax, base.currency())?;

        let tax = if self.inner.is_unit_price_only() && self.inner.quantity() > 0 {
            money::divide_rounded(&self.tax, self.inner.quantity())?
        } else {
            self.tax
        };

        let adjusted = match self.mode {
            TaxMode::Exclusive => base.add(tax),
            TaxMode::Inclusive => base.sub(tax),
        }
        .map_err(AmountError::from)?;

        Ok(adjusted)
    }

    /// Computed amount as a decimal in major units.
    ///
    /// # Errors
    ///
    /// See [`PriceCalculator::money`].
    pub fn amount(&self) -> Result<Decimal, CalculatorError> {
        self.money().map(|money| *money.amount())
    }
}
