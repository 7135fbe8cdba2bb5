//! Shipping pricing snapshots

use rusty_money::{Money, iso::Currency};

/// Pricing of a shipping option as of a pricing pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShippingPricingSnapshot<'a> {
    list_price: Money<'a, Currency>,
    discount: Money<'a, Currency>,
}

impl<'a> ShippingPricingSnapshot<'a> {
    /// Create a snapshot from the option's list price and best discount.
    ///
    /// A missing discount counts as zero.
    pub fn new(list_price: Money<'a, Currency>, discount: Option<Money<'a, Currency>>) -> Self {
        Self {
            list_price,
            discount: discount.unwrap_or_else(|| Money::from_minor(0, list_price.currency())),
        }
    }

    /// List price of the option.
    pub fn list_price(&self) -> Money<'a, Currency> {
        self.list_price
    }

    /// Discount on the option, zero when none applies.
    pub fn discount_amount(&self) -> Money<'a, Currency> {
        self.discount
    }

    /// Price after discount.
    pub fn promoted_price(&self) -> Money<'a, Currency> {
        let minor = self
            .list_price
            .to_minor_units()
            .saturating_sub(self.discount.to_minor_units())
            .max(0);

        Money::from_minor(minor, self.list_price.currency())
    }
}
