//! Recurring charges
//!
//! Subscription-style prices are summarised per billing frequency. Schedules
//! with different names that bill at the same frequency are merged into one
//! entry; the entry keeps the first schedule name seen.

use rusty_money::{Money, iso::Currency};
use thiserror::Error;
use tracing::debug;

use crate::{
    cart::ShoppingCart,
    money::{self, AmountError},
    quantity::Quantity,
};

/// Errors raised while summarising recurring charges.
#[derive(Debug, Error, PartialEq)]
pub enum RecurringPriceError {
    /// Wrapped amount arithmetic error.
    #[error(transparent)]
    Amount(#[from] AmountError),
}

/// Total recurring charge at one billing frequency.
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyAndRecurringPrice<'a> {
    frequency: Quantity,
    name: String,
    amount: Money<'a, Currency>,
}

impl<'a> FrequencyAndRecurringPrice<'a> {
    /// Billing frequency.
    pub fn frequency(&self) -> Quantity {
        self.frequency
    }

    /// Name of the first schedule seen at this frequency.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Total charged at this frequency.
    pub fn amount(&self) -> Money<'a, Currency> {
        self.amount
    }
}

/// Builds [`FrequencyAndRecurringPrice`] summaries from a cart.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrequencyAndRecurringPriceFactory;

impl FrequencyAndRecurringPriceFactory {
    /// Sum every item's recurring schedules by frequency.
    ///
    /// Entries appear in the order their frequency was first encountered while
    /// walking the cart. Each schedule contributes the lowest unit price of the
    /// tier for the item's quantity, multiplied by the quantity. Schedules with
    /// no applicable tier are skipped.
    ///
    /// # Errors
    ///
    /// Returns a [`RecurringPriceError`] on overflow or currency mismatch.
    pub fn create_frequency_map<'a>(
        &self,
        cart: &ShoppingCart<'a>,
    ) -> Result<Vec<FrequencyAndRecurringPrice<'a>>, RecurringPriceError> {
        let items = cart.items();
        let mut summary: Vec<FrequencyAndRecurringPrice<'a>> = Vec::new();

        for key in items.keys() {
            let Some(item) = items.get(key) else {
                continue;
            };

            let Some(price) = item.price() else {
                continue;
            };

            for schedule in price.recurring_schedules() {
                let Some(unit) = schedule.lowest_unit_price(item.quantity()) else {
                    debug!(
                        line_item = item.id(),
                        schedule = schedule.name(),
                        "no recurring tier for quantity"
                    );

                    continue;
                };

                let line = money::multiply(&unit, item.quantity())?;
                money::ensure_currency(&line, cart.currency())?;

                match summary
                    .iter_mut()
                    .find(|entry| entry.frequency == schedule.frequency())
                {
                    Some(entry) => entry.amount = entry.amount.add(line).map_err(AmountError::from)?,
                    None => summary.push(FrequencyAndRecurringPrice {
                        frequency: schedule.frequency(),
                        name: schedule.name().to_string(),
                        amount: line,
                    }),
                }
            }
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use rusty_money::iso::USD;
    use testresult::TestResult;

    use crate::{
        items::{CartLineItem, ItemType},
        prices::{Price, PriceTier, RecurringSchedule},
        quantity::FrequencyUnit,
    };

    use super::*;

    const MONTHLY: Quantity = Quantity::new(1, FrequencyUnit::Month);
    const YEARLY: Quantity = Quantity::new(1, FrequencyUnit::Year);

    fn usd(minor: i64) -> Money<'static, Currency> {
        Money::from_minor(minor, USD)
    }

    fn subscription(
        id: &str,
        quantity: u32,
        schedules: impl IntoIterator<Item = RecurringSchedule<'static>>,
    ) -> Result<CartLineItem<'static>, Box<dyn std::error::Error>> {
        let mut price = Price::new(USD, [PriceTier::unpriced(1)])?;

        for schedule in schedules {
            price = price.with_recurring(schedule)?;
        }

        Ok(CartLineItem::new(id, id, ItemType::Simple, quantity).with_price(price))
    }

    #[test]
    fn merges_schedules_with_same_frequency() -> TestResult {
        let mut cart = ShoppingCart::new(USD);
        cart.add_item(subscription(
            "support",
            2,
            [RecurringSchedule::new("Support", MONTHLY, [PriceTier::list(1, usd(1_000))])],
        )?)?;
        cart.add_item(subscription(
            "licence",
            1,
            [
                RecurringSchedule::new("Licence", YEARLY, [PriceTier::list(1, usd(9_900))]),
                RecurringSchedule::new("Hosting", MONTHLY, [PriceTier::list(1, usd(500))]),
            ],
        )?)?;

        let summary = FrequencyAndRecurringPriceFactory.create_frequency_map(&cart)?;

        assert_eq!(summary.len(), 2);

        let monthly = summary.first().ok_or("missing monthly entry")?;
        assert_eq!(monthly.frequency(), MONTHLY);
        assert_eq!(monthly.name(), "Support");
        assert_eq!(monthly.amount(), usd(2_500));

        let yearly = summary.get(1).ok_or("missing yearly entry")?;
        assert_eq!(yearly.frequency(), YEARLY);
        assert_eq!(yearly.amount(), usd(9_900));

        Ok(())
    }

    #[test]
    fn uses_lowest_price_of_quantity_tier() -> TestResult {
        let mut cart = ShoppingCart::new(USD);
        cart.add_item(subscription(
            "seats",
            10,
            [RecurringSchedule::new(
                "Seats",
                MONTHLY,
                [
                    PriceTier::list(1, usd(1_000)),
                    PriceTier::list(10, usd(800)).with_sale(usd(700)),
                ],
            )],
        )?)?;

        let summary = FrequencyAndRecurringPriceFactory.create_frequency_map(&cart)?;

        assert_eq!(summary.first().map(FrequencyAndRecurringPrice::amount), Some(usd(7_000)));

        Ok(())
    }

    #[test]
    fn skips_schedules_without_a_tier() -> TestResult {
        let mut cart = ShoppingCart::new(USD);
        cart.add_item(subscription(
            "bulk",
            1,
            [RecurringSchedule::new("Bulk", MONTHLY, [PriceTier::list(5, usd(100))])],
        )?)?;

        assert!(FrequencyAndRecurringPriceFactory.create_frequency_map(&cart)?.is_empty());

        Ok(())
    }
}
