//! Prices
//!
//! Resolved catalog pricing for a SKU: one-off price tiers plus any recurring
//! (subscription) schedules.

use rusty_money::{Money, iso::Currency};
use smallvec::SmallVec;
use thiserror::Error;

use crate::{money, quantity::Quantity};

/// Errors raised while assembling a price.
#[derive(Debug, Error, PartialEq)]
pub enum PriceError {
    /// A tier amount is in a different currency to the price.
    #[error("price tier at quantity {0} has currency {1}, but price has currency {2}")]
    CurrencyMismatch(u32, &'static str, &'static str),

    /// A negative amount was supplied for a tier.
    #[error("price tier at quantity {0} has a negative amount")]
    NegativeAmount(u32),

    /// Two tiers share the same minimum quantity.
    #[error("duplicate price tier at quantity {0}")]
    DuplicateTier(u32),
}

/// Prices that apply from a minimum purchase quantity upward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceTier<'a> {
    min_quantity: u32,
    list: Option<Money<'a, Currency>>,
    sale: Option<Money<'a, Currency>>,
    computed: Option<Money<'a, Currency>>,
}

impl<'a> PriceTier<'a> {
    /// A tier with only a list price.
    pub fn list(min_quantity: u32, list: Money<'a, Currency>) -> Self {
        Self {
            min_quantity,
            list: Some(list),
            sale: None,
            computed: None,
        }
    }

    /// A tier with no one-off list price (recurring-only SKUs).
    pub fn unpriced(min_quantity: u32) -> Self {
        Self {
            min_quantity,
            list: None,
            sale: None,
            computed: None,
        }
    }

    /// Set the sale price.
    #[must_use]
    pub fn with_sale(mut self, sale: Money<'a, Currency>) -> Self {
        self.sale = Some(sale);
        self
    }

    /// Set the catalog-promoted (computed) price.
    #[must_use]
    pub fn with_computed(mut self, computed: Money<'a, Currency>) -> Self {
        self.computed = Some(computed);
        self
    }

    /// Minimum quantity this tier applies from.
    pub fn min_quantity(&self) -> u32 {
        self.min_quantity
    }

    /// List price for the tier.
    pub fn list_price(&self) -> Option<Money<'a, Currency>> {
        self.list
    }

    /// Sale price for the tier.
    pub fn sale_price(&self) -> Option<Money<'a, Currency>> {
        self.sale
    }

    /// Catalog-promoted price for the tier.
    pub fn computed_price(&self) -> Option<Money<'a, Currency>> {
        self.computed
    }

    /// Lowest of the list, sale and computed prices.
    pub fn lowest_price(&self) -> Option<Money<'a, Currency>> {
        [self.list, self.sale, self.computed]
            .into_iter()
            .flatten()
            .min_by_key(Money::to_minor_units)
    }

    fn amounts(&self) -> impl Iterator<Item = Money<'a, Currency>> {
        [self.list, self.sale, self.computed].into_iter().flatten()
    }
}

fn validate_tiers(tiers: &[PriceTier<'_>], currency: &Currency) -> Result<(), PriceError> {
    for (i, tier) in tiers.iter().enumerate() {
        if tiers
            .iter()
            .skip(i + 1)
            .any(|other| other.min_quantity == tier.min_quantity)
        {
            return Err(PriceError::DuplicateTier(tier.min_quantity));
        }

        for amount in tier.amounts() {
            if money::ensure_currency(&amount, currency).is_err() {
                return Err(PriceError::CurrencyMismatch(
                    tier.min_quantity,
                    amount.currency().iso_alpha_code,
                    currency.iso_alpha_code,
                ));
            }

            if amount.to_minor_units() < 0 {
                return Err(PriceError::NegativeAmount(tier.min_quantity));
            }
        }
    }

    Ok(())
}

fn tier_for<'t, 'a>(tiers: &'t [PriceTier<'a>], quantity: u32) -> Option<&'t PriceTier<'a>> {
    tiers
        .iter()
        .filter(|tier| tier.min_quantity <= quantity)
        .max_by_key(|tier| tier.min_quantity)
}

/// A named recurring charge, e.g. "Monthly support".
#[derive(Debug, Clone, PartialEq)]
pub struct RecurringSchedule<'a> {
    name: String,
    frequency: Quantity,
    tiers: SmallVec<[PriceTier<'a>; 2]>,
}

impl<'a> RecurringSchedule<'a> {
    /// Create a recurring schedule.
    pub fn new(
        name: impl Into<String>,
        frequency: Quantity,
        tiers: impl IntoIterator<Item = PriceTier<'a>>,
    ) -> Self {
        Self {
            name: name.into(),
            frequency,
            tiers: tiers.into_iter().collect(),
        }
    }

    /// Schedule display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Billing frequency.
    pub fn frequency(&self) -> Quantity {
        self.frequency
    }

    /// Lowest unit price of the tier applicable to `quantity`.
    pub fn lowest_unit_price(&self, quantity: u32) -> Option<Money<'a, Currency>> {
        tier_for(&self.tiers, quantity).and_then(PriceTier::lowest_price)
    }
}

/// Resolved pricing for a SKU.
#[derive(Debug, Clone, PartialEq)]
pub struct Price<'a> {
    currency: &'a Currency,
    tiers: SmallVec<[PriceTier<'a>; 3]>,
    recurring: SmallVec<[RecurringSchedule<'a>; 1]>,
}

impl<'a> Price<'a> {
    /// Create a price from its one-off tiers.
    ///
    /// # Errors
    ///
    /// Returns a [`PriceError`] if a tier is negative, duplicated or in another currency.
    pub fn new(
        currency: &'a Currency,
        tiers: impl IntoIterator<Item = PriceTier<'a>>,
    ) -> Result<Self, PriceError> {
        let tiers: SmallVec<[PriceTier<'a>; 3]> = tiers.into_iter().collect();

        validate_tiers(&tiers, currency)?;

        Ok(Self {
            currency,
            tiers,
            recurring: SmallVec::new(),
        })
    }

    /// A single-tier list price.
    pub fn from_list(list: Money<'a, Currency>) -> Self {
        let mut tiers = SmallVec::new();
        tiers.push(PriceTier::list(1, list));

        Self {
            currency: list.currency(),
            tiers,
            recurring: SmallVec::new(),
        }
    }

    /// Add a recurring schedule.
    ///
    /// # Errors
    ///
    /// Returns a [`PriceError`] if a schedule tier is invalid.
    pub fn with_recurring(mut self, schedule: RecurringSchedule<'a>) -> Result<Self, PriceError> {
        validate_tiers(&schedule.tiers, self.currency)?;

        self.recurring.push(schedule);

        Ok(self)
    }

    /// Price currency.
    pub fn currency(&self) -> &'a Currency {
        self.currency
    }

    /// The tier applicable to a purchase of `quantity` units.
    pub fn tier(&self, quantity: u32) -> Option<&PriceTier<'a>> {
        tier_for(&self.tiers, quantity)
    }

    /// List unit price at `quantity`.
    pub fn list_price(&self, quantity: u32) -> Option<Money<'a, Currency>> {
        self.tier(quantity).and_then(PriceTier::list_price)
    }

    /// Sale unit price at `quantity`.
    pub fn sale_price(&self, quantity: u32) -> Option<Money<'a, Currency>> {
        self.tier(quantity).and_then(PriceTier::sale_price)
    }

    /// Catalog-promoted unit price at `quantity`.
    pub fn computed_price(&self, quantity: u32) -> Option<Money<'a, Currency>> {
        self.tier(quantity).and_then(PriceTier::computed_price)
    }

    /// Recurring schedules attached to this price.
    pub fn recurring_schedules(&self) -> &[RecurringSchedule<'a>] {
        &self.recurring
    }

    /// Whether any recurring schedule is attached.
    pub fn has_recurring(&self) -> bool {
        !self.recurring.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use rusty_money::iso::{GBP, USD};
    use testresult::TestResult;

    use crate::quantity::FrequencyUnit;

    use super::*;

    #[test]
    fn tier_selection_uses_highest_applicable_minimum() -> TestResult {
        let price = Price::new(
            USD,
            [
                PriceTier::list(1, Money::from_minor(1_000, USD)),
                PriceTier::list(5, Money::from_minor(900, USD)),
                PriceTier::list(10, Money::from_minor(800, USD)),
            ],
        )?;

        assert_eq!(price.list_price(1), Some(Money::from_minor(1_000, USD)));
        assert_eq!(price.list_price(7), Some(Money::from_minor(900, USD)));
        assert_eq!(price.list_price(10), Some(Money::from_minor(800, USD)));
        assert_eq!(price.list_price(0), None);

        Ok(())
    }

    #[test]
    fn lowest_price_considers_sale_and_computed() {
        let tier = PriceTier::list(1, Money::from_minor(1_000, USD))
            .with_sale(Money::from_minor(900, USD))
            .with_computed(Money::from_minor(950, USD));

        assert_eq!(tier.lowest_price(), Some(Money::from_minor(900, USD)));
    }

    #[test]
    fn new_rejects_foreign_currency_tier() {
        let result = Price::new(USD, [PriceTier::list(1, Money::from_minor(100, GBP))]);

        assert_eq!(result, Err(PriceError::CurrencyMismatch(1, "GBP", "USD")));
    }

    #[test]
    fn new_rejects_duplicate_tiers() {
        let result = Price::new(
            USD,
            [
                PriceTier::list(1, Money::from_minor(100, USD)),
                PriceTier::list(1, Money::from_minor(90, USD)),
            ],
        );

        assert_eq!(result, Err(PriceError::DuplicateTier(1)));
    }

    #[test]
    fn recurring_schedule_resolves_lowest_tier_price() -> TestResult {
        let schedule = RecurringSchedule::new(
            "Monthly plan",
            Quantity::new(1, FrequencyUnit::Month),
            [PriceTier::list(1, Money::from_minor(500, USD)).with_sale(Money::from_minor(450, USD))],
        );

        let price = Price::new(USD, [PriceTier::unpriced(1)])?.with_recurring(schedule)?;

        assert!(price.has_recurring());
        assert_eq!(price.list_price(1), None);
        assert_eq!(
            price
                .recurring_schedules()
                .first()
                .and_then(|s| s.lowest_unit_price(1)),
            Some(Money::from_minor(450, USD))
        );

        Ok(())
    }
}
