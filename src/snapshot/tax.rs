//! Tax snapshots
//!
//! Tax rates are resolved by an external tax service. This module only shapes
//! its result around a finished [`ShoppingCartPricingSnapshot`].

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use rusty_money::{Money, iso::Currency};
use serde::Deserialize;
use slotmap::SecondaryMap;
use thiserror::Error;

use crate::{
    calculator::{TaxMode, TaxPriceCalculator},
    items::LineItemKey,
    money::{self, AmountError},
    snapshot::{SnapshotError, cart::ShoppingCartPricingSnapshot},
};

/// Errors raised while building a tax snapshot.
#[derive(Debug, Error, PartialEq)]
pub enum TaxError {
    /// The tax result was calculated for the other tax mode.
    #[error("tax result is {result:?} but the store prices are {store:?}")]
    TaxModeMismatch {
        /// Mode of the pricing snapshot
        store: TaxMode,

        /// Mode of the tax result
        result: TaxMode,
    },

    /// No tax was calculated for a line item.
    #[error("no tax was calculated for line item {0:?}")]
    ItemTaxNotFound(LineItemKey),

    /// Wrapped snapshot error.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    /// Wrapped amount arithmetic error.
    #[error(transparent)]
    Amount(#[from] AmountError),
}

/// A tax category with per-locale display names.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TaxCategory {
    code: String,

    #[serde(default)]
    display_names: BTreeMap<String, String>,
}

impl TaxCategory {
    /// Create a category with no display names.
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            display_names: BTreeMap::new(),
        }
    }

    /// Add a display name for `locale`.
    #[must_use]
    pub fn with_display_name(mut self, locale: impl Into<String>, name: impl Into<String>) -> Self {
        self.display_names.insert(locale.into(), name.into());
        self
    }

    /// Category code.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Display name for `locale`.
    ///
    /// Falls back from `de-DE` to `de`, then to the category code.
    pub fn display_name(&self, locale: &str) -> &str {
        let language = locale.split(['-', '_']).next().unwrap_or(locale);

        self.display_names
            .get(locale)
            .or_else(|| self.display_names.get(language))
            .map_or(&self.code, |name| name)
    }
}

/// Taxes calculated by the tax service for one cart.
#[derive(Debug, Clone, PartialEq)]
pub struct TaxCalculationResult<'a> {
    currency: &'a Currency,
    mode: TaxMode,
    category_taxes: BTreeMap<String, (TaxCategory, Money<'a, Currency>)>,
    item_taxes: FxHashMap<String, Money<'a, Currency>>,
    shipping_tax: Money<'a, Currency>,
}

impl<'a> TaxCalculationResult<'a> {
    /// Empty result in `currency` for stores priced in `mode`.
    pub fn new(currency: &'a Currency, mode: TaxMode) -> Self {
        Self {
            currency,
            mode,
            category_taxes: BTreeMap::new(),
            item_taxes: FxHashMap::default(),
            shipping_tax: money::zero(currency),
        }
    }

    /// Add tax for a category. Repeated categories accumulate.
    ///
    /// # Errors
    ///
    /// Returns an [`AmountError`] on a currency mismatch.
    pub fn add_category_tax(
        &mut self,
        category: TaxCategory,
        amount: Money<'a, Currency>,
    ) -> Result<(), AmountError> {
        money::ensure_currency(&amount, self.currency)?;

        match self.category_taxes.get_mut(category.code()) {
            Some((_, total)) => *total = total.add(amount)?,
            None => {
                self.category_taxes
                    .insert(category.code().to_string(), (category, amount));
            }
        }

        Ok(())
    }

    /// Add tax for a line item. Repeated items accumulate.
    ///
    /// # Errors
    ///
    /// Returns an [`AmountError`] on a currency mismatch.
    pub fn add_item_tax(
        &mut self,
        line_item_id: impl Into<String>,
        amount: Money<'a, Currency>,
    ) -> Result<(), AmountError> {
        money::ensure_currency(&amount, self.currency)?;

        let entry = self
            .item_taxes
            .entry(line_item_id.into())
            .or_insert_with(|| money::zero(self.currency));

        *entry = entry.add(amount)?;

        Ok(())
    }

    /// Set the tax on the shipping cost.
    ///
    /// # Errors
    ///
    /// Returns an [`AmountError`] on a currency mismatch.
    pub fn set_shipping_tax(&mut self, amount: Money<'a, Currency>) -> Result<(), AmountError> {
        money::ensure_currency(&amount, self.currency)?;

        self.shipping_tax = amount;

        Ok(())
    }

    /// Currency of the result.
    pub fn currency(&self) -> &'a Currency {
        self.currency
    }

    /// Tax mode the result was calculated for.
    pub fn mode(&self) -> TaxMode {
        self.mode
    }

    /// Tax per category, keyed by category code.
    pub fn category_taxes(
        &self,
    ) -> impl Iterator<Item = (&TaxCategory, Money<'a, Currency>)> + '_ {
        self.category_taxes
            .values()
            .map(|(category, amount)| (category, *amount))
    }

    /// Tax calculated for a line item.
    pub fn item_tax(&self, line_item_id: &str) -> Option<Money<'a, Currency>> {
        self.item_taxes.get(line_item_id).copied()
    }

    /// Tax on the shipping cost.
    pub fn shipping_tax(&self) -> Money<'a, Currency> {
        self.shipping_tax
    }

    /// Sum of every category's tax.
    ///
    /// # Errors
    ///
    /// Returns an [`AmountError`] on overflow.
    pub fn total_tax(&self) -> Result<Money<'a, Currency>, AmountError> {
        money::sum(self.category_taxes.values().map(|(_, amount)| amount), self.currency)
    }
}

/// Tax view of one line item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShoppingItemTaxSnapshot<'a> {
    line_item: LineItemKey,
    tax: Money<'a, Currency>,
    calculator: TaxPriceCalculator<'a>,
}

impl<'a> ShoppingItemTaxSnapshot<'a> {
    /// Arena key of the item.
    pub fn line_item(&self) -> LineItemKey {
        self.line_item
    }

    /// Tax on the line.
    pub fn tax(&self) -> Money<'a, Currency> {
        self.tax
    }

    /// Calculator bound to this item's pricing and tax.
    pub fn tax_price_calc(&self) -> TaxPriceCalculator<'a> {
        self.calculator
    }
}

/// Pricing snapshot with tax layered on top.
#[derive(Debug, Clone)]
pub struct ShoppingCartTaxSnapshot<'a> {
    pricing: ShoppingCartPricingSnapshot<'a>,
    result: TaxCalculationResult<'a>,
    tax_map: BTreeMap<String, Money<'a, Currency>>,
    localized_tax_map: BTreeMap<String, Money<'a, Currency>>,
    items: SecondaryMap<LineItemKey, ShoppingItemTaxSnapshot<'a>>,
    total_tax: Money<'a, Currency>,
    total: Money<'a, Currency>,
    before_tax_total: Money<'a, Currency>,
}

impl<'a> ShoppingCartTaxSnapshot<'a> {
    /// Combine a pricing snapshot with the tax service's result.
    ///
    /// Category names in the localized tax map are resolved for `locale`.
    ///
    /// # Errors
    ///
    /// Returns a [`TaxError`] if the result was calculated for another tax
    /// mode or currency.
    pub fn new(
        pricing: ShoppingCartPricingSnapshot<'a>,
        result: TaxCalculationResult<'a>,
        locale: &str,
    ) -> Result<Self, TaxError> {
        if pricing.tax_mode() != result.mode() {
            return Err(TaxError::TaxModeMismatch {
                store: pricing.tax_mode(),
                result: result.mode(),
            });
        }

        money::ensure_currency(&money::zero(result.currency()), pricing.currency())?;

        let mut tax_map = BTreeMap::new();
        let mut localized_tax_map: BTreeMap<String, Money<'a, Currency>> = BTreeMap::new();

        for (category, amount) in result.category_taxes() {
            tax_map.insert(category.code().to_string(), amount);

            let name = category.display_name(locale).to_string();
            let entry = localized_tax_map
                .entry(name)
                .or_insert_with(|| money::zero(pricing.currency()));

            *entry = entry.add(amount).map_err(AmountError::from)?;
        }

        let mut items = SecondaryMap::new();

        for snapshot in pricing.shopping_item_pricing_snapshots() {
            if let Some(tax) = result.item_tax(snapshot.line_item_id()) {
                items.insert(
                    snapshot.line_item(),
                    ShoppingItemTaxSnapshot {
                        line_item: snapshot.line_item(),
                        tax,
                        calculator: TaxPriceCalculator::new(snapshot.price_calc(), tax, result.mode()),
                    },
                );
            }
        }

        let total_tax = result.total_tax()?;
        let priced_total = pricing.before_tax_total();

        let (total, before_tax_total) = match result.mode() {
            TaxMode::Exclusive => (priced_total.add(total_tax).map_err(AmountError::from)?, priced_total),
            TaxMode::Inclusive => (priced_total, priced_total.sub(total_tax).map_err(AmountError::from)?),
        };

        Ok(Self {
            pricing,
            result,
            tax_map,
            localized_tax_map,
            items,
            total_tax,
            total,
            before_tax_total,
        })
    }

    /// Pricing snapshot the taxes apply to.
    pub fn pricing(&self) -> &ShoppingCartPricingSnapshot<'a> {
        &self.pricing
    }

    /// Tax service result.
    pub fn tax_calculation_result(&self) -> &TaxCalculationResult<'a> {
        &self.result
    }

    /// Tax per category code.
    pub fn tax_map(&self) -> &BTreeMap<String, Money<'a, Currency>> {
        &self.tax_map
    }

    /// Tax per localized category name, ordered by name.
    pub fn localized_tax_map(&self) -> &BTreeMap<String, Money<'a, Currency>> {
        &self.localized_tax_map
    }

    /// Tax view of a line item.
    ///
    /// # Errors
    ///
    /// Returns [`TaxError::ItemTaxNotFound`] if no tax was calculated for the item.
    pub fn shopping_item_tax_snapshot(
        &self,
        line_item: LineItemKey,
    ) -> Result<&ShoppingItemTaxSnapshot<'a>, TaxError> {
        self.items
            .get(line_item)
            .ok_or(TaxError::ItemTaxNotFound(line_item))
    }

    /// Sum of every category's tax.
    pub fn total_tax(&self) -> Money<'a, Currency> {
        self.total_tax
    }

    /// What the customer owes.
    pub fn total(&self) -> Money<'a, Currency> {
        self.total
    }

    /// Total with tax removed.
    pub fn before_tax_total(&self) -> Money<'a, Currency> {
        self.before_tax_total
    }

    /// Shipping cost with its tax removed.
    ///
    /// # Errors
    ///
    /// Returns an [`AmountError`] on a currency mismatch.
    pub fn before_tax_shipping_cost(&self) -> Result<Money<'a, Currency>, AmountError> {
        let cost = self.pricing.shipping_cost();

        match self.result.mode() {
            TaxMode::Exclusive => Ok(cost),
            TaxMode::Inclusive => Ok(cost.sub(self.result.shipping_tax())?),
        }
    }
}

#[cfg(test)]
mod tests {
    use rusty_money::iso::{GBP, USD};
    use testresult::TestResult;

    use crate::{
        cart::ShoppingCart,
        items::{CartLineItem, ItemType},
        prices::Price,
        snapshot::PricingPass,
        store::StoreConfig,
    };

    use super::*;

    fn usd(minor: i64) -> Money<'static, Currency> {
        Money::from_minor(minor, USD)
    }

    fn priced(
        tax_inclusive: bool,
    ) -> Result<(ShoppingCartPricingSnapshot<'static>, LineItemKey, LineItemKey), Box<dyn std::error::Error>> {
        let mut cart = ShoppingCart::new(USD);
        let book = cart.add_item(
            CartLineItem::new("book", "BOOK", ItemType::Simple, 2)
                .with_price(Price::from_list(usd(1_000))),
        )?;
        let pen = cart.add_item(
            CartLineItem::new("pen", "PEN", ItemType::Simple, 1).with_price(Price::from_list(usd(500))),
        )?;

        let store = StoreConfig::new("US", USD, tax_inclusive, "en-US");
        let snapshot = PricingPass::new(&cart).finish(&store)?;

        Ok((snapshot, book, pen))
    }

    fn sales_tax() -> TaxCategory {
        TaxCategory::new("SALES")
            .with_display_name("en", "Sales Tax")
            .with_display_name("fr-CA", "Taxe de vente")
    }

    #[test]
    fn display_name_falls_back_to_language_then_code() {
        let category = sales_tax();

        assert_eq!(category.display_name("en-US"), "Sales Tax");
        assert_eq!(category.display_name("fr-CA"), "Taxe de vente");
        assert_eq!(category.display_name("de"), "SALES");
    }

    #[test]
    fn exclusive_tax_is_added_to_total() -> TestResult {
        let (pricing, book, _) = priced(false)?;
        let mut result = TaxCalculationResult::new(USD, TaxMode::Exclusive);
        result.add_category_tax(sales_tax(), usd(200))?;
        result.add_category_tax(TaxCategory::new("COUNTY"), usd(50))?;
        result.add_item_tax("book", usd(160))?;

        let snapshot = ShoppingCartTaxSnapshot::new(pricing, result, "en-US")?;

        assert_eq!(snapshot.before_tax_total(), usd(2_500));
        assert_eq!(snapshot.total(), usd(2_750));
        assert_eq!(snapshot.tax_map().get("SALES"), Some(&usd(200)));
        assert_eq!(
            snapshot.localized_tax_map().keys().collect::<Vec<_>>(),
            ["COUNTY", "Sales Tax"]
        );

        let item = snapshot.shopping_item_tax_snapshot(book)?;

        assert_eq!(item.tax_price_calc().money()?, usd(2_160));
        assert_eq!(item.tax_price_calc().for_unit_price().money()?, usd(1_080));

        Ok(())
    }

    #[test]
    fn inclusive_tax_is_already_in_the_total() -> TestResult {
        let (pricing, book, _) = priced(true)?;
        let mut result = TaxCalculationResult::new(USD, TaxMode::Inclusive);
        result.add_category_tax(sales_tax(), usd(250))?;
        result.add_item_tax("book", usd(200))?;

        let snapshot = ShoppingCartTaxSnapshot::new(pricing, result, "en")?;

        assert_eq!(snapshot.total(), usd(2_500));
        assert_eq!(snapshot.before_tax_total(), usd(2_250));
        assert_eq!(
            snapshot.shopping_item_tax_snapshot(book)?.tax_price_calc().money()?,
            usd(1_800)
        );

        Ok(())
    }

    #[test]
    fn repeated_categories_accumulate() -> TestResult {
        let mut result = TaxCalculationResult::new(USD, TaxMode::Exclusive);
        result.add_category_tax(sales_tax(), usd(100))?;
        result.add_category_tax(sales_tax(), usd(25))?;

        assert_eq!(result.total_tax()?, usd(125));
        assert!(result.add_category_tax(sales_tax(), Money::from_minor(1, GBP)).is_err());

        Ok(())
    }

    #[test]
    fn missing_item_tax_is_an_error() -> TestResult {
        let (pricing, _, pen) = priced(false)?;
        let snapshot =
            ShoppingCartTaxSnapshot::new(pricing, TaxCalculationResult::new(USD, TaxMode::Exclusive), "en")?;

        assert_eq!(
            snapshot.shopping_item_tax_snapshot(pen).err(),
            Some(TaxError::ItemTaxNotFound(pen))
        );

        Ok(())
    }

    #[test]
    fn mode_must_match_store() -> TestResult {
        let (pricing, _, _) = priced(false)?;

        assert_eq!(
            ShoppingCartTaxSnapshot::new(pricing, TaxCalculationResult::new(USD, TaxMode::Inclusive), "en")
                .err(),
            Some(TaxError::TaxModeMismatch {
                store: TaxMode::Exclusive,
                result: TaxMode::Inclusive,
            })
        );

        Ok(())
    }
}
