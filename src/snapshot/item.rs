//! Item pricing snapshots

use rusty_money::{Money, iso::Currency};

use crate::{
    calculator::{CalculatorError, PriceCalculator},
    items::{CartLineItem, LineItemKey},
    money,
    prices::PriceTier,
};

/// Pricing of one line item as of a pricing pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ShoppingItemPricingSnapshot<'a> {
    line_item: LineItemKey,
    line_item_id: String,
    list_unit_price: Option<Money<'a, Currency>>,
    sale_unit_price: Option<Money<'a, Currency>>,
    promoted_unit_price: Option<Money<'a, Currency>>,
    discount: Money<'a, Currency>,
    quantity: u32,
    calculator: PriceCalculator<'a>,
}

impl<'a> ShoppingItemPricingSnapshot<'a> {
    /// Snapshot an item priced from its own catalog price.
    pub fn from_item(
        line_item: LineItemKey,
        item: &CartLineItem<'a>,
        discount: Money<'a, Currency>,
    ) -> Self {
        let quantity = item.quantity();
        let tier = item.price().and_then(|price| price.tier(quantity));

        let list_unit_price = tier.and_then(PriceTier::list_price);
        let sale_unit_price = tier.and_then(PriceTier::sale_price);
        let promoted_unit_price = tier.and_then(PriceTier::computed_price);
        let lowest = tier.and_then(PriceTier::lowest_price);

        Self {
            line_item,
            line_item_id: item.id().to_string(),
            list_unit_price,
            sale_unit_price,
            promoted_unit_price,
            discount,
            quantity,
            calculator: PriceCalculator::new(lowest, quantity, discount),
        }
    }

    /// Snapshot a bundle whose price is the sum of its constituents.
    ///
    /// The bundle is priced as a single line worth `line_value`.
    pub fn calculated_bundle(
        line_item: LineItemKey,
        item: &CartLineItem<'a>,
        line_value: Money<'a, Currency>,
        discount: Money<'a, Currency>,
    ) -> Self {
        Self {
            line_item,
            line_item_id: item.id().to_string(),
            list_unit_price: Some(line_value),
            sale_unit_price: None,
            promoted_unit_price: None,
            discount,
            quantity: 1,
            calculator: PriceCalculator::new(Some(line_value), 1, discount),
        }
    }

    /// Arena key of the item.
    pub fn line_item(&self) -> LineItemKey {
        self.line_item
    }

    /// Line item id.
    pub fn line_item_id(&self) -> &str {
        &self.line_item_id
    }

    /// List unit price.
    pub fn list_unit_price(&self) -> Option<Money<'a, Currency>> {
        self.list_unit_price
    }

    /// Sale unit price.
    pub fn sale_unit_price(&self) -> Option<Money<'a, Currency>> {
        self.sale_unit_price
    }

    /// Catalog-promoted unit price.
    pub fn promoted_unit_price(&self) -> Option<Money<'a, Currency>> {
        self.promoted_unit_price
    }

    /// Lowest of the list, sale and promoted unit prices.
    pub fn lowest_unit_price(&self) -> Option<Money<'a, Currency>> {
        [
            self.list_unit_price,
            self.sale_unit_price,
            self.promoted_unit_price,
        ]
        .into_iter()
        .flatten()
        .min_by_key(Money::to_minor_units)
    }

    /// Cart discount applied to the line.
    pub fn discount(&self) -> Money<'a, Currency> {
        self.discount
    }

    /// Whether any cart discount applies to the line.
    pub fn has_discount(&self) -> bool {
        self.discount.to_minor_units() > 0
    }

    /// Quantity priced.
    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    /// Calculator bound to this item's pricing.
    pub fn price_calc(&self) -> PriceCalculator<'a> {
        self.calculator
    }

    /// Whether the item has a one-off price.
    pub fn has_price(&self) -> bool {
        self.calculator.has_price()
    }

    /// Discounted line total; same as `price_calc().with_cart_discounts().money()`.
    ///
    /// # Errors
    ///
    /// Returns [`CalculatorError::NoPrice`] if the item has no one-off price.
    pub fn total(&self) -> Result<Money<'a, Currency>, CalculatorError> {
        self.price_calc().with_cart_discounts().money()
    }

    /// Undiscounted line total, zero when the item has no one-off price.
    pub(crate) fn line_value(&self) -> Result<Money<'a, Currency>, CalculatorError> {
        self.or_zero(self.price_calc().money())
    }

    /// Discounted line total, zero when the item has no one-off price.
    pub(crate) fn discounted_value(&self) -> Result<Money<'a, Currency>, CalculatorError> {
        self.or_zero(self.total())
    }

    fn or_zero(
        &self,
        result: Result<Money<'a, Currency>, CalculatorError>,
    ) -> Result<Money<'a, Currency>, CalculatorError> {
        match result {
            Err(CalculatorError::NoPrice) => Ok(money::zero(self.discount.currency())),
            other => other,
        }
    }
}
