//! Cart

use rustc_hash::FxHashSet;
use rusty_money::{Money, iso::Currency};
use thiserror::Error;
use tracing::debug;

use crate::{
    items::{CartLineItem, LineItemError, LineItemKey, LineItems},
    money::{self, AmountError},
};

/// Errors raised by cart mutations.
#[derive(Debug, Error, PartialEq)]
pub enum CartError {
    /// Wrapped line item arena error.
    #[error(transparent)]
    Item(#[from] LineItemError),

    /// An amount or price is in a different currency to the cart.
    #[error(transparent)]
    Amount(#[from] AmountError),

    /// Overrides cannot be negative.
    #[error("override amounts cannot be negative")]
    NegativeOverride,
}

/// A shopping cart: the line items plus the customer's choices that affect pricing.
#[derive(Debug, Clone)]
pub struct ShoppingCart<'a> {
    currency: &'a Currency,
    items: LineItems<'a>,
    selected_shipping_option: Option<String>,
    subtotal_discount_override: Option<Money<'a, Currency>>,
    shipping_cost_override: Option<Money<'a, Currency>>,
    removed_skus: FxHashSet<String>,
}

impl<'a> ShoppingCart<'a> {
    /// Create an empty cart in `currency`.
    pub fn new(currency: &'a Currency) -> Self {
        Self {
            currency,
            items: LineItems::new(),
            selected_shipping_option: None,
            subtotal_discount_override: None,
            shipping_cost_override: None,
            removed_skus: FxHashSet::default(),
        }
    }

    /// Cart currency.
    pub fn currency(&self) -> &'a Currency {
        self.currency
    }

    /// Line items.
    pub fn items(&self) -> &LineItems<'a> {
        &self.items
    }

    fn check_item(&self, item: &CartLineItem<'a>) -> Result<(), CartError> {
        if let Some(price) = item.price() {
            money::ensure_currency(&money::zero(price.currency()), self.currency)?;
        }

        Ok(())
    }

    /// Add a top-level item.
    ///
    /// # Errors
    ///
    /// Returns a [`CartError`] if the item is priced in another currency or is
    /// rejected by the arena.
    pub fn add_item(&mut self, item: CartLineItem<'a>) -> Result<LineItemKey, CartError> {
        self.check_item(&item)?;
        self.removed_skus.remove(item.sku_code());

        Ok(self.items.insert(item)?)
    }

    /// Add a bundle constituent or dependent item beneath `parent`.
    ///
    /// # Errors
    ///
    /// Returns a [`CartError`] if the item is priced in another currency or is
    /// rejected by the arena.
    pub fn add_child_item(
        &mut self,
        parent: LineItemKey,
        item: CartLineItem<'a>,
    ) -> Result<LineItemKey, CartError> {
        self.check_item(&item)?;
        self.removed_skus.remove(item.sku_code());

        Ok(self.items.insert_child(parent, item)?)
    }

    /// Move an existing top-level item beneath `parent`.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Item`] if the link is invalid or would create a cycle.
    pub fn attach_item(&mut self, parent: LineItemKey, child: LineItemKey) -> Result<(), CartError> {
        Ok(self.items.attach(parent, child)?)
    }

    /// Remove an item together with its constituents and dependents.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Item`] if the item is not in the cart.
    pub fn remove_item(&mut self, key: LineItemKey) -> Result<Vec<CartLineItem<'a>>, CartError> {
        let removed = self.items.remove(key)?;

        for item in &removed {
            debug!(line_item = item.id(), sku = item.sku_code(), "removed cart item");

            self.removed_skus.insert(item.sku_code().to_string());
        }

        Ok(removed)
    }

    /// Whether an item with this SKU was removed from the cart.
    pub fn is_cart_item_removed(&self, sku_code: &str) -> bool {
        self.removed_skus.contains(sku_code)
    }

    /// Change the quantity of an item.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Item`] if the item is missing or the quantity is zero.
    pub fn set_quantity(&mut self, key: LineItemKey, quantity: u32) -> Result<(), CartError> {
        let item = self.items.get_mut(key).ok_or(LineItemError::NotFound(key))?;

        if quantity == 0 {
            return Err(LineItemError::ZeroQuantity(item.id().to_string()).into());
        }

        item.set_quantity(quantity);

        Ok(())
    }

    /// Choose a shipping option.
    pub fn select_shipping_option(&mut self, code: impl Into<String>) {
        self.selected_shipping_option = Some(code.into());
    }

    /// Clear the shipping option choice.
    pub fn clear_shipping_option(&mut self) {
        self.selected_shipping_option = None;
    }

    /// Selected shipping option code.
    pub fn selected_shipping_option(&self) -> Option<&str> {
        self.selected_shipping_option.as_deref()
    }

    fn check_override(&self, amount: Option<&Money<'a, Currency>>) -> Result<(), CartError> {
        if let Some(amount) = amount {
            money::ensure_currency(amount, self.currency)?;

            if amount.to_minor_units() < 0 {
                return Err(CartError::NegativeOverride);
            }
        }

        Ok(())
    }

    /// Set (or with `None`, unset) an explicit subtotal discount.
    ///
    /// # Errors
    ///
    /// Returns a [`CartError`] for negative or foreign-currency amounts.
    pub fn set_subtotal_discount_override(
        &mut self,
        amount: Option<Money<'a, Currency>>,
    ) -> Result<(), CartError> {
        self.check_override(amount.as_ref())?;
        self.subtotal_discount_override = amount;

        Ok(())
    }

    /// Explicit subtotal discount, if one was set.
    pub fn subtotal_discount_override(&self) -> Option<Money<'a, Currency>> {
        self.subtotal_discount_override
    }

    /// Set (or with `None`, unset) an explicit shipping cost.
    ///
    /// # Errors
    ///
    /// Returns a [`CartError`] for negative or foreign-currency amounts.
    pub fn set_shipping_cost_override(
        &mut self,
        amount: Option<Money<'a, Currency>>,
    ) -> Result<(), CartError> {
        self.check_override(amount.as_ref())?;
        self.shipping_cost_override = amount;

        Ok(())
    }

    /// Explicit shipping cost, if one was set.
    pub fn shipping_cost_override(&self) -> Option<Money<'a, Currency>> {
        self.shipping_cost_override
    }

    /// Whether any priced leaf needs physical shipping.
    pub fn requires_shipping(&self) -> bool {
        self.items
            .roots()
            .iter()
            .flat_map(|root| self.items.leaves(*root))
            .any(|key| self.items.get(key).is_some_and(CartLineItem::is_shippable))
    }
}

#[cfg(test)]
mod tests {
    use rusty_money::iso::{EUR, USD};
    use testresult::TestResult;

    use crate::{items::ItemType, prices::Price};

    use super::*;

    fn priced(id: &str, minor: i64) -> CartLineItem<'static> {
        CartLineItem::new(id, format!("SKU-{id}"), ItemType::Simple, 1)
            .with_price(Price::from_list(Money::from_minor(minor, USD)))
    }

    #[test]
    fn add_item_rejects_foreign_prices() {
        let mut cart = ShoppingCart::new(EUR);

        assert!(matches!(
            cart.add_item(priced("a", 100)),
            Err(CartError::Amount(AmountError::Money(_)))
        ));
    }

    #[test]
    fn remove_item_records_removed_skus() -> TestResult {
        let mut cart = ShoppingCart::new(USD);
        let parent = cart.add_item(priced("phone", 50_000))?;
        cart.add_child_item(parent, priced("case", 2_000))?;

        cart.remove_item(parent)?;

        assert!(cart.is_cart_item_removed("SKU-phone"));
        assert!(cart.is_cart_item_removed("SKU-case"));
        assert!(cart.items().is_empty());

        cart.add_item(priced("phone", 50_000))?;

        assert!(!cart.is_cart_item_removed("SKU-phone"));

        Ok(())
    }

    #[test]
    fn overrides_distinguish_unset_from_zero() -> TestResult {
        let mut cart = ShoppingCart::new(USD);

        assert_eq!(cart.subtotal_discount_override(), None);

        cart.set_subtotal_discount_override(Some(money::zero(USD)))?;

        assert_eq!(cart.subtotal_discount_override(), Some(money::zero(USD)));
        assert_eq!(
            cart.set_shipping_cost_override(Some(Money::from_minor(-1, USD))),
            Err(CartError::NegativeOverride)
        );

        Ok(())
    }

    #[test]
    fn requires_shipping_checks_leaves() -> TestResult {
        let mut cart = ShoppingCart::new(USD);
        cart.add_item(priced("ebook", 500).with_shippable(false))?;

        assert!(!cart.requires_shipping());

        cart.add_item(priced("book", 1_500))?;

        assert!(cart.requires_shipping());

        Ok(())
    }

    #[test]
    fn set_quantity_rejects_zero() -> TestResult {
        let mut cart = ShoppingCart::new(USD);
        let key = cart.add_item(priced("a", 100))?;

        cart.set_quantity(key, 4)?;

        assert_eq!(cart.items().get(key).map(CartLineItem::quantity), Some(4));
        assert_eq!(
            cart.set_quantity(key, 0),
            Err(CartError::Item(LineItemError::ZeroQuantity("a".to_string())))
        );

        Ok(())
    }
}
