//! Pricing pass
//!
//! The rule engine reports each successful rule action to a [`PricingPass`].
//! The pass borrows the cart without mutating it and owns everything the
//! rules produce. [`PricingPass::finish`] consumes it into an immutable
//! snapshot, or fails without exposing anything partially built.

use std::collections::BTreeMap;

use rusty_money::{Money, iso::Currency};
use slotmap::SecondaryMap;
use tracing::{error, info, instrument, warn};

use crate::{
    cart::ShoppingCart,
    discounts::{ActionId, DiscountError, DiscountRecord, DiscountScope, RuleId},
    items::LineItemKey,
    money,
    promotions::PromotionRecordContainer,
    snapshot::{
        SnapshotError,
        cart::{ShoppingCartPricingSnapshot, line_value, price_items},
        shipping::ShippingPricingSnapshot,
    },
    store::StoreConfig,
};

#[derive(Debug, Clone, Copy)]
struct ShippingPricing<'a> {
    list_price: Money<'a, Currency>,
    discount: Option<Money<'a, Currency>>,
}

/// Accumulates rule applications for one cart.
#[derive(Debug)]
pub struct PricingPass<'c, 'a> {
    cart: &'c ShoppingCart<'a>,
    container: PromotionRecordContainer<'a>,
    item_discounts: SecondaryMap<LineItemKey, Money<'a, Currency>>,
    subtotal_discount: Option<Money<'a, Currency>>,
    shipping: BTreeMap<String, ShippingPricing<'a>>,
}

impl<'c, 'a> PricingPass<'c, 'a> {
    /// Start a pass over `cart` with an empty record container.
    pub fn new(cart: &'c ShoppingCart<'a>) -> Self {
        Self {
            cart,
            container: PromotionRecordContainer::new(),
            item_discounts: SecondaryMap::new(),
            subtotal_discount: None,
            shipping: BTreeMap::new(),
        }
    }

    /// Cart being priced.
    pub fn cart(&self) -> &'c ShoppingCart<'a> {
        self.cart
    }

    /// Records accumulated so far.
    pub fn container(&self) -> &PromotionRecordContainer<'a> {
        &self.container
    }

    /// Discount accumulated on an item so far.
    pub fn item_discount(&self, item: LineItemKey) -> Money<'a, Currency> {
        self.item_discounts
            .get(item)
            .copied()
            .unwrap_or_else(|| money::zero(self.cart.currency()))
    }

    /// Subtotal discount currently in effect from rules.
    pub fn subtotal_discount(&self) -> Option<Money<'a, Currency>> {
        self.subtotal_discount
    }

    fn check_amount(&self, rule: RuleId, amount: &Money<'a, Currency>) -> Result<(), DiscountError> {
        money::ensure_currency(amount, self.cart.currency())?;

        if amount.to_minor_units() < 0 {
            return Err(DiscountError::Negative(rule));
        }

        Ok(())
    }

    /// Record that `rule`/`action` discounted `item` by `amount` across
    /// `quantity_applied_to` units.
    ///
    /// Repeat applications of the same action to the same item are folded into
    /// one record. The item's discount accumulates and may not exceed its
    /// undiscounted line value.
    ///
    /// # Errors
    ///
    /// Returns a [`SnapshotError`] if the item is unknown, unpriced, not
    /// discountable, or the amount is invalid. A discount that would leave the
    /// subtotal below the subtotal discount already in effect is rejected.
    pub fn rule_applied(
        &mut self,
        rule: RuleId,
        action: ActionId,
        item: LineItemKey,
        amount: Money<'a, Currency>,
        quantity_applied_to: u32,
    ) -> Result<(), SnapshotError> {
        self.apply_item_discount(rule, action, item, amount, quantity_applied_to)
            .inspect_err(|error| warn!(%rule, %action, %error, "rejected item discount"))
    }

    fn apply_item_discount(
        &mut self,
        rule: RuleId,
        action: ActionId,
        key: LineItemKey,
        amount: Money<'a, Currency>,
        quantity_applied_to: u32,
    ) -> Result<(), SnapshotError> {
        let items = self.cart.items();
        let item = items.get(key).ok_or(DiscountError::UnknownItem(key))?;

        self.check_amount(rule, &amount)?;

        if !item.is_discountable() {
            return Err(DiscountError::NotDiscountable(item.id().to_string()).into());
        }

        if items.is_bundle_constituent(key) {
            return Err(DiscountError::BundleConstituent(item.id().to_string()).into());
        }

        let value = match line_value(self.cart, key) {
            Err(SnapshotError::MissingPrice(id)) => return Err(DiscountError::NoPrice(id).into()),
            other => other?,
        };

        let accumulated = money::sum([&self.item_discount(key), &amount], self.cart.currency())?;

        if money::exceeds(&accumulated, &value)? {
            return Err(DiscountError::ExceedsPrice { rule }.into());
        }

        if let Some(subtotal_discount) = self.subtotal_discount {
            let mut discounts = self.item_discounts.clone();
            discounts.insert(key, accumulated);

            let subtotal = price_items(self.cart, &discounts)?.subtotal;

            if money::exceeds(&subtotal_discount, &subtotal)? {
                return Err(DiscountError::ExceedsPrice { rule }.into());
            }
        }

        if let Some(record) = self.container.item_record_mut(rule, action, item.id()) {
            record.increase(quantity_applied_to, amount)?;
        } else {
            self.container.add_discount_record(DiscountRecord::item(
                rule,
                action,
                key,
                item.id(),
                amount,
                quantity_applied_to,
            )?);
        }

        self.item_discounts.insert(key, accumulated);

        Ok(())
    }

    /// Offer a subtotal discount.
    ///
    /// A discount at least as large as the current one supersedes every
    /// earlier subtotal record; a smaller one is kept in the audit trail as
    /// superseded.
    ///
    /// # Errors
    ///
    /// Returns a [`SnapshotError`] if the amount is negative, in another
    /// currency, or larger than the current subtotal.
    pub fn set_subtotal_discount(
        &mut self,
        amount: Money<'a, Currency>,
        rule: RuleId,
        action: ActionId,
    ) -> Result<(), SnapshotError> {
        self.apply_subtotal_discount(amount, rule, action)
            .inspect_err(|error| warn!(%rule, %action, %error, "rejected subtotal discount"))
    }

    fn apply_subtotal_discount(
        &mut self,
        amount: Money<'a, Currency>,
        rule: RuleId,
        action: ActionId,
    ) -> Result<(), SnapshotError> {
        self.check_amount(rule, &amount)?;

        let subtotal = price_items(self.cart, &self.item_discounts)?.subtotal;

        if money::exceeds(&amount, &subtotal)? {
            return Err(DiscountError::ExceedsPrice { rule }.into());
        }

        let record = DiscountRecord::subtotal(rule, action, amount)?;

        let wins = match self.subtotal_discount {
            Some(current) => !money::exceeds(&current, &amount)?,
            None => true,
        };

        if wins {
            self.container
                .supersede_where(|scope| matches!(scope, DiscountScope::Subtotal));
            self.container.add_discount_record(record);
            self.subtotal_discount = Some(amount);
        } else {
            warn!(%rule, %action, %amount, "subtotal discount superseded by a larger discount");

            self.container.add_discount_record(record.superseded());
        }

        Ok(())
    }

    /// Set the list price of a shipping option.
    ///
    /// # Errors
    ///
    /// Returns a [`SnapshotError`] if the price is negative or in another currency.
    pub fn set_shipping_list_price(
        &mut self,
        shipping_option: impl Into<String>,
        list_price: Money<'a, Currency>,
    ) -> Result<(), SnapshotError> {
        let shipping_option = shipping_option.into();

        money::ensure_currency(&list_price, self.cart.currency())?;

        if list_price.to_minor_units() < 0 {
            return Err(DiscountError::NegativeShippingPrice(shipping_option).into());
        }

        self.shipping
            .entry(shipping_option)
            .and_modify(|pricing| pricing.list_price = list_price)
            .or_insert(ShippingPricing {
                list_price,
                discount: None,
            });

        Ok(())
    }

    /// Forget every shipping option price and discount.
    pub fn clear_shipping_list_prices(&mut self) {
        self.shipping.clear();
    }

    /// Offer a shipping discount; the largest discount for an option wins.
    ///
    /// An identical repeat of an earlier offer is ignored.
    ///
    /// # Errors
    ///
    /// Returns a [`SnapshotError`] if the option has no list price or the
    /// amount is negative or exceeds the list price.
    pub fn set_shipping_discount_if_lower(
        &mut self,
        shipping_option: &str,
        rule: RuleId,
        action: ActionId,
        amount: Money<'a, Currency>,
    ) -> Result<(), SnapshotError> {
        self.apply_shipping_discount(shipping_option, rule, action, amount)
            .inspect_err(|error| {
                warn!(shipping_option, %rule, %action, %error, "rejected shipping discount");
            })
    }

    fn apply_shipping_discount(
        &mut self,
        shipping_option: &str,
        rule: RuleId,
        action: ActionId,
        amount: Money<'a, Currency>,
    ) -> Result<(), SnapshotError> {
        self.check_amount(rule, &amount)?;

        let pricing = *self
            .shipping
            .get(shipping_option)
            .ok_or_else(|| DiscountError::ShippingOptionNotPriced(shipping_option.to_string()))?;

        if money::exceeds(&amount, &pricing.list_price)? {
            return Err(DiscountError::ExceedsPrice { rule }.into());
        }

        let repeat = self.container.all_discount_records().iter().any(|record| {
            record.rule_id() == rule
                && record.action_id() == action
                && record.shipping_option() == Some(shipping_option)
                && record.amount() == amount
        });

        if repeat {
            return Ok(());
        }

        let record = DiscountRecord::shipping(rule, action, shipping_option, amount)?;

        let wins = match pricing.discount {
            Some(current) => money::exceeds(&amount, &current)?,
            None => true,
        };

        if wins {
            self.container.supersede_where(|scope| {
                matches!(scope, DiscountScope::Shipping { shipping_option: option } if option == shipping_option)
            });
            self.container.add_discount_record(record);

            if let Some(entry) = self.shipping.get_mut(shipping_option) {
                entry.discount = Some(amount);
            }
        } else {
            warn!(shipping_option, %rule, %action, %amount, "shipping discount superseded by a larger discount");

            self.container.add_discount_record(record.superseded());
        }

        Ok(())
    }

    /// Remember a limited-usage coupon code for `rule`. Empty codes are ignored.
    pub fn apply_limited_usage_promotion_rule_code(&mut self, code: &str, rule: RuleId) {
        if code.is_empty() {
            return;
        }

        self.container.add_limited_usage_promotion_rule_code(code, rule);
    }

    /// Forget a limited-usage coupon code. Empty or absent codes are ignored.
    pub fn remove_limited_usage_promotion_rule_code(&mut self, code: &str) {
        if code.is_empty() {
            return;
        }

        self.container.remove_limited_usage_promotion_rule_code(code);
    }

    /// Assemble the cart pricing snapshot.
    ///
    /// Coupon codes whose rule produced no discount are dropped first.
    ///
    /// # Errors
    ///
    /// Returns a [`SnapshotError`] when any part of the cart cannot be priced.
    #[instrument(skip_all, fields(store = store.code(), items = self.cart.items().len()))]
    pub fn finish(
        mut self,
        store: &StoreConfig,
    ) -> Result<ShoppingCartPricingSnapshot<'a>, SnapshotError> {
        self.container.prune_unapplied_codes();

        let snapshot = self
            .build(store)
            .inspect_err(|error| error!(%error, "unable to calculate cart totals"))?;

        info!(
            subtotal = %snapshot.subtotal(),
            subtotal_discount = %snapshot.subtotal_discount(),
            shipping_cost = %snapshot.shipping_cost(),
            before_tax_total = %snapshot.before_tax_total(),
            records = snapshot.promotion_record_container().all_discount_records().len(),
            "priced cart"
        );

        Ok(snapshot)
    }

    fn build(self, store: &StoreConfig) -> Result<ShoppingCartPricingSnapshot<'a>, SnapshotError> {
        let cart = self.cart;
        let currency = cart.currency();

        money::ensure_currency(&money::zero(currency), store.currency())?;

        let pricing = price_items(cart, &self.item_discounts)?;

        let (subtotal_discount, subtotal_discount_explicit) = match cart.subtotal_discount_override() {
            Some(amount) => (amount, true),
            None => (
                self.subtotal_discount
                    .unwrap_or_else(|| money::zero(currency)),
                false,
            ),
        };

        if money::exceeds(&subtotal_discount, &pricing.subtotal)? {
            return Err(SnapshotError::SubtotalDiscountExceedsSubtotal);
        }

        let shipping: BTreeMap<String, ShippingPricingSnapshot<'a>> = self
            .shipping
            .iter()
            .map(|(code, pricing)| {
                (
                    code.clone(),
                    ShippingPricingSnapshot::new(pricing.list_price, pricing.discount),
                )
            })
            .collect();

        let selected = cart
            .selected_shipping_option()
            .filter(|_| cart.requires_shipping());

        let selected_pricing = selected
            .map(|option| {
                shipping
                    .get(option)
                    .ok_or_else(|| SnapshotError::ShippingOptionNotPriced(option.to_string()))
            })
            .transpose()?;

        let shipping_override = cart
            .shipping_cost_override()
            .filter(|_| cart.requires_shipping());

        let (shipping_cost, shipping_list_price) = match (shipping_override, selected_pricing) {
            (Some(cost), Some(pricing)) => (cost, pricing.list_price()),
            (Some(cost), None) => (cost, cost),
            (None, Some(pricing)) => (pricing.promoted_price(), pricing.list_price()),
            (None, None) => (money::zero(currency), money::zero(currency)),
        };

        let item_discount_total = money::sum(self.item_discounts.values(), currency)?;

        Ok(ShoppingCartPricingSnapshot {
            currency,
            tax_mode: store.tax_mode(),
            items: pricing.snapshots,
            order: pricing.order,
            leaves: pricing.leaves,
            subtotal: pricing.subtotal,
            subtotal_discount,
            subtotal_discount_explicit,
            item_discount_total,
            shipping_cost,
            shipping_list_price,
            shipping,
            selected_shipping_option: cart.selected_shipping_option().map(str::to_string),
            container: self.container,
        })
    }
}

#[cfg(test)]
mod tests {
    use rusty_money::iso::USD;
    use testresult::TestResult;

    use crate::{
        cart::CartError,
        discounts::RuleAction,
        items::{CartLineItem, ItemType},
        prices::Price,
        promotions::PromotionRule,
    };

    use super::*;

    fn usd(minor: i64) -> Money<'static, Currency> {
        Money::from_minor(minor, USD)
    }

    fn store() -> StoreConfig {
        StoreConfig::new("US", USD, false, "en-US")
    }

    fn cart_with(quantity: u32, unit: i64) -> Result<(ShoppingCart<'static>, LineItemKey), CartError> {
        let mut cart = ShoppingCart::new(USD);
        let key = cart.add_item(
            CartLineItem::new("line-1", "SKU-1", ItemType::Simple, quantity)
                .with_price(Price::from_list(usd(unit))),
        )?;

        Ok((cart, key))
    }

    #[test]
    fn item_discount_flows_into_snapshot() -> TestResult {
        let (cart, key) = cart_with(3, 1_000)?;
        let mut pass = PricingPass::new(&cart);

        pass.rule_applied(RuleId(1), ActionId(1), key, usd(500), 3)?;

        let snapshot = pass.finish(&store())?;
        let item = snapshot.shopping_item_pricing_snapshot(key)?;

        assert_eq!(item.price_calc().with_cart_discounts().money()?, usd(2_500));
        assert_eq!(item.price_calc().with_cart_discounts().for_unit_price().money()?, usd(833));
        assert!(!snapshot.has_subtotal_discount());
        assert_eq!(snapshot.subtotal(), usd(2_500));
        assert_eq!(snapshot.savings()?, usd(500));

        Ok(())
    }

    #[test]
    fn repeat_applications_fold_into_one_record() -> TestResult {
        let (cart, key) = cart_with(4, 1_000)?;
        let mut pass = PricingPass::new(&cart);

        pass.rule_applied(RuleId(1), ActionId(1), key, usd(100), 1)?;
        pass.rule_applied(RuleId(1), ActionId(1), key, usd(100), 1)?;

        assert_eq!(pass.container().all_discount_records().len(), 1);
        assert_eq!(pass.item_discount(key), usd(200));

        let uses = pass.container().coupon_uses_for_rule(
            &PromotionRule::new(RuleId(1), [RuleAction::with_items_per_use(ActionId(1), 1)]),
            &cart,
        );

        assert_eq!(uses, 2);

        Ok(())
    }

    #[test]
    fn item_discount_cannot_exceed_line_value() -> TestResult {
        let (cart, key) = cart_with(1, 1_000)?;
        let mut pass = PricingPass::new(&cart);

        pass.rule_applied(RuleId(1), ActionId(1), key, usd(800), 1)?;

        assert_eq!(
            pass.rule_applied(RuleId(2), ActionId(1), key, usd(300), 1),
            Err(DiscountError::ExceedsPrice { rule: RuleId(2) }.into())
        );
        assert_eq!(
            pass.rule_applied(RuleId(3), ActionId(1), key, usd(-1), 1),
            Err(DiscountError::Negative(RuleId(3)).into())
        );
        assert_eq!(pass.item_discount(key), usd(800));

        Ok(())
    }

    #[test]
    fn non_discountable_items_are_rejected() -> TestResult {
        let mut cart = ShoppingCart::new(USD);
        let key = cart.add_item(
            CartLineItem::new("gift-card", "GIFT", ItemType::Simple, 1)
                .with_price(Price::from_list(usd(5_000)))
                .with_discountable(false),
        )?;
        let mut pass = PricingPass::new(&cart);

        assert_eq!(
            pass.rule_applied(RuleId(1), ActionId(1), key, usd(100), 1),
            Err(DiscountError::NotDiscountable("gift-card".to_string()).into())
        );

        Ok(())
    }

    #[test]
    fn larger_subtotal_discount_supersedes_smaller() -> TestResult {
        let (cart, _) = cart_with(2, 1_000)?;
        let mut pass = PricingPass::new(&cart);

        pass.set_subtotal_discount(usd(300), RuleId(1), ActionId(1))?;
        pass.set_subtotal_discount(usd(200), RuleId(2), ActionId(1))?;
        pass.set_subtotal_discount(usd(500), RuleId(3), ActionId(1))?;

        let records = pass.container().all_discount_records();

        assert_eq!(records.len(), 3);
        assert!(records.iter().take(2).all(DiscountRecord::is_superseded));
        assert!(records.last().is_some_and(|record| !record.is_superseded()));
        assert_eq!(pass.subtotal_discount(), Some(usd(500)));

        let snapshot = pass.finish(&store())?;

        assert_eq!(snapshot.subtotal_discount(), usd(500));
        assert_eq!(snapshot.before_tax_total(), usd(1_500));
        assert!(snapshot.has_subtotal_discount());

        Ok(())
    }

    #[test]
    fn subtotal_discount_cannot_exceed_subtotal() -> TestResult {
        let (cart, _) = cart_with(1, 1_000)?;
        let mut pass = PricingPass::new(&cart);

        assert_eq!(
            pass.set_subtotal_discount(usd(1_001), RuleId(1), ActionId(1)),
            Err(DiscountError::ExceedsPrice { rule: RuleId(1) }.into())
        );
        assert!(pass.container().is_empty());

        Ok(())
    }

    #[test]
    fn item_discount_cannot_undercut_subtotal_discount() -> TestResult {
        let (cart, key) = cart_with(1, 1_000)?;
        let mut pass = PricingPass::new(&cart);

        pass.set_subtotal_discount(usd(900), RuleId(1), ActionId(1))?;

        assert_eq!(
            pass.rule_applied(RuleId(2), ActionId(1), key, usd(500), 1),
            Err(DiscountError::ExceedsPrice { rule: RuleId(2) }.into())
        );
        assert_eq!(pass.item_discount(key), usd(0));

        pass.rule_applied(RuleId(2), ActionId(1), key, usd(100), 1)?;

        let snapshot = pass.finish(&store())?;

        assert_eq!(snapshot.subtotal(), usd(900));
        assert_eq!(snapshot.subtotal_discount(), usd(900));
        assert_eq!(snapshot.before_tax_total(), usd(0));

        Ok(())
    }

    #[test]
    fn equal_subtotal_discount_replaces_earlier() -> TestResult {
        let (cart, _) = cart_with(2, 1_000)?;
        let mut pass = PricingPass::new(&cart);

        pass.set_subtotal_discount(usd(300), RuleId(1), ActionId(1))?;
        pass.set_subtotal_discount(usd(300), RuleId(2), ActionId(1))?;

        let records = pass.container().all_discount_records();

        assert!(records.first().is_some_and(DiscountRecord::is_superseded));
        assert!(records.last().is_some_and(|record| !record.is_superseded()));
        assert_eq!(records.last().map(DiscountRecord::rule_id), Some(RuleId(2)));

        Ok(())
    }

    #[test]
    fn best_shipping_discount_wins() -> TestResult {
        let (mut cart, _) = cart_with(1, 1_000)?;
        cart.select_shipping_option("ground");

        let mut pass = PricingPass::new(&cart);
        pass.set_shipping_list_price("ground", usd(1_000))?;
        pass.set_shipping_list_price("express", usd(2_500))?;

        pass.set_shipping_discount_if_lower("ground", RuleId(1), ActionId(1), usd(200))?;
        pass.set_shipping_discount_if_lower("ground", RuleId(1), ActionId(1), usd(200))?;
        pass.set_shipping_discount_if_lower("ground", RuleId(2), ActionId(1), usd(500))?;
        pass.set_shipping_discount_if_lower("ground", RuleId(3), ActionId(1), usd(100))?;

        let records = pass.container().all_discount_records();

        assert_eq!(records.len(), 3);
        assert_eq!(
            records.iter().filter(|record| !record.is_superseded()).count(),
            1
        );

        let snapshot = pass.finish(&store())?;

        assert_eq!(snapshot.shipping_cost(), usd(500));
        assert_eq!(snapshot.shipping_list_price(), usd(1_000));
        assert_eq!(
            snapshot.shipping_pricing_snapshot("express")?.discount_amount(),
            usd(0)
        );
        assert_eq!(snapshot.before_tax_total(), usd(1_500));
        assert_eq!(
            snapshot
                .promotion_record_container()
                .applied_rules_by_shipping_option("ground")
                .len(),
            3
        );

        Ok(())
    }

    #[test]
    fn shipping_discount_needs_a_list_price() -> TestResult {
        let (cart, _) = cart_with(1, 1_000)?;
        let mut pass = PricingPass::new(&cart);

        assert_eq!(
            pass.set_shipping_discount_if_lower("ground", RuleId(1), ActionId(1), usd(100)),
            Err(DiscountError::ShippingOptionNotPriced("ground".to_string()).into())
        );

        Ok(())
    }

    #[test]
    fn unpriced_selected_shipping_option_fails_the_pass() -> TestResult {
        let (mut cart, _) = cart_with(1, 1_000)?;
        cart.select_shipping_option("ground");

        let result = PricingPass::new(&cart).finish(&store());

        assert!(matches!(result, Err(SnapshotError::ShippingOptionNotPriced(option)) if option == "ground"));

        Ok(())
    }

    #[test]
    fn shipping_is_free_when_nothing_ships() -> TestResult {
        let mut cart = ShoppingCart::new(USD);
        cart.add_item(
            CartLineItem::new("ebook", "EBOOK", ItemType::Simple, 1)
                .with_price(Price::from_list(usd(1_200)))
                .with_shippable(false),
        )?;
        cart.select_shipping_option("ground");

        let snapshot = PricingPass::new(&cart).finish(&store())?;

        assert_eq!(snapshot.shipping_cost(), usd(0));
        assert_eq!(snapshot.before_tax_total(), usd(1_200));

        Ok(())
    }

    #[test]
    fn shipping_override_ignored_when_nothing_ships() -> TestResult {
        let mut cart = ShoppingCart::new(USD);
        cart.add_item(
            CartLineItem::new("ebook", "EBOOK", ItemType::Simple, 1)
                .with_price(Price::from_list(usd(1_000)))
                .with_shippable(false),
        )?;
        cart.set_shipping_cost_override(Some(usd(500)))?;

        let snapshot = PricingPass::new(&cart).finish(&store())?;

        assert!(!cart.requires_shipping());
        assert_eq!(snapshot.shipping_cost(), usd(0));
        assert_eq!(snapshot.shipping_list_price(), usd(0));
        assert_eq!(snapshot.before_tax_total(), usd(1_000));

        Ok(())
    }

    #[test]
    fn overrides_take_precedence() -> TestResult {
        let (mut cart, _) = cart_with(2, 1_000)?;
        cart.select_shipping_option("ground");
        cart.set_subtotal_discount_override(Some(usd(0)))?;
        cart.set_shipping_cost_override(Some(usd(250)))?;

        let mut pass = PricingPass::new(&cart);
        pass.set_shipping_list_price("ground", usd(1_000))?;
        pass.set_subtotal_discount(usd(500), RuleId(1), ActionId(1))?;

        let snapshot = pass.finish(&store())?;

        assert!(snapshot.has_subtotal_discount());
        assert_eq!(snapshot.subtotal_discount(), usd(0));
        assert_eq!(snapshot.shipping_cost(), usd(250));
        assert_eq!(snapshot.before_tax_total(), usd(2_250));

        Ok(())
    }

    #[test]
    fn finish_prunes_codes_for_unapplied_rules() -> TestResult {
        let (cart, key) = cart_with(1, 1_000)?;
        let mut pass = PricingPass::new(&cart);

        pass.apply_limited_usage_promotion_rule_code("", RuleId(1));
        pass.apply_limited_usage_promotion_rule_code("APPLIED", RuleId(1));
        pass.apply_limited_usage_promotion_rule_code("IDLE", RuleId(2));
        pass.rule_applied(RuleId(1), ActionId(1), key, usd(100), 1)?;

        let snapshot = pass.finish(&store())?;
        let codes = snapshot.promotion_record_container().limited_usage_promotion_rule_codes();

        assert_eq!(codes.len(), 1);
        assert!(codes.contains_key("APPLIED"));

        Ok(())
    }

    #[test]
    fn store_currency_must_match_cart() -> TestResult {
        let (cart, _) = cart_with(1, 1_000)?;
        let store = StoreConfig::new("UK", rusty_money::iso::GBP, false, "en-GB");

        assert!(matches!(
            PricingPass::new(&cart).finish(&store),
            Err(SnapshotError::Amount(_))
        ));

        Ok(())
    }
}
