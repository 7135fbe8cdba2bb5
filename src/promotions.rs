//! Promotions
//!
//! [`PromotionRecordContainer`] is the audit trail of one pricing pass: every
//! discount record in application order plus the limited-usage coupon codes
//! that were applied. All rule-id views are computed on read.

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use tracing::debug;

use crate::{
    cart::ShoppingCart,
    discounts::{ActionId, DiscountRecord, DiscountScope, RuleAction, RuleId},
};

/// A promotion rule and its actions, as needed for coupon accounting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromotionRule {
    id: RuleId,
    actions: SmallVec<[RuleAction; 2]>,
}

impl PromotionRule {
    /// Create a rule with the given actions.
    pub fn new(id: RuleId, actions: impl IntoIterator<Item = RuleAction>) -> Self {
        Self {
            id,
            actions: actions.into_iter().collect(),
        }
    }

    /// Rule id.
    pub fn id(&self) -> RuleId {
        self.id
    }

    /// Rule actions.
    pub fn actions(&self) -> &[RuleAction] {
        &self.actions
    }
}

/// Discount records and limited-usage coupon codes for one pricing pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PromotionRecordContainer<'a> {
    records: Vec<DiscountRecord<'a>>,
    limited_usage_codes: FxHashMap<String, RuleId>,
}

impl<'a> PromotionRecordContainer<'a> {
    /// Create an empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record. Records are never reordered or deduplicated.
    pub fn add_discount_record(&mut self, record: DiscountRecord<'a>) {
        self.records.push(record);
    }

    /// First record produced by `rule` and `action`.
    pub fn discount_record(&self, rule: RuleId, action: ActionId) -> Option<&DiscountRecord<'a>> {
        self.records
            .iter()
            .find(|record| record.rule_id() == rule && record.action_id() == action)
    }

    /// Every record produced by `rule` and `action`, in application order.
    pub fn discount_records_for(
        &self,
        rule: RuleId,
        action: ActionId,
    ) -> impl Iterator<Item = &DiscountRecord<'a>> {
        self.records
            .iter()
            .filter(move |record| record.rule_id() == rule && record.action_id() == action)
    }

    /// All records, superseded ones included.
    pub fn all_discount_records(&self) -> &[DiscountRecord<'a>] {
        &self.records
    }

    /// Whether no record has been added.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Rule ids of every record.
    pub fn applied_rules(&self) -> FxHashSet<RuleId> {
        self.records.iter().map(DiscountRecord::rule_id).collect()
    }

    /// Rule ids of the item records for a line item id.
    pub fn applied_rules_by_line_item(&self, line_item_id: &str) -> FxHashSet<RuleId> {
        self.records
            .iter()
            .filter(|record| record.line_item_id() == Some(line_item_id))
            .map(DiscountRecord::rule_id)
            .collect()
    }

    /// Rule ids of the shipping records for a shipping option.
    pub fn applied_rules_by_shipping_option(&self, shipping_option: &str) -> FxHashSet<RuleId> {
        self.records
            .iter()
            .filter(|record| record.shipping_option() == Some(shipping_option))
            .map(DiscountRecord::rule_id)
            .collect()
    }

    /// Remember that a limited-usage coupon `code` was applied for `rule`.
    pub fn add_limited_usage_promotion_rule_code(&mut self, code: impl Into<String>, rule: RuleId) {
        self.limited_usage_codes.insert(code.into(), rule);
    }

    /// Forget a limited-usage coupon code. Absent codes are ignored.
    pub fn remove_limited_usage_promotion_rule_code(&mut self, code: &str) {
        self.limited_usage_codes.remove(code);
    }

    /// Limited-usage coupon codes and the rules they unlock.
    pub fn limited_usage_promotion_rule_codes(&self) -> &FxHashMap<String, RuleId> {
        &self.limited_usage_codes
    }

    /// Drop all records and coupon codes.
    pub fn clear(&mut self) {
        self.records.clear();
        self.limited_usage_codes.clear();
    }

    /// Drop coupon codes whose rule produced no record.
    pub fn prune_unapplied_codes(&mut self) {
        let applied = self.applied_rules();

        self.limited_usage_codes.retain(|code, rule| {
            let keep = applied.contains(rule);

            if !keep {
                debug!(code = %code, rule = %rule, "dropping coupon code for rule that never applied");
            }

            keep
        });
    }

    /// Coupon uses the cart consumes for `rule`.
    ///
    /// Each action debits the uses of its records (superseded records debit
    /// nothing), or one use when it produced no record. The rule consumes the
    /// largest action count.
    pub fn coupon_uses_for_rule(&self, rule: &PromotionRule, cart: &ShoppingCart<'_>) -> u32 {
        rule.actions()
            .iter()
            .map(|action| {
                let mut records = self.discount_records_for(rule.id(), action.id()).peekable();

                if records.peek().is_none() {
                    return 1;
                }

                records.map(|record| record.coupon_uses_required(action, cart)).sum()
            })
            .max()
            .unwrap_or(0)
    }

    pub(crate) fn records_mut(&mut self) -> &mut [DiscountRecord<'a>] {
        &mut self.records
    }

    pub(crate) fn item_record_mut(
        &mut self,
        rule: RuleId,
        action: ActionId,
        line_item_id: &str,
    ) -> Option<&mut DiscountRecord<'a>> {
        self.records.iter_mut().find(|record| {
            record.rule_id() == rule
                && record.action_id() == action
                && record.line_item_id() == Some(line_item_id)
        })
    }

    pub(crate) fn supersede_where(&mut self, matches: impl Fn(&DiscountScope) -> bool) {
        for record in self.records_mut() {
            if !record.is_superseded() && matches(record.scope()) {
                record.supersede();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rusty_money::{Money, iso::USD};
    use testresult::TestResult;

    use crate::{
        items::{CartLineItem, ItemType},
        prices::Price,
    };

    use super::*;

    fn usd(minor: i64) -> Money<'static, rusty_money::iso::Currency> {
        Money::from_minor(minor, USD)
    }

    #[test]
    fn lookup_returns_first_matching_record() -> TestResult {
        let mut container = PromotionRecordContainer::new();

        container.add_discount_record(DiscountRecord::subtotal(RuleId(1), ActionId(1), usd(100))?);
        container.add_discount_record(DiscountRecord::subtotal(RuleId(1), ActionId(1), usd(200))?);

        assert_eq!(
            container
                .discount_record(RuleId(1), ActionId(1))
                .map(DiscountRecord::amount),
            Some(usd(100))
        );
        assert!(container.discount_record(RuleId(1), ActionId(2)).is_none());
        assert_eq!(container.all_discount_records().len(), 2);

        Ok(())
    }

    #[test]
    fn applied_rule_views_include_superseded_records() -> TestResult {
        let mut container = PromotionRecordContainer::new();

        container.add_discount_record(
            DiscountRecord::shipping(RuleId(7), ActionId(1), "ground", usd(100))?.superseded(),
        );
        container.add_discount_record(DiscountRecord::shipping(RuleId(8), ActionId(1), "ground", usd(150))?);
        container.add_discount_record(DiscountRecord::shipping(RuleId(9), ActionId(1), "express", usd(50))?);

        let ground = container.applied_rules_by_shipping_option("ground");

        assert_eq!(ground.len(), 2);
        assert!(ground.contains(&RuleId(7)));
        assert!(ground.contains(&RuleId(8)));
        assert_eq!(container.applied_rules().len(), 3);

        Ok(())
    }

    #[test]
    fn removing_an_absent_code_is_a_no_op() {
        let mut container = PromotionRecordContainer::new();
        container.add_limited_usage_promotion_rule_code("SAVE10", RuleId(1));

        let before = container.clone();
        container.remove_limited_usage_promotion_rule_code("MISSING");

        assert_eq!(container, before);

        container.remove_limited_usage_promotion_rule_code("SAVE10");
        container.remove_limited_usage_promotion_rule_code("SAVE10");

        assert!(container.limited_usage_promotion_rule_codes().is_empty());
    }

    #[test]
    fn clear_drops_records_and_codes() -> TestResult {
        let mut container = PromotionRecordContainer::new();
        container.add_discount_record(DiscountRecord::subtotal(RuleId(1), ActionId(1), usd(100))?);
        container.add_limited_usage_promotion_rule_code("SAVE10", RuleId(1));

        container.clear();

        assert!(container.is_empty());
        assert!(container.limited_usage_promotion_rule_codes().is_empty());

        Ok(())
    }

    #[test]
    fn prune_keeps_only_codes_for_applied_rules() -> TestResult {
        let mut container = PromotionRecordContainer::new();
        container.add_discount_record(DiscountRecord::subtotal(RuleId(1), ActionId(1), usd(100))?);
        container.add_limited_usage_promotion_rule_code("APPLIED", RuleId(1));
        container.add_limited_usage_promotion_rule_code("UNUSED", RuleId(2));

        container.prune_unapplied_codes();

        assert_eq!(
            container.limited_usage_promotion_rule_codes().get("APPLIED"),
            Some(&RuleId(1))
        );
        assert!(!container.limited_usage_promotion_rule_codes().contains_key("UNUSED"));

        Ok(())
    }

    #[test]
    fn coupon_uses_for_rule_takes_largest_action() -> TestResult {
        let mut cart = ShoppingCart::new(USD);
        let key = cart.add_item(
            CartLineItem::new("line-1", "SKU-1", ItemType::Simple, 6)
                .with_price(Price::from_list(usd(1_000))),
        )?;

        let rule = PromotionRule::new(
            RuleId(1),
            [
                RuleAction::with_items_per_use(ActionId(1), 2),
                RuleAction::new(ActionId(2)),
            ],
        );

        let mut container = PromotionRecordContainer::new();
        container.add_discount_record(DiscountRecord::item(RuleId(1), ActionId(1), key, "line-1", usd(600), 6)?);

        assert_eq!(container.coupon_uses_for_rule(&rule, &cart), 3);
        assert_eq!(
            container.coupon_uses_for_rule(&PromotionRule::new(RuleId(2), []), &cart),
            0
        );

        Ok(())
    }

    #[test]
    fn superseded_records_are_not_debited() -> TestResult {
        let mut cart = ShoppingCart::new(USD);
        let first = cart.add_item(
            CartLineItem::new("line-1", "SKU-1", ItemType::Simple, 4)
                .with_price(Price::from_list(usd(1_000))),
        )?;
        let second = cart.add_item(
            CartLineItem::new("line-2", "SKU-2", ItemType::Simple, 3)
                .with_price(Price::from_list(usd(1_000))),
        )?;

        let action = RuleAction::with_items_per_use(ActionId(1), 1);
        let rule = PromotionRule::new(RuleId(5), [action]);

        let mut container = PromotionRecordContainer::new();
        container.add_discount_record(
            DiscountRecord::item(RuleId(5), ActionId(1), first, "line-1", usd(400), 4)?.superseded(),
        );
        container.add_discount_record(DiscountRecord::item(RuleId(5), ActionId(1), second, "line-2", usd(300), 3)?);

        assert_eq!(container.applied_rules().len(), 1);
        assert_eq!(container.coupon_uses_for_rule(&rule, &cart), 3);

        Ok(())
    }
}
