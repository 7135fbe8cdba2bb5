//! Discounts

use std::fmt;

use rusty_money::{Money, iso::Currency};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    cart::ShoppingCart,
    items::LineItemKey,
    money::{self, AmountError},
};

/// Errors raised while recording a discount.
#[derive(Debug, Error, PartialEq)]
pub enum DiscountError {
    /// Discount amounts cannot be negative.
    #[error("discount for rule {0} is negative")]
    Negative(RuleId),

    /// The discount is larger than the amount it applies to.
    #[error("discount for rule {rule} exceeds the discountable amount")]
    ExceedsPrice {
        /// Rule that produced the discount
        rule: RuleId,
    },

    /// The discounted item is not in the cart.
    #[error("line item {0:?} is not in the cart")]
    UnknownItem(LineItemKey),

    /// The discounted item does not accept cart promotions.
    #[error("line item {0} is not discountable")]
    NotDiscountable(String),

    /// The discounted item has no price.
    #[error("line item {0} has no price")]
    NoPrice(String),

    /// A shipping discount was offered for an option with no list price.
    #[error("shipping option {0} has no list price")]
    ShippingOptionNotPriced(String),

    /// Shipping list prices cannot be negative.
    #[error("shipping option {0} has a negative list price")]
    NegativeShippingPrice(String),

    /// Bundle constituents are discounted through their bundle.
    #[error("line item {0} is part of a bundle and cannot be discounted directly")]
    BundleConstituent(String),

    /// Wrapped amount arithmetic error.
    #[error(transparent)]
    Amount(#[from] AmountError),
}

/// Promotion rule identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(pub u64);

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Promotion rule action identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(pub u64);

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A rule action as far as coupon accounting is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleAction {
    id: ActionId,

    /// Items discounted per coupon use.
    #[serde(default)]
    items_per_use: Option<u32>,
}

impl RuleAction {
    /// An action that consumes one coupon use per application.
    pub fn new(id: ActionId) -> Self {
        Self {
            id,
            items_per_use: None,
        }
    }

    /// An action that consumes one coupon use per `items` discounted items.
    pub fn with_items_per_use(id: ActionId, items: u32) -> Self {
        Self {
            id,
            items_per_use: Some(items),
        }
    }

    /// Action id.
    pub fn id(&self) -> ActionId {
        self.id
    }

    /// Items discounted per coupon use, if limited.
    pub fn items_per_use(&self) -> Option<u32> {
        self.items_per_use
    }
}

/// What a discount record applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscountScope {
    /// A line item.
    Item {
        /// Arena key of the discounted item.
        line_item: LineItemKey,

        /// Line item id, for lookups that outlive the arena key.
        line_item_id: String,

        /// Number of units the discount was applied to.
        quantity_applied_to: u32,
    },

    /// The cart subtotal.
    Subtotal,

    /// A shipping option.
    Shipping {
        /// Shipping option code.
        shipping_option: String,
    },
}

/// One application of a rule action.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscountRecord<'a> {
    rule_id: RuleId,
    action_id: ActionId,
    amount: Money<'a, Currency>,
    scope: DiscountScope,
    superseded: bool,
}

impl<'a> DiscountRecord<'a> {
    fn new(
        rule_id: RuleId,
        action_id: ActionId,
        amount: Money<'a, Currency>,
        scope: DiscountScope,
    ) -> Result<Self, DiscountError> {
        if amount.to_minor_units() < 0 {
            return Err(DiscountError::Negative(rule_id));
        }

        Ok(Self {
            rule_id,
            action_id,
            amount,
            scope,
            superseded: false,
        })
    }

    /// Record a discount on a line item.
    ///
    /// # Errors
    ///
    /// Returns [`DiscountError::Negative`] for negative amounts.
    pub fn item(
        rule_id: RuleId,
        action_id: ActionId,
        line_item: LineItemKey,
        line_item_id: impl Into<String>,
        amount: Money<'a, Currency>,
        quantity_applied_to: u32,
    ) -> Result<Self, DiscountError> {
        Self::new(
            rule_id,
            action_id,
            amount,
            DiscountScope::Item {
                line_item,
                line_item_id: line_item_id.into(),
                quantity_applied_to,
            },
        )
    }

    /// Record a subtotal discount.
    ///
    /// # Errors
    ///
    /// Returns [`DiscountError::Negative`] for negative amounts.
    pub fn subtotal(
        rule_id: RuleId,
        action_id: ActionId,
        amount: Money<'a, Currency>,
    ) -> Result<Self, DiscountError> {
        Self::new(rule_id, action_id, amount, DiscountScope::Subtotal)
    }

    /// Record a shipping discount.
    ///
    /// # Errors
    ///
    /// Returns [`DiscountError::Negative`] for negative amounts.
    pub fn shipping(
        rule_id: RuleId,
        action_id: ActionId,
        shipping_option: impl Into<String>,
        amount: Money<'a, Currency>,
    ) -> Result<Self, DiscountError> {
        Self::new(
            rule_id,
            action_id,
            amount,
            DiscountScope::Shipping {
                shipping_option: shipping_option.into(),
            },
        )
    }

    /// Mark a freshly created record as superseded.
    #[must_use]
    pub fn superseded(mut self) -> Self {
        self.superseded = true;
        self
    }

    /// Rule that produced the discount.
    pub fn rule_id(&self) -> RuleId {
        self.rule_id
    }

    /// Action that produced the discount.
    pub fn action_id(&self) -> ActionId {
        self.action_id
    }

    /// Discount amount.
    pub fn amount(&self) -> Money<'a, Currency> {
        self.amount
    }

    /// What the discount applies to.
    pub fn scope(&self) -> &DiscountScope {
        &self.scope
    }

    /// Whether a later discount voided this one.
    pub fn is_superseded(&self) -> bool {
        self.superseded
    }

    /// Discounted line item id, for item records.
    pub fn line_item_id(&self) -> Option<&str> {
        match &self.scope {
            DiscountScope::Item { line_item_id, .. } => Some(line_item_id),
            _ => None,
        }
    }

    /// Shipping option code, for shipping records.
    pub fn shipping_option(&self) -> Option<&str> {
        match &self.scope {
            DiscountScope::Shipping { shipping_option } => Some(shipping_option),
            _ => None,
        }
    }

    pub(crate) fn supersede(&mut self) {
        self.superseded = true;
    }

    /// Fold a repeat application of the same action into this item record.
    pub(crate) fn increase(
        &mut self,
        quantity: u32,
        amount: Money<'a, Currency>,
    ) -> Result<(), DiscountError> {
        self.amount = money::sum([&self.amount, &amount], self.amount.currency())?;

        if let DiscountScope::Item {
            quantity_applied_to,
            ..
        } = &mut self.scope
        {
            *quantity_applied_to = quantity_applied_to.saturating_add(quantity);
        }

        Ok(())
    }

    /// Coupon uses this record debits from a limited-usage coupon.
    ///
    /// Superseded records never debit anything. Subtotal and shipping
    /// discounts debit one use. Item discounts debit one use per
    /// `items_per_use` discounted units, counted against the item's current
    /// quantity; an item no longer in the cart debits nothing.
    pub fn coupon_uses_required(&self, action: &RuleAction, cart: &ShoppingCart<'_>) -> u32 {
        if self.superseded {
            return 0;
        }

        match &self.scope {
            DiscountScope::Subtotal | DiscountScope::Shipping { .. } => 1,
            DiscountScope::Item {
                line_item,
                quantity_applied_to,
                ..
            } => {
                let Some(item) = cart.items().get(*line_item) else {
                    return 0;
                };

                match action.items_per_use {
                    Some(per_use) if per_use > 0 => {
                        (*quantity_applied_to).min(item.quantity()).div_ceil(per_use)
                    }
                    _ => 1,
                }
            }
        }
    }
}
