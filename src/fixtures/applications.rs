//! Rule Application Fixtures

use rustc_hash::FxHashMap;
use serde::Deserialize;

use crate::{
    calculator::TaxMode,
    discounts::{ActionId, RuleId},
    fixtures::{FixtureError, parse_price},
    snapshot::{PricingPass, SnapshotError, TaxCalculationResult, TaxCategory},
};

/// A rule engine decision from YAML, replayed against a [`PricingPass`]
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ApplicationFixture {
    /// Item discount
    Item {
        /// Rule id
        rule: RuleId,

        /// Action id
        action: ActionId,

        /// Discounted line item id
        item: String,

        /// Discount amount string (e.g., "5.00 USD")
        amount: String,

        /// Units the discount applies to
        quantity: u32,
    },

    /// Subtotal discount
    Subtotal {
        /// Rule id
        rule: RuleId,

        /// Action id
        action: ActionId,

        /// Discount amount string
        amount: String,
    },

    /// Shipping discount
    Shipping {
        /// Rule id
        rule: RuleId,

        /// Action id
        action: ActionId,

        /// Shipping option code
        option: String,

        /// Discount amount string
        amount: String,
    },

    /// Limited-usage coupon code
    Coupon {
        /// Coupon code
        code: String,

        /// Rule the code unlocks
        rule: RuleId,
    },

    /// Coupon code removal
    RemoveCoupon {
        /// Coupon code
        code: String,
    },
}

impl ApplicationFixture {
    /// Replay the decision.
    ///
    /// Returns the pass's rejection, if any, as `Ok(Some(_))` so a scenario
    /// can carry on after a refused discount.
    ///
    /// # Errors
    ///
    /// Returns an error if the fixture itself is invalid, e.g. an unknown item id.
    pub fn apply(
        &self,
        pass: &mut PricingPass<'_, 'static>,
    ) -> Result<Option<SnapshotError>, FixtureError> {
        let outcome = match self {
            ApplicationFixture::Item {
                rule,
                action,
                item,
                amount,
                quantity,
            } => {
                let key = pass
                    .cart()
                    .items()
                    .find_by_id(item)
                    .ok_or_else(|| FixtureError::ItemNotFound(item.clone()))?;

                pass.rule_applied(*rule, *action, key, parse_price(amount)?, *quantity)
            }
            ApplicationFixture::Subtotal {
                rule,
                action,
                amount,
            } => pass.set_subtotal_discount(parse_price(amount)?, *rule, *action),
            ApplicationFixture::Shipping {
                rule,
                action,
                option,
                amount,
            } => pass.set_shipping_discount_if_lower(option, *rule, *action, parse_price(amount)?),
            ApplicationFixture::Coupon { code, rule } => {
                pass.apply_limited_usage_promotion_rule_code(code, *rule);

                Ok(())
            }
            ApplicationFixture::RemoveCoupon { code } => {
                pass.remove_limited_usage_promotion_rule_code(code);

                Ok(())
            }
        };

        Ok(outcome.err())
    }
}

/// Category tax from YAML
#[derive(Debug, Deserialize)]
pub struct CategoryTaxFixture {
    /// Tax category
    pub category: TaxCategory,

    /// Tax amount string
    pub amount: String,
}

/// Tax service result from YAML
#[derive(Debug, Default, Deserialize)]
pub struct TaxesFixture {
    /// Tax per category
    #[serde(default)]
    pub categories: Vec<CategoryTaxFixture>,

    /// Line item id -> tax amount string
    #[serde(default)]
    pub items: FxHashMap<String, String>,

    /// Tax on shipping
    pub shipping: Option<String>,
}

impl TaxesFixture {
    /// Convert to a tax calculation result for a store priced in `mode`.
    ///
    /// # Errors
    ///
    /// Returns an error if an amount is invalid or in another currency.
    pub fn into_result(
        self,
        currency: &'static rusty_money::iso::Currency,
        mode: TaxMode,
    ) -> Result<TaxCalculationResult<'static>, FixtureError> {
        let mut result = TaxCalculationResult::new(currency, mode);

        for tax in self.categories {
            result.add_category_tax(tax.category, parse_price(&tax.amount)?)?;
        }

        for (line_item_id, amount) in self.items {
            result.add_item_tax(line_item_id, parse_price(&amount)?)?;
        }

        if let Some(shipping) = self.shipping {
            result.set_shipping_tax(parse_price(&shipping)?)?;
        }

        Ok(result)
    }
}
