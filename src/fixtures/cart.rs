//! Cart Fixtures

use rustc_hash::FxHashMap;
use rusty_money::iso::Currency;
use serde::Deserialize;

use crate::{
    cart::ShoppingCart,
    discounts::{RuleAction, RuleId},
    fixtures::{FixtureError, parse_price},
    items::{CartLineItem, ItemType, LineItemKey},
    prices::{Price, PriceTier, RecurringSchedule},
    promotions::PromotionRule,
    quantity::Quantity,
};

fn default_quantity() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

/// Price tier from YAML
#[derive(Debug, Deserialize)]
pub struct TierFixture {
    /// Minimum quantity the tier applies from
    #[serde(default = "default_quantity")]
    pub min_quantity: u32,

    /// List price string (e.g., "10.00 USD")
    pub list: Option<String>,

    /// Sale price string
    pub sale: Option<String>,

    /// Catalog-promoted price string
    pub computed: Option<String>,
}

impl TierFixture {
    fn into_tier(self) -> Result<PriceTier<'static>, FixtureError> {
        let mut tier = match self.list {
            Some(list) => PriceTier::list(self.min_quantity, parse_price(&list)?),
            None => PriceTier::unpriced(self.min_quantity),
        };

        if let Some(sale) = self.sale {
            tier = tier.with_sale(parse_price(&sale)?);
        }

        if let Some(computed) = self.computed {
            tier = tier.with_computed(parse_price(&computed)?);
        }

        Ok(tier)
    }
}

/// Recurring schedule from YAML
#[derive(Debug, Deserialize)]
pub struct RecurringFixture {
    /// Schedule display name
    pub name: String,

    /// Billing frequency
    pub frequency: Quantity,

    /// Single-tier price shorthand
    pub price: Option<String>,

    /// Quantity tiers
    #[serde(default)]
    pub tiers: Vec<TierFixture>,
}

impl RecurringFixture {
    fn into_schedule(self) -> Result<RecurringSchedule<'static>, FixtureError> {
        let tiers = collect_tiers(self.price, self.tiers)?;

        Ok(RecurringSchedule::new(self.name, self.frequency, tiers))
    }
}

fn collect_tiers(
    price: Option<String>,
    tiers: Vec<TierFixture>,
) -> Result<Vec<PriceTier<'static>>, FixtureError> {
    let mut collected = Vec::with_capacity(tiers.len() + 1);

    if let Some(price) = price {
        collected.push(PriceTier::list(1, parse_price(&price)?));
    }

    for tier in tiers {
        collected.push(tier.into_tier()?);
    }

    Ok(collected)
}

/// Line item from YAML
#[derive(Debug, Deserialize)]
pub struct ItemFixture {
    /// Line item id
    pub id: String,

    /// SKU code
    pub sku: String,

    /// Item kind
    #[serde(default, rename = "type")]
    pub item_type: ItemType,

    /// Quantity
    #[serde(default = "default_quantity")]
    pub quantity: u32,

    /// Single-tier list price shorthand (e.g., "10.00 USD")
    pub price: Option<String>,

    /// Quantity tiers
    #[serde(default)]
    pub tiers: Vec<TierFixture>,

    /// Recurring schedules
    #[serde(default)]
    pub recurring: Vec<RecurringFixture>,

    /// Whether cart promotions may discount the item
    #[serde(default = "default_true")]
    pub discountable: bool,

    /// Whether the item ships
    #[serde(default = "default_true")]
    pub shippable: bool,

    /// Constituents or dependents
    #[serde(default)]
    pub children: Vec<ItemFixture>,
}

impl ItemFixture {
    /// Convert to a line item priced in `currency`, returning its children.
    ///
    /// Items with neither one-off tiers nor recurring schedules are unpriced.
    ///
    /// # Errors
    ///
    /// Returns an error if a price string or tier is invalid.
    pub fn into_line_item(
        self,
        currency: &'static Currency,
    ) -> Result<(CartLineItem<'static>, Vec<ItemFixture>), FixtureError> {
        let tiers = collect_tiers(self.price, self.tiers)?;

        let price = if tiers.is_empty() && self.recurring.is_empty() {
            None
        } else if tiers.is_empty() {
            Some(Price::new(currency, [PriceTier::unpriced(1)])?)
        } else {
            Some(Price::new(currency, tiers)?)
        };

        let price = match price {
            Some(mut price) => {
                for schedule in self.recurring {
                    price = price.with_recurring(schedule.into_schedule()?)?;
                }

                Some(price)
            }
            None => None,
        };

        let mut item = CartLineItem::new(self.id, self.sku, self.item_type, self.quantity)
            .with_discountable(self.discountable)
            .with_shippable(self.shippable);

        if let Some(price) = price {
            item = item.with_price(price);
        }

        Ok((item, self.children))
    }
}

/// Shipping options from YAML
#[derive(Debug, Default, Deserialize)]
pub struct ShippingFixture {
    /// Shipping option code -> list price string
    #[serde(default)]
    pub options: FxHashMap<String, String>,

    /// Selected shipping option code
    pub selected: Option<String>,
}

/// Cart overrides from YAML
#[derive(Debug, Default, Deserialize)]
pub struct OverridesFixture {
    /// Explicit subtotal discount
    pub subtotal_discount: Option<String>,

    /// Explicit shipping cost
    pub shipping_cost: Option<String>,
}

/// Promotion rule from YAML
#[derive(Debug, Deserialize)]
pub struct RuleFixture {
    /// Rule id
    pub id: RuleId,

    /// Rule actions
    #[serde(default)]
    pub actions: Vec<RuleAction>,
}

impl From<RuleFixture> for PromotionRule {
    fn from(fixture: RuleFixture) -> Self {
        PromotionRule::new(fixture.id, fixture.actions)
    }
}

/// Add `items` to the cart beneath `parent`, depth first.
///
/// # Errors
///
/// Returns an error if an item cannot be converted or is rejected by the cart.
pub fn add_items(
    cart: &mut ShoppingCart<'static>,
    parent: Option<LineItemKey>,
    items: Vec<ItemFixture>,
) -> Result<(), FixtureError> {
    for fixture in items {
        let (item, children) = fixture.into_line_item(cart.currency())?;

        let key = match parent {
            Some(parent) => cart.add_child_item(parent, item)?,
            None => cart.add_item(item)?,
        };

        add_items(cart, Some(key), children)?;
    }

    Ok(())
}
