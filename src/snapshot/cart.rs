//! Cart pricing snapshots

use std::collections::BTreeMap;

use decimal_percentage::Percentage;
use num_traits::FromPrimitive;
use rust_decimal::Decimal;
use rusty_money::{Money, iso::Currency};
use slotmap::SecondaryMap;
use smallvec::SmallVec;
use tracing::debug;

use crate::{
    calculator::TaxMode,
    cart::ShoppingCart,
    items::{CartLineItem, LineItemKey, LineItems},
    money,
    promotions::PromotionRecordContainer,
    snapshot::{
        SnapshotError, apportion::apportion_money, item::ShoppingItemPricingSnapshot,
        shipping::ShippingPricingSnapshot,
    },
};

/// A priced leaf item: every non-bundle item that contributes to the subtotal.
#[derive(Debug, Clone, PartialEq)]
pub struct ApportionedLeaf<'a> {
    line_item: LineItemKey,
    line_item_id: String,
    sku_code: String,
    quantity: u32,
    root: LineItemKey,
    line_value: Money<'a, Currency>,
    total: Money<'a, Currency>,
    shippable: bool,
}

impl<'a> ApportionedLeaf<'a> {
    fn new(
        key: LineItemKey,
        item: &CartLineItem<'a>,
        root: LineItemKey,
        line_value: Money<'a, Currency>,
        total: Money<'a, Currency>,
    ) -> Self {
        Self {
            line_item: key,
            line_item_id: item.id().to_string(),
            sku_code: item.sku_code().to_string(),
            quantity: item.quantity(),
            root,
            line_value,
            total,
            shippable: item.is_shippable(),
        }
    }

    /// Arena key of the leaf.
    pub fn line_item(&self) -> LineItemKey {
        self.line_item
    }

    /// Line item id.
    pub fn line_item_id(&self) -> &str {
        &self.line_item_id
    }

    /// SKU code.
    pub fn sku_code(&self) -> &str {
        &self.sku_code
    }

    /// Quantity of the leaf.
    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    /// Top-level item the leaf belongs to.
    pub fn root(&self) -> LineItemKey {
        self.root
    }

    /// Undiscounted line value used as the apportionment weight.
    pub fn line_value(&self) -> Money<'a, Currency> {
        self.line_value
    }

    /// Share of the discounted total charged for this leaf.
    pub fn total(&self) -> Money<'a, Currency> {
        self.total
    }

    /// Whether the leaf needs shipping.
    pub fn is_shippable(&self) -> bool {
        self.shippable
    }
}

/// Item-level results of a pricing pass.
#[derive(Debug)]
pub(crate) struct ItemPricing<'a> {
    pub(crate) snapshots: SecondaryMap<LineItemKey, ShoppingItemPricingSnapshot<'a>>,
    pub(crate) order: Vec<LineItemKey>,
    pub(crate) leaves: Vec<ApportionedLeaf<'a>>,
    pub(crate) subtotal: Money<'a, Currency>,
}

fn get<'i, 'a>(
    items: &'i LineItems<'a>,
    key: LineItemKey,
) -> Result<&'i CartLineItem<'a>, SnapshotError> {
    items.get(key).ok_or(SnapshotError::ItemNotFound(key))
}

fn is_calculated_bundle(item: &CartLineItem<'_>) -> bool {
    item.is_bundle() && item.price().is_none()
}

/// Undiscounted value of a priced leaf; the item must carry a catalog price.
fn priced_leaf_value<'a>(
    items: &LineItems<'a>,
    key: LineItemKey,
    currency: &'a Currency,
) -> Result<Money<'a, Currency>, SnapshotError> {
    let item = get(items, key)?;

    if item.price().is_none() {
        return Err(SnapshotError::MissingPrice(item.id().to_string()));
    }

    Ok(ShoppingItemPricingSnapshot::from_item(key, item, money::zero(currency)).line_value()?)
}

/// Undiscounted line value of any item. A calculated bundle is worth the sum
/// of its leaves.
pub(crate) fn line_value<'a>(
    cart: &ShoppingCart<'a>,
    key: LineItemKey,
) -> Result<Money<'a, Currency>, SnapshotError> {
    let items = cart.items();
    let currency = cart.currency();
    let item = get(items, key)?;

    if is_calculated_bundle(item) {
        let values = items
            .leaves(key)
            .into_iter()
            .map(|leaf| priced_leaf_value(items, leaf, currency))
            .collect::<Result<SmallVec<[_; 8]>, _>>()?;

        return Ok(money::sum(&values, currency)?);
    }

    priced_leaf_value(items, key, currency)
}

/// Build item snapshots and the apportioned leaf list for the cart.
pub(crate) fn price_items<'a>(
    cart: &ShoppingCart<'a>,
    discounts: &SecondaryMap<LineItemKey, Money<'a, Currency>>,
) -> Result<ItemPricing<'a>, SnapshotError> {
    let items = cart.items();
    let currency = cart.currency();
    let order = items.keys();
    let mut snapshots = SecondaryMap::new();

    for key in &order {
        let item = get(items, *key)?;
        let discount = discounts
            .get(*key)
            .copied()
            .unwrap_or_else(|| money::zero(currency));

        let snapshot = if is_calculated_bundle(item) {
            ShoppingItemPricingSnapshot::calculated_bundle(*key, item, line_value(cart, *key)?, discount)
        } else {
            ShoppingItemPricingSnapshot::from_item(*key, item, discount)
        };

        debug!(
            line_item = item.id(),
            sku = item.sku_code(),
            quantity = item.quantity(),
            discount = %discount,
            "priced line item"
        );

        snapshots.insert(*key, snapshot);
    }

    let mut leaves = Vec::new();

    for root in items.roots() {
        let root_item = get(items, *root)?;
        let leaf_keys = items.leaves(*root);

        if root_item.is_bundle() {
            let bundle = snapshots.get(*root).ok_or(SnapshotError::ItemNotFound(*root))?;
            let net = bundle.discounted_value()?;

            let weights = leaf_keys
                .iter()
                .map(|leaf| {
                    let snapshot = snapshots.get(*leaf).ok_or(SnapshotError::ItemNotFound(*leaf))?;

                    Ok(snapshot.line_value()?)
                })
                .collect::<Result<SmallVec<[_; 8]>, SnapshotError>>()?;

            let shares = apportion_money(net, &weights)?;

            for ((leaf, weight), share) in leaf_keys.iter().zip(weights).zip(shares) {
                leaves.push(ApportionedLeaf::new(*leaf, get(items, *leaf)?, *root, weight, share));
            }
        } else {
            for leaf in leaf_keys {
                let item = get(items, leaf)?;

                if item.price().is_none() {
                    return Err(SnapshotError::MissingPrice(item.id().to_string()));
                }

                let snapshot = snapshots.get(leaf).ok_or(SnapshotError::ItemNotFound(leaf))?;

                leaves.push(ApportionedLeaf::new(
                    leaf,
                    item,
                    *root,
                    snapshot.line_value()?,
                    snapshot.discounted_value()?,
                ));
            }
        }
    }

    let subtotal = money::sum(leaves.iter().map(|leaf| &leaf.total), currency)?;

    Ok(ItemPricing {
        snapshots,
        order,
        leaves,
        subtotal,
    })
}

/// Immutable pricing of a whole cart.
#[derive(Debug, Clone)]
pub struct ShoppingCartPricingSnapshot<'a> {
    pub(crate) currency: &'a Currency,
    pub(crate) tax_mode: TaxMode,
    pub(crate) items: SecondaryMap<LineItemKey, ShoppingItemPricingSnapshot<'a>>,
    pub(crate) order: Vec<LineItemKey>,
    pub(crate) leaves: Vec<ApportionedLeaf<'a>>,
    pub(crate) subtotal: Money<'a, Currency>,
    pub(crate) subtotal_discount: Money<'a, Currency>,
    pub(crate) subtotal_discount_explicit: bool,
    pub(crate) item_discount_total: Money<'a, Currency>,
    pub(crate) shipping_cost: Money<'a, Currency>,
    pub(crate) shipping_list_price: Money<'a, Currency>,
    pub(crate) shipping: BTreeMap<String, ShippingPricingSnapshot<'a>>,
    pub(crate) selected_shipping_option: Option<String>,
    pub(crate) container: PromotionRecordContainer<'a>,
}

impl<'a> ShoppingCartPricingSnapshot<'a> {
    /// Snapshot currency.
    pub fn currency(&self) -> &'a Currency {
        self.currency
    }

    /// Store tax mode the snapshot was priced under.
    pub fn tax_mode(&self) -> TaxMode {
        self.tax_mode
    }

    /// Pricing snapshot for a line item.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::ItemNotFound`] if the item was not priced in this pass.
    pub fn shopping_item_pricing_snapshot(
        &self,
        key: LineItemKey,
    ) -> Result<&ShoppingItemPricingSnapshot<'a>, SnapshotError> {
        self.items.get(key).ok_or(SnapshotError::ItemNotFound(key))
    }

    /// Item snapshots in cart traversal order.
    pub fn shopping_item_pricing_snapshots(
        &self,
    ) -> impl Iterator<Item = &ShoppingItemPricingSnapshot<'a>> {
        self.order.iter().filter_map(|key| self.items.get(*key))
    }

    /// Pricing snapshot for a shipping option.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::ShippingOptionNotFound`] if the option was not priced.
    pub fn shipping_pricing_snapshot(
        &self,
        shipping_option: &str,
    ) -> Result<&ShippingPricingSnapshot<'a>, SnapshotError> {
        self.shipping
            .get(shipping_option)
            .ok_or_else(|| SnapshotError::ShippingOptionNotFound(shipping_option.to_string()))
    }

    /// All priced shipping options, by option code.
    pub fn shipping_pricing_snapshots(&self) -> &BTreeMap<String, ShippingPricingSnapshot<'a>> {
        &self.shipping
    }

    /// Selected shipping option code.
    pub fn selected_shipping_option(&self) -> Option<&str> {
        self.selected_shipping_option.as_deref()
    }

    /// Leaves in traversal order with their apportioned totals.
    pub fn apportioned_leaf_items(&self) -> &[ApportionedLeaf<'a>] {
        &self.leaves
    }

    /// Sum of the leaf totals, before the subtotal discount.
    pub fn subtotal(&self) -> Money<'a, Currency> {
        self.subtotal
    }

    /// Subtotal discount.
    pub fn subtotal_discount(&self) -> Money<'a, Currency> {
        self.subtotal_discount
    }

    /// Whether a subtotal discount applies. An explicit override counts even when zero.
    pub fn has_subtotal_discount(&self) -> bool {
        self.subtotal_discount_explicit || self.subtotal_discount.to_minor_units() > 0
    }

    /// Shipping cost after discount.
    pub fn shipping_cost(&self) -> Money<'a, Currency> {
        self.shipping_cost
    }

    /// Shipping list price of the selected option.
    pub fn shipping_list_price(&self) -> Money<'a, Currency> {
        self.shipping_list_price
    }

    /// Shipping cost before tax.
    pub fn before_tax_shipping_cost(&self) -> Money<'a, Currency> {
        self.shipping_cost
    }

    /// Subtotal less the subtotal discount.
    pub fn before_tax_subtotal(&self) -> Money<'a, Currency> {
        Money::from_minor(
            self.subtotal.to_minor_units() - self.subtotal_discount.to_minor_units(),
            self.currency,
        )
    }

    /// Subtotal less the subtotal discount plus shipping.
    pub fn before_tax_total(&self) -> Money<'a, Currency> {
        Money::from_minor(
            self.before_tax_subtotal().to_minor_units() + self.shipping_cost.to_minor_units(),
            self.currency,
        )
    }

    /// Discount records and coupon codes used to build the snapshot.
    pub fn promotion_record_container(&self) -> &PromotionRecordContainer<'a> {
        &self.container
    }

    /// Item and subtotal discounts combined.
    ///
    /// # Errors
    ///
    /// Returns an [`AmountError`](crate::money::AmountError) on a currency mismatch.
    pub fn savings(&self) -> Result<Money<'a, Currency>, SnapshotError> {
        Ok(money::sum(
            [&self.item_discount_total, &self.subtotal_discount],
            self.currency,
        )?)
    }

    /// Savings relative to the undiscounted subtotal.
    ///
    /// # Errors
    ///
    /// Returns an [`AmountError`](crate::money::AmountError) on a currency mismatch.
    pub fn savings_percent(&self) -> Result<Percentage, SnapshotError> {
        let savings = self.savings()?.to_minor_units();
        let base = self.subtotal.to_minor_units() + self.item_discount_total.to_minor_units();

        if base == 0 {
            return Ok(Percentage::from(0.0));
        }

        let savings_dec = Decimal::from_i64(savings).unwrap_or(Decimal::ZERO);
        let base_dec = Decimal::from_i64(base).unwrap_or(Decimal::ZERO);

        Ok(Percentage::from(savings_dec / base_dec))
    }

    /// Spread the subtotal discount over the leaves by their totals.
    ///
    /// # Errors
    ///
    /// Returns an [`AmountError`](crate::money::AmountError) on overflow.
    pub fn apportion_subtotal_discount(
        &self,
    ) -> Result<SmallVec<[(LineItemKey, Money<'a, Currency>); 8]>, SnapshotError> {
        let weights: SmallVec<[_; 8]> = self.leaves.iter().map(ApportionedLeaf::total).collect();
        let shares = apportion_money(self.subtotal_discount, &weights)?;

        Ok(self
            .leaves
            .iter()
            .map(ApportionedLeaf::line_item)
            .zip(shares)
            .collect())
    }
}
