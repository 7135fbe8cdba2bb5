//! Pricing snapshot prelude.
//!
//! Convenience exports for common library consumers.

pub use crate::{
    calculator::{CalculatorError, PriceCalculator, TaxMode, TaxPriceCalculator},
    cart::{CartError, ShoppingCart},
    discounts::{ActionId, DiscountError, DiscountRecord, DiscountScope, RuleAction, RuleId},
    items::{CartLineItem, ItemType, LineItemError, LineItemKey, LineItems},
    money::AmountError,
    prices::{Price, PriceError, PriceTier, RecurringSchedule},
    promotions::{PromotionRecordContainer, PromotionRule},
    quantity::{FrequencyUnit, Quantity},
    receipt::{Receipt, ReceiptError},
    recurring::{FrequencyAndRecurringPrice, FrequencyAndRecurringPriceFactory, RecurringPriceError},
    snapshot::{
        ApportionedLeaf, PricingPass, ShippingPricingSnapshot, ShoppingCartPricingSnapshot,
        ShoppingCartTaxSnapshot, ShoppingItemPricingSnapshot, ShoppingItemTaxSnapshot,
        SnapshotError, TaxCalculationResult, TaxCategory, TaxError,
    },
    store::StoreConfig,
};
