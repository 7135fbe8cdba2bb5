//! Snapshots
//!
//! A [`PricingPass`] collects the rule engine's decisions for one cart and
//! turns them into an immutable [`ShoppingCartPricingSnapshot`]. Tax is layered
//! on afterwards with a [`ShoppingCartTaxSnapshot`].

use thiserror::Error;

use crate::{
    calculator::CalculatorError,
    discounts::DiscountError,
    items::{LineItemError, LineItemKey},
    money::AmountError,
};

pub mod apportion;
pub mod cart;
pub mod item;
pub mod pass;
pub mod shipping;
pub mod tax;

pub use apportion::{apportion, apportion_money};
pub use cart::{ApportionedLeaf, ShoppingCartPricingSnapshot};
pub use item::ShoppingItemPricingSnapshot;
pub use pass::PricingPass;
pub use shipping::ShippingPricingSnapshot;
pub use tax::{
    ShoppingCartTaxSnapshot, ShoppingItemTaxSnapshot, TaxCalculationResult, TaxCategory, TaxError,
};

/// Errors raised while running a pricing pass or reading its snapshot.
#[derive(Debug, Error, PartialEq)]
pub enum SnapshotError {
    /// A rule application was rejected.
    #[error(transparent)]
    Discount(#[from] DiscountError),

    /// Wrapped calculator error.
    #[error(transparent)]
    Calculator(#[from] CalculatorError),

    /// Wrapped amount arithmetic error.
    #[error(transparent)]
    Amount(#[from] AmountError),

    /// Wrapped line item arena error.
    #[error(transparent)]
    Item(#[from] LineItemError),

    /// A priced item has no catalog price.
    #[error("line item {0} has no price")]
    MissingPrice(String),

    /// The item was not part of the pricing pass.
    #[error("no pricing snapshot for line item {0:?}")]
    ItemNotFound(LineItemKey),

    /// The shipping option was not part of the pricing pass.
    #[error("no pricing snapshot for shipping option {0}")]
    ShippingOptionNotFound(String),

    /// The selected shipping option has no list price.
    #[error("selected shipping option {0} has not been priced")]
    ShippingOptionNotPriced(String),

    /// The subtotal discount is larger than the subtotal.
    #[error("subtotal discount exceeds the subtotal")]
    SubtotalDiscountExceedsSubtotal,
}
