//! Pricing Snapshot
//!
//! Turns a shopping cart and the decisions of a promotion rule engine into
//! immutable, consistent pricing and tax snapshots: line totals, bundle
//! apportionment, subtotal and shipping discounts, coupon use accounting and
//! recurring charge summaries.

pub mod calculator;
pub mod cart;
pub mod discounts;
pub mod fixtures;
pub mod items;
pub mod money;
pub mod prelude;
pub mod prices;
pub mod promotions;
pub mod quantity;
pub mod receipt;
pub mod recurring;
pub mod snapshot;
pub mod store;
