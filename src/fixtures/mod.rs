//! Fixtures
//!
//! YAML cart scenarios. A scenario describes a cart, the decisions a rule
//! engine made about it, and the tax service's answer; pricing it replays the
//! decisions through a [`PricingPass`] and layers the taxes on top.

use std::{collections::BTreeMap, fs, path::PathBuf};

use rusty_money::{
    Money,
    iso::{self, Currency},
};
use serde::Deserialize;
use thiserror::Error;

use crate::{
    cart::{CartError, ShoppingCart},
    discounts::RuleId,
    fixtures::{
        applications::{ApplicationFixture, TaxesFixture},
        cart::{ItemFixture, OverridesFixture, RuleFixture, ShippingFixture, add_items},
    },
    items::LineItemKey,
    money::{self, AmountError},
    prices::PriceError,
    promotions::PromotionRule,
    recurring::{FrequencyAndRecurringPrice, FrequencyAndRecurringPriceFactory, RecurringPriceError},
    snapshot::{PricingPass, ShoppingCartTaxSnapshot, SnapshotError, TaxCalculationResult, TaxError},
    store::StoreConfig,
};

pub mod applications;
pub mod cart;

/// Fixture Parsing Errors
#[derive(Debug, Error)]
pub enum FixtureError {
    /// IO error reading fixture files
    #[error("Failed to read fixture file: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_norway::Error),

    /// Invalid price format
    #[error("Invalid price format: {0}")]
    InvalidPrice(String),

    /// Unknown currency code
    #[error("Unknown currency code: {0}")]
    UnknownCurrency(String),

    /// Item not found
    #[error("Item not found: {0}")]
    ItemNotFound(String),

    /// Invalid catalog price
    #[error("Invalid price: {0}")]
    Price(#[from] PriceError),

    /// Cart rejected the fixture
    #[error("Failed to build cart: {0}")]
    Cart(#[from] CartError),

    /// Pricing pass failed
    #[error("Failed to price cart: {0}")]
    Snapshot(#[from] SnapshotError),

    /// Tax snapshot failed
    #[error("Failed to apply taxes: {0}")]
    Tax(#[from] TaxError),

    /// Recurring charge summary failed
    #[error("Failed to summarise recurring charges: {0}")]
    Recurring(#[from] RecurringPriceError),

    /// Amount arithmetic error
    #[error(transparent)]
    Amount(#[from] AmountError),
}

/// Parse a price string such as `"2.50 GBP"`.
///
/// # Errors
///
/// Returns an error if the amount is malformed, has too many decimal places
/// for the currency, or the currency is unknown.
pub fn parse_price(price: &str) -> Result<Money<'static, Currency>, FixtureError> {
    let mut parts = price.split_whitespace();

    let (Some(amount), Some(code), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(FixtureError::InvalidPrice(price.to_string()));
    };

    let currency = iso::find(code).ok_or_else(|| FixtureError::UnknownCurrency(code.to_string()))?;

    let amount = amount
        .parse()
        .ok()
        .ok_or_else(|| FixtureError::InvalidPrice(price.to_string()))?;

    money::from_major(amount, currency).ok_or_else(|| FixtureError::InvalidPrice(price.to_string()))
}

/// Cart scenario as written in YAML
#[derive(Debug, Deserialize)]
pub struct CartFixture {
    /// Store the cart is priced in
    pub store: StoreConfig,

    /// Top-level line items
    #[serde(default)]
    pub items: Vec<ItemFixture>,

    /// Line item ids removed after the cart is built
    #[serde(default)]
    pub removed: Vec<String>,

    /// Shipping options and selection
    #[serde(default)]
    pub shipping: ShippingFixture,

    /// Explicit cart overrides
    #[serde(default)]
    pub overrides: OverridesFixture,

    /// Rules, for coupon use accounting
    #[serde(default)]
    pub rules: Vec<RuleFixture>,

    /// Rule engine decisions, in the order they were made
    #[serde(default)]
    pub applications: Vec<ApplicationFixture>,

    /// Tax service result
    #[serde(default)]
    pub taxes: TaxesFixture,
}

/// A cart ready to be priced
#[derive(Debug)]
pub struct Scenario {
    store: StoreConfig,
    cart: ShoppingCart<'static>,
    shipping_prices: Vec<(String, Money<'static, Currency>)>,
    rules: Vec<PromotionRule>,
    applications: Vec<ApplicationFixture>,
    taxes: TaxCalculationResult<'static>,
}

impl TryFrom<CartFixture> for Scenario {
    type Error = FixtureError;

    fn try_from(fixture: CartFixture) -> Result<Self, Self::Error> {
        let currency = fixture.store.currency();
        let mut cart = ShoppingCart::new(currency);

        add_items(&mut cart, None, fixture.items)?;

        for id in fixture.removed {
            let key = cart
                .items()
                .find_by_id(&id)
                .ok_or(FixtureError::ItemNotFound(id))?;

            cart.remove_item(key)?;
        }

        if let Some(selected) = fixture.shipping.selected {
            cart.select_shipping_option(selected);
        }

        cart.set_subtotal_discount_override(
            fixture
                .overrides
                .subtotal_discount
                .as_deref()
                .map(parse_price)
                .transpose()?,
        )?;

        cart.set_shipping_cost_override(
            fixture
                .overrides
                .shipping_cost
                .as_deref()
                .map(parse_price)
                .transpose()?,
        )?;

        let mut shipping_prices = fixture
            .shipping
            .options
            .into_iter()
            .map(|(code, price)| Ok((code, parse_price(&price)?)))
            .collect::<Result<Vec<_>, FixtureError>>()?;

        shipping_prices.sort_by(|a, b| a.0.cmp(&b.0));

        let taxes = fixture.taxes.into_result(currency, fixture.store.tax_mode())?;

        Ok(Self {
            store: fixture.store,
            cart,
            shipping_prices,
            rules: fixture.rules.into_iter().map(PromotionRule::from).collect(),
            applications: fixture.applications,
            taxes,
        })
    }
}

/// Outcome of pricing a scenario
#[derive(Debug)]
pub struct PricedCart {
    /// Pricing and tax snapshot
    pub snapshot: ShoppingCartTaxSnapshot<'static>,

    /// Coupon uses consumed per rule
    pub coupon_uses: BTreeMap<RuleId, u32>,

    /// Recurring charges by frequency
    pub recurring: Vec<FrequencyAndRecurringPrice<'static>>,

    /// Decisions the pass refused, in order
    pub rejected: Vec<SnapshotError>,
}

impl Scenario {
    /// Parse a scenario from YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid or describes an invalid cart.
    pub fn from_yaml(contents: &str) -> Result<Self, FixtureError> {
        let fixture: CartFixture = serde_norway::from_str(contents)?;

        Self::try_from(fixture)
    }

    /// Store the scenario is priced in.
    pub fn store(&self) -> &StoreConfig {
        &self.store
    }

    /// Cart being priced.
    pub fn cart(&self) -> &ShoppingCart<'static> {
        &self.cart
    }

    /// Rules declared by the scenario.
    pub fn rules(&self) -> &[PromotionRule] {
        &self.rules
    }

    /// Arena key of a line item by id.
    ///
    /// # Errors
    ///
    /// Returns an error if no line item has this id.
    pub fn line_item(&self, id: &str) -> Result<LineItemKey, FixtureError> {
        self.cart
            .items()
            .find_by_id(id)
            .ok_or_else(|| FixtureError::ItemNotFound(id.to_string()))
    }

    /// Run a pricing pass over the cart and apply the taxes.
    ///
    /// # Errors
    ///
    /// Returns an error if a decision refers to an unknown item or the cart
    /// cannot be priced. Decisions the pass refuses are collected in
    /// [`PricedCart::rejected`] instead.
    pub fn price(&self) -> Result<PricedCart, FixtureError> {
        let mut pass = PricingPass::new(&self.cart);

        for (option, price) in &self.shipping_prices {
            pass.set_shipping_list_price(option.clone(), *price)?;
        }

        let mut rejected = Vec::new();

        for application in &self.applications {
            if let Some(error) = application.apply(&mut pass)? {
                rejected.push(error);
            }
        }

        let pricing = pass.finish(&self.store)?;

        let coupon_uses = self
            .rules
            .iter()
            .map(|rule| {
                let uses = pricing
                    .promotion_record_container()
                    .coupon_uses_for_rule(rule, &self.cart);

                (rule.id(), uses)
            })
            .collect();

        let recurring = FrequencyAndRecurringPriceFactory.create_frequency_map(&self.cart)?;
        let snapshot = ShoppingCartTaxSnapshot::new(pricing, self.taxes.clone(), self.store.locale())?;

        Ok(PricedCart {
            snapshot,
            coupon_uses,
            recurring,
            rejected,
        })
    }
}

/// Fixture
#[derive(Debug, Clone)]
pub struct Fixture {
    /// Base path for fixture files
    base_path: PathBuf,
}

impl Fixture {
    /// Create a new fixture loader with default base path
    pub fn new() -> Self {
        Self::with_base_path("./fixtures")
    }

    /// Create a new fixture loader with custom base path
    pub fn with_base_path(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Load a cart scenario from `carts/<name>.yml`
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if it
    /// describes an invalid cart.
    pub fn load_cart(&self, name: &str) -> Result<Scenario, FixtureError> {
        let file_path = self.base_path.join("carts").join(format!("{name}.yml"));
        let contents = fs::read_to_string(&file_path)?;

        Scenario::from_yaml(&contents)
    }
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}
