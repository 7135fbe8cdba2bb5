//! Billing frequency

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unit of a recurring billing frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrequencyUnit {
    /// Days
    Day,

    /// Weeks
    Week,

    /// Months
    Month,

    /// Years
    Year,
}

impl FrequencyUnit {
    fn label(self, plural: bool) -> &'static str {
        match (self, plural) {
            (FrequencyUnit::Day, false) => "day",
            (FrequencyUnit::Day, true) => "days",
            (FrequencyUnit::Week, false) => "week",
            (FrequencyUnit::Week, true) => "weeks",
            (FrequencyUnit::Month, false) => "month",
            (FrequencyUnit::Month, true) => "months",
            (FrequencyUnit::Year, false) => "year",
            (FrequencyUnit::Year, true) => "years",
        }
    }
}

/// An amount/unit pair such as "every 2 weeks".
///
/// Only used as an aggregation key, never for arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Quantity {
    amount: u32,
    unit: FrequencyUnit,
}

impl Quantity {
    /// Create a new frequency.
    pub const fn new(amount: u32, unit: FrequencyUnit) -> Self {
        Self { amount, unit }
    }

    /// Number of units between billings.
    pub const fn amount(&self) -> u32 {
        self.amount
    }

    /// Unit of the frequency.
    pub const fn unit(&self) -> FrequencyUnit {
        self.unit
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.amount == 1 {
            write!(f, "every {}", self.unit.label(false))
        } else {
            write!(f, "every {} {}", self.amount, self.unit.label(true))
        }
    }
}
