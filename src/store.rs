//! Store configuration

use rusty_money::iso::{self, Currency};
use serde::{Deserialize, Deserializer, de};

use crate::calculator::TaxMode;

/// Store a cart is priced in.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StoreConfig {
    code: String,

    #[serde(deserialize_with = "deserialize_currency")]
    currency: &'static Currency,

    #[serde(default)]
    tax_inclusive: bool,

    #[serde(default = "default_locale")]
    locale: String,
}

impl StoreConfig {
    /// Create a store configuration.
    pub fn new(
        code: impl Into<String>,
        currency: &'static Currency,
        tax_inclusive: bool,
        locale: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            currency,
            tax_inclusive,
            locale: locale.into(),
        }
    }

    /// Store code.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Currency carts in this store are priced in.
    pub fn currency(&self) -> &'static Currency {
        self.currency
    }

    /// Whether catalog prices already include tax.
    pub fn is_tax_inclusive(&self) -> bool {
        self.tax_inclusive
    }

    /// Tax mode derived from [`StoreConfig::is_tax_inclusive`].
    pub fn tax_mode(&self) -> TaxMode {
        TaxMode::from_inclusive(self.tax_inclusive)
    }

    /// Locale used for tax category display names.
    pub fn locale(&self) -> &str {
        &self.locale
    }
}

fn default_locale() -> String {
    "en".to_string()
}

fn deserialize_currency<'de, D>(deserializer: D) -> Result<&'static Currency, D::Error>
where
    D: Deserializer<'de>,
{
    let code = String::deserialize(deserializer)?;

    iso::find(&code).ok_or_else(|| de::Error::custom(format!("unknown currency code {code}")))
}

#[cfg(test)]
mod tests {
    use rusty_money::iso::EUR;
    use testresult::TestResult;

    use super::*;

    #[test]
    fn deserializes_from_yaml() -> TestResult {
        let store: StoreConfig = serde_norway::from_str(
            "code: DE\ncurrency: EUR\ntax_inclusive: true\nlocale: de-DE\n",
        )?;

        assert_eq!(store.code(), "DE");
        assert_eq!(store.currency(), EUR);
        assert_eq!(store.tax_mode(), TaxMode::Inclusive);
        assert_eq!(store.locale(), "de-DE");

        Ok(())
    }

    #[test]
    fn defaults_to_exclusive_tax() -> TestResult {
        let store: StoreConfig = serde_norway::from_str("code: US\ncurrency: USD\n")?;

        assert_eq!(store.tax_mode(), TaxMode::Exclusive);
        assert_eq!(store.locale(), "en");

        Ok(())
    }

    #[test]
    fn rejects_unknown_currency() {
        let store: Result<StoreConfig, _> = serde_norway::from_str("code: XX\ncurrency: ZZZ\n");

        assert!(store.is_err());
    }
}
