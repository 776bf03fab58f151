use rust_decimal::Decimal;
use std::str::FromStr;
use std::time::Duration;

use crate::checkout::CheckoutSettings;
use crate::domain::money::round_currency;
use crate::domain::order::OrderCharges;
use crate::utils::{CircuitBreakerConfig, RetryConfig};

// ============================================================================
// Configuration
// ============================================================================
//
// Read from STOREFRONT_* environment variables. Every value has a default;
// a value that is set but cannot be parsed is an error rather than silently
// falling back.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct StorefrontConfig {
    pub base_url: String,
    pub currency: String,
    pub metrics_port: u16,
    pub breaker_failure_threshold: u32,
    pub breaker_open_timeout: Duration,
    pub breaker_success_threshold: u32,
    pub retry_attempts: u32,
    pub default_shipping_cost: Decimal,
    /// Fraction of the discounted subtotal, e.g. `0.08`
    pub tax_rate: Decimal,
}

impl Default for StorefrontConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            currency: "usd".to_string(),
            metrics_port: 9090,
            breaker_failure_threshold: 5,
            breaker_open_timeout: Duration::from_secs(30),
            breaker_success_threshold: 2,
            retry_attempts: 3,
            default_shipping_cost: Decimal::ZERO,
            tax_rate: Decimal::ZERO,
        }
    }
}

impl StorefrontConfig {
    /// Load from the process environment. Call `dotenvy::dotenv()` first to
    /// pick up a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to something unparseable or out
    /// of range.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            base_url: lookup("STOREFRONT_BASE_URL").unwrap_or(defaults.base_url),
            currency: lookup("STOREFRONT_CURRENCY")
                .map(|c| c.to_lowercase())
                .unwrap_or(defaults.currency),
            metrics_port: parse_var(&lookup, "STOREFRONT_METRICS_PORT", defaults.metrics_port)?,
            breaker_failure_threshold: parse_var(
                &lookup,
                "STOREFRONT_BREAKER_FAILURE_THRESHOLD",
                defaults.breaker_failure_threshold,
            )?,
            breaker_open_timeout: Duration::from_secs(parse_var(
                &lookup,
                "STOREFRONT_BREAKER_OPEN_TIMEOUT_SECS",
                defaults.breaker_open_timeout.as_secs(),
            )?),
            breaker_success_threshold: parse_var(
                &lookup,
                "STOREFRONT_BREAKER_SUCCESS_THRESHOLD",
                defaults.breaker_success_threshold,
            )?,
            retry_attempts: parse_var(&lookup, "STOREFRONT_RETRY_ATTEMPTS", defaults.retry_attempts)?,
            default_shipping_cost: parse_var(
                &lookup,
                "STOREFRONT_DEFAULT_SHIPPING_COST",
                defaults.default_shipping_cost,
            )?,
            tax_rate: parse_var(&lookup, "STOREFRONT_TAX_RATE", defaults.tax_rate)?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::EmptyValue("STOREFRONT_BASE_URL".to_string()));
        }
        if self.currency.len() != 3 {
            return Err(invalid("STOREFRONT_CURRENCY", &self.currency));
        }
        if self.breaker_failure_threshold == 0 {
            return Err(invalid("STOREFRONT_BREAKER_FAILURE_THRESHOLD", "0"));
        }
        if self.retry_attempts == 0 {
            return Err(invalid("STOREFRONT_RETRY_ATTEMPTS", "0"));
        }
        if self.default_shipping_cost.is_sign_negative() {
            return Err(invalid(
                "STOREFRONT_DEFAULT_SHIPPING_COST",
                &self.default_shipping_cost.to_string(),
            ));
        }
        if self.tax_rate.is_sign_negative() || self.tax_rate >= Decimal::ONE {
            return Err(invalid("STOREFRONT_TAX_RATE", &self.tax_rate.to_string()));
        }
        Ok(())
    }

    pub fn circuit_breaker(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.breaker_failure_threshold,
            open_timeout: self.breaker_open_timeout,
            success_threshold: self.breaker_success_threshold,
        }
    }

    pub fn retry(&self) -> RetryConfig {
        RetryConfig::with_max_attempts(self.retry_attempts)
    }

    pub fn checkout_settings(&self) -> CheckoutSettings {
        CheckoutSettings {
            base_url: self.base_url.clone(),
            currency: self.currency.clone(),
        }
    }

    /// Tax and shipping for an order whose discounted subtotal is `taxable`.
    pub fn charges_for(&self, taxable: Decimal) -> OrderCharges {
        OrderCharges {
            tax: round_currency(taxable.max(Decimal::ZERO) * self.tax_rate),
            shipping_cost: self.default_shipping_cost,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },

    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| invalid(key, &raw)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<StorefrontConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        StorefrontConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_nothing_is_set() {
        let config = config_from(&[]).unwrap();

        assert_eq!(config, StorefrontConfig::default());
        assert_eq!(config.retry().max_attempts, 3);
    }

    #[test]
    fn test_overrides_are_parsed() {
        let config = config_from(&[
            ("STOREFRONT_BASE_URL", "https://shop.example"),
            ("STOREFRONT_CURRENCY", "EUR"),
            ("STOREFRONT_METRICS_PORT", "9191"),
            ("STOREFRONT_BREAKER_OPEN_TIMEOUT_SECS", "5"),
            ("STOREFRONT_DEFAULT_SHIPPING_COST", "4.99"),
            ("STOREFRONT_TAX_RATE", "0.08"),
        ])
        .unwrap();

        assert_eq!(config.currency, "eur");
        assert_eq!(config.metrics_port, 9191);
        assert_eq!(config.circuit_breaker().open_timeout, Duration::from_secs(5));
        assert_eq!(config.default_shipping_cost, Decimal::new(499, 2));
        assert_eq!(config.checkout_settings().base_url, "https://shop.example");
    }

    #[test]
    fn test_unparseable_number_is_rejected() {
        let error = config_from(&[("STOREFRONT_METRICS_PORT", "ninety")]).unwrap_err();

        assert!(matches!(
            error,
            ConfigError::InvalidValue { ref key, .. } if key == "STOREFRONT_METRICS_PORT"
        ));
    }

    #[test]
    fn test_out_of_range_values_are_rejected() {
        assert!(config_from(&[("STOREFRONT_TAX_RATE", "1.5")]).is_err());
        assert!(config_from(&[("STOREFRONT_RETRY_ATTEMPTS", "0")]).is_err());
        assert!(config_from(&[("STOREFRONT_BASE_URL", "  ")]).is_err());
    }

    #[test]
    fn test_charges_round_tax_to_cents() {
        let config = config_from(&[
            ("STOREFRONT_TAX_RATE", "0.0825"),
            ("STOREFRONT_DEFAULT_SHIPPING_COST", "5"),
        ])
        .unwrap();

        let charges = config.charges_for(Decimal::new(1999, 2));

        // 19.99 * 0.0825 = 1.649175
        assert_eq!(charges.tax, Decimal::new(165, 2));
        assert_eq!(charges.shipping_cost, Decimal::new(5, 0));
    }
}
