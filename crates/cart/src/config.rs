//! Cart configuration.

use chrono::{DateTime, Duration, Utc};

/// Tunables for the cart core.
///
/// `product_kind` selects which catalog resolver backs `/cart/product/*`
/// routes; `owner_kind` tags authenticated owner references. A `None` TTL
/// means cart items never expire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartConfig {
    pub product_kind: String,
    pub owner_kind: String,
    pub item_ttl_minutes: Option<i64>,
}

impl Default for CartConfig {
    fn default() -> Self {
        Self {
            product_kind: "product".to_string(),
            owner_kind: "customer".to_string(),
            item_ttl_minutes: Some(60),
        }
    }
}

impl CartConfig {
    /// Read configuration from the environment, falling back to defaults.
    ///
    /// `SHOPCART_ITEM_TTL_MINUTES` accepts a positive integer, or `none`/`0`
    /// to disable expiry entirely.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let product_kind =
            std::env::var("SHOPCART_PRODUCT_KIND").unwrap_or(defaults.product_kind);
        let owner_kind = std::env::var("SHOPCART_OWNER_KIND").unwrap_or(defaults.owner_kind);

        let item_ttl_minutes = match std::env::var("SHOPCART_ITEM_TTL_MINUTES") {
            Ok(raw) if raw.eq_ignore_ascii_case("none") => None,
            Ok(raw) => match raw.parse::<i64>() {
                Ok(minutes) if minutes > 0 => Some(minutes),
                Ok(_) => None,
                Err(_) => {
                    tracing::warn!(value = %raw, "invalid SHOPCART_ITEM_TTL_MINUTES, using default");
                    defaults.item_ttl_minutes
                }
            },
            Err(_) => defaults.item_ttl_minutes,
        };

        Self {
            product_kind,
            owner_kind,
            item_ttl_minutes,
        }
    }

    pub fn with_ttl_minutes(mut self, minutes: Option<i64>) -> Self {
        self.item_ttl_minutes = minutes;
        self
    }

    /// Expiry timestamp for a row touched at `now`.
    pub fn expiry_from(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.item_ttl_minutes
            .map(|minutes| now + Duration::minutes(minutes))
    }
}
