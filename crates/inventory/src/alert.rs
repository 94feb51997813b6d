use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockella_core::{AlertId, DomainError, Entity, ProductId};

use crate::product::Product;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertKind {
    LowStock,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::LowStock => "LowStock",
        }
    }
}

impl core::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for AlertKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("lowstock") {
            Ok(AlertKind::LowStock)
        } else {
            Err(DomainError::validation(format!("unknown alert kind '{s}'")))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: AlertId,
    pub product_id: ProductId,
    pub kind: AlertKind,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub acknowledged: bool,
}

impl Alert {
    pub fn low_stock(product: &Product, now: DateTime<Utc>) -> Self {
        Self {
            id: AlertId::new(),
            product_id: product.id,
            kind: AlertKind::LowStock,
            message: format!(
                "Product '{}' is low on stock ({} <= minimum {})",
                product.name, product.stock, product.min_stock
            ),
            created_at: now,
            acknowledged: false,
        }
    }
}

impl Entity for Alert {
    type Id = AlertId;

    fn id(&self) -> AlertId {
        self.id
    }

    fn audit_label(&self) -> String {
        format!("{} alert {}", self.kind, self.id)
    }
}

/// How repeated low-stock conditions are turned into alerts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertDedup {
    /// At most one unacknowledged `LowStock` alert per product.
    #[default]
    SuppressWhileUnacknowledged,
    /// Every qualifying movement or edit raises a new alert.
    Always,
}

impl core::str::FromStr for AlertDedup {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "suppress" => Ok(AlertDedup::SuppressWhileUnacknowledged),
            "always" => Ok(AlertDedup::Always),
            other => Err(DomainError::validation(format!(
                "unknown alert dedup mode '{other}' (expected suppress or always)"
            ))),
        }
    }
}

pub fn is_low_stock(stock: i64, min_stock: i64) -> bool {
    stock <= min_stock
}

/// Alert policy: low stock, filtered through the de-duplication mode.
///
/// `has_open_alert` is whether an unacknowledged `LowStock` alert already
/// exists for the product; it is ignored under [`AlertDedup::Always`].
pub fn should_raise(stock: i64, min_stock: i64, dedup: AlertDedup, has_open_alert: bool) -> bool {
    if !is_low_stock(stock, min_stock) {
        return false;
    }
    match dedup {
        AlertDedup::Always => true,
        AlertDedup::SuppressWhileUnacknowledged => !has_open_alert,
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn threshold_is_inclusive() {
        assert!(is_low_stock(5, 5));
        assert!(!is_low_stock(6, 5));
        assert!(is_low_stock(0, 0));
    }

    #[test]
    fn suppress_mode_skips_when_an_alert_is_open() {
        assert!(should_raise(4, 5, AlertDedup::SuppressWhileUnacknowledged, false));
        assert!(!should_raise(4, 5, AlertDedup::SuppressWhileUnacknowledged, true));
    }

    #[test]
    fn always_mode_ignores_open_alerts() {
        assert!(should_raise(4, 5, AlertDedup::Always, true));
    }

    #[test]
    fn dedup_parses_config_values() {
        assert_eq!("suppress".parse::<AlertDedup>().unwrap(), AlertDedup::SuppressWhileUnacknowledged);
        assert_eq!(" ALWAYS ".parse::<AlertDedup>().unwrap(), AlertDedup::Always);
        assert!("sometimes".parse::<AlertDedup>().is_err());
    }

    proptest! {
        #[test]
        fn never_raises_above_threshold(stock in 0i64..10_000, min in 0i64..10_000, open in any::<bool>()) {
            prop_assume!(stock > min);
            prop_assert!(!should_raise(stock, min, AlertDedup::Always, open));
            prop_assert!(!should_raise(stock, min, AlertDedup::SuppressWhileUnacknowledged, open));
        }

        #[test]
        fn always_raises_at_or_below_threshold(min in 0i64..10_000, gap in 0i64..10_000, open in any::<bool>()) {
            let stock = (min - gap).max(0);
            prop_assert!(should_raise(stock, min, AlertDedup::Always, open));
        }
    }
}
