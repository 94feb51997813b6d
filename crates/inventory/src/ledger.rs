//! Pure stock transition rules.
//!
//! `MovementDraft::parse` validates everything that can be checked without
//! touching storage; `plan_movement` computes the transition once the current
//! stock has been read under lock. Neither performs IO.

use thiserror::Error;

use crate::movement::{MovementKind, MAX_REASON_LEN};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StockError {
    #[error("invalid movement kind '{0}' (expected Inflow or Outflow)")]
    InvalidKind(String),

    #[error("quantity must be a positive integer, got {0}")]
    InvalidQuantity(i64),

    #[error("insufficient stock: available {available}, requested {requested}")]
    InsufficientStock { available: i64, requested: i64 },

    #[error("stock overflow: {current} + {quantity} exceeds the supported range")]
    Overflow { current: i64, quantity: i64 },

    #[error("reason exceeds {max} characters ({len})")]
    ReasonTooLong { len: usize, max: usize },
}

/// A validated movement request, not yet applied to any product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementDraft {
    pub kind: MovementKind,
    pub quantity: i64,
    pub reason: Option<String>,
}

impl MovementDraft {
    /// Validation order: kind, quantity, reason.
    pub fn parse(kind: &str, quantity: i64, reason: Option<String>) -> Result<Self, StockError> {
        let kind: MovementKind = kind.parse()?;
        if quantity <= 0 {
            return Err(StockError::InvalidQuantity(quantity));
        }
        let reason = reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());
        if let Some(r) = &reason {
            let len = r.chars().count();
            if len > MAX_REASON_LEN {
                return Err(StockError::ReasonTooLong {
                    len,
                    max: MAX_REASON_LEN,
                });
            }
        }
        Ok(Self {
            kind,
            quantity,
            reason,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockTransition {
    pub before: i64,
    pub after: i64,
}

/// Compute `S0 -> S1` for a movement against the current stock.
///
/// The result never goes below zero: an outflow larger than `current` is
/// rejected with [`StockError::InsufficientStock`].
pub fn plan_movement(current: i64, kind: MovementKind, quantity: i64) -> Result<StockTransition, StockError> {
    if quantity <= 0 {
        return Err(StockError::InvalidQuantity(quantity));
    }
    let after = match kind {
        MovementKind::Inflow => current
            .checked_add(quantity)
            .ok_or(StockError::Overflow { current, quantity })?,
        MovementKind::Outflow => {
            if quantity > current {
                return Err(StockError::InsufficientStock {
                    available: current,
                    requested: quantity,
                });
            }
            current - quantity
        }
    };
    Ok(StockTransition {
        before: current,
        after,
    })
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn draft_rejects_zero_and_negative_quantities() {
        assert_eq!(
            MovementDraft::parse("Inflow", 0, None),
            Err(StockError::InvalidQuantity(0))
        );
        assert_eq!(
            MovementDraft::parse("Inflow", -1, None),
            Err(StockError::InvalidQuantity(-1))
        );
    }

    #[test]
    fn draft_checks_kind_before_quantity() {
        assert_eq!(
            MovementDraft::parse("Adjust", 0, None),
            Err(StockError::InvalidKind("Adjust".to_string()))
        );
    }

    #[test]
    fn draft_enforces_reason_length_in_characters() {
        let ok = "ñ".repeat(MAX_REASON_LEN);
        assert!(MovementDraft::parse("Outflow", 1, Some(ok)).is_ok());

        let too_long = "x".repeat(MAX_REASON_LEN + 1);
        assert_eq!(
            MovementDraft::parse("Outflow", 1, Some(too_long)),
            Err(StockError::ReasonTooLong {
                len: MAX_REASON_LEN + 1,
                max: MAX_REASON_LEN
            })
        );
    }

    #[test]
    fn blank_reason_becomes_none() {
        let d = MovementDraft::parse("Inflow", 3, Some("   ".to_string())).unwrap();
        assert_eq!(d.reason, None);
    }

    #[test]
    fn outflow_of_exact_stock_reaches_zero() {
        let t = plan_movement(4, MovementKind::Outflow, 4).unwrap();
        assert_eq!(t, StockTransition { before: 4, after: 0 });
    }

    #[test]
    fn outflow_beyond_stock_is_rejected() {
        assert_eq!(
            plan_movement(4, MovementKind::Outflow, 10),
            Err(StockError::InsufficientStock {
                available: 4,
                requested: 10
            })
        );
    }

    #[test]
    fn inflow_overflow_is_rejected() {
        assert!(matches!(
            plan_movement(i64::MAX, MovementKind::Inflow, 1),
            Err(StockError::Overflow { .. })
        ));
    }

    proptest! {
        #[test]
        fn inflow_adds_quantity(stock in 0i64..1_000_000, q in 1i64..1_000_000) {
            let t = plan_movement(stock, MovementKind::Inflow, q).unwrap();
            prop_assert_eq!(t.before, stock);
            prop_assert_eq!(t.after, stock + q);
        }

        #[test]
        fn outflow_never_goes_negative(stock in 0i64..10_000, q in 1i64..20_000) {
            match plan_movement(stock, MovementKind::Outflow, q) {
                Ok(t) => {
                    prop_assert!(q <= stock);
                    prop_assert_eq!(t.after, stock - q);
                    prop_assert!(t.after >= 0);
                }
                Err(StockError::InsufficientStock { available, requested }) => {
                    prop_assert!(q > stock);
                    prop_assert_eq!(available, stock);
                    prop_assert_eq!(requested, q);
                }
                Err(other) => prop_assert!(false, "unexpected error: {other}"),
            }
        }

        #[test]
        fn inflow_then_outflow_restores_stock(stock in 0i64..1_000_000, q in 1i64..1_000_000) {
            let up = plan_movement(stock, MovementKind::Inflow, q).unwrap();
            let down = plan_movement(up.after, MovementKind::Outflow, q).unwrap();
            prop_assert_eq!(down.after, stock);
        }
    }
}
