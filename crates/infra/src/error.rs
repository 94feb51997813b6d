//! Engine error taxonomy.

use thiserror::Error;

use stockella_auth::{AuthzError, PasswordError};
use stockella_core::DomainError;
use stockella_inventory::StockError;

use crate::store::StoreError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Unknown id, or a movement against an inactive product.
    #[error("not found")]
    NotFound,

    #[error("invalid movement kind '{0}' (expected Inflow or Outflow)")]
    InvalidKind(String),

    #[error("quantity must be a positive integer, got {0}")]
    InvalidQuantity(i64),

    #[error("insufficient stock: available {available}, requested {requested}")]
    InsufficientStock { available: i64, requested: i64 },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),

    /// Unknown email, wrong password or a deactivated account.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// The unit of work failed and was rolled back.
    #[error("persistence failure: {0}")]
    Persistence(StoreError),
}

impl From<StockError> for LedgerError {
    fn from(value: StockError) -> Self {
        match value {
            StockError::InvalidKind(kind) => LedgerError::InvalidKind(kind),
            StockError::InvalidQuantity(q) => LedgerError::InvalidQuantity(q),
            StockError::InsufficientStock {
                available,
                requested,
            } => LedgerError::InsufficientStock {
                available,
                requested,
            },
            other @ (StockError::Overflow { .. } | StockError::ReasonTooLong { .. }) => {
                LedgerError::Validation(other.to_string())
            }
        }
    }
}

impl From<DomainError> for LedgerError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => LedgerError::Validation(msg),
            DomainError::InvalidId(msg) => LedgerError::Validation(msg),
            DomainError::NotFound => LedgerError::NotFound,
            DomainError::Conflict(msg) => LedgerError::Conflict(msg),
        }
    }
}

impl From<StoreError> for LedgerError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict(msg) => LedgerError::Conflict(msg),
            other => LedgerError::Persistence(other),
        }
    }
}

impl From<AuthzError> for LedgerError {
    fn from(value: AuthzError) -> Self {
        match value {
            AuthzError::Forbidden(permission) => LedgerError::Forbidden(permission),
        }
    }
}

impl From<PasswordError> for LedgerError {
    fn from(value: PasswordError) -> Self {
        match value {
            PasswordError::Hash(msg) => LedgerError::Persistence(StoreError::Backend(msg)),
            PasswordError::MalformedHash(msg) => LedgerError::Persistence(StoreError::Corrupt(msg)),
        }
    }
}
