//! Inventory domain module.
//!
//! This crate contains business rules for the stock ledger, implemented purely
//! as deterministic domain logic (no IO, no HTTP, no storage). Persistence and
//! transaction boundaries live in `stockella-infra`.

pub mod alert;
pub mod audit;
pub mod category;
pub mod config_param;
pub mod ledger;
pub mod movement;
pub mod product;
pub mod query;

pub use alert::{Alert, AlertDedup, AlertKind};
pub use audit::{AuditAction, AuditEntry, AuditSummary};
pub use category::{Category, CategoryPatch, NewCategory, UNCATEGORIZED};
pub use config_param::{ConfigParam, ConfigParamPatch, NewConfigParam};
pub use ledger::{plan_movement, MovementDraft, StockError, StockTransition};
pub use movement::{Movement, MovementKind, MAX_REASON_LEN};
pub use product::{NewProduct, Product, ProductPatch};
pub use query::{
    rank_category_stock, weekly_series, weekly_series_start, AlertFilter, AuditFilter, CategoryStock,
    DailyMovements, DashboardSummary, MovementFilter, Page, PageRequest, ProductQuery, UserQuery,
    DEFAULT_USER_PAGE_LIMIT,
};
