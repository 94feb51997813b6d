//! Infrastructure layer: persistence adapters, the stock ledger engine and
//! the services built on it.

pub mod alerts;
pub mod audit;
pub mod audit_log;
pub mod catalog;
pub mod categories;
pub mod config_params;
pub mod dashboard;
pub mod error;
pub mod ledger_engine;
pub mod store;
pub mod users;


pub use audit::AuditRecorder;
pub use catalog::ProductChange;
pub use error::LedgerError;
pub use ledger_engine::{LedgerConfig, LedgerEngine, MovementReceipt, MovementResult};
pub use users::BootstrapAdmin;
pub use store::{AuditSink, InMemoryInventoryStore, InventoryStore, InventoryTx, PostgresInventoryStore, StoreError};
