//! Persistence boundary for the stock ledger.
//!
//! Writes go through an [`InventoryTx`] unit of work obtained from
//! [`InventoryStore::begin`]; nothing a transaction stages is visible until
//! `commit` succeeds, and dropping an uncommitted transaction discards it.
//! Reads run directly against the store.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryInventoryStore;
pub use postgres::PostgresInventoryStore;
pub use r#trait::{AuditSink, InventoryStore, InventoryTx, StoreError};
