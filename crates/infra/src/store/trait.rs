use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use stockella_auth::User;
use stockella_core::{AlertId, CategoryId, ConfigParamId, ProductId, UserId};
use stockella_inventory::{
    Alert, AlertFilter, AlertKind, AuditAction, AuditEntry, AuditFilter, Category, ConfigParam,
    DashboardSummary, Movement, MovementFilter, Page, Product, ProductQuery, UserQuery,
};

/// Store operation error.
///
/// These are **infrastructure errors**; business rejections are decided by the
/// engine before anything reaches the store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A uniqueness or referential constraint rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A stored row could not be decoded into its domain type.
    #[error("corrupt row: {0}")]
    Corrupt(String),

    /// The transaction was already committed or rolled back.
    #[error("transaction is no longer active")]
    TransactionClosed,

    #[error("backend error: {0}")]
    Backend(String),
}

/// A single unit of work.
///
/// Implementations serialize concurrent writers per product: `lock_product`
/// holds the product until the transaction ends.
#[async_trait]
pub trait InventoryTx: Send {
    /// Load a product and hold its lock for the rest of the transaction.
    async fn lock_product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError>;

    async fn product_code_exists(&mut self, code: &str, excluding: Option<ProductId>) -> Result<bool, StoreError>;

    async fn insert_product(&mut self, product: &Product) -> Result<(), StoreError>;

    /// Overwrite every mutable column of an existing product.
    async fn save_product(&mut self, product: &Product) -> Result<(), StoreError>;

    async fn has_movements(&mut self, id: ProductId) -> Result<bool, StoreError>;

    /// Remove a product and its alerts.
    async fn delete_product(&mut self, id: ProductId) -> Result<(), StoreError>;

    async fn insert_movement(&mut self, movement: &Movement) -> Result<(), StoreError>;

    /// Whether an unacknowledged alert of `kind` exists for the product.
    async fn has_open_alert(&mut self, product_id: ProductId, kind: AlertKind) -> Result<bool, StoreError>;

    async fn insert_alert(&mut self, alert: &Alert) -> Result<(), StoreError>;

    async fn lock_alert(&mut self, id: AlertId) -> Result<Option<Alert>, StoreError>;

    async fn acknowledge_alert(&mut self, id: AlertId) -> Result<(), StoreError>;

    async fn lock_config_param(&mut self, id: ConfigParamId) -> Result<Option<ConfigParam>, StoreError>;

    async fn config_key_exists(&mut self, key: &str, excluding: Option<ConfigParamId>) -> Result<bool, StoreError>;

    async fn insert_config_param(&mut self, param: &ConfigParam) -> Result<(), StoreError>;

    async fn save_config_param(&mut self, param: &ConfigParam) -> Result<(), StoreError>;

    async fn delete_config_param(&mut self, id: ConfigParamId) -> Result<(), StoreError>;

    async fn lock_category(&mut self, id: CategoryId) -> Result<Option<Category>, StoreError>;

    /// Case-insensitive.
    async fn category_name_exists(&mut self, name: &str, excluding: Option<CategoryId>) -> Result<bool, StoreError>;

    async fn insert_category(&mut self, category: &Category) -> Result<(), StoreError>;

    async fn save_category(&mut self, category: &Category) -> Result<(), StoreError>;

    /// Whether any product is assigned to the category.
    async fn category_in_use(&mut self, id: CategoryId) -> Result<bool, StoreError>;

    async fn delete_category(&mut self, id: CategoryId) -> Result<(), StoreError>;

    async fn lock_user(&mut self, id: UserId) -> Result<Option<User>, StoreError>;

    /// `email` is already normalized.
    async fn email_exists(&mut self, email: &str, excluding: Option<UserId>) -> Result<bool, StoreError>;

    async fn insert_user(&mut self, user: &User) -> Result<(), StoreError>;

    /// Overwrite every mutable column, the password hash included.
    async fn save_user(&mut self, user: &User) -> Result<(), StoreError>;

    /// Whether the user recorded any movement.
    async fn user_has_movements(&mut self, id: UserId) -> Result<bool, StoreError>;

    async fn delete_user(&mut self, id: UserId) -> Result<(), StoreError>;

    /// Make every staged write visible atomically.
    async fn commit(&mut self) -> Result<(), StoreError>;
}

/// Transaction factory plus the read side.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn InventoryTx>, StoreError>;

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError>;

    /// Newest registration first.
    async fn list_products(&self, query: &ProductQuery) -> Result<Page<Product>, StoreError>;

    /// Newest first.
    async fn list_movements(&self, filter: &MovementFilter) -> Result<Vec<Movement>, StoreError>;

    /// Newest first.
    async fn list_alerts(&self, filter: &AlertFilter) -> Result<Vec<Alert>, StoreError>;

    /// Newest first.
    async fn list_audit(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>, StoreError>;

    async fn audit_counts(&self) -> Result<Vec<(AuditAction, u64)>, StoreError>;

    /// Dashboard figures for the UTC day starting at `day_start`; the weekly
    /// series ends on that day.
    async fn dashboard(&self, day_start: DateTime<Utc>) -> Result<DashboardSummary, StoreError>;

    /// Ordered by key.
    async fn list_config_params(&self) -> Result<Vec<ConfigParam>, StoreError>;

    /// Ordered by name.
    async fn list_categories(&self) -> Result<Vec<Category>, StoreError>;

    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>, StoreError>;

    /// Newest account first.
    async fn list_users(&self, query: &UserQuery) -> Result<Page<User>, StoreError>;

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError>;

    /// `email` is already normalized.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
}

/// Append-only destination for audit entries, written outside any transaction.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, entry: &AuditEntry) -> Result<(), StoreError>;
}
