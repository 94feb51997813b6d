use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use stockella_auth::User;
use stockella_core::{AlertId, CategoryId, ConfigParamId, ProductId, UserId};
use stockella_inventory::{
    rank_category_stock, weekly_series, weekly_series_start, Alert, AlertFilter, AlertKind, AuditAction,
    AuditEntry, AuditFilter, Category, CategoryStock, ConfigParam, DashboardSummary, Movement, MovementFilter,
    Page, Product, ProductQuery, UserQuery, UNCATEGORIZED,
};

use super::r#trait::{AuditSink, InventoryStore, InventoryTx, StoreError};

#[derive(Debug, Clone, Default)]
struct InventoryState {
    products: HashMap<ProductId, Product>,
    // Append order; readers reverse for newest-first.
    movements: Vec<Movement>,
    alerts: Vec<Alert>,
    config_params: Vec<ConfigParam>,
    categories: HashMap<CategoryId, Category>,
    users: HashMap<UserId, User>,
}

/// In-memory inventory store.
///
/// Intended for tests/dev. A transaction holds the state mutex for its whole
/// lifetime and works on a staged copy, so units of work are fully serialized
/// and an uncommitted transaction leaves no trace.
#[derive(Debug, Default)]
pub struct InMemoryInventoryStore {
    state: Arc<Mutex<InventoryState>>,
    audit: RwLock<Vec<AuditEntry>>,
    #[cfg(test)]
    failing_write: RwLock<Option<&'static str>>,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the named transactional write fail with a backend error in every
    /// transaction begun afterwards.
    #[cfg(test)]
    pub(crate) fn fail_write(&self, op: &'static str) {
        if let Ok(mut slot) = self.failing_write.write() {
            *slot = Some(op);
        }
    }

    #[cfg(test)]
    fn failing_write(&self) -> Option<&'static str> {
        self.failing_write.read().ok().and_then(|slot| *slot)
    }

    #[cfg(not(test))]
    fn failing_write(&self) -> Option<&'static str> {
        None
    }
}

pub struct InMemoryTx {
    guard: Option<OwnedMutexGuard<InventoryState>>,
    staged: InventoryState,
    failing_write: Option<&'static str>,
}

impl InMemoryTx {
    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.guard.is_none() {
            return Err(StoreError::TransactionClosed);
        }
        Ok(())
    }

    fn ensure_writable(&self, op: &'static str) -> Result<(), StoreError> {
        self.ensure_open()?;
        if self.failing_write == Some(op) {
            return Err(StoreError::Backend(format!("{op} failed")));
        }
        Ok(())
    }

    fn ensure_category(&self, product: &Product) -> Result<(), StoreError> {
        match product.category_id {
            Some(c) if !self.staged.categories.contains_key(&c) => {
                Err(StoreError::Conflict(format!("category {c} does not exist")))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl InventoryTx for InMemoryTx {
    async fn lock_product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError> {
        self.ensure_open()?;
        Ok(self.staged.products.get(&id).cloned())
    }

    async fn product_code_exists(&mut self, code: &str, excluding: Option<ProductId>) -> Result<bool, StoreError> {
        self.ensure_open()?;
        Ok(self
            .staged
            .products
            .values()
            .any(|p| p.code == code && Some(p.id) != excluding))
    }

    async fn insert_product(&mut self, product: &Product) -> Result<(), StoreError> {
        self.ensure_writable("insert_product")?;
        if self.staged.products.values().any(|p| p.code == product.code) {
            return Err(StoreError::Conflict(format!("product code '{}' already exists", product.code)));
        }
        if self.staged.products.contains_key(&product.id) {
            return Err(StoreError::Conflict(format!("product {} already exists", product.id)));
        }
        self.ensure_category(product)?;
        self.staged.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn save_product(&mut self, product: &Product) -> Result<(), StoreError> {
        self.ensure_writable("save_product")?;
        if self.staged.products.values().any(|p| p.code == product.code && p.id != product.id) {
            return Err(StoreError::Conflict(format!("product code '{}' already exists", product.code)));
        }
        self.ensure_category(product)?;
        match self.staged.products.get_mut(&product.id) {
            Some(slot) => {
                *slot = product.clone();
                Ok(())
            }
            None => Err(StoreError::Backend(format!("product {} does not exist", product.id))),
        }
    }

    async fn has_movements(&mut self, id: ProductId) -> Result<bool, StoreError> {
        self.ensure_open()?;
        Ok(self.staged.movements.iter().any(|m| m.product_id == id))
    }

    async fn delete_product(&mut self, id: ProductId) -> Result<(), StoreError> {
        self.ensure_writable("delete_product")?;
        if self.staged.movements.iter().any(|m| m.product_id == id) {
            return Err(StoreError::Conflict(format!("product {id} is referenced by movements")));
        }
        self.staged.products.remove(&id);
        self.staged.alerts.retain(|a| a.product_id != id);
        Ok(())
    }

    async fn insert_movement(&mut self, movement: &Movement) -> Result<(), StoreError> {
        self.ensure_writable("insert_movement")?;
        if !self.staged.products.contains_key(&movement.product_id) {
            return Err(StoreError::Conflict(format!("product {} does not exist", movement.product_id)));
        }
        self.staged.movements.push(movement.clone());
        Ok(())
    }

    async fn has_open_alert(&mut self, product_id: ProductId, kind: AlertKind) -> Result<bool, StoreError> {
        self.ensure_open()?;
        Ok(self
            .staged
            .alerts
            .iter()
            .any(|a| a.product_id == product_id && a.kind == kind && !a.acknowledged))
    }

    async fn insert_alert(&mut self, alert: &Alert) -> Result<(), StoreError> {
        self.ensure_writable("insert_alert")?;
        self.staged.alerts.push(alert.clone());
        Ok(())
    }

    async fn lock_alert(&mut self, id: AlertId) -> Result<Option<Alert>, StoreError> {
        self.ensure_open()?;
        Ok(self.staged.alerts.iter().find(|a| a.id == id).cloned())
    }

    async fn acknowledge_alert(&mut self, id: AlertId) -> Result<(), StoreError> {
        self.ensure_writable("acknowledge_alert")?;
        if let Some(alert) = self.staged.alerts.iter_mut().find(|a| a.id == id) {
            alert.acknowledged = true;
        }
        Ok(())
    }

    async fn lock_config_param(&mut self, id: ConfigParamId) -> Result<Option<ConfigParam>, StoreError> {
        self.ensure_open()?;
        Ok(self.staged.config_params.iter().find(|c| c.id == id).cloned())
    }

    async fn config_key_exists(&mut self, key: &str, excluding: Option<ConfigParamId>) -> Result<bool, StoreError> {
        self.ensure_open()?;
        Ok(self
            .staged
            .config_params
            .iter()
            .any(|c| c.key == key && Some(c.id) != excluding))
    }

    async fn insert_config_param(&mut self, param: &ConfigParam) -> Result<(), StoreError> {
        self.ensure_writable("insert_config_param")?;
        if self.staged.config_params.iter().any(|c| c.key == param.key) {
            return Err(StoreError::Conflict(format!("parameter '{}' already exists", param.key)));
        }
        self.staged.config_params.push(param.clone());
        Ok(())
    }

    async fn save_config_param(&mut self, param: &ConfigParam) -> Result<(), StoreError> {
        self.ensure_writable("save_config_param")?;
        if self
            .staged
            .config_params
            .iter()
            .any(|c| c.key == param.key && c.id != param.id)
        {
            return Err(StoreError::Conflict(format!("parameter '{}' already exists", param.key)));
        }
        if let Some(slot) = self.staged.config_params.iter_mut().find(|c| c.id == param.id) {
            *slot = param.clone();
        }
        Ok(())
    }

    async fn delete_config_param(&mut self, id: ConfigParamId) -> Result<(), StoreError> {
        self.ensure_writable("delete_config_param")?;
        self.staged.config_params.retain(|c| c.id != id);
        Ok(())
    }

    async fn lock_category(&mut self, id: CategoryId) -> Result<Option<Category>, StoreError> {
        self.ensure_open()?;
        Ok(self.staged.categories.get(&id).cloned())
    }

    async fn category_name_exists(&mut self, name: &str, excluding: Option<CategoryId>) -> Result<bool, StoreError> {
        self.ensure_open()?;
        Ok(self
            .staged
            .categories
            .values()
            .any(|c| c.name.eq_ignore_ascii_case(name) && Some(c.id) != excluding))
    }

    async fn insert_category(&mut self, category: &Category) -> Result<(), StoreError> {
        self.ensure_writable("insert_category")?;
        if self.staged.categories.values().any(|c| c.name.eq_ignore_ascii_case(&category.name)) {
            return Err(StoreError::Conflict(format!("category '{}' already exists", category.name)));
        }
        self.staged.categories.insert(category.id, category.clone());
        Ok(())
    }

    async fn save_category(&mut self, category: &Category) -> Result<(), StoreError> {
        self.ensure_writable("save_category")?;
        if self
            .staged
            .categories
            .values()
            .any(|c| c.name.eq_ignore_ascii_case(&category.name) && c.id != category.id)
        {
            return Err(StoreError::Conflict(format!("category '{}' already exists", category.name)));
        }
        if let Some(slot) = self.staged.categories.get_mut(&category.id) {
            *slot = category.clone();
        }
        Ok(())
    }

    async fn category_in_use(&mut self, id: CategoryId) -> Result<bool, StoreError> {
        self.ensure_open()?;
        Ok(self.staged.products.values().any(|p| p.category_id == Some(id)))
    }

    async fn delete_category(&mut self, id: CategoryId) -> Result<(), StoreError> {
        self.ensure_writable("delete_category")?;
        if self.staged.products.values().any(|p| p.category_id == Some(id)) {
            return Err(StoreError::Conflict(format!("category {id} is assigned to products")));
        }
        self.staged.categories.remove(&id);
        Ok(())
    }

    async fn lock_user(&mut self, id: UserId) -> Result<Option<User>, StoreError> {
        self.ensure_open()?;
        Ok(self.staged.users.get(&id).cloned())
    }

    async fn email_exists(&mut self, email: &str, excluding: Option<UserId>) -> Result<bool, StoreError> {
        self.ensure_open()?;
        Ok(self
            .staged
            .users
            .values()
            .any(|u| u.email == email && Some(u.id) != excluding))
    }

    async fn insert_user(&mut self, user: &User) -> Result<(), StoreError> {
        self.ensure_writable("insert_user")?;
        if self.staged.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict(format!("email '{}' is already registered", user.email)));
        }
        self.staged.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn save_user(&mut self, user: &User) -> Result<(), StoreError> {
        self.ensure_writable("save_user")?;
        if self.staged.users.values().any(|u| u.email == user.email && u.id != user.id) {
            return Err(StoreError::Conflict(format!("email '{}' is already registered", user.email)));
        }
        if let Some(slot) = self.staged.users.get_mut(&user.id) {
            *slot = user.clone();
        }
        Ok(())
    }

    async fn user_has_movements(&mut self, id: UserId) -> Result<bool, StoreError> {
        self.ensure_open()?;
        Ok(self.staged.movements.iter().any(|m| m.user_id == id))
    }

    async fn delete_user(&mut self, id: UserId) -> Result<(), StoreError> {
        self.ensure_writable("delete_user")?;
        self.staged.users.remove(&id);
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        let mut guard = self.guard.take().ok_or(StoreError::TransactionClosed)?;
        *guard = std::mem::take(&mut self.staged);
        Ok(())
    }
}

#[async_trait]
impl InventoryStore for InMemoryInventoryStore {
    async fn begin(&self) -> Result<Box<dyn InventoryTx>, StoreError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(InMemoryTx {
            guard: Some(guard),
            staged,
            failing_write: self.failing_write(),
        }))
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.products.get(&id).cloned())
    }

    async fn list_products(&self, query: &ProductQuery) -> Result<Page<Product>, StoreError> {
        let state = self.state.lock().await;
        let mut matching: Vec<&Product> = state.products.values().filter(|p| query.matches(p)).collect();
        matching.sort_by(|a, b| b.registered_at.cmp(&a.registered_at).then(b.id.cmp(&a.id)));

        let total = matching.len() as u64;
        let data = matching
            .into_iter()
            .skip(usize::try_from(query.page.offset()).unwrap_or(usize::MAX))
            .take(query.page.limit() as usize)
            .cloned()
            .collect();
        Ok(Page::new(query.page, total, data))
    }

    async fn list_movements(&self, filter: &MovementFilter) -> Result<Vec<Movement>, StoreError> {
        let state = self.state.lock().await;
        let mut out: Vec<Movement> = state.movements.iter().filter(|m| filter.matches(m)).cloned().collect();
        out.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at).then(b.id.cmp(&a.id)));
        Ok(out)
    }

    async fn list_alerts(&self, filter: &AlertFilter) -> Result<Vec<Alert>, StoreError> {
        let state = self.state.lock().await;
        let mut out: Vec<Alert> = state.alerts.iter().filter(|a| filter.matches(a)).cloned().collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(out)
    }

    async fn list_audit(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>, StoreError> {
        let audit = self
            .audit
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;
        let mut out: Vec<AuditEntry> = audit.iter().filter(|e| filter.matches(e)).cloned().collect();
        out.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at).then(b.id.cmp(&a.id)));
        Ok(out)
    }

    async fn audit_counts(&self) -> Result<Vec<(AuditAction, u64)>, StoreError> {
        let audit = self
            .audit
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;
        let mut counts: HashMap<AuditAction, u64> = HashMap::new();
        for e in audit.iter() {
            *counts.entry(e.action).or_insert(0) += 1;
        }
        Ok(counts.into_iter().collect())
    }

    async fn dashboard(&self, day_start: DateTime<Utc>) -> Result<DashboardSummary, StoreError> {
        let state = self.state.lock().await;
        let products = state.products.values();

        let mut by_category: HashMap<Option<CategoryId>, i64> = HashMap::new();
        for p in products.clone() {
            *by_category.entry(p.category_id).or_insert(0) += p.stock;
        }
        let stock_by_category = by_category
            .into_iter()
            .map(|(category_id, total)| CategoryStock {
                category_id,
                category: category_id
                    .and_then(|id| state.categories.get(&id))
                    .map_or_else(|| UNCATEGORIZED.to_string(), |c| c.name.clone()),
                total,
            })
            .collect();

        let week_start = weekly_series_start(day_start);
        let weekly_movements = weekly_series(
            day_start.date_naive(),
            state
                .movements
                .iter()
                .filter(|m| m.occurred_at >= week_start)
                .map(|m| (m.occurred_at.date_naive(), m.kind, m.quantity)),
        );

        Ok(DashboardSummary {
            active_products: products.clone().filter(|p| p.active).count() as u64,
            active_users: state.users.values().filter(|u| u.active).count() as u64,
            unacknowledged_alerts: state.alerts.iter().filter(|a| !a.acknowledged).count() as u64,
            movements_today: state.movements.iter().filter(|m| m.occurred_at >= day_start).count() as u64,
            out_of_stock: products.clone().filter(|p| p.is_out_of_stock()).count() as u64,
            low_stock: products.clone().filter(|p| p.is_low_stock()).count() as u64,
            in_stock: products.filter(|p| p.stock > 0).count() as u64,
            stock_by_category: rank_category_stock(stock_by_category),
            weekly_movements,
        })
    }

    async fn list_config_params(&self) -> Result<Vec<ConfigParam>, StoreError> {
        let state = self.state.lock().await;
        let mut out = state.config_params.clone();
        out.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(out)
    }

    async fn list_categories(&self) -> Result<Vec<Category>, StoreError> {
        let state = self.state.lock().await;
        let mut out: Vec<Category> = state.categories.values().cloned().collect();
        out.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        Ok(out)
    }

    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.categories.get(&id).cloned())
    }

    async fn list_users(&self, query: &UserQuery) -> Result<Page<User>, StoreError> {
        let state = self.state.lock().await;
        let mut matching: Vec<&User> = state
            .users
            .values()
            .filter(|u| query.matches(&u.name, &u.email))
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = matching.len() as u64;
        let data = matching
            .into_iter()
            .skip(usize::try_from(query.page.offset()).unwrap_or(usize::MAX))
            .take(query.page.limit() as usize)
            .cloned()
            .collect();
        Ok(Page::new(query.page, total, data))
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }
}

#[async_trait]
impl AuditSink for InMemoryInventoryStore {
    async fn append(&self, entry: &AuditEntry) -> Result<(), StoreError> {
        let mut audit = self
            .audit
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;
        audit.push(entry.clone());
        Ok(())
    }
}
