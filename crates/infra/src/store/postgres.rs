//! Postgres-backed inventory store.
//!
//! ## Locking
//!
//! `lock_product` issues `SELECT … FOR UPDATE`, so concurrent movements on the
//! same product queue behind the first transaction until it commits or rolls
//! back. Dropping a [`PostgresTx`] without committing rolls it back.
//!
//! ## Error Mapping
//!
//! | PostgreSQL Error Code | StoreError | Scenario |
//! |----------------------|------------|----------|
//! | `23505` | `Conflict` | Duplicate product code, parameter key, category name or email |
//! | `23503` | `Conflict` | Product still referenced by movements; category still assigned |
//! | Any other / non-database | `Backend` | Connection failures, check violations, etc. |

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{FromRow, PgConnection, Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use stockella_auth::{Role, User};
use stockella_core::{AlertId, CategoryId, ConfigParamId, ProductId, UserId};
use stockella_inventory::{
    rank_category_stock, weekly_series, weekly_series_start, Alert, AlertFilter, AlertKind, AuditAction,
    AuditEntry, AuditFilter, Category, CategoryStock, ConfigParam, DashboardSummary, Movement, MovementFilter,
    MovementKind, Page, Product, ProductQuery, UserQuery, UNCATEGORIZED,
};

use super::r#trait::{AuditSink, InventoryStore, InventoryTx, StoreError};

const SCHEMA: &str = include_str!("schema.sql");

const PRODUCT_COLUMNS: &str =
    "id, code, name, description, price, stock, min_stock, unit, active, registered_at, category_id";
const MOVEMENT_COLUMNS: &str =
    "id, product_id, user_id, kind, quantity, reason, stock_before, stock_after, occurred_at";
const ALERT_COLUMNS: &str = "id, product_id, kind, message, created_at, acknowledged";
const USER_COLUMNS: &str = "id, name, email, role, active, created_at, password_hash";

#[derive(Debug, Clone)]
pub struct PostgresInventoryStore {
    pool: PgPool,
}

impl PostgresInventoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Apply the schema. Safe to run on every startup.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }
}

pub struct PostgresTx {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PostgresTx {
    fn conn(&mut self) -> Result<&mut PgConnection, StoreError> {
        self.tx.as_deref_mut().ok_or(StoreError::TransactionClosed)
    }
}

#[async_trait]
impl InventoryTx for PostgresTx {
    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn lock_product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 FOR UPDATE");
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id.as_uuid())
            .fetch_optional(self.conn()?)
            .await
            .map_err(|e| map_sqlx_error("lock_product", e))?;
        Ok(row.map(Product::from))
    }

    async fn product_code_exists(&mut self, code: &str, excluding: Option<ProductId>) -> Result<bool, StoreError> {
        let row = sqlx::query(
            "SELECT EXISTS (SELECT 1 FROM products WHERE code = $1 AND ($2::uuid IS NULL OR id <> $2)) AS taken",
        )
        .bind(code)
        .bind(opt_uuid(excluding))
        .fetch_one(self.conn()?)
        .await
        .map_err(|e| map_sqlx_error("product_code_exists", e))?;
        row.try_get("taken").map_err(|e| map_sqlx_error("product_code_exists", e))
    }

    async fn insert_product(&mut self, p: &Product) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO products (id, code, name, description, price, stock, min_stock, unit, active, registered_at, category_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(p.id.as_uuid())
        .bind(&p.code)
        .bind(&p.name)
        .bind(&p.description)
        .bind(p.price)
        .bind(p.stock)
        .bind(p.min_stock)
        .bind(&p.unit)
        .bind(p.active)
        .bind(p.registered_at)
        .bind(opt_uuid(p.category_id))
        .execute(self.conn()?)
        .await
        .map_err(|e| map_sqlx_error("insert_product", e))?;
        Ok(())
    }

    async fn save_product(&mut self, p: &Product) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE products
            SET code = $2, name = $3, description = $4, price = $5, stock = $6,
                min_stock = $7, unit = $8, active = $9, category_id = $10
            WHERE id = $1
            "#,
        )
        .bind(p.id.as_uuid())
        .bind(&p.code)
        .bind(&p.name)
        .bind(&p.description)
        .bind(p.price)
        .bind(p.stock)
        .bind(p.min_stock)
        .bind(&p.unit)
        .bind(p.active)
        .bind(opt_uuid(p.category_id))
        .execute(self.conn()?)
        .await
        .map_err(|e| map_sqlx_error("save_product", e))?;
        Ok(())
    }

    async fn has_movements(&mut self, id: ProductId) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT EXISTS (SELECT 1 FROM movements WHERE product_id = $1) AS used")
            .bind(id.as_uuid())
            .fetch_one(self.conn()?)
            .await
            .map_err(|e| map_sqlx_error("has_movements", e))?;
        row.try_get("used").map_err(|e| map_sqlx_error("has_movements", e))
    }

    async fn delete_product(&mut self, id: ProductId) -> Result<(), StoreError> {
        // Alerts cascade; movements restrict (23503 -> Conflict).
        sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .execute(self.conn()?)
            .await
            .map_err(|e| map_sqlx_error("delete_product", e))?;
        Ok(())
    }

    #[instrument(skip(self, m), fields(movement_id = %m.id, product_id = %m.product_id), err)]
    async fn insert_movement(&mut self, m: &Movement) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO movements (id, product_id, user_id, kind, quantity, reason, stock_before, stock_after, occurred_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(m.id.as_uuid())
        .bind(m.product_id.as_uuid())
        .bind(m.user_id.as_uuid())
        .bind(m.kind.as_str())
        .bind(m.quantity)
        .bind(&m.reason)
        .bind(m.stock_before)
        .bind(m.stock_after)
        .bind(m.occurred_at)
        .execute(self.conn()?)
        .await
        .map_err(|e| map_sqlx_error("insert_movement", e))?;
        Ok(())
    }

    async fn has_open_alert(&mut self, product_id: ProductId, kind: AlertKind) -> Result<bool, StoreError> {
        let row = sqlx::query(
            "SELECT EXISTS (SELECT 1 FROM alerts WHERE product_id = $1 AND kind = $2 AND NOT acknowledged) AS open",
        )
        .bind(product_id.as_uuid())
        .bind(kind.as_str())
        .fetch_one(self.conn()?)
        .await
        .map_err(|e| map_sqlx_error("has_open_alert", e))?;
        row.try_get("open").map_err(|e| map_sqlx_error("has_open_alert", e))
    }

    async fn insert_alert(&mut self, a: &Alert) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO alerts (id, product_id, kind, message, created_at, acknowledged)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(a.id.as_uuid())
        .bind(a.product_id.as_uuid())
        .bind(a.kind.as_str())
        .bind(&a.message)
        .bind(a.created_at)
        .bind(a.acknowledged)
        .execute(self.conn()?)
        .await
        .map_err(|e| map_sqlx_error("insert_alert", e))?;
        Ok(())
    }

    async fn lock_alert(&mut self, id: AlertId) -> Result<Option<Alert>, StoreError> {
        let sql = format!("SELECT {ALERT_COLUMNS} FROM alerts WHERE id = $1 FOR UPDATE");
        let row = sqlx::query_as::<_, AlertRow>(&sql)
            .bind(id.as_uuid())
            .fetch_optional(self.conn()?)
            .await
            .map_err(|e| map_sqlx_error("lock_alert", e))?;
        row.map(Alert::try_from).transpose()
    }

    async fn acknowledge_alert(&mut self, id: AlertId) -> Result<(), StoreError> {
        sqlx::query("UPDATE alerts SET acknowledged = TRUE WHERE id = $1")
            .bind(id.as_uuid())
            .execute(self.conn()?)
            .await
            .map_err(|e| map_sqlx_error("acknowledge_alert", e))?;
        Ok(())
    }

    async fn lock_config_param(&mut self, id: ConfigParamId) -> Result<Option<ConfigParam>, StoreError> {
        let row = sqlx::query_as::<_, ConfigParamRow>(
            "SELECT id, key, value, description FROM config_params WHERE id = $1 FOR UPDATE",
        )
        .bind(id.as_uuid())
        .fetch_optional(self.conn()?)
        .await
        .map_err(|e| map_sqlx_error("lock_config_param", e))?;
        Ok(row.map(ConfigParam::from))
    }

    async fn config_key_exists(&mut self, key: &str, excluding: Option<ConfigParamId>) -> Result<bool, StoreError> {
        let row = sqlx::query(
            "SELECT EXISTS (SELECT 1 FROM config_params WHERE key = $1 AND ($2::uuid IS NULL OR id <> $2)) AS taken",
        )
        .bind(key)
        .bind(opt_uuid(excluding))
        .fetch_one(self.conn()?)
        .await
        .map_err(|e| map_sqlx_error("config_key_exists", e))?;
        row.try_get("taken").map_err(|e| map_sqlx_error("config_key_exists", e))
    }

    async fn insert_config_param(&mut self, c: &ConfigParam) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO config_params (id, key, value, description) VALUES ($1, $2, $3, $4)")
            .bind(c.id.as_uuid())
            .bind(&c.key)
            .bind(&c.value)
            .bind(&c.description)
            .execute(self.conn()?)
            .await
            .map_err(|e| map_sqlx_error("insert_config_param", e))?;
        Ok(())
    }

    async fn save_config_param(&mut self, c: &ConfigParam) -> Result<(), StoreError> {
        sqlx::query("UPDATE config_params SET key = $2, value = $3, description = $4 WHERE id = $1")
            .bind(c.id.as_uuid())
            .bind(&c.key)
            .bind(&c.value)
            .bind(&c.description)
            .execute(self.conn()?)
            .await
            .map_err(|e| map_sqlx_error("save_config_param", e))?;
        Ok(())
    }

    async fn delete_config_param(&mut self, id: ConfigParamId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM config_params WHERE id = $1")
            .bind(id.as_uuid())
            .execute(self.conn()?)
            .await
            .map_err(|e| map_sqlx_error("delete_config_param", e))?;
        Ok(())
    }

    async fn lock_category(&mut self, id: CategoryId) -> Result<Option<Category>, StoreError> {
        let row = sqlx::query_as::<_, CategoryRow>("SELECT id, name, description FROM categories WHERE id = $1 FOR UPDATE")
            .bind(id.as_uuid())
            .fetch_optional(self.conn()?)
            .await
            .map_err(|e| map_sqlx_error("lock_category", e))?;
        Ok(row.map(Category::from))
    }

    async fn category_name_exists(&mut self, name: &str, excluding: Option<CategoryId>) -> Result<bool, StoreError> {
        let row = sqlx::query(
            "SELECT EXISTS (SELECT 1 FROM categories WHERE lower(name) = lower($1) AND ($2::uuid IS NULL OR id <> $2)) AS taken",
        )
        .bind(name)
        .bind(opt_uuid(excluding))
        .fetch_one(self.conn()?)
        .await
        .map_err(|e| map_sqlx_error("category_name_exists", e))?;
        row.try_get("taken").map_err(|e| map_sqlx_error("category_name_exists", e))
    }

    async fn insert_category(&mut self, c: &Category) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO categories (id, name, description) VALUES ($1, $2, $3)")
            .bind(c.id.as_uuid())
            .bind(&c.name)
            .bind(&c.description)
            .execute(self.conn()?)
            .await
            .map_err(|e| map_sqlx_error("insert_category", e))?;
        Ok(())
    }

    async fn save_category(&mut self, c: &Category) -> Result<(), StoreError> {
        sqlx::query("UPDATE categories SET name = $2, description = $3 WHERE id = $1")
            .bind(c.id.as_uuid())
            .bind(&c.name)
            .bind(&c.description)
            .execute(self.conn()?)
            .await
            .map_err(|e| map_sqlx_error("save_category", e))?;
        Ok(())
    }

    async fn category_in_use(&mut self, id: CategoryId) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT EXISTS (SELECT 1 FROM products WHERE category_id = $1) AS used")
            .bind(id.as_uuid())
            .fetch_one(self.conn()?)
            .await
            .map_err(|e| map_sqlx_error("category_in_use", e))?;
        row.try_get("used").map_err(|e| map_sqlx_error("category_in_use", e))
    }

    async fn delete_category(&mut self, id: CategoryId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id.as_uuid())
            .execute(self.conn()?)
            .await
            .map_err(|e| map_sqlx_error("delete_category", e))?;
        Ok(())
    }

    async fn lock_user(&mut self, id: UserId) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 FOR UPDATE");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id.as_uuid())
            .fetch_optional(self.conn()?)
            .await
            .map_err(|e| map_sqlx_error("lock_user", e))?;
        row.map(User::try_from).transpose()
    }

    async fn email_exists(&mut self, email: &str, excluding: Option<UserId>) -> Result<bool, StoreError> {
        let row = sqlx::query(
            "SELECT EXISTS (SELECT 1 FROM users WHERE email = $1 AND ($2::uuid IS NULL OR id <> $2)) AS taken",
        )
        .bind(email)
        .bind(opt_uuid(excluding))
        .fetch_one(self.conn()?)
        .await
        .map_err(|e| map_sqlx_error("email_exists", e))?;
        row.try_get("taken").map_err(|e| map_sqlx_error("email_exists", e))
    }

    #[instrument(skip(self, u), fields(user_id = %u.id), err)]
    async fn insert_user(&mut self, u: &User) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, role, active, created_at, password_hash)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(u.id.as_uuid())
        .bind(&u.name)
        .bind(&u.email)
        .bind(u.role.as_str())
        .bind(u.active)
        .bind(u.created_at)
        .bind(&u.password_hash)
        .execute(self.conn()?)
        .await
        .map_err(|e| map_sqlx_error("insert_user", e))?;
        Ok(())
    }

    async fn save_user(&mut self, u: &User) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE users SET name = $2, email = $3, role = $4, active = $5, password_hash = $6 WHERE id = $1",
        )
        .bind(u.id.as_uuid())
        .bind(&u.name)
        .bind(&u.email)
        .bind(u.role.as_str())
        .bind(u.active)
        .bind(&u.password_hash)
        .execute(self.conn()?)
        .await
        .map_err(|e| map_sqlx_error("save_user", e))?;
        Ok(())
    }

    async fn user_has_movements(&mut self, id: UserId) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT EXISTS (SELECT 1 FROM movements WHERE user_id = $1) AS used")
            .bind(id.as_uuid())
            .fetch_one(self.conn()?)
            .await
            .map_err(|e| map_sqlx_error("user_has_movements", e))?;
        row.try_get("used").map_err(|e| map_sqlx_error("user_has_movements", e))
    }

    async fn delete_user(&mut self, id: UserId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id.as_uuid())
            .execute(self.conn()?)
            .await
            .map_err(|e| map_sqlx_error("delete_user", e))?;
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        let tx = self.tx.take().ok_or(StoreError::TransactionClosed)?;
        tx.commit().await.map_err(|e| map_sqlx_error("commit_transaction", e))
    }
}

#[async_trait]
impl InventoryStore for PostgresInventoryStore {
    async fn begin(&self) -> Result<Box<dyn InventoryTx>, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(Box::new(PostgresTx { tx: Some(tx) }))
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_product", e))?;
        Ok(row.map(Product::from))
    }

    #[instrument(skip(self, query), err)]
    async fn list_products(&self, query: &ProductQuery) -> Result<Page<Product>, StoreError> {
        let search = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty());
        const MATCH: &str = "($1::text IS NULL OR strpos(lower(name), lower($1)) > 0) \
                             AND ($2::uuid IS NULL OR category_id = $2)";

        let total: i64 = sqlx::query(&format!("SELECT COUNT(*) AS n FROM products WHERE {MATCH}"))
            .bind(search)
            .bind(opt_uuid(query.category))
            .fetch_one(&self.pool)
            .await
            .and_then(|row| row.try_get("n"))
            .map_err(|e| map_sqlx_error("count_products", e))?;

        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE {MATCH} \
             ORDER BY registered_at DESC, id DESC LIMIT $3 OFFSET $4"
        );
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(search)
            .bind(opt_uuid(query.category))
            .bind(i64::from(query.page.limit()))
            .bind(i64::try_from(query.page.offset()).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_products", e))?;

        let data = rows.into_iter().map(Product::from).collect();
        Ok(Page::new(query.page, total.max(0) as u64, data))
    }

    #[instrument(skip(self, filter), err)]
    async fn list_movements(&self, filter: &MovementFilter) -> Result<Vec<Movement>, StoreError> {
        let sql = format!(
            "SELECT {MOVEMENT_COLUMNS} FROM movements \
             WHERE ($1::text IS NULL OR kind = $1) \
               AND ($2::uuid IS NULL OR product_id = $2) \
               AND ($3::timestamptz IS NULL OR occurred_at >= $3) \
               AND ($4::timestamptz IS NULL OR occurred_at <= $4) \
             ORDER BY occurred_at DESC, id DESC"
        );
        let rows = sqlx::query_as::<_, MovementRow>(&sql)
            .bind(filter.kind.map(|k| k.as_str()))
            .bind(opt_uuid(filter.product_id))
            .bind(filter.from)
            .bind(filter.to)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_movements", e))?;
        rows.into_iter().map(Movement::try_from).collect()
    }

    async fn list_alerts(&self, filter: &AlertFilter) -> Result<Vec<Alert>, StoreError> {
        let sql = format!(
            "SELECT {ALERT_COLUMNS} FROM alerts \
             WHERE ($1::text IS NULL OR kind = $1) \
               AND ($2::boolean IS NULL OR acknowledged = $2) \
             ORDER BY created_at DESC, id DESC"
        );
        let rows = sqlx::query_as::<_, AlertRow>(&sql)
            .bind(filter.kind.map(|k| k.as_str()))
            .bind(filter.acknowledged)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_alerts", e))?;
        rows.into_iter().map(Alert::try_from).collect()
    }

    async fn list_audit(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>, StoreError> {
        let rows = sqlx::query_as::<_, AuditEntryRow>(
            r#"
            SELECT id, user_id, action, detail, recorded_at
            FROM audit_entries
            WHERE ($1::uuid IS NULL OR user_id = $1)
              AND ($2::text IS NULL OR action = $2)
              AND ($3::text IS NULL OR strpos(lower(detail), lower($3)) > 0)
            ORDER BY recorded_at DESC, id DESC
            "#,
        )
        .bind(opt_uuid(filter.user_id))
        .bind(filter.action.map(|a| a.as_str()))
        .bind(filter.detail.as_deref())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_audit", e))?;
        rows.into_iter().map(AuditEntry::try_from).collect()
    }

    async fn audit_counts(&self) -> Result<Vec<(AuditAction, u64)>, StoreError> {
        let rows = sqlx::query("SELECT action, COUNT(*) AS n FROM audit_entries GROUP BY action")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("audit_counts", e))?;

        let mut counts = Vec::with_capacity(rows.len());
        for row in rows {
            let action: String = row.try_get("action").map_err(|e| map_sqlx_error("audit_counts", e))?;
            let n: i64 = row.try_get("n").map_err(|e| map_sqlx_error("audit_counts", e))?;
            let action = action
                .parse::<AuditAction>()
                .map_err(|e| StoreError::Corrupt(e.to_string()))?;
            counts.push((action, n.max(0) as u64));
        }
        Ok(counts)
    }

    #[instrument(skip(self), err)]
    async fn dashboard(&self, day_start: DateTime<Utc>) -> Result<DashboardSummary, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM products WHERE active)               AS active_products,
                (SELECT COUNT(*) FROM users WHERE active)                  AS active_users,
                (SELECT COUNT(*) FROM alerts WHERE NOT acknowledged)       AS unacknowledged_alerts,
                (SELECT COUNT(*) FROM movements WHERE occurred_at >= $1)   AS movements_today,
                (SELECT COUNT(*) FROM products WHERE stock = 0)            AS out_of_stock,
                (SELECT COUNT(*) FROM products WHERE stock <= min_stock)   AS low_stock,
                (SELECT COUNT(*) FROM products WHERE stock > 0)            AS in_stock
            "#,
        )
        .bind(day_start)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("dashboard", e))?;

        let count = |col: &str| -> Result<u64, StoreError> {
            let n: i64 = row.try_get(col).map_err(|e| map_sqlx_error("dashboard", e))?;
            Ok(n.max(0) as u64)
        };

        let by_category = sqlx::query(
            r#"
            SELECT p.category_id, c.name AS category, SUM(p.stock)::BIGINT AS total
            FROM products p
            LEFT JOIN categories c ON c.id = p.category_id
            GROUP BY p.category_id, c.name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("dashboard_stock_by_category", e))?;
        let mut stock_by_category = Vec::with_capacity(by_category.len());
        for r in by_category {
            let category_id: Option<Uuid> = r.try_get("category_id").map_err(|e| map_sqlx_error("dashboard", e))?;
            let name: Option<String> = r.try_get("category").map_err(|e| map_sqlx_error("dashboard", e))?;
            stock_by_category.push(CategoryStock {
                category_id: category_id.map(CategoryId::from_uuid),
                category: name.unwrap_or_else(|| UNCATEGORIZED.to_string()),
                total: r.try_get("total").map_err(|e| map_sqlx_error("dashboard", e))?,
            });
        }

        let daily = sqlx::query(
            r#"
            SELECT (occurred_at AT TIME ZONE 'UTC')::date AS day, kind, SUM(quantity)::BIGINT AS total
            FROM movements
            WHERE occurred_at >= $1
            GROUP BY 1, 2
            "#,
        )
        .bind(weekly_series_start(day_start))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("dashboard_weekly_movements", e))?;
        let mut totals: Vec<(NaiveDate, MovementKind, i64)> = Vec::with_capacity(daily.len());
        for r in daily {
            let kind: String = r.try_get("kind").map_err(|e| map_sqlx_error("dashboard", e))?;
            totals.push((
                r.try_get("day").map_err(|e| map_sqlx_error("dashboard", e))?,
                kind.parse().map_err(|e| StoreError::Corrupt(format!("movement kind: {e}")))?,
                r.try_get("total").map_err(|e| map_sqlx_error("dashboard", e))?,
            ));
        }

        Ok(DashboardSummary {
            active_products: count("active_products")?,
            active_users: count("active_users")?,
            unacknowledged_alerts: count("unacknowledged_alerts")?,
            movements_today: count("movements_today")?,
            out_of_stock: count("out_of_stock")?,
            low_stock: count("low_stock")?,
            in_stock: count("in_stock")?,
            stock_by_category: rank_category_stock(stock_by_category),
            weekly_movements: weekly_series(day_start.date_naive(), totals),
        })
    }

    async fn list_config_params(&self) -> Result<Vec<ConfigParam>, StoreError> {
        let rows = sqlx::query_as::<_, ConfigParamRow>(
            "SELECT id, key, value, description FROM config_params ORDER BY key",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_config_params", e))?;
        Ok(rows.into_iter().map(ConfigParam::from).collect())
    }

    async fn list_categories(&self) -> Result<Vec<Category>, StoreError> {
        let rows = sqlx::query_as::<_, CategoryRow>("SELECT id, name, description FROM categories ORDER BY lower(name)")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_categories", e))?;
        Ok(rows.into_iter().map(Category::from).collect())
    }

    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>, StoreError> {
        let row = sqlx::query_as::<_, CategoryRow>("SELECT id, name, description FROM categories WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_category", e))?;
        Ok(row.map(Category::from))
    }

    #[instrument(skip(self, query), err)]
    async fn list_users(&self, query: &UserQuery) -> Result<Page<User>, StoreError> {
        let search = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty());
        const MATCH: &str = "($1::text IS NULL OR strpos(lower(name), lower($1)) > 0 OR strpos(email, lower($1)) > 0)";

        let total: i64 = sqlx::query(&format!("SELECT COUNT(*) AS n FROM users WHERE {MATCH}"))
            .bind(search)
            .fetch_one(&self.pool)
            .await
            .and_then(|row| row.try_get("n"))
            .map_err(|e| map_sqlx_error("count_users", e))?;

        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE {MATCH} \
             ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"
        );
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .bind(search)
            .bind(i64::from(query.page.limit()))
            .bind(i64::try_from(query.page.offset()).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_users", e))?;

        let data = rows.into_iter().map(User::try_from).collect::<Result<_, _>>()?;
        Ok(Page::new(query.page, total.max(0) as u64, data))
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_user", e))?;
        row.map(User::try_from).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_user_by_email", e))?;
        row.map(User::try_from).transpose()
    }
}

#[async_trait]
impl AuditSink for PostgresInventoryStore {
    #[instrument(skip(self, entry), fields(audit_id = %entry.id, action = %entry.action), err)]
    async fn append(&self, entry: &AuditEntry) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO audit_entries (id, user_id, action, detail, recorded_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(entry.id.as_uuid())
        .bind(entry.user_id.as_uuid())
        .bind(entry.action.as_str())
        .bind(&entry.detail)
        .bind(entry.recorded_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("append_audit", e))?;
        Ok(())
    }
}

/// Nullable uuid parameter for the `$n::uuid IS NULL OR …` filters.
fn opt_uuid<T: Into<Uuid>>(id: Option<T>) -> Option<Uuid> {
    id.map(Into::into)
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                // Unique violation / foreign key violation
                Some("23505") | Some("23503") => StoreError::Conflict(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => StoreError::Backend(format!("connection pool closed in {}", operation)),
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}

// SQLx row types

#[derive(Debug)]
struct ProductRow {
    id: Uuid,
    code: String,
    name: String,
    description: Option<String>,
    price: Decimal,
    stock: i64,
    min_stock: i64,
    unit: Option<String>,
    active: bool,
    registered_at: DateTime<Utc>,
    category_id: Option<Uuid>,
}

impl<'r> FromRow<'r, PgRow> for ProductRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(ProductRow {
            id: row.try_get("id")?,
            code: row.try_get("code")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            price: row.try_get("price")?,
            stock: row.try_get("stock")?,
            min_stock: row.try_get("min_stock")?,
            unit: row.try_get("unit")?,
            active: row.try_get("active")?,
            registered_at: row.try_get("registered_at")?,
            category_id: row.try_get("category_id")?,
        })
    }
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: ProductId::from_uuid(row.id),
            code: row.code,
            name: row.name,
            description: row.description,
            price: row.price,
            stock: row.stock,
            min_stock: row.min_stock,
            unit: row.unit,
            active: row.active,
            registered_at: row.registered_at,
            category_id: row.category_id.map(CategoryId::from_uuid),
        }
    }
}

#[derive(Debug)]
struct MovementRow {
    id: Uuid,
    product_id: Uuid,
    user_id: Uuid,
    kind: String,
    quantity: i64,
    reason: Option<String>,
    stock_before: i64,
    stock_after: i64,
    occurred_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for MovementRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(MovementRow {
            id: row.try_get("id")?,
            product_id: row.try_get("product_id")?,
            user_id: row.try_get("user_id")?,
            kind: row.try_get("kind")?,
            quantity: row.try_get("quantity")?,
            reason: row.try_get("reason")?,
            stock_before: row.try_get("stock_before")?,
            stock_after: row.try_get("stock_after")?,
            occurred_at: row.try_get("occurred_at")?,
        })
    }
}

impl TryFrom<MovementRow> for Movement {
    type Error = StoreError;

    fn try_from(row: MovementRow) -> Result<Self, Self::Error> {
        Ok(Movement {
            id: row.id.into(),
            product_id: row.product_id.into(),
            user_id: row.user_id.into(),
            kind: row.kind.parse().map_err(|e| StoreError::Corrupt(format!("movement {}: {e}", row.id)))?,
            quantity: row.quantity,
            reason: row.reason,
            stock_before: row.stock_before,
            stock_after: row.stock_after,
            occurred_at: row.occurred_at,
        })
    }
}

#[derive(Debug)]
struct AlertRow {
    id: Uuid,
    product_id: Uuid,
    kind: String,
    message: String,
    created_at: DateTime<Utc>,
    acknowledged: bool,
}

impl<'r> FromRow<'r, PgRow> for AlertRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(AlertRow {
            id: row.try_get("id")?,
            product_id: row.try_get("product_id")?,
            kind: row.try_get("kind")?,
            message: row.try_get("message")?,
            created_at: row.try_get("created_at")?,
            acknowledged: row.try_get("acknowledged")?,
        })
    }
}

impl TryFrom<AlertRow> for Alert {
    type Error = StoreError;

    fn try_from(row: AlertRow) -> Result<Self, Self::Error> {
        Ok(Alert {
            id: row.id.into(),
            product_id: row.product_id.into(),
            kind: row.kind.parse().map_err(|e| StoreError::Corrupt(format!("alert {}: {e}", row.id)))?,
            message: row.message,
            created_at: row.created_at,
            acknowledged: row.acknowledged,
        })
    }
}

#[derive(Debug)]
struct AuditEntryRow {
    id: Uuid,
    user_id: Uuid,
    action: String,
    detail: String,
    recorded_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for AuditEntryRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(AuditEntryRow {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            action: row.try_get("action")?,
            detail: row.try_get("detail")?,
            recorded_at: row.try_get("recorded_at")?,
        })
    }
}

impl TryFrom<AuditEntryRow> for AuditEntry {
    type Error = StoreError;

    fn try_from(row: AuditEntryRow) -> Result<Self, Self::Error> {
        Ok(AuditEntry {
            id: row.id.into(),
            user_id: row.user_id.into(),
            action: row.action.parse().map_err(|e| StoreError::Corrupt(format!("audit entry {}: {e}", row.id)))?,
            detail: row.detail,
            recorded_at: row.recorded_at,
        })
    }
}

#[derive(Debug)]
struct ConfigParamRow {
    id: Uuid,
    key: String,
    value: String,
    description: Option<String>,
}

impl<'r> FromRow<'r, PgRow> for ConfigParamRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(ConfigParamRow {
            id: row.try_get("id")?,
            key: row.try_get("key")?,
            value: row.try_get("value")?,
            description: row.try_get("description")?,
        })
    }
}

impl From<ConfigParamRow> for ConfigParam {
    fn from(row: ConfigParamRow) -> Self {
        ConfigParam {
            id: ConfigParamId::from_uuid(row.id),
            key: row.key,
            value: row.value,
            description: row.description,
        }
    }
}

#[derive(Debug)]
struct CategoryRow {
    id: Uuid,
    name: String,
    description: Option<String>,
}

impl<'r> FromRow<'r, PgRow> for CategoryRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(CategoryRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
        })
    }
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Category {
            id: CategoryId::from_uuid(row.id),
            name: row.name,
            description: row.description,
        }
    }
}

#[derive(Debug)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    role: String,
    active: bool,
    created_at: DateTime<Utc>,
    password_hash: String,
}

impl<'r> FromRow<'r, PgRow> for UserRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(UserRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            role: row.try_get("role")?,
            active: row.try_get("active")?,
            created_at: row.try_get("created_at")?,
            password_hash: row.try_get("password_hash")?,
        })
    }
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = Role::new(row.role);
        if !role.is_known() {
            return Err(StoreError::Corrupt(format!("user {}: unknown role '{role}'", row.id)));
        }
        Ok(User {
            id: row.id.into(),
            name: row.name,
            email: row.email,
            role,
            active: row.active,
            created_at: row.created_at,
            password_hash: row.password_hash,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_ids_bind_as_plain_uuids() {
        let id = ProductId::new();
        assert_eq!(opt_uuid(Some(id)), Some(*id.as_uuid()));
        assert_eq!(opt_uuid::<UserId>(None), None);
    }

    #[test]
    fn unknown_movement_kind_is_reported_as_corrupt() {
        let row = MovementRow {
            id: Uuid::now_v7(),
            product_id: Uuid::now_v7(),
            user_id: Uuid::now_v7(),
            kind: "Transfer".into(),
            quantity: 1,
            reason: None,
            stock_before: 1,
            stock_after: 0,
            occurred_at: Utc::now(),
        };
        assert!(matches!(Movement::try_from(row), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn product_row_keeps_its_category() {
        let category = Uuid::now_v7();
        let row = ProductRow {
            id: Uuid::now_v7(),
            code: "W-1".into(),
            name: "Widget".into(),
            description: None,
            price: Decimal::ONE,
            stock: 3,
            min_stock: 1,
            unit: None,
            active: true,
            registered_at: Utc::now(),
            category_id: Some(category),
        };
        assert_eq!(Product::from(row).category_id, Some(CategoryId::from_uuid(category)));
    }

    #[test]
    fn user_row_with_unknown_role_is_corrupt() {
        let row = |role: &str| UserRow {
            id: Uuid::now_v7(),
            name: "Ana".into(),
            email: "ana@example.com".into(),
            role: role.into(),
            active: true,
            created_at: Utc::now(),
            password_hash: "$argon2id$x".into(),
        };
        assert!(matches!(User::try_from(row("root")), Err(StoreError::Corrupt(_))));
        let user = User::try_from(row(Role::EDITOR)).unwrap();
        assert_eq!(user.password_hash, "$argon2id$x");
    }

    #[test]
    fn constraint_violations_map_to_conflicts_only_for_database_errors() {
        let err = map_sqlx_error("get_product", sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::Backend(msg) if msg.contains("get_product")));
        assert!(matches!(
            map_sqlx_error("begin_transaction", sqlx::Error::PoolClosed),
            StoreError::Backend(_)
        ));
    }
}
