//! Stock ledger engine.
//!
//! Every stock change flows through [`LedgerEngine::apply_movement`], which
//! runs as one unit of work:
//!
//! ```text
//! authorize (movements.create)
//!   ↓
//! validate kind / quantity / reason          (no IO)
//!   ↓
//! begin → lock product → plan S0 → S1
//!   ↓
//! insert movement → save stock → alert policy
//!   ↓
//! commit
//!   ↓
//! audit (best effort, after commit)
//! ```
//!
//! Any error before `commit` drops the transaction, which discards every
//! staged write: a movement never exists without its stock update.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, instrument};

use stockella_auth::{authorize, permissions, Actor, Argon2PasswordHasher, PasswordHasher};
use stockella_core::{AlertId, MovementId, ProductId};
use stockella_inventory::{
    alert, plan_movement, Alert, AlertDedup, AlertKind, AuditAction, Movement, MovementDraft, MovementFilter,
    Product,
};

use crate::audit::AuditRecorder;
use crate::error::LedgerError;
use crate::store::{AuditSink, InMemoryInventoryStore, InventoryStore, InventoryTx, StoreError};

/// Engine parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerConfig {
    pub audit_enabled: bool,
    pub alert_dedup: AlertDedup,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            audit_enabled: true,
            alert_dedup: AlertDedup::default(),
        }
    }
}

/// Outcome of a committed movement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementResult {
    pub movement: Movement,
    pub new_stock: i64,
    pub alert: Option<Alert>,
}

/// Wire shape of a [`MovementResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementReceipt {
    pub movement_id: MovementId,
    pub new_stock: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert_id: Option<AlertId>,
}

impl From<&MovementResult> for MovementReceipt {
    fn from(r: &MovementResult) -> Self {
        Self {
            movement_id: r.movement.id,
            new_stock: r.new_stock,
            alert_id: r.alert.as_ref().map(|a| a.id),
        }
    }
}

pub struct LedgerEngine {
    pub(crate) store: Arc<dyn InventoryStore>,
    pub(crate) audit: AuditRecorder,
    pub(crate) config: LedgerConfig,
    pub(crate) passwords: Arc<dyn PasswordHasher>,
}

impl LedgerEngine {
    pub fn new(store: Arc<dyn InventoryStore>, audit_sink: Arc<dyn AuditSink>, config: LedgerConfig) -> Self {
        Self {
            store,
            audit: AuditRecorder::new(audit_sink, config.audit_enabled),
            config,
            passwords: Arc::new(Argon2PasswordHasher::new()),
        }
    }

    pub fn with_password_hasher(mut self, passwords: Arc<dyn PasswordHasher>) -> Self {
        self.passwords = passwords;
        self
    }

    /// Engine over a fresh in-memory store that also serves as the audit sink.
    pub fn in_memory(config: LedgerConfig) -> Self {
        let store = Arc::new(InMemoryInventoryStore::new());
        Self::new(store.clone(), store, config)
    }

    pub fn config(&self) -> LedgerConfig {
        self.config
    }

    /// Record an inflow or outflow and apply it to the product's stock.
    #[instrument(
        skip(self, actor, kind, reason),
        fields(user_id = %actor.user_id, product_id = %product_id),
        err(Display)
    )]
    pub async fn apply_movement(
        &self,
        actor: &Actor,
        product_id: ProductId,
        kind: &str,
        quantity: i64,
        reason: Option<String>,
    ) -> Result<MovementResult, LedgerError> {
        authorize(actor, &permissions::MOVEMENTS_CREATE)?;
        let draft = MovementDraft::parse(kind, quantity, reason)?;

        let mut tx = self.store.begin().await?;

        let mut product = match tx.lock_product(product_id).await? {
            Some(p) if p.active => p,
            _ => {
                debug!("movement rejected: product missing or inactive");
                return Err(LedgerError::NotFound);
            }
        };

        let transition = plan_movement(product.stock, draft.kind, draft.quantity).inspect_err(|e| {
            debug!(error = %e, "movement rejected");
        })?;

        let now = Utc::now();
        let movement = Movement {
            id: MovementId::new(),
            product_id,
            user_id: actor.user_id,
            kind: draft.kind,
            quantity: draft.quantity,
            reason: draft.reason,
            stock_before: transition.before,
            stock_after: transition.after,
            occurred_at: now,
        };
        tx.insert_movement(&movement).await?;

        product.stock = transition.after;
        tx.save_product(&product).await?;

        let alert = self.evaluate_alert(tx.as_mut(), &product, now).await?;

        tx.commit().await?;

        info!(
            movement_id = %movement.id,
            kind = %movement.kind,
            stock_before = transition.before,
            stock_after = transition.after,
            alert_raised = alert.is_some(),
            "movement committed"
        );

        self.audit
            .record(
                actor.user_id,
                AuditAction::Update,
                format!(
                    "{} on '{}': {} → {}",
                    movement.kind, product.name, transition.before, transition.after
                ),
            )
            .await;

        Ok(MovementResult {
            movement,
            new_stock: transition.after,
            alert,
        })
    }

    /// Newest first. Requires `movements.read`.
    pub async fn list_movements(&self, actor: &Actor, filter: &MovementFilter) -> Result<Vec<Movement>, LedgerError> {
        authorize(actor, &permissions::MOVEMENTS_READ)?;
        Ok(self.store.list_movements(filter).await?)
    }

    /// Alert policy, evaluated inside the caller's transaction.
    pub(crate) async fn evaluate_alert(
        &self,
        tx: &mut dyn InventoryTx,
        product: &Product,
        now: chrono::DateTime<Utc>,
    ) -> Result<Option<Alert>, StoreError> {
        if !product.is_low_stock() {
            return Ok(None);
        }
        let has_open = match self.config.alert_dedup {
            AlertDedup::Always => false,
            AlertDedup::SuppressWhileUnacknowledged => tx.has_open_alert(product.id, AlertKind::LowStock).await?,
        };
        if !alert::should_raise(product.stock, product.min_stock, self.config.alert_dedup, has_open) {
            debug!(product_id = %product.id, "low stock alert suppressed; one is still open");
            return Ok(None);
        }
        let raised = Alert::low_stock(product, now);
        tx.insert_alert(&raised).await?;
        Ok(Some(raised))
    }
}

impl core::fmt::Debug for LedgerEngine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LedgerEngine")
            .field("audit", &self.audit)
            .field("config", &self.config)
            .finish()
    }
}
