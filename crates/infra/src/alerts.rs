use tracing::instrument;

use stockella_auth::{authorize, permissions, Actor};
use stockella_core::AlertId;
use stockella_inventory::{Alert, AlertFilter, AuditAction};

use crate::error::LedgerError;
use crate::ledger_engine::LedgerEngine;

impl LedgerEngine {
    /// Newest first. Requires `alerts.read`.
    pub async fn list_alerts(&self, actor: &Actor, filter: &AlertFilter) -> Result<Vec<Alert>, LedgerError> {
        authorize(actor, &permissions::ALERTS_READ)?;
        Ok(self.store.list_alerts(filter).await?)
    }

    /// Idempotent: acknowledging an acknowledged alert changes nothing and
    /// writes no audit entry.
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id, alert_id = %id), err(Display))]
    pub async fn acknowledge_alert(&self, actor: &Actor, id: AlertId) -> Result<Alert, LedgerError> {
        authorize(actor, &permissions::ALERTS_ACKNOWLEDGE)?;

        let mut tx = self.store.begin().await?;
        let mut alert = tx.lock_alert(id).await?.ok_or(LedgerError::NotFound)?;
        if alert.acknowledged {
            return Ok(alert);
        }
        tx.acknowledge_alert(id).await?;
        tx.commit().await?;
        alert.acknowledged = true;

        self.audit
            .record(actor.user_id, AuditAction::Update, format!("Acknowledged {} alert: {}", alert.kind, alert.message))
            .await;
        Ok(alert)
    }
}
