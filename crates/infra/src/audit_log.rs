use stockella_auth::{authorize, permissions, Actor};
use stockella_inventory::{AuditEntry, AuditFilter, AuditSummary};

use crate::error::LedgerError;
use crate::ledger_engine::LedgerEngine;

impl LedgerEngine {
    pub async fn list_audit(&self, actor: &Actor, filter: &AuditFilter) -> Result<Vec<AuditEntry>, LedgerError> {
        authorize(actor, &permissions::AUDIT_READ)?;
        Ok(self.store.list_audit(filter).await?)
    }

    pub async fn audit_summary(&self, actor: &Actor) -> Result<AuditSummary, LedgerError> {
        authorize(actor, &permissions::AUDIT_READ)?;
        let counts = self.store.audit_counts().await?;
        Ok(AuditSummary::from_counts(counts))
    }
}
