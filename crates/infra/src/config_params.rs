//! Administrator-managed configuration parameters.

use tracing::instrument;

use stockella_auth::{authorize, permissions, Actor};
use stockella_core::ConfigParamId;
use stockella_inventory::{AuditAction, ConfigParam, ConfigParamPatch, NewConfigParam};

use crate::error::LedgerError;
use crate::ledger_engine::LedgerEngine;

impl LedgerEngine {
    pub async fn list_config_params(&self, actor: &Actor) -> Result<Vec<ConfigParam>, LedgerError> {
        authorize(actor, &permissions::CONFIG_MANAGE)?;
        Ok(self.store.list_config_params().await?)
    }

    #[instrument(skip(self, actor, input), fields(user_id = %actor.user_id), err(Display))]
    pub async fn create_config_param(&self, actor: &Actor, input: NewConfigParam) -> Result<ConfigParam, LedgerError> {
        authorize(actor, &permissions::CONFIG_MANAGE)?;
        let param = input.into_param(ConfigParamId::new())?;

        let mut tx = self.store.begin().await?;
        if tx.config_key_exists(&param.key, None).await? {
            return Err(LedgerError::Conflict(format!("parameter '{}' already exists", param.key)));
        }
        tx.insert_config_param(&param).await?;
        tx.commit().await?;

        self.audit
            .record(
                actor.user_id,
                AuditAction::Configure,
                format!("Created parameter '{}' = '{}'", param.key, param.value),
            )
            .await;
        Ok(param)
    }

    #[instrument(skip(self, actor, patch), fields(user_id = %actor.user_id, param_id = %id), err(Display))]
    pub async fn update_config_param(
        &self,
        actor: &Actor,
        id: ConfigParamId,
        patch: ConfigParamPatch,
    ) -> Result<ConfigParam, LedgerError> {
        authorize(actor, &permissions::CONFIG_MANAGE)?;

        let mut tx = self.store.begin().await?;
        let mut param = tx.lock_config_param(id).await?.ok_or(LedgerError::NotFound)?;
        param.apply_patch(patch)?;
        if tx.config_key_exists(&param.key, Some(id)).await? {
            return Err(LedgerError::Conflict(format!("parameter '{}' already exists", param.key)));
        }
        tx.save_config_param(&param).await?;
        tx.commit().await?;

        self.audit
            .record(
                actor.user_id,
                AuditAction::Configure,
                format!("Updated parameter '{}' = '{}'", param.key, param.value),
            )
            .await;
        Ok(param)
    }

    #[instrument(skip(self, actor), fields(user_id = %actor.user_id, param_id = %id), err(Display))]
    pub async fn delete_config_param(&self, actor: &Actor, id: ConfigParamId) -> Result<(), LedgerError> {
        authorize(actor, &permissions::CONFIG_MANAGE)?;

        let mut tx = self.store.begin().await?;
        let param = tx.lock_config_param(id).await?.ok_or(LedgerError::NotFound)?;
        tx.delete_config_param(id).await?;
        tx.commit().await?;

        self.audit
            .record(actor.user_id, AuditAction::Delete, format!("Deleted parameter '{}'", param.key))
            .await;
        Ok(())
    }
}
