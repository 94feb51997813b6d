//! Product categories.

use tracing::instrument;

use stockella_auth::{authorize, permissions, Actor};
use stockella_core::CategoryId;
use stockella_inventory::{AuditAction, Category, CategoryPatch, NewCategory};

use crate::error::LedgerError;
use crate::ledger_engine::LedgerEngine;

impl LedgerEngine {
    /// Ordered by name. Readable by anyone who can read products.
    pub async fn list_categories(&self, actor: &Actor) -> Result<Vec<Category>, LedgerError> {
        authorize(actor, &permissions::PRODUCTS_READ)?;
        Ok(self.store.list_categories().await?)
    }

    pub async fn get_category(&self, actor: &Actor, id: CategoryId) -> Result<Category, LedgerError> {
        authorize(actor, &permissions::PRODUCTS_READ)?;
        self.store.get_category(id).await?.ok_or(LedgerError::NotFound)
    }

    #[instrument(skip(self, actor, input), fields(user_id = %actor.user_id), err(Display))]
    pub async fn create_category(&self, actor: &Actor, input: NewCategory) -> Result<Category, LedgerError> {
        authorize(actor, &permissions::CATEGORIES_MANAGE)?;
        let category = input.into_category(CategoryId::new())?;

        let mut tx = self.store.begin().await?;
        if tx.category_name_exists(&category.name, None).await? {
            return Err(LedgerError::Conflict(format!("category '{}' already exists", category.name)));
        }
        tx.insert_category(&category).await?;
        tx.commit().await?;

        self.audit
            .record(actor.user_id, AuditAction::Create, format!("Created category '{}'", category.name))
            .await;
        Ok(category)
    }

    #[instrument(skip(self, actor, patch), fields(user_id = %actor.user_id, category_id = %id), err(Display))]
    pub async fn update_category(
        &self,
        actor: &Actor,
        id: CategoryId,
        patch: CategoryPatch,
    ) -> Result<Category, LedgerError> {
        authorize(actor, &permissions::CATEGORIES_MANAGE)?;

        let mut tx = self.store.begin().await?;
        let mut category = tx.lock_category(id).await?.ok_or(LedgerError::NotFound)?;
        let renamed = category.apply_patch(patch)?;
        if renamed && tx.category_name_exists(&category.name, Some(id)).await? {
            return Err(LedgerError::Conflict(format!("category '{}' already exists", category.name)));
        }
        tx.save_category(&category).await?;
        tx.commit().await?;

        self.audit
            .record(actor.user_id, AuditAction::Update, format!("Updated category '{}'", category.name))
            .await;
        Ok(category)
    }

    /// Categories still assigned to a product cannot be deleted.
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id, category_id = %id), err(Display))]
    pub async fn delete_category(&self, actor: &Actor, id: CategoryId) -> Result<(), LedgerError> {
        authorize(actor, &permissions::CATEGORIES_MANAGE)?;

        let mut tx = self.store.begin().await?;
        let category = tx.lock_category(id).await?.ok_or(LedgerError::NotFound)?;
        if tx.category_in_use(id).await? {
            return Err(LedgerError::Conflict(format!(
                "category '{}' is assigned to products",
                category.name
            )));
        }
        tx.delete_category(id).await?;
        tx.commit().await?;

        self.audit
            .record(actor.user_id, AuditAction::Delete, format!("Deleted category '{}'", category.name))
            .await;
        Ok(())
    }
}
