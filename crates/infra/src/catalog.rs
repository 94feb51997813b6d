//! Product management.

use chrono::Utc;
use tracing::instrument;

use stockella_auth::{authorize, permissions, Actor};
use stockella_core::{CategoryId, ProductId};
use stockella_inventory::{Alert, AuditAction, NewProduct, Page, Product, ProductPatch, ProductQuery};

use crate::error::LedgerError;
use crate::ledger_engine::LedgerEngine;
use crate::store::InventoryTx;

/// A product write together with the alert it raised, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductChange {
    pub product: Product,
    pub alert: Option<Alert>,
}

impl LedgerEngine {
    #[instrument(skip(self, actor, input), fields(user_id = %actor.user_id), err(Display))]
    pub async fn create_product(&self, actor: &Actor, input: NewProduct) -> Result<ProductChange, LedgerError> {
        authorize(actor, &permissions::PRODUCTS_WRITE)?;
        let now = Utc::now();
        let product = input.into_product(ProductId::new(), now)?;

        let mut tx = self.store.begin().await?;
        if tx.product_code_exists(&product.code, None).await? {
            return Err(LedgerError::Conflict(format!("product code '{}' already exists", product.code)));
        }
        if let Some(category) = product.category_id {
            ensure_category(tx.as_mut(), category).await?;
        }
        tx.insert_product(&product).await?;
        let alert = self.evaluate_alert(tx.as_mut(), &product, now).await?;
        tx.commit().await?;

        self.audit
            .record(
                actor.user_id,
                AuditAction::Create,
                format!("Created product '{}' ({})", product.name, product.code),
            )
            .await;

        Ok(ProductChange { product, alert })
    }

    /// Stock is never touched here; only movements change it. A lowered
    /// threshold or a reactivation re-runs the alert policy.
    #[instrument(skip(self, actor, patch), fields(user_id = %actor.user_id, product_id = %id), err(Display))]
    pub async fn update_product(&self, actor: &Actor, id: ProductId, patch: ProductPatch) -> Result<ProductChange, LedgerError> {
        authorize(actor, &permissions::PRODUCTS_WRITE)?;

        let mut tx = self.store.begin().await?;
        let mut product = tx.lock_product(id).await?.ok_or(LedgerError::NotFound)?;
        let outcome = product.apply_patch(patch)?;

        if outcome.code_changed && tx.product_code_exists(&product.code, Some(id)).await? {
            return Err(LedgerError::Conflict(format!("product code '{}' already exists", product.code)));
        }
        if outcome.category_assigned {
            if let Some(category) = product.category_id {
                ensure_category(tx.as_mut(), category).await?;
            }
        }
        tx.save_product(&product).await?;

        let alert = if outcome.needs_alert_check() {
            self.evaluate_alert(tx.as_mut(), &product, Utc::now()).await?
        } else {
            None
        };
        tx.commit().await?;

        self.audit
            .record(actor.user_id, AuditAction::Update, format!("Updated product '{}'", product.name))
            .await;

        Ok(ProductChange { product, alert })
    }

    /// Products with recorded movements cannot be deleted.
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id, product_id = %id), err(Display))]
    pub async fn delete_product(&self, actor: &Actor, id: ProductId) -> Result<(), LedgerError> {
        authorize(actor, &permissions::PRODUCTS_DELETE)?;

        let mut tx = self.store.begin().await?;
        let product = tx.lock_product(id).await?.ok_or(LedgerError::NotFound)?;
        if tx.has_movements(id).await? {
            return Err(LedgerError::Conflict(format!(
                "product '{}' has recorded movements",
                product.name
            )));
        }
        tx.delete_product(id).await?;
        tx.commit().await?;

        self.audit
            .record(
                actor.user_id,
                AuditAction::Delete,
                format!("Deleted product '{}' ({})", product.name, product.code),
            )
            .await;
        Ok(())
    }

    pub async fn get_product(&self, actor: &Actor, id: ProductId) -> Result<Product, LedgerError> {
        authorize(actor, &permissions::PRODUCTS_READ)?;
        self.store.get_product(id).await?.ok_or(LedgerError::NotFound)
    }

    pub async fn list_products(&self, actor: &Actor, query: &ProductQuery) -> Result<Page<Product>, LedgerError> {
        authorize(actor, &permissions::PRODUCTS_READ)?;
        Ok(self.store.list_products(query).await?)
    }
}

async fn ensure_category(tx: &mut dyn InventoryTx, id: CategoryId) -> Result<(), LedgerError> {
    match tx.lock_category(id).await? {
        Some(_) => Ok(()),
        None => Err(LedgerError::Validation(format!("category {id} does not exist"))),
    }
}
