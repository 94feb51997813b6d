//! User administration and credential checks.
//!
//! Password hashing is CPU-bound, so it runs on the blocking pool.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument};

use stockella_auth::{authorize, normalize_email, permissions, Actor, NewUser, Password, Role, User, UserPatch};
use stockella_core::UserId;
use stockella_inventory::{AuditAction, Page, UserQuery};

use crate::error::LedgerError;
use crate::ledger_engine::LedgerEngine;
use crate::store::StoreError;

/// Administrator account created at startup when its email is not registered yet.
#[derive(Clone, PartialEq, Eq)]
pub struct BootstrapAdmin {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl core::fmt::Debug for BootstrapAdmin {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BootstrapAdmin")
            .field("name", &self.name)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

impl LedgerEngine {
    /// Newest account first. Requires `users.manage`.
    pub async fn list_users(&self, actor: &Actor, query: &UserQuery) -> Result<Page<User>, LedgerError> {
        authorize(actor, &permissions::USERS_MANAGE)?;
        Ok(self.store.list_users(query).await?)
    }

    pub async fn get_user(&self, actor: &Actor, id: UserId) -> Result<User, LedgerError> {
        authorize(actor, &permissions::USERS_MANAGE)?;
        self.store.get_user(id).await?.ok_or(LedgerError::NotFound)
    }

    #[instrument(skip(self, actor, input), fields(user_id = %actor.user_id), err(Display))]
    pub async fn create_user(&self, actor: &Actor, input: NewUser) -> Result<User, LedgerError> {
        authorize(actor, &permissions::USERS_MANAGE)?;
        self.register(actor.user_id, UserId::new(), input).await
    }

    /// Callers cannot change their own role or deactivate themselves.
    #[instrument(skip(self, actor, patch), fields(user_id = %actor.user_id, target_id = %id), err(Display))]
    pub async fn update_user(&self, actor: &Actor, id: UserId, patch: UserPatch) -> Result<User, LedgerError> {
        authorize(actor, &permissions::USERS_MANAGE)?;

        let mut tx = self.store.begin().await?;
        let mut user = tx.lock_user(id).await?.ok_or(LedgerError::NotFound)?;
        let outcome = user.apply_patch(patch)?;

        if id == actor.user_id && (outcome.role_changed || outcome.deactivated) {
            return Err(LedgerError::Conflict(
                "cannot change the role or deactivate the account in use".to_string(),
            ));
        }
        if outcome.email_changed && tx.email_exists(&user.email, Some(id)).await? {
            return Err(LedgerError::Conflict(format!("email '{}' is already registered", user.email)));
        }
        if let Some(password) = outcome.new_password {
            user.password_hash = self.hash_password(password).await?;
        }
        tx.save_user(&user).await?;
        tx.commit().await?;

        self.audit
            .record(actor.user_id, AuditAction::Update, format!("Updated user '{}'", user.email))
            .await;
        Ok(user)
    }

    /// Users who recorded movements cannot be deleted.
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id, target_id = %id), err(Display))]
    pub async fn delete_user(&self, actor: &Actor, id: UserId) -> Result<(), LedgerError> {
        authorize(actor, &permissions::USERS_MANAGE)?;
        if id == actor.user_id {
            return Err(LedgerError::Conflict("cannot delete the account in use".to_string()));
        }

        let mut tx = self.store.begin().await?;
        let user = tx.lock_user(id).await?.ok_or(LedgerError::NotFound)?;
        if tx.user_has_movements(id).await? {
            return Err(LedgerError::Conflict(format!("user '{}' has recorded movements", user.email)));
        }
        tx.delete_user(id).await?;
        tx.commit().await?;

        self.audit
            .record(actor.user_id, AuditAction::Delete, format!("Deleted user '{}'", user.email))
            .await;
        Ok(())
    }

    /// Check a login. Every failure is reported as [`LedgerError::InvalidCredentials`].
    #[instrument(skip(self, email, password), err(Display))]
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User, LedgerError> {
        let Ok(email) = normalize_email(email) else {
            return Err(LedgerError::InvalidCredentials);
        };
        let user = match self.store.find_user_by_email(&email).await? {
            Some(u) if u.active => u,
            Some(_) => {
                debug!("login rejected: account inactive");
                return Err(LedgerError::InvalidCredentials);
            }
            None => {
                debug!("login rejected: unknown email");
                return Err(LedgerError::InvalidCredentials);
            }
        };
        if !self.verify_password(password, &user.password_hash).await? {
            debug!(user_id = %user.id, "login rejected: wrong password");
            return Err(LedgerError::InvalidCredentials);
        }
        info!(user_id = %user.id, "login accepted");
        Ok(user)
    }

    /// Create the configured administrator unless its email is already taken.
    #[instrument(skip(self, admin), fields(email = %admin.email), err(Display))]
    pub async fn ensure_bootstrap_admin(&self, admin: BootstrapAdmin) -> Result<Option<User>, LedgerError> {
        let email = normalize_email(&admin.email)?;
        if self.store.find_user_by_email(&email).await?.is_some() {
            debug!("bootstrap admin already present");
            return Ok(None);
        }
        let id = UserId::new();
        let user = self
            .register(
                id,
                id,
                NewUser {
                    name: admin.name,
                    email,
                    password: admin.password,
                    role: Role::ADMIN.to_string(),
                    active: Some(true),
                },
            )
            .await?;
        info!(user_id = %user.id, "bootstrap admin created");
        Ok(Some(user))
    }

    async fn register(&self, author: UserId, id: UserId, input: NewUser) -> Result<User, LedgerError> {
        let (mut user, password) = input.into_user(id, Utc::now())?;
        user.password_hash = self.hash_password(password).await?;

        let mut tx = self.store.begin().await?;
        if tx.email_exists(&user.email, None).await? {
            return Err(LedgerError::Conflict(format!("email '{}' is already registered", user.email)));
        }
        tx.insert_user(&user).await?;
        tx.commit().await?;

        self.audit
            .record(
                author,
                AuditAction::Create,
                format!("Created user '{}' ({})", user.email, user.role),
            )
            .await;
        Ok(user)
    }

    async fn hash_password(&self, password: Password) -> Result<String, LedgerError> {
        let hasher = Arc::clone(&self.passwords);
        let hash = tokio::task::spawn_blocking(move || hasher.hash_password(password.expose()))
            .await
            .map_err(|e| LedgerError::Persistence(StoreError::Backend(e.to_string())))??;
        Ok(hash)
    }

    async fn verify_password(&self, password: &str, hash: &str) -> Result<bool, LedgerError> {
        let hasher = Arc::clone(&self.passwords);
        let (password, hash) = (password.to_string(), hash.to_string());
        let ok = tokio::task::spawn_blocking(move || hasher.verify_password(&password, &hash))
            .await
            .map_err(|e| LedgerError::Persistence(StoreError::Backend(e.to_string())))??;
        Ok(ok)
    }
}
