use std::sync::Arc;

use anyhow::Context;

use stockella_auth::Hs256JwtIssuer;
use stockella_infra::{LedgerEngine, PostgresInventoryStore};

use crate::config::ApiConfig;

/// Shared handler state.
pub struct AppServices {
    pub engine: Arc<LedgerEngine>,
    pub tokens: Arc<Hs256JwtIssuer>,
}

impl AppServices {
    pub async fn from_config(config: &ApiConfig) -> anyhow::Result<Self> {
        let engine = match config.database_url.as_deref() {
            Some(url) => {
                let store = Arc::new(
                    PostgresInventoryStore::connect(url)
                        .await
                        .context("failed to connect to postgres")?,
                );
                store.migrate().await.context("failed to apply schema")?;
                LedgerEngine::new(store.clone(), store, config.ledger)
            }
            None => LedgerEngine::in_memory(config.ledger),
        };
        if let Some(admin) = config.bootstrap_admin.clone() {
            engine
                .ensure_bootstrap_admin(admin)
                .await
                .context("failed to create the bootstrap admin")?;
        }
        Ok(Self {
            engine: Arc::new(engine),
            tokens: Arc::new(Hs256JwtIssuer::new(config.jwt_secret.as_bytes(), config.token_ttl)),
        })
    }
}
