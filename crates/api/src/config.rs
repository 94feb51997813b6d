//! Process configuration, read once at startup.

use std::net::SocketAddr;

use anyhow::{anyhow, bail, Context};
use chrono::Duration;

use stockella_infra::{BootstrapAdmin, LedgerConfig};
use stockella_inventory::AlertDedup;

pub const DEFAULT_BIND: &str = "0.0.0.0:8080";
const DEV_JWT_SECRET: &str = "dev-secret";
pub const DEFAULT_TOKEN_TTL_MINUTES: i64 = 8 * 60;
const DEFAULT_ADMIN_NAME: &str = "Administrator";

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind: SocketAddr,
    pub jwt_secret: String,
    /// `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub ledger: LedgerConfig,
    /// Lifetime of tokens issued by `/auth/login`.
    pub token_ttl: Duration,
    /// Created at startup unless an account with its email exists.
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl ApiConfig {
    /// In-memory store, default ledger settings, ephemeral local port.
    pub fn in_memory(jwt_secret: impl Into<String>) -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 0)),
            jwt_secret: jwt_secret.into(),
            database_url: None,
            ledger: LedgerConfig::default(),
            token_ttl: Duration::minutes(DEFAULT_TOKEN_TTL_MINUTES),
            bootstrap_admin: None,
        }
    }

    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Invalid values are errors; missing ones use defaults.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let bind = get("STOCKELLA_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind: SocketAddr = bind
            .parse()
            .with_context(|| format!("STOCKELLA_BIND: invalid socket address '{bind}'"))?;

        let jwt_secret = match get("JWT_SECRET").filter(|s| !s.is_empty()) {
            Some(secret) => secret,
            None => {
                tracing::warn!("JWT_SECRET not set; using insecure dev default");
                DEV_JWT_SECRET.to_string()
            }
        };

        let database_url = get("DATABASE_URL").filter(|s| !s.trim().is_empty());

        let audit_enabled = match get("STOCKELLA_AUDIT_ENABLED") {
            Some(raw) => parse_bool(&raw).ok_or_else(|| anyhow!("STOCKELLA_AUDIT_ENABLED: expected a boolean, got '{raw}'"))?,
            None => true,
        };

        let alert_dedup = match get("STOCKELLA_ALERT_DEDUP") {
            Some(raw) => raw
                .parse::<AlertDedup>()
                .map_err(|e| anyhow!("STOCKELLA_ALERT_DEDUP: {e}"))?,
            None => AlertDedup::default(),
        };

        let token_ttl = match get("STOCKELLA_TOKEN_TTL_MINUTES") {
            Some(raw) => match raw.trim().parse::<i64>() {
                Ok(minutes) if minutes > 0 => Duration::minutes(minutes),
                _ => bail!("STOCKELLA_TOKEN_TTL_MINUTES: expected a positive number of minutes, got '{raw}'"),
            },
            None => Duration::minutes(DEFAULT_TOKEN_TTL_MINUTES),
        };

        let admin_email = get("STOCKELLA_ADMIN_EMAIL").filter(|s| !s.trim().is_empty());
        let admin_password = get("STOCKELLA_ADMIN_PASSWORD").filter(|s| !s.is_empty());
        let bootstrap_admin = match (admin_email, admin_password) {
            (Some(email), Some(password)) => Some(BootstrapAdmin {
                name: get("STOCKELLA_ADMIN_NAME")
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_ADMIN_NAME.to_string()),
                email,
                password,
            }),
            (None, None) => None,
            _ => bail!("STOCKELLA_ADMIN_EMAIL and STOCKELLA_ADMIN_PASSWORD must be set together"),
        };

        Ok(Self {
            bind,
            jwt_secret,
            database_url,
            ledger: LedgerConfig {
                audit_enabled,
                alert_dedup,
            },
            token_ttl,
            bootstrap_admin,
        })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
