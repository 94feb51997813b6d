use anyhow::Context;

use stockella_api::ApiConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    stockella_observability::init();

    let config = ApiConfig::from_env()?;
    let app = stockella_api::app::build_app(&config).await?;

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;

    tracing::info!(
        addr = %listener.local_addr()?,
        store = if config.database_url.is_some() { "postgres" } else { "in_memory" },
        audit_enabled = config.ledger.audit_enabled,
        alert_dedup = ?config.ledger.alert_dedup,
        "listening"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
