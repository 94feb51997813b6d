use std::sync::Arc;

use axum::{extract::Extension, response::IntoResponse, Json};

use crate::app::errors;
use crate::app::services::AppServices;

/// Any authenticated user may read the dashboard.
pub async fn summary(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.engine.dashboard().await {
        Ok(summary) => Json(summary).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
