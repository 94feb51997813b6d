use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Extension, Path, Query},
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};

use stockella_core::AlertId;

use crate::app::dto::AlertListParams;
use crate::app::errors;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_alerts))
        .route("/:id/acknowledge", put(acknowledge_alert))
}

pub async fn list_alerts(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    params: Result<Query<AlertListParams>, QueryRejection>,
) -> axum::response::Response {
    let Query(params) = match params {
        Ok(p) => p,
        Err(rejection) => return errors::query_rejection(rejection),
    };
    let filter = match params.into_filter() {
        Ok(f) => f,
        Err(resp) => return resp,
    };
    match services.engine.list_alerts(principal.actor(), &filter).await {
        Ok(alerts) => Json(alerts).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

/// Idempotent: acknowledging an acknowledged alert returns it unchanged.
pub async fn acknowledge_alert(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: AlertId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("alert", &id),
    };
    match services.engine.acknowledge_alert(principal.actor(), id).await {
        Ok(alert) => Json(alert).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
