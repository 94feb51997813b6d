use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Extension, Query},
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use crate::app::dto::AuditListParams;
use crate::app::errors;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_entries))
        .route("/summary", get(summary))
}

pub async fn list_entries(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    params: Result<Query<AuditListParams>, QueryRejection>,
) -> axum::response::Response {
    let Query(params) = match params {
        Ok(p) => p,
        Err(rejection) => return errors::query_rejection(rejection),
    };
    let filter = match params.into_filter() {
        Ok(f) => f,
        Err(resp) => return resp,
    };
    match services.engine.list_audit(principal.actor(), &filter).await {
        Ok(entries) => Json(entries).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn summary(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    match services.engine.audit_summary(principal.actor()).await {
        Ok(summary) => Json(summary).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
