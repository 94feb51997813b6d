use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};

use stockella_core::ConfigParamId;
use stockella_inventory::{ConfigParamPatch, NewConfigParam};

use crate::app::errors;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_params).post(create_param))
        .route("/:id", put(update_param).delete(delete_param))
}

fn parse_id(raw: &str) -> Result<ConfigParamId, axum::response::Response> {
    raw.parse().map_err(|_| errors::invalid_id("config parameter", raw))
}

pub async fn list_params(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    match services.engine.list_config_params(principal.actor()).await {
        Ok(params) => Json(params).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn create_param(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<NewConfigParam>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection(rejection),
    };
    match services.engine.create_config_param(principal.actor(), body).await {
        Ok(param) => (StatusCode::CREATED, Json(param)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn update_param(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<ConfigParamPatch>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection(rejection),
    };
    let id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.engine.update_config_param(principal.actor(), id, body).await {
        Ok(param) => Json(param).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn delete_param(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.engine.delete_config_param(principal.actor(), id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
