use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Extension, Query,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use stockella_core::ProductId;
use stockella_infra::MovementReceipt;

use crate::app::dto::{CreateMovementRequest, MovementListParams};
use crate::app::errors;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new().route("/", get(list_movements).post(create_movement))
}

pub async fn create_movement(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<CreateMovementRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection(rejection),
    };
    let product_id: ProductId = match body.product_id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("product", &body.product_id),
    };
    let quantity = match body.quantity() {
        Ok(q) => q,
        Err(resp) => return resp,
    };

    match services
        .engine
        .apply_movement(principal.actor(), product_id, &body.kind, quantity, body.reason)
        .await
    {
        Ok(result) => (StatusCode::CREATED, Json(MovementReceipt::from(&result))).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn list_movements(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    params: Result<Query<MovementListParams>, QueryRejection>,
) -> axum::response::Response {
    let Query(params) = match params {
        Ok(p) => p,
        Err(rejection) => return errors::query_rejection(rejection),
    };
    let filter = match params.into_filter() {
        Ok(f) => f,
        Err(resp) => return resp,
    };
    match services.engine.list_movements(principal.actor(), &filter).await {
        Ok(movements) => Json(movements).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
