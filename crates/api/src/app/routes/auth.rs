use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use chrono::Utc;

use crate::app::dto::{LoginRequest, LoginResponse};
use crate::app::errors;
use crate::app::services::AppServices;

/// Public: issues bearer tokens.
pub fn router() -> Router {
    Router::new().route("/login", post(login))
}

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection(rejection),
    };
    let user = match services.engine.authenticate(&body.email, &body.password).await {
        Ok(u) => u,
        Err(e) => return errors::ledger_error_to_response(e),
    };
    match services.tokens.issue(user.id, vec![user.role.clone()], Utc::now()) {
        Ok(issued) => Json(LoginResponse {
            token: issued.token,
            expires_at: issued.expires_at,
            user,
        })
        .into_response(),
        Err(e) => {
            tracing::error!(error = %e, user_id = %user.id, "failed to issue token");
            errors::json_error(
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                "token_issue_failed",
                "could not issue a token",
            )
        }
    }
}
