use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};

use crate::app::dto::WhoAmIResponse;
use crate::context::PrincipalContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(Extension(principal): Extension<PrincipalContext>) -> impl IntoResponse {
    Json(WhoAmIResponse {
        user_id: principal.user_id(),
        roles: principal.roles().iter().map(|r| r.as_str().to_string()).collect(),
        permissions: principal.actor().permission_names(),
    })
}
