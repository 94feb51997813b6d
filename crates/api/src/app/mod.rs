use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use stockella_auth::Hs256JwtValidator;

use crate::config::ApiConfig;
use crate::middleware::{self, AuthState};

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::AppServices;

/// Build the router: `/health` and `/auth/login` are public, everything else
/// needs a bearer token.
pub async fn build_app(config: &ApiConfig) -> anyhow::Result<Router> {
    let services = Arc::new(AppServices::from_config(config).await?);
    Ok(router(services, config.jwt_secret.as_bytes()))
}

pub fn router(services: Arc<AppServices>, jwt_secret: &[u8]) -> Router {
    let auth_state = AuthState {
        jwt: Arc::new(Hs256JwtValidator::new(jwt_secret)),
    };

    let public = Router::new()
        .nest("/auth", routes::auth::router())
        .layer(Extension(services.clone()));

    let protected = routes::router()
        .layer(Extension(services))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(public)
        .merge(protected)
        .layer(ServiceBuilder::new())
}
