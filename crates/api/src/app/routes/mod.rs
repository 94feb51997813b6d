use axum::{routing::get, Router};

pub mod alerts;
pub mod audit;
pub mod auth;
pub mod categories;
pub mod config;
pub mod dashboard;
pub mod movements;
pub mod products;
pub mod system;
pub mod users;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/dashboard", get(dashboard::summary))
        .nest("/products", products::router())
        .nest("/categories", categories::router())
        .nest("/users", users::router())
        .nest("/movements", movements::router())
        .nest("/alerts", alerts::router())
        .nest("/audit", audit::router())
        .nest("/config", config::router())
}
