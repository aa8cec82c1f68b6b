//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: stores, gate, resolver, limiters and adapters
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use crate::config::ApiConfig;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

use services::AppServices;

/// Build the router around already-constructed services.
pub fn router(services: Arc<AppServices>) -> Router {
    let auth_state = middleware::AuthState {
        resolver: services.resolver.clone(),
    };

    let protected = routes::protected_router().layer(axum::middleware::from_fn_with_state(
        auth_state.clone(),
        middleware::auth_middleware,
    ));

    let guest_friendly = routes::guest_router().layer(axum::middleware::from_fn_with_state(
        auth_state,
        middleware::optional_auth_middleware,
    ));

    let sign_in = routes::auth::router(services.otp_rate_limit(), services.signup_rate_limit());

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(guest_friendly)
        .merge(protected)
        .nest("/api/auth", sign_in)
        .layer(ServiceBuilder::new().layer(Extension(services)))
}

/// Build services from `config`, start background tasks, and return the router.
pub async fn build_app(config: &ApiConfig) -> anyhow::Result<Router> {
    let services = Arc::new(services::build_services(config).await?);
    if let Some(_sweeper) = services.spawn_background(config) {
        tracing::info!(every = ?config.moderation_sweep, "expiry sweep started");
    }
    Ok(router(services))
}
