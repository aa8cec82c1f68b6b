//! Admin routes for account suspension.
//!
//! Suspension lives on the local user record, so it takes effect on the target's next
//! request regardless of what their bearer token claims.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::json;

use lessonbay_auth::can_administer;
use lessonbay_core::{DomainError, UserId};

use crate::app::{dto, errors, services::AppServices};
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/:id/suspend", post(suspend_user))
        .route("/users/:id/unsuspend", post(unsuspend_user))
}

/// GET /api/admin/users - every local user record
pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    let now = Utc::now();
    if let Err(resp) = authz::require(can_administer(principal.principal(), now)) {
        return resp;
    }

    match services.users.list().await {
        Ok(users) => {
            let items: Vec<_> = users.iter().map(|u| dto::principal_to_json(u, now)).collect();
            (StatusCode::OK, Json(json!({ "items": items }))).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

/// POST /api/admin/users/:id/suspend - suspend, optionally until a timestamp
pub async fn suspend_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Option<Json<dto::SuspendRequest>>,
) -> axum::response::Response {
    let now = Utc::now();
    if let Err(resp) = authz::require(can_administer(principal.principal(), now)) {
        return resp;
    }

    let target = match id.parse::<UserId>() {
        Ok(id) => id,
        Err(e) => return errors::domain_error_to_response(e),
    };
    if target == principal.user_id() {
        return errors::json_error(StatusCode::BAD_REQUEST, "self_suspension", "admins cannot suspend themselves");
    }

    let body = body.map(|Json(b)| b).unwrap_or_default();
    if body.until.is_some_and(|until| until <= now) {
        return errors::domain_error_to_response(DomainError::validation("until must be in the future"));
    }

    let mut user = match services.users.get_by_id(target).await {
        Ok(Some(u)) => u,
        Ok(None) => return errors::domain_error_to_response(DomainError::not_found("user")),
        Err(e) => return errors::store_error_to_response(e),
    };
    user.suspend(body.until, body.reason);

    match services.users.upsert(user).await {
        Ok(user) => {
            tracing::info!(
                user_id = %user.id,
                by = %principal.user_id(),
                until = ?user.suspended_until,
                "account suspended"
            );
            (StatusCode::OK, Json(dto::principal_to_json(&user, now))).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

/// POST /api/admin/users/:id/unsuspend
pub async fn unsuspend_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let now = Utc::now();
    if let Err(resp) = authz::require(can_administer(principal.principal(), now)) {
        return resp;
    }

    let target = match id.parse::<UserId>() {
        Ok(id) => id,
        Err(e) => return errors::domain_error_to_response(e),
    };

    let mut user = match services.users.get_by_id(target).await {
        Ok(Some(u)) => u,
        Ok(None) => return errors::domain_error_to_response(DomainError::not_found("user")),
        Err(e) => return errors::store_error_to_response(e),
    };
    user.unsuspend();

    match services.users.upsert(user).await {
        Ok(user) => {
            tracing::info!(user_id = %user.id, by = %principal.user_id(), "account unsuspended");
            (StatusCode::OK, Json(dto::principal_to_json(&user, now))).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}
