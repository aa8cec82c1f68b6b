use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use chrono::Utc;
use serde_json::json;

use lessonbay_auth::{Capability, KickOutcome};
use lessonbay_core::{ClassId, UserId};

use crate::app::{dto, errors, services::AppServices};
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/token", post(join_token))
        .route("/kick", post(kick))
}

/// POST /api/live/token - room join token, requires `join_live`
pub async fn join_token(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::LiveTokenRequest>,
) -> axum::response::Response {
    let class_id = match body.class_id.parse::<ClassId>() {
        Ok(id) => id,
        Err(e) => return errors::domain_error_to_response(e),
    };

    let now = Utc::now();
    let class = match services.gate.load_class(class_id).await {
        Ok(c) => c,
        Err(e) => return authz::gate_error_to_response(e),
    };
    let decision = match services
        .gate
        .check_class(principal.principal(), &class, Capability::JoinLive, now)
        .await
    {
        Ok(d) => d,
        Err(e) => return authz::gate_error_to_response(e),
    };
    if let Err(resp) = authz::require(decision) {
        return resp;
    }

    let publisher = principal.principal().is_admin() || class.is_owned_by(principal.user_id());
    match services
        .rooms
        .mint_join_token(class_id, principal.principal(), publisher, now)
        .await
    {
        Ok(token) => (
            StatusCode::OK,
            Json(json!({
                "url": token.url,
                "token": token.token,
                "expiresAt": token.expires_at,
                "canPublish": publisher,
            })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(class_id = %class_id, error = %e, "room token minting failed");
            errors::json_error(StatusCode::BAD_GATEWAY, "room_unavailable", "live room is unavailable")
        }
    }
}

/// POST /api/live/kick - bar a participant from the live room, requires `manage_class`
///
/// The kick is recorded before the room is asked to disconnect the participant; a
/// room failure is reported but does not undo the kick.
pub async fn kick(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::KickRequest>,
) -> axum::response::Response {
    let class_id = match body.class_id.parse::<ClassId>() {
        Ok(id) => id,
        Err(e) => return errors::domain_error_to_response(e),
    };
    let target = match body.user_id.parse::<UserId>() {
        Ok(id) => id,
        Err(e) => return errors::domain_error_to_response(e),
    };
    let minutes = body.ban_minutes.unwrap_or(dto::DEFAULT_BAN_MINUTES);

    let record = match services
        .gate
        .kick(principal.principal(), class_id, target, minutes, Utc::now())
        .await
    {
        Ok(KickOutcome::Recorded(record)) => record,
        Ok(KickOutcome::Denied(reason)) => return authz::deny_to_response(reason),
        Err(e) => return authz::gate_error_to_response(e),
    };

    let removed = match services.rooms.remove_participant(class_id, target).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(class_id = %class_id, user_id = %target, error = %e, "room removal failed; kick stands");
            false
        }
    };

    (
        StatusCode::OK,
        Json(json!({
            "kicked": true,
            "classId": record.class_id.to_string(),
            "userId": record.user_id.to_string(),
            "expiresAt": record.expires_at,
            "removedFromRoom": removed,
        })),
    )
        .into_response()
}
