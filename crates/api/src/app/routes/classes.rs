use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde_json::json;

use lessonbay_auth::{authorize, can_create_class, Capability, ClassResource, Decision};
use lessonbay_core::{ClassId, DomainError};

use crate::app::{dto, errors, services::AppServices};
use crate::authz;
use crate::context::{MaybePrincipal, PrincipalContext};

/// GET /api/classes - public class listing
pub async fn list_classes(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.classes.list().await {
        Ok(classes) => {
            let items: Vec<_> = classes.iter().map(dto::class_to_json).collect();
            (StatusCode::OK, Json(json!({ "items": items }))).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

/// POST /api/classes - teachers and admins create classes they own
pub async fn create_class(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CreateClassRequest>,
) -> axum::response::Response {
    let now = Utc::now();
    if let Err(resp) = authz::require(can_create_class(principal.principal(), now)) {
        return resp;
    }

    let title = body.title.trim();
    if title.is_empty() {
        return errors::domain_error_to_response(DomainError::validation("title is required"));
    }

    let class = ClassResource::new(ClassId::new(), principal.user_id(), title, now);
    match services.classes.insert(class).await {
        Ok(class) => {
            tracing::info!(class_id = %class.id, teacher_id = %class.teacher_id, "class created");
            (StatusCode::CREATED, Json(dto::class_to_json(&class))).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

/// DELETE /api/classes/:id - requires `manage_class`
pub async fn delete_class(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let class_id = match id.parse::<ClassId>() {
        Ok(id) => id,
        Err(e) => return errors::domain_error_to_response(e),
    };

    let decision = match services
        .gate
        .check(principal.principal(), class_id, Capability::ManageClass, Utc::now())
        .await
    {
        Ok(d) => d,
        Err(e) => return authz::gate_error_to_response(e),
    };
    if let Err(resp) = authz::require(decision) {
        return resp;
    }

    match services.classes.delete(class_id).await {
        Ok(true) => {
            tracing::info!(class_id = %class_id, by = %principal.user_id(), "class deleted");
            StatusCode::NO_CONTENT.into_response()
        }
        Ok(false) => errors::domain_error_to_response(DomainError::not_found("class")),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// GET /api/classes/:id/access/:capability - the gate's decision for the caller
///
/// Always `200` with the decision body, so clients can grey out controls.
pub async fn probe_access(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<MaybePrincipal>,
    Path((id, capability)): Path<(String, String)>,
) -> axum::response::Response {
    let class_id = match id.parse::<ClassId>() {
        Ok(id) => id,
        Err(e) => return errors::domain_error_to_response(e),
    };
    let capability = match capability.parse::<Capability>() {
        Ok(c) => c,
        Err(msg) => return errors::json_error(StatusCode::BAD_REQUEST, "unknown_capability", msg),
    };

    let class = match services.gate.load_class(class_id).await {
        Ok(c) => c,
        Err(e) => return authz::gate_error_to_response(e),
    };

    let now = Utc::now();
    let decision = match caller.principal() {
        None => authorize(None, &class, None, capability, false, now),
        Some(principal) => match services.gate.check_class(principal, &class, capability, now).await {
            Ok(d) => d,
            Err(e) => return authz::gate_error_to_response(e),
        },
    };

    let body = match decision {
        Decision::Allow => json!({ "capability": capability.as_str(), "decision": "allow" }),
        Decision::Deny(reason) => json!({
            "capability": capability.as_str(),
            "decision": "deny",
            "reason": reason.code(),
            "message": reason.message(),
        }),
    };
    (StatusCode::OK, Json(body)).into_response()
}
