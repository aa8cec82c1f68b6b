use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde_json::json;

use lessonbay_auth::{Capability, DurationUnits, Enrollment, PlanType, Purchase};
use lessonbay_core::{ClassId, DomainError};

use crate::app::{dto, errors, services::AppServices};
use crate::authz;
use crate::context::PrincipalContext;

/// POST /api/classes/:id/enroll - record a purchase for the calling student
///
/// Payment is settled elsewhere; `paidAmount` is recorded as reported. A purchase
/// on an existing row replaces its remaining time.
pub async fn enroll(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::EnrollRequest>,
) -> axum::response::Response {
    let class_id = match id.parse::<ClassId>() {
        Ok(id) => id,
        Err(e) => return errors::domain_error_to_response(e),
    };
    let plan_type = match body.plan_type.parse::<PlanType>() {
        Ok(p) => p,
        Err(e) => return errors::domain_error_to_response(e),
    };
    if body.paid_amount < 0 {
        return errors::domain_error_to_response(DomainError::validation("paidAmount must not be negative"));
    }
    let duration_units = match DurationUnits::for_purchase(&body.duration_units) {
        Ok(units) => units,
        Err(e) => return errors::domain_error_to_response(e),
    };

    let now = Utc::now();
    let decision = match services
        .gate
        .check(principal.principal(), class_id, Capability::Enroll, now)
        .await
    {
        Ok(d) => d,
        Err(e) => return authz::gate_error_to_response(e),
    };
    if let Err(resp) = authz::require(decision) {
        return resp;
    }

    let existing = match services
        .enrollments
        .get_by_user_and_class(principal.user_id(), class_id)
        .await
    {
        Ok(row) => row,
        Err(e) => return errors::store_error_to_response(e),
    };
    let purchase = Purchase {
        plan_type,
        duration_units,
        paid_amount: body.paid_amount,
    };
    let row = Enrollment::purchase(existing, principal.user_id(), class_id, purchase, now);

    match services.enrollments.upsert(row).await {
        Ok(row) => {
            tracing::info!(
                class_id = %class_id,
                user_id = %row.user_id,
                plan_type = row.plan_type.as_str(),
                end_at = %row.end_at,
                "enrollment purchased"
            );
            (StatusCode::CREATED, Json(dto::enrollment_to_json(&row, now))).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

/// GET /api/me/enrollments - the caller's enrollment rows with a computed `active` flag
pub async fn my_enrollments(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    let now = Utc::now();
    match services.enrollments.list_for_user(principal.user_id()).await {
        Ok(rows) => {
            let items: Vec<_> = rows.iter().map(|e| dto::enrollment_to_json(e, now)).collect();
            (StatusCode::OK, Json(json!({ "items": items }))).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}
