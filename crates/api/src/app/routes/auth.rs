//! One-time sign-in codes. Both routes sit behind their own rate limiter.

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

use lessonbay_infra::OtpError;

use crate::app::{dto, errors, services::AppServices};
use crate::middleware::{rate_limit_middleware, RateLimitState};

pub fn router(otp_limit: RateLimitState, signup_limit: RateLimitState) -> Router {
    let send = Router::new()
        .route("/send-otp", post(send_otp))
        .route_layer(axum::middleware::from_fn_with_state(otp_limit, rate_limit_middleware));
    let verify = Router::new()
        .route("/verify-otp", post(verify_otp))
        .route_layer(axum::middleware::from_fn_with_state(signup_limit, rate_limit_middleware));

    send.merge(verify)
}

fn looks_like_email(email: &str) -> bool {
    matches!(email.split_once('@'), Some((local, domain)) if !local.is_empty() && domain.contains('.'))
}

/// POST /api/auth/send-otp - issue and mail a six-digit code
pub async fn send_otp(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::SendOtpRequest>,
) -> axum::response::Response {
    let email = body.email.trim();
    if !looks_like_email(email) {
        return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", "a valid email is required");
    }

    let code = services.otp_codes.issue(email, Utc::now());
    if let Err(e) = services.mailer.send_one_time_code(email, &code).await {
        tracing::error!(error = %e, "one-time code delivery failed");
        return errors::json_error(StatusCode::BAD_GATEWAY, "mail_unavailable", "could not send the code");
    }

    (
        StatusCode::OK,
        Json(json!({ "success": true, "message": "code sent" })),
    )
        .into_response()
}

/// POST /api/auth/verify-otp - consume a code
pub async fn verify_otp(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::VerifyOtpRequest>,
) -> axum::response::Response {
    if body.email.trim().is_empty() || body.code.trim().is_empty() {
        return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", "email and code are required");
    }

    match services.otp_codes.verify(&body.email, &body.code, Utc::now()) {
        Ok(()) => (StatusCode::OK, Json(json!({ "success": true }))).into_response(),
        Err(e) => {
            let code = match e {
                OtpError::NotRequested => "otp_not_requested",
                OtpError::Expired => "otp_expired",
                OtpError::Mismatch => "otp_mismatch",
            };
            errors::json_error(StatusCode::BAD_REQUEST, code, e.to_string())
        }
    }
}
