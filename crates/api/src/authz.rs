//! Mapping gate outcomes onto HTTP responses.
//!
//! Every protected handler asks the gate first and only proceeds on `Allow`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use lessonbay_auth::{AuthError, Decision, DenyReason, GateError};
use lessonbay_core::DomainError;

use crate::app::errors::{domain_error_to_response, json_error, store_error_to_response};

/// `401` for missing login or suspension, `403` with a `reason` code otherwise.
pub fn deny_to_response(reason: DenyReason) -> Response {
    let status = match reason {
        DenyReason::LoginRequired | DenyReason::SuspendedAccount => StatusCode::UNAUTHORIZED,
        _ => StatusCode::FORBIDDEN,
    };
    (
        status,
        axum::Json(json!({
            "error": "forbidden",
            "reason": reason.code(),
            "message": reason.message(),
        })),
    )
        .into_response()
}

pub fn require(decision: Decision) -> Result<(), Response> {
    decision.into_result().map_err(deny_to_response)
}

pub fn gate_error_to_response(err: GateError) -> Response {
    match err {
        GateError::ClassNotFound => domain_error_to_response(DomainError::not_found("class")),
        GateError::Store(e) => store_error_to_response(e),
    }
}

pub fn auth_error_to_response(err: AuthError) -> Response {
    match err {
        AuthError::Unauthenticated => json_error(StatusCode::UNAUTHORIZED, "unauthenticated", "login required"),
        AuthError::SuspendedAccount => {
            json_error(StatusCode::UNAUTHORIZED, "suspended_account", "this account is suspended")
        }
        AuthError::Internal(msg) => {
            tracing::error!(error = %msg, "identity resolution failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "identity resolution failed")
        }
    }
}
