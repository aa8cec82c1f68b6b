use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};

use lessonbay_auth::{ClassResource, Enrollment, Principal};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateClassRequest {
    pub title: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollRequest {
    pub plan_type: String,
    /// Loosely typed on purpose: numbers, numeric strings and junk are all accepted.
    #[serde(default)]
    pub duration_units: JsonValue,
    #[serde(default)]
    pub paid_amount: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveTokenRequest {
    pub class_id: String,
}

pub const DEFAULT_BAN_MINUTES: i64 = 5;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KickRequest {
    pub class_id: String,
    pub user_id: String,
    pub ban_minutes: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SuspendRequest {
    pub until: Option<DateTime<Utc>>,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SendOtpRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyOtpRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub code: String,
}

// -------------------------
// Response mapping
// -------------------------

pub fn principal_to_json(p: &Principal, now: DateTime<Utc>) -> JsonValue {
    json!({
        "id": p.id.to_string(),
        "email": p.email,
        "displayName": p.display_name,
        "role": p.role.as_str(),
        "suspended": p.is_suspended(now),
        "suspendedUntil": p.suspended_until,
        "suspensionReason": p.suspension_reason,
    })
}

pub fn class_to_json(c: &ClassResource) -> JsonValue {
    json!({
        "id": c.id.to_string(),
        "teacherId": c.teacher_id.to_string(),
        "title": c.title,
        "createdAt": c.created_at,
    })
}

pub fn enrollment_to_json(e: &Enrollment, now: DateTime<Utc>) -> JsonValue {
    json!({
        "classId": e.class_id.to_string(),
        "planType": e.plan_type.as_str(),
        "durationUnits": e.duration_units.get(),
        "paidAmount": e.paid_amount,
        "endAt": e.end_at,
        "status": e.status.as_str(),
        "active": e.is_active(now),
    })
}
