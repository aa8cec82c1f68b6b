//! Capability decisions for class resources.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use lessonbay_core::{ClassId, UserId};

use crate::{
    Capability, ClassResource, ClassStore, Enrollment, EnrollmentState, EnrollmentStore, KickRecord,
    ModerationRegistry, Principal, Role, StoreError,
};

/// Why a capability was refused. Serialized as the machine-readable `reason` code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// No principal (guest).
    LoginRequired,
    SuspendedAccount,
    NotEnrolled,
    EnrollmentExpired,
    /// Barred from the live room; the expiry is deliberately not disclosed.
    Kicked,
    /// A teacher acting on someone else's class.
    NotClassOwner,
    /// The role never holds this capability (e.g. teachers reviewing, students managing).
    RoleNotPermitted,
}

impl DenyReason {
    pub fn code(&self) -> &'static str {
        match self {
            DenyReason::LoginRequired => "login_required",
            DenyReason::SuspendedAccount => "suspended_account",
            DenyReason::NotEnrolled => "not_enrolled",
            DenyReason::EnrollmentExpired => "enrollment_expired",
            DenyReason::Kicked => "kicked",
            DenyReason::NotClassOwner => "not_class_owner",
            DenyReason::RoleNotPermitted => "role_not_permitted",
        }
    }

    /// User-facing guidance for the denial.
    pub fn message(&self) -> &'static str {
        match self {
            DenyReason::LoginRequired => "Please sign in to continue.",
            DenyReason::SuspendedAccount => "This account is suspended.",
            DenyReason::NotEnrolled => "Enroll in this class to access it.",
            DenyReason::EnrollmentExpired => "Your enrollment has ended. Renew to regain access.",
            DenyReason::Kicked => "You have been removed from this live session.",
            DenyReason::NotClassOwner => "Only the class's teacher can do this.",
            DenyReason::RoleNotPermitted => "Your role cannot perform this action.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", content = "reason", rename_all = "snake_case")]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn into_result(self) -> Result<(), DenyReason> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => Err(reason),
        }
    }
}

/// Decide one capability for one class.
///
/// - No IO
/// - No panics
/// - `kicked` is the moderation state for `(class, principal)`; only `join_live`
///   looks at it.
///
/// Order: guest, suspension, kick (join_live only), then the role table. Teachers
/// and admins never look at `enrollment`.
pub fn authorize(
    principal: Option<&Principal>,
    class: &ClassResource,
    enrollment: Option<&Enrollment>,
    capability: Capability,
    kicked: bool,
    now: DateTime<Utc>,
) -> Decision {
    let Some(principal) = principal else {
        return Decision::Deny(DenyReason::LoginRequired);
    };

    if principal.is_suspended(now) {
        return Decision::Deny(DenyReason::SuspendedAccount);
    }

    if capability == Capability::JoinLive && kicked {
        return Decision::Deny(DenyReason::Kicked);
    }

    match principal.role {
        Role::Admin => match capability {
            Capability::PostReview | Capability::Enroll => Decision::Deny(DenyReason::RoleNotPermitted),
            _ => Decision::Allow,
        },
        Role::Teacher => {
            if !class.is_owned_by(principal.id) {
                return Decision::Deny(DenyReason::NotClassOwner);
            }
            match capability {
                Capability::PostReview | Capability::Enroll => Decision::Deny(DenyReason::RoleNotPermitted),
                _ => Decision::Allow,
            }
        }
        Role::Student => match capability {
            Capability::ManageClass => Decision::Deny(DenyReason::RoleNotPermitted),
            Capability::Enroll => Decision::Allow,
            _ => match EnrollmentState::of(enrollment, now) {
                EnrollmentState::Active => Decision::Allow,
                EnrollmentState::Expired => Decision::Deny(DenyReason::EnrollmentExpired),
                EnrollmentState::Missing | EnrollmentState::Cancelled => Decision::Deny(DenyReason::NotEnrolled),
            },
        },
    }
}

/// Only teachers and admins open new classes.
pub fn can_create_class(principal: &Principal, now: DateTime<Utc>) -> Decision {
    if principal.is_suspended(now) {
        return Decision::Deny(DenyReason::SuspendedAccount);
    }
    match principal.role {
        Role::Teacher | Role::Admin => Decision::Allow,
        Role::Student => Decision::Deny(DenyReason::RoleNotPermitted),
    }
}

/// Platform administration (user listing, suspension).
pub fn can_administer(principal: &Principal, now: DateTime<Utc>) -> Decision {
    if principal.is_suspended(now) {
        return Decision::Deny(DenyReason::SuspendedAccount);
    }
    if principal.is_admin() {
        Decision::Allow
    } else {
        Decision::Deny(DenyReason::RoleNotPermitted)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GateError {
    #[error("class not found")]
    ClassNotFound,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What happened to a kick request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KickOutcome {
    Recorded(KickRecord),
    Denied(DenyReason),
}

/// The request-facing authorization component.
///
/// Owns handles to the class and enrollment stores and the moderation registry; every
/// decision fetches fresh state and delegates to [`authorize`].
#[derive(Clone)]
pub struct AuthorizationGate {
    classes: Arc<dyn ClassStore>,
    enrollments: Arc<dyn EnrollmentStore>,
    moderation: Arc<dyn ModerationRegistry>,
}

impl AuthorizationGate {
    pub fn new(
        classes: Arc<dyn ClassStore>,
        enrollments: Arc<dyn EnrollmentStore>,
        moderation: Arc<dyn ModerationRegistry>,
    ) -> Self {
        Self {
            classes,
            enrollments,
            moderation,
        }
    }

    pub async fn load_class(&self, class_id: ClassId) -> Result<ClassResource, GateError> {
        self.classes
            .get_by_id(class_id)
            .await?
            .ok_or(GateError::ClassNotFound)
    }

    /// Decide `capability` on `class_id` for `principal`.
    pub async fn check(
        &self,
        principal: &Principal,
        class_id: ClassId,
        capability: Capability,
        now: DateTime<Utc>,
    ) -> Result<Decision, GateError> {
        let class = self.load_class(class_id).await?;
        self.check_class(principal, &class, capability, now).await
    }

    /// Decide `capability` on an already-loaded class.
    pub async fn check_class(
        &self,
        principal: &Principal,
        class: &ClassResource,
        capability: Capability,
        now: DateTime<Utc>,
    ) -> Result<Decision, GateError> {
        let needs_enrollment =
            principal.role == Role::Student && (capability.is_content() || capability == Capability::PostReview);
        let enrollment = if needs_enrollment {
            self.enrollments.get_by_user_and_class(principal.id, class.id).await?
        } else {
            None
        };

        let kicked = capability == Capability::JoinLive && self.moderation.is_kicked(class.id, principal.id, now);

        let decision = authorize(Some(principal), class, enrollment.as_ref(), capability, kicked, now);
        if let Decision::Deny(reason) = decision {
            tracing::debug!(
                user_id = %principal.id,
                class_id = %class.id,
                capability = capability.as_str(),
                reason = reason.code(),
                "capability denied"
            );
        }
        Ok(decision)
    }

    /// Kick `target` out of `class_id`'s live room for `ban_minutes` (clamped).
    ///
    /// Requires `manage_class` on the class. Removing the participant from the media
    /// session is left to the caller.
    pub async fn kick(
        &self,
        principal: &Principal,
        class_id: ClassId,
        target: UserId,
        ban_minutes: i64,
        now: DateTime<Utc>,
    ) -> Result<KickOutcome, GateError> {
        let decision = self.check(principal, class_id, Capability::ManageClass, now).await?;
        if let Decision::Deny(reason) = decision {
            return Ok(KickOutcome::Denied(reason));
        }

        let record = self.moderation.kick(class_id, target, ban_minutes, now);
        tracing::info!(
            class_id = %class_id,
            user_id = %target,
            by = %principal.id,
            expires_at = %record.expires_at,
            "participant kicked"
        );
        Ok(KickOutcome::Recorded(record))
    }
}
