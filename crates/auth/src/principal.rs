use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lessonbay_core::UserId;

use crate::Role;

/// An authenticated actor, and also the shape of the local authoritative user record.
///
/// `role`, `suspended` and `suspended_until` are owned by the local record once it
/// exists; `email` and `display_name` follow the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: UserId,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub suspended: bool,
    pub suspended_until: Option<DateTime<Utc>>,
    pub suspension_reason: Option<String>,
}

impl Principal {
    pub fn new(id: UserId, email: impl Into<String>, display_name: impl Into<String>, role: Role) -> Self {
        Self {
            id,
            email: email.into(),
            display_name: display_name.into(),
            role,
            suspended: false,
            suspended_until: None,
            suspension_reason: None,
        }
    }

    /// Suspended now: the flag is set, or a suspension deadline lies in the future.
    pub fn is_suspended(&self, now: DateTime<Utc>) -> bool {
        self.suspended || self.suspended_until.is_some_and(|until| until > now)
    }

    /// Suspend the account.
    ///
    /// With `until` the suspension lapses on its own at that instant; without it the
    /// account stays suspended until [`Principal::unsuspend`].
    pub fn suspend(&mut self, until: Option<DateTime<Utc>>, reason: Option<String>) {
        self.suspended = until.is_none();
        self.suspended_until = until;
        self.suspension_reason = reason;
    }

    pub fn unsuspend(&mut self) {
        self.suspended = false;
        self.suspended_until = None;
        self.suspension_reason = None;
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
    }

    fn alice() -> Principal {
        Principal::new(UserId::new(), "alice@example.com", "Alice", Role::Student)
    }

    #[test]
    fn fresh_principal_is_not_suspended() {
        assert!(!alice().is_suspended(t0()));
    }

    #[test]
    fn timed_suspension_lapses_at_deadline() {
        let mut p = alice();
        p.suspend(Some(t0() + Duration::days(3)), Some("spam".to_string()));

        assert!(p.is_suspended(t0()));
        assert!(p.is_suspended(t0() + Duration::days(3) - Duration::milliseconds(1)));
        assert!(!p.is_suspended(t0() + Duration::days(3)));
    }

    #[test]
    fn untimed_suspension_holds_until_lifted() {
        let mut p = alice();
        p.suspend(None, None);
        assert!(p.is_suspended(t0() + Duration::days(10_000)));

        p.unsuspend();
        assert!(!p.is_suspended(t0()));
        assert_eq!(p.suspension_reason, None);
    }
}
